//! Headless frame loop.

use depthcloud_gpu::Renderer;
use depthcloud_render::{FrameTextureSet, PointCloudConfig, PointCloudRenderer, RenderStats};
use depthcloud_session::{SyntheticConfig, SyntheticSession};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, info_span};

use crate::offscreen::OffscreenTarget;

/// Everything one run needs.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub frames: u32,
    pub viewport: [u32; 2],
    pub session: SyntheticConfig,
    pub point_cloud: PointCloudConfig,
    pub output: PathBuf,
}

/// Render `frames` frames of the synthetic session and save the last one.
pub fn run(config: RunConfig) -> Result<RenderStats, Box<dyn Error>> {
    let renderer = pollster::block_on(Renderer::new())?;
    let session = Arc::new(SyntheticSession::new(config.session)?);

    let [width, height] = config.viewport;
    let target = OffscreenTarget::new(&renderer, width, height);
    let mut cloud = PointCloudRenderer::new(
        &renderer,
        Arc::clone(&session),
        &target.surface(),
        config.point_cloud,
    )?;

    for index in 0..config.frames {
        let _span = info_span!("frame", index).entered();

        let frame = session.advance()?;
        let textures = FrameTextureSet::upload(&renderer, &frame);

        let mut commands = cloud.begin_frame(format!("frame {index}"))?;
        let (pass, completion) = target.begin_pass(&mut commands);
        cloud.update(completion, pass, textures);
        commands.commit(renderer.queue());
    }

    let image = target.read_rgba(&renderer)?;
    image.save(&config.output)?;

    let stats = cloud.stats();
    info!(
        frames_drawn = stats.frames_drawn,
        frames_skipped = stats.frames_skipped,
        points_per_draw = stats.points_per_draw,
        output = %config.output.display(),
        "Finished"
    );
    Ok(stats)
}
