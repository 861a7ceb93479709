//! depthcloud
//!
//! Renders a synthetic LiDAR session as a GPU-unprojected point cloud into an
//! offscreen target and writes the last frame to a PNG.

mod app;
mod offscreen;

use clap::Parser;
use depthcloud_render::PointCloudConfig;
use depthcloud_session::{Orientation, SyntheticConfig};
use std::error::Error;
use std::path::{Path, PathBuf};
use tracing::error;

use crate::app::RunConfig;

/// Depth point cloud renderer
#[derive(Parser, Debug)]
#[command(name = "depthcloud")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of frames to render
    #[arg(long, default_value_t = 60)]
    frames: u32,

    /// Viewport width
    #[arg(long, default_value_t = 390)]
    width: u32,

    /// Viewport height
    #[arg(long, default_value_t = 844)]
    height: u32,

    /// Camera image width
    #[arg(long, default_value_t = 1920)]
    camera_width: u32,

    /// Camera image height
    #[arg(long, default_value_t = 1440)]
    camera_height: u32,

    /// Depth map width
    #[arg(long, default_value_t = 256)]
    depth_width: u32,

    /// Depth map height
    #[arg(long, default_value_t = 192)]
    depth_height: u32,

    /// Nominal number of grid samples
    #[arg(long)]
    target_points: Option<u32>,

    /// Interface orientation (portrait, portrait-upside-down, landscape-left, landscape-right)
    #[arg(long)]
    orientation: Option<Orientation>,

    /// Maximum number of frames in flight
    #[arg(long)]
    max_in_flight: Option<usize>,

    /// JSON file with point cloud settings; flags take precedence
    #[arg(long)]
    config: Option<PathBuf>,

    /// Where to write the last frame
    #[arg(short, long, default_value = "depthcloud.png")]
    output: PathBuf,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn run_config(&self) -> Result<RunConfig, Box<dyn Error>> {
        let mut point_cloud = match &self.config {
            Some(path) => load_config(path)?,
            None => PointCloudConfig::default(),
        };
        point_cloud = point_cloud.with_camera_resolution(self.camera_width, self.camera_height);
        if let Some(points) = self.target_points {
            point_cloud = point_cloud.with_grid_points(points);
        }
        if let Some(orientation) = self.orientation {
            point_cloud = point_cloud.with_orientation(orientation);
        }
        if let Some(max) = self.max_in_flight {
            point_cloud = point_cloud.with_max_in_flight(max);
        }

        let session = SyntheticConfig::default()
            .with_camera_resolution(self.camera_width, self.camera_height)
            .with_depth_resolution(self.depth_width, self.depth_height)
            .with_orientation(point_cloud.orientation);

        Ok(RunConfig {
            frames: self.frames,
            viewport: [self.width, self.height],
            session,
            point_cloud,
            output: self.output.clone(),
        })
    }
}

fn load_config(path: &Path) -> Result<PointCloudConfig, Box<dyn Error>> {
    let text = std::fs::read_to_string(path)
        .map_err(|err| format!("failed to read {}: {err}", path.display()))?;
    let config = serde_json::from_str(&text)
        .map_err(|err| format!("failed to parse {}: {err}", path.display()))?;
    Ok(config)
}

fn init_logging(level: &str) {
    #[cfg(feature = "tracy")]
    {
        use tracing_subscriber::Layer;
        use tracing_subscriber::layer::SubscriberExt;
        use tracing_subscriber::util::SubscriberInitExt;
        tracing_subscriber::registry()
            .with(tracing_tracy::TracyLayer::default())
            .with(
                tracing_subscriber::fmt::layer().with_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
                ),
            )
            .init();
    }

    #[cfg(not(feature = "tracy"))]
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_target(false)
        .init();
}

fn main() {
    let args = Args::parse();
    init_logging(&args.log_level);

    let result = args.run_config().and_then(app::run);
    if let Err(err) = result {
        error!("depthcloud failed: {err}");
        std::process::exit(1);
    }
}
