//! Command buffers that run handlers once the GPU has finished their work.
//!
//! wgpu reports completion through [`wgpu::Queue::on_submitted_work_done`].
//! [`CommandBuffer::commit`] submits the encoder and hands the collected
//! [`CompletionHandlers`] to that callback, so anything moved into a handler
//! (textures read by the pass, an in-flight slot) lives exactly as long as the
//! GPU needs it.

use std::fmt;
use tracing::trace;

type Handler = Box<dyn FnOnce() + Send + 'static>;

/// One-shot handlers run when a submission completes.
#[derive(Default)]
pub struct CompletionHandlers {
    handlers: Vec<Handler>,
}

impl CompletionHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler.
    pub fn add(&mut self, handler: impl FnOnce() + Send + 'static) {
        self.handlers.push(Box::new(handler));
    }

    /// Keep `resources` alive until the submission completes, then drop them.
    pub fn retain<T: Send + 'static>(&mut self, resources: T) {
        self.add(move || drop(resources));
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run every handler in registration order.
    ///
    /// Takes `self` by value: a handler list can only ever be fired once.
    pub fn fire(self) {
        for handler in self.handlers {
            handler();
        }
    }
}

impl fmt::Debug for CompletionHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionHandlers")
            .field("len", &self.handlers.len())
            .finish()
    }
}

/// A command encoder plus the handlers to run when its work completes.
pub struct CommandBuffer {
    label: String,
    encoder: wgpu::CommandEncoder,
    completed: CompletionHandlers,
}

impl CommandBuffer {
    pub fn new(device: &wgpu::Device, label: impl Into<String>) -> Self {
        let label = label.into();
        let encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some(&label),
        });
        Self {
            label,
            encoder,
            completed: CompletionHandlers::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn completion(&mut self) -> &mut CompletionHandlers {
        &mut self.completed
    }

    /// Register a handler to run once the GPU finishes this buffer.
    pub fn add_completed_handler(&mut self, handler: impl FnOnce() + Send + 'static) {
        self.completed.add(handler);
    }

    /// Begin a render pass on the encoder.
    ///
    /// The completion handlers are handed out alongside the pass so whoever
    /// records into the pass can also extend the lifetime of what it binds.
    pub fn begin_render_pass<'a>(
        &'a mut self,
        desc: &wgpu::RenderPassDescriptor<'_>,
    ) -> (wgpu::RenderPass<'a>, &'a mut CompletionHandlers) {
        (self.encoder.begin_render_pass(desc), &mut self.completed)
    }

    /// Submit the recorded work and schedule the completion handlers.
    ///
    /// Dropping a `CommandBuffer` without committing it submits nothing, and
    /// whatever its handlers retained is dropped with it.
    pub fn commit(self, queue: &wgpu::Queue) -> wgpu::SubmissionIndex {
        let Self {
            label,
            encoder,
            completed,
        } = self;

        let index = queue.submit(Some(encoder.finish()));
        let handler_count = completed.len();
        queue.on_submitted_work_done(move || {
            trace!(label = %label, handler_count, "Command buffer completed");
            completed.fire();
        });
        index
    }
}
