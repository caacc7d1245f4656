use std::sync::Arc;

use tiles::CommandSequence;
use tracing::trace;

use crate::GpuContext;

/// Every section is recorded into its own encoder and submitted as soon as it
/// is encoded. Queue submissions execute in submission order, which gives the
/// section-after-section ordering the storage layer relies on.
#[derive(Debug)]
pub struct GpuCommandSequence {
    context: Arc<GpuContext>,
    submitted: usize,
}

impl GpuCommandSequence {
    pub fn new(context: Arc<GpuContext>) -> Self {
        Self {
            context,
            submitted: 0,
        }
    }

    pub fn submitted(&self) -> usize {
        self.submitted
    }
}

impl CommandSequence for GpuCommandSequence {
    type Encoder = wgpu::CommandEncoder;

    fn encode_section<R>(
        &mut self,
        label: &'static str,
        encode: impl FnOnce(&mut Self::Encoder) -> R,
    ) -> R {
        let mut encoder =
            self.context
                .device()
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some(label),
                });
        let result = encode(&mut encoder);
        self.context.queue().submit(Some(encoder.finish()));
        self.submitted += 1;
        trace!(label, submitted = self.submitted, "gpu section submitted");
        result
    }

    fn commit(self) {
        self.context.wait_idle();
        trace!(sections = self.submitted, "gpu command sequence committed");
    }
}
