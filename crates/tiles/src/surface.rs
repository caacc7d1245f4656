use std::sync::Arc;

use model::SurfaceDescriptor;
use tracing::debug;

use crate::{CommandSequence, LoadAction};

/// Creates and copies the pixel buffers behind a [`CowSurface`].
pub trait SurfaceAllocator {
    type Buffer;
    type Commands: CommandSequence;

    /// Returns the resolve buffer and, for multisampled descriptors, the MSAA
    /// buffer.
    fn create_buffers(
        &mut self,
        descriptor: &SurfaceDescriptor,
    ) -> (Self::Buffer, Option<Self::Buffer>);

    fn copy_buffer(
        &mut self,
        source: &Self::Buffer,
        destination: &Self::Buffer,
        commands: &mut Self::Commands,
    );
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceContent {
    Mutable,
    /// Immutable reference content shipped with the application.
    Builtin,
}

/// Attachments for one render pass over a surface.
#[derive(Debug)]
pub struct RenderPassAttachments<'a, B> {
    /// Buffer the pass renders into (the MSAA buffer when multisampled).
    pub target: &'a B,
    /// Single-sample buffer the MSAA target resolves into.
    pub resolve_target: Option<&'a B>,
    pub load_action: LoadAction,
}

/// Pixel surface handle with deferred duplication.
///
/// Copies alias the same buffers; the first write through any alias that is
/// still shared duplicates its buffers, leaving the other aliases on the old
/// content.
#[derive(Debug)]
pub struct CowSurface<B> {
    descriptor: SurfaceDescriptor,
    pixels: Arc<B>,
    msaa: Option<Arc<B>>,
    content: SurfaceContent,
    load_action: LoadAction,
}

impl<B> CowSurface<B> {
    /// A fresh surface; its first render pass clears.
    pub fn new<A>(descriptor: SurfaceDescriptor, allocator: &mut A) -> Self
    where
        A: SurfaceAllocator<Buffer = B>,
    {
        let (pixels, msaa) = allocator.create_buffers(&descriptor);
        Self::from_buffers(descriptor, pixels, msaa, LoadAction::Clear)
    }

    /// Wraps buffers that may already hold content.
    pub fn from_buffers(
        descriptor: SurfaceDescriptor,
        pixels: B,
        msaa: Option<B>,
        load_action: LoadAction,
    ) -> Self {
        assert_eq!(
            msaa.is_some(),
            descriptor.is_multisampled(),
            "MSAA buffer presence must match raster sample count {}",
            descriptor.raster_sample_count
        );
        Self {
            descriptor,
            pixels: Arc::new(pixels),
            msaa: msaa.map(Arc::new),
            content: SurfaceContent::Mutable,
            load_action,
        }
    }

    pub fn builtin(descriptor: SurfaceDescriptor, pixels: B) -> Self {
        Self {
            descriptor,
            pixels: Arc::new(pixels),
            msaa: None,
            content: SurfaceContent::Builtin,
            load_action: LoadAction::Load,
        }
    }

    pub fn descriptor(&self) -> &SurfaceDescriptor {
        &self.descriptor
    }

    pub fn content(&self) -> SurfaceContent {
        self.content
    }

    pub fn pixels(&self) -> &B {
        &self.pixels
    }

    pub fn msaa(&self) -> Option<&B> {
        self.msaa.as_deref()
    }

    pub fn load_action(&self) -> LoadAction {
        self.load_action
    }

    pub fn set_load_action(&mut self, load_action: LoadAction) {
        self.load_action = load_action;
    }

    /// Whether the next write must duplicate the buffers first.
    pub fn is_shared(&self) -> bool {
        self.content == SurfaceContent::Mutable
            && (Arc::strong_count(&self.pixels) > 1
                || self.msaa.as_ref().is_some_and(|msaa| Arc::strong_count(msaa) > 1))
    }

    pub fn aliases(&self, other: &CowSurface<B>) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
    }

    /// Returns a handle over the same buffers. Builtin content never mutates,
    /// so its copies never duplicate.
    pub fn copy(&self) -> Self {
        Self {
            descriptor: self.descriptor,
            pixels: Arc::clone(&self.pixels),
            msaa: self.msaa.clone(),
            content: self.content,
            load_action: self.load_action,
        }
    }

    /// Duplicates the buffers if they are shared. Returns whether a
    /// duplication happened.
    pub fn make_writable<A>(&mut self, allocator: &mut A, commands: &mut A::Commands) -> bool
    where
        A: SurfaceAllocator<Buffer = B>,
    {
        assert!(
            self.content == SurfaceContent::Mutable,
            "builtin surfaces are immutable"
        );
        if !self.is_shared() {
            return false;
        }

        let (pixels, msaa) = allocator.create_buffers(&self.descriptor);
        allocator.copy_buffer(&self.pixels, &pixels, commands);
        if let (Some(source), Some(destination)) = (&self.msaa, &msaa) {
            allocator.copy_buffer(source, destination, commands);
        }
        self.pixels = Arc::new(pixels);
        self.msaa = msaa.map(Arc::new);
        debug!(
            width = self.descriptor.size.width,
            height = self.descriptor.size.height,
            "duplicated shared surface before write"
        );
        true
    }

    /// Attachments for the next pass. Only the first pass after creation (or
    /// after restoring empty content) clears; later passes load.
    pub fn begin_render_pass(&mut self) -> RenderPassAttachments<'_, B> {
        assert!(
            self.content == SurfaceContent::Mutable,
            "builtin surfaces are immutable"
        );
        let load_action = self.load_action;
        self.load_action = LoadAction::Load;
        match &self.msaa {
            Some(msaa) => RenderPassAttachments {
                target: &**msaa,
                resolve_target: Some(&*self.pixels),
                load_action,
            },
            None => RenderPassAttachments {
                target: &*self.pixels,
                resolve_target: None,
                load_action,
            },
        }
    }
}
