use std::sync::Arc;

use model::{PixelFormat, SurfaceDescriptor};
use tiles::{CommandSequence, LoadAction, RenderPassAttachments, SurfaceAllocator};
use tracing::trace;

use crate::format::{extent, texture_format};
use crate::{GpuCommandSequence, GpuContext};

const RESOLVE_USAGE: wgpu::TextureUsages = wgpu::TextureUsages::RENDER_ATTACHMENT
    .union(wgpu::TextureUsages::TEXTURE_BINDING)
    .union(wgpu::TextureUsages::COPY_SRC)
    .union(wgpu::TextureUsages::COPY_DST);

#[derive(Debug)]
pub struct GpuSurfaceTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    sample_count: u32,
}

impl GpuSurfaceTexture {
    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }
}

/// Color attachment for a pass over a surface. Clearing uses transparent
/// black.
pub fn color_attachment<'a>(
    attachments: &RenderPassAttachments<'a, GpuSurfaceTexture>,
) -> wgpu::RenderPassColorAttachment<'a> {
    let load = match attachments.load_action {
        LoadAction::Clear => wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
        LoadAction::Load => wgpu::LoadOp::Load,
    };
    wgpu::RenderPassColorAttachment {
        view: attachments.target.view(),
        resolve_target: attachments.resolve_target.map(GpuSurfaceTexture::view),
        depth_slice: None,
        ops: wgpu::Operations {
            load,
            store: wgpu::StoreOp::Store,
        },
    }
}

#[derive(Debug)]
pub struct GpuSurfaceAllocator {
    context: Arc<GpuContext>,
    created: usize,
    copies: usize,
}

impl GpuSurfaceAllocator {
    pub fn new(context: Arc<GpuContext>) -> Self {
        Self {
            context,
            created: 0,
            copies: 0,
        }
    }

    pub fn created(&self) -> usize {
        self.created
    }

    pub fn copies(&self) -> usize {
        self.copies
    }

    pub fn can_render(&self, pixel_format: PixelFormat) -> bool {
        self.context
            .allowed_usages(texture_format(pixel_format))
            .contains(wgpu::TextureUsages::RENDER_ATTACHMENT)
    }

    fn create_texture(
        &self,
        descriptor: &SurfaceDescriptor,
        sample_count: u32,
        usage: wgpu::TextureUsages,
    ) -> GpuSurfaceTexture {
        let texture = self
            .context
            .device()
            .create_texture(&wgpu::TextureDescriptor {
                label: Some("surface.texture"),
                size: extent(descriptor.size.width, descriptor.size.height),
                mip_level_count: 1,
                sample_count,
                dimension: wgpu::TextureDimension::D2,
                format: texture_format(descriptor.pixel_format),
                usage,
                view_formats: &[],
            });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        GpuSurfaceTexture {
            texture,
            view,
            sample_count,
        }
    }
}

impl SurfaceAllocator for GpuSurfaceAllocator {
    type Buffer = GpuSurfaceTexture;
    type Commands = GpuCommandSequence;

    fn create_buffers(
        &mut self,
        descriptor: &SurfaceDescriptor,
    ) -> (GpuSurfaceTexture, Option<GpuSurfaceTexture>) {
        let format = texture_format(descriptor.pixel_format);
        let allowed = self.context.allowed_usages(format);
        assert!(
            allowed.contains(wgpu::TextureUsages::RENDER_ATTACHMENT),
            "{format:?} surfaces cannot be rendered to on this adapter"
        );
        self.created += 1;
        let resolve = self.create_texture(descriptor, 1, RESOLVE_USAGE & allowed);
        let msaa = descriptor.is_multisampled().then(|| {
            self.create_texture(
                descriptor,
                descriptor.raster_sample_count,
                wgpu::TextureUsages::RENDER_ATTACHMENT,
            )
        });
        (resolve, msaa)
    }

    fn copy_buffer(
        &mut self,
        source: &GpuSurfaceTexture,
        destination: &GpuSurfaceTexture,
        commands: &mut GpuCommandSequence,
    ) {
        // Multisampled textures cannot be copied; their content is resolved
        // into the single-sample texture at the end of every pass.
        if source.sample_count > 1 {
            trace!(
                samples = source.sample_count,
                "skipping multisampled surface copy"
            );
            return;
        }
        assert_eq!(
            source.texture.size(),
            destination.texture.size(),
            "surface copy size mismatch"
        );
        commands.encode_section("surface.copy", |encoder| {
            encoder.copy_texture_to_texture(
                source.texture.as_image_copy(),
                destination.texture.as_image_copy(),
                source.texture.size(),
            );
        });
        self.copies += 1;
    }
}
