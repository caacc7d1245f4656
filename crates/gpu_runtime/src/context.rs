use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum GpuContextError {
    #[error("no wgpu adapter available: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),
    #[error("wgpu device request failed: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
}

/// Device and queue shared by every GPU-backed storage object. Created
/// explicitly and passed around; there is no process-wide device.
#[derive(Debug)]
pub struct GpuContext {
    adapter: wgpu::Adapter,
    adapter_info: wgpu::AdapterInfo,
    device: wgpu::Device,
    queue: wgpu::Queue,
}

impl GpuContext {
    pub async fn new(label: &'static str) -> Result<Self, GpuContextError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await?;
        let limits = adapter.limits();
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some(label),
                required_features: wgpu::Features::empty(),
                required_limits: limits,
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await?;
        let context = Self::from_parts(adapter, device, queue);
        debug!(
            adapter = %context.adapter_info.name,
            backend = ?context.adapter_info.backend,
            "gpu context created"
        );
        Ok(context)
    }

    #[cfg(feature = "blocking")]
    pub fn new_blocking(label: &'static str) -> Result<Self, GpuContextError> {
        pollster::block_on(Self::new(label))
    }

    /// Wraps a device the caller already owns.
    pub fn from_parts(adapter: wgpu::Adapter, device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let adapter_info = adapter.get_info();
        Self {
            adapter,
            adapter_info,
            device,
            queue,
        }
    }

    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.adapter_info
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Usages a texture of `format` may be created with on this device.
    /// Downlevel adapters only allow the usages WebGPU guarantees.
    pub fn allowed_usages(&self, format: wgpu::TextureFormat) -> wgpu::TextureUsages {
        let downlevel = self.adapter.get_downlevel_capabilities();
        if downlevel
            .flags
            .contains(wgpu::DownlevelFlags::WEBGPU_TEXTURE_FORMAT_SUPPORT)
        {
            self.adapter
                .get_texture_format_features(format)
                .allowed_usages
        } else {
            format
                .guaranteed_format_features(self.device.features())
                .allowed_usages
        }
    }

    /// Blocks until all submitted work has finished.
    pub fn wait_idle(&self) {
        if let Err(error) = self.device.poll(wgpu::PollType::wait_indefinitely()) {
            panic!("gpu device poll failed: {error}");
        }
    }
}
