use gpu_runtime::{GpuContext, texture_format};
use model::PixelFormat;

fn main() {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });

    let adapters: Vec<wgpu::Adapter> =
        pollster::block_on(instance.enumerate_adapters(wgpu::Backends::all()));
    if adapters.is_empty() {
        println!("No wgpu adapters found");
        return;
    }

    for (index, adapter) in adapters.iter().enumerate() {
        let info = adapter.get_info();
        let limits = adapter.limits();

        println!("Adapter #{index}:");
        println!("  name: {}", info.name);
        println!("  backend: {:?}", info.backend);
        println!("  device_type: {:?}", info.device_type);
        println!(
            "  largest tile or dense surface: {0}x{0}",
            limits.max_texture_dimension_2d
        );
        for format in [PixelFormat::Rgba8Unorm, PixelFormat::R32Float] {
            let features = adapter.get_texture_format_features(texture_format(format));
            println!(
                "  {format:?} sample counts: {:?}",
                features.flags.supported_sample_counts()
            );
        }
    }

    match pollster::block_on(GpuContext::new("list_adapters")) {
        Ok(context) => println!("Storage would use: {}", context.adapter_info().name),
        Err(error) => println!("No usable device: {error}"),
    }
}
