use crate::{
    cli::{GlobalArgs, ProbeArgs},
    config::RendererConfig,
    format::fourcc,
    renderer::{PipelineProperties, discover},
    utils::errorfmt::ErrorFmt,
    video::drm::Drm,
};

pub fn main(_global: GlobalArgs, args: ProbeArgs) {
    let mut config = match &args.config {
        Some(path) => match RendererConfig::load(path) {
            Ok(c) => c,
            Err(e) => fatal!("Could not load the configuration: {}", ErrorFmt(e)),
        },
        None => RendererConfig::default(),
    };
    if args.device.is_some() {
        config.device = args.device;
    }
    if let Some(monitor) = args.monitor {
        config.monitor = monitor;
    }
    if let Some(format) = args.format {
        config.format = format;
    }
    let format = match config.preferred_format() {
        Ok(f) => f,
        Err(e) => fatal!("{}", ErrorFmt(e)),
    };
    let drm = match Drm::open(config.device.as_deref()) {
        Ok(drm) => drm,
        Err(e) => fatal!("Could not open the device: {}", ErrorFmt(e)),
    };
    let pipeline = match discover(&drm, config.monitor, format) {
        Ok(p) => p,
        Err(e) => fatal!("{}", ErrorFmt(e)),
    };
    let props = match PipelineProperties::get(&drm, &pipeline) {
        Ok(p) => p,
        Err(e) => fatal!("Could not read the properties: {}", ErrorFmt(e)),
    };
    println!("connector: {} ({})", pipeline.connector_name, pipeline.connector.0);
    println!("encoder: {}", pipeline.encoder.0);
    println!("crtc: {} (index {})", pipeline.crtc.0, pipeline.crtc_index);
    println!("plane: {}", pipeline.plane.0);
    println!("format: {}", fourcc(pipeline.plane_format));
    println!("mode: {}", pipeline.mode);
    for (name, table) in [
        ("connector", &props.connector),
        ("crtc", &props.crtc),
        ("plane", &props.plane),
    ] {
        let names: Vec<_> = table.names().iter().map(|n| n.to_string()).collect();
        println!("{} properties: {}", name, names.join(" "));
    }
}
