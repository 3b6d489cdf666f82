use crate::{
    cli::{ConnectorsArgs, GlobalArgs},
    format::fourcc,
    kms::{Kms, get_properties},
    renderer::{COLORSPACE, HDR_OUTPUT_METADATA},
    utils::errorfmt::ErrorFmt,
    video::drm::{ConnectorStatus, Drm, DrmConnectorInfo, DrmError},
};

pub fn main(_global: GlobalArgs, args: ConnectorsArgs) {
    let drm = match Drm::open(args.device.as_deref()) {
        Ok(drm) => drm,
        Err(e) => fatal!("Could not open the device: {}", ErrorFmt(e)),
    };
    if let Err(e) = show(&drm, args.modes) {
        fatal!("Could not list the connectors: {}", ErrorFmt(e));
    }
}

fn show(drm: &Drm, modes: bool) -> Result<(), DrmError> {
    let res = drm.get_resources()?;
    println!("{}:", drm.path());
    println!("    crtcs: {}", res.crtcs.len());
    println!("    connectors:");
    for &connector in &res.connectors {
        let info = drm.get_connector_info(connector)?;
        print_connector(drm, &info, modes)?;
    }
    println!("    planes:");
    for plane in drm.get_planes()? {
        let info = drm.get_plane_info(plane)?;
        let formats: Vec<_> = info
            .format_types
            .iter()
            .map(|f| fourcc(*f).to_string())
            .collect();
        println!(
            "      {}: crtcs {:#b}, formats {}",
            plane.0,
            info.possible_crtcs,
            formats.join(" ")
        );
    }
    Ok(())
}

fn print_connector(drm: &Drm, info: &DrmConnectorInfo, modes: bool) -> Result<(), DrmError> {
    println!("      {}:", info.name());
    println!("        id: {}", info.connector_id.0);
    if info.status() != ConnectorStatus::Connected {
        println!("        {}", info.status());
        return Ok(());
    }
    println!(
        "        physical size: {}mm x {}mm",
        info.mm_width, info.mm_height
    );
    let mut hdr = false;
    let mut colorspace = false;
    for prop in get_properties(drm, info.connector_id)? {
        let def = drm.get_property(prop.id)?;
        hdr |= def.name == HDR_OUTPUT_METADATA;
        colorspace |= def.name == COLORSPACE;
    }
    println!("        HDR metadata: {}", hdr);
    println!("        colorspace: {}", colorspace);
    if info.modes.is_empty() {
        println!("        no modes");
        return Ok(());
    }
    println!("        mode: {}", info.modes[0]);
    if modes && info.modes.len() > 1 {
        println!("        modes:");
        for mode in &info.modes {
            println!("          {}", mode);
        }
    }
    Ok(())
}
