use {
    crate::{
        format::{Format, fourcc},
        kms::Kms,
        monitor::MonitorType,
        renderer::RendererError,
        utils::bitflags::BitflagsExt,
        video::drm::{
            ConnectorStatus, ConnectorType, DrmCardResources, DrmConnector, DrmConnectorInfo,
            DrmCrtc, DrmCrtcInfo, DrmEncoder, DrmModeInfo, DrmObject, DrmPlane, DrmPlaneInfo,
        },
    },
    isnt::std_1::vec::IsntVecExt,
};

/// The connector, encoder, CRTC and plane the renderer drives.
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub connector: DrmConnector,
    pub connector_type: ConnectorType,
    pub connector_name: String,
    pub encoder: DrmEncoder,
    pub crtc: DrmCrtc,
    pub crtc_index: usize,
    pub plane: DrmPlane,
    pub plane_format: u32,
    /// The connector's preferred mode.
    pub mode: DrmModeInfo,
    pub modes: Vec<DrmModeInfo>,
    /// The state of the CRTC before the renderer touched it.
    pub saved_crtc: DrmCrtcInfo,
}

/// Selects the first connected connector of the requested type that can be driven by a
/// CRTC with a usable plane.
pub fn discover(
    kms: &dyn Kms,
    monitor: MonitorType,
    preferred: &Format,
) -> Result<Pipeline, RendererError> {
    let res = kms.get_resources().map_err(RendererError::Discovery)?;
    let planes = get_planes(kms)?;
    for &connector in &res.connectors {
        let info = kms
            .get_connector_info(connector)
            .map_err(RendererError::Discovery)?;
        let ty = info.ty();
        if !monitor.matches(ty) {
            continue;
        }
        if info.status() != ConnectorStatus::Connected {
            log::debug!("Skipping {}: {}", info.name(), info.status());
            continue;
        }
        if info.modes.is_empty() {
            log::debug!("Skipping {}: no modes", info.name());
            continue;
        }
        let Some((encoder, crtc)) = find_crtc(kms, &res, &info)? else {
            log::debug!("Skipping {}: no usable CRTC", info.name());
            continue;
        };
        let Some(crtc_index) = res.crtcs.iter().position(|c| *c == crtc) else {
            continue;
        };
        let Some((plane, plane_format)) = find_plane(&planes, crtc_index, preferred) else {
            log::debug!("Skipping {}: no plane can be used with its CRTC", info.name());
            continue;
        };
        let saved_crtc = kms.get_crtc_info(crtc).map_err(RendererError::Discovery)?;
        let name = info.name();
        log::info!(
            "Selected {} (connector {}, crtc {}, plane {}, format {:?})",
            name,
            connector.0,
            crtc.0,
            plane.0,
            fourcc(plane_format),
        );
        let mode = info.modes[0].clone();
        return Ok(Pipeline {
            connector,
            connector_type: ty,
            connector_name: name,
            encoder,
            crtc,
            crtc_index,
            plane,
            plane_format,
            mode,
            modes: info.modes,
            saved_crtc,
        });
    }
    Err(RendererError::NoMatchingDisplay(monitor))
}

fn get_planes(kms: &dyn Kms) -> Result<Vec<DrmPlaneInfo>, RendererError> {
    let mut planes = vec![];
    for plane in kms.get_planes().map_err(RendererError::Discovery)? {
        planes.push(kms.get_plane_info(plane).map_err(RendererError::Discovery)?);
    }
    Ok(planes)
}

/// Prefers the connector's current encoder and that encoder's current CRTC.
fn find_crtc(
    kms: &dyn Kms,
    res: &DrmCardResources,
    info: &DrmConnectorInfo,
) -> Result<Option<(DrmEncoder, DrmCrtc)>, RendererError> {
    let mut encoders = vec![];
    if info.encoder_id.is_some() {
        encoders.push(info.encoder_id);
    }
    encoders.extend(info.encoders.iter().copied().filter(|e| *e != info.encoder_id));
    for encoder in encoders {
        let enc = kms
            .get_encoder_info(encoder)
            .map_err(RendererError::Discovery)?;
        if enc.crtc_id.is_some() && res.crtcs.contains(&enc.crtc_id) {
            return Ok(Some((encoder, enc.crtc_id)));
        }
        for (idx, crtc) in res.crtcs.iter().enumerate() {
            if idx < 32 && enc.possible_crtcs.contains(1 << idx) {
                return Ok(Some((encoder, *crtc)));
            }
        }
    }
    Ok(None)
}

fn find_plane(
    planes: &[DrmPlaneInfo],
    crtc_index: usize,
    preferred: &Format,
) -> Option<(DrmPlane, u32)> {
    if crtc_index >= 32 {
        return None;
    }
    let compatible = || {
        planes
            .iter()
            .filter(move |p| p.possible_crtcs.contains(1 << crtc_index))
    };
    if let Some(p) = compatible().find(|p| p.format_types.contains(&preferred.drm)) {
        return Some((p.plane_id, preferred.drm));
    }
    let p = compatible().find(|p| p.format_types.is_not_empty())?;
    log::warn!(
        "No plane supports {}, falling back to {:?}",
        preferred.name,
        fourcc(p.format_types[0]),
    );
    Some((p.plane_id, p.format_types[0]))
}
