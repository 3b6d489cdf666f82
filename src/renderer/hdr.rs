use {
    crate::{
        kms::{Change, Kms, PropBlob},
        renderer::RendererError,
        surface::{Chromaticity, ColorDescription, TransferFunction},
        video::drm::{
            DRM_MODE_ATOMIC_ALLOW_MODESET, DrmBlob, DrmConnector, DrmCrtc, DrmModeInfo,
            DrmProperty, HDMI_EOTF_BT_2100_HLG, HDMI_EOTF_SMPTE_ST2084,
            HDMI_EOTF_TRADITIONAL_GAMMA_SDR, HDMI_STATIC_METADATA_TYPE1, hdr_metadata_infoframe,
            hdr_metadata_primary, hdr_output_metadata,
        },
    },
    std::rc::Rc,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HdrState {
    Disabled,
    Enabling,
    Enabled,
    Disabling,
}

/// The objects and properties HDR metadata is attached to.
pub struct HdrTarget<'a> {
    pub connector: DrmConnector,
    pub hdr_property: DrmProperty,
    pub crtc: DrmCrtc,
    pub mode_property: DrmProperty,
    pub mode: &'a DrmModeInfo,
}

struct HdrBlobs {
    hdr: PropBlob,
    mode: PropBlob,
}

pub struct HdrManager {
    kms: Rc<dyn Kms>,
    state: HdrState,
    sent: Option<hdr_output_metadata>,
    blobs: Option<HdrBlobs>,
}

impl HdrManager {
    pub fn new(kms: &Rc<dyn Kms>) -> Self {
        Self {
            kms: kms.clone(),
            state: HdrState::Disabled,
            sent: None,
            blobs: None,
        }
    }

    pub fn state(&self) -> HdrState {
        self.state
    }

    /// The metadata currently attached to the connector.
    pub fn sent(&self) -> Option<&hdr_output_metadata> {
        self.sent.as_ref()
    }

    /// The HDR and mode blobs. Either both exist or neither does.
    pub fn blob_ids(&self) -> Option<(DrmBlob, DrmBlob)> {
        self.blobs.as_ref().map(|b| (b.hdr.id(), b.mode.id()))
    }

    /// Replaces the mode blob after a modeset so that the pair describes the current
    /// timing. Returns `blob` if HDR is not enabled.
    pub fn adopt_mode_blob(&mut self, blob: PropBlob) -> Option<PropBlob> {
        match &mut self.blobs {
            Some(blobs) => {
                blobs.mode = blob;
                None
            }
            None => Some(blob),
        }
    }

    /// Attaches `metadata` to the connector.
    ///
    /// Returns `false` if the same metadata is already attached.
    pub fn enable(
        &mut self,
        target: &HdrTarget<'_>,
        metadata: hdr_output_metadata,
    ) -> Result<bool, RendererError> {
        if self.state == HdrState::Enabled && self.sent == Some(metadata) {
            return Ok(false);
        }
        let previous = self.state;
        self.state = HdrState::Enabling;
        match self.attach(target, &metadata) {
            Ok(blobs) => {
                self.blobs = Some(blobs);
                self.sent = Some(metadata);
                self.state = HdrState::Enabled;
                log::info!(
                    "Enabled HDR output on connector {} (eotf {})",
                    target.connector.0,
                    metadata.hdmi_metadata_type1.eotf,
                );
                Ok(true)
            }
            Err(e) => {
                self.state = previous;
                Err(e)
            }
        }
    }

    fn attach(
        &self,
        target: &HdrTarget<'_>,
        metadata: &hdr_output_metadata,
    ) -> Result<HdrBlobs, RendererError> {
        let hdr = PropBlob::new(&self.kms, metadata).map_err(RendererError::HdrAttach)?;
        let mode = PropBlob::new(&self.kms, &target.mode.to_raw())
            .map_err(RendererError::HdrAttach)?;
        let mut change = Change::new(&self.kms);
        change.change_object(target.connector, |c| {
            c.change(target.hdr_property, hdr.id().0 as u64);
        });
        change.change_object(target.crtc, |c| {
            c.change(target.mode_property, mode.id().0 as u64);
        });
        change
            .commit(DRM_MODE_ATOMIC_ALLOW_MODESET)
            .map_err(RendererError::HdrAttach)?;
        Ok(HdrBlobs { hdr, mode })
    }

    /// Clears the connector's metadata and destroys the blobs.
    ///
    /// The blobs are destroyed even if clearing the property fails.
    pub fn disable(
        &mut self,
        connector: DrmConnector,
        hdr_property: DrmProperty,
    ) -> Result<(), RendererError> {
        if self.state == HdrState::Disabled {
            return Ok(());
        }
        self.state = HdrState::Disabling;
        let mut change = Change::new(&self.kms);
        change.change_object(connector, |c| c.change(hdr_property, 0));
        let res = change
            .commit(DRM_MODE_ATOMIC_ALLOW_MODESET)
            .map_err(RendererError::HdrAttach);
        self.blobs = None;
        self.sent = None;
        self.state = HdrState::Disabled;
        if res.is_ok() {
            log::info!("Disabled HDR output on connector {}", connector.0);
        }
        res
    }
}

fn primary(c: Chromaticity) -> hdr_metadata_primary {
    hdr_metadata_primary { x: c.x, y: c.y }
}

/// Builds the static metadata infoframe for a frame's color description.
pub fn build_metadata(color: &ColorDescription) -> hdr_output_metadata {
    let eotf = match color.transfer {
        TransferFunction::Sdr => HDMI_EOTF_TRADITIONAL_GAMMA_SDR,
        TransferFunction::Pq => HDMI_EOTF_SMPTE_ST2084,
        TransferFunction::Hlg => HDMI_EOTF_BT_2100_HLG,
    };
    let mut infoframe = hdr_metadata_infoframe {
        eotf,
        metadata_type: HDMI_STATIC_METADATA_TYPE1,
        ..Default::default()
    };
    if let Some(m) = &color.mastering {
        infoframe.display_primaries = [primary(m.red), primary(m.green), primary(m.blue)];
        infoframe.white_point = primary(m.white_point);
        // 1 cd/m² units
        infoframe.max_display_mastering_luminance =
            (m.max_luminance / 10_000).min(u16::MAX as u32) as u16;
        // 0.0001 cd/m² units
        infoframe.min_display_mastering_luminance = m.min_luminance.min(u16::MAX as u32) as u16;
    }
    if let Some(cll) = &color.content_light {
        infoframe.max_cll = cll.max_cll;
        infoframe.max_fall = cll.max_fall;
    }
    hdr_output_metadata::new(infoframe)
}
