mod discovery;
mod hdr;
mod master;
mod present;
mod properties;

pub use {
    discovery::{Pipeline, discover},
    hdr::{HdrState, build_metadata},
    master::MasterState,
    properties::{COLORSPACE, HDR_OUTPUT_METADATA, PipelineProperties, PropertyTable},
};

use {
    crate::{
        config::{ConfigError, RendererConfig},
        exporter::{ExportError, Exporter},
        kms::{Change, Kms, PropBlob},
        monitor::MonitorType,
        renderer::{
            hdr::{HdrManager, HdrTarget},
            master::MasterControl,
            present::Scanout,
            properties::WarnOnce,
        },
        surface::FrameSurface,
        utils::errorfmt::ErrorFmt,
        video::drm::{
            DRM_MODE_ATOMIC_ALLOW_MODESET, DRM_MODE_COLORIMETRY_BT2020_RGB, Drm, DrmBlob,
            DrmError, DrmFb, DrmModeInfo, DrmProperty,
        },
    },
    std::rc::{Rc, Weak},
    thiserror::Error,
};

#[derive(Debug, Error)]
pub enum RendererError {
    #[error("Could not open the display device")]
    DeviceOpen(#[source] DrmError),
    #[error("Could not enumerate the display resources")]
    Discovery(#[source] DrmError),
    #[error("There is no connected display of type {0:?}")]
    NoMatchingDisplay(MonitorType),
    #[error("The operation requires DRM master")]
    MasterAcquisitionDegraded,
    #[error("Could not attach HDR metadata")]
    HdrAttach(#[source] DrmError),
    #[error("The display does not have the property {0}")]
    PropertyNotFound(&'static str),
    #[error("Could not export the frame")]
    Export(#[source] ExportError),
    #[error("Could not present the frame")]
    Present(#[source] DrmError),
    #[error("The configuration is invalid")]
    Config(#[from] ConfigError),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum ColorspaceState {
    Default,
    Bt2020,
    Unsupported,
}

/// Presents frames on a single connector through atomic KMS.
pub struct Renderer {
    kms: Rc<dyn Kms>,
    exporter: Rc<dyn Exporter>,
    config: RendererConfig,
    pipeline: Pipeline,
    props: PipelineProperties,
    warn: WarnOnce,
    master: MasterControl,
    hdr: HdrManager,
    colorspace: ColorspaceState,
    mode: DrmModeInfo,
    mode_blob: Option<PropBlob>,
    needs_modeset: bool,
    scanout: Option<Scanout>,
    current: Weak<FrameSurface>,
}

impl Renderer {
    /// Opens the configured device, `/dev/dri/card0` by default.
    pub fn open(config: RendererConfig, exporter: Rc<dyn Exporter>) -> Result<Self, RendererError> {
        let drm = Drm::open(config.device.as_deref()).map_err(RendererError::DeviceOpen)?;
        Self::new(Rc::new(drm), exporter, config)
    }

    pub fn new(
        kms: Rc<dyn Kms>,
        exporter: Rc<dyn Exporter>,
        config: RendererConfig,
    ) -> Result<Self, RendererError> {
        let format = config.preferred_format()?;
        let pipeline = discover(&*kms, config.monitor, format)?;
        let props = PipelineProperties::get(&*kms, &pipeline).map_err(RendererError::Discovery)?;
        let mut master = MasterControl::new(&kms);
        master.set_master(config.master_retries, config.master_retry_interval());
        // without master, planes must fit the mode the CRTC is already running
        let mode = match (&pipeline.saved_crtc.mode, master.is_master()) {
            (Some(mode), false) => mode.clone(),
            _ => pipeline.mode.clone(),
        };
        Ok(Self {
            hdr: HdrManager::new(&kms),
            mode,
            kms,
            exporter,
            config,
            pipeline,
            props,
            warn: Default::default(),
            master,
            colorspace: ColorspaceState::Default,
            mode_blob: None,
            needs_modeset: true,
            scanout: None,
            current: Weak::new(),
        })
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn properties(&self) -> &PipelineProperties {
        &self.props
    }

    pub fn master_state(&self) -> MasterState {
        self.master.state()
    }

    pub fn hdr_state(&self) -> HdrState {
        self.hdr.state()
    }

    /// The HDR metadata and mode blobs while HDR is enabled.
    pub fn hdr_blobs(&self) -> Option<(DrmBlob, DrmBlob)> {
        self.hdr.blob_ids()
    }

    pub fn mode(&self) -> &DrmModeInfo {
        &self.mode
    }

    /// The most recently presented surface, if it is still alive.
    pub fn current_surface(&self) -> Option<Rc<FrameSurface>> {
        self.current.upgrade()
    }

    pub fn displayed_fb(&self) -> Option<DrmFb> {
        self.scanout.as_ref().map(|s| s.fb())
    }

    /// Switches the CRTC to `mode` with the next frame.
    pub fn set_mode(&mut self, mode: DrmModeInfo) -> Result<(), RendererError> {
        if !self.master.is_master() {
            return Err(RendererError::MasterAcquisitionDegraded);
        }
        log::info!("Switching {} to {}", self.pipeline.connector_name, mode);
        self.mode = mode;
        self.needs_modeset = true;
        Ok(())
    }

    fn warn_missing(&self, name: &'static str) {
        if self.warn.first(name) {
            log::warn!(
                "{} does not support {}, the feature is disabled",
                self.pipeline.connector_name,
                name
            );
        }
    }

    fn property(
        &self,
        table: &PropertyTable,
        name: &'static str,
    ) -> Result<DrmProperty, RendererError> {
        let res = table.id(name);
        if res.is_err() {
            self.warn_missing(name);
        }
        res
    }

    /// Attaches the HDR metadata of `surface` to the connector, or detaches it.
    ///
    /// Sending the same metadata twice does nothing.
    pub fn send_hdr(&mut self, surface: &FrameSurface, enable: bool) -> Result<(), RendererError> {
        let color = match surface.hdr() {
            Some(c) if enable => c,
            _ => return self.disable_hdr(),
        };
        if !self.master.is_master() {
            return Err(RendererError::MasterAcquisitionDegraded);
        }
        let hdr_property = self.property(&self.props.connector, HDR_OUTPUT_METADATA)?;
        let mode_property = self.property(&self.props.crtc, "MODE_ID")?;
        let target = HdrTarget {
            connector: self.pipeline.connector,
            hdr_property,
            crtc: self.pipeline.crtc,
            mode_property,
            mode: &self.mode,
        };
        let changed = self.hdr.enable(&target, build_metadata(color))?;
        if changed {
            // the HDR pair now owns the mode blob the CRTC uses
            self.mode_blob = None;
        }
        if changed && self.config.colorspace {
            match self.send_bt2020_colorspace() {
                Ok(()) | Err(RendererError::PropertyNotFound(_)) => {}
                Err(e) => log::error!("Could not signal BT.2020 colorimetry: {}", ErrorFmt(e)),
            }
        }
        Ok(())
    }

    pub fn disable_hdr(&mut self) -> Result<(), RendererError> {
        if self.hdr.state() == HdrState::Disabled {
            return Ok(());
        }
        let hdr_property = self.props.connector.id(HDR_OUTPUT_METADATA)?;
        self.hdr.disable(self.pipeline.connector, hdr_property)
    }

    /// Sets the connector's colorimetry to BT.2020 RGB.
    ///
    /// Connectors without a `Colorspace` property are never asked again.
    pub fn send_bt2020_colorspace(&mut self) -> Result<(), RendererError> {
        match self.colorspace {
            ColorspaceState::Unsupported => return Err(RendererError::PropertyNotFound(COLORSPACE)),
            ColorspaceState::Bt2020 => return Ok(()),
            ColorspaceState::Default => {}
        }
        if !self.master.is_master() {
            return Err(RendererError::MasterAcquisitionDegraded);
        }
        let property = match self.property(&self.props.connector, COLORSPACE) {
            Ok(p) => p,
            Err(e) => {
                self.colorspace = ColorspaceState::Unsupported;
                return Err(e);
            }
        };
        let value = self
            .props
            .connector
            .definition(COLORSPACE)
            .and_then(|d| d.ty.enum_value("BT2020_RGB"))
            .unwrap_or(DRM_MODE_COLORIMETRY_BT2020_RGB);
        let mut change = Change::new(&self.kms);
        change.change_object(self.pipeline.connector, |c| c.change(property, value));
        change
            .commit(DRM_MODE_ATOMIC_ALLOW_MODESET)
            .map_err(RendererError::HdrAttach)?;
        self.colorspace = ColorspaceState::Bt2020;
        Ok(())
    }

    fn disable_plane(&self) -> Result<(), RendererError> {
        let fb_id = self.props.plane.id("FB_ID")?;
        let crtc_id = self.props.plane.id("CRTC_ID")?;
        let mut change = Change::new(&self.kms);
        change.change_object(self.pipeline.plane, |c| {
            c.change(fb_id, 0);
            c.change(crtc_id, 0);
        });
        change.commit(0).map_err(RendererError::Present)
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Err(e) = self.disable_hdr() {
            log::error!("Could not disable HDR: {}", ErrorFmt(e));
        }
        if self.scanout.is_some() {
            let restored = self.master.is_master()
                && self
                    .master
                    .restore(&self.pipeline.saved_crtc, self.pipeline.connector);
            if !restored && let Err(e) = self.disable_plane() {
                log::error!("Could not disable the plane: {}", ErrorFmt(e));
            }
        }
        if let Some(scanout) = self.scanout.take() {
            scanout.release(&*self.exporter);
        }
        self.mode_blob = None;
        self.master.drop_master();
    }
}
