mod sys;

pub use consts::*;

use {
    crate::{
        kms::Kms,
        utils::{errorfmt::ErrorFmt, oserror::OsError},
        video::{
            INVALID_MODIFIER,
            dmabuf::DmaBuf,
            drm::sys::{
                DRM_CLIENT_CAP_ATOMIC, DRM_CLIENT_CAP_UNIVERSAL_PLANES, DRM_DISPLAY_MODE_LEN,
                DRM_MODE_FB_MODIFIERS, DRM_MODE_OBJECT_BLOB, DRM_MODE_OBJECT_CONNECTOR,
                DRM_MODE_OBJECT_CRTC, DRM_MODE_OBJECT_ENCODER, DRM_MODE_OBJECT_FB,
                DRM_MODE_OBJECT_PLANE, DRM_MODE_OBJECT_PROPERTY, gem_close, mode_addfb2,
                mode_atomic, mode_create_blob, mode_destroy_blob, mode_get_resources,
                mode_getconnector, mode_getcrtc, mode_getencoder, mode_getplane,
                mode_getplaneresources, mode_getproperty, mode_obj_getproperties, mode_rmfb,
                mode_setcrtc, prime_fd_to_handle, set_client_cap,
            },
        },
    },
    bstr::{BString, ByteSlice},
    std::{
        fmt::{Debug, Display, Formatter},
        rc::Rc,
    },
    thiserror::Error,
    uapi::{OwnedFd, Packed, Pod, c},
};
pub use sys::{
    CONNECTOR_STATUS_CONNECTED, CONNECTOR_STATUS_DISCONNECTED, CONNECTOR_STATUS_UNKNOWN,
    DRM_MODE_ATOMIC_ALLOW_MODESET, drm_mode_modeinfo,
};

pub const DEFAULT_DEVICE: &str = "/dev/dri/card0";

#[derive(Debug, Error)]
pub enum DrmError {
    #[error("Could not open {0}")]
    Open(String, #[source] OsError),
    #[error("Could not enable a required client capability")]
    ClientCap(#[source] OsError),
    #[error("Could not perform drm property ioctl")]
    GetProperty(#[source] OsError),
    #[error("Could not perform drm getencoder ioctl")]
    GetEncoder(#[source] OsError),
    #[error("Could not perform drm getresources ioctl")]
    GetResources(#[source] OsError),
    #[error("Could not perform drm getplaneresources ioctl")]
    GetPlaneResources(#[source] OsError),
    #[error("Could not perform drm getplane ioctl")]
    GetPlane(#[source] OsError),
    #[error("Could not perform drm getcrtc ioctl")]
    GetCrtc(#[source] OsError),
    #[error("Could not perform drm setcrtc ioctl")]
    SetCrtc(#[source] OsError),
    #[error("Could not create a blob")]
    CreateBlob(#[source] OsError),
    #[error("Could not destroy a blob")]
    DestroyBlob(#[source] OsError),
    #[error("Could not perform drm getconnector ioctl")]
    GetConnector(#[source] OsError),
    #[error("Could not perform drm properties ioctl")]
    GetProperties(#[source] OsError),
    #[error("Could not perform drm atomic ioctl")]
    Atomic(#[source] OsError),
    #[error("Drm property has an unknown type {0}")]
    UnknownPropertyType(u32),
    #[error("Range property does not have exactly two values")]
    RangeValues,
    #[error("Object property does not have exactly one value")]
    ObjectValues,
    #[error("Could not create a framebuffer")]
    AddFb(#[source] OsError),
    #[error("Could not delete a framebuffer")]
    RmFb(#[source] OsError),
    #[error("Could not convert prime fd to gem handle")]
    GemHandle(#[source] OsError),
    #[error("Could not become DRM master")]
    SetMaster(#[source] OsError),
    #[error("Could not drop DRM master")]
    DropMaster(#[source] OsError),
}

impl DrmError {
    /// The errno carried by this error, if any.
    pub fn os_error(&self) -> Option<OsError> {
        let e = match self {
            DrmError::Open(_, e)
            | DrmError::ClientCap(e)
            | DrmError::GetProperty(e)
            | DrmError::GetEncoder(e)
            | DrmError::GetResources(e)
            | DrmError::GetPlaneResources(e)
            | DrmError::GetPlane(e)
            | DrmError::GetCrtc(e)
            | DrmError::SetCrtc(e)
            | DrmError::CreateBlob(e)
            | DrmError::DestroyBlob(e)
            | DrmError::GetConnector(e)
            | DrmError::GetProperties(e)
            | DrmError::Atomic(e)
            | DrmError::AddFb(e)
            | DrmError::RmFb(e)
            | DrmError::GemHandle(e)
            | DrmError::SetMaster(e)
            | DrmError::DropMaster(e) => e,
            DrmError::UnknownPropertyType(_) | DrmError::RangeValues | DrmError::ObjectValues => {
                return None;
            }
        };
        Some(*e)
    }
}

/// A primary DRM node opened with universal planes and atomic modesetting enabled.
pub struct Drm {
    fd: Rc<OwnedFd>,
    path: String,
}

impl Debug for Drm {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.path, self.fd.raw())
    }
}

impl Drm {
    pub fn open(path: Option<&str>) -> Result<Self, DrmError> {
        let path = path.unwrap_or(DEFAULT_DEVICE).to_string();
        let fd = match uapi::open(path.as_str(), c::O_RDWR | c::O_CLOEXEC, 0) {
            Ok(fd) => Rc::new(fd),
            Err(e) => return Err(DrmError::Open(path, e.into())),
        };
        for cap in [DRM_CLIENT_CAP_UNIVERSAL_PLANES, DRM_CLIENT_CAP_ATOMIC] {
            set_client_cap(fd.raw(), cap, 1).map_err(DrmError::ClientCap)?;
        }
        log::info!("Opened DRM device {}", path);
        Ok(Self { fd, path })
    }

    pub fn fd(&self) -> &Rc<OwnedFd> {
        &self.fd
    }

    pub fn raw(&self) -> c::c_int {
        self.fd.raw()
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

struct GemHandle<'a> {
    drm: &'a Drm,
    handle: u32,
}

impl Drop for GemHandle<'_> {
    fn drop(&mut self) {
        if let Err(e) = gem_close(self.drm.raw(), self.handle) {
            log::error!("Could not close gem handle: {}", ErrorFmt(e));
        }
    }
}

impl Kms for Drm {
    fn get_resources(&self) -> Result<DrmCardResources, DrmError> {
        mode_get_resources(self.raw())
    }

    fn get_connector_info(&self, connector: DrmConnector) -> Result<DrmConnectorInfo, DrmError> {
        mode_getconnector(self.raw(), connector.0)
    }

    fn get_encoder_info(&self, encoder: DrmEncoder) -> Result<DrmEncoderInfo, DrmError> {
        mode_getencoder(self.raw(), encoder.0)
    }

    fn get_crtc_info(&self, crtc: DrmCrtc) -> Result<DrmCrtcInfo, DrmError> {
        mode_getcrtc(self.raw(), crtc)
    }

    fn get_planes(&self) -> Result<Vec<DrmPlane>, DrmError> {
        mode_getplaneresources(self.raw())
    }

    fn get_plane_info(&self, plane: DrmPlane) -> Result<DrmPlaneInfo, DrmError> {
        mode_getplane(self.raw(), plane.0)
    }

    fn get_properties(&self, obj: u32, ty: u32) -> Result<Vec<DrmPropertyValue>, DrmError> {
        mode_obj_getproperties(self.raw(), obj, ty)
    }

    fn get_property(&self, prop: DrmProperty) -> Result<DrmPropertyDefinition, DrmError> {
        mode_getproperty(self.raw(), prop)
    }

    fn create_blob(&self, data: &[u8]) -> Result<DrmBlob, DrmError> {
        mode_create_blob(self.raw(), data).map_err(DrmError::CreateBlob)
    }

    fn destroy_blob(&self, blob: DrmBlob) -> Result<(), DrmError> {
        mode_destroy_blob(self.raw(), blob).map_err(DrmError::DestroyBlob)
    }

    fn atomic(
        &self,
        flags: u32,
        objects: &[u32],
        object_lengths: &[u32],
        props: &[u32],
        values: &[u64],
    ) -> Result<(), DrmError> {
        mode_atomic(self.raw(), flags, objects, object_lengths, props, values)
            .map_err(DrmError::Atomic)
    }

    fn set_crtc(
        &self,
        crtc: DrmCrtc,
        fb: DrmFb,
        x: u32,
        y: u32,
        connectors: &[DrmConnector],
        mode: Option<&DrmModeInfo>,
    ) -> Result<(), DrmError> {
        let mode = mode.map(|m| m.to_raw());
        mode_setcrtc(self.raw(), crtc, fb, x, y, connectors, mode).map_err(DrmError::SetCrtc)
    }

    fn set_master(&self) -> Result<(), DrmError> {
        sys::set_master(self.raw()).map_err(DrmError::SetMaster)
    }

    fn drop_master(&self) -> Result<(), DrmError> {
        sys::drop_master(self.raw()).map_err(DrmError::DropMaster)
    }

    fn add_fb(&self, dma: &DmaBuf) -> Result<DrmFb, DrmError> {
        let mut modifier = 0;
        let mut flags = 0;
        if dma.modifier != INVALID_MODIFIER {
            modifier = dma.modifier;
            flags |= DRM_MODE_FB_MODIFIERS;
        }
        let mut strides = [0; 4];
        let mut offsets = [0; 4];
        let mut modifiers = [0; 4];
        let mut handles = [0; 4];
        let mut gem_handles = Vec::<GemHandle>::new();
        for (idx, plane) in dma.planes.iter().enumerate() {
            strides[idx] = plane.stride;
            offsets[idx] = plane.offset;
            modifiers[idx] = modifier;
            let handle = prime_fd_to_handle(self.raw(), plane.fd.raw())
                .map_err(DrmError::GemHandle)?;
            handles[idx] = handle;
            if gem_handles.iter().all(|h| h.handle != handle) {
                gem_handles.push(GemHandle { drm: self, handle });
            }
        }
        mode_addfb2(
            self.raw(),
            dma.width as _,
            dma.height as _,
            dma.format.drm,
            flags,
            handles,
            strides,
            offsets,
            modifiers,
        )
        .map_err(DrmError::AddFb)
    }

    fn rm_fb(&self, fb: DrmFb) -> Result<(), DrmError> {
        mode_rmfb(self.raw(), fb).map_err(DrmError::RmFb)
    }
}

#[derive(Debug, Clone)]
pub struct DrmPropertyDefinition {
    pub id: DrmProperty,
    pub name: BString,
    pub immutable: bool,
    pub atomic: bool,
    pub ty: DrmPropertyType,
}

#[derive(Debug, Clone)]
pub enum DrmPropertyType {
    Range {
        min: u64,
        max: u64,
    },
    SignedRange {
        min: i64,
        max: i64,
    },
    Object {
        ty: u32,
    },
    Blob,
    Enum {
        values: Vec<DrmPropertyEnumValue>,
        bitmask: bool,
    },
}

impl DrmPropertyType {
    pub fn enum_value(&self, name: &str) -> Option<u64> {
        match self {
            DrmPropertyType::Enum { values, .. } => values
                .iter()
                .find(|v| v.name.as_bytes() == name.as_bytes())
                .map(|v| v.value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DrmPropertyEnumValue {
    pub value: u64,
    pub name: BString,
}

#[derive(Debug, Copy, Clone)]
pub struct DrmPropertyValue {
    pub id: DrmProperty,
    pub value: u64,
}

pub trait DrmObject {
    const TYPE: u32;
    const NONE: Self;
    fn id(&self) -> u32;
    fn is_some(&self) -> bool;
    fn is_none(&self) -> bool;
}

drm_obj!(DrmCrtc, DRM_MODE_OBJECT_CRTC);
drm_obj!(DrmConnector, DRM_MODE_OBJECT_CONNECTOR);
drm_obj!(DrmEncoder, DRM_MODE_OBJECT_ENCODER);
drm_obj!(DrmProperty, DRM_MODE_OBJECT_PROPERTY);
drm_obj!(DrmFb, DRM_MODE_OBJECT_FB);
drm_obj!(DrmBlob, DRM_MODE_OBJECT_BLOB);
drm_obj!(DrmPlane, DRM_MODE_OBJECT_PLANE);

#[derive(Debug, Clone, Default)]
pub struct DrmCardResources {
    pub min_width: u32,
    pub max_width: u32,
    pub min_height: u32,
    pub max_height: u32,
    pub crtcs: Vec<DrmCrtc>,
    pub connectors: Vec<DrmConnector>,
    pub encoders: Vec<DrmEncoder>,
}

#[derive(Debug, Clone)]
pub struct DrmPlaneInfo {
    pub plane_id: DrmPlane,
    pub crtc_id: DrmCrtc,
    pub fb_id: DrmFb,
    pub possible_crtcs: u32,
    pub format_types: Vec<u32>,
}

#[derive(Debug, Clone)]
pub struct DrmEncoderInfo {
    pub encoder_id: DrmEncoder,
    pub crtc_id: DrmCrtc,
    pub possible_crtcs: u32,
}

#[derive(Debug, Clone)]
pub struct DrmCrtcInfo {
    pub crtc_id: DrmCrtc,
    pub fb_id: DrmFb,
    pub x: u32,
    pub y: u32,
    pub mode: Option<DrmModeInfo>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DrmModeInfo {
    pub clock: u32,
    pub hdisplay: u16,
    pub hsync_start: u16,
    pub hsync_end: u16,
    pub htotal: u16,
    pub hskew: u16,
    pub vdisplay: u16,
    pub vsync_start: u16,
    pub vsync_end: u16,
    pub vtotal: u16,
    pub vscan: u16,

    pub vrefresh: u32,

    pub flags: u32,
    pub ty: u32,
    pub name: BString,
}

impl DrmModeInfo {
    pub fn to_raw(&self) -> drm_mode_modeinfo {
        let mut name = [0u8; DRM_DISPLAY_MODE_LEN];
        let len = name.len().min(self.name.len());
        name[..len].copy_from_slice(&self.name.as_bytes()[..len]);
        drm_mode_modeinfo {
            clock: self.clock,
            hdisplay: self.hdisplay,
            hsync_start: self.hsync_start,
            hsync_end: self.hsync_end,
            htotal: self.htotal,
            hskew: self.hskew,
            vdisplay: self.vdisplay,
            vsync_start: self.vsync_start,
            vsync_end: self.vsync_end,
            vtotal: self.vtotal,
            vscan: self.vscan,
            vrefresh: self.vrefresh,
            flags: self.flags,
            ty: self.ty,
            name,
        }
    }

    pub fn refresh_rate_millihz(&self) -> u32 {
        let htotal = self.htotal as u64;
        let vtotal = self.vtotal as u64;
        if htotal == 0 || vtotal == 0 {
            return 0;
        }
        let clock_millihz = self.clock as u64 * 1_000_000;
        (((clock_millihz / htotal) + (vtotal / 2)) / vtotal) as u32
    }
}

impl Display for DrmModeInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mhz = self.refresh_rate_millihz();
        write!(
            f,
            "{}x{}@{}.{:03}",
            self.hdisplay,
            self.vdisplay,
            mhz / 1000,
            mhz % 1000
        )
    }
}

#[derive(Debug, Clone)]
pub struct DrmConnectorInfo {
    pub connector_id: DrmConnector,
    pub encoder_id: DrmEncoder,
    pub encoders: Vec<DrmEncoder>,
    pub modes: Vec<DrmModeInfo>,
    pub connector_type: u32,
    pub connector_type_id: u32,
    pub connection: u32,
    pub mm_width: u32,
    pub mm_height: u32,
}

impl DrmConnectorInfo {
    pub fn ty(&self) -> ConnectorType {
        ConnectorType::from_drm(self.connector_type)
    }

    pub fn status(&self) -> ConnectorStatus {
        ConnectorStatus::from_drm(self.connection)
    }

    /// The kernel-style name of the connector, e.g. `HDMI-A-1`.
    pub fn name(&self) -> String {
        format!("{}-{}", self.ty(), self.connector_type_id)
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub struct hdr_metadata_primary {
    pub x: u16,
    pub y: u16,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub struct hdr_metadata_infoframe {
    pub eotf: u8,
    pub metadata_type: u8,
    pub display_primaries: [hdr_metadata_primary; 3],
    pub white_point: hdr_metadata_primary,
    pub max_display_mastering_luminance: u16,
    pub min_display_mastering_luminance: u16,
    pub max_cll: u16,
    pub max_fall: u16,
}

/// The `HDR_OUTPUT_METADATA` blob payload.
///
/// The kernel wraps the infoframe in a single-member union, which leaves two
/// bytes of tail padding. They are spelled out so that the whole struct is
/// plain old data.
#[repr(C)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub struct hdr_output_metadata {
    pub metadata_type: u32,
    pub hdmi_metadata_type1: hdr_metadata_infoframe,
    _pad: [u8; 2],
}

unsafe impl Pod for hdr_output_metadata {}
unsafe impl Packed for hdr_output_metadata {}

const _: () = assert!(size_of::<hdr_output_metadata>() == 32);

impl hdr_output_metadata {
    pub fn new(infoframe: hdr_metadata_infoframe) -> Self {
        Self {
            metadata_type: HDMI_STATIC_METADATA_TYPE1 as u32,
            hdmi_metadata_type1: infoframe,
            _pad: [0; 2],
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        uapi::as_bytes(self)
    }
}

mod consts {
    pub const HDMI_EOTF_TRADITIONAL_GAMMA_SDR: u8 = 0;
    pub const HDMI_EOTF_SMPTE_ST2084: u8 = 2;
    pub const HDMI_EOTF_BT_2100_HLG: u8 = 3;

    pub const HDMI_STATIC_METADATA_TYPE1: u8 = 0;

    pub const DRM_MODE_COLORIMETRY_BT2020_RGB: u64 = 9;
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConnectorStatus {
    Connected,
    Disconnected,
    Unknown,
}

impl ConnectorStatus {
    pub fn from_drm(v: u32) -> Self {
        match v {
            CONNECTOR_STATUS_CONNECTED => Self::Connected,
            CONNECTOR_STATUS_DISCONNECTED => Self::Disconnected,
            _ => Self::Unknown,
        }
    }

    pub fn to_drm(self) -> u32 {
        match self {
            Self::Connected => CONNECTOR_STATUS_CONNECTED,
            Self::Disconnected => CONNECTOR_STATUS_DISCONNECTED,
            Self::Unknown => CONNECTOR_STATUS_UNKNOWN,
        }
    }
}

impl Display for ConnectorStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

#[expect(non_camel_case_types)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConnectorType {
    Unknown(u32),
    VGA,
    DVII,
    DVID,
    DVIA,
    Composite,
    SVIDEO,
    LVDS,
    Component,
    _9PinDIN,
    DisplayPort,
    HDMIA,
    HDMIB,
    TV,
    eDP,
    VIRTUAL,
    DSI,
    DPI,
    WRITEBACK,
    SPI,
    USB,
}

impl ConnectorType {
    pub fn from_drm(v: u32) -> Self {
        match v {
            sys::DRM_MODE_CONNECTOR_VGA => Self::VGA,
            sys::DRM_MODE_CONNECTOR_DVII => Self::DVII,
            sys::DRM_MODE_CONNECTOR_DVID => Self::DVID,
            sys::DRM_MODE_CONNECTOR_DVIA => Self::DVIA,
            sys::DRM_MODE_CONNECTOR_Composite => Self::Composite,
            sys::DRM_MODE_CONNECTOR_SVIDEO => Self::SVIDEO,
            sys::DRM_MODE_CONNECTOR_LVDS => Self::LVDS,
            sys::DRM_MODE_CONNECTOR_Component => Self::Component,
            sys::DRM_MODE_CONNECTOR_9PinDIN => Self::_9PinDIN,
            sys::DRM_MODE_CONNECTOR_DisplayPort => Self::DisplayPort,
            sys::DRM_MODE_CONNECTOR_HDMIA => Self::HDMIA,
            sys::DRM_MODE_CONNECTOR_HDMIB => Self::HDMIB,
            sys::DRM_MODE_CONNECTOR_TV => Self::TV,
            sys::DRM_MODE_CONNECTOR_eDP => Self::eDP,
            sys::DRM_MODE_CONNECTOR_VIRTUAL => Self::VIRTUAL,
            sys::DRM_MODE_CONNECTOR_DSI => Self::DSI,
            sys::DRM_MODE_CONNECTOR_DPI => Self::DPI,
            sys::DRM_MODE_CONNECTOR_WRITEBACK => Self::WRITEBACK,
            sys::DRM_MODE_CONNECTOR_SPI => Self::SPI,
            sys::DRM_MODE_CONNECTOR_USB => Self::USB,
            _ => Self::Unknown(v),
        }
    }

    pub fn to_drm(self) -> u32 {
        match self {
            Self::Unknown(n) => n,
            Self::VGA => sys::DRM_MODE_CONNECTOR_VGA,
            Self::DVII => sys::DRM_MODE_CONNECTOR_DVII,
            Self::DVID => sys::DRM_MODE_CONNECTOR_DVID,
            Self::DVIA => sys::DRM_MODE_CONNECTOR_DVIA,
            Self::Composite => sys::DRM_MODE_CONNECTOR_Composite,
            Self::SVIDEO => sys::DRM_MODE_CONNECTOR_SVIDEO,
            Self::LVDS => sys::DRM_MODE_CONNECTOR_LVDS,
            Self::Component => sys::DRM_MODE_CONNECTOR_Component,
            Self::_9PinDIN => sys::DRM_MODE_CONNECTOR_9PinDIN,
            Self::DisplayPort => sys::DRM_MODE_CONNECTOR_DisplayPort,
            Self::HDMIA => sys::DRM_MODE_CONNECTOR_HDMIA,
            Self::HDMIB => sys::DRM_MODE_CONNECTOR_HDMIB,
            Self::TV => sys::DRM_MODE_CONNECTOR_TV,
            Self::eDP => sys::DRM_MODE_CONNECTOR_eDP,
            Self::VIRTUAL => sys::DRM_MODE_CONNECTOR_VIRTUAL,
            Self::DSI => sys::DRM_MODE_CONNECTOR_DSI,
            Self::DPI => sys::DRM_MODE_CONNECTOR_DPI,
            Self::WRITEBACK => sys::DRM_MODE_CONNECTOR_WRITEBACK,
            Self::SPI => sys::DRM_MODE_CONNECTOR_SPI,
            Self::USB => sys::DRM_MODE_CONNECTOR_USB,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Unknown(_) => "Unknown",
            Self::VGA => "VGA",
            Self::DVII => "DVI-I",
            Self::DVID => "DVI-D",
            Self::DVIA => "DVI-A",
            Self::Composite => "Composite",
            Self::SVIDEO => "SVIDEO",
            Self::LVDS => "LVDS",
            Self::Component => "Component",
            Self::_9PinDIN => "DIN",
            Self::DisplayPort => "DP",
            Self::HDMIA => "HDMI-A",
            Self::HDMIB => "HDMI-B",
            Self::TV => "TV",
            Self::eDP => "eDP",
            Self::VIRTUAL => "Virtual",
            Self::DSI => "DSI",
            Self::DPI => "DPI",
            Self::WRITEBACK => "Writeback",
            Self::SPI => "SPI",
            Self::USB => "USB",
        }
    }
}

impl Display for ConnectorType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown(n) => write!(f, "Unknown({})", n),
            _ => f.write_str(self.name()),
        }
    }
}
