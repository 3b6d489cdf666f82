
use {
    crate::video::drm::ConnectorType,
    clap::ValueEnum,
    serde::{Deserialize, Serialize},
};

/// The kind of display the renderer should drive.
#[derive(ValueEnum, Serialize, Deserialize, Debug, Copy, Clone, Hash, Eq, PartialEq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum MonitorType {
    /// Use the first connected display of any kind.
    #[default]
    Auto,
    Vga,
    DviI,
    DviD,
    DviA,
    Composite,
    SVideo,
    Lvds,
    Component,
    NinePinDin,
    HdmiA,
    HdmiB,
    Edp,
    Tv,
    DisplayPort,
    Virtual,
    Dsi,
}

impl MonitorType {
    pub const ALL: [MonitorType; 17] = [
        MonitorType::Auto,
        MonitorType::Vga,
        MonitorType::DviI,
        MonitorType::DviD,
        MonitorType::DviA,
        MonitorType::Composite,
        MonitorType::SVideo,
        MonitorType::Lvds,
        MonitorType::Component,
        MonitorType::NinePinDin,
        MonitorType::HdmiA,
        MonitorType::HdmiB,
        MonitorType::Edp,
        MonitorType::Tv,
        MonitorType::DisplayPort,
        MonitorType::Virtual,
        MonitorType::Dsi,
    ];

    /// The connector type this monitor type selects, or `None` for any.
    pub fn connector_type(self) -> Option<ConnectorType> {
        let ty = match self {
            MonitorType::Auto => return None,
            MonitorType::Vga => ConnectorType::VGA,
            MonitorType::DviI => ConnectorType::DVII,
            MonitorType::DviD => ConnectorType::DVID,
            MonitorType::DviA => ConnectorType::DVIA,
            MonitorType::Composite => ConnectorType::Composite,
            MonitorType::SVideo => ConnectorType::SVIDEO,
            MonitorType::Lvds => ConnectorType::LVDS,
            MonitorType::Component => ConnectorType::Component,
            MonitorType::NinePinDin => ConnectorType::_9PinDIN,
            MonitorType::HdmiA => ConnectorType::HDMIA,
            MonitorType::HdmiB => ConnectorType::HDMIB,
            MonitorType::Edp => ConnectorType::eDP,
            MonitorType::Tv => ConnectorType::TV,
            MonitorType::DisplayPort => ConnectorType::DisplayPort,
            MonitorType::Virtual => ConnectorType::VIRTUAL,
            MonitorType::Dsi => ConnectorType::DSI,
        };
        Some(ty)
    }

    pub fn matches(self, ty: ConnectorType) -> bool {
        match self.connector_type() {
            None => true,
            Some(t) => t == ty,
        }
    }
}

/// The human readable name of a kernel connector type.
pub fn connector_name(connector_type: u32) -> &'static str {
    ConnectorType::from_drm(connector_type).name()
}
