#[cfg(test)]
mod tests;

use {
    crate::{
        format::{Format, NV12, format_by_name},
        monitor::MonitorType,
    },
    serde::{Deserialize, Serialize},
    std::{io, time::Duration},
    thiserror::Error,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not read {0}")]
    Read(String, #[source] io::Error),
    #[error("Could not parse the configuration")]
    Parse(#[source] serde_json::Error),
    #[error("Unknown format {0}")]
    UnknownFormat(String),
}

/// Settings of a [`Renderer`](crate::renderer::Renderer).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RendererConfig {
    /// The DRM node to open. Defaults to `/dev/dri/card0`.
    pub device: Option<String>,
    pub monitor: MonitorType,
    /// The format planes are matched against, by name.
    pub format: String,
    /// How often to try becoming DRM master before falling back to plane-only updates.
    pub master_retries: u32,
    pub master_retry_interval_us: u64,
    /// Whether HDR metadata of frames is forwarded to the display.
    pub hdr: bool,
    /// Whether to signal BT.2020 colorimetry when HDR is enabled.
    pub colorspace: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            device: None,
            monitor: MonitorType::Auto,
            format: NV12.name.to_string(),
            master_retries: 50,
            master_retry_interval_us: 100,
            hdr: true,
            colorspace: true,
        }
    }
}

impl RendererConfig {
    pub fn from_json(s: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(s).map_err(ConfigError::Parse)
    }

    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = std::fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_string(), e))?;
        Self::from_json(&s)
    }

    pub fn preferred_format(&self) -> Result<&'static Format, ConfigError> {
        format_by_name(&self.format).ok_or_else(|| ConfigError::UnknownFormat(self.format.clone()))
    }

    pub fn master_retry_interval(&self) -> Duration {
        Duration::from_micros(self.master_retry_interval_us)
    }
}
