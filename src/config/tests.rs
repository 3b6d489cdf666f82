use crate::{
    config::{ConfigError, RendererConfig},
    format::{NV12, P010},
    monitor::MonitorType,
};

#[test]
fn defaults() {
    let config = RendererConfig::from_json("{}").unwrap();
    assert_eq!(config, RendererConfig::default());
    assert_eq!(config.device, None);
    assert_eq!(config.master_retries, 50);
    assert_eq!(config.master_retry_interval().as_micros(), 100);
    assert_eq!(config.preferred_format().unwrap(), NV12);
}

#[test]
fn overrides() {
    let config = RendererConfig::from_json(
        r#"{
            "device": "/dev/dri/card1",
            "monitor": "hdmi-a",
            "format": "P010",
            "hdr": false
        }"#,
    )
    .unwrap();
    assert_eq!(config.device.as_deref(), Some("/dev/dri/card1"));
    assert_eq!(config.monitor, MonitorType::HdmiA);
    assert_eq!(config.preferred_format().unwrap(), P010);
    assert!(!config.hdr);
    assert!(config.colorspace);
}

#[test]
fn errors() {
    assert!(matches!(
        RendererConfig::from_json(r#"{"monitor": "hologram"}"#),
        Err(ConfigError::Parse(_))
    ));
    assert!(matches!(
        RendererConfig::from_json(r#"{"unknown": 1}"#),
        Err(ConfigError::Parse(_))
    ));
    let config = RendererConfig::from_json(r#"{"format": "rgb332"}"#).unwrap();
    assert!(matches!(
        config.preferred_format(),
        Err(ConfigError::UnknownFormat(_))
    ));
}
