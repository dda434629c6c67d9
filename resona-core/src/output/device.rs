//! Audio output device enumeration and resolution.

use cpal::traits::{DeviceTrait, HostTrait};
use serde::{Deserialize, Serialize};

use crate::error::{ResonaError, Result};

/// Metadata about an audio output device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Human-readable device name reported by the OS.
    pub name: String,
    /// Whether this is the system default output device.
    pub is_default: bool,
}

/// List all available audio output devices on the system, default first.
///
/// Returns an empty `Vec` if enumeration fails and no default exists.
pub fn list_output_devices() -> Vec<DeviceInfo> {
    let host = cpal::default_host();
    let default_name = host.default_output_device().and_then(|d| d.name().ok());

    match host.output_devices() {
        Ok(devices) => {
            let mut list = devices
                .enumerate()
                .map(|(idx, device)| {
                    let name = device
                        .name()
                        .unwrap_or_else(|_| format!("Output Device {}", idx + 1));
                    let is_default = default_name.as_deref() == Some(name.as_str());
                    DeviceInfo { name, is_default }
                })
                .collect::<Vec<_>>();
            list.sort_by_key(|d| (!d.is_default, d.name.to_ascii_lowercase()));
            list
        }
        Err(e) => {
            tracing::warn!("failed to enumerate output devices: {e}");
            if let Some(default) = host.default_output_device() {
                let name = default
                    .name()
                    .unwrap_or_else(|_| "Default Output Device".to_string());
                vec![DeviceInfo {
                    name,
                    is_default: true,
                }]
            } else {
                vec![]
            }
        }
    }
}

/// Resolve an output device by preferred name, otherwise fall back to the
/// default output device and then the first available one.
pub fn resolve_output_device(
    host: &cpal::Host,
    preferred_name: Option<&str>,
) -> Result<cpal::Device> {
    if let Some(preferred) = preferred_name {
        match host.output_devices() {
            Ok(mut devices) => {
                let found = devices
                    .find(|device| device.name().map(|name| name == preferred).unwrap_or(false));
                if let Some(device) = found {
                    return Ok(device);
                }
                tracing::warn!("preferred output device '{}' not found, falling back", preferred);
            }
            Err(e) => {
                tracing::warn!("failed to list output devices while resolving preference: {e}");
            }
        }
    }

    if let Some(default) = host.default_output_device() {
        return Ok(default);
    }

    let mut devices = host
        .output_devices()
        .map_err(|e| ResonaError::AudioDevice(e.to_string()))?;
    let fallback = devices.next().ok_or(ResonaError::NoOutputDevice)?;
    tracing::warn!("no default output device, falling back to first available output");
    Ok(fallback)
}

#[cfg(test)]
mod tests {
    use super::DeviceInfo;

    #[test]
    fn default_device_sorts_first() {
        let mut list = vec![
            DeviceInfo {
                name: "Aux Jack".into(),
                is_default: false,
            },
            DeviceInfo {
                name: "Speakers".into(),
                is_default: true,
            },
        ];
        list.sort_by_key(|d| (!d.is_default, d.name.to_ascii_lowercase()));
        assert_eq!(list[0].name, "Speakers");
    }

    #[test]
    fn device_info_serializes_field_names() {
        let info = DeviceInfo {
            name: "Speakers".into(),
            is_default: true,
        };
        let json = serde_json::to_value(&info).expect("serialize device info");
        assert_eq!(json["name"], "Speakers");
        assert_eq!(json["is_default"], true);
    }
}
