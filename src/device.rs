//! Decode device information.
//!
//! The FFmpeg software backend decodes on the host CPU, which it exposes as
//! a single device with index 0. [`DeviceInfo`] carries the same fields a
//! discrete accelerator would report so callers can print one banner for any
//! backend.

use std::fs;

use crate::error::DecodeError;

/// Number of decode devices the software backend exposes.
const SOFTWARE_DEVICE_COUNT: usize = 1;

/// Identification of a decode device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Device index as selected with `--device`.
    pub device_id: i32,
    /// Marketing name of the device.
    pub device_name: String,
    /// Instruction-set or architecture name.
    pub arch_name: String,
    /// PCI bus number, 0 for integrated devices.
    pub pci_bus_id: u32,
    /// PCI domain number, 0 for integrated devices.
    pub pci_domain_id: u32,
    /// PCI device number, 0 for integrated devices.
    pub pci_device_id: u32,
}

impl DeviceInfo {
    /// Number of devices available to the decoder.
    pub fn device_count() -> usize {
        SOFTWARE_DEVICE_COUNT
    }

    /// Look up device `device_id`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::DeviceNotFound`] for any index other than the
    /// ones reported by [`device_count`](DeviceInfo::device_count).
    pub fn query(device_id: i32) -> Result<Self, DecodeError> {
        let device_count = Self::device_count();
        if !usize::try_from(device_id).is_ok_and(|id| id < device_count) {
            return Err(DecodeError::DeviceNotFound {
                device_id,
                device_count,
            });
        }

        let device_name = host_cpu_name().unwrap_or_else(|| "Generic CPU".to_string());
        log::debug!("Device {device_id}: {device_name} ({})", std::env::consts::ARCH);

        Ok(Self {
            device_id,
            device_name,
            arch_name: std::env::consts::ARCH.to_string(),
            pci_bus_id: 0,
            pci_domain_id: 0,
            pci_device_id: 0,
        })
    }
}

/// CPU model as reported by the OS, when it reports one.
fn host_cpu_name() -> Option<String> {
    let cpuinfo = fs::read_to_string("/proc/cpuinfo").ok()?;
    parse_cpu_model(&cpuinfo)
}

fn parse_cpu_model(cpuinfo: &str) -> Option<String> {
    cpuinfo
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(key, _)| matches!(key.trim(), "model name" | "Model" | "cpu model"))
        .map(|(_, value)| value.trim().to_string())
        .filter(|name| !name.is_empty())
}
