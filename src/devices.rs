//! Block-device discovery for the interactive flow.

use std::fmt;

const KB: u64 = 1024;
const MB: u64 = KB * 1024;
const GB: u64 = MB * 1024;
const TB: u64 = GB * 1024;

#[derive(Debug, Clone)]
pub struct BlockDevice {
    pub name: String,
    pub device_type: DeviceType,
    pub size: u64,
    pub path: String,
}

impl BlockDevice {
    pub fn size_human(&self) -> String {
        if self.size >= TB {
            format!("{:.2} TB", self.size as f64 / TB as f64)
        } else if self.size >= GB {
            format!("{:.2} GB", self.size as f64 / GB as f64)
        } else if self.size >= MB {
            format!("{:.2} MB", self.size as f64 / MB as f64)
        } else if self.size >= KB {
            format!("{:.2} KB", self.size as f64 / KB as f64)
        } else {
            format!("{} B", self.size)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType {
    Hdd,
    Ssd,
    NVMe,
    Usb,
    Unknown,
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceType::Hdd => write!(f, "HDD"),
            DeviceType::Ssd => write!(f, "SSD"),
            DeviceType::NVMe => write!(f, "NVMe"),
            DeviceType::Usb => write!(f, "USB"),
            DeviceType::Unknown => write!(f, "Unknown"),
        }
    }
}

pub fn discover_block_devices() -> Vec<BlockDevice> {
    #[cfg(target_os = "linux")]
    return discover_linux_devices();

    #[cfg(target_os = "windows")]
    return discover_windows_devices();

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    return Vec::new();
}

pub fn device_selection_options(devices: &[BlockDevice]) -> Vec<String> {
    devices
        .iter()
        .map(|d| {
            format!(
                "{} ({}, {}) - {}",
                d.name,
                d.device_type,
                d.size_human(),
                d.path
            )
        })
        .collect()
}

#[cfg(target_os = "linux")]
fn discover_linux_devices() -> Vec<BlockDevice> {
    use std::fs;
    use std::path::Path;

    let mut devices = Vec::new();

    let sys_block = Path::new("/sys/block");
    if !sys_block.exists() {
        return devices;
    }

    if let Ok(entries) = fs::read_dir(sys_block) {
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();

            if name.starts_with("loop") || name.starts_with("ram") || name.starts_with("dm-") {
                continue;
            }

            if let Some(device) = parse_linux_device(&name) {
                devices.push(device);
            }
        }
    }

    devices.sort_by(|a, b| a.name.cmp(&b.name));
    devices
}

#[cfg(target_os = "linux")]
fn parse_linux_device(name: &str) -> Option<BlockDevice> {
    use std::fs;

    let sys_path = format!("/sys/block/{}", name);

    // /sys size is in 512-byte sectors regardless of the device's own
    // sector size.
    let size = fs::read_to_string(format!("{}/size", sys_path))
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()?
        * 512;

    if size == 0 {
        return None;
    }

    Some(BlockDevice {
        name: name.to_string(),
        device_type: detect_linux_device_type(name, &sys_path),
        size,
        path: format!("/dev/{}", name),
    })
}

#[cfg(target_os = "linux")]
fn detect_linux_device_type(name: &str, sys_path: &str) -> DeviceType {
    use std::fs;

    if name.starts_with("nvme") {
        return DeviceType::NVMe;
    }

    if let Ok(removable) = fs::read_to_string(format!("{}/removable", sys_path)) {
        if removable.trim() == "1" {
            return DeviceType::Usb;
        }
    }

    if let Ok(rotational) = fs::read_to_string(format!("{}/queue/rotational", sys_path)) {
        match rotational.trim() {
            "1" => return DeviceType::Hdd,
            "0" => return DeviceType::Ssd,
            _ => {}
        }
    }

    DeviceType::Unknown
}

#[cfg(target_os = "windows")]
fn discover_windows_devices() -> Vec<BlockDevice> {
    let mut devices = Vec::new();

    for i in 0..16 {
        let path = format!("\\\\.\\PhysicalDrive{}", i);
        if let Some(device) = parse_windows_device(i, &path) {
            devices.push(device);
        }
    }

    devices
}

#[cfg(target_os = "windows")]
fn parse_windows_device(index: usize, path: &str) -> Option<BlockDevice> {
    use std::fs::OpenOptions;

    let file = OpenOptions::new().read(true).open(path).ok()?;
    let size = file.metadata().ok()?.len();

    if size == 0 {
        return None;
    }

    Some(BlockDevice {
        name: format!("PhysicalDrive{}", index),
        device_type: DeviceType::Unknown,
        size,
        path: path.to_string(),
    })
}
