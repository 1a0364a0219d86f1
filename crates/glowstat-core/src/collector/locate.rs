//! One-shot sensor and device discovery.
//!
//! The locator walks the sysfs class trees once at startup and pins down
//! which thermal zone, NVMe hwmon and GPU hwmon to read on every tick.
//! Detection never fails the process: a sensor that cannot be found is
//! recorded as absent and its metric reports the reset value forever.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::collector::parser;
use crate::collector::traits::{CommandRunner, FileSystem};
use crate::config::{CollectorConfig, GpuKind, HostKind};
use crate::model::ResolvedSources;

/// Thermal zone type label for the CPU package sensor on a Raspberry Pi.
const THERMAL_TYPE_PI: &str = "cpu-thermal";
/// Thermal zone type label for the CPU package sensor on generic x86 hosts.
const THERMAL_TYPE_GENERIC: &str = "x86_pkg_temp";
/// Hwmon name label identifying the amdgpu driver.
const AMDGPU_HWMON_NAME: &str = "amdgpu";

/// Discovers sensor locations and translates the configured I/O device.
///
/// Generic over the filesystem and command runner so discovery logic can be
/// tested against in-memory trees.
pub struct SourceLocator<F, R> {
    fs: F,
    runner: R,
    sys_path: PathBuf,
}

impl<F: FileSystem, R: CommandRunner> SourceLocator<F, R> {
    /// Creates a locator rooted at `sys_path` (normally `/sys`).
    pub fn new(fs: F, runner: R, sys_path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            runner,
            sys_path: sys_path.into(),
        }
    }

    /// Runs every probe once and returns the resolved source set.
    pub fn locate(&self, config: &CollectorConfig) -> ResolvedSources {
        let cpu_thermal_zone = self.find_cpu_thermal_zone(config.host);
        let nvme_sensor = self.find_nvme_sensor();
        // Only the sysfs-exposed vendor needs a discovered hwmon pair; the
        // utility-queried vendors carry no sysfs state.
        let gpu_sensor = match config.gpu {
            GpuKind::Amd => self.find_gpu_sensor(),
            _ => None,
        };
        let io_device = self.resolve_io_device(&config.io_device);

        let sources = ResolvedSources {
            cpu_thermal_zone,
            nvme_sensor,
            gpu_sensor,
            io_device,
        };
        info!(
            cpu_thermal_zone = ?sources.cpu_thermal_zone,
            nvme_sensor = ?sources.nvme_sensor,
            gpu_sensor = ?sources.gpu_sensor,
            io_device = %sources.io_device,
            "source discovery complete"
        );
        sources
    }

    /// Scans `/sys/class/thermal/thermal_zone{i}` for ascending `i`,
    /// stopping at the first missing index, and returns the zone whose
    /// `type` matches the CPU package label for this host family.
    fn find_cpu_thermal_zone(&self, host: HostKind) -> Option<u32> {
        let wanted = match host {
            HostKind::RaspberryPi => THERMAL_TYPE_PI,
            HostKind::Generic => THERMAL_TYPE_GENERIC,
        };

        for index in 0.. {
            let zone = self
                .sys_path
                .join(format!("class/thermal/thermal_zone{}", index));
            if !self.fs.exists(&zone) {
                break;
            }
            match self.fs.read_to_string(&zone.join("type")) {
                Ok(label) if label.trim() == wanted => return Some(index),
                Ok(_) => continue,
                Err(err) => {
                    warn!(zone = index, %err, "failed to read thermal zone type");
                    continue;
                }
            }
        }

        warn!(label = wanted, "no CPU thermal zone found");
        None
    }

    /// Scans `/sys/class/nvme/nvme{d}` for ascending `d`, stopping at the
    /// first missing index, and returns the first `(device, hwmon)` pair
    /// whose hwmon directory carries a `temp1_input` file.
    fn find_nvme_sensor(&self) -> Option<(u32, u32)> {
        for device in 0.. {
            let device_dir = self.sys_path.join(format!("class/nvme/nvme{}", device));
            if !self.fs.exists(&device_dir) {
                break;
            }
            if let Some(hwmon) = self.find_hwmon_with_temp(&device_dir) {
                return Some((device, hwmon));
            }
        }

        warn!("no NVMe temperature sensor found");
        None
    }

    /// Scans `/sys/class/drm/card{c}` for ascending `c`, stopping at the
    /// first missing index, and returns the `(card, hwmon)` pair of the
    /// first card whose hwmon name is `amdgpu`.
    fn find_gpu_sensor(&self) -> Option<(u32, u32)> {
        for card in 0.. {
            let card_dir = self.sys_path.join(format!("class/drm/card{}", card));
            if !self.fs.exists(&card_dir) {
                break;
            }

            let hwmon_root = card_dir.join("device/hwmon");
            let Ok(entries) = self.fs.read_dir(&hwmon_root) else {
                continue;
            };
            for entry in entries {
                let Some(hwmon) = hwmon_index(&entry) else {
                    continue;
                };
                match self.fs.read_to_string(&entry.join("name")) {
                    Ok(name) if name.trim() == AMDGPU_HWMON_NAME => {
                        return Some((card, hwmon));
                    }
                    _ => continue,
                }
            }
        }

        None
    }

    /// Finds the `hwmon{h}` child of `device_dir` that carries a
    /// `temp1_input` file.
    fn find_hwmon_with_temp(&self, device_dir: &Path) -> Option<u32> {
        let entries = self.fs.read_dir(device_dir).ok()?;
        for entry in entries {
            let Some(hwmon) = hwmon_index(&entry) else {
                continue;
            };
            if self.fs.exists(&entry.join("temp1_input")) {
                return Some(hwmon);
            }
        }
        None
    }

    /// Translates the configured I/O device to a kernel device name.
    ///
    /// The value is first treated as a hardware serial number and looked up
    /// through `lsblk`; if no device carries that serial, or `lsblk` itself
    /// is unavailable, the value is passed through untouched and assumed to
    /// already be a kernel device name.
    fn resolve_io_device(&self, configured: &str) -> String {
        match self.runner.run("lsblk", &["-J", "-o", "NAME,SERIAL"]) {
            Ok(stdout) => match parser::find_device_by_serial(&stdout, configured) {
                Ok(Some(name)) => {
                    info!(serial = configured, device = %name, "resolved block device by serial");
                    name
                }
                Ok(None) => configured.to_string(),
                Err(err) => {
                    warn!(%err, "failed to parse lsblk output");
                    configured.to_string()
                }
            },
            Err(err) => {
                warn!(%err, "lsblk unavailable, using configured device name as-is");
                configured.to_string()
            }
        }
    }
}

/// Extracts `h` from a path ending in `hwmon{h}`.
fn hwmon_index(path: &Path) -> Option<u32> {
    path.file_name()?
        .to_str()?
        .strip_prefix("hwmon")?
        .parse()
        .ok()
}
