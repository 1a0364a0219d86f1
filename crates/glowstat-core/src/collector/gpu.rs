//! Per-vendor GPU telemetry.
//!
//! Each supported vendor gets one [`GpuTelemetry`] implementation; the
//! daemon selects one at startup from the configured [`GpuKind`] and keeps
//! it behind a trait object for the process lifetime. GPU queries never
//! fail a tick: any error is logged and reported as all-zero readings, so
//! only the GPU metrics degrade.

use std::path::PathBuf;

use tracing::warn;

use crate::collector::parser;
use crate::collector::traits::{CommandRunner, FileSystem};
use crate::config::GpuKind;
use crate::model::{GpuReadings, ResolvedSources};

const BYTES_PER_MIB: u64 = 1024 * 1024;

/// One vendor's way of reading GPU utilization, memory and temperature.
pub trait GpuTelemetry: Send + Sync {
    /// Reads the current GPU telemetry. Returns all zeroes on any failure.
    fn read(&self, sources: &ResolvedSources) -> GpuReadings;
}

/// Builds the telemetry reader for the configured GPU vendor.
pub fn for_kind<F, R>(kind: GpuKind, fs: F, runner: R, sys_path: PathBuf) -> Box<dyn GpuTelemetry>
where
    F: FileSystem + Clone + 'static,
    R: CommandRunner + Clone + 'static,
{
    match kind {
        GpuKind::None => Box::new(NoGpu),
        GpuKind::Nvidia => Box::new(NvidiaSmi { runner }),
        GpuKind::Amd => Box::new(AmdSysfs { fs, sys_path }),
        GpuKind::RaspberryPi => Box::new(PiVcgencmd { runner }),
    }
}

/// No GPU configured; every tick reports zeroes.
pub struct NoGpu;

impl GpuTelemetry for NoGpu {
    fn read(&self, _sources: &ResolvedSources) -> GpuReadings {
        GpuReadings::default()
    }
}

/// Discrete NVIDIA GPU queried through `nvidia-smi`.
pub struct NvidiaSmi<R> {
    runner: R,
}

impl<R: CommandRunner> GpuTelemetry for NvidiaSmi<R> {
    fn read(&self, _sources: &ResolvedSources) -> GpuReadings {
        let stdout = match self.runner.run(
            "nvidia-smi",
            &[
                "--query-gpu=utilization.gpu,memory.used,temperature.gpu",
                "--format=csv,noheader,nounits",
            ],
        ) {
            Ok(stdout) => stdout,
            Err(err) => {
                warn!(%err, "nvidia-smi query failed");
                return GpuReadings::default();
            }
        };

        match parser::parse_nvidia_smi(&stdout) {
            Ok(readings) => readings,
            Err(err) => {
                warn!(%err, "failed to parse nvidia-smi output");
                GpuReadings::default()
            }
        }
    }
}

/// AMD GPU with the amdgpu driver, read entirely through sysfs.
///
/// Utilization comes from `device/gpu_busy_percent`, memory from
/// `device/mem_info_vram_used` (bytes) and temperature from the hwmon
/// `temp1_input` discovered at startup.
pub struct AmdSysfs<F> {
    fs: F,
    sys_path: PathBuf,
}

impl<F: FileSystem> AmdSysfs<F> {
    fn read_value(&self, path: PathBuf) -> Option<i64> {
        let content = match self.fs.read_to_string(&path) {
            Ok(content) => content,
            Err(err) => {
                warn!(path = %path.display(), %err, "failed to read GPU sysfs value");
                return None;
            }
        };
        match parser::parse_sysfs_int(&content) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(path = %path.display(), %err, "invalid GPU sysfs value");
                None
            }
        }
    }
}

impl<F: FileSystem> GpuTelemetry for AmdSysfs<F> {
    fn read(&self, sources: &ResolvedSources) -> GpuReadings {
        let Some((card, hwmon)) = sources.gpu_sensor else {
            return GpuReadings::default();
        };

        let device = self.sys_path.join(format!("class/drm/card{}/device", card));
        let usage_pct = self
            .read_value(device.join("gpu_busy_percent"))
            .unwrap_or(0)
            .max(0) as u64;
        let mem_used_mib = self
            .read_value(device.join("mem_info_vram_used"))
            .unwrap_or(0)
            .max(0) as u64
            / BYTES_PER_MIB;
        let temp_millideg = self
            .read_value(device.join(format!("hwmon/hwmon{}/temp1_input", hwmon)))
            .unwrap_or(0);

        GpuReadings {
            usage_pct,
            mem_used_mib,
            temp_millideg,
        }
    }
}

/// Raspberry Pi SoC GPU; only the temperature is available, through
/// `vcgencmd measure_temp`.
pub struct PiVcgencmd<R> {
    runner: R,
}

impl<R: CommandRunner> GpuTelemetry for PiVcgencmd<R> {
    fn read(&self, _sources: &ResolvedSources) -> GpuReadings {
        let stdout = match self.runner.run("vcgencmd", &["measure_temp"]) {
            Ok(stdout) => stdout,
            Err(err) => {
                warn!(%err, "vcgencmd query failed");
                return GpuReadings::default();
            }
        };

        match parser::parse_vcgencmd_temp(&stdout) {
            Ok(temp_millideg) => GpuReadings {
                usage_pct: 0,
                mem_used_mib: 0,
                temp_millideg,
            },
            Err(err) => {
                warn!(%err, "failed to parse vcgencmd output");
                GpuReadings::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::{MockFs, MockRunner};

    fn sources_with_gpu() -> ResolvedSources {
        ResolvedSources {
            gpu_sensor: Some((0, 1)),
            io_device: "sda".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn no_gpu_reports_zeroes() {
        let readings = NoGpu.read(&sources_with_gpu());
        assert_eq!(readings, GpuReadings::default());
    }

    #[test]
    fn nvidia_readings_from_smi_output() {
        let runner = MockRunner::new();
        runner.respond("nvidia-smi", "35, 1024, 56\n");

        let readings = NvidiaSmi { runner }.read(&ResolvedSources::default());
        assert_eq!(readings.usage_pct, 35);
        assert_eq!(readings.mem_used_mib, 1024);
        assert_eq!(readings.temp_millideg, 56000);
    }

    #[test]
    fn nvidia_failure_degrades_to_zeroes() {
        let runner = MockRunner::new();
        runner.fail("nvidia-smi", "driver not loaded");

        let readings = NvidiaSmi { runner }.read(&ResolvedSources::default());
        assert_eq!(readings, GpuReadings::default());
    }

    #[test]
    fn amd_readings_from_sysfs() {
        let fs = MockFs::new();
        fs.add_file("/sys/class/drm/card0/device/gpu_busy_percent", "73\n");
        fs.add_file(
            "/sys/class/drm/card0/device/mem_info_vram_used",
            "2147483648\n",
        );
        fs.add_file(
            "/sys/class/drm/card0/device/hwmon/hwmon1/temp1_input",
            "62000\n",
        );

        let amd = AmdSysfs {
            fs,
            sys_path: PathBuf::from("/sys"),
        };
        let readings = amd.read(&sources_with_gpu());
        assert_eq!(readings.usage_pct, 73);
        assert_eq!(readings.mem_used_mib, 2048);
        assert_eq!(readings.temp_millideg, 62000);
    }

    #[test]
    fn amd_partial_failure_zeroes_only_missing_values() {
        let fs = MockFs::new();
        fs.add_file("/sys/class/drm/card0/device/gpu_busy_percent", "12\n");
        // vram and temperature files missing.

        let amd = AmdSysfs {
            fs,
            sys_path: PathBuf::from("/sys"),
        };
        let readings = amd.read(&sources_with_gpu());
        assert_eq!(readings.usage_pct, 12);
        assert_eq!(readings.mem_used_mib, 0);
        assert_eq!(readings.temp_millideg, 0);
    }

    #[test]
    fn amd_without_discovered_sensor_reports_zeroes() {
        let amd = AmdSysfs {
            fs: MockFs::new(),
            sys_path: PathBuf::from("/sys"),
        };
        let readings = amd.read(&ResolvedSources::default());
        assert_eq!(readings, GpuReadings::default());
    }

    #[test]
    fn pi_temperature_only() {
        let runner = MockRunner::new();
        runner.respond("vcgencmd", "temp=48.3'C\n");

        let readings = PiVcgencmd { runner }.read(&ResolvedSources::default());
        assert_eq!(readings.usage_pct, 0);
        assert_eq!(readings.mem_used_mib, 0);
        assert_eq!(readings.temp_millideg, 48300);
    }

    #[test]
    fn pi_failure_degrades_to_zeroes() {
        let readings = PiVcgencmd {
            runner: MockRunner::new(),
        }
        .read(&ResolvedSources::default());
        assert_eq!(readings, GpuReadings::default());
    }

    #[test]
    fn factory_selects_vendor() {
        let fs = MockFs::new();
        let runner = MockRunner::new();
        runner.respond("vcgencmd", "temp=40.0'C\n");

        let gpu = for_kind(
            GpuKind::RaspberryPi,
            fs.clone(),
            runner.clone(),
            PathBuf::from("/sys"),
        );
        assert_eq!(gpu.read(&ResolvedSources::default()).temp_millideg, 40000);

        let gpu = for_kind(GpuKind::None, fs, runner, PathBuf::from("/sys"));
        assert_eq!(gpu.read(&ResolvedSources::default()), GpuReadings::default());
    }
}
