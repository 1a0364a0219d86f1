//! Per-tick sampling and differential state.
//!
//! The sampler reads every metric source once per tick and turns the
//! cumulative kernel counters into deltas against the previous tick's
//! baselines. Failures fall into two tiers: a core source (`/proc` files)
//! failing aborts the whole tick with [`CollectError`], while a
//! temperature or GPU source failing only zeroes its own fields.

use std::io;
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::collector::gpu::GpuTelemetry;
use crate::collector::parser::{self, ParseError};
use crate::collector::traits::FileSystem;
use crate::model::{MetricSnapshot, ResolvedSources};

/// Bytes per kernel I/O sector. `/proc/diskstats` counts sectors in fixed
/// 512-byte units regardless of the device's physical sector size.
pub const SECTOR_SIZE_BYTES: i64 = 512;

/// Error during a collection tick.
#[derive(Debug)]
pub enum CollectError {
    /// Failed to read a core source file.
    Io(io::Error),
    /// A core source file had unexpected content.
    Parse(ParseError),
}

impl std::fmt::Display for CollectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectError::Io(err) => write!(f, "I/O error: {}", err),
            CollectError::Parse(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for CollectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CollectError::Io(err) => Some(err),
            CollectError::Parse(err) => Some(err),
        }
    }
}

impl From<io::Error> for CollectError {
    fn from(err: io::Error) -> Self {
        CollectError::Io(err)
    }
}

impl From<ParseError> for CollectError {
    fn from(err: ParseError) -> Self {
        CollectError::Parse(err)
    }
}

/// Previous-tick network byte counters.
#[derive(Debug, Clone, Copy)]
struct NetBaseline {
    rx_bytes: u64,
    tx_bytes: u64,
}

/// Previous-tick block device sector counters.
#[derive(Debug, Clone, Copy)]
struct DiskBaseline {
    read_sectors: u64,
    written_sectors: u64,
}

/// Differential state carried between ticks.
///
/// `None` baselines mean "no previous tick": the next sample reports zero
/// deltas and seeds the baselines. A failed tick resets the state so the
/// tick after it behaves like a first tick again.
#[derive(Debug, Default)]
pub struct SampleState {
    net: Option<NetBaseline>,
    disk: Option<DiskBaseline>,
}

impl SampleState {
    /// Creates state with no baselines, as for the first tick.
    pub fn new() -> Self {
        Self::default()
    }

    /// Discards all baselines.
    pub fn reset(&mut self) {
        self.net = None;
        self.disk = None;
    }
}

/// Reads all metric sources for one tick.
pub struct Sampler<F> {
    fs: F,
    proc_path: PathBuf,
    sys_path: PathBuf,
    net_interface: String,
}

impl<F: FileSystem> Sampler<F> {
    pub fn new(
        fs: F,
        proc_path: impl Into<PathBuf>,
        sys_path: impl Into<PathBuf>,
        net_interface: impl Into<String>,
    ) -> Self {
        Self {
            fs,
            proc_path: proc_path.into(),
            sys_path: sys_path.into(),
            net_interface: net_interface.into(),
        }
    }

    /// Samples every source once and advances the differential baselines.
    ///
    /// On error the state is left exactly as it was; the caller decides
    /// whether to reset it.
    pub fn sample(
        &self,
        sources: &ResolvedSources,
        gpu: &dyn GpuTelemetry,
        state: &mut SampleState,
    ) -> Result<MetricSnapshot, CollectError> {
        let mut snapshot = MetricSnapshot::default();

        let loadavg = self.fs.read_to_string(&self.proc_path.join("loadavg"))?;
        snapshot.avg_cpu_load = parser::parse_loadavg_1min(&loadavg)?;
        debug!(load = snapshot.avg_cpu_load, "read load average");

        let meminfo = self.fs.read_to_string(&self.proc_path.join("meminfo"))?;
        let mem = parser::parse_meminfo(&meminfo)?;
        snapshot.memory_used_kib = mem.total_kib.saturating_sub(mem.available_kib);
        debug!(
            total_kib = mem.total_kib,
            available_kib = mem.available_kib,
            "read memory totals"
        );

        let uptime = self.fs.read_to_string(&self.proc_path.join("uptime"))?;
        snapshot.uptime_secs = parser::parse_uptime_secs(&uptime)?;
        debug!(uptime_secs = snapshot.uptime_secs, "read uptime");

        let net_dev = self.fs.read_to_string(&self.proc_path.join("net/dev"))?;
        let counters = parser::parse_net_dev_counters(&net_dev, &self.net_interface)?;
        debug!(
            interface = %self.net_interface,
            rx_bytes = counters.rx_bytes,
            tx_bytes = counters.tx_bytes,
            "read network counters"
        );

        let diskstats = self.fs.read_to_string(&self.proc_path.join("diskstats"))?;
        let sectors = parser::parse_diskstats_sectors(&diskstats, &sources.io_device)?;
        debug!(
            device = %sources.io_device,
            read_sectors = sectors.read,
            written_sectors = sectors.written,
            "read disk counters"
        );

        // All fallible core reads are done; from here the tick cannot fail,
        // so the baselines can be advanced.
        if let Some(baseline) = state.net {
            snapshot.net_rx_rate = counters.rx_bytes as i64 - baseline.rx_bytes as i64;
            snapshot.net_tx_rate = counters.tx_bytes as i64 - baseline.tx_bytes as i64;
        }
        state.net = Some(NetBaseline {
            rx_bytes: counters.rx_bytes,
            tx_bytes: counters.tx_bytes,
        });

        if let Some(baseline) = state.disk {
            snapshot.io_read_rate =
                (sectors.read as i64 - baseline.read_sectors as i64) * SECTOR_SIZE_BYTES;
            snapshot.io_write_rate =
                (sectors.written as i64 - baseline.written_sectors as i64) * SECTOR_SIZE_BYTES;
        }
        state.disk = Some(DiskBaseline {
            read_sectors: sectors.read,
            written_sectors: sectors.written,
        });

        snapshot.cpu_temp_millideg = sources
            .cpu_thermal_zone
            .map(|zone| {
                self.read_temperature(
                    &format!("class/thermal/thermal_zone{}/temp", zone),
                    "CPU thermal zone",
                )
            })
            .unwrap_or(0);

        snapshot.nvme_temp_millideg = sources
            .nvme_sensor
            .map(|(device, hwmon)| {
                self.read_temperature(
                    &format!("class/nvme/nvme{}/hwmon{}/temp1_input", device, hwmon),
                    "NVMe sensor",
                )
            })
            .unwrap_or(0);

        snapshot.set_gpu(gpu.read(sources));

        Ok(snapshot)
    }

    /// Reads one sysfs temperature file. A sensor that was present at
    /// startup but fails now degrades to zero for this tick only.
    fn read_temperature(&self, relative: &str, what: &str) -> i64 {
        let path = self.sys_path.join(relative);
        let content = match self.fs.read_to_string(&path) {
            Ok(content) => content,
            Err(err) => {
                warn!(path = %path.display(), %err, "failed to read {}", what);
                return 0;
            }
        };
        match parser::parse_sysfs_int(&content) {
            Ok(value) => {
                debug!(millidegrees = value, "read {}", what);
                value
            }
            Err(err) => {
                warn!(path = %path.display(), %err, "invalid {} reading", what);
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::gpu::NoGpu;
    use crate::collector::mock::MockFs;

    fn base_fs() -> MockFs {
        let fs = MockFs::new();
        fs.add_file("/proc/loadavg", "0.42 0.38 0.30 1/512 1234\n");
        fs.add_file(
            "/proc/meminfo",
            "MemTotal:       16000000 kB\nMemAvailable:    9000000 kB\n",
        );
        fs.add_file("/proc/uptime", "12345.67 98765.43\n");
        fs.add_file(
            "/proc/net/dev",
            "  eth0: 500 0 0 0 0 0 0 0 200 0 0 0 0 0 0 0\n",
        );
        fs.add_file(
            "/proc/diskstats",
            "   8       0 sda 10 0 1000 0 20 0 2000 0 0 0 0 0 0 0 0\n",
        );
        fs
    }

    fn sources() -> ResolvedSources {
        ResolvedSources {
            io_device: "sda".to_string(),
            ..Default::default()
        }
    }

    fn sampler(fs: &MockFs) -> Sampler<MockFs> {
        Sampler::new(fs.clone(), "/proc", "/sys", "eth0")
    }

    #[test]
    fn first_tick_reports_zero_deltas() {
        let fs = base_fs();
        let mut state = SampleState::new();

        let snapshot = sampler(&fs)
            .sample(&sources(), &NoGpu, &mut state)
            .unwrap();

        assert!((snapshot.avg_cpu_load - 0.42).abs() < 1e-9);
        assert_eq!(snapshot.memory_used_kib, 7000000);
        assert_eq!(snapshot.uptime_secs, 12345);
        assert_eq!(snapshot.net_rx_rate, 0);
        assert_eq!(snapshot.net_tx_rate, 0);
        assert_eq!(snapshot.io_read_rate, 0);
        assert_eq!(snapshot.io_write_rate, 0);
    }

    #[test]
    fn second_tick_reports_counter_deltas() {
        let fs = base_fs();
        let mut state = SampleState::new();
        let sampler = sampler(&fs);

        sampler.sample(&sources(), &NoGpu, &mut state).unwrap();

        fs.add_file(
            "/proc/net/dev",
            "  eth0: 1500 0 0 0 0 0 0 0 700 0 0 0 0 0 0 0\n",
        );
        fs.add_file(
            "/proc/diskstats",
            "   8       0 sda 10 0 1100 0 20 0 2050 0 0 0 0 0 0 0 0\n",
        );
        let snapshot = sampler.sample(&sources(), &NoGpu, &mut state).unwrap();

        assert_eq!(snapshot.net_rx_rate, 1000);
        assert_eq!(snapshot.net_tx_rate, 500);
        assert_eq!(snapshot.io_read_rate, 100 * 512);
        assert_eq!(snapshot.io_write_rate, 50 * 512);
    }

    #[test]
    fn counter_wrap_produces_negative_delta() {
        let fs = base_fs();
        let mut state = SampleState::new();
        let sampler = sampler(&fs);

        sampler.sample(&sources(), &NoGpu, &mut state).unwrap();

        fs.add_file(
            "/proc/net/dev",
            "  eth0: 100 0 0 0 0 0 0 0 50 0 0 0 0 0 0 0\n",
        );
        let snapshot = sampler.sample(&sources(), &NoGpu, &mut state).unwrap();

        assert_eq!(snapshot.net_rx_rate, -400);
        assert_eq!(snapshot.net_tx_rate, -150);
    }

    #[test]
    fn failed_core_read_leaves_state_untouched() {
        let fs = base_fs();
        let mut state = SampleState::new();
        let sampler = sampler(&fs);

        sampler.sample(&sources(), &NoGpu, &mut state).unwrap();
        assert!(state.net.is_some());

        fs.remove_file("/proc/meminfo");
        assert!(sampler.sample(&sources(), &NoGpu, &mut state).is_err());
        assert!(state.net.is_some());
        assert!(state.disk.is_some());
    }

    #[test]
    fn missing_interface_is_tick_fatal() {
        let fs = base_fs();
        let mut state = SampleState::new();

        let sampler = Sampler::new(fs.clone(), "/proc", "/sys", "wlan0");
        let err = sampler.sample(&sources(), &NoGpu, &mut state).unwrap_err();
        assert!(matches!(err, CollectError::Parse(_)));
        assert!(state.net.is_none());
    }

    #[test]
    fn gpu_utility_failure_zeroes_only_gpu_fields() {
        use crate::collector::gpu;
        use crate::collector::mock::MockRunner;
        use crate::config::GpuKind;
        use std::path::PathBuf;

        let fs = base_fs();
        let runner = MockRunner::new();
        runner.fail("nvidia-smi", "driver not loaded");
        let gpu = gpu::for_kind(
            GpuKind::Nvidia,
            fs.clone(),
            runner,
            PathBuf::from("/sys"),
        );
        let mut state = SampleState::new();

        let snapshot = sampler(&fs)
            .sample(&sources(), gpu.as_ref(), &mut state)
            .unwrap();

        assert_eq!(snapshot.gpu_usage_pct, 0);
        assert_eq!(snapshot.gpu_mem_used_mib, 0);
        assert_eq!(snapshot.gpu_temp_millideg, 0);
        // The rest of the same snapshot is untouched by the GPU failure.
        assert!((snapshot.avg_cpu_load - 0.42).abs() < 1e-9);
        assert_eq!(snapshot.memory_used_kib, 7000000);
        assert_eq!(snapshot.uptime_secs, 12345);
        assert_eq!(snapshot.net_rx_rate, 0);
        assert_eq!(snapshot.io_read_rate, 0);
        assert!(state.net.is_some());
        assert!(state.disk.is_some());

        // A second tick still differentiates normally while the GPU keeps
        // failing.
        fs.add_file(
            "/proc/net/dev",
            "  eth0: 1500 0 0 0 0 0 0 0 700 0 0 0 0 0 0 0\n",
        );
        let snapshot = sampler(&fs)
            .sample(&sources(), gpu.as_ref(), &mut state)
            .unwrap();
        assert_eq!(snapshot.net_rx_rate, 1000);
        assert_eq!(snapshot.net_tx_rate, 500);
        assert_eq!(snapshot.gpu_usage_pct, 0);
        assert_eq!(snapshot.gpu_temp_millideg, 0);
    }

    #[test]
    fn undetected_sensors_report_zero() {
        let fs = base_fs();
        let mut state = SampleState::new();

        let snapshot = sampler(&fs)
            .sample(&sources(), &NoGpu, &mut state)
            .unwrap();
        assert_eq!(snapshot.cpu_temp_millideg, 0);
        assert_eq!(snapshot.nvme_temp_millideg, 0);
    }

    #[test]
    fn detected_sensors_are_read_each_tick() {
        let fs = base_fs();
        fs.add_file("/sys/class/thermal/thermal_zone1/temp", "45000\n");
        fs.add_file("/sys/class/nvme/nvme0/hwmon2/temp1_input", "38000\n");

        let sources = ResolvedSources {
            cpu_thermal_zone: Some(1),
            nvme_sensor: Some((0, 2)),
            io_device: "sda".to_string(),
            ..Default::default()
        };
        let mut state = SampleState::new();

        let snapshot = sampler(&fs).sample(&sources, &NoGpu, &mut state).unwrap();
        assert_eq!(snapshot.cpu_temp_millideg, 45000);
        assert_eq!(snapshot.nvme_temp_millideg, 38000);
    }

    #[test]
    fn vanished_sensor_degrades_to_zero_without_failing_tick() {
        let fs = base_fs();
        let sources = ResolvedSources {
            cpu_thermal_zone: Some(0),
            io_device: "sda".to_string(),
            ..Default::default()
        };
        let mut state = SampleState::new();

        // thermal_zone0/temp never added; read fails but the tick succeeds.
        let snapshot = sampler(&fs).sample(&sources, &NoGpu, &mut state).unwrap();
        assert_eq!(snapshot.cpu_temp_millideg, 0);
        assert!((snapshot.avg_cpu_load - 0.42).abs() < 1e-9);
    }
}
