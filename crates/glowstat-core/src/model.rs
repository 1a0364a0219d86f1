//! Value types produced by source location and sampling.

/// Sensor identifiers resolved once at startup and fixed for the process
/// lifetime. `None` means the sensor was not detected; every subsequent
/// tick reports the reset value for its metric.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedSources {
    /// Index into `/sys/class/thermal/thermal_zone*` for the CPU package
    /// sensor.
    pub cpu_thermal_zone: Option<u32>,
    /// `(device, hwmon)` index pair under `/sys/class/nvme/nvme*` exposing
    /// the composite temperature.
    pub nvme_sensor: Option<(u32, u32)>,
    /// `(card, hwmon)` index pair under `/sys/class/drm/card*` for a GPU
    /// whose driver exposes sensors through sysfs.
    pub gpu_sensor: Option<(u32, u32)>,
    /// Kernel block device name used for I/O accounting, possibly
    /// translated from a hardware serial number.
    pub io_device: String,
}

/// GPU readings for one tick. All zeroes when no GPU is configured or the
/// vendor query failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GpuReadings {
    /// GPU utilization percentage.
    pub usage_pct: u64,
    /// GPU memory in use, MiB.
    pub mem_used_mib: u64,
    /// GPU temperature, millidegrees Celsius.
    pub temp_millideg: i64,
}

/// The complete set of metric values produced by one collection tick.
///
/// Every field defaults to zero; a sensor that is absent or failed this
/// tick simply leaves its field at the reset value, so the exposition sink
/// always sees the same shape.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetricSnapshot {
    /// 1-minute load average.
    pub avg_cpu_load: f64,
    /// Memory in use (MemTotal - MemAvailable), KiB.
    pub memory_used_kib: u64,
    /// System uptime, whole seconds.
    pub uptime_secs: u64,
    /// Bytes received on the configured interface since the previous tick.
    /// Negative if the counter wrapped or the interface was reset.
    pub net_rx_rate: i64,
    /// Bytes transmitted on the configured interface since the previous
    /// tick.
    pub net_tx_rate: i64,
    /// Bytes read from the configured block device since the previous tick.
    pub io_read_rate: i64,
    /// Bytes written to the configured block device since the previous tick.
    pub io_write_rate: i64,
    /// CPU package temperature, millidegrees Celsius.
    pub cpu_temp_millideg: i64,
    /// NVMe composite temperature, millidegrees Celsius.
    pub nvme_temp_millideg: i64,
    /// GPU utilization percentage.
    pub gpu_usage_pct: u64,
    /// GPU memory in use, MiB.
    pub gpu_mem_used_mib: u64,
    /// GPU temperature, millidegrees Celsius.
    pub gpu_temp_millideg: i64,
}

impl MetricSnapshot {
    /// Copies one set of GPU readings into the flat snapshot fields.
    pub fn set_gpu(&mut self, readings: GpuReadings) {
        self.gpu_usage_pct = readings.usage_pct;
        self.gpu_mem_used_mib = readings.mem_used_mib;
        self.gpu_temp_millideg = readings.temp_millideg;
    }
}
