//! Prometheus gauge set and snapshot-to-gauge mapping.

use glowstat_core::MetricSnapshot;
use prometheus::{Gauge, IntGauge, Registry};

/// All exported gauges, registered once at startup.
///
/// Rates are normalized to per-second here, at the exposition boundary;
/// the collector itself only knows per-tick deltas. Temperatures are
/// exported in degrees Celsius, converted from the sysfs millidegree
/// convention.
pub struct Gauges {
    avg_cpu_usage: Gauge,
    memory_load: IntGauge,
    uptime: IntGauge,
    net_rec_rate: Gauge,
    net_trans_rate: Gauge,
    io_read_rate: Gauge,
    io_write_rate: Gauge,
    cpu_package_temp: Gauge,
    nvme_temp: Gauge,
    gpu_usage: IntGauge,
    gpu_mem_usage: IntGauge,
    gpu_temp: Gauge,
}

impl Gauges {
    /// Creates the gauge set and registers every gauge with `registry`.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let gauges = Self {
            avg_cpu_usage: Gauge::new(
                "glowstat_avg_cpu_usage",
                "Average CPU load over the last minute",
            )?,
            memory_load: IntGauge::new(
                "glowstat_memory_load",
                "RAM memory in use (MemTotal - MemAvailable), KiB",
            )?,
            uptime: IntGauge::new("glowstat_uptime", "System uptime in seconds")?,
            net_rec_rate: Gauge::new(
                "glowstat_net_rec_rate",
                "Bytes per second received on the monitored network interface",
            )?,
            net_trans_rate: Gauge::new(
                "glowstat_net_trans_rate",
                "Bytes per second transmitted on the monitored network interface",
            )?,
            io_read_rate: Gauge::new(
                "glowstat_io_read_rate",
                "Bytes per second read from the monitored block device",
            )?,
            io_write_rate: Gauge::new(
                "glowstat_io_write_rate",
                "Bytes per second written to the monitored block device",
            )?,
            cpu_package_temp: Gauge::new(
                "glowstat_cpu_package_temp",
                "CPU package temperature, degrees Celsius",
            )?,
            nvme_temp: Gauge::new(
                "glowstat_nvme_temp",
                "NVMe composite temperature, degrees Celsius",
            )?,
            gpu_usage: IntGauge::new("glowstat_gpu_usage", "GPU utilization percentage")?,
            gpu_mem_usage: IntGauge::new("glowstat_gpu_mem_usage", "GPU memory in use, MiB")?,
            gpu_temp: Gauge::new("glowstat_gpu_temp", "GPU temperature, degrees Celsius")?,
        };

        registry.register(Box::new(gauges.avg_cpu_usage.clone()))?;
        registry.register(Box::new(gauges.memory_load.clone()))?;
        registry.register(Box::new(gauges.uptime.clone()))?;
        registry.register(Box::new(gauges.net_rec_rate.clone()))?;
        registry.register(Box::new(gauges.net_trans_rate.clone()))?;
        registry.register(Box::new(gauges.io_read_rate.clone()))?;
        registry.register(Box::new(gauges.io_write_rate.clone()))?;
        registry.register(Box::new(gauges.cpu_package_temp.clone()))?;
        registry.register(Box::new(gauges.nvme_temp.clone()))?;
        registry.register(Box::new(gauges.gpu_usage.clone()))?;
        registry.register(Box::new(gauges.gpu_mem_usage.clone()))?;
        registry.register(Box::new(gauges.gpu_temp.clone()))?;

        Ok(gauges)
    }

    /// Pushes one snapshot into the gauges.
    pub fn apply(&self, snapshot: &MetricSnapshot, interval_secs: f64) {
        self.avg_cpu_usage.set(snapshot.avg_cpu_load);
        self.memory_load.set(snapshot.memory_used_kib as i64);
        self.uptime.set(snapshot.uptime_secs as i64);

        self.net_rec_rate.set(snapshot.net_rx_rate as f64 / interval_secs);
        self.net_trans_rate
            .set(snapshot.net_tx_rate as f64 / interval_secs);
        self.io_read_rate
            .set(snapshot.io_read_rate as f64 / interval_secs);
        self.io_write_rate
            .set(snapshot.io_write_rate as f64 / interval_secs);

        self.cpu_package_temp
            .set(snapshot.cpu_temp_millideg as f64 / 1000.0);
        self.nvme_temp.set(snapshot.nvme_temp_millideg as f64 / 1000.0);

        self.gpu_usage.set(snapshot.gpu_usage_pct as i64);
        self.gpu_mem_usage.set(snapshot.gpu_mem_used_mib as i64);
        self.gpu_temp.set(snapshot.gpu_temp_millideg as f64 / 1000.0);
    }
}
