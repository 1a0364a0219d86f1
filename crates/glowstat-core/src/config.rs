//! Collector configuration, validated once before the collector is built.

use std::fmt;
use std::str::FromStr;

/// Host family, selecting which thermal zone type label to expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostKind {
    Generic,
    RaspberryPi,
}

impl FromStr for HostKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generic" => Ok(HostKind::Generic),
            "raspberry-pi" => Ok(HostKind::RaspberryPi),
            other => Err(format!(
                "unknown host type '{}' (expected 'generic' or 'raspberry-pi')",
                other
            )),
        }
    }
}

impl fmt::Display for HostKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostKind::Generic => write!(f, "generic"),
            HostKind::RaspberryPi => write!(f, "raspberry-pi"),
        }
    }
}

/// GPU vendor, selecting how GPU telemetry is read. A closed set: adding a
/// vendor means adding a variant and a [`crate::collector::gpu::GpuTelemetry`]
/// implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuKind {
    /// No GPU telemetry; all GPU fields stay at their reset value.
    None,
    /// Discrete NVIDIA GPU queried through `nvidia-smi`.
    Nvidia,
    /// AMD GPU with sensors exposed through the sysfs hwmon tree.
    Amd,
    /// Raspberry Pi SoC GPU queried through `vcgencmd`.
    RaspberryPi,
}

impl FromStr for GpuKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(GpuKind::None),
            "nvidia" => Ok(GpuKind::Nvidia),
            "amd" => Ok(GpuKind::Amd),
            "raspberry-pi" => Ok(GpuKind::RaspberryPi),
            other => Err(format!(
                "unknown GPU type '{}' (expected 'none', 'nvidia', 'amd' or 'raspberry-pi')",
                other
            )),
        }
    }
}

impl fmt::Display for GpuKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuKind::None => write!(f, "none"),
            GpuKind::Nvidia => write!(f, "nvidia"),
            GpuKind::Amd => write!(f, "amd"),
            GpuKind::RaspberryPi => write!(f, "raspberry-pi"),
        }
    }
}

/// Immutable collector parameters, supplied by the daemon after CLI
/// validation and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorConfig {
    pub host: HostKind,
    pub gpu: GpuKind,
    /// Network interface whose byte counters are sampled.
    pub net_interface: String,
    /// Block device for I/O accounting: a kernel device name, or a hardware
    /// serial number to be translated at startup.
    pub io_device: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_kind_round_trip() {
        for s in ["generic", "raspberry-pi"] {
            assert_eq!(s.parse::<HostKind>().unwrap().to_string(), s);
        }
        assert!("raspberrypi".parse::<HostKind>().is_err());
    }

    #[test]
    fn gpu_kind_round_trip() {
        for s in ["none", "nvidia", "amd", "raspberry-pi"] {
            assert_eq!(s.parse::<GpuKind>().unwrap().to_string(), s);
        }
        assert!("intel".parse::<GpuKind>().is_err());
    }
}
