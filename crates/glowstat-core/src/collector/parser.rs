//! Parsers for the pseudo-files and utility outputs the collector reads.
//!
//! These are pure functions that turn raw file or stdout content into
//! structured values. They are designed to be easily testable with string
//! inputs.

use serde::Deserialize;

/// Error type for parsing failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Parse error: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

// ============ /proc/loadavg ============

/// Parses the 1-minute load average (first whitespace-separated field of
/// `/proc/loadavg`).
pub fn parse_loadavg_1min(content: &str) -> Result<f64, ParseError> {
    content
        .split_whitespace()
        .next()
        .ok_or_else(|| ParseError::new("empty loadavg"))?
        .parse()
        .map_err(|_| ParseError::new("invalid 1-minute load average"))
}

// ============ /proc/meminfo ============

/// Memory totals extracted from `/proc/meminfo`, in KiB.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemReadings {
    pub total_kib: u64,
    pub available_kib: u64,
}

/// Parses `MemTotal` and `MemAvailable` from `/proc/meminfo`.
///
/// Scanning stops once both labels are found. Either label missing is an
/// error: both are mandatory on any kernel this collector supports.
pub fn parse_meminfo(content: &str) -> Result<MemReadings, ParseError> {
    let mut total = None;
    let mut available = None;

    let parse_kib = |line: &str, label: &str| -> Result<u64, ParseError> {
        line.split_whitespace()
            .nth(1)
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| ParseError::new(format!("invalid {} line", label)))
    };

    for line in content.lines() {
        if line.starts_with("MemTotal:") {
            total = Some(parse_kib(line, "MemTotal")?);
        } else if line.starts_with("MemAvailable:") {
            available = Some(parse_kib(line, "MemAvailable")?);
        }
        if total.is_some() && available.is_some() {
            break;
        }
    }

    match (total, available) {
        (Some(total_kib), Some(available_kib)) => Ok(MemReadings {
            total_kib,
            available_kib,
        }),
        (None, _) => Err(ParseError::new("MemTotal not found in meminfo")),
        (_, None) => Err(ParseError::new("MemAvailable not found in meminfo")),
    }
}

// ============ /proc/uptime ============

/// Parses `/proc/uptime`, truncating the first field to whole seconds.
pub fn parse_uptime_secs(content: &str) -> Result<u64, ParseError> {
    let secs: f64 = content
        .split_whitespace()
        .next()
        .ok_or_else(|| ParseError::new("empty uptime"))?
        .parse()
        .map_err(|_| ParseError::new("invalid uptime"))?;
    Ok(secs as u64)
}

// ============ /proc/net/dev ============

/// Raw byte counters for one network interface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterfaceCounters {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

/// Extracts the receive/transmit byte counters for `interface` from
/// `/proc/net/dev`.
///
/// The line format after the interface name and colon is 16 numeric
/// fields; rx_bytes is field 0 and tx_bytes is field 8.
pub fn parse_net_dev_counters(
    content: &str,
    interface: &str,
) -> Result<InterfaceCounters, ParseError> {
    for line in content.lines() {
        let Some((name, counters)) = line.split_once(':') else {
            continue;
        };
        if name.trim() != interface {
            continue;
        }

        let fields: Vec<&str> = counters.split_whitespace().collect();
        let parse = |idx: usize, what: &str| -> Result<u64, ParseError> {
            fields
                .get(idx)
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| ParseError::new(format!("invalid {} for {}", what, interface)))
        };

        return Ok(InterfaceCounters {
            rx_bytes: parse(0, "rx_bytes")?,
            tx_bytes: parse(8, "tx_bytes")?,
        });
    }

    Err(ParseError::new(format!(
        "interface '{}' not found in net dev data",
        interface
    )))
}

// ============ /proc/diskstats ============

/// Column offsets into a `/proc/diskstats` line, 0-based over the whole
/// whitespace-split line. The kernel's documented layout (iostats.rst)
/// puts the device name in column 3, sectors read in column 6 and sectors
/// written in column 10 (1-indexed); these have shifted across kernel
/// documentation revisions, so they live here as named constants with a
/// fixture test below.
pub const DISKSTATS_DEVICE_FIELD: usize = 2;
pub const DISKSTATS_READ_SECTORS_FIELD: usize = 5;
pub const DISKSTATS_WRITE_SECTORS_FIELD: usize = 9;

/// Raw sector counters for one block device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceSectors {
    pub read: u64,
    pub written: u64,
}

/// Extracts the sectors-read/sectors-written counters for `device` from
/// `/proc/diskstats`.
pub fn parse_diskstats_sectors(content: &str, device: &str) -> Result<DeviceSectors, ParseError> {
    for line in content.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.get(DISKSTATS_DEVICE_FIELD) != Some(&device) {
            continue;
        }

        let parse = |idx: usize, what: &str| -> Result<u64, ParseError> {
            fields
                .get(idx)
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| ParseError::new(format!("invalid {} for {}", what, device)))
        };

        return Ok(DeviceSectors {
            read: parse(DISKSTATS_READ_SECTORS_FIELD, "read sectors")?,
            written: parse(DISKSTATS_WRITE_SECTORS_FIELD, "written sectors")?,
        });
    }

    Err(ParseError::new(format!(
        "device '{}' not found in disk stats",
        device
    )))
}

// ============ sysfs sensor value files ============

/// Parses a single-integer sysfs value file. Covers temperature inputs
/// (millidegrees), utilization percentages and byte counts alike; the unit
/// is the caller's concern.
pub fn parse_sysfs_int(content: &str) -> Result<i64, ParseError> {
    content
        .trim()
        .parse()
        .map_err(|_| ParseError::new("invalid sensor value"))
}

// ============ nvidia-smi ============

use crate::model::GpuReadings;

/// Parses one line of
/// `nvidia-smi --query-gpu=utilization.gpu,memory.used,temperature.gpu
/// --format=csv,noheader,nounits` output, e.g. `"35, 1024, 56"`.
///
/// The temperature is reported in whole degrees Celsius and converted to
/// millidegrees to match the sysfs sensor convention.
pub fn parse_nvidia_smi(content: &str) -> Result<GpuReadings, ParseError> {
    let fields: Vec<&str> = content.trim().split(',').map(str::trim).collect();
    if fields.len() != 3 {
        return Err(ParseError::new(format!(
            "expected 3 comma-separated fields from nvidia-smi, got {}",
            fields.len()
        )));
    }

    let usage_pct = fields[0]
        .parse()
        .map_err(|_| ParseError::new("invalid GPU utilization"))?;
    let mem_used_mib = fields[1]
        .parse()
        .map_err(|_| ParseError::new("invalid GPU memory"))?;
    let temp_celsius: i64 = fields[2]
        .parse()
        .map_err(|_| ParseError::new("invalid GPU temperature"))?;

    Ok(GpuReadings {
        usage_pct,
        mem_used_mib,
        temp_millideg: temp_celsius * 1000,
    })
}

// ============ vcgencmd ============

/// Parses `vcgencmd measure_temp` output (`temp=48.3'C`) into
/// millidegrees.
pub fn parse_vcgencmd_temp(content: &str) -> Result<i64, ParseError> {
    let value = content
        .trim()
        .strip_prefix("temp=")
        .ok_or_else(|| ParseError::new("missing temp= prefix in vcgencmd output"))?;
    let degrees: f64 = value
        .trim_end_matches(|c: char| !c.is_ascii_digit())
        .parse()
        .map_err(|_| ParseError::new("invalid vcgencmd temperature"))?;
    Ok((degrees * 1000.0) as i64)
}

// ============ lsblk ============

#[derive(Debug, Deserialize)]
struct LsblkListing {
    #[serde(default)]
    blockdevices: Vec<LsblkDevice>,
}

#[derive(Debug, Deserialize)]
struct LsblkDevice {
    name: String,
    #[serde(default)]
    serial: Option<String>,
    #[serde(default)]
    children: Option<Vec<LsblkDevice>>,
}

/// Searches `lsblk -J -o NAME,SERIAL` output for a device with the given
/// serial number, returning its kernel device name.
///
/// Serials are compared case-insensitively after trimming, since lsblk
/// pads them with whitespace on some kernels. Partitions (children) are
/// searched too.
pub fn find_device_by_serial(content: &str, serial: &str) -> Result<Option<String>, ParseError> {
    let listing: LsblkListing = serde_json::from_str(content)
        .map_err(|e| ParseError::new(format!("invalid lsblk JSON: {}", e)))?;

    fn walk(devices: &[LsblkDevice], wanted: &str) -> Option<String> {
        for device in devices {
            if let Some(serial) = &device.serial
                && serial.trim().eq_ignore_ascii_case(wanted)
            {
                return Some(device.name.clone());
            }
            if let Some(children) = &device.children
                && let Some(name) = walk(children, wanted)
            {
                return Some(name);
            }
        }
        None
    }

    Ok(walk(&listing.blockdevices, serial.trim()))
}
