//! System information for the stats screen: hostname, clock, uptime, load.

use std::fs;
use std::mem::MaybeUninit;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Columns reserved for the hostname on the first line.
const HOSTNAME_COLUMNS: usize = 11;

/// Reads host statistics from procfs.
pub struct SystemInfo {
    proc_root: PathBuf,
    hostname_file: PathBuf,
}

impl SystemInfo {
    pub fn new() -> Self {
        Self::with_sources("/proc", "/etc/hostname")
    }

    fn with_sources(proc_root: impl AsRef<Path>, hostname_file: impl AsRef<Path>) -> Self {
        Self {
            proc_root: proc_root.as_ref().to_path_buf(),
            hostname_file: hostname_file.as_ref().to_path_buf(),
        }
    }

    fn read_proc(&self, name: &str) -> Option<String> {
        fs::read_to_string(self.proc_root.join(name)).ok()
    }

    /// Kernel hostname, then `/etc/hostname`, then "unknown".
    pub fn hostname(&self) -> String {
        self.read_proc("sys/kernel/hostname")
            .or_else(|| fs::read_to_string(&self.hostname_file).ok())
            .and_then(|raw| raw.split_whitespace().next().map(str::to_string))
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Wall clock as (hour, minute, second) in the local zone, UTC if that fails.
    pub fn local_time(&self) -> (u8, u8, u8) {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());
        local_clock(secs).unwrap_or_else(|| utc_clock(secs))
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.read_proc("uptime")
            .as_deref()
            .and_then(parse_uptime)
            .unwrap_or(0)
    }

    /// Returns the 1, 5 and 15 minute load averages.
    pub fn load_average(&self) -> Option<[f64; 3]> {
        parse_loadavg(&self.read_proc("loadavg")?)
    }
}

impl Default for SystemInfo {
    fn default() -> Self {
        Self::new()
    }
}

fn local_clock(secs: u64) -> Option<(u8, u8, u8)> {
    let stamp = libc::time_t::try_from(secs).ok()?;
    let mut tm = MaybeUninit::<libc::tm>::uninit();
    // SAFETY: both pointers are valid; `tm` is only read once localtime_r has filled it.
    let tm = unsafe {
        if libc::localtime_r(&stamp, tm.as_mut_ptr()).is_null() {
            return None;
        }
        tm.assume_init()
    };
    Some((tm.tm_hour as u8, tm.tm_min as u8, tm.tm_sec as u8))
}

fn utc_clock(secs: u64) -> (u8, u8, u8) {
    let of_day = secs % 86_400;
    (
        (of_day / 3600) as u8,
        (of_day % 3600 / 60) as u8,
        (of_day % 60) as u8,
    )
}

fn parse_uptime(content: &str) -> Option<u64> {
    let secs: f64 = content.split_whitespace().next()?.parse().ok()?;
    Some(secs as u64)
}

fn parse_loadavg(content: &str) -> Option<[f64; 3]> {
    let mut fields = content.split_whitespace().map(|s| s.parse::<f64>().ok());
    Some([fields.next()??, fields.next()??, fields.next()??])
}

/// Hostname in the first columns, clock after it.
pub fn format_host_clock(hostname: &str, (hours, minutes, seconds): (u8, u8, u8)) -> String {
    let host: String = hostname.chars().take(HOSTNAME_COLUMNS).collect();
    format!(
        "{:<width$}{:02}:{:02}:{:02}",
        host,
        hours,
        minutes,
        seconds,
        width = HOSTNAME_COLUMNS
    )
}

/// Formats uptime as "Up Nd, HH:MM:SS".
pub fn format_uptime(uptime_secs: u64) -> String {
    let days = uptime_secs / 86400;
    let hours = (uptime_secs % 86400) / 3600;
    let minutes = (uptime_secs % 3600) / 60;
    let seconds = uptime_secs % 60;
    format!("Up {}d, {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

/// Formats load averages, or a placeholder when unavailable.
pub fn format_load(load: Option<[f64; 3]>) -> String {
    match load {
        Some([one, five, fifteen]) => format!("Load {:.2} {:.2} {:.2}", one, five, fifteen),
        None => "Load --".to_string(),
    }
}
