//! Host metrics collection
//!
//! Snapshots are expensive (CPU usage needs two samples), so the latest one
//! is kept in a short-lived [`TtlCache`] entry instead of being memoized
//! forever.

use crate::cache::TtlCache;
use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;
use sysinfo::{Disks, Networks, System};

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
const MIB: f64 = 1024.0 * 1024.0;

/// Processes included in a snapshot
pub const TOP_PROCESS_COUNT: usize = 10;

/// Connections listed by the network view
pub const CONNECTION_LIMIT: usize = 10;

/// Kernel socket tables read for the network view
const TCP_TABLES: [(&str, bool); 2] = [("/proc/net/tcp", false), ("/proc/net/tcp6", true)];

/// Usage percentage at or above which a diagnostic check fails
pub const DIAGNOSTIC_THRESHOLD: f64 = 90.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    pub cpu: f32,
    pub memory: f64,
}

/// Point-in-time view of the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSnapshot {
    /// Timestamp of collection
    pub timestamp: u64,
    pub cpu_usage: f32,
    pub cpu_freq_mhz: u64,
    pub memory_total_gb: f64,
    pub memory_used_gb: f64,
    pub disk_total_gb: f64,
    pub disk_used_gb: f64,
    pub net_sent_mb: f64,
    pub net_recv_mb: f64,
    pub uptime: String,
    /// Busiest processes by CPU usage
    pub processes: Vec<ProcessInfo>,
}

/// Health checks; each is true when the resource is below the threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticReport {
    pub disk_space: bool,
    pub memory_usage: bool,
    pub cpu_usage: bool,
}

impl DiagnosticReport {
    pub fn from_snapshot(snapshot: &SystemSnapshot) -> Self {
        Self {
            disk_space: percent(snapshot.disk_used_gb, snapshot.disk_total_gb) < DIAGNOSTIC_THRESHOLD,
            memory_usage: percent(snapshot.memory_used_gb, snapshot.memory_total_gb)
                < DIAGNOSTIC_THRESHOLD,
            cpu_usage: f64::from(snapshot.cpu_usage) < DIAGNOSTIC_THRESHOLD,
        }
    }
}

fn percent(used: f64, total: f64) -> f64 {
    if total > 0.0 {
        used / total * 100.0
    } else {
        0.0
    }
}

/// A TCP connection with both ends known
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub local: String,
    pub remote: String,
    pub status: String,
}

/// Parse a `/proc/net/tcp` or `/proc/net/tcp6` table.
///
/// Sockets without a remote peer (listeners) are skipped; malformed lines
/// are ignored.
pub fn parse_tcp_table(content: &str, ipv6: bool) -> Vec<Connection> {
    content
        .lines()
        .skip(1)
        .filter_map(|line| {
            let mut fields = line.split_whitespace().skip(1);
            let local = parse_socket(fields.next()?, ipv6)?;
            let remote = parse_socket(fields.next()?, ipv6)?;
            let state = fields.next()?;

            if remote.port() == 0 {
                return None;
            }

            Some(Connection {
                local: local.to_string(),
                remote: remote.to_string(),
                status: tcp_state_name(state).to_string(),
            })
        })
        .collect()
}

/// `0100007F:0016` style address; each 32-bit word is in host byte order
fn parse_socket(field: &str, ipv6: bool) -> Option<SocketAddr> {
    let (addr, port) = field.split_once(':')?;
    let port = u16::from_str_radix(port, 16).ok()?;

    let mut bytes = Vec::with_capacity(16);
    for i in (0..addr.len()).step_by(8) {
        let word = u32::from_str_radix(addr.get(i..i + 8)?, 16).ok()?;
        bytes.extend_from_slice(&word.to_le_bytes());
    }

    let ip = match (ipv6, bytes.len()) {
        (false, 4) => Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3]).into(),
        (true, 16) => {
            let octets: [u8; 16] = bytes.try_into().ok()?;
            Ipv6Addr::from(octets).into()
        }
        _ => return None,
    };

    Some(SocketAddr::new(ip, port))
}

fn tcp_state_name(code: &str) -> &'static str {
    match code {
        "01" => "ESTABLISHED",
        "02" => "SYN_SENT",
        "03" => "SYN_RECV",
        "04" => "FIN_WAIT1",
        "05" => "FIN_WAIT2",
        "06" => "TIME_WAIT",
        "07" => "CLOSE",
        "08" => "CLOSE_WAIT",
        "09" => "LAST_ACK",
        "0A" => "LISTEN",
        "0B" => "CLOSING",
        _ => "UNKNOWN",
    }
}

fn collect_connections() -> Vec<Connection> {
    let mut connections = Vec::new();
    for (path, ipv6) in TCP_TABLES {
        match std::fs::read_to_string(path) {
            Ok(content) => connections.extend(parse_tcp_table(&content, ipv6)),
            Err(e) => debug!("Skipping {}: {}", path, e),
        }
        if connections.len() >= CONNECTION_LIMIT {
            break;
        }
    }
    connections.truncate(CONNECTION_LIMIT);
    connections
}

/// Render seconds the way `timedelta` prints: `2 days, 3:04:05`
pub fn format_uptime(seconds: u64) -> String {
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    let clock = format!("{}:{:02}:{:02}", hours, minutes, secs);

    match days {
        0 => clock,
        1 => format!("1 day, {}", clock),
        n => format!("{} days, {}", n, clock),
    }
}

/// Collects host metrics, caching the latest snapshot
pub struct DataCollector {
    cache: TtlCache<(), SystemSnapshot>,
    ttl: Duration,
}

impl DataCollector {
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: TtlCache::with_capacity(1),
            ttl,
        }
    }

    /// Current snapshot, reused while it is younger than the ttl
    pub async fn collect(&self) -> Result<SystemSnapshot> {
        if let Some(snapshot) = self.cache.get(&()) {
            return Ok(snapshot);
        }

        let snapshot = tokio::task::spawn_blocking(collect_snapshot)
            .await
            .context("System metrics collection task failed")??;

        self.cache.put((), snapshot.clone(), self.ttl);
        Ok(snapshot)
    }

    /// Up to [`CONNECTION_LIMIT`] TCP connections that have a remote peer
    pub async fn connections(&self) -> Result<Vec<Connection>> {
        tokio::task::spawn_blocking(collect_connections)
            .await
            .context("Network connection listing task failed")
    }

    /// Health checks over the current snapshot
    pub async fn diagnostics(&self) -> Result<DiagnosticReport> {
        let snapshot = self.collect().await?;
        Ok(DiagnosticReport::from_snapshot(&snapshot))
    }
}

fn collect_snapshot() -> Result<SystemSnapshot> {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)?
        .as_secs();

    let mut sys = System::new_all();
    // CPU usage is a delta between two refreshes
    std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
    sys.refresh_cpu();
    sys.refresh_processes();

    let total_memory = sys.total_memory() as f64;

    let mut processes: Vec<ProcessInfo> = sys
        .processes()
        .iter()
        .map(|(pid, process)| ProcessInfo {
            pid: pid.as_u32(),
            name: process.name().to_string(),
            cpu: process.cpu_usage(),
            memory: percent(process.memory() as f64, total_memory),
        })
        .collect();
    processes.sort_by(|a, b| b.cpu.total_cmp(&a.cpu));
    processes.truncate(TOP_PROCESS_COUNT);

    let disks = Disks::new_with_refreshed_list();
    let (disk_total, disk_available) = disks
        .iter()
        .find(|disk| disk.mount_point() == Path::new("/"))
        .map(|disk| (disk.total_space(), disk.available_space()))
        .unwrap_or((0, 0));

    let networks = Networks::new_with_refreshed_list();
    let (net_sent, net_recv) = networks
        .iter()
        .fold((0u64, 0u64), |(sent, recv), (_, data)| {
            (sent + data.total_transmitted(), recv + data.total_received())
        });

    let cpu = sys.global_cpu_info();
    let snapshot = SystemSnapshot {
        timestamp,
        cpu_usage: cpu.cpu_usage(),
        cpu_freq_mhz: cpu.frequency(),
        memory_total_gb: total_memory / GIB,
        memory_used_gb: sys.used_memory() as f64 / GIB,
        disk_total_gb: disk_total as f64 / GIB,
        disk_used_gb: disk_total.saturating_sub(disk_available) as f64 / GIB,
        net_sent_mb: net_sent as f64 / MIB,
        net_recv_mb: net_recv as f64 / MIB,
        uptime: format_uptime(System::uptime()),
        processes,
    };

    debug!(
        "Collected system snapshot: cpu {:.1}%, {} processes",
        snapshot.cpu_usage,
        snapshot.processes.len()
    );
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(cpu: f32, memory_used: f64, disk_used: f64) -> SystemSnapshot {
        SystemSnapshot {
            timestamp: 0,
            cpu_usage: cpu,
            cpu_freq_mhz: 2400,
            memory_total_gb: 16.0,
            memory_used_gb: memory_used,
            disk_total_gb: 100.0,
            disk_used_gb: disk_used,
            net_sent_mb: 0.0,
            net_recv_mb: 0.0,
            uptime: "0:00:01".to_string(),
            processes: Vec::new(),
        }
    }

    #[test]
    fn test_diagnostics_thresholds() {
        let healthy = DiagnosticReport::from_snapshot(&snapshot(12.0, 4.0, 40.0));
        assert_eq!(
            healthy,
            DiagnosticReport {
                disk_space: true,
                memory_usage: true,
                cpu_usage: true
            }
        );

        let strained = DiagnosticReport::from_snapshot(&snapshot(95.0, 15.0, 90.0));
        assert!(!strained.cpu_usage);
        assert!(!strained.memory_usage);
        assert!(!strained.disk_space);
    }

    #[test]
    fn test_diagnostics_with_unknown_disk() {
        let mut snap = snapshot(1.0, 1.0, 0.0);
        snap.disk_total_gb = 0.0;
        assert!(DiagnosticReport::from_snapshot(&snap).disk_space);
    }

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(59), "0:00:59");
        assert_eq!(format_uptime(3 * 3600 + 4 * 60 + 5), "3:04:05");
        assert_eq!(format_uptime(86_400 + 61), "1 day, 0:01:01");
        assert_eq!(format_uptime(2 * 86_400 + 7200), "2 days, 2:00:00");
    }

    const TCP: &str = "  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode
   0: 0100007F:0CEA 00000000:0000 0A 00000000:00000000 00:00000000 00000000   999        0 20011 1 0000000000000000 100 0 0 10 0
   1: 0F02000A:0016 0202000A:D2F0 01 00000000:00000000 02:0006B2A1 00000000     0        0 31337 4 0000000000000000 20 4 29 10 -1
   2: garbage
";

    const TCP6: &str = "  sl  local_address                         remote_address                        st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode
   0: 00000000000000000000000001000000:0016 00000000000000000000000001000000:B3A2 06 00000000:00000000 03:00001771 00000000     0        0 0 3 0000000000000000
";

    #[test]
    fn test_parse_tcp_table_skips_listeners() {
        let connections = parse_tcp_table(TCP, false);
        assert_eq!(
            connections,
            vec![Connection {
                local: "10.0.2.15:22".to_string(),
                remote: "10.0.2.2:54000".to_string(),
                status: "ESTABLISHED".to_string(),
            }]
        );
    }

    #[test]
    fn test_parse_tcp6_table() {
        let connections = parse_tcp_table(TCP6, true);
        assert_eq!(connections.len(), 1);
        assert_eq!(connections[0].local, "[::1]:22");
        assert_eq!(connections[0].remote, "[::1]:45986");
        assert_eq!(connections[0].status, "TIME_WAIT");
    }

    #[test]
    fn test_parse_tcp_table_ignores_wrong_family_and_empty_input() {
        assert!(parse_tcp_table(TCP6, false).is_empty());
        assert!(parse_tcp_table("", false).is_empty());
    }

    #[tokio::test]
    async fn test_connections_are_capped() {
        let collector = DataCollector::new(Duration::from_secs(1));
        let connections = collector.connections().await.unwrap();
        assert!(connections.len() <= CONNECTION_LIMIT);
    }

    #[tokio::test]
    async fn test_collect_reads_host_and_caches() {
        let collector = DataCollector::new(Duration::from_secs(60));

        let first = collector.collect().await.unwrap();
        assert!(first.memory_total_gb > 0.0);
        assert!(first.processes.len() <= TOP_PROCESS_COUNT);

        let second = collector.collect().await.unwrap();
        assert_eq!(first, second);
    }
}
