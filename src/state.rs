use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

pub const NETWORK_ERROR: &str = "* NETWORK ERROR *";

pub const UPTIME_WARN_SECS: f64 = 86_400.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeResult<T> {
    pub value: T,
    pub warn: bool,
}

impl<T> ProbeResult<T> {
    pub fn ok(value: T) -> Self {
        Self { value, warn: false }
    }

    pub fn warn(value: T) -> Self {
        Self { value, warn: true }
    }

    pub fn new(value: T, warn: bool) -> Self {
        Self { value, warn }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RootFsWrites {
    pub device: String,
    pub lifetime_write_kbytes: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterfaceAddress {
    pub interface: String,
    pub address: Ipv4Addr,
    pub netmask: Option<Ipv4Addr>,
    pub broadcast: Option<Ipv4Addr>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackageUpgrade {
    pub name: String,
    pub from: String,
    pub to: String,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RebootStatus {
    pub required: bool,
    pub packages: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeKind {
    Uptime,
    RebootRequired,
    Memory,
    Distribution,
    Kernel,
    RootFsWrites,
    FsSpace,
    FsInode,
    LoggedOn,
    LocalIp,
    PublicIp,
    RaspberryPiModel,
    RaidStatus,
    BackupLog,
    PackageStatus,
    MonitorSync,
}

impl ProbeKind {
    pub const ALL: [ProbeKind; 16] = [
        ProbeKind::Uptime,
        ProbeKind::RebootRequired,
        ProbeKind::Memory,
        ProbeKind::Distribution,
        ProbeKind::Kernel,
        ProbeKind::RootFsWrites,
        ProbeKind::FsSpace,
        ProbeKind::FsInode,
        ProbeKind::LoggedOn,
        ProbeKind::LocalIp,
        ProbeKind::PublicIp,
        ProbeKind::RaspberryPiModel,
        ProbeKind::RaidStatus,
        ProbeKind::BackupLog,
        ProbeKind::PackageStatus,
        ProbeKind::MonitorSync,
    ];

    pub const DEFAULT_WARN_ON: [ProbeKind; 5] = [
        ProbeKind::PublicIp,
        ProbeKind::RaidStatus,
        ProbeKind::LocalIp,
        ProbeKind::BackupLog,
        ProbeKind::RebootRequired,
    ];

    pub fn title(self) -> &'static str {
        match self {
            ProbeKind::Uptime => "System Uptime",
            ProbeKind::RebootRequired => "Reboot Required Details",
            ProbeKind::Memory => "Memory Usage",
            ProbeKind::Distribution => "Distribution Details",
            ProbeKind::Kernel => "Kernel Details",
            ProbeKind::RootFsWrites => "Root FS Writes Details",
            ProbeKind::FsSpace => "FS Space Details",
            ProbeKind::FsInode => "FS Inode Details",
            ProbeKind::LoggedOn => "Logged On Details",
            ProbeKind::LocalIp => "Local IP Details",
            ProbeKind::PublicIp => "Public IP Details",
            ProbeKind::RaspberryPiModel => "Raspberry Pi Model Details",
            ProbeKind::RaidStatus => "Raid Status Details",
            ProbeKind::BackupLog => "Backup Log Details",
            ProbeKind::PackageStatus => "Package Status Details",
            ProbeKind::MonitorSync => "Monitor Sync Details",
        }
    }
}

// Everything gathered during one run. Every probe has a field, so a
// partially filled report cannot be built.
#[derive(Debug, Clone, Serialize)]
pub struct ReportState {
    pub hostname: String,
    pub generated_at: DateTime<Local>,
    pub uptime: ProbeResult<f64>,
    pub reboot_required: ProbeResult<RebootStatus>,
    pub memory: ProbeResult<String>,
    pub distribution: ProbeResult<String>,
    pub kernel: ProbeResult<String>,
    pub root_fs_writes: ProbeResult<RootFsWrites>,
    pub fs_space: ProbeResult<String>,
    pub fs_inode: ProbeResult<String>,
    pub logged_on: ProbeResult<String>,
    pub local_ip: ProbeResult<Vec<InterfaceAddress>>,
    pub public_ip: ProbeResult<String>,
    pub raspberry_pi_model: ProbeResult<Option<String>>,
    pub raid_status: ProbeResult<Option<String>>,
    pub backup_log: ProbeResult<String>,
    pub package_status: ProbeResult<Vec<PackageUpgrade>>,
    pub monitor_sync: ProbeResult<Option<String>>,
}

impl ReportState {
    pub fn warn_of(&self, kind: ProbeKind) -> bool {
        match kind {
            ProbeKind::Uptime => self.uptime.warn,
            ProbeKind::RebootRequired => self.reboot_required.warn,
            ProbeKind::Memory => self.memory.warn,
            ProbeKind::Distribution => self.distribution.warn,
            ProbeKind::Kernel => self.kernel.warn,
            ProbeKind::RootFsWrites => self.root_fs_writes.warn,
            ProbeKind::FsSpace => self.fs_space.warn,
            ProbeKind::FsInode => self.fs_inode.warn,
            ProbeKind::LoggedOn => self.logged_on.warn,
            ProbeKind::LocalIp => self.local_ip.warn,
            ProbeKind::PublicIp => self.public_ip.warn,
            ProbeKind::RaspberryPiModel => self.raspberry_pi_model.warn,
            ProbeKind::RaidStatus => self.raid_status.warn,
            ProbeKind::BackupLog => self.backup_log.warn,
            ProbeKind::PackageStatus => self.package_status.warn,
            ProbeKind::MonitorSync => self.monitor_sync.warn,
        }
    }

    pub fn warning_probes(&self) -> Vec<ProbeKind> {
        ProbeKind::ALL
            .into_iter()
            .filter(|kind| self.warn_of(*kind))
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;

    pub(crate) fn quiet_state() -> ReportState {
        ReportState {
            hostname: "pi-nas".to_string(),
            generated_at: Local
                .with_ymd_and_hms(2024, 3, 1, 6, 0, 0)
                .single()
                .expect("valid local time"),
            uptime: ProbeResult::ok(200_000.0),
            reboot_required: ProbeResult::ok(RebootStatus {
                required: false,
                packages: None,
            }),
            memory: ProbeResult::ok("Mem: 3.7Gi 1.2Gi\n".to_string()),
            distribution: ProbeResult::ok("Description: Debian 12\n".to_string()),
            kernel: ProbeResult::ok("Linux pi-nas 6.1.0 aarch64\n".to_string()),
            root_fs_writes: ProbeResult::ok(RootFsWrites {
                device: "/dev/mmcblk0p2".to_string(),
                lifetime_write_kbytes: Some(1_234_567),
            }),
            fs_space: ProbeResult::ok("/dev/root 29G 5G 24G 18% /\n".to_string()),
            fs_inode: ProbeResult::ok("/dev/root 1.9M 140K 1.7M 8% /\n".to_string()),
            logged_on: ProbeResult::ok(String::new()),
            local_ip: ProbeResult::ok(vec![InterfaceAddress {
                interface: "eth0".to_string(),
                address: Ipv4Addr::new(192, 168, 1, 20),
                netmask: Some(Ipv4Addr::new(255, 255, 255, 0)),
                broadcast: Some(Ipv4Addr::new(192, 168, 1, 255)),
            }]),
            public_ip: ProbeResult::ok("1.2.3.4".to_string()),
            raspberry_pi_model: ProbeResult::ok(None),
            raid_status: ProbeResult::ok(None),
            backup_log: ProbeResult::ok("Backup not enabled".to_string()),
            package_status: ProbeResult::ok(Vec::new()),
            monitor_sync: ProbeResult::ok(None),
        }
    }

    #[test]
    fn warn_of_covers_every_probe_kind() {
        let mut state = quiet_state();
        assert!(state.warning_probes().is_empty());

        state.raid_status.warn = true;
        state.monitor_sync.warn = true;
        assert_eq!(
            state.warning_probes(),
            vec![ProbeKind::RaidStatus, ProbeKind::MonitorSync]
        );
    }

    #[test]
    fn probe_kind_names_match_config_keys() {
        let kinds: Vec<ProbeKind> =
            serde_yaml::from_str("[public_ip, root_fs_writes, raspberry_pi_model]")
                .expect("valid probe names");
        assert_eq!(
            kinds,
            vec![
                ProbeKind::PublicIp,
                ProbeKind::RootFsWrites,
                ProbeKind::RaspberryPiModel
            ]
        );
    }
}
