use crate::collectors::{run_command, ProbeError};
use crate::state::{PackageUpgrade, ProbeResult, RebootStatus};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::SystemTime;
use tracing::warn;

pub const REBOOT_REQUIRED_FILE: &str = "/var/run/reboot-required";
pub const REBOOT_REQUIRED_PKGS_FILE: &str = "/var/run/reboot-required.pkgs";
pub const BACKUP_CRON_FILE: &str = "/etc/cron.d/Backup";
pub const BACKUP_LOG_FILE: &str = "/var/log/backup.log";
pub const MONITOR_SYNC_FILE: &str = "/var/log/monitor-sync-state.yaml";

const SECS_PER_DAY: f64 = 86_400.0;

pub fn reboot_required(flag_file: &Path, pkgs_file: &Path) -> ProbeResult<RebootStatus> {
    if !flag_file.exists() {
        return ProbeResult::ok(RebootStatus {
            required: false,
            packages: None,
        });
    }

    let packages = match fs::read_to_string(pkgs_file) {
        Ok(text) => Some(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
        ),
        Err(err) => {
            if err.kind() != ErrorKind::NotFound {
                warn!(probe = "reboot_required", error = %err, "cannot read package list");
            }
            None
        }
    };

    ProbeResult::warn(RebootStatus {
        required: true,
        packages,
    })
}

pub fn backup_log(cron_file: &Path, log_file: &Path, now: SystemTime) -> ProbeResult<String> {
    if !cron_file.exists() {
        return ProbeResult::ok("Backup not enabled".to_string());
    }

    let meta = match fs::metadata(log_file) {
        Ok(meta) => meta,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return ProbeResult::warn("Missing Backup Log or Backup has never run".to_string());
        }
        Err(err) => return unreadable_log(log_file, err),
    };

    if meta.len() == 0 {
        return ProbeResult::warn("Backup Log is empty - Likely Backup Failed".to_string());
    }

    let age_days = meta
        .modified()
        .ok()
        .and_then(|mtime| now.duration_since(mtime).ok())
        .map(|age| age.as_secs_f64() / SECS_PER_DAY)
        .unwrap_or(0.0);
    if age_days > 1.0 {
        return ProbeResult::warn(format!("Backup last run {age_days:.0} days ago"));
    }

    match fs::read(log_file) {
        Ok(bytes) => ProbeResult::ok(String::from_utf8_lossy(&bytes).to_string()),
        Err(err) => unreadable_log(log_file, err),
    }
}

fn unreadable_log(log_file: &Path, source: std::io::Error) -> ProbeResult<String> {
    let err = ProbeError::Io {
        path: log_file.display().to_string(),
        source,
    };
    warn!(probe = "backup_log", error = %err, "cannot read backup log");
    ProbeResult::warn(format!("* Backup Log unreadable: {err} *"))
}

pub fn package_status() -> ProbeResult<Vec<PackageUpgrade>> {
    let listing = match run_command("apt", &["list", "--upgradable"]) {
        Ok(listing) => listing,
        Err(err) => {
            warn!(probe = "package_status", error = %err, "cannot list upgradable packages");
            return ProbeResult::warn(Vec::new());
        }
    };

    let mut upgrades = parse_apt_upgradable(&listing);
    if upgrades.is_empty() {
        return ProbeResult::ok(upgrades);
    }

    let mut args = vec!["-W", "-f=${Package}\t${binary:Summary}\n"];
    args.extend(upgrades.iter().map(|p| p.name.as_str()));
    match run_command("dpkg-query", &args) {
        Ok(out) => {
            let summaries = parse_dpkg_summaries(&out);
            for pkg in &mut upgrades {
                if let Some(summary) = summaries.get(&pkg.name) {
                    pkg.summary = summary.clone();
                }
            }
        }
        Err(err) => {
            warn!(probe = "package_status", error = %err, "package summaries unavailable");
        }
    }

    ProbeResult::ok(upgrades)
}

// Parses `apt list --upgradable`, whose lines look like
// `curl/stable-security 7.88.1-10+deb12u6 arm64 [upgradable from: 7.88.1-10+deb12u5]`.
fn parse_apt_upgradable(listing: &str) -> Vec<PackageUpgrade> {
    listing
        .lines()
        .filter_map(|line| {
            let (_, from) = line.split_once("[upgradable from: ")?;
            let from = from.trim_end().strip_suffix(']')?;
            let mut fields = line.split_whitespace();
            let name = fields.next()?.split('/').next()?;
            let to = fields.next()?;
            Some(PackageUpgrade {
                name: name.to_string(),
                from: from.trim().to_string(),
                to: to.to_string(),
                summary: String::new(),
            })
        })
        .collect()
}

fn parse_dpkg_summaries(out: &str) -> HashMap<String, String> {
    out.lines()
        .filter_map(|line| line.split_once('\t'))
        .map(|(name, summary)| {
            // Multi-arch packages are reported as name:arch.
            let name = name.split(':').next().unwrap_or(name);
            (name.to_string(), summary.trim().to_string())
        })
        .collect()
}

pub fn monitor_sync(state_file: &Path) -> ProbeResult<Option<String>> {
    let content = match fs::read_to_string(state_file) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => return ProbeResult::ok(None),
        Err(err) => {
            warn!(probe = "monitor_sync", error = %err, "cannot read sync state");
            return ProbeResult::warn(Some(format!(
                "* cannot read {}: {err} *",
                state_file.display()
            )));
        }
    };

    if content.matches("OK").count() < 2 {
        return ProbeResult::warn(Some("Issues exist with Monitor Sync Checker".to_string()));
    }
    ProbeResult::ok(Some("Monitor Sync Checker is OK".to_string()))
}
