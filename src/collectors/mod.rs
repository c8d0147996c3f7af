pub mod hardware;
pub mod maintenance;
pub mod network;
pub mod system;

use crate::collectors::hardware::PiModels;
use crate::config::Config;
use crate::state::{ProbeResult, ReportState};
use chrono::Local;
use reqwest::Client;
use std::path::Path;
use std::process::Command;
use std::time::{Duration, Instant};
use sysinfo::{System, SystemExt};
use thiserror::Error;
use tracing::{debug, info, warn};

pub struct ProbeContext {
    pub client: Client,
    pub public_ip_url: String,
    pub public_ip_timeout: Duration,
    pub pi_models: PiModels,
}

impl ProbeContext {
    pub fn new(cfg: &Config, pi_models: PiModels) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(concat!("statusmail/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            public_ip_url: cfg.public_ip.url.clone(),
            public_ip_timeout: Duration::from_secs(cfg.public_ip.timeout_secs),
            pi_models,
        })
    }
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("could not run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("{program} exited with {status}: {stderr}")]
    Status {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("{path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

pub async fn gather(ctx: &ProbeContext) -> ReportState {
    let started = Instant::now();
    let generated_at = Local::now();
    let sys = System::new();

    let hostname = sys.host_name().unwrap_or_else(|| "localhost".to_string());
    info!(host = %hostname, "gathering report");

    let uptime = timed("uptime", || system::uptime(&sys));
    let reboot_required = timed("reboot_required", || {
        maintenance::reboot_required(
            Path::new(maintenance::REBOOT_REQUIRED_FILE),
            Path::new(maintenance::REBOOT_REQUIRED_PKGS_FILE),
        )
    });
    let memory = timed("memory", system::memory_usage);
    let distribution = timed("distribution", system::distribution);
    let kernel = timed("kernel", system::kernel);
    let root_fs_writes = timed("root_fs_writes", || {
        system::rootfs_writes(Path::new(system::EXT4_SYSFS_ROOT))
    });
    let fs_space = timed("fs_space", system::fs_space);
    let fs_inode = timed("fs_inode", system::fs_inode);
    let logged_on = timed("logged_on", system::logged_on);
    let local_ip = timed("local_ip", network::local_ip);

    let public_ip_started = Instant::now();
    let public_ip =
        network::public_ip(&ctx.client, &ctx.public_ip_url, ctx.public_ip_timeout).await;
    debug!(
        probe = "public_ip",
        elapsed = %humantime::format_duration(round_millis(public_ip_started.elapsed())),
        "probe finished"
    );

    let raspberry_pi_model = timed("raspberry_pi_model", || {
        hardware::raspberry_pi_model(Path::new(hardware::CPUINFO_FILE), &ctx.pi_models)
    });
    let raid_status = timed("raid_status", || {
        hardware::raid_status(Path::new(hardware::MDSTAT_FILE))
    });
    let backup_log = timed("backup_log", || {
        maintenance::backup_log(
            Path::new(maintenance::BACKUP_CRON_FILE),
            Path::new(maintenance::BACKUP_LOG_FILE),
            std::time::SystemTime::now(),
        )
    });
    let package_status = timed("package_status", maintenance::package_status);
    let monitor_sync = timed("monitor_sync", || {
        maintenance::monitor_sync(Path::new(maintenance::MONITOR_SYNC_FILE))
    });

    let state = ReportState {
        hostname,
        generated_at,
        uptime,
        reboot_required,
        memory,
        distribution,
        kernel,
        root_fs_writes,
        fs_space,
        fs_inode,
        logged_on,
        local_ip,
        public_ip,
        raspberry_pi_model,
        raid_status,
        backup_log,
        package_status,
        monitor_sync,
    };

    info!(
        elapsed = %humantime::format_duration(round_millis(started.elapsed())),
        warnings = ?state.warning_probes(),
        "report gathered"
    );
    state
}

fn timed<T>(probe: &'static str, run: impl FnOnce() -> ProbeResult<T>) -> ProbeResult<T> {
    let started = Instant::now();
    let result = run();
    debug!(
        probe,
        warn = result.warn,
        elapsed = %humantime::format_duration(round_millis(started.elapsed())),
        "probe finished"
    );
    result
}

fn round_millis(d: Duration) -> Duration {
    Duration::from_millis(d.as_millis() as u64)
}

pub(crate) fn run_command(program: &str, args: &[&str]) -> Result<String, ProbeError> {
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|source| ProbeError::Spawn {
            program: program.to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(ProbeError::Status {
            program: program.to_string(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

pub(crate) fn command_probe(
    probe: &'static str,
    program: &str,
    args: &[&str],
) -> ProbeResult<String> {
    match run_command(program, args) {
        Ok(text) => ProbeResult::ok(text),
        Err(err) => {
            warn!(probe, error = %err, "probe command failed");
            ProbeResult::warn(format!("* COMMAND ERROR: {err} *"))
        }
    }
}
