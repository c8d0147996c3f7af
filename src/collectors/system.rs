use crate::collectors::{command_probe, run_command, ProbeError};
use crate::state::{ProbeResult, RootFsWrites, UPTIME_WARN_SECS};
use std::fs;
use std::path::Path;
use sysinfo::{System, SystemExt};
use tracing::warn;

pub const EXT4_SYSFS_ROOT: &str = "/sys/fs/ext4";

const DF_EXCLUDES: [&str; 8] = [
    "-x", "devtmpfs", "-x", "tmpfs", "-x", "squashfs", "-x", "efivarfs",
];

pub fn uptime(system: &System) -> ProbeResult<f64> {
    uptime_from_secs(system.uptime() as f64)
}

fn uptime_from_secs(seconds: f64) -> ProbeResult<f64> {
    ProbeResult::new(seconds, seconds < UPTIME_WARN_SECS)
}

pub fn memory_usage() -> ProbeResult<String> {
    command_probe("memory", "free", &["-h"])
}

pub fn distribution() -> ProbeResult<String> {
    command_probe("distribution", "lsb_release", &["-d", "-c"])
}

pub fn kernel() -> ProbeResult<String> {
    command_probe("kernel", "uname", &["-snrvmo"])
}

pub fn fs_space() -> ProbeResult<String> {
    let mut args = vec!["-h"];
    args.extend(DF_EXCLUDES);
    command_probe("fs_space", "df", &args)
}

pub fn fs_inode() -> ProbeResult<String> {
    let mut args = vec!["-i"];
    args.extend(DF_EXCLUDES);
    command_probe("fs_inode", "df", &args)
}

pub fn logged_on() -> ProbeResult<String> {
    command_probe("logged_on", "who", &[])
}

pub fn rootfs_writes(ext4_root: &Path) -> ProbeResult<RootFsWrites> {
    match run_command("findmnt", &["/", "--output=source", "--noheadings"]) {
        Ok(source) => ProbeResult::ok(rootfs_writes_for(source.trim(), ext4_root)),
        Err(err) => {
            warn!(probe = "root_fs_writes", error = %err, "cannot find root device");
            ProbeResult::warn(RootFsWrites {
                device: format!("* COMMAND ERROR: {err} *"),
                lifetime_write_kbytes: None,
            })
        }
    }
}

fn rootfs_writes_for(device: &str, ext4_root: &Path) -> RootFsWrites {
    let dev_name = device.rsplit('/').next().unwrap_or(device);
    let lifetime_write_kbytes = match read_lifetime_writes(ext4_root, dev_name) {
        Ok(kbytes) => Some(kbytes),
        Err(err) => {
            warn!(probe = "root_fs_writes", error = %err, "ext4 write counter unavailable");
            None
        }
    };

    RootFsWrites {
        device: device.to_string(),
        lifetime_write_kbytes,
    }
}

fn read_lifetime_writes(ext4_root: &Path, dev_name: &str) -> Result<u64, ProbeError> {
    let path = ext4_root.join(dev_name).join("lifetime_write_kbytes");
    let io_err = |source: std::io::Error| ProbeError::Io {
        path: path.display().to_string(),
        source,
    };
    let text = fs::read_to_string(&path).map_err(io_err)?;
    text.trim().parse::<u64>().map_err(|e| {
        io_err(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })
}
