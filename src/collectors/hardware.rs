use crate::collectors::run_command;
use crate::config::ConfigError;
use crate::state::ProbeResult;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, warn};

pub const CPUINFO_FILE: &str = "/proc/cpuinfo";
pub const MDSTAT_FILE: &str = "/proc/mdstat";

#[derive(Debug, Clone, Default)]
pub struct PiModels {
    models: HashMap<String, String>,
}

impl PiModels {
    pub fn bundled() -> Result<Self, ConfigError> {
        Self::from_yaml(include_str!("../../pi_models.yaml"), "bundled pi_models.yaml")
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let path_display = path_ref.display().to_string();
        let text = fs::read_to_string(path_ref).map_err(|err| ConfigError::PiModels {
            path: path_display.clone(),
            reason: err.to_string(),
        })?;
        Self::from_yaml(&text, &path_display)
    }

    fn from_yaml(text: &str, origin: &str) -> Result<Self, ConfigError> {
        let raw: HashMap<String, String> =
            serde_yaml::from_str(text).map_err(|err| ConfigError::PiModels {
                path: origin.to_string(),
                reason: err.to_string(),
            })?;
        let models = raw
            .into_iter()
            .map(|(code, model)| (code.trim().to_ascii_lowercase(), model))
            .collect();
        Ok(Self { models })
    }

    pub fn lookup(&self, revision: &str) -> Option<&str> {
        self.models
            .get(&revision.trim().to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }
}

pub fn raspberry_pi_model(cpuinfo: &Path, models: &PiModels) -> ProbeResult<Option<String>> {
    let text = match fs::read_to_string(cpuinfo) {
        Ok(text) => text,
        Err(err) => {
            debug!(probe = "raspberry_pi_model", error = %err, "cpuinfo unreadable");
            return ProbeResult::ok(None);
        }
    };

    let Some(revision) = cpuinfo_revision(&text) else {
        return ProbeResult::ok(None);
    };

    match models.lookup(revision) {
        Some(model) => ProbeResult::ok(Some(model.to_string())),
        None => {
            warn!(probe = "raspberry_pi_model", revision, "unknown revision code");
            ProbeResult::warn(Some(format!("** UNKNOWN PI: {revision} **")))
        }
    }
}

fn cpuinfo_revision(text: &str) -> Option<&str> {
    text.lines()
        .filter(|line| line.starts_with("Revision"))
        .find_map(|line| line.split_once(':'))
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

#[derive(Debug, PartialEq)]
enum MdstatSummary {
    NoDevices,
    Multiple(Vec<String>),
    Single { device: String, degraded: bool },
}

pub fn raid_status(mdstat: &Path) -> ProbeResult<Option<String>> {
    let text = match fs::read_to_string(mdstat) {
        Ok(text) => text,
        Err(err) if err.kind() == ErrorKind::NotFound => return ProbeResult::ok(None),
        Err(err) => {
            warn!(probe = "raid_status", error = %err, "cannot read mdstat");
            return ProbeResult::warn(Some(format!("* cannot read {}: {err} *", mdstat.display())));
        }
    };

    match parse_mdstat(&text) {
        MdstatSummary::NoDevices => ProbeResult::ok(None),
        MdstatSummary::Multiple(devices) => {
            // Two arrays usually means a mirror split in half; more is a
            // deliberate multi-array host.
            let warn = devices.len() == 2;
            ProbeResult::new(
                Some(format!("Multiple Devices Found: [{}]", devices.join(", "))),
                warn,
            )
        }
        MdstatSummary::Single { device, degraded } => {
            let dev_path = format!("/dev/{device}");
            match run_command("mdadm", &["--query", "--detail", &dev_path]) {
                Ok(detail) => ProbeResult::new(Some(detail), degraded),
                Err(err) => {
                    warn!(probe = "raid_status", device = %device, error = %err, "mdadm failed");
                    ProbeResult::warn(Some(format!("* COMMAND ERROR: {err} *")))
                }
            }
        }
    }
}

fn parse_mdstat(text: &str) -> MdstatSummary {
    let devices: Vec<String> = text.lines().filter_map(md_device_name).collect();

    match devices.len() {
        0 => MdstatSummary::NoDevices,
        1 => {
            let status = text
                .lines()
                .filter(|line| line.contains("blocks "))
                .find_map(member_status);
            let degraded = status.is_some_and(|s| s.contains('_'));
            MdstatSummary::Single {
                device: devices.into_iter().next().unwrap_or_default(),
                degraded,
            }
        }
        _ => MdstatSummary::Multiple(devices),
    }
}

fn md_device_name(line: &str) -> Option<String> {
    let rest = line.strip_prefix("md")?;
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    Some(format!("md{digits}"))
}

// The trailing `[UU]` / `[U_]` member map of a `blocks` line.
fn member_status(line: &str) -> Option<&str> {
    let open = line.rfind('[')?;
    let close = line.rfind(']')?;
    (close > open).then(|| &line[open + 1..close])
}
