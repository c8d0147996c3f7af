use crate::state::{ProbeKind, ReportState};

pub const WARNING_SUFFIX: &str = " *** WARNING ***";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateDecision {
    pub subject: String,
    pub warning: bool,
    pub reboot_alert: bool,
}

pub fn decide(state: &ReportState, reboot_alert: bool, warn_on: &[ProbeKind]) -> AggregateDecision {
    let designated = warn_on
        .iter()
        .filter(|kind| **kind != ProbeKind::Uptime)
        .fold(false, |acc, kind| acc | state.warn_of(*kind));
    let warning = if reboot_alert {
        designated
    } else {
        designated | state.uptime.warn
    };

    let label = if reboot_alert {
        "Reboot Alert"
    } else {
        "Daily Report"
    };
    let suffix = if warning { WARNING_SUFFIX } else { "" };

    AggregateDecision {
        subject: format!("{} {label}{suffix}", state.hostname),
        warning,
        reboot_alert,
    }
}
