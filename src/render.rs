use crate::report::AggregateDecision;
use crate::state::{InterfaceAddress, PackageUpgrade, ProbeKind, RebootStatus, ReportState, RootFsWrites};
use chrono::{DateTime, Local, TimeDelta};
use maud::html;

pub const SECTION_WARNING: &str = " - ** WARNING **";

const TIMESTAMP_FORMAT: &str = "%a %d %b %Y %H:%M:%S %:z";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedSection {
    pub title: String,
    pub html: String,
}

pub fn render(state: &ReportState, decision: &AggregateDecision) -> String {
    render_sections(state, decision)
        .into_iter()
        .map(|section| section.html)
        .collect()
}

pub fn render_sections(state: &ReportState, decision: &AggregateDecision) -> Vec<RenderedSection> {
    ProbeKind::ALL
        .into_iter()
        .filter_map(|kind| {
            let content = section_content(state, kind)?;
            let warn = match kind {
                ProbeKind::Uptime if decision.reboot_alert => false,
                _ => state.warn_of(kind),
            };
            Some(format_section(kind.title(), &content, warn))
        })
        .collect()
}

fn section_content(state: &ReportState, kind: ProbeKind) -> Option<String> {
    let content = match kind {
        ProbeKind::Uptime => uptime(state.uptime.value, state.generated_at),
        ProbeKind::RebootRequired => reboot_required(&state.reboot_required.value),
        ProbeKind::Memory => state.memory.value.clone(),
        ProbeKind::Distribution => state.distribution.value.clone(),
        ProbeKind::Kernel => state.kernel.value.clone(),
        ProbeKind::RootFsWrites => root_fs_writes(&state.root_fs_writes.value),
        ProbeKind::FsSpace => state.fs_space.value.clone(),
        ProbeKind::FsInode => state.fs_inode.value.clone(),
        ProbeKind::LoggedOn => state.logged_on.value.clone(),
        ProbeKind::LocalIp => local_ip(&state.local_ip.value),
        ProbeKind::PublicIp => state.public_ip.value.clone(),
        ProbeKind::RaspberryPiModel => non_empty(state.raspberry_pi_model.value.as_deref())?,
        ProbeKind::RaidStatus => non_empty(state.raid_status.value.as_deref())?,
        ProbeKind::BackupLog => state.backup_log.value.clone(),
        ProbeKind::PackageStatus => package_status(&state.package_status.value),
        ProbeKind::MonitorSync => non_empty(state.monitor_sync.value.as_deref())?,
    };
    Some(content)
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

fn format_section(title: &str, content: &str, warn: bool) -> RenderedSection {
    let title = if warn {
        format!("{title}{SECTION_WARNING}")
    } else {
        title.to_string()
    };
    let html = html! {
        b { u { (title) } } "\n"
        pre { "\n" (content) } "\n"
    };
    RenderedSection {
        title,
        html: html.into_string(),
    }
}

fn uptime(seconds: f64, generated_at: DateTime<Local>) -> String {
    let seconds = seconds.max(0.0);
    let days = (seconds / 86_400.0).floor();
    let rest = seconds - days * 86_400.0;
    let hours = (rest / 3600.0).floor();
    let rest = rest - hours * 3600.0;
    let minutes = (rest / 60.0).floor();
    let secs = rest - minutes * 60.0;

    let boot_time = TimeDelta::try_milliseconds((seconds * 1000.0) as i64)
        .and_then(|since_boot| generated_at.checked_sub_signed(since_boot))
        .unwrap_or(generated_at);

    format!(
        "System Uptime          : {days} days {hours:02}:{minutes:02}:{secs:05.2}\n\
         System Boot time       : {}\n\
         Report Generation Time : {}\n",
        boot_time.format(TIMESTAMP_FORMAT),
        generated_at.format(TIMESTAMP_FORMAT),
    )
}

fn reboot_required(status: &RebootStatus) -> String {
    if !status.required {
        return "No reboot required\n".to_string();
    }
    match &status.packages {
        Some(packages) if !packages.is_empty() => {
            let mut out = "Reboot required by:\n".to_string();
            for pkg in packages {
                out.push_str("  ");
                out.push_str(pkg);
                out.push('\n');
            }
            out
        }
        _ => "Reboot required\n".to_string(),
    }
}

fn root_fs_writes(writes: &RootFsWrites) -> String {
    match writes.lifetime_write_kbytes {
        Some(kbytes) => format!("{} {}", writes.device, group_thousands(kbytes)),
        None => format!("{} unavailable", writes.device),
    }
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn local_ip(interfaces: &[InterfaceAddress]) -> String {
    if interfaces.is_empty() {
        return "No Interfaces Found\n".to_string();
    }
    let rows = interfaces
        .iter()
        .map(|iface| {
            vec![
                iface.interface.clone(),
                iface.address.to_string(),
                iface.netmask.map_or_else(|| "-".to_string(), |m| m.to_string()),
                iface.broadcast.map_or_else(|| "-".to_string(), |b| b.to_string()),
            ]
        })
        .collect::<Vec<_>>();
    format_table(&["Interface", "Address", "Netmask", "Broadcast"], &rows)
}

fn package_status(packages: &[PackageUpgrade]) -> String {
    if packages.is_empty() {
        return "No Packages are available for upgrade\n".to_string();
    }
    let rows = packages
        .iter()
        .map(|p| vec![p.name.clone(), p.from.clone(), p.to.clone(), p.summary.clone()])
        .collect::<Vec<_>>();
    let mut out = format_table(&["Package", "From", "To", "Summary"], &rows);
    let noun = if packages.len() == 1 { "package" } else { "packages" };
    out.push_str(&format!("\n{} {noun} can be upgraded\n", packages.len()));
    out
}

// Left-aligned columns two spaces apart, under a dashed rule as wide as
// the header line.
fn format_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let header_cells: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    let header = format_row(&header_cells, &widths);
    let mut out = String::new();
    out.push_str(&header);
    out.push('\n');
    out.push_str(&"-".repeat(header.chars().count()));
    out.push('\n');
    for row in rows {
        out.push_str(&format_row(row, &widths));
        out.push('\n');
    }
    out
}

fn format_row(cells: &[String], widths: &[usize]) -> String {
    let line = cells
        .iter()
        .zip(widths)
        .map(|(cell, &width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join("  ");
    line.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::quiet_state;
    use crate::state::ProbeResult;
    use std::net::Ipv4Addr;

    fn plain_decision() -> AggregateDecision {
        AggregateDecision {
            subject: "pi-nas Daily Report".to_string(),
            warning: false,
            reboot_alert: false,
        }
    }

    fn titles(state: &ReportState, decision: &AggregateDecision) -> Vec<String> {
        render_sections(state, decision)
            .into_iter()
            .map(|s| s.title)
            .collect()
    }

    #[test]
    fn sections_follow_probe_order_and_skip_empty_ones() {
        let state = quiet_state();
        assert_eq!(
            titles(&state, &plain_decision()),
            vec![
                "System Uptime",
                "Reboot Required Details",
                "Memory Usage",
                "Distribution Details",
                "Kernel Details",
                "Root FS Writes Details",
                "FS Space Details",
                "FS Inode Details",
                "Logged On Details",
                "Local IP Details",
                "Public IP Details",
                "Backup Log Details",
                "Package Status Details",
            ]
        );
    }

    #[test]
    fn present_optional_sections_are_rendered() {
        let mut state = quiet_state();
        state.raspberry_pi_model = ProbeResult::ok(Some("4 Model B Rev 1.4 8GB".to_string()));
        state.raid_status = ProbeResult::warn(Some("Multiple Devices Found: [md0, md1]".to_string()));
        state.monitor_sync = ProbeResult::ok(Some("Monitor Sync Checker is OK".to_string()));

        let titles = titles(&state, &plain_decision());
        let tail: Vec<&str> = titles.iter().skip(10).map(String::as_str).collect();
        assert_eq!(
            tail,
            vec![
                "Public IP Details",
                "Raspberry Pi Model Details",
                "Raid Status Details - ** WARNING **",
                "Backup Log Details",
                "Package Status Details",
                "Monitor Sync Details",
            ]
        );
    }

    #[test]
    fn empty_raid_and_pi_contribute_nothing() {
        let state = quiet_state();
        let body = render(&state, &plain_decision());
        assert!(!body.contains("Raid Status"));
        assert!(!body.contains("Raspberry Pi"));
        assert!(!body.contains("Monitor Sync"));
    }

    #[test]
    fn every_warning_section_carries_suffix() {
        let mut state = quiet_state();
        state.memory.warn = true;
        state.kernel.warn = true;
        let body = render(&state, &plain_decision());
        assert!(body.contains("<b><u>Memory Usage - ** WARNING **</u></b>"));
        assert!(body.contains("<b><u>Kernel Details - ** WARNING **</u></b>"));
        assert!(body.contains("<b><u>Distribution Details</u></b>"));
        assert_eq!(body.matches("** WARNING **").count(), 2);
    }

    #[test]
    fn untrusted_text_is_escaped() {
        let mut state = quiet_state();
        state.logged_on = ProbeResult::ok("<script>alert('x')</script> & \"more\"\n".to_string());
        let body = render(&state, &plain_decision());
        assert!(!body.contains("<script>"));
        assert!(body.contains(
            "&lt;script&gt;alert('x')&lt;/script&gt; &amp; &quot;more&quot;"
        ));
    }

    #[test]
    fn empty_tables_use_placeholders() {
        let mut state = quiet_state();
        state.local_ip = ProbeResult::warn(Vec::new());
        let body = render(&state, &plain_decision());
        assert!(body.contains(
            "<b><u>Local IP Details - ** WARNING **</u></b>\n<pre>\nNo Interfaces Found\n</pre>\n"
        ));
        assert!(body.contains(
            "<b><u>Package Status Details</u></b>\n<pre>\nNo Packages are available for upgrade\n</pre>\n"
        ));
    }

    #[test]
    fn uptime_section_shows_boot_and_report_times() {
        let state = quiet_state();
        let text = uptime(200_000.0, state.generated_at);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "System Uptime          : 2 days 07:33:20.00");
        assert!(lines[1].starts_with("System Boot time       : Tue 27 Feb 2024 22:26:40"));
        assert!(lines[2].starts_with("Report Generation Time : Fri 01 Mar 2024 06:00:00"));
        let offset = lines[2].rsplit(' ').next().unwrap_or_default();
        assert_eq!(offset.len(), 6, "{offset}");
        assert!(offset.starts_with('+') || offset.starts_with('-'), "{offset}");
        assert_eq!(&offset[3..4], ":");
    }

    #[test]
    fn fractional_uptime_keeps_hundredths() {
        let state = quiet_state();
        let text = uptime(3_661.5, state.generated_at);
        assert!(text.starts_with("System Uptime          : 0 days 01:01:01.50\n"));
    }

    #[test]
    fn root_fs_writes_groups_digits() {
        let writes = RootFsWrites {
            device: "/dev/mmcblk0p2".to_string(),
            lifetime_write_kbytes: Some(1_234_567),
        };
        assert_eq!(root_fs_writes(&writes), "/dev/mmcblk0p2 1,234,567");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1,000");

        let unknown = RootFsWrites {
            device: "/dev/sda1".to_string(),
            lifetime_write_kbytes: None,
        };
        assert_eq!(root_fs_writes(&unknown), "/dev/sda1 unavailable");
    }

    #[test]
    fn package_table_has_header_rule_and_summary() {
        let packages = vec![
            PackageUpgrade {
                name: "curl".to_string(),
                from: "7.88.1-10+deb12u5".to_string(),
                to: "7.88.1-10+deb12u6".to_string(),
                summary: "command line tool for transferring data".to_string(),
            },
            PackageUpgrade {
                name: "libc6".to_string(),
                from: "2.36-9".to_string(),
                to: "2.36-10".to_string(),
                summary: "GNU C Library".to_string(),
            },
        ];
        let text = package_status(&packages);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "Package  From               To                 Summary"
        );
        assert_eq!(lines[1], "-".repeat(lines[0].len()));
        assert_eq!(
            lines[2],
            "curl     7.88.1-10+deb12u5  7.88.1-10+deb12u6  command line tool for transferring data"
        );
        assert_eq!(
            lines[3],
            "libc6    2.36-9             2.36-10            GNU C Library"
        );
        assert_eq!(lines[4], "");
        assert_eq!(lines[5], "2 packages can be upgraded");
    }

    #[test]
    fn interface_table_marks_missing_fields() {
        let text = local_ip(&[InterfaceAddress {
            interface: "wlan0".to_string(),
            address: Ipv4Addr::new(10, 1, 2, 3),
            netmask: None,
            broadcast: None,
        }]);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Interface  Address   Netmask  Broadcast");
        assert_eq!(lines[1].len(), lines[0].len());
        assert_eq!(lines[2], "wlan0      10.1.2.3  -        -");
    }

    #[test]
    fn reboot_section_lists_packages() {
        let status = RebootStatus {
            required: true,
            packages: Some(vec!["libc6".to_string()]),
        };
        assert_eq!(reboot_required(&status), "Reboot required by:\n  libc6\n");
        let bare = RebootStatus {
            required: true,
            packages: None,
        };
        assert_eq!(reboot_required(&bare), "Reboot required\n");
    }
}
