mod collectors;
mod config;
mod mail;
mod render;
mod report;
mod state;

use clap::Parser;
use collectors::hardware::PiModels;
use collectors::ProbeContext;
use config::Config;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "statusmail")]
#[command(version, about = "Emails a daily HTML health report for this host")]
struct Cli {
    #[arg(long, default_value = "/etc/DailyReport.yaml")]
    config: String,
    /// Send a post-reboot alert instead of the daily report.
    #[arg(long)]
    reboot_alert: bool,
    /// Print the subject and gathered state instead of sending mail.
    #[arg(long)]
    no_email: bool,
    #[arg(long)]
    print_default_config: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    if cli.print_default_config {
        println!("{}", Config::example_yaml());
        return;
    }

    let cfg = match Config::load_from_file(&cli.config) {
        Ok(cfg) => cfg,
        Err(err) => {
            error!(error = %err, "failed to load configuration");
            std::process::exit(1);
        }
    };

    let pi_models = match &cfg.report.pi_models_file {
        Some(path) => PiModels::load_from_file(path),
        None => PiModels::bundled(),
    };
    let pi_models = match pi_models {
        Ok(models) => models,
        Err(err) => {
            error!(error = %err, "failed to load Raspberry Pi model table");
            std::process::exit(1);
        }
    };

    info!(
        config = %cli.config,
        reboot_alert = cli.reboot_alert,
        pi_models = pi_models.len(),
        "starting statusmail"
    );

    let ctx = match ProbeContext::new(&cfg, pi_models) {
        Ok(ctx) => ctx,
        Err(err) => {
            error!(error = %err, "failed to build HTTP client");
            std::process::exit(1);
        }
    };
    let state = collectors::gather(&ctx).await;
    let decision = report::decide(&state, cli.reboot_alert, &cfg.report.warn_on);

    if cli.no_email {
        println!("{}", decision.subject);
        match serde_json::to_string_pretty(&state) {
            Ok(json) => println!("{json}"),
            Err(err) => error!(error = %err, "failed to serialize report state"),
        }
        return;
    }

    let body = render::render(&state, &decision);
    let fqdn = mail::fqdn(&state.hostname);
    let message =
        mail::build_message(&cfg.mail, &state.hostname, &fqdn, &decision.subject, body);
    let delivered = match message {
        Ok(message) => mail::send(&cfg.mail, &fqdn, message).await,
        Err(err) => Err(err),
    };
    if let Err(err) = delivered {
        error!(error = %err, to = %cfg.envelope_sendto(), "failed to deliver report");
        std::process::exit(2);
    }

    info!(
        subject = %decision.subject,
        recipients = cfg.sendto().len(),
        "report sent"
    );
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
