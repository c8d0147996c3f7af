use crate::collectors::run_command;
use crate::config::MailConfig;
use lettre::address::AddressError;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::transport::smtp::extension::ClientId;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("invalid address {address:?}: {source}")]
    Address {
        address: String,
        source: AddressError,
    },
    #[error("failed to build message: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("SMTP delivery failed: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

pub fn fqdn(hostname: &str) -> String {
    match run_command("hostname", &["--fqdn"]) {
        Ok(out) if !out.trim().is_empty() => out.trim().to_string(),
        Ok(_) => hostname.to_string(),
        Err(err) => {
            warn!(error = %err, "cannot resolve fqdn, using hostname");
            hostname.to_string()
        }
    }
}

fn mailbox(name: &str, address: &str) -> Result<Mailbox, DeliveryError> {
    let parsed = address.parse().map_err(|source| DeliveryError::Address {
        address: address.to_string(),
        source,
    })?;
    Ok(Mailbox::new(Some(name.to_string()), parsed))
}

pub fn build_message(
    cfg: &MailConfig,
    hostname: &str,
    fqdn: &str,
    subject: &str,
    body: String,
) -> Result<Message, DeliveryError> {
    let mut builder = Message::builder()
        .from(mailbox(hostname, &format!("root@{fqdn}"))?)
        .subject(subject)
        .header(ContentType::TEXT_HTML);
    for (full_name, email) in &cfg.sendto {
        builder = builder.to(mailbox(full_name, email)?);
    }
    Ok(builder.body(body)?)
}

pub async fn send(cfg: &MailConfig, fqdn: &str, message: Message) -> Result<(), DeliveryError> {
    let tls = TlsParameters::new(cfg.server.clone())?;
    let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(cfg.server.as_str())
        .port(cfg.port)
        .hello_name(ClientId::Domain(fqdn.to_string()))
        .tls(Tls::Opportunistic(tls))
        .build();

    debug!(server = %cfg.server, port = cfg.port, "submitting report");
    let response = transport.send(message).await?;
    info!(
        server = %cfg.server,
        code = %response.code(),
        "report delivered"
    );
    Ok(())
}
