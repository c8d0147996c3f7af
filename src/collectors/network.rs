use crate::state::{InterfaceAddress, ProbeResult, NETWORK_ERROR};
use reqwest::{Client, StatusCode};
use std::net::IpAddr;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum PublicIpError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("connection failed: {0}")]
    Connect(reqwest::Error),
    #[error("request failed: {0}")]
    Request(reqwest::Error),
    #[error("unexpected HTTP status {0}")]
    Status(StatusCode),
    #[error("failed to read response body: {0}")]
    Body(reqwest::Error),
    #[error("malformed response: {0}")]
    Malformed(String),
}

pub fn local_ip() -> ProbeResult<Vec<InterfaceAddress>> {
    let addrs = match nix::ifaddrs::getifaddrs() {
        Ok(addrs) => addrs,
        Err(err) => {
            warn!(probe = "local_ip", error = %err, "getifaddrs failed");
            return ProbeResult::warn(Vec::new());
        }
    };

    let found = addrs.filter_map(|ifaddr| {
        let address = ifaddr.address.as_ref()?.as_sockaddr_in()?.ip();
        Some(InterfaceAddress {
            interface: ifaddr.interface_name.clone(),
            address,
            netmask: ifaddr
                .netmask
                .as_ref()
                .and_then(|n| n.as_sockaddr_in())
                .map(|n| n.ip()),
            broadcast: ifaddr
                .broadcast
                .as_ref()
                .and_then(|b| b.as_sockaddr_in())
                .map(|b| b.ip()),
        })
    });

    select_interfaces(found)
}

fn select_interfaces(
    found: impl IntoIterator<Item = InterfaceAddress>,
) -> ProbeResult<Vec<InterfaceAddress>> {
    let interfaces: Vec<InterfaceAddress> = found
        .into_iter()
        .filter(|iface| iface.interface != "lo")
        .collect();

    if interfaces.is_empty() {
        warn!(probe = "local_ip", "no IPv4 interfaces found");
        return ProbeResult::warn(interfaces);
    }
    ProbeResult::ok(interfaces)
}

pub async fn public_ip(client: &Client, url: &str, timeout: Duration) -> ProbeResult<String> {
    match fetch_public_ip(client, url, timeout).await {
        Ok(ip) => {
            debug!(probe = "public_ip", ip = %ip, "public address resolved");
            ProbeResult::ok(ip)
        }
        Err(err) => {
            warn!(probe = "public_ip", url, error = %err, "public IP lookup failed");
            ProbeResult::warn(NETWORK_ERROR.to_string())
        }
    }
}

async fn fetch_public_ip(
    client: &Client,
    url: &str,
    timeout: Duration,
) -> Result<String, PublicIpError> {
    let classify = |err: reqwest::Error| {
        if err.is_timeout() {
            PublicIpError::Timeout(timeout)
        } else if err.is_connect() {
            PublicIpError::Connect(err)
        } else {
            PublicIpError::Request(err)
        }
    };

    let resp = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(classify)?;

    let status = resp.status();
    if !status.is_success() {
        return Err(PublicIpError::Status(status));
    }

    let body = resp.text().await.map_err(|err| {
        if err.is_timeout() {
            PublicIpError::Timeout(timeout)
        } else {
            PublicIpError::Body(err)
        }
    })?;
    parse_public_ip(&body)
}

// Accepts a bare address, or a JSON object carrying it as `origin`
// (httpbin) or `ip` (ipify and friends). `origin` may list proxies
// separated by commas; every entry must be an address.
fn parse_public_ip(body: &str) -> Result<String, PublicIpError> {
    let trimmed = body.trim();
    if trimmed.parse::<IpAddr>().is_ok() {
        return Ok(trimmed.to_string());
    }

    let json: serde_json::Value = serde_json::from_str(trimmed)
        .map_err(|_| PublicIpError::Malformed(snippet(trimmed)))?;
    let field = json
        .get("origin")
        .or_else(|| json.get("ip"))
        .and_then(|v| v.as_str())
        .ok_or_else(|| PublicIpError::Malformed(snippet(trimmed)))?;

    let all_addresses = field
        .split(',')
        .all(|part| part.trim().parse::<IpAddr>().is_ok());
    if field.trim().is_empty() || !all_addresses {
        return Err(PublicIpError::Malformed(snippet(trimmed)));
    }
    Ok(field.trim().to_string())
}

fn snippet(body: &str) -> String {
    const MAX: usize = 80;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
