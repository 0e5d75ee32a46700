// file: src/config/validator.rs
// version: 2.0.0
// guid: c5d04e9b-71f3-4b28-a6e0-93d1b5f7a2c4

//! Pure validation of operator input
//!
//! Nothing in here performs I/O. The interactive collector calls the field
//! parsers to decide whether to re-prompt, and [`validate`] assembles the
//! final [`ProvisioningConfig`] from a complete set of raw answers.

use super::{keys, BanPolicy, FeatureToggles, ProvisioningConfig, RawInput, TlsConfig};
use super::{DEFAULT_F2B_BAN_TIME, DEFAULT_F2B_FIND_TIME, DEFAULT_F2B_MAX_RETRY, DEFAULT_SSH_PORT};
use crate::error::ProvisionError;
use crate::Result;
use regex::Regex;
use std::collections::BTreeSet;
use tracing::debug;

/// Build a config from raw answers, failing on the first invalid or missing field
pub fn validate(raw: &RawInput) -> Result<ProvisioningConfig> {
    debug!("Validating {} raw configuration values", raw.len());

    let ssh_port = raw
        .get(keys::SSH_PORT)
        .map(parse_port)
        .transpose()?
        .unwrap_or(DEFAULT_SSH_PORT);

    let toggles = FeatureToggles {
        create_user: parse_toggle(raw.get(keys::CREATE_USER))?,
        ban_policy: parse_toggle(raw.get(keys::INSTALL_FAIL2BAN))?,
        congestion_tuning: parse_toggle(raw.get(keys::ENABLE_BBR))?,
        tls: parse_toggle(raw.get(keys::INSTALL_TLS))?,
        container_runtime: parse_toggle(raw.get(keys::INSTALL_DOCKER))?,
    };

    let user = if toggles.create_user {
        Some(parse_username(required(raw, keys::USER_NAME, keys::CREATE_USER)?)?)
    } else {
        None
    };

    let ban_policy = if toggles.ban_policy {
        Some(BanPolicy {
            max_retry: positive_or(raw, keys::F2B_MAX_RETRY, DEFAULT_F2B_MAX_RETRY)?,
            ban_time_secs: positive_or(raw, keys::F2B_BAN_TIME, DEFAULT_F2B_BAN_TIME)?,
            find_time_secs: positive_or(raw, keys::F2B_FIND_TIME, DEFAULT_F2B_FIND_TIME)?,
        })
    } else {
        None
    };

    let tls = if toggles.tls {
        Some(TlsConfig {
            domain: parse_domain(required(raw, keys::ACME_DOMAIN, keys::INSTALL_TLS)?)?,
            email: parse_email(required(raw, keys::ACME_EMAIL, keys::INSTALL_TLS)?)?,
        })
    } else {
        None
    };

    let extra_tcp_ports = match raw.get(keys::EXTRA_TCP_PORTS) {
        Some(list) => parse_port_list(list)?,
        None => BTreeSet::new(),
    };
    let extra_udp_ports = match raw.get(keys::EXTRA_UDP_PORTS) {
        Some(list) => parse_port_list(list)?,
        None => BTreeSet::new(),
    };

    Ok(ProvisioningConfig {
        ssh_port,
        toggles,
        user,
        ban_policy,
        tls,
        extra_tcp_ports,
        extra_udp_ports,
    })
}

fn required<'a>(raw: &'a RawInput, key: &str, toggle: &str) -> Result<&'a str> {
    raw.get(key).ok_or_else(|| {
        ProvisionError::validation(format!("{} is required when {} is enabled", key, toggle))
    })
}

fn positive_or(raw: &RawInput, key: &str, default: u32) -> Result<u32> {
    match raw.get(key) {
        Some(value) => parse_positive(value, key),
        None => Ok(default),
    }
}

/// TCP/UDP port in 1-65535
pub fn parse_port(value: &str) -> Result<u16> {
    let trimmed = value.trim();
    let number: u32 = trimmed
        .parse()
        .map_err(|_| ProvisionError::validation(format!("'{}' is not a port number", trimmed)))?;

    if number == 0 || number > u16::MAX as u32 {
        return Err(ProvisionError::validation(format!(
            "Port {} is outside the range 1-65535",
            number
        )));
    }

    Ok(number as u16)
}

/// Whitespace- or comma-separated port list; any bad token rejects the whole list
pub fn parse_port_list(value: &str) -> Result<BTreeSet<u16>> {
    let mut ports = BTreeSet::new();

    for token in value
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
    {
        let port = parse_port(token).map_err(|e| {
            ProvisionError::validation(format!("Invalid port token '{}': {}", token, e))
        })?;
        ports.insert(port);
    }

    Ok(ports)
}

/// yes/no answer; unanswered means yes
pub fn parse_toggle(value: Option<&str>) -> Result<bool> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(true);
    };

    match value.to_ascii_lowercase().as_str() {
        "y" | "yes" | "true" | "1" | "on" => Ok(true),
        "n" | "no" | "false" | "0" | "off" => Ok(false),
        other => Err(ProvisionError::validation(format!(
            "'{}' is not a yes/no answer",
            other
        ))),
    }
}

/// Strictly positive integer tunable
pub fn parse_positive(value: &str, what: &str) -> Result<u32> {
    let trimmed = value.trim();
    match trimmed.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ProvisionError::validation(format!(
            "{} must be a positive integer, got '{}'",
            what, trimmed
        ))),
    }
}

/// POSIX-portable login name
pub fn parse_username(value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ProvisionError::validation("Username cannot be empty"));
    }

    let pattern = Regex::new(r"^[a-z_][a-z0-9_-]{0,31}$").expect("Invalid username regex");
    if !pattern.is_match(trimmed) {
        return Err(ProvisionError::validation(format!(
            "'{}' is not a valid login name (lowercase letters, digits, '-' and '_', max 32)",
            trimmed
        )));
    }

    if trimmed == "root" {
        return Err(ProvisionError::validation("Refusing to create an account named root"));
    }

    Ok(trimmed.to_string())
}

/// Fully-qualified domain name for certificate issuance
pub fn parse_domain(value: &str) -> Result<String> {
    let trimmed = value.trim().trim_end_matches('.').to_ascii_lowercase();
    if trimmed.is_empty() {
        return Err(ProvisionError::validation("Domain cannot be empty"));
    }

    if trimmed.len() > 253 || !trimmed.contains('.') {
        return Err(ProvisionError::validation(format!(
            "'{}' is not a fully-qualified domain name",
            trimmed
        )));
    }

    let label = Regex::new(r"^[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?$").expect("Invalid label regex");
    if let Some(bad) = trimmed.split('.').find(|l| !label.is_match(l)) {
        return Err(ProvisionError::validation(format!(
            "Domain label '{}' in '{}' is invalid",
            bad, trimmed
        )));
    }

    Ok(trimmed)
}

/// ACME contact address
pub fn parse_email(value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ProvisionError::validation("Email cannot be empty"));
    }

    let (local, domain) = trimmed
        .split_once('@')
        .ok_or_else(|| ProvisionError::validation(format!("'{}' is not an email address", trimmed)))?;

    if local.is_empty() || local.chars().any(char::is_whitespace) || domain.contains('@') {
        return Err(ProvisionError::validation(format!(
            "'{}' is not an email address",
            trimmed
        )));
    }
    parse_domain(domain)?;

    Ok(trimmed.to_string())
}
