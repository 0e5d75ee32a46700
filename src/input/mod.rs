// file: src/input/mod.rs
// version: 1.0.0
// guid: 1d4e8a07-f6b3-4c52-9e81-b07c5f3a2d68

//! Operator input collection
//!
//! Values come from a static source (environment and env file) first. A
//! missing or invalid value is asked for when a terminal is attached;
//! otherwise missing values fall back to their defaults and invalid ones fail.

pub mod prompt;

pub use prompt::{Prompter, ScriptedPrompter, TerminalPrompter};

use crate::config::validator::{
    parse_domain, parse_email, parse_port, parse_port_list, parse_positive, parse_toggle,
    parse_username,
};
use crate::config::{
    keys, validate, ProvisioningConfig, RawInput, DEFAULT_F2B_BAN_TIME, DEFAULT_F2B_FIND_TIME,
    DEFAULT_F2B_MAX_RETRY, DEFAULT_SSH_PORT,
};
use crate::error::ProvisionError;
use crate::Result;
use tracing::{debug, info};

type Check = fn(&str) -> Result<()>;

/// Produces a validated [`ProvisioningConfig`] from static input and prompts
pub struct InputCollector<'p> {
    source: RawInput,
    prompter: &'p mut dyn Prompter,
    interactive: bool,
    resolved: RawInput,
}

impl<'p> InputCollector<'p> {
    pub fn new(source: RawInput, prompter: &'p mut dyn Prompter) -> Self {
        let interactive = prompter.is_interactive();
        Self {
            source,
            prompter,
            interactive,
            resolved: RawInput::new(),
        }
    }

    /// Never prompt, even with a terminal attached
    pub fn non_interactive(mut self) -> Self {
        self.interactive = false;
        self
    }

    pub fn collect(mut self) -> Result<ProvisioningConfig> {
        info!(
            "Collecting configuration ({} static value(s), {})",
            self.source.len(),
            if self.interactive { "interactive" } else { "non-interactive" }
        );

        let port_default = DEFAULT_SSH_PORT.to_string();
        self.field(keys::SSH_PORT, "SSH port", Some(port_default.as_str()), |v| {
            parse_port(v).map(|_| ())
        })?;

        if self.toggle(keys::CREATE_USER, "Create a sudo user?")? {
            self.field(keys::USER_NAME, "Username", None, |v| parse_username(v).map(|_| ()))?;
        }

        if self.toggle(keys::INSTALL_FAIL2BAN, "Install fail2ban for SSH?")? {
            let retry = DEFAULT_F2B_MAX_RETRY.to_string();
            let ban = DEFAULT_F2B_BAN_TIME.to_string();
            let find = DEFAULT_F2B_FIND_TIME.to_string();
            self.field(keys::F2B_MAX_RETRY, "fail2ban max retries", Some(retry.as_str()), |v| {
                parse_positive(v, keys::F2B_MAX_RETRY).map(|_| ())
            })?;
            self.field(keys::F2B_BAN_TIME, "fail2ban ban time (seconds)", Some(ban.as_str()), |v| {
                parse_positive(v, keys::F2B_BAN_TIME).map(|_| ())
            })?;
            self.field(keys::F2B_FIND_TIME, "fail2ban find time (seconds)", Some(find.as_str()), |v| {
                parse_positive(v, keys::F2B_FIND_TIME).map(|_| ())
            })?;
        }

        self.toggle(keys::ENABLE_BBR, "Enable BBR congestion control?")?;

        if self.toggle(keys::INSTALL_TLS, "Issue a TLS certificate with certbot?")? {
            self.field(keys::ACME_DOMAIN, "Certificate domain", None, |v| {
                parse_domain(v).map(|_| ())
            })?;
            self.field(keys::ACME_EMAIL, "ACME contact email", None, |v| {
                parse_email(v).map(|_| ())
            })?;
        }

        self.toggle(keys::INSTALL_DOCKER, "Install Docker and the compose plugin?")?;

        self.field(
            keys::EXTRA_TCP_PORTS,
            "Extra TCP ports to open (space separated)",
            Some(""),
            |v| parse_port_list(v).map(|_| ()),
        )?;
        self.field(
            keys::EXTRA_UDP_PORTS,
            "Extra UDP ports to open (space separated)",
            Some(""),
            |v| parse_port_list(v).map(|_| ()),
        )?;

        validate(&self.resolved)
    }

    fn toggle(&mut self, key: &str, question: &str) -> Result<bool> {
        let answer = self.field(key, question, Some("yes"), |v| parse_toggle(Some(v)).map(|_| ()))?;
        parse_toggle(Some(&answer))
    }

    /// Resolve one field and record it
    fn field(&mut self, key: &str, question: &str, default: Option<&str>, check: Check) -> Result<String> {
        let value = self.resolve(key, question, default, check)?;
        debug!("{} resolved", key);
        self.resolved.set(key, value.clone());
        Ok(value)
    }

    fn resolve(&mut self, key: &str, question: &str, default: Option<&str>, check: Check) -> Result<String> {
        if let Some(value) = self.source.get(key).map(str::to_string) {
            match check(&value) {
                Ok(()) => return Ok(value),
                Err(e) if self.interactive => self.prompter.notify(&format!("{}: {}", key, e)),
                Err(e) => return Err(e),
            }
        } else if !self.interactive {
            return match default {
                Some(d) => Ok(d.to_string()),
                None => Err(ProvisionError::InteractiveRequired(format!(
                    "{} has no default; set it in the environment or run from a terminal",
                    key
                ))),
            };
        }

        loop {
            let answer = self.prompter.ask(question, default)?;
            let answer = answer.trim();
            let candidate = match (answer.is_empty(), default) {
                (false, _) => answer,
                (true, Some(d)) => d,
                (true, None) => {
                    self.prompter.notify("A value is required");
                    continue;
                }
            };

            match check(candidate) {
                Ok(()) => return Ok(candidate.to_string()),
                Err(e) => self.prompter.notify(&e.to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn all_off() -> RawInput {
        RawInput::new()
            .with(keys::CREATE_USER, "no")
            .with(keys::INSTALL_FAIL2BAN, "no")
            .with(keys::ENABLE_BBR, "no")
            .with(keys::INSTALL_TLS, "no")
            .with(keys::INSTALL_DOCKER, "no")
    }

    #[test]
    fn test_static_input_needs_no_prompts() {
        // Arrange
        let source = all_off()
            .with(keys::SSH_PORT, "2222")
            .with(keys::EXTRA_TCP_PORTS, "8080")
            .with(keys::EXTRA_UDP_PORTS, "51820");
        let mut prompter = ScriptedPrompter::new(Vec::<String>::new());

        // Act
        let config = InputCollector::new(source, &mut prompter).collect().unwrap();

        // Assert
        assert_eq!(config.ssh_port, 2222);
        assert_eq!(config.extra_tcp_ports, BTreeSet::from([8080]));
        assert!(prompter.asked.is_empty());
    }

    #[test]
    fn test_detached_uses_defaults() {
        let mut prompter = ScriptedPrompter::detached();

        let config = InputCollector::new(all_off(), &mut prompter).collect().unwrap();

        assert_eq!(config.ssh_port, 22);
        assert!(config.extra_udp_ports.is_empty());
    }

    #[test]
    fn test_detached_missing_domain_requires_terminal() {
        let source = all_off().with(keys::INSTALL_TLS, "yes");
        let mut prompter = ScriptedPrompter::detached();

        let err = InputCollector::new(source, &mut prompter).collect().unwrap_err();

        assert!(matches!(err, ProvisionError::InteractiveRequired(_)));
        assert!(err.to_string().contains("ACME_DOMAIN"));
    }

    #[test]
    fn test_detached_invalid_value_is_validation_error() {
        let source = all_off().with(keys::SSH_PORT, "70000");
        let mut prompter = ScriptedPrompter::detached();

        let err = InputCollector::new(source, &mut prompter).collect().unwrap_err();

        assert!(matches!(err, ProvisionError::Validation(_)));
    }

    #[test]
    fn test_invalid_static_value_is_reprompted() {
        // Arrange
        let source = all_off().with(keys::SSH_PORT, "abc");
        let mut prompter = ScriptedPrompter::new(["0", "2200", "", ""]);

        // Act
        let config = InputCollector::new(source, &mut prompter).collect().unwrap();

        // Assert
        assert_eq!(config.ssh_port, 2200);
        assert_eq!(prompter.notices.len(), 2);
    }

    #[test]
    fn test_empty_username_is_reprompted() {
        let source = all_off().with(keys::CREATE_USER, "yes").with(keys::SSH_PORT, "22");
        let mut prompter = ScriptedPrompter::new(["", "deploy", "", ""]);

        let config = InputCollector::new(source, &mut prompter).collect().unwrap();

        assert_eq!(config.user.as_deref(), Some("deploy"));
        assert_eq!(prompter.notices, vec!["A value is required".to_string()]);
    }

    #[test]
    fn test_prompts_follow_collection_order() {
        let mut prompter = ScriptedPrompter::new([
            "", "yes", "deploy", "no", "no", "yes", "example.com", "ops@example.com", "yes",
            "8080 8443", "",
        ]);

        let config = InputCollector::new(RawInput::new(), &mut prompter).collect().unwrap();

        assert_eq!(
            prompter.asked,
            vec![
                "SSH port",
                "Create a sudo user?",
                "Username",
                "Install fail2ban for SSH?",
                "Enable BBR congestion control?",
                "Issue a TLS certificate with certbot?",
                "Certificate domain",
                "ACME contact email",
                "Install Docker and the compose plugin?",
                "Extra TCP ports to open (space separated)",
                "Extra UDP ports to open (space separated)",
            ]
        );
        assert!(config.toggles.tls);
        assert!(!config.toggles.ban_policy);
        assert_eq!(config.extra_tcp_ports, BTreeSet::from([8080, 8443]));
    }

    #[test]
    fn test_end_of_input_is_an_error() {
        let mut prompter = ScriptedPrompter::new(["not-a-port"]);

        let err = InputCollector::new(all_off(), &mut prompter).collect().unwrap_err();

        assert!(matches!(err, ProvisionError::InteractiveRequired(_)));
    }

    #[test]
    fn test_non_interactive_never_prompts() {
        let source = all_off().with(keys::CREATE_USER, "yes");
        let mut prompter = ScriptedPrompter::new(["deploy"]);

        let err = InputCollector::new(source, &mut prompter)
            .non_interactive()
            .collect()
            .unwrap_err();

        assert!(matches!(err, ProvisionError::InteractiveRequired(_)));
        assert!(prompter.asked.is_empty());
    }
}
