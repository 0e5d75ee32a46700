// file: src/config/mod.rs
// version: 2.0.0
// guid: 7f3a9c21-5e0b-4d86-b1a4-6c2e8d0f9a37

//! Provisioning configuration
//!
//! A [`ProvisioningConfig`] is produced once by the input collector and is
//! read-only for the rest of the run. Conditional sections are `Option`s that
//! are only ever populated by [`validator::validate`], so a config whose TLS
//! toggle is on always carries a domain and contact email.

pub mod loader;
pub mod validator;

pub use loader::RawInput;
pub use validator::validate;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

pub const DEFAULT_SSH_PORT: u16 = 22;
pub const DEFAULT_F2B_MAX_RETRY: u32 = 5;
pub const DEFAULT_F2B_BAN_TIME: u32 = 3600;
pub const DEFAULT_F2B_FIND_TIME: u32 = 600;

/// Keys accepted from the environment or an env file
pub mod keys {
    pub const SSH_PORT: &str = "SSH_PORT";
    pub const CREATE_USER: &str = "CREATE_USER";
    pub const USER_NAME: &str = "USER_NAME";
    pub const INSTALL_FAIL2BAN: &str = "INSTALL_FAIL2BAN";
    pub const F2B_MAX_RETRY: &str = "F2B_MAX_RETRY";
    pub const F2B_BAN_TIME: &str = "F2B_BAN_TIME";
    pub const F2B_FIND_TIME: &str = "F2B_FIND_TIME";
    pub const ENABLE_BBR: &str = "ENABLE_BBR";
    pub const INSTALL_TLS: &str = "INSTALL_TLS";
    pub const ACME_DOMAIN: &str = "ACME_DOMAIN";
    pub const ACME_EMAIL: &str = "ACME_EMAIL";
    pub const INSTALL_DOCKER: &str = "INSTALL_DOCKER";
    pub const EXTRA_TCP_PORTS: &str = "EXTRA_TCP_PORTS";
    pub const EXTRA_UDP_PORTS: &str = "EXTRA_UDP_PORTS";

    pub const ALL: [&str; 14] = [
        SSH_PORT,
        CREATE_USER,
        USER_NAME,
        INSTALL_FAIL2BAN,
        F2B_MAX_RETRY,
        F2B_BAN_TIME,
        F2B_FIND_TIME,
        ENABLE_BBR,
        INSTALL_TLS,
        ACME_DOMAIN,
        ACME_EMAIL,
        INSTALL_DOCKER,
        EXTRA_TCP_PORTS,
        EXTRA_UDP_PORTS,
    ];
}

/// Feature toggles; every one defaults to enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureToggles {
    pub create_user: bool,
    pub ban_policy: bool,
    pub congestion_tuning: bool,
    pub tls: bool,
    pub container_runtime: bool,
}

impl Default for FeatureToggles {
    fn default() -> Self {
        Self {
            create_user: true,
            ban_policy: true,
            congestion_tuning: true,
            tls: true,
            container_runtime: true,
        }
    }
}

/// ACME registration details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsConfig {
    pub domain: String,
    pub email: String,
}

/// fail2ban tunables for the sshd jail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanPolicy {
    pub max_retry: u32,
    pub ban_time_secs: u32,
    pub find_time_secs: u32,
}

impl Default for BanPolicy {
    fn default() -> Self {
        Self {
            max_retry: DEFAULT_F2B_MAX_RETRY,
            ban_time_secs: DEFAULT_F2B_BAN_TIME,
            find_time_secs: DEFAULT_F2B_FIND_TIME,
        }
    }
}

/// Fully validated operator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningConfig {
    pub ssh_port: u16,
    pub toggles: FeatureToggles,
    pub user: Option<String>,
    pub ban_policy: Option<BanPolicy>,
    pub tls: Option<TlsConfig>,
    pub extra_tcp_ports: BTreeSet<u16>,
    pub extra_udp_ports: BTreeSet<u16>,
}

impl Default for ProvisioningConfig {
    /// Minimal config: default port, every optional feature off
    fn default() -> Self {
        Self {
            ssh_port: DEFAULT_SSH_PORT,
            toggles: FeatureToggles {
                create_user: false,
                ban_policy: false,
                congestion_tuning: false,
                tls: false,
                container_runtime: false,
            },
            user: None,
            ban_policy: None,
            tls: None,
            extra_tcp_ports: BTreeSet::new(),
            extra_udp_ports: BTreeSet::new(),
        }
    }
}

/// Locations of the host files this tool edits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPaths {
    pub sshd_config: PathBuf,
    pub sysctl_conf: PathBuf,
    pub fail2ban_jail: PathBuf,
    pub iptables_rules: PathBuf,
    pub root_authorized_keys: PathBuf,
    pub home_root: PathBuf,
}

impl Default for HostPaths {
    fn default() -> Self {
        Self {
            sshd_config: PathBuf::from("/etc/ssh/sshd_config"),
            sysctl_conf: PathBuf::from("/etc/sysctl.conf"),
            fail2ban_jail: PathBuf::from("/etc/fail2ban/jail.d/sshd.local"),
            iptables_rules: PathBuf::from("/etc/iptables/rules.v4"),
            root_authorized_keys: PathBuf::from("/root/.ssh/authorized_keys"),
            home_root: PathBuf::from("/home"),
        }
    }
}

impl HostPaths {
    /// authorized_keys path for a regular account
    pub fn user_authorized_keys(&self, user: &str) -> PathBuf {
        self.home_root.join(user).join(".ssh").join("authorized_keys")
    }
}
