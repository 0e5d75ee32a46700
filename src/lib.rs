// file: src/lib.rs
// version: 3.0.0
// guid: d82472d1-7f0f-4eb4-b0a3-6e1547103eb4

//! # host-provision
//!
//! One-shot hardening bootstrap for a freshly installed Debian/Ubuntu server:
//! package upgrade, an administrative user, SSH hardening, fail2ban, BBR
//! congestion control, a fail-safe iptables perimeter, Docker and a certbot
//! certificate, applied in a fixed order with a per-step summary.
//!
//! Every host interaction goes through [`executor::CommandRunner`], so the
//! whole run can be exercised against [`executor::RecordingHost`].

pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod firewall;
pub mod input;
pub mod logging;
pub mod orchestrator;
pub mod packages;
pub mod steps;

pub use error::{ProvisionError, Result};

/// Version information for the utility
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
