// file: src/firewall/mod.rs
// version: 1.0.0
// guid: 5e92b7c0-18d4-4f3a-a6c1-e07d3b9f2a58

//! Perimeter firewall model
//!
//! A [`Ruleset`] is a declarative, ordered list of [`FirewallRule`]s. It is
//! built fresh for every commit and rendered to iptables arguments by the
//! [`engine::FirewallEngine`]. Ordering matters: iptables evaluates a chain
//! top-down, so loopback and established-connection rules come first.

pub mod engine;

pub use engine::{CommitReport, FirewallEngine};

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

pub const HTTP_PORT: u16 = 80;
pub const HTTPS_PORT: u16 = 443;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
    Icmp,
    Any,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::Icmp => "icmp",
            Protocol::Any => "all",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inbound,
    Outbound,
    /// Both directions on the loopback interface
    Loopback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleMatch {
    None,
    Port(u16),
    IcmpEchoRequest,
    EstablishedRelated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Accept,
    Drop,
}

impl RuleAction {
    pub fn target(&self) -> &'static str {
        match self {
            RuleAction::Accept => "ACCEPT",
            RuleAction::Drop => "DROP",
        }
    }
}

/// Built-in filter chains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Chain {
    Input,
    Forward,
    Output,
}

impl Chain {
    pub const ALL: [Chain; 3] = [Chain::Input, Chain::Forward, Chain::Output];

    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Input => "INPUT",
            Chain::Forward => "FORWARD",
            Chain::Output => "OUTPUT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FirewallRule {
    pub protocol: Protocol,
    pub direction: Direction,
    pub matcher: RuleMatch,
    pub action: RuleAction,
}

impl FirewallRule {
    pub fn loopback() -> Self {
        Self {
            protocol: Protocol::Any,
            direction: Direction::Loopback,
            matcher: RuleMatch::None,
            action: RuleAction::Accept,
        }
    }

    pub fn established() -> Self {
        Self {
            protocol: Protocol::Any,
            direction: Direction::Inbound,
            matcher: RuleMatch::EstablishedRelated,
            action: RuleAction::Accept,
        }
    }

    pub fn icmp_echo() -> Self {
        Self {
            protocol: Protocol::Icmp,
            direction: Direction::Inbound,
            matcher: RuleMatch::IcmpEchoRequest,
            action: RuleAction::Accept,
        }
    }

    pub fn allow_tcp(port: u16) -> Self {
        Self::allow_port(Protocol::Tcp, port)
    }

    pub fn allow_udp(port: u16) -> Self {
        Self::allow_port(Protocol::Udp, port)
    }

    fn allow_port(protocol: Protocol, port: u16) -> Self {
        Self {
            protocol,
            direction: Direction::Inbound,
            matcher: RuleMatch::Port(port),
            action: RuleAction::Accept,
        }
    }

    /// Rule specifications per chain, without the `-A`/`-C`/`-D` verb
    pub fn specs(&self) -> Vec<(Chain, Vec<String>)> {
        let target = vec!["-j".to_string(), self.action.target().to_string()];

        if self.direction == Direction::Loopback {
            return vec![
                (Chain::Input, strings(&["-i", "lo"]).into_iter().chain(target.clone()).collect()),
                (Chain::Output, strings(&["-o", "lo"]).into_iter().chain(target).collect()),
            ];
        }

        let chain = match self.direction {
            Direction::Outbound => Chain::Output,
            _ => Chain::Input,
        };

        let mut spec = Vec::new();
        if self.protocol != Protocol::Any {
            spec.extend(strings(&["-p", self.protocol.as_str()]));
        }
        match self.matcher {
            RuleMatch::None => {}
            RuleMatch::Port(port) => spec.extend(["--dport".to_string(), port.to_string()]),
            RuleMatch::IcmpEchoRequest => spec.extend(strings(&["--icmp-type", "echo-request"])),
            RuleMatch::EstablishedRelated => {
                spec.extend(strings(&["-m", "conntrack", "--ctstate", "ESTABLISHED,RELATED"]))
            }
        }
        spec.extend(target);

        vec![(chain, spec)]
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl fmt::Display for FirewallRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let action = match self.action {
            RuleAction::Accept => "accept",
            RuleAction::Drop => "drop",
        };
        match (self.direction, self.matcher) {
            (Direction::Loopback, _) => write!(f, "loopback-{}", action),
            (_, RuleMatch::EstablishedRelated) => write!(f, "established-{}", action),
            (_, RuleMatch::IcmpEchoRequest) => write!(f, "icmp-echo-{}", action),
            (_, RuleMatch::Port(port)) => {
                write!(f, "{}/{}-{}", self.protocol.as_str(), port, action)
            }
            (_, RuleMatch::None) => write!(f, "{}-{}", self.protocol.as_str(), action),
        }
    }
}

/// Ordered perimeter policy for one commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ruleset {
    pub ssh_port: u16,
    pub rules: Vec<FirewallRule>,
}

impl Ruleset {
    /// loopback → established → SSH → HTTP/HTTPS → ICMP echo → extra TCP → extra UDP
    pub fn perimeter(ssh_port: u16, extra_tcp: &BTreeSet<u16>, extra_udp: &BTreeSet<u16>) -> Self {
        let mut rules = vec![
            FirewallRule::loopback(),
            FirewallRule::established(),
            FirewallRule::allow_tcp(ssh_port),
        ];

        for port in [HTTP_PORT, HTTPS_PORT] {
            push_unique(&mut rules, FirewallRule::allow_tcp(port));
        }
        rules.push(FirewallRule::icmp_echo());

        for port in extra_tcp {
            push_unique(&mut rules, FirewallRule::allow_tcp(*port));
        }
        for port in extra_udp {
            push_unique(&mut rules, FirewallRule::allow_udp(*port));
        }

        Self { ssh_port, rules }
    }

    /// Human-readable labels in commit order
    pub fn labels(&self) -> Vec<String> {
        self.rules.iter().map(ToString::to_string).collect()
    }
}

fn push_unique(rules: &mut Vec<FirewallRule>, rule: FirewallRule) {
    if !rules.contains(&rule) {
        rules.push(rule);
    }
}
