// file: src/steps/tls.rs
// version: 1.0.0
// guid: e2d95a7c-3f16-4b80-a9c4-61b7f0e8d3a5

//! Certificate issuance through certbot's standalone challenge

use super::{StepContext, StepResult};
use crate::error::ProvisionError;
use crate::executor::HostCommand;
use crate::firewall::{FirewallRule, HTTP_PORT};
use crate::Result;
use tracing::{info, warn};

const NAME: &str = "tls-issuance";

pub async fn run(ctx: &mut StepContext<'_>) -> Result<StepResult> {
    let tls = ctx
        .config
        .tls
        .clone()
        .ok_or_else(|| ProvisionError::config("TLS enabled without a domain and email"))?;

    ctx.packages
        .ensure_binary(ctx.host, "certbot", "certbot")
        .await?;

    // The standalone challenge binds port 80 for the duration of issuance
    let http = FirewallRule::allow_tcp(HTTP_PORT);
    let inserted = ctx.firewall.allow(ctx.host, &http).await?;

    let issue = HostCommand::new("certbot").args([
        "certonly",
        "--standalone",
        "--non-interactive",
        "--agree-tos",
        "--keep-until-expiring",
        "-m",
        tls.email.as_str(),
        "-d",
        tls.domain.as_str(),
    ]);
    let issued = ctx.host.run_checked(&issue).await;

    let mut warnings = Vec::new();
    if inserted {
        match ctx.firewall.revoke(ctx.host, &http).await {
            Ok(_) => info!("Temporary {} rule removed", http),
            Err(e) => {
                warn!("Temporary {} rule could not be removed: {}", http, e);
                warnings.push(format!("temporary {} rule is still active: {}", http, e));
            }
        }
    }

    issued?;
    Ok(StepResult::success(NAME, format!("certificate issued for {}", tls.domain)).with_warnings(warnings))
}

#[cfg(test)]
mod tests {
    use super::super::{Step, StepOutcome};
    use super::*;
    use crate::config::{HostPaths, ProvisioningConfig, TlsConfig};
    use crate::executor::{CommandOutcome, RecordingHost};

    const HTTP_CHECK: &str = "iptables -C INPUT -p tcp --dport 80 -j ACCEPT";

    fn config() -> ProvisioningConfig {
        let mut config = ProvisioningConfig::default();
        config.toggles.tls = true;
        config.tls = Some(TlsConfig {
            domain: "example.com".to_string(),
            email: "ops@example.com".to_string(),
        });
        config
    }

    async fn apply(host: &mut RecordingHost) -> StepResult {
        let config = config();
        let paths = HostPaths::default();
        let mut ctx = StepContext::new(&config, &paths, host);
        Step::TlsIssuance.apply(&mut ctx).await
    }

    #[tokio::test]
    async fn test_existing_http_accept_is_left_alone() {
        let mut host = RecordingHost::new();

        let result = apply(&mut host).await;

        assert_eq!(result.outcome, StepOutcome::Success);
        assert!(!host.ran("iptables -A"));
        assert!(!host.ran("iptables -D"));
        assert!(host.ran(
            "certbot certonly --standalone --non-interactive --agree-tos --keep-until-expiring -m ops@example.com -d example.com"
        ));
    }

    #[tokio::test]
    async fn test_temporary_rule_wraps_issuance() {
        // Arrange
        let mut host =
            RecordingHost::new().respond_once(HTTP_CHECK, CommandOutcome::failure(1, "Bad rule"));

        // Act
        let result = apply(&mut host).await;

        // Assert
        assert_eq!(result.outcome, StepOutcome::Success);
        let allow = host.position("iptables -A INPUT -p tcp --dport 80").unwrap();
        let certbot = host.position("certbot").unwrap();
        let revoke = host.position("iptables -D INPUT -p tcp --dport 80").unwrap();
        assert!(allow < certbot && certbot < revoke);
    }

    #[tokio::test]
    async fn test_rule_revoked_when_issuance_fails() {
        let mut host = RecordingHost::new()
            .respond_once(HTTP_CHECK, CommandOutcome::failure(1, "Bad rule"))
            .fail("certbot");

        let result = apply(&mut host).await;

        assert_eq!(result.outcome, StepOutcome::Failed);
        assert!(!result.is_fatal_failure());
        assert!(host.ran("iptables -D INPUT -p tcp --dport 80"));
    }

    #[tokio::test]
    async fn test_certbot_installed_when_missing() {
        let mut host = RecordingHost::new().fail("sh -c 'command -v certbot'");

        apply(&mut host).await;

        let install = host.position("apt-get install -y certbot").unwrap();
        let issue = host.position("certbot certonly").unwrap();
        assert!(install < issue);
    }
}
