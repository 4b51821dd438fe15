use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

/// Answers whether a named service is currently running.
#[async_trait]
pub trait ServiceStatus: Send + Sync {
    async fn is_active(&self, service: &str) -> bool;
}

/// Asks systemd via `systemctl is-active --quiet <service>`.
///
/// Any failure to run `systemctl` counts as inactive.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemctlStatus;

#[async_trait]
impl ServiceStatus for SystemctlStatus {
    async fn is_active(&self, service: &str) -> bool {
        let status = Command::new("systemctl")
            .args(["is-active", "--quiet", service])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) => status.success(),
            Err(e) => {
                tracing::debug!(service, "failed to run systemctl: {e}");
                false
            }
        }
    }
}
