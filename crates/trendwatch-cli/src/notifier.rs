use async_trait::async_trait;
use market_core::{AlertEvent, Notifier, NotifyError, Severity};

/// Notification sink that writes events to the log, one line per event.
/// Stands in for real transports (webhook, mail) behind the same interface.
#[derive(Debug, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, event: &AlertEvent) -> Result<(), NotifyError> {
        let payload = serde_json::to_string(&event.payload)
            .map_err(|err| NotifyError::Transport(err.to_string()))?;

        match event.severity {
            Severity::Info => {
                tracing::info!(monitor = %event.monitor_id, "ALERT {payload}");
            }
            Severity::Warn => {
                tracing::warn!(monitor = %event.monitor_id, "ALERT {payload}");
            }
            Severity::Critical => {
                tracing::error!(monitor = %event.monitor_id, "ALERT {payload}");
            }
        }
        Ok(())
    }
}
