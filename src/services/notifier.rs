// Escalation webhook - fire-and-forget staff notification sink
// Invoked at most once per failed decline cascade; delivery problems are
// logged and surfaced as warnings, never retried here.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::json;

use crate::assignment::ports::{EscalationNotifier, NotifierError, UnstaffedEvent};

pub struct WebhookNotifier {
    client: Client,
    webhook_url: Option<String>,
}

impl WebhookNotifier {
    pub fn new(webhook_url: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            webhook_url,
        }
    }
}

#[async_trait]
impl EscalationNotifier for WebhookNotifier {
    async fn notify_unstaffed(&self, event: &UnstaffedEvent) -> Result<(), NotifierError> {
        let Some(url) = &self.webhook_url else {
            // No webhook configured; the unstaffed status itself is the
            // durable signal, so this degrades to a log line.
            tracing::warn!(
                "Schedule {} unstaffed but no escalation webhook configured",
                event.schedule_id
            );
            return Ok(());
        };

        let payload = json!({
            "type": "schedule_unstaffed",
            "schedule_id": event.schedule_id,
            "last_declined_collector_id": event.last_declined_collector_id,
            "reason": event.reason,
            "occurred_at": Utc::now(),
        });

        let response = self
            .client
            .post(url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotifierError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NotifierError(format!(
                "webhook returned {}",
                response.status()
            )));
        }

        tracing::info!(
            "Escalated unstaffed schedule {} to staff webhook",
            event.schedule_id
        );
        Ok(())
    }
}
