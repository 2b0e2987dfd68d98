//! Audit and notification sinks
//!
//! Both sinks are fire-and-forget: a record is serialized and published on
//! a background task, and a failed publish is logged but never propagated
//! to the request that produced it. Without a NATS connection the sinks
//! degrade to structured log lines.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

const AUDIT_SUBJECT: &str = "audit.records";
const ADMIN_ALERT_SUBJECT: &str = "notifications.admin";

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub action: &'static str,
    pub actor_id: Option<Uuid>,
    pub target_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub metadata: serde_json::Value,
}

impl AuditRecord {
    pub fn new(kind: &'static str, action: &'static str) -> Self {
        Self {
            kind,
            action,
            actor_id: None,
            target_id: None,
            timestamp: Utc::now(),
            metadata: serde_json::Value::Null,
        }
    }

    pub fn actor(mut self, actor_id: Uuid) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    pub fn target(mut self, target_id: impl Into<String>) -> Self {
        self.target_id = Some(target_id.into());
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

#[derive(Clone)]
pub struct EventSink {
    nats: Option<async_nats::Client>,
}

impl EventSink {
    pub fn new(nats: Option<async_nats::Client>) -> Self {
        Self { nats }
    }

    pub fn audit(&self, record: AuditRecord) {
        let payload = match serde_json::to_vec(&record) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize audit record");
                return;
            }
        };
        self.publish(AUDIT_SUBJECT, payload);
        tracing::info!(
            target: "audit",
            kind = record.kind,
            action = record.action,
            target_id = record.target_id.as_deref().unwrap_or("-"),
            "audit record"
        );
    }

    pub fn notify_admins(&self, event: &'static str, payload: serde_json::Value) {
        let body = serde_json::json!({ "event": event, "payload": payload });
        match serde_json::to_vec(&body) {
            Ok(bytes) => self.publish(ADMIN_ALERT_SUBJECT, bytes),
            Err(e) => tracing::warn!(error = %e, "failed to serialize admin alert"),
        }
        tracing::info!(target: "notifications", event, "admin alert");
    }

    fn publish(&self, subject: &'static str, payload: Vec<u8>) {
        let Some(client) = self.nats.clone() else {
            return;
        };
        tokio::spawn(async move {
            if let Err(e) = client.publish(subject.to_string(), payload.into()).await {
                tracing::warn!(error = %e, subject, "event publish failed");
            }
        });
    }
}
