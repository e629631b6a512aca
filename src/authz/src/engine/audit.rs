//! Audit events for administrative writes
//!
//! The engine emits one event per successful grant or revoke and does not
//! wait on, retry, or fail because of the sink.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::error::{AuthzError, Result};
use crate::grant::Grant;

const MAX_BUFFERED: usize = 10_000;

/// Administrative action recorded in the audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Grant,
    Revoke,
}

/// Audit event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID
    pub id: String,

    pub action: AuditAction,

    pub grant_id: String,

    /// Unknown when a revoke is issued by grant id alone
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,

    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    /// Event describing a full grant
    pub fn for_grant(action: AuditAction, grant: &Grant) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            action,
            grant_id: grant.id.clone(),
            principal_id: Some(grant.principal_id.clone()),
            resource_type: Some(grant.resource_type.clone()),
            resource_id: Some(grant.resource_id.clone()),
            timestamp: Utc::now(),
        }
    }

    /// Revoke known only by grant id
    pub fn revoked_id(grant_id: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            action: AuditAction::Revoke,
            grant_id: grant_id.into(),
            principal_id: None,
            resource_type: None,
            resource_id: None,
            timestamp: Utc::now(),
        }
    }
}

/// External destination for audit events
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: AuditEvent) -> Result<()>;
}

/// Bounded in-memory audit buffer
#[derive(Clone, Default)]
pub struct InMemoryAuditSink {
    buffer: Arc<RwLock<Vec<AuditEvent>>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All buffered events, oldest first
    pub async fn events(&self) -> Vec<AuditEvent> {
        self.buffer.read().await.clone()
    }

    /// Most recent events for a principal, newest first
    pub async fn query_by_principal(&self, principal_id: &str, limit: usize) -> Vec<AuditEvent> {
        self.buffer
            .read()
            .await
            .iter()
            .rev()
            .filter(|e| e.principal_id.as_deref() == Some(principal_id))
            .take(limit)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.buffer.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.buffer.read().await.is_empty()
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn record(&self, event: AuditEvent) -> Result<()> {
        let mut buffer = self.buffer.write().await;
        buffer.push(event);

        // Keep only last 10,000 entries
        if buffer.len() > MAX_BUFFERED {
            buffer.drain(0..1_000);
        }

        Ok(())
    }
}

/// Sink that writes each event as JSON to the `audit` tracing target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: AuditEvent) -> Result<()> {
        let payload = serde_json::to_string(&event)
            .map_err(|e| AuthzError::Audit(format!("Failed to serialize audit event: {}", e)))?;
        info!(target: "audit", event = %payload, "Audit event");
        Ok(())
    }
}
