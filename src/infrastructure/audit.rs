//! Audit sinks. Each one is constructed and injected explicitly.

use crate::domain::audit::AuditEvent;
use crate::domain::ports::AuditSink;
use crate::error::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

/// Emits audit events as structured log lines under the `audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: AuditEvent) -> Result<()> {
        tracing::info!(
            target: "audit",
            actor = ?event.actor.map(|a| a.0),
            action = %event.action,
            resource = %event.resource,
            origin = ?event.origin_address,
            agent = ?event.origin_agent,
            "{}",
            event.detail
        );
        Ok(())
    }
}

/// Appends one JSON document per line to a file.
pub struct JsonLinesAuditSink {
    file: tokio::sync::Mutex<File>,
}

impl JsonLinesAuditSink {
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        Ok(Self {
            file: tokio::sync::Mutex::new(file),
        })
    }
}

#[async_trait]
impl AuditSink for JsonLinesAuditSink {
    async fn record(&self, event: AuditEvent) -> Result<()> {
        let mut line = serde_json::to_vec(&event)?;
        line.push(b'\n');
        let mut file = self.file.lock().await;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Keeps events in memory; clones share the same buffer.
#[derive(Debug, Default, Clone)]
pub struct InMemoryAuditSink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn record(&self, event: AuditEvent) -> Result<()> {
        self.events.lock().push(event);
        Ok(())
    }
}
