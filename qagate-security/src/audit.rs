//! Audit trail of data operations that passed the identity check.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use qagate_core::AuditConfig;
use serde::Serialize;

use crate::client::Operation;

/// One guarded operation that reached storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEntry {
    /// Table or bucket name.
    pub target: String,
    pub operation: Operation,
    pub principal_id: String,
    pub at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(target: impl Into<String>, operation: Operation, principal_id: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            operation,
            principal_id: principal_id.into(),
            at: Utc::now(),
        }
    }
}

/// Destination for audit entries.
pub trait AuditSink: Send + Sync + 'static {
    fn record(&self, entry: &AuditEntry);
}

/// Emits every entry as an `info` event on the `qagate::audit` target.
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, entry: &AuditEntry) {
        tracing::info!(
            target: "qagate::audit",
            table = %entry.target,
            operation = ?entry.operation,
            principal_id = %entry.principal_id,
            "data operation"
        );
    }
}

/// Bounded in-memory log of the most recent entries.
#[derive(Clone)]
pub struct MemoryAuditLog {
    entries: Arc<Mutex<VecDeque<AuditEntry>>>,
    capacity: usize,
}

impl MemoryAuditLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity.min(1024)))),
            capacity: capacity.max(1),
        }
    }

    /// Up to `limit` entries, newest first.
    pub fn recent(&self, limit: usize) -> Vec<AuditEntry> {
        let entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        entries.iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for MemoryAuditLog {
    fn record(&self, entry: &AuditEntry) {
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry.clone());
    }
}

/// Fans entries out to every registered sink. Clones share sinks.
#[derive(Clone, Default)]
pub struct AuditTrail {
    sinks: Arc<Vec<Arc<dyn AuditSink>>>,
    log: Option<MemoryAuditLog>,
}

impl AuditTrail {
    /// A trail that records nothing.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// A trail keeping a [`MemoryAuditLog`] of `config.capacity` entries,
    /// plus a [`TracingAuditSink`] when `config.log_events` is set.
    pub fn from_config(config: &AuditConfig) -> Self {
        let log = MemoryAuditLog::new(config.capacity);
        let mut sinks: Vec<Arc<dyn AuditSink>> = vec![Arc::new(log.clone())];
        if config.log_events {
            sinks.push(Arc::new(TracingAuditSink));
        }
        Self {
            sinks: Arc::new(sinks),
            log: Some(log),
        }
    }

    /// Add a sink. Clones made before this call keep their own sink list.
    pub fn with_sink(mut self, sink: impl AuditSink) -> Self {
        let mut sinks: Vec<_> = self.sinks.iter().cloned().collect();
        sinks.push(Arc::new(sink));
        self.sinks = Arc::new(sinks);
        self
    }

    pub fn record(&self, entry: AuditEntry) {
        for sink in self.sinks.iter() {
            sink.record(&entry);
        }
    }

    /// The in-memory log, if this trail keeps one.
    pub fn log(&self) -> Option<&MemoryAuditLog> {
        self.log.as_ref()
    }

    /// Most recent entries, newest first. Empty when no log is kept.
    pub fn recent(&self, limit: usize) -> Vec<AuditEntry> {
        self.log.as_ref().map(|l| l.recent(limit)).unwrap_or_default()
    }
}
