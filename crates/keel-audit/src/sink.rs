// sink.rs - Audit sinks and the best-effort Auditor.
//
// Audit is a side channel: a decision is valid whether or not its audit
// record was written. `Auditor::emit` still returns the sink's `Result` so
// every call site states in code that it is discarding the failure, and
// the failure is logged and counted here.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::AuditError;
use crate::event::AuditEvent;
use crate::log::AuditLog;

/// Trait for receiving audit events.
pub trait AuditSink: Send + Sync {
    /// Record one event.
    fn record(&self, event: &AuditEvent) -> Result<(), AuditError>;
}

/// Writes events to a hash-chained JSONL [`AuditLog`].
pub struct JsonlAuditSink {
    log: Mutex<AuditLog>,
}

impl JsonlAuditSink {
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, AuditError> {
        Ok(Self {
            log: Mutex::new(AuditLog::open(path)?),
        })
    }
}

impl AuditSink for JsonlAuditSink {
    fn record(&self, event: &AuditEvent) -> Result<(), AuditError> {
        let mut log = self
            .log
            .lock()
            .map_err(|_| AuditError::SinkUnavailable("audit log lock poisoned".to_string()))?;
        // The log stamps previous_hash, so it needs its own copy.
        let mut event = event.clone();
        log.append(&mut event)
    }
}

/// Keeps events in memory. Useful for embedding and tests.
#[derive(Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
    reject: bool,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that refuses every event, for exercising failure handling.
    pub fn rejecting() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            reject: true,
        }
    }

    /// Snapshot of the recorded events.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: &AuditEvent) -> Result<(), AuditError> {
        if self.reject {
            return Err(AuditError::SinkUnavailable("sink rejects all events".to_string()));
        }
        let mut events = self
            .events
            .lock()
            .map_err(|_| AuditError::SinkUnavailable("memory sink lock poisoned".to_string()))?;
        events.push(event.clone());
        Ok(())
    }
}

/// Best-effort audit emitter shared by the compiler, the gate evaluator and
/// the local engine.
///
/// An `Auditor` without a sink is a no-op. Failed writes are logged at
/// `warn` and counted; they never propagate into the decision path.
#[derive(Clone, Default)]
pub struct Auditor {
    sink: Option<Arc<dyn AuditSink>>,
    failures: Arc<AtomicU64>,
}

impl Auditor {
    /// An auditor that records nothing.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self {
            sink: Some(sink),
            failures: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Record an event. The returned error has already been logged and
    /// counted; callers discard it.
    pub fn emit(&self, event: AuditEvent) -> Result<(), AuditError> {
        let Some(sink) = &self.sink else {
            return Ok(());
        };
        sink.record(&event).inspect_err(|e| {
            self.failures.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                action = ?event.action,
                error = %e,
                "audit write failed; decision stands"
            );
        })
    }

    /// Number of audit writes that have failed since this auditor was created.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for Auditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Auditor")
            .field("enabled", &self.sink.is_some())
            .field("failures", &self.failures())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::AuditAction;
    use tempfile::tempdir;

    #[test]
    fn disabled_auditor_is_noop() {
        let auditor = Auditor::disabled();
        assert!(auditor
            .emit(AuditEvent::new("gate", AuditAction::GateEvaluated))
            .is_ok());
        assert_eq!(auditor.failures(), 0);
    }

    #[test]
    fn failed_write_is_counted_not_fatal() {
        let auditor = Auditor::new(Arc::new(MemoryAuditSink::rejecting()));
        let result = auditor.emit(AuditEvent::new("local-engine", AuditAction::ActionChecked));
        assert!(result.is_err());
        assert_eq!(auditor.failures(), 1);
    }

    #[test]
    fn memory_sink_collects_events() {
        let sink = Arc::new(MemoryAuditSink::new());
        let auditor = Auditor::new(sink.clone());
        auditor
            .emit(AuditEvent::new("compiler", AuditAction::PackageCompiled))
            .unwrap();
        assert_eq!(sink.events().len(), 1);
    }

    #[test]
    fn jsonl_sink_writes_valid_chain() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let auditor = Auditor::new(Arc::new(JsonlAuditSink::open(&path).unwrap()));
        for _ in 0..3 {
            auditor
                .emit(AuditEvent::new("local-engine", AuditAction::DiffChecked))
                .unwrap();
        }
        assert_eq!(AuditLog::verify_chain(&path).unwrap(), 3);
    }
}
