//! Normalization diagnostics
//!
//! Degradations during payload normalization are explicit and auditable:
//! every dropped record and every field fallback becomes a [`Diagnostic`].

use crate::models::ResourceKind;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Severity level for normalization diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Field substituted with a policy default, record kept
    Warning,
    /// Record dropped from its list
    Error,
}

/// One degradation observed while normalizing a response
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub kind: ResourceKind,
    /// Record id when it could be read before the failure
    pub record_id: Option<i64>,
    /// Field that triggered the diagnostic (`None` for whole-record failures)
    pub field: Option<&'static str>,
    pub message: String,
    pub severity: Severity,
    pub recorded_at: DateTime<Utc>,
}

impl Diagnostic {
    pub fn fallback(
        kind: ResourceKind,
        record_id: Option<i64>,
        field: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            record_id,
            field: Some(field),
            message: message.into(),
            severity: Severity::Warning,
            recorded_at: Utc::now(),
        }
    }

    pub fn dropped(kind: ResourceKind, record_id: Option<i64>, message: impl Into<String>) -> Self {
        Self {
            kind,
            record_id,
            field: None,
            message: message.into(),
            severity: Severity::Error,
            recorded_at: Utc::now(),
        }
    }

    pub fn is_dropped_record(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Diagnostics collected while normalizing one response
#[derive(Debug, Default)]
pub struct NormalizeReport {
    pub diagnostics: Vec<Diagnostic>,
    pub records_seen: usize,
    pub records_kept: usize,
}

impl NormalizeReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Number of records dropped from the list
    pub fn dropped(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.is_dropped_record())
            .count()
    }

    /// Number of field-level fallbacks applied to kept records
    pub fn fallbacks(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count()
    }

    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Bounded, process-wide log of normalization diagnostics
///
/// Shared by every Resource Client so the operator (and tests) can audit
/// what was degraded. Oldest entries are evicted once `capacity` is reached.
#[derive(Debug, Clone)]
pub struct DiagnosticLog {
    inner: Arc<Mutex<LogInner>>,
}

#[derive(Debug)]
struct LogInner {
    entries: VecDeque<Diagnostic>,
    capacity: usize,
    evicted: usize,
}

impl DiagnosticLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(LogInner {
                entries: VecDeque::with_capacity(capacity.min(1024)),
                capacity: capacity.max(1),
                evicted: 0,
            })),
        }
    }

    /// Append every diagnostic of a report
    pub fn record(&self, report: &NormalizeReport) {
        if report.is_clean() {
            return;
        }
        let mut inner = self.inner.lock();
        for diagnostic in &report.diagnostics {
            if inner.entries.len() == inner.capacity {
                inner.entries.pop_front();
                inner.evicted += 1;
            }
            inner.entries.push_back(diagnostic.clone());
        }
    }

    /// Snapshot of retained entries, oldest first
    pub fn entries(&self) -> Vec<Diagnostic> {
        self.inner.lock().entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Retained dropped-record diagnostics for one kind
    pub fn dropped_count(&self, kind: ResourceKind) -> usize {
        self.inner
            .lock()
            .entries
            .iter()
            .filter(|d| d.kind == kind && d.is_dropped_record())
            .count()
    }

    /// Entries lost to the capacity bound
    pub fn evicted(&self) -> usize {
        self.inner.lock().evicted
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.evicted = 0;
    }
}

impl Default for DiagnosticLog {
    fn default() -> Self {
        Self::new(512)
    }
}
