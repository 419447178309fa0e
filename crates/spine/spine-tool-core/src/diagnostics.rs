//! Recovered-error reporting.
//!
//! Nothing in the scheduler, bridge or synchronizer propagates errors to the
//! host loop. Each recovered error goes through [`Diagnostics::report`], which
//! emits a `tracing` event and, when capture is enabled, keeps a record that
//! tests and debug tooling can query.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::config::DiagnosticsCfg;
use crate::error::{ErrorKind, SpineToolError};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug)]
struct Inner {
    cfg: DiagnosticsCfg,
    records: VecDeque<Diagnostic>,
}

/// Shared, single-threaded diagnostics sink. Cloning yields another handle to
/// the same record buffer.
#[derive(Clone, Debug)]
pub struct Diagnostics {
    inner: Rc<RefCell<Inner>>,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new(DiagnosticsCfg::default())
    }
}

impl Diagnostics {
    pub fn new(cfg: DiagnosticsCfg) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                cfg,
                records: VecDeque::new(),
            })),
        }
    }

    /// Log `err` at `severity` and record it.
    pub fn report(&self, severity: Severity, err: &SpineToolError) {
        let kind = err.kind();
        match severity {
            Severity::Info => tracing::info!(?kind, "{err}"),
            Severity::Warning => tracing::warn!(?kind, "{err}"),
            Severity::Error => match std::error::Error::source(err) {
                Some(source) => tracing::error!(?kind, %source, "{err}"),
                None => tracing::error!(?kind, "{err}"),
            },
        }

        let mut inner = self.inner.borrow_mut();
        if !inner.cfg.capture || inner.cfg.max_records == 0 {
            return;
        }
        while inner.records.len() >= inner.cfg.max_records {
            inner.records.pop_front();
        }
        inner.records.push_back(Diagnostic {
            severity,
            kind,
            message: err.to_string(),
        });
    }

    pub fn warn(&self, err: &SpineToolError) {
        self.report(Severity::Warning, err);
    }

    pub fn error(&self, err: &SpineToolError) {
        self.report(Severity::Error, err);
    }

    /// Snapshot of retained records, oldest first.
    pub fn records(&self) -> Vec<Diagnostic> {
        self.inner.borrow().records.iter().cloned().collect()
    }

    pub fn count(&self, kind: ErrorKind) -> usize {
        self.inner
            .borrow()
            .records
            .iter()
            .filter(|d| d.kind == kind)
            .count()
    }

    pub fn has(&self, kind: ErrorKind) -> bool {
        self.count(kind) > 0
    }

    pub fn clear(&self) {
        self.inner.borrow_mut().records.clear();
    }
}
