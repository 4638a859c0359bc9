//! Statement-recording relational session.
//!
//! Used for dry runs and tests: statements are logged and kept in memory
//! instead of being sent to a server. Failures can be injected per relation
//! or for the next N statements.

use crate::adapter::Adapter;
use crate::driver::{ConnectParams, RelationalConnector, RelationalSession};
use crate::error::SinkError;
use crate::statement::Statement;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Shared {
    statements: Mutex<Vec<(Adapter, Statement)>>,
    failing_relations: Mutex<HashSet<String>>,
    transient_failures: AtomicUsize,
    refuse: AtomicBool,
    connects: AtomicUsize,
    closes: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Hands out [`RecordingSession`]s that share one statement log.
#[derive(Debug, Clone, Default)]
pub struct RecordingConnector {
    shared: Arc<Shared>,
}

impl RecordingConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every statement executed so far, across sessions.
    pub fn statements(&self) -> Vec<Statement> {
        lock(&self.shared.statements)
            .iter()
            .map(|(_, stmt)| stmt.clone())
            .collect()
    }

    /// Statements executed so far against one relation.
    pub fn statements_for(&self, relation: &str) -> Vec<Statement> {
        self.statements()
            .into_iter()
            .filter(|stmt| stmt.relation == relation)
            .collect()
    }

    /// Reject every later write to `relation` with a permanent error.
    pub fn fail_relation(&self, relation: &str) {
        lock(&self.shared.failing_relations).insert(relation.to_string());
    }

    /// Fail the next `times` writes with a transient error.
    pub fn fail_transiently(&self, times: usize) {
        self.shared.transient_failures.store(times, Ordering::SeqCst);
    }

    /// Make later connection attempts fail.
    pub fn refuse_connections(&self) {
        self.shared.refuse.store(true, Ordering::SeqCst);
    }

    pub fn connect_count(&self) -> usize {
        self.shared.connects.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.shared.closes.load(Ordering::SeqCst)
    }

    /// Open a session directly, without connection parameters.
    pub fn session(&self, adapter: Adapter) -> RecordingSession {
        self.shared.connects.fetch_add(1, Ordering::SeqCst);
        RecordingSession {
            adapter,
            shared: self.shared.clone(),
        }
    }
}

#[async_trait]
impl RelationalConnector for RecordingConnector {
    async fn connect(
        &self,
        adapter: Adapter,
        params: &ConnectParams,
    ) -> Result<Box<dyn RelationalSession>, SinkError> {
        if self.shared.refuse.load(Ordering::SeqCst) {
            return Err(SinkError::Connection {
                adapter: adapter.to_string(),
                address: params.address(adapter),
                message: "connection refused".to_string(),
            });
        }
        tracing::debug!(
            "Recording statements for {} at {} instead of connecting",
            adapter,
            params.address(adapter)
        );
        Ok(Box::new(self.session(adapter)))
    }
}

/// A session that records statements instead of executing them.
#[derive(Debug)]
pub struct RecordingSession {
    adapter: Adapter,
    shared: Arc<Shared>,
}

#[async_trait]
impl RelationalSession for RecordingSession {
    fn adapter(&self) -> Adapter {
        self.adapter
    }

    async fn execute(&self, statement: &Statement) -> Result<u64, SinkError> {
        let pending = self
            .shared
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if pending.is_ok() {
            return Err(SinkError::Write {
                relation: statement.relation.clone(),
                message: "connection reset by peer".to_string(),
                transient: true,
            });
        }
        if lock(&self.shared.failing_relations).contains(&statement.relation) {
            return Err(SinkError::Write {
                relation: statement.relation.clone(),
                message: "duplicate entry for key 'PRIMARY'".to_string(),
                transient: false,
            });
        }

        tracing::info!("[dry-run] {} {:?}", statement.sql, statement.params);
        lock(&self.shared.statements).push((self.adapter, statement.clone()));
        Ok(1)
    }

    async fn close(&self) {
        self.shared.closes.fetch_add(1, Ordering::SeqCst);
    }
}
