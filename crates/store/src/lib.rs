//! Pollstake Ledger Store
//!
//! Key-addressed collections for every persisted entity, guarded by a
//! single writer lock. All cross-entity updates that must be atomic
//! run as one `write(..)` closure over the whole mutable state; the
//! closure is all-or-nothing, so a failed settlement step never leaves
//! a half-applied tally behind. The full state snapshots to a JSON
//! file after each committed write.

mod state;

pub use state::LedgerState;

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("option index {index} out of range for poll {poll_id}")]
    OptionOutOfRange { poll_id: String, index: usize },
    #[error("insufficient balance: have {have}, need {need}")]
    InsufficientBalance { have: i64, need: i64 },
    #[error("failed to read snapshot: {0}")]
    ReadError(String),
    #[error("failed to write snapshot: {0}")]
    WriteError(String),
    #[error("failed to parse snapshot: {0}")]
    ParseError(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        StoreError::NotFound { entity, id: id.into() }
    }
}

/// The single source of truth for all financial state.
pub struct LedgerStore {
    inner: RwLock<LedgerState>,
    path: Option<PathBuf>,
}

impl LedgerStore {
    /// Ephemeral store for tests and dry runs.
    pub fn in_memory() -> Self {
        Self {
            inner: RwLock::new(LedgerState::default()),
            path: None,
        }
    }

    /// Load the snapshot at `path`, or start empty if none exists yet.
    pub fn load_or_default(path: &Path) -> Result<Self, StoreError> {
        let state = if path.exists() {
            debug!("loading ledger snapshot from {}", path.display());
            let content = std::fs::read_to_string(path)
                .map_err(|e| StoreError::ReadError(e.to_string()))?;
            serde_json::from_str(&content).map_err(|e| StoreError::ParseError(e.to_string()))?
        } else {
            debug!("starting empty ledger at {}", path.display());
            LedgerState::default()
        };
        Ok(Self {
            inner: RwLock::new(state),
            path: Some(path.to_path_buf()),
        })
    }

    /// Run a read-only closure against the current state.
    pub async fn read<T>(&self, f: impl FnOnce(&LedgerState) -> T) -> T {
        let guard = self.inner.read().await;
        f(&guard)
    }

    /// Run a transactional closure against the mutable state.
    ///
    /// The closure executes under the writer lock; if it returns an
    /// error, or the committed state cannot be snapshotted, the state
    /// is rolled back to the pre-transaction snapshot. Callers must
    /// not perform I/O inside the closure.
    pub async fn write<T, E>(
        &self,
        f: impl FnOnce(&mut LedgerState) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let mut guard = self.inner.write().await;
        let before = guard.clone();
        match f(&mut guard) {
            Ok(value) => {
                // A commit that cannot be snapshotted must not stay in
                // memory either, or memory and disk diverge.
                if let Err(e) = self.persist(&guard) {
                    *guard = before;
                    return Err(e.into());
                }
                Ok(value)
            }
            Err(e) => {
                *guard = before;
                Err(e)
            }
        }
    }

    fn persist(&self, state: &LedgerState) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::WriteError(e.to_string()))?;
        }
        let content =
            serde_json::to_string_pretty(state).map_err(|e| StoreError::WriteError(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| StoreError::WriteError(e.to_string()))
    }
}
