//! Per-connection session state — who is connected, their storage area,
//! and the table of open transactions.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;

use filesync_core::wire::{Frame, TransactionId};
use filesync_services::FileStore;

/// Capacity of one transaction's inbound queue. A handler that stops
/// reading back-pressures the receive loop rather than buying memory.
const INBOX_CAPACITY: usize = 16;

/// State of one authenticated connection. The transaction table sees
/// concurrent reads from the receive loop and removals from handler
/// completion.
pub struct Session {
    pub username: String,
    pub files: Arc<FileStore>,
    transactions: DashMap<TransactionId, mpsc::Sender<Frame>>,
}

impl Session {
    pub fn new(username: String, files: Arc<FileStore>) -> Self {
        Self {
            username,
            files,
            transactions: DashMap::new(),
        }
    }

    /// Open a transaction, returning the receiver its handler reads
    /// continuation frames from. The queue lives until
    /// [`Session::close_transaction`].
    pub fn open_transaction(&self, id: TransactionId) -> mpsc::Receiver<Frame> {
        let (tx, rx) = mpsc::channel(INBOX_CAPACITY);
        self.transactions.insert(id, tx);
        rx
    }

    /// The inbound queue of an open transaction, if any.
    pub fn transaction(&self, id: &TransactionId) -> Option<mpsc::Sender<Frame>> {
        self.transactions.get(id).map(|entry| entry.value().clone())
    }

    pub fn close_transaction(&self, id: &TransactionId) {
        self.transactions.remove(id);
    }

    /// Number of open transactions.
    pub fn open_transactions(&self) -> usize {
        self.transactions.len()
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
