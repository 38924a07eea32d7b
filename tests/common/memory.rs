use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use postgres_functional_session::{
    NamedQueries, Session, SessionError, SessionFactory, SessionResult, Transaction,
    TransactionState,
};

use super::entities::Note;

pub const ALL_NOTES: &str = "SELECT notes";

/// Counters and failure switches shared by every session of a [`MemoryStore`].
#[derive(Debug, Default)]
pub struct StoreProbe {
    sessions_opened: AtomicUsize,
    sessions_closed: AtomicUsize,
    close_calls: AtomicUsize,
    transactions_begun: AtomicUsize,
    commit_calls: AtomicUsize,
    rollback_calls: AtomicUsize,
    pub fail_open: AtomicBool,
    pub fail_begin: AtomicBool,
    pub fail_commit: AtomicBool,
    pub fail_rollback: AtomicBool,
    pub fail_query: AtomicBool,
    pub fail_close: AtomicBool,
}

impl StoreProbe {
    pub fn sessions_opened(&self) -> usize {
        self.sessions_opened.load(Ordering::SeqCst)
    }

    pub fn sessions_closed(&self) -> usize {
        self.sessions_closed.load(Ordering::SeqCst)
    }

    /// Every call to `close`, including repeats on an already closed session.
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn open_sessions(&self) -> usize {
        self.sessions_opened() - self.sessions_closed()
    }

    pub fn transactions_begun(&self) -> usize {
        self.transactions_begun.load(Ordering::SeqCst)
    }

    pub fn commit_calls(&self) -> usize {
        self.commit_calls.load(Ordering::SeqCst)
    }

    pub fn rollback_calls(&self) -> usize {
        self.rollback_calls.load(Ordering::SeqCst)
    }

    pub fn set(flag: &AtomicBool) {
        flag.store(true, Ordering::SeqCst);
    }

    fn tripped(flag: &AtomicBool) -> bool {
        flag.load(Ordering::SeqCst)
    }
}

/// In-memory backing store: committed notes plus per-session pending changes.
#[derive(Clone)]
pub struct MemoryStore {
    probe: Arc<StoreProbe>,
    notes: Arc<RwLock<BTreeMap<u64, Note>>>,
    named_queries: NamedQueries,
}

impl MemoryStore {
    pub fn new() -> Self {
        let mut named_queries = NamedQueries::new();
        named_queries.insert("all_notes", ALL_NOTES);
        named_queries.insert("broken", "SELECT nothing");
        Self {
            probe: Arc::new(StoreProbe::default()),
            notes: Arc::new(RwLock::new(BTreeMap::new())),
            named_queries,
        }
    }

    pub fn with_notes(notes: impl IntoIterator<Item = Note>) -> Self {
        let store = Self::new();
        store
            .notes
            .write()
            .extend(notes.into_iter().map(|note| (note.id, note)));
        store
    }

    pub fn probe(&self) -> Arc<StoreProbe> {
        self.probe.clone()
    }

    pub fn committed_notes(&self) -> Vec<Note> {
        self.notes.read().values().cloned().collect()
    }
}

#[async_trait]
impl SessionFactory for MemoryStore {
    type Session = MemorySession;

    async fn open_session(&self) -> SessionResult<Self::Session> {
        if StoreProbe::tripped(&self.probe.fail_open) {
            return Err(SessionError::Store("open refused".to_string()));
        }
        self.probe.sessions_opened.fetch_add(1, Ordering::SeqCst);
        Ok(MemorySession {
            inner: Arc::new(SessionInner {
                probe: self.probe.clone(),
                notes: self.notes.clone(),
                closed: AtomicBool::new(false),
                pending: Mutex::new(Vec::new()),
                transaction: Mutex::new(None),
            }),
        })
    }

    fn named_queries(&self) -> &NamedQueries {
        &self.named_queries
    }
}

#[derive(Debug, Clone)]
pub enum Change {
    Put(Note),
    Remove(u64),
}

struct SessionInner {
    probe: Arc<StoreProbe>,
    notes: Arc<RwLock<BTreeMap<u64, Note>>>,
    closed: AtomicBool,
    pending: Mutex<Vec<Change>>,
    transaction: Mutex<Option<Arc<RwLock<TransactionState>>>>,
}

impl SessionInner {
    fn ensure_open(&self) -> SessionResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(SessionError::SessionClosed)
        } else {
            Ok(())
        }
    }

    fn resolve(&self, outcome: TransactionState) {
        let pending: Vec<Change> = self.pending.lock().drain(..).collect();
        if outcome == TransactionState::Committed {
            let mut notes = self.notes.write();
            for change in pending {
                match change {
                    Change::Put(note) => {
                        notes.insert(note.id, note);
                    }
                    Change::Remove(id) => {
                        notes.remove(&id);
                    }
                }
            }
        }
        if let Some(state) = self.transaction.lock().take() {
            *state.write() = outcome;
        }
    }
}

#[derive(Clone)]
pub struct MemorySession {
    inner: Arc<SessionInner>,
}

impl MemorySession {
    pub fn stage(&self, change: Change) -> SessionResult<()> {
        self.inner.ensure_open()?;
        self.inner.pending.lock().push(change);
        Ok(())
    }

    pub fn find(&self, id: u64) -> SessionResult<Option<Note>> {
        self.inner.ensure_open()?;
        Ok(self.inner.notes.read().get(&id).cloned())
    }

    pub fn is_open(&self) -> bool {
        !self.inner.closed.load(Ordering::SeqCst)
    }

    fn query(&self, query: &str) -> SessionResult<Vec<Note>> {
        self.inner.ensure_open()?;
        if StoreProbe::tripped(&self.inner.probe.fail_query) || query != ALL_NOTES {
            return Err(SessionError::Store(format!("cannot run query: {query}")));
        }
        Ok(self.inner.notes.read().values().cloned().collect())
    }
}

#[async_trait]
impl Session for MemorySession {
    type Transaction = MemoryTransaction;
    type Row = Note;

    async fn begin_transaction(&self) -> SessionResult<Self::Transaction> {
        self.inner.ensure_open()?;
        if StoreProbe::tripped(&self.inner.probe.fail_begin) {
            return Err(SessionError::Store("begin refused".to_string()));
        }
        let mut current = self.inner.transaction.lock();
        if current.is_some() {
            return Err(SessionError::TransactionAlreadyActive);
        }
        let state = Arc::new(RwLock::new(TransactionState::Active));
        *current = Some(state.clone());
        self.inner.probe.transactions_begun.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryTransaction {
            session: self.inner.clone(),
            state,
        })
    }

    async fn fetch_all(&self, query: &str) -> SessionResult<Vec<Note>> {
        self.query(query)
    }

    async fn fetch_stream(&self, query: &str) -> SessionResult<BoxStream<'static, SessionResult<Note>>> {
        let rows = self.query(query)?;
        Ok(stream::iter(rows.into_iter().map(Ok)).boxed())
    }

    async fn close(&self) -> SessionResult<()> {
        self.inner.probe.close_calls.fetch_add(1, Ordering::SeqCst);
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.inner.resolve(TransactionState::RolledBack);
        self.inner.probe.sessions_closed.fetch_add(1, Ordering::SeqCst);
        if StoreProbe::tripped(&self.inner.probe.fail_close) {
            return Err(SessionError::Store("close failed".to_string()));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct MemoryTransaction {
    session: Arc<SessionInner>,
    state: Arc<RwLock<TransactionState>>,
}

impl MemoryTransaction {
    fn ensure_active(&self) -> SessionResult<()> {
        match self.state() {
            TransactionState::Active => self.session.ensure_open(),
            other => Err(SessionError::TransactionNotActive(other)),
        }
    }
}

#[async_trait]
impl Transaction for MemoryTransaction {
    fn state(&self) -> TransactionState {
        *self.state.read()
    }

    async fn commit(&self) -> SessionResult<()> {
        self.ensure_active()?;
        self.session.probe.commit_calls.fetch_add(1, Ordering::SeqCst);
        if StoreProbe::tripped(&self.session.probe.fail_commit) {
            return Err(SessionError::Store("commit failed".to_string()));
        }
        self.session.resolve(TransactionState::Committed);
        Ok(())
    }

    async fn rollback(&self) -> SessionResult<()> {
        self.ensure_active()?;
        self.session.probe.rollback_calls.fetch_add(1, Ordering::SeqCst);
        if StoreProbe::tripped(&self.session.probe.fail_rollback) {
            return Err(SessionError::Store("rollback failed".to_string()));
        }
        self.session.resolve(TransactionState::RolledBack);
        Ok(())
    }
}
