//! In-memory stores and scripted collaborators for unit tests.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use colloquy_types::chat::{ChatEntry, EntryType, Session, SourceCitation};
use colloquy_types::error::{GenerationError, RepositoryError, RetrievalError};
use colloquy_types::upstream::{GenerationEvent, GenerationRequest, RetrievalResult};
use uuid::Uuid;

use crate::store::{DurableStore, FastStore, SessionPage, UpsertReport};
use crate::upstream::{GenerationStream, Generator, Retriever};

static CLOCK_SKEW_MICROS: AtomicI64 = AtomicI64::new(0);

/// An account session for `user_id`.
pub fn account_session(user_id: &str) -> Session {
    Session::new(Some(user_id.to_string()), "en", "test session")
}

/// A non-durable entry with a strictly increasing timestamp.
pub fn entry(session_id: Uuid, entry_type: EntryType, content: &str) -> ChatEntry {
    let skew = CLOCK_SKEW_MICROS.fetch_add(1, Ordering::SeqCst);
    ChatEntry::new(
        session_id,
        entry_type,
        content,
        Vec::new(),
        Utc::now() + ChronoDuration::microseconds(skew),
    )
}

pub fn citations(n: usize) -> Vec<SourceCitation> {
    (1..=n)
        .map(|i| SourceCitation {
            content: format!("Passage {i}"),
            source: "constitution".to_string(),
            article_number: i.to_string(),
            topics: vec!["rights".to_string()],
        })
        .collect()
}

// --- Fast store ---

#[derive(Default)]
struct FastInner {
    sessions: HashMap<Uuid, Session>,
    puts: HashMap<Uuid, usize>,
    entries: HashMap<Uuid, Vec<ChatEntry>>,
    owned: Vec<Uuid>,
    fail_appends: bool,
    fail_puts: bool,
    unavailable: bool,
}

#[derive(Default)]
pub struct MemoryFastStore {
    inner: Mutex<FastInner>,
}

impl MemoryFastStore {
    fn with<T>(&self, f: impl FnOnce(&mut FastInner) -> T) -> T {
        let mut inner = self.inner.lock().unwrap();
        f(&mut inner)
    }

    fn checked<T>(
        &self,
        f: impl FnOnce(&mut FastInner) -> T,
    ) -> Result<T, RepositoryError> {
        self.with(|inner| {
            if inner.unavailable {
                Err(RepositoryError::Connection)
            } else {
                Ok(f(inner))
            }
        })
    }

    pub fn session(&self, id: &Uuid) -> Option<Session> {
        self.with(|inner| inner.sessions.get(id).cloned())
    }

    pub fn session_count(&self) -> usize {
        self.with(|inner| inner.sessions.len())
    }

    pub fn put_count(&self, id: &Uuid) -> usize {
        self.with(|inner| inner.puts.get(id).copied().unwrap_or(0))
    }

    pub fn owned(&self) -> Vec<Uuid> {
        self.with(|inner| inner.owned.clone())
    }

    /// Drop the session as if its TTL ran out. Entries expire with it.
    pub fn expire(&self, id: &Uuid) {
        self.with(|inner| {
            inner.sessions.remove(id);
            inner.entries.remove(id);
        });
    }

    pub fn fail_appends(&self, fail: bool) {
        self.with(|inner| inner.fail_appends = fail);
    }

    pub fn fail_puts(&self, fail: bool) {
        self.with(|inner| inner.fail_puts = fail);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.with(|inner| inner.unavailable = unavailable);
    }
}

impl FastStore for MemoryFastStore {
    fn put_session(
        &self,
        session: &Session,
        _ttl: Duration,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send {
        let result = self
            .checked(|inner| {
                if inner.fail_puts {
                    return Err(RepositoryError::Query("put rejected".to_string()));
                }
                inner.sessions.insert(session.id, session.clone());
                *inner.puts.entry(session.id).or_default() += 1;
                Ok(())
            })
            .and_then(|r| r);
        async move { result }
    }

    fn get_session(
        &self,
        session_id: &Uuid,
    ) -> impl Future<Output = Result<Option<Session>, RepositoryError>> + Send {
        let result = self.checked(|inner| inner.sessions.get(session_id).cloned());
        async move { result }
    }

    fn append_entries(
        &self,
        session_id: &Uuid,
        entries: &[ChatEntry],
        _ttl: Duration,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send {
        let result = self
            .checked(|inner| {
                if inner.fail_appends {
                    return Err(RepositoryError::Query("append rejected".to_string()));
                }
                let list = inner.entries.entry(*session_id).or_default();
                for entry in entries {
                    list.retain(|existing| existing.id != entry.id);
                    list.push(entry.clone());
                }
                Ok(())
            })
            .and_then(|r| r);
        async move { result }
    }

    fn recent_entries(
        &self,
        session_id: &Uuid,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<ChatEntry>, RepositoryError>> + Send {
        let result = self.checked(|inner| {
            let list = inner.entries.get(session_id).cloned().unwrap_or_default();
            let skip = list.len().saturating_sub(limit);
            list.into_iter().skip(skip).collect()
        });
        async move { result }
    }

    fn entries(
        &self,
        session_id: &Uuid,
    ) -> impl Future<Output = Result<Vec<ChatEntry>, RepositoryError>> + Send {
        let result =
            self.checked(|inner| inner.entries.get(session_id).cloned().unwrap_or_default());
        async move { result }
    }

    fn mark_durable(
        &self,
        session_id: &Uuid,
        entry_ids: &[Uuid],
    ) -> impl Future<Output = Result<u64, RepositoryError>> + Send {
        let result = self.checked(|inner| {
            let mut changed = 0;
            if let Some(list) = inner.entries.get_mut(session_id) {
                for entry in list.iter_mut() {
                    if !entry.durable && entry_ids.contains(&entry.id) {
                        entry.durable = true;
                        changed += 1;
                    }
                }
            }
            changed
        });
        async move { result }
    }

    fn register_owned(
        &self,
        session_id: &Uuid,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send {
        let result = self.checked(|inner| {
            if !inner.owned.contains(session_id) {
                inner.owned.push(*session_id);
            }
        });
        async move { result }
    }

    fn unregister_owned(
        &self,
        session_id: &Uuid,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send {
        let result = self.checked(|inner| inner.owned.retain(|id| id != session_id));
        async move { result }
    }

    fn owned_sessions(&self) -> impl Future<Output = Result<Vec<Uuid>, RepositoryError>> + Send {
        let result = self.checked(|inner| inner.owned.clone());
        async move { result }
    }

    fn purge_expired(&self) -> impl Future<Output = Result<u64, RepositoryError>> + Send {
        let result = self.checked(|_| 0);
        async move { result }
    }
}

// --- Durable store ---

#[derive(Default)]
struct DurableInner {
    sessions: HashMap<Uuid, Session>,
    entries: HashMap<Uuid, ChatEntry>,
    writes: usize,
    failing_entries: HashSet<Uuid>,
    unavailable: bool,
}

#[derive(Default)]
pub struct MemoryDurableStore {
    inner: Mutex<DurableInner>,
}

impl MemoryDurableStore {
    fn with<T>(&self, f: impl FnOnce(&mut DurableInner) -> T) -> T {
        let mut inner = self.inner.lock().unwrap();
        f(&mut inner)
    }

    fn checked<T>(
        &self,
        f: impl FnOnce(&mut DurableInner) -> T,
    ) -> Result<T, RepositoryError> {
        self.with(|inner| {
            if inner.unavailable {
                Err(RepositoryError::Connection)
            } else {
                Ok(f(inner))
            }
        })
    }

    pub fn insert_session(&self, session: Session) {
        self.with(|inner| inner.sessions.insert(session.id, session));
    }

    pub fn session(&self, id: &Uuid) -> Option<Session> {
        self.with(|inner| inner.sessions.get(id).cloned())
    }

    pub fn entry_count(&self) -> usize {
        self.with(|inner| inner.entries.len())
    }

    /// Successful entry writes, including repeats of the same id.
    pub fn entry_writes(&self) -> usize {
        self.with(|inner| inner.writes)
    }

    pub fn fail_entry(&self, id: Uuid) {
        self.with(|inner| inner.failing_entries.insert(id));
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.with(|inner| inner.unavailable = unavailable);
    }

    fn sorted_entries(inner: &DurableInner, session_id: &Uuid) -> Vec<ChatEntry> {
        let mut list: Vec<ChatEntry> = inner
            .entries
            .values()
            .filter(|e| e.session_id == *session_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        list
    }
}

impl DurableStore for MemoryDurableStore {
    fn upsert_session(
        &self,
        session: &Session,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send {
        let result = self.checked(|inner| {
            inner.sessions.insert(session.id, session.clone());
        });
        async move { result }
    }

    fn get_session(
        &self,
        session_id: &Uuid,
    ) -> impl Future<Output = Result<Option<Session>, RepositoryError>> + Send {
        let result = self.checked(|inner| inner.sessions.get(session_id).cloned());
        async move { result }
    }

    fn list_sessions(
        &self,
        user_id: &str,
        page: u32,
        limit: u32,
    ) -> impl Future<Output = Result<SessionPage, RepositoryError>> + Send {
        let result = self.checked(|inner| {
            let mut owned: Vec<Session> = inner
                .sessions
                .values()
                .filter(|s| s.user_id.as_deref() == Some(user_id))
                .cloned()
                .collect();
            owned.sort_by(|a, b| b.last_active_at.cmp(&a.last_active_at));
            let total = owned.len() as u64;
            let skip = (page.saturating_sub(1) * limit) as usize;
            SessionPage {
                sessions: owned.into_iter().skip(skip).take(limit as usize).collect(),
                total,
            }
        });
        async move { result }
    }

    fn list_entries(
        &self,
        session_id: &Uuid,
        limit: Option<u32>,
    ) -> impl Future<Output = Result<Vec<ChatEntry>, RepositoryError>> + Send {
        let result = self.checked(|inner| {
            Self::sorted_entries(inner, session_id)
                .into_iter()
                .take(limit.map_or(usize::MAX, |n| n as usize))
                .collect()
        });
        async move { result }
    }

    fn recent_entries(
        &self,
        session_id: &Uuid,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<ChatEntry>, RepositoryError>> + Send {
        let result = self.checked(|inner| {
            let list = Self::sorted_entries(inner, session_id);
            let skip = list.len().saturating_sub(limit as usize);
            list.into_iter().skip(skip).collect()
        });
        async move { result }
    }

    fn upsert_entries(
        &self,
        entries: &[ChatEntry],
    ) -> impl Future<Output = Result<UpsertReport, RepositoryError>> + Send {
        let result = self.checked(|inner| {
            let mut report = UpsertReport::default();
            for entry in entries {
                if inner.failing_entries.contains(&entry.id) {
                    report
                        .failed
                        .push((entry.id, "constraint violation".to_string()));
                    continue;
                }
                let mut stored = entry.clone();
                stored.durable = true;
                inner.entries.insert(entry.id, stored);
                inner.writes += 1;
                report.upserted.push(entry.id);
            }
            report
        });
        async move { result }
    }
}

// --- Collaborators ---

#[derive(Default)]
pub struct ScriptedRetriever {
    results: Vec<SourceCitation>,
    fail: bool,
    calls: Mutex<Vec<(String, usize)>>,
}

impl ScriptedRetriever {
    pub fn with_results(results: Vec<SourceCitation>) -> Self {
        Self {
            results,
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<(String, usize)> {
        self.calls.lock().unwrap().clone()
    }
}

impl Retriever for ScriptedRetriever {
    fn retrieve(
        &self,
        query: &str,
        k: usize,
    ) -> impl Future<Output = Result<RetrievalResult, RetrievalError>> + Send {
        self.calls.lock().unwrap().push((query.to_string(), k));
        let result = if self.fail {
            Err(RetrievalError::Status {
                status: 503,
                body: "retrieval unavailable".to_string(),
            })
        } else {
            Ok(RetrievalResult {
                results: self.results.clone(),
                message: String::new(),
            })
        };
        async move { result }
    }
}

/// Sets a flag when the stream it lives in is dropped.
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

pub struct ScriptedGenerator {
    chunks: Vec<String>,
    hang_after: Option<usize>,
    fail_after: Option<usize>,
    suggestions: String,
    fail_generate: bool,
    hang_generate: bool,
    stream_dropped: Arc<AtomicBool>,
    requests: Mutex<Vec<GenerationRequest>>,
    one_shot: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    /// Stream `text` one word (plus trailing space) per chunk.
    pub fn words(text: &str) -> Self {
        Self {
            chunks: text.split_whitespace().map(|w| format!("{w} ")).collect(),
            hang_after: None,
            fail_after: None,
            suggestions: String::new(),
            fail_generate: false,
            hang_generate: false,
            stream_dropped: Arc::new(AtomicBool::new(false)),
            requests: Mutex::new(Vec::new()),
            one_shot: Mutex::new(Vec::new()),
        }
    }

    /// Stop producing (without ending) after `n` chunks.
    pub fn hang_after(mut self, n: usize) -> Self {
        self.hang_after = Some(n);
        self
    }

    /// Yield an error after `n` chunks.
    pub fn fail_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    pub fn with_suggestions(mut self, reply: &str) -> Self {
        self.suggestions = reply.to_string();
        self
    }

    pub fn with_failing_generate(mut self) -> Self {
        self.fail_generate = true;
        self
    }

    /// One-shot calls never return.
    pub fn with_hanging_generate(mut self) -> Self {
        self.hang_generate = true;
        self
    }

    pub fn stream_dropped(&self) -> bool {
        self.stream_dropped.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn one_shot_prompts(&self) -> Vec<String> {
        self.one_shot.lock().unwrap().clone()
    }
}

impl Generator for ScriptedGenerator {
    fn generate(
        &self,
        request: &GenerationRequest,
    ) -> impl Future<Output = Result<String, GenerationError>> + Send {
        self.one_shot.lock().unwrap().push(request.prompt.clone());
        let result = if self.fail_generate {
            Err(GenerationError::Provider {
                message: "quota exceeded".to_string(),
            })
        } else {
            Ok(self.suggestions.clone())
        };
        let hang = self.hang_generate;
        async move {
            if hang {
                futures_util::future::pending::<()>().await;
            }
            result
        }
    }

    fn stream(&self, request: GenerationRequest) -> GenerationStream {
        self.requests.lock().unwrap().push(request);
        let chunks = self.chunks.clone();
        let hang_after = self.hang_after;
        let fail_after = self.fail_after;
        let flag = DropFlag(Arc::clone(&self.stream_dropped));

        Box::pin(async_stream::stream! {
            let _flag = flag;
            for (i, chunk) in chunks.into_iter().enumerate() {
                if hang_after == Some(i) {
                    futures_util::future::pending::<()>().await;
                }
                if fail_after == Some(i) {
                    yield Err(GenerationError::Stream("connection reset".to_string()));
                    return;
                }
                tokio::task::yield_now().await;
                yield Ok(GenerationEvent::Chunk(chunk));
            }
            yield Ok(GenerationEvent::Done);
        })
    }

    fn translate(
        &self,
        text: &str,
        target_language: &str,
    ) -> impl Future<Output = Result<String, GenerationError>> + Send {
        let translated = format!("[{target_language}] {text}");
        async move { Ok(translated) }
    }
}
