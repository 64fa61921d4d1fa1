//! Query orchestrator: one user message in, a stream of typed events out.
//!
//! `start` validates the request and resolves the session before returning,
//! so validation and lookup failures surface synchronously. Everything from
//! retrieval onward runs in a spawned producer task that feeds a bounded
//! channel and observes the caller's cancellation token at every await
//! point and fragment boundary.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use colloquy_types::chat::{ChatEntry, EntryType, Session, SourceCitation};
use colloquy_types::error::{GenerationError, QueryError};
use colloquy_types::query::{QueryEvent, QueryOutcome, QueryRequest};
use colloquy_types::tier::TierParams;
use colloquy_types::upstream::{GenerationEvent, GenerationRequest};

use super::prompt::{self, WordBudget};
use crate::session::SessionManager;
use crate::store::{DurableStore, FastStore};
use crate::tier::TierPolicy;
use crate::upstream::{Generator, Retriever};

/// Default capacity of the per-request event channel.
pub const DEFAULT_EVENT_BUFFER: usize = 32;

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Language of the knowledge base. Queries in any other language are
    /// translated before retrieval.
    pub knowledge_language: String,
    pub event_buffer: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            knowledge_language: "en".to_string(),
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

/// A running query.
pub struct QueryHandle {
    pub session: Session,
    pub is_new: bool,
    pub tier: TierParams,
    pub events: mpsc::Receiver<QueryEvent>,
    /// Resolves once the producer has stopped.
    pub outcome: JoinHandle<QueryOutcome>,
}

/// Per-request state carried into the producer task.
struct Turn {
    session: Session,
    tier: TierParams,
    message: String,
    language: String,
    is_new: bool,
    received_at: DateTime<Utc>,
}

pub struct QueryOrchestrator<F, D, R, G>
where
    F: FastStore,
    D: DurableStore,
    R: Retriever,
    G: Generator,
{
    sessions: SessionManager<F, D>,
    retriever: Arc<R>,
    generator: Arc<G>,
    settings: OrchestratorSettings,
}

impl<F, D, R, G> QueryOrchestrator<F, D, R, G>
where
    F: FastStore + 'static,
    D: DurableStore + 'static,
    R: Retriever + 'static,
    G: Generator + 'static,
{
    pub fn new(
        sessions: SessionManager<F, D>,
        retriever: Arc<R>,
        generator: Arc<G>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            sessions,
            retriever,
            generator,
            settings,
        }
    }

    pub fn sessions(&self) -> &SessionManager<F, D> {
        &self.sessions
    }

    /// Validate, resolve the session, and spawn the pipeline.
    ///
    /// For a new session the first event on the returned channel is
    /// `session_id`. Cancelling `cancel`, or dropping the receiver, stops the
    /// pipeline without persisting anything for the turn.
    pub async fn start(
        self: &Arc<Self>,
        request: QueryRequest,
        cancel: CancellationToken,
    ) -> Result<QueryHandle, QueryError> {
        let received_at = Utc::now();

        let message = request.message.trim().to_string();
        if message.is_empty() {
            return Err(QueryError::Validation("message must not be empty".to_string()));
        }
        let existing = parse_session_id(request.session_id.as_deref())?;

        let tier = TierPolicy::resolve(request.caller.plan_id.as_deref());
        let language = match request.language.trim() {
            "" => self.settings.knowledge_language.clone(),
            lang => lang.to_ascii_lowercase(),
        };

        let resolved = self
            .sessions
            .resolve(existing, &request.caller, &tier, &language, &message)
            .await?;

        let (tx, rx) = mpsc::channel(self.settings.event_buffer.max(1));
        if resolved.is_new {
            // Fresh channel with capacity >= 1, so this cannot be full.
            let _ = tx.try_send(QueryEvent::SessionId {
                id: resolved.session.id,
            });
        }

        let turn = Turn {
            session: resolved.session.clone(),
            tier,
            message,
            language,
            is_new: resolved.is_new,
            received_at,
        };
        let this = Arc::clone(self);
        let outcome = tokio::spawn(async move { this.run(turn, tx, cancel).await });

        Ok(QueryHandle {
            session: resolved.session,
            is_new: resolved.is_new,
            tier,
            events: rx,
            outcome,
        })
    }

    #[tracing::instrument(
        name = "query",
        skip_all,
        fields(session_id = %turn.session.id, tier = %turn.tier.tier)
    )]
    async fn run(
        self: Arc<Self>,
        mut turn: Turn,
        events: mpsc::Sender<QueryEvent>,
        cancel: CancellationToken,
    ) -> QueryOutcome {
        let started = Instant::now();
        let result = self.execute(&mut turn, &events, &cancel).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(()) => {
                info!(outcome = "completed", elapsed_ms, "query finished");
                QueryOutcome::Completed
            }
            Err(QueryError::Cancelled) => {
                info!(outcome = "cancelled", elapsed_ms, "query cancelled by caller");
                QueryOutcome::Cancelled
            }
            Err(_) if cancel.is_cancelled() => {
                info!(outcome = "cancelled", elapsed_ms, "query cancelled by caller");
                QueryOutcome::Cancelled
            }
            Err(e) => {
                warn!(outcome = "failed", elapsed_ms, error = %e, "query failed");
                let _ = events
                    .send(QueryEvent::Error {
                        code: e.code().to_string(),
                        message: e.to_string(),
                    })
                    .await;
                QueryOutcome::Failed
            }
        }
    }

    async fn execute(
        &self,
        turn: &mut Turn,
        events: &mpsc::Sender<QueryEvent>,
        cancel: &CancellationToken,
    ) -> Result<(), QueryError> {
        // CONTEXT_RETRIEVED
        let search_query = self.search_query(turn, cancel).await?;
        let mut retrieval = until_cancelled(
            cancel,
            self.retriever
                .retrieve(&search_query, turn.tier.max_references),
        )
        .await??;
        retrieval.results.truncate(turn.tier.max_references);
        let sources = retrieval.results;
        debug!(sources = sources.len(), "context retrieved");

        // GENERATING
        let history = self.load_history(turn, cancel).await?;
        let request = prompt::build_request(
            &turn.message,
            &turn.language,
            &sources,
            &history,
            turn.tier.max_answer_words,
        );
        let answer = self
            .forward_answer(request, sources.clone(), turn.tier, events, cancel)
            .await?;

        // COMPLETED
        if cancel.is_cancelled() {
            return Err(QueryError::Cancelled);
        }
        let (query_entry, answer_entry) = turn_entries(turn, &answer, sources);
        self.sessions
            .fast()
            .append_entries(
                &turn.session.id,
                &[query_entry, answer_entry],
                self.sessions.ttl(),
            )
            .await?;

        // The turn is stored from here on; nothing below may fail it.
        if let Err(e) = self
            .sessions
            .touch(&mut turn.session, &turn.tier, &turn.message)
            .await
        {
            warn!(error = %e, "session refresh failed after the turn was stored");
        }

        let suggested_questions = self.suggest(turn, &answer, cancel).await;
        let complete = QueryEvent::Complete {
            suggested_questions,
            text: None,
        };
        if emit(events, cancel, complete).await.is_err() {
            debug!("caller left before the complete event");
        }
        Ok(())
    }

    /// The query as sent to retrieval, translated into the knowledge-base
    /// language when needed.
    async fn search_query(
        &self,
        turn: &Turn,
        cancel: &CancellationToken,
    ) -> Result<String, QueryError> {
        if turn.language == self.settings.knowledge_language {
            return Ok(turn.message.clone());
        }
        let translated = until_cancelled(
            cancel,
            self.generator
                .translate(&turn.message, &self.settings.knowledge_language),
        )
        .await??;
        let translated = translated.trim();
        if translated.is_empty() {
            return Ok(turn.message.clone());
        }
        debug!(from = %turn.language, "query translated for retrieval");
        Ok(translated.to_string())
    }

    async fn load_history(
        &self,
        turn: &Turn,
        cancel: &CancellationToken,
    ) -> Result<Vec<ChatEntry>, QueryError> {
        if !turn.tier.retain_history || turn.is_new || turn.tier.history_window == 0 {
            return Ok(Vec::new());
        }
        let limit = turn.tier.history_window * 2;
        let entries = until_cancelled(
            cancel,
            self.sessions.fast().recent_entries(&turn.session.id, limit),
        )
        .await??;
        Ok(entries)
    }

    /// Stream the answer to the caller, enforcing the word ceiling.
    ///
    /// Sources ride on the first `message` event only.
    async fn forward_answer(
        &self,
        request: GenerationRequest,
        sources: Vec<SourceCitation>,
        tier: TierParams,
        events: &mpsc::Sender<QueryEvent>,
        cancel: &CancellationToken,
    ) -> Result<String, QueryError> {
        let mut stream = self.generator.stream(request);
        let mut budget = WordBudget::new(tier.max_answer_words);
        let mut pending_sources = Some(sources);
        let mut answer = String::new();

        while let Some(item) = until_cancelled(cancel, stream.next()).await? {
            if cancel.is_cancelled() {
                return Err(QueryError::Cancelled);
            }
            let text = match item? {
                GenerationEvent::Chunk(text) => text,
                GenerationEvent::Done => break,
            };

            let (accepted, exhausted) = budget.take(&text);
            if !accepted.is_empty() {
                answer.push_str(accepted);
                emit(
                    events,
                    cancel,
                    QueryEvent::Message {
                        text: accepted.to_string(),
                        sources: pending_sources.take().unwrap_or_default(),
                    },
                )
                .await?;
            }
            if exhausted {
                debug!(words = budget.words(), "word ceiling reached, dropping stream");
                break;
            }
        }

        if answer.trim().is_empty() {
            return Err(GenerationError::EmptyResponse.into());
        }
        Ok(answer)
    }

    /// Follow-up questions for the `complete` event. Best effort.
    async fn suggest(&self, turn: &Turn, answer: &str, cancel: &CancellationToken) -> Vec<String> {
        let count = turn.tier.max_suggestions;
        if count == 0 {
            return Vec::new();
        }
        let request = GenerationRequest::one_shot(prompt::suggestions_prompt(
            &turn.message,
            answer,
            &turn.language,
            count,
        ));
        match until_cancelled(cancel, self.generator.generate(&request)).await {
            Ok(Ok(reply)) => prompt::parse_suggestions(&reply, count),
            Ok(Err(e)) => {
                warn!(error = %e, "suggestion generation failed, omitting suggestions");
                Vec::new()
            }
            Err(_) => Vec::new(),
        }
    }
}

/// Parse a client-supplied session id. Blank means "no session".
fn parse_session_id(raw: Option<&str>) -> Result<Option<Uuid>, QueryError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => Uuid::parse_str(raw)
            .map(Some)
            .map_err(|_| QueryError::Validation(format!("malformed session id '{raw}'"))),
    }
}

/// Build the entry pair for a completed turn. The response is always
/// stamped strictly after the query.
fn turn_entries(
    turn: &Turn,
    answer: &str,
    sources: Vec<SourceCitation>,
) -> (ChatEntry, ChatEntry) {
    let query_at = turn.received_at;
    let answer_at = Utc::now().max(query_at + ChronoDuration::microseconds(1));
    (
        ChatEntry::new(
            turn.session.id,
            EntryType::UserQuery,
            turn.message.clone(),
            Vec::new(),
            query_at,
        ),
        ChatEntry::new(
            turn.session.id,
            EntryType::GeneratedResponse,
            answer.trim_end(),
            sources,
            answer_at,
        ),
    )
}

/// Await `fut` unless the caller cancels first.
async fn until_cancelled<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = T>,
) -> Result<T, QueryError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(QueryError::Cancelled),
        value = fut => Ok(value),
    }
}

/// Send an event; a closed receiver counts as cancellation.
async fn emit(
    events: &mpsc::Sender<QueryEvent>,
    cancel: &CancellationToken,
    event: QueryEvent,
) -> Result<(), QueryError> {
    until_cancelled(cancel, events.send(event))
        .await?
        .map_err(|_| QueryError::Cancelled)
}
