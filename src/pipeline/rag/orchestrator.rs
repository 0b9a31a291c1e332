use super::fusion::fuse_context;
use super::intent::classify_intent;
use super::memory::SessionStore;
use super::retrieval::semantic_search;
use super::sql_agent::{recent_entity_hint, StructuredQueryAgent};
use super::synthesize::{synthesize_answer, synthesize_greeting};
use super::types::{Intent, QueryAttempt, SemanticMatch, VectorIndex};
use crate::llm::LlmClient;
use crate::pipeline::index::embedder::EmbeddingModel;
use crate::store::StructuredStore;

/// Reply when the input is blank after trimming.
const EMPTY_INPUT_REPLY: &str =
    "I didn't catch a question there. Ask me about entitlements, roles, applications, or \
     projects and I'll look it up.";

/// Tuning knobs shared by every request.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Top-N semantic matches requested per query.
    pub semantic_top_n: usize,
    /// Advisory row cap embedded in the SQL-generation prompt.
    pub sql_row_cap: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            semantic_top_n: 5,
            sql_row_cap: 5,
        }
    }
}

/// Full conversational pipeline orchestrator.
///
/// Per request: classify → (greeting reply) | (retrieve both channels →
/// interpret → fuse → synthesize) → save turn. Transitions are strictly
/// forward; a failure at any retrieval or generation stage degrades to a
/// placeholder, and the request always ends with a non-empty reply that
/// is recorded in session memory.
pub struct AssistantPipeline<L, E, V, S>
where
    L: LlmClient,
    E: EmbeddingModel,
    V: VectorIndex,
    S: StructuredStore,
{
    llm: L,
    embedder: E,
    index: V,
    store: S,
    memory: SessionStore,
    options: PipelineOptions,
}

impl<L, E, V, S> AssistantPipeline<L, E, V, S>
where
    L: LlmClient,
    E: EmbeddingModel,
    V: VectorIndex,
    S: StructuredStore,
{
    pub fn new(
        llm: L,
        embedder: E,
        index: V,
        store: S,
        memory: SessionStore,
        options: PipelineOptions,
    ) -> Self {
        Self {
            llm,
            embedder,
            index,
            store,
            memory,
            options,
        }
    }

    pub fn memory(&self) -> &SessionStore {
        &self.memory
    }

    /// Answer one user query within a session. Never fails; never
    /// returns an empty string.
    pub fn submit_query(&self, session_id: &str, raw_query: &str) -> String {
        let text = raw_query.trim();
        if text.is_empty() {
            return EMPTY_INPUT_REPLY.to_string();
        }

        let reply = match classify_intent(text) {
            Intent::Greeting { name } => {
                tracing::debug!(session_id, "Greeting branch");
                synthesize_greeting(&self.llm, text, name.as_deref())
            }
            Intent::Informational => self.answer_informational(session_id, text),
        };

        // Saved unconditionally — degraded replies keep the thread coherent.
        self.memory.save(session_id, text, &reply);
        reply
    }

    fn answer_informational(&self, session_id: &str, text: &str) -> String {
        let history = self.memory.load(session_id);
        let hint = recent_entity_hint(&history);

        // The two channels have no data dependency; run them side by
        // side and join before fusion.
        let (attempt, matches) = self.retrieve(text, hint.as_deref());

        tracing::info!(
            session_id,
            status = ?attempt.status,
            semantic_matches = matches.len(),
            "Retrieval complete"
        );

        let fused = fuse_context(text, &attempt, &matches);
        synthesize_answer(&self.llm, &history, &fused, &attempt.generated_sql, text)
    }

    fn retrieve(&self, text: &str, hint: Option<&str>) -> (QueryAttempt, Vec<SemanticMatch>) {
        std::thread::scope(|scope| {
            let structured = scope.spawn(|| {
                let agent =
                    StructuredQueryAgent::new(&self.llm, &self.store, self.options.sql_row_cap);
                agent.run(text, hint)
            });
            let semantic = scope.spawn(|| {
                semantic_search(
                    text,
                    &self.embedder,
                    &self.index,
                    self.options.semantic_top_n,
                )
            });

            let attempt = structured.join().unwrap_or_else(|_| {
                tracing::error!("Structured retrieval thread panicked");
                QueryAttempt::error(text, "not stated", "structured retrieval panicked")
            });
            let matches = semantic.join().unwrap_or_else(|_| {
                tracing::error!("Semantic retrieval thread panicked");
                Vec::new()
            });
            (attempt, matches)
        })
    }
}
