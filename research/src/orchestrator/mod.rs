//! ResearchOrchestrator - the central state machine driving a run
//!
//! Single-threaded control loop: only `URLProcessor::process_many` fans out.
//! Every other mutation — frontier, knowledge store ingestion, ledger,
//! convergence — happens serially inside `run_step`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use knowledgestore::{KnowledgeItem, KnowledgeStore, SourceKind};
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cache::ContentCache;
use crate::concurrency::{AdaptiveConcurrency, NoopResourceSample, ResourceSample};
use crate::domain::{
    Action, ActionKind, CompletionReason, Question, Reference, ResearchResult, RunMetadata, StepAction, UrlFrontier, WeightedUrl,
};
use crate::evaluator::AnswerEvaluator;
use crate::events::{Event, EventBus, EventEmitter};
use crate::fetch::UrlProcessor;
use crate::integrator::StepResultIntegrator;
use crate::ledger::TokenLedger;
use crate::llm::LlmClient;
use crate::ratelimit::RateLimiter;
use crate::retry::RetryPolicy;
use crate::router::{ActionFlags, ActionRouter, RouterInputs};
use crate::rewriter::{classify, complexity_score, fallback_queries, QueryRewriter};
use crate::scraper::Scraper;
use crate::search::SearchProvider;

/// Convergence threshold used to feed the router's `coverage_adequate`
/// signal; distinct from `beastModeThreshold`, which gates on remaining
/// token budget rather than novelty.
const NOVELTY_CONVERGENCE_THRESHOLD: f64 = 0.15;

/// Run-scoped cooperative cancellation token, plumbed into every fallible
/// operation so a user-requested stop takes effect promptly.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The external collaborators a run needs, gathered so `ResearchOrchestrator`
/// doesn't take a dozen constructor arguments.
pub struct RunDependencies {
    pub llm: Arc<dyn LlmClient>,
    pub search_providers: Vec<Arc<dyn SearchProvider>>,
    pub scraper: Arc<dyn Scraper>,
    pub archive: Arc<dyn Scraper>,
    pub alt_source: Arc<dyn Scraper>,
    pub event_bus: Arc<EventBus>,
    pub resource_sampler: Arc<dyn ResourceSample>,
    /// Shared across runs by the caller to get cross-run cache reuse (see
    /// scenario 5 in `tests/run_scenarios.rs`); a fresh orchestrator no
    /// longer builds its own.
    pub cache: Arc<ContentCache>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl RunDependencies {
    /// Convenience constructor when no real resource sampler is wired up.
    pub fn without_resource_sampler(
        llm: Arc<dyn LlmClient>,
        search_providers: Vec<Arc<dyn SearchProvider>>,
        scraper: Arc<dyn Scraper>,
        archive: Arc<dyn Scraper>,
        alt_source: Arc<dyn Scraper>,
        event_bus: Arc<EventBus>,
        cache: Arc<ContentCache>,
        rate_limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            llm,
            search_providers,
            scraper,
            archive,
            alt_source,
            event_bus,
            resource_sampler: Arc::new(NoopResourceSample),
            cache,
            rate_limiter,
        }
    }
}

/// Builds a fresh cache and rate limiter from a run's configuration, for
/// callers that don't need to share either across runs.
pub fn fresh_cache_and_limiter(config: &crate::domain::ResearchConfig) -> (Arc<ContentCache>, Arc<RateLimiter>) {
    let cache = Arc::new(ContentCache::new(
        config.cache.max_size_bytes as usize,
        config.cache.max_entries,
        Duration::from_millis(config.cache.default_ttl_ms),
    ));
    let rate_limiter = Arc::new(RateLimiter::new(
        config.rate_limit.max_per_minute as u64,
        config.rate_limit.max_per_hour as u64,
        config.rate_limit.max_per_domain as usize,
        Duration::from_millis(200),
    ));
    (cache, rate_limiter)
}

pub struct ResearchOrchestrator {
    question: Question,
    run_id: String,
    deps: RunDependencies,
    url_processor: UrlProcessor,
    knowledge: KnowledgeStore,
    ledger: TokenLedger,
    frontier: UrlFrontier,
    convergence: crate::convergence::ConvergenceDetector,
    concurrency: AdaptiveConcurrency,
    cancel: CancelToken,
    steps: Vec<StepAction>,
    bad_attempts: u32,
    beast_mode_used: bool,
    low_novelty_streak: u32,
    pending_gaps: Vec<String>,
    complexity_score: u8,
    question_type: crate::domain::QuestionType,
    started_at: Instant,
    last_draft: String,
}

impl ResearchOrchestrator {
    pub fn new(question: Question, deps: RunDependencies, cancel: CancelToken) -> Self {
        let run_id = Uuid::new_v4().to_string();
        let config = &question.config;

        let url_processor = UrlProcessor {
            cache: deps.cache.clone(),
            rate_limiter: deps.rate_limiter.clone(),
            scraper: deps.scraper.clone(),
            archive: deps.archive.clone(),
            alt_source: deps.alt_source.clone(),
            retry_policy: RetryPolicy::default(),
            fetch_timeout: config.step_timeout(),
        };
        let concurrency = AdaptiveConcurrency::new(config.concurrency.initial, crate::concurrency::AdaptiveConcurrencyConfig {
            min_concurrency: config.concurrency.min,
            max_concurrency: config.concurrency.max,
            ..Default::default()
        });

        let question_type = classify(&question.text);
        let complexity_score = complexity_score(&question.text, &fallback_queries(&question.text));

        info!(run_id = %run_id, question = %question.text, "Run created");

        Self {
            ledger: TokenLedger::new(config.token_budget, config.reserve_final_ratio),
            question,
            run_id,
            deps,
            url_processor,
            knowledge: KnowledgeStore::new(),
            frontier: UrlFrontier::new(),
            convergence: crate::convergence::ConvergenceDetector::new(),
            concurrency,
            cancel,
            steps: Vec::new(),
            bad_attempts: 0,
            beast_mode_used: false,
            low_novelty_streak: 0,
            pending_gaps: Vec::new(),
            complexity_score,
            question_type,
            started_at: Instant::now(),
            last_draft: String::new(),
        }
    }

    fn emitter(&self) -> EventEmitter {
        self.deps.event_bus.emitter_for(self.run_id.clone())
    }

    /// Drives the run to completion.
    pub async fn run(mut self) -> ResearchResult {
        let emitter = self.emitter();
        let total_timeout = self.question.config.total_timeout();
        let max_steps = self.question.config.max_steps;

        let mut step: u32 = 0;
        let completion_reason = loop {
            step += 1;

            if self.cancel.is_cancelled() {
                break CompletionReason::UserStopped;
            }
            if self.started_at.elapsed() > total_timeout {
                break CompletionReason::Timeout;
            }

            emitter.emit(Event::IterationStart { run_id: self.run_id.clone(), step });
            let (success, terminal) = self.run_step(step, max_steps, &emitter).await;
            emitter.emit(Event::IterationComplete { run_id: self.run_id.clone(), step, success });

            if let Some(reason) = terminal {
                break reason;
            }
            if step >= max_steps {
                break CompletionReason::MaxSteps;
            }
        };

        emitter.emit(Event::Complete {
            run_id: self.run_id.clone(),
            completion_reason: format!("{completion_reason:?}"),
            step_count: self.steps.len() as u32,
        });

        self.finish(completion_reason)
    }

    /// Runs one step and returns `(step_succeeded, Some(terminal_reason))`.
    /// `terminal_reason` is `Some` only when this step itself ends the run
    /// (user-stop / timeout are checked by the caller before the step starts).
    async fn run_step(&mut self, step: u32, max_steps: u32, emitter: &EventEmitter) -> (bool, Option<CompletionReason>) {
        let remaining_steps = max_steps.saturating_sub(step - 1);
        let forced_beast_mode = self.bad_attempts >= self.question.config.max_bad_attempts && !self.beast_mode_used;

        let action = if forced_beast_mode {
            Action::Answer(crate::domain::AnswerParams { draft: String::new(), beast_mode: true })
        } else {
            let inputs = RouterInputs {
                frontier_thin: self.frontier.unvisited_count(self.question.config.min_relevance_score)
                    < self.question.config.max_urls_per_step as usize,
                coverage_gap: self.knowledge.len() < (self.question.config.max_references as usize / 2).max(1),
                unvisited_above_threshold: self.frontier.unvisited_count(self.question.config.min_relevance_score),
                low_novelty_streak: self.low_novelty_streak,
                converged: self.convergence.has_converged(NOVELTY_CONVERGENCE_THRESHOLD),
                coverage_adequate: self.convergence.has_converged(NOVELTY_CONVERGENCE_THRESHOLD) && self.knowledge.len() > 0,
                reserve_exceeded: self.ledger.reserve_exceeded(),
                budget_critical: self.ledger.remaining_fraction_at_or_below(self.question.config.beast_mode_threshold),
                remaining_steps,
                question_type: self.question_type,
                gaps: self.pending_gaps.clone(),
            };
            let flags = ActionFlags {
                allow_coding: self.question.config.allow_coding,
                ..ActionFlags::default()
            };
            ActionRouter::route(&inputs, &flags)
        };

        let kind = action.kind();
        emitter.emit(Event::ActionStart { run_id: self.run_id.clone(), step, action: kind });
        let mut record = StepAction::new(step, kind, format!("dispatching {kind:?}"));

        let before_knowledge = self.knowledge.len();
        let dispatch_result = self.dispatch(action, step, emitter).await;
        let after_knowledge = self.knowledge.len();

        let novelty_rate = if before_knowledge == 0 {
            if after_knowledge > 0 {
                1.0
            } else {
                0.0
            }
        } else {
            (after_knowledge.saturating_sub(before_knowledge)) as f64 / before_knowledge as f64
        };
        self.convergence.record(novelty_rate);
        if novelty_rate < 0.05 {
            self.low_novelty_streak += 1;
        } else {
            self.low_novelty_streak = 0;
        }

        let success = dispatch_result.success;
        if let Some(err) = &dispatch_result.error {
            record.mark_failure(err.clone());
        } else {
            record.mark_success(dispatch_result.token_usage);
        }
        self.steps.push(record);
        emitter.emit(Event::ActionComplete { run_id: self.run_id.clone(), step, action: kind, success });

        // Resolve in priority order. user-stop/timeout are handled by the
        // caller; reserve-exceeded and step-cap take priority over an
        // evaluator-accepted answer, and a bad-attempts-forced beast-mode
        // answer is unconditional once it has run.
        let terminal = if forced_beast_mode {
            self.beast_mode_used = true;
            Some(CompletionReason::Answered)
        } else if self.ledger.reserve_exceeded() {
            Some(CompletionReason::BudgetExceeded)
        } else if step >= max_steps {
            Some(CompletionReason::MaxSteps)
        } else if kind == ActionKind::Answer && dispatch_result.evaluator_passed == Some(true) {
            Some(CompletionReason::Answered)
        } else {
            None
        };

        (success, terminal)
    }

    async fn dispatch(&mut self, action: Action, step: u32, emitter: &EventEmitter) -> DispatchOutcome {
        match action {
            Action::Search(_) => self.handle_search().await,
            Action::Visit(_) => self.handle_visit(emitter).await,
            Action::Reflect(_) => self.handle_reflect().await,
            Action::Answer(params) => self.handle_answer(step, params.beast_mode, emitter).await,
            Action::Coding(_) => self.handle_coding().await,
        }
    }

    async fn handle_search(&mut self) -> DispatchOutcome {
        let rewriter = QueryRewriter { llm: self.deps.llm.as_ref(), ledger: &self.ledger };

        let mut queries: Vec<String> = std::mem::take(&mut self.pending_gaps);
        if queries.is_empty() {
            let rewrite = rewriter.rewrite(&self.question.text).await;
            queries = rewrite.layers.into_iter().flat_map(|l| l.queries).collect();
        }
        queries.truncate(self.question.config.max_queries_per_step as usize);

        let mut any_success = false;
        for query in &queries {
            for provider in &self.deps.search_providers {
                match provider.search(query, self.question.config.max_urls_per_step as usize).await {
                    Ok(hits) => {
                        for hit in hits {
                            self.frontier.enqueue(WeightedUrl::new(hit.url, hit.weight, provider.name().to_string()));
                        }
                        any_success = true;
                        break;
                    }
                    Err(err) => {
                        warn!(provider = provider.name(), error = %err, query, "Provider failed, trying next");
                    }
                }
            }
        }

        DispatchOutcome { success: any_success, error: None, token_usage: Some(self.ledger.usage()), evaluator_passed: None }
    }

    async fn handle_visit(&mut self, emitter: &EventEmitter) -> DispatchOutcome {
        let candidates = self.frontier.top_unvisited(self.question.config.max_urls_per_step as usize, self.question.config.min_relevance_score);
        if candidates.is_empty() {
            return DispatchOutcome { success: false, error: Some("no unvisited urls above threshold".into()), token_usage: None, evaluator_passed: None };
        }
        let urls: Vec<String> = candidates.iter().map(|c| c.url.clone()).collect();

        let results = self
            .url_processor
            .process_many(&urls, self.concurrency.current(), None, emitter)
            .await;

        let retryable_codes = RetryPolicy::default().retryable_status_codes;
        let mut any_success = false;
        for (url, result) in results {
            match result {
                Ok(outcome) => {
                    any_success = true;
                    self.concurrency.record_outcome(true);
                    self.frontier.mark_visited(&url);
                    let keywords = extract_keywords(&outcome.content.content);
                    let summary: String = outcome.content.content.chars().take(280).collect();
                    self.knowledge.add(KnowledgeItem::new(
                        Uuid::new_v4().to_string(),
                        url,
                        SourceKind::Web,
                        summary,
                        outcome.content.content,
                        keywords,
                    ));
                }
                Err(err) => {
                    self.concurrency.record_outcome(false);
                    self.frontier.mark_failed(&url, err.is_retryable(&retryable_codes));
                }
            }
        }
        self.concurrency.adjust_and_emit(self.deps.resource_sampler.as_ref(), &self.run_id, emitter);

        DispatchOutcome { success: any_success, error: None, token_usage: None, evaluator_passed: None }
    }

    async fn handle_reflect(&mut self) -> DispatchOutcome {
        let rewriter = QueryRewriter { llm: self.deps.llm.as_ref(), ledger: &self.ledger };
        let gaps = if self.pending_gaps.is_empty() { vec![self.question.text.clone()] } else { self.pending_gaps.clone() };
        let follow_ups = rewriter.follow_up_queries(&gaps);
        self.pending_gaps = follow_ups;
        DispatchOutcome { success: true, error: None, token_usage: Some(self.ledger.usage()), evaluator_passed: None }
    }

    async fn handle_answer(&mut self, step: u32, beast_mode: bool, emitter: &EventEmitter) -> DispatchOutcome {
        let summary = self.knowledge.summary_text(self.question.config.max_references as usize, 280);
        let draft = if summary.is_empty() {
            format!("Unable to find sufficient sources for: {}", self.question.text)
        } else {
            format!("Based on {} sources:\n{summary}", self.knowledge.len())
        };

        let evaluator = AnswerEvaluator { llm: self.deps.llm.as_ref(), ledger: &self.ledger };
        let verdict = evaluator.evaluate(&self.question.text, &draft, &summary).await;
        emitter.emit(Event::AnswerEvaluated { run_id: self.run_id.clone(), step, passed: verdict.pass, reason: verdict.rationale.clone() });

        self.last_draft = draft;

        if beast_mode {
            self.beast_mode_used = true;
            return DispatchOutcome { success: true, error: None, token_usage: Some(self.ledger.usage()), evaluator_passed: Some(true) };
        }

        if verdict.pass {
            DispatchOutcome { success: true, error: None, token_usage: Some(self.ledger.usage()), evaluator_passed: Some(true) }
        } else {
            self.bad_attempts += 1;
            DispatchOutcome { success: false, error: None, token_usage: Some(self.ledger.usage()), evaluator_passed: Some(false) }
        }
    }

    /// Coding is opaque to this core: the result is recorded as a
    /// `sourceKind=code` knowledge item, never interpreted further here.
    async fn handle_coding(&mut self) -> DispatchOutcome {
        let content = format!("coding subroutine stub for: {}", self.question.text);
        self.knowledge.add(KnowledgeItem::new(Uuid::new_v4().to_string(), "coding", SourceKind::Code, "coding result", content, Vec::new()));
        DispatchOutcome { success: true, error: None, token_usage: None, evaluator_passed: None }
    }

    fn finish(self, completion_reason: CompletionReason) -> ResearchResult {
        let items = self.knowledge.snapshot();
        let integrator = StepResultIntegrator::default();
        let report = integrator.integrate(&items, self.pending_gaps.clone());

        let references: Vec<Reference> = report
            .sources
            .iter()
            .cloned()
            .map(|url| Reference { url: url.clone(), title: url, quote: None, accessed_at: chrono::Utc::now() })
            .collect();

        let answer =
            if self.last_draft.is_empty() { format!("No answer could be produced for: {}", self.question.text) } else { self.last_draft };

        let metadata = RunMetadata {
            duration_ms: self.started_at.elapsed().as_millis() as u64,
            step_count: self.steps.len() as u32,
            beast_mode_used: self.beast_mode_used,
            question_type: self.question_type,
            complexity_score: self.complexity_score,
        };

        ResearchResult {
            answer,
            references,
            knowledge: items,
            steps: self.steps,
            token_usage: self.ledger.usage(),
            metadata,
            completion_reason,
            report,
        }
    }
}

struct DispatchOutcome {
    success: bool,
    error: Option<String>,
    token_usage: Option<crate::ledger::TokenUsage>,
    evaluator_passed: Option<bool>,
}

fn extract_keywords(content: &str) -> Vec<String> {
    content
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| w.len() > 3)
        .take(20)
        .collect()
}
