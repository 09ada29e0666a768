use super::budget::{budget_context, MAX_CONTEXT_CHARS};
use super::dispatch::{Dispatcher, TOOL_TIMEOUT};
use super::ledger::{Step, StepKind};
use super::parser::{parse_tool_call, strip_reasoning};
use super::repeat::detect_loop;
use super::session::{Session, SessionSnapshot, SessionStatus};
use crate::config::LimitsConfig;
use crate::llm::{Generator, Message};
use crate::tools::Toolkit;
use crate::utils::truncate_with_ellipsis;
use serde_json::Value;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

// ── Constants ────────────────────────────────────────────────────────────────

/// Hard cap on reason/act iterations per run.
pub const MAX_ITERATIONS: u32 = 8;

/// Cap on a single recorded observation.
const OBSERVATION_MAX_CHARS: usize = 2_000;

/// Output-format contract appended to the system prompt whenever tools are
/// present.
const FORMAT_INSTRUCTIONS: &str = "\
## Tool call format

To use a tool, emit exactly one JSON object on a single line:
{\"tool\": \"<name>\", \"args\": {...}}

Rules:
- At most one tool call per turn.
- Never mix a tool call with a final answer in the same turn.
- A turn without a tool call is treated as your final answer.
";

/// Injected when the same call keeps being re-issued.
const REPEAT_CORRECTION: &str = "\
You have called the same tool with the same arguments several times in a \
row. Do not call it again. Answer the user's question now with the \
information already gathered.";

const STOPPED_ANSWER: &str = "Stopped by user before an answer was produced.";
const EXHAUSTED_ANSWER: &str = "Could not find an answer within the iteration limit.";

/// Live session handle. Each `run` keeps its own clone, so a run replaced
/// mid-flight finishes against its own trace rather than its successor's.
type SharedSession = Arc<Mutex<Session>>;

// ── Controller ───────────────────────────────────────────────────────────────

/// The top-level state machine: drives the reason/act/observe iteration,
/// owns the active session and its cancellation token.
///
/// One logical operation is in flight at any instant — either awaiting the
/// generator or awaiting a tool, never both. Starting a new [`run`] cancels
/// and detaches the previous session (overwrite-on-start, not a queue); the
/// detached run unwinds into its own trace, which [`snapshot`] no longer
/// exposes.
///
/// [`run`]: AgentLoop::run
/// [`snapshot`]: AgentLoop::snapshot
pub struct AgentLoop {
    generator: Arc<dyn Generator>,
    toolkit: Arc<Toolkit>,
    dispatcher: Dispatcher,
    max_iterations: u32,
    max_context_chars: usize,
    observation_max_chars: usize,
    session: Mutex<SharedSession>,
}

impl AgentLoop {
    pub fn new(generator: Arc<dyn Generator>, toolkit: Arc<Toolkit>) -> Self {
        Self {
            generator,
            toolkit,
            dispatcher: Dispatcher::new(TOOL_TIMEOUT),
            max_iterations: MAX_ITERATIONS,
            max_context_chars: MAX_CONTEXT_CHARS,
            observation_max_chars: OBSERVATION_MAX_CHARS,
            session: Mutex::new(Arc::new(Mutex::new(Session::new()))),
        }
    }

    pub fn with_limits(
        generator: Arc<dyn Generator>,
        toolkit: Arc<Toolkit>,
        limits: &LimitsConfig,
    ) -> Self {
        Self {
            generator,
            toolkit,
            dispatcher: Dispatcher::new(Duration::from_secs(limits.tool_timeout_secs)),
            max_iterations: limits.max_iterations,
            max_context_chars: limits.max_context_chars,
            observation_max_chars: limits.observation_max_chars,
            session: Mutex::new(Arc::new(Mutex::new(Session::new()))),
        }
    }

    /// Run the loop for one query to completion.
    ///
    /// Every terminal path returns a non-empty string: the model's final
    /// answer, a synthesized partial/fallback answer, or an error-tagged
    /// message when generation itself failed (the one fatal, non-retried
    /// condition).
    pub async fn run(&self, query: &str, system_prompt: &str) -> String {
        let (session, cancel) = self.start_session();
        let session_id = with_session(&session, |session| session.id);
        tracing::info!(session = %session_id, "agent loop started");

        let system = build_system_prompt(system_prompt, &self.toolkit);
        let mut messages = vec![Message::system(system), Message::user(query)];

        let mut iteration: u32 = 0;
        while iteration < self.max_iterations {
            if cancel.is_cancelled() {
                return finish_cancelled(&session);
            }
            iteration += 1;
            with_session(&session, |session| {
                session.iteration = iteration;
                session.status = SessionStatus::Thinking;
            });

            messages = budget_context(messages, self.max_context_chars);
            let raw = match self.generator.generate(&messages, None).await {
                Ok(text) => text,
                Err(error) => {
                    tracing::error!(error = %format!("{error:#}"), "generation failed");
                    let answer = format!("Error: generation failed: {error:#}");
                    with_session(&session, |session| {
                        session.ledger.record(StepKind::Error, &answer);
                        session.status = SessionStatus::Error;
                    });
                    return answer;
                }
            };
            if cancel.is_cancelled() {
                return finish_cancelled(&session);
            }

            let cleaned = strip_reasoning(&raw);
            let Some(call) = parse_tool_call(&cleaned) else {
                // No tool call: the whole turn is the final answer.
                return finish_final(&session, &cleaned, iteration);
            };
            tracing::debug!(iteration, tool = %call.tool, "tool call parsed");

            let args_value = Value::Object(call.args.clone());
            let repeated = with_session(&session, |session| {
                let mut recent = session.ledger.steps().to_vec();
                recent.push(Step::action_candidate(
                    session.ledger.peek_next_id(),
                    &call.tool,
                    args_value.clone(),
                ));
                detect_loop(&recent)
            });
            if repeated {
                tracing::warn!(tool = %call.tool, "repeated tool call detected, skipping execution");
                with_session(&session, |session| {
                    session.ledger.record(
                        StepKind::Error,
                        format!(
                            "Detected repeated calls to \"{}\" with identical arguments; \
                             asked the model to answer directly",
                            call.tool
                        ),
                    );
                });
                messages.push(Message::assistant(&raw));
                messages.push(Message::user(REPEAT_CORRECTION));
                continue;
            }

            if cancel.is_cancelled() {
                return finish_cancelled(&session);
            }
            with_session(&session, |session| {
                if !call.thought.is_empty() {
                    session.ledger.record(StepKind::Thought, &call.thought);
                }
                session.ledger.record_action(&call.tool, args_value);
                session.status = SessionStatus::Acting;
            });

            let started = Instant::now();
            let observation = self
                .dispatcher
                .execute(&call.tool, &call.args, &self.toolkit, &cancel)
                .await;
            if cancel.is_cancelled() {
                return finish_cancelled(&session);
            }
            let duration_ms =
                u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
            let observation =
                truncate_with_ellipsis(&observation, self.observation_max_chars);
            tracing::debug!(tool = %call.tool, duration_ms, "tool call finished");
            with_session(&session, |session| {
                session.ledger.record_observation(&observation, duration_ms);
            });

            messages.push(Message::assistant(&raw));
            messages.push(Message::user(format!(
                "Tool result for \"{}\":\n{observation}",
                call.tool
            )));
        }

        finish_exhausted(&session)
    }

    /// Cancel the active session. Returns immediately; the running loop
    /// notices at its next checkpoint.
    pub fn abort(&self) {
        with_session(&self.current_session(), |session| session.cancel());
    }

    /// Cancel the active session and clear all session state.
    pub fn reset(&self) {
        let mut current = self
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        with_session(&current, |session| session.cancel());
        *current = Arc::new(Mutex::new(Session::new()));
    }

    /// Point-in-time view of the live session for trace rendering.
    pub fn snapshot(&self) -> SessionSnapshot {
        with_session(&self.current_session(), |session| session.snapshot())
    }

    // ── Internal ─────────────────────────────────────────────────────────

    /// Cancel and detach any previous session; install a fresh one and hand
    /// back a handle plus its token. The replaced run keeps its own handle
    /// and never writes into the fresh session.
    fn start_session(&self) -> (SharedSession, CancellationToken) {
        let fresh: SharedSession = Arc::new(Mutex::new(Session::new()));
        let token = with_session(&fresh, |session| session.cancel_token());
        let mut current = self
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        with_session(&current, |session| session.cancel());
        *current = Arc::clone(&fresh);
        (fresh, token)
    }

    fn current_session(&self) -> SharedSession {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

// ── Free functions ───────────────────────────────────────────────────────────

fn with_session<T>(session: &SharedSession, f: impl FnOnce(&mut Session) -> T) -> T {
    let mut guard = session.lock().unwrap_or_else(PoisonError::into_inner);
    f(&mut guard)
}

fn finish_final(session: &SharedSession, cleaned: &str, iteration: u32) -> String {
    let answer = if cleaned.is_empty() {
        // The model produced nothing usable; keep the non-empty terminal
        // guarantee.
        EXHAUSTED_ANSWER.to_string()
    } else {
        cleaned.to_string()
    };
    with_session(session, |session| {
        session.ledger.record(StepKind::Final, &answer);
        session.status = SessionStatus::Done;
    });
    tracing::info!(iterations = iteration, "agent loop finished");
    answer
}

fn finish_cancelled(session: &SharedSession) -> String {
    let answer = with_session(session, |session| {
        let answer = session
            .ledger
            .last_of(StepKind::Observation)
            .map_or_else(
                || STOPPED_ANSWER.to_string(),
                |step| {
                    format!(
                        "The run was stopped early. Partial result from the last tool call:\n{}",
                        step.content
                    )
                },
            );
        session.ledger.record(StepKind::Final, &answer);
        session.status = SessionStatus::Done;
        answer
    });
    tracing::info!("agent loop cancelled");
    answer
}

fn finish_exhausted(session: &SharedSession) -> String {
    let answer = with_session(session, |session| {
        let answer = session
            .ledger
            .last_of(StepKind::Observation)
            .map_or_else(
                || EXHAUSTED_ANSWER.to_string(),
                |step| {
                    format!(
                        "Reached the iteration limit. Best available result from the last tool call:\n{}",
                        step.content
                    )
                },
            );
        session.ledger.record(StepKind::Final, &answer);
        session.status = SessionStatus::Done;
        answer
    });
    tracing::warn!("agent loop exhausted its iteration budget");
    answer
}

/// Augment the base prompt with the tools actually present in the toolkit.
/// Absent capabilities are never advertised; an empty toolkit leaves the
/// prompt untouched.
fn build_system_prompt(base: &str, toolkit: &Toolkit) -> String {
    let present = toolkit.present();
    if present.is_empty() {
        return base.to_string();
    }

    let mut prompt = format!("{base}\n\n## Available tools\n\n");
    for tool in present {
        let _ = writeln!(
            prompt,
            "- {tool}: {} (argument: \"{}\")",
            tool.description(),
            tool.arg_key()
        );
    }
    prompt.push('\n');
    prompt.push_str(FORMAT_INSTRUCTIONS);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{ToolName, WebSearch};
    use async_trait::async_trait;

    struct NeverCalled;

    #[async_trait]
    impl WebSearch for NeverCalled {
        async fn search(&self, _query: &str) -> anyhow::Result<String> {
            unreachable!("prompt-building tests never execute tools")
        }
    }

    #[test]
    fn empty_toolkit_leaves_prompt_untouched() {
        let prompt = build_system_prompt("You are helpful.", &Toolkit::new());
        assert_eq!(prompt, "You are helpful.");
        assert!(!prompt.contains("Available tools"));
    }

    #[test]
    fn present_tools_are_enumerated() {
        let toolkit = Toolkit::new().with_web_search(Arc::new(NeverCalled));
        let prompt = build_system_prompt("Base.", &toolkit);
        assert!(prompt.starts_with("Base."));
        assert!(prompt.contains("- web_search:"));
        assert!(prompt.contains("argument: \"query\""));
        assert!(prompt.contains("one JSON object on a single line"));
    }

    #[test]
    fn absent_tools_are_not_advertised() {
        let toolkit = Toolkit::new().with_web_search(Arc::new(NeverCalled));
        let prompt = build_system_prompt("Base.", &toolkit);
        for name in [
            ToolName::RagSearch,
            ToolName::Python,
            ToolName::MemorySave,
            ToolName::MemoryRecall,
        ] {
            assert!(!prompt.contains(&format!("- {name}:")));
        }
    }
}
