use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of a recorded trace step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Thought,
    Action,
    Observation,
    Final,
    Error,
}

/// One immutable unit of the loop's trace. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: u64,
    pub kind: StepKind,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<Value>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl Step {
    /// Build an action step without recording it. Used to test a candidate
    /// call against recent history before committing it to the ledger.
    pub fn action_candidate(id: u64, tool: &str, args: Value) -> Self {
        Self {
            id,
            kind: StepKind::Action,
            content: format!("call {tool}"),
            tool: Some(tool.to_string()),
            args: Some(args),
            timestamp: Utc::now(),
            duration_ms: None,
        }
    }

    /// `(tool, serialized args)` identity of an action step; `None` for any
    /// other kind.
    pub fn signature(&self) -> Option<String> {
        if self.kind != StepKind::Action {
            return None;
        }
        let tool = self.tool.as_deref()?;
        let args = self
            .args
            .as_ref()
            .map_or_else(|| "{}".to_string(), ToString::to_string);
        Some(format!("{tool}:{args}"))
    }
}

/// Append-only trace of everything the loop has done in one session.
/// Steps are never reordered or deleted.
#[derive(Debug, Default, Clone, Serialize)]
pub struct StepLedger {
    steps: Vec<Step>,
    next_id: u64,
}

impl StepLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a plain step (thought, observation, final, error).
    pub fn record(&mut self, kind: StepKind, content: impl Into<String>) -> u64 {
        self.push(kind, content.into(), None, None, None)
    }

    /// Record a tool invocation.
    pub fn record_action(&mut self, tool: &str, args: Value) -> u64 {
        self.push(
            StepKind::Action,
            format!("call {tool}"),
            Some(tool.to_string()),
            Some(args),
            None,
        )
    }

    /// Record a tool result with its wall-clock duration.
    pub fn record_observation(&mut self, content: impl Into<String>, duration_ms: u64) -> u64 {
        self.push(
            StepKind::Observation,
            content.into(),
            None,
            None,
            Some(duration_ms),
        )
    }

    fn push(
        &mut self,
        kind: StepKind,
        content: String,
        tool: Option<String>,
        args: Option<Value>,
        duration_ms: Option<u64>,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.steps.push(Step {
            id,
            kind,
            content,
            tool,
            args,
            timestamp: Utc::now(),
            duration_ms,
        });
        id
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Id the next recorded step will receive.
    pub fn peek_next_id(&self) -> u64 {
        self.next_id
    }

    /// Most recent step of the given kind, if any.
    pub fn last_of(&self, kind: StepKind) -> Option<&Step> {
        self.steps.iter().rev().find(|step| step.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ids_are_monotonic() {
        let mut ledger = StepLedger::new();
        let a = ledger.record(StepKind::Thought, "first");
        let b = ledger.record_action("web_search", json!({"query": "x"}));
        let c = ledger.record_observation("result", 12);
        assert_eq!((a, b, c), (0, 1, 2));
        assert_eq!(ledger.peek_next_id(), 3);
    }

    #[test]
    fn last_of_finds_most_recent() {
        let mut ledger = StepLedger::new();
        ledger.record_observation("old", 1);
        ledger.record(StepKind::Thought, "mid");
        ledger.record_observation("new", 2);
        assert_eq!(ledger.last_of(StepKind::Observation).unwrap().content, "new");
        assert!(ledger.last_of(StepKind::Final).is_none());
    }

    #[test]
    fn signature_only_for_actions() {
        let mut ledger = StepLedger::new();
        ledger.record_action("python", json!({"code": "print(1)"}));
        ledger.record(StepKind::Thought, "hmm");
        let steps = ledger.steps();
        assert_eq!(
            steps[0].signature().unwrap(),
            "python:{\"code\":\"print(1)\"}"
        );
        assert!(steps[1].signature().is_none());
    }

    #[test]
    fn candidate_signature_matches_recorded() {
        let mut ledger = StepLedger::new();
        let args = json!({"query": "rust"});
        ledger.record_action("web_search", args.clone());
        let candidate = Step::action_candidate(ledger.peek_next_id(), "web_search", args);
        assert_eq!(
            ledger.steps()[0].signature(),
            candidate.signature()
        );
    }

    #[test]
    fn step_serializes_without_empty_options() {
        let mut ledger = StepLedger::new();
        ledger.record(StepKind::Final, "done");
        let json = serde_json::to_string(&ledger.steps()[0]).unwrap();
        assert!(!json.contains("\"tool\""));
        assert!(!json.contains("\"duration_ms\""));
        assert!(json.contains("\"final\""));
    }
}
