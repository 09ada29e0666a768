//! Recovery of tool calls from loosely-structured model output.
//!
//! Small local models frequently emit malformed, prose-wrapped, or
//! inconsistently quoted JSON; strict parsing alone would reject most real
//! output. Extraction therefore runs an ordered list of independent pure
//! strategies, first success wins:
//!
//! 1. line scan for a `{`-starting line mentioning a `tool` key;
//! 2. regex sweep for an embedded `{...tool...}`-shaped substring;
//! 3. fenced code block whose body mentions a `tool` key;
//! 4. lenient JSON parse of the candidate (quote and comma rewrites);
//! 5. bare regex extraction of the tool name and known argument aliases.
//!
//! No match at all means the text is a final answer, not an error.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

/// A tool invocation recovered from raw model output. Transient: produced
/// here, consumed immediately by the controller.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    /// Free-text reasoning preceding the call, possibly empty.
    pub thought: String,
    pub tool: String,
    pub args: Map<String, Value>,
}

/// JSON-candidate substring plus the prose that preceded it.
#[derive(Debug)]
struct Candidate {
    thought: String,
    json: String,
}

static EMBEDDED_CALL: LazyLock<Regex> = LazyLock::new(|| {
    // First `{` with no intervening braces before a quoted `tool` key,
    // extended greedily to the last `}` so nested args objects survive.
    Regex::new(r#"(?s)\{[^{}]*?["']tool["'].*\}"#).unwrap()
});

static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[a-zA-Z]*[ \t]*\r?\n?(.*?)```").unwrap());

static TOOL_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"["']tool["']\s*[:=]\s*["']([A-Za-z_][A-Za-z0-9_]*)["']"#).unwrap()
});

static ARG_ALIAS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"["'](query|q|code|script|content|text)["']\s*:\s*["']([^"']*)["']"#).unwrap()
});

static WORD_APOSTROPHE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\w)'(\w)").unwrap());

static TRAILING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*([}\]])").unwrap());

static THINK_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").unwrap());

/// Remove `<think>...</think>` reasoning markup before parsing. An
/// unterminated block swallows the rest of the text: the model never
/// surfaced anything after its reasoning.
pub fn strip_reasoning(text: &str) -> String {
    let stripped = THINK_BLOCK.replace_all(text, "");
    let stripped = match stripped.find("<think>") {
        Some(idx) => &stripped[..idx],
        None => stripped.as_ref(),
    };
    stripped.trim().to_string()
}

/// Extract a tool call from model output, or `None` when the text carries
/// no recognizable call (interpreted by the caller as the final answer).
/// Never panics, for any input.
pub fn parse_tool_call(text: &str) -> Option<ToolCall> {
    let candidate = scan_lines(text)
        .or_else(|| sweep_embedded(text))
        .or_else(|| fenced_block(text))?;

    let (tool, args) =
        parse_lenient(&candidate.json).or_else(|| extract_by_regex(&candidate.json))?;

    Some(ToolCall {
        thought: candidate.thought,
        tool,
        args,
    })
}

// ─── Candidate strategies ────────────────────────────────────────────────────

/// Strategy 1: the first line starting with `{` that mentions a quoted
/// `tool` key. Lines before it accumulate as thought; fence delimiter lines
/// are skipped outright.
fn scan_lines(text: &str) -> Option<Candidate> {
    let mut thought_lines: Vec<&str> = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("```") {
            continue;
        }
        if trimmed.starts_with('{') && mentions_tool_key(trimmed) {
            return Some(Candidate {
                thought: thought_lines.join("\n").trim().to_string(),
                json: trimmed.to_string(),
            });
        }
        thought_lines.push(line);
    }
    None
}

/// Strategy 2: a `{...tool...}`-shaped substring anywhere in the text,
/// covering calls split across lines or glued to prose.
fn sweep_embedded(text: &str) -> Option<Candidate> {
    let found = EMBEDDED_CALL.find(text)?;
    Some(Candidate {
        thought: text[..found.start()].trim().to_string(),
        json: found.as_str().to_string(),
    })
}

/// Strategy 3: the first triple-backtick block whose body mentions a `tool`
/// key.
fn fenced_block(text: &str) -> Option<Candidate> {
    for captures in FENCED_BLOCK.captures_iter(text) {
        let inner = captures.get(1)?.as_str();
        if mentions_tool_key(inner) {
            let fence_start = captures.get(0)?.start();
            return Some(Candidate {
                thought: text[..fence_start].trim().to_string(),
                json: inner.trim().to_string(),
            });
        }
    }
    None
}

fn mentions_tool_key(text: &str) -> bool {
    text.contains("\"tool\"") || text.contains("'tool'")
}

// ─── Candidate parsing ───────────────────────────────────────────────────────

/// Strategy 4: strict parse, then progressively more permissive rewrites.
/// First attempt yielding an object with a non-empty string `tool` wins.
fn parse_lenient(json: &str) -> Option<(String, Map<String, Value>)> {
    for attempt in rewrite_attempts(json) {
        if let Some(parsed) = try_parse_object(&attempt) {
            return Some(parsed);
        }
    }
    None
}

fn rewrite_attempts(json: &str) -> Vec<String> {
    let smart = requote_single_quotes(json);
    let attempts = [
        json.to_string(),
        json.replace('\'', "\""),
        smart.clone(),
        TRAILING_COMMA.replace_all(json, "$1").into_owned(),
        TRAILING_COMMA.replace_all(&smart, "$1").into_owned(),
    ];

    let mut unique: Vec<String> = Vec::with_capacity(attempts.len());
    for attempt in attempts {
        if !unique.contains(&attempt) {
            unique.push(attempt);
        }
    }
    unique
}

/// Swap single quotes for double quotes while keeping apostrophes that sit
/// between word characters (`it's`, `don't`) intact.
fn requote_single_quotes(json: &str) -> String {
    const SENTINEL: char = '\u{1}';
    let replacement = format!("${{1}}{SENTINEL}${{2}}");
    let protected = WORD_APOSTROPHE.replace_all(json, replacement.as_str());
    protected
        .replace('\'', "\"")
        .replace(SENTINEL, "'")
}

fn try_parse_object(json: &str) -> Option<(String, Map<String, Value>)> {
    let Ok(Value::Object(object)) = serde_json::from_str::<Value>(json) else {
        return None;
    };
    let Some(Value::String(tool)) = object.get("tool") else {
        return None;
    };
    if tool.is_empty() {
        return None;
    }
    let args = match object.get("args") {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    };
    Some((tool.clone(), args))
}

/// Strategy 5: when nothing parses as JSON, pull the tool name and any
/// known argument aliases straight out of the candidate text.
fn extract_by_regex(json: &str) -> Option<(String, Map<String, Value>)> {
    let tool = TOOL_NAME.captures(json)?.get(1)?.as_str().to_string();

    let mut args = Map::new();
    for captures in ARG_ALIAS.captures_iter(json) {
        let canonical = match &captures[1] {
            "query" | "q" => "query",
            "code" | "script" => "code",
            _ => "content",
        };
        if !args.contains_key(canonical) {
            args.insert(
                canonical.to_string(),
                Value::String(captures[2].to_string()),
            );
        }
    }
    Some((tool, args))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args_of(call: &ToolCall) -> Value {
        Value::Object(call.args.clone())
    }

    #[test]
    fn plain_prose_is_no_call() {
        assert!(parse_tool_call("The capital of France is Paris.").is_none());
        assert!(parse_tool_call("").is_none());
    }

    #[test]
    fn single_line_json_with_thought() {
        let call = parse_tool_call(
            "I should search.\n{\"tool\": \"webSearch\", \"args\": {\"query\": \"x\"}}",
        )
        .unwrap();
        assert_eq!(call.thought, "I should search.");
        assert_eq!(call.tool, "webSearch");
        assert_eq!(args_of(&call), json!({"query": "x"}));
    }

    #[test]
    fn bare_json_without_thought() {
        let call =
            parse_tool_call("{\"tool\": \"python\", \"args\": {\"code\": \"print(1)\"}}").unwrap();
        assert!(call.thought.is_empty());
        assert_eq!(call.tool, "python");
    }

    #[test]
    fn single_quoted_json_recovered() {
        let call =
            parse_tool_call("{'tool': 'python', 'args': {'code': 'print(1)'}}").unwrap();
        assert_eq!(call.tool, "python");
        assert_eq!(args_of(&call), json!({"code": "print(1)"}));
    }

    #[test]
    fn apostrophe_inside_value_survives_requoting() {
        let call = parse_tool_call(
            "{'tool': 'web_search', 'args': {'query': 'what's the user's name'}}",
        );
        // The smart rewrite keeps word-internal apostrophes; the value
        // parses with the contraction intact or falls through to regex
        // extraction. Either way the tool must be recovered.
        let call = call.unwrap();
        assert_eq!(call.tool, "web_search");
    }

    #[test]
    fn trailing_comma_removed() {
        let call = parse_tool_call(
            "{\"tool\": \"web_search\", \"args\": {\"query\": \"rust\",},}",
        )
        .unwrap();
        assert_eq!(call.tool, "web_search");
        assert_eq!(args_of(&call), json!({"query": "rust"}));
    }

    #[test]
    fn multiline_json_found_by_sweep() {
        let text = "Let me check.\n{\n  \"tool\": \"web_search\",\n  \"args\": {\"query\": \"tokio select\"}\n}";
        let call = parse_tool_call(text).unwrap();
        assert_eq!(call.thought, "Let me check.");
        assert_eq!(call.tool, "web_search");
        assert_eq!(args_of(&call), json!({"query": "tokio select"}));
    }

    #[test]
    fn fenced_json_block_parsed() {
        let text = "Using a tool now.\n```json\n{\"tool\": \"rag_search\", \"args\": {\"query\": \"design doc\"}}\n```";
        let call = parse_tool_call(text).unwrap();
        assert_eq!(call.thought, "Using a tool now.");
        assert_eq!(call.tool, "rag_search");
    }

    #[test]
    fn fence_delimiters_skipped_by_line_scan() {
        let text = "```\n{\"tool\": \"python\", \"args\": {\"code\": \"2+2\"}}\n```";
        let call = parse_tool_call(text).unwrap();
        assert_eq!(call.tool, "python");
        assert!(call.thought.is_empty());
    }

    #[test]
    fn args_default_to_empty_object() {
        let call = parse_tool_call("{\"tool\": \"memory_recall\"}").unwrap();
        assert!(call.args.is_empty());
    }

    #[test]
    fn empty_tool_name_rejected() {
        assert!(parse_tool_call("{\"tool\": \"\", \"args\": {}}").is_none());
        assert!(parse_tool_call("{\"tool\": 42, \"args\": {}}").is_none());
    }

    #[test]
    fn hopeless_json_falls_back_to_regex_extraction() {
        // Unquoted keys elsewhere make every JSON attempt fail.
        let text = "{broken json, \"tool\": \"web_search\", \"q\": \"rust agents\"}";
        let call = parse_tool_call(text).unwrap();
        assert_eq!(call.tool, "web_search");
        assert_eq!(args_of(&call), json!({"query": "rust agents"}));
    }

    #[test]
    fn alias_keys_canonicalized_by_fallback() {
        let text = "{oops \"tool\": \"python\", \"script\": \"print(3)\", \"text\": \"note\"}";
        let call = parse_tool_call(text).unwrap();
        assert_eq!(call.tool, "python");
        assert_eq!(args_of(&call), json!({"code": "print(3)", "content": "note"}));
    }

    #[test]
    fn never_panics_on_adversarial_input() {
        let inputs = [
            "{",
            "}{",
            "{'tool':}",
            "{\"tool\"",
            "```",
            "``````",
            "{{{{\"tool\"}}}}",
            "<think>{\"tool\": \"x\"}</think>",
            "\u{0}\u{1}{'tool'",
            "{\"tool\": \"a\", \"args\": \"not an object\"}",
        ];
        for input in inputs {
            let result = parse_tool_call(input);
            if let Some(call) = result {
                assert!(!call.tool.is_empty());
            }
        }
    }

    #[test]
    fn strip_reasoning_removes_closed_blocks() {
        let text = "<think>step by step...</think>The answer is 4.";
        assert_eq!(strip_reasoning(text), "The answer is 4.");
    }

    #[test]
    fn strip_reasoning_removes_multiple_blocks() {
        let text = "<think>a</think>first<think>b</think> second";
        assert_eq!(strip_reasoning(text), "first second");
    }

    #[test]
    fn strip_reasoning_cuts_unterminated_block() {
        let text = "Answer below.\n<think>never closed";
        assert_eq!(strip_reasoning(text), "Answer below.");
    }

    #[test]
    fn strip_reasoning_leaves_plain_text_alone() {
        assert_eq!(strip_reasoning("  plain  "), "plain");
    }
}
