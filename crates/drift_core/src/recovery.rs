//! Best-effort recovery of a JSON value from free-form agent output.
//!
//! Recovery never fails. Anything that cannot be repaired into valid JSON
//! becomes the empty document, which callers treat as a normal outcome.

use std::fmt;
use std::sync::LazyLock;

use drift_logging::{drift_debug, drift_trace};
use regex::Regex;
use serde_json::{Map, Value};

/// Value forced into a known field whose string was cut off.
pub const INCOMPLETE_SENTINEL: &str = "INCOMPLETE";

/// Field most likely to carry long, truncated or unescaped text.
pub const DEFAULT_KNOWN_FIELD: &str = "content";

static COMMA_BEFORE_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*([\]}])").expect("valid regex"));
static COMMA_AT_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*$").expect("valid regex"));

/// Result of recovery: a parsed object or array, or the canonical empty mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveredDocument(Value);

impl RecoveredDocument {
    pub fn empty() -> Self {
        Self(Value::Object(Map::new()))
    }

    pub fn is_empty(&self) -> bool {
        match &self.0 {
            Value::Object(map) => map.is_empty(),
            Value::Array(items) => items.is_empty(),
            _ => false,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl Default for RecoveredDocument {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Display for RecoveredDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string_pretty(&self.0) {
            Ok(text) => f.write_str(&text),
            Err(_) => write!(f, "{}", self.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CandidateKind {
    Object,
    Array,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Candidate<'a> {
    kind: CandidateKind,
    span: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexState {
    Outside,
    InKnownField,
    InOtherString,
    Escaped { in_known_field: bool },
}

/// Repairs and parses JSON embedded in agent output.
#[derive(Debug, Clone)]
pub struct RecoveryParser {
    known_field: String,
}

impl Default for RecoveryParser {
    fn default() -> Self {
        Self::new(DEFAULT_KNOWN_FIELD)
    }
}

impl RecoveryParser {
    pub fn new(known_field: impl Into<String>) -> Self {
        Self {
            known_field: known_field.into(),
        }
    }

    pub fn recover(&self, text: &str) -> RecoveredDocument {
        let candidates = locate_candidates(text.trim());
        if candidates.is_empty() {
            drift_debug!("recovery: no JSON candidate in {} chars", text.len());
            return RecoveredDocument::empty();
        }
        candidates
            .into_iter()
            .map(|candidate| self.repair_and_parse(candidate))
            .find(|document| !document.is_empty())
            .unwrap_or_default()
    }

    fn repair_and_parse(&self, candidate: Candidate<'_>) -> RecoveredDocument {
        drift_trace!(
            "recovery: {:?} candidate of {} chars",
            candidate.kind,
            candidate.span.len()
        );

        let repaired = self.close_truncated_field(candidate.span);
        let repaired = strip_trailing_commas(&repaired);
        let repaired = balance_brackets(repaired);

        match serde_json::from_str::<Value>(&repaired) {
            Ok(value @ (Value::Object(_) | Value::Array(_))) => RecoveredDocument(value),
            Ok(_) => RecoveredDocument::empty(),
            Err(err) => {
                drift_debug!("recovery: parse failed after repair: {}", err);
                RecoveredDocument::empty()
            }
        }
    }

    /// Walks the candidate tracking string state. Inside the known field's
    /// value, stray quotes and raw control characters are escaped; a value
    /// that never closes is replaced by the sentinel.
    fn close_truncated_field(&self, candidate: &str) -> String {
        let key = format!("\"{}\"", self.known_field);
        let mut out = String::with_capacity(candidate.len() + INCOMPLETE_SENTINEL.len() + 2);
        let mut state = LexState::Outside;
        let mut value_start = 0;
        let mut pos = 0;

        while let Some(ch) = candidate[pos..].chars().next() {
            match state {
                LexState::Outside => {
                    if let Some(colon_end) = key_then_colon(&candidate[pos..], &key) {
                        out.push_str(&candidate[pos..pos + colon_end]);
                        pos += colon_end;
                        let rest = &candidate[pos..];
                        let gap = rest.len() - rest.trim_start().len();
                        out.push_str(&rest[..gap]);
                        pos += gap;
                        if candidate[pos..].starts_with('"') {
                            value_start = out.len();
                            out.push('"');
                            pos += 1;
                            state = LexState::InKnownField;
                        } else if pos == candidate.len() {
                            out.push_str(" \"\"");
                        }
                        continue;
                    }
                    if ch == '"' {
                        state = LexState::InOtherString;
                    }
                    out.push(ch);
                }
                LexState::InOtherString => {
                    match ch {
                        '\\' => state = LexState::Escaped { in_known_field: false },
                        '"' => state = LexState::Outside,
                        _ => {}
                    }
                    out.push(ch);
                }
                LexState::Escaped { in_known_field } => {
                    out.push(ch);
                    state = if in_known_field {
                        LexState::InKnownField
                    } else {
                        LexState::InOtherString
                    };
                }
                LexState::InKnownField => match ch {
                    '\\' => {
                        out.push(ch);
                        state = LexState::Escaped { in_known_field: true };
                    }
                    '"' if closes_value(&candidate[pos + 1..]) => {
                        out.push(ch);
                        state = LexState::Outside;
                    }
                    '"' => out.push_str("\\\""),
                    '\n' => out.push_str("\\n"),
                    '\r' => out.push_str("\\r"),
                    '\t' => out.push_str("\\t"),
                    other => out.push(other),
                },
            }
            pos += ch.len_utf8();
        }

        if matches!(
            state,
            LexState::InKnownField | LexState::Escaped { in_known_field: true }
        ) {
            drift_debug!("recovery: known field truncated, closing with sentinel");
            out.truncate(value_start);
            out.push('"');
            out.push_str(INCOMPLETE_SENTINEL);
            out.push('"');
        }
        out
    }
}

/// Shorthand for `RecoveryParser::default().recover(text)`.
pub fn recover(text: &str) -> RecoveredDocument {
    RecoveryParser::default().recover(text)
}

/// Candidates in the order they are tried.
///
/// A closed object span is the only candidate when present. Otherwise an
/// object opener running to the end of the text (what truncation looks like)
/// is tried first, then the array span, itself closed or running to the end.
fn locate_candidates(text: &str) -> Vec<Candidate<'_>> {
    let mut candidates = Vec::with_capacity(2);
    if let Some(start) = text.find('{') {
        match text.rfind('}') {
            Some(end) if end > start => {
                return vec![Candidate {
                    kind: CandidateKind::Object,
                    span: &text[start..=end],
                }]
            }
            _ => candidates.push(Candidate {
                kind: CandidateKind::Object,
                span: &text[start..],
            }),
        }
    }
    if let Some(start) = text.find('[') {
        let span = match text.rfind(']') {
            Some(end) if end > start => &text[start..=end],
            _ => &text[start..],
        };
        candidates.push(Candidate {
            kind: CandidateKind::Array,
            span,
        });
    }
    candidates
}

/// Byte length of `"key"` plus optional whitespace and the colon, if `rest`
/// starts with the known key.
fn key_then_colon(rest: &str, key: &str) -> Option<usize> {
    let after_key = rest.strip_prefix(key)?;
    let trimmed = after_key.trim_start();
    trimmed.strip_prefix(':')?;
    Some(rest.len() - trimmed.len() + 1)
}

/// A quote ends the known value when a structural character follows it
/// closely, or when only whitespace separates it from one.
fn closes_value(after_quote: &str) -> bool {
    let window: String = after_quote.chars().take(4).collect();
    if window.contains([',', '}', '\n', '\r']) {
        return true;
    }
    match after_quote.trim_start().chars().next() {
        None => true,
        Some(next) => matches!(next, ',' | '}' | ']'),
    }
}

fn strip_trailing_commas(json: &str) -> String {
    let cleaned = COMMA_BEFORE_CLOSE.replace_all(json, "$1");
    COMMA_AT_END.replace(&cleaned, "").into_owned()
}

/// Appends missing closers, braces first, then brackets.
fn balance_brackets(mut json: String) -> String {
    let count = |c: char| json.chars().filter(|&x| x == c).count();
    let missing_braces = count('{').saturating_sub(count('}'));
    let missing_brackets = count('[').saturating_sub(count(']'));
    json.extend(std::iter::repeat('}').take(missing_braces));
    json.extend(std::iter::repeat(']').take(missing_brackets));
    json
}
