//! Response interpreter for wallet CLI output.
//!
//! The wallet binary mixes log lines, ANSI color codes, and structured
//! payloads on stdout, and sometimes exits non-zero (or logs to stderr)
//! even when the underlying operation succeeded. This module is the one
//! place that turns a [`RawResult`] into a usable [`Outcome`], in a fixed
//! priority order:
//!
//! 1. extract and strictly parse an embedded JSON payload,
//! 2. fall back to tolerant labeled-field scraping,
//! 3. check the success-evidence phrase set (overrides exit status),
//! 4. classify a dead process as failure,
//! 5. treat a live process with unparseable output as failure too.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use aho_corasick::AhoCorasick;
use regex::Regex;

use super::gateway::RawResult;

/// What shape of output an operation is expected to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedShape {
    /// A JSON object embedded somewhere in stdout.
    JsonObject,
    /// A JSON array embedded somewhere in stdout.
    JsonArray,
    /// Free text; the whole trimmed stdout is the value.
    PlainText,
    /// The last non-empty line of stdout is the value.
    LineValue,
}

/// Interpreted result of one wallet invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A strictly parsed JSON payload.
    Structured(serde_json::Value),
    /// Labeled fields scraped out of unstructured text.
    Fields(FieldSet),
    /// The process looked like it failed, but its output proves the
    /// operation succeeded. Treated as success by every caller.
    AmbiguousSuccess(String),
    Failure(String),
}

/// Named string/numeric fields extracted from CLI text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSet(BTreeMap<String, String>);

/// Key under which [`ExpectedShape::PlainText`] and
/// [`ExpectedShape::LineValue`] store their single value.
pub const VALUE_KEY: &str = "value";

impl FieldSet {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// The single value of a plain-text or line-value extraction.
    pub fn value(&self) -> Option<&str> {
        self.get(VALUE_KEY)
    }

    /// A field parsed as a sat amount, grouping separators stripped.
    pub fn amount_sat(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(parse_sat_amount)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn insert(&mut self, key: String, value: String) {
        self.0.entry(key).or_insert(value);
    }
}

/// Phrases that prove the underlying operation succeeded no matter what
/// the exit status or stderr claim. The last entry is the wallet's benign
/// duplicate-insert error: the payment landed, storing it twice did not.
const SUCCESS_EVIDENCE: &[&str] = &[
    "payment sent",
    "invoice paid",
    "payment preimage received",
    "change vtxo received",
    "unique constraint failed",
];

/// Interpret raw CLI output according to the expected shape.
pub fn interpret(raw: &RawResult, shape: ExpectedShape) -> Outcome {
    let stdout = strip_ansi(&raw.stdout);

    // 1. Structured payload takes priority for JSON shapes.
    if let Some(value) = match shape {
        ExpectedShape::JsonObject => extract_json(&stdout, b'{', b'}'),
        ExpectedShape::JsonArray => extract_json(&stdout, b'[', b']'),
        _ => None,
    } {
        return Outcome::Structured(value);
    }

    // 2. Tolerant field extraction.
    let fields = match shape {
        ExpectedShape::PlainText => single_value_fields(stdout.trim()),
        ExpectedShape::LineValue => single_value_fields(last_nonempty_line(&stdout)),
        ExpectedShape::JsonObject | ExpectedShape::JsonArray => extract_labeled_fields(&stdout),
    };
    if raw.process_succeeded && !fields.is_empty() {
        return Outcome::Fields(fields);
    }

    // 3. Success despite error: the phrase set outranks the exit status.
    if let Some(evidence) = success_evidence(raw) {
        return Outcome::AmbiguousSuccess(evidence);
    }

    // 4. A dead process with no success evidence really failed.
    if !raw.process_succeeded {
        return Outcome::Failure(raw.failure_detail());
    }

    // 5. A live process with nothing extractable violated its contract.
    Outcome::Failure("could not parse output".to_string())
}

/// Scan stdout and stderr for the success-evidence phrase set.
///
/// Returns the line containing the first match, as evidence text.
pub fn success_evidence(raw: &RawResult) -> Option<String> {
    static MATCHER: OnceLock<AhoCorasick> = OnceLock::new();
    let matcher = MATCHER.get_or_init(|| {
        AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .build(SUCCESS_EVIDENCE)
            .expect("static phrase set")
    });

    for haystack in [&raw.stdout, &raw.stderr] {
        let text = strip_ansi(haystack);
        if let Some(found) = matcher.find(text.as_bytes()) {
            let line = text[..found.start()]
                .rfind('\n')
                .map(|i| &text[i + 1..])
                .unwrap_or(&text);
            let line = line.lines().next().unwrap_or(line);
            return Some(line.trim().to_string());
        }
    }
    None
}

/// Parse a sat amount, tolerating digit-grouping separators and a
/// `sat`/`sats` suffix. `"12,345"` parses to `12345`; anything containing
/// other non-digit characters is rejected.
pub fn parse_sat_amount(text: &str) -> Option<u64> {
    let mut trimmed = text.trim();
    for suffix in ["sats", "sat", "SATS", "SAT"] {
        if let Some(rest) = trimmed.strip_suffix(suffix) {
            trimmed = rest.trim_end();
            break;
        }
    }
    if trimmed.is_empty() {
        return None;
    }

    let mut digits = String::with_capacity(trimmed.len());
    for c in trimmed.chars() {
        match c {
            '0'..='9' => digits.push(c),
            ',' | '_' | ' ' => {}
            _ => return None,
        }
    }
    digits.parse().ok()
}

/// Pull a block height out of sync-style output. Unmatched output means
/// the height is unknown; callers get 0 and must treat it as such.
pub fn extract_block_height(raw: &RawResult) -> u64 {
    static HEIGHT_RE: OnceLock<Regex> = OnceLock::new();
    let re = HEIGHT_RE.get_or_init(|| {
        Regex::new(r"(?i)(?:block|chain|tip|current)[ _-]?height\D{0,3}([0-9][0-9,_ ]*)")
            .expect("static regex")
    });

    for haystack in [&raw.stdout, &raw.stderr] {
        let text = strip_ansi(haystack);
        if let Some(caps) = re.captures(&text) {
            if let Some(height) = parse_sat_amount(&caps[1]) {
                return height;
            }
        }
    }
    0
}

/// Remove ANSI SGR/cursor escape sequences from CLI output.
pub fn strip_ansi(text: &str) -> String {
    static ANSI_RE: OnceLock<Regex> = OnceLock::new();
    let re = ANSI_RE.get_or_init(|| Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]").expect("static regex"));
    re.replace_all(text, "").into_owned()
}

/// Find the first balanced `{...}`/`[...]` substring that strictly parses
/// as JSON. Log lines before, after, and around the payload are ignored;
/// a brace inside a log line that opens no parseable payload is skipped.
fn extract_json(text: &str, open: u8, close: u8) -> Option<serde_json::Value> {
    let bytes = text.as_bytes();
    let mut start = 0;
    while let Some(offset) = bytes[start..].iter().position(|&b| b == open) {
        let begin = start + offset;
        if let Some(end) = balanced_end(bytes, begin, open, close) {
            if let Ok(value) = serde_json::from_str(&text[begin..=end]) {
                return Some(value);
            }
        }
        start = begin + 1;
    }
    None
}

/// Index of the delimiter closing the balanced region opened at `begin`,
/// respecting JSON string literals and escapes.
fn balanced_end(bytes: &[u8], begin: usize, open: u8, close: u8) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(begin) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        if b == b'"' {
            in_string = true;
        } else if b == open {
            depth += 1;
        } else if b == close {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

/// Scrape `label: value` / `label = value` lines into a field set.
/// Labels normalize to snake_case; values keep their raw text so numeric
/// normalization can happen at access time.
fn extract_labeled_fields(text: &str) -> FieldSet {
    static FIELD_RE: OnceLock<Regex> = OnceLock::new();
    let re = FIELD_RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*([A-Za-z][A-Za-z0-9 _-]{0,40}?)\s*[:=]\s*(\S.*?)\s*$")
            .expect("static regex")
    });

    let mut fields = FieldSet::default();
    for caps in re.captures_iter(text) {
        let key = normalize_label(&caps[1]);
        fields.insert(key, caps[2].to_string());
    }
    fields
}

fn normalize_label(label: &str) -> String {
    label
        .trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            other => other.to_ascii_lowercase(),
        })
        .collect()
}

fn single_value_fields(value: &str) -> FieldSet {
    let mut fields = FieldSet::default();
    if !value.is_empty() {
        fields.insert(VALUE_KEY.to_string(), value.to_string());
    }
    fields
}

fn last_nonempty_line(text: &str) -> &str {
    text.lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("")
}
