// Wire models for the firewall management API
//
// REST config calls answer with `{"@status", "@code", "msg" | "result"}`
// on success and `{"code", "message", "details"}` on failure. The XML-API
// endpoints (keygen, commit, op) answer with XML,
// `<response status=".." code=".."><result>..</result><msg>..</msg></response>`,
// whose `result` and `msg` elements are lifted into `serde_json::Value`
// trees so both APIs share one set of accessors.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ── Lenient scalars ──────────────────────────────────────────────────

/// The device renders numeric codes as either JSON numbers or strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumOrStr {
    Num(u64),
    Str(String),
}

fn de_code<'de, D: Deserializer<'de>>(de: D) -> Result<Option<u16>, D::Error> {
    let raw: Option<NumOrStr> = Option::deserialize(de)?;
    Ok(match raw {
        Some(NumOrStr::Num(n)) => u16::try_from(n).ok(),
        Some(NumOrStr::Str(s)) => s.trim().parse().ok(),
        None => None,
    })
}

/// Collect every string leaf of a `msg`/`line`/`details` value, in order.
///
/// `<line>` elements lift into either a single string or an array,
/// sometimes nested under `{"line": ...}` objects.
pub fn flatten_text(value: &Value) -> Vec<String> {
    let mut out = Vec::new();
    collect_text(value, &mut out);
    out
}

fn collect_text(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if !s.is_empty() {
                out.push(s.to_owned());
            }
        }
        Value::Array(items) => items.iter().for_each(|v| collect_text(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_text(v, out)),
        Value::Number(n) => out.push(n.to_string()),
        Value::Bool(_) | Value::Null => {}
    }
}

// ── REST envelopes ───────────────────────────────────────────────────

/// Successful REST response.
#[derive(Debug, Deserialize)]
pub(crate) struct RestResponse {
    #[serde(rename = "@status", default)]
    pub status: Option<String>,
    #[serde(rename = "@code", default, deserialize_with = "de_code")]
    pub code: Option<u16>,
    #[serde(default)]
    pub msg: Option<Value>,
    #[serde(default)]
    pub result: Option<EntryList>,
}

/// `result` of a REST list call.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct EntryList {
    #[serde(default)]
    pub entry: Vec<Value>,
}

/// Failed REST response.
#[derive(Debug, Deserialize)]
pub(crate) struct RestError {
    #[serde(default, deserialize_with = "de_code")]
    pub code: Option<u16>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorDetail {
    #[serde(default)]
    pub causes: Vec<ErrorCause>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorCause {
    #[serde(default)]
    pub description: Option<String>,
}

impl RestError {
    pub fn detail_lines(&self) -> Vec<String> {
        self.details
            .iter()
            .flat_map(|d| d.causes.iter())
            .filter_map(|c| c.description.clone())
            .collect()
    }
}

// ── XML-API envelopes ────────────────────────────────────────────────

#[derive(Debug)]
pub(crate) struct XmlApiResponse {
    pub status: String,
    pub code: Option<u16>,
    pub result: Option<Value>,
    pub msg: Option<Value>,
}

/// Parse a `<response>` document.
///
/// The error text never quotes the body: keygen answers carry the key.
pub(crate) fn parse_xml_response(body: &str) -> Result<XmlApiResponse, String> {
    let doc = roxmltree::Document::parse(body).map_err(|e| format!("malformed XML: {e}"))?;
    let root = doc.root_element();
    if !root.has_tag_name("response") {
        return Err(format!("expected <response>, found <{}>", root.tag_name().name()));
    }
    let status = root
        .attribute("status")
        .ok_or("<response> has no status attribute")?
        .to_owned();
    let code = root.attribute("code").and_then(|c| c.trim().parse().ok());
    let child = |tag: &str| {
        root.children()
            .find(|n| n.has_tag_name(tag))
            .map(element_value)
    };

    Ok(XmlApiResponse {
        status,
        code,
        result: child("result"),
        msg: child("msg"),
    })
}

/// Lift an element into a JSON value.
///
/// Leaves become their trimmed text. Elements with children become
/// objects keyed by tag, repeated tags collect into arrays, and
/// attributes appear as `@name` keys.
fn element_value(node: roxmltree::Node<'_, '_>) -> Value {
    let mut children = node.children().filter(roxmltree::Node::is_element).peekable();
    if children.peek().is_none() {
        let text: String = node
            .children()
            .filter_map(|n| n.text())
            .collect();
        return Value::String(text.trim().to_owned());
    }

    let mut map = serde_json::Map::new();
    for attr in node.attributes() {
        map.insert(format!("@{}", attr.name()), Value::String(attr.value().to_owned()));
    }
    for child in children {
        let value = element_value(child);
        match map.get_mut(child.tag_name().name()) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                map.insert(child.tag_name().name().to_owned(), value);
            }
        }
    }
    Value::Object(map)
}

impl XmlApiResponse {
    /// Human-readable message: top-level `msg`, else `result.msg`.
    pub fn message(&self) -> String {
        let lines = self
            .msg
            .as_ref()
            .or_else(|| self.result.as_ref().and_then(|r| r.get("msg")))
            .map(flatten_text)
            .unwrap_or_default();
        lines.join("; ")
    }
}

// ── Public result types ──────────────────────────────────────────────

/// Outcome of an idempotent create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    /// The entry did not exist and was created.
    Created,
    /// The entry existed and was replaced with the new definition.
    Updated,
}

/// Target position for a rule move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RulePosition {
    /// First rule of the rulebase.
    Top,
    /// Directly after the named rule.
    After(String),
}

/// Lifecycle state of a device job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Pending,
    Active,
    Finished,
}

/// Terminal result of a device job (`Pending` until finished).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobResult {
    Ok,
    Fail,
    Pending,
}

/// Status of a job as reported by `show jobs id N`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    pub id: u64,
    pub state: JobState,
    pub result: JobResult,
    pub progress: Option<u8>,
    /// Detail lines, e.g. commit warnings or validation failures.
    pub details: Vec<String>,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        self.state == JobState::Finished
    }

    pub fn succeeded(&self) -> bool {
        self.is_terminal() && self.result == JobResult::Ok
    }
}

/// Raw `result.job` object as the device renders it.
#[derive(Debug, Deserialize)]
pub(crate) struct RawJob {
    #[serde(deserialize_with = "de_code_u64")]
    pub id: u64,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub progress: Option<String>,
    #[serde(default)]
    pub details: Option<Value>,
}

fn de_code_u64<'de, D: Deserializer<'de>>(de: D) -> Result<u64, D::Error> {
    match NumOrStr::deserialize(de)? {
        NumOrStr::Num(n) => Ok(n),
        NumOrStr::Str(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

impl From<RawJob> for JobStatus {
    fn from(raw: RawJob) -> Self {
        let state = match raw.status.as_deref() {
            Some("FIN") => JobState::Finished,
            Some("ACT") => JobState::Active,
            _ => JobState::Pending,
        };
        let result = match raw.result.as_deref() {
            Some("OK") => JobResult::Ok,
            Some("FAIL") => JobResult::Fail,
            _ => JobResult::Pending,
        };
        Self {
            id: raw.id,
            state,
            result,
            progress: raw.progress.and_then(|p| p.trim().parse().ok()),
            details: raw.details.as_ref().map(flatten_text).unwrap_or_default(),
        }
    }
}
