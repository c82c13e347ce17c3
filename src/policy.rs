use crate::errors::*;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

const COLUMN_ACTION: &str = "Gate_Action";
const COLUMN_TRIGGER: &str = "Trigger";
const COLUMN_GATE: &str = "Gate";
const COLUMN_OUTPUT: &str = "Check_Output";

#[derive(Debug, Deserialize)]
struct RawEvaluation {
    status: String,
    last_evaluation: String,
    detail: RawEvaluationDetail,
}

#[derive(Debug, Deserialize)]
struct RawEvaluationDetail {
    result: RawResult,
    policy: RawPolicyBundle,
}

#[derive(Debug, Deserialize)]
struct RawResult {
    // keyed by image id
    result: Value,
    matched_mapping_rule: RawMappingRule,
}

#[derive(Debug, Deserialize)]
struct RawMappingRule {
    policy_id: String,
}

#[derive(Debug, Deserialize)]
struct RawPolicyBundle {
    policies: Vec<RawPolicy>,
}

#[derive(Debug, Deserialize)]
struct RawPolicy {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawImageResult {
    result: RawTable,
}

#[derive(Debug, Deserialize)]
struct RawTable {
    header: Vec<String>,
    rows: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyStatus {
    Pass,
    Fail,
    Other(String),
}

impl From<String> for PolicyStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "pass" => PolicyStatus::Pass,
            "fail" => PolicyStatus::Fail,
            _ => PolicyStatus::Other(s),
        }
    }
}

impl fmt::Display for PolicyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyStatus::Pass => f.write_str("pass"),
            PolicyStatus::Fail => f.write_str("fail"),
            PolicyStatus::Other(s) => f.write_str(s),
        }
    }
}

impl Serialize for PolicyStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateAction {
    Stop,
    Warn,
    Other(String),
}

impl From<String> for GateAction {
    fn from(s: String) -> Self {
        match s.as_str() {
            "stop" => GateAction::Stop,
            "warn" => GateAction::Warn,
            _ => GateAction::Other(s),
        }
    }
}

impl fmt::Display for GateAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateAction::Stop => f.write_str("stop"),
            GateAction::Warn => f.write_str("warn"),
            GateAction::Other(s) => f.write_str(s),
        }
    }
}

impl Serialize for GateAction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateRow {
    pub gate: String,
    pub trigger: String,
    pub action: GateAction,
    pub output: String,
}

impl GateRow {
    pub fn is_stop(&self) -> bool {
        self.action == GateAction::Stop
    }

    pub fn is_warn(&self) -> bool {
        self.action == GateAction::Warn
    }
}

impl Serialize for GateRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct View<'a> {
            gate: &'a str,
            trigger: &'a str,
            action: &'a GateAction,
            output: &'a str,
            is_stop: bool,
            is_warn: bool,
        }

        View {
            gate: &self.gate,
            trigger: &self.trigger,
            action: &self.action,
            output: &self.output,
            is_stop: self.is_stop(),
            is_warn: self.is_warn(),
        }
        .serialize(serializer)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Policy {
    pub id: String,
    pub name: String,
}

/// Outcome of the most recent policy evaluation of an image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyEvaluation {
    pub status: PolicyStatus,
    pub evaluated_at: String,
    pub policy: Policy,
    pub rows: Vec<GateRow>,
}

impl PolicyEvaluation {
    pub fn is_pass(&self) -> bool {
        self.status == PolicyStatus::Pass
    }

    pub fn is_fail(&self) -> bool {
        self.status == PolicyStatus::Fail
    }

    pub fn stop_rows(&self) -> Vec<&GateRow> {
        self.rows_with(&GateAction::Stop)
    }

    pub fn warn_rows(&self) -> Vec<&GateRow> {
        self.rows_with(&GateAction::Warn)
    }

    fn rows_with(&self, action: &GateAction) -> Vec<&GateRow> {
        self.rows.iter().filter(|row| row.action == *action).collect()
    }
}

impl Serialize for PolicyEvaluation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct View<'a> {
            status: &'a PolicyStatus,
            is_pass: bool,
            is_fail: bool,
            evaluated_at: &'a str,
            policy: &'a Policy,
            rows: &'a [GateRow],
            stop_rows: Vec<&'a GateRow>,
            warn_rows: Vec<&'a GateRow>,
        }

        View {
            status: &self.status,
            is_pass: self.is_pass(),
            is_fail: self.is_fail(),
            evaluated_at: &self.evaluated_at,
            policy: &self.policy,
            rows: &self.rows,
            stop_rows: self.stop_rows(),
            warn_rows: self.warn_rows(),
        }
        .serialize(serializer)
    }
}

/// Unwrap the only entry of a single-entry mapping without looking at its key.
///
/// The scanning API keys some objects by request specific identifiers (image
/// digest, tag, image id), so the position is stable while the name is not.
pub fn sole_value<'a>(what: &'static str, value: &'a Value) -> Result<&'a Value, ParseError> {
    let map = value
        .as_object()
        .ok_or_else(|| ParseError::malformed(what, "expected an object"))?;

    let mut values = map.values();
    match (values.next(), values.next()) {
        (Some(value), None) => Ok(value),
        _ => Err(ParseError::malformed(
            what,
            format!("expected exactly one entry, found {}", map.len()),
        )),
    }
}

fn column(header: &[String], name: &str) -> Result<usize, ParseError> {
    header
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| ParseError::malformed("policy check", format!("missing column {:?}", name)))
}

fn cell(row: &[Value], idx: usize) -> Result<String, ParseError> {
    let value = row.get(idx).ok_or_else(|| {
        ParseError::malformed(
            "policy check",
            format!("row has {} cells, expected more than {}", row.len(), idx),
        )
    })?;

    Ok(match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

fn parse_rows(table: &RawTable) -> Result<Vec<GateRow>, ParseError> {
    let action = column(&table.header, COLUMN_ACTION)?;
    let trigger = column(&table.header, COLUMN_TRIGGER)?;
    let gate = column(&table.header, COLUMN_GATE)?;
    let output = column(&table.header, COLUMN_OUTPUT)?;

    table
        .rows
        .iter()
        .map(|row| {
            Ok(GateRow {
                gate: cell(row, gate)?,
                trigger: cell(row, trigger)?,
                action: GateAction::from(cell(row, action)?),
                output: cell(row, output)?,
            })
        })
        .collect()
}

/// Parse the response of `GET /api/scanning/v1/anchore/images/{imageId}/check`.
///
/// Shape: `[{ <digest>: { <tag>: [ latest, ... ] } }]`, with the gate table
/// nested under `detail.result.result.<imageId>.result`.
pub fn parse_policy_check(data: &Value) -> Result<PolicyEvaluation, ParseError> {
    let root = data
        .as_array()
        .and_then(|list| list.first())
        .ok_or_else(|| ParseError::malformed("policy check", "expected a non-empty list"))?;
    let by_tag = sole_value("policy check (digest)", root)?;
    let evaluations = sole_value("policy check (tag)", by_tag)?;
    let latest = evaluations
        .as_array()
        .and_then(|list| list.first())
        .ok_or_else(|| ParseError::malformed("policy check", "no evaluations for tag"))?;

    let raw = RawEvaluation::deserialize(latest)
        .map_err(|err| ParseError::malformed("policy check", err.to_string()))?;

    let image_result = sole_value("policy check (image id)", &raw.detail.result.result)?;
    let image_result = RawImageResult::deserialize(image_result)
        .map_err(|err| ParseError::malformed("policy check", err.to_string()))?;
    let rows = parse_rows(&image_result.result)?;
    debug!("Parsed {} gate rows", rows.len());

    let policy_id = raw.detail.result.matched_mapping_rule.policy_id;
    let policy = raw
        .detail
        .policy
        .policies
        .into_iter()
        .find(|policy| policy.id == policy_id)
        .ok_or(ParseError::PolicyNotFound { policy_id })?;

    Ok(PolicyEvaluation {
        status: PolicyStatus::from(raw.status),
        evaluated_at: raw.last_evaluation,
        policy: Policy {
            id: policy.id,
            name: policy.name,
        },
        rows,
    })
}
