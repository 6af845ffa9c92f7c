use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::InputError;

/// Pipeline stage of an opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Lead,
    Qualification,
    Proposal,
    Negotiation,
    ClosedWon,
    ClosedLost,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Lead,
        Stage::Qualification,
        Stage::Proposal,
        Stage::Negotiation,
        Stage::ClosedWon,
        Stage::ClosedLost,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Lead => "lead",
            Stage::Qualification => "qualification",
            Stage::Proposal => "proposal",
            Stage::Negotiation => "negotiation",
            Stage::ClosedWon => "closed_won",
            Stage::ClosedLost => "closed_lost",
        }
    }

    pub fn is_closed(self) -> bool {
        matches!(self, Stage::ClosedWon | Stage::ClosedLost)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = InputError;

    /// Accepts `closed_won`, `Closed Won`, `closed-won` and `ClosedWon` alike.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .flat_map(char::to_lowercase)
            .collect();

        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str().replace('_', "") == normalized)
            .ok_or_else(|| InputError::UnknownStage(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub id: String,
    pub label: String,
    pub weight: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenTask {
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

impl OpenTask {
    pub fn due(date: NaiveDate) -> Self {
        Self {
            due_date: Some(date),
        }
    }

    pub fn undated() -> Self {
        Self { due_date: None }
    }
}

/// Snapshot of the fields the scorer reads from one opportunity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealHealthInput {
    pub stage: Stage,
    #[serde(
        rename = "checklist",
        default,
        deserialize_with = "deserialize_completed_checklist"
    )]
    pub completed_checklist: Vec<String>,
    #[serde(default)]
    pub owner_id: Option<Uuid>,
    #[serde(default)]
    pub expected_close_date: Option<NaiveDate>,
    #[serde(default)]
    pub estimated_value: Option<f64>,
    #[serde(default)]
    pub service_area_id: Option<Uuid>,
    #[serde(default)]
    pub stage_entered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_interaction_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub open_tasks: Vec<OpenTask>,
    #[serde(default)]
    pub probability: Option<i32>,
}

impl DealHealthInput {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            completed_checklist: Vec::new(),
            owner_id: None,
            expected_close_date: None,
            estimated_value: None,
            service_area_id: None,
            stage_entered_at: None,
            last_interaction_at: None,
            open_tasks: Vec::new(),
            probability: None,
        }
    }
}

/// Parses a serialized checklist payload. Anything other than a JSON array
/// yields no completed items, and non-string entries are skipped.
pub fn parse_checklist_payload(raw: &str) -> Vec<String> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(items)) => string_entries(&items),
        _ => Vec::new(),
    }
}

fn completed_checklist_from_value(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => string_entries(items),
        Value::String(raw) => parse_checklist_payload(raw),
        _ => Vec::new(),
    }
}

fn string_entries(items: &[Value]) -> Vec<String> {
    items
        .iter()
        .filter_map(|item| item.as_str().map(str::to_string))
        .collect()
}

fn deserialize_completed_checklist<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .map(|value| completed_checklist_from_value(&value))
        .unwrap_or_default())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealHealthSignal {
    pub id: String,
    pub label: String,
    pub severity: Severity,
}

/// The five unrounded sub-scores behind the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthBreakdown {
    pub checklist: f64,
    pub completeness: f64,
    pub interaction: f64,
    pub next_step: f64,
    pub stage_age: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealHealth {
    pub score: u8,
    pub recommended_probability: u8,
    pub probability_delta: i32,
    pub last_interaction_days: Option<i64>,
    pub stage_age_days: Option<i64>,
    pub open_task_count: usize,
    pub signals: Vec<DealHealthSignal>,
    pub breakdown: HealthBreakdown,
}

/// An opportunity as supplied by a data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpportunitySnapshot {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub name: String,
    #[serde(flatten)]
    pub input: DealHealthInput,
}

#[derive(Debug, Clone)]
pub struct ScoredOpportunity {
    pub id: Uuid,
    pub name: String,
    pub stage: Stage,
    pub current_probability: Option<i32>,
    pub health: DealHealth,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_parsing_ignores_case_and_separators() {
        assert_eq!("closed_won".parse::<Stage>().unwrap(), Stage::ClosedWon);
        assert_eq!("Closed Lost".parse::<Stage>().unwrap(), Stage::ClosedLost);
        assert_eq!("closed-won".parse::<Stage>().unwrap(), Stage::ClosedWon);
        assert_eq!("ClosedWon".parse::<Stage>().unwrap(), Stage::ClosedWon);
        assert_eq!("PROPOSAL".parse::<Stage>().unwrap(), Stage::Proposal);
        assert!("discovery".parse::<Stage>().is_err());
    }

    #[test]
    fn checklist_payload_parsing_is_lenient() {
        assert_eq!(
            parse_checklist_payload(r#"["a","b"]"#),
            vec!["a".to_string(), "b".to_string()]
        );
        assert_eq!(parse_checklist_payload(r#"["a", 3, null]"#), vec!["a"]);
        assert!(parse_checklist_payload("not json").is_empty());
        assert!(parse_checklist_payload(r#"{"a": true}"#).is_empty());
        assert!(parse_checklist_payload("").is_empty());
    }

    #[test]
    fn input_accepts_checklist_as_list_or_string() {
        let from_list: DealHealthInput =
            serde_json::from_str(r#"{"stage":"proposal","checklist":["x","y"]}"#).unwrap();
        assert_eq!(from_list.completed_checklist, vec!["x", "y"]);

        let from_string: DealHealthInput =
            serde_json::from_str(r#"{"stage":"proposal","checklist":"[\"x\"]"}"#).unwrap();
        assert_eq!(from_string.completed_checklist, vec!["x"]);

        let malformed: DealHealthInput =
            serde_json::from_str(r#"{"stage":"proposal","checklist":"[x"}"#).unwrap();
        assert!(malformed.completed_checklist.is_empty());

        let numeric: DealHealthInput =
            serde_json::from_str(r#"{"stage":"proposal","checklist":42}"#).unwrap();
        assert!(numeric.completed_checklist.is_empty());

        let absent: DealHealthInput = serde_json::from_str(r#"{"stage":"lead"}"#).unwrap();
        assert!(absent.completed_checklist.is_empty());
        assert!(absent.open_tasks.is_empty());
    }

    #[test]
    fn snapshot_flattens_input_fields() {
        let snapshot: OpportunitySnapshot = serde_json::from_str(
            r#"{
                "name": "Harbor retrofit",
                "stage": "negotiation",
                "checklist": ["negotiation_terms_agreed"],
                "expected_close_date": "2026-11-01",
                "open_tasks": [{"due_date": "2026-10-25"}, {}],
                "probability": 55
            }"#,
        )
        .unwrap();

        assert_eq!(snapshot.name, "Harbor retrofit");
        assert_eq!(snapshot.input.stage, Stage::Negotiation);
        assert_eq!(snapshot.input.open_tasks.len(), 2);
        assert_eq!(snapshot.input.open_tasks[1], OpenTask::undated());
        assert_eq!(snapshot.input.probability, Some(55));
    }
}
