//! Per-stage qualification checklists and their point weights.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;

use crate::error::ChecklistError;
use crate::models::{ChecklistItem, Stage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageChecklist {
    pub stage: Stage,
    pub base_probability: i32,
    pub items: Vec<ChecklistItem>,
}

/// File form of a stage entry; the stage stays a string so an unknown name
/// is reported as such instead of as a generic decode error.
#[derive(Debug, Deserialize)]
struct RawStageChecklist {
    stage: String,
    base_probability: i32,
    #[serde(default)]
    items: Vec<ChecklistItem>,
}

/// Immutable checklist configuration consulted by the scorer.
#[derive(Debug, Clone)]
pub struct ChecklistModel {
    stages: Vec<StageChecklist>,
    weights: HashMap<String, i32>,
}

impl ChecklistModel {
    pub fn from_stages(stages: Vec<StageChecklist>) -> Result<Self, ChecklistError> {
        let mut seen_stages = HashSet::new();
        let mut seen_items = HashSet::new();

        for entry in &stages {
            if !seen_stages.insert(entry.stage) {
                return Err(ChecklistError::DuplicateStage(entry.stage.to_string()));
            }
            if !(0..=100).contains(&entry.base_probability) {
                return Err(ChecklistError::BaseOutOfRange {
                    stage: entry.stage.to_string(),
                    probability: entry.base_probability,
                });
            }
            for item in &entry.items {
                if !(0..=100).contains(&item.weight) {
                    return Err(ChecklistError::WeightOutOfRange {
                        id: item.id.clone(),
                        weight: item.weight,
                    });
                }
                if !seen_items.insert(item.id.as_str()) {
                    return Err(ChecklistError::DuplicateItem(item.id.clone()));
                }
            }
        }

        Ok(Self::index(stages))
    }

    pub fn from_json(raw: &str) -> Result<Self, ChecklistError> {
        let entries: Vec<RawStageChecklist> = serde_json::from_str(raw)?;
        let mut stages = Vec::with_capacity(entries.len());
        for entry in entries {
            let stage = entry
                .stage
                .parse::<Stage>()
                .map_err(|_| ChecklistError::UnknownStage(entry.stage.clone()))?;
            stages.push(StageChecklist {
                stage,
                base_probability: entry.base_probability,
                items: entry.items,
            });
        }
        Self::from_stages(stages)
    }

    pub fn load(path: &Path) -> Result<Self, ChecklistError> {
        let raw = std::fs::read_to_string(path)?;
        let model = Self::from_json(&raw)?;
        tracing::debug!(
            path = %path.display(),
            stages = model.stages.len(),
            items = model.weights.len(),
            "loaded checklist table"
        );
        Ok(model)
    }

    fn index(stages: Vec<StageChecklist>) -> Self {
        let weights = stages
            .iter()
            .flat_map(|entry| entry.items.iter())
            .map(|item| (item.id.clone(), item.weight))
            .collect();
        Self { stages, weights }
    }

    pub fn stages(&self) -> &[StageChecklist] {
        &self.stages
    }

    /// Items configured for `stage`, empty when the stage has no checklist.
    pub fn items(&self, stage: Stage) -> &[ChecklistItem] {
        self.entry(stage)
            .map(|entry| entry.items.as_slice())
            .unwrap_or(&[])
    }

    pub fn base_probability(&self, stage: Stage) -> i32 {
        self.entry(stage)
            .map(|entry| entry.base_probability)
            .unwrap_or(0)
    }

    /// Weight of an item regardless of which stage defines it.
    pub fn weight(&self, item_id: &str) -> Option<i32> {
        self.weights.get(item_id).copied()
    }

    fn entry(&self, stage: Stage) -> Option<&StageChecklist> {
        self.stages.iter().find(|entry| entry.stage == stage)
    }
}

impl Default for ChecklistModel {
    fn default() -> Self {
        Self::index(default_stages())
    }
}

fn item(id: &str, label: &str, weight: i32) -> ChecklistItem {
    ChecklistItem {
        id: id.to_string(),
        label: label.to_string(),
        weight,
    }
}

fn default_stages() -> Vec<StageChecklist> {
    vec![
        StageChecklist {
            stage: Stage::Lead,
            base_probability: 5,
            items: vec![
                item("lead_contact_identified", "Primary contact identified", 5),
                item("lead_need_confirmed", "Business need confirmed", 5),
            ],
        },
        StageChecklist {
            stage: Stage::Qualification,
            base_probability: 10,
            items: vec![
                item("qual_budget_confirmed", "Budget confirmed", 10),
                item(
                    "qual_decision_maker_identified",
                    "Decision maker identified",
                    10,
                ),
                item("qual_timeline_confirmed", "Timeline confirmed", 5),
            ],
        },
        StageChecklist {
            stage: Stage::Proposal,
            base_probability: 40,
            items: vec![
                item("proposal_scope_agreed", "Scope agreed", 10),
                item("proposal_pricing_sent", "Pricing sent", 10),
                item(
                    "proposal_reviewed_with_buyer",
                    "Proposal reviewed with buyer",
                    10,
                ),
            ],
        },
        StageChecklist {
            stage: Stage::Negotiation,
            base_probability: 60,
            items: vec![
                item("negotiation_terms_agreed", "Commercial terms agreed", 10),
                item("negotiation_legal_review", "Legal review complete", 10),
                item("negotiation_verbal_commit", "Verbal commitment received", 10),
            ],
        },
        StageChecklist {
            stage: Stage::ClosedWon,
            base_probability: 100,
            items: vec![
                item("won_contract_signed", "Contract signed", 0),
                item("won_handoff_complete", "Delivery handoff complete", 0),
            ],
        },
        StageChecklist {
            stage: Stage::ClosedLost,
            base_probability: 0,
            items: vec![item("lost_reason_recorded", "Loss reason recorded", 0)],
        },
    ]
}
