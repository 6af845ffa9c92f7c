use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::error::InputError;
use crate::models::{
    parse_checklist_payload, DealHealthInput, OpenTask, OpportunitySnapshot, Stage,
};

#[derive(Debug, serde::Deserialize)]
struct CsvRow {
    #[serde(default)]
    id: Option<Uuid>,
    name: String,
    stage: String,
    #[serde(default)]
    checklist: Option<String>,
    #[serde(default)]
    owner_id: Option<Uuid>,
    #[serde(default)]
    expected_close_date: Option<NaiveDate>,
    #[serde(default)]
    estimated_value: Option<f64>,
    #[serde(default)]
    service_area_id: Option<Uuid>,
    #[serde(default)]
    stage_entered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    last_interaction_at: Option<DateTime<Utc>>,
    #[serde(default)]
    probability: Option<i32>,
    #[serde(default)]
    open_tasks: Option<String>,
}

impl CsvRow {
    fn into_snapshot(self, row: usize) -> Result<OpportunitySnapshot, InputError> {
        let stage = self
            .stage
            .parse::<Stage>()
            .map_err(|source| InputError::Row {
                row,
                source: Box::new(source),
            })?;
        let open_tasks = parse_open_tasks(self.open_tasks.as_deref().unwrap_or(""), row)?;

        Ok(OpportunitySnapshot {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            name: self.name,
            input: DealHealthInput {
                stage,
                completed_checklist: self
                    .checklist
                    .as_deref()
                    .map(parse_checklist_payload)
                    .unwrap_or_default(),
                owner_id: self.owner_id,
                expected_close_date: self.expected_close_date,
                estimated_value: self.estimated_value,
                service_area_id: self.service_area_id,
                stage_entered_at: self.stage_entered_at,
                last_interaction_at: self.last_interaction_at,
                open_tasks,
                probability: self.probability,
            },
        })
    }
}

/// Parses `2026-10-25;none;2026-11-02`. `none` or `-` marks an undated task.
pub fn parse_open_tasks(raw: &str, row: usize) -> Result<Vec<OpenTask>, InputError> {
    raw.split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            if entry == "-" || entry.eq_ignore_ascii_case("none") {
                return Ok(OpenTask::undated());
            }
            NaiveDate::parse_from_str(entry, "%Y-%m-%d")
                .map(OpenTask::due)
                .map_err(|_| InputError::InvalidDueDate {
                    row,
                    value: entry.to_string(),
                })
        })
        .collect()
}

pub fn read_csv<R: Read>(reader: R) -> Result<Vec<OpportunitySnapshot>, InputError> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut snapshots = Vec::new();

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result?;
        snapshots.push(row.into_snapshot(index + 1)?);
    }

    Ok(snapshots)
}

pub fn load_csv(path: &Path) -> Result<Vec<OpportunitySnapshot>, InputError> {
    let file = std::fs::File::open(path)?;
    let snapshots = read_csv(file)?;
    tracing::info!(path = %path.display(), count = snapshots.len(), "loaded opportunities from csv");
    Ok(snapshots)
}

pub fn read_json<R: Read>(reader: R) -> Result<Vec<OpportunitySnapshot>, InputError> {
    Ok(serde_json::from_reader(reader)?)
}

pub fn load_json(path: &Path) -> Result<Vec<OpportunitySnapshot>, InputError> {
    let file = std::fs::File::open(path)?;
    let snapshots = read_json(std::io::BufReader::new(file))?;
    tracing::info!(path = %path.display(), count = snapshots.len(), "loaded opportunities from json");
    Ok(snapshots)
}
