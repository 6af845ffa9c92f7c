use std::collections::HashMap;

use anyhow::Context;
use chrono::NaiveDate;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{
    parse_checklist_payload, DealHealthInput, OpenTask, OpportunitySnapshot, Stage,
};

const OPPORTUNITIES_QUERY: &str = "SELECT o.id, o.name, o.stage, o.checklist, o.owner_id, \
     o.expected_close_date, o.estimated_value::float8 AS estimated_value, o.service_area_id, \
     o.stage_entered_at, o.last_interaction_at, o.probability \
     FROM opportunities o ORDER BY o.name";

/// Reads opportunity snapshots and their incomplete follow-up tasks.
/// Rows whose stage is not recognised are skipped with a warning. Stage
/// filtering is left to the caller, after stored names are parsed leniently.
pub async fn fetch_opportunities(pool: &PgPool) -> anyhow::Result<Vec<OpportunitySnapshot>> {
    let records = sqlx::query(OPPORTUNITIES_QUERY)
        .fetch_all(pool)
        .await
        .context("failed to query opportunities")?;

    let mut snapshots = Vec::with_capacity(records.len());
    for row in records {
        let id: Uuid = row.try_get("id")?;
        let stage_name: String = row.try_get("stage")?;
        let Ok(stage) = stage_name.parse::<Stage>() else {
            tracing::warn!(%id, stage = %stage_name, "skipping opportunity with unknown stage");
            continue;
        };
        let checklist: Option<String> = row.try_get("checklist")?;

        snapshots.push(OpportunitySnapshot {
            id,
            name: row.try_get("name")?,
            input: DealHealthInput {
                stage,
                completed_checklist: checklist
                    .as_deref()
                    .map(parse_checklist_payload)
                    .unwrap_or_default(),
                owner_id: row.try_get("owner_id")?,
                expected_close_date: row.try_get("expected_close_date")?,
                estimated_value: row.try_get("estimated_value")?,
                service_area_id: row.try_get("service_area_id")?,
                stage_entered_at: row.try_get("stage_entered_at")?,
                last_interaction_at: row.try_get("last_interaction_at")?,
                probability: row.try_get("probability")?,
                ..DealHealthInput::new(stage)
            },
        });
    }

    let ids: Vec<Uuid> = snapshots.iter().map(|snapshot| snapshot.id).collect();
    let mut tasks = fetch_open_tasks(pool, &ids).await?;
    for snapshot in &mut snapshots {
        snapshot.input.open_tasks = tasks.remove(&snapshot.id).unwrap_or_default();
    }

    tracing::info!(count = snapshots.len(), "loaded opportunities from database");
    Ok(snapshots)
}

async fn fetch_open_tasks(
    pool: &PgPool,
    opportunity_ids: &[Uuid],
) -> anyhow::Result<HashMap<Uuid, Vec<OpenTask>>> {
    if opportunity_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let records = sqlx::query(
        "SELECT t.opportunity_id, t.due_date \
         FROM opportunity_tasks t \
         WHERE t.completed_at IS NULL AND t.opportunity_id = ANY($1)",
    )
    .bind(opportunity_ids)
    .fetch_all(pool)
    .await
    .context("failed to query open tasks")?;

    let mut tasks: HashMap<Uuid, Vec<OpenTask>> = HashMap::new();
    for row in records {
        let opportunity_id: Uuid = row.try_get("opportunity_id")?;
        let due_date: Option<NaiveDate> = row.try_get("due_date")?;
        tasks
            .entry(opportunity_id)
            .or_default()
            .push(OpenTask { due_date });
    }

    Ok(tasks)
}
