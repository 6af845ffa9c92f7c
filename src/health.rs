//! Deal health scoring and probability recommendation.
//!
//! score = checklist × 0.35 + completeness × 0.20 + interaction × 0.20
//!       + next_step × 0.15 + stage_age × 0.10
//!
//! The recommended probability starts from the checklist score and subtracts
//! a fixed penalty for every risk condition that holds.

use std::collections::HashSet;

use chrono::NaiveDate;

use crate::checklist::ChecklistModel;
use crate::clock::Clock;
use crate::models::{
    DealHealth, DealHealthInput, DealHealthSignal, HealthBreakdown, OpenTask,
    OpportunitySnapshot, ScoredOpportunity, Severity, Stage,
};

// Composite weights in percent; the weighted sum is divided by 100 once.
const W_CHECKLIST: f64 = 35.0;
const W_COMPLETENESS: f64 = 20.0;
const W_INTERACTION: f64 = 20.0;
const W_NEXT_STEP: f64 = 15.0;
const W_STAGE_AGE: f64 = 10.0;

const PENALTY_NO_OWNER: f64 = 10.0;
const PENALTY_NO_CLOSE_DATE: f64 = 5.0;
const PENALTY_CLOSE_DATE_PAST: f64 = 15.0;
const PENALTY_STALE_INTERACTION: f64 = 10.0;
const PENALTY_NO_OPEN_TASKS: f64 = 10.0;
const PENALTY_TASKS_OVERDUE: f64 = 10.0;
const PENALTY_STAGE_STALLED: f64 = 10.0;

pub const STALE_INTERACTION_DAYS: i64 = 14;
pub const STALLED_STAGE_DAYS: i64 = 30;
pub const LOW_CHECKLIST_SCORE: f64 = 40.0;

/// State of the follow-up tasks as far as the next-step score is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
    Missing,
    Undated,
    Scheduled,
    PastDue,
}

impl NextStep {
    pub fn classify(tasks: &[OpenTask], today: NaiveDate) -> Self {
        if tasks.is_empty() {
            return NextStep::Missing;
        }

        let mut dated = tasks.iter().filter_map(|task| task.due_date).peekable();
        if dated.peek().is_none() {
            NextStep::Undated
        } else if dated.any(|due| due >= today) {
            NextStep::Scheduled
        } else {
            NextStep::PastDue
        }
    }

    pub fn score(self) -> f64 {
        match self {
            NextStep::Missing => 0.0,
            NextStep::Undated => 60.0,
            NextStep::Scheduled => 100.0,
            NextStep::PastDue => 30.0,
        }
    }
}

pub fn interaction_score(days_since: Option<i64>) -> f64 {
    match days_since {
        None => 0.0,
        Some(days) => match days {
            i64::MIN..=7 => 100.0,
            8..=14 => 70.0,
            15..=30 => 40.0,
            _ => 10.0,
        },
    }
}

pub fn stage_age_score(days_in_stage: Option<i64>) -> f64 {
    match days_in_stage {
        None => 50.0,
        Some(days) => match days {
            i64::MIN..=14 => 100.0,
            15..=30 => 70.0,
            31..=60 => 40.0,
            _ => 10.0,
        },
    }
}

pub fn completeness_score(input: &DealHealthInput) -> f64 {
    let present = [
        input.owner_id.is_some(),
        input.expected_close_date.is_some(),
        input.estimated_value.is_some_and(|value| value > 0.0),
        input.service_area_id.is_some(),
    ];
    let count = present.iter().filter(|flag| **flag).count();
    count as f64 / present.len() as f64 * 100.0
}

/// Stage base plus the weight of every distinct completed item found
/// anywhere in the table, whichever stage defines it.
pub fn checklist_score(checklist: &ChecklistModel, input: &DealHealthInput) -> f64 {
    let mut counted = HashSet::new();
    let earned: i64 = input
        .completed_checklist
        .iter()
        .filter(|id| counted.insert(id.as_str()))
        .filter_map(|id| checklist.weight(id))
        .map(i64::from)
        .sum();

    let total = i64::from(checklist.base_probability(input.stage)) + earned;
    total.clamp(0, 100) as f64
}

/// Risk conditions shared by the probability penalties and the signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RiskConditions {
    no_owner: bool,
    no_close_date: bool,
    close_date_past: bool,
    stale_interaction: bool,
    no_open_tasks: bool,
    tasks_overdue: bool,
    stage_stalled: bool,
}

impl RiskConditions {
    fn evaluate(
        input: &DealHealthInput,
        today: NaiveDate,
        interaction_days: Option<i64>,
        stage_days: Option<i64>,
    ) -> Self {
        let tasks = &input.open_tasks;
        Self {
            no_owner: input.owner_id.is_none(),
            no_close_date: input.expected_close_date.is_none(),
            close_date_past: input.expected_close_date.is_some_and(|date| date < today),
            stale_interaction: interaction_days
                .map_or(true, |days| days > STALE_INTERACTION_DAYS),
            no_open_tasks: tasks.is_empty(),
            tasks_overdue: !tasks.is_empty()
                && tasks
                    .iter()
                    .all(|task| task.due_date.is_some_and(|due| due < today)),
            stage_stalled: stage_days.is_some_and(|days| days > STALLED_STAGE_DAYS),
        }
    }

    fn penalty(&self) -> f64 {
        [
            (self.no_owner, PENALTY_NO_OWNER),
            (self.no_close_date, PENALTY_NO_CLOSE_DATE),
            (self.close_date_past, PENALTY_CLOSE_DATE_PAST),
            (self.stale_interaction, PENALTY_STALE_INTERACTION),
            (self.no_open_tasks, PENALTY_NO_OPEN_TASKS),
            (self.tasks_overdue, PENALTY_TASKS_OVERDUE),
            (self.stage_stalled, PENALTY_STAGE_STALLED),
        ]
        .iter()
        .filter(|(holds, _)| *holds)
        .map(|(_, penalty)| penalty)
        .sum()
    }

    fn signals(&self, stage: Stage, checklist: f64) -> Vec<DealHealthSignal> {
        let mut signals = Vec::new();
        if self.no_owner {
            signals.push(signal("no_owner", "No owner assigned", Severity::High));
        }
        if self.no_close_date {
            signals.push(signal(
                "no_close_date",
                "No expected close date",
                Severity::Medium,
            ));
        }
        if self.close_date_past && !stage.is_closed() {
            signals.push(signal(
                "close_date_overdue",
                "Expected close date has passed",
                Severity::High,
            ));
        }
        if self.stale_interaction {
            signals.push(signal(
                "no_recent_activity",
                "No interaction in the last 14 days",
                Severity::Medium,
            ));
        }
        if self.no_open_tasks {
            signals.push(signal(
                "no_next_step",
                "No next step scheduled",
                Severity::High,
            ));
        } else if self.tasks_overdue {
            signals.push(signal(
                "next_step_overdue",
                "All follow-up tasks are overdue",
                Severity::Medium,
            ));
        }
        if self.stage_stalled {
            signals.push(signal(
                "stage_stalled",
                "Stuck in stage for more than 30 days",
                Severity::Medium,
            ));
        }
        if checklist < LOW_CHECKLIST_SCORE {
            signals.push(signal(
                "low_checklist",
                "Qualification checklist mostly incomplete",
                Severity::Low,
            ));
        }
        signals
    }
}

fn signal(id: &str, label: &str, severity: Severity) -> DealHealthSignal {
    DealHealthSignal {
        id: id.to_string(),
        label: label.to_string(),
        severity,
    }
}

fn to_percent(value: f64) -> u8 {
    value.clamp(0.0, 100.0).round() as u8
}

/// Scores opportunities against a checklist table.
#[derive(Debug, Clone, Copy)]
pub struct HealthScorer<'a> {
    checklist: &'a ChecklistModel,
}

impl<'a> HealthScorer<'a> {
    pub fn new(checklist: &'a ChecklistModel) -> Self {
        Self { checklist }
    }

    pub fn compute<C: Clock + ?Sized>(&self, input: &DealHealthInput, clock: &C) -> DealHealth {
        let today = clock.today();
        let interaction_days = input.last_interaction_at.map(|at| clock.days_since(at));
        let stage_days = input.stage_entered_at.map(|at| clock.days_since(at));

        let breakdown = HealthBreakdown {
            checklist: checklist_score(self.checklist, input),
            completeness: completeness_score(input),
            interaction: interaction_score(interaction_days),
            next_step: NextStep::classify(&input.open_tasks, today).score(),
            stage_age: stage_age_score(stage_days),
        };

        let weighted = (breakdown.checklist * W_CHECKLIST
            + breakdown.completeness * W_COMPLETENESS
            + breakdown.interaction * W_INTERACTION
            + breakdown.next_step * W_NEXT_STEP
            + breakdown.stage_age * W_STAGE_AGE)
            / 100.0;

        let risks = RiskConditions::evaluate(input, today, interaction_days, stage_days);
        let recommended = to_percent(breakdown.checklist - risks.penalty());

        let current = input
            .probability
            .map(|probability| probability.clamp(0, 100))
            .unwrap_or_else(|| i32::from(to_percent(breakdown.checklist)));

        DealHealth {
            score: to_percent(weighted),
            recommended_probability: recommended,
            probability_delta: i32::from(recommended) - current,
            last_interaction_days: interaction_days,
            stage_age_days: stage_days,
            open_task_count: input.open_tasks.len(),
            signals: risks.signals(input.stage, breakdown.checklist),
            breakdown,
        }
    }
}

pub fn compute_health<C: Clock + ?Sized>(
    checklist: &ChecklistModel,
    input: &DealHealthInput,
    clock: &C,
) -> DealHealth {
    HealthScorer::new(checklist).compute(input, clock)
}

/// Scores every snapshot, weakest deals first.
pub fn score_opportunities<C: Clock + ?Sized>(
    checklist: &ChecklistModel,
    snapshots: Vec<OpportunitySnapshot>,
    clock: &C,
) -> Vec<ScoredOpportunity> {
    let scorer = HealthScorer::new(checklist);
    let mut scored: Vec<ScoredOpportunity> = snapshots
        .into_iter()
        .map(|snapshot| {
            let health = scorer.compute(&snapshot.input, clock);
            ScoredOpportunity {
                id: snapshot.id,
                name: snapshot.name,
                stage: snapshot.input.stage,
                current_probability: snapshot.input.probability,
                health,
            }
        })
        .collect();

    scored.sort_by(|a, b| {
        a.health
            .score
            .cmp(&b.health.score)
            .then_with(|| a.name.cmp(&b.name))
    });
    scored
}
