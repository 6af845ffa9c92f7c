use std::fmt::Write;

use chrono::NaiveDate;

use crate::level::{self, HealthLevel};
use crate::models::{ScoredOpportunity, Severity};
use crate::policy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalSummary {
    pub id: String,
    pub label: String,
    pub severity: Severity,
    pub count: usize,
}

pub fn summarize_signals(deals: &[ScoredOpportunity]) -> Vec<SignalSummary> {
    let mut summaries: Vec<SignalSummary> = Vec::new();

    for signal in deals.iter().flat_map(|deal| deal.health.signals.iter()) {
        match summaries.iter_mut().find(|summary| summary.id == signal.id) {
            Some(summary) => summary.count += 1,
            None => summaries.push(SignalSummary {
                id: signal.id.clone(),
                label: signal.label.clone(),
                severity: signal.severity,
                count: 1,
            }),
        }
    }

    // stable sort keeps first-seen order among equal counts
    summaries.sort_by(|a, b| b.count.cmp(&a.count));
    summaries
}

pub fn level_mix(deals: &[ScoredOpportunity]) -> Vec<(HealthLevel, usize)> {
    [level::HEALTHY, level::WATCH, level::AT_RISK]
        .into_iter()
        .map(|tier| {
            let count = deals
                .iter()
                .filter(|deal| level::classify(deal.health.score) == tier)
                .count();
            (tier, count)
        })
        .collect()
}

pub fn format_deal_line(deal: &ScoredOpportunity) -> String {
    let tier = level::classify(deal.health.score);
    let current = deal
        .current_probability
        .map(|p| format!("{p}%"))
        .unwrap_or_else(|| "unset".to_string());
    format!(
        "{} ({}) score {} [{}], recommended {}% vs current {} (delta {:+})",
        deal.name,
        deal.stage,
        deal.health.score,
        tier.label,
        deal.health.recommended_probability,
        current,
        deal.health.probability_delta
    )
}

pub fn build_report(
    stage: Option<&str>,
    generated_on: NaiveDate,
    deals: &[ScoredOpportunity],
) -> String {
    let summaries = summarize_signals(deals);
    let mut output = String::new();
    let scope_label = stage.unwrap_or("all stages");

    let _ = writeln!(output, "# Pipeline Health Report");
    let _ = writeln!(
        output,
        "Generated for {} on {} ({} opportunities)",
        scope_label,
        generated_on,
        deals.len()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Health Mix");

    if deals.is_empty() {
        let _ = writeln!(output, "No opportunities in scope.");
    } else {
        for (tier, count) in level_mix(deals) {
            let _ = writeln!(output, "- {}: {}", tier.label, count);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Signal Mix");

    if summaries.is_empty() {
        let _ = writeln!(output, "No risk signals raised.");
    } else {
        for summary in summaries.iter() {
            let _ = writeln!(
                output,
                "- {} ({}, {}): {} deals",
                summary.label, summary.id, summary.severity, summary.count
            );
        }
    }

    let mut weakest: Vec<&ScoredOpportunity> = deals.iter().collect();
    weakest.sort_by(|a, b| {
        a.health
            .score
            .cmp(&b.health.score)
            .then_with(|| a.name.cmp(&b.name))
    });
    let _ = writeln!(output);
    let _ = writeln!(output, "## Lowest Health Deals");

    if weakest.is_empty() {
        let _ = writeln!(output, "No opportunities in scope.");
    } else {
        for deal in weakest.iter().take(10) {
            let _ = writeln!(output, "- {}", format_deal_line(deal));
        }
    }

    let overrides: Vec<&ScoredOpportunity> = deals
        .iter()
        .filter(|deal| {
            policy::override_needs_justification(
                deal.current_probability,
                deal.health.probability_delta,
            )
        })
        .collect();
    let _ = writeln!(output);
    let _ = writeln!(output, "## Probability Overrides Needing Justification");

    if overrides.is_empty() {
        let _ = writeln!(
            output,
            "Entered probabilities are within {} points of the recommendation.",
            policy::OVERRIDE_JUSTIFICATION_THRESHOLD
        );
    } else {
        for deal in overrides {
            let _ = writeln!(output, "- {}", format_deal_line(deal));
        }
    }

    output
}
