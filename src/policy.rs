use crate::error::PolicyError;
use crate::models::DealHealth;

/// Points of disagreement between the entered and the recommended
/// probability at which a written justification becomes mandatory.
pub const OVERRIDE_JUSTIFICATION_THRESHOLD: i32 = 20;

pub fn requires_justification(delta: i32) -> bool {
    delta.abs() >= OVERRIDE_JUSTIFICATION_THRESHOLD
}

/// Only an entered probability is an override; without one the delta is
/// measured against the checklist score and nothing needs justifying.
pub fn override_needs_justification(entered_probability: Option<i32>, delta: i32) -> bool {
    entered_probability.is_some() && requires_justification(delta)
}

pub fn check_override(
    health: &DealHealth,
    entered_probability: Option<i32>,
    justification: Option<&str>,
) -> Result<(), PolicyError> {
    if !override_needs_justification(entered_probability, health.probability_delta) {
        return Ok(());
    }

    match justification.map(str::trim) {
        Some(text) if !text.is_empty() => {
            tracing::debug!(
                delta = health.probability_delta,
                "probability override accepted with justification"
            );
            Ok(())
        }
        _ => Err(PolicyError::JustificationRequired {
            delta: health.probability_delta,
            recommended: health.recommended_probability,
        }),
    }
}
