use serde::Serialize;

/// Display tone of a health level, ordered from worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Negative,
    Warning,
    Positive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct HealthLevel {
    pub label: &'static str,
    pub tone: Tone,
}

pub const HEALTHY: HealthLevel = HealthLevel {
    label: "Healthy",
    tone: Tone::Positive,
};
pub const WATCH: HealthLevel = HealthLevel {
    label: "Watch",
    tone: Tone::Warning,
};
pub const AT_RISK: HealthLevel = HealthLevel {
    label: "At Risk",
    tone: Tone::Negative,
};

pub fn classify(score: u8) -> HealthLevel {
    match score {
        70..=u8::MAX => HEALTHY,
        40..=69 => WATCH,
        _ => AT_RISK,
    }
}
