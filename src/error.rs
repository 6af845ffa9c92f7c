use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChecklistError {
    #[error("checklist item id `{0}` is defined more than once")]
    DuplicateItem(String),

    #[error("base probability {probability} for stage {stage} is outside 0..=100")]
    BaseOutOfRange { stage: String, probability: i32 },

    #[error("weight {weight} for checklist item `{id}` is outside 0..=100")]
    WeightOutOfRange { id: String, weight: i32 },

    #[error("stage {0} appears more than once in the checklist table")]
    DuplicateStage(String),

    #[error("unknown stage in checklist table: {0}")]
    UnknownStage(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum InputError {
    #[error("unknown stage `{0}`")]
    UnknownStage(String),

    #[error("row {row}: invalid due date `{value}` in open_tasks")]
    InvalidDueDate { row: usize, value: String },

    #[error("row {row}: {source}")]
    Row {
        row: usize,
        #[source]
        source: Box<InputError>,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PolicyError {
    #[error(
        "entered probability is {} points {} the recommended {}%; a justification is required",
        .delta.abs(),
        override_direction(.delta),
        .recommended
    )]
    JustificationRequired { delta: i32, recommended: u8 },
}

/// `delta` is recommended minus entered, so a negative delta means the entered
/// probability sits above the recommendation.
fn override_direction(delta: &i32) -> &'static str {
    if *delta < 0 {
        "above"
    } else {
        "below"
    }
}
