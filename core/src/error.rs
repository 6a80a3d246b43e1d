use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the plan grid engine and its file-backed stores.
///
/// Every variant is recoverable: callers report it and carry on with the
/// last good in-memory state.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Invalid amount '{0}': servings must be a number greater than 0 and at most 100")]
    InvalidAmount(String),

    #[error("Row {0} is a fixed row (Recommended/Summation) and cannot be changed")]
    ProtectedRow(usize),

    #[error("Row {index} does not exist (plan has {len} rows)")]
    RowOutOfRange { index: usize, len: usize },

    #[error("Column '{0}' does not map to any nutrient field")]
    UnresolvedColumn(String),

    #[error("Failed to {action} {}: {source}", path.display())]
    Persistence {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Plan file {} is malformed: {reason}", path.display())]
    MalformedPlan { path: PathBuf, reason: String },

    #[error("Invalid plan name '{0}': it must contain at least one letter or digit")]
    InvalidPlanName(String),

    #[error("A plan named '{0}' already exists")]
    PlanExists(String),

    #[error("Plan '{0}' not found")]
    PlanNotFound(String),

    #[error("Food item '{0}' not found")]
    FoodItemNotFound(String),

    #[error("A food item named '{0}' already exists")]
    DuplicateFoodItem(String),

    #[error("Invalid food item: {0}")]
    InvalidFoodItem(String),
}

pub type PlanResult<T> = Result<T, PlanError>;

impl PlanError {
    pub(crate) fn persistence<E>(action: &'static str, path: impl Into<PathBuf>, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        PlanError::Persistence {
            action,
            path: path.into(),
            source: source.into(),
        }
    }
}
