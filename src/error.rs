use thiserror::Error;

use crate::models::GroupRole;

/// The pipeline step a failure occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Search,
    Manifest,
    CategoryOptions,
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Step::Search => write!(f, "search"),
            Step::Manifest => write!(f, "manifest"),
            Step::CategoryOptions => write!(f, "category options"),
        }
    }
}

/// Errors the search pipeline can surface to callers.
///
/// An empty result collection at any lookup step is not an error; it is a
/// legitimate empty state reported through the `found_*` flags.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The request failed outright or the far end returned a non-success
    /// status.
    #[error("{step} request failed: {source}")]
    Network {
        step: Step,
        #[source]
        source: reqwest::Error,
    },

    /// The response body did not match the expected shape.
    #[error("{step} returned an unexpected payload: {detail}")]
    Parse { step: Step, detail: String },

    /// More than one group matched a role prefix and the configured policy
    /// is to reject ambiguity.
    #[error("{count} category option groups match the {role} prefix")]
    AmbiguousGroup { role: GroupRole, count: usize },
}

/// Errors from the table projection component.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableError {
    /// The data array has no rows, so there is no header row to project.
    #[error("table data must contain a header row")]
    MissingHeader,
}
