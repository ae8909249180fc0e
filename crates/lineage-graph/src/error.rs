use thiserror::Error;

/// Errors raised by the lineage core.
///
/// Most of the pipeline degrades instead of failing (unknown shapes become
/// empty fragments, dangling edges are dropped), so the variants here cover
/// caller mistakes against the store and the view.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("unknown node `{0}`")]
    UnknownNode(String),

    #[error("unknown mutation {0}")]
    UnknownMutation(uuid::Uuid),

    #[error("mutation {id} is already {state}")]
    MutationSettled { id: uuid::Uuid, state: String },

    #[error("invalid {what} `{value}`")]
    Parse { what: &'static str, value: String },

    #[error("malformed event payload: {0}")]
    Payload(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GraphError>;
