use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("data lake not initialized: {0}")]
    NotInitialized(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("type error: {0}")]
    Type(#[from] doclake_types::TypeError),

    #[error("resolver error: {0}")]
    Resolver(#[from] doclake_resolver::ResolverError),

    #[error("protocol error: {0}")]
    Protocol(#[from] doclake_protocol::ProtocolError),

    #[error("content error: {0}")]
    Content(#[from] doclake_content::ContentError),

    #[error("graph error: {0}")]
    Graph(#[from] doclake_graph::GraphError),

    #[error("query error: {0}")]
    Query(#[from] doclake_query::QueryError),

    #[error("transaction error: {0}")]
    Txn(#[from] doclake_txn::TxnError),

    #[error("follow error: {0}")]
    Follow(#[from] doclake_follow::FollowError),
}

pub type Result<T> = std::result::Result<T, SdkError>;
