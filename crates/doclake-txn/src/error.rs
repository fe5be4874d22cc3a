use thiserror::Error;

use doclake_content::ContentError;
use doclake_graph::GraphError;
use doclake_protocol::ProtocolError;

pub type Result<T> = std::result::Result<T, TxnError>;

#[derive(Debug, Error)]
pub enum TxnError {
    #[error("a transaction is already open")]
    Conflict,

    #[error("no open transaction")]
    NoOpenTransaction,

    #[error("invalid change: {0}")]
    Validation(String),

    #[error("no manifest owns path {0}")]
    UnmappablePath(String),

    #[error("cannot determine content type for {0}")]
    UnknownContentType(String),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Content(#[from] ContentError),

    #[error(transparent)]
    Graph(#[from] GraphError),
}
