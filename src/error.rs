use std::path::PathBuf;

use crate::names::NameSpaceExhausted;
use crate::types::NodeName;

/// Failures of the collaborators the pipeline cannot work around.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("overpass request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unexpected overpass response: {0}")]
    Response(String),
    #[error("`{program}` exited with {status}: {stderr}")]
    LayoutFailed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("could not run `{program}`: {source}")]
    LayoutSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed layout output: {0}")]
    LayoutOutput(String),
    #[error("node {0} has no layout position")]
    MissingLayout(NodeName),
    #[error("image error on {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io { path: path.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Reasons a sample attempt is dropped. None of them is fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("more nodes in range than available names")]
    NameSpaceExhausted,
    #[error("graph has {nodes} nodes, outside the accepted window")]
    SizeRejected { nodes: usize },
    #[error("graph is not connected")]
    DisconnectedRejected,
}

impl From<NameSpaceExhausted> for Rejection {
    fn from(_: NameSpaceExhausted) -> Self {
        Rejection::NameSpaceExhausted
    }
}
