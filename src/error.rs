use std::io;
use std::path::PathBuf;

/// Fatal conditions that abort the session before any case runs.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("binary `{name}` not found under {} ({} locations searched)", root.display(), searched.len())]
    BinaryNotFound {
        name: String,
        root: PathBuf,
        searched: Vec<PathBuf>,
    },
    #[error("cannot create session temporary directory")]
    TempDir(#[source] io::Error),
    #[error("input name `{0}` must be a plain relative file name")]
    InputName(String),
    #[error("output name `{0}` must be a plain relative file name")]
    OutputName(String),
}
