use std::io;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::TempDir;

use crate::error::SetupError;

const TESTS_DIR: &str = "tests";
const TEMP_PREFIX: &str = "mason-tests.";

/// Path state for one harness run.
///
/// Fixture and golden files resolve under `source_root/tests`; every output
/// resolves under a temporary directory that is created on the first output
/// request and removed by [`Session::delete_temp_dir`] (or on drop).
#[derive(Debug)]
pub struct Session {
    source_root: PathBuf,
    binary_root: PathBuf,
    temp_parent: Option<PathBuf>,
    temp_dir: Option<TempDir>,
}

impl Session {
    pub fn new(source_root: impl AsRef<Path>, binary_root: impl AsRef<Path>) -> Result<Self> {
        let source_root = std::path::absolute(source_root.as_ref())
            .with_context(|| format!("resolving source root {:?}", source_root.as_ref()))?;
        let binary_root = std::path::absolute(binary_root.as_ref())
            .with_context(|| format!("resolving binary root {:?}", binary_root.as_ref()))?;
        Ok(Self {
            source_root,
            binary_root,
            temp_parent: None,
            temp_dir: None,
        })
    }

    /// Create the temporary directory inside `parent` instead of the system
    /// temp location.
    pub fn with_temp_parent(mut self, parent: impl Into<PathBuf>) -> Self {
        self.temp_parent = Some(parent.into());
        self
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn binary_root(&self) -> &Path {
        &self.binary_root
    }

    pub fn tests_dir(&self) -> PathBuf {
        self.source_root.join(TESTS_DIR)
    }

    /// Fixture or golden file `name`. Inputs and goldens share one directory.
    pub fn in_file(&self, name: &str) -> Result<PathBuf> {
        if !is_plain_name(name) {
            return Err(SetupError::InputName(name.to_string()).into());
        }
        Ok(self.tests_dir().join(name))
    }

    /// Output file `name` inside the session temporary directory.
    pub fn out_file(&mut self, name: &str) -> Result<PathBuf> {
        if !is_plain_name(name) {
            return Err(SetupError::OutputName(name.to_string()).into());
        }
        Ok(self.temp_dir()?.join(name))
    }

    /// The session temporary directory, created on first use.
    pub fn temp_dir(&mut self) -> Result<PathBuf> {
        if let Some(dir) = &self.temp_dir {
            return Ok(dir.path().to_path_buf());
        }
        let mut builder = tempfile::Builder::new();
        builder.prefix(TEMP_PREFIX);
        let created = match &self.temp_parent {
            Some(parent) => builder.tempdir_in(parent),
            None => builder.tempdir(),
        };
        let dir = created.map_err(SetupError::TempDir)?;
        tracing::debug!(path = %dir.path().display(), "created session temporary directory");
        let path = dir.path().to_path_buf();
        self.temp_dir = Some(dir);
        Ok(path)
    }

    /// Remove the temporary directory and everything in it.
    ///
    /// Calling this when the directory was never created, was already
    /// deleted, or vanished underneath us is a successful no-op.
    pub fn delete_temp_dir(&mut self) -> io::Result<()> {
        let Some(dir) = self.temp_dir.take() else {
            return Ok(());
        };
        match dir.close() {
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    /// Detach the temporary directory from the session so it survives the
    /// run. Returns its path, if one was ever created.
    pub fn keep_temp_dir(&mut self) -> Option<PathBuf> {
        self.temp_dir.take().map(TempDir::keep)
    }
}

fn is_plain_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
