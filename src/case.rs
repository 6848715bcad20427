use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use crate::platform::Gate;
use crate::transform::Pipeline;

/// One golden/actual pair checked after a case has run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparison {
    golden: PathBuf,
    actual: PathBuf,
    transforms: Pipeline,
}

impl Comparison {
    /// Compare without normalization; binary outputs are checked byte for byte.
    pub fn exact(golden: impl Into<PathBuf>, actual: impl Into<PathBuf>) -> Self {
        Self::normalized(golden, actual, Pipeline::new())
    }

    pub fn normalized(
        golden: impl Into<PathBuf>,
        actual: impl Into<PathBuf>,
        transforms: Pipeline,
    ) -> Self {
        Self {
            golden: golden.into(),
            actual: actual.into(),
            transforms,
        }
    }

    pub fn golden(&self) -> &Path {
        &self.golden
    }

    pub fn actual(&self) -> &Path {
        &self.actual
    }

    pub fn transforms(&self) -> &Pipeline {
        &self.transforms
    }
}

/// A single program invocation plus the outputs it is expected to produce.
///
/// Built once with the consuming builder methods and never mutated after it
/// is handed to the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    program: PathBuf,
    args: Vec<OsString>,
    stdout: Option<PathBuf>,
    stderr: Option<PathBuf>,
    comparisons: Vec<Comparison>,
    gate: Gate,
}

impl TestCase {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdout: None,
            stderr: None,
            comparisons: Vec::new(),
            gate: Gate::Always,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Capture standard output into `path`. Without this it is discarded.
    pub fn stdout(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdout = Some(path.into());
        self
    }

    /// Capture standard error into `path`. Without this it is discarded.
    pub fn stderr(mut self, path: impl Into<PathBuf>) -> Self {
        self.stderr = Some(path.into());
        self
    }

    pub fn compare(mut self, comparison: Comparison) -> Self {
        self.comparisons.push(comparison);
        self
    }

    pub fn gated(mut self, gate: Gate) -> Self {
        self.gate = gate;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn arguments(&self) -> &[OsString] {
        &self.args
    }

    pub fn stdout_path(&self) -> Option<&Path> {
        self.stdout.as_deref()
    }

    pub fn stderr_path(&self) -> Option<&Path> {
        self.stderr.as_deref()
    }

    pub fn comparisons(&self) -> &[Comparison] {
        &self.comparisons
    }

    pub fn gate(&self) -> Gate {
        self.gate
    }

    /// `<program-basename> <args...>` as printed in the report.
    pub fn command_line(&self) -> String {
        let name = self
            .program
            .file_name()
            .unwrap_or(self.program.as_os_str())
            .to_string_lossy();
        std::iter::once(name)
            .chain(self.args.iter().map(|a| a.to_string_lossy()))
            .collect::<Vec<_>>()
            .join(" ")
    }
}
