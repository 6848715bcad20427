use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use anyhow::{Context, Result};

use crate::case::TestCase;
use crate::compare::{compare, ComparisonResult};

/// Result of one declared comparison.
#[derive(Debug, Clone)]
pub struct Check {
    pub golden: PathBuf,
    pub actual: PathBuf,
    pub result: ComparisonResult,
}

/// Everything observed while running one case.
#[derive(Debug, Clone)]
pub struct CaseOutcome {
    pub status: ExitStatus,
    pub checks: Vec<Check>,
}

impl CaseOutcome {
    /// A case passes when every comparison matched. The exit status of the
    /// program is not consulted.
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|check| check.result.matched)
    }

    pub fn failures(&self) -> impl Iterator<Item = &Check> {
        self.checks.iter().filter(|check| !check.result.matched)
    }
}

/// Run the program of `case` to completion, then perform every comparison.
///
/// Spawn and redirect failures are returned as errors. There is no timeout:
/// a program that never exits blocks the harness.
pub fn run_case(case: &TestCase) -> Result<CaseOutcome> {
    let status = execute(case)?;
    if !status.success() {
        tracing::warn!(
            program = %case.program().display(),
            status = ?status.code(),
            "program exited unsuccessfully; judging outputs only"
        );
    }
    let checks = case
        .comparisons()
        .iter()
        .map(|comparison| {
            let result = compare(comparison.golden(), comparison.actual(), comparison.transforms())
                .unwrap_or_else(|err| ComparisonResult::mismatch(format!("{err:#}")));
            Check {
                golden: comparison.golden().to_path_buf(),
                actual: comparison.actual().to_path_buf(),
                result,
            }
        })
        .collect();
    Ok(CaseOutcome { status, checks })
}

fn execute(case: &TestCase) -> Result<ExitStatus> {
    let mut command = Command::new(case.program());
    command
        .args(case.arguments())
        .stdin(Stdio::null())
        .stdout(redirect(case.stdout_path())?)
        .stderr(redirect(case.stderr_path())?);
    // The redirect handles live in `command` and close when it drops.
    let status = command
        .status()
        .with_context(|| format!("spawning {:?}", case.program()))?;
    tracing::debug!(
        "[CMD ] {:?} {:?} -> status {:?}, stdout {:?}, stderr {:?}",
        case.program(),
        case.arguments(),
        status.code(),
        case.stdout_path(),
        case.stderr_path()
    );
    Ok(status)
}

fn redirect(path: Option<&Path>) -> Result<Stdio> {
    match path {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("creating {path:?}"))?;
            Ok(Stdio::from(file))
        }
        None => Ok(Stdio::null()),
    }
}
