use std::io::Write;

use anyhow::Result;

use crate::case::TestCase;
use crate::runner::run_case;

const RULE: &str = "==============================";

/// Pass/fail tally for a run. `failed` is always derived from the other two.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    total: usize,
    passed: usize,
}

impl Summary {
    pub fn record(&mut self, passed: bool) {
        self.total += 1;
        if passed {
            self.passed += 1;
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn passed(&self) -> usize {
        self.passed
    }

    pub fn failed(&self) -> usize {
        self.total - self.passed
    }

    pub fn success(&self) -> bool {
        self.failed() == 0
    }
}

/// Writes the per-case status lines and the closing summary.
pub struct Reporter<W> {
    out: W,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn banner(&mut self, title: &str) -> Result<()> {
        writeln!(self.out, "{title}")?;
        writeln!(self.out, "{}", "=".repeat(22))?;
        writeln!(self.out)?;
        Ok(())
    }

    /// Run every case in order, printing one status line per case.
    ///
    /// A case whose execution fails is reported as `FAILED` and the run moves
    /// on; only a failure to write the report itself is returned.
    pub fn run_all(&mut self, cases: &[TestCase]) -> Result<Summary> {
        let mut summary = Summary::default();
        for case in cases {
            let passed = self.run_one(case)?;
            summary.record(passed);
        }
        Ok(summary)
    }

    fn run_one(&mut self, case: &TestCase) -> Result<bool> {
        let command_line = case.command_line();
        match run_case(case) {
            Ok(outcome) => {
                let passed = outcome.passed();
                writeln!(self.out, "{command_line} {}", if passed { "OK" } else { "FAILED" })?;
                for check in outcome.failures() {
                    writeln!(
                        self.out,
                        "  {} vs {}:",
                        check.golden.display(),
                        check.actual.display()
                    )?;
                    if let Some(detail) = &check.result.detail {
                        for line in detail.lines() {
                            writeln!(self.out, "    {line}")?;
                        }
                    }
                }
                Ok(passed)
            }
            Err(err) => {
                writeln!(self.out, "{command_line} FAILED")?;
                writeln!(self.out, "  error: {err:#}")?;
                Ok(false)
            }
        }
    }

    pub fn note(&mut self, message: &str) -> Result<()> {
        writeln!(self.out, "{message}")?;
        Ok(())
    }

    pub fn summary(&mut self, summary: &Summary) -> Result<()> {
        writeln!(self.out, "{RULE}")?;
        writeln!(self.out, "     total tests: {}", summary.total())?;
        writeln!(self.out, "    failed tests: {}", summary.failed())?;
        writeln!(self.out, "successful tests: {}", summary.passed())?;
        writeln!(self.out, "{RULE}")?;
        Ok(())
    }
}
