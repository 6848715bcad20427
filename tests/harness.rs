#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use assert_cmd::Command;
use mason_tests::suite::{self, RunConfig};
use mason_tests::{Comparison, Pipeline, Platform, Reporter, SetupError, TestCase, Transform};
use predicates::prelude::*;
use tempfile::TempDir;

const PROGRAMS: [&str; 5] = [
    "mason_genome",
    "mason_methylation",
    "mason_variator",
    "mason_materializer",
    "mason_simulator",
];

/// Writes a FASTA to the `-o` argument, logs the path on stderr and a
/// probability on stdout. Exits early without output when given `-s`.
const GENOME: &str = r#"
out=""
while [ $# -gt 0 ]; do
  case "$1" in
    -s) echo "seeded run not supported" >&2; exit 1 ;;
    -o) out="$2"; shift ;;
  esac
  shift
done
printf '>chr1\nACGTACGTNN\n' > "$out"
echo "Writing genome to $out" >&2
echo "mean GC 5.0E-001"
"#;

struct Workspace {
    scratch: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let ws = Self {
            scratch: TempDir::new().unwrap(),
        };
        fs::create_dir_all(ws.tests_dir()).unwrap();
        fs::create_dir_all(ws.bin_dir()).unwrap();
        fs::create_dir_all(ws.temp_parent()).unwrap();
        for name in PROGRAMS {
            ws.install(name, "exit 0");
        }
        ws.install("mason_genome", GENOME);
        ws.golden("genome.test1.fasta", ">chr1\nACGTACGTNN\n");
        ws.golden("genome.test1.stdout", "mean GC 5e-01\n");
        ws.golden("genome.test1.stderr", "Writing genome to genome.test1.fasta\n");
        ws.golden("genome.test2.fasta", ">chr1\nACGTACGTNN\n");
        ws.golden("genome.test2.stdout", "mean GC 5e-01\n");
        ws.golden("genome.test2.stderr", "Writing genome to genome.test2.fasta\n");
        ws
    }

    fn source_root(&self) -> PathBuf {
        self.scratch.path().join("src")
    }

    fn binary_root(&self) -> PathBuf {
        self.scratch.path().join("build")
    }

    fn tests_dir(&self) -> PathBuf {
        self.source_root().join("tests")
    }

    fn bin_dir(&self) -> PathBuf {
        self.binary_root().join("bin")
    }

    fn temp_parent(&self) -> PathBuf {
        self.scratch.path().join("tmp")
    }

    fn install(&self, name: &str, body: &str) {
        let path = self.bin_dir().join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    fn golden(&self, name: &str, content: &str) {
        fs::write(self.tests_dir().join(name), content).unwrap();
    }

    fn config(&self, libstdcxx: bool, filter: Option<&str>) -> RunConfig {
        RunConfig {
            platform: Platform { libstdcxx },
            filter: filter.map(str::to_string),
            temp_parent: Some(self.temp_parent()),
            ..RunConfig::new(self.source_root(), self.binary_root())
        }
    }

    fn leftover_temp_dirs(&self) -> usize {
        fs::read_dir(self.temp_parent()).unwrap().count()
    }
}

fn run(config: &RunConfig) -> (anyhow::Result<mason_tests::Summary>, String) {
    let mut out = Vec::new();
    let result = suite::run(config, &mut out);
    (result, String::from_utf8(out).unwrap())
}

#[test]
fn genome_cases_pass_after_normalization() {
    let ws = Workspace::new();
    ws.install("mason_genome", &GENOME.replace("-s)", "-never)"));
    let (result, report) = run(&ws.config(false, Some("mason_genome")));
    let summary = result.unwrap();

    assert_eq!(summary.total(), 2);
    assert_eq!(summary.failed(), 0, "{report}");
    assert!(summary.success());
    assert!(report.starts_with("Executing test for mason_variator\n"));
    let status_lines: Vec<&str> = report
        .lines()
        .filter(|l| l.starts_with("mason_genome "))
        .collect();
    assert_eq!(status_lines.len(), 2);
    assert!(status_lines[0].starts_with("mason_genome -l 1000 -o "));
    assert!(status_lines.iter().all(|l| l.ends_with(" OK")));
    assert!(report.contains("     total tests: 2\n    failed tests: 0\nsuccessful tests: 2\n"));
    assert_eq!(ws.leftover_temp_dirs(), 0);
}

#[test]
fn missing_output_fails_case_but_run_continues() {
    let ws = Workspace::new();
    let (result, report) = run(&ws.config(false, Some("mason_genome")));
    let summary = result.unwrap();

    assert_eq!(summary.total(), 2);
    assert_eq!(summary.failed(), 1);
    assert_eq!(summary.passed(), summary.total() - summary.failed());
    assert!(!summary.success());
    let second = report
        .lines()
        .find(|l| l.starts_with("mason_genome -s 1"))
        .unwrap();
    assert!(second.ends_with(" FAILED"), "{report}");
    assert!(report.contains("actual file missing"), "{report}");
    assert_eq!(ws.leftover_temp_dirs(), 0);
}

#[test]
fn platform_gate_decides_total() {
    let ws = Workspace::new();
    let (result, report) = run(&ws.config(false, None));
    let summary = result.unwrap();
    assert_eq!(summary.total(), 3, "{report}");
    assert_eq!(
        report.lines().filter(|l| l.ends_with(" OK") || l.ends_with(" FAILED")).count(),
        3
    );

    let (result, _) = run(&ws.config(true, None));
    let summary = result.unwrap();
    assert_eq!(summary.total(), 16);
    assert_eq!(summary.passed() + summary.failed(), 16);
    assert_eq!(ws.leftover_temp_dirs(), 0);
}

#[test]
fn missing_binary_aborts_before_running() {
    let ws = Workspace::new();
    fs::remove_file(ws.bin_dir().join("mason_simulator")).unwrap();
    let (result, report) = run(&ws.config(true, None));
    let err = result.unwrap_err();
    match err.downcast_ref::<SetupError>() {
        Some(SetupError::BinaryNotFound { name, .. }) => assert_eq!(name, "mason_simulator"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(report.is_empty(), "{report}");
    assert_eq!(ws.leftover_temp_dirs(), 0);
}

#[test]
fn keep_temp_preserves_outputs() {
    let ws = Workspace::new();
    let config = RunConfig {
        keep_temp: true,
        ..ws.config(false, Some("mason_genome -l 1000"))
    };
    let (result, _) = run(&config);
    assert_eq!(result.unwrap().total(), 1);
    let kept: Vec<PathBuf> = fs::read_dir(ws.temp_parent())
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(kept.len(), 1);
    assert!(kept[0].join("genome.test1.fasta").is_file());
}

#[test]
fn path_bearing_log_line_needs_anchored_strip() {
    let ws = Workspace::new();
    let out_dir = ws.scratch.path().join("out");
    fs::create_dir_all(&out_dir).unwrap();
    let program = ws.bin_dir().join("mason_genome");
    let stderr = out_dir.join("genome.stderr");
    let golden = ws.tests_dir().join("genome.test1.stderr");
    let prefix = format!("{}/", out_dir.display());

    let case = |transforms: Pipeline| {
        TestCase::new(&program)
            .args(["-l", "1000", "-o"])
            .arg(out_dir.join("genome.test1.fasta"))
            .stderr(&stderr)
            .compare(Comparison::normalized(&golden, &stderr, transforms))
    };
    let cases = vec![
        case(Pipeline::new().with(Transform::strip_prefix(prefix))),
        case(Pipeline::new()),
    ];
    let mut reporter = Reporter::new(Vec::new());
    let summary = reporter.run_all(&cases).unwrap();
    let report = String::from_utf8(reporter.into_inner()).unwrap();
    let statuses: Vec<&str> = report
        .lines()
        .filter(|l| l.starts_with("mason_genome"))
        .map(|l| l.rsplit(' ').next().unwrap())
        .collect();
    assert_eq!(statuses, ["OK", "FAILED"]);
    assert_eq!(summary.total(), 2);
    assert_eq!(summary.failed(), 1);
}

#[test]
fn repeated_runs_are_deterministic() {
    let ws = Workspace::new();
    let first = run(&ws.config(false, Some("mason_genome"))).0.unwrap();
    let second = run(&ws.config(false, Some("mason_genome"))).0.unwrap();
    assert_eq!(first, second);
}

fn cli(ws: &Workspace) -> Command {
    let mut cmd = Command::cargo_bin("mason-tests").unwrap();
    cmd.env("TMPDIR", ws.temp_parent())
        .arg(ws.source_root())
        .arg(ws.binary_root());
    cmd
}

#[test]
fn cli_exit_status_reflects_failures() {
    let ws = Workspace::new();
    cli(&ws)
        .args(["--filter", "mason_genome -l"])
        .assert()
        .success()
        .stdout(predicate::str::contains("successful tests: 1"));

    cli(&ws)
        .args(["--filter", "mason_genome"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("    failed tests: 1"));
}

#[test]
fn cli_reports_setup_error() {
    let ws = Workspace::new();
    let empty = ws.scratch.path().join("empty-build");
    fs::create_dir_all(&empty).unwrap();
    Command::cargo_bin("mason-tests")
        .unwrap()
        .arg(ws.source_root())
        .arg(&empty)
        .assert()
        .failure()
        .stderr(predicate::str::contains("binary `mason_genome` not found"))
        .stdout(predicate::str::contains("total tests").not());
}
