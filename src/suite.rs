//! The mason regression suite: which programs to locate, which cases to run
//! and the glue that drives a whole session.

use std::io::Write;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};

use anyhow::Result;

use crate::case::{Comparison, TestCase};
use crate::locate::locate;
use crate::paths::Session;
use crate::platform::{select, Gate, Platform};
use crate::report::{Reporter, Summary};
use crate::transform::{Pipeline, Transform};

const BANNER: &str = "Executing test for mason_variator";
const BIN_DIR: &str = "bin";

/// Parameters of one harness run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub source_root: PathBuf,
    pub binary_root: PathBuf,
    pub platform: Platform,
    pub filter: Option<String>,
    pub keep_temp: bool,
    /// Parent for the session temporary directory; system temp when unset.
    pub temp_parent: Option<PathBuf>,
}

impl RunConfig {
    pub fn new(source_root: impl Into<PathBuf>, binary_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            binary_root: binary_root.into(),
            platform: Platform::detect(),
            filter: None,
            keep_temp: false,
            temp_parent: None,
        }
    }
}

/// Executables under test.
#[derive(Debug, Clone)]
pub struct Programs {
    pub genome: PathBuf,
    pub methylation: PathBuf,
    pub variator: PathBuf,
    pub materializer: PathBuf,
    pub simulator: PathBuf,
}

impl Programs {
    /// Locate all programs. Any missing binary aborts the session.
    pub fn locate(binary_root: &Path) -> Result<Self> {
        Ok(Self {
            genome: locate(binary_root, BIN_DIR, "mason_genome")?,
            methylation: locate(binary_root, BIN_DIR, "mason_methylation")?,
            variator: locate(binary_root, BIN_DIR, "mason_variator")?,
            materializer: locate(binary_root, BIN_DIR, "mason_materializer")?,
            simulator: locate(binary_root, BIN_DIR, "mason_simulator")?,
        })
    }
}

/// Strip the fixture and temporary directory prefixes from paths the
/// programs echo, then normalize exponent formatting.
pub fn host_transforms(session: &mut Session) -> Result<Pipeline> {
    let tests_prefix = with_separator(&session.tests_dir());
    let temp_prefix = with_separator(&session.temp_dir()?);
    Ok(Pipeline::new()
        .with(Transform::strip_prefix(tests_prefix))
        .with(Transform::strip_prefix(temp_prefix))
        .with(Transform::ScientificExponent))
}

fn with_separator(dir: &Path) -> String {
    format!("{}{MAIN_SEPARATOR}", dir.display())
}

/// Case-building helpers bound to one session and transform list.
struct Builder<'a> {
    session: &'a mut Session,
    transforms: Pipeline,
}

impl Builder<'_> {
    fn input(&self, name: &str) -> Result<PathBuf> {
        self.session.in_file(name)
    }

    fn output(&mut self, name: &str) -> Result<PathBuf> {
        self.session.out_file(name)
    }

    /// Golden `golden` against output `actual`, compared verbatim.
    fn exact(&mut self, golden: &str, actual: &str) -> Result<Comparison> {
        Ok(Comparison::exact(self.input(golden)?, self.output(actual)?))
    }

    /// Golden `golden` against output `actual`, host paths normalized away.
    fn normalized(&mut self, golden: &str, actual: &str) -> Result<Comparison> {
        Ok(Comparison::normalized(
            self.input(golden)?,
            self.output(actual)?,
            self.transforms.clone(),
        ))
    }

    /// Redirect both streams to `<stem>.stdout`/`<stem>.stderr`.
    fn logged(&mut self, case: TestCase, stem: &str) -> Result<TestCase> {
        Ok(case
            .stdout(self.output(&format!("{stem}.stdout"))?)
            .stderr(self.output(&format!("{stem}.stderr"))?))
    }

    /// Normalized comparisons of both captured streams against their goldens.
    fn logs_checked(&mut self, case: TestCase, stem: &str) -> Result<TestCase> {
        let stdout = format!("{stem}.stdout");
        let stderr = format!("{stem}.stderr");
        Ok(case
            .compare(self.normalized(&stdout, &stdout)?)
            .compare(self.normalized(&stderr, &stderr)?))
    }
}

/// Every mason case, in declaration order, before platform filtering.
pub fn catalogue(
    session: &mut Session,
    programs: &Programs,
    transforms: &Pipeline,
) -> Result<Vec<TestCase>> {
    let mut b = Builder {
        session,
        transforms: transforms.clone(),
    };
    let mut cases = Vec::new();

    genome_cases(&mut b, programs, &mut cases)?;
    variator_cases(&mut b, programs, &mut cases)?;
    materializer_cases(&mut b, programs, &mut cases)?;
    simulator_cases(&mut b, programs, &mut cases)?;
    Ok(cases)
}

fn genome_cases(b: &mut Builder<'_>, p: &Programs, cases: &mut Vec<TestCase>) -> Result<()> {
    let case = TestCase::new(&p.genome)
        .args(["-l", "1000", "-o"])
        .arg(b.output("genome.test1.fasta")?);
    let case = b
        .logged(case, "genome.test1")?
        .compare(b.exact("genome.test1.fasta", "genome.test1.fasta")?);
    cases.push(b.logs_checked(case, "genome.test1")?);

    let case = TestCase::new(&p.genome)
        .args(["-s", "1", "-l", "1000", "-l", "100", "-o"])
        .arg(b.output("genome.test2.fasta")?);
    let case = b
        .logged(case, "genome.test2")?
        .compare(b.exact("genome.test2.fasta", "genome.test2.fasta")?);
    cases.push(b.logs_checked(case, "genome.test2")?);
    Ok(())
}

const SV_RATES: [&str; 12] = [
    "--snp-rate",
    "0.001",
    "--small-indel-rate",
    "0.001",
    "--sv-indel-rate",
    "0.001",
    "--sv-inversion-rate",
    "0.001",
    "--sv-translocation-rate",
    "0.001",
    "--sv-duplication-rate",
    "0.001",
];

/// Standard variator invocation writing `<stem>.vcf` and `<stem>.fasta`.
fn variator_base(b: &mut Builder<'_>, p: &Programs, stem: &str) -> Result<TestCase> {
    Ok(TestCase::new(&p.variator)
        .arg("-ir")
        .arg(b.input("random.fasta")?)
        .args(["-n", "2", "-ov"])
        .arg(b.output(&format!("{stem}.vcf"))?)
        .arg("-of")
        .arg(b.output(&format!("{stem}.fasta"))?)
        .args(SV_RATES)
        .args(["--min-sv-size", "50", "--max-sv-size", "100"]))
}

fn variator_cases(b: &mut Builder<'_>, p: &Programs, cases: &mut Vec<TestCase>) -> Result<()> {
    // Methylation levels simulated from scratch.
    let case = variator_base(b, p, "random_var1")?
        .arg("--methylation-levels")
        .arg("--meth-fasta-out")
        .arg(b.output("random_var1_meth.fasta")?)
        .arg("--out-breakpoints")
        .arg(b.output("random_var1_bp.txt")?);
    let case = b
        .logged(case, "random_var1.vcf")?
        .compare(b.normalized("random_var1.vcf", "random_var1.vcf")?)
        .compare(b.exact("random_var1.fasta", "random_var1.fasta")?)
        .compare(b.exact("random_var1_bp.txt", "random_var1_bp.txt")?)
        .compare(b.exact("random_var1_meth.fasta", "random_var1_meth.fasta")?)
        .compare(b.normalized("random_var1.vcf.stderr", "random_var1.vcf.stderr")?)
        .compare(b.normalized("random_var1.vcf.stdout", "random_var1.vcf.stdout")?);
    cases.push(case.gated(Gate::RequiresLibstdcxx));

    // Methylation levels read from a fixture.
    let case = variator_base(b, p, "random_var2")?
        .arg("--methylation-levels")
        .arg("--meth-fasta-in")
        .arg(b.input("random_meth1.fasta")?)
        .arg("--meth-fasta-out")
        .arg(b.output("random_var2_meth.fasta")?)
        .arg("--out-breakpoints")
        .arg(b.output("random_var2_bp.txt")?);
    let case = b
        .logged(case, "random_var2.vcf")?
        .compare(b.normalized("random_var2.vcf", "random_var2.vcf")?)
        .compare(b.exact("random_var2.fasta", "random_var2.fasta")?)
        .compare(b.exact("random_var2_bp.txt", "random_var2_bp.txt")?)
        .compare(b.exact("random_var2_meth.fasta", "random_var2_meth.fasta")?)
        .compare(b.normalized("random_var2.vcf.stderr", "random_var2.vcf.stderr")?)
        .compare(b.normalized("random_var2.vcf.stdout", "random_var2.vcf.stdout")?);
    cases.push(case.gated(Gate::RequiresLibstdcxx));

    // No methylation levels.
    let case = variator_base(b, p, "random_var3")?
        .arg("--out-breakpoints")
        .arg(b.output("random_var3_bp.txt")?);
    let case = b
        .logged(case, "random_var3.vcf")?
        .compare(b.normalized("random_var3.vcf", "random_var3.vcf")?)
        .compare(b.exact("random_var3.fasta", "random_var3.fasta")?)
        .compare(b.exact("random_var3_bp.txt", "random_var3_bp.txt")?)
        .compare(b.normalized("random_var3.vcf.stderr", "random_var3.vcf.stderr")?)
        .compare(b.normalized("random_var3.vcf.stdout", "random_var3.vcf.stdout")?);
    cases.push(case.gated(Gate::RequiresLibstdcxx));

    // Structural variants on a small genome; used to crash.
    let case = TestCase::new(&p.variator)
        .arg("-ir")
        .arg(b.input("adeno_virus.fa")?)
        .arg("-ov")
        .arg(b.output("random_var9.vcf")?)
        .arg("-of")
        .arg(b.output("random_var9.fasta")?)
        .args([
            "--sv-indel-rate",
            "0.01",
            "--sv-duplication-rate",
            "0.01",
            "--sv-inversion-rate",
            "0.01",
            "--min-sv-size",
            "20",
            "--max-sv-size",
            "300",
        ]);
    let case = b
        .logged(case, "random_var9.vcf")?
        .compare(b.normalized("random_var9.vcf", "random_var9.vcf")?)
        .compare(b.normalized("random_var9.vcf.stderr", "random_var9.vcf.stderr")?)
        .compare(b.normalized("random_var9.vcf.stdout", "random_var9.vcf.stdout")?);
    cases.push(case.gated(Gate::RequiresLibstdcxx));
    Ok(())
}

fn materializer_cases(b: &mut Builder<'_>, p: &Programs, cases: &mut Vec<TestCase>) -> Result<()> {
    let case = TestCase::new(&p.materializer)
        .arg("-ir")
        .arg(b.input("random.fasta")?)
        .arg("-iv")
        .arg(b.input("random_var1.vcf")?)
        .arg("-o")
        .arg(b.output("materializer.random_var1.fasta")?);
    let case = b
        .logged(case, "materializer.random_var1")?
        .compare(b.exact("random_var1.fasta", "materializer.random_var1.fasta")?);
    cases.push(b.logs_checked(case, "materializer.random_var1")?);

    let case = TestCase::new(&p.materializer)
        .arg("-ir")
        .arg(b.input("random.fasta")?)
        .arg("-iv")
        .arg(b.input("random_var2.vcf")?)
        .arg("-o")
        .arg(b.output("materializer.random_var2.fasta")?)
        .arg("--meth-fasta-in")
        .arg(b.input("random_meth1.fasta")?)
        .arg("--meth-fasta-out")
        .arg(b.output("materializer.random_meth2.fasta")?);
    let case = b
        .logged(case, "materializer.random_var2")?
        .compare(b.exact("random_var2.fasta", "materializer.random_var2.fasta")?)
        .compare(b.normalized("random_var2_meth.fasta", "materializer.random_meth2.fasta")?);
    let case = b.logs_checked(case, "materializer.random_var2")?;
    cases.push(case.gated(Gate::RequiresLibstdcxx));
    Ok(())
}

/// Read simulator outputs: `-o` left reads, `-or` right reads, `-oa` alignments.
struct SimOutputs<'n> {
    left: &'n str,
    right: Option<&'n str>,
    sam: Option<&'n str>,
}

fn simulator_case(
    b: &mut Builder<'_>,
    p: &Programs,
    options: &[&str],
    inputs: &[(&str, &str)],
    outputs: SimOutputs<'_>,
    stem: &str,
) -> Result<TestCase> {
    let mut case = TestCase::new(&p.simulator).args(options);
    for (flag, name) in inputs {
        case = case.arg(flag).arg(b.input(name)?);
    }
    for (flag, value) in [("-o", Some(outputs.left)), ("-or", outputs.right), ("-oa", outputs.sam)] {
        if let Some(name) = value {
            case = case.arg(flag).arg(b.output(name)?);
        }
    }
    let mut case = b.logged(case, stem)?;
    for name in [Some(outputs.left), outputs.right, outputs.sam].into_iter().flatten() {
        case = case.compare(b.exact(name, name)?);
    }
    let case = b.logs_checked(case, stem)?;
    Ok(case.gated(Gate::RequiresLibstdcxx))
}

/// Paired bisulfite reads `simulator.{left,right}<idx>.fq` from methylation levels.
fn bisulfite_case(
    b: &mut Builder<'_>,
    p: &Programs,
    inputs: &[(&str, &str)],
    idx: u32,
) -> Result<TestCase> {
    let left = format!("simulator.left{idx}.fq");
    let right = format!("simulator.right{idx}.fq");
    let stem = format!("simulator.out{idx}");
    let mut case = TestCase::new(&p.simulator).args(["-n", "1000"]);
    for (flag, name) in inputs {
        case = case.arg(flag).arg(b.input(name)?);
    }
    let case = case
        .args(["--methylation-levels", "--enable-bs-seq"])
        .arg("-o")
        .arg(b.output(&left)?)
        .arg("-or")
        .arg(b.output(&right)?);
    let case = b
        .logged(case, &stem)?
        .compare(b.exact(&left, &left)?)
        .compare(b.exact(&right, &right)?);
    Ok(b.logs_checked(case, &stem)?.gated(Gate::RequiresLibstdcxx))
}

fn simulator_cases(b: &mut Builder<'_>, p: &Programs, cases: &mut Vec<TestCase>) -> Result<()> {
    let reference = ("-ir", "random.fasta");
    let variants = ("-iv", "random_var1.vcf");
    let methylation = ("--meth-fasta-in", "random_meth1.fasta");
    let n = ["-n", "1000"];

    // Illumina model.
    cases.push(simulator_case(
        b,
        p,
        &n,
        &[reference],
        SimOutputs {
            left: "simulator.left1.fq",
            right: Some("simulator.right1.fq"),
            sam: Some("simulator.out1.sam"),
        },
        "simulator.out1",
    )?);
    cases.push(simulator_case(
        b,
        p,
        &n,
        &[reference, variants],
        SimOutputs {
            left: "simulator.left2.fq",
            right: Some("simulator.right2.fq"),
            sam: Some("simulator.out2.sam"),
        },
        "simulator.out2",
    )?);
    cases.push(simulator_case(
        b,
        p,
        &n,
        &[reference],
        SimOutputs {
            left: "simulator.left3.fa",
            right: Some("simulator.right3.fa"),
            sam: None,
        },
        "simulator.out3",
    )?);
    cases.push(simulator_case(
        b,
        p,
        &n,
        &[reference, variants],
        SimOutputs {
            left: "simulator.left7.fa",
            right: None,
            sam: Some("simulator.out7.sam"),
        },
        "simulator.out7",
    )?);
    cases.push(simulator_case(
        b,
        p,
        &n,
        &[reference],
        SimOutputs {
            left: "simulator.left4.fa",
            right: None,
            sam: Some("simulator.out4.sam"),
        },
        "simulator.out4",
    )?);

    // Bisulfite sequencing, with and without variants.
    cases.push(bisulfite_case(b, p, &[reference, methylation], 5)?);
    cases.push(bisulfite_case(b, p, &[reference, variants, methylation], 6)?);

    // 454 model.
    cases.push(simulator_case(
        b,
        p,
        &[
            "--seq-technology",
            "454",
            "--fragment-mean-size",
            "800",
            "--454-read-length-mean",
            "200",
            "--454-read-length-stddev",
            "20",
            "-n",
            "1000",
            "-v",
        ],
        &[reference],
        SimOutputs {
            left: "simulator.left8.fq",
            right: None,
            sam: Some("simulator.out8.sam"),
        },
        "simulator.out8",
    )?);
    Ok(())
}

/// Run the whole suite and print its report to `out`.
///
/// Setup failures (missing binary, uncreatable temporary directory) are
/// returned before anything runs. Once cases start, the temporary directory
/// is cleaned up exactly once whatever happens to individual cases.
pub fn run<W: Write>(config: &RunConfig, out: W) -> Result<Summary> {
    let mut session = Session::new(&config.source_root, &config.binary_root)?;
    if let Some(parent) = &config.temp_parent {
        session = session.with_temp_parent(parent);
    }
    let programs = Programs::locate(session.binary_root())?;
    let transforms = host_transforms(&mut session)?;
    let all = catalogue(&mut session, &programs, &transforms)?;
    let cases = select(all, &config.platform, config.filter.as_deref());
    tracing::debug!(
        total = cases.len(),
        libstdcxx = config.platform.libstdcxx,
        "selected cases"
    );

    let mut reporter = Reporter::new(out);
    let result = reporter
        .banner(BANNER)
        .and_then(|()| reporter.run_all(&cases));

    let kept = if config.keep_temp {
        session.keep_temp_dir()
    } else {
        if let Err(err) = session.delete_temp_dir() {
            tracing::warn!(error = %err, "failed to remove temporary directory");
        }
        None
    };

    let summary = result?;
    if let Some(dir) = kept {
        reporter.note(&format!("outputs kept in {}", dir.display()))?;
    }
    reporter.summary(&summary)?;
    Ok(summary)
}
