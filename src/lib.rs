//! Golden-output regression harness for the mason read/variant simulation tools.
//!
//! The engine is generic: a [`Session`] resolves fixture and output paths,
//! [`locate`] finds executables, [`TestCase`]s describe one invocation each,
//! [`run_case`] executes them and [`compare`] checks every declared output
//! against its golden file after a [`Pipeline`] of [`Transform`]s. The mason
//! catalogue itself lives in [`suite`].

pub mod case;
pub mod compare;
pub mod error;
pub mod locate;
pub mod paths;
pub mod platform;
pub mod report;
pub mod runner;
pub mod suite;
pub mod transform;

pub use case::{Comparison, TestCase};
pub use compare::{compare, ComparisonResult};
pub use error::SetupError;
pub use locate::locate;
pub use paths::Session;
pub use platform::{Gate, Platform};
pub use report::{Reporter, Summary};
pub use runner::{run_case, CaseOutcome};
pub use transform::{Pipeline, Transform};
