use crate::case::TestCase;

/// Host facts that decide which platform-sensitive cases are attempted.
///
/// Several golden outputs were produced with libstdc++ and depend on its
/// random number distributions, so they only reproduce on that family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    pub libstdcxx: bool,
}

impl Platform {
    pub fn detect() -> Self {
        let cc = std::env::var("CC").ok();
        Self::from_parts(cc.as_deref(), cfg!(target_os = "linux"))
    }

    /// libstdc++ is assumed when `CC` names gcc or the host is Linux.
    pub fn from_parts(cc: Option<&str>, linux: bool) -> Self {
        let gcc = cc.is_some_and(|cc| cc.contains("gcc"));
        Self {
            libstdcxx: gcc || linux,
        }
    }
}

/// Platform requirement attached to a case.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Gate {
    #[default]
    Always,
    RequiresLibstdcxx,
}

impl Gate {
    pub fn admits(self, platform: &Platform) -> bool {
        match self {
            Gate::Always => true,
            Gate::RequiresLibstdcxx => platform.libstdcxx,
        }
    }
}

/// Select the cases to attempt. Runs before anything executes so the
/// reported total matches what was actually run.
pub fn select(cases: Vec<TestCase>, platform: &Platform, filter: Option<&str>) -> Vec<TestCase> {
    cases
        .into_iter()
        .filter(|case| case.gate().admits(platform))
        .filter(|case| filter.is_none_or(|needle| case.command_line().contains(needle)))
        .collect()
}
