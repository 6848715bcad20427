use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::error::SetupError;

/// Multi-config build trees put executables one level below the usual
/// output directory.
const BUILD_CONFIGS: [&str; 4] = ["Debug", "Release", "RelWithDebInfo", "MinSizeRel"];

/// Directories searched for an executable, highest priority first.
pub fn candidate_dirs(root: &Path, subdir: &str) -> Vec<PathBuf> {
    let mut dirs = vec![root.join(subdir)];
    dirs.extend(BUILD_CONFIGS.iter().map(|config| root.join(subdir).join(config)));
    dirs.extend(BUILD_CONFIGS.iter().map(|config| root.join(config).join(subdir)));
    dirs.push(root.to_path_buf());
    dirs
}

/// Find the executable `name` under `root`.
///
/// Each candidate directory is probed with the platform's executable
/// suffixes; a file that exists but is not executable does not count.
pub fn locate(root: &Path, subdir: &str, name: &str) -> Result<PathBuf> {
    let dirs = candidate_dirs(root, subdir);
    for dir in &dirs {
        if !dir.is_dir() {
            continue;
        }
        if let Ok(found) = which::which_in(name, Some(dir.as_os_str()), root) {
            tracing::debug!(binary = name, path = %found.display(), "located binary");
            return Ok(found);
        }
    }
    Err(SetupError::BinaryNotFound {
        name: name.to_string(),
        root: root.to_path_buf(),
        searched: dirs,
    }
    .into())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn install(path: &Path, mode: u32) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"#!/bin/sh\nexit 0\n").unwrap();
        fs::set_permissions(path, fs::Permissions::from_mode(mode)).unwrap();
    }

    #[test]
    fn finds_binary_in_plain_subdir() {
        let root = TempDir::new().unwrap();
        install(&root.path().join("bin/mason_genome"), 0o755);
        let found = locate(root.path(), "bin", "mason_genome").unwrap();
        assert!(found.ends_with("bin/mason_genome"));
    }

    #[test]
    fn plain_subdir_wins_over_build_config() {
        let root = TempDir::new().unwrap();
        install(&root.path().join("bin/Release/mason_variator"), 0o755);
        install(&root.path().join("bin/mason_variator"), 0o755);
        let found = locate(root.path(), "bin", "mason_variator").unwrap();
        assert!(found.ends_with("bin/mason_variator"));
        assert!(!found.to_string_lossy().contains("Release"));
    }

    #[test]
    fn falls_back_to_build_config_layouts() {
        let root = TempDir::new().unwrap();
        install(&root.path().join("Debug/bin/mason_simulator"), 0o755);
        let found = locate(root.path(), "bin", "mason_simulator").unwrap();
        assert!(found.ends_with("Debug/bin/mason_simulator"));

        install(&root.path().join("bin/RelWithDebInfo/mason_materializer"), 0o755);
        let found = locate(root.path(), "bin", "mason_materializer").unwrap();
        assert!(found.ends_with("bin/RelWithDebInfo/mason_materializer"));
    }

    #[test]
    fn skips_non_executable_candidates() {
        let root = TempDir::new().unwrap();
        install(&root.path().join("bin/mason_methylation"), 0o644);
        install(&root.path().join("bin/Release/mason_methylation"), 0o755);
        let found = locate(root.path(), "bin", "mason_methylation").unwrap();
        assert!(found.ends_with("bin/Release/mason_methylation"));
    }

    #[test]
    fn missing_binary_is_setup_error() {
        let root = TempDir::new().unwrap();
        let err = locate(root.path(), "bin", "mason_genome").unwrap_err();
        match err.downcast_ref::<SetupError>() {
            Some(SetupError::BinaryNotFound { name, searched, .. }) => {
                assert_eq!(name, "mason_genome");
                assert_eq!(searched, &candidate_dirs(root.path(), "bin"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn candidate_order_is_fixed() {
        let dirs = candidate_dirs(Path::new("/build"), "bin");
        assert_eq!(dirs.first().unwrap(), Path::new("/build/bin"));
        assert_eq!(dirs[1], Path::new("/build/bin/Debug"));
        assert_eq!(dirs[5], Path::new("/build/Debug/bin"));
        assert_eq!(dirs.last().unwrap(), Path::new("/build"));
        assert_eq!(dirs.len(), 10);
    }
}
