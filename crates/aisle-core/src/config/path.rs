//! Configuration path types and the shared `-c` / `-C` command-line flags.

use std::path::{Path, PathBuf};

use clap::Args;

/// A configuration source - either a single file or a directory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigPath {
    /// A single configuration file.
    File(PathBuf),
    /// A directory containing configuration files.
    Dir(PathBuf),
}

impl ConfigPath {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    pub fn dir(path: impl Into<PathBuf>) -> Self {
        Self::Dir(path.into())
    }
}

/// Check if a path has a YAML extension.
pub fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext == "yaml" || ext == "yml")
}

/// Config source flags, flattened into the binary's argument parser.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Path to configuration file (can be specified multiple times)
    #[arg(short, long)]
    pub config: Vec<PathBuf>,

    /// Path to configuration directory (can be specified multiple times)
    #[arg(short = 'C', long = "config-dir")]
    pub config_dirs: Vec<PathBuf>,
}

impl ConfigArgs {
    /// Files first, then directories, preserving order within each group.
    pub fn config_paths(&self) -> Vec<ConfigPath> {
        self.config
            .iter()
            .map(ConfigPath::file)
            .chain(self.config_dirs.iter().map(ConfigPath::dir))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_yaml_file() {
        assert!(is_yaml_file(Path::new("datasets.yaml")));
        assert!(is_yaml_file(Path::new("store.yml")));
        assert!(!is_yaml_file(Path::new("store.toml")));
        assert!(!is_yaml_file(Path::new("yaml")));
    }

    #[test]
    fn test_files_precede_directories() {
        let args = ConfigArgs {
            config: vec!["a.yaml".into(), "b.yaml".into()],
            config_dirs: vec!["conf.d".into()],
        };
        assert_eq!(
            args.config_paths(),
            vec![
                ConfigPath::file("a.yaml"),
                ConfigPath::file("b.yaml"),
                ConfigPath::dir("conf.d"),
            ]
        );
    }
}
