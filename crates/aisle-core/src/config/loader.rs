//! Multi-file configuration loading.

use std::fmt::Display;
use std::hash::Hash;
use std::path::Path;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use snafu::ResultExt;

use crate::config::{ConfigPath, interpolate, is_yaml_file};
use crate::error::{ConfigError, ReadDirSnafu, ReadFileSnafu, YamlParseSnafu};

/// Trait for configs that can be assembled from several files.
///
/// Keyed components (e.g. datasets) must be unique across all files;
/// every other section is merged last-write-wins by `merge_settings`.
pub trait Mergeable: Sized + Default + DeserializeOwned {
    type Key: Eq + Hash + Clone + Display;
    type Component;

    fn components_mut(&mut self) -> &mut IndexMap<Self::Key, Self::Component>;

    /// Merge the non-component sections of `other` into `self`.
    fn merge_settings(&mut self, other: Self);

    fn parse_yaml(contents: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(contents).context(YamlParseSnafu)
    }

    fn merge(&mut self, mut other: Self) -> Result<(), ConfigError> {
        let duplicates: Vec<String> = other
            .components_mut()
            .keys()
            .filter(|key| self.components_mut().contains_key(*key))
            .map(ToString::to_string)
            .collect();

        if !duplicates.is_empty() {
            return Err(ConfigError::DuplicateComponents { keys: duplicates });
        }

        for (key, component) in other.components_mut().drain(..) {
            self.components_mut().insert(key, component);
        }
        self.merge_settings(other);
        Ok(())
    }
}

/// Load and merge configuration from files and directories, in order.
///
/// Errors from every source are collected before failing.
pub fn load_from_paths<C: Mergeable>(paths: &[ConfigPath]) -> Result<C, ConfigError> {
    let mut config = C::default();
    let mut errors = Vec::new();

    for path in paths {
        let (display, loaded) = match path {
            ConfigPath::File(file) => (file.display(), load_file::<C>(file)),
            ConfigPath::Dir(dir) => (dir.display(), load_dir::<C>(dir)),
        };
        match loaded.and_then(|partial| config.merge(partial)) {
            Ok(()) => {}
            Err(e) => errors.push(format!("{display}: {e}")),
        }
    }

    if !errors.is_empty() {
        return Err(ConfigError::MultipleErrors { errors });
    }
    Ok(config)
}

fn load_file<C: Mergeable>(path: &Path) -> Result<C, ConfigError> {
    if !is_yaml_file(path) {
        return Err(ConfigError::UnsupportedFormat {
            path: path.to_path_buf(),
        });
    }

    let contents = std::fs::read_to_string(path).context(ReadFileSnafu { path })?;
    let text = interpolate(&contents).map_err(|errors| ConfigError::EnvInterpolation {
        message: errors.join("\n"),
    })?;

    C::parse_yaml(&text)
}

fn load_dir<C: Mergeable>(dir: &Path) -> Result<C, ConfigError> {
    let mut files: Vec<_> = std::fs::read_dir(dir)
        .context(ReadDirSnafu { path: dir })?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && is_yaml_file(path))
        .collect();
    files.sort();

    let mut config = C::default();
    let mut errors = Vec::new();
    for path in files {
        if let Err(e) = load_file::<C>(&path).and_then(|partial| config.merge(partial)) {
            errors.push(format!("{}: {}", path.display(), e));
        }
    }

    if !errors.is_empty() {
        return Err(ConfigError::MultipleErrors { errors });
    }
    Ok(config)
}
