//! Environment variable interpolation for config files.
//!
//! - `$VAR` or `${VAR}`: substitute, error if unset
//! - `${VAR:-default}`: default when VAR is unset or empty
//! - `${VAR-default}`: default only when VAR is unset
//! - `$$`: literal `$`

use std::env;
use std::sync::LazyLock;

use regex::{Captures, Regex};

static ENV_VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        \$\$
        |
        \$\{ ([A-Za-z_][A-Za-z0-9_]*) (?: (:?-) ([^}]*) )? \}
        |
        \$([A-Za-z_][A-Za-z0-9_]*)
        ",
    )
    .expect("static interpolation pattern is valid")
});

/// Interpolate process environment variables into `input`.
///
/// All failures are collected so a user sees every missing variable at once.
pub fn interpolate(input: &str) -> Result<String, Vec<String>> {
    interpolate_with(input, |name| env::var(name).ok())
}

/// Interpolate using an arbitrary variable lookup.
pub(crate) fn interpolate_with<F>(input: &str, lookup: F) -> Result<String, Vec<String>>
where
    F: Fn(&str) -> Option<String>,
{
    let mut errors = Vec::new();

    let text = ENV_VAR_PATTERN.replace_all(input, |caps: &Captures| {
        let whole = &caps[0];
        if whole == "$$" {
            return "$".to_string();
        }

        let name = caps
            .get(1)
            .or_else(|| caps.get(4))
            .map_or("", |m| m.as_str());
        let operator = caps.get(2).map(|m| m.as_str());
        let fallback = caps.get(3).map(|m| m.as_str());

        match (lookup(name), fallback) {
            (Some(value), _) if value.contains(['\n', '\r']) => {
                errors.push(format!(
                    "environment variable '{name}' contains newlines, which is not allowed"
                ));
                whole.to_string()
            }
            (Some(value), Some(fallback)) if value.is_empty() && operator == Some(":-") => {
                fallback.to_string()
            }
            (Some(value), _) => value,
            (None, Some(fallback)) => fallback.to_string(),
            (None, None) => {
                errors.push(format!("environment variable '{name}' is not set"));
                whole.to_string()
            }
        }
    });

    if errors.is_empty() {
        Ok(text.into_owned())
    } else {
        Err(errors)
    }
}
