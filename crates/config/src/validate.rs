//! Semantic validation of a loaded configuration.

use std::path::{Component, Path};

use crate::schema::ToolbayConfig;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "content.scheme"
    pub path: String,
    pub message: String,
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    fn push(&mut self, severity: Severity, path: &str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity,
            path: path.to_string(),
            message: message.into(),
        });
    }
}

/// Schemes the platform already owns; a tool scheme must not shadow them.
const RESERVED_SCHEMES: &[&str] = &[
    "http",
    "https",
    "file",
    "data",
    "blob",
    "about",
    "javascript",
    "ws",
    "wss",
];

/// Validate a configuration, collecting every problem rather than stopping
/// at the first.
#[must_use]
pub fn validate(config: &ToolbayConfig) -> ValidationResult {
    let mut result = ValidationResult::default();

    let scheme = config.content.scheme.as_str();
    if scheme.is_empty() {
        result.push(Severity::Error, "content.scheme", "scheme must not be empty");
    } else if !is_valid_scheme(scheme) {
        result.push(
            Severity::Error,
            "content.scheme",
            format!("'{scheme}' is not a valid URL scheme"),
        );
    } else if RESERVED_SCHEMES.contains(&scheme) {
        result.push(
            Severity::Error,
            "content.scheme",
            format!("'{scheme}' is reserved by the platform"),
        );
    }

    if !is_plain_relative(&config.content.default_document) {
        result.push(
            Severity::Error,
            "content.default_document",
            "must be a relative path without '..' segments",
        );
    }
    if !is_plain_relative(&config.content.asset_dir) {
        result.push(
            Severity::Error,
            "content.asset_dir",
            "must be a relative path without '..' segments",
        );
    }

    let geometry = &config.geometry;
    if geometry.response_timeout_ms == 0 {
        result.push(
            Severity::Error,
            "geometry.response_timeout_ms",
            "timeout must be greater than zero",
        );
    }
    if geometry.frame_interval_ms == 0 {
        result.push(
            Severity::Warning,
            "geometry.frame_interval_ms",
            "a zero interval disables resize coalescing",
        );
    }
    if geometry.frame_interval_ms >= geometry.response_timeout_ms && geometry.response_timeout_ms > 0
    {
        result.push(
            Severity::Warning,
            "geometry.frame_interval_ms",
            "frame interval is not shorter than the response timeout",
        );
    }

    for (i, path) in config.tools.local_paths.iter().enumerate() {
        if !path.is_dir() {
            result.push(
                Severity::Warning,
                &format!("tools.local_paths[{i}]"),
                format!("{} is not a directory", path.display()),
            );
        }
    }
    for (key, dir) in [
        ("tools.packages_dir", &config.tools.packages_dir),
        ("tools.registry_dir", &config.tools.registry_dir),
    ] {
        if let Some(dir) = dir
            && !dir.is_dir()
        {
            result.push(
                Severity::Warning,
                key,
                format!("{} is not a directory", dir.display()),
            );
        }
    }

    result
}

fn is_valid_scheme(scheme: &str) -> bool {
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '+' | '-' | '.'))
}

fn is_plain_relative(value: &str) -> bool {
    !value.is_empty()
        && Path::new(value)
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
