//! Settings loading from disk.

use std::path::Path;

use thiserror::Error;

use crate::settings::schema::EngineSettings;
use crate::settings::validation::{validate_settings, SettingsValidationError};

/// Error type for settings loading.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation failed: {}", format_errors(.0))]
    Validation(Vec<SettingsValidationError>),
}

fn format_errors(errors: &[SettingsValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate engine settings from a TOML file.
pub fn load_settings(path: &Path) -> Result<EngineSettings, SettingsError> {
    let content = std::fs::read_to_string(path)?;
    let settings: EngineSettings = toml::from_str(&content)?;

    validate_settings(&settings).map_err(SettingsError::Validation)?;

    Ok(settings)
}
