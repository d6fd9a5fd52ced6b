//! `reelchat-config`: reelchat runtime configuration management.
//!
//! Provides:
//! - Typed config schema (sampling, video, model, generation, logging, server)
//! - YAML read/write with backup rotation
//! - `${ENV_VAR}` substitution
//! - Config redaction for safe logging/display
//! - Default value application and validation

pub mod defaults;
pub mod env;
pub mod io;
pub mod redact;
pub mod schema;
pub mod validation;

pub use defaults::apply_all_defaults;
pub use env::{
    collect_referenced_vars, contains_env_var_reference, resolve_env_vars, resolve_env_vars_with,
    MissingEnvVarError,
};
pub use io::{apply_merge_patch, config_dir, config_file_path, load_config, write_config};
pub use redact::{collect_redacted_paths, redact};
pub use schema::{
    GenerationSection, LoggingConfig, ModelSection, ReelChatConfig, SamplingSection,
    ServerConfig, VideoSection,
};
pub use validation::{validate, ConfigValidationError, ValidationReport};

use anyhow::{Context, Result};
use reelchat_core::ReelError;
use serde_json::Value;
use std::path::Path;

/// Load a config file, substitute env vars, apply `overrides` as a merge
/// patch, fill defaults and validate.
///
/// Validation warnings are logged; any validation error fails the load.
pub async fn load_and_prepare(path: &Path, overrides: Option<&Value>) -> Result<ReelChatConfig> {
    let raw_config = load_config(path).await?;
    let value: Value =
        serde_json::to_value(&raw_config).context("Failed to serialize config for processing")?;
    let value = resolve_env_vars(&value).context("Failed to resolve env vars in config")?;
    let config: ReelChatConfig =
        serde_json::from_value(value).context("Failed to deserialize config after processing")?;
    prepare(config, overrides)
}

/// Apply overrides, defaults and validation to an already parsed config.
pub fn prepare(config: ReelChatConfig, overrides: Option<&Value>) -> Result<ReelChatConfig> {
    let config = match overrides {
        Some(patch) => apply_merge_patch(&config, patch)?,
        None => config,
    };
    let config = apply_all_defaults(config);

    let report = validate(&config);
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    for error in &report.errors {
        tracing::error!(path = %error.path, message = %error.message, "Config error");
    }
    if !report.is_valid() {
        let joined = report
            .errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(ReelError::Config(joined).into());
    }
    Ok(config)
}
