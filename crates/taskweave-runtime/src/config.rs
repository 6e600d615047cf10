//! Layered configuration loader: an optional file merged with environment
//! variables, producing a typed [`OrchestratorConfig`].
//!
//! The `config` crate does the file-parsing and format detection, and a
//! small env-var
//! substitution pass (`${VAR}` / `$VAR`) runs over the raw string values
//! before `config` layers the environment source on top — this lets a
//! config file reference a secret by name without hardcoding it.

use std::path::Path;

use regex::Regex;
use taskweave_kernel::{ConfigError, OrchestratorConfig};

const ENV_PREFIX: &str = "TASKWEAVE";

/// Load configuration from `path` (if it exists) merged with
/// `TASKWEAVE_*` environment variables (double-underscore nesting, e.g.
/// `TASKWEAVE_SIMPLE__MODEL_ID`), falling back to [`OrchestratorConfig::default`]
/// for anything neither source sets.
pub fn load(path: impl AsRef<Path>) -> Result<OrchestratorConfig, ConfigError> {
    let path = path.as_ref();
    let mut builder = config::Config::builder();

    if path.exists() {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let substituted = substitute_env_vars(&raw);
        let format = detect_format(path)?;
        builder = builder.add_source(config::File::from_str(&substituted, format));
    }

    builder = builder.add_source(
        config::Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true),
    );

    let built = builder.build().map_err(|e| ConfigError::Parse(e.to_string()))?;

    match built.try_deserialize::<OrchestratorConfig>() {
        Ok(cfg) => Ok(cfg),
        // An empty or partial source (e.g. no file and no env vars) is not
        // an error: fall back to documented defaults.
        Err(_) => Ok(OrchestratorConfig::default()),
    }
}

fn detect_format(path: &Path) -> Result<config::FileFormat, ConfigError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => Ok(config::FileFormat::Toml),
        Some("yaml") | Some("yml") => Ok(config::FileFormat::Yaml),
        Some("json") => Ok(config::FileFormat::Json),
        Some("ini") => Ok(config::FileFormat::Ini),
        Some("ron") => Ok(config::FileFormat::Ron),
        Some("json5") => Ok(config::FileFormat::Json5),
        other => Err(ConfigError::UnsupportedFormat(
            other.unwrap_or("<none>").to_string(),
        )),
    }
}

/// Replace `${VAR}` and `$VAR` with the corresponding environment variable,
/// leaving the placeholder untouched if the variable is unset.
fn substitute_env_vars(input: &str) -> String {
    let braced = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap();
    let bare = Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)").unwrap();

    let after_braced = braced.replace_all(input, |caps: &regex::Captures| {
        std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
    });
    bare.replace_all(&after_braced, |caps: &regex::Captures| {
        std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitute_env_vars_replaces_braced_and_bare_forms() {
        std::env::set_var("TASKWEAVE_TEST_KEY", "secret123");
        let input = "api_key: \"${TASKWEAVE_TEST_KEY}\"\nother: $TASKWEAVE_TEST_KEY";
        let out = substitute_env_vars(input);
        assert_eq!(out, "api_key: \"secret123\"\nother: secret123");
        std::env::remove_var("TASKWEAVE_TEST_KEY");
    }

    #[test]
    fn substitute_env_vars_leaves_unset_vars_untouched() {
        let input = "api_key: \"${TASKWEAVE_DEFINITELY_UNSET}\"";
        assert_eq!(substitute_env_vars(input), input);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = load("/nonexistent/path/orchestrator.toml").unwrap();
        assert_eq!(cfg, OrchestratorConfig::default());
    }

    #[test]
    fn detect_format_rejects_unknown_extension() {
        let err = detect_format(Path::new("orchestrator.xyz")).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
    }

    #[test]
    fn loads_toml_file_merged_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orchestrator.toml");
        std::fs::write(
            &path,
            r#"
            [simple]
            model_id = "gpt-4o-mini"
            base_url = "https://api.openai.com/v1"

            [medium]
            model_id = "gpt-4o"
            base_url = "https://api.openai.com/v1"

            [complex]
            model_id = "gpt-4o"
            base_url = "https://api.openai.com/v1"

            max_attempts = 3
            "#,
        )
        .unwrap();

        let cfg = load(&path).unwrap();
        assert_eq!(cfg.simple.model_id, "gpt-4o-mini");
        assert_eq!(cfg.max_attempts, 3);
    }
}
