//! Access token loading.

use std::fmt;
use std::path::Path;

use crate::config::AuthConfig;
use crate::errors::{PinCreatorError, Result};

/// Bearer token for the Pinterest API. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wraps a raw token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token for the `Authorization` header.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Loads the token from the configured file, falling back to the configured
/// environment variable.
pub fn load_access_token(config: &AuthConfig) -> Result<AccessToken> {
    load_access_token_with(config, |name| std::env::var(name).ok())
}

/// Same as [`load_access_token`] with an explicit environment lookup.
pub fn load_access_token_with<F>(config: &AuthConfig, env: F) -> Result<AccessToken>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(token) = read_token_file(&config.access_token_path)? {
        return Ok(token);
    }

    env(&config.access_token_env)
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
        .map(AccessToken)
        .ok_or_else(|| {
            PinCreatorError::Config(format!(
                "no access token: {} is missing or empty and ${} is not set",
                config.access_token_path.display(),
                config.access_token_env
            ))
        })
}

fn read_token_file(path: &Path) -> Result<Option<AccessToken>> {
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            let token = contents.trim();
            Ok((!token.is_empty()).then(|| AccessToken(token.to_string())))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(PinCreatorError::Config(format!(
            "cannot read access token from {}: {e}",
            path.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use std::io::Write;

    fn config(path: &Path) -> AuthConfig {
        AuthConfig {
            access_token_path: path.to_path_buf(),
            access_token_env: "PIN_TOKEN_TEST".into(),
        }
    }

    #[test]
    fn test_reads_and_trims_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "  pina_abc123  ").expect("write");

        let token = load_access_token_with(&config(file.path()), |_| None).expect("token");
        assert_eq!(token.expose(), "pina_abc123");
    }

    #[test]
    fn test_falls_back_to_env() {
        let dir = tempfile::tempdir().expect("temp dir");
        let missing = dir.path().join("access_token.txt");

        let token = load_access_token_with(&config(&missing), |name| {
            (name == "PIN_TOKEN_TEST").then(|| "from-env".to_string())
        })
        .expect("token");
        assert_eq!(token.expose(), "from-env");
    }

    #[test]
    fn test_empty_file_falls_back_to_env() {
        let file = tempfile::NamedTempFile::new().expect("temp file");
        let token =
            load_access_token_with(&config(file.path()), |_| Some("env".into())).expect("token");
        assert_eq!(token.expose(), "env");
    }

    #[test]
    fn test_missing_everywhere_is_config_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = load_access_token_with(&config(&dir.path().join("nope")), |_| None)
            .expect_err("no token");
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_debug_is_redacted() {
        let token = AccessToken::new("pina_secret");
        assert!(!format!("{token:?}").contains("pina_secret"));
    }
}
