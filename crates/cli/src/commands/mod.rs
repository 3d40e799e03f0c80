//! CLI command implementations.

use std::path::Path;

use thiserror::Error;
use tracing::debug;

use reception_engine::{ConfigError, ReceptionError, ReceptionResponse};

pub mod compare;
pub mod export;
pub mod inspect;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An input file could not be read.
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// An input file is not a reception load response.
    #[error("Invalid reception JSON in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// The reception failed a consistency check.
    #[error(transparent)]
    Reception(#[from] ReceptionError),

    /// Output could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Read and parse a load response.
pub async fn read_response(path: &Path) -> Result<ReceptionResponse, CliError> {
    let shown = path.display().to_string();
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CliError::Read {
            path: shown.clone(),
            source,
        })?;
    let response = serde_json::from_str(&content).map_err(|source| CliError::Parse {
        path: shown.clone(),
        source,
    })?;
    debug!(path = %shown, "Parsed load response");
    Ok(response)
}

/// Write command output.
#[allow(clippy::print_stdout)]
pub fn emit(output: &str) {
    println!("{output}");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use reception_core::ReceptionId;

    use super::*;

    const RESPONSE: &str = r#"{ "id": 4, "supplier": { "id": 3 }, "pallets": [] }"#;

    #[tokio::test]
    async fn test_read_response_parses_file() {
        let name = format!("rx-cli-{}.json", std::process::id());
        let path = std::env::temp_dir().join(name);
        tokio::fs::write(&path, RESPONSE).await.unwrap();

        let response = read_response(&path).await.unwrap();
        tokio::fs::remove_file(&path).await.unwrap();
        assert_eq!(response.id, Some(ReceptionId::new(4)));
    }

    #[tokio::test]
    async fn test_read_response_reports_missing_path() {
        let err = read_response(Path::new("/nonexistent/reception.json"))
            .await
            .unwrap_err();
        let CliError::Read { path, .. } = &err else {
            panic!("expected read error, got {err}");
        };
        assert_eq!(path, "/nonexistent/reception.json");
    }
}
