//! Save payload export.

use std::path::Path;

use tracing::info;

use reception_engine::{
    EngineConfig, build_save_payload, validation::validate_for_save, wire_to_domain,
};

use super::{CliError, emit, read_response};

/// Print the payload a save of this reception would send.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or the reception is
/// missing required fields.
pub async fn export(path: &Path, config: &EngineConfig) -> Result<(), CliError> {
    let response = read_response(path).await?;
    let loaded = wire_to_domain(&response, config);
    validate_for_save(&loaded.reception).map_err(reception_engine::ReceptionError::from)?;
    let payload = build_save_payload(&loaded.reception, &loaded.snapshot)
        .map_err(reception_engine::ReceptionError::from)?;
    info!(mode = %payload.mode(), "Exported save payload");
    emit(&serde_json::to_string_pretty(&payload)?);
    Ok(())
}
