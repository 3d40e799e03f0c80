//! Commands comparing two states of a reception.

use std::path::Path;

use tracing::{info, warn};

use reception_engine::{
    ConstraintValidator, EditPermission, EngineConfig, LoadedReception, ReceptionError,
    canonicalize, validation::validate_for_save, wire_to_domain,
};

use super::{CliError, emit, read_response};

/// Report whether two receptions have the same canonical form.
///
/// # Errors
///
/// Returns an error if either file cannot be read or parsed.
pub async fn diff(a: &Path, b: &Path, config: &EngineConfig) -> Result<(), CliError> {
    let left = wire_to_domain(&read_response(a).await?, config).reception;
    let right = wire_to_domain(&read_response(b).await?, config).reception;
    let (left, right) = (canonicalize(&left), canonicalize(&right));

    if left == right {
        emit("identical");
    } else {
        emit("differs");
        emit(&format!("- {left}"));
        emit(&format!("+ {right}"));
    }
    Ok(())
}

/// Check a proposed reception against the reception it was loaded from.
///
/// # Errors
///
/// Returns the first violation, or an error if either file cannot be read or
/// parsed.
pub async fn validate(
    original: &Path,
    proposed: &Path,
    config: &EngineConfig,
) -> Result<(), CliError> {
    let original = wire_to_domain(&read_response(original).await?, config);
    let proposed = wire_to_domain(&read_response(proposed).await?, config);
    check(&original, &proposed, config)?;
    info!("Proposed reception is valid");
    emit("ok");
    Ok(())
}

fn check(
    original: &LoadedReception,
    proposed: &LoadedReception,
    config: &EngineConfig,
) -> Result<(), ReceptionError> {
    if let EditPermission::Blocked { reason } = &original.permission {
        return Err(ReceptionError::EditingBlocked {
            reason: reason.clone(),
        });
    }
    if original.reception.mode() != proposed.reception.mode() {
        return Err(ReceptionError::WrongMode {
            expected: original.reception.mode(),
        });
    }
    if let Some(pallets) = proposed.reception.pallets() {
        let validator = ConstraintValidator::new(&original.snapshot, config.weight_tolerance);
        if let Err(violation) = validator.validate(pallets) {
            warn!(error = %violation, "Proposed reception violates partial-edit rules");
            return Err(violation.into());
        }
    }
    validate_for_save(&proposed.reception)?;
    Ok(())
}
