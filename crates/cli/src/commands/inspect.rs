//! Read-only views of a single reception.

use std::path::Path;

use serde::Serialize;
use tracing::info;

use reception_core::LotKey;
use reception_engine::{
    EditPermission, EngineConfig, ReceptionMode, ReceptionSummary, canonicalize, wire_to_domain,
};

use super::{CliError, emit, read_response};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PriceLine {
    key: LotKey,
    label: String,
    price_per_kg: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Inspection {
    mode: ReceptionMode,
    permission: String,
    has_used_boxes: bool,
    prices: Vec<PriceLine>,
    summary: ReceptionSummary,
}

fn describe(permission: &EditPermission) -> String {
    match permission {
        EditPermission::Full => "full".to_owned(),
        EditPermission::Partial => "partial".to_owned(),
        EditPermission::Blocked { reason } => format!("blocked: {reason}"),
    }
}

/// Print mode, permission, prices and totals as JSON.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub async fn inspect(path: &Path, config: &EngineConfig) -> Result<(), CliError> {
    let response = read_response(path).await?;
    let loaded = wire_to_domain(&response, config);

    let prices = loaded
        .prices
        .to_entries()
        .into_iter()
        .map(|entry| PriceLine {
            label: entry.key.to_string(),
            price_per_kg: reception_core::canonical_decimal(entry.price_per_kg),
            key: entry.key,
        })
        .collect();

    let inspection = Inspection {
        mode: loaded.reception.mode(),
        permission: describe(&loaded.permission),
        has_used_boxes: loaded.snapshot.has_used_boxes,
        prices,
        summary: ReceptionSummary::compute(&loaded.reception, &loaded.prices),
    };
    info!(mode = %inspection.mode, "Inspected reception");
    emit(&serde_json::to_string_pretty(&inspection)?);
    Ok(())
}

/// Print the canonical form.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub async fn canonical(path: &Path, config: &EngineConfig) -> Result<(), CliError> {
    let response = read_response(path).await?;
    let loaded = wire_to_domain(&response, config);
    emit(canonicalize(&loaded.reception).as_str());
    Ok(())
}
