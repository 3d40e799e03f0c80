//! Required-field checks run before a save is handed to persistence.

use rust_decimal::Decimal;

use reception_core::{DecimalText, LotKey};

use crate::error::ValidationError;
use crate::model::{Line, Pallet, Reception, ReceptionBody, ReceptionHeader};

/// Check header fields.
///
/// # Errors
///
/// Returns an error if the supplier or date is missing.
pub const fn validate_header(header: &ReceptionHeader) -> Result<(), ValidationError> {
    if header.supplier_id.is_none() {
        return Err(ValidationError::MissingSupplier);
    }
    if header.date.is_none() {
        return Err(ValidationError::MissingDate);
    }
    Ok(())
}

/// Check a lines body.
///
/// Incomplete lines (no product, non-positive weight) are dropped on save,
/// so only the complete ones are checked, and at least one must exist.
///
/// # Errors
///
/// Returns an error if no line is complete, or a complete line has zero
/// boxes or a negative price.
pub fn validate_lines(lines: &[Line]) -> Result<(), ValidationError> {
    let mut complete = 0usize;
    for (index, line) in lines.iter().enumerate() {
        if !line.is_complete() {
            continue;
        }
        complete += 1;
        if line.box_count == 0 {
            return Err(ValidationError::InvalidBoxCount { line: index });
        }
        if let (Some(product), Some(price)) = (line.product_id, line.price_per_kg) {
            if price < Decimal::ZERO {
                return Err(ValidationError::NegativePrice {
                    key: LotKey::new(product, line.lot.clone()),
                });
            }
        }
    }
    if complete == 0 {
        return Err(ValidationError::EmptyLines);
    }
    Ok(())
}

/// Check a pallets body.
///
/// # Errors
///
/// Returns an error if there are no pallets, a pallet is empty, a box has no
/// product, a box has a missing or negative net weight, or a projected price
/// is negative.
pub fn validate_pallets(pallets: &[Pallet]) -> Result<(), ValidationError> {
    if pallets.is_empty() {
        return Err(ValidationError::EmptyPallets);
    }
    for (pallet_index, pallet) in pallets.iter().enumerate() {
        if pallet.boxes.is_empty() {
            return Err(ValidationError::EmptyPallet {
                pallet: pallet_index,
            });
        }
        for (position, b) in pallet.boxes.iter().enumerate() {
            if b.product_id.is_none() {
                return Err(ValidationError::BoxMissingProduct {
                    pallet: pallet_index,
                    position,
                });
            }
            if b.net_weight.is_none_or(|w| w < Decimal::ZERO) {
                return Err(ValidationError::BoxInvalidNetWeight {
                    pallet: pallet_index,
                    position,
                });
            }
        }
        if let Some((key, _)) = pallet
            .prices
            .iter()
            .find(|(_, price)| price.is_some_and(|p| p < Decimal::ZERO))
        {
            return Err(ValidationError::NegativePrice { key: key.clone() });
        }
    }
    Ok(())
}

/// Run every required-field check for a save.
///
/// # Errors
///
/// Returns the first problem found, header first.
pub fn validate_for_save(reception: &Reception) -> Result<(), ValidationError> {
    validate_header(&reception.header)?;
    match &reception.body {
        ReceptionBody::Lines(lines) => validate_lines(lines),
        ReceptionBody::Pallets(pallets) => validate_pallets(pallets),
    }
}

/// Parse an optional numeric form field; blank text clears the value.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidNumber`] naming `field` if the text is
/// not a number.
pub fn parse_optional_number(
    field: &'static str,
    raw: &str,
) -> Result<Option<Decimal>, ValidationError> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    DecimalText::parse(raw)
        .map(|d| Some(d.value()))
        .map_err(|source| ValidationError::InvalidNumber { field, source })
}
