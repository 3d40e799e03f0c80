//! Unsaved-change detection against a canonical baseline.

use tracing::debug;

use crate::canonical::{CanonicalForm, canonicalize};
use crate::model::{Reception, ReceptionMode};

/// Compares the current reception with the last loaded or saved state.
///
/// Holds only the baseline string; the current form is recomputed on every
/// call so it always reflects the latest mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeDetector {
    baseline: CanonicalForm,
}

impl ChangeDetector {
    /// Capture `reception` as the baseline.
    #[must_use]
    pub fn capture(reception: &Reception) -> Self {
        Self {
            baseline: canonicalize(reception),
        }
    }

    /// Replace the baseline after a successful save or reload.
    pub fn rebase(&mut self, reception: &Reception) {
        self.baseline = canonicalize(reception);
        debug!("Captured new change baseline");
    }

    /// The captured baseline.
    #[must_use]
    pub const fn baseline(&self) -> &CanonicalForm {
        &self.baseline
    }

    /// Whether `reception` differs from the baseline.
    ///
    /// For lines-mode receptions only the header is compared canonically;
    /// `form_dirty` carries the line form's own pristine/dirty signal and is
    /// ignored in pallets mode.
    #[must_use]
    pub fn has_changes(&self, reception: &Reception, form_dirty: bool) -> bool {
        let current = canonicalize(reception);
        let differs = current != self.baseline;
        match reception.mode() {
            ReceptionMode::Pallets => differs,
            ReceptionMode::Lines => differs || form_dirty,
        }
    }
}
