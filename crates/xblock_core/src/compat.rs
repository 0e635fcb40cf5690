//! Deprecated names kept for older callers.
//!
//! Everything here forwards to the current error types unchanged.

#![allow(deprecated)]

use crate::error::SaveError;
use crate::kvs::{FailureMap, KeyValueError};
use log::warn;
use std::collections::BTreeMap;

#[deprecated(note = "use `SaveError`")]
pub type XBlockSaveError = SaveError;

#[deprecated(note = "use `kvs::FailureMap`")]
pub type KeyValueMultiSaveError = FailureMap;

/// Builds a partial-save error under its legacy name.
#[deprecated(note = "construct `SaveError::Partial` directly")]
pub fn xblock_save_error(
    saved: Vec<String>,
    failed: BTreeMap<String, KeyValueError>,
) -> XBlockSaveError {
    warn!("event=deprecated_api module=compat status=used name=XBlockSaveError");
    SaveError::Partial { saved, failed }
}

#[cfg(test)]
mod tests {
    #![allow(deprecated)]

    use super::{xblock_save_error, KeyValueMultiSaveError, XBlockSaveError};
    use crate::error::SaveError;
    use std::collections::BTreeMap;

    #[test]
    fn legacy_names_behave_like_current_types() {
        let err: XBlockSaveError = xblock_save_error(vec!["name".to_string()], BTreeMap::new());
        assert!(matches!(err, SaveError::Partial { .. }));
        assert_eq!(err.saved_fields(), ["name".to_string()]);

        let failures: KeyValueMultiSaveError = KeyValueMultiSaveError::new();
        assert!(failures.is_empty());
    }
}
