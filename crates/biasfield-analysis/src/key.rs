//! Identifiers for one imaging array of a patient.

use std::fmt;

use serde::{Deserialize, Serialize};

/// MRI sequence label such as `T1`, `T1c`, `T2` or `FLAIR`.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
)]
#[serde(transparent)]
pub struct Modality(String);

impl Modality {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Modality {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Label of a bias-field correction strategy, e.g. `native` or `N4_Brain`.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
)]
#[serde(transparent)]
pub struct CorrectionVariant(String);

impl CorrectionVariant {
    /// Label of the uncorrected image.
    pub const NATIVE: &str = "native";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn native() -> Self {
        Self::new(Self::NATIVE)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CorrectionVariant {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Identifies one volume of a patient: which sequence, corrected how.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub modality: Modality,
    pub variant: CorrectionVariant,
}

impl RecordKey {
    pub fn new(modality: impl Into<Modality>, variant: impl Into<CorrectionVariant>) -> Self {
        Self {
            modality: modality.into(),
            variant: variant.into(),
        }
    }

    /// The uncorrected volume of the same modality.
    #[must_use]
    pub fn native(&self) -> Self {
        Self {
            modality: self.modality.clone(),
            variant: CorrectionVariant::native(),
        }
    }

    /// Every combination of `modalities` and `variants`, modality-major.
    #[must_use]
    pub fn product(modalities: &[Modality], variants: &[CorrectionVariant]) -> Vec<Self> {
        modalities
            .iter()
            .flat_map(|modality| {
                variants.iter().map(move |variant| Self {
                    modality: modality.clone(),
                    variant: variant.clone(),
                })
            })
            .collect()
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.modality, self.variant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_order() {
        let keys = RecordKey::product(
            &["T1".into(), "T2".into()],
            &["native".into(), "N4_Brain".into()],
        );
        let labels = keys.iter().map(ToString::to_string).collect::<Vec<_>>();
        assert_eq!(
            labels,
            ["T1/native", "T1/N4_Brain", "T2/native", "T2/N4_Brain"]
        );
    }

    #[test]
    fn test_native_key_keeps_modality() {
        let key = RecordKey::new("FLAIR", "N4_Brain");
        assert_eq!(key.native(), RecordKey::new("FLAIR", "native"));
    }

    #[test]
    fn test_keys_order_by_modality_then_variant() {
        let a = RecordKey::new("T1", "native");
        let b = RecordKey::new("T1c", "N4_Brain");
        assert!(a < b);
    }
}
