//! Per-patient aggregation of every configured (modality, variant) key.

use std::{borrow::Cow, collections::BTreeMap};

use ndarray::Array3;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    key::RecordKey,
    loader::{ArrayKey, ArrayLoader, LoadError},
    reduce::{self, ReduceError, RegionPair, RegionPoints, Statistic, WholeRegionRule},
    table::ReductionRecord,
    volume::Mask,
};

/// Lazily yields the volume of each key of one patient.
pub trait VolumeSource {
    fn volume(&self, key: &RecordKey) -> Result<Cow<'_, Array3<f64>>, LoadError>;
}

impl VolumeSource for BTreeMap<RecordKey, Array3<f64>> {
    fn volume(&self, key: &RecordKey) -> Result<Cow<'_, Array3<f64>>, LoadError> {
        self.get(key)
            .map(Cow::Borrowed)
            .ok_or_else(|| LoadError::UnknownKey { key: key.clone() })
    }
}

/// Volumes of one patient pulled from an [`ArrayLoader`] on demand.
#[derive(Debug)]
pub struct PatientArrays<'a, L: ?Sized> {
    loader: &'a L,
    patient_id: &'a str,
}

impl<'a, L> PatientArrays<'a, L>
where
    L: ArrayLoader + ?Sized,
{
    pub fn new(loader: &'a L, patient_id: &'a str) -> Self {
        Self { loader, patient_id }
    }
}

impl<L> VolumeSource for PatientArrays<'_, L>
where
    L: ArrayLoader + ?Sized,
{
    fn volume(&self, key: &RecordKey) -> Result<Cow<'_, Array3<f64>>, LoadError> {
        self.loader
            .load_array(self.patient_id, &ArrayKey::Volume(key.clone()))
            .map(Cow::Owned)
    }
}

/// Statistic and whole-region rule applied to every key.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReduceOptions {
    pub statistic: Statistic,
    pub whole_region: WholeRegionRule,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipKind {
    /// An input array was missing or unreadable.
    MissingInput,
    /// Volume and mask shapes differ.
    ShapeMismatch,
    /// The whole patient was excluded.
    PatientFailure,
}

/// One skipped key, or a whole skipped patient when `key` is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkipRecord {
    pub patient_id: String,
    pub key: Option<RecordKey>,
    pub kind: SkipKind,
    pub reason: String,
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum AggregateError {
    #[display("patient '{patient_id}': none of {attempted} keys could be reduced")]
    NoUsableKeys { patient_id: String, attempted: usize },
    #[display("patient '{patient_id}': brain mask required by the whole-region rule is missing")]
    MissingBrainMask { patient_id: String },
}

/// Reduced values of every usable key of one patient.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientRecord {
    pub patient_id: String,
    pub statistic: Statistic,
    pub values: BTreeMap<RecordKey, RegionPair>,
    /// Points behind point-valued statistics; empty for plain scalars.
    pub points: BTreeMap<RecordKey, RegionPoints>,
    pub skipped: Vec<SkipRecord>,
}

impl PatientRecord {
    /// Tidy rows: `<stat>_whole`, `<stat>_subregion` and `<stat>_distance`
    /// for every key.
    ///
    /// Point-valued statistics add `<stat>_whole_<axis>` and
    /// `<stat>_subregion_<axis>` for each of [`Statistic::point_axes`].
    #[must_use]
    pub fn rows(&self) -> Vec<ReductionRecord> {
        let stat = self.statistic.name();
        let axes = self.statistic.point_axes();
        let no_points = RegionPoints::default();
        self.values
            .iter()
            .flat_map(|(key, pair)| {
                let points = self.points.get(key).unwrap_or(&no_points);
                let coordinate = |point: &Option<Vec<f64>>, axis: usize| {
                    point.as_ref().and_then(|p| p.get(axis).copied())
                };
                let scalars = [
                    (format!("{stat}_whole"), pair.whole),
                    (format!("{stat}_subregion"), pair.subregion),
                    (format!("{stat}_distance"), pair.distance()),
                ];
                let coordinates = axes.iter().enumerate().flat_map(move |(i, axis)| {
                    [
                        (format!("{stat}_whole_{axis}"), coordinate(&points.whole, i)),
                        (
                            format!("{stat}_subregion_{axis}"),
                            coordinate(&points.subregion, i),
                        ),
                    ]
                });
                scalars
                    .into_iter()
                    .chain(coordinates)
                    .map(|(statistic_name, value)| ReductionRecord {
                        patient_id: self.patient_id.clone(),
                        modality: key.modality.clone(),
                        correction_variant: key.variant.clone(),
                        statistic_name,
                        value,
                    })
            })
            .collect()
    }
}

#[derive(Debug, derive_more::Display, derive_more::From)]
enum KeyError {
    Load(LoadError),
    Reduce(ReduceError),
}

impl KeyError {
    fn kind(&self) -> SkipKind {
        match self {
            Self::Load(_) => SkipKind::MissingInput,
            Self::Reduce(ReduceError::ShapeMismatch { .. }) => SkipKind::ShapeMismatch,
            Self::Reduce(ReduceError::MissingReference { .. }) => SkipKind::MissingInput,
        }
    }
}

/// Reduces every key of one patient.
///
/// Keys whose volume cannot be loaded, or whose shape does not match the
/// masks, are skipped and logged. The patient fails only when no key
/// succeeds. `brain_mask` is required when `options.whole_region` is
/// [`WholeRegionRule::BrainMask`] and ignored otherwise. Statistics that
/// need a reference read the native volume of the key's modality.
pub fn aggregate<V>(
    patient_id: &str,
    keys: &[RecordKey],
    volumes: &V,
    mask: &Mask,
    brain_mask: Option<&Mask>,
    options: ReduceOptions,
) -> Result<PatientRecord, AggregateError>
where
    V: VolumeSource + ?Sized,
{
    let whole_region = match options.whole_region {
        WholeRegionRule::EntireVolume => None,
        WholeRegionRule::BrainMask => Some(brain_mask.ok_or_else(|| {
            AggregateError::MissingBrainMask {
                patient_id: patient_id.to_owned(),
            }
        })?),
    };

    let mut values = BTreeMap::new();
    let mut points = BTreeMap::new();
    let mut skipped = vec![];
    for key in keys {
        let result = volumes.volume(key).map_err(KeyError::from).and_then(|volume| {
            let reference = if options.statistic.needs_reference() {
                Some(volumes.volume(&key.native())?)
            } else {
                None
            };
            Ok(reduce::reduce_with_points(
                volume.view(),
                reference.as_ref().map(|r| r.view()),
                mask,
                options.statistic,
                whole_region,
            )?)
        });
        match result {
            Ok(reduction) => {
                let pair = reduction.pair;
                debug!(
                    patient_id,
                    %key,
                    whole = ?pair.whole,
                    subregion = ?pair.subregion,
                    "reduced"
                );
                if reduction.non_finite > 0 {
                    warn!(
                        patient_id,
                        %key,
                        voxels = reduction.non_finite,
                        "non-finite intensities; affected sides are missing"
                    );
                }
                values.insert(key.clone(), pair);
                if !options.statistic.point_axes().is_empty() {
                    points.insert(key.clone(), reduction.points);
                }
            }
            Err(err) => {
                warn!(patient_id, %key, "skipping key: {err}");
                skipped.push(SkipRecord {
                    patient_id: patient_id.to_owned(),
                    key: Some(key.clone()),
                    kind: err.kind(),
                    reason: err.to_string(),
                });
            }
        }
    }

    if values.is_empty() {
        return Err(AggregateError::NoUsableKeys {
            patient_id: patient_id.to_owned(),
            attempted: keys.len(),
        });
    }

    Ok(PatientRecord {
        patient_id: patient_id.to_owned(),
        statistic: options.statistic,
        values,
        points,
        skipped,
    })
}
