//! Seeded synthetic data for exercising the pipeline without patient data.
//!
//! [`SyntheticCohort`] produces a tidy table directly; [`PhantomCohort`]
//! writes phantom `.npy` arrays to disk in the layout read by
//! [`NpyArrayLoader`](crate::loader::NpyArrayLoader).

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use ndarray::Array3;
use ndarray_npy::{WritableElement, WriteNpyError};
use rand::{Rng as _, SeedableRng as _};
use rand_distr::{Distribution as _, Normal};
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};

use crate::{
    config::StudyConfig,
    key::{CorrectionVariant, Modality, RecordKey},
    loader::{ArrayKey, ArrayLayout, LoadError},
    table::{CohortTable, ReductionRecord},
};

/// Tidy table of one statistic where every variant is drawn from the same
/// distribution.
///
/// Each (patient, modality) gets a baseline from `Uniform(20, 30)`; every
/// variant adds independent `Normal(0, noise_sd)` noise to it. Values are
/// rounded to two decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticCohort {
    pub patients: usize,
    pub modalities: Vec<Modality>,
    pub variants: Vec<CorrectionVariant>,
    pub statistic_name: String,
    pub noise_sd: f64,
    pub seed: u64,
}

impl Default for SyntheticCohort {
    fn default() -> Self {
        let config = StudyConfig::default();
        Self {
            patients: 30,
            modalities: config.modalities,
            variants: config.variants,
            statistic_name: "median_nonzero_distance".to_owned(),
            noise_sd: 1.0,
            seed: 0,
        }
    }
}

impl SyntheticCohort {
    #[must_use]
    pub fn generate(&self) -> CohortTable {
        let mut rng = Pcg64::seed_from_u64(self.seed);
        let noise = Normal::new(0.0, self.noise_sd.abs()).ok();
        let mut table = CohortTable::new();
        for patient in 1..=self.patients {
            let patient_id = format!("{patient:04}");
            for modality in &self.modalities {
                let baseline = rng.random_range(20.0..30.0);
                for variant in &self.variants {
                    let jitter = noise.map_or(0.0, |n| n.sample(&mut rng));
                    table.push(ReductionRecord {
                        patient_id: patient_id.clone(),
                        modality: modality.clone(),
                        correction_variant: variant.clone(),
                        statistic_name: self.statistic_name.clone(),
                        value: Some(round2(baseline + jitter)),
                    });
                }
            }
        }
        table
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum PhantomError {
    #[display("failed to create directory {}: {source}", path.display())]
    CreateDir { path: PathBuf, source: io::Error },
    #[display("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: WriteNpyError,
    },
    #[display("{source}")]
    Layout { source: LoadError },
    #[display("noise standard deviation must be finite and non-negative, got {noise_sd}")]
    InvalidNoise { noise_sd: f64 },
}

/// Phantom head volumes with a smooth multiplicative bias field.
///
/// Intensities inside an ellipsoid "brain" are `100 · field` (brighter inside
/// a spherical "tumor"), where `field = 1 + s · 0.2 · (x² + y² − z²)` over
/// coordinates normalized to `[-1, 1]`. The strength `s` shrinks for later
/// variants, so each correction variant leaves a different residual bias.
/// Gaussian noise is added and values are clipped to `[0, 255]` and stored
/// as `u16`; masks are stored as `u8`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhantomCohort {
    pub patients: usize,
    /// Patient ids that get no directory at all.
    pub omit: Vec<String>,
    pub shape: (usize, usize, usize),
    pub modalities: Vec<Modality>,
    pub variants: Vec<CorrectionVariant>,
    pub noise_sd: f64,
    pub seed: u64,
}

impl Default for PhantomCohort {
    fn default() -> Self {
        let config = StudyConfig::default();
        Self {
            patients: 3,
            omit: vec![],
            shape: (16, 16, 16),
            modalities: config.modalities,
            variants: config.variants,
            noise_sd: 2.0,
            seed: 0,
        }
    }
}

/// Patients written by [`PhantomCohort::write`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhantomSummary {
    pub written: Vec<String>,
    pub omitted: Vec<String>,
}

impl PhantomCohort {
    #[must_use]
    pub fn patient_ids(&self) -> Vec<String> {
        (1..=self.patients).map(|i| format!("{i:04}")).collect()
    }

    /// Writes the cohort under `root` following `layout`.
    pub fn write(
        &self,
        root: &Path,
        layout: &ArrayLayout,
    ) -> Result<PhantomSummary, PhantomError> {
        if !self.noise_sd.is_finite() || self.noise_sd < 0.0 {
            return Err(PhantomError::InvalidNoise {
                noise_sd: self.noise_sd,
            });
        }
        let noise = Normal::new(0.0, self.noise_sd).map_err(|_| PhantomError::InvalidNoise {
            noise_sd: self.noise_sd,
        })?;
        let mut rng = Pcg64::seed_from_u64(self.seed);
        let geometry = Geometry::new(self.shape);

        let mut summary = PhantomSummary {
            written: vec![],
            omitted: vec![],
        };
        for patient_id in self.patient_ids() {
            if self.omit.contains(&patient_id) {
                summary.omitted.push(patient_id);
                continue;
            }
            let dir = layout.array_dir(root, &patient_id);
            fs::create_dir_all(&dir).map_err(|source| PhantomError::CreateDir {
                path: dir.clone(),
                source,
            })?;

            let path_of = |key: &ArrayKey| -> Result<PathBuf, PhantomError> {
                let name = layout
                    .file_name(&patient_id, key)
                    .map_err(|source| PhantomError::Layout { source })?;
                Ok(dir.join(name))
            };

            write_array(&path_of(&ArrayKey::TumorMask)?, &geometry.tumor.mapv(u8::from))?;
            write_array(&path_of(&ArrayKey::BrainMask)?, &geometry.brain.mapv(u8::from))?;
            for (m, modality) in self.modalities.iter().enumerate() {
                for (v, variant) in self.variants.iter().enumerate() {
                    let key = ArrayKey::Volume(RecordKey::new(modality.clone(), variant.clone()));
                    let volume = geometry.volume(m, v, &noise, &mut rng);
                    write_array(&path_of(&key)?, &volume)?;
                }
            }
            summary.written.push(patient_id);
        }
        Ok(summary)
    }
}

fn write_array<A>(path: &Path, array: &Array3<A>) -> Result<(), PhantomError>
where
    A: WritableElement,
{
    ndarray_npy::write_npy(path, array).map_err(|source| PhantomError::Write {
        path: path.to_owned(),
        source,
    })
}

struct Geometry {
    coords: Array3<[f64; 3]>,
    brain: Array3<bool>,
    tumor: Array3<bool>,
}

impl Geometry {
    #[expect(clippy::cast_precision_loss)]
    fn new(shape: (usize, usize, usize)) -> Self {
        let norm = |i: usize, n: usize| {
            if n <= 1 {
                0.0
            } else {
                2.0 * i as f64 / (n - 1) as f64 - 1.0
            }
        };
        let coords = Array3::from_shape_fn(shape, |(z, y, x)| {
            [norm(z, shape.0), norm(y, shape.1), norm(x, shape.2)]
        });
        let brain = coords.mapv(|[z, y, x]| {
            (x / 0.8).powi(2) + (y / 0.7).powi(2) + (z / 0.6).powi(2) <= 1.0
        });
        let tumor = coords.mapv(|[z, y, x]| {
            (x - 0.2).powi(2) + (y - 0.1).powi(2) + z.powi(2) <= 0.3_f64.powi(2)
        });
        Self {
            coords,
            brain,
            tumor,
        }
    }

    #[expect(
        clippy::cast_precision_loss,
        clippy::cast_sign_loss,
        clippy::cast_possible_truncation
    )]
    fn volume(
        &self,
        modality_index: usize,
        variant_index: usize,
        noise: &Normal<f64>,
        rng: &mut Pcg64,
    ) -> Array3<u16> {
        let strength = 1.0 / (1.0 + variant_index as f64);
        let contrast = 1.0 + 0.1 * modality_index as f64;
        let mut volume = Array3::zeros(self.coords.dim());
        for (((out, &[z, y, x]), &in_brain), &in_tumor) in volume
            .iter_mut()
            .zip(&self.coords)
            .zip(&self.brain)
            .zip(&self.tumor)
        {
            if !in_brain && !in_tumor {
                continue;
            }
            let field = 1.0 + strength * 0.2 * (x * x + y * y - z * z);
            let tissue = if in_tumor { 1.5 * contrast } else { contrast };
            let value = 100.0 * tissue * field + noise.sample(rng);
            *out = value.clamp(0.0, 255.0).round() as u16;
        }
        volume
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        compare::{CompareOptions, compare},
        loader::{ArrayLoader as _, NpyArrayLoader},
    };

    #[test]
    fn test_synthetic_table_shape_and_rounding() {
        let cohort = SyntheticCohort {
            patients: 5,
            ..SyntheticCohort::default()
        };
        let table = cohort.generate();
        assert_eq!(table.len(), 5 * 4 * 5);
        for record in table.iter() {
            let value = record.value.unwrap();
            assert!((value * 100.0 - (value * 100.0).round()).abs() < 1e-6);
            assert!((15.0..35.0).contains(&value));
        }
    }

    #[test]
    fn test_synthetic_is_seeded() {
        let a = SyntheticCohort::default().generate();
        let b = SyntheticCohort::default().generate();
        let c = SyntheticCohort {
            seed: 1,
            ..SyntheticCohort::default()
        }
        .generate();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_shifted_variant_is_detected() {
        let mut table = SyntheticCohort {
            noise_sd: 0.5,
            ..SyntheticCohort::default()
        }
        .generate();
        table = table
            .iter()
            .cloned()
            .map(|mut r| {
                if r.correction_variant.as_str() == "native" {
                    r.value = r.value.map(|v| v + 20.0);
                }
                r
            })
            .collect();
        let result = compare(
            &table,
            &"T1".into(),
            "median_nonzero_distance",
            &CompareOptions::default(),
        );
        let crate::compare::ComparisonResult::Computed(comparison) = result else {
            panic!("expected Computed, got {result:?}");
        };
        assert!(comparison.is_significant());
        let matrix = comparison.pairwise.unwrap();
        let native = CorrectionVariant::from("native");
        let brain = CorrectionVariant::from("N4_Brain");
        assert!(matrix.p_value(&native, &brain).unwrap() < 0.05);
    }

    #[test]
    fn test_phantom_files_are_readable() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ArrayLayout::default();
        let cohort = PhantomCohort {
            patients: 2,
            omit: vec!["0002".to_owned()],
            shape: (6, 7, 8),
            modalities: vec!["T1".into()],
            variants: vec!["native".into(), "N4_Brain".into()],
            ..PhantomCohort::default()
        };
        let summary = cohort.write(dir.path(), &layout).unwrap();
        assert_eq!(summary.written, ["0001"]);
        assert_eq!(summary.omitted, ["0002"]);
        assert!(!layout.patient_dir(dir.path(), "0002").exists());

        let loader = NpyArrayLoader::new(dir.path(), layout);
        let mask = loader.load_array("0001", &ArrayKey::TumorMask).unwrap();
        assert_eq!(mask.dim(), (6, 7, 8));
        assert!(mask.iter().all(|&v| v == 0.0 || v == 1.0));
        assert!(mask.iter().any(|&v| v == 1.0));

        let volume = loader
            .load_array("0001", &ArrayKey::Volume(RecordKey::new("T1", "native")))
            .unwrap();
        assert!(volume.iter().all(|&v| (0.0..=255.0).contains(&v)));
        assert!(volume.iter().any(|&v| v > 0.0));
    }

    #[test]
    fn test_phantom_rejects_negative_noise() {
        let dir = tempfile::tempdir().unwrap();
        let cohort = PhantomCohort {
            noise_sd: -1.0,
            ..PhantomCohort::default()
        };
        assert!(matches!(
            cohort.write(dir.path(), &ArrayLayout::default()),
            Err(PhantomError::InvalidNoise { .. })
        ));
    }
}
