//! Masked-statistic aggregation for bias-field correction studies.
//!
//! This crate turns pre-extracted voxel arrays of a patient cohort into a
//! tidy table of scalar statistics and compares correction variants on it.
//!
//! # Overview
//!
//! The pipeline runs leaves first:
//!
//! 1. **Load Arrays** ([`loader::ArrayLoader`]): Read one 3D array per patient ×
//!    modality × correction variant, plus tumor and brain masks, widened to `f64`
//! 2. **Reduce** ([`reduce::reduce`]): Summarize a volume over the whole region and
//!    over the tumor subregion as a [`reduce::RegionPair`]
//! 3. **Aggregate** ([`patient::aggregate`]): Fold every (modality, variant) key of one
//!    patient into a [`patient::PatientRecord`], skipping keys that fail
//! 4. **Collect** ([`cohort::CohortCollector`]): Run the aggregator over all patients on
//!    a bounded worker pool, isolating per-patient failures
//! 5. **Tabulate** ([`table::CohortTable`]): Long-form rows, read and written as CSV
//! 6. **Compare** ([`compare::compare`]): Kruskal–Wallis across variants, followed by
//!    Dunn's post-hoc test when significant
//!
//! Alongside the pipeline:
//!
//! - [`summary`]: Per-variant descriptive statistics, percentiles, outliers and histograms
//! - [`diff`]: Paired differences between two variants
//! - [`config`]: The [`config::StudyConfig`] shared by every stage
//! - [`synthetic`]: Seeded synthetic tables and phantom arrays
//!
//! # Examples
//!
//! ## Collecting a phantom cohort
//!
//! ```no_run
//! use biasfield_analysis::{
//!     cohort::{self, CohortCollector},
//!     config::StudyConfig,
//!     loader::NpyArrayLoader,
//!     synthetic::PhantomCohort,
//! };
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//!
//! let config = StudyConfig {
//!     cohort_root: "phantom".into(),
//!     ..StudyConfig::default()
//! };
//! PhantomCohort::default().write(&config.cohort_root, &config.layout)?;
//!
//! let loader = NpyArrayLoader::new(&config.cohort_root, config.layout.clone());
//! let patient_ids = cohort::discover_patients(&config)?;
//! let run = CohortCollector::from_config(&config).collect(&patient_ids, &loader)?;
//! run.table.write_csv_file("medians.csv".as_ref())?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Comparing variants
//!
//! ```
//! use biasfield_analysis::{
//!     compare::{compare, CompareOptions, ComparisonResult},
//!     synthetic::SyntheticCohort,
//! };
//!
//! let table = SyntheticCohort::default().generate();
//! let options = CompareOptions::default();
//! let result = compare(&table, &"T1".into(), "median_nonzero_distance", &options);
//! assert!(matches!(result, ComparisonResult::Computed(_)));
//! ```

pub mod cohort;
pub mod compare;
pub mod config;
pub mod diff;
pub mod key;
pub mod loader;
pub mod patient;
pub mod reduce;
pub mod summary;
pub mod synthetic;
pub mod table;
pub mod volume;
