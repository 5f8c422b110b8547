//! Cohort-wide collection over a bounded worker pool.
//!
//! Each patient is an independent task: its masks are loaded, every key is
//! reduced, and the task returns its own outcome. Outcomes are folded into a
//! [`CohortRun`] only after the pool has joined, so no state is shared
//! between tasks. A failing or panicking patient is excluded without
//! affecting the others.

use std::{
    any::Any,
    fs, io,
    panic::{self, AssertUnwindSafe},
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    config::StudyConfig,
    key::RecordKey,
    loader::{ArrayKey, ArrayLayout, ArrayLoader, LoadError},
    patient::{
        self, AggregateError, PatientArrays, PatientRecord, ReduceOptions, SkipKind, SkipRecord,
    },
    reduce::WholeRegionRule,
    table::CohortTable,
    volume::Mask,
};

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum CollectError {
    #[display("cohort root not found: {}", path.display())]
    MissingCohortRoot { path: PathBuf },
    #[display("failed to list cohort root {}: {source}", path.display())]
    ListCohortRoot { path: PathBuf, source: io::Error },
    #[display("failed to build worker pool: {source}")]
    ThreadPool { source: rayon::ThreadPoolBuildError },
}

#[derive(Debug, derive_more::Display, derive_more::From)]
enum PatientError {
    Load(LoadError),
    Aggregate(AggregateError),
    #[display("panicked: {_0}")]
    #[from(ignore)]
    Panicked(String),
}

/// Table and skip log produced by one collection run.
#[derive(Debug, Clone, Default)]
pub struct CohortRun {
    pub table: CohortTable,
    pub skips: Vec<SkipRecord>,
    pub patients_total: usize,
    pub patients_succeeded: usize,
}

impl CohortRun {
    /// Patients excluded entirely.
    pub fn failed_patients(&self) -> impl Iterator<Item = &SkipRecord> {
        self.skips.iter().filter(|skip| skip.key.is_none())
    }

    #[must_use]
    pub fn report(&self) -> RunSummary {
        RunSummary {
            patients_total: self.patients_total,
            patients_succeeded: self.patients_succeeded,
            patients_failed: self.failed_patients().count(),
            keys_skipped: self.skips.iter().filter(|s| s.key.is_some()).count(),
            rows: self.table.len(),
        }
    }
}

/// Counts of one collection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub patients_total: usize,
    pub patients_succeeded: usize,
    pub patients_failed: usize,
    pub keys_skipped: usize,
    pub rows: usize,
}

/// Runs the patient aggregator over a cohort.
#[derive(Debug, Clone)]
pub struct CohortCollector {
    keys: Vec<RecordKey>,
    options: ReduceOptions,
    workers: Option<usize>,
}

impl CohortCollector {
    #[must_use]
    pub fn new(keys: Vec<RecordKey>, options: ReduceOptions) -> Self {
        Self {
            keys,
            options,
            workers: None,
        }
    }

    #[must_use]
    pub fn from_config(config: &StudyConfig) -> Self {
        Self::new(config.keys(), config.reduce_options()).with_workers(config.workers)
    }

    /// Bounds the worker pool; `None` uses every core.
    #[must_use]
    pub fn with_workers(mut self, workers: Option<usize>) -> Self {
        self.workers = workers;
        self
    }

    /// Aggregates every patient of `patient_ids`.
    pub fn collect<L>(&self, patient_ids: &[String], loader: &L) -> Result<CohortRun, CollectError>
    where
        L: ArrayLoader + ?Sized,
    {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers.unwrap_or(0))
            .build()
            .map_err(|source| CollectError::ThreadPool { source })?;

        let total = patient_ids.len();
        let finished = AtomicUsize::new(0);
        let outcomes = pool.install(|| {
            patient_ids
                .par_iter()
                .map(|patient_id| {
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                        self.process_patient(patient_id, loader)
                    }))
                    .unwrap_or_else(|payload| {
                        Err(PatientError::Panicked(panic_message(&*payload)))
                    })
                    .map_err(|err| SkipRecord {
                        patient_id: patient_id.clone(),
                        key: None,
                        kind: SkipKind::PatientFailure,
                        reason: err.to_string(),
                    });
                    let done = finished.fetch_add(1, Ordering::Relaxed) + 1;
                    info!("[{done}/{total}] processed {patient_id}");
                    outcome
                })
                .collect::<Vec<_>>()
        });

        let mut run = CohortRun {
            patients_total: total,
            ..CohortRun::default()
        };
        for outcome in outcomes {
            match outcome {
                Ok(record) => {
                    run.table.extend(record.rows());
                    run.skips.extend(record.skipped);
                    run.patients_succeeded += 1;
                }
                Err(skip) => {
                    warn!(patient_id = %skip.patient_id, "excluding patient: {}", skip.reason);
                    run.skips.push(skip);
                }
            }
        }
        Ok(run)
    }

    fn process_patient<L>(
        &self,
        patient_id: &str,
        loader: &L,
    ) -> Result<PatientRecord, PatientError>
    where
        L: ArrayLoader + ?Sized,
    {
        let mask = Mask::new(loader.load_array(patient_id, &ArrayKey::TumorMask)?);
        let brain_mask = match self.options.whole_region {
            WholeRegionRule::EntireVolume => None,
            WholeRegionRule::BrainMask => {
                Some(Mask::new(loader.load_array(patient_id, &ArrayKey::BrainMask)?))
            }
        };
        let volumes = PatientArrays::new(loader, patient_id);
        let record = patient::aggregate(
            patient_id,
            &self.keys,
            &volumes,
            &mask,
            brain_mask.as_ref(),
            self.options,
        )?;
        Ok(record)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}

/// Lists the ids of patient directories under `root`, sorted.
pub fn discover_patient_ids(
    root: &Path,
    layout: &ArrayLayout,
) -> Result<Vec<String>, CollectError> {
    if !root.is_dir() {
        return Err(CollectError::MissingCohortRoot {
            path: root.to_owned(),
        });
    }
    let list_err = |source| CollectError::ListCohortRoot {
        path: root.to_owned(),
        source,
    };
    let mut ids = vec![];
    for entry in fs::read_dir(root).map_err(list_err)? {
        let entry = entry.map_err(list_err)?;
        if !entry.file_type().map_err(list_err)?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        if let Some(id) = name
            .to_str()
            .and_then(|name| layout.patient_id_from_dir_name(name))
        {
            ids.push(id.to_owned());
        }
    }
    ids.sort();
    Ok(ids)
}

/// Lists the patients of the cohort described by `config`.
pub fn discover_patients(config: &StudyConfig) -> Result<Vec<String>, CollectError> {
    discover_patient_ids(&config.cohort_root, &config.layout)
}

#[cfg(test)]
mod tests {
    use ndarray::Array3;

    use super::*;
    use crate::loader::InMemoryLoader;

    struct PanickingLoader;

    impl ArrayLoader for PanickingLoader {
        fn load_array(&self, patient_id: &str, _key: &ArrayKey) -> Result<Array3<f64>, LoadError> {
            assert_ne!(patient_id, "0002", "corrupt header");
            Ok(Array3::from_elem((1, 1, 2), 1.0))
        }
    }

    fn keys() -> Vec<RecordKey> {
        vec![RecordKey::new("T1", "native")]
    }

    #[test]
    fn test_panicking_patient_is_isolated() {
        let collector =
            CohortCollector::new(keys(), ReduceOptions::default()).with_workers(Some(2));
        let ids = ["0001", "0002", "0003"].map(String::from);
        let run = collector.collect(&ids, &PanickingLoader).unwrap();

        assert_eq!(run.patients_succeeded, 2);
        let failed = run.failed_patients().collect::<Vec<_>>();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].patient_id, "0002");
        assert!(failed[0].reason.contains("corrupt header"), "{}", failed[0].reason);
        assert_eq!(run.table.patient_ids().len(), 2);
    }

    #[test]
    fn test_missing_mask_excludes_patient() {
        let mut loader = InMemoryLoader::new();
        let volume = Array3::from_elem((1, 1, 3), 2.0);
        for id in ["0001", "0002"] {
            loader.insert(
                id,
                ArrayKey::Volume(RecordKey::new("T1", "native")),
                volume.clone(),
            );
        }
        loader.insert("0001", ArrayKey::TumorMask, Array3::ones((1, 1, 3)));

        let collector =
            CohortCollector::new(keys(), ReduceOptions::default()).with_workers(Some(1));
        let ids = ["0001", "0002"].map(String::from);
        let run = collector.collect(&ids, &loader).unwrap();

        assert_eq!(run.report().patients_failed, 1);
        assert_eq!(run.report().rows, 3);
        assert_eq!(run.failed_patients().next().unwrap().patient_id, "0002");
    }

    #[test]
    fn test_brain_rule_loads_brain_mask() {
        let mut loader = InMemoryLoader::new();
        loader.insert(
            "0001",
            ArrayKey::Volume(RecordKey::new("T1", "native")),
            Array3::from_shape_vec((1, 1, 4), vec![1.0, 2.0, 30.0, 40.0]).unwrap(),
        );
        loader.insert(
            "0001",
            ArrayKey::TumorMask,
            Array3::from_shape_vec((1, 1, 4), vec![0.0, 0.0, 0.0, 1.0]).unwrap(),
        );
        let options = ReduceOptions {
            whole_region: WholeRegionRule::BrainMask,
            ..ReduceOptions::default()
        };
        let collector = CohortCollector::new(keys(), options);
        let ids = ["0001".to_owned()];

        let run = collector.collect(&ids, &loader).unwrap();
        assert_eq!(run.patients_succeeded, 0);

        loader.insert(
            "0001",
            ArrayKey::BrainMask,
            Array3::from_shape_vec((1, 1, 4), vec![1.0, 1.0, 0.0, 0.0]).unwrap(),
        );
        let run = collector.collect(&ids, &loader).unwrap();
        assert_eq!(run.patients_succeeded, 1);
        let whole = run
            .table
            .iter()
            .find(|r| r.statistic_name == "median_nonzero_whole")
            .unwrap();
        assert_eq!(whole.value, Some(1.5));
    }

    #[test]
    fn test_missing_cohort_root_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = discover_patient_ids(&dir.path().join("absent"), &ArrayLayout::default())
            .unwrap_err();
        assert!(matches!(err, CollectError::MissingCohortRoot { .. }));
    }

    #[test]
    fn test_discovers_patient_directories() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["UCSF-PDGM-0010_nifti", "UCSF-PDGM-0002_nifti", "other"] {
            fs::create_dir(dir.path().join(name)).unwrap();
        }
        fs::write(dir.path().join("UCSF-PDGM-0003_nifti"), b"").unwrap();
        let ids = discover_patient_ids(dir.path(), &ArrayLayout::default()).unwrap();
        assert_eq!(ids, ["0002", "0010"]);
    }
}
