//! Loading of pre-extracted voxel arrays.
//!
//! Arrays are `.npy` files, one per patient × modality × correction variant
//! plus per-patient tumor and brain masks, laid out under a cohort root as
//! described by [`ArrayLayout`]:
//!
//! ```text
//! {cohort_root}/{prefix}{id}{patient_dir_suffix}/{array_subdir}/
//!     {prefix}{id}_{modality}_{variant_file_suffix}.npy
//!     {prefix}{id}_{mask_file_suffix}.npy
//!     {prefix}{id}_{brain_mask_file_suffix}.npy
//! ```

use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
};

use ndarray::Array3;
use ndarray_npy::ReadNpyError;
use serde::{Deserialize, Serialize};

use crate::key::{CorrectionVariant, RecordKey};

/// Which array of a patient to load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArrayKey {
    Volume(RecordKey),
    TumorMask,
    BrainMask,
}

impl fmt::Display for ArrayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Volume(key) => write!(f, "{key}"),
            Self::TumorMask => f.write_str("tumor mask"),
            Self::BrainMask => f.write_str("brain mask"),
        }
    }
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum LoadError {
    #[display("patient directory not found for '{patient_id}': {}", path.display())]
    MissingPatientDir { patient_id: String, path: PathBuf },
    #[display("array file not found: {}", path.display())]
    NotFound { path: PathBuf },
    #[display("no file suffix configured for correction variant '{variant}'")]
    UnknownVariant { variant: CorrectionVariant },
    #[display("no array loaded for {key}")]
    UnknownKey { key: RecordKey },
    #[display("failed to read array file {}: {source}", path.display())]
    Read { path: PathBuf, source: ReadNpyError },
}

/// Source of voxel arrays for a cohort.
///
/// Implementations must be shareable across the collector's worker threads.
pub trait ArrayLoader: Sync {
    /// Loads one 3D array of `patient_id`, widened to `f64`.
    fn load_array(&self, patient_id: &str, key: &ArrayKey) -> Result<Array3<f64>, LoadError>;
}

/// File naming convention of a cohort on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArrayLayout {
    pub patient_prefix: String,
    pub patient_dir_suffix: String,
    pub array_subdir: String,
    pub mask_file_suffix: String,
    pub brain_mask_file_suffix: String,
    pub variant_file_suffixes: BTreeMap<CorrectionVariant, String>,
}

impl Default for ArrayLayout {
    fn default() -> Self {
        let variant_file_suffixes = [
            ("native", "rescaled"),
            ("N4_Brain", "N4_brain_rescaled"),
            ("N4_Healthy", "N4_healthy_mask_rescaled"),
            ("N4_Brain_Healthy", "N4_brain_healthy_mask_rescaled"),
            ("N4_Healthy_Brain", "N4_healthy_mask_brain_rescaled"),
        ]
        .into_iter()
        .map(|(variant, suffix)| (CorrectionVariant::from(variant), suffix.to_owned()))
        .collect();
        Self {
            patient_prefix: "UCSF-PDGM-".to_owned(),
            patient_dir_suffix: "_nifti".to_owned(),
            array_subdir: "array".to_owned(),
            mask_file_suffix: "tumor_binary_array".to_owned(),
            brain_mask_file_suffix: "brain_segmentation_array".to_owned(),
            variant_file_suffixes,
        }
    }
}

impl ArrayLayout {
    #[must_use]
    pub fn patient_dir(&self, root: &Path, patient_id: &str) -> PathBuf {
        root.join(format!(
            "{}{patient_id}{}",
            self.patient_prefix, self.patient_dir_suffix
        ))
    }

    #[must_use]
    pub fn array_dir(&self, root: &Path, patient_id: &str) -> PathBuf {
        self.patient_dir(root, patient_id).join(&self.array_subdir)
    }

    /// File name of `key` for `patient_id`.
    pub fn file_name(&self, patient_id: &str, key: &ArrayKey) -> Result<String, LoadError> {
        let prefix = &self.patient_prefix;
        let name = match key {
            ArrayKey::Volume(key) => {
                let suffix = self.variant_file_suffixes.get(&key.variant).ok_or_else(|| {
                    LoadError::UnknownVariant {
                        variant: key.variant.clone(),
                    }
                })?;
                format!("{prefix}{patient_id}_{}_{suffix}.npy", key.modality)
            }
            ArrayKey::TumorMask => format!("{prefix}{patient_id}_{}.npy", self.mask_file_suffix),
            ArrayKey::BrainMask => {
                format!("{prefix}{patient_id}_{}.npy", self.brain_mask_file_suffix)
            }
        };
        Ok(name)
    }

    /// Extracts the patient id from a patient directory name.
    ///
    /// # Examples
    ///
    /// ```
    /// use biasfield_analysis::loader::ArrayLayout;
    ///
    /// let layout = ArrayLayout::default();
    /// assert_eq!(layout.patient_id_from_dir_name("UCSF-PDGM-0004_nifti"), Some("0004"));
    /// assert_eq!(layout.patient_id_from_dir_name("notes"), None);
    /// ```
    #[must_use]
    pub fn patient_id_from_dir_name<'a>(&self, name: &'a str) -> Option<&'a str> {
        name.strip_prefix(&self.patient_prefix)?
            .strip_suffix(&self.patient_dir_suffix)
            .filter(|id| !id.is_empty())
    }
}

/// Reads arrays from `.npy` files under a cohort root.
#[derive(Debug, Clone)]
pub struct NpyArrayLoader {
    root: PathBuf,
    layout: ArrayLayout,
}

impl NpyArrayLoader {
    pub fn new(root: impl Into<PathBuf>, layout: ArrayLayout) -> Self {
        Self {
            root: root.into(),
            layout,
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn layout(&self) -> &ArrayLayout {
        &self.layout
    }

    pub fn array_path(&self, patient_id: &str, key: &ArrayKey) -> Result<PathBuf, LoadError> {
        let file_name = self.layout.file_name(patient_id, key)?;
        Ok(self.layout.array_dir(&self.root, patient_id).join(file_name))
    }
}

impl ArrayLoader for NpyArrayLoader {
    fn load_array(&self, patient_id: &str, key: &ArrayKey) -> Result<Array3<f64>, LoadError> {
        let patient_dir = self.layout.patient_dir(&self.root, patient_id);
        if !patient_dir.is_dir() {
            return Err(LoadError::MissingPatientDir {
                patient_id: patient_id.to_owned(),
                path: patient_dir,
            });
        }
        let path = self.array_path(patient_id, key)?;
        if !path.is_file() {
            return Err(LoadError::NotFound { path });
        }
        read_npy_widened(&path).map_err(|source| LoadError::Read { path, source })
    }
}

/// Reads a 3D `.npy` array of any numeric or boolean dtype as `f64`.
#[expect(clippy::cast_precision_loss)]
pub fn read_npy_widened(path: &Path) -> Result<Array3<f64>, ReadNpyError> {
    macro_rules! try_dtype {
        ($ty:ty, $widen:expr) => {
            match ndarray_npy::read_npy::<_, Array3<$ty>>(path) {
                Ok(array) => return Ok(array.mapv($widen)),
                Err(ReadNpyError::WrongDescriptor(_)) => {}
                Err(err) => return Err(err),
            }
        };
    }

    try_dtype!(f64, |v| v);
    try_dtype!(f32, f64::from);
    try_dtype!(u16, f64::from);
    try_dtype!(u8, f64::from);
    try_dtype!(i16, f64::from);
    try_dtype!(i32, f64::from);
    try_dtype!(u32, f64::from);
    try_dtype!(i8, f64::from);
    try_dtype!(i64, |v| v as f64);
    try_dtype!(u64, |v| v as f64);
    ndarray_npy::read_npy::<_, Array3<bool>>(path)
        .map(|array| array.mapv(|v| f64::from(u8::from(v))))
}

/// Arrays held in memory, keyed by patient.
///
/// Useful for tests and for callers that already decoded their arrays.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLoader {
    patients: BTreeMap<String, InMemoryPatient>,
}

#[derive(Debug, Clone, Default)]
struct InMemoryPatient {
    volumes: BTreeMap<RecordKey, Array3<f64>>,
    tumor_mask: Option<Array3<f64>>,
    brain_mask: Option<Array3<f64>>,
}

impl InMemoryLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, patient_id: &str, key: ArrayKey, array: Array3<f64>) {
        let patient = self.patients.entry(patient_id.to_owned()).or_default();
        match key {
            ArrayKey::Volume(key) => {
                patient.volumes.insert(key, array);
            }
            ArrayKey::TumorMask => patient.tumor_mask = Some(array),
            ArrayKey::BrainMask => patient.brain_mask = Some(array),
        }
    }
}

impl ArrayLoader for InMemoryLoader {
    fn load_array(&self, patient_id: &str, key: &ArrayKey) -> Result<Array3<f64>, LoadError> {
        let patient =
            self.patients
                .get(patient_id)
                .ok_or_else(|| LoadError::MissingPatientDir {
                    patient_id: patient_id.to_owned(),
                    path: PathBuf::from(patient_id),
                })?;
        let not_found = || LoadError::NotFound {
            path: PathBuf::from(format!("{patient_id}/{key}")),
        };
        let array = match key {
            ArrayKey::Volume(key) => patient
                .volumes
                .get(key)
                .ok_or_else(|| LoadError::UnknownKey { key: key.clone() })?,
            ArrayKey::TumorMask => patient.tumor_mask.as_ref().ok_or_else(not_found)?,
            ArrayKey::BrainMask => patient.brain_mask.as_ref().ok_or_else(not_found)?,
        };
        Ok(array.clone())
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array3;
    use ndarray_npy::write_npy;

    use super::*;

    #[test]
    fn test_file_names_follow_layout() {
        let layout = ArrayLayout::default();
        let key = ArrayKey::Volume(RecordKey::new("T1c", "N4_Healthy"));
        assert_eq!(
            layout.file_name("0004", &key).unwrap(),
            "UCSF-PDGM-0004_T1c_N4_healthy_mask_rescaled.npy"
        );
        assert_eq!(
            layout.file_name("0004", &ArrayKey::TumorMask).unwrap(),
            "UCSF-PDGM-0004_tumor_binary_array.npy"
        );
        assert_eq!(
            layout.file_name("0004", &ArrayKey::BrainMask).unwrap(),
            "UCSF-PDGM-0004_brain_segmentation_array.npy"
        );
        assert_eq!(
            layout.array_dir(Path::new("/data"), "0004"),
            Path::new("/data/UCSF-PDGM-0004_nifti/array")
        );
    }

    #[test]
    fn test_unknown_variant() {
        let layout = ArrayLayout::default();
        let key = ArrayKey::Volume(RecordKey::new("T1", "N3"));
        assert!(matches!(
            layout.file_name("0001", &key),
            Err(LoadError::UnknownVariant { .. })
        ));
    }

    #[test]
    fn test_reads_integer_and_bool_arrays_as_f64() {
        let dir = tempfile::tempdir().unwrap();

        let u16_path = dir.path().join("u16.npy");
        let data = Array3::from_shape_vec((1, 2, 2), vec![0_u16, 7, 300, 65535]).unwrap();
        write_npy(&u16_path, &data).unwrap();
        let read = read_npy_widened(&u16_path).unwrap();
        assert_eq!(read.as_slice().unwrap(), [0.0, 7.0, 300.0, 65535.0]);

        let bool_path = dir.path().join("bool.npy");
        let data = Array3::from_shape_vec((2, 1, 1), vec![true, false]).unwrap();
        write_npy(&bool_path, &data).unwrap();
        let read = read_npy_widened(&bool_path).unwrap();
        assert_eq!(read.as_slice().unwrap(), [1.0, 0.0]);
    }

    #[test]
    fn test_wrong_dimensionality_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flat.npy");
        write_npy(&path, &ndarray::arr1(&[1.0_f64, 2.0])).unwrap();
        assert!(read_npy_widened(&path).is_err());
    }

    #[test]
    fn test_missing_patient_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let loader = NpyArrayLoader::new(dir.path(), ArrayLayout::default());
        assert!(matches!(
            loader.load_array("0001", &ArrayKey::TumorMask),
            Err(LoadError::MissingPatientDir { .. })
        ));

        std::fs::create_dir_all(loader.layout().array_dir(dir.path(), "0001")).unwrap();
        assert!(matches!(
            loader.load_array("0001", &ArrayKey::TumorMask),
            Err(LoadError::NotFound { .. })
        ));
    }
}
