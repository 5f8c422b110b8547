//! Long-form cohort table and its CSV representation.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs::File,
    io,
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::key::{CorrectionVariant, Modality};

/// One row of the cohort table.
///
/// A missing value is written as an empty CSV field, never as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReductionRecord {
    pub patient_id: String,
    pub modality: Modality,
    pub correction_variant: CorrectionVariant,
    pub statistic_name: String,
    pub value: Option<f64>,
}

/// Append-only table of [`ReductionRecord`]s. Row order carries no meaning.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CohortTable {
    records: Vec<ReductionRecord>,
}

impl CohortTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: ReductionRecord) {
        self.records.push(record);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn records(&self) -> &[ReductionRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReductionRecord> {
        self.records.iter()
    }

    /// Distinct patient ids, sorted.
    #[must_use]
    pub fn patient_ids(&self) -> BTreeSet<&str> {
        self.records.iter().map(|r| r.patient_id.as_str()).collect()
    }

    #[must_use]
    pub fn modalities(&self) -> BTreeSet<&Modality> {
        self.records.iter().map(|r| &r.modality).collect()
    }

    #[must_use]
    pub fn statistic_names(&self) -> BTreeSet<&str> {
        self.records
            .iter()
            .map(|r| r.statistic_name.as_str())
            .collect()
    }

    /// Rows of one (modality, statistic) slice grouped by correction variant.
    ///
    /// Every variant present in the slice gets an entry, even if all of its
    /// values are missing.
    #[must_use]
    pub fn slice_by_variant(
        &self,
        modality: &Modality,
        statistic_name: &str,
    ) -> BTreeMap<&CorrectionVariant, Vec<&ReductionRecord>> {
        let mut groups = BTreeMap::<_, Vec<_>>::new();
        for record in &self.records {
            if record.modality == *modality && record.statistic_name == statistic_name {
                groups
                    .entry(&record.correction_variant)
                    .or_default()
                    .push(record);
            }
        }
        groups
    }

    pub fn write_csv<W>(&self, writer: W) -> Result<(), csv::Error>
    where
        W: io::Write,
    {
        let mut writer = csv::Writer::from_writer(writer);
        for record in &self.records {
            writer.serialize(record)?;
        }
        if self.records.is_empty() {
            writer.write_record([
                "patient_id",
                "modality",
                "correction_variant",
                "statistic_name",
                "value",
            ])?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn read_csv<R>(reader: R) -> Result<Self, csv::Error>
    where
        R: io::Read,
    {
        let mut reader = csv::Reader::from_reader(reader);
        let records = reader
            .deserialize()
            .collect::<Result<Vec<ReductionRecord>, _>>()?;
        Ok(Self { records })
    }

    pub fn write_csv_file(&self, path: &Path) -> Result<(), csv::Error> {
        self.write_csv(io::BufWriter::new(File::create(path)?))
    }

    pub fn read_csv_file(path: &Path) -> Result<Self, csv::Error> {
        Self::read_csv(io::BufReader::new(File::open(path)?))
    }
}

impl Extend<ReductionRecord> for CohortTable {
    fn extend<T: IntoIterator<Item = ReductionRecord>>(&mut self, iter: T) {
        self.records.extend(iter);
    }
}

impl FromIterator<ReductionRecord> for CohortTable {
    fn from_iter<T: IntoIterator<Item = ReductionRecord>>(iter: T) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}
