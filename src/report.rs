//! CSV output for human review.
//!
//! Files are written to a temporary file beside the destination and persisted
//! only once every row is written, so a failed run never leaves a partial CSV.

use csv::{Writer, WriterBuilder};
use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::info;

use crate::constants::TUN_PREFIX;
use crate::error::{CheckError, Result};
use crate::summary::{ProvinceSummaryRow, SpecimenEntry, SpeciesSummaryRow};
use crate::types::{AnomalyRecord, ProvinceNames};

pub const ANOMALY_HEADERS: [&str; 11] = [
    "classification",
    "species",
    "speciesName",
    "province",
    "provinceName",
    "occurrenceCode",
    "specimen",
    "document",
    "modifiedDate",
    "collectedDate",
    "reliability",
];

pub const PROVINCE_SUMMARY_HEADERS: [&str; 8] = [
    "species",
    "speciesName",
    "province",
    "occurrenceCode",
    "specimens",
    "modifiedDate",
    "collectedDate",
    "reliability",
];

pub const FINLAND_SUMMARY_HEADERS: [&str; 6] = [
    "species",
    "speciesName",
    "specimens",
    "modifiedDate",
    "collectedDate",
    "reliability",
];

/// CSV writer that only replaces the destination on [`AtomicCsvWriter::finish`].
/// Dropping it unfinished deletes the temporary file.
pub struct AtomicCsvWriter {
    writer: Writer<BufWriter<NamedTempFile>>,
    final_path: PathBuf,
    rows: usize,
}

impl AtomicCsvWriter {
    pub fn create(final_path: impl AsRef<Path>, headers: &[&str]) -> Result<Self> {
        let final_path = final_path.as_ref().to_path_buf();
        let parent = match final_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        if parent.exists() && !parent.is_dir() {
            return Err(CheckError::Config(format!(
                "Output path exists but is not a directory: {}",
                parent.display()
            )));
        }
        fs::create_dir_all(&parent)?;

        let temp_file = NamedTempFile::new_in(&parent)?;
        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .from_writer(BufWriter::new(temp_file));
        writer.write_record(headers)?;

        Ok(Self { writer, final_path, rows: 0 })
    }

    pub fn write_row<I, F>(&mut self, fields: I) -> Result<()>
    where
        I: IntoIterator<Item = F>,
        F: AsRef<[u8]>,
    {
        self.writer.write_record(fields)?;
        self.rows += 1;
        Ok(())
    }

    /// Flush and move the file into place. Returns the path and the number of data rows.
    pub fn finish(self) -> Result<(PathBuf, usize)> {
        let buf_writer = self
            .writer
            .into_inner()
            .map_err(|e| CheckError::Io(std::io::Error::new(e.error().kind(), e.error().to_string())))?;
        let temp_file = buf_writer.into_inner().map_err(|e| e.into_error())?;
        temp_file
            .persist(&self.final_path)
            .map_err(|e| CheckError::Io(e.error))?;
        Ok((self.final_path, self.rows))
    }
}

/// One row per anomaly, in comparator order. Returns the number of rows written.
pub fn write_anomalies(
    path: &Path,
    anomalies: &[AnomalyRecord],
    provinces: &ProvinceNames,
) -> Result<usize> {
    let mut out = AtomicCsvWriter::create(path, &ANOMALY_HEADERS)?;
    for anomaly in anomalies {
        let r = &anomaly.record;
        let province = r.province_id.as_deref().unwrap_or("");
        out.write_row([
            anomaly.classification.as_str(),
            r.species_id.as_deref().unwrap_or(""),
            r.species_name.as_str(),
            province,
            province_name(provinces, province),
            anomaly.occurrence_code.as_str(),
            r.specimen_id.as_str(),
            r.document_id.as_str(),
            r.modified_date.as_str(),
            r.collected_date.as_str(),
            r.reliability.as_str(),
        ])?;
    }
    let (path, rows) = out.finish()?;
    info!("Wrote {} anomalies to {}", rows, path.display());
    Ok(rows)
}

/// Grouped species/province sheet with species URIs and province names.
pub fn write_province_summary(
    path: &Path,
    rows: &[ProvinceSummaryRow],
    provinces: &ProvinceNames,
) -> Result<usize> {
    let mut out = AtomicCsvWriter::create(path, &PROVINCE_SUMMARY_HEADERS)?;
    for row in rows {
        let [specimens, modified, collected, reliability] = join_specimens(&row.specimens);
        out.write_row([
            species_uri(&row.species_id),
            row.species_name.clone(),
            province_name(provinces, &row.province_id).to_string(),
            row.occurrence_code.clone(),
            specimens,
            modified,
            collected,
            reliability,
        ])?;
    }
    let (path, written) = out.finish()?;
    info!("Wrote {} species/province rows to {}", written, path.display());
    Ok(written)
}

pub fn write_finland_summary(path: &Path, rows: &[SpeciesSummaryRow]) -> Result<usize> {
    let mut out = AtomicCsvWriter::create(path, &FINLAND_SUMMARY_HEADERS)?;
    for row in rows {
        let [specimens, modified, collected, reliability] = join_specimens(&row.specimens);
        out.write_row([
            species_uri(&row.species_id),
            row.species_name.clone(),
            specimens,
            modified,
            collected,
            reliability,
        ])?;
    }
    let (path, written) = out.finish()?;
    info!("Wrote {} species rows to {}", written, path.display());
    Ok(written)
}

fn province_name<'a>(provinces: &'a ProvinceNames, id: &'a str) -> &'a str {
    provinces.get(id).map(String::as_str).unwrap_or(id)
}

fn species_uri(species_id: &str) -> String {
    format!("{}{}", TUN_PREFIX, species_id)
}

// Space separated, one entry per specimen, same order in every column
fn join_specimens(specimens: &[SpecimenEntry]) -> [String; 4] {
    [
        join_field(specimens, |s| s.specimen_id.as_str()),
        join_field(specimens, |s| s.modified_date.as_str()),
        join_field(specimens, |s| s.collected_date.as_str()),
        join_field(specimens, |s| s.reliability.as_str()),
    ]
}

fn join_field(specimens: &[SpecimenEntry], field: impl Fn(&SpecimenEntry) -> &str) -> String {
    specimens.iter().map(field).collect::<Vec<_>>().join(" ")
}
