//! Artifact persistence: BOM-prefixed CSV files and single-entry zip archives.
//!
//! Every file is written to a sibling `*.tmp` path and renamed into place
//! once complete, so an interrupted run never leaves a partial artifact
//! under the final name.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use etl_core::error::{EtlError, Result};
use serde::Serialize;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Paths of one persisted stage output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Artifact {
    pub csv_path: PathBuf,
    pub zip_path: PathBuf,
}

impl Artifact {
    /// Artifact named `<stem>.csv` / `<stem>.zip` under `output_dir`.
    pub fn in_dir(output_dir: &Path, stem: &str) -> Self {
        Self {
            csv_path: output_dir.join(format!("{}.csv", stem)),
            zip_path: output_dir.join(format!("{}.zip", stem)),
        }
    }

    /// Name of the CSV inside the archive.
    pub fn entry_name(&self) -> String {
        self.csv_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Write `rows` to the CSV, then package it into the zip.
    pub fn write<I>(&self, delimiter: u8, header: &[&str], rows: I) -> Result<()>
    where
        I: IntoIterator<Item = Vec<String>>,
    {
        write_csv(&self.csv_path, delimiter, header, rows)?;
        write_zip(&self.zip_path, &self.entry_name(), &self.csv_path)
    }
}

/// Write a UTF-8 CSV with a byte-order mark.
pub fn write_csv<I>(path: &Path, delimiter: u8, header: &[&str], rows: I) -> Result<()>
where
    I: IntoIterator<Item = Vec<String>>,
{
    write_atomically(path, |file| {
        file.write_all(UTF8_BOM)?;
        let mut wtr = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_writer(file);
        wtr.write_record(header)?;
        for row in rows {
            wtr.write_record(&row)?;
        }
        wtr.flush()?;
        Ok(())
    })
}

/// Package `source` into a zip holding the single entry `entry_name`.
///
/// The entry's modification time is pinned to the zip epoch (1980-01-01) so
/// that identical input produces an identical archive.
pub fn write_zip(zip_path: &Path, entry_name: &str, source: &Path) -> Result<()> {
    let mut input = File::open(source).map_err(|e| EtlError::FileRead {
        path: source.to_path_buf(),
        source: e,
    })?;

    write_atomically(zip_path, |file| {
        let mut zip = ZipWriter::new(file);
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(zip::DateTime::default());
        zip.start_file(entry_name, options)?;
        std::io::copy(&mut input, &mut zip)?;
        zip.finish()?;
        Ok(())
    })
}

/// Run `fill` against a temp file next to `path`, then rename it over `path`.
fn write_atomically<F>(path: &Path, fill: F) -> Result<()>
where
    F: FnOnce(&mut File) -> Result<()>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| EtlError::FileWrite {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let tmp = tmp_path(path);
    let mut file = File::create(&tmp).map_err(|source| EtlError::FileWrite {
        path: tmp.clone(),
        source,
    })?;

    let written = fill(&mut file).and_then(|_| Ok(file.sync_all()?));
    drop(file);

    if let Err(e) = written {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }

    std::fs::rename(&tmp, path).map_err(|source| EtlError::FileWrite {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("Wrote {}", path.display());
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
