//! Reading the library backup.
//!
//! The backup is a zip file somewhere in the working directory whose
//! sanitized name contains `paperbackarchive`. Inside it, the record whose
//! sanitized name contains `sourcemanga` is a JSON object of title entries
//! keyed by opaque ids.

use crate::error::StartupError;
use crate::helpers::sanitize_name;
use crate::models::LibraryEntry;
use std::fs::{self, File};
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};

const ARCHIVE_MARKER: &str = "paperbackarchive";
const MANGA_LIST_MARKER: &str = "sourcemanga";

/// First regular file in `dir` (by name) whose sanitized name matches the archive marker
pub fn find_archive(dir: &Path) -> Result<PathBuf, StartupError> {
    let not_found = || StartupError::ArchiveNotFound(dir.to_path_buf());
    let mut candidates: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|_| not_found())?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter(|entry| sanitize_name(&entry.file_name().to_string_lossy()).contains(ARCHIVE_MARKER))
        .map(|entry| entry.path())
        .collect();
    candidates.sort();
    candidates.into_iter().next().ok_or_else(not_found)
}

/// Open the archive and parse the manga list record
pub fn read_library(path: &Path) -> Result<Vec<LibraryEntry>, StartupError> {
    let file = File::open(path).map_err(|e| StartupError::ArchiveUnreadable {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    read_library_from(file, path)
}

pub fn read_library_from<R: Read + Seek>(reader: R, path: &Path) -> Result<Vec<LibraryEntry>, StartupError> {
    let unreadable = |e: zip::result::ZipError| StartupError::ArchiveUnreadable {
        path: path.to_path_buf(),
        message: e.to_string(),
    };
    let mut archive = zip::ZipArchive::new(reader).map_err(unreadable)?;

    for index in 0..archive.len() {
        let mut file = archive.by_index(index).map_err(unreadable)?;
        if !file.is_file() {
            continue;
        }
        let name = file.name().rsplit('/').next().unwrap_or_default().to_string();
        if !sanitize_name(&name).contains(MANGA_LIST_MARKER) {
            continue;
        }

        log::info!("Reading manga list from {} in {}", name, path.display());
        let mut content = String::new();
        file.read_to_string(&mut content)
            .map_err(|e| StartupError::ArchiveUnreadable {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        return parse_manga_list(&content);
    }

    Err(StartupError::ManifestNotFound(path.to_path_buf()))
}

/// The record is an object; its values are the entries, in file order
pub fn parse_manga_list(content: &str) -> Result<Vec<LibraryEntry>, StartupError> {
    let records: serde_json::Map<String, serde_json::Value> = serde_json::from_str(content)?;
    let mut entries = Vec::with_capacity(records.len());
    for (key, value) in records {
        match serde_json::from_value::<LibraryEntry>(value) {
            Ok(entry) => entries.push(entry),
            Err(e) => log::warn!("Skipping malformed library record {}: {}", key, e),
        }
    }
    Ok(entries)
}
