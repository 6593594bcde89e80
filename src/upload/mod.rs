//! Upload of TEI files into the record store
//!
//! Files are read and checked in parallel; the join over the whole batch
//! completes before anything is written, then each accepted file is stored
//! on its own. A failed file never undoes the ones already stored.

use crate::merge::check_document;
use crate::models::{BulkReport, NewRecord};
use crate::store::RecordStore;
use crate::{Result, TeiViewerError};
use log::{debug, warn};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// MIME types accepted for upload
pub const XML_MIME_TYPES: &[&str] = &["text/xml", "application/xml", "application/tei+xml"];

/// A file selected for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    pub mime: String,
    pub contents: String,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            contents: contents.into(),
        }
    }

    /// Read a file from disk, inferring its MIME type from the extension
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let contents = std::fs::read_to_string(path)?;
        Ok(Self {
            name,
            mime: mime_for_path(path).to_string(),
            contents,
        })
    }
}

/// Options applied to an upload batch
#[derive(Debug, Clone, Copy, Default)]
pub struct UploadOptions {
    /// Reject files whose name is already stored
    pub unique_filenames: bool,
}

/// MIME type for a path, by extension
pub fn mime_for_path(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .as_deref()
    {
        Some("xml") | Some("tei") => "text/xml",
        Some("txt") => "text/plain",
        Some("json") => "application/json",
        Some("html") | Some("htm") => "text/html",
        _ => "application/octet-stream",
    }
}

pub fn is_xml_mime(mime: &str) -> bool {
    let mime = mime.split(';').next().unwrap_or("").trim().to_lowercase();
    XML_MIME_TYPES.contains(&mime.as_str())
}

/// Check one file before it is stored
pub fn validate(file: &UploadFile) -> Result<()> {
    if !is_xml_mime(&file.mime) {
        return Err(TeiViewerError::Validation(format!(
            "{} is not a valid XML file",
            file.name
        )));
    }

    check_document(&file.name, &file.contents)
}

/// Read files from disk in parallel, keeping input order
pub fn read_files(paths: &[PathBuf]) -> Vec<(String, Result<UploadFile>)> {
    paths
        .par_iter()
        .map(|path| (path.display().to_string(), UploadFile::read(path)))
        .collect()
}

/// Validate and store a batch of files
pub fn upload(store: &RecordStore, files: Vec<UploadFile>, options: UploadOptions) -> BulkReport {
    let checked: Vec<(UploadFile, Result<()>)> = files
        .into_par_iter()
        .map(|file| {
            let result = validate(&file);
            (file, result)
        })
        .collect();

    let mut report = BulkReport::default();
    for (file, checked) in checked {
        match checked.and_then(|_| store_file(store, &file, options)) {
            Ok(id) => {
                debug!("Stored {} as record {}", file.name, id);
                report.record_success(id);
            }
            Err(e) => {
                warn!("Upload of {} rejected: {}", file.name, e);
                report.record_failure(file.name, e);
            }
        }
    }
    report
}

fn store_file(store: &RecordStore, file: &UploadFile, options: UploadOptions) -> Result<i64> {
    if options.unique_filenames && store.contains_filename(&file.name)? {
        return Err(TeiViewerError::Validation(format!(
            "A file with the name {} has already been uploaded.",
            file.name
        )));
    }
    let record = store.add(NewRecord::new(file.name.clone(), file.contents.clone()))?;
    Ok(record.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_for_path() {
        assert_eq!(mime_for_path(Path::new("a.xml")), "text/xml");
        assert_eq!(mime_for_path(Path::new("A.XML")), "text/xml");
        assert_eq!(mime_for_path(Path::new("notes.txt")), "text/plain");
        assert_eq!(mime_for_path(Path::new("noext")), "application/octet-stream");
    }

    #[test]
    fn test_is_xml_mime() {
        assert!(is_xml_mime("text/xml"));
        assert!(is_xml_mime("application/xml; charset=utf-8"));
        assert!(!is_xml_mime("text/plain"));
    }

    #[test]
    fn test_validate() {
        assert!(validate(&UploadFile::new("a.xml", "text/xml", "<TEI/>")).is_ok());

        let err = validate(&UploadFile::new("a.txt", "text/plain", "<TEI/>")).unwrap_err();
        assert!(matches!(err, TeiViewerError::Validation(_)));
        assert_eq!(err.to_string(), "a.txt is not a valid XML file");

        let err = validate(&UploadFile::new("b.xml", "text/xml", "<TEI>")).unwrap_err();
        assert!(matches!(err, TeiViewerError::Parse(_)));
    }

    #[test]
    fn test_doctype_upload() {
        let store = RecordStore::memory();
        let report = upload(
            &store,
            vec![
                UploadFile::new(
                    "a.xml",
                    "text/xml",
                    "<?xml version=\"1.0\"?>\n<!DOCTYPE TEI>\n<TEI><text>A</text></TEI>",
                ),
                UploadFile::new(
                    "b.xml",
                    "text/xml",
                    "<!DOCTYPE TEI [<!ENTITY x \"y\">]><TEI>&x;</TEI>",
                ),
            ],
            UploadOptions::default(),
        );

        assert_eq!(report.succeeded.len(), 1);
        assert_eq!(report.failed[0].item, "b.xml");
        assert!(matches!(report.failed[0].error, TeiViewerError::Validation(_)));
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_plain_text_does_not_change_count() {
        let store = RecordStore::memory();
        let before = store.count().unwrap();

        let report = upload(
            &store,
            vec![UploadFile::new("notes.txt", "text/plain", "hello")],
            UploadOptions::default(),
        );

        assert_eq!(report.failed.len(), 1);
        assert_eq!(store.count().unwrap(), before);
    }

    #[test]
    fn test_partial_batch_keeps_good_files() {
        let store = RecordStore::memory();
        let report = upload(
            &store,
            vec![
                UploadFile::new("a.xml", "text/xml", "<TEI>A</TEI>"),
                UploadFile::new("b.txt", "text/plain", "B"),
                UploadFile::new("c.xml", "text/xml", "<TEI>C</TEI>"),
            ],
            UploadOptions::default(),
        );

        assert_eq!(report.succeeded.len(), 2);
        assert_eq!(report.failed[0].item, "b.txt");
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_unique_filenames() {
        let store = RecordStore::memory();
        let options = UploadOptions { unique_filenames: true };

        upload(&store, vec![UploadFile::new("a.xml", "text/xml", "<TEI/>")], options);
        let report = upload(&store, vec![UploadFile::new("a.xml", "text/xml", "<TEI/>")], options);

        assert!(!report.is_success());
        assert!(report.failed[0].error.to_string().contains("already been uploaded"));
        assert_eq!(store.count().unwrap(), 1);

        let report = upload(
            &store,
            vec![UploadFile::new("a.xml", "text/xml", "<TEI/>")],
            UploadOptions::default(),
        );
        assert!(report.is_success());
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_read_files() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("a.xml");
        std::fs::write(&good, "<TEI/>").unwrap();
        let missing = dir.path().join("missing.xml");

        let results = read_files(&[good, missing]);
        assert_eq!(results.len(), 2);

        let file = results[0].1.as_ref().unwrap();
        assert_eq!(file.name, "a.xml");
        assert_eq!(file.mime, "text/xml");
        assert!(results[1].1.is_err());
    }
}
