use std::path::Path;

use tracing::debug;

use crate::domain::Handle;
use crate::error::UploadError;

/// Checked in order; the first match wins.
const COMPRESSION_SUFFIXES: [&str; 6] = ["gz", "gzip", "bzip", "bzip2", "bz", "bz2"];
const ARCHIVE_SUFFIXES: [&str; 2] = ["zip", "tar"];
const SEQUENCE_SUFFIXES: [&str; 8] = [
    "fasta", "fastq", "fas", "fa", "fq", "fna", "bas.h5", "bax.h5",
];

/// Inspects a local sequence file and returns an upload placeholder for it.
///
/// The file name keeps its compression suffix; the suffix is only stripped to
/// decide whether the underlying format is one we accept.
pub fn inspect_sequence_file(path: &Path) -> Result<Handle, UploadError> {
    if path.as_os_str().is_empty() {
        return Err(UploadError::InvalidFile("empty path".to_string()));
    }
    if !path.is_file() {
        return Err(UploadError::InvalidFile(format!(
            "{} does not exist or is not a regular file",
            path.display()
        )));
    }
    let file_name = path
        .file_name()
        .and_then(|value| value.to_str())
        .ok_or_else(|| UploadError::InvalidFile(path.display().to_string()))?
        .to_string();

    let logical = logical_name(&file_name);
    if !is_sequence_name(&logical) {
        return Err(UploadError::UnrecognizedFileType(file_name));
    }

    let absolute = std::path::absolute(path)
        .map_err(|err| UploadError::InvalidFile(format!("{}: {err}", path.display())))?;
    debug!(file = %absolute.display(), logical = %logical, "accepted sequence file");
    Ok(Handle::placeholder(absolute, file_name))
}

/// Lowercased file name with one compression suffix and then one archive
/// suffix removed, e.g. `Reads.FASTQ.tar.gz` -> `reads.fastq`.
pub fn logical_name(file_name: &str) -> String {
    let lowered = file_name.to_ascii_lowercase();
    let without_compression = strip_first_suffix(&lowered, &COMPRESSION_SUFFIXES);
    strip_first_suffix(without_compression, &ARCHIVE_SUFFIXES).to_string()
}

pub fn is_sequence_name(logical: &str) -> bool {
    SEQUENCE_SUFFIXES.iter().any(|ext| {
        logical
            .strip_suffix(ext)
            .map(|rest| rest.ends_with('.'))
            .unwrap_or(false)
    })
}

fn strip_first_suffix<'a>(name: &'a str, suffixes: &[&str]) -> &'a str {
    suffixes
        .iter()
        .find_map(|ext| name.strip_suffix(ext).and_then(|rest| rest.strip_suffix('.')))
        .unwrap_or(name)
}
