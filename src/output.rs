use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::error::UploadError;
use crate::library::LibraryRecord;

pub struct JsonOutput;

impl JsonOutput {
    pub fn write_record(record: &LibraryRecord, path: &Path) -> Result<(), UploadError> {
        Self::write_json(record, path).map_err(|err| UploadError::OutputWriteFailed {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        info!(
            output = %path.display(),
            library = %record.library_type(),
            "wrote library record"
        );
        Ok(())
    }

    fn write_json<T: Serialize>(value: &T, path: &Path) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        file.write_all(b"\n")?;
        file.flush()
    }
}
