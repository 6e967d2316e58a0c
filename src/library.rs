use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::{ConversionMode, Handle, LibraryType};
use crate::error::UploadError;
use crate::handle::{HandleRegistrar, register_handle};
use crate::shock::BlobStore;
use crate::sra::ArchiveConverter;
use crate::validate::inspect_sequence_file;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PairedEndLibrary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interleaved: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insert_size_mean: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insert_size_std_dev: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_orientation_outward: Option<u8>,
    pub handle_1: Handle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle_2: Option<Handle>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SingleEndLibrary {
    pub handle: Handle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReferenceAssembly {
    pub handle: Handle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_name: Option<String>,
}

/// The descriptor written to the output file. Serialized without a tag; the
/// library kind is implied by the field set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LibraryRecord {
    PairedEnd(PairedEndLibrary),
    SingleEnd(SingleEndLibrary),
    ReferenceAssembly(ReferenceAssembly),
}

impl LibraryRecord {
    pub fn library_type(&self) -> LibraryType {
        match self {
            LibraryRecord::PairedEnd(_) => LibraryType::PairedEnd,
            LibraryRecord::SingleEnd(_) => LibraryType::SingleEnd,
            LibraryRecord::ReferenceAssembly(_) => LibraryType::ReferenceAssembly,
        }
    }

    pub fn handles(&self) -> Vec<&Handle> {
        match self {
            LibraryRecord::PairedEnd(lib) => {
                let mut handles = vec![&lib.handle_1];
                handles.extend(lib.handle_2.as_ref());
                handles
            }
            LibraryRecord::SingleEnd(lib) => vec![&lib.handle],
            LibraryRecord::ReferenceAssembly(lib) => vec![&lib.handle],
        }
    }

    /// Parses a record back from JSON for a known library kind.
    pub fn from_json(library_type: LibraryType, json: &str) -> Result<Self, serde_json::Error> {
        Ok(match library_type {
            LibraryType::PairedEnd => LibraryRecord::PairedEnd(serde_json::from_str(json)?),
            LibraryType::SingleEnd => LibraryRecord::SingleEnd(serde_json::from_str(json)?),
            LibraryType::ReferenceAssembly => {
                LibraryRecord::ReferenceAssembly(serde_json::from_str(json)?)
            }
        })
    }
}

#[derive(Debug, Clone)]
pub struct LibraryRequest {
    pub library_type: LibraryType,
    pub input_files: Vec<PathBuf>,
    pub convert_sra: bool,
    pub insert_size_mean: Option<f64>,
    pub insert_size_std_dev: Option<f64>,
    pub read_orientation_outward: Option<u8>,
    pub reference_name: Option<String>,
}

impl LibraryRequest {
    pub fn new(library_type: LibraryType, input_files: Vec<PathBuf>) -> Self {
        Self {
            library_type,
            input_files,
            convert_sra: false,
            insert_size_mean: None,
            insert_size_std_dev: None,
            read_orientation_outward: None,
            reference_name: None,
        }
    }

    fn check_input_count(&self) -> Result<(), UploadError> {
        let count = self.input_files.len();
        if !(1..=2).contains(&count) {
            return Err(UploadError::InvalidArguments(format!(
                "expected one or two input files, got {count}"
            )));
        }
        if count == 2 && self.library_type != LibraryType::PairedEnd {
            return Err(UploadError::InvalidArguments(format!(
                "{} takes exactly one input file",
                self.library_type
            )));
        }
        Ok(())
    }
}

pub struct Assembler<S: BlobStore, R: HandleRegistrar, C: ArchiveConverter> {
    store: S,
    registrar: Option<R>,
    converter: C,
}

impl<S: BlobStore, R: HandleRegistrar, C: ArchiveConverter> Assembler<S, R, C> {
    pub fn new(store: S, registrar: Option<R>, converter: C) -> Self {
        Self {
            store,
            registrar,
            converter,
        }
    }

    pub fn assemble(&self, request: &LibraryRequest) -> Result<LibraryRecord, UploadError> {
        request.check_input_count()?;
        info!(
            library = %request.library_type,
            inputs = request.input_files.len(),
            convert_sra = request.convert_sra,
            "assembling library"
        );

        match request.library_type {
            LibraryType::PairedEnd => self.paired_end(request).map(LibraryRecord::PairedEnd),
            LibraryType::SingleEnd => self.single_end(request).map(LibraryRecord::SingleEnd),
            LibraryType::ReferenceAssembly => self
                .reference_assembly(request)
                .map(LibraryRecord::ReferenceAssembly),
        }
    }

    fn paired_end(&self, request: &LibraryRequest) -> Result<PairedEndLibrary, UploadError> {
        let files = if request.convert_sra {
            self.converter
                .convert(&request.input_files, ConversionMode::Paired)?
        } else {
            request.input_files.clone()
        };
        let interleaved = (files.len() == 1).then_some(1);

        let mut handles = self.stage_all(&files)?.into_iter();
        let handle_1 = handles.next().ok_or_else(|| {
            UploadError::InvalidArguments("no read files to upload".to_string())
        })?;
        let handle_2 = handles.next();

        Ok(PairedEndLibrary {
            interleaved,
            insert_size_mean: request.insert_size_mean,
            insert_size_std_dev: request.insert_size_std_dev,
            read_orientation_outward: request.read_orientation_outward,
            handle_1,
            handle_2,
        })
    }

    fn single_end(&self, request: &LibraryRequest) -> Result<SingleEndLibrary, UploadError> {
        let files = if request.convert_sra {
            self.converter
                .convert(&request.input_files, ConversionMode::Single)?
        } else {
            request.input_files.clone()
        };
        let handle = self.stage_one(&files)?;
        Ok(SingleEndLibrary { handle })
    }

    fn reference_assembly(
        &self,
        request: &LibraryRequest,
    ) -> Result<ReferenceAssembly, UploadError> {
        if request.convert_sra {
            warn!("SRA conversion does not apply to reference assemblies, ignoring");
        }
        let handle = self.stage_one(&request.input_files)?;
        Ok(ReferenceAssembly {
            handle,
            reference_name: request.reference_name.clone(),
        })
    }

    fn stage_one(&self, files: &[PathBuf]) -> Result<Handle, UploadError> {
        self.stage_all(files)?.into_iter().next().ok_or_else(|| {
            UploadError::InvalidArguments("no sequence file to upload".to_string())
        })
    }

    /// Validates every file up front so a bad second file fails before the
    /// first one is uploaded.
    fn stage_all(&self, files: &[PathBuf]) -> Result<Vec<Handle>, UploadError> {
        let placeholders = files
            .iter()
            .map(|path| inspect_sequence_file(path))
            .collect::<Result<Vec<_>, UploadError>>()?;
        placeholders
            .into_iter()
            .map(|handle| self.upload_and_register(handle))
            .collect()
    }

    fn upload_and_register(&self, mut handle: Handle) -> Result<Handle, UploadError> {
        let path = handle
            .local_path()
            .map(Path::to_path_buf)
            .ok_or_else(|| UploadError::InvalidFile(handle.file_name.clone()))?;
        let id = self.store.upload(&path)?;
        handle.mark_uploaded(self.store.url(), id);
        register_handle(handle, self.registrar.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn input_count_rules() {
        let none = LibraryRequest::new(LibraryType::PairedEnd, Vec::new());
        assert_matches!(
            none.check_input_count(),
            Err(UploadError::InvalidArguments(_))
        );

        let three = LibraryRequest::new(
            LibraryType::PairedEnd,
            vec!["a.fq".into(), "b.fq".into(), "c.fq".into()],
        );
        assert_matches!(
            three.check_input_count(),
            Err(UploadError::InvalidArguments(_))
        );

        let two_single =
            LibraryRequest::new(LibraryType::SingleEnd, vec!["a.fq".into(), "b.fq".into()]);
        assert_matches!(
            two_single.check_input_count(),
            Err(UploadError::InvalidArguments(_))
        );

        let two_paired =
            LibraryRequest::new(LibraryType::PairedEnd, vec!["a.fq".into(), "b.fq".into()]);
        assert!(two_paired.check_input_count().is_ok());
    }
}
