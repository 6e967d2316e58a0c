use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{info, warn};

use crate::domain::ConversionMode;
use crate::error::UploadError;

pub const DEFAULT_CONVERTER: &str = "fastq-dump";

pub trait ArchiveConverter: Send + Sync {
    /// Converts exactly one archive, returning the produced read files.
    fn convert_archive(
        &self,
        archive: &Path,
        mode: ConversionMode,
    ) -> Result<Vec<PathBuf>, UploadError>;

    fn convert(
        &self,
        inputs: &[PathBuf],
        mode: ConversionMode,
    ) -> Result<Vec<PathBuf>, UploadError> {
        match inputs {
            [archive] => self.convert_archive(archive, mode),
            [] => Err(UploadError::InvalidArguments(
                "no SRA archive supplied for conversion".to_string(),
            )),
            many => Err(UploadError::MultiArchiveUnsupported(many.len())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SystemArchiveConverter {
    program: PathBuf,
    output_dir: Option<PathBuf>,
}

impl SystemArchiveConverter {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            output_dir: None,
        }
    }

    /// Writes converted reads here instead of next to the archive.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn output_dir_for(&self, archive: &Path) -> PathBuf {
        match &self.output_dir {
            Some(dir) => dir.clone(),
            None => archive
                .parent()
                .filter(|parent| !parent.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }

    fn run_cmd(&self, args: &[OsString]) -> Result<(), UploadError> {
        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|err| {
                UploadError::ConverterProcessFailed(format!(
                    "unable to start {}: {err}",
                    self.program.display()
                ))
            })?;
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        match output.status.code() {
            Some(0) => Ok(()),
            Some(code) => {
                warn!(
                    program = %self.program.display(),
                    code,
                    stderr = %stderr,
                    "converter exited with non-zero status"
                );
                Ok(())
            }
            None => {
                let message = if stderr.is_empty() {
                    format!("{} terminated by a signal", self.program.display())
                } else {
                    format!("{} terminated by a signal: {stderr}", self.program.display())
                };
                Err(UploadError::ConverterProcessFailed(message))
            }
        }
    }
}

impl Default for SystemArchiveConverter {
    fn default() -> Self {
        Self::new(DEFAULT_CONVERTER)
    }
}

impl ArchiveConverter for SystemArchiveConverter {
    fn convert_archive(
        &self,
        archive: &Path,
        mode: ConversionMode,
    ) -> Result<Vec<PathBuf>, UploadError> {
        let out_dir = self.output_dir_for(archive);
        let expected = expected_outputs(archive, mode, &out_dir)?;
        info!(
            archive = %archive.display(),
            program = %self.program.display(),
            ?mode,
            "converting SRA archive"
        );
        self.run_cmd(&converter_args(archive, mode, &out_dir))?;

        if let Some(missing) = expected.iter().find(|path| !path.is_file()) {
            return Err(UploadError::ConverterOutputMissing(missing.clone()));
        }
        Ok(expected)
    }
}

/// `<stem>.fastq` for single mode, `<stem>_1.fastq` and `<stem>_2.fastq` for
/// paired mode, where the stem is the archive name minus its extension.
pub fn expected_outputs(
    archive: &Path,
    mode: ConversionMode,
    out_dir: &Path,
) -> Result<Vec<PathBuf>, UploadError> {
    let stem = archive
        .file_stem()
        .and_then(|value| value.to_str())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| UploadError::InvalidFile(archive.display().to_string()))?;
    let outputs = match mode {
        ConversionMode::Single => vec![out_dir.join(format!("{stem}.fastq"))],
        ConversionMode::Paired => vec![
            out_dir.join(format!("{stem}_1.fastq")),
            out_dir.join(format!("{stem}_2.fastq")),
        ],
    };
    Ok(outputs)
}

pub fn converter_args(archive: &Path, mode: ConversionMode, out_dir: &Path) -> Vec<OsString> {
    let mut args = vec![
        archive.as_os_str().to_os_string(),
        OsString::from("--outdir"),
        out_dir.as_os_str().to_os_string(),
    ];
    if mode == ConversionMode::Paired {
        args.push(OsString::from("--split-files"));
    }
    args
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn paired_outputs_use_split_suffixes() {
        let outputs = expected_outputs(
            Path::new("/data/SRR014966.sra"),
            ConversionMode::Paired,
            Path::new("/out"),
        )
        .unwrap();
        assert_eq!(
            outputs,
            vec![
                PathBuf::from("/out/SRR014966_1.fastq"),
                PathBuf::from("/out/SRR014966_2.fastq"),
            ]
        );
    }

    #[test]
    fn single_output_replaces_extension() {
        let outputs = expected_outputs(
            Path::new("SRR014966.sra"),
            ConversionMode::Single,
            Path::new("."),
        )
        .unwrap();
        assert_eq!(outputs, vec![PathBuf::from("./SRR014966.fastq")]);
    }

    #[test]
    fn split_flag_only_in_paired_mode() {
        let archive = Path::new("/data/run.sra");
        let out = Path::new("/data");
        let single = converter_args(archive, ConversionMode::Single, out);
        let paired = converter_args(archive, ConversionMode::Paired, out);
        assert_eq!(single.len(), 3);
        assert_eq!(paired.last().unwrap(), "--split-files");
    }

    #[test]
    fn default_output_dir_is_archive_parent() {
        let converter = SystemArchiveConverter::default();
        assert_eq!(converter.program(), Path::new(DEFAULT_CONVERTER));
        assert_eq!(
            converter.output_dir_for(Path::new("/data/run.sra")),
            PathBuf::from("/data")
        );
        assert_eq!(
            converter.output_dir_for(Path::new("run.sra")),
            PathBuf::from(".")
        );
    }

    #[test]
    fn more_than_one_archive_is_refused() {
        let converter = SystemArchiveConverter::default();
        let inputs = vec![PathBuf::from("a.sra"), PathBuf::from("b.sra")];
        let err = converter
            .convert(&inputs, ConversionMode::Paired)
            .unwrap_err();
        assert_matches!(err, UploadError::MultiArchiveUnsupported(2));
    }
}
