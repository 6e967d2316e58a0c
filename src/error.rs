use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum UploadError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("invalid input file: {0}")]
    InvalidFile(String),

    #[error("unrecognized sequence file type: {0}")]
    UnrecognizedFileType(String),

    #[error("unknown library type: {0}")]
    #[diagnostic(help("expected one of PairedEndLibrary, SingleEndLibrary, ReferenceAssembly"))]
    UnknownLibraryType(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("only one SRA archive can be converted per invocation, got {0}")]
    MultiArchiveUnsupported(usize),

    #[error("sra conversion failed: {0}")]
    ConverterProcessFailed(String),

    #[error("sra conversion did not produce {0}")]
    ConverterOutputMissing(PathBuf),

    #[error("shock upload failed: {0}")]
    UploadConnectionFailed(String),

    #[error("shock returned an empty response for {0}")]
    UploadEmptyResponse(PathBuf),

    #[error("shock returned an unreadable response: {0}")]
    UploadResponseInvalid(String),

    #[error("shock returned status {status}: {message}")]
    UploadRejected { status: i64, message: String },

    #[error("handle registration failed: {0}")]
    RegistrationFailed(String),

    #[error("failed to write output file {path}: {message}")]
    OutputWriteFailed { path: PathBuf, message: String },
}
