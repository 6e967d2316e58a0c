use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use shock_reads_upload::config::{ConfigLoader, ConfigOverrides, TOKEN_ENV};
use shock_reads_upload::domain::LibraryType;
use shock_reads_upload::error::UploadError;
use shock_reads_upload::handle::HandleServiceClient;
use shock_reads_upload::library::{Assembler, LibraryRequest};
use shock_reads_upload::output::JsonOutput;
use shock_reads_upload::shock::ShockHttpClient;
use shock_reads_upload::sra::SystemArchiveConverter;

#[derive(Parser)]
#[command(name = "shock-upload")]
#[command(about = "Upload reads or a reference assembly to Shock and write a library descriptor")]
#[command(version)]
struct Cli {
    /// Shock service URL [default: https://kbase.us/services/shock-api]
    #[arg(short = 's', long = "shock_service_url")]
    shock_service_url: Option<String>,

    /// Handle service URL, empty to skip registration
    /// [default: https://kbase.us/services/handle_service]
    #[arg(short = 'n', long = "handle_service_url")]
    handle_service_url: Option<String>,

    #[arg(short = 'o', long = "output_file_name")]
    output_file_name: PathBuf,

    /// Input sequence file, give twice for paired reads
    #[arg(short = 'f', long = "input_file_name", required = true)]
    input_file_name: Vec<PathBuf>,

    /// PairedEndLibrary, SingleEndLibrary or ReferenceAssembly
    #[arg(short = 't', long = "type")]
    library_type: String,

    /// Auth token, falls back to KB_AUTH_TOKEN
    #[arg(long)]
    token: Option<String>,

    /// Convert the input SRA archive to FASTQ first (0 or 1)
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=1))]
    sra: u8,

    #[arg(long)]
    insert: Option<f64>,

    #[arg(long)]
    stdev: Option<f64>,

    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=1))]
    outward: Option<u8>,

    #[arg(long)]
    refname: Option<String>,

    /// JSON file with service URLs and converter settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// SRA converter program [default: fastq-dump]
    #[arg(long)]
    converter: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<UploadError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &UploadError) -> u8 {
    match error {
        UploadError::InvalidArguments(_)
        | UploadError::InvalidFile(_)
        | UploadError::UnrecognizedFileType(_)
        | UploadError::UnknownLibraryType(_)
        | UploadError::MultiArchiveUnsupported(_)
        | UploadError::ConfigRead(_)
        | UploadError::ConfigParse(_) => 2,
        UploadError::ConverterProcessFailed(_)
        | UploadError::ConverterOutputMissing(_)
        | UploadError::UploadConnectionFailed(_)
        | UploadError::UploadEmptyResponse(_)
        | UploadError::UploadResponseInvalid(_)
        | UploadError::UploadRejected { .. }
        | UploadError::RegistrationFailed(_) => 3,
        UploadError::OutputWriteFailed { .. } => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Checked before anything touches the network or the converter.
    let library_type: LibraryType = cli.library_type.parse()?;

    let overrides = ConfigOverrides {
        shock_service_url: cli.shock_service_url,
        handle_service_url: cli.handle_service_url,
        token: cli.token,
        converter: cli.converter,
    };
    let resolved = ConfigLoader::resolve(
        cli.config.as_deref(),
        overrides,
        std::env::var(TOKEN_ENV).ok(),
    )?;

    let store = ShockHttpClient::new(resolved.shock.clone())?;
    let registrar = resolved
        .handle_service_url
        .as_deref()
        .map(|url| HandleServiceClient::new(url, resolved.shock.token()))
        .transpose()?;
    let mut converter = SystemArchiveConverter::new(resolved.converter.clone());
    if let Some(dir) = &resolved.converter_output_dir {
        converter = converter.with_output_dir(dir);
    }

    let request = LibraryRequest {
        library_type,
        input_files: cli.input_file_name,
        convert_sra: cli.sra == 1,
        insert_size_mean: cli.insert,
        insert_size_std_dev: cli.stdev,
        read_orientation_outward: cli.outward,
        reference_name: cli.refname,
    };

    let assembler = Assembler::new(store, registrar, converter);
    let record = assembler.assemble(&request)?;
    JsonOutput::write_record(&record, &cli.output_file_name)?;
    Ok(())
}
