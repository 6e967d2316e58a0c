use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::ShockConnection;
use crate::error::UploadError;
use crate::sra::DEFAULT_CONVERTER;

pub const DEFAULT_SHOCK_URL: &str = "https://kbase.us/services/shock-api";
pub const DEFAULT_HANDLE_URL: &str = "https://kbase.us/services/handle_service";
pub const TOKEN_ENV: &str = "KB_AUTH_TOKEN";

/// Optional on-disk settings, all fields may be omitted.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub shock_service_url: Option<String>,
    #[serde(default)]
    pub handle_service_url: Option<String>,
    #[serde(default)]
    pub converter: Option<String>,
    #[serde(default)]
    pub converter_output_dir: Option<PathBuf>,
}

/// Values given on the command line; these win over everything else.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub shock_service_url: Option<String>,
    pub handle_service_url: Option<String>,
    pub token: Option<String>,
    pub converter: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub shock: ShockConnection,
    /// `None` disables handle registration.
    pub handle_service_url: Option<String>,
    pub converter: PathBuf,
    pub converter_output_dir: Option<PathBuf>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(
        path: Option<&Path>,
        overrides: ConfigOverrides,
        env_token: Option<String>,
    ) -> Result<ResolvedConfig, UploadError> {
        let config = match path {
            Some(path) => {
                let content = fs::read_to_string(path)
                    .map_err(|_| UploadError::ConfigRead(path.to_path_buf()))?;
                serde_json::from_str(&content)
                    .map_err(|err| UploadError::ConfigParse(err.to_string()))?
            }
            None => Config::default(),
        };
        Self::resolve_config(config, overrides, env_token)
    }

    pub fn resolve_config(
        config: Config,
        overrides: ConfigOverrides,
        env_token: Option<String>,
    ) -> Result<ResolvedConfig, UploadError> {
        let shock_url = overrides
            .shock_service_url
            .or(config.shock_service_url)
            .unwrap_or_else(|| DEFAULT_SHOCK_URL.to_string());
        if shock_url.trim().is_empty() {
            return Err(UploadError::InvalidArguments(
                "shock service url must not be empty".to_string(),
            ));
        }

        let handle_service_url = overrides
            .handle_service_url
            .or(config.handle_service_url)
            .unwrap_or_else(|| DEFAULT_HANDLE_URL.to_string());
        let handle_service_url = Some(handle_service_url.trim().to_string())
            .filter(|value| !value.is_empty());

        let token = overrides
            .token
            .or(env_token)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                UploadError::InvalidArguments(format!(
                    "an auth token is required (--token or {TOKEN_ENV})"
                ))
            })?;

        let converter = overrides
            .converter
            .or(config.converter)
            .unwrap_or_else(|| DEFAULT_CONVERTER.to_string());

        Ok(ResolvedConfig {
            shock: ShockConnection::new(shock_url.trim(), token),
            handle_service_url,
            converter: PathBuf::from(converter),
            converter_output_dir: config.converter_output_dir,
        })
    }
}
