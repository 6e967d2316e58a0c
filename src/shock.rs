use std::path::Path;
use std::time::Duration;

use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, ClientBuilder};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use tracing::{debug, info};

use crate::domain::ShockConnection;
use crate::error::UploadError;

pub const READS_ATTRIBUTES: &str = r#"{"filetype":"reads"}"#;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const STATUS_OK: i64 = 200;

pub trait BlobStore: Send + Sync {
    /// Base URL recorded on every handle this store produces.
    fn url(&self) -> &str;
    /// Uploads one file and returns the node id assigned by the store.
    fn upload(&self, path: &Path) -> Result<String, UploadError>;
}

#[derive(Debug, Deserialize)]
struct NodeResponse {
    status: i64,
    #[serde(default)]
    data: Option<NodeData>,
    #[serde(default)]
    error: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct NodeData {
    id: String,
}

#[derive(Clone)]
pub struct ShockHttpClient {
    client: Client,
    connection: ShockConnection,
}

impl ShockHttpClient {
    pub fn new(connection: ShockConnection) -> Result<Self, UploadError> {
        Self::from_builder(Client::builder(), connection)
    }

    fn from_builder(
        builder: ClientBuilder,
        connection: ShockConnection,
    ) -> Result<Self, UploadError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("shock-upload/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| UploadError::InvalidArguments(err.to_string()))?,
        );
        let mut auth = HeaderValue::from_str(&format!("OAuth {}", connection.token()))
            .map_err(|_| UploadError::InvalidArguments("malformed auth token".to_string()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        // Uploads of large read files can take a long time; only the connect is bounded.
        let client = builder
            .default_headers(headers)
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(None::<Duration>)
            .build()
            .map_err(|err| UploadError::UploadConnectionFailed(err.to_string()))?;

        Ok(Self { client, connection })
    }

    fn build_form(path: &Path) -> Result<Form, UploadError> {
        let attributes = Part::text(READS_ATTRIBUTES)
            .file_name("attributes.json")
            .mime_str("application/json")
            .map_err(|err| UploadError::UploadConnectionFailed(err.to_string()))?;
        Form::new()
            .part("attributes", attributes)
            .file("upload", path)
            .map_err(|err| {
                UploadError::UploadConnectionFailed(format!("read {}: {err}", path.display()))
            })
    }
}

impl BlobStore for ShockHttpClient {
    fn url(&self) -> &str {
        self.connection.url()
    }

    fn upload(&self, path: &Path) -> Result<String, UploadError> {
        let url = self.connection.node_url();
        info!(file = %path.display(), %url, "uploading to shock");
        let form = Self::build_form(path)?;
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .map_err(|err| UploadError::UploadConnectionFailed(err.to_string()))?;
        let http_status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|err| UploadError::UploadConnectionFailed(err.to_string()))?;
        debug!(http_status, bytes = body.len(), "shock responded");

        if body.trim().is_empty() {
            return Err(UploadError::UploadEmptyResponse(path.to_path_buf()));
        }
        let id = parse_upload_response(&body)?;
        info!(file = %path.display(), node = %id, "upload complete");
        Ok(id)
    }
}

/// Pulls the node id out of a Shock `POST /node` response body.
pub fn parse_upload_response(body: &str) -> Result<String, UploadError> {
    let response: NodeResponse = serde_json::from_str(body)
        .map_err(|err| UploadError::UploadResponseInvalid(err.to_string()))?;
    if response.status != STATUS_OK {
        let message = response
            .error
            .and_then(|errors| errors.into_iter().next())
            .unwrap_or_else(|| "no error message".to_string());
        return Err(UploadError::UploadRejected {
            status: response.status,
            message,
        });
    }
    response
        .data
        .map(|data| data.id)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| UploadError::UploadResponseInvalid("missing data.id".to_string()))
}
