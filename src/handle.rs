use reqwest::blocking::{Client, ClientBuilder};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::Handle;
use crate::error::UploadError;

const PERSIST_METHOD: &str = "AbstractHandle.persist_handle";

pub trait HandleRegistrar: Send + Sync {
    /// Persists an uploaded handle and returns the id the service assigned.
    fn persist_handle(&self, handle: &Handle) -> Result<String, UploadError>;
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    version: &'static str,
    method: &'static str,
    params: [&'a Handle; 1],
    id: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Vec<String>>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// JSON-RPC 1.1 client for the handle service.
#[derive(Clone)]
pub struct HandleServiceClient {
    client: Client,
    url: String,
}

impl HandleServiceClient {
    pub fn new(url: impl Into<String>, token: &str) -> Result<Self, UploadError> {
        Self::from_builder(Client::builder(), url.into(), token)
    }

    fn from_builder(
        builder: ClientBuilder,
        url: String,
        token: &str,
    ) -> Result<Self, UploadError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("shock-upload/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| UploadError::InvalidArguments(err.to_string()))?,
        );
        let mut auth = HeaderValue::from_str(token)
            .map_err(|_| UploadError::InvalidArguments("malformed auth token".to_string()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        // The registration call is left unbounded.
        let client = builder
            .default_headers(headers)
            .timeout(None::<std::time::Duration>)
            .build()
            .map_err(|err| UploadError::RegistrationFailed(err.to_string()))?;
        Ok(Self { client, url })
    }
}

impl HandleRegistrar for HandleServiceClient {
    fn persist_handle(&self, handle: &Handle) -> Result<String, UploadError> {
        let request = RpcRequest {
            version: "1.1",
            method: PERSIST_METHOD,
            params: [handle],
            id: format!("persist-{}", handle.id.as_deref().unwrap_or_default()),
        };
        debug!(url = %self.url, file = %handle.file_name, "persisting handle");
        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .map_err(|err| UploadError::RegistrationFailed(err.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .map_err(|err| UploadError::RegistrationFailed(err.to_string()))?;
        if body.trim().is_empty() {
            return Err(UploadError::RegistrationFailed(format!(
                "handle service returned status {} with an empty body",
                status.as_u16()
            )));
        }
        parse_persist_response(&body)
    }
}

/// Attaches a handle service id to an uploaded handle.
///
/// Registration is optional: with no registrar the handle comes back as is.
pub fn register_handle<R: HandleRegistrar + ?Sized>(
    mut handle: Handle,
    registrar: Option<&R>,
) -> Result<Handle, UploadError> {
    let Some(registrar) = registrar else {
        debug!(file = %handle.file_name, "no handle service configured, skipping registration");
        return Ok(handle);
    };
    if !handle.is_uploaded() {
        return Err(UploadError::RegistrationFailed(format!(
            "{} has not been uploaded to shock",
            handle.file_name
        )));
    }
    let hid = registrar.persist_handle(&handle)?;
    info!(file = %handle.file_name, %hid, "handle registered");
    handle.hid = Some(hid);
    Ok(handle)
}

pub fn parse_persist_response(body: &str) -> Result<String, UploadError> {
    let response: RpcResponse = serde_json::from_str(body)
        .map_err(|err| UploadError::RegistrationFailed(format!("unreadable response: {err}")))?;
    if let Some(error) = response.error {
        let message = error
            .message
            .or(error.name)
            .unwrap_or_else(|| "unknown error".to_string());
        return Err(UploadError::RegistrationFailed(message));
    }
    response
        .result
        .and_then(|values| values.into_iter().next())
        .filter(|hid| !hid.is_empty())
        .ok_or_else(|| UploadError::RegistrationFailed("response carried no handle id".to_string()))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::test_support::serve_once;

    #[test]
    fn parse_result() {
        let hid = parse_persist_response(r#"{"version":"1.1","result":["KBH_42"]}"#).unwrap();
        assert_eq!(hid, "KBH_42");
    }

    #[test]
    fn parse_error_message() {
        let body = r#"{"version":"1.1","error":{"name":"JSONRPCError","code":-32500,"message":"bad token"}}"#;
        let err = parse_persist_response(body).unwrap_err();
        assert_matches!(err, UploadError::RegistrationFailed(message) if message == "bad token");
    }

    #[test]
    fn parse_empty_result() {
        let err = parse_persist_response(r#"{"result":[]}"#).unwrap_err();
        assert_matches!(err, UploadError::RegistrationFailed(_));
    }

    #[test]
    fn request_wraps_handle_in_params() {
        let mut handle = Handle::placeholder("/data/r.fq".into(), "r.fq".to_string());
        handle.mark_uploaded("https://shock.example", "node-9".to_string());
        let request = RpcRequest {
            version: "1.1",
            method: PERSIST_METHOD,
            params: [&handle],
            id: "persist-node-9".to_string(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["method"], PERSIST_METHOD);
        assert_eq!(json["params"][0]["id"], "node-9");
        assert_eq!(json["params"][0]["type"], "shock");
    }

    #[test]
    fn persist_posts_json_rpc() {
        let mut handle = Handle::placeholder("/data/r.fq".into(), "r.fq".to_string());
        handle.mark_uploaded("https://shock.example", "node-3".to_string());

        let (url, server) = serve_once("200 OK", r#"{"version":"1.1","result":["KBH_7"]}"#);
        let client =
            HandleServiceClient::from_builder(Client::builder().no_proxy(), url, "tok").unwrap();
        let registered = register_handle(handle, Some(&client)).unwrap();
        assert_eq!(registered.hid.as_deref(), Some("KBH_7"));

        let request = server.join().unwrap();
        assert!(request.starts_with("POST / HTTP/1.1"));
        assert!(request.to_ascii_lowercase().contains("authorization: tok"));
        assert!(request.contains(PERSIST_METHOD));
        assert!(request.contains("node-3"));
    }

    #[test]
    fn no_registrar_leaves_handle_alone() {
        let mut handle = Handle::placeholder("/data/r.fq".into(), "r.fq".to_string());
        handle.mark_uploaded("https://shock.example", "node-3".to_string());
        let unchanged = register_handle::<HandleServiceClient>(handle.clone(), None).unwrap();
        assert_eq!(unchanged, handle);
    }

    #[test]
    fn refuses_handles_not_yet_uploaded() {
        struct Unreachable;
        impl HandleRegistrar for Unreachable {
            fn persist_handle(&self, _handle: &Handle) -> Result<String, UploadError> {
                panic!("registrar must not be called");
            }
        }

        let handle = Handle::placeholder("/data/r.fq".into(), "r.fq".to_string());
        let err = register_handle(handle, Some(&Unreachable)).unwrap_err();
        assert_matches!(err, UploadError::RegistrationFailed(_));
    }
}
