use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::UploadError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryType {
    PairedEnd,
    SingleEnd,
    ReferenceAssembly,
}

impl LibraryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LibraryType::PairedEnd => "PairedEndLibrary",
            LibraryType::SingleEnd => "SingleEndLibrary",
            LibraryType::ReferenceAssembly => "ReferenceAssembly",
        }
    }
}

impl fmt::Display for LibraryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LibraryType {
    type Err = UploadError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "PairedEndLibrary" => Ok(LibraryType::PairedEnd),
            "SingleEndLibrary" => Ok(LibraryType::SingleEnd),
            "ReferenceAssembly" => Ok(LibraryType::ReferenceAssembly),
            _ => Err(UploadError::UnknownLibraryType(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionMode {
    Single,
    Paired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandleType {
    #[serde(rename = "to-be-uploaded")]
    ToBeUploaded,
    #[serde(rename = "shock")]
    Shock,
}

/// One file on its way into (or already stored in) Shock.
///
/// Created as a placeholder by the validator, then filled in by the upload
/// step and, when a handle service is configured, by the registrar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Handle {
    pub file_name: String,
    #[serde(rename = "type")]
    pub handle_type: HandleType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hid: Option<String>,
}

impl Handle {
    pub fn placeholder(path: PathBuf, file_name: String) -> Self {
        Self {
            file_name,
            handle_type: HandleType::ToBeUploaded,
            path: Some(path),
            url: None,
            id: None,
            hid: None,
        }
    }

    pub fn local_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Records the store location and drops the local path.
    pub fn mark_uploaded(&mut self, url: &str, id: String) {
        self.handle_type = HandleType::Shock;
        self.url = Some(url.to_string());
        self.id = Some(id);
        self.path = None;
    }

    pub fn is_uploaded(&self) -> bool {
        self.handle_type == HandleType::Shock && self.url.is_some() && self.id.is_some()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct ShockConnection {
    url: String,
    token: String,
}

impl ShockConnection {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        let url = url.into().trim_end_matches('/').to_string();
        Self {
            url,
            token: token.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn node_url(&self) -> String {
        format!("{}/node", self.url)
    }
}

impl fmt::Debug for ShockConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShockConnection")
            .field("url", &self.url)
            .field("token", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_library_type() {
        let kind: LibraryType = "PairedEndLibrary".parse().unwrap();
        assert_eq!(kind, LibraryType::PairedEnd);
        assert_eq!(kind.to_string(), "PairedEndLibrary");
    }

    #[test]
    fn parse_library_type_unknown() {
        let err = "MatePairLibrary".parse::<LibraryType>().unwrap_err();
        assert_matches!(err, UploadError::UnknownLibraryType(name) if name == "MatePairLibrary");
    }

    #[test]
    fn mark_uploaded_clears_path() {
        let mut handle = Handle::placeholder(
            PathBuf::from("/data/reads.fq.gz"),
            "reads.fq.gz".to_string(),
        );
        assert!(!handle.is_uploaded());
        handle.mark_uploaded("https://shock.example", "node-1".to_string());
        assert!(handle.is_uploaded());
        assert_eq!(handle.local_path(), None);

        let json = serde_json::to_value(&handle).unwrap();
        assert_eq!(json["type"], "shock");
        assert!(json.get("path").is_none());
        assert!(json.get("hid").is_none());
    }

    #[test]
    fn connection_trims_trailing_slash() {
        let conn = ShockConnection::new("https://shock.example/", "tok");
        assert_eq!(conn.node_url(), "https://shock.example/node");
        assert!(!format!("{conn:?}").contains("tok\""));
    }
}
