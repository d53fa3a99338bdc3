use serde::{Deserialize, Serialize};

/// Metadata for a stored file as returned by the finalize call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// Server-side storage name; used to build view/download URLs.
    pub filename: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub originalname: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mimetype: String,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub size: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub upload_date: String,
    /// Resolved downloadable URL, filled in by the client after finalize.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn is_zero_u64(v: &u64) -> bool {
    *v == 0
}

/// Caller credentials attached to origin requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub token: String,
    pub session_id: String,
}

impl Credentials {
    pub fn new(token: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            session_id: session_id.into(),
        }
    }

    /// Returns `true` when both the token and the session id are present.
    pub fn is_complete(&self) -> bool {
        !self.token.is_empty() && !self.session_id.is_empty()
    }
}
