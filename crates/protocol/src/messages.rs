use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::FileRecord;

/// Body of a presign request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresignRequest {
    pub filename: String,
    pub mimetype: String,
    pub size: u64,
}

/// Body of a presign response.
///
/// `upload_url` and `upload_id` are optional on the wire so a response that
/// omits them can be told apart from a malformed one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_id: Option<String>,
    /// Headers the client must attach to the PUT.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    /// Seconds until `upload_url` stops accepting the PUT.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

/// Body of a finalize response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinalizeResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileRecord>,
    /// Any other top-level fields the server sends back.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// JSON body for the profile-image finalize call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileFinalizeRequest {
    pub upload_id: String,
}

/// Response of the profile-image finalize call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileImageResponse {
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Generic `{success, message}` body used by error responses and by
/// endpoints that return nothing else.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiMessage {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ApiMessage {
    /// Extracts a non-empty `message` from a JSON error body, if any.
    pub fn message_from(body: &[u8]) -> Option<String> {
        serde_json::from_slice::<ApiMessage>(body)
            .ok()
            .and_then(|m| m.message)
            .filter(|m| !m.trim().is_empty())
    }
}
