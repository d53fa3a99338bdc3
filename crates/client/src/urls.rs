//! Resource URL construction. Pure string building, no network.

use filerelay_protocol::Credentials;
use filerelay_protocol::FileRecord;
use filerelay_protocol::constants::{
    DOWNLOAD_PATH, SESSION_ID_QUERY_PARAM, TOKEN_QUERY_PARAM, VIEW_PATH,
};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

/// Characters left unescaped in query values (RFC 3986 unreserved).
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Which flavour of a stored file's URL to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Inline display (`/api/files/view/...`).
    Preview,
    /// Attachment (`/api/files/download/...`).
    Download,
}

/// Builds URLs under one API base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlResolver {
    base_url: String,
}

impl UrlResolver {
    /// A trailing slash on `base_url` is dropped.
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL of an API path such as `/api/files/presign`.
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `<base>/api/files/{view|download}/<filename>`, or `""` for an empty
    /// name.
    pub fn resource_url(&self, filename: &str, mode: Mode) -> String {
        if filename.is_empty() {
            return String::new();
        }
        let prefix = match mode {
            Mode::Preview => VIEW_PATH,
            Mode::Download => DOWNLOAD_PATH,
        };
        format!("{}{}/{}", self.base_url, prefix, filename)
    }

    /// Preview URL, optionally carrying credentials as query parameters.
    ///
    /// Credentials are appended only when `with_auth` is set and both parts
    /// are present; otherwise the plain preview URL is returned.
    pub fn preview_url(
        &self,
        file: &FileRecord,
        credentials: Option<&Credentials>,
        with_auth: bool,
    ) -> String {
        let url = self.resource_url(&file.filename, Mode::Preview);
        if url.is_empty() || !with_auth {
            return url;
        }
        match credentials {
            Some(c) if c.is_complete() => format!(
                "{url}?{TOKEN_QUERY_PARAM}={}&{SESSION_ID_QUERY_PARAM}={}",
                utf8_percent_encode(&c.token, QUERY_VALUE),
                utf8_percent_encode(&c.session_id, QUERY_VALUE),
            ),
            _ => url,
        }
    }

    /// Profile image paths are stored relative to the API unless already
    /// absolute.
    pub fn profile_image_url(&self, path: &str) -> String {
        if path.is_empty() {
            return String::new();
        }
        if path.starts_with("http") {
            return path.to_string();
        }
        format!("{}{}", self.base_url, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> UrlResolver {
        UrlResolver::new("https://api.example.com")
    }

    fn record(name: &str) -> FileRecord {
        FileRecord {
            filename: name.into(),
            ..Default::default()
        }
    }

    #[test]
    fn resource_urls() {
        let r = resolver();
        assert_eq!(
            r.resource_url("a.png", Mode::Preview),
            "https://api.example.com/api/files/view/a.png"
        );
        assert_eq!(
            r.resource_url("a.png", Mode::Download),
            "https://api.example.com/api/files/download/a.png"
        );
        assert_eq!(r.resource_url("", Mode::Preview), "");
    }

    #[test]
    fn trailing_slash_dropped() {
        let r = UrlResolver::new("https://api.example.com/");
        assert_eq!(
            r.api_url("/api/files/presign"),
            "https://api.example.com/api/files/presign"
        );
    }

    #[test]
    fn empty_base_gives_relative_urls() {
        let r = UrlResolver::new("");
        assert_eq!(r.resource_url("a.png", Mode::Download), "/api/files/download/a.png");
    }

    #[test]
    fn preview_with_credentials() {
        let creds = Credentials::new("t/k+1", "s 1");
        assert_eq!(
            resolver().preview_url(&record("a.png"), Some(&creds), true),
            "https://api.example.com/api/files/view/a.png?token=t%2Fk%2B1&sessionId=s%201"
        );
    }

    #[test]
    fn preview_without_auth_or_incomplete_credentials() {
        let r = resolver();
        let plain = "https://api.example.com/api/files/view/a.png";
        let creds = Credentials::new("t", "s");
        assert_eq!(r.preview_url(&record("a.png"), Some(&creds), false), plain);
        assert_eq!(
            r.preview_url(&record("a.png"), Some(&Credentials::new("t", "")), true),
            plain
        );
        assert_eq!(r.preview_url(&record("a.png"), None, true), plain);
        assert_eq!(r.preview_url(&record(""), Some(&creds), true), "");
    }

    #[test]
    fn profile_image_urls() {
        let r = resolver();
        assert_eq!(
            r.profile_image_url("/uploads/me.png"),
            "https://api.example.com/uploads/me.png"
        );
        assert_eq!(
            r.profile_image_url("https://cdn.example.com/me.png"),
            "https://cdn.example.com/me.png"
        );
        assert_eq!(r.profile_image_url(""), "");
    }

    #[test]
    fn deterministic() {
        let r = resolver();
        assert_eq!(
            r.resource_url("x.pdf", Mode::Download),
            r.resource_url("x.pdf", Mode::Download)
        );
    }
}
