//! Pre-flight file checks.
//!
//! A file must clear every check here before any network call is made.
//! The checks run in a fixed order and stop at the first failure.

use std::path::{Component, Path};

use filerelay_protocol::constants::UPLOAD_LIMIT;

use crate::TransferError;
use crate::format::format_file_size;

/// Name, size and declared MIME type of a file the caller wants to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    pub name: String,
    pub size: u64,
    pub mime_type: String,
}

impl FileDescriptor {
    pub fn new(name: impl Into<String>, size: u64, mime_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size,
            mime_type: mime_type.into(),
        }
    }

    /// Lowercase extension of the file name, including the dot.
    pub fn extension(&self) -> String {
        file_extension(&self.name)
    }
}

/// One named family of accepted files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRule {
    /// Stable key, e.g. `"image"`.
    pub key: &'static str,
    /// Lowercase extensions including the dot.
    pub extensions: &'static [&'static str],
    pub mime_types: &'static [&'static str],
    pub max_size: u64,
    /// Shown to the user in size errors.
    pub display_name: &'static str,
}

impl TypeRule {
    pub fn accepts_mime(&self, mime_type: &str) -> bool {
        self.mime_types.contains(&mime_type)
    }

    pub fn accepts_extension(&self, extension: &str) -> bool {
        let ext = extension.to_ascii_lowercase();
        self.extensions.contains(&ext.as_str())
    }
}

/// Built-in rules, in evaluation order.
pub const DEFAULT_RULES: &[TypeRule] = &[
    TypeRule {
        key: "image",
        extensions: &[".jpg", ".jpeg", ".png", ".gif", ".webp"],
        mime_types: &["image/jpeg", "image/png", "image/gif", "image/webp"],
        max_size: 10 * 1024 * 1024,
        display_name: "Image",
    },
    TypeRule {
        key: "document",
        extensions: &[".pdf"],
        mime_types: &["application/pdf"],
        max_size: 20 * 1024 * 1024,
        display_name: "PDF document",
    },
];

/// Reasons a file is rejected before upload.
///
/// The `Display` text is the message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("No file selected.")]
    Missing,

    #[error("File size cannot exceed {}.", human_size(.limit))]
    TooLarge { size: u64, limit: u64 },

    #[error("Unsupported file type.")]
    UnsupportedType { mime_type: String },

    #[error("{type_name} files cannot exceed {}.", human_size(.limit))]
    TypeTooLarge {
        type_name: &'static str,
        size: u64,
        limit: u64,
    },

    #[error("Invalid file extension.")]
    ExtensionMismatch { extension: String, type_name: &'static str },
}

/// Applies the global ceiling and an ordered rule table to candidate files.
#[derive(Debug, Clone)]
pub struct Validator {
    rules: Vec<TypeRule>,
    upload_limit: u64,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(DEFAULT_RULES.to_vec(), UPLOAD_LIMIT)
    }
}

impl Validator {
    /// Creates a validator with an explicit rule order and global ceiling.
    pub fn new(rules: Vec<TypeRule>, upload_limit: u64) -> Self {
        Self {
            rules,
            upload_limit,
        }
    }

    pub fn rules(&self) -> &[TypeRule] {
        &self.rules
    }

    pub fn upload_limit(&self) -> u64 {
        self.upload_limit
    }

    /// First rule whose MIME set contains `mime_type`.
    pub fn rule_for_mime(&self, mime_type: &str) -> Option<&TypeRule> {
        self.rules.iter().find(|r| r.accepts_mime(mime_type))
    }

    /// Checks, in order: presence, global ceiling, MIME type, per-type
    /// ceiling, extension.
    pub fn validate(&self, file: Option<&FileDescriptor>) -> Result<(), ValidationError> {
        let file = file.ok_or(ValidationError::Missing)?;

        if file.size > self.upload_limit {
            return Err(ValidationError::TooLarge {
                size: file.size,
                limit: self.upload_limit,
            });
        }

        let rule =
            self.rule_for_mime(&file.mime_type)
                .ok_or_else(|| ValidationError::UnsupportedType {
                    mime_type: file.mime_type.clone(),
                })?;

        if file.size > rule.max_size {
            return Err(ValidationError::TypeTooLarge {
                type_name: rule.display_name,
                size: file.size,
                limit: rule.max_size,
            });
        }

        let extension = file.extension();
        if !rule.accepts_extension(&extension) {
            return Err(ValidationError::ExtensionMismatch {
                extension,
                type_name: rule.display_name,
            });
        }

        Ok(())
    }

    /// Rule key whose extension set contains the file's extension, or
    /// `"unknown"`.
    pub fn file_type(&self, file_name: &str) -> &'static str {
        let ext = file_extension(file_name);
        if ext.is_empty() {
            return "unknown";
        }
        self.rules
            .iter()
            .find(|r| r.accepts_extension(&ext))
            .map(|r| r.key)
            .unwrap_or("unknown")
    }

    /// First MIME type of the rule that owns `extension`.
    pub fn mime_for_extension(&self, extension: &str) -> Option<&'static str> {
        self.rules
            .iter()
            .find(|r| r.accepts_extension(extension))
            .and_then(|r| r.mime_types.first().copied())
    }
}

fn human_size(bytes: &u64) -> String {
    format_file_size(*bytes)
}

/// Validates against the built-in rules and the 50 MB ceiling.
pub fn validate(file: Option<&FileDescriptor>) -> Result<(), ValidationError> {
    Validator::default().validate(file)
}

/// Lowercase `.ext` of the last dot-separated segment; empty without a dot.
pub fn file_extension(file_name: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((_, ext)) => format!(".{}", ext.to_ascii_lowercase()),
        None => String::new(),
    }
}

/// Reduces a server- or user-supplied name to a single safe path component.
///
/// Rejects empty names, `..`, and names that are nothing but a root or
/// prefix. Directory parts are dropped, keeping the final component.
pub fn safe_file_name(name: &str) -> Result<String, TransferError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(TransferError::InvalidName("empty file name".into()));
    }

    // Treat backslashes as separators regardless of platform.
    let normalized = trimmed.replace('\\', "/");
    let mut last = None;
    for component in Path::new(&normalized).components() {
        match component {
            Component::Normal(part) => last = Some(part.to_string_lossy().into_owned()),
            Component::ParentDir => {
                return Err(TransferError::InvalidName(format!(
                    "parent directory traversal not allowed: {name}"
                )));
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }

    last.ok_or_else(|| TransferError::InvalidName(format!("no file name in: {name}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MB: u64 = 1024 * 1024;

    fn file(name: &str, size: u64, mime: &str) -> FileDescriptor {
        FileDescriptor::new(name, size, mime)
    }

    #[test]
    fn rejects_missing_file() {
        assert_eq!(validate(None), Err(ValidationError::Missing));
    }

    #[test]
    fn rejects_over_global_ceiling_regardless_of_type() {
        for (name, mime) in [
            ("a.png", "image/png"),
            ("a.pdf", "application/pdf"),
            ("a.zip", "application/zip"),
        ] {
            let err = validate(Some(&file(name, 50 * MB + 1, mime))).unwrap_err();
            assert!(
                matches!(err, ValidationError::TooLarge { .. }),
                "{name}: {err:?}"
            );
        }
    }

    #[test]
    fn global_ceiling_message_is_human_readable() {
        let err = validate(Some(&file("a.png", 60 * MB, "image/png"))).unwrap_err();
        assert_eq!(err.to_string(), "File size cannot exceed 50 MB.");
    }

    #[test]
    fn rejects_unsupported_mime() {
        let err = validate(Some(&file("a.zip", 10, "application/zip"))).unwrap_err();
        assert_eq!(err.to_string(), "Unsupported file type.");
    }

    #[test]
    fn rejects_document_over_type_ceiling() {
        let err = validate(Some(&file("big.pdf", 21 * MB, "application/pdf"))).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::TypeTooLarge {
                type_name: "PDF document",
                ..
            }
        ));
        assert_eq!(err.to_string(), "PDF document files cannot exceed 20 MB.");
    }

    #[test]
    fn rejects_image_over_type_ceiling() {
        let err = validate(Some(&file("big.png", 11 * MB, "image/png"))).unwrap_err();
        assert_eq!(err.to_string(), "Image files cannot exceed 10 MB.");
    }

    #[test]
    fn rejects_extension_mime_mismatch() {
        let err = validate(Some(&file("a.pdf", 10, "image/png"))).unwrap_err();
        assert!(matches!(err, ValidationError::ExtensionMismatch { .. }));
        assert_eq!(err.to_string(), "Invalid file extension.");
    }

    #[test]
    fn rejects_missing_extension() {
        let err = validate(Some(&file("photo", 10, "image/png"))).unwrap_err();
        assert!(matches!(err, ValidationError::ExtensionMismatch { .. }));
    }

    #[test]
    fn accepts_upper_case_extension() {
        assert!(validate(Some(&file("PHOTO.JPG", 10, "image/jpeg"))).is_ok());
    }

    #[test]
    fn accepts_at_exact_limits() {
        assert!(validate(Some(&file("a.png", 10 * MB, "image/png"))).is_ok());
        assert!(validate(Some(&file("a.pdf", 20 * MB, "application/pdf"))).is_ok());
    }

    #[test]
    fn global_ceiling_checked_before_mime() {
        // Unsupported type but oversized: the size error wins.
        let err = validate(Some(&file("a.exe", 51 * MB, "application/x-msdos"))).unwrap_err();
        assert!(matches!(err, ValidationError::TooLarge { .. }));
    }

    #[test]
    fn first_matching_rule_wins() {
        const OVERLAP: &[TypeRule] = &[
            TypeRule {
                key: "small",
                extensions: &[".png"],
                mime_types: &["image/png"],
                max_size: 5,
                display_name: "Small",
            },
            TypeRule {
                key: "large",
                extensions: &[".png"],
                mime_types: &["image/png"],
                max_size: 500,
                display_name: "Large",
            },
        ];
        let v = Validator::new(OVERLAP.to_vec(), 1000);
        let err = v.validate(Some(&file("a.png", 10, "image/png"))).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::TypeTooLarge {
                type_name: "Small",
                ..
            }
        ));
    }

    #[test]
    fn validation_is_repeatable() {
        let f = file("a.png", 10, "image/png");
        let v = Validator::default();
        assert!(v.validate(Some(&f)).is_ok());
        assert!(v.validate(Some(&f)).is_ok());
    }

    #[test]
    fn file_extension_cases() {
        assert_eq!(file_extension("a.PNG"), ".png");
        assert_eq!(file_extension("archive.tar.gz"), ".gz");
        assert_eq!(file_extension("noext"), "");
        assert_eq!(file_extension(""), "");
    }

    #[test]
    fn file_type_lookup() {
        let v = Validator::default();
        assert_eq!(v.file_type("a.webp"), "image");
        assert_eq!(v.file_type("a.PDF"), "document");
        assert_eq!(v.file_type("a.txt"), "unknown");
        assert_eq!(v.file_type(""), "unknown");
    }

    #[test]
    fn mime_for_extension_lookup() {
        let v = Validator::default();
        assert_eq!(v.mime_for_extension(".jpg"), Some("image/jpeg"));
        assert_eq!(v.mime_for_extension(".pdf"), Some("application/pdf"));
        assert_eq!(v.mime_for_extension(".txt"), None);
    }

    #[test]
    fn safe_file_name_keeps_last_component() {
        assert_eq!(safe_file_name("report.pdf").unwrap(), "report.pdf");
        assert_eq!(safe_file_name("dir/sub/report.pdf").unwrap(), "report.pdf");
        assert_eq!(safe_file_name("/etc/passwd").unwrap(), "passwd");
        assert_eq!(safe_file_name("C:\\Users\\me\\a.png").unwrap(), "a.png");
    }

    #[test]
    fn safe_file_name_rejects_traversal_and_empty() {
        assert!(safe_file_name("").is_err());
        assert!(safe_file_name("   ").is_err());
        assert!(safe_file_name("../escape.txt").is_err());
        assert!(safe_file_name("..").is_err());
        assert!(safe_file_name("/").is_err());
    }
}
