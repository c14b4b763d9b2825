const MIB: u64 = 1024 * 1024;

/// Upload ceiling enforced before any request is issued.
pub const MAX_UPLOAD_BYTES: u64 = 10 * MIB;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Markdown,
    Html,
    Text,
}

impl FileKind {
    pub fn mime_type(self) -> &'static str {
        match self {
            FileKind::Pdf => "application/pdf",
            FileKind::Markdown => "text/markdown",
            FileKind::Html => "text/html",
            FileKind::Text => "text/plain",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(FileKind::Pdf),
            "md" | "markdown" => Some(FileKind::Markdown),
            "html" | "htm" => Some(FileKind::Html),
            "txt" => Some(FileKind::Text),
            _ => None,
        }
    }

    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or(mime).trim();
        match essence.to_ascii_lowercase().as_str() {
            "application/pdf" => Some(FileKind::Pdf),
            "text/markdown" | "text/x-markdown" => Some(FileKind::Markdown),
            "text/html" => Some(FileKind::Html),
            "text/plain" => Some(FileKind::Text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{name} is empty")]
    Empty { name: String },
    #[error("{name} is too large ({:.1} MB, max {} MB)", megabytes(.size), .max / MIB)]
    TooLarge { name: String, size: u64, max: u64 },
    #[error("{name} has an unsupported type (allowed: pdf, md, markdown, html, htm, txt)")]
    UnsupportedType { name: String },
}

fn megabytes(bytes: &u64) -> f64 {
    *bytes as f64 / MIB as f64
}

/// Gate applied to every selected file. Size is checked before type; the file
/// passes the type check when either its extension or its declared MIME type
/// is on the allow-list.
pub fn validate_upload(
    name: &str,
    mime: Option<&str>,
    size: u64,
) -> Result<FileKind, ValidationError> {
    if size == 0 {
        return Err(ValidationError::Empty {
            name: name.to_string(),
        });
    }
    if size > MAX_UPLOAD_BYTES {
        return Err(ValidationError::TooLarge {
            name: name.to_string(),
            size,
            max: MAX_UPLOAD_BYTES,
        });
    }

    let by_extension = name
        .rsplit_once('.')
        .and_then(|(_, ext)| FileKind::from_extension(ext));
    by_extension
        .or_else(|| mime.and_then(FileKind::from_mime))
        .ok_or_else(|| ValidationError::UnsupportedType {
            name: name.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_match_is_case_insensitive() {
        assert_eq!(validate_upload("REPORT.PDF", None, 10), Ok(FileKind::Pdf));
        assert_eq!(validate_upload("page.Htm", None, 10), Ok(FileKind::Html));
    }

    #[test]
    fn mime_type_rescues_missing_extension() {
        assert_eq!(
            validate_upload("README", Some("text/markdown; charset=utf-8"), 10),
            Ok(FileKind::Markdown)
        );
    }

    #[test]
    fn size_is_checked_before_type() {
        let err = validate_upload("setup.exe", None, MAX_UPLOAD_BYTES + 1).unwrap_err();
        assert!(matches!(err, ValidationError::TooLarge { .. }));
    }

    #[test]
    fn too_large_message_reports_megabytes() {
        let err = validate_upload("big.pdf", None, MAX_UPLOAD_BYTES + MIB / 2).unwrap_err();
        assert_eq!(err.to_string(), "big.pdf is too large (10.5 MB, max 10 MB)");
        let err = validate_upload("empty.txt", None, 0).unwrap_err();
        assert_eq!(err.to_string(), "empty.txt is empty");
    }

    #[test]
    fn exactly_at_limit_is_accepted() {
        assert!(validate_upload("a.txt", None, MAX_UPLOAD_BYTES).is_ok());
    }
}
