use docquery_core::{validate_upload, FileKind, ValidationError, MAX_UPLOAD_BYTES};

const KB: u64 = 1024;
const MB: u64 = 1024 * 1024;

#[test]
fn rejects_oversized_file() {
    let err = validate_upload("large.pdf", Some("application/pdf"), 11 * MB).unwrap_err();
    assert_eq!(
        err,
        ValidationError::TooLarge {
            name: "large.pdf".to_string(),
            size: 11 * MB,
            max: MAX_UPLOAD_BYTES,
        }
    );
}

#[test]
fn rejects_executable() {
    let err = validate_upload("setup.exe", Some("application/x-msdownload"), KB).unwrap_err();
    assert!(matches!(err, ValidationError::UnsupportedType { .. }));
    assert!(err.to_string().contains("setup.exe"));
}

#[test]
fn accepts_small_pdf_and_medium_markdown() {
    assert_eq!(validate_upload("paper.pdf", None, KB), Ok(FileKind::Pdf));
    assert_eq!(validate_upload("notes.md", None, 5 * MB), Ok(FileKind::Markdown));
}

#[test]
fn accepts_every_allowed_extension() {
    for (name, kind) in [
        ("a.pdf", FileKind::Pdf),
        ("a.md", FileKind::Markdown),
        ("a.markdown", FileKind::Markdown),
        ("a.html", FileKind::Html),
        ("a.htm", FileKind::Html),
        ("a.txt", FileKind::Text),
    ] {
        assert_eq!(validate_upload(name, None, 1), Ok(kind), "{name}");
    }
}

#[test]
fn rejects_empty_file() {
    assert!(matches!(
        validate_upload("empty.txt", None, 0),
        Err(ValidationError::Empty { .. })
    ));
}
