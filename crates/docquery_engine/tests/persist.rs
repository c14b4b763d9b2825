use std::fs;

use docquery_engine::{ensure_output_dir, AtomicFileWriter, PersistError};
use tempfile::TempDir;

#[test]
fn creates_missing_export_dir() {
    let temp = TempDir::new().unwrap();
    let exports = temp.path().join("exports").join("2024");
    ensure_output_dir(&exports).unwrap();
    assert!(exports.is_dir());
}

#[test]
fn rewriting_an_export_replaces_it() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().to_path_buf());

    let first = writer.write("conversation.txt", "first").unwrap();
    let second = writer.write("conversation.txt", "second").unwrap();
    assert_eq!(first, second);
    assert_eq!(fs::read_to_string(&second).unwrap(), "second");
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 1);
}

#[test]
fn file_in_place_of_dir_is_rejected() {
    let temp = TempDir::new().unwrap();
    let blocker = temp.path().join("exports");
    fs::write(&blocker, "x").unwrap();

    let result = AtomicFileWriter::new(blocker.clone()).write("c.json", "{}");
    assert!(matches!(result, Err(PersistError::OutputDir(_))));
}

#[test]
fn path_like_names_are_rejected() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().to_path_buf());
    for name in ["", ".", "..", "../escape.csv", "a\\b.csv"] {
        assert!(
            matches!(writer.write(name, "x"), Err(PersistError::InvalidFilename(_))),
            "{name:?} should be rejected"
        );
    }
}
