use std::path::PathBuf;

use chrono::{NaiveDate, NaiveDateTime};
use docquery_core::{
    update, AppState, Document, Effect, FileKind, Msg, SelectedFile, UploadStage,
    UPLOAD_PROGRESS_CAP,
};
use pretty_assertions::assert_eq;

fn uploaded_at() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(3, 4, 5)
        .unwrap()
}

fn doc(id: i64, processed: bool) -> Document {
    Document {
        id,
        filename: format!("doc-{id}.pdf"),
        file_type: "pdf".to_string(),
        is_processed: processed,
        uploaded_at: uploaded_at(),
        content: None,
    }
}

fn file(name: &str, size: u64) -> SelectedFile {
    SelectedFile {
        path: PathBuf::from("/tmp").join(name),
        name: name.to_string(),
        mime: None,
        size,
    }
}

#[test]
fn process_marks_spinner_until_backend_answers() {
    let (state, _) = update(AppState::new(), Msg::DocumentsLoaded(vec![doc(1, false)]));

    let (state, effects) = update(state, Msg::ProcessClicked(1));
    assert_eq!(effects, vec![Effect::ProcessDocument { document_id: 1 }]);
    assert!(state.view().documents[0].processing);
    // The cached list is not mutated locally.
    assert!(!state.view().documents[0].document.is_processed);

    // A second click while processing is ignored.
    let (state, effects) = update(state, Msg::ProcessClicked(1));
    assert!(effects.is_empty());

    let (state, effects) = update(
        state,
        Msg::DocumentActionFinished {
            document_id: 1,
            result: Ok(()),
        },
    );
    assert_eq!(effects, vec![Effect::LoadDocuments]);
    assert!(!state.view().documents[0].processing);

    let (state, _) = update(state, Msg::DocumentsLoaded(vec![doc(1, true)]));
    assert!(state.view().documents[0].document.is_processed);
}

#[test]
fn delete_round_trips_through_backend() {
    let (state, _) = update(
        AppState::new(),
        Msg::DocumentsLoaded(vec![doc(1, true), doc(2, false)]),
    );
    let (state, effects) = update(state, Msg::DeleteClicked(2));
    assert_eq!(effects, vec![Effect::DeleteDocument { document_id: 2 }]);
    assert_eq!(state.view().documents.len(), 2);

    let (state, effects) = update(
        state,
        Msg::DocumentActionFinished {
            document_id: 2,
            result: Err("HTTP error! status: 404".to_string()),
        },
    );
    assert_eq!(effects, vec![Effect::LoadDocuments]);
    assert_eq!(
        state.view().notice.as_deref(),
        Some("Document 2: HTTP error! status: 404")
    );

    let (_state, effects) = update(state, Msg::DeleteClicked(99));
    assert!(effects.is_empty());
}

#[test]
fn invalid_files_never_reach_the_network() {
    let (state, effects) = update(
        AppState::new(),
        Msg::FilesSelected(vec![
            file("virus.exe", 1024),
            file("huge.pdf", 11 * 1024 * 1024),
            file("notes.md", 2048),
        ]),
    );

    assert_eq!(
        effects,
        vec![Effect::UploadFile {
            upload_id: 3,
            path: PathBuf::from("/tmp/notes.md"),
            name: "notes.md".to_string(),
            kind: FileKind::Markdown,
        }]
    );
    let uploads = state.view().uploads;
    assert_eq!(uploads.len(), 3);
    assert!(matches!(uploads[0].stage, UploadStage::Error(_)));
    assert!(matches!(uploads[1].stage, UploadStage::Error(_)));
    assert_eq!(uploads[2].stage, UploadStage::Uploading { progress: 0 });
}

#[test]
fn uploads_progress_independently() {
    let (mut state, effects) = update(
        AppState::new(),
        Msg::FilesSelected(vec![file("a.pdf", 10), file("b.txt", 10)]),
    );
    assert_eq!(effects.len(), 2);

    for _ in 0..3 {
        state = update(state, Msg::Tick).0;
    }
    let uploads = state.view().uploads;
    assert_eq!(uploads[0].progress, 30);
    assert_eq!(uploads[1].progress, 30);

    // Second file completes first; the first keeps animating.
    let (mut state, effects) = update(
        state,
        Msg::UploadFinished {
            upload_id: 2,
            result: Ok(77),
        },
    );
    assert_eq!(effects, vec![Effect::LoadDocuments]);
    for _ in 0..20 {
        state = update(state, Msg::Tick).0;
    }
    let uploads = state.view().uploads;
    assert_eq!(uploads[0].progress, UPLOAD_PROGRESS_CAP);
    assert_eq!(uploads[1].stage, UploadStage::Uploaded { document_id: 77 });
    assert_eq!(uploads[1].progress, 100);

    let (state, _) = update(
        state,
        Msg::UploadFinished {
            upload_id: 1,
            result: Err("HTTP error! status: 400".to_string()),
        },
    );
    let uploads = state.view().uploads;
    assert_eq!(
        uploads[0].stage,
        UploadStage::Error("HTTP error! status: 400".to_string())
    );
    assert_eq!(uploads[1].stage, UploadStage::Uploaded { document_id: 77 });
}

#[test]
fn uploaded_file_can_be_processed_and_cleared() {
    let (state, _) = update(AppState::new(), Msg::FilesSelected(vec![file("a.pdf", 10)]));
    let (state, _) = update(
        state,
        Msg::UploadFinished {
            upload_id: 1,
            result: Ok(5),
        },
    );

    let (state, effects) = update(state, Msg::ProcessUploadClicked(1));
    assert_eq!(effects, vec![Effect::ProcessDocument { document_id: 5 }]);
    assert_eq!(
        state.view().uploads[0].stage,
        UploadStage::Processing { document_id: 5 }
    );

    let (state, _) = update(
        state,
        Msg::DocumentActionFinished {
            document_id: 5,
            result: Ok(()),
        },
    );
    assert_eq!(
        state.view().uploads[0].stage,
        UploadStage::Processed { document_id: 5 }
    );

    let (state, _) = update(state, Msg::ClearFinishedUploads);
    assert!(state.view().uploads.is_empty());
}

#[test]
fn processing_requires_uploaded_stage() {
    let (state, _) = update(AppState::new(), Msg::FilesSelected(vec![file("a.pdf", 10)]));
    let (_state, effects) = update(state, Msg::ProcessUploadClicked(1));
    assert!(effects.is_empty());
}
