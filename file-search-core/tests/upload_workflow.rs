use std::path::PathBuf;

use file_search_core::contract::{
    CustomMetadata, Document, FileState, ImportOperation, MockFileSearchApi, Store, UploadedFile,
};
use file_search_core::metadata::DocumentMetadata;
use file_search_core::upload::upload_document;
use file_search_core::Error;
use mockall::Sequence;
use tempfile::tempdir;

mod support;

fn store() -> Store {
    Store {
        name: "fileSearchStores/demo".into(),
        display_name: Some("demo-file-store".into()),
        create_time: None,
    }
}

fn handle(state: FileState) -> UploadedFile {
    UploadedFile {
        name: "files/abc".into(),
        display_name: Some("report.pdf".into()),
        mime_type: Some("application/pdf".into()),
        uri: Some("https://files.example/abc".into()),
        state,
    }
}

fn document(name: &str, display_name: &str, metadata: Vec<CustomMetadata>) -> Document {
    Document {
        name: name.into(),
        display_name: Some(display_name.into()),
        custom_metadata: metadata,
        state: Some("STATE_ACTIVE".into()),
    }
}

fn write_report() -> (tempfile::TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("report.pdf");
    std::fs::write(&path, b"%PDF-1.4 quarterly numbers").unwrap();
    (dir, path)
}

#[tokio::test(start_paused = true)]
async fn deletes_only_matching_documents_before_import() {
    let (dir, path) = write_report();
    let settings = support::settings_for(dir.path());
    let mut api = MockFileSearchApi::new();
    let mut seq = Sequence::new();

    api.expect_upload_file()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(handle(FileState::Processing)));
    api.expect_get_file()
        .withf(|name| name == "files/abc")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(handle(FileState::Active)));
    api.expect_list_documents()
        .withf(|store| store == "fileSearchStores/demo")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| {
            Ok(vec![
                document("docs/by-name", "report.pdf", vec![]),
                document(
                    "docs/by-metadata",
                    "Quarterly Report",
                    vec![CustomMetadata::string("file_name", "report.pdf")],
                ),
                document(
                    "docs/unrelated",
                    "Annual Summary",
                    vec![CustomMetadata::string("file_name", "summary.pdf")],
                ),
            ])
        });
    api.expect_delete_document()
        .withf(|name, force| name == "docs/by-name" && *force)
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(()));
    api.expect_delete_document()
        .withf(|name, force| name == "docs/by-metadata" && *force)
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(()));
    api.expect_extract_metadata()
        .withf(|model, file, _prompt| model == "gemini-2.5-flash" && file.name == "files/abc")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _, _| {
            Ok(DocumentMetadata {
                title: "Quarterly Report".into(),
                author: "Finance Team".into(),
                abstract_text: "Revenue grew in every region.".into(),
            })
        });
    api.expect_import_file()
        .withf(|store, _path, request| {
            let keys: Vec<&str> = request.custom_metadata.iter().map(|m| m.key.as_str()).collect();
            store == "fileSearchStores/demo"
                && request.display_name == "Quarterly Report"
                && keys == ["title", "file_name", "author", "abstract"]
                && request.custom_metadata[1].value.as_str() == Some("report.pdf")
        })
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _, _| {
            Ok(ImportOperation {
                name: "operations/import-1".into(),
                done: false,
                error: None,
            })
        });
    api.expect_get_operation()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|name| {
            Ok(ImportOperation {
                name: name.to_string(),
                done: true,
                error: None,
            })
        });

    let uploaded = upload_document(&api, &settings, &store(), &path, |_| {}).await.unwrap();

    assert_eq!(uploaded.file_name, "report.pdf");
    let replaced: Vec<&str> = uploaded.replaced.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(replaced, vec!["docs/by-name", "docs/by-metadata"]);
    assert!(uploaded.operation.done);
}

#[tokio::test(start_paused = true)]
async fn failed_upload_state_stops_before_extraction_and_import() {
    let (dir, path) = write_report();
    let settings = support::settings_for(dir.path());
    let mut api = MockFileSearchApi::new();

    api.expect_upload_file()
        .returning(|_| Ok(handle(FileState::Processing)));
    api.expect_get_file()
        .returning(|_| Ok(handle(FileState::Failed)));
    api.expect_list_documents().times(0);
    api.expect_delete_document().times(0);
    api.expect_extract_metadata().times(0);
    api.expect_import_file().times(0);

    let err = upload_document(&api, &settings, &store(), &path, |_| {})
        .await
        .unwrap_err();

    match err {
        Error::UnexpectedState { file, state } => {
            assert_eq!(file, "report.pdf");
            assert_eq!(state, "FAILED");
        }
        other => panic!("expected UnexpectedState, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn immediately_active_upload_is_not_polled() {
    let (dir, path) = write_report();
    let settings = support::settings_for(dir.path());
    let mut api = MockFileSearchApi::new();

    api.expect_upload_file()
        .returning(|_| Ok(handle(FileState::Active)));
    api.expect_get_file().times(0);
    api.expect_list_documents().returning(|_| Ok(vec![]));
    api.expect_extract_metadata().returning(|_, _, _| {
        Ok(DocumentMetadata {
            title: "T".into(),
            author: "A".into(),
            abstract_text: "B".into(),
        })
    });
    api.expect_import_file().returning(|_, _, _| {
        Ok(ImportOperation {
            name: "operations/fast".into(),
            done: true,
            error: None,
        })
    });
    api.expect_get_operation().times(0);

    let uploaded = upload_document(&api, &settings, &store(), &path, |_| {}).await.unwrap();
    assert!(uploaded.replaced.is_empty());
}

#[tokio::test(start_paused = true)]
async fn finished_operation_with_error_is_a_remote_failure() {
    let (dir, path) = write_report();
    let settings = support::settings_for(dir.path());
    let mut api = MockFileSearchApi::new();

    api.expect_upload_file()
        .returning(|_| Ok(handle(FileState::Active)));
    api.expect_list_documents().returning(|_| Ok(vec![]));
    api.expect_extract_metadata().returning(|_, _, _| {
        Ok(DocumentMetadata {
            title: "T".into(),
            author: "A".into(),
            abstract_text: "B".into(),
        })
    });
    api.expect_import_file().returning(|_, _, _| {
        Ok(ImportOperation {
            name: "operations/broken".into(),
            done: false,
            error: None,
        })
    });
    api.expect_get_operation().returning(|name| {
        Ok(ImportOperation {
            name: name.to_string(),
            done: true,
            error: Some("unsupported file type".into()),
        })
    });

    let err = upload_document(&api, &settings, &store(), &path, |_| {})
        .await
        .unwrap_err();
    assert!(err.to_string().contains("unsupported file type"));
}

#[tokio::test(start_paused = true)]
async fn delete_failure_aborts_before_import() {
    let (dir, path) = write_report();
    let settings = support::settings_for(dir.path());
    let mut api = MockFileSearchApi::new();

    api.expect_upload_file()
        .returning(|_| Ok(handle(FileState::Active)));
    api.expect_list_documents()
        .returning(|_| Ok(vec![document("docs/old", "report.pdf", vec![])]));
    api.expect_delete_document()
        .returning(|_, _| Err(Error::remote("delete_document", "HTTP 403: forbidden")));
    api.expect_extract_metadata().times(0);
    api.expect_import_file().times(0);

    let err = upload_document(&api, &settings, &store(), &path, |_| {})
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Remote { .. }));
}
