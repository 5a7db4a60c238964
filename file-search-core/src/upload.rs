//! Upload/replace workflow: keep exactly one current, metadata-tagged document
//! per local file in a store.
//!
//! For each file:
//!   1. upload the raw bytes and wait until the temporary handle is active
//!   2. delete every document already in the store that duplicates the file
//!   3. extract title, author and abstract with the language model
//!   4. import the file with that metadata and wait for the import to finish
//!
//! # Replacement is not atomic
//! The delete and the import are separate remote calls. A failure between
//! them leaves the file with no document; nothing is rolled back. Re-running
//! is safe from either half: the duplicate scan finds nothing left to delete
//! and the import starts over. Another writer on the same store can race the
//! list-then-delete sequence.
//!
//! # Display names
//! An imported document is named after its extracted title, not the file
//! name, so on later runs duplicates are usually matched through the
//! `file_name` custom metadata entry.

use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::contract::{
    Document, FileSearchApi, FileState, ImportOperation, ImportRequest, Store, UploadedFile,
};
use crate::error::{Error, Result};
use crate::metadata::{DocumentMetadata, EXTRACTION_PROMPT, FILE_NAME_KEY};
use crate::poll::wait_until;

/// Outcome of uploading one local file.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedDocument {
    pub file_name: String,
    pub metadata: DocumentMetadata,
    /// Documents deleted because they duplicated this file.
    pub replaced: Vec<Document>,
    pub operation: ImportOperation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadReport {
    pub store: Store,
    pub documents: Vec<UploadedDocument>,
}

/// Progress events, emitted as each phase happens.
///
/// A deletion is reported as soon as it succeeds, so it stays visible even
/// when a later phase of the same file fails.
#[derive(Debug)]
pub enum UploadProgress<'a> {
    Starting {
        index: usize,
        total: usize,
        path: &'a Path,
    },
    DuplicateDeleted {
        file_name: &'a str,
        document: &'a Document,
    },
    ExtractingMetadata {
        file_name: &'a str,
    },
    MetadataExtracted {
        file_name: &'a str,
        metadata: &'a DocumentMetadata,
    },
    Importing {
        file_name: &'a str,
    },
    Uploaded(&'a UploadedDocument),
}

/// Does `document` represent the local file called `file_name`?
///
/// True when the display name equals the file name, or when a `file_name`
/// custom metadata entry holds it.
pub fn is_duplicate(document: &Document, file_name: &str) -> bool {
    document.display_name.as_deref() == Some(file_name)
        || document.metadata_string(FILE_NAME_KEY) == Some(file_name)
}

/// Regular files directly inside `dir`, sorted by file name.
pub fn discover_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        error!(error = ?e, path = %dir.display(), "Failed to read upload directory");
        Error::io(dir, e)
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| Error::io(dir, e))?.path();
        if path.is_file() {
            files.push(path);
        } else {
            debug!(path = %path.display(), "Skipping non-file entry");
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    info!(count = files.len(), path = %dir.display(), "Discovered files to upload");
    Ok(files)
}

fn file_name_of(path: &Path) -> Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| {
            Error::io(
                path,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
            )
        })
}

/// Upload raw bytes and wait until the temporary handle is usable for inference.
pub async fn upload_for_processing<A>(
    api: &A,
    settings: &Settings,
    path: &Path,
) -> Result<UploadedFile>
where
    A: FileSearchApi + ?Sized,
{
    let file_name = file_name_of(path)?;
    info!(file = %file_name, "Uploading file for metadata extraction");
    let mut handle = api.upload_file(path).await?;

    if handle.state.is_processing() {
        let what = format!("{} ({}) to finish processing", file_name, handle.name);
        let name = handle.name.clone();
        handle = wait_until(
            &what,
            &settings.polling.file,
            || api.get_file(&name),
            |f| !f.state.is_processing(),
        )
        .await?;
    }

    if handle.state != FileState::Active {
        error!(file = %file_name, state = %handle.state, "Uploaded file did not become active");
        return Err(Error::UnexpectedState {
            file: file_name,
            state: handle.state.to_string(),
        });
    }
    info!(file = %file_name, handle = %handle.name, "Uploaded file is active");
    Ok(handle)
}

/// Force-delete every document in `store` that duplicates `file_name`.
pub async fn remove_duplicates<A, F>(
    api: &A,
    settings: &Settings,
    store: &Store,
    file_name: &str,
    mut on_progress: F,
) -> Result<Vec<Document>>
where
    A: FileSearchApi + ?Sized,
    F: FnMut(UploadProgress<'_>),
{
    let documents = api.list_documents(&store.name).await?;
    let mut removed = Vec::new();

    for doc in documents.into_iter().filter(|d| is_duplicate(d, file_name)) {
        info!(
            file = %file_name,
            document = %doc.name,
            display_name = doc.display_name.as_deref().unwrap_or(""),
            "Deleting duplicate document"
        );
        api.delete_document(&doc.name, true).await?;
        on_progress(UploadProgress::DuplicateDeleted {
            file_name,
            document: &doc,
        });
        // Give the deletion time to propagate before the new import.
        tokio::time::sleep(settings.polling.delete_propagation).await;
        removed.push(doc);
    }

    if removed.is_empty() {
        debug!(file = %file_name, "No duplicates in store");
    }
    Ok(removed)
}

/// Import `path` into `store` and wait until the operation is done.
pub async fn import_with_metadata<A>(
    api: &A,
    settings: &Settings,
    store: &Store,
    path: &Path,
    file_name: &str,
    metadata: &DocumentMetadata,
) -> Result<ImportOperation>
where
    A: FileSearchApi + ?Sized,
{
    let request = ImportRequest {
        display_name: metadata.title.clone(),
        custom_metadata: metadata.to_custom_metadata(file_name),
        mime_type: None,
    };
    info!(file = %file_name, store = %store.name, title = %metadata.title, "Importing file into store");
    let mut operation = api.import_file(&store.name, path, request).await?;

    if !operation.done {
        let what = format!("import of {} ({})", file_name, operation.name);
        let name = operation.name.clone();
        operation = wait_until(
            &what,
            &settings.polling.operation,
            || api.get_operation(&name),
            |op| op.done,
        )
        .await?;
    }

    if let Some(message) = &operation.error {
        error!(file = %file_name, operation = %operation.name, error = %message, "Import finished with an error");
        return Err(Error::remote("import_file", message));
    }
    info!(file = %file_name, operation = %operation.name, "Import complete");
    Ok(operation)
}

/// Run the full upload/replace sequence for one file.
pub async fn upload_document<A, F>(
    api: &A,
    settings: &Settings,
    store: &Store,
    path: &Path,
    mut on_progress: F,
) -> Result<UploadedDocument>
where
    A: FileSearchApi + ?Sized,
    F: FnMut(UploadProgress<'_>),
{
    let file_name = file_name_of(path)?;

    let handle = upload_for_processing(api, settings, path).await?;
    let replaced = remove_duplicates(api, settings, store, &file_name, &mut on_progress).await?;

    info!(file = %file_name, model = %settings.model, "Extracting metadata");
    on_progress(UploadProgress::ExtractingMetadata {
        file_name: &file_name,
    });
    let metadata = api
        .extract_metadata(&settings.model, &handle, EXTRACTION_PROMPT)
        .await?;
    debug!(file = %file_name, ?metadata, "Extracted metadata");
    on_progress(UploadProgress::MetadataExtracted {
        file_name: &file_name,
        metadata: &metadata,
    });

    on_progress(UploadProgress::Importing {
        file_name: &file_name,
    });
    let operation =
        import_with_metadata(api, settings, store, path, &file_name, &metadata).await?;

    Ok(UploadedDocument {
        file_name,
        metadata,
        replaced,
        operation,
    })
}

/// Upload `files` one at a time.
///
/// An empty list is [`Error::NoFiles`] for the configured upload path. The
/// first failure aborts the batch; files before it stay committed.
pub async fn upload_files<A, F>(
    api: &A,
    settings: &Settings,
    store: &Store,
    files: &[PathBuf],
    mut on_progress: F,
) -> Result<UploadReport>
where
    A: FileSearchApi + ?Sized,
    F: FnMut(UploadProgress<'_>),
{
    if files.is_empty() {
        warn!(path = %settings.upload_path.display(), "Nothing to upload");
        return Err(Error::NoFiles(settings.upload_path.clone()));
    }

    let total = files.len();
    let mut documents = Vec::with_capacity(total);
    for (index, path) in files.iter().enumerate() {
        on_progress(UploadProgress::Starting {
            index,
            total,
            path: path.as_path(),
        });
        match upload_document(api, settings, store, path, &mut on_progress).await {
            Ok(doc) => {
                on_progress(UploadProgress::Uploaded(&doc));
                documents.push(doc);
            }
            Err(e) => {
                error!(
                    path = %path.display(),
                    completed = documents.len(),
                    remaining = total - index - 1,
                    error = ?e,
                    "Upload failed, aborting batch"
                );
                return Err(e);
            }
        }
    }

    Ok(UploadReport {
        store: store.clone(),
        documents,
    })
}
