#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use file_search_core::config::{PollingSettings, Settings};
use file_search_core::contract::{
    Document, FileSearchApi, FileState, GroundingChunk, ImportOperation, ImportRequest,
    QueryAnswer, Store, UploadedFile,
};
use file_search_core::metadata::DocumentMetadata;
use file_search_core::upload::{discover_files, upload_files, UploadProgress, UploadReport};
use file_search_core::{Error, Result};

/// In-memory stand-in for the hosted service.
#[derive(Default)]
pub struct FakeFileSearch {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    stores: Vec<Store>,
    documents: HashMap<String, Vec<Document>>,
    files: HashMap<String, UploadedFile>,
    pending_imports: HashMap<String, (String, Document)>,
    next_id: u32,
    stores_created: u32,
    extraction_calls: u32,
    import_calls: u32,
    deleted: Vec<String>,
    /// State a processing file settles into.
    settled_state: Option<FileState>,
    /// Files that never leave processing.
    stuck: bool,
    /// File names whose metadata extraction fails.
    failing_extraction: Vec<String>,
}

impl FakeFileSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settled_state(self, state: FileState) -> Self {
        self.state.lock().unwrap().settled_state = Some(state);
        self
    }

    pub fn stuck_processing(self) -> Self {
        self.state.lock().unwrap().stuck = true;
        self
    }

    pub fn failing_extraction_for(self, file_name: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_extraction
            .push(file_name.to_string());
        self
    }

    pub fn seed_document(&self, store: &str, document: Document) {
        self.state
            .lock()
            .unwrap()
            .documents
            .entry(store.to_string())
            .or_default()
            .push(document);
    }

    pub fn documents(&self, store: &str) -> Vec<Document> {
        self.state
            .lock()
            .unwrap()
            .documents
            .get(store)
            .cloned()
            .unwrap_or_default()
    }

    pub fn stores_created(&self) -> u32 {
        self.state.lock().unwrap().stores_created
    }

    pub fn extraction_calls(&self) -> u32 {
        self.state.lock().unwrap().extraction_calls
    }

    pub fn import_calls(&self) -> u32 {
        self.state.lock().unwrap().import_calls
    }

    pub fn deleted(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted.clone()
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[async_trait]
impl FileSearchApi for FakeFileSearch {
    async fn list_stores(&self) -> Result<Vec<Store>> {
        Ok(self.state.lock().unwrap().stores.clone())
    }

    async fn create_store(&self, display_name: &str) -> Result<Store> {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        state.stores_created += 1;
        let store = Store {
            name: format!("fileSearchStores/store-{}", state.next_id),
            display_name: Some(display_name.to_string()),
            create_time: None,
        };
        state.stores.push(store.clone());
        Ok(store)
    }

    async fn list_documents(&self, store: &str) -> Result<Vec<Document>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .documents
            .get(store)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_document(&self, name: &str, force: bool) -> Result<()> {
        assert!(force, "duplicates must be force-deleted");
        let mut state = self.state.lock().unwrap();
        let mut found = false;
        for docs in state.documents.values_mut() {
            let before = docs.len();
            docs.retain(|d| d.name != name);
            found |= docs.len() != before;
        }
        if !found {
            return Err(Error::remote("delete_document", format!("HTTP 404: {name}")));
        }
        state.deleted.push(name.to_string());
        Ok(())
    }

    async fn upload_file(&self, path: &Path) -> Result<UploadedFile> {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let file = UploadedFile {
            name: format!("files/file-{}", state.next_id),
            display_name: Some(file_name(path)),
            mime_type: Some("application/pdf".into()),
            uri: Some(format!("https://files.example/file-{}", state.next_id)),
            state: FileState::Processing,
        };
        state.files.insert(file.name.clone(), file.clone());
        Ok(file)
    }

    async fn get_file(&self, name: &str) -> Result<UploadedFile> {
        let mut state = self.state.lock().unwrap();
        let stuck = state.stuck;
        let settled = state.settled_state.clone().unwrap_or(FileState::Active);
        let file = state
            .files
            .get_mut(name)
            .ok_or_else(|| Error::remote("get_file", format!("HTTP 404: {name}")))?;
        if !stuck {
            file.state = settled;
        }
        Ok(file.clone())
    }

    async fn extract_metadata(
        &self,
        _model: &str,
        file: &UploadedFile,
        _prompt: &str,
    ) -> Result<DocumentMetadata> {
        let mut state = self.state.lock().unwrap();
        state.extraction_calls += 1;
        let name = file.display_name.clone().unwrap_or_default();
        if state.failing_extraction.contains(&name) {
            return Err(Error::remote("extract_metadata", "HTTP 500: model unavailable"));
        }
        Ok(DocumentMetadata {
            title: format!("Title of {name}"),
            author: "Test Author".into(),
            abstract_text: format!("What {name} is about."),
        })
    }

    async fn import_file(
        &self,
        store: &str,
        _path: &Path,
        request: ImportRequest,
    ) -> Result<ImportOperation> {
        let mut state = self.state.lock().unwrap();
        state.import_calls += 1;
        state.next_id += 1;
        let id = state.next_id;
        let document = Document {
            name: format!("{store}/documents/doc-{id}"),
            display_name: Some(request.display_name),
            custom_metadata: request.custom_metadata,
            state: Some("STATE_ACTIVE".into()),
        };
        let op_name = format!("{store}/upload/operations/op-{id}");
        state
            .pending_imports
            .insert(op_name.clone(), (store.to_string(), document));
        Ok(ImportOperation {
            name: op_name,
            done: false,
            error: None,
        })
    }

    async fn get_operation(&self, name: &str) -> Result<ImportOperation> {
        let mut state = self.state.lock().unwrap();
        if let Some((store, document)) = state.pending_imports.remove(name) {
            state.documents.entry(store).or_default().push(document);
        }
        Ok(ImportOperation {
            name: name.to_string(),
            done: true,
            error: None,
        })
    }

    async fn query(&self, _model: &str, store: &str, question: &str) -> Result<QueryAnswer> {
        let state = self.state.lock().unwrap();
        let docs = state.documents.get(store).cloned().unwrap_or_default();
        let grounding_chunks = docs
            .iter()
            .map(|d| GroundingChunk {
                title: d.display_name.clone(),
                text: Some(question.to_string()),
                store: Some(store.to_string()),
            })
            .collect();
        Ok(QueryAnswer {
            text: if docs.is_empty() {
                "I could not find anything relevant.".into()
            } else {
                format!("Answer from {} document(s).", docs.len())
            },
            grounding_chunks,
        })
    }
}

/// Settings pointing at `upload_path` with short waits.
pub fn settings_for(upload_path: &Path) -> Settings {
    let mut settings = Settings::from_lookup(|key| match key {
        "GEMINI_API_KEY" => Some("test-key".to_string()),
        "UPLOAD_PATH" => Some(upload_path.to_string_lossy().into_owned()),
        _ => None,
    });
    settings.polling = PollingSettings::with_timeout(Duration::from_secs(60));
    settings
}

/// Discover the files in the configured upload path and upload them as one batch.
pub async fn upload_configured_dir<F>(
    api: &FakeFileSearch,
    settings: &Settings,
    store: &Store,
    on_progress: F,
) -> Result<UploadReport>
where
    F: FnMut(UploadProgress<'_>),
{
    let files = discover_files(&settings.upload_path)?;
    upload_files(api, settings, store, &files, on_progress).await
}
