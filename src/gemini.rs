#![doc = "Gemini REST client: implements the core `FileSearchApi` contract over the public v1beta JSON/HTTP surface."]
//
//! # Gemini File Search client
//!
//! [`GeminiClient`] is the only transport in this repository. It maps each
//! [`FileSearchApi`] method onto one (or, for resumable uploads, two) HTTP
//! requests against `generativelanguage.googleapis.com`, or whatever base URL
//! the settings name.
//!
//! - The API key travels in the `x-goog-api-key` header on every request.
//! - List endpoints are paginated 20 at a time; the client follows
//!   `nextPageToken` until exhausted.
//! - Non-2xx responses, transport failures and undecodable bodies all become
//!   [`Error::Remote`] carrying the operation name.
//! - Wire structs are private to this module; the rest of the crate only sees
//!   the core contract types.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use file_search_core::config::Settings;
use file_search_core::contract::{
    CustomMetadata, CustomMetadataValue, Document, FileSearchApi, FileState, GroundingChunk,
    ImportOperation, ImportRequest, QueryAnswer, Store, UploadedFile,
};
use file_search_core::metadata::DocumentMetadata;
use file_search_core::{Error, Result};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const API_VERSION: &str = "v1beta";
const PAGE_SIZE: &str = "20";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);
const UPLOAD_URL_HEADER: &str = "x-goog-upload-url";

pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                tracing::error!(error = ?e, "Failed to build HTTP client");
                Error::Configuration(format!("failed to build HTTP client: {e}"))
            })?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        tracing::info!(base_url = %base_url, "Initialized Gemini client");
        Ok(Self {
            http,
            base_url,
            api_key: api_key.into(),
        })
    }

    /// Build a client from settings; fails before any network call when the key is missing.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let api_key = settings.require_api_key().map_err(|e| {
            tracing::error!(error = %e, "Cannot build Gemini client without an API key");
            e
        })?;
        Self::new(api_key, settings.api_base_url.as_str())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn api_url(&self, resource: &str) -> String {
        format!("{}/{}/{}", self.base_url, API_VERSION, resource)
    }

    fn upload_url(&self, resource: &str) -> String {
        format!("{}/upload/{}/{}", self.base_url, API_VERSION, resource)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("x-goog-api-key", &self.api_key)
    }

    /// Send a request and turn transport errors and non-2xx statuses into [`Error::Remote`].
    async fn send_raw(&self, operation: &str, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await.map_err(|e| {
            tracing::error!(operation, error = ?e, "Request to Gemini API failed");
            Error::remote(operation, e)
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        tracing::error!(operation, status = %status, body = %body, "Gemini API returned an error");
        Err(Error::remote(operation, format!("HTTP {}: {}", status.as_u16(), body)))
    }

    async fn send<T: DeserializeOwned>(&self, operation: &str, request: RequestBuilder) -> Result<T> {
        let response = self.send_raw(operation, request).await?;
        response.json::<T>().await.map_err(|e| {
            tracing::error!(operation, error = ?e, "Failed to decode Gemini API response");
            Error::remote(operation, format!("invalid response body: {e}"))
        })
    }

    /// Two-request resumable upload: announce the file with `metadata`, then
    /// send the bytes and finalize. Returns the body of the finalize response.
    async fn resumable_upload<T: DeserializeOwned>(
        &self,
        operation: &str,
        start_url: &str,
        path: &Path,
        mime_type: &str,
        metadata: Value,
    ) -> Result<T> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            tracing::error!(operation, path = %path.display(), error = ?e, "Failed to read file for upload");
            Error::io(path, e)
        })?;

        let start = self
            .request(Method::POST, start_url)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", bytes.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&metadata);
        let response = self.send_raw(operation, start).await?;

        let session_url = response
            .headers()
            .get(UPLOAD_URL_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                tracing::error!(operation, "Upload start response carried no session URL");
                Error::remote(operation, format!("missing {UPLOAD_URL_HEADER} header"))
            })?;
        tracing::debug!(operation, size = bytes.len(), "Resumable upload session opened");

        let finalize = self
            .request(Method::POST, &session_url)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(bytes);
        self.send(operation, finalize).await
    }

    async fn generate_content(&self, operation: &str, model: &str, body: Value) -> Result<GenerateContentResponse> {
        let url = self.api_url(&format!("{}:generateContent", model_resource(model)));
        self.send(operation, self.request(Method::POST, &url).json(&body))
            .await
    }
}

fn model_resource(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{model}")
    }
}

fn mime_type_of(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

fn display_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[async_trait]
impl FileSearchApi for GeminiClient {
    async fn list_stores(&self) -> Result<Vec<Store>> {
        let url = self.api_url("fileSearchStores");
        let mut stores = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.request(Method::GET, &url).query(&[("pageSize", PAGE_SIZE)]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }
            let page: ListStoresResponse = self.send("list_stores", request).await?;
            tracing::debug!(page_len = page.file_search_stores.len(), "Fetched page of stores");
            stores.extend(page.file_search_stores.into_iter().map(Store::from));

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(stores)
    }

    async fn create_store(&self, display_name: &str) -> Result<Store> {
        tracing::info!(display_name, "Creating store");
        let request = self
            .request(Method::POST, &self.api_url("fileSearchStores"))
            .json(&json!({ "displayName": display_name }));
        let store: StoreWire = self.send("create_store", request).await?;
        Ok(store.into())
    }

    async fn list_documents(&self, store: &str) -> Result<Vec<Document>> {
        let url = self.api_url(&format!("{store}/documents"));
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.request(Method::GET, &url).query(&[("pageSize", PAGE_SIZE)]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }
            let page: ListDocumentsResponse = self.send("list_documents", request).await?;
            documents.extend(page.documents.into_iter().map(Document::from));

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        tracing::debug!(store, count = documents.len(), "Listed documents");
        Ok(documents)
    }

    async fn delete_document(&self, name: &str, force: bool) -> Result<()> {
        tracing::info!(document = name, force, "Deleting document");
        let request = self
            .request(Method::DELETE, &self.api_url(name))
            .query(&[("force", force)]);
        self.send_raw("delete_document", request).await?;
        Ok(())
    }

    async fn upload_file(&self, path: &Path) -> Result<UploadedFile> {
        let mime_type = mime_type_of(path);
        let display_name = display_name_of(path);
        tracing::info!(file = %display_name, mime_type = %mime_type, "Uploading file");

        let response: UploadFileResponse = self
            .resumable_upload(
                "upload_file",
                &self.upload_url("files"),
                path,
                &mime_type,
                json!({ "file": { "displayName": display_name } }),
            )
            .await?;
        Ok(response.file.into())
    }

    async fn get_file(&self, name: &str) -> Result<UploadedFile> {
        let file: FileWire = self
            .send("get_file", self.request(Method::GET, &self.api_url(name)))
            .await?;
        tracing::debug!(file = name, state = ?file.state, "Fetched file state");
        Ok(file.into())
    }

    async fn extract_metadata(
        &self,
        model: &str,
        file: &UploadedFile,
        prompt: &str,
    ) -> Result<DocumentMetadata> {
        let uri = file.uri.as_deref().ok_or_else(|| {
            Error::remote("extract_metadata", format!("uploaded file {} has no uri", file.name))
        })?;
        let mime_type = file
            .mime_type
            .as_deref()
            .unwrap_or("application/octet-stream");

        let body = json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "text": prompt },
                    { "fileData": { "mimeType": mime_type, "fileUri": uri } }
                ]
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": metadata_schema()
            }
        });

        let response = self.generate_content("extract_metadata", model, body).await?;
        let text = response.text();
        serde_json::from_str::<DocumentMetadata>(&text).map_err(|e| {
            tracing::error!(file = %file.name, error = ?e, raw = %text, "Model returned unparseable metadata");
            Error::remote("extract_metadata", format!("model returned invalid metadata JSON: {e}"))
        })
    }

    async fn import_file(
        &self,
        store: &str,
        path: &Path,
        request: ImportRequest,
    ) -> Result<ImportOperation> {
        let mime_type = request.mime_type.clone().unwrap_or_else(|| mime_type_of(path));
        let metadata = ImportConfigWire {
            display_name: &request.display_name,
            custom_metadata: request
                .custom_metadata
                .iter()
                .map(CustomMetadataWire::from)
                .collect(),
            mime_type: &mime_type,
        };
        let metadata = serde_json::to_value(&metadata)
            .map_err(|e| Error::remote("import_file", format!("cannot encode request: {e}")))?;

        tracing::info!(store, file = %path.display(), display_name = %request.display_name, "Importing file into store");
        let operation: OperationWire = self
            .resumable_upload(
                "import_file",
                &self.upload_url(&format!("{store}:uploadToFileSearchStore")),
                path,
                &mime_type,
                metadata,
            )
            .await?;
        Ok(operation.into())
    }

    async fn get_operation(&self, name: &str) -> Result<ImportOperation> {
        let operation: OperationWire = self
            .send("get_operation", self.request(Method::GET, &self.api_url(name)))
            .await?;
        tracing::debug!(operation = name, done = operation.done, "Fetched operation");
        Ok(operation.into())
    }

    async fn query(&self, model: &str, store: &str, question: &str) -> Result<QueryAnswer> {
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": question }] }],
            "tools": [{ "fileSearch": { "fileSearchStoreNames": [store] } }]
        });
        let response = self.generate_content("query", model, body).await?;
        Ok(QueryAnswer {
            text: response.text(),
            grounding_chunks: response.grounding_chunks(),
        })
    }
}

fn metadata_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "title": { "type": "STRING" },
            "author": { "type": "STRING" },
            "abstract": { "type": "STRING" }
        },
        "required": ["title", "author", "abstract"],
        "propertyOrdering": ["title", "author", "abstract"]
    })
}

// Wire format.

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreWire {
    name: String,
    display_name: Option<String>,
    create_time: Option<String>,
}

impl From<StoreWire> for Store {
    fn from(w: StoreWire) -> Self {
        Store {
            name: w.name,
            display_name: w.display_name,
            create_time: w.create_time,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListStoresResponse {
    #[serde(default)]
    file_search_stores: Vec<StoreWire>,
    next_page_token: Option<String>,
}

#[derive(Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct CustomMetadataWire {
    key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    string_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    numeric_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    string_list_value: Option<StringListWire>,
}

#[derive(Serialize, Deserialize)]
struct StringListWire {
    #[serde(default)]
    values: Vec<String>,
}

impl From<&CustomMetadata> for CustomMetadataWire {
    fn from(m: &CustomMetadata) -> Self {
        let mut wire = CustomMetadataWire {
            key: m.key.clone(),
            ..Default::default()
        };
        match &m.value {
            CustomMetadataValue::String(s) => wire.string_value = Some(s.clone()),
            CustomMetadataValue::Numeric(n) => wire.numeric_value = Some(*n),
            CustomMetadataValue::StringList(values) => {
                wire.string_list_value = Some(StringListWire {
                    values: values.clone(),
                })
            }
        }
        wire
    }
}

impl From<CustomMetadataWire> for CustomMetadata {
    fn from(w: CustomMetadataWire) -> Self {
        let value = match (w.string_value, w.numeric_value, w.string_list_value) {
            (Some(s), _, _) => CustomMetadataValue::String(s),
            (None, Some(n), _) => CustomMetadataValue::Numeric(n),
            (None, None, Some(list)) => CustomMetadataValue::StringList(list.values),
            (None, None, None) => CustomMetadataValue::String(String::new()),
        };
        CustomMetadata { key: w.key, value }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentWire {
    name: String,
    display_name: Option<String>,
    #[serde(default)]
    custom_metadata: Vec<CustomMetadataWire>,
    state: Option<String>,
}

impl From<DocumentWire> for Document {
    fn from(w: DocumentWire) -> Self {
        Document {
            name: w.name,
            display_name: w.display_name,
            custom_metadata: w.custom_metadata.into_iter().map(CustomMetadata::from).collect(),
            state: w.state,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<DocumentWire>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileWire {
    name: String,
    display_name: Option<String>,
    mime_type: Option<String>,
    uri: Option<String>,
    state: Option<String>,
}

impl From<FileWire> for UploadedFile {
    fn from(w: FileWire) -> Self {
        UploadedFile {
            name: w.name,
            display_name: w.display_name,
            mime_type: w.mime_type,
            uri: w.uri,
            state: FileState::from_remote(w.state.as_deref().unwrap_or("")),
        }
    }
}

#[derive(Deserialize)]
struct UploadFileResponse {
    file: FileWire,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImportConfigWire<'a> {
    display_name: &'a str,
    custom_metadata: Vec<CustomMetadataWire>,
    mime_type: &'a str,
}

#[derive(Deserialize)]
struct OperationWire {
    name: String,
    #[serde(default)]
    done: bool,
    error: Option<StatusWire>,
}

#[derive(Deserialize)]
struct StatusWire {
    code: Option<i32>,
    message: Option<String>,
}

impl From<OperationWire> for ImportOperation {
    fn from(w: OperationWire) -> Self {
        let error = w.error.map(|status| match (status.code, status.message) {
            (Some(code), Some(message)) => format!("{message} (code {code})"),
            (None, Some(message)) => message,
            (Some(code), None) => format!("operation failed with code {code}"),
            (None, None) => "operation failed".to_string(),
        });
        ImportOperation {
            name: w.name,
            done: w.done,
            error,
        }
    }
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunkWire>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingChunkWire {
    retrieved_context: Option<RetrievedContext>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RetrievedContext {
    title: Option<String>,
    text: Option<String>,
    file_search_store: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate; empty when there is none.
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }

    fn grounding_chunks(&self) -> Vec<GroundingChunk> {
        self.candidates
            .first()
            .and_then(|c| c.grounding_metadata.as_ref())
            .map(|g| {
                g.grounding_chunks
                    .iter()
                    .map(|chunk| match &chunk.retrieved_context {
                        Some(ctx) => GroundingChunk {
                            title: ctx.title.clone(),
                            text: ctx.text.clone(),
                            store: ctx.file_search_store.clone(),
                        },
                        None => GroundingChunk::default(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_names_are_prefixed_once() {
        assert_eq!(model_resource("gemini-2.5-flash"), "models/gemini-2.5-flash");
        assert_eq!(model_resource("models/gemini-2.5-pro"), "models/gemini-2.5-pro");
    }

    #[test]
    fn mime_type_is_guessed_from_extension() {
        assert_eq!(mime_type_of(Path::new("data/report.pdf")), "application/pdf");
        assert_eq!(mime_type_of(Path::new("notes.txt")), "text/plain");
        assert_eq!(mime_type_of(Path::new("blob")), "application/octet-stream");
    }

    #[test]
    fn empty_candidates_give_empty_answer() {
        let response: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(response.text(), "");
        assert!(response.grounding_chunks().is_empty());
    }

    #[test]
    fn custom_metadata_wire_shape() {
        let wire = CustomMetadataWire::from(&CustomMetadata::string("file_name", "a.pdf"));
        let value = serde_json::to_value(&wire).unwrap();
        assert_eq!(value, json!({ "key": "file_name", "stringValue": "a.pdf" }));
    }

    #[test]
    fn operation_error_keeps_the_message() {
        let op: OperationWire = serde_json::from_value(json!({
            "name": "operations/1",
            "done": true,
            "error": { "code": 3, "message": "unsupported file" }
        }))
        .unwrap();
        let op = ImportOperation::from(op);
        assert_eq!(op.error.as_deref(), Some("unsupported file (code 3)"));
    }

    #[test]
    fn client_without_key_is_a_configuration_error() {
        let settings = Settings::from_lookup(|_| None);
        let err = GeminiClient::from_settings(&settings).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
