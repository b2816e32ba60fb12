use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;

use async_trait::async_trait;
use google_drive3::hyper_util::client::legacy::connect::HttpConnector;
use google_drive3::{api::File, api::Scope, hyper_rustls, hyper_util, yup_oauth2, DriveHub};
use tokio::sync::Mutex;
use tracing::info;

use crate::config::DocumentBackend;
use crate::ids::HashKey;

/// Kind of document an applicant submits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Resume,
    CurriculumVitae,
}

impl DocumentKind {
    pub const fn name_prefix(self) -> &'static str {
        match self {
            DocumentKind::Resume => "resume",
            DocumentKind::CurriculumVitae => "curriculum_vitae",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "resume" => Some(Self::Resume),
            "curriculum_vitae" | "cv" => Some(Self::CurriculumVitae),
            _ => None,
        }
    }
}

/// Object key `<namePre>_<applicantHashKey>.<extension>`.
pub fn document_key(kind: DocumentKind, applicant: &HashKey, extension: &str) -> String {
    let extension = extension.trim().trim_start_matches('.').to_ascii_lowercase();
    format!("{}_{}.{}", kind.name_prefix(), applicant, extension)
}

#[derive(Debug, thiserror::Error)]
pub enum DocumentStorageError {
    #[error("document {0} not found")]
    NotFound(String),
    #[error("document storage failed: {0}")]
    Backend(String),
}

#[async_trait]
pub trait DocumentStorage: Send + Sync + 'static {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<String>,
    ) -> Result<(), DocumentStorageError>;

    async fn get(&self, key: &str) -> Result<Vec<u8>, DocumentStorageError>;
}

#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

#[derive(Debug, Default)]
pub struct MemoryDocumentStorage {
    objects: Mutex<HashMap<String, StoredDocument>>,
}

impl MemoryDocumentStorage {
    pub async fn stored(&self, key: &str) -> Option<StoredDocument> {
        self.objects.lock().await.get(key).cloned()
    }
}

#[async_trait]
impl DocumentStorage for MemoryDocumentStorage {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<String>,
    ) -> Result<(), DocumentStorageError> {
        self.objects.lock().await.insert(
            key.to_string(),
            StoredDocument {
                bytes,
                content_type,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, DocumentStorageError> {
        self.objects
            .lock()
            .await
            .get(key)
            .map(|stored| stored.bytes.clone())
            .ok_or_else(|| DocumentStorageError::NotFound(key.to_string()))
    }
}

/// Drive-backed storage: every key becomes a file name inside one folder.
pub struct GoogleDriveStorage<C>
where
    C: google_drive3::common::Connector + Send + Sync + 'static,
{
    hub: DriveHub<C>,
    folder_id: String,
}

impl<C> GoogleDriveStorage<C>
where
    C: google_drive3::common::Connector + Send + Sync + 'static,
{
    pub fn new(hub: DriveHub<C>, folder_id: impl Into<String>) -> Self {
        Self {
            hub,
            folder_id: folder_id.into(),
        }
    }

    fn map_error<E: std::fmt::Display>(err: E) -> DocumentStorageError {
        DocumentStorageError::Backend(err.to_string())
    }

    async fn file_id(&self, key: &str) -> Result<String, DocumentStorageError> {
        let query = name_query(key, &self.folder_id);
        let (_, list) = self
            .hub
            .files()
            .list()
            .q(&query)
            .param("fields", "files(id,name)")
            .page_size(1)
            .supports_all_drives(true)
            .include_items_from_all_drives(true)
            .add_scope(Scope::Readonly)
            .doit()
            .await
            .map_err(Self::map_error)?;

        list.files
            .unwrap_or_default()
            .into_iter()
            .find_map(|file| file.id)
            .ok_or_else(|| DocumentStorageError::NotFound(key.to_string()))
    }
}

/// HTTPS connector used by the service-account Drive client.
pub type DriveConnector = hyper_rustls::HttpsConnector<HttpConnector>;

impl GoogleDriveStorage<DriveConnector> {
    /// Authenticates with a service-account key file and targets `folder_id`.
    pub async fn connect(
        service_account_key: &Path,
        folder_id: impl Into<String>,
    ) -> Result<Self, DocumentStorageError> {
        let key = yup_oauth2::read_service_account_key(service_account_key)
            .await
            .map_err(Self::map_error)?;
        let auth = yup_oauth2::ServiceAccountAuthenticator::builder(key)
            .build()
            .await
            .map_err(Self::map_error)?;
        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .map_err(Self::map_error)?
            .https_only()
            .enable_http1()
            .build();
        let client =
            hyper_util::client::legacy::Client::builder(hyper_util::rt::TokioExecutor::new())
                .build(connector);
        Ok(Self::new(DriveHub::new(client, auth), folder_id))
    }
}

fn name_query(key: &str, folder_id: &str) -> String {
    format!(
        "name = '{}' and '{}' in parents and trashed = false",
        key.replace('\'', "\\'"),
        folder_id
    )
}

impl<C> std::fmt::Debug for GoogleDriveStorage<C>
where
    C: google_drive3::common::Connector + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleDriveStorage")
            .field("folder_id", &self.folder_id)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<C> DocumentStorage for GoogleDriveStorage<C>
where
    C: google_drive3::common::Connector + Send + Sync + 'static,
{
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<String>,
    ) -> Result<(), DocumentStorageError> {
        let mime_type = content_type
            .as_deref()
            .and_then(|value| value.parse::<mime::Mime>().ok())
            .unwrap_or(mime::APPLICATION_OCTET_STREAM);
        let metadata = File {
            name: Some(key.to_string()),
            mime_type: Some(mime_type.to_string()),
            parents: Some(vec![self.folder_id.clone()]),
            ..File::default()
        };

        self.hub
            .files()
            .create(metadata)
            .param("fields", "id")
            .supports_all_drives(true)
            .add_scope(Scope::File)
            .upload(Cursor::new(bytes), mime_type)
            .await
            .map_err(Self::map_error)?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, DocumentStorageError> {
        let file_id = self.file_id(key).await?;
        let (response, _) = self
            .hub
            .files()
            .get(&file_id)
            .param("alt", "media")
            .supports_all_drives(true)
            .add_scope(Scope::Readonly)
            .doit()
            .await
            .map_err(Self::map_error)?;

        let body = google_drive3::common::to_bytes(response.into_body())
            .await
            .ok_or_else(|| DocumentStorageError::Backend("empty media response".to_string()))?;
        Ok(body.to_vec())
    }
}

/// Backend chosen by configuration at startup.
#[derive(Debug)]
pub enum ConfiguredStorage {
    Memory(MemoryDocumentStorage),
    Drive(GoogleDriveStorage<DriveConnector>),
}

impl ConfiguredStorage {
    pub async fn open(backend: &DocumentBackend) -> Result<Self, DocumentStorageError> {
        match backend {
            DocumentBackend::Memory => Ok(Self::Memory(MemoryDocumentStorage::default())),
            DocumentBackend::Drive {
                folder_id,
                service_account_key,
            } => {
                let storage =
                    GoogleDriveStorage::connect(service_account_key, folder_id.clone()).await?;
                info!(folder = %folder_id, "documents stored in Google Drive");
                Ok(Self::Drive(storage))
            }
        }
    }
}

#[async_trait]
impl DocumentStorage for ConfiguredStorage {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<String>,
    ) -> Result<(), DocumentStorageError> {
        match self {
            Self::Memory(storage) => storage.put(key, bytes, content_type).await,
            Self::Drive(storage) => storage.put(key, bytes, content_type).await,
        }
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, DocumentStorageError> {
        match self {
            Self::Memory(storage) => storage.get(key).await,
            Self::Drive(storage) => storage.get(key).await,
        }
    }
}
