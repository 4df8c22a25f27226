use std::path::PathBuf;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use thiserror::Error;
use tracing::{error, info};

use crate::state::PersistentData;

const DB_FILE_MAGIC: [u8; 4] = *b"DDDB";
const DB_FILE_VERSION: u32 = 1;
const DB_HEADER_LEN: usize = 8;
const DB_OBJECT_NAME: &str = "drawdeck.db";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database not found")]
    NotFound,
    #[error("unsupported database version: {0}")]
    UnsupportedVersion(u32),
    #[error("invalid database file")]
    InvalidData,
    #[error("{0}")]
    Backend(String),
}

#[async_trait]
pub trait Storage: Send + Sync {
    async fn load(&self) -> Result<PersistentData, StorageError>;
    async fn save(&self, data: &PersistentData);
}

pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            path: data_dir.join(DB_OBJECT_NAME),
        }
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn load(&self) -> Result<PersistentData, StorageError> {
        let payload = match tokio::fs::read(&self.path).await {
            Ok(payload) => payload,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound);
            }
            Err(error) => return Err(StorageError::Backend(error.to_string())),
        };
        decode_database(&payload)
    }

    async fn save(&self, data: &PersistentData) {
        let payload = encode_database(data);
        if let Err(error) = tokio::fs::write(&self.path, payload).await {
            error!(path = %self.path.display(), %error, "failed to write database");
        }
    }
}

fn encode_database(data: &PersistentData) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&DB_FILE_MAGIC);
    payload.extend_from_slice(&DB_FILE_VERSION.to_le_bytes());
    let body = bincode::encode_to_vec(data, bincode::config::standard()).unwrap_or_default();
    payload.extend_from_slice(&body);
    payload
}

fn decode_database(payload: &[u8]) -> Result<PersistentData, StorageError> {
    if !(payload.len() >= DB_HEADER_LEN && payload.starts_with(&DB_FILE_MAGIC)) {
        return Err(StorageError::InvalidData);
    }
    let version = u32::from_le_bytes(
        payload[DB_FILE_MAGIC.len()..DB_HEADER_LEN]
            .try_into()
            .map_err(|_| StorageError::InvalidData)?,
    );
    let body = &payload[DB_HEADER_LEN..];
    match version {
        1 => bincode::decode_from_slice(body, bincode::config::standard())
            .map(|(data, _)| data)
            .map_err(|_| StorageError::InvalidData),
        _ => Err(StorageError::UnsupportedVersion(version)),
    }
}

#[derive(Clone, Debug)]
pub struct S3StorageConfig {
    pub bucket: String,
    pub prefix: Option<String>,
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
    pub force_path_style: bool,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

impl S3StorageConfig {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: None,
            region: None,
            endpoint_url: None,
            force_path_style: false,
            access_key_id: None,
            secret_access_key: None,
        }
    }
}

pub struct S3Storage {
    bucket: String,
    prefix: String,
    client: Client,
}

impl S3Storage {
    pub async fn new(config: S3StorageConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let (Some(access_key_id), Some(secret_access_key)) = (
            config.access_key_id.clone(),
            config.secret_access_key.clone(),
        ) {
            let creds = Credentials::new(access_key_id, secret_access_key, None, None, "static");
            loader = loader.credentials_provider(creds);
        }
        if let Some(region) = config.region.clone() {
            loader = loader.region(aws_config::Region::new(region));
        }
        let shared = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint_url) = config.endpoint_url.as_ref() {
            builder = builder.endpoint_url(endpoint_url);
        }
        if config.force_path_style {
            builder = builder.force_path_style(true);
        }
        let client = Client::from_conf(builder.build());
        let prefix = config
            .prefix
            .unwrap_or_default()
            .trim_matches('/')
            .to_string();
        info!(bucket = %config.bucket, "using s3 storage");
        Self {
            bucket: config.bucket,
            prefix,
            client,
        }
    }

    fn object_key(&self) -> String {
        if self.prefix.is_empty() {
            DB_OBJECT_NAME.to_string()
        } else {
            format!("{}/{DB_OBJECT_NAME}", self.prefix)
        }
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn load(&self) -> Result<PersistentData, StorageError> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(self.object_key())
            .send()
            .await;
        let output = match response {
            Ok(output) => output,
            Err(error) => {
                if let Some(service_error) = error.as_service_error() {
                    if service_error.is_no_such_key() {
                        return Err(StorageError::NotFound);
                    }
                }
                return Err(StorageError::Backend(format!("{error:?}")));
            }
        };
        let bytes = output
            .body
            .collect()
            .await
            .map_err(|error| StorageError::Backend(format!("{error:?}")))?
            .into_bytes();
        decode_database(&bytes)
    }

    async fn save(&self, data: &PersistentData) {
        let payload = encode_database(data);
        if let Err(error) = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(self.object_key())
            .body(ByteStream::from(payload))
            .send()
            .await
        {
            error!(bucket = %self.bucket, ?error, "failed to write database to s3");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{StoredDiagram, UserRecord};

    #[test]
    fn database_codec_round_trip() {
        let data = PersistentData {
            users: vec![UserRecord {
                username: "ada".to_string(),
                salt: "salt".to_string(),
                password_digest: vec![1, 2, 3],
            }],
            diagrams: vec![StoredDiagram {
                id: 1,
                title: "flow".to_string(),
                content: "data:image/png;base64,".to_string(),
                owner: "ada".to_string(),
            }],
            next_diagram_id: 2,
        };
        let decoded = decode_database(&encode_database(&data)).unwrap();
        assert_eq!(decoded.users.len(), 1);
        assert_eq!(decoded.diagrams[0].title, "flow");
        assert_eq!(decoded.next_diagram_id, 2);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(
            decode_database(b"nope"),
            Err(StorageError::InvalidData)
        ));
        let mut payload = Vec::new();
        payload.extend_from_slice(&DB_FILE_MAGIC);
        payload.extend_from_slice(&9u32.to_le_bytes());
        assert!(matches!(
            decode_database(&payload),
            Err(StorageError::UnsupportedVersion(9))
        ));
    }
}
