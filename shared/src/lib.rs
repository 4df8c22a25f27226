use serde::{Deserialize, Serialize};

pub mod board_format;
pub mod history;
pub mod snapshot;

pub use board_format::{decode_board_file, encode_board_file, BoardFileData, BoardFileError};
pub use history::{SnapshotHistory, DEFAULT_HISTORY_CAPACITY};
pub use snapshot::{Snapshot, SnapshotError};

/// Wire types for the REST backend. Field names match the JSON bodies the
/// frontend exchanges with the server.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ApiMessage {
    pub msg: String,
}

/// Error body, `{"detail": "..."}` on every non-2xx response.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ApiError {
    pub detail: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SaveDiagramRequest {
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Base64 data URL of the rendered board, as produced by `toDataURL()`.
    pub content: String,
    /// Present when overwriting an existing diagram.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SaveDiagramResponse {
    pub msg: String,
    pub id: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DiagramRecord {
    pub id: u64,
    pub title: String,
    pub content: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RenameDiagramRequest {
    pub title: String,
}
