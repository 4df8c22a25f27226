use bincode::{Decode, Encode};
use thiserror::Error;

pub const BOARD_FILE_MAGIC: [u8; 4] = *b"DDBF";
pub const BOARD_FILE_VERSION: u32 = 1;
const BOARD_HEADER_LEN: usize = BOARD_FILE_MAGIC.len() + std::mem::size_of::<u32>();

/// On-disk format for a locally saved board: magic, little-endian version,
/// bincode body.
#[derive(Clone, Debug, Default, PartialEq, Encode, Decode, serde::Serialize, serde::Deserialize)]
pub struct BoardFileData {
    pub title: String,
    /// Base64 data URL of the last rendered snapshot.
    pub snapshot: String,
}

#[derive(Debug, Error, PartialEq)]
pub enum BoardFileError {
    #[error("unsupported board file version: {0}")]
    UnsupportedVersion(u32),
    #[error("not a board file")]
    InvalidData,
}

pub fn encode_board_file(data: &BoardFileData) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&BOARD_FILE_MAGIC);
    payload.extend_from_slice(&BOARD_FILE_VERSION.to_le_bytes());
    let body = bincode::encode_to_vec(data, bincode::config::standard()).unwrap_or_default();
    payload.extend_from_slice(&body);
    payload
}

pub fn decode_board_file(payload: &[u8]) -> Result<BoardFileData, BoardFileError> {
    if !(payload.len() >= BOARD_HEADER_LEN && payload.starts_with(&BOARD_FILE_MAGIC)) {
        return Err(BoardFileError::InvalidData);
    }
    let version = u32::from_le_bytes(
        payload[BOARD_FILE_MAGIC.len()..BOARD_HEADER_LEN]
            .try_into()
            .map_err(|_| BoardFileError::InvalidData)?,
    );
    let body = &payload[BOARD_HEADER_LEN..];
    match version {
        1 => bincode::decode_from_slice(body, bincode::config::standard())
            .map(|(data, _)| data)
            .map_err(|_| BoardFileError::InvalidData),
        _ => Err(BoardFileError::UnsupportedVersion(version)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_preserves_board() {
        let data = BoardFileData {
            title: "retro notes".to_string(),
            snapshot: "data:image/png;base64,aGVsbG8=".to_string(),
        };
        let decoded = decode_board_file(&encode_board_file(&data)).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn rejects_foreign_and_truncated_payloads() {
        assert_eq!(
            decode_board_file(b"PNG\x0d\x0a\x1a\x0a"),
            Err(BoardFileError::InvalidData)
        );
        assert_eq!(decode_board_file(b"DDB"), Err(BoardFileError::InvalidData));
    }

    #[test]
    fn rejects_future_versions() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&BOARD_FILE_MAGIC);
        payload.extend_from_slice(&99u32.to_le_bytes());
        assert_eq!(
            decode_board_file(&payload),
            Err(BoardFileError::UnsupportedVersion(99))
        );
    }
}
