//! Payload encoding for the disk stores.
//!
//! Payloads are serialized as JSON and, when enabled, zstd-compressed before
//! they hit disk. Decoding reverses the pipeline.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::StorageConfig;
use crate::store::StorageError;

/// Encodes and decodes cached payloads.
#[derive(Debug, Clone)]
pub struct PayloadCodec {
    compress: bool,
    zstd_level: i32,
}

impl PayloadCodec {
    pub fn new(compress: bool, zstd_level: i32) -> Self {
        Self {
            compress,
            zstd_level,
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.compress, config.zstd_level)
    }

    /// File extension for encoded payloads.
    pub fn extension(&self) -> &'static str {
        if self.compress {
            "json.zst"
        } else {
            "json"
        }
    }

    pub fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, StorageError> {
        let json = serde_json::to_vec(value)?;
        if self.compress {
            self.zstd_compress(&json)
        } else {
            Ok(json)
        }
    }

    pub fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, StorageError> {
        if self.compress {
            let json = self.zstd_decompress(data)?;
            Ok(serde_json::from_slice(&json)?)
        } else {
            Ok(serde_json::from_slice(data)?)
        }
    }

    fn zstd_compress(&self, data: &[u8]) -> Result<Vec<u8>, StorageError> {
        zstd::encode_all(data, self.zstd_level).map_err(StorageError::Compression)
    }

    fn zstd_decompress(&self, data: &[u8]) -> Result<Vec<u8>, StorageError> {
        zstd::decode_all(data).map_err(StorageError::Compression)
    }
}

impl Default for PayloadCodec {
    fn default() -> Self {
        Self::from_config(&StorageConfig::default())
    }
}

/// Map an entity id onto a file stem.
///
/// ASCII alphanumerics, `-` and `_` pass through; every other byte becomes
/// `%XX`, so distinct ids never collide.
pub fn file_stem(entity_id: &str) -> String {
    let mut out = String::with_capacity(entity_id.len());
    for byte in entity_id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}
