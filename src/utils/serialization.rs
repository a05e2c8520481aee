// Thin bincode 2.0 layer shared by everything that touches persisted bytes
use crate::error::{BlockchainError, Result};
use serde::{Deserialize, Serialize};

/// Serialize data using bincode 2.0 with standard configuration
pub fn serialize<T: Serialize + bincode::Encode>(data: &T) -> Result<Vec<u8>> {
    let config = bincode::config::standard();
    bincode::encode_to_vec(data, config)
        .map_err(|e| BlockchainError::SerializationMismatch(format!("Serialization failed: {e}")))
}

/// Deserialize data using bincode 2.0 with standard configuration.
///
/// The whole slice must be consumed; trailing bytes mean the value was not
/// produced by [`serialize`].
pub fn deserialize<T>(bytes: &[u8]) -> Result<T>
where
    T: for<'de> Deserialize<'de> + bincode::Decode<()>,
{
    let config = bincode::config::standard();
    let (data, read) = bincode::decode_from_slice(bytes, config).map_err(|e| {
        BlockchainError::SerializationMismatch(format!("Deserialization failed: {e}"))
    })?;
    if read != bytes.len() {
        return Err(BlockchainError::SerializationMismatch(format!(
            "{} trailing bytes after decoded value",
            bytes.len() - read
        )));
    }
    Ok(data)
}
