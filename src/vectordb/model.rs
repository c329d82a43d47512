use super::VectorDbError;

#[derive(Debug, Clone, PartialEq)]
pub struct VectorPoint {
    pub id: String,
    pub vector: Vec<f32>,
}

impl VectorPoint {
    pub fn new(id: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            vector,
        }
    }

    pub fn from_embedding_bytes(
        id: impl Into<String>,
        embedding_bytes: &[u8],
    ) -> Result<Self, VectorDbError> {
        Ok(Self::new(id, embedding_bytes_to_f32(embedding_bytes)?))
    }
}

/// One nearest-neighbor hit; higher `score` is more similar.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub id: String,
    pub score: f32,
}

impl SearchResult {
    pub fn new(id: impl Into<String>, score: f32) -> Self {
        Self {
            id: id.into(),
            score,
        }
    }
}

/// Decode a stored embedding blob (native-endian `f32`s).
pub fn embedding_bytes_to_f32(bytes: &[u8]) -> Result<Vec<f32>, VectorDbError> {
    if !bytes.len().is_multiple_of(4) {
        return Err(VectorDbError::InvalidEmbeddingBytesLength {
            actual: bytes.len(),
        });
    }

    // SQLite blobs carry no alignment guarantee; fall back to copying when the cast is refused.
    match bytemuck::try_cast_slice::<u8, f32>(bytes) {
        Ok(values) => Ok(values.to_vec()),
        Err(_) => Ok(bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()),
    }
}

/// Encode an embedding as a blob of native-endian `f32`s.
#[inline]
pub fn f32_to_embedding_bytes(vector: &[f32]) -> Vec<u8> {
    bytemuck::cast_slice(vector).to_vec()
}
