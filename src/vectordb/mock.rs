use crate::vectordb::{SearchResult, VectorDbError, VectorIndex, VectorPoint};

/// Vector index whose every call fails, for exercising degraded search paths.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingVectorIndex;

impl FailingVectorIndex {
    pub fn new() -> Self {
        Self
    }
}

impl VectorIndex for FailingVectorIndex {
    async fn upsert_vectors(&self, _points: Vec<VectorPoint>) -> Result<(), VectorDbError> {
        Err(VectorDbError::UpsertFailed {
            message: "mock index set to fail".to_string(),
        })
    }

    async fn find_similar(
        &self,
        _query: Vec<f32>,
        _limit: usize,
    ) -> Result<Vec<SearchResult>, VectorDbError> {
        Err(VectorDbError::SearchFailed {
            message: "mock index set to fail".to_string(),
        })
    }

    async fn delete_vectors(&self, _ids: Vec<String>) -> Result<(), VectorDbError> {
        Err(VectorDbError::DeleteFailed {
            message: "mock index set to fail".to_string(),
        })
    }
}
