use async_trait::async_trait;

use super::{Loader, LoaderError};
use crate::chunker::ExperienceSource;

/// Hands out sources that are already in memory, eg records fetched by the caller's storage layer.
#[derive(Debug, Clone, Default)]
pub struct DirectLoader {
    sources: Vec<ExperienceSource>,
}

impl DirectLoader {
    #[must_use]
    pub fn new(sources: Vec<ExperienceSource>) -> Self {
        Self { sources }
    }
}

#[async_trait]
impl Loader for DirectLoader {
    async fn load(&self) -> Result<Vec<ExperienceSource>, LoaderError> {
        Ok(self.sources.clone())
    }
}
