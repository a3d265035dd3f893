use async_trait::async_trait;
use thiserror::Error;

/// What the 3D loader produced for a model URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadedScene {
    pub node_count: usize,
    pub animations: Vec<String>,
}

impl LoadedScene {
    pub fn has_content(&self) -> bool {
        self.node_count > 0
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    #[error("model request failed: {0}")]
    Fetch(String),
    #[error("model could not be parsed: {0}")]
    Parse(String),
}

/// External 3D asset loader. Slow or broken loads are a display concern.
#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load(&self, url: &str) -> Result<LoadedScene, LoadError>;
}
