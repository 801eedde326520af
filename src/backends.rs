//! Process-wide collaborator handles.
//!
//! [`Backends`] owns the generation model and the index, each created at
//! most once on first use and shared for the rest of the process. Creation
//! is lazy so that a missing credential degrades only the endpoints that
//! need it into a [`RagError::Configuration`] instead of stopping startup.
//! A failed initialisation is not cached; the next request tries again.

use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::error::RagError;
use crate::generation::{create_model, ChatModel};
use crate::index::IndexStore;
use crate::store::open_store;

pub struct Backends {
    config: Arc<Config>,
    model: OnceCell<Arc<dyn ChatModel>>,
    index: OnceCell<Arc<IndexStore>>,
}

impl Backends {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            model: OnceCell::new(),
            index: OnceCell::new(),
        }
    }

    /// Pre-populated handles. Tests and embedders of the library use this to
    /// supply their own collaborators.
    pub fn with_components(
        config: Arc<Config>,
        model: Option<Arc<dyn ChatModel>>,
        index: Option<Arc<IndexStore>>,
    ) -> Self {
        Self {
            config,
            model: OnceCell::new_with(model),
            index: OnceCell::new_with(index),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The configured model name, without initialising the model.
    pub fn model_label(&self) -> String {
        match self.model.get() {
            Some(model) => model.model_name().to_string(),
            None => self.config.model.name.clone(),
        }
    }

    pub async fn model(&self) -> Result<Arc<dyn ChatModel>, RagError> {
        self.model
            .get_or_try_init(|| async {
                let model = create_model(&self.config.model)
                    .map_err(|e| RagError::Configuration(format!("{:#}", e)))?;
                tracing::info!(
                    provider = %self.config.model.provider,
                    model = model.model_name(),
                    "generation model initialised"
                );
                Ok::<_, RagError>(model)
            })
            .await
            .cloned()
    }

    pub async fn index(&self) -> Result<Arc<IndexStore>, RagError> {
        self.index
            .get_or_try_init(|| async {
                let embedder = create_embedder(&self.config.embedding)
                    .map_err(|e| RagError::Configuration(format!("{:#}", e)))?;
                let store = open_store(&self.config.index)
                    .await
                    .map_err(|e| RagError::IndexUnavailable(format!("{:#}", e)))?;
                let index =
                    IndexStore::open(self.config.index.collection.clone(), embedder, store).await?;
                Ok::<_, RagError>(Arc::new(index))
            })
            .await
            .cloned()
    }
}
