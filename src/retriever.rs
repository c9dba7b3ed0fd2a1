use camino::Utf8PathBuf;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::RetrieverConfig;
use crate::domain::{DatasetId, RetrievalAction};
use crate::error::GoldError;
use crate::remote::{GithubTreeSource, GoldSource};
use crate::store::{CachedDataset, Store};

#[derive(Debug, Clone, Serialize)]
pub struct Retrieval {
    pub dataset_id: String,
    pub path: Utf8PathBuf,
    pub action: RetrievalAction,
    pub files: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListResult {
    pub cache_root: String,
    pub datasets: Vec<CachedDataset>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InfoResult {
    pub dataset_id: String,
    pub path: String,
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClearResult {
    pub target: String,
    pub cleared: bool,
}

/// Fetches gold bundles into a local cache, one directory per dataset.
#[derive(Clone)]
pub struct GoldRetriever<S: GoldSource> {
    store: Store,
    source: S,
}

impl<S: GoldSource> GoldRetriever<S> {
    pub fn new(store: Store, source: S) -> Self {
        Self { store, source }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Returns the local directory for `id`, downloading it first unless a
    /// populated copy is already cached and `force` is off.
    ///
    /// The whole bundle is fetched into memory before the filesystem is
    /// touched, so a failed fetch creates nothing on disk.
    pub fn retrieve(&self, id: &DatasetId, force: bool) -> Result<Retrieval, GoldError> {
        let path = self.store.dataset_dir(id);

        if !force && self.store.is_populated(&path)? {
            let files = self.store.file_names(&path)?.len();
            info!(dataset = %id, %path, "cache hit");
            return Ok(Retrieval {
                dataset_id: id.to_string(),
                path,
                action: RetrievalAction::Cache,
                files,
            });
        }

        info!(dataset = %id, force, "fetching gold dataset");
        let bundle = self.source.fetch_bundle(id)?;
        bundle.validate(id)?;
        debug!(dataset = %id, files = bundle.len(), "bundle fetched");

        self.store.ensure_cache_root()?;
        self.store.write_bundle_atomic(&path, &bundle)?;
        info!(dataset = %id, %path, files = bundle.len(), "gold dataset stored");

        Ok(Retrieval {
            dataset_id: id.to_string(),
            path,
            action: RetrievalAction::Download,
            files: bundle.len(),
        })
    }

    pub fn list(&self) -> Result<ListResult, GoldError> {
        Ok(ListResult {
            cache_root: self.store.cache_root().to_string(),
            datasets: self.store.list_datasets()?,
        })
    }

    pub fn info(&self, id: &DatasetId) -> Result<InfoResult, GoldError> {
        let path = self.store.dataset_dir(id);
        if !self.store.is_populated(&path)? {
            return Err(GoldError::DatasetNotCached(id.to_string()));
        }
        Ok(InfoResult {
            dataset_id: id.to_string(),
            files: self.store.file_names(&path)?,
            path: path.to_string(),
        })
    }

    /// Removes one cached dataset, or the whole cache root when `id` is `None`.
    pub fn clear(&self, id: Option<&DatasetId>) -> Result<ClearResult, GoldError> {
        let (target, cleared) = match id {
            Some(id) => (
                self.store.dataset_dir(id).to_string(),
                self.store.remove_dataset(id)?,
            ),
            None => (self.store.cache_root().to_string(), self.store.clear()?),
        };
        info!(%target, cleared, "cache cleared");
        Ok(ClearResult { target, cleared })
    }
}

/// One-call form: resolve `dataset_id` against the configured remote and
/// cache root, honouring `config.force`.
pub fn retrieve(config: &RetrieverConfig, dataset_id: &str) -> Result<Utf8PathBuf, GoldError> {
    let id: DatasetId = dataset_id.parse()?;
    let source = GithubTreeSource::new(config)?;
    let retriever = GoldRetriever::new(Store::new(config.cache_root.clone()), source);
    retriever.retrieve(&id, config.force).map(|retrieval| retrieval.path)
}
