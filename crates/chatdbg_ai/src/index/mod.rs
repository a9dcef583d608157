use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use chatdbg_core::corpus::Corpus;
use chatdbg_core::error::AppError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::embeddings::Embedder;
use crate::retrieve::similarity;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IndexStatus {
    pub ready: bool,
    pub model: Option<String>,
    pub dims: Option<u32>,
    pub fragment_count: u32,
    #[serde(default)]
    pub fragments_total: u32,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IndexBuildInput {
    pub model: String,
    pub updated_at: String,
}

/// Embedding vectors kept on disk next to the corpus database.
#[derive(Debug, Clone)]
pub struct IndexStore {
    root: PathBuf,
}

/// A loaded, ready index. Norms are computed once at load.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    model: String,
    dims: u32,
    entries: Vec<IndexEntry>,
}

#[derive(Debug, Clone)]
pub(crate) struct IndexEntry {
    pub(crate) fragment_id: String,
    pub(crate) vector: Vec<f32>,
    pub(crate) norm: f32,
}

impl VectorIndex {
    pub fn new(
        model: impl Into<String>,
        vectors: BTreeMap<String, Vec<f32>>,
    ) -> Result<Self, AppError> {
        let mut dims: Option<u32> = None;
        let mut entries = Vec::with_capacity(vectors.len());
        for (fragment_id, vector) in vectors {
            let this_dims = vector.len() as u32;
            match dims {
                Some(d) if d != this_dims => {
                    return Err(AppError::new("AI_INDEX_NOT_READY", "Index vector dims mismatch")
                        .with_details(format!(
                            "fragment_id={fragment_id}; expected={d}; got={this_dims}"
                        )));
                }
                Some(_) => {}
                None => dims = Some(this_dims),
            }
            let norm = similarity::l2_norm(&vector);
            entries.push(IndexEntry {
                fragment_id,
                vector,
                norm,
            });
        }
        let dims = dims.ok_or_else(|| {
            AppError::new("AI_INDEX_NOT_READY", "Index vectors missing; rebuild index")
        })?;
        Ok(Self {
            model: model.into(),
            dims,
            entries,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dims(&self) -> u32 {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }
}

fn read_json<T: DeserializeOwned + Default>(path: &Path, what: &str) -> Result<T, AppError> {
    if !path.exists() {
        return Ok(T::default());
    }
    let bytes = fs::read(path).map_err(|e| {
        AppError::new("AI_INDEX_READ_FAILED", format!("Failed to read index {what}"))
            .with_details(format!("path={}; err={}", path.display(), e))
    })?;
    serde_json::from_slice(&bytes).map_err(|e| {
        AppError::new("AI_INDEX_READ_FAILED", format!("Failed to decode index {what}"))
            .with_details(format!("path={}; err={}", path.display(), e))
    })
}

/// Write via tmp file then rename so readers never observe a half-written file.
fn write_json_atomic<T: Serialize>(path: &Path, value: &T, what: &str) -> Result<(), AppError> {
    let tmp = path.with_extension("tmp");
    let json = serde_json::to_string_pretty(value).map_err(|e| {
        AppError::new("AI_INDEX_BUILD_FAILED", format!("Failed to encode index {what}"))
            .with_details(e.to_string())
    })?;
    fs::write(&tmp, json.as_bytes()).map_err(|e| {
        AppError::new("AI_INDEX_BUILD_FAILED", format!("Failed to write index {what}"))
            .with_details(format!("path={}; err={}", tmp.display(), e))
    })?;
    fs::rename(&tmp, path).map_err(|e| {
        AppError::new("AI_INDEX_BUILD_FAILED", format!("Failed to finalize index {what} write"))
            .with_details(format!("tmp={}; dest={}; err={}", tmp.display(), path.display(), e))
    })
}

impl IndexStore {
    pub fn open(root: PathBuf) -> Self {
        Self { root }
    }

    fn index_dir(&self) -> PathBuf {
        self.root.join("index")
    }

    fn status_path(&self) -> PathBuf {
        self.index_dir().join("index_status.json")
    }

    fn vectors_path(&self) -> PathBuf {
        self.index_dir().join("index_vectors.json")
    }

    fn hashes_path(&self) -> PathBuf {
        self.index_dir().join("index_hashes.json")
    }

    fn ensure_dirs(&self) -> Result<(), AppError> {
        fs::create_dir_all(self.index_dir()).map_err(|e| {
            AppError::new("AI_INDEX_BUILD_FAILED", "Failed to create index directory")
                .with_details(format!("path={}; err={}", self.index_dir().display(), e))
        })
    }

    pub fn status(&self) -> Result<IndexStatus, AppError> {
        read_json(&self.status_path(), "status")
    }

    pub fn read_vectors(&self) -> Result<BTreeMap<String, Vec<f32>>, AppError> {
        read_json(&self.vectors_path(), "vectors")
    }

    pub fn read_hashes(&self) -> Result<BTreeMap<String, String>, AppError> {
        read_json(&self.hashes_path(), "hashes")
    }

    /// Load a ready index for querying. Anything short of a complete build is `AI_INDEX_NOT_READY`.
    pub fn load(&self) -> Result<VectorIndex, AppError> {
        let st = self.status()?;
        if !st.ready {
            return Err(AppError::new(
                "AI_INDEX_NOT_READY",
                "Index not ready; build the index before querying",
            ));
        }
        let model = st
            .model
            .ok_or_else(|| AppError::new("AI_INDEX_NOT_READY", "Index status missing model"))?;
        let index = VectorIndex::new(model, self.read_vectors()?)?;
        if st.dims != Some(index.dims()) {
            return Err(AppError::new("AI_INDEX_NOT_READY", "Index status dims do not match vectors")
                .with_details(format!("status={:?}; vectors={}", st.dims, index.dims())));
        }
        Ok(index)
    }

    /// Embed every fragment whose content changed since the last build with the same model.
    pub fn build_with_embedder(
        &self,
        corpus: &Corpus,
        embedder: &dyn Embedder,
        input: IndexBuildInput,
    ) -> Result<IndexStatus, AppError> {
        self.ensure_dirs()?;
        if corpus.is_empty() {
            return Err(AppError::new(
                "AI_INDEX_NOT_READY",
                "Corpus is empty; ingest an archive before building the index",
            ));
        }

        let current = self.status()?;
        let compatible = current.ready && current.model.as_deref() == Some(input.model.as_str());

        let (mut vectors, mut hashes) = if compatible {
            (self.read_vectors()?, self.read_hashes()?)
        } else {
            (BTreeMap::new(), BTreeMap::new())
        };

        let wanted: BTreeSet<&str> = corpus.iter().map(|f| f.fragment_id.as_str()).collect();
        vectors.retain(|k, _| wanted.contains(k.as_str()));
        hashes.retain(|k, _| wanted.contains(k.as_str()));

        let mut dims: Option<u32> = if compatible { current.dims } else { None };
        let mut embedded = 0usize;

        for fragment in corpus.iter() {
            let fresh = hashes.get(&fragment.fragment_id) == Some(&fragment.content_sha256)
                && vectors.contains_key(&fragment.fragment_id);
            if fresh {
                continue;
            }
            let v = embedder.embed(&input.model, &fragment.content).map_err(|e| {
                AppError::new("AI_EMBEDDINGS_FAILED", "Failed to compute embeddings")
                    .with_details(format!("fragment_id={}; err={}", fragment.fragment_id, e))
                    .with_retryable(e.retryable)
            })?;
            let this_dims = v.len() as u32;
            match dims {
                Some(d) if d != this_dims => {
                    return Err(AppError::new(
                        "AI_INDEX_BUILD_FAILED",
                        "Embedding dimension mismatch across fragments",
                    )
                    .with_details(format!(
                        "expected={d}; got={this_dims}; fragment_id={}",
                        fragment.fragment_id
                    )));
                }
                Some(_) => {}
                None => dims = Some(this_dims),
            }
            vectors.insert(fragment.fragment_id.clone(), v);
            hashes.insert(fragment.fragment_id.clone(), fragment.content_sha256.clone());
            embedded += 1;
        }

        // Only after every embedding succeeded.
        write_json_atomic(&self.vectors_path(), &vectors, "vectors")?;
        write_json_atomic(&self.hashes_path(), &hashes, "hashes")?;

        let status = IndexStatus {
            ready: true,
            model: Some(input.model),
            dims,
            fragment_count: vectors.len() as u32,
            fragments_total: corpus.len() as u32,
            updated_at: Some(input.updated_at),
        };
        write_json_atomic(&self.status_path(), &status, "status")?;
        tracing::info!(
            embedded,
            total = corpus.len(),
            dims = ?status.dims,
            "vector index built"
        );
        Ok(status)
    }
}
