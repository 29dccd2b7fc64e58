//! Flat (exact) vector index with a node document store.
//!
//! Persisted as two JSON artifacts in a storage directory:
//! `vector_store.json` holds the embeddings, `docstore.json` the nodes and the
//! list of source documents they came from. Loading validates both files
//! together, so a caller either gets a complete index or an error.

use crate::embedding_service::calculate_similarity;
use crate::models::{DocumentMetadata, Node, ScoredNode};
use anyhow::{bail, Context, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

pub const VECTOR_STORE_FILE: &str = "vector_store.json";
pub const DOCSTORE_FILE: &str = "docstore.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct VectorEntry {
    node_id: String,
    embedding: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStore {
    dimension: usize,
    entries: Vec<VectorEntry>,
}

impl VectorStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            entries: Vec::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn add(&mut self, node_id: String, embedding: Vec<f32>) -> Result<()> {
        if embedding.len() != self.dimension {
            bail!(
                "embedding for node {} has {} dimensions, index expects {}",
                node_id,
                embedding.len(),
                self.dimension
            );
        }
        self.entries.push(VectorEntry { node_id, embedding });
        Ok(())
    }

    /// Ids of the `top_k` most similar vectors, best first.
    pub fn query(&self, query_embedding: &[f32], top_k: usize) -> Vec<(String, f32)> {
        let mut scores: Vec<(&str, f32)> = self
            .entries
            .iter()
            .map(|entry| {
                (
                    entry.node_id.as_str(),
                    calculate_similarity(query_embedding, &entry.embedding),
                )
            })
            .collect();

        scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        scores
            .into_iter()
            .take(top_k)
            .map(|(id, score)| (id.to_string(), score))
            .collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocStore {
    documents: Vec<DocumentMetadata>,
    nodes: BTreeMap<String, Node>,
}

impl DocStore {
    pub fn add_document(&mut self, metadata: DocumentMetadata) {
        self.documents.push(metadata);
    }

    pub fn insert(&mut self, node: Node) {
        self.nodes.insert(node.id.clone(), node);
    }

    pub fn get(&self, node_id: &str) -> Option<&Node> {
        self.nodes.get(node_id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn documents(&self) -> &[DocumentMetadata] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// File names of the documents this store was built from.
    pub fn source_files(&self) -> BTreeSet<&str> {
        self.documents.iter().map(|d| d.file_name.as_str()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct VectorIndex {
    vector_store: VectorStore,
    docstore: DocStore,
}

impl VectorIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            vector_store: VectorStore::new(dimension),
            docstore: DocStore::default(),
        }
    }

    pub fn add_document(&mut self, metadata: DocumentMetadata) {
        self.docstore.add_document(metadata);
    }

    pub fn insert(&mut self, node: Node, embedding: Vec<f32>) -> Result<()> {
        self.vector_store.add(node.id.clone(), embedding)?;
        self.docstore.insert(node);
        Ok(())
    }

    pub fn dimension(&self) -> usize {
        self.vector_store.dimension()
    }

    pub fn docstore(&self) -> &DocStore {
        &self.docstore
    }

    pub fn len(&self) -> usize {
        self.vector_store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vector_store.is_empty()
    }

    pub fn retrieve(&self, query_embedding: &[f32], top_k: usize) -> Vec<ScoredNode> {
        self.vector_store
            .query(query_embedding, top_k)
            .into_iter()
            .filter_map(|(id, score)| {
                self.docstore.get(&id).map(|node| ScoredNode {
                    node: node.clone(),
                    score,
                })
            })
            .collect()
    }

    fn from_parts(vector_store: VectorStore, docstore: DocStore) -> Result<Self> {
        if vector_store.len() != docstore.len() {
            bail!(
                "vector store holds {} vectors but docstore holds {} nodes",
                vector_store.len(),
                docstore.len()
            );
        }
        for entry in &vector_store.entries {
            if entry.embedding.len() != vector_store.dimension {
                bail!("vector for node {} has the wrong dimension", entry.node_id);
            }
            if docstore.get(&entry.node_id).is_none() {
                bail!("vector references unknown node {}", entry.node_id);
            }
        }
        Ok(Self {
            vector_store,
            docstore,
        })
    }
}

/// On-disk home of a persisted [`VectorIndex`].
#[derive(Debug, Clone)]
pub struct IndexStorage {
    dir: PathBuf,
}

impl IndexStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn vector_store_path(&self) -> PathBuf {
        self.dir.join(VECTOR_STORE_FILE)
    }

    fn docstore_path(&self) -> PathBuf {
        self.dir.join(DOCSTORE_FILE)
    }

    /// True when both artifacts are present.
    pub fn exists(&self) -> bool {
        self.vector_store_path().is_file() && self.docstore_path().is_file()
    }

    pub fn persist(&self, index: &VectorIndex) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating {}", self.dir.display()))?;
        write_json(&self.vector_store_path(), &index.vector_store)?;
        write_json(&self.docstore_path(), &index.docstore)?;
        log::info!(
            "Persisted index with {} nodes to {}",
            index.len(),
            self.dir.display()
        );
        Ok(())
    }

    pub fn load(&self) -> Result<VectorIndex> {
        let vector_store: VectorStore = read_json(&self.vector_store_path())?;
        let docstore: DocStore = read_json(&self.docstore_path())?;
        VectorIndex::from_parts(vector_store, docstore)
            .with_context(|| format!("inconsistent index in {}", self.dir.display()))
    }

    /// Removes both artifacts; missing files are fine.
    pub fn clear(&self) -> Result<()> {
        for path in [self.vector_store_path(), self.docstore_path()] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(e).with_context(|| format!("removing {}", path.display()))
                }
            }
        }
        Ok(())
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let bytes = serde_json::to_vec(value)?;
    fs::write(&tmp, bytes).with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("parsing {}", path.display()))
}
