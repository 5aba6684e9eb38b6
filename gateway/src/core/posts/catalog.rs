use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use super::{Post, PostLookup};

/// Posts shipped with the gateway.
const BUNDLED_POSTS: &str = include_str!("../../../data/posts.json");

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read posts file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse posts: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Duplicate post_id '{0}'")]
    DuplicateId(String),

    #[error("Post with empty post_id")]
    EmptyId,
}

/// Immutable in-memory post catalog.
///
/// Built once and shared read-only by every session.
#[derive(Debug, Default)]
pub struct PostCatalog {
    posts: HashMap<String, Arc<Post>>,
}

impl PostCatalog {
    /// Load the catalog bundled into the binary.
    pub fn bundled() -> Result<Self, CatalogError> {
        Self::from_json(BUNDLED_POSTS)
    }

    /// Load from a JSON file holding an array of posts.
    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let contents = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let posts: Vec<Post> = serde_json::from_str(json)?;
        Self::from_posts(posts)
    }

    pub fn from_posts(posts: Vec<Post>) -> Result<Self, CatalogError> {
        let mut map = HashMap::with_capacity(posts.len());
        for post in posts {
            if post.post_id.trim().is_empty() {
                return Err(CatalogError::EmptyId);
            }
            let id = post.post_id.clone();
            if map.insert(id.clone(), Arc::new(post)).is_some() {
                return Err(CatalogError::DuplicateId(id));
            }
        }
        Ok(Self { posts: map })
    }

    /// Sorted post ids, for diagnostics.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.posts.keys().map(String::as_str).collect();
        ids.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
        ids
    }
}

impl PostLookup for PostCatalog {
    fn get(&self, key: &str) -> Option<Arc<Post>> {
        self.posts.get(key).cloned()
    }

    fn len(&self) -> usize {
        self.posts.len()
    }
}
