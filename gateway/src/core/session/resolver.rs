use std::sync::Arc;

use thiserror::Error;

use crate::core::posts::{Post, PostLookup};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("postId required in URL")]
    MissingKey,
    #[error("Invalid postId")]
    UnknownKey(String),
}

/// Look up the content record a session is about.
///
/// A missing, empty or whitespace-only key is a [`ResolveError::MissingKey`].
pub fn resolve_post(key: Option<&str>, posts: &dyn PostLookup) -> Result<Arc<Post>, ResolveError> {
    let key = key.map(str::trim).filter(|k| !k.is_empty()).ok_or(ResolveError::MissingKey)?;

    posts
        .get(key)
        .ok_or_else(|| ResolveError::UnknownKey(key.to_string()))
}
