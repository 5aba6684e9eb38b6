//! Content records discussed by voice sessions.
//!
//! A [`Post`] is loaded once at startup and never mutated. Sessions only
//! borrow it through an `Arc` to build the upstream instruction payload.

mod catalog;

pub use catalog::{CatalogError, PostCatalog};

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Synchronous lookup used by the session resolver.
pub trait PostLookup: Send + Sync {
    /// Return the record stored under `key`, if any.
    fn get(&self, key: &str) -> Option<Arc<Post>>;

    /// Number of records available.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A social-media post with its credibility annotations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub post_id: String,
    pub profile: Profile,
    pub content: PostContent,
    #[serde(default)]
    pub red_flags: Vec<String>,
    #[serde(default)]
    pub green_flags: Vec<String>,
    pub labels: Labels,
    #[serde(default)]
    pub explanations: Explanations,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub handle: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_picture_desc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub followers_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_age_days: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_desc: Option<String>,
    #[serde(default)]
    pub links: Vec<Link>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub display_url: String,
    pub https: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Veracity {
    Verified,
    Unverified,
    Misleading,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Labels {
    pub risk_level: RiskLevel,
    pub veracity: Veracity,
    /// Confidence of the veracity label, 0.0 - 1.0
    pub veracity_confidence_0_1: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Explanations {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tl_dr: Option<String>,
}
