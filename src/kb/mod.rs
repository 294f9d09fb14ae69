//! Tenant-scoped knowledge base of response templates and objection handlers.
//!
//! - `store`: the `VectorStore` and `Embedder` boundaries
//! - `matcher`: picks one best document per reply
//! - `qdrant`, `memory`: vector backends
//! - `voyage`: embedding client

pub mod matcher;
pub mod memory;
pub mod qdrant;
pub mod store;
pub mod voyage;

use std::sync::LazyLock;

use regex::Regex;

pub use matcher::{
    KbHealth, KbMatcher, MatchRequest, ObjectionType, detect_objection_type, is_eligible_for_tier,
    recommended_tier,
};
pub use memory::InMemoryStore;
pub use qdrant::QdrantStore;
pub use store::{Embedder, Filter, ScoredPoint, SearchRequest, VectorStore};
pub use voyage::VoyageEmbedder;

static TENANT_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^brain_[a-z][a-z0-9_-]*_(\d+|v\d+)$").expect("static tenant id pattern")
});

/// Whether `tenant_id` looks like `brain_<vertical>_<version>`.
pub fn validate_tenant_id(tenant_id: &str) -> bool {
    TENANT_ID.is_match(tenant_id)
}
