//! Shared plan cache.
//!
//! Plans are keyed by the content hash of their context combined with the
//! catalog digest and the configuration's semantic digest. Readers never
//! block each other; a plan computed twice concurrently keeps whichever was
//! inserted first, and both callers receive that one.

use crate::catalog::TypeCatalog;
use crate::config::ResolverConfig;
use crate::context::ClassContext;
use crate::error::ResolutionError;
use crate::hash::ContentHash;
use crate::plan::CompositionPlan;
use crate::resolve::resolve_context;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{trace, warn};

#[derive(Debug, Default)]
pub struct PlanCache {
    plans: RwLock<HashMap<ContentHash, Arc<CompositionPlan>>>,
}

impl PlanCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache key for resolving `context` against `catalog` under `config`.
    pub fn key(
        context: &ClassContext,
        catalog: &TypeCatalog,
        config: &ResolverConfig,
    ) -> Result<ContentHash, serde_json::Error> {
        Ok(ContentHash::builder()
            .field_display("context", &context.content_hash()?)
            .field_display("catalog", &catalog.digest()?)
            .field_display("config", &config.semantic_digest())
            .finish())
    }

    pub fn get(&self, key: &ContentHash) -> Option<Arc<CompositionPlan>> {
        self.plans.read().get(key).cloned()
    }

    /// Insert unless a plan is already cached under `key`; returns the
    /// cached plan either way.
    pub fn insert_if_absent(
        &self,
        key: ContentHash,
        plan: CompositionPlan,
    ) -> Arc<CompositionPlan> {
        let mut plans = self.plans.write();
        Arc::clone(plans.entry(key).or_insert_with(|| Arc::new(plan)))
    }

    /// Cached plan for `context`, resolving and caching it on a miss.
    /// Rejections are not cached.
    pub fn get_or_resolve(
        &self,
        context: &ClassContext,
        catalog: &TypeCatalog,
        config: &ResolverConfig,
    ) -> Result<Arc<CompositionPlan>, Vec<ResolutionError>> {
        let key = match Self::key(context, catalog, config) {
            Ok(key) => key,
            Err(err) => {
                warn!(
                    target_type = %context.target(),
                    error = %err,
                    "context has no cache key; resolving uncached"
                );
                return resolve_context(context, catalog, config).map(Arc::new);
            }
        };
        if let Some(plan) = self.get(&key) {
            trace!(target_type = %context.target(), key = %key.short(), "plan cache hit");
            return Ok(plan);
        }
        let plan = resolve_context(context, catalog, config)?;
        Ok(self.insert_if_absent(key, plan))
    }

    pub fn len(&self) -> usize {
        self.plans.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.read().is_empty()
    }

    pub fn clear(&self) {
        self.plans.write().clear();
    }
}
