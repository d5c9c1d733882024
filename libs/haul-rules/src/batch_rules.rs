//! Position-dependent PMFM exclusion rule sets
//!
//! Landing batches must not carry discard-only PMFMs and discard batches must not carry
//! landing-only ones. Each rule set is a list of `<prefix>id != <pmfm id>` rules, built once
//! per path prefix and cached until the referential configuration changes.

use std::sync::Arc;

use arc_swap::ArcSwap;
use haul_batch::referential::PmfmIds;
use tracing::debug;

use crate::cache::{cache_key, RuleCache};
use crate::config::{ConfigBus, Subscription};
use crate::types::{Rule, RuleOperator};

pub const NOT_LANDING_PMFMS: &str = "notLandingPmfms";
pub const NOT_DISCARD_PMFMS: &str = "notDiscardPmfms";

/// PMFM rule engine of the batch tree
pub struct BatchRules {
    pmfm_ids: Arc<ArcSwap<PmfmIds>>,
    cache: Arc<RuleCache>,
    _subscription: Subscription,
}

impl BatchRules {
    /// Subscribe to `bus`; every emission replaces the PMFM ids and clears the cache
    pub fn new(bus: &ConfigBus) -> Self {
        let pmfm_ids = Arc::new(ArcSwap::from_pointee(bus.current().pmfm_ids));
        let cache = Arc::new(RuleCache::new());

        let subscription = {
            let pmfm_ids = Arc::clone(&pmfm_ids);
            let cache = Arc::clone(&cache);
            bus.subscribe(move |config| {
                pmfm_ids.store(Arc::new(config.pmfm_ids));
                cache.invalidate();
                debug!("Batch rules reset after configuration change");
            })
        };

        Self {
            pmfm_ids,
            cache,
            _subscription: subscription,
        }
    }

    /// Rules for batches off the landing branch: no size category PMFMs
    pub fn get_not_landing_pmfms(&self, path_prefix: &str) -> Arc<[Rule]> {
        self.cache.get(&cache_key(NOT_LANDING_PMFMS, path_prefix), || {
            let ids = self.pmfm_ids.load();
            vec![
                exclude_pmfm(path_prefix, ids.size_category, "SIZE_CATEGORY"),
                exclude_pmfm(path_prefix, ids.trawl_size_cat, "TRAWL_SIZE_CAT"),
            ]
        })
    }

    /// Rules for batches off the discard branch: no sorting or discard PMFMs
    pub fn get_not_discard_pmfms(&self, path_prefix: &str) -> Arc<[Rule]> {
        self.cache.get(&cache_key(NOT_DISCARD_PMFMS, path_prefix), || {
            let ids = self.pmfm_ids.load();
            vec![
                exclude_pmfm(path_prefix, ids.batch_sorting, "BATCH_SORTING"),
                exclude_pmfm(path_prefix, ids.discard_weight, "DISCARD_WEIGHT"),
                exclude_pmfm(path_prefix, ids.discard_reason, "DISCARD_REASON"),
            ]
        })
    }

    pub fn pmfm_ids(&self) -> PmfmIds {
        **self.pmfm_ids.load()
    }

    pub fn cache(&self) -> &RuleCache {
        &self.cache
    }
}

fn exclude_pmfm(path_prefix: &str, pmfm_id: i32, pmfm_label: &str) -> Rule {
    Rule::new(
        format!("exclude-{}", pmfm_label.to_ascii_lowercase().replace('_', "-")),
        format!("{path_prefix}id"),
        RuleOperator::NotEqual,
        pmfm_id.to_string(),
    )
    .with_message(format!("PMFM {pmfm_label} ({pmfm_id}) not allowed here"))
}

impl std::fmt::Debug for BatchRules {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchRules")
            .field("pmfm_ids", &self.pmfm_ids())
            .field("cached", &self.cache.len())
            .finish()
    }
}
