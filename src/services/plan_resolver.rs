use std::collections::HashMap;

use crate::{database::QuotaLevelCatalog, errors::Result, models::PlanTierMapping};

/// Maps billing plan types onto catalog tier names.
///
/// Resolution is total: an unknown plan falls back to the default tier
/// instead of failing. Plan types are matched case-insensitively with
/// surrounding whitespace ignored.
#[derive(Debug, Clone)]
pub struct PlanTierResolver {
    mappings: HashMap<String, String>,
    default_tier: String,
}

fn normalize(plan_type: &str) -> String {
    plan_type.trim().to_ascii_lowercase()
}

impl PlanTierResolver {
    pub fn new<I>(mappings: I, default_tier: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = PlanTierMapping>,
    {
        let mappings = mappings
            .into_iter()
            .map(|m| (normalize(&m.plan_type), m.tier_name))
            .collect();

        Self {
            mappings,
            default_tier: default_tier.into(),
        }
    }

    pub async fn load(catalog: &dyn QuotaLevelCatalog, default_tier: &str) -> Result<Self> {
        let mappings = catalog.plan_mappings().await?;
        tracing::info!(
            "Loaded {} plan tier mappings (default tier: {})",
            mappings.len(),
            default_tier
        );
        Ok(Self::new(mappings, default_tier))
    }

    pub fn resolve(&self, plan_type: &str) -> &str {
        match self.mappings.get(&normalize(plan_type)) {
            Some(tier) => tier.as_str(),
            None => {
                tracing::debug!(plan_type, "Unknown plan type, using default tier");
                self.default_tier.as_str()
            }
        }
    }

    pub fn default_tier(&self) -> &str {
        &self.default_tier
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::InMemoryQuotaStore;

    fn resolver() -> PlanTierResolver {
        PlanTierResolver::new(PlanTierMapping::default_mappings(), "basic")
    }

    #[test]
    fn test_known_plans_resolve() {
        let resolver = resolver();
        assert_eq!(resolver.resolve("standard"), "standard");
        assert_eq!(resolver.resolve("premium"), "professional");
        assert_eq!(resolver.resolve(" Premium "), "professional");
    }

    #[test]
    fn test_unknown_plan_falls_back_to_default() {
        let resolver = resolver();
        assert_eq!(resolver.resolve("enterprise-2031"), "basic");
        assert_eq!(resolver.resolve(""), "basic");
    }

    #[tokio::test]
    async fn test_load_from_catalog() {
        let store = InMemoryQuotaStore::new(
            Vec::new(),
            vec![PlanTierMapping::new("school-plus", "advanced")],
        );
        let resolver = PlanTierResolver::load(&store, "standard").await.unwrap();

        assert_eq!(resolver.resolve("school-plus"), "advanced");
        assert_eq!(resolver.resolve("free"), "standard");
        assert_eq!(resolver.default_tier(), "standard");
    }
}
