//! Maps a bundle name to the first storage tier that holds it

use super::{StorageTier, StorageTiers};

/// A bundle located in a tier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBundle {
    /// Tier that reported the bundle
    pub tier: StorageTier,
    /// Logical path inside the tier
    pub path: String,
}

/// Resolves bundle names against the storage tiers
#[derive(Debug, Clone)]
pub struct PathResolver {
    bundle_folder: String,
}

impl PathResolver {
    /// Create a resolver looking for bundles under `bundle_folder`
    #[must_use]
    pub fn new(bundle_folder: impl Into<String>) -> Self {
        Self {
            bundle_folder: bundle_folder.into(),
        }
    }

    /// Logical path of a bundle inside any tier
    #[must_use]
    pub fn bundle_path(&self, bundle_name: &str) -> String {
        let folder = self.bundle_folder.trim_end_matches('/');
        if folder.is_empty() {
            bundle_name.to_string()
        } else {
            format!("{folder}/{bundle_name}")
        }
    }

    /// Find the first tier, in [`StorageTier::RESOLUTION_ORDER`], that
    /// contains the bundle.
    #[must_use]
    pub fn resolve(&self, tiers: &StorageTiers, bundle_name: &str) -> Option<ResolvedBundle> {
        let path = self.bundle_path(bundle_name);
        let tier = StorageTier::RESOLUTION_ORDER
            .into_iter()
            .find(|&tier| tiers.exists(tier, &path))?;

        log::trace!("Resolved bundle {bundle_name} to {tier} at {path}");
        Some(ResolvedBundle { tier, path })
    }
}
