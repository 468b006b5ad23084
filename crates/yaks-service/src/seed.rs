//! First-start seeding of the default catalog and earning rules.

use yaks_core::{earning, feature};
use yaks_store::{Result, RocksStore, Store};

/// Seed the default feature catalog and earning rules into an empty store.
///
/// Runs on every start but writes only when the corresponding table is
/// empty, so admin edits are never overwritten.
///
/// # Errors
///
/// Returns an error if a store operation fails.
pub fn seed_defaults(store: &RocksStore) -> Result<()> {
    if store.list_features()?.is_empty() {
        for f in feature::default_catalog() {
            store.put_feature(&f)?;
        }
        tracing::info!("Seeded default feature catalog");
    }

    if store.list_earning_rules()?.is_empty() {
        for rule in earning::default_rules() {
            store.put_earning_rule(&rule)?;
        }
        tracing::info!("Seeded default earning rules");
    }

    Ok(())
}
