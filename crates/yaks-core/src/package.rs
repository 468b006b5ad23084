//! Purchasable Yak package tiers.
//!
//! Packages are the static purchase-tier catalog. The payment flow itself is
//! a stub; packages exist for the shop display and the admin surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::PackageId;

/// A purchasable Yak package tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    /// Unique id.
    pub id: PackageId,

    /// Display name, e.g. "Starter Pack".
    pub name: String,

    /// Description shown in the shop.
    pub description: String,

    /// Price in cents.
    pub price_cents: i64,

    /// Base Yaks granted.
    pub yaks: i64,

    /// Bonus Yaks on top of the base grant.
    pub bonus_yaks: i64,

    /// Whether this tier is offered.
    pub enabled: bool,

    /// Display ordering, ascending.
    pub position: u32,

    /// When the package was created.
    pub created_at: DateTime<Utc>,
}

impl Package {
    /// Total Yaks including bonus.
    #[must_use]
    pub const fn total_yaks(&self) -> i64 {
        self.yaks + self.bonus_yaks
    }

    /// Price in dollars.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn price_usd(&self) -> f64 {
        self.price_cents as f64 / 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_includes_bonus() {
        let pkg = Package {
            id: PackageId::generate(),
            name: "Starter Pack".into(),
            description: String::new(),
            price_cents: 499,
            yaks: 500,
            bonus_yaks: 50,
            enabled: true,
            position: 1,
            created_at: Utc::now(),
        };

        assert_eq!(pkg.total_yaks(), 550);
        assert!((pkg.price_usd() - 4.99).abs() < f64::EPSILON);
    }
}
