//! Access model - maps a caller's role and the area of the product being used
//! to the set of things the caller may do there.
//!
//! Capability checks are a pure function of `(role, route)`; ownership checks
//! (does this merchant belong to the caller?) live next to the data they guard.

use crate::{
    entities::Role,
    errors::{Error, Result},
};
use bitflags::bitflags;
use serde::Serialize;

/// Verified caller identity supplied by the upstream identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Identity {
    /// User ID of the caller
    pub user_id: i64,
    /// Role of the caller
    pub role: Role,
}

impl Identity {
    /// Creates an identity from a trusted user ID and role.
    #[must_use]
    pub const fn new(user_id: i64, role: Role) -> Self {
        Self { user_id, role }
    }

    /// Whether the caller is a platform operator.
    #[must_use]
    pub const fn is_super_merchant(&self) -> bool {
        matches!(self.role, Role::SuperMerchant)
    }
}

bitflags! {
    /// Actions a caller may take.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u32 {
        const BROWSE_DEALS       = 1 << 0;
        const SAVE_DEALS         = 1 << 1;
        const CLAIM_DEALS        = 1 << 2;
        const READ_NOTIFICATIONS = 1 << 3;
        const MANAGE_MERCHANTS   = 1 << 4;
        const MANAGE_DEALS       = 1 << 5;
        const REDEEM_CLAIMS      = 1 << 6;
        const VIEW_DASHBOARD     = 1 << 7;
        const VIEW_PLATFORM      = 1 << 8;
        const VIEW_AUDIT_LOG     = 1 << 9;
        const RUN_SWEEP          = 1 << 10;
    }
}

/// Areas of the product, each exposing a subset of capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// Map and list of deals
    Browse,
    /// Saved deals list
    Saved,
    /// Claim and claimed-deals views
    Claims,
    /// Notification list
    Notifications,
    /// Merchant and deal management
    MerchantPortal,
    /// Dashboards
    Analytics,
    /// Audit log viewer
    AuditLog,
    /// Maintenance actions such as the recurrence sweep
    Operations,
}

impl Route {
    /// Every route, in display order.
    pub const ALL: [Self; 8] = [
        Self::Browse,
        Self::Saved,
        Self::Claims,
        Self::Notifications,
        Self::MerchantPortal,
        Self::Analytics,
        Self::AuditLog,
        Self::Operations,
    ];

    const fn exposes(self) -> Capabilities {
        match self {
            Self::Browse => Capabilities::BROWSE_DEALS
                .union(Capabilities::SAVE_DEALS)
                .union(Capabilities::CLAIM_DEALS),
            Self::Saved => Capabilities::SAVE_DEALS,
            Self::Claims => Capabilities::CLAIM_DEALS.union(Capabilities::REDEEM_CLAIMS),
            Self::Notifications => Capabilities::READ_NOTIFICATIONS,
            Self::MerchantPortal => Capabilities::MANAGE_MERCHANTS
                .union(Capabilities::MANAGE_DEALS)
                .union(Capabilities::REDEEM_CLAIMS),
            Self::Analytics => Capabilities::VIEW_DASHBOARD.union(Capabilities::VIEW_PLATFORM),
            Self::AuditLog => Capabilities::VIEW_AUDIT_LOG,
            Self::Operations => Capabilities::RUN_SWEEP,
        }
    }
}

/// Everything a role may do anywhere in the product.
#[must_use]
pub const fn role_capabilities(role: Role) -> Capabilities {
    let customer = Capabilities::BROWSE_DEALS
        .union(Capabilities::SAVE_DEALS)
        .union(Capabilities::CLAIM_DEALS)
        .union(Capabilities::READ_NOTIFICATIONS);
    let merchant = customer
        .union(Capabilities::MANAGE_MERCHANTS)
        .union(Capabilities::MANAGE_DEALS)
        .union(Capabilities::REDEEM_CLAIMS)
        .union(Capabilities::VIEW_DASHBOARD);

    match role {
        Role::Customer => customer,
        Role::Merchant => merchant,
        Role::SuperMerchant => Capabilities::all(),
    }
}

/// Capabilities a role has on a given route.
#[must_use]
pub const fn capabilities(role: Role, route: Route) -> Capabilities {
    role_capabilities(role).intersection(route.exposes())
}

/// Fails with an authorization error unless `identity` holds `needed` on `route`.
pub fn require(identity: &Identity, route: Route, needed: Capabilities) -> Result<()> {
    if capabilities(identity.role, route).contains(needed) {
        Ok(())
    } else {
        Err(Error::unauthorized(format!(
            "role {:?} cannot do {:?} on {:?}",
            identity.role, needed, route
        )))
    }
}

/// Capability names, for clients deciding which views to show.
#[must_use]
pub fn capability_names(capabilities: Capabilities) -> Vec<&'static str> {
    capabilities.iter_names().map(|(name, _)| name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_customer_cannot_manage() {
        let caps = capabilities(Role::Customer, Route::MerchantPortal);
        assert!(caps.is_empty());

        let browse = capabilities(Role::Customer, Route::Browse);
        assert!(browse.contains(Capabilities::CLAIM_DEALS | Capabilities::SAVE_DEALS));
    }

    #[test]
    fn test_merchant_portal_for_merchant() {
        let caps = capabilities(Role::Merchant, Route::MerchantPortal);
        assert!(caps.contains(Capabilities::MANAGE_DEALS));
        assert!(caps.contains(Capabilities::REDEEM_CLAIMS));
        assert!(capabilities(Role::Merchant, Route::AuditLog).is_empty());
        assert!(!capabilities(Role::Merchant, Route::Analytics).contains(Capabilities::VIEW_PLATFORM));
    }

    #[test]
    fn test_super_merchant_has_everything_each_route_exposes() {
        for route in Route::ALL {
            assert_eq!(capabilities(Role::SuperMerchant, route), route.exposes());
        }
    }

    #[test]
    fn test_require() {
        let customer = Identity::new(1, Role::Customer);
        assert!(require(&customer, Route::Browse, Capabilities::CLAIM_DEALS).is_ok());
        assert!(matches!(
            require(&customer, Route::Operations, Capabilities::RUN_SWEEP),
            Err(Error::Authorization { .. })
        ));

        let operator = Identity::new(2, Role::SuperMerchant);
        assert!(require(&operator, Route::Operations, Capabilities::RUN_SWEEP).is_ok());
    }

    #[test]
    fn test_capability_names() {
        let names = capability_names(capabilities(Role::Customer, Route::Notifications));
        assert_eq!(names, vec!["READ_NOTIFICATIONS"]);
    }
}
