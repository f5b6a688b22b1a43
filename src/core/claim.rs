//! Claim business logic - capacity-bounded claiming, in-store redemption and expiry.
//!
//! The capacity check and the counter increment run as one conditional `UPDATE`
//! inside the claim transaction:
//! `UPDATE deals SET current_redemptions = current_redemptions + 1
//!  WHERE id = ? AND is_active AND current_redemptions < max_redemptions AND <window open>`
//! A claim that reads a free slot but loses it to a concurrent claim sees zero
//! affected rows and is rejected, so a deal is never over-redeemed.

use crate::{
    core::{
        access::{self, Capabilities, Identity, Route},
        audit::{self, AuditEntry},
        deal::{self, check_claimable, deal_state},
        merchant,
        notification::{self, NewNotification},
        user,
    },
    entities::{ClaimStatus, Deal, DealClaim, deal as deal_entity, deal_claim},
    errors::{Error, Result, UnavailableReason},
};
use chrono::{DateTime, Utc};
use sea_orm::{
    QueryOrder, Set, TransactionTrait,
    prelude::*,
    sea_query::{Expr, Query},
};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};

/// A successful claim together with the deal as it stands after the claim.
#[derive(Debug, Clone, Serialize)]
pub struct ClaimReceipt {
    /// The new claim
    pub claim: deal_claim::Model,
    /// The claimed deal, counter already incremented
    pub deal: deal_entity::Model,
}

impl ClaimReceipt {
    /// Units still available in the deal's current window.
    #[must_use]
    pub const fn remaining(&self) -> i32 {
        self.deal.max_redemptions - self.deal.current_redemptions
    }
}

/// Whether a user holds a non-expired claim on the deal made in its current window.
///
/// Claims from a window that has since recurred do not count.
pub async fn has_active_claim<C>(db: &C, user_id: i64, deal: &deal_entity::Model) -> Result<bool>
where
    C: ConnectionTrait,
{
    let count = DealClaim::find()
        .filter(deal_claim::Column::UserId.eq(user_id))
        .filter(deal_claim::Column::DealId.eq(deal.id))
        .filter(deal_claim::Column::Status.ne(ClaimStatus::Expired))
        .filter(deal_claim::Column::ClaimedAt.gte(deal.start_time))
        .count(db)
        .await?;
    Ok(count > 0)
}

/// Takes one unit of capacity if the deal is still claimable at `now`.
///
/// The check and the increment are one conditional `UPDATE`, so of two callers
/// racing for the last unit only one gets `true`.
pub async fn reserve_slot<C>(db: &C, deal_id: i64, now: DateTime<Utc>) -> Result<bool>
where
    C: ConnectionTrait,
{
    let updated = Deal::update_many()
        .col_expr(
            deal_entity::Column::CurrentRedemptions,
            Expr::col(deal_entity::Column::CurrentRedemptions).add(1),
        )
        .col_expr(deal_entity::Column::UpdatedAt, Expr::value(now))
        .filter(deal_entity::Column::Id.eq(deal_id))
        .filter(deal_entity::Column::IsActive.eq(true))
        .filter(deal_entity::Column::StartTime.lte(now))
        .filter(deal_entity::Column::EndTime.gt(now))
        .filter(
            Expr::col(deal_entity::Column::CurrentRedemptions)
                .lt(Expr::col(deal_entity::Column::MaxRedemptions)),
        )
        .exec(db)
        .await?;
    Ok(updated.rows_affected == 1)
}

/// Claims one unit of a deal for the calling user.
///
/// Guards run in order: the deal exists, it is active and inside its window at
/// `now`, the user has no active claim on it, and capacity remains. The counter increment and the claim insert commit
/// together. A `deal_claimed` audit entry and notification follow, best effort.
///
/// # Errors
/// - `NotFound` when the deal or the caller's profile does not exist
/// - `DealUnavailable` with the reason when the deal is inactive, not yet
///   started, expired or out of capacity
/// - `DuplicateClaim` when the caller already holds an active claim
/// - `ConcurrencyConflict` when the conditional increment lost a race for any
///   reason other than the deal filling up
pub async fn claim_deal(
    db: &DatabaseConnection,
    identity: &Identity,
    deal_id: i64,
    now: DateTime<Utc>,
) -> Result<ClaimReceipt> {
    access::require(identity, Route::Browse, Capabilities::CLAIM_DEALS)?;
    let user_id = identity.user_id;

    let txn = db.begin().await?;

    let current = deal::require_deal(&txn, deal_id).await?;
    user::require_user(&txn, user_id).await?;

    // A holder of an active claim is told so even once the deal has filled up;
    // everyone else sees the capacity reason.
    let availability = check_claimable(deal_state(&current, now));
    match availability {
        Err(reason) if reason != UnavailableReason::CapacityExhausted => {
            debug!(deal_id, user_id, %reason, "Claim refused");
            return Err(Error::DealUnavailable { deal_id, reason });
        }
        _ => {}
    }

    if has_active_claim(&txn, user_id, &current).await? {
        return Err(Error::DuplicateClaim { user_id, deal_id });
    }

    if let Err(reason) = availability {
        debug!(deal_id, user_id, %reason, "Claim refused");
        return Err(Error::DealUnavailable { deal_id, reason });
    }

    let reserved = reserve_slot(&txn, deal_id, now).await?;
    if !reserved {
        let latest = deal::require_deal(&txn, deal_id).await?;
        return Err(match check_claimable(deal_state(&latest, now)) {
            Err(reason) => Error::DealUnavailable { deal_id, reason },
            Ok(()) => Error::ConcurrencyConflict { deal_id },
        });
    }

    let claim = deal_claim::ActiveModel {
        user_id: Set(user_id),
        deal_id: Set(deal_id),
        status: Set(ClaimStatus::Claimed),
        claimed_at: Set(now),
        redeemed_at: Set(None),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let deal = deal::require_deal(&txn, deal_id).await?;
    txn.commit().await?;

    info!(
        deal_id,
        user_id,
        claim_id = claim.id,
        redemptions = deal.current_redemptions,
        capacity = deal.max_redemptions,
        "Deal claimed"
    );

    audit::record(
        db,
        AuditEntry::event(Some(user_id), "deal_claimed").with_details(json!({
            "deal_id": deal_id,
            "claim_id": claim.id,
            "current_redemptions": deal.current_redemptions,
        })),
    )
    .await;
    notification::notify(
        db,
        NewNotification {
            user_id,
            deal_id: Some(deal_id),
            kind: "deal_claimed".to_string(),
            title: "Deal claimed".to_string(),
            message: format!(
                "You claimed \"{}\" for ${:.2}. Show this claim at the counter.",
                deal.title, deal.discounted_price
            ),
        },
    )
    .await;

    Ok(ClaimReceipt { claim, deal })
}

/// Lists a user's claims newest first, each with its deal.
pub async fn list_claims_for_user(
    db: &DatabaseConnection,
    user_id: i64,
) -> Result<Vec<(deal_claim::Model, Option<deal_entity::Model>)>> {
    DealClaim::find()
        .filter(deal_claim::Column::UserId.eq(user_id))
        .order_by_desc(deal_claim::Column::ClaimedAt)
        .order_by_desc(deal_claim::Column::Id)
        .find_also_related(Deal)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Marks a claim as used. Only the owner of the deal's merchant may redeem, and only
/// while the claim is still `claimed` and its window has not ended.
pub async fn redeem_claim(
    db: &DatabaseConnection,
    identity: &Identity,
    claim_id: i64,
    now: DateTime<Utc>,
) -> Result<deal_claim::Model> {
    access::require(identity, Route::Claims, Capabilities::REDEEM_CLAIMS)?;

    let txn = db.begin().await?;

    let claim = DealClaim::find_by_id(claim_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("claim", claim_id))?;
    let deal = deal::require_deal(&txn, claim.deal_id).await?;
    merchant::require_owned_merchant(&txn, identity, deal.merchant_id).await?;

    match claim.status {
        ClaimStatus::Claimed if now < deal.end_time => {}
        ClaimStatus::Claimed => {
            return Err(Error::validation(format!(
                "Claim {claim_id} can no longer be redeemed, the deal window has ended"
            )));
        }
        ClaimStatus::Used => {
            return Err(Error::validation(format!(
                "Claim {claim_id} was already redeemed"
            )));
        }
        ClaimStatus::Expired => {
            return Err(Error::validation(format!("Claim {claim_id} has expired")));
        }
    }

    let customer_id = claim.user_id;
    let mut active_model: deal_claim::ActiveModel = claim.into();
    active_model.status = Set(ClaimStatus::Used);
    active_model.redeemed_at = Set(Some(now));
    let claim = active_model.update(&txn).await?;

    txn.commit().await?;
    info!(claim_id, deal_id = deal.id, "Claim redeemed");

    audit::record(
        db,
        AuditEntry::event(Some(identity.user_id), "claim_redeemed")
            .with_details(json!({ "claim_id": claim_id, "deal_id": deal.id })),
    )
    .await;
    notification::notify(
        db,
        NewNotification {
            user_id: customer_id,
            deal_id: Some(deal.id),
            kind: "claim_redeemed".to_string(),
            title: "Enjoy!".to_string(),
            message: format!("Your claim on \"{}\" was redeemed.", deal.title),
        },
    )
    .await;

    Ok(claim)
}

/// Expires `claimed` claims whose deal window has ended. Returns how many were expired.
pub async fn expire_lapsed_claims<C>(db: &C, now: DateTime<Utc>) -> Result<u64>
where
    C: ConnectionTrait,
{
    let ended_deals = Query::select()
        .column(deal_entity::Column::Id)
        .from(Deal)
        .and_where(deal_entity::Column::EndTime.lte(now))
        .to_owned();

    let result = DealClaim::update_many()
        .col_expr(deal_claim::Column::Status, Expr::value(ClaimStatus::Expired))
        .filter(deal_claim::Column::Status.eq(ClaimStatus::Claimed))
        .filter(deal_claim::Column::DealId.in_subquery(ended_deals))
        .exec(db)
        .await?;

    if result.rows_affected > 0 {
        info!(expired = result.rows_affected, "Expired lapsed claims");
    }
    Ok(result.rows_affected)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::entities::Role;
    use crate::test_utils::*;
    use chrono::Duration;
    use tokio::task::JoinSet;

    #[tokio::test]
    async fn test_claim_deal_success() -> Result<()> {
        let (db, owner, merchant) = setup_with_merchant().await?;
        let customer = create_test_user(&db, "c@example.com", Role::Customer).await?;
        let now = Utc::now();
        let deal = create_live_deal(&db, &owner, merchant.id, now, 3).await?;

        let receipt = claim_deal(&db, &identity_of(&customer), deal.id, now).await?;
        assert_eq!(receipt.claim.status, ClaimStatus::Claimed);
        assert_eq!(receipt.claim.user_id, customer.id);
        assert_eq!(receipt.deal.current_redemptions, 1);
        assert_eq!(receipt.remaining(), 2);

        // Side effects: audit entry and notification
        let entries = audit::list_entries(
            &db,
            &audit::AuditQuery {
                action: Some("deal_claimed".to_string()),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(entries.len(), 1);
        let notes = notification::list_notifications(&db, customer.id, true).await?;
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].kind, "deal_claimed");
        Ok(())
    }

    #[tokio::test]
    async fn test_single_slot_deal() -> Result<()> {
        let (db, owner, merchant) = setup_with_merchant().await?;
        let first = create_test_user(&db, "first@example.com", Role::Customer).await?;
        let second = create_test_user(&db, "second@example.com", Role::Customer).await?;
        let now = Utc::now();
        let deal = create_live_deal(&db, &owner, merchant.id, now, 1).await?;

        claim_deal(&db, &identity_of(&first), deal.id, now).await?;

        let result = claim_deal(&db, &identity_of(&second), deal.id, now).await;
        assert!(matches!(
            result,
            Err(Error::DealUnavailable {
                reason: UnavailableReason::CapacityExhausted,
                ..
            })
        ));

        let result = claim_deal(&db, &identity_of(&first), deal.id, now).await;
        assert!(matches!(result, Err(Error::DuplicateClaim { .. })));

        let stored = deal::require_deal(&db, deal.id).await?;
        assert_eq!(stored.current_redemptions, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_claim() -> Result<()> {
        let (db, owner, merchant) = setup_with_merchant().await?;
        let customer = create_test_user(&db, "c@example.com", Role::Customer).await?;
        let now = Utc::now();
        let deal = create_live_deal(&db, &owner, merchant.id, now, 5).await?;

        claim_deal(&db, &identity_of(&customer), deal.id, now).await?;
        let result = claim_deal(&db, &identity_of(&customer), deal.id, now).await;
        assert!(matches!(result, Err(Error::DuplicateClaim { .. })));

        // The refused claim did not consume capacity
        let stored = deal::require_deal(&db, deal.id).await?;
        assert_eq!(stored.current_redemptions, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_claim_unavailable_reasons() -> Result<()> {
        let (db, owner, merchant) = setup_with_merchant().await?;
        let customer = create_test_user(&db, "c@example.com", Role::Customer).await?;
        let identity = identity_of(&customer);
        let now = Utc::now();
        let deal = create_live_deal(&db, &owner, merchant.id, now, 5).await?;

        let early = claim_deal(&db, &identity, deal.id, now - Duration::hours(2)).await;
        assert!(matches!(
            early,
            Err(Error::DealUnavailable {
                reason: UnavailableReason::NotYetStarted,
                ..
            })
        ));

        let late = claim_deal(&db, &identity, deal.id, now + Duration::hours(2)).await;
        assert!(matches!(
            late,
            Err(Error::DealUnavailable {
                reason: UnavailableReason::Expired,
                ..
            })
        ));

        deal::deactivate_deal(&db, &identity_of(&owner), deal.id).await?;
        let inactive = claim_deal(&db, &identity, deal.id, now).await;
        assert!(matches!(
            inactive,
            Err(Error::DealUnavailable {
                reason: UnavailableReason::Inactive,
                ..
            })
        ));

        let missing = claim_deal(&db, &identity, 999, now).await;
        assert!(matches!(missing, Err(Error::NotFound { entity: "deal", .. })));

        let ghost = claim_deal(&db, &Identity::new(777, Role::Customer), deal.id, now).await;
        assert!(matches!(ghost, Err(Error::NotFound { entity: "user", .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_reserve_slot_refuses_full_deal() -> Result<()> {
        let (db, owner, merchant) = setup_with_merchant().await?;
        let now = Utc::now();
        let deal = create_live_deal(&db, &owner, merchant.id, now, 2).await?;

        assert!(reserve_slot(&db, deal.id, now).await?);
        assert!(reserve_slot(&db, deal.id, now).await?);
        // A caller that read the deal before it filled up still cannot take a unit
        assert!(!reserve_slot(&db, deal.id, now).await?);
        assert!(!reserve_slot(&db, deal.id, deal.end_time).await?);

        let stored = deal::require_deal(&db, deal.id).await?;
        assert_eq!(stored.current_redemptions, 2);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_claims_never_over_redeem() -> Result<()> {
        const CLAIMANTS: usize = 20;
        const CAPACITY: i32 = 5;

        let dir = tempfile::tempdir()?;
        let db = setup_file_db(dir.path()).await?;
        let owner = create_test_user(&db, "owner@example.com", Role::Merchant).await?;
        let merchant =
            merchant::create_merchant(&db, &identity_of(&owner), sample_merchant("Cafe")).await?;
        let now = Utc::now();
        let deal = create_live_deal(&db, &owner, merchant.id, now, CAPACITY).await?;

        let mut claimants = Vec::new();
        for i in 0..CLAIMANTS {
            let user = create_test_user(&db, &format!("user{i}@example.com"), Role::Customer).await?;
            claimants.push(identity_of(&user));
        }

        let mut tasks = JoinSet::new();
        for identity in claimants {
            let db = db.clone();
            let deal_id = deal.id;
            tasks.spawn(async move {
                // A writer that finds the database locked backs off and tries again
                let mut attempt = 0;
                loop {
                    match claim_deal(&db, &identity, deal_id, now).await {
                        Err(Error::Database(_) | Error::ConcurrencyConflict { .. })
                            if attempt < 50 =>
                        {
                            attempt += 1;
                            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                        }
                        other => break other,
                    }
                }
            });
        }

        let mut successes = 0;
        let mut exhausted = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined.unwrap() {
                Ok(_) => successes += 1,
                Err(Error::DealUnavailable {
                    reason: UnavailableReason::CapacityExhausted,
                    ..
                }) => exhausted += 1,
                Err(other) => panic!("unexpected claim error: {other}"),
            }
        }

        assert_eq!(successes, CAPACITY);
        assert_eq!(exhausted, CLAIMANTS - CAPACITY as usize);

        let stored = deal::require_deal(&db, deal.id).await?;
        assert_eq!(stored.current_redemptions, stored.max_redemptions);

        let claims = DealClaim::find()
            .filter(deal_claim::Column::DealId.eq(deal.id))
            .count(&db)
            .await?;
        assert_eq!(claims, CAPACITY as u64);
        Ok(())
    }

    #[tokio::test]
    async fn test_redeem_claim() -> Result<()> {
        let (db, owner, merchant) = setup_with_merchant().await?;
        let customer = create_test_user(&db, "c@example.com", Role::Customer).await?;
        let now = Utc::now();
        let deal = create_live_deal(&db, &owner, merchant.id, now, 5).await?;
        let receipt = claim_deal(&db, &identity_of(&customer), deal.id, now).await?;

        let not_owner = redeem_claim(&db, &identity_of(&customer), receipt.claim.id, now).await;
        assert!(matches!(not_owner, Err(Error::Authorization { .. })));

        let used = redeem_claim(&db, &identity_of(&owner), receipt.claim.id, now).await?;
        assert_eq!(used.status, ClaimStatus::Used);
        assert_eq!(used.redeemed_at, Some(now));

        let twice = redeem_claim(&db, &identity_of(&owner), receipt.claim.id, now).await;
        assert!(matches!(twice, Err(Error::Validation { .. })));

        // A used claim is still active for the window
        let again = claim_deal(&db, &identity_of(&customer), deal.id, now).await;
        assert!(matches!(again, Err(Error::DuplicateClaim { .. })));

        let missing = redeem_claim(&db, &identity_of(&owner), 999, now).await;
        assert!(matches!(missing, Err(Error::NotFound { entity: "claim", .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_expire_lapsed_claims() -> Result<()> {
        let (db, owner, merchant) = setup_with_merchant().await?;
        let customer = create_test_user(&db, "c@example.com", Role::Customer).await?;
        let now = Utc::now();
        let deal = create_live_deal(&db, &owner, merchant.id, now, 5).await?;
        let receipt = claim_deal(&db, &identity_of(&customer), deal.id, now).await?;

        // Window still open: nothing to expire
        assert_eq!(expire_lapsed_claims(&db, now).await?, 0);

        let later = deal.end_time + Duration::minutes(1);
        assert_eq!(expire_lapsed_claims(&db, later).await?, 1);
        assert_eq!(expire_lapsed_claims(&db, later).await?, 0);

        let claims = list_claims_for_user(&db, customer.id).await?;
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].0.id, receipt.claim.id);
        assert_eq!(claims[0].0.status, ClaimStatus::Expired);
        assert_eq!(claims[0].1.as_ref().map(|d| d.id), Some(deal.id));

        let result = redeem_claim(&db, &identity_of(&owner), receipt.claim.id, later).await;
        assert!(matches!(result, Err(Error::Validation { .. })));
        Ok(())
    }
}
