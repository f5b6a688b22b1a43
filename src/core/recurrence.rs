//! Recurring deal sweep
//!
//! Re-opens the claim window of recurring deals once their current window has
//! ended. For each eligible deal the sweep advances `start_time`/`end_time` by the
//! deal's interval (keeping the window length), resets `current_redemptions` to
//! zero, records `last_recurred_at`, and lapses unused claims of the finished
//! window. A deal is only eligible when its interval has also elapsed since
//! `last_recurred_at`, which makes the sweep idempotent within an interval.

use crate::{
    core::{
        claim,
        notification::{self, NewNotification},
        saved,
    },
    entities::{ClaimStatus, Deal, DealClaim, RecurringInterval, deal, deal_claim},
    errors::Result,
};
use chrono::{DateTime, Duration, Months, Utc};
use sea_orm::{QueryOrder, TransactionTrait, prelude::*, sea_query::Expr};
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use tracing::{info, warn};

/// Upper bound on intervals skipped for one deal in a single sweep.
const MAX_CATCH_UP_INTERVALS: u32 = 10_000;

/// How a deal that missed several intervals is brought forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatchUpPolicy {
    /// Advance exactly one interval per sweep
    #[default]
    SingleInterval,
    /// Advance by whole intervals until the window ends in the future
    SkipToCurrent,
}

/// Result of re-opening one deal.
#[derive(Debug, Clone, Serialize)]
pub struct DealRecurrenceResult {
    /// Deal that was advanced
    pub deal_id: i64,
    /// Title at the time of the sweep
    pub title: String,
    /// Interval it recurs on
    pub interval: RecurringInterval,
    /// Window before the sweep
    pub old_start: DateTime<Utc>,
    /// Window end before the sweep
    pub old_end: DateTime<Utc>,
    /// Window start after the sweep
    pub new_start: DateTime<Utc>,
    /// Window end after the sweep
    pub new_end: DateTime<Utc>,
    /// Redemptions discarded by the reset
    pub redemptions_reset: i32,
    /// Number of intervals the window moved
    pub intervals_advanced: u32,
    /// Unused claims of the old window that were expired
    pub lapsed_claims: u64,
}

/// Result of one sweep over all recurring deals.
#[derive(Debug, Clone, Serialize)]
pub struct RecurrenceResult {
    /// Deals that were re-opened
    pub recurred: Vec<DealRecurrenceResult>,
    /// Recurring deals whose window had ended and were considered
    pub deals_examined: usize,
    /// Time the sweep ran at
    pub run_at: DateTime<Utc>,
}

/// Moves an instant forward by one interval. Monthly steps clamp to the end of
/// shorter months. Returns None on overflow.
#[must_use]
pub fn advance(time: DateTime<Utc>, interval: RecurringInterval) -> Option<DateTime<Utc>> {
    match interval {
        RecurringInterval::Daily => time.checked_add_signed(Duration::days(1)),
        RecurringInterval::Weekly => time.checked_add_signed(Duration::weeks(1)),
        RecurringInterval::Monthly => time.checked_add_months(Months::new(1)),
    }
}

/// Whether a full interval has passed since the deal last recurred.
#[must_use]
pub fn interval_elapsed(
    last_recurred_at: Option<DateTime<Utc>>,
    interval: RecurringInterval,
    now: DateTime<Utc>,
) -> bool {
    last_recurred_at.is_none_or(|last| advance(last, interval).is_some_and(|next| next <= now))
}

/// Computes the next window for a deal at `now`, or None when it is not due.
///
/// Returns `(new_start, new_end, intervals_advanced)`.
#[must_use]
pub fn next_window(
    deal: &deal::Model,
    now: DateTime<Utc>,
    policy: CatchUpPolicy,
) -> Option<(DateTime<Utc>, DateTime<Utc>, u32)> {
    let interval = deal.recurring_interval?;
    if !deal.is_recurring || !deal.is_active || now < deal.end_time {
        return None;
    }
    if !interval_elapsed(deal.last_recurred_at, interval, now) {
        return None;
    }

    let length = deal.end_time - deal.start_time;
    let mut start = advance(deal.start_time, interval)?;
    let mut steps = 1;

    if policy == CatchUpPolicy::SkipToCurrent {
        while start + length <= now && steps < MAX_CATCH_UP_INTERVALS {
            start = advance(start, interval)?;
            steps += 1;
        }
    }

    Some((start, start + length, steps))
}

/// Runs the recurrence sweep at `now`.
///
/// All window moves and claim lapses commit together. Each move is a conditional
/// update on the deal's previous `end_time`, so two sweeps racing over the same
/// deal advance it once. Users who saved a re-opened deal are notified after
/// commit, best effort.
pub async fn process_recurrence(
    db: &DatabaseConnection,
    now: DateTime<Utc>,
    policy: CatchUpPolicy,
) -> Result<RecurrenceResult> {
    let txn = db.begin().await?;

    let candidates = Deal::find()
        .filter(deal::Column::IsRecurring.eq(true))
        .filter(deal::Column::IsActive.eq(true))
        .filter(deal::Column::EndTime.lte(now))
        .order_by_asc(deal::Column::Id)
        .all(&txn)
        .await?;

    let deals_examined = candidates.len();
    let mut recurred = Vec::new();

    for current in candidates {
        let Some(interval) = current.recurring_interval else {
            warn!(deal_id = current.id, "Recurring deal has no interval, skipping");
            continue;
        };
        let Some((new_start, new_end, steps)) = next_window(&current, now, policy) else {
            continue;
        };

        let moved = Deal::update_many()
            .col_expr(deal::Column::StartTime, Expr::value(new_start))
            .col_expr(deal::Column::EndTime, Expr::value(new_end))
            .col_expr(deal::Column::CurrentRedemptions, Expr::value(0))
            .col_expr(deal::Column::LastRecurredAt, Expr::value(Some(now)))
            .col_expr(deal::Column::UpdatedAt, Expr::value(now))
            .filter(deal::Column::Id.eq(current.id))
            .filter(deal::Column::EndTime.eq(current.end_time))
            .exec(&txn)
            .await?;
        if moved.rows_affected == 0 {
            continue;
        }

        let lapsed = DealClaim::update_many()
            .col_expr(deal_claim::Column::Status, Expr::value(ClaimStatus::Expired))
            .filter(deal_claim::Column::DealId.eq(current.id))
            .filter(deal_claim::Column::Status.eq(ClaimStatus::Claimed))
            .exec(&txn)
            .await?;

        recurred.push(DealRecurrenceResult {
            deal_id: current.id,
            title: current.title,
            interval,
            old_start: current.start_time,
            old_end: current.end_time,
            new_start,
            new_end,
            redemptions_reset: current.current_redemptions,
            intervals_advanced: steps,
            lapsed_claims: lapsed.rows_affected,
        });
    }

    txn.commit().await?;

    for result in &recurred {
        notify_savers(db, result).await;
    }

    let result = RecurrenceResult {
        recurred,
        deals_examined,
        run_at: now,
    };
    if !result.recurred.is_empty() {
        info!("{}", format_recurrence_summary(&result));
    }
    Ok(result)
}

/// Outcome of a full maintenance sweep.
#[derive(Debug, Clone, Serialize)]
pub struct SweepResult {
    /// Deals re-opened by the recurrence pass
    pub recurrence: RecurrenceResult,
    /// Claims expired because their deal window ended
    pub expired_claims: u64,
}

/// Runs recurrence and then expires claims left on ended windows.
///
/// Recurrence goes first so claims on recurring deals are lapsed together with
/// their window move.
pub async fn run_sweep(
    db: &DatabaseConnection,
    now: DateTime<Utc>,
    policy: CatchUpPolicy,
) -> Result<SweepResult> {
    let recurrence = process_recurrence(db, now, policy).await?;
    let expired_claims = claim::expire_lapsed_claims(db, now).await?;
    Ok(SweepResult {
        recurrence,
        expired_claims,
    })
}

async fn notify_savers(db: &DatabaseConnection, result: &DealRecurrenceResult) {
    let user_ids = match saved::users_who_saved(db, result.deal_id).await {
        Ok(ids) => ids,
        Err(e) => {
            warn!(deal_id = result.deal_id, "Could not load savers for notification: {}", e);
            return;
        }
    };

    for user_id in user_ids {
        notification::notify(
            db,
            NewNotification {
                user_id,
                deal_id: Some(result.deal_id),
                kind: "deal_recurred".to_string(),
                title: "A saved deal is back".to_string(),
                message: format!(
                    "\"{}\" is open again from {}",
                    result.title,
                    result.new_start.format("%Y-%m-%d %H:%M UTC")
                ),
            },
        )
        .await;
    }
}

/// Formats a sweep result into a human-readable summary for logs.
#[must_use]
pub fn format_recurrence_summary(result: &RecurrenceResult) -> String {
    let mut summary = format!(
        "Recurrence sweep at {} - re-opened {} of {} ended recurring deals\n",
        result.run_at.format("%Y-%m-%d %H:%M:%S UTC"),
        result.recurred.len(),
        result.deals_examined
    );

    for deal in &result.recurred {
        // Writing to a String cannot fail
        let _ = writeln!(
            summary,
            "  #{} {} ({:?}) | {} → {} | reset {} redemptions, lapsed {} claims",
            deal.deal_id,
            deal.title,
            deal.interval,
            deal.old_end.format("%Y-%m-%d %H:%M"),
            deal.new_end.format("%Y-%m-%d %H:%M"),
            deal.redemptions_reset,
            deal.lapsed_claims
        );
    }

    summary
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::access::Identity;
    use crate::entities::Role;
    use crate::test_utils::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_advance() {
        let t = at(2024, 1, 31, 9);
        assert_eq!(advance(t, RecurringInterval::Daily), Some(at(2024, 2, 1, 9)));
        assert_eq!(advance(t, RecurringInterval::Weekly), Some(at(2024, 2, 7, 9)));
        // Clamped to the last day of February in a leap year
        assert_eq!(advance(t, RecurringInterval::Monthly), Some(at(2024, 2, 29, 9)));
    }

    #[test]
    fn test_interval_elapsed() {
        let now = at(2024, 3, 10, 12);
        assert!(interval_elapsed(None, RecurringInterval::Daily, now));
        assert!(interval_elapsed(Some(at(2024, 3, 9, 12)), RecurringInterval::Daily, now));
        assert!(!interval_elapsed(Some(at(2024, 3, 9, 13)), RecurringInterval::Daily, now));
        assert!(!interval_elapsed(Some(at(2024, 3, 5, 12)), RecurringInterval::Weekly, now));
    }

    #[test]
    fn test_next_window_policies() {
        let mut deal = test_deal_model(at(2024, 3, 1, 9), at(2024, 3, 1, 17), 10, 4);
        deal.is_recurring = true;
        deal.recurring_interval = Some(RecurringInterval::Daily);

        // Still open: not due
        assert!(next_window(&deal, at(2024, 3, 1, 12), CatchUpPolicy::SingleInterval).is_none());

        let now = at(2024, 3, 5, 12);
        let (start, end, steps) =
            next_window(&deal, now, CatchUpPolicy::SingleInterval).unwrap();
        assert_eq!((start, end, steps), (at(2024, 3, 2, 9), at(2024, 3, 2, 17), 1));

        let (start, end, steps) = next_window(&deal, now, CatchUpPolicy::SkipToCurrent).unwrap();
        assert_eq!((start, end, steps), (at(2024, 3, 5, 9), at(2024, 3, 5, 17), 4));
        assert!(end > now);

        deal.is_recurring = false;
        assert!(next_window(&deal, now, CatchUpPolicy::SingleInterval).is_none());
    }

    #[test]
    fn test_monthly_window_keeps_length() {
        let mut deal = test_deal_model(at(2024, 1, 30, 0), at(2024, 1, 31, 0), 10, 0);
        deal.is_recurring = true;
        deal.recurring_interval = Some(RecurringInterval::Monthly);

        let (start, end, _) =
            next_window(&deal, at(2024, 2, 1, 0), CatchUpPolicy::SingleInterval).unwrap();
        assert_eq!(start, at(2024, 2, 29, 0));
        assert_eq!(end - start, Duration::days(1));
    }

    async fn setup_recurring_deal(
        interval: RecurringInterval,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<(DatabaseConnection, Identity, deal::Model)> {
        let (db, owner, merchant) = setup_with_merchant().await?;
        let mut input = sample_deal("Happy hour", start);
        input.start_time = start;
        input.end_time = end;
        input.max_redemptions = Some(3);
        input.recurring_interval = Some(interval);
        let identity = identity_of(&owner);
        let deal = crate::core::deal::create_deal(&db, &identity, merchant.id, input).await?;
        Ok((db, identity, deal))
    }

    #[tokio::test]
    async fn test_process_recurrence_resets_and_advances() -> Result<()> {
        let start = at(2024, 6, 1, 17);
        let end = at(2024, 6, 1, 19);
        let (db, _owner, deal) =
            setup_recurring_deal(RecurringInterval::Daily, start, end).await?;

        let customer = create_test_user(&db, "c@example.com", Role::Customer).await?;
        let customer_identity = identity_of(&customer);
        let receipt = claim::claim_deal(&db, &customer_identity, deal.id, at(2024, 6, 1, 18)).await?;
        saved::save_deal(&db, &customer_identity, deal.id).await?;

        let now = at(2024, 6, 1, 20);
        let result = process_recurrence(&db, now, CatchUpPolicy::SingleInterval).await?;
        assert_eq!(result.deals_examined, 1);
        assert_eq!(result.recurred.len(), 1);

        let recurred = &result.recurred[0];
        assert_eq!(recurred.deal_id, deal.id);
        assert_eq!(recurred.new_start, at(2024, 6, 2, 17));
        assert_eq!(recurred.new_end, at(2024, 6, 2, 19));
        assert_eq!(recurred.redemptions_reset, 1);
        assert_eq!(recurred.lapsed_claims, 1);

        let stored = crate::core::deal::require_deal(&db, deal.id).await?;
        assert_eq!(stored.current_redemptions, 0);
        assert_eq!(stored.start_time, at(2024, 6, 2, 17));
        assert_eq!(stored.last_recurred_at, Some(now));

        let claims = claim::list_claims_for_user(&db, customer.id).await?;
        assert_eq!(claims[0].0.id, receipt.claim.id);
        assert_eq!(claims[0].0.status, ClaimStatus::Expired);

        // The saver hears about it
        let notes = notification::list_notifications(&db, customer.id, true).await?;
        assert!(notes.iter().any(|n| n.kind == "deal_recurred"));

        // The customer can claim again in the new window
        claim::claim_deal(&db, &customer_identity, deal.id, at(2024, 6, 2, 18)).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_process_recurrence_is_idempotent() -> Result<()> {
        // Missed several days: one interval per sweep leaves the window in the past
        let (db, _owner, deal) = setup_recurring_deal(
            RecurringInterval::Daily,
            at(2024, 6, 1, 17),
            at(2024, 6, 1, 19),
        )
        .await?;

        let now = at(2024, 6, 5, 12);
        let first = process_recurrence(&db, now, CatchUpPolicy::SingleInterval).await?;
        assert_eq!(first.recurred.len(), 1);

        let second = process_recurrence(
            &db,
            now + Duration::minutes(30),
            CatchUpPolicy::SingleInterval,
        )
        .await?;
        assert_eq!(second.deals_examined, 1);
        assert!(second.recurred.is_empty());

        let stored = crate::core::deal::require_deal(&db, deal.id).await?;
        assert_eq!(stored.end_time, at(2024, 6, 2, 19));

        // A full interval later it advances again, still as far behind
        let third =
            process_recurrence(&db, now + Duration::days(1), CatchUpPolicy::SingleInterval)
                .await?;
        assert_eq!(third.recurred.len(), 1);
        let stored = crate::core::deal::require_deal(&db, deal.id).await?;
        assert_eq!(stored.end_time, at(2024, 6, 3, 19));
        Ok(())
    }

    #[tokio::test]
    async fn test_process_recurrence_skip_to_current() -> Result<()> {
        let (db, _owner, deal) = setup_recurring_deal(
            RecurringInterval::Weekly,
            at(2024, 6, 1, 9),
            at(2024, 6, 1, 21),
        )
        .await?;

        let now = at(2024, 6, 22, 12);
        let result = process_recurrence(&db, now, CatchUpPolicy::SkipToCurrent).await?;
        assert_eq!(result.recurred.len(), 1);
        assert_eq!(result.recurred[0].intervals_advanced, 3);

        let stored = crate::core::deal::require_deal(&db, deal.id).await?;
        assert_eq!(stored.start_time, at(2024, 6, 22, 9));
        assert!(crate::core::deal::is_claimable(&stored, now));

        let again = process_recurrence(&db, now, CatchUpPolicy::SkipToCurrent).await?;
        assert_eq!(again.deals_examined, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_non_recurring_and_inactive_deals_are_ignored() -> Result<()> {
        let (db, owner, merchant) = setup_with_merchant().await?;
        let identity = identity_of(&owner);
        let mut plain = sample_deal("One-off", at(2024, 6, 1, 9));
        plain.start_time = at(2024, 6, 1, 9);
        plain.end_time = at(2024, 6, 1, 10);
        crate::core::deal::create_deal(&db, &identity, merchant.id, plain).await?;

        let mut paused = sample_deal("Paused", at(2024, 6, 1, 9));
        paused.start_time = at(2024, 6, 1, 9);
        paused.end_time = at(2024, 6, 1, 10);
        paused.recurring_interval = Some(RecurringInterval::Daily);
        let paused = crate::core::deal::create_deal(&db, &identity, merchant.id, paused).await?;
        crate::core::deal::deactivate_deal(&db, &identity, paused.id).await?;

        let result =
            process_recurrence(&db, at(2024, 6, 3, 0), CatchUpPolicy::SingleInterval).await?;
        assert_eq!(result.deals_examined, 0);
        assert!(result.recurred.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_run_sweep_expires_one_off_claims() -> Result<()> {
        let (db, owner, merchant) = setup_with_merchant().await?;
        let claimed_at = at(2024, 6, 1, 12);
        let deal = create_live_deal(&db, &owner, merchant.id, claimed_at, 5).await?;
        let customer = create_test_user(&db, "c@example.com", Role::Customer).await?;
        claim::claim_deal(&db, &identity_of(&customer), deal.id, claimed_at).await?;

        let result =
            run_sweep(&db, at(2024, 6, 2, 0), CatchUpPolicy::SingleInterval).await?;
        assert!(result.recurrence.recurred.is_empty());
        assert_eq!(result.expired_claims, 1);
        Ok(())
    }

    #[test]
    fn test_format_recurrence_summary() {
        let result = RecurrenceResult {
            recurred: vec![DealRecurrenceResult {
                deal_id: 7,
                title: "Happy hour".to_string(),
                interval: RecurringInterval::Daily,
                old_start: at(2024, 6, 1, 17),
                old_end: at(2024, 6, 1, 19),
                new_start: at(2024, 6, 2, 17),
                new_end: at(2024, 6, 2, 19),
                redemptions_reset: 3,
                intervals_advanced: 1,
                lapsed_claims: 2,
            }],
            deals_examined: 2,
            run_at: at(2024, 6, 1, 20),
        };

        let summary = format_recurrence_summary(&result);
        assert!(summary.contains("re-opened 1 of 2"));
        assert!(summary.contains("#7 Happy hour (Daily)"));
        assert!(summary.contains("reset 3 redemptions, lapsed 2 claims"));
    }
}
