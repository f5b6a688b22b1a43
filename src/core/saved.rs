//! Saved deal logic - bookmarks that users keep independently of claims.
//!
//! Saving an already saved deal is reported as `DuplicateSave` rather than
//! silently succeeding, so clients can show "already saved".

use crate::{
    core::{
        access::{self, Capabilities, Identity, Route},
        deal, user,
    },
    entities::{Deal, SavedDeal, deal as deal_entity, saved_deal},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, SqlErr, prelude::*};
use tracing::debug;

/// Bookmarks a deal for the caller.
///
/// # Errors
/// - `NotFound` when the deal or the caller's profile does not exist
/// - `DuplicateSave` when the caller already saved it
pub async fn save_deal(
    db: &DatabaseConnection,
    identity: &Identity,
    deal_id: i64,
) -> Result<saved_deal::Model> {
    access::require(identity, Route::Saved, Capabilities::SAVE_DEALS)?;
    let user_id = identity.user_id;

    deal::require_deal(db, deal_id).await?;
    user::require_user(db, user_id).await?;

    let existing = SavedDeal::find_by_id((user_id, deal_id)).one(db).await?;
    if existing.is_some() {
        return Err(Error::DuplicateSave { user_id, deal_id });
    }

    let saved = saved_deal::ActiveModel {
        user_id: Set(user_id),
        deal_id: Set(deal_id),
        created_at: Set(Utc::now()),
    };

    match saved.insert(db).await {
        Ok(saved) => {
            debug!(user_id, deal_id, "Deal saved");
            Ok(saved)
        }
        // Lost a race with a concurrent save of the same pair
        Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            Err(Error::DuplicateSave { user_id, deal_id })
        }
        Err(e) => Err(e.into()),
    }
}

/// Removes a bookmark. Fails with `NotFound` when the deal was not saved.
pub async fn unsave_deal(db: &DatabaseConnection, identity: &Identity, deal_id: i64) -> Result<()> {
    let result = SavedDeal::delete_many()
        .filter(saved_deal::Column::UserId.eq(identity.user_id))
        .filter(saved_deal::Column::DealId.eq(deal_id))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(Error::not_found("saved deal", deal_id));
    }
    debug!(user_id = identity.user_id, deal_id, "Deal unsaved");
    Ok(())
}

/// Lists the deals a user saved, most recently saved first.
pub async fn list_saved_deals(
    db: &DatabaseConnection,
    user_id: i64,
) -> Result<Vec<deal_entity::Model>> {
    Deal::find()
        .inner_join(SavedDeal)
        .filter(saved_deal::Column::UserId.eq(user_id))
        .order_by_desc(saved_deal::Column::CreatedAt)
        .all(db)
        .await
        .map_err(Into::into)
}

/// IDs of every user who saved a deal.
pub async fn users_who_saved<C>(db: &C, deal_id: i64) -> Result<Vec<i64>>
where
    C: ConnectionTrait,
{
    let rows = SavedDeal::find()
        .filter(saved_deal::Column::DealId.eq(deal_id))
        .all(db)
        .await?;
    Ok(rows.into_iter().map(|row| row.user_id).collect())
}
