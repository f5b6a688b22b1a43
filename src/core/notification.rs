//! Notification business logic - the user's notification list.
//!
//! Notifications are written best effort alongside lifecycle events and read back
//! as a filtered list.

use crate::{
    core::access::Identity,
    entities::{Notification, notification},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, prelude::*};
use tracing::warn;

/// A notification waiting to be written.
#[derive(Debug, Clone)]
pub struct NewNotification {
    /// Recipient
    pub user_id: i64,
    /// Deal it is about, if any
    pub deal_id: Option<i64>,
    /// Machine-readable kind
    pub kind: String,
    /// Short title
    pub title: String,
    /// Body text
    pub message: String,
}

/// Best-effort insert. Failures are logged and swallowed; returns whether it was stored.
pub async fn notify<C>(db: &C, new_notification: NewNotification) -> bool
where
    C: ConnectionTrait,
{
    let user_id = new_notification.user_id;
    let kind = new_notification.kind.clone();
    let row = notification::ActiveModel {
        user_id: Set(new_notification.user_id),
        deal_id: Set(new_notification.deal_id),
        kind: Set(new_notification.kind),
        title: Set(new_notification.title),
        message: Set(new_notification.message),
        is_read: Set(false),
        created_at: Set(Utc::now()),
        ..Default::default()
    };

    match row.insert(db).await {
        Ok(_) => true,
        Err(e) => {
            warn!(user_id, kind = %kind, "Failed to write notification: {}", e);
            false
        }
    }
}

/// Lists a user's notifications newest first, optionally only the unread ones.
pub async fn list_notifications(
    db: &DatabaseConnection,
    user_id: i64,
    unread_only: bool,
) -> Result<Vec<notification::Model>> {
    let mut query = Notification::find().filter(notification::Column::UserId.eq(user_id));
    if unread_only {
        query = query.filter(notification::Column::IsRead.eq(false));
    }

    query
        .order_by_desc(notification::Column::CreatedAt)
        .order_by_desc(notification::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Marks one of the caller's notifications as read.
pub async fn mark_read(
    db: &DatabaseConnection,
    identity: &Identity,
    notification_id: i64,
) -> Result<notification::Model> {
    let found = Notification::find_by_id(notification_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("notification", notification_id))?;

    if found.user_id != identity.user_id {
        return Err(Error::unauthorized(format!(
            "notification {notification_id} belongs to another user"
        )));
    }
    if found.is_read {
        return Ok(found);
    }

    let mut active_model: notification::ActiveModel = found.into();
    active_model.is_read = Set(true);
    Ok(active_model.update(db).await?)
}
