//! User profile logic - the rows that upstream identities map onto.

use crate::{
    entities::{Role, User, user},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{Set, prelude::*};

/// Creates a user profile, rejecting blank names, malformed emails and duplicate emails.
pub async fn create_user(
    db: &DatabaseConnection,
    email: String,
    display_name: String,
    role: Role,
) -> Result<user::Model> {
    let email = email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(Error::validation("A valid email address is required"));
    }
    if display_name.trim().is_empty() {
        return Err(Error::validation("Display name cannot be empty"));
    }

    let existing = User::find()
        .filter(user::Column::Email.eq(email.as_str()))
        .one(db)
        .await?;
    if existing.is_some() {
        return Err(Error::validation(format!("Email {email} is already registered")));
    }

    let user = user::ActiveModel {
        email: Set(email),
        display_name: Set(display_name.trim().to_string()),
        role: Set(role),
        created_at: Set(Utc::now()),
        ..Default::default()
    };

    Ok(user.insert(db).await?)
}

/// Finds a user by ID.
pub async fn get_user_by_id<C>(db: &C, user_id: i64) -> Result<Option<user::Model>>
where
    C: ConnectionTrait,
{
    User::find_by_id(user_id).one(db).await.map_err(Into::into)
}

/// Finds a user by ID, failing with `NotFound` when the profile does not exist.
pub async fn require_user<C>(db: &C, user_id: i64) -> Result<user::Model>
where
    C: ConnectionTrait,
{
    get_user_by_id(db, user_id)
        .await?
        .ok_or_else(|| Error::not_found("user", user_id))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_create_user_normalizes_email() -> Result<()> {
        let db = setup_test_db().await?;

        let user = create_user(
            &db,
            "  Alice@Example.com ".to_string(),
            " Alice ".to_string(),
            Role::Customer,
        )
        .await?;

        assert_eq!(user.email, "alice@example.com");
        assert_eq!(user.display_name, "Alice");
        assert_eq!(user.role, Role::Customer);

        let found = get_user_by_id(&db, user.id).await?.unwrap();
        assert_eq!(found, user);
        Ok(())
    }

    #[tokio::test]
    async fn test_create_user_rejects_duplicates_and_bad_input() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_user(&db, "bob@example.com", Role::Customer).await?;

        let duplicate = create_user(
            &db,
            "BOB@example.com".to_string(),
            "Bob again".to_string(),
            Role::Customer,
        )
        .await;
        assert!(matches!(duplicate, Err(Error::Validation { .. })));

        let bad_email =
            create_user(&db, "not-an-email".to_string(), "X".to_string(), Role::Customer).await;
        assert!(matches!(bad_email, Err(Error::Validation { .. })));

        let blank_name = create_user(
            &db,
            "carol@example.com".to_string(),
            "   ".to_string(),
            Role::Customer,
        )
        .await;
        assert!(matches!(blank_name, Err(Error::Validation { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_require_user_not_found() -> Result<()> {
        let db = setup_test_db().await?;
        let result = require_user(&db, 42).await;
        assert!(matches!(result, Err(Error::NotFound { entity: "user", .. })));
        Ok(())
    }
}
