use sea_orm::*;
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::users::{self, CompleteProfile, CreateUserFromAuth, Roles, UpdateUser};

/// Fetch the user behind a token, creating it from the claims on first sight.
pub async fn find_or_create_from_auth(
    db: &DatabaseConnection,
    input: CreateUserFromAuth,
) -> Result<users::Model, DbErr> {
    if let Some(existing) = users::Entity::find_by_id(input.id).one(db).await? {
        return Ok(existing);
    }

    let new_user = users::ActiveModel {
        id: Set(input.id),
        email: Set(input.email),
        full_name: Set(input.full_name),
        phone: Set(None),
        avatar_url: Set(input.avatar_url),
        auth_provider: Set(input.auth_provider),
        role: Set(input.role),
        is_active: Set(true),
        created_at: Set(chrono::Utc::now()),
        updated_at: Set(None),
    };

    let user = new_user.insert(db).await?;
    tracing::info!(user_id = %user.id, "Provisioned new user from token");
    Ok(user)
}

/// Fetch a single user by ID.
pub async fn get_user_by_id(
    db: &DatabaseConnection,
    id: Uuid,
) -> Result<Option<users::Model>, DbErr> {
    users::Entity::find_by_id(id).one(db).await
}

/// Complete a user's profile after first login (name, phone, avatar, role).
pub async fn complete_profile(
    db: &DatabaseConnection,
    id: Uuid,
    input: CompleteProfile,
) -> Result<users::Model, DbErr> {
    let user = users::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(DbErr::RecordNotFound("User not found".to_string()))?;

    let mut active: users::ActiveModel = user.into();

    if let Some(full_name) = input.full_name {
        active.full_name = Set(Some(full_name));
    }
    if let Some(phone) = input.phone {
        active.phone = Set(Some(phone));
    }
    if let Some(avatar_url) = input.avatar_url {
        active.avatar_url = Set(Some(avatar_url));
    }
    if let Some(role) = input.role {
        active.role = Set(role);
    }
    active.updated_at = Set(Some(chrono::Utc::now()));

    active.update(db).await
}

/// Update an existing user's own account fields.
pub async fn update_user(
    db: &DatabaseConnection,
    id: Uuid,
    input: UpdateUser,
) -> Result<users::Model, DbErr> {
    let user = users::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(DbErr::RecordNotFound("User not found".to_string()))?;

    let mut active: users::ActiveModel = user.into();

    if let Some(email) = input.email {
        active.email = Set(email);
    }
    if let Some(full_name) = input.full_name {
        active.full_name = Set(Some(full_name));
    }
    if let Some(phone) = input.phone {
        active.phone = Set(Some(phone));
    }
    if let Some(avatar_url) = input.avatar_url {
        active.avatar_url = Set(Some(avatar_url));
    }
    active.updated_at = Set(Some(chrono::Utc::now()));

    active.update(db).await
}

/// Lock the user's row until the surrounding transaction ends, so writes
/// that check-then-insert for one technician run one at a time. SQLite has
/// no row locks and serialises writers on its own.
pub async fn lock_for_update<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<(), DbErr> {
    users::Entity::find_by_id(id)
        .lock_exclusive()
        .one(db)
        .await?
        .ok_or(DbErr::RecordNotFound("User not found".to_string()))?;
    Ok(())
}

pub async fn set_role<C: ConnectionTrait>(db: &C, id: Uuid, role: Roles) -> Result<(), DbErr> {
    users::Entity::update_many()
        .set(users::ActiveModel {
            role: Set(role),
            updated_at: Set(Some(chrono::Utc::now())),
            ..Default::default()
        })
        .filter(users::Column::Id.eq(id))
        .exec(db)
        .await?;

    Ok(())
}

/// Number of users per role, for the admin dashboard.
pub async fn count_by_role(db: &DatabaseConnection) -> Result<HashMap<Roles, u64>, DbErr> {
    let mut counts = HashMap::new();
    for role in Roles::iter() {
        let count = users::Entity::find()
            .filter(users::Column::Role.eq(role))
            .count(db)
            .await?;
        counts.insert(role, count);
    }
    Ok(counts)
}
