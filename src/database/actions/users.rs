use crate::{
    error::CatalogError,
    jwt::SessionData,
    schema::{Id, RelationKind, User},
    store::CatalogStore,
    views::UserProfile,
};

/// Public profile of `user`, with `is_subscribed` relative to `viewer`.
pub async fn profile_for(
    user: &User,
    viewer: Option<&SessionData>,
    store: &dyn CatalogStore,
) -> Result<UserProfile, CatalogError> {
    let is_subscribed = match viewer {
        Some(session) => {
            store
                .relation_exists(RelationKind::Subscription, session.user_id, user.id)
                .await?
        }
        None => false,
    };

    Ok(UserProfile::from_user(user, is_subscribed))
}

pub async fn get_user_profile(
    user_id: Id,
    viewer: Option<&SessionData>,
    store: &dyn CatalogStore,
) -> Result<UserProfile, CatalogError> {
    let user = store
        .get_user(user_id)
        .await?
        .ok_or_else(|| CatalogError::NotFound(format!("No user exists with id {user_id}")))?;

    profile_for(&user, viewer, store).await
}
