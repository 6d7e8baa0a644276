use crate::{
    authentication::permissions::ActionType,
    constants::RECIPES_LIMIT_PARAM,
    error::CatalogError,
    form::check_limit,
    jwt::SessionData,
    schema::{Id, RelationKind, User},
    store::{CatalogStore, RecipeFilter},
    views::{RecipeBrief, SubscriptionView},
};

use super::users::profile_for;

fn required_action(kind: RelationKind) -> ActionType {
    match kind {
        RelationKind::Favorite => ActionType::ManageOwnFavorites,
        RelationKind::ShoppingCart => ActionType::ManageOwnShoppingCart,
        RelationKind::Subscription => ActionType::ManageOwnSubscriptions,
    }
}

async fn add_recipe_relation(
    kind: RelationKind,
    recipe_id: Id,
    session: &SessionData,
    store: &dyn CatalogStore,
) -> Result<RecipeBrief, CatalogError> {
    session.authenticate(required_action(kind))?;

    let recipe = store
        .get_recipe(recipe_id)
        .await?
        .ok_or_else(|| CatalogError::NotFound(format!("No recipe exists with id {recipe_id}")))?;

    if !store
        .insert_relation(kind, session.user_id, recipe_id)
        .await?
    {
        return Err(CatalogError::Conflict(format!(
            "Recipe is already in {}",
            kind.label()
        )));
    }

    log::info!(
        "> Added recipe {recipe_id} to {} of {}",
        kind.label(),
        session.user_id
    );
    Ok(RecipeBrief::from(&recipe))
}

async fn remove_recipe_relation(
    kind: RelationKind,
    recipe_id: Id,
    session: &SessionData,
    store: &dyn CatalogStore,
) -> Result<(), CatalogError> {
    session.authenticate(required_action(kind))?;

    if !store
        .delete_relation(kind, session.user_id, recipe_id)
        .await?
    {
        return Err(CatalogError::NotFound(format!(
            "Recipe is not in {}",
            kind.label()
        )));
    }

    log::info!(
        "> Removed recipe {recipe_id} from {} of {}",
        kind.label(),
        session.user_id
    );
    Ok(())
}

async fn list_recipe_relation(
    kind: RelationKind,
    session: &SessionData,
    store: &dyn CatalogStore,
) -> Result<Vec<RecipeBrief>, CatalogError> {
    session.authenticate(required_action(kind))?;

    let mut briefs = vec![];
    for recipe_id in store.list_relation_targets(kind, session.user_id).await? {
        if let Some(recipe) = store.get_recipe(recipe_id).await? {
            briefs.push(RecipeBrief::from(&recipe));
        }
    }

    Ok(briefs)
}

pub async fn add_to_favorites(
    recipe_id: Id,
    session: &SessionData,
    store: &dyn CatalogStore,
) -> Result<RecipeBrief, CatalogError> {
    add_recipe_relation(RelationKind::Favorite, recipe_id, session, store).await
}

pub async fn remove_from_favorites(
    recipe_id: Id,
    session: &SessionData,
    store: &dyn CatalogStore,
) -> Result<(), CatalogError> {
    remove_recipe_relation(RelationKind::Favorite, recipe_id, session, store).await
}

pub async fn list_favorites(
    session: &SessionData,
    store: &dyn CatalogStore,
) -> Result<Vec<RecipeBrief>, CatalogError> {
    list_recipe_relation(RelationKind::Favorite, session, store).await
}

pub async fn add_to_shopping_cart(
    recipe_id: Id,
    session: &SessionData,
    store: &dyn CatalogStore,
) -> Result<RecipeBrief, CatalogError> {
    add_recipe_relation(RelationKind::ShoppingCart, recipe_id, session, store).await
}

pub async fn remove_from_shopping_cart(
    recipe_id: Id,
    session: &SessionData,
    store: &dyn CatalogStore,
) -> Result<(), CatalogError> {
    remove_recipe_relation(RelationKind::ShoppingCart, recipe_id, session, store).await
}

pub async fn list_shopping_cart(
    session: &SessionData,
    store: &dyn CatalogStore,
) -> Result<Vec<RecipeBrief>, CatalogError> {
    list_recipe_relation(RelationKind::ShoppingCart, session, store).await
}

async fn subscription_view(
    author: &User,
    recipes_limit: Option<i64>,
    session: &SessionData,
    store: &dyn CatalogStore,
) -> Result<SubscriptionView, CatalogError> {
    let profile = profile_for(author, Some(session), store).await?;
    let recipes = store
        .list_recipes(&RecipeFilter::by_author(author.id, recipes_limit))
        .await?
        .iter()
        .map(RecipeBrief::from)
        .collect();
    let recipes_count = store.count_recipes(author.id).await?;

    Ok(SubscriptionView {
        author: profile,
        recipes,
        recipes_count,
    })
}

/// Follows `author_id`. The limit only shapes the returned view.
pub async fn subscribe(
    author_id: Id,
    recipes_limit: Option<i64>,
    session: &SessionData,
    store: &dyn CatalogStore,
) -> Result<SubscriptionView, CatalogError> {
    session.authenticate(ActionType::ManageOwnSubscriptions)?;

    if author_id == session.user_id {
        return Err(CatalogError::SelfReference(String::from(
            "You can't subscribe to yourself",
        )));
    }

    let recipes_limit = recipes_limit
        .map(|limit| check_limit(RECIPES_LIMIT_PARAM, limit))
        .transpose()?;

    let author = store
        .get_user(author_id)
        .await?
        .ok_or_else(|| CatalogError::NotFound(format!("No user exists with id {author_id}")))?;

    if !store
        .insert_relation(RelationKind::Subscription, session.user_id, author_id)
        .await?
    {
        return Err(CatalogError::Conflict(String::from(
            "You are already subscribed to this author",
        )));
    }

    log::info!("> {} subscribed to {author_id}", session.user_id);
    subscription_view(&author, recipes_limit, session, store).await
}

pub async fn unsubscribe(
    author_id: Id,
    session: &SessionData,
    store: &dyn CatalogStore,
) -> Result<(), CatalogError> {
    session.authenticate(ActionType::ManageOwnSubscriptions)?;

    if !store
        .delete_relation(RelationKind::Subscription, session.user_id, author_id)
        .await?
    {
        return Err(CatalogError::NotFound(String::from(
            "You are not subscribed to this author",
        )));
    }

    log::info!("> {} unsubscribed from {author_id}", session.user_id);
    Ok(())
}

pub async fn list_subscriptions(
    recipes_limit: Option<i64>,
    session: &SessionData,
    store: &dyn CatalogStore,
) -> Result<Vec<SubscriptionView>, CatalogError> {
    session.authenticate(ActionType::ManageOwnSubscriptions)?;

    let recipes_limit = recipes_limit
        .map(|limit| check_limit(RECIPES_LIMIT_PARAM, limit))
        .transpose()?;

    let mut views = vec![];
    for author_id in store
        .list_relation_targets(RelationKind::Subscription, session.user_id)
        .await?
    {
        if let Some(author) = store.get_user(author_id).await? {
            views.push(subscription_view(&author, recipes_limit, session, store).await?);
        }
    }

    Ok(views)
}
