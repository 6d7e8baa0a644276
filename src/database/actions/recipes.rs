use std::collections::HashSet;

use crate::{
    authentication::permissions::{can_write, ActionType},
    constants::{MIN_AMOUNT, MIN_COOKING_TIME, RECIPE_NAME_MAX_LENGTH},
    error::{CatalogError, FieldErrors},
    form::{AmountInput, RecipeDraft, RecipePatch, RecipeQuery},
    jwt::SessionData,
    schema::{Id, Recipe, RelationKind},
    store::{CatalogStore, NewRecipe, RecipeChanges, RecipeFilter},
    views::{RecipeView, ViewerFlags},
};

use super::users::profile_for;

fn recipe_not_found(id: Id) -> CatalogError {
    CatalogError::NotFound(format!("No recipe exists with id {id}"))
}

fn check_name(name: &str, errors: &mut FieldErrors) {
    if name.trim().is_empty() {
        errors.add("name", "Name can't be empty");
    } else if name.chars().count() > RECIPE_NAME_MAX_LENGTH {
        errors.add(
            "name",
            format!("Name can't be longer than {RECIPE_NAME_MAX_LENGTH} characters"),
        );
    }
}

fn check_text(text: &str, errors: &mut FieldErrors) {
    if text.trim().is_empty() {
        errors.add("text", "Text can't be empty");
    }
}

fn check_cooking_time(cooking_time: i32, errors: &mut FieldErrors) {
    if cooking_time < MIN_COOKING_TIME {
        errors.add(
            "cooking_time",
            format!("Cooking time must be at least {MIN_COOKING_TIME}"),
        );
    }
}

/// Tags are a set: repeated ids collapse, first occurrence wins.
fn check_tags(tags: &[Id], errors: &mut FieldErrors) -> Vec<Id> {
    if tags.is_empty() {
        errors.add("tags", "At least one tag is required");
    }

    let mut seen = HashSet::new();
    tags.iter().copied().filter(|id| seen.insert(*id)).collect()
}

fn check_parts(parts: &[AmountInput], errors: &mut FieldErrors) {
    if parts.is_empty() {
        errors.add("ingredients", "At least one ingredient is required");
    }

    let mut seen = HashSet::new();
    for (index, part) in parts.iter().enumerate() {
        if !seen.insert(part.id) {
            errors.add(
                "ingredients",
                format!("Ingredient {} is listed more than once", part.id),
            );
        }
        if part.amount < MIN_AMOUNT {
            errors.add(
                format!("ingredients[{index}].amount"),
                format!("Amount must be at least {MIN_AMOUNT}"),
            );
        }
    }
}

async fn check_references(
    tags: Option<&[Id]>,
    parts: Option<&[AmountInput]>,
    errors: &mut FieldErrors,
    store: &dyn CatalogStore,
) -> Result<(), CatalogError> {
    if let Some(tags) = tags.filter(|tags| !tags.is_empty()) {
        for id in store.find_missing_tags(tags).await? {
            errors.add("tags", format!("Tag {id} doesn't exist"));
        }
    }

    if let Some(parts) = parts.filter(|parts| !parts.is_empty()) {
        let ids: Vec<Id> = parts.iter().map(|part| part.id).collect();
        let missing: HashSet<Id> = store
            .find_missing_ingredients(&ids)
            .await?
            .into_iter()
            .collect();

        for (index, part) in parts.iter().enumerate() {
            if missing.contains(&part.id) {
                errors.add(
                    format!("ingredients[{index}].id"),
                    format!("Ingredient {} doesn't exist", part.id),
                );
            }
        }
    }

    Ok(())
}

/// Checks a creation request and turns it into a row set ready for the store.
/// Every rejected field is reported, not just the first one.
pub async fn validate_draft(
    author_id: Id,
    draft: RecipeDraft,
    store: &dyn CatalogStore,
) -> Result<NewRecipe, CatalogError> {
    let mut errors = FieldErrors::new();

    check_name(&draft.name, &mut errors);
    check_text(&draft.text, &mut errors);
    check_cooking_time(draft.cooking_time, &mut errors);
    let tags = check_tags(&draft.tags, &mut errors);
    check_parts(&draft.ingredients, &mut errors);
    check_references(
        Some(tags.as_slice()),
        Some(draft.ingredients.as_slice()),
        &mut errors,
        store,
    )
    .await?;

    errors.into_result()?;

    Ok(NewRecipe {
        author_id,
        name: draft.name,
        text: draft.text,
        cooking_time: draft.cooking_time,
        image: draft.image,
        tags,
        parts: draft.ingredients,
    })
}

/// Same rules as `validate_draft`, applied to the supplied fields only.
pub async fn validate_patch(
    patch: RecipePatch,
    store: &dyn CatalogStore,
) -> Result<RecipeChanges, CatalogError> {
    let mut errors = FieldErrors::new();

    if let Some(name) = &patch.name {
        check_name(name, &mut errors);
    }
    if let Some(text) = &patch.text {
        check_text(text, &mut errors);
    }
    if let Some(cooking_time) = patch.cooking_time {
        check_cooking_time(cooking_time, &mut errors);
    }
    let tags = patch.tags.as_deref().map(|tags| check_tags(tags, &mut errors));
    if let Some(parts) = &patch.ingredients {
        check_parts(parts, &mut errors);
    }
    check_references(
        tags.as_deref(),
        patch.ingredients.as_deref(),
        &mut errors,
        store,
    )
    .await?;

    errors.into_result()?;

    Ok(RecipeChanges {
        name: patch.name,
        text: patch.text,
        cooking_time: patch.cooking_time,
        image: patch.image,
        tags,
        parts: patch.ingredients,
    })
}

async fn viewer_flags(
    recipe_id: Id,
    viewer: Option<&SessionData>,
    store: &dyn CatalogStore,
) -> Result<ViewerFlags, CatalogError> {
    match viewer {
        Some(session) => Ok(ViewerFlags {
            is_favorited: store
                .relation_exists(RelationKind::Favorite, session.user_id, recipe_id)
                .await?,
            is_in_shopping_cart: store
                .relation_exists(RelationKind::ShoppingCart, session.user_id, recipe_id)
                .await?,
        }),
        None => Ok(ViewerFlags::default()),
    }
}

async fn assemble_view(
    recipe: Recipe,
    viewer: Option<&SessionData>,
    store: &dyn CatalogStore,
) -> Result<RecipeView, CatalogError> {
    let author = store.get_user(recipe.author_id).await?.ok_or_else(|| {
        CatalogError::NotFound(format!("Author of recipe {} doesn't exist", recipe.id))
    })?;

    let author = profile_for(&author, viewer, store).await?;
    let tags = store.list_recipe_tags(recipe.id).await?;
    let parts = store.list_recipe_parts(recipe.id).await?;
    let flags = viewer_flags(recipe.id, viewer, store).await?;

    Ok(RecipeView::assemble(recipe, tags, parts, author, flags))
}

pub async fn get_recipe(
    id: Id,
    viewer: Option<&SessionData>,
    store: &dyn CatalogStore,
) -> Result<RecipeView, CatalogError> {
    let recipe = store
        .get_recipe(id)
        .await?
        .ok_or_else(|| recipe_not_found(id))?;

    assemble_view(recipe, viewer, store).await
}

/// Newest first. The favorite and cart flags of `query` are ignored for anonymous viewers.
pub async fn list_recipes(
    query: RecipeQuery,
    viewer: Option<&SessionData>,
    store: &dyn CatalogStore,
) -> Result<Vec<RecipeView>, CatalogError> {
    let viewer_id = viewer.map(|session| session.user_id);
    let filter = RecipeFilter {
        author: query.author,
        tag_slugs: query.tags,
        favorited_by: viewer_id.filter(|_| query.is_favorited),
        in_cart_of: viewer_id.filter(|_| query.is_in_shopping_cart),
        limit: None,
    };

    let recipes = store.list_recipes(&filter).await?;

    let mut views = Vec::with_capacity(recipes.len());
    for recipe in recipes {
        views.push(assemble_view(recipe, viewer, store).await?);
    }

    Ok(views)
}

/// Loads a recipe the session is allowed to modify.
pub async fn get_recipe_mut(
    id: Id,
    session: &SessionData,
    store: &dyn CatalogStore,
) -> Result<Recipe, CatalogError> {
    let recipe = store
        .get_recipe(id)
        .await?
        .ok_or_else(|| recipe_not_found(id))?;

    if !can_write(Some(session), &recipe) {
        log::debug!(
            "> {} ({}) may not modify recipe {id}",
            session.username,
            session.user_id
        );
        return Err(CatalogError::permission_denied());
    }

    Ok(recipe)
}

pub async fn create_recipe(
    draft: RecipeDraft,
    session: &SessionData,
    store: &dyn CatalogStore,
) -> Result<RecipeView, CatalogError> {
    session.authenticate(ActionType::CreateRecipes)?;

    let recipe = validate_draft(session.user_id, draft, store).await?;
    let id = store.insert_recipe(&recipe).await?;

    log::info!(
        "> Created recipe {id} ({} tags, {} ingredients) by {}",
        recipe.tags.len(),
        recipe.parts.len(),
        session.user_id
    );

    get_recipe(id, Some(session), store).await
}

pub async fn update_recipe(
    id: Id,
    patch: RecipePatch,
    session: &SessionData,
    store: &dyn CatalogStore,
) -> Result<RecipeView, CatalogError> {
    get_recipe_mut(id, session, store).await?;

    let changes = validate_patch(patch, store).await?;
    if !store.update_recipe(id, &changes).await? {
        return Err(recipe_not_found(id));
    }

    log::info!(
        "> Updated recipe {id} by {} (tags replaced: {}, ingredients replaced: {})",
        session.user_id,
        changes.tags.is_some(),
        changes.parts.is_some()
    );

    get_recipe(id, Some(session), store).await
}

pub async fn delete_recipe(
    id: Id,
    session: &SessionData,
    store: &dyn CatalogStore,
) -> Result<(), CatalogError> {
    get_recipe_mut(id, session, store).await?;

    if !store.delete_recipe(id).await? {
        return Err(recipe_not_found(id));
    }

    log::info!("> Deleted recipe {id} by {}", session.user_id);
    Ok(())
}
