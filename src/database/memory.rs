//! In-process catalog.
//!
//! Every operation runs under one lock and checks all of its constraints
//! before writing anything, which gives the same all-or-nothing behaviour as a
//! database transaction. Used by the test suite and for local runs without a
//! database.

use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    sync::Arc,
};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    error::CatalogError,
    form::AmountInput,
    schema::{
        Id, Ingredient, NewIngredient, NewTag, NewUser, Recipe, RecipePart, RelationKind, Tag,
        User,
    },
    store::{CatalogStore, NewRecipe, RecipeChanges, RecipeFilter},
};

#[derive(Debug, Clone)]
struct StoredRecipe {
    recipe: Recipe,
    tags: Vec<Id>,
    parts: Vec<AmountInput>,
}

#[derive(Debug, Default)]
struct Sequences {
    user: Id,
    tag: Id,
    ingredient: Id,
    recipe: Id,
}

fn next(sequence: &mut Id) -> Id {
    *sequence += 1;
    *sequence
}

#[derive(Debug, Default)]
struct State {
    users: BTreeMap<Id, User>,
    tags: BTreeMap<Id, Tag>,
    ingredients: BTreeMap<Id, Ingredient>,
    recipes: BTreeMap<Id, StoredRecipe>,
    relations: BTreeSet<(RelationKind, Id, Id)>,
    sequences: Sequences,
}

fn missing_reference() -> CatalogError {
    CatalogError::Conflict(String::from(
        "Row is still referenced or references a missing row",
    ))
}

impl State {
    fn check_tags(&self, tags: &[Id]) -> Result<(), CatalogError> {
        let mut seen = HashSet::new();
        for tag_id in tags {
            if !self.tags.contains_key(tag_id) {
                return Err(missing_reference());
            }
            if !seen.insert(*tag_id) {
                return Err(CatalogError::Conflict(String::from("Row already exists")));
            }
        }
        Ok(())
    }

    fn check_parts(&self, parts: &[AmountInput]) -> Result<(), CatalogError> {
        let mut seen = HashSet::new();
        for part in parts {
            if !self.ingredients.contains_key(&part.id) {
                return Err(missing_reference());
            }
            if !seen.insert(part.id) {
                return Err(CatalogError::Conflict(String::from("Row already exists")));
            }
            if part.amount < 1 {
                return Err(CatalogError::invalid("constraint", "amount must be at least 1"));
            }
        }
        Ok(())
    }

    fn check_cooking_time(cooking_time: i32) -> Result<(), CatalogError> {
        if cooking_time < 1 {
            return Err(CatalogError::invalid(
                "constraint",
                "cooking_time must be at least 1",
            ));
        }
        Ok(())
    }

    fn relation_target_exists(&self, kind: RelationKind, target_id: Id) -> bool {
        match kind {
            RelationKind::Favorite | RelationKind::ShoppingCart => {
                self.recipes.contains_key(&target_id)
            }
            RelationKind::Subscription => self.users.contains_key(&target_id),
        }
    }

    fn matches(&self, stored: &StoredRecipe, filter: &RecipeFilter) -> bool {
        let id = stored.recipe.id;

        filter
            .author
            .map_or(true, |author| stored.recipe.author_id == author)
            && (filter.tag_slugs.is_empty()
                || stored
                    .tags
                    .iter()
                    .filter_map(|tag_id| self.tags.get(tag_id))
                    .any(|tag| filter.tag_slugs.contains(&tag.slug)))
            && filter.favorited_by.map_or(true, |user_id| {
                self.relations
                    .contains(&(RelationKind::Favorite, user_id, id))
            })
            && filter.in_cart_of.map_or(true, |user_id| {
                self.relations
                    .contains(&(RelationKind::ShoppingCart, user_id, id))
            })
    }

    fn parts_of(&self, stored: &StoredRecipe) -> Vec<RecipePart> {
        stored
            .parts
            .iter()
            .filter_map(|part| {
                self.ingredients.get(&part.id).map(|ingredient| RecipePart {
                    recipe_id: stored.recipe.id,
                    ingredient_id: ingredient.id,
                    name: ingredient.name.to_owned(),
                    measurement_unit: ingredient.measurement_unit.to_owned(),
                    amount: part.amount,
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Users are owned by the identity provider; this seeds one locally.
    pub async fn insert_user(&self, user: NewUser) -> Result<User, CatalogError> {
        let mut state = self.state.lock().await;

        if state
            .users
            .values()
            .any(|u| u.username == user.username || u.email == user.email)
        {
            return Err(CatalogError::Conflict(String::from("Row already exists")));
        }

        let id = next(&mut state.sequences.user);
        let user = User {
            id,
            email: user.email,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            role: user.role,
        };
        state.users.insert(id, user.clone());

        Ok(user)
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn get_user(&self, id: Id) -> Result<Option<User>, CatalogError> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, CatalogError> {
        Ok(self.state.lock().await.tags.values().cloned().collect())
    }

    async fn get_tag(&self, id: Id) -> Result<Option<Tag>, CatalogError> {
        Ok(self.state.lock().await.tags.get(&id).cloned())
    }

    async fn insert_tag(&self, tag: &NewTag) -> Result<Tag, CatalogError> {
        let mut state = self.state.lock().await;

        if state.tags.values().any(|t| t.slug == tag.slug) {
            return Err(CatalogError::Conflict(String::from("Row already exists")));
        }

        let id = next(&mut state.sequences.tag);
        let tag = Tag {
            id,
            name: tag.name.to_owned(),
            color: tag.color.to_owned(),
            slug: tag.slug.to_owned(),
        };
        state.tags.insert(id, tag.clone());

        Ok(tag)
    }

    async fn find_missing_tags(&self, ids: &[Id]) -> Result<Vec<Id>, CatalogError> {
        let state = self.state.lock().await;
        Ok(ids
            .iter()
            .copied()
            .filter(|id| !state.tags.contains_key(id))
            .collect())
    }

    async fn list_ingredients(&self) -> Result<Vec<Ingredient>, CatalogError> {
        let mut rows: Vec<Ingredient> = self
            .state
            .lock()
            .await
            .ingredients
            .values()
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));

        Ok(rows)
    }

    async fn get_ingredient(&self, id: Id) -> Result<Option<Ingredient>, CatalogError> {
        Ok(self.state.lock().await.ingredients.get(&id).cloned())
    }

    async fn insert_ingredient(
        &self,
        ingredient: &NewIngredient,
    ) -> Result<Ingredient, CatalogError> {
        let mut state = self.state.lock().await;

        let id = next(&mut state.sequences.ingredient);
        let ingredient = Ingredient {
            id,
            name: ingredient.name.to_owned(),
            measurement_unit: ingredient.measurement_unit.to_owned(),
        };
        state.ingredients.insert(id, ingredient.clone());

        Ok(ingredient)
    }

    async fn find_missing_ingredients(&self, ids: &[Id]) -> Result<Vec<Id>, CatalogError> {
        let state = self.state.lock().await;
        Ok(ids
            .iter()
            .copied()
            .filter(|id| !state.ingredients.contains_key(id))
            .collect())
    }

    async fn delete_ingredient(&self, id: Id) -> Result<bool, CatalogError> {
        let mut state = self.state.lock().await;

        let referenced = state
            .recipes
            .values()
            .any(|stored| stored.parts.iter().any(|part| part.id == id));
        if referenced {
            return Err(CatalogError::Conflict(String::from(
                "Ingredient is still used by a recipe",
            )));
        }

        Ok(state.ingredients.remove(&id).is_some())
    }

    async fn insert_recipe(&self, recipe: &NewRecipe) -> Result<Id, CatalogError> {
        let mut state = self.state.lock().await;

        if !state.users.contains_key(&recipe.author_id) {
            return Err(missing_reference());
        }
        State::check_cooking_time(recipe.cooking_time)?;
        state.check_tags(&recipe.tags)?;
        state.check_parts(&recipe.parts)?;

        let id = next(&mut state.sequences.recipe);
        state.recipes.insert(
            id,
            StoredRecipe {
                recipe: Recipe {
                    id,
                    author_id: recipe.author_id,
                    name: recipe.name.to_owned(),
                    text: recipe.text.to_owned(),
                    cooking_time: recipe.cooking_time,
                    image: recipe.image.to_owned(),
                },
                tags: recipe.tags.to_owned(),
                parts: recipe.parts.to_owned(),
            },
        );

        Ok(id)
    }

    async fn update_recipe(&self, id: Id, changes: &RecipeChanges) -> Result<bool, CatalogError> {
        let mut state = self.state.lock().await;

        if !state.recipes.contains_key(&id) {
            return Ok(false);
        }
        if let Some(cooking_time) = changes.cooking_time {
            State::check_cooking_time(cooking_time)?;
        }
        if let Some(tags) = &changes.tags {
            state.check_tags(tags)?;
        }
        if let Some(parts) = &changes.parts {
            state.check_parts(parts)?;
        }

        let Some(stored) = state.recipes.get_mut(&id) else {
            return Ok(false);
        };
        if let Some(name) = &changes.name {
            stored.recipe.name = name.to_owned();
        }
        if let Some(text) = &changes.text {
            stored.recipe.text = text.to_owned();
        }
        if let Some(cooking_time) = changes.cooking_time {
            stored.recipe.cooking_time = cooking_time;
        }
        if let Some(image) = &changes.image {
            stored.recipe.image = Some(image.to_owned());
        }
        if let Some(tags) = &changes.tags {
            stored.tags = tags.to_owned();
        }
        if let Some(parts) = &changes.parts {
            stored.parts = parts.to_owned();
        }

        Ok(true)
    }

    async fn delete_recipe(&self, id: Id) -> Result<bool, CatalogError> {
        let mut state = self.state.lock().await;

        if state.recipes.remove(&id).is_none() {
            return Ok(false);
        }
        state.relations.retain(|(kind, _, target)| {
            *kind == RelationKind::Subscription || *target != id
        });

        Ok(true)
    }

    async fn get_recipe(&self, id: Id) -> Result<Option<Recipe>, CatalogError> {
        Ok(self
            .state
            .lock()
            .await
            .recipes
            .get(&id)
            .map(|stored| stored.recipe.clone()))
    }

    async fn list_recipes(&self, filter: &RecipeFilter) -> Result<Vec<Recipe>, CatalogError> {
        let state = self.state.lock().await;
        let limit = filter
            .limit
            .map(|limit| usize::try_from(limit).unwrap_or(0))
            .unwrap_or(usize::MAX);

        Ok(state
            .recipes
            .values()
            .rev()
            .filter(|stored| state.matches(stored, filter))
            .take(limit)
            .map(|stored| stored.recipe.clone())
            .collect())
    }

    async fn count_recipes(&self, author: Id) -> Result<i64, CatalogError> {
        let state = self.state.lock().await;
        let count = state
            .recipes
            .values()
            .filter(|stored| stored.recipe.author_id == author)
            .count();

        Ok(count as i64)
    }

    async fn list_recipe_tags(&self, recipe_id: Id) -> Result<Vec<Tag>, CatalogError> {
        let state = self.state.lock().await;
        let mut tags: Vec<Tag> = match state.recipes.get(&recipe_id) {
            Some(stored) => stored
                .tags
                .iter()
                .filter_map(|id| state.tags.get(id).cloned())
                .collect(),
            None => vec![],
        };
        tags.sort_by_key(|tag| tag.id);

        Ok(tags)
    }

    async fn list_recipe_parts(&self, recipe_id: Id) -> Result<Vec<RecipePart>, CatalogError> {
        let state = self.state.lock().await;
        Ok(state
            .recipes
            .get(&recipe_id)
            .map(|stored| state.parts_of(stored))
            .unwrap_or_default())
    }

    async fn insert_relation(
        &self,
        kind: RelationKind,
        user_id: Id,
        target_id: Id,
    ) -> Result<bool, CatalogError> {
        let mut state = self.state.lock().await;

        if kind == RelationKind::Subscription && user_id == target_id {
            return Err(CatalogError::invalid(
                "constraint",
                "user_id and author_id must differ",
            ));
        }
        if !state.users.contains_key(&user_id) || !state.relation_target_exists(kind, target_id) {
            return Err(missing_reference());
        }

        Ok(state.relations.insert((kind, user_id, target_id)))
    }

    async fn delete_relation(
        &self,
        kind: RelationKind,
        user_id: Id,
        target_id: Id,
    ) -> Result<bool, CatalogError> {
        Ok(self
            .state
            .lock()
            .await
            .relations
            .remove(&(kind, user_id, target_id)))
    }

    async fn relation_exists(
        &self,
        kind: RelationKind,
        user_id: Id,
        target_id: Id,
    ) -> Result<bool, CatalogError> {
        Ok(self
            .state
            .lock()
            .await
            .relations
            .contains(&(kind, user_id, target_id)))
    }

    async fn list_relation_targets(
        &self,
        kind: RelationKind,
        user_id: Id,
    ) -> Result<Vec<Id>, CatalogError> {
        let state = self.state.lock().await;
        Ok(state
            .relations
            .range((kind, user_id, Id::MIN)..=(kind, user_id, Id::MAX))
            .map(|(_, _, target)| *target)
            .collect())
    }

    async fn list_cart_parts(&self, user_id: Id) -> Result<Vec<RecipePart>, CatalogError> {
        let state = self.state.lock().await;
        let kind = RelationKind::ShoppingCart;

        Ok(state
            .relations
            .range((kind, user_id, Id::MIN)..=(kind, user_id, Id::MAX))
            .filter_map(|(_, _, recipe_id)| state.recipes.get(recipe_id))
            .flat_map(|stored| state.parts_of(stored))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::UserRole;

    async fn seeded() -> (MemoryStore, User, Tag, Ingredient) {
        let store = MemoryStore::new();
        let user = store
            .insert_user(NewUser {
                email: String::from("cook@example.com"),
                username: String::from("cook"),
                first_name: String::from("Ada"),
                last_name: String::from("Cook"),
                role: UserRole::User,
            })
            .await
            .unwrap();
        let tag = store
            .insert_tag(&NewTag {
                name: String::from("Breakfast"),
                color: Some(String::from("#E26C2D")),
                slug: String::from("breakfast"),
            })
            .await
            .unwrap();
        let ingredient = store
            .insert_ingredient(&NewIngredient {
                name: String::from("Salt"),
                measurement_unit: String::from("g"),
            })
            .await
            .unwrap();

        (store, user, tag, ingredient)
    }

    fn new_recipe(author: Id, tag: Id, ingredient: Id) -> NewRecipe {
        NewRecipe {
            author_id: author,
            name: String::from("Porridge"),
            text: String::from("Stir"),
            cooking_time: 5,
            image: None,
            tags: vec![tag],
            parts: vec![AmountInput {
                id: ingredient,
                amount: 3,
            }],
        }
    }

    #[tokio::test]
    async fn rejected_insert_writes_nothing() {
        let (store, user, tag, ingredient) = seeded().await;
        let mut recipe = new_recipe(user.id, tag.id, ingredient.id);
        recipe.parts.push(AmountInput {
            id: ingredient.id,
            amount: 1,
        });

        let error = store.insert_recipe(&recipe).await.unwrap_err();
        assert!(matches!(error, CatalogError::Conflict(_)));
        assert!(store.list_recipes(&RecipeFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejected_update_keeps_previous_rows() {
        let (store, user, tag, ingredient) = seeded().await;
        let id = store
            .insert_recipe(&new_recipe(user.id, tag.id, ingredient.id))
            .await
            .unwrap();

        let changes = RecipeChanges {
            name: Some(String::from("Renamed")),
            tags: Some(vec![999]),
            ..Default::default()
        };
        assert!(store.update_recipe(id, &changes).await.is_err());

        let recipe = store.get_recipe(id).await.unwrap().unwrap();
        assert_eq!(recipe.name, "Porridge");
        assert_eq!(store.list_recipe_tags(id).await.unwrap(), vec![tag]);
    }

    #[tokio::test]
    async fn referenced_ingredient_is_protected() {
        let (store, user, tag, ingredient) = seeded().await;
        store
            .insert_recipe(&new_recipe(user.id, tag.id, ingredient.id))
            .await
            .unwrap();

        let error = store.delete_ingredient(ingredient.id).await.unwrap_err();
        assert!(matches!(error, CatalogError::Conflict(_)));
        assert!(store.get_ingredient(ingredient.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn recipe_delete_cascades_to_relations() {
        let (store, user, tag, ingredient) = seeded().await;
        let id = store
            .insert_recipe(&new_recipe(user.id, tag.id, ingredient.id))
            .await
            .unwrap();
        store
            .insert_relation(RelationKind::Favorite, user.id, id)
            .await
            .unwrap();
        store
            .insert_relation(RelationKind::ShoppingCart, user.id, id)
            .await
            .unwrap();

        assert!(store.delete_recipe(id).await.unwrap());
        assert!(!store
            .relation_exists(RelationKind::Favorite, user.id, id)
            .await
            .unwrap());
        assert!(store.list_cart_parts(user.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_relation_is_not_inserted_twice() {
        let (store, user, tag, ingredient) = seeded().await;
        let id = store
            .insert_recipe(&new_recipe(user.id, tag.id, ingredient.id))
            .await
            .unwrap();

        assert!(store
            .insert_relation(RelationKind::Favorite, user.id, id)
            .await
            .unwrap());
        assert!(!store
            .insert_relation(RelationKind::Favorite, user.id, id)
            .await
            .unwrap());
        assert_eq!(
            store
                .list_relation_targets(RelationKind::Favorite, user.id)
                .await
                .unwrap(),
            vec![id]
        );
    }

    #[tokio::test]
    async fn self_subscription_violates_check() {
        let (store, user, _, _) = seeded().await;
        let error = store
            .insert_relation(RelationKind::Subscription, user.id, user.id)
            .await
            .unwrap_err();
        assert!(matches!(error, CatalogError::Validation(_)));
    }
}
