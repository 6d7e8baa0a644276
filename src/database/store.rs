use async_trait::async_trait;

use super::{
    error::CatalogError,
    form::AmountInput,
    schema::{Id, Ingredient, NewIngredient, NewTag, Recipe, RecipePart, RelationKind, Tag, User},
};

/// A recipe ready to be persisted. Built by the recipe actions after validation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecipe {
    pub author_id: Id,
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
    pub image: Option<String>,
    pub tags: Vec<Id>,
    pub parts: Vec<AmountInput>,
}

/// Validated changes to a stored recipe. `None` leaves the stored value untouched,
/// `Some` collections replace the stored ones wholesale.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeChanges {
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i32>,
    pub image: Option<String>,
    pub tags: Option<Vec<Id>>,
    pub parts: Option<Vec<AmountInput>>,
}

/// Row filters of a recipe listing, already resolved against the viewer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeFilter {
    pub author: Option<Id>,
    /// Matches recipes carrying any of these tag slugs. Empty means no tag filter.
    pub tag_slugs: Vec<String>,
    pub favorited_by: Option<Id>,
    pub in_cart_of: Option<Id>,
    pub limit: Option<i64>,
}

impl RecipeFilter {
    pub fn by_author(author: Id, limit: Option<i64>) -> Self {
        Self {
            author: Some(author),
            limit,
            ..Default::default()
        }
    }
}

/// Persistence seam of the catalog.
///
/// Every mutating method is a single all-or-nothing unit: either every row it
/// touches is written or none is. Uniqueness, check and reference constraints
/// are enforced here and reported as `CatalogError::Conflict` (unique or
/// reference violations) or `CatalogError::Validation` (check violations).
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn get_user(&self, id: Id) -> Result<Option<User>, CatalogError>;

    async fn list_tags(&self) -> Result<Vec<Tag>, CatalogError>;

    async fn get_tag(&self, id: Id) -> Result<Option<Tag>, CatalogError>;

    async fn insert_tag(&self, tag: &NewTag) -> Result<Tag, CatalogError>;

    /// Returns the ids from `ids` that don't name a stored tag.
    async fn find_missing_tags(&self, ids: &[Id]) -> Result<Vec<Id>, CatalogError>;

    async fn list_ingredients(&self) -> Result<Vec<Ingredient>, CatalogError>;

    async fn get_ingredient(&self, id: Id) -> Result<Option<Ingredient>, CatalogError>;

    async fn insert_ingredient(
        &self,
        ingredient: &NewIngredient,
    ) -> Result<Ingredient, CatalogError>;

    /// Returns the ids from `ids` that don't name a stored ingredient.
    async fn find_missing_ingredients(&self, ids: &[Id]) -> Result<Vec<Id>, CatalogError>;

    /// Fails with `Conflict` while any recipe still uses the ingredient.
    async fn delete_ingredient(&self, id: Id) -> Result<bool, CatalogError>;

    /// Writes the recipe row, its tag associations and its amount lines together.
    async fn insert_recipe(&self, recipe: &NewRecipe) -> Result<Id, CatalogError>;

    /// Returns `false` when the recipe doesn't exist; nothing is written then.
    async fn update_recipe(&self, id: Id, changes: &RecipeChanges) -> Result<bool, CatalogError>;

    /// Deletes the recipe together with its lines, favorites and cart entries.
    async fn delete_recipe(&self, id: Id) -> Result<bool, CatalogError>;

    async fn get_recipe(&self, id: Id) -> Result<Option<Recipe>, CatalogError>;

    /// Newest first, restricted by `filter` and capped at `filter.limit` rows.
    async fn list_recipes(&self, filter: &RecipeFilter) -> Result<Vec<Recipe>, CatalogError>;

    async fn count_recipes(&self, author: Id) -> Result<i64, CatalogError>;

    async fn list_recipe_tags(&self, recipe_id: Id) -> Result<Vec<Tag>, CatalogError>;

    /// Amount lines in insertion order.
    async fn list_recipe_parts(&self, recipe_id: Id) -> Result<Vec<RecipePart>, CatalogError>;

    /// Returns `false` if the pair already exists.
    async fn insert_relation(
        &self,
        kind: RelationKind,
        user_id: Id,
        target_id: Id,
    ) -> Result<bool, CatalogError>;

    /// Returns `false` if the pair doesn't exist.
    async fn delete_relation(
        &self,
        kind: RelationKind,
        user_id: Id,
        target_id: Id,
    ) -> Result<bool, CatalogError>;

    async fn relation_exists(
        &self,
        kind: RelationKind,
        user_id: Id,
        target_id: Id,
    ) -> Result<bool, CatalogError>;

    /// Target ids (recipes or authors) of a user's relations, ascending.
    async fn list_relation_targets(
        &self,
        kind: RelationKind,
        user_id: Id,
    ) -> Result<Vec<Id>, CatalogError>;

    /// Every amount line of every recipe in the user's shopping cart.
    async fn list_cart_parts(&self, user_id: Id) -> Result<Vec<RecipePart>, CatalogError>;
}
