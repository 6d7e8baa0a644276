use serde::Serialize;

use super::schema::{Id, Recipe, RecipePart, Tag, User};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProfile {
    pub id: Id,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

impl UserProfile {
    pub fn from_user(user: &User, is_subscribed: bool) -> Self {
        Self {
            id: user.id,
            email: user.email.to_owned(),
            username: user.username.to_owned(),
            first_name: user.first_name.to_owned(),
            last_name: user.last_name.to_owned(),
            is_subscribed,
        }
    }
}

/// Short recipe summary returned by relation toggles and subscription listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipeBrief {
    pub id: Id,
    pub name: String,
    pub image: Option<String>,
    pub cooking_time: i32,
}

impl From<&Recipe> for RecipeBrief {
    fn from(recipe: &Recipe) -> Self {
        Self {
            id: recipe.id,
            name: recipe.name.to_owned(),
            image: recipe.image.to_owned(),
            cooking_time: recipe.cooking_time,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipeIngredient {
    pub id: Id,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

impl From<RecipePart> for RecipeIngredient {
    fn from(part: RecipePart) -> Self {
        Self {
            id: part.ingredient_id,
            name: part.name,
            measurement_unit: part.measurement_unit,
            amount: part.amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipeView {
    pub id: Id,
    pub tags: Vec<Tag>,
    pub author: UserProfile,
    pub ingredients: Vec<RecipeIngredient>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: Option<String>,
    pub text: String,
    pub cooking_time: i32,
}

/// Viewer-relative flags of a recipe view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewerFlags {
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

impl RecipeView {
    pub fn assemble(
        recipe: Recipe,
        tags: Vec<Tag>,
        parts: Vec<RecipePart>,
        author: UserProfile,
        flags: ViewerFlags,
    ) -> Self {
        Self {
            id: recipe.id,
            tags,
            author,
            ingredients: parts.into_iter().map(RecipeIngredient::from).collect(),
            is_favorited: flags.is_favorited,
            is_in_shopping_cart: flags.is_in_shopping_cart,
            name: recipe.name,
            image: recipe.image,
            text: recipe.text,
            cooking_time: recipe.cooking_time,
        }
    }
}

/// An author as seen by one of their subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscriptionView {
    #[serde(flatten)]
    pub author: UserProfile,
    pub recipes: Vec<RecipeBrief>,
    pub recipes_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShoppingListItem {
    pub ingredient_id: Id,
    pub name: String,
    pub measurement_unit: String,
    pub total_amount: i64,
}

/// A downloadable plain-text attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShoppingListExport {
    pub filename: String,
    pub content_type: String,
    pub body: String,
}

impl ShoppingListExport {
    pub fn content_disposition(&self) -> String {
        format!("attachment; filename=\"{}\"", self.filename)
    }
}
