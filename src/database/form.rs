use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::{AUTHOR_PARAM, IS_FAVORITED_PARAM, IS_IN_SHOPPING_CART_PARAM, TAGS_PARAM};

use super::{error::CatalogError, schema::Id};

pub type FormData = HashMap<String, Value>;

/// Query parameters as handed over by the HTTP layer.
pub struct Form {
    inner: HashMap<String, Value>,
}

impl Form {
    pub fn from_data(data: FormData) -> Self {
        Self { inner: data }
    }

    pub fn get_str(&self, key: &str) -> Option<String> {
        self.inner
            .get(key)
            .and_then(|value| value.as_str())
            .map(|value| value.to_string())
    }

    /// Reads an optional positive limit such as `recipes_limit`.
    ///
    /// A missing or blank value means "no limit". Anything else has to be a
    /// plain integer of at least 1; `"3,"` or `"2.5"` are rejected.
    pub fn get_limit(&self, key: &str) -> Result<Option<i64>, CatalogError> {
        match self.inner.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(number)) => match number.as_i64() {
                Some(limit) => check_limit(key, limit).map(Some),
                None => Err(CatalogError::invalid(key, "Must be an integer")),
            },
            Some(Value::String(raw)) => parse_limit(key, raw),
            Some(_) => Err(CatalogError::invalid(key, "Must be an integer")),
        }
    }

    pub fn get_id(&self, key: &str) -> Result<Option<Id>, CatalogError> {
        let raw = match self.inner.get(key) {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::Number(number)) => number.to_string(),
            Some(Value::String(raw)) => raw.to_owned(),
            Some(_) => return Err(CatalogError::invalid(key, "Must be an id")),
        };

        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        raw.parse::<Id>()
            .map(Some)
            .map_err(|_e| CatalogError::invalid(key, "Must be an id"))
    }

    /// Either a list of strings or one comma separated string. Blank entries are dropped.
    pub fn get_list(&self, key: &str) -> Vec<String> {
        let values: Vec<String> = match self.inner.get(key) {
            Some(Value::Array(values)) => values
                .iter()
                .filter_map(|value| value.as_str())
                .map(|value| value.to_string())
                .collect(),
            _ => self
                .get_str(key)
                .map(|raw| raw.split(',').map(|value| value.to_string()).collect())
                .unwrap_or_default(),
        };

        values
            .into_iter()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .collect()
    }

    /// Missing means `false`. Accepts booleans, `0`/`1` and `true`/`false`.
    pub fn get_flag(&self, key: &str) -> Result<bool, CatalogError> {
        let raw = match self.inner.get(key) {
            None | Some(Value::Null) => return Ok(false),
            Some(Value::Bool(flag)) => return Ok(*flag),
            Some(Value::Number(number)) => number.to_string(),
            Some(Value::String(raw)) => raw.to_owned(),
            Some(_) => return Err(CatalogError::invalid(key, "Must be a boolean")),
        };

        match raw.trim().to_lowercase().as_str() {
            "" | "0" | "false" => Ok(false),
            "1" | "true" => Ok(true),
            _ => Err(CatalogError::invalid(key, "Must be a boolean")),
        }
    }

    pub fn get_recipe_query(&self) -> Result<RecipeQuery, CatalogError> {
        Ok(RecipeQuery {
            author: self.get_id(AUTHOR_PARAM)?,
            tags: self.get_list(TAGS_PARAM),
            is_favorited: self.get_flag(IS_FAVORITED_PARAM)?,
            is_in_shopping_cart: self.get_flag(IS_IN_SHOPPING_CART_PARAM)?,
        })
    }
}

pub fn parse_limit(key: &str, raw: &str) -> Result<Option<i64>, CatalogError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    let limit = raw
        .parse::<i64>()
        .map_err(|_e| CatalogError::invalid(key, "Must be an integer"))?;

    check_limit(key, limit).map(Some)
}

pub fn check_limit(key: &str, limit: i64) -> Result<i64, CatalogError> {
    if limit < 1 {
        return Err(CatalogError::invalid(key, "Must be greater than 0"));
    }
    Ok(limit)
}

/// Filters of a recipe listing. The two flags only apply to a signed-in viewer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RecipeQuery {
    #[serde(default)]
    pub author: Option<Id>,
    /// Tag slugs; a recipe matches when it carries any of them.
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_favorited: bool,
    #[serde(default)]
    pub is_in_shopping_cart: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountInput {
    /// Ingredient id.
    pub id: Id,
    pub amount: i32,
}

/// Body of a recipe creation request.
#[derive(Debug, Clone, Deserialize)]
pub struct RecipeDraft {
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub tags: Vec<Id>,
    #[serde(default)]
    pub ingredients: Vec<AmountInput>,
}

/// Body of a partial recipe update. `None` leaves the stored value alone,
/// `Some` collections replace the stored ones.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecipePatch {
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i32>,
    pub image: Option<String>,
    pub tags: Option<Vec<Id>>,
    pub ingredients: Option<Vec<AmountInput>>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn form(pairs: &[(&str, Value)]) -> Form {
        Form::from_data(
            pairs
                .iter()
                .map(|(key, value)| (key.to_string(), value.clone()))
                .collect(),
        )
    }

    #[test]
    fn missing_or_blank_limit_means_unlimited() {
        assert_eq!(form(&[]).get_limit("recipes_limit").unwrap(), None);
        assert_eq!(
            form(&[("recipes_limit", json!("  "))])
                .get_limit("recipes_limit")
                .unwrap(),
            None
        );
    }

    #[test]
    fn limit_accepts_strings_and_numbers() {
        assert_eq!(
            form(&[("recipes_limit", json!("3"))])
                .get_limit("recipes_limit")
                .unwrap(),
            Some(3)
        );
        assert_eq!(
            form(&[("recipes_limit", json!(2))])
                .get_limit("recipes_limit")
                .unwrap(),
            Some(2)
        );
    }

    #[test]
    fn trailing_comma_is_rejected() {
        let error = form(&[("recipes_limit", json!("3,"))])
            .get_limit("recipes_limit")
            .unwrap_err();
        assert!(error.field_errors().unwrap().contains("recipes_limit"));
    }

    #[test]
    fn non_positive_limit_is_rejected() {
        for raw in ["0", "-4"] {
            let error = parse_limit("recipes_limit", raw).unwrap_err();
            assert!(matches!(error, CatalogError::Validation(_)));
        }
    }

    #[test]
    fn recipe_query_reads_every_filter() {
        let query = form(&[
            ("author", json!("4")),
            ("tags", json!("breakfast, dinner,")),
            ("is_favorited", json!("1")),
            ("is_in_shopping_cart", json!(false)),
        ])
        .get_recipe_query()
        .unwrap();

        assert_eq!(
            query,
            RecipeQuery {
                author: Some(4),
                tags: vec![String::from("breakfast"), String::from("dinner")],
                is_favorited: true,
                is_in_shopping_cart: false,
            }
        );
    }

    #[test]
    fn tags_may_be_repeated_values() {
        let tags = form(&[("tags", json!(["lunch", " ", "dinner"]))]).get_list("tags");
        assert_eq!(tags, vec![String::from("lunch"), String::from("dinner")]);
    }

    #[test]
    fn empty_query_filters_nothing() {
        assert_eq!(form(&[]).get_recipe_query().unwrap(), RecipeQuery::default());
    }

    #[test]
    fn malformed_filters_are_rejected() {
        let error = form(&[("is_favorited", json!("maybe"))])
            .get_recipe_query()
            .unwrap_err();
        assert!(error.field_errors().unwrap().contains("is_favorited"));

        let error = form(&[("author", json!("me"))])
            .get_recipe_query()
            .unwrap_err();
        assert!(error.field_errors().unwrap().contains("author"));
    }

    #[test]
    fn patch_fields_default_to_untouched() {
        let patch: RecipePatch = serde_json::from_value(json!({ "name": "Soup" })).unwrap();
        assert_eq!(patch.name.as_deref(), Some("Soup"));
        assert!(patch.tags.is_none());
        assert!(patch.ingredients.is_none());
    }

    #[test]
    fn draft_collections_default_to_empty() {
        let draft: RecipeDraft = serde_json::from_value(json!({
            "name": "Soup",
            "text": "Boil",
            "cooking_time": 10,
        }))
        .unwrap();
        assert!(draft.tags.is_empty());
        assert!(draft.ingredients.is_empty());
    }
}
