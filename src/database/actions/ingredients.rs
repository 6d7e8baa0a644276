use crate::{
    authentication::permissions::ActionType,
    constants::{INGREDIENT_NAME_MAX_LENGTH, MEASUREMENT_UNIT_MAX_LENGTH},
    error::{CatalogError, FieldErrors},
    jwt::SessionData,
    schema::{Id, Ingredient, NewIngredient},
    store::CatalogStore,
};

fn ingredient_not_found(id: Id) -> CatalogError {
    CatalogError::NotFound(format!("No ingredient exists with id {id}"))
}

fn validate_ingredient(ingredient: &NewIngredient) -> Result<(), CatalogError> {
    let mut errors = FieldErrors::new();

    if ingredient.name.trim().is_empty() {
        errors.add("name", "Name can't be empty");
    } else if ingredient.name.chars().count() > INGREDIENT_NAME_MAX_LENGTH {
        errors.add(
            "name",
            format!("Name can't be longer than {INGREDIENT_NAME_MAX_LENGTH} characters"),
        );
    }

    if ingredient.measurement_unit.trim().is_empty() {
        errors.add("measurement_unit", "Measurement unit can't be empty");
    } else if ingredient.measurement_unit.chars().count() > MEASUREMENT_UNIT_MAX_LENGTH {
        errors.add(
            "measurement_unit",
            format!("Measurement unit can't be longer than {MEASUREMENT_UNIT_MAX_LENGTH} characters"),
        );
    }

    errors.into_result()
}

pub async fn list_ingredients(store: &dyn CatalogStore) -> Result<Vec<Ingredient>, CatalogError> {
    store.list_ingredients().await
}

pub async fn get_ingredient(id: Id, store: &dyn CatalogStore) -> Result<Ingredient, CatalogError> {
    store
        .get_ingredient(id)
        .await?
        .ok_or_else(|| ingredient_not_found(id))
}

pub async fn create_ingredient(
    ingredient: NewIngredient,
    session: &SessionData,
    store: &dyn CatalogStore,
) -> Result<Ingredient, CatalogError> {
    session.authenticate(ActionType::ManageCatalog)?;
    validate_ingredient(&ingredient)?;

    let ingredient = store.insert_ingredient(&ingredient).await?;
    log::info!(
        "> Created ingredient {} ({}) by {}",
        ingredient.id,
        ingredient.name,
        session.user_id
    );

    Ok(ingredient)
}

/// Refused with `Conflict` while any recipe still uses the ingredient.
pub async fn delete_ingredient(
    id: Id,
    session: &SessionData,
    store: &dyn CatalogStore,
) -> Result<(), CatalogError> {
    session.authenticate(ActionType::ManageCatalog)?;

    if !store.delete_ingredient(id).await? {
        return Err(ingredient_not_found(id));
    }

    log::info!("> Deleted ingredient {id} by {}", session.user_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn units_are_short() {
        let ingredient = NewIngredient {
            name: String::from("Flour"),
            measurement_unit: String::from("tablespoons"),
        };
        let err = validate_ingredient(&ingredient).unwrap_err();
        assert!(err.field_errors().unwrap().contains("measurement_unit"));
    }

    #[test]
    fn plain_ingredient_is_valid() {
        let ingredient = NewIngredient {
            name: String::from("Flour"),
            measurement_unit: String::from("g"),
        };
        assert!(validate_ingredient(&ingredient).is_ok());
    }
}
