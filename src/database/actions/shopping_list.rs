use std::collections::{btree_map::Entry, BTreeMap};

use crate::{
    authentication::permissions::ActionType,
    constants::{SHOPPING_LIST_CONTENT_TYPE, SHOPPING_LIST_FILENAME, SHOPPING_LIST_HEADER},
    error::CatalogError,
    jwt::SessionData,
    schema::{Id, RecipePart},
    store::CatalogStore,
    views::{ShoppingListExport, ShoppingListItem},
};

/// Sums amount lines per ingredient, ordered by ingredient id.
pub fn aggregate_parts(parts: Vec<RecipePart>) -> Vec<ShoppingListItem> {
    let mut items: BTreeMap<Id, ShoppingListItem> = BTreeMap::new();

    for part in parts {
        match items.entry(part.ingredient_id) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().total_amount += i64::from(part.amount);
            }
            Entry::Vacant(entry) => {
                entry.insert(ShoppingListItem {
                    ingredient_id: part.ingredient_id,
                    name: part.name,
                    measurement_unit: part.measurement_unit,
                    total_amount: i64::from(part.amount),
                });
            }
        }
    }

    items.into_values().collect()
}

pub fn render_shopping_list(items: &[ShoppingListItem]) -> String {
    let mut body = format!("{SHOPPING_LIST_HEADER}\n");
    for item in items {
        body.push_str(&format!(
            "{} - {} {}\n",
            item.name, item.total_amount, item.measurement_unit
        ));
    }
    body
}

pub async fn get_shopping_list(
    session: &SessionData,
    store: &dyn CatalogStore,
) -> Result<Vec<ShoppingListItem>, CatalogError> {
    session.authenticate(ActionType::ManageOwnShoppingCart)?;

    let parts = store.list_cart_parts(session.user_id).await?;
    Ok(aggregate_parts(parts))
}

pub async fn export_shopping_list(
    session: &SessionData,
    store: &dyn CatalogStore,
) -> Result<ShoppingListExport, CatalogError> {
    let items = get_shopping_list(session, store).await?;

    log::debug!(
        "> Exported shopping list of {} ({} items)",
        session.user_id,
        items.len()
    );

    Ok(ShoppingListExport {
        filename: SHOPPING_LIST_FILENAME.to_string(),
        content_type: SHOPPING_LIST_CONTENT_TYPE.to_string(),
        body: render_shopping_list(&items),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(recipe_id: Id, ingredient_id: Id, name: &str, unit: &str, amount: i32) -> RecipePart {
        RecipePart {
            recipe_id,
            ingredient_id,
            name: name.to_string(),
            measurement_unit: unit.to_string(),
            amount,
        }
    }

    #[test]
    fn amounts_are_summed_per_ingredient() {
        let items = aggregate_parts(vec![
            part(1, 5, "Sugar", "g", 100),
            part(1, 2, "Flour", "g", 200),
            part(2, 5, "Sugar", "g", 50),
        ]);

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].ingredient_id, 2);
        assert_eq!(items[0].total_amount, 200);
        assert_eq!(items[1].ingredient_id, 5);
        assert_eq!(items[1].total_amount, 150);
    }

    #[test]
    fn totals_do_not_overflow_i32() {
        let items = aggregate_parts(vec![
            part(1, 1, "Water", "ml", i32::MAX),
            part(2, 1, "Water", "ml", i32::MAX),
        ]);
        assert_eq!(items[0].total_amount, 2 * i64::from(i32::MAX));
    }

    #[test]
    fn empty_list_has_only_the_header() {
        assert_eq!(render_shopping_list(&[]), "Shopping list\n");
    }

    #[test]
    fn lines_follow_the_header() {
        let items = aggregate_parts(vec![part(1, 1, "Flour", "g", 300)]);
        assert_eq!(render_shopping_list(&items), "Shopping list\nFlour - 300 g\n");
    }
}
