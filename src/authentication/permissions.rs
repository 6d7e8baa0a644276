use crate::{jwt::SessionData, schema::Recipe, schema::UserRole};

const ACTION_TABLE: &[(UserRole, &[ActionType])] = &[
    (
        UserRole::User,
        &[
            ActionType::CreateRecipes,
            ActionType::ManageOwnRecipes,
            ActionType::ManageOwnFavorites,
            ActionType::ManageOwnShoppingCart,
            ActionType::ManageOwnSubscriptions,
        ],
    ),
    (
        UserRole::Staff,
        &[
            ActionType::CreateRecipes,
            ActionType::ManageOwnRecipes,
            ActionType::ManageOwnFavorites,
            ActionType::ManageOwnShoppingCart,
            ActionType::ManageOwnSubscriptions,
            ActionType::ManageAllRecipes,
            ActionType::ManageCatalog,
        ],
    ),
    (
        UserRole::Admin,
        &[
            ActionType::CreateRecipes,
            ActionType::ManageOwnRecipes,
            ActionType::ManageOwnFavorites,
            ActionType::ManageOwnShoppingCart,
            ActionType::ManageOwnSubscriptions,
            ActionType::ManageAllRecipes,
            ActionType::ManageCatalog,
        ],
    ),
];

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum ActionType {
    CreateRecipes,

    ManageOwnRecipes,
    ManageOwnFavorites,
    ManageOwnShoppingCart,
    ManageOwnSubscriptions,

    ManageAllRecipes,
    ManageCatalog,
}

impl ActionType {
    pub fn authenticate(self, session: &SessionData) -> bool {
        let user_role = &session.user_role;

        ACTION_TABLE
            .iter()
            .find_map(|(role, actions)| {
                if user_role != role {
                    return None;
                }

                Some(actions.contains(&self))
            })
            .unwrap_or(false)
    }
}

/// Whether `actor` may modify or delete `recipe`. Anonymous actors never can.
pub fn can_write(actor: Option<&SessionData>, recipe: &Recipe) -> bool {
    match actor {
        Some(session) => {
            ActionType::ManageAllRecipes.authenticate(session)
                || (recipe.author_id == session.user_id
                    && ActionType::ManageOwnRecipes.authenticate(session))
        }
        None => false,
    }
}

/// Reads are unrestricted.
pub fn can_read(_actor: Option<&SessionData>, _recipe: &Recipe) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(user_id: i32, role: UserRole) -> SessionData {
        SessionData {
            user_id,
            username: format!("user{user_id}"),
            is_elevated: role.is_elevated(),
            user_role: role,
        }
    }

    fn recipe(author_id: i32) -> Recipe {
        Recipe {
            id: 1,
            author_id,
            name: String::from("Soup"),
            text: String::from("Boil"),
            cooking_time: 10,
            image: None,
        }
    }

    #[test]
    fn author_can_write_own_recipe() {
        assert!(can_write(Some(&session(7, UserRole::User)), &recipe(7)));
    }

    #[test]
    fn other_user_cannot_write() {
        assert!(!can_write(Some(&session(8, UserRole::User)), &recipe(7)));
    }

    #[test]
    fn anonymous_cannot_write_but_can_read() {
        assert!(!can_write(None, &recipe(7)));
        assert!(can_read(None, &recipe(7)));
    }

    #[test]
    fn elevated_roles_can_write_any_recipe() {
        assert!(can_write(Some(&session(8, UserRole::Staff)), &recipe(7)));
        assert!(can_write(Some(&session(9, UserRole::Admin)), &recipe(7)));
    }

    #[test]
    fn only_elevated_roles_manage_catalog() {
        assert!(!ActionType::ManageCatalog.authenticate(&session(1, UserRole::User)));
        assert!(ActionType::ManageCatalog.authenticate(&session(1, UserRole::Staff)));
    }
}
