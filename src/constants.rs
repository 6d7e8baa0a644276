pub const RECIPE_NAME_MAX_LENGTH: usize = 200;
pub const TAG_NAME_MAX_LENGTH: usize = 200;
pub const TAG_SLUG_MAX_LENGTH: usize = 200;
pub const INGREDIENT_NAME_MAX_LENGTH: usize = 200;
pub const MEASUREMENT_UNIT_MAX_LENGTH: usize = 10;

pub const MIN_COOKING_TIME: i32 = 1;
pub const MIN_AMOUNT: i32 = 1;

pub const RECIPES_LIMIT_PARAM: &str = "recipes_limit";
pub const AUTHOR_PARAM: &str = "author";
pub const TAGS_PARAM: &str = "tags";
pub const IS_FAVORITED_PARAM: &str = "is_favorited";
pub const IS_IN_SHOPPING_CART_PARAM: &str = "is_in_shopping_cart";

pub const SHOPPING_LIST_HEADER: &str = "Shopping list";
pub const SHOPPING_LIST_FILENAME: &str = "shopping_list.txt";
pub const SHOPPING_LIST_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

pub const SESSION_COOKIE: &str = "session";
