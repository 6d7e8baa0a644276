use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgConnection, Pool, Postgres, QueryBuilder};

use crate::{
    config::Config,
    error::{CatalogError, QueryError},
    form::AmountInput,
    schema::{Id, Ingredient, NewIngredient, NewTag, Recipe, RecipePart, RelationKind, Tag, User},
    store::{CatalogStore, NewRecipe, RecipeChanges, RecipeFilter},
};

const RECIPE_COLUMNS: &str = "id, author_id, name, text, cooking_time, image";

/// PostgreSQL backed catalog.
#[derive(Clone)]
pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &Config) -> Result<Self, CatalogError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await?;

        log::info!(
            "> Connected to database (max {} connections)",
            config.max_connections
        );
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<(), CatalogError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| QueryError::from(sqlx::Error::from(e)))?;

        log::info!("> Migrations applied");
        Ok(())
    }
}

async fn insert_tags(
    conn: &mut PgConnection,
    recipe_id: Id,
    tags: &[Id],
) -> Result<(), CatalogError> {
    if tags.is_empty() {
        return Ok(());
    }

    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_tags_map (recipe_id, tag_id) ");
    builder.push_values(tags, |mut row, tag_id| {
        row.push_bind(recipe_id).push_bind(*tag_id);
    });
    builder.build().execute(&mut *conn).await?;

    Ok(())
}

async fn insert_parts(
    conn: &mut PgConnection,
    recipe_id: Id,
    parts: &[AmountInput],
) -> Result<(), CatalogError> {
    if parts.is_empty() {
        return Ok(());
    }

    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_parts (recipe_id, ingredient_id, amount) ");
    builder.push_values(parts, |mut row, part| {
        row.push_bind(recipe_id)
            .push_bind(part.id)
            .push_bind(part.amount);
    });
    builder.build().execute(&mut *conn).await?;

    Ok(())
}

fn missing_ids(requested: &[Id], found: Vec<(Id,)>) -> Vec<Id> {
    let found: HashSet<Id> = found.into_iter().map(|row| row.0).collect();
    requested
        .iter()
        .copied()
        .filter(|id| !found.contains(id))
        .collect()
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn get_user(&self, id: Id) -> Result<Option<User>, CatalogError> {
        let row: Option<User> = sqlx::query_as(
            "SELECT id, email, username, first_name, last_name, role FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, CatalogError> {
        let rows: Vec<Tag> = sqlx::query_as("SELECT id, name, color, slug FROM tags ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    async fn get_tag(&self, id: Id) -> Result<Option<Tag>, CatalogError> {
        let row: Option<Tag> = sqlx::query_as("SELECT id, name, color, slug FROM tags WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    async fn insert_tag(&self, tag: &NewTag) -> Result<Tag, CatalogError> {
        let row: Tag = sqlx::query_as(
            "INSERT INTO tags (name, color, slug) VALUES ($1, $2, $3) RETURNING id, name, color, slug",
        )
        .bind(&tag.name)
        .bind(tag.color.as_deref())
        .bind(&tag.slug)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn find_missing_tags(&self, ids: &[Id]) -> Result<Vec<Id>, CatalogError> {
        let found: Vec<(Id,)> = sqlx::query_as("SELECT id FROM tags WHERE id = ANY($1)")
            .bind(ids.to_vec())
            .fetch_all(&self.pool)
            .await?;

        Ok(missing_ids(ids, found))
    }

    async fn list_ingredients(&self) -> Result<Vec<Ingredient>, CatalogError> {
        let rows: Vec<Ingredient> =
            sqlx::query_as("SELECT id, name, measurement_unit FROM ingredients ORDER BY name, id")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows)
    }

    async fn get_ingredient(&self, id: Id) -> Result<Option<Ingredient>, CatalogError> {
        let row: Option<Ingredient> =
            sqlx::query_as("SELECT id, name, measurement_unit FROM ingredients WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row)
    }

    async fn insert_ingredient(
        &self,
        ingredient: &NewIngredient,
    ) -> Result<Ingredient, CatalogError> {
        let row: Ingredient = sqlx::query_as(
            "INSERT INTO ingredients (name, measurement_unit) VALUES ($1, $2) RETURNING id, name, measurement_unit",
        )
        .bind(&ingredient.name)
        .bind(&ingredient.measurement_unit)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn find_missing_ingredients(&self, ids: &[Id]) -> Result<Vec<Id>, CatalogError> {
        let found: Vec<(Id,)> = sqlx::query_as("SELECT id FROM ingredients WHERE id = ANY($1)")
            .bind(ids.to_vec())
            .fetch_all(&self.pool)
            .await?;

        Ok(missing_ids(ids, found))
    }

    async fn delete_ingredient(&self, id: Id) -> Result<bool, CatalogError> {
        let result = sqlx::query("DELETE FROM ingredients WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| match CatalogError::from(e) {
                CatalogError::Conflict(_) => {
                    CatalogError::Conflict(String::from("Ingredient is still used by a recipe"))
                }
                other => other,
            })?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_recipe(&self, recipe: &NewRecipe) -> Result<Id, CatalogError> {
        let mut tr = self.pool.begin().await?;

        let id: (Id,) = sqlx::query_as(
            "
            INSERT INTO recipes (author_id, name, text, cooking_time, image)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
        ",
        )
        .bind(recipe.author_id)
        .bind(&recipe.name)
        .bind(&recipe.text)
        .bind(recipe.cooking_time)
        .bind(recipe.image.as_deref())
        .fetch_one(&mut *tr)
        .await?;

        insert_tags(&mut *tr, id.0, &recipe.tags).await?;
        insert_parts(&mut *tr, id.0, &recipe.parts).await?;

        tr.commit().await?;
        Ok(id.0)
    }

    async fn update_recipe(&self, id: Id, changes: &RecipeChanges) -> Result<bool, CatalogError> {
        let mut tr = self.pool.begin().await?;

        let result = sqlx::query(
            "
            UPDATE recipes SET
            name = COALESCE($1, name),
            text = COALESCE($2, text),
            cooking_time = COALESCE($3, cooking_time),
            image = COALESCE($4, image)
            WHERE id = $5
        ",
        )
        .bind(changes.name.as_deref())
        .bind(changes.text.as_deref())
        .bind(changes.cooking_time)
        .bind(changes.image.as_deref())
        .bind(id)
        .execute(&mut *tr)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        if let Some(tags) = &changes.tags {
            sqlx::query("DELETE FROM recipe_tags_map WHERE recipe_id = $1")
                .bind(id)
                .execute(&mut *tr)
                .await?;
            insert_tags(&mut *tr, id, tags).await?;
        }

        if let Some(parts) = &changes.parts {
            sqlx::query("DELETE FROM recipe_parts WHERE recipe_id = $1")
                .bind(id)
                .execute(&mut *tr)
                .await?;
            insert_parts(&mut *tr, id, parts).await?;
        }

        tr.commit().await?;
        Ok(true)
    }

    async fn delete_recipe(&self, id: Id) -> Result<bool, CatalogError> {
        // lines, tag links, favorites and cart entries go with it (ON DELETE CASCADE)
        let result = sqlx::query("DELETE FROM recipes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_recipe(&self, id: Id) -> Result<Option<Recipe>, CatalogError> {
        let row: Option<Recipe> =
            sqlx::query_as(&format!("SELECT {RECIPE_COLUMNS} FROM recipes WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row)
    }

    async fn list_recipes(&self, filter: &RecipeFilter) -> Result<Vec<Recipe>, CatalogError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {RECIPE_COLUMNS} FROM recipes WHERE TRUE"));

        if let Some(author) = filter.author {
            builder.push(" AND author_id = ").push_bind(author);
        }
        if !filter.tag_slugs.is_empty() {
            builder
                .push(
                    " AND EXISTS (SELECT 1 FROM recipe_tags_map m \
                     INNER JOIN tags t ON t.id = m.tag_id \
                     WHERE m.recipe_id = recipes.id AND t.slug = ANY(",
                )
                .push_bind(filter.tag_slugs.clone())
                .push("))");
        }
        if let Some(user_id) = filter.favorited_by {
            builder
                .push(
                    " AND EXISTS (SELECT 1 FROM favorites f \
                     WHERE f.recipe_id = recipes.id AND f.user_id = ",
                )
                .push_bind(user_id)
                .push(")");
        }
        if let Some(user_id) = filter.in_cart_of {
            builder
                .push(
                    " AND EXISTS (SELECT 1 FROM shopping_cart c \
                     WHERE c.recipe_id = recipes.id AND c.user_id = ",
                )
                .push_bind(user_id)
                .push(")");
        }

        builder.push(" ORDER BY id DESC");
        if let Some(limit) = filter.limit {
            builder.push(" LIMIT ").push_bind(limit);
        }

        let rows: Vec<Recipe> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    async fn count_recipes(&self, author: Id) -> Result<i64, CatalogError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM recipes WHERE author_id = $1")
            .bind(author)
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }

    async fn list_recipe_tags(&self, recipe_id: Id) -> Result<Vec<Tag>, CatalogError> {
        let rows: Vec<Tag> = sqlx::query_as(
            "
            SELECT t.id, t.name, t.color, t.slug
            FROM recipe_tags_map m
            INNER JOIN tags t ON t.id = m.tag_id
            WHERE m.recipe_id = $1
            ORDER BY t.id
        ",
        )
        .bind(recipe_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn list_recipe_parts(&self, recipe_id: Id) -> Result<Vec<RecipePart>, CatalogError> {
        let rows: Vec<RecipePart> = sqlx::query_as(
            "
            SELECT rp.recipe_id, rp.ingredient_id, i.name, i.measurement_unit, rp.amount
            FROM recipe_parts rp
            INNER JOIN ingredients i ON i.id = rp.ingredient_id
            WHERE rp.recipe_id = $1
            ORDER BY rp.id
        ",
        )
        .bind(recipe_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn insert_relation(
        &self,
        kind: RelationKind,
        user_id: Id,
        target_id: Id,
    ) -> Result<bool, CatalogError> {
        let result = sqlx::query(&format!(
            "INSERT INTO {} (user_id, {}) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            kind.table(),
            kind.target_column()
        ))
        .bind(user_id)
        .bind(target_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_relation(
        &self,
        kind: RelationKind,
        user_id: Id,
        target_id: Id,
    ) -> Result<bool, CatalogError> {
        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE user_id = $1 AND {} = $2",
            kind.table(),
            kind.target_column()
        ))
        .bind(user_id)
        .bind(target_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn relation_exists(
        &self,
        kind: RelationKind,
        user_id: Id,
        target_id: Id,
    ) -> Result<bool, CatalogError> {
        let row: Option<(i32,)> = sqlx::query_as(&format!(
            "SELECT 1 FROM {} WHERE user_id = $1 AND {} = $2",
            kind.table(),
            kind.target_column()
        ))
        .bind(user_id)
        .bind(target_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.is_some())
    }

    async fn list_relation_targets(
        &self,
        kind: RelationKind,
        user_id: Id,
    ) -> Result<Vec<Id>, CatalogError> {
        let target = kind.target_column();
        let rows: Vec<(Id,)> = sqlx::query_as(&format!(
            "SELECT {target} FROM {} WHERE user_id = $1 ORDER BY {target}",
            kind.table()
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|row| row.0).collect())
    }

    async fn list_cart_parts(&self, user_id: Id) -> Result<Vec<RecipePart>, CatalogError> {
        let rows: Vec<RecipePart> = sqlx::query_as(
            "
            SELECT rp.recipe_id, rp.ingredient_id, i.name, i.measurement_unit, rp.amount
            FROM shopping_cart c
            INNER JOIN recipe_parts rp ON rp.recipe_id = c.recipe_id
            INNER JOIN ingredients i ON i.id = rp.ingredient_id
            WHERE c.user_id = $1
            ORDER BY rp.recipe_id, rp.id
        ",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
