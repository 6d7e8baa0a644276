use crate::{
    authentication::permissions::ActionType,
    constants::{TAG_NAME_MAX_LENGTH, TAG_SLUG_MAX_LENGTH},
    error::{CatalogError, FieldErrors},
    jwt::SessionData,
    schema::{Id, NewTag, Tag},
    store::CatalogStore,
};

fn is_hex_color(color: &str) -> bool {
    color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit())
}

fn is_slug(slug: &str) -> bool {
    slug.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn validate_tag(tag: &NewTag) -> Result<(), CatalogError> {
    let mut errors = FieldErrors::new();

    if tag.name.trim().is_empty() {
        errors.add("name", "Name can't be empty");
    } else if tag.name.chars().count() > TAG_NAME_MAX_LENGTH {
        errors.add(
            "name",
            format!("Name can't be longer than {TAG_NAME_MAX_LENGTH} characters"),
        );
    }

    if tag.slug.is_empty() {
        errors.add("slug", "Slug can't be empty");
    } else if tag.slug.len() > TAG_SLUG_MAX_LENGTH {
        errors.add(
            "slug",
            format!("Slug can't be longer than {TAG_SLUG_MAX_LENGTH} characters"),
        );
    } else if !is_slug(&tag.slug) {
        errors.add(
            "slug",
            "Slug may only contain letters, digits, hyphens and underscores",
        );
    }

    if let Some(color) = &tag.color {
        if !is_hex_color(color) {
            errors.add("color", "Color must look like #RRGGBB");
        }
    }

    errors.into_result()
}

pub async fn list_tags(store: &dyn CatalogStore) -> Result<Vec<Tag>, CatalogError> {
    store.list_tags().await
}

pub async fn get_tag(id: Id, store: &dyn CatalogStore) -> Result<Tag, CatalogError> {
    store
        .get_tag(id)
        .await?
        .ok_or_else(|| CatalogError::NotFound(format!("No tag exists with id {id}")))
}

pub async fn create_tag(
    tag: NewTag,
    session: &SessionData,
    store: &dyn CatalogStore,
) -> Result<Tag, CatalogError> {
    session.authenticate(ActionType::ManageCatalog)?;
    validate_tag(&tag)?;

    let tag = store.insert_tag(&tag).await?;
    log::info!("> Created tag {} ({}) by {}", tag.id, tag.slug, session.user_id);

    Ok(tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(name: &str, slug: &str, color: Option<&str>) -> NewTag {
        NewTag {
            name: name.to_string(),
            slug: slug.to_string(),
            color: color.map(str::to_string),
        }
    }

    #[test]
    fn colors_are_hex_triplets() {
        assert!(is_hex_color("#E26C2D"));
        assert!(is_hex_color("#00ff00"));
        assert!(!is_hex_color("E26C2D"));
        assert!(!is_hex_color("#E26C2"));
        assert!(!is_hex_color("#GGGGGG"));
    }

    #[test]
    fn every_bad_field_is_reported() {
        let err = validate_tag(&tag("", "bad slug", Some("red"))).unwrap_err();
        let errors = err.field_errors().unwrap();

        assert!(errors.contains("name"));
        assert!(errors.contains("slug"));
        assert!(errors.contains("color"));
    }

    #[test]
    fn color_is_optional() {
        assert!(validate_tag(&tag("Breakfast", "breakfast", None)).is_ok());
    }
}
