use std::{
    collections::BTreeMap,
    fmt::{self, Display},
};

use potion::Error;
use serde::Serialize;
use warp::reject::Rejection;

#[derive(Debug, Clone)]
pub struct QueryError {
    info: String,
}

impl QueryError {
    pub fn new(info: String) -> Self {
        Self { info }
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::RowNotFound => Self::new(format!("RowNotFound")),
            sqlx::Error::PoolTimedOut => Self::new(format!("Pool timed out")),
            sqlx::Error::PoolClosed => Self::new(format!("Pool closed")),
            sqlx::Error::Database(e) => Self::new(format!("{e}")),
            sqlx::Error::Migrate(e) => Self::new(format!("Migration failed ({e})")),
            e => Self::new(format!("{e}")),
        }
    }
}

impl Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.info)
    }
}

impl std::error::Error for QueryError {}

/// Field name -> messages for every rejected field of a request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors {
    inner: BTreeMap<String, Vec<String>>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.inner
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.inner.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.inner.get(field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.inner.keys().map(String::as_str)
    }

    /// `Ok` when nothing was rejected, otherwise a validation error carrying every field.
    pub fn into_result(self) -> Result<(), CatalogError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(CatalogError::Validation(self))
        }
    }
}

impl Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = self
            .inner
            .iter()
            .map(|(field, messages)| format!("{field}: {}", messages.join(", ")))
            .collect::<Vec<String>>()
            .join("; ");

        write!(f, "({fields})")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Invalid request {0}")]
    Validation(FieldErrors),
    #[error("{0}")]
    PermissionDenied(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    SelfReference(String),
    #[error("Query failed {0}")]
    Query(#[from] QueryError),
}

impl CatalogError {
    pub fn invalid(field: &str, message: &str) -> Self {
        let mut errors = FieldErrors::new();
        errors.add(field, message);
        Self::Validation(errors)
    }

    pub fn permission_denied() -> Self {
        Self::PermissionDenied(String::from(
            "You don't have permission to perform this action",
        ))
    }

    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            CatalogError::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for CatalogError {
    fn from(value: sqlx::Error) -> Self {
        if let sqlx::Error::Database(e) = &value {
            if e.is_unique_violation() {
                return Self::Conflict(String::from("Row already exists"));
            }
            if e.is_foreign_key_violation() {
                return Self::Conflict(String::from(
                    "Row is still referenced or references a missing row",
                ));
            }
            if e.is_check_violation() {
                return Self::invalid("constraint", e.message());
            }
        }

        log::error!("> Query failed: {value}");
        Self::Query(QueryError::from(value))
    }
}

impl From<CatalogError> for Error {
    fn from(value: CatalogError) -> Self {
        let code = match value {
            CatalogError::Validation(_) => 400,
            CatalogError::SelfReference(_) => 400,
            CatalogError::PermissionDenied(_) => 403,
            CatalogError::NotFound(_) => 404,
            CatalogError::Conflict(_) => 409,
            CatalogError::Query(_) => 500,
        };
        let info = match &value {
            CatalogError::Validation(errors) => {
                serde_json::to_string(errors).unwrap_or_else(|_| errors.to_string())
            }
            other => other.to_string(),
        };

        Error {
            code,
            info: Some(info),
            redirect: None,
        }
    }
}

impl From<CatalogError> for Rejection {
    fn from(value: CatalogError) -> Self {
        Error::from(value).into()
    }
}
