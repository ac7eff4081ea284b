//! Book (catalog record) model and related types

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::error::{AppError, AppResult};

static ISBN_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9-]+$").expect("valid ISBN pattern"));

/// Book model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub isbn: Option<String>,
    /// Total number of copies owned
    pub quantity: i32,
    /// Copies currently on the shelf
    pub available_quantity: i32,
    pub category: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create book request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateBook {
    pub title: String,
    pub author: String,
    pub isbn: Option<String>,
    pub quantity: i32,
    /// Defaults to `quantity` when omitted
    pub available_quantity: Option<i32>,
    pub category: Option<String>,
    pub description: Option<String>,
}

/// Update book request.
///
/// Only these fields may be changed; availability follows `quantity`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateBook {
    pub title: Option<String>,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub quantity: Option<i32>,
    pub category: Option<String>,
    pub description: Option<String>,
}

/// Normalized, validated content of a book record (everything but id and timestamps)
#[derive(Debug, Clone, PartialEq, Eq, Validate)]
pub struct BookFields {
    #[validate(length(min = 1, message = "Book title cannot be empty."))]
    pub title: String,
    #[validate(length(min = 1, message = "Author name cannot be empty."))]
    pub author: String,
    pub isbn: Option<String>,
    #[validate(range(min = 0, message = "Total Quantity cannot be negative."))]
    pub quantity: i32,
    #[validate(range(min = 0, message = "Available Quantity cannot be negative."))]
    pub available_quantity: i32,
    pub category: Option<String>,
    pub description: Option<String>,
}

fn trimmed(value: String) -> String {
    value.trim().to_string()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl BookFields {
    /// Trim text fields and check every per-record rule.
    /// ISBN uniqueness needs the store and is checked by the catalog service.
    pub fn normalized(mut self) -> AppResult<Self> {
        self.title = trimmed(self.title);
        self.author = trimmed(self.author);
        self.isbn = non_empty(self.isbn);
        self.category = non_empty(self.category);
        self.description = self.description.filter(|d| !d.trim().is_empty());

        self.validate()?;

        if let Some(ref isbn) = self.isbn {
            if !ISBN_PATTERN.is_match(isbn) {
                return Err(AppError::Validation(
                    "ISBN may only contain digits and hyphens.".to_string(),
                ));
            }
        }

        if self.available_quantity > self.quantity {
            return Err(AppError::Validation(
                "Available Quantity cannot be greater than Total Quantity.".to_string(),
            ));
        }

        Ok(self)
    }

    /// Apply an allow-listed update. A change of `quantity` moves
    /// `available_quantity` by the same amount (copies added or withdrawn).
    pub fn apply(mut self, update: UpdateBook) -> AppResult<Self> {
        if let Some(title) = update.title {
            self.title = title;
        }
        if let Some(author) = update.author {
            self.author = author;
        }
        if let Some(isbn) = update.isbn {
            self.isbn = Some(isbn);
        }
        if let Some(category) = update.category {
            self.category = Some(category);
        }
        if let Some(description) = update.description {
            self.description = Some(description);
        }
        if let Some(quantity) = update.quantity {
            if quantity < 0 {
                return Err(AppError::Validation("Quantity cannot be negative.".to_string()));
            }
            // Both quantities are non-negative here, so neither step can overflow
            let delta = quantity - self.quantity;
            let available = self.available_quantity.checked_add(delta).ok_or_else(|| {
                AppError::Validation(format!("Quantity {} is out of range", quantity))
            })?;
            if available < 0 {
                return Err(AppError::Validation(format!(
                    "Cannot reduce quantity to {}: {} copies are on loan",
                    quantity,
                    self.quantity - self.available_quantity
                )));
            }
            self.quantity = quantity;
            self.available_quantity = available;
        }
        self.normalized()
    }
}

impl From<CreateBook> for BookFields {
    fn from(create: CreateBook) -> Self {
        Self {
            available_quantity: create.available_quantity.unwrap_or(create.quantity),
            title: create.title,
            author: create.author,
            isbn: create.isbn,
            quantity: create.quantity,
            category: create.category,
            description: create.description,
        }
    }
}

impl From<&Book> for BookFields {
    fn from(book: &Book) -> Self {
        Self {
            title: book.title.clone(),
            author: book.author.clone(),
            isbn: book.isbn.clone(),
            quantity: book.quantity,
            available_quantity: book.available_quantity,
            category: book.category.clone(),
            description: book.description.clone(),
        }
    }
}
