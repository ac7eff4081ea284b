//! Books repository for database operations

use sqlx::{PgConnection, Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{like_pattern, Book, BookFields},
};

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get book by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// List books ordered by title
    pub async fn list(&self, limit: i64) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>("SELECT * FROM books ORDER BY title, id LIMIT $1")
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(books)
    }

    /// Case-insensitive substring search on title or author
    pub async fn search(&self, query: &str, limit: i64) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(
            r#"
            SELECT * FROM books
            WHERE title ILIKE $1 OR author ILIKE $1
            ORDER BY title, id
            LIMIT $2
            "#,
        )
        .bind(like_pattern(query))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(books)
    }

    /// Whether another book already carries this ISBN
    pub async fn isbn_exists(&self, isbn: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM books WHERE isbn = $1 AND ($2::INTEGER IS NULL OR id <> $2))",
        )
        .bind(isbn)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    pub async fn create(&self, fields: &BookFields) -> AppResult<Book> {
        let book = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (title, author, isbn, quantity, available_quantity, category, description)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(&fields.title)
        .bind(&fields.author)
        .bind(&fields.isbn)
        .bind(fields.quantity)
        .bind(fields.available_quantity)
        .bind(&fields.category)
        .bind(&fields.description)
        .fetch_one(&self.pool)
        .await?;
        Ok(book)
    }

    /// Lock a book row for the rest of the database transaction
    pub async fn lock(conn: &mut PgConnection, id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// Write every editable field of a locked book
    pub async fn update(conn: &mut PgConnection, id: i32, fields: &BookFields) -> AppResult<Book> {
        let book = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books
            SET title = $1, author = $2, isbn = $3, quantity = $4, available_quantity = $5,
                category = $6, description = $7, updated_at = NOW()
            WHERE id = $8
            RETURNING *
            "#,
        )
        .bind(&fields.title)
        .bind(&fields.author)
        .bind(&fields.isbn)
        .bind(fields.quantity)
        .bind(fields.available_quantity)
        .bind(&fields.category)
        .bind(&fields.description)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))?;
        Ok(book)
    }

    /// Persist the availability of a locked book
    pub async fn save_availability(conn: &mut PgConnection, book: &Book) -> AppResult<()> {
        sqlx::query("UPDATE books SET available_quantity = $1, updated_at = NOW() WHERE id = $2")
            .bind(book.available_quantity)
            .bind(book.id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Delete a book that no transaction references
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let referenced: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM book_transactions WHERE book_id = $1)",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        if referenced {
            return Err(AppError::IllegalState(format!(
                "Book {} has circulation history and cannot be deleted",
                id
            )));
        }

        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Book with id {} not found", id)));
        }
        Ok(())
    }
}
