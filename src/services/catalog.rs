//! Catalog management service

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{CreateBook, UpdateBook},
        import_report::{BulkImportReport, BulkImportRequest, ImportError},
        Book, BookFields, ListQuery, SEARCH_LIMIT,
    },
    repository::{books::BooksRepository, Repository},
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn get_book(&self, id: i32) -> AppResult<Book> {
        self.repository.books.get_by_id(id).await
    }

    pub async fn list_books(&self, query: &ListQuery) -> AppResult<Vec<Book>> {
        self.repository.books.list(query.effective_limit()).await
    }

    /// Substring search on title or author; a blank query matches nothing
    pub async fn search_books(&self, query: Option<&str>) -> AppResult<Vec<Book>> {
        match query.map(str::trim).filter(|q| !q.is_empty()) {
            Some(q) => self.repository.books.search(q, SEARCH_LIMIT).await,
            None => Ok(Vec::new()),
        }
    }

    async fn ensure_isbn_free(&self, fields: &BookFields, exclude_id: Option<i32>) -> AppResult<()> {
        if let Some(ref isbn) = fields.isbn {
            if self.repository.books.isbn_exists(isbn, exclude_id).await? {
                return Err(AppError::DuplicateKey(format!(
                    "A book with ISBN {} already exists.",
                    isbn
                )));
            }
        }
        Ok(())
    }

    pub async fn create_book(&self, data: CreateBook) -> AppResult<Book> {
        let fields = BookFields::from(data).normalized()?;
        self.ensure_isbn_free(&fields, None).await?;

        let book = self.repository.books.create(&fields).await?;
        tracing::info!("Catalog: created book id={} \"{}\"", book.id, book.title);
        Ok(book)
    }

    pub async fn update_book(&self, id: i32, data: UpdateBook) -> AppResult<Book> {
        let mut tx = self.repository.pool.begin().await?;

        let current = BooksRepository::lock(&mut tx, id).await?;
        let fields = BookFields::from(&current).apply(data)?;
        self.ensure_isbn_free(&fields, Some(id)).await?;

        let book = BooksRepository::update(&mut tx, id, &fields).await?;
        tx.commit().await?;

        tracing::info!("Catalog: updated book id={}", id);
        Ok(book)
    }

    pub async fn delete_book(&self, id: i32) -> AppResult<()> {
        self.repository.books.delete(id).await?;
        tracing::info!("Catalog: deleted book id={}", id);
        Ok(())
    }

    /// Insert each record on its own; failures are reported, never rolled back
    pub async fn bulk_import(&self, request: BulkImportRequest) -> AppResult<BulkImportReport> {
        let records = decode_batch(request)?;
        let mut report = BulkImportReport::default();

        for (index, record) in records.into_iter().enumerate() {
            let isbn = record
                .get("isbn")
                .and_then(|v| v.as_str())
                .map(str::to_string);

            let outcome = match serde_json::from_value::<CreateBook>(record) {
                Ok(data) => self.create_book(data).await,
                Err(e) => Err(AppError::Validation(e.to_string())),
            };

            match outcome {
                Ok(book) => report.created_ids.push(book.id),
                Err(e) => {
                    tracing::warn!("Bulk import: record {} rejected: {}", index, e);
                    report.errors.push(ImportError {
                        index,
                        isbn,
                        message: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            "Bulk import complete: {} created, {} rejected",
            report.created_ids.len(),
            report.errors.len()
        );
        Ok(report)
    }
}

/// Extract the batch from either the inline records or the base64 payload
pub fn decode_batch(request: BulkImportRequest) -> AppResult<Vec<serde_json::Value>> {
    match (request.records, request.payload_b64) {
        (Some(records), None) => Ok(records),
        (None, Some(payload)) => {
            let bytes = STANDARD
                .decode(payload.trim())
                .map_err(|e| AppError::Validation(format!("payload_b64 is not valid base64: {}", e)))?;
            serde_json::from_slice::<Vec<serde_json::Value>>(&bytes).map_err(|e| {
                AppError::Validation(format!("payload_b64 is not a JSON array of books: {}", e))
            })
        }
        (Some(_), Some(_)) => Err(AppError::Validation(
            "Provide either records or payload_b64, not both".to_string(),
        )),
        (None, None) => Err(AppError::Validation(
            "Provide records or payload_b64".to_string(),
        )),
    }
}
