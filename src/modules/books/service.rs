//! Book orchestrator: sequences validation, metadata persistence, and file
//! storage for every public operation, and runs the concurrent batch
//! validator for bulk creation.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use uuid::Uuid;

use shelf_http::error::AppError;
use shelf_kernel::settings::StorageSettings;

use super::models::{validate_uuid, Book};
use super::store::{content_type_for, BookFileStore, BookStore};

/// Most items the metadata store accepts in one batch write.
pub const MAX_BATCH_PUT: usize = 25;

/// Stateless orchestrator over the two storage collaborators. The backend
/// is injected at construction; nothing here reads ambient process state.
pub struct BookService {
    store: Arc<dyn BookStore>,
    files: Arc<dyn BookFileStore>,
    storage: StorageSettings,
}

impl BookService {
    pub fn new(
        store: Arc<dyn BookStore>,
        files: Arc<dyn BookFileStore>,
        storage: StorageSettings,
    ) -> Self {
        Self {
            store,
            files,
            storage,
        }
    }

    pub async fn get_all_books(&self) -> Result<Vec<Book>, AppError> {
        self.store.get_all().await
    }

    /// Assign an id if the caller left it empty, validate, persist.
    pub async fn create_book(&self, mut book: Book) -> Result<Book, AppError> {
        if book.id.is_empty() {
            book.id = Uuid::new_v4().to_string();
        }
        book.validate()?;
        self.store.put(book).await
    }

    /// Validate every book concurrently, then persist the whole sequence in
    /// input order, chunked at the store's batch limit.
    ///
    /// Ids are assigned synchronously before the fan-out so the tasks never
    /// touch shared state. The join is unconditional: all validations run
    /// even when an early completion already failed, and the first error
    /// drained from the channel rejects the batch. Chunks that were written
    /// before a failing chunk are not rolled back.
    pub async fn create_batch_books(&self, mut books: Vec<Book>) -> Result<(), AppError> {
        for book in &mut books {
            if book.id.is_empty() {
                book.id = Uuid::new_v4().to_string();
            }
        }

        let (tx, mut rx) = mpsc::channel::<Result<(), AppError>>(books.len().max(1));
        let mut tasks = Vec::with_capacity(books.len());
        for book in &books {
            let tx = tx.clone();
            let book = book.clone();
            tasks.push(tokio::spawn(async move {
                let _ = tx.send(book.validate()).await;
            }));
        }
        drop(tx);

        for task in tasks {
            task.await
                .map_err(|err| AppError::unexpected(err.to_string()))?;
        }
        while let Some(outcome) = rx.recv().await {
            outcome?;
        }

        for chunk in books.chunks(MAX_BATCH_PUT) {
            self.store.put_batch(chunk).await?;
        }

        tracing::info!(count = books.len(), "batch books created");
        Ok(())
    }

    /// Fetch by id. An absent id yields the zero-value book with no error;
    /// callers distinguish absence by checking for default fields.
    pub async fn get_book_by_id(&self, book_id: &str) -> Result<Book, AppError> {
        validate_uuid(book_id)?;
        let found = self.store.get(book_id).await?;
        if found.is_none() {
            tracing::info!(%book_id, "no book found");
        }
        Ok(found.unwrap_or_default())
    }

    pub async fn update_book_by_id(&self, book_id: &str, book: Book) -> Result<Book, AppError> {
        validate_uuid(book_id)?;
        book.validate()?;
        self.store.update(book_id, book).await
    }

    /// Remove a book and its stored file. The file goes first; if that
    /// fails the metadata record is left untouched. A metadata failure
    /// after the file delete leaves an orphaned record, accepted behavior.
    pub async fn delete_book_by_id(&self, book_id: &str) -> Result<(), AppError> {
        let book = self.get_book_by_id(book_id).await?;
        let key = self.object_key_from_url(&book.image_url)?;

        self.delete_book_file(&key).await?;
        self.store.delete(book_id).await?;

        tracing::info!(%book_id, "book deleted");
        Ok(())
    }

    pub async fn save_book_file(
        &self,
        body: Bytes,
        key: &str,
        file_ext: &str,
    ) -> Result<(), AppError> {
        self.files.put(body, key, content_type_for(file_ext)).await
    }

    pub async fn delete_book_file(&self, key: &str) -> Result<(), AppError> {
        self.files.delete(key).await
    }

    /// Object key for a book's file: `{bucket_key}{id}{ext}`.
    pub fn object_key(&self, book_id: &str, file_ext: &str) -> String {
        format!("{}{}{}", self.storage.bucket_key, book_id, file_ext)
    }

    /// Public URL a stored object is reachable under.
    pub fn object_url(&self, key: &str) -> String {
        format!("https://{}.s3.amazonaws.com/{}", self.storage.bucket, key)
    }

    /// Recover the object key from a stored image URL by splitting on the
    /// bucket key prefix.
    fn object_key_from_url(&self, image_url: &str) -> Result<String, AppError> {
        match image_url.split_once(&self.storage.bucket_key) {
            Some((_, file_name)) => Ok(format!("{}{}", self.storage.bucket_key, file_name)),
            None => Err(AppError::unexpected(
                "stored image URL does not contain the bucket key prefix",
            )),
        }
    }
}
