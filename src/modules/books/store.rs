//! Storage collaborators for the books module.
//!
//! The service talks to a keyed metadata store and a blob store through
//! these traits; the backend is chosen once, at construction time. The
//! in-memory implementations back the local environment and tests, and keep
//! the observable semantics of the original key-value stores: `update`
//! upserts, and deleting an absent key succeeds.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use shelf_http::error::AppError;

use super::models::Book;

/// Keyed metadata store for book records. No transactional guarantee across
/// multiple keys; `put_batch` callers chunk at the store's batch limit.
#[async_trait]
pub trait BookStore: Send + Sync {
    async fn get_all(&self) -> Result<Vec<Book>, AppError>;

    async fn put(&self, book: Book) -> Result<Book, AppError>;

    async fn put_batch(&self, books: &[Book]) -> Result<(), AppError>;

    async fn get(&self, id: &str) -> Result<Option<Book>, AppError>;

    /// Overwrite the mutable fields (name, description, image URL) stored
    /// under `id`. Absent keys are created, as the original store did.
    async fn update(&self, id: &str, book: Book) -> Result<Book, AppError>;

    /// Remove the record under `id`; removing an absent key is a success.
    async fn delete(&self, id: &str) -> Result<(), AppError>;
}

/// Blob store for book files. Keys are caller-constructed strings.
#[async_trait]
pub trait BookFileStore: Send + Sync {
    async fn put(&self, body: Bytes, key: &str, content_type: &str) -> Result<(), AppError>;

    async fn delete(&self, key: &str) -> Result<(), AppError>;
}

/// In-memory metadata store keyed by book id.
#[derive(Default)]
pub struct MemoryBookStore {
    records: RwLock<HashMap<String, Book>>,
}

impl MemoryBookStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookStore for MemoryBookStore {
    async fn get_all(&self) -> Result<Vec<Book>, AppError> {
        let records = self.records.read().await;
        Ok(records.values().cloned().collect())
    }

    async fn put(&self, book: Book) -> Result<Book, AppError> {
        let mut records = self.records.write().await;
        records.insert(book.id.clone(), book.clone());
        tracing::debug!(book_id = %book.id, "book record stored");
        Ok(book)
    }

    async fn put_batch(&self, books: &[Book]) -> Result<(), AppError> {
        let mut records = self.records.write().await;
        for book in books {
            records.insert(book.id.clone(), book.clone());
        }
        tracing::debug!(count = books.len(), "book batch stored");
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Book>, AppError> {
        let records = self.records.read().await;
        Ok(records.get(id).cloned())
    }

    async fn update(&self, id: &str, book: Book) -> Result<Book, AppError> {
        let mut records = self.records.write().await;
        let record = records.entry(id.to_string()).or_default();
        record.id = id.to_string();
        record.name = book.name;
        record.description = book.description;
        record.image_url = book.image_url;
        Ok(record.clone())
    }

    async fn delete(&self, id: &str) -> Result<(), AppError> {
        let mut records = self.records.write().await;
        records.remove(id);
        Ok(())
    }
}

/// In-memory blob store keyed by object key.
#[derive(Default)]
pub struct MemoryFileStore {
    objects: RwLock<HashMap<String, (Bytes, String)>>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored object under `key`, if any. Test observability hook.
    pub async fn get(&self, key: &str) -> Option<(Bytes, String)> {
        let objects = self.objects.read().await;
        objects.get(key).cloned()
    }
}

#[async_trait]
impl BookFileStore for MemoryFileStore {
    async fn put(&self, body: Bytes, key: &str, content_type: &str) -> Result<(), AppError> {
        let mut objects = self.objects.write().await;
        objects.insert(key.to_string(), (body, content_type.to_string()));
        tracing::debug!(%key, "book file stored");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        let mut objects = self.objects.write().await;
        objects.remove(key);
        Ok(())
    }
}

/// Content type for a file extension (leading dot included), for the blob
/// store's content-type hint.
pub fn content_type_for(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        ".png" => "image/png",
        ".jpg" | ".jpeg" => "image/jpeg",
        ".gif" => "image/gif",
        ".webp" => "image/webp",
        ".svg" => "image/svg+xml",
        ".pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn book(name: &str) -> Book {
        Book {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: String::new(),
            image_url: "https://example.com/x.png".to_string(),
        }
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = MemoryBookStore::new();
        let stored = store.put(book("Dune")).await.unwrap();

        let found = store.get(&stored.id).await.unwrap();
        assert_eq!(found, Some(stored));
    }

    #[tokio::test]
    async fn get_absent_id_is_none() {
        let store = MemoryBookStore::new();
        let found = store.get("missing").await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn update_overwrites_fields_and_keeps_id() {
        let store = MemoryBookStore::new();
        let original = store.put(book("Dune")).await.unwrap();

        let replacement = Book {
            id: "ignored".to_string(),
            name: "Dune Messiah".to_string(),
            description: "Sequel".to_string(),
            image_url: "https://example.com/y.png".to_string(),
        };
        let updated = store.update(&original.id, replacement).await.unwrap();

        assert_eq!(updated.id, original.id);
        assert_eq!(updated.name, "Dune Messiah");
        assert_eq!(updated.description, "Sequel");
    }

    #[tokio::test]
    async fn delete_absent_id_is_a_noop_success() {
        let store = MemoryBookStore::new();
        assert!(store.delete("missing").await.is_ok());
    }

    #[tokio::test]
    async fn put_batch_stores_every_record() {
        let store = MemoryBookStore::new();
        let books: Vec<Book> = (0..5).map(|i| book(&format!("b{i}"))).collect();

        store.put_batch(&books).await.unwrap();
        assert_eq!(store.get_all().await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn file_store_put_and_delete() {
        let store = MemoryFileStore::new();
        store
            .put(Bytes::from_static(&[1, 2, 3]), "covers/a.png", "image/png")
            .await
            .unwrap();

        let (body, content_type) = store.get("covers/a.png").await.unwrap();
        assert_eq!(body.as_ref(), &[1, 2, 3]);
        assert_eq!(content_type, "image/png");

        store.delete("covers/a.png").await.unwrap();
        assert!(store.get("covers/a.png").await.is_none());
        // Deleting again is still a success.
        assert!(store.delete("covers/a.png").await.is_ok());
    }

    #[test]
    fn content_types_from_extension() {
        assert_eq!(content_type_for(".png"), "image/png");
        assert_eq!(content_type_for(".JPG"), "image/jpeg");
        assert_eq!(content_type_for(".bin"), "application/octet-stream");
        assert_eq!(content_type_for(""), "application/octet-stream");
    }
}
