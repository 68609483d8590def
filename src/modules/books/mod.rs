pub mod models;
pub mod multipart;
pub mod service;
pub mod store;

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use base64::{prelude::BASE64_STANDARD, Engine};
use bytes::Bytes;
use serde_json::json;

use shelf_http::error::AppError;
use shelf_kernel::{settings::Settings, InitCtx, Module};

use models::Book;
use multipart::DecodedForm;
use service::BookService;
use store::{MemoryBookStore, MemoryFileStore};

/// Books module: CRUD over book metadata plus the associated cover file.
pub struct BooksModule {
    service: Arc<BookService>,
}

impl BooksModule {
    /// Wire the module against its storage backend. Selection happens here,
    /// once; the service only ever sees the store traits.
    pub fn from_settings(settings: &Settings) -> Self {
        let store = Arc::new(MemoryBookStore::new());
        let files = Arc::new(MemoryFileStore::new());
        Self {
            service: Arc::new(BookService::new(store, files, settings.storage.clone())),
        }
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            table = %ctx.settings.storage.table,
            bucket = %ctx.settings.storage.bucket,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/", get(list_books).post(create_book))
            .route("/batch", post(create_batch_books))
            .route(
                "/{book_id}",
                get(get_book).put(update_book).delete(delete_book),
            )
            .with_state(self.service.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let error = |description: &str| {
            json!({
                "description": description,
                "content": {
                    "application/json": {
                        "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                    }
                }
            })
        };

        Some(json!({
            "paths": {
                "/": {
                    "get": {
                        "summary": "List books",
                        "tags": ["Books"],
                        "responses": {
                            "200": {
                                "description": "List of books",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "type": "array",
                                            "items": { "$ref": "#/components/schemas/Book" }
                                        }
                                    }
                                }
                            },
                            "500": error("Internal server error")
                        }
                    },
                    "post": {
                        "summary": "Create a book from a multipart form",
                        "description": "Body is a base64-encoded multipart form with a required `file` part and `name`/`description` fields",
                        "tags": ["Books"],
                        "responses": {
                            "200": {
                                "description": "Created book",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/Book" }
                                    }
                                }
                            },
                            "400": error("Malformed request"),
                            "422": error("Validation error")
                        }
                    }
                },
                "/batch": {
                    "post": {
                        "summary": "Create several books at once",
                        "tags": ["Books"],
                        "requestBody": {
                            "content": {
                                "application/json": {
                                    "schema": {
                                        "type": "array",
                                        "items": { "$ref": "#/components/schemas/Book" }
                                    }
                                }
                            }
                        },
                        "responses": {
                            "200": { "description": "All books created" },
                            "422": error("Validation error")
                        }
                    }
                },
                "/{book_id}": {
                    "get": {
                        "summary": "Fetch one book by id",
                        "tags": ["Books"],
                        "responses": {
                            "200": {
                                "description": "The book, or a zero-value record when absent",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/Book" }
                                    }
                                }
                            },
                            "422": error("Validation error")
                        }
                    },
                    "put": {
                        "summary": "Replace a book's metadata and cover",
                        "tags": ["Books"],
                        "responses": {
                            "200": {
                                "description": "Updated book",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/Book" }
                                    }
                                }
                            },
                            "400": error("Malformed request"),
                            "422": error("Validation error")
                        }
                    },
                    "delete": {
                        "summary": "Delete a book and its cover file",
                        "tags": ["Books"],
                        "responses": {
                            "200": { "description": "Deletion message" },
                            "500": error("Internal server error")
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Book": {
                        "type": "object",
                        "properties": {
                            "ID": {
                                "type": "string",
                                "description": "UUID of the book"
                            },
                            "name": {
                                "type": "string",
                                "description": "Title of the book"
                            },
                            "description": {
                                "type": "string",
                                "description": "Description, at most 200 characters"
                            },
                            "img_url": {
                                "type": "string",
                                "format": "uri",
                                "description": "Public URL of the book's cover file"
                            }
                        },
                        "required": ["ID", "name", "img_url"]
                    }
                }
            }
        }))
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

/// List every book, unfiltered.
async fn list_books(
    State(service): State<Arc<BookService>>,
) -> Result<Json<Vec<Book>>, AppError> {
    Ok(Json(service.get_all_books().await?))
}

/// Create a book from an encoded multipart form. The file part is required;
/// its bytes are stored before the metadata record is written.
async fn create_book(
    State(service): State<Arc<BookService>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Book>, AppError> {
    let form = decode_upload(&headers, &body)?;
    if form.file_name.is_empty() {
        return Err(AppError::bad_request("multipart body is missing a file part"));
    }

    let book_id = uuid::Uuid::new_v4().to_string();
    let file_ext = file_extension(&form.file_name);
    let key = service.object_key(&book_id, &file_ext);
    let image_url = service.object_url(&key);
    let book = book_from_form(&form, book_id, image_url);

    service
        .save_book_file(form.file_bytes, &key, &file_ext)
        .await?;
    let created = service.create_book(book).await?;
    Ok(Json(created))
}

/// Validate and persist a JSON array of books as one batch.
async fn create_batch_books(
    State(service): State<Arc<BookService>>,
    Json(books): Json<Vec<Book>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let count = books.len();
    service.create_batch_books(books).await?;
    Ok(Json(json!({
        "message": format!("{} books created", count)
    })))
}

async fn get_book(
    State(service): State<Arc<BookService>>,
    Path(book_id): Path<String>,
) -> Result<Json<Book>, AppError> {
    Ok(Json(service.get_book_by_id(&book_id).await?))
}

/// Replace a book's metadata, saving any uploaded file first. The file part
/// is optional here; the save-then-update order matches create.
async fn update_book(
    State(service): State<Arc<BookService>>,
    Path(book_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Book>, AppError> {
    let form = decode_upload(&headers, &body)?;

    let file_ext = file_extension(&form.file_name);
    let key = service.object_key(&book_id, &file_ext);
    let image_url = service.object_url(&key);
    let book = book_from_form(&form, book_id.clone(), image_url);

    service
        .save_book_file(form.file_bytes, &key, &file_ext)
        .await?;
    let updated = service.update_book_by_id(&book_id, book).await?;
    Ok(Json(updated))
}

async fn delete_book(
    State(service): State<Arc<BookService>>,
    Path(book_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    service.delete_book_by_id(&book_id).await?;
    Ok(Json(json!({
        "message": format!("Book {} deleted", book_id)
    })))
}

/// Reverse the transport encoding and decode the multipart form: base64
/// body first, then the boundary from the `Content-Type` header.
fn decode_upload(headers: &HeaderMap, body: &[u8]) -> Result<DecodedForm, AppError> {
    let decoded = BASE64_STANDARD
        .decode(body)
        .map_err(|_| AppError::bad_request("request body is not valid base64"))?;

    let content_type = headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let boundary = multipart::boundary_from_content_type(content_type)?;

    multipart::decode(&decoded, &boundary)
}

/// Project decoded form fields onto a book entity.
fn book_from_form(form: &DecodedForm, id: String, image_url: String) -> Book {
    Book {
        id,
        name: form.fields.get("name").cloned().unwrap_or_default(),
        description: form.fields.get("description").cloned().unwrap_or_default(),
        image_url,
    }
}

/// File extension of a filename, leading dot included; empty when none.
fn file_extension(file_name: &str) -> String {
    match file_name.rfind('.') {
        Some(idx) => file_name[idx..].to_string(),
        None => String::new(),
    }
}

/// Create a new instance of the books module
pub fn create_module(settings: &Settings) -> Arc<dyn Module> {
    Arc::new(BooksModule::from_settings(settings))
}
