use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shelf_http::error::AppError;

/// Longest description accepted on a book.
pub const MAX_DESCRIPTION_CHARS: usize = 200;

/// Domain model for the Books module. Wire names match the stored records:
/// `ID`, `name`, `description`, `img_url`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Book {
    /// Unique identifier for the book, a UUID string
    #[serde(rename = "ID", default)]
    pub id: String,
    /// Title of the book
    #[serde(default)]
    pub name: String,
    /// Free-form description, at most 200 characters
    #[serde(default)]
    pub description: String,
    /// Public URL of the book's cover file, derived from its object key
    #[serde(rename = "img_url", default)]
    pub image_url: String,
}

impl Book {
    /// Check every field rule, in a fixed order, stopping at the first
    /// failure. Pure function of the current field values.
    pub fn validate(&self) -> Result<(), AppError> {
        validate_uuid(&self.id)?;
        if self.name.trim().is_empty() {
            return Err(AppError::validation("Name cannot be empty."));
        }
        if self.description.chars().count() > MAX_DESCRIPTION_CHARS {
            return Err(AppError::validation(format!(
                "Description cannot exceed {} characters.",
                MAX_DESCRIPTION_CHARS
            )));
        }
        if !self.image_url.starts_with("http://") && !self.image_url.starts_with("https://") {
            return Err(AppError::validation(
                "Image URL must start with 'http://' or 'https://'.",
            ));
        }
        Ok(())
    }
}

/// Validate that a string is a syntactically well-formed UUID.
pub fn validate_uuid(s: &str) -> Result<(), AppError> {
    Uuid::parse_str(s)
        .map(|_| ())
        .map_err(|err| AppError::validation(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_book() -> Book {
        Book {
            id: Uuid::new_v4().to_string(),
            name: "Dune".to_string(),
            description: "Sci-fi".to_string(),
            image_url: "https://shelf-media.s3.amazonaws.com/covers/x.png".to_string(),
        }
    }

    #[test]
    fn valid_book_passes() {
        assert!(valid_book().validate().is_ok());
    }

    #[test]
    fn non_uuid_id_is_rejected() {
        let mut book = valid_book();
        book.id = "not-a-uuid".to_string();
        assert!(matches!(
            book.validate(),
            Err(AppError::Validation { .. })
        ));
    }

    #[test]
    fn empty_and_whitespace_names_are_rejected() {
        for name in ["", "   ", "\t\n"] {
            let mut book = valid_book();
            book.name = name.to_string();
            let err = book.validate().unwrap_err();
            assert_eq!(err, AppError::validation("Name cannot be empty."));
        }
    }

    #[test]
    fn overlong_description_is_rejected() {
        let mut book = valid_book();
        book.description = "x".repeat(MAX_DESCRIPTION_CHARS + 1);
        assert!(matches!(
            book.validate(),
            Err(AppError::Validation { .. })
        ));
    }

    #[test]
    fn description_at_limit_is_accepted() {
        let mut book = valid_book();
        book.description = "x".repeat(MAX_DESCRIPTION_CHARS);
        assert!(book.validate().is_ok());
    }

    #[test]
    fn image_url_scheme_is_enforced() {
        for url in ["ftp://example.com/x.png", "example.com/x.png", ""] {
            let mut book = valid_book();
            book.image_url = url.to_string();
            assert!(matches!(
                book.validate(),
                Err(AppError::Validation { .. })
            ));
        }

        let mut book = valid_book();
        book.image_url = "http://example.com/x.png".to_string();
        assert!(book.validate().is_ok());
    }

    #[test]
    fn rules_are_checked_in_order() {
        // A book failing several rules reports the id failure first.
        let book = Book {
            id: "nope".to_string(),
            name: String::new(),
            description: String::new(),
            image_url: String::new(),
        };
        let err = book.validate().unwrap_err();
        match err {
            AppError::Validation { message, .. } => {
                assert!(!message.contains("Name cannot be empty"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn wire_names_round_trip() {
        let book = valid_book();
        let value = serde_json::to_value(&book).unwrap();
        assert!(value.get("ID").is_some());
        assert!(value.get("img_url").is_some());

        let back: Book = serde_json::from_value(value).unwrap();
        assert_eq!(back, book);
    }
}
