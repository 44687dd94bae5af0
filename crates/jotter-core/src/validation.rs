//! # Validation Module
//!
//! Input validation for the value objects the ports accept.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Editor (TypeScript)                                          │
//! │  └── Highlights #tags as the user types                                │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Value objects (Rust)                                         │
//! │  ├── TagName::parse, Pagination::new, NoteSearch::new                  │
//! │  └── THIS MODULE: the rules behind them                                │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Storage                                                      │
//! │  ├── UNIQUE (tags.name)                                                │
//! │  └── Foreign keys with cascade                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::TAG_NAME_MAX_CHARS;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Returns true for characters allowed in a tag name.
///
/// ASCII letters and digits, Hiragana, Katakana (including `ー`), CJK
/// ideographs (with extension A and `々`), hyphen and underscore.
pub fn is_tag_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || c == '-'
        || c == '_'
        || ('\u{3040}'..='\u{309F}').contains(&c)
        || ('\u{30A0}'..='\u{30FF}').contains(&c)
        || ('\u{3400}'..='\u{4DBF}').contains(&c)
        || ('\u{4E00}'..='\u{9FFF}').contains(&c)
        || c == '\u{3005}'
}

/// Validates a tag name and returns it trimmed.
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters (characters, not bytes)
/// - Only characters accepted by [`is_tag_char`]
///
/// ## Example
/// ```rust
/// use jotter_core::validation::validate_tag_name;
///
/// assert!(validate_tag_name("recipe").is_ok());
/// assert!(validate_tag_name("お菓子").is_ok());
/// assert!(validate_tag_name("has space").is_err());
/// assert!(validate_tag_name(&"a".repeat(51)).is_err());
/// ```
pub fn validate_tag_name(name: &str) -> ValidationResult<String> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "tag name".to_string(),
        });
    }

    if name.chars().count() > TAG_NAME_MAX_CHARS {
        return Err(ValidationError::TooLong {
            field: "tag name".to_string(),
            max: TAG_NAME_MAX_CHARS,
        });
    }

    if !name.chars().all(is_tag_char) {
        return Err(ValidationError::InvalidFormat {
            field: "tag name".to_string(),
            reason: "must contain only letters, digits, kana, kanji, hyphens, and underscores"
                .to_string(),
        });
    }

    Ok(name.to_string())
}

/// Normalizes a search query.
///
/// Surrounding whitespace is dropped; an empty result means "no text filter".
pub fn normalize_search_query(query: &str) -> String {
    query.trim().to_string()
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a 1-indexed page number.
pub fn validate_page(page: u32) -> ValidationResult<()> {
    if page == 0 {
        return Err(ValidationError::OutOfRange {
            field: "page".to_string(),
            min: 1,
            max: i64::from(u32::MAX),
        });
    }

    Ok(())
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Parses a UUID string.
///
/// ## Example
/// ```rust
/// use jotter_core::validation::parse_uuid;
///
/// assert!(parse_uuid("id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(parse_uuid("id", "not-a-uuid").is_err());
/// ```
pub fn parse_uuid(field: &str, id: &str) -> ValidationResult<uuid::Uuid> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    uuid::Uuid::parse_str(id.trim()).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
