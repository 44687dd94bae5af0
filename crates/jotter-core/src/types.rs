//! # Domain Types
//!
//! Core domain types used throughout Jotter.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      Note       │   │       Tag       │   │    Revision     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUIDv7)    │   │  id (UUIDv4)    │   │  id (UUIDv7)    │       │
//! │  │  content        │◄─►│  name           │   │  note_id (FK)   │       │
//! │  │  text (derived) │   │  usage_count    │   │  content        │       │
//! │  │  tag_ids (set)  │   │  (computed)     │   │  saved_at       │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   Pagination    │   │   SortOrder     │   │   NoteSearch    │       │
//! │  │  page (1-based) │   │  Asc / Desc     │   │  query + tags   │       │
//! │  │  limit          │   │  + id tie-break │   │  + page + sort  │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Timestamps
//! Every timestamp is truncated to whole milliseconds when it is created, so
//! SQL backends (integer epoch millis) and the key-value backend (RFC 3339)
//! round-trip entities without loss.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::document::Document;
use crate::error::ValidationError;
use crate::validation::{normalize_search_query, parse_uuid, validate_page, validate_tag_name};

// =============================================================================
// Timestamps
// =============================================================================

/// Current time truncated to millisecond precision.
pub fn now() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

/// Converts stored epoch milliseconds back to a timestamp.
pub fn from_millis(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}

// =============================================================================
// Identifiers
// =============================================================================

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident, $field:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Wraps an existing UUID.
            pub const fn from_uuid(uuid: Uuid) -> Self {
                $name(uuid)
            }

            /// Parses the hyphenated string form.
            pub fn parse(raw: &str) -> Result<Self, ValidationError> {
                parse_uuid($field, raw).map($name)
            }

            /// Returns the inner UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0.hyphenated(), f)
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

branded_id!(
    /// Note identifier (UUID v7, time ordered).
    NoteId,
    "note id"
);

branded_id!(
    /// Tag identifier (UUID v4).
    TagId,
    "tag id"
);

branded_id!(
    /// Revision identifier (UUID v7).
    RevisionId,
    "revision id"
);

impl NoteId {
    /// Generates a new time-ordered note id.
    pub fn new() -> Self {
        NoteId(Uuid::now_v7())
    }
}

impl Default for NoteId {
    fn default() -> Self {
        Self::new()
    }
}

impl TagId {
    /// Generates a new random tag id.
    pub fn new() -> Self {
        TagId(Uuid::new_v4())
    }
}

impl Default for TagId {
    fn default() -> Self {
        Self::new()
    }
}

impl RevisionId {
    /// Generates a new time-ordered revision id.
    pub fn new() -> Self {
        RevisionId(Uuid::now_v7())
    }
}

impl Default for RevisionId {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tag Name
// =============================================================================

/// A validated tag name (1-50 characters, restricted charset).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct TagName(String);

impl TagName {
    /// Validates and trims a raw name.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        validate_tag_name(raw).map(TagName)
    }

    /// The name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TagName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TagName {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        TagName::parse(&raw).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Note
// =============================================================================

/// A note: a structured document plus its searchable text projection.
///
/// `text` can only change together with `content`, so the projection never
/// drifts from the document.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Note {
    #[ts(type = "string")]
    id: NoteId,

    #[ts(type = "unknown")]
    content: Document,

    text: String,

    #[ts(type = "string[]")]
    tag_ids: BTreeSet<TagId>,

    #[ts(type = "string")]
    created_at: DateTime<Utc>,

    #[ts(type = "string")]
    updated_at: DateTime<Utc>,
}

impl Note {
    /// Creates an empty note.
    pub fn new(now: DateTime<Utc>) -> Self {
        Note {
            id: NoteId::new(),
            content: Document::empty(),
            text: String::new(),
            tag_ids: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuilds a note from stored fields.
    pub fn restore(
        id: NoteId,
        content: Document,
        text: String,
        tag_ids: BTreeSet<TagId>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Note {
            id,
            content,
            text,
            tag_ids,
            created_at,
            updated_at,
        }
    }

    pub fn id(&self) -> NoteId {
        self.id
    }

    pub fn content(&self) -> &Document {
        &self.content
    }

    /// Plain-text projection of [`Note::content`].
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tag_ids(&self) -> &BTreeSet<TagId> {
        &self.tag_ids
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Replaces the document and recomputes the text projection.
    pub fn set_content(&mut self, content: Document, now: DateTime<Utc>) {
        self.text = content.plain_text();
        self.content = content;
        self.updated_at = now;
    }

    /// Replaces the linked tag set. Returns true if it changed.
    pub fn set_tag_ids(&mut self, tag_ids: impl IntoIterator<Item = TagId>) -> bool {
        let next: BTreeSet<TagId> = tag_ids.into_iter().collect();
        if next == self.tag_ids {
            return false;
        }
        self.tag_ids = next;
        true
    }

    /// True if this note carries every tag in `required`.
    pub fn has_all_tags(&self, required: &BTreeSet<TagId>) -> bool {
        required.is_subset(&self.tag_ids)
    }

    /// Case-insensitive substring test against the text projection.
    pub fn matches_text(&self, query: &str) -> bool {
        contains_ignore_ascii_case(&self.text, query)
    }
}

/// Substring containment with ASCII case folding.
///
/// This is the one case rule every backend applies: SQLite's `LIKE` folds
/// ASCII letters only, and the key-value backend folds the same set here.
pub fn contains_ignore_ascii_case(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    haystack
        .to_ascii_lowercase()
        .contains(&needle.to_ascii_lowercase())
}

// =============================================================================
// Tag
// =============================================================================

/// A tag. `usage_count` is always computed from the note relations at read
/// time; it is never written back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Tag {
    #[ts(type = "string")]
    pub id: TagId,

    #[ts(type = "string")]
    pub name: TagName,

    pub usage_count: u32,

    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,

    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl Tag {
    /// Creates an unused tag.
    pub fn new(name: TagName, now: DateTime<Utc>) -> Self {
        Tag {
            id: TagId::new(),
            name,
            usage_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

// =============================================================================
// Revision
// =============================================================================

/// An immutable snapshot of a note's content.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Revision {
    #[ts(type = "string")]
    pub id: RevisionId,

    #[ts(type = "string")]
    pub note_id: NoteId,

    #[ts(type = "unknown")]
    pub content: Document,

    #[ts(type = "string")]
    pub saved_at: DateTime<Utc>,
}

impl Revision {
    /// Snapshots the current content of `note`.
    pub fn snapshot(note: &Note, now: DateTime<Utc>) -> Self {
        Revision {
            id: RevisionId::new(),
            note_id: note.id(),
            content: note.content().clone(),
            saved_at: now,
        }
    }
}

// =============================================================================
// Pagination & Sorting
// =============================================================================

/// 1-indexed page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct Pagination {
    page: u32,
    limit: u32,
}

impl Pagination {
    /// Validates `page >= 1`. A limit of zero is allowed and yields no items.
    pub fn new(page: u32, limit: u32) -> Result<Self, ValidationError> {
        validate_page(page)?;
        Ok(Pagination { page, limit })
    }

    /// The first page with the given limit.
    pub fn first(limit: u32) -> Self {
        Pagination { page: 1, limit }
    }

    /// Everything on one page.
    pub fn unbounded() -> Self {
        Pagination {
            page: 1,
            limit: u32::MAX,
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Rows to skip: `(page - 1) * limit`.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }

    /// Applies this page to an already sorted sequence.
    pub fn slice<T>(&self, items: Vec<T>) -> Vec<T> {
        let offset = usize::try_from(self.offset()).unwrap_or(usize::MAX);
        items
            .into_iter()
            .skip(offset)
            .take(self.limit as usize)
            .collect()
    }
}

impl<'de> Deserialize<'de> for Pagination {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            page: u32,
            limit: u32,
        }
        let raw = Raw::deserialize(deserializer)?;
        Pagination::new(raw.page, raw.limit).map_err(serde::de::Error::custom)
    }
}

/// A page of results plus the total number of matches.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Matches before pagination was applied.
    pub count: u64,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Page {
            items: Vec::new(),
            count: 0,
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// Orients an ascending comparison.
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

/// Sort key for notes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub enum NoteOrderBy {
    CreatedAt,
    #[default]
    UpdatedAt,
}

impl NoteOrderBy {
    /// Total order used by every backend: the key in `order`, then id ascending.
    pub fn compare(self, order: SortOrder, a: &Note, b: &Note) -> Ordering {
        let key = match self {
            NoteOrderBy::CreatedAt => a.created_at.cmp(&b.created_at),
            NoteOrderBy::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        };
        order.apply(key).then_with(|| a.id.cmp(&b.id))
    }
}

/// Sort key for tags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub enum TagOrderBy {
    #[default]
    Name,
    CreatedAt,
    UpdatedAt,
    Usage,
}

impl TagOrderBy {
    /// The key in `order`, then id ascending.
    pub fn compare(self, order: SortOrder, a: &Tag, b: &Tag) -> Ordering {
        let key = match self {
            TagOrderBy::Name => a.name.as_str().cmp(b.name.as_str()),
            TagOrderBy::CreatedAt => a.created_at.cmp(&b.created_at),
            TagOrderBy::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            TagOrderBy::Usage => a.usage_count.cmp(&b.usage_count),
        };
        order.apply(key).then_with(|| a.id.cmp(&b.id))
    }
}

/// Order of [`TagQueryService::find_with_usage`](crate::ports::TagQueryService):
/// usage descending, name ascending, id ascending.
pub fn compare_by_usage(a: &Tag, b: &Tag) -> Ordering {
    b.usage_count
        .cmp(&a.usage_count)
        .then_with(|| a.name.as_str().cmp(b.name.as_str()))
        .then_with(|| a.id.cmp(&b.id))
}

// =============================================================================
// Combined Search
// =============================================================================

/// Parameters of a combined text + tag search.
///
/// ## Example
/// ```rust
/// use jotter_core::{NoteOrderBy, NoteSearch, Pagination, SortOrder};
///
/// let search = NoteSearch::new(Pagination::first(20))
///     .query("  apple ")
///     .order(SortOrder::Asc)
///     .order_by(NoteOrderBy::CreatedAt);
///
/// assert_eq!(search.text(), "apple");
/// assert!(!search.has_tag_filter());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteSearch {
    query: String,
    tag_ids: BTreeSet<TagId>,
    pagination: Pagination,
    order: SortOrder,
    order_by: NoteOrderBy,
}

impl NoteSearch {
    /// No filters, default sort (updated_at desc).
    pub fn new(pagination: Pagination) -> Self {
        NoteSearch {
            query: String::new(),
            tag_ids: BTreeSet::new(),
            pagination,
            order: SortOrder::default(),
            order_by: NoteOrderBy::default(),
        }
    }

    /// Sets the text filter; blank means none.
    ///
    /// Surrounding whitespace is trimmed before matching, so `" pie"`
    /// matches a note reading `"Apple-pie"`.
    pub fn query(mut self, query: &str) -> Self {
        self.query = normalize_search_query(query);
        self
    }

    /// Sets the AND tag filter; empty means none.
    pub fn tags(mut self, tag_ids: impl IntoIterator<Item = TagId>) -> Self {
        self.tag_ids = tag_ids.into_iter().collect();
        self
    }

    pub fn order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    pub fn order_by(mut self, order_by: NoteOrderBy) -> Self {
        self.order_by = order_by;
        self
    }

    pub fn text(&self) -> &str {
        &self.query
    }

    pub fn tag_ids(&self) -> &BTreeSet<TagId> {
        &self.tag_ids
    }

    pub fn pagination(&self) -> Pagination {
        self.pagination
    }

    pub fn sort_order(&self) -> SortOrder {
        self.order
    }

    pub fn sort_key(&self) -> NoteOrderBy {
        self.order_by
    }

    pub fn has_text_filter(&self) -> bool {
        !self.query.is_empty()
    }

    pub fn has_tag_filter(&self) -> bool {
        !self.tag_ids.is_empty()
    }

    /// True if `note` passes both filters.
    pub fn matches(&self, note: &Note) -> bool {
        note.has_all_tags(&self.tag_ids) && note.matches_text(&self.query)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn note_at(millis: i64) -> Note {
        Note::new(from_millis(millis).unwrap())
    }

    #[test]
    fn test_now_is_millisecond_precise() {
        let t = now();
        assert_eq!(t.timestamp_subsec_nanos() % 1_000_000, 0);
        assert_eq!(from_millis(t.timestamp_millis()), Some(t));
    }

    #[test]
    fn test_ids_round_trip_through_strings() {
        let id = NoteId::new();
        assert_eq!(id.to_string().parse::<NoteId>().unwrap(), id);
        assert!(TagId::parse("nope").is_err());
        assert_eq!(id.as_uuid().get_version_num(), 7);
        assert_eq!(TagId::new().as_uuid().get_version_num(), 4);
    }

    #[test]
    fn test_set_content_keeps_text_in_sync() {
        let mut note = note_at(1_000);
        note.set_content(Document::from_plain_text("Apple pie"), from_millis(2_000).unwrap());

        assert_eq!(note.text(), "Apple pie");
        assert_eq!(note.updated_at().timestamp_millis(), 2_000);
        assert_eq!(note.created_at().timestamp_millis(), 1_000);
    }

    #[test]
    fn test_tag_ids_are_a_set() {
        let mut note = note_at(0);
        let a = TagId::new();
        assert!(note.set_tag_ids([a, a]));
        assert_eq!(note.tag_ids().len(), 1);
        assert!(!note.set_tag_ids([a]));
    }

    #[test]
    fn test_has_all_tags_is_superset_test() {
        let (a, b) = (TagId::new(), TagId::new());
        let mut note = note_at(0);
        note.set_tag_ids([a]);

        assert!(note.has_all_tags(&BTreeSet::new()));
        assert!(note.has_all_tags(&[a].into_iter().collect()));
        assert!(!note.has_all_tags(&[a, b].into_iter().collect()));
    }

    #[test]
    fn test_text_match_ignores_ascii_case() {
        assert!(contains_ignore_ascii_case("Apple pie", "APPLE"));
        assert!(contains_ignore_ascii_case("Apple pie", ""));
        assert!(!contains_ignore_ascii_case("Apple pie", "crumble"));
    }

    #[test]
    fn test_pagination() {
        assert!(Pagination::new(0, 10).is_err());
        let p = Pagination::new(3, 2).unwrap();
        assert_eq!(p.offset(), 4);
        let items: Vec<i32> = (0..9).collect();
        assert_eq!(p.slice(items.clone()), vec![4, 5]);
        assert_eq!(Pagination::new(9, 2).unwrap().slice(items), Vec::<i32>::new());
        assert_eq!(Pagination::first(0).slice(vec![1, 2]), Vec::<i32>::new());
    }

    #[test]
    fn test_pagination_deserialize_validates() {
        assert!(serde_json::from_str::<Pagination>(r#"{"page":0,"limit":5}"#).is_err());
        let p: Pagination = serde_json::from_str(r#"{"page":2,"limit":5}"#).unwrap();
        assert_eq!(p.offset(), 5);
    }

    #[test]
    fn test_note_compare_breaks_ties_by_id_ascending() {
        let a = note_at(5);
        let b = note_at(5);
        let (lo, hi) = if a.id() < b.id() { (&a, &b) } else { (&b, &a) };

        for order in [SortOrder::Asc, SortOrder::Desc] {
            assert_eq!(NoteOrderBy::CreatedAt.compare(order, lo, hi), Ordering::Less);
        }

        let older = note_at(1);
        let newer = note_at(2);
        assert_eq!(
            NoteOrderBy::CreatedAt.compare(SortOrder::Desc, &newer, &older),
            Ordering::Less
        );
    }

    #[test]
    fn test_search_matches() {
        let tag = TagId::new();
        let mut note = note_at(0);
        note.set_content(Document::from_plain_text("Apple crumble"), now());
        note.set_tag_ids([tag]);

        let hit = NoteSearch::new(Pagination::first(10)).query("APPLE").tags([tag]);
        let miss = NoteSearch::new(Pagination::first(10)).query("pie");
        assert!(hit.matches(&note));
        assert!(!miss.matches(&note));
    }

    #[test]
    fn test_query_is_trimmed_before_matching() {
        let mut note = note_at(0);
        note.set_content(Document::from_plain_text("Apple-pie"), now());

        let search = NoteSearch::new(Pagination::first(10)).query(" pie");
        assert_eq!(search.text(), "pie");
        assert!(search.matches(&note));

        let blank = NoteSearch::new(Pagination::first(10)).query("   ");
        assert!(!blank.has_text_filter());
    }
}
