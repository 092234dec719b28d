//! Field paths, resource paths and document references.

use crate::error::{CodecError, CodecResult};
use std::fmt;

/// The reserved field path that addresses a document's name.
pub const DOCUMENT_ID_FIELD: &str = "__name__";

/// Characters that may not appear in a dotted string field path.
const RESERVED_DOTTED_CHARS: [char; 5] = ['~', '*', '/', '[', ']'];

/// A path to a (possibly nested) field inside a document.
///
/// Segments are stored unescaped. [`FieldPath::formatted_name`] produces
/// the escaped form used in field masks and transforms.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    /// Creates a path from raw segments. No segment may be empty.
    pub fn new<I, S>(segments: I) -> CodecResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(CodecError::invalid_path(
                "a field path needs at least one segment",
            ));
        }
        if segments.iter().any(String::is_empty) {
            return Err(CodecError::invalid_path(
                "field path segments must be non-empty",
            ));
        }
        Ok(Self { segments })
    }

    /// Parses a dot-separated path such as `"a.b.c"`.
    pub fn from_dotted(path: &str) -> CodecResult<Self> {
        if path.is_empty() {
            return Err(CodecError::invalid_path("field path cannot be empty"));
        }
        if let Some(c) = path.chars().find(|c| RESERVED_DOTTED_CHARS.contains(c)) {
            return Err(CodecError::invalid_path(format!(
                "field path \"{path}\" contains reserved character '{c}'"
            )));
        }
        if path.split('.').any(str::is_empty) {
            return Err(CodecError::invalid_path(format!(
                "field path \"{path}\" has an empty segment"
            )));
        }
        Ok(Self {
            segments: path.split('.').map(str::to_string).collect(),
        })
    }

    /// The path that addresses the document's own name.
    pub fn document_id() -> Self {
        Self {
            segments: vec![DOCUMENT_ID_FIELD.to_string()],
        }
    }

    /// A single-segment path; the segment is taken literally, dots included.
    pub(crate) fn literal(segment: impl Into<String>) -> Self {
        Self {
            segments: vec![segment.into()],
        }
    }

    /// Returns a new path with `segment` appended.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    /// Returns a new path with all of `other`'s segments appended.
    pub fn append(&self, other: &FieldPath) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self { segments }
    }

    /// The unescaped segments.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Always false; paths have at least one segment.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// True when `self` equals `other` or is an ancestor of it.
    pub fn is_prefix_of(&self, other: &FieldPath) -> bool {
        self.segments.len() <= other.segments.len()
            && self.segments.iter().zip(&other.segments).all(|(a, b)| a == b)
    }

    /// The canonical escaped representation, e.g. ``a.`b.c` ``.
    pub fn formatted_name(&self) -> String {
        self.segments
            .iter()
            .map(|s| escape_segment(s))
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.formatted_name())
    }
}

fn is_simple_segment(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

fn escape_segment(segment: &str) -> String {
    if is_simple_segment(segment) {
        return segment.to_string();
    }
    let mut out = String::with_capacity(segment.len() + 2);
    out.push('`');
    for c in segment.chars() {
        if c == '\\' || c == '`' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('`');
    out
}

/// Conversion into a [`FieldPath`].
///
/// Strings are parsed as dotted paths; [`FieldPath`] values pass through.
pub trait IntoFieldPath {
    /// Performs the conversion.
    fn into_field_path(self) -> CodecResult<FieldPath>;
}

impl IntoFieldPath for FieldPath {
    fn into_field_path(self) -> CodecResult<FieldPath> {
        Ok(self)
    }
}

impl IntoFieldPath for &FieldPath {
    fn into_field_path(self) -> CodecResult<FieldPath> {
        Ok(self.clone())
    }
}

impl IntoFieldPath for &str {
    fn into_field_path(self) -> CodecResult<FieldPath> {
        FieldPath::from_dotted(self)
    }
}

impl IntoFieldPath for String {
    fn into_field_path(self) -> CodecResult<FieldPath> {
        FieldPath::from_dotted(&self)
    }
}

impl IntoFieldPath for &String {
    fn into_field_path(self) -> CodecResult<FieldPath> {
        FieldPath::from_dotted(self)
    }
}

/// A slash-separated path to a collection or document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourcePath {
    segments: Vec<String>,
}

impl ResourcePath {
    /// Parses `"users/alice/posts"` style paths. Empty segments are rejected.
    pub fn parse(path: &str) -> CodecResult<Self> {
        let trimmed = path.trim_matches('/');
        if trimmed.is_empty() {
            return Ok(Self {
                segments: Vec::new(),
            });
        }
        if trimmed.contains("//") {
            return Err(CodecError::invalid_path(format!(
                "resource path \"{path}\" has an empty segment"
            )));
        }
        Ok(Self {
            segments: trimmed.split('/').map(str::to_string).collect(),
        })
    }

    /// The segments.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Documents have an even number of segments.
    pub fn is_document(&self) -> bool {
        !self.segments.is_empty() && self.segments.len() % 2 == 0
    }

    /// Collections have an odd number of segments.
    pub fn is_collection(&self) -> bool {
        self.segments.len() % 2 == 1
    }

    /// The last segment.
    pub fn id(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// The path with the last segment removed.
    pub fn parent(&self) -> Option<ResourcePath> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// The slash-joined relative path.
    pub fn relative_name(&self) -> String {
        self.segments.join("/")
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.relative_name())
    }
}

/// Identifies one database of one project.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DatabaseId {
    /// Project identifier.
    pub project_id: String,
    /// Database identifier, `"(default)"` unless configured otherwise.
    pub database_id: String,
}

impl DatabaseId {
    /// The default database name.
    pub const DEFAULT: &'static str = "(default)";

    /// Creates an id for a named database.
    pub fn new(project_id: impl Into<String>, database_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            database_id: database_id.into(),
        }
    }

    /// Creates an id for the project's default database.
    pub fn default_database(project_id: impl Into<String>) -> Self {
        Self::new(project_id, Self::DEFAULT)
    }

    /// `projects/{project}/databases/{database}`.
    pub fn formatted_name(&self) -> String {
        format!(
            "projects/{}/databases/{}",
            self.project_id, self.database_id
        )
    }

    /// `projects/{project}/databases/{database}/documents`.
    pub fn documents_root(&self) -> String {
        format!("{}/documents", self.formatted_name())
    }
}

/// A reference to a document location (the document may not exist).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentRef {
    database: DatabaseId,
    path: ResourcePath,
}

impl DocumentRef {
    /// Creates a reference from a slash-separated document path.
    pub fn new(database: DatabaseId, path: &str) -> CodecResult<Self> {
        let path = ResourcePath::parse(path)?;
        if !path.is_document() {
            return Err(CodecError::invalid_path(format!(
                "\"{path}\" is not a document path; it must have an even number of segments"
            )));
        }
        Ok(Self { database, path })
    }

    /// Parses a fully qualified name,
    /// `projects/{p}/databases/{d}/documents/{path}`.
    pub fn from_name(name: &str) -> CodecResult<Self> {
        let parts: Vec<&str> = name.splitn(6, '/').collect();
        match parts.as_slice() {
            ["projects", project, "databases", database, "documents", rest]
                if !project.is_empty() && !database.is_empty() =>
            {
                Self::new(DatabaseId::new(*project, *database), rest)
            }
            _ => Err(CodecError::invalid_path(format!(
                "\"{name}\" is not a fully qualified document name"
            ))),
        }
    }

    /// The owning database.
    pub fn database(&self) -> &DatabaseId {
        &self.database
    }

    /// The path relative to the database's document root.
    pub fn path(&self) -> &ResourcePath {
        &self.path
    }

    /// The document's own id.
    pub fn id(&self) -> &str {
        self.path.id().unwrap_or_default()
    }

    /// Fully qualified name sent over the wire.
    pub fn formatted_name(&self) -> String {
        format!("{}/{}", self.database.documents_root(), self.path)
    }
}

impl fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.formatted_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn dotted_paths_split_on_dots() {
        let path = FieldPath::from_dotted("a.b.c").unwrap();
        assert_eq!(path.segments(), &["a", "b", "c"]);
        assert_eq!(path.formatted_name(), "a.b.c");
    }

    #[test]
    fn dotted_paths_reject_bad_input() {
        assert!(FieldPath::from_dotted("").is_err());
        assert!(FieldPath::from_dotted("a..b").is_err());
        assert!(FieldPath::from_dotted(".a").is_err());
        assert!(FieldPath::from_dotted("a.").is_err());
        for bad in ["a~b", "a*b", "a/b", "a[0]", "a]"] {
            assert!(FieldPath::from_dotted(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn segments_are_escaped() {
        assert_eq!(FieldPath::literal("a.b").formatted_name(), "`a.b`");
        assert_eq!(FieldPath::literal("_x9").formatted_name(), "_x9");
        assert_eq!(FieldPath::literal("9x").formatted_name(), "`9x`");
        assert_eq!(FieldPath::literal("a`b").formatted_name(), "`a\\`b`");
        assert_eq!(FieldPath::literal("a\\b").formatted_name(), "`a\\\\b`");
        let nested = FieldPath::new(["foo", "bar.baz", "qux"]).unwrap();
        assert_eq!(nested.formatted_name(), "foo.`bar.baz`.qux");
    }

    #[test]
    fn empty_segments_are_rejected() {
        assert!(FieldPath::new(Vec::<String>::new()).is_err());
        assert!(FieldPath::new(["a", ""]).is_err());
    }

    #[test]
    fn prefix_relation() {
        let a = FieldPath::from_dotted("a").unwrap();
        let ab = FieldPath::from_dotted("a.b").unwrap();
        let ac = FieldPath::from_dotted("a.c").unwrap();
        assert!(a.is_prefix_of(&ab));
        assert!(ab.is_prefix_of(&ab));
        assert!(!ab.is_prefix_of(&a));
        assert!(!ab.is_prefix_of(&ac));
    }

    #[test]
    fn document_names_round_trip() {
        let db = DatabaseId::default_database("demo");
        let doc = DocumentRef::new(db.clone(), "users/alice").unwrap();
        assert_eq!(
            doc.formatted_name(),
            "projects/demo/databases/(default)/documents/users/alice"
        );
        assert_eq!(doc.id(), "alice");
        assert_eq!(DocumentRef::from_name(&doc.formatted_name()).unwrap(), doc);
    }

    #[test]
    fn collection_paths_are_not_documents() {
        let db = DatabaseId::default_database("demo");
        assert!(DocumentRef::new(db.clone(), "users").is_err());
        assert!(DocumentRef::new(db.clone(), "users//alice").is_err());
        assert!(DocumentRef::from_name("projects/demo/documents/users/alice").is_err());
    }

    proptest! {
        #[test]
        fn simple_segments_are_never_quoted(segment in "[_a-zA-Z][_a-zA-Z0-9]{0,12}") {
            prop_assert_eq!(FieldPath::literal(segment.clone()).formatted_name(), segment);
        }

        #[test]
        fn segments_with_dots_are_always_quoted(left in "[a-z]{1,5}", right in "[a-z]{1,5}") {
            let name = FieldPath::literal(format!("{left}.{right}")).formatted_name();
            prop_assert!(name.starts_with('`') && name.ends_with('`'));
        }
    }
}
