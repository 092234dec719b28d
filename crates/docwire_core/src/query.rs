//! Read targets: documents, queries and aggregations.

use docwire_codec::DocumentRef;
use docwire_protocol::{StructuredAggregationQuery, StructuredQuery};

/// A query that has already been serialized by the query layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    parent: String,
    structured_query: StructuredQuery,
}

impl Query {
    /// `parent` is the fully qualified resource the query runs under, such
    /// as `projects/p/databases/(default)/documents`.
    pub fn new(parent: impl Into<String>, structured_query: StructuredQuery) -> Self {
        Self {
            parent: parent.into(),
            structured_query,
        }
    }

    /// Parent resource name.
    pub fn parent(&self) -> &str {
        &self.parent
    }

    /// The serialized query.
    pub fn structured_query(&self) -> &StructuredQuery {
        &self.structured_query
    }
}

/// An aggregation over a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateQuery {
    parent: String,
    structured_aggregation_query: StructuredAggregationQuery,
}

impl AggregateQuery {
    /// Creates an aggregation running under `parent`.
    pub fn new(
        parent: impl Into<String>,
        structured_aggregation_query: StructuredAggregationQuery,
    ) -> Self {
        Self {
            parent: parent.into(),
            structured_aggregation_query,
        }
    }

    /// Parent resource name.
    pub fn parent(&self) -> &str {
        &self.parent
    }

    /// The serialized aggregation.
    pub fn structured_aggregation_query(&self) -> &StructuredAggregationQuery {
        &self.structured_aggregation_query
    }
}

/// Anything a transaction can read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadTarget {
    /// A single document.
    Document(DocumentRef),
    /// Every document matching a query.
    Query(Query),
    /// Aggregate values over a query.
    AggregateQuery(AggregateQuery),
}

impl From<DocumentRef> for ReadTarget {
    fn from(document: DocumentRef) -> Self {
        ReadTarget::Document(document)
    }
}

impl From<&DocumentRef> for ReadTarget {
    fn from(document: &DocumentRef) -> Self {
        ReadTarget::Document(document.clone())
    }
}

impl From<Query> for ReadTarget {
    fn from(query: Query) -> Self {
        ReadTarget::Query(query)
    }
}

impl From<&Query> for ReadTarget {
    fn from(query: &Query) -> Self {
        ReadTarget::Query(query.clone())
    }
}

impl From<AggregateQuery> for ReadTarget {
    fn from(query: AggregateQuery) -> Self {
        ReadTarget::AggregateQuery(query)
    }
}

impl From<&AggregateQuery> for ReadTarget {
    fn from(query: &AggregateQuery) -> Self {
        ReadTarget::AggregateQuery(query.clone())
    }
}
