//! Error taxonomy for metadata resolution.
//!
//! Every error here is a validation error discovered while resolving a
//! configuration against a dataset. Resolution is fail-fast: the first error
//! aborts the whole build and no partial metadata is produced.

use datafusion::error::DataFusionError;
use thiserror::Error;

/// The kind of identifier involved in a [`MetaError::DuplicateIdentifier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierKind {
    /// A filter id in the catalog.
    Filter,
    /// A group id within a view.
    Group,
    /// A column name within a view.
    Column,
    /// A dataset name.
    Dataset,
}

impl std::fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            IdentifierKind::Filter => "filter",
            IdentifierKind::Group => "group",
            IdentifierKind::Column => "column",
            IdentifierKind::Dataset => "dataset",
        };
        f.write_str(name)
    }
}

/// Errors surfaced during filter/view resolution.
#[derive(Debug, Error)]
pub enum MetaError {
    /// A type-specific required attribute is absent from a filter definition.
    #[error("filter '{filter_id}': required attribute '{attribute}' is missing for type '{filter_type}'")]
    MissingRequiredAttribute {
        /// Id of the offending filter.
        filter_id: String,
        /// Declared filter type.
        filter_type: &'static str,
        /// Name of the missing attribute.
        attribute: &'static str,
    },

    /// An attribute is present but carries a value the filter type does not accept.
    #[error("filter '{filter_id}': attribute '{attribute}' {reason}")]
    InvalidAttribute {
        /// Id of the offending filter.
        filter_id: String,
        /// Name of the attribute.
        attribute: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// A view references a filter id not present in the catalog.
    #[error("view '{view_id}' references unknown filter '{filter_id}'")]
    UnknownFilterReference {
        /// Id of the view holding the reference.
        view_id: String,
        /// The unresolved filter id.
        filter_id: String,
    },

    /// Two entities of the same kind share an identifier where uniqueness is required.
    #[error("duplicate {kind} identifier '{id}'")]
    DuplicateIdentifier {
        /// What kind of identifier collided.
        kind: IdentifierKind,
        /// The colliding identifier.
        id: String,
    },

    /// A resolved query column does not exist in the dataset schema.
    #[error("filter '{filter_id}': role '{role}' resolves to column '{column}' which does not exist in the dataset")]
    UnknownColumn {
        /// Id of the filter whose column failed validation.
        filter_id: String,
        /// Semantic role the column was resolved for.
        role: String,
        /// The missing column name.
        column: String,
    },

    /// A location regex fails to compile or lacks a required named capture group.
    #[error("filter '{filter_id}': invalid location regex: {reason}")]
    InvalidRegex {
        /// Id of the location filter.
        filter_id: String,
        /// Compile error or missing capture group description.
        reason: String,
    },

    /// A `query_columns` role is not applicable to the filter's type.
    #[error("filter '{filter_id}': role '{role}' is not applicable to type '{filter_type}'")]
    InvalidRole {
        /// Id of the offending filter.
        filter_id: String,
        /// Declared filter type.
        filter_type: &'static str,
        /// The rejected role key.
        role: String,
    },

    /// A catalog filter is referenced by no view.
    #[error("filter '{0}' is not referenced by any view")]
    UnusedFilter(String),

    /// A view names a dataset source that was not provided to the resolver.
    #[error("view '{view_id}' references unknown dataset '{dataset}'")]
    UnknownDataset {
        /// Id of the view.
        view_id: String,
        /// The unresolved dataset name.
        dataset: String,
    },

    /// An error bubbled up from DataFusion while querying the dataset.
    #[error(transparent)]
    DataFusion(#[from] DataFusionError),
}

pub(crate) fn exec_err<M: Into<String>>(message: M) -> MetaError {
    MetaError::DataFusion(DataFusionError::Execution(message.into()))
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, MetaError>;
