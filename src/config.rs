//! Raw configuration records handed over by the configuration collaborator.
//!
//! These mirror the browser configuration format field-for-field. They arrive
//! already parsed and JSON-Schema-valid; everything beyond shape (required
//! attributes per filter type, identifier uniqueness, column existence) is
//! enforced during catalog construction and resolution.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// The closed set of supported filter types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterType {
    /// Single-value match, exact or prefix.
    Select,
    /// Membership test against a caller-supplied value set.
    SelectIn,
    /// Single-value match against values precomputed from the dataset.
    SelectList,
    /// Membership test inside an array-valued column.
    ListContains,
    /// Numeric bounds test.
    Range,
    /// Genomic-coordinate overlap test.
    Location,
}

impl FilterType {
    /// The configuration-format spelling of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterType::Select => "select",
            FilterType::SelectIn => "select_in",
            FilterType::SelectList => "select_list",
            FilterType::ListContains => "list_contains",
            FilterType::Range => "range",
            FilterType::Location => "location",
        }
    }
}

impl std::fmt::Display for FilterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Match mode for `select` filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// `column = :value`
    Exact,
    /// `column LIKE :value` with a trailing wildcard appended by the backend.
    Prefix,
}

/// Rendering type for a view column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    /// Plain cell contents.
    #[default]
    #[serde(rename = "string")]
    Plain,
    /// Cell rendered as a hyperlink built from `url`.
    #[serde(rename = "link")]
    Link,
    /// Delimited cell contents rendered as multiple hyperlinks.
    #[serde(rename = "array-link")]
    ArrayLink,
    /// Hyperlink whose visible text differs from the link target.
    #[serde(rename = "labelled-link")]
    LabelledLink,
}

/// A filter definition record, prior to catalog validation.
#[derive(Debug, Clone, Deserialize)]
pub struct RawFilter {
    /// Unique filter id.
    pub id: String,
    /// Human-readable label.
    pub label: String,
    /// Declared filter type.
    #[serde(rename = "type")]
    pub filter_type: FilterType,
    /// Match mode, required for `select` and `select_in`.
    #[serde(rename = "match")]
    pub match_mode: Option<MatchMode>,
    /// SQL expression producing the display label for `select_list` values.
    pub filter_labels: Option<String>,
    /// Configured lower bound for `range` filters.
    pub min: Option<f64>,
    /// Configured upper bound for `range` filters.
    pub max: Option<f64>,
    /// Semantic role to column name mapping.
    #[serde(default)]
    pub query_columns: BTreeMap<String, String>,
    /// Named-capture pattern for parsing raw location query strings.
    pub regex: Option<String>,
}

/// A reference to a catalog filter from inside a view.
#[derive(Debug, Clone, Deserialize)]
pub struct RawFilterRef {
    /// Id of the referenced filter.
    pub filter_id: String,
}

/// One entry in a view's filter list: either a standalone filter reference or
/// an explicit group of references.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawViewFilterEntry {
    /// An explicit group with its own id and label.
    Group {
        /// Group id, unique within the view.
        group_id: String,
        /// Group display label.
        group_label: String,
        /// Ordered member filter references.
        filters: Vec<RawFilterRef>,
    },
    /// A standalone filter reference, wrapped into a singleton group during expansion.
    Filter(RawFilterRef),
}

/// A column declared by a view.
#[derive(Debug, Clone, Deserialize)]
pub struct RawViewColumn {
    /// Dataset column name.
    pub name: String,
    /// Whether the column is shown by default.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// A view record, prior to resolution.
#[derive(Debug, Clone, Deserialize)]
pub struct RawView {
    /// Unique view id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// URL path segment for the front end.
    pub url_name: String,
    /// Name of the dataset this view reads from.
    pub source: String,
    /// Append dataset columns not named by this view after the declared ones.
    #[serde(default)]
    pub include_remaining_columns: bool,
    /// Ordered filter entries.
    pub filters: Vec<RawViewFilterEntry>,
    /// Ordered column declarations.
    pub columns: Vec<RawViewColumn>,
}

/// Column metadata carried by the configuration, used both for dataset-level
/// defaults and per-view overrides.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawColumn {
    /// Display label; derived from the column name when absent.
    pub label: Option<String>,
    /// Whether the front end may sort by this column.
    #[serde(default = "default_true")]
    pub sortable: bool,
    /// Whether the column is hidden by default.
    #[serde(default)]
    pub hidden: bool,
    /// Rendering type.
    #[serde(rename = "type", default)]
    pub column_type: ColumnType,
    /// URL template for link-typed columns.
    pub url: Option<String>,
    /// Value delimiter for array-link columns.
    pub delimiter: Option<String>,
}

/// The full parsed configuration object.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// All filter definitions.
    pub filters: Vec<RawFilter>,
    /// All views.
    pub views: Vec<RawView>,
    /// Per-view column overrides, keyed by view id then column name.
    #[serde(default)]
    pub columns: HashMap<String, HashMap<String, RawColumn>>,
}

fn default_true() -> bool {
    true
}
