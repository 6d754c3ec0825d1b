//! Filter catalog: the read-only lookup table of validated filter definitions.
//!
//! Each configured filter becomes one tagged [`FilterKind`] variant. The
//! per-type required attributes are enforced here, at construction, so a
//! definition that survives catalog building is complete by construction and
//! later stages never re-check attribute presence.

use crate::config::{FilterType, MatchMode, RawFilter};
use crate::errors::{IdentifierKind, MetaError, Result};
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Semantic roles accepted by the single-column filter types.
const SINGLE_ROLES: &[&str] = &["column"];
/// Semantic roles accepted by location filters.
const LOCATION_ROLES: &[&str] = &["region", "start", "end", "strand", "bin"];
/// Named capture groups a location regex must define.
const REQUIRED_CAPTURES: &[&str] = &["region", "start", "end"];

/// Resolved column names for the location roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocationColumns {
    /// Column holding the region (chromosome/contig) name.
    pub region: String,
    /// Column holding the feature start coordinate.
    pub start: String,
    /// Column holding the feature end coordinate.
    pub end: String,
    /// Optional column holding the strand.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strand: Option<String>,
    /// Optional column holding the precomputed UCSC bin number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bin: Option<String>,
}

/// Type-specific payload of a filter definition.
///
/// One variant per filter type; each variant carries exactly the attributes
/// its type requires, so "forgot to check this field" cannot happen past
/// construction.
#[derive(Debug, Clone)]
pub enum FilterKind {
    /// Single-value match.
    Select {
        /// Exact or prefix matching.
        match_mode: MatchMode,
    },
    /// Membership test; always exact matching.
    SelectIn,
    /// Single-value match against dataset-precomputed values.
    SelectList {
        /// SQL expression producing the display label for each distinct value.
        filter_labels: String,
    },
    /// Membership test inside an array-valued column.
    ListContains,
    /// Numeric bounds test.
    Range {
        /// Configured lower bound; computed from the data when absent.
        min: Option<f64>,
        /// Configured upper bound; computed from the data when absent.
        max: Option<f64>,
    },
    /// Genomic-coordinate overlap test.
    Location {
        /// Columns for the location roles; all required roles are explicit.
        columns: LocationColumns,
        /// Validated named-capture pattern, stored verbatim for the
        /// downstream query-string parser.
        regex: String,
    },
}

impl FilterKind {
    /// The filter type this variant implements.
    pub fn filter_type(&self) -> FilterType {
        match self {
            FilterKind::Select { .. } => FilterType::Select,
            FilterKind::SelectIn => FilterType::SelectIn,
            FilterKind::SelectList { .. } => FilterType::SelectList,
            FilterKind::ListContains => FilterType::ListContains,
            FilterKind::Range { .. } => FilterType::Range,
            FilterKind::Location { .. } => FilterType::Location,
        }
    }
}

/// A validated, immutable filter definition.
///
/// Owned exclusively by the [`FilterCatalog`]; views reference definitions by
/// id and resolution shares them via [`Arc`], never by mutated copies.
#[derive(Debug, Clone)]
pub struct FilterDefinition {
    /// Unique filter id.
    pub id: String,
    /// Display label.
    pub label: String,
    /// Type-specific payload.
    pub kind: FilterKind,
    /// Explicit column for the single `"column"` role, when configured.
    /// `None` means the role defaults to the filter id at resolution time.
    pub column: Option<String>,
}

impl FilterDefinition {
    /// Validate a raw record into a definition.
    ///
    /// # Errors
    ///
    /// - [`MetaError::MissingRequiredAttribute`] when a type-required
    ///   attribute is absent
    /// - [`MetaError::InvalidAttribute`] when `match` carries a value the
    ///   type does not accept
    /// - [`MetaError::InvalidRole`] when `query_columns` holds a role key the
    ///   type does not know
    /// - [`MetaError::InvalidRegex`] when a location pattern fails to compile
    ///   or lacks a required named capture group
    pub fn from_raw(raw: &RawFilter) -> Result<Self> {
        let filter_type = raw.filter_type;
        let kind = match filter_type {
            FilterType::Select => {
                check_roles(raw, SINGLE_ROLES)?;
                let match_mode = required(raw, raw.match_mode, "match")?;
                FilterKind::Select { match_mode }
            }
            FilterType::SelectIn => {
                check_roles(raw, SINGLE_ROLES)?;
                let match_mode = required(raw, raw.match_mode, "match")?;
                if match_mode != MatchMode::Exact {
                    return Err(MetaError::InvalidAttribute {
                        filter_id: raw.id.clone(),
                        attribute: "match",
                        reason: "must be 'exact' for select_in".to_string(),
                    });
                }
                FilterKind::SelectIn
            }
            FilterType::SelectList => {
                // select_list has no query_columns; the value column is
                // always the filter id.
                check_roles(raw, &[])?;
                let filter_labels = required(raw, raw.filter_labels.clone(), "filter_labels")?;
                FilterKind::SelectList { filter_labels }
            }
            FilterType::ListContains => {
                check_roles(raw, SINGLE_ROLES)?;
                FilterKind::ListContains
            }
            FilterType::Range => {
                check_roles(raw, SINGLE_ROLES)?;
                FilterKind::Range {
                    min: raw.min,
                    max: raw.max,
                }
            }
            FilterType::Location => {
                check_roles(raw, LOCATION_ROLES)?;
                let columns = LocationColumns {
                    region: required_role(raw, "region")?,
                    start: required_role(raw, "start")?,
                    end: required_role(raw, "end")?,
                    strand: raw.query_columns.get("strand").cloned(),
                    bin: raw.query_columns.get("bin").cloned(),
                };
                let pattern = required(raw, raw.regex.clone(), "regex")?;
                validate_location_regex(&raw.id, &pattern)?;
                FilterKind::Location {
                    columns,
                    regex: pattern,
                }
            }
        };

        Ok(FilterDefinition {
            id: raw.id.clone(),
            label: raw.label.clone(),
            kind,
            column: raw.query_columns.get("column").cloned(),
        })
    }

    /// The filter type of this definition.
    pub fn filter_type(&self) -> FilterType {
        self.kind.filter_type()
    }
}

/// Read-only lookup table of filter definitions, keyed by id.
///
/// Built once before resolution begins and never mutated afterward, so it is
/// safe to read concurrently from parallel view-resolution tasks.
#[derive(Debug, Default)]
pub struct FilterCatalog {
    filters: HashMap<String, Arc<FilterDefinition>>,
    order: Vec<String>,
}

impl FilterCatalog {
    /// Validate every raw filter and build the catalog.
    ///
    /// # Errors
    ///
    /// Propagates per-definition validation errors and fails with
    /// [`MetaError::DuplicateIdentifier`] when two filters share an id.
    pub fn from_raw(raw_filters: &[RawFilter]) -> Result<Self> {
        let mut catalog = FilterCatalog::default();
        for raw in raw_filters {
            let definition = FilterDefinition::from_raw(raw)?;
            if catalog.filters.contains_key(&definition.id) {
                return Err(MetaError::DuplicateIdentifier {
                    kind: IdentifierKind::Filter,
                    id: definition.id,
                });
            }
            catalog.order.push(definition.id.clone());
            catalog
                .filters
                .insert(definition.id.clone(), Arc::new(definition));
        }
        Ok(catalog)
    }

    /// Look up a definition by id.
    pub fn get(&self, id: &str) -> Option<&Arc<FilterDefinition>> {
        self.filters.get(id)
    }

    /// Filter ids in declaration order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Number of definitions in the catalog.
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

fn required<T>(raw: &RawFilter, value: Option<T>, attribute: &'static str) -> Result<T> {
    value.ok_or_else(|| MetaError::MissingRequiredAttribute {
        filter_id: raw.id.clone(),
        filter_type: raw.filter_type.as_str(),
        attribute,
    })
}

fn required_role(raw: &RawFilter, role: &'static str) -> Result<String> {
    raw.query_columns.get(role).cloned().ok_or_else(|| {
        MetaError::MissingRequiredAttribute {
            filter_id: raw.id.clone(),
            filter_type: raw.filter_type.as_str(),
            attribute: match role {
                "region" => "query_columns.region",
                "start" => "query_columns.start",
                _ => "query_columns.end",
            },
        }
    })
}

fn check_roles(raw: &RawFilter, allowed: &[&str]) -> Result<()> {
    for role in raw.query_columns.keys() {
        if !allowed.contains(&role.as_str()) {
            return Err(MetaError::InvalidRole {
                filter_id: raw.id.clone(),
                filter_type: raw.filter_type.as_str(),
                role: role.clone(),
            });
        }
    }
    Ok(())
}

/// Compile the pattern and check its named groups cover the required roles.
/// The engine never evaluates the pattern itself; a downstream consumer uses
/// it to parse raw location-query strings.
fn validate_location_regex(filter_id: &str, pattern: &str) -> Result<()> {
    let compiled = Regex::new(pattern).map_err(|e| MetaError::InvalidRegex {
        filter_id: filter_id.to_string(),
        reason: e.to_string(),
    })?;
    let captures: Vec<&str> = compiled.capture_names().flatten().collect();
    for required in REQUIRED_CAPTURES {
        if !captures.contains(required) {
            return Err(MetaError::InvalidRegex {
                filter_id: filter_id.to_string(),
                reason: format!("missing named capture group '{required}'"),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilterType;
    use std::collections::BTreeMap;

    const LOCATION_REGEX: &str = r"(?P<region>[^:]+):(?P<start>\d+)-(?P<end>\d+):?(?P<strand>[+-])?";

    fn raw(id: &str, filter_type: FilterType) -> RawFilter {
        RawFilter {
            id: id.to_string(),
            label: id.to_string(),
            filter_type,
            match_mode: None,
            filter_labels: None,
            min: None,
            max: None,
            query_columns: BTreeMap::new(),
            regex: None,
        }
    }

    fn location_raw(id: &str) -> RawFilter {
        let mut filter = raw(id, FilterType::Location);
        filter.query_columns = BTreeMap::from([
            ("region".to_string(), "chrom".to_string()),
            ("start".to_string(), "start".to_string()),
            ("end".to_string(), "end".to_string()),
        ]);
        filter.regex = Some(LOCATION_REGEX.to_string());
        filter
    }

    #[test]
    fn test_select_requires_match() {
        let err = FilterDefinition::from_raw(&raw("gene", FilterType::Select)).unwrap_err();
        assert!(matches!(
            err,
            MetaError::MissingRequiredAttribute { attribute: "match", .. }
        ));

        let mut with_match = raw("gene", FilterType::Select);
        with_match.match_mode = Some(MatchMode::Prefix);
        let definition = FilterDefinition::from_raw(&with_match).unwrap();
        assert!(matches!(
            definition.kind,
            FilterKind::Select { match_mode: MatchMode::Prefix }
        ));
    }

    #[test]
    fn test_select_in_rejects_prefix() {
        let mut filter = raw("species", FilterType::SelectIn);
        filter.match_mode = Some(MatchMode::Prefix);
        let err = FilterDefinition::from_raw(&filter).unwrap_err();
        assert!(matches!(err, MetaError::InvalidAttribute { attribute: "match", .. }));
    }

    #[test]
    fn test_select_list_requires_labels() {
        let err = FilterDefinition::from_raw(&raw("species", FilterType::SelectList)).unwrap_err();
        assert!(matches!(
            err,
            MetaError::MissingRequiredAttribute { attribute: "filter_labels", .. }
        ));
    }

    #[test]
    fn test_select_list_rejects_query_columns() {
        let mut filter = raw("species", FilterType::SelectList);
        filter.filter_labels = Some("upper(species)".to_string());
        filter
            .query_columns
            .insert("column".to_string(), "species_name".to_string());
        let err = FilterDefinition::from_raw(&filter).unwrap_err();
        assert!(matches!(err, MetaError::InvalidRole { .. }));
    }

    #[test]
    fn test_range_bounds_are_optional() {
        let definition = FilterDefinition::from_raw(&raw("length", FilterType::Range)).unwrap();
        assert!(matches!(
            definition.kind,
            FilterKind::Range { min: None, max: None }
        ));
    }

    #[test]
    fn test_location_requires_all_coordinate_roles() {
        let mut filter = location_raw("loc");
        filter.query_columns.remove("end");
        let err = FilterDefinition::from_raw(&filter).unwrap_err();
        assert!(matches!(
            err,
            MetaError::MissingRequiredAttribute { attribute: "query_columns.end", .. }
        ));
    }

    #[test]
    fn test_location_requires_regex() {
        let mut filter = location_raw("loc");
        filter.regex = None;
        let err = FilterDefinition::from_raw(&filter).unwrap_err();
        assert!(matches!(
            err,
            MetaError::MissingRequiredAttribute { attribute: "regex", .. }
        ));
    }

    #[test]
    fn test_location_regex_missing_capture_group() {
        let mut filter = location_raw("loc");
        filter.regex = Some(r"(?P<region>[^:]+):(?P<start>\d+)".to_string());
        let err = FilterDefinition::from_raw(&filter).unwrap_err();
        match err {
            MetaError::InvalidRegex { reason, .. } => assert!(reason.contains("end")),
            other => panic!("expected InvalidRegex, got {other:?}"),
        }
    }

    #[test]
    fn test_location_regex_compile_failure() {
        let mut filter = location_raw("loc");
        filter.regex = Some("(".to_string());
        assert!(matches!(
            FilterDefinition::from_raw(&filter).unwrap_err(),
            MetaError::InvalidRegex { .. }
        ));
    }

    #[test]
    fn test_location_rejects_unknown_role() {
        let mut filter = location_raw("loc");
        filter
            .query_columns
            .insert("contig".to_string(), "chrom".to_string());
        assert!(matches!(
            FilterDefinition::from_raw(&filter).unwrap_err(),
            MetaError::InvalidRole { role, .. } if role == "contig"
        ));
    }

    #[test]
    fn test_catalog_rejects_duplicate_ids() {
        let mut gene = raw("gene", FilterType::Select);
        gene.match_mode = Some(MatchMode::Exact);
        let err = FilterCatalog::from_raw(&[gene.clone(), gene]).unwrap_err();
        assert!(matches!(
            err,
            MetaError::DuplicateIdentifier { kind: IdentifierKind::Filter, .. }
        ));
    }

    #[test]
    fn test_catalog_preserves_declaration_order() {
        let mut first = raw("a", FilterType::Select);
        first.match_mode = Some(MatchMode::Exact);
        let second = raw("b", FilterType::ListContains);
        let catalog = FilterCatalog::from_raw(&[first, second]).unwrap();
        assert_eq!(catalog.ids().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(catalog.len(), 2);
    }
}
