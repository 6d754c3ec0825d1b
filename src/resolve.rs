//! View resolution: group expansion, rank assignment, query-column
//! resolution, predicate compilation, distinct-value precomputation, and
//! final metadata assembly.
//!
//! Resolution is a single pass per view with no side effects on other views;
//! the catalog and dataset handles are read-only throughout, so independent
//! views could be resolved concurrently. Any error aborts the whole build
//! before anything is handed to the persistence collaborator.

use crate::catalog::{FilterCatalog, FilterDefinition, FilterKind};
use crate::config::{ColumnType, FilterType, MatchMode, RawColumn, RawView, RawViewFilterEntry};
use crate::dataset::{DatasetHandle, PrecomputedValue};
use crate::errors::{IdentifierKind, MetaError, Result};
use crate::predicate::{LocationPredicate, Predicate};
use log::{debug, warn};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

/// Distinct-set size above which a `select_list` filter draws a warning.
const DEFAULT_WARN_MAX: usize = 60;

/// A filter definition placed inside a group of one view, fully resolved.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedFilterInstance {
    /// Id of the underlying filter definition.
    pub filter_id: String,
    /// Display label, from the definition.
    pub label: String,
    /// Filter type.
    #[serde(rename = "type")]
    pub filter_type: FilterType,
    /// 1-based position within the owning group.
    pub rank: u32,
    /// Fully defaulted role to column mapping.
    pub query_columns: BTreeMap<String, String>,
    /// Compiled predicate descriptor.
    pub predicate: Predicate,
    /// Location query-string pattern, stored verbatim for the front end.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    /// Precomputed values for `select_list` filters.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<PrecomputedValue>,
    /// Shared reference to the owning catalog definition.
    #[serde(skip_serializing)]
    pub definition: Arc<FilterDefinition>,
}

/// A group of filters within a resolved view.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedGroup {
    /// Group id, unique within the view.
    pub group_id: String,
    /// Group display label.
    pub group_label: String,
    /// 1-based position within the view's filter list.
    pub rank: u32,
    /// Member filter instances, rank-ordered.
    pub filters: Vec<ResolvedFilterInstance>,
}

/// A fully resolved view column.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedColumn {
    /// Dataset column name.
    pub name: String,
    /// Display label.
    pub label: String,
    /// Rendering type.
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    /// Whether the front end may sort by this column.
    pub sortable: bool,
    /// Whether the column is hidden by default.
    pub hidden: bool,
    /// URL template for link-typed columns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Value delimiter for array-link columns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<String>,
    /// 1-based position within the view's column list.
    pub rank: u32,
    /// Whether the column is shown by default.
    pub enabled_by_default: bool,
}

/// The resolved metadata for one view, ready for persistence.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedView {
    /// View id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// URL path segment.
    pub url_name: String,
    /// Source dataset name.
    pub source: String,
    /// Filter groups, rank-ordered.
    pub groups: Vec<ResolvedGroup>,
    /// Columns, rank-ordered.
    pub columns: Vec<ResolvedColumn>,
}

/// A group after expansion, before per-filter resolution.
struct ExpandedGroup {
    group_id: String,
    group_label: String,
    members: Vec<Arc<FilterDefinition>>,
}

/// Resolves raw views against the filter catalog and dataset handles.
pub struct Resolver {
    catalog: FilterCatalog,
    datasets: HashMap<String, DatasetHandle>,
    column_overrides: HashMap<String, HashMap<String, RawColumn>>,
    warn_max: usize,
}

impl Resolver {
    /// Create a resolver over a validated catalog and the available datasets.
    ///
    /// # Errors
    ///
    /// Fails with [`MetaError::DuplicateIdentifier`] when two datasets share
    /// a name.
    pub fn new(catalog: FilterCatalog, datasets: Vec<DatasetHandle>) -> Result<Self> {
        let mut by_name = HashMap::new();
        for dataset in datasets {
            if by_name.contains_key(dataset.name()) {
                return Err(MetaError::DuplicateIdentifier {
                    kind: IdentifierKind::Dataset,
                    id: dataset.name().to_string(),
                });
            }
            by_name.insert(dataset.name().to_string(), dataset);
        }
        Ok(Resolver {
            catalog,
            datasets: by_name,
            column_overrides: HashMap::new(),
            warn_max: DEFAULT_WARN_MAX,
        })
    }

    /// Attach per-view column overrides, keyed by view id then column name.
    pub fn with_column_overrides(
        mut self,
        overrides: HashMap<String, HashMap<String, RawColumn>>,
    ) -> Self {
        self.column_overrides = overrides;
        self
    }

    /// Override the distinct-set size warning threshold.
    pub fn with_warn_max(mut self, warn_max: usize) -> Self {
        self.warn_max = warn_max;
        self
    }

    /// Resolve every view, then verify each catalog filter is referenced by
    /// at least one view.
    pub async fn resolve_all(&self, views: &[RawView]) -> Result<Vec<ResolvedView>> {
        let mut resolved = Vec::with_capacity(views.len());
        let mut used: HashSet<&str> = HashSet::new();
        for view in views {
            let output = self.resolve_view(view).await?;
            for group in &output.groups {
                for instance in &group.filters {
                    if let Some(definition) = self.catalog.get(&instance.filter_id) {
                        used.insert(definition.id.as_str());
                    }
                }
            }
            resolved.push(output);
        }
        for id in self.catalog.ids() {
            if !used.contains(id) {
                return Err(MetaError::UnusedFilter(id.to_string()));
            }
        }
        Ok(resolved)
    }

    /// Resolve a single view: expand groups, assign ranks, resolve and
    /// validate query columns, compile predicates, precompute enumerable
    /// values, and enrich columns.
    pub async fn resolve_view(&self, view: &RawView) -> Result<ResolvedView> {
        let dataset =
            self.datasets
                .get(&view.source)
                .ok_or_else(|| MetaError::UnknownDataset {
                    view_id: view.id.clone(),
                    dataset: view.source.clone(),
                })?;
        debug!("resolving view '{}' against dataset '{}'", view.id, view.source);

        let mut groups = Vec::new();
        for (group_index, expanded) in self.expand_groups(view)?.into_iter().enumerate() {
            let mut filters = Vec::new();
            for (filter_index, definition) in expanded.members.into_iter().enumerate() {
                let mut instance = self.resolve_filter(&definition, dataset).await?;
                instance.rank = rank(filter_index);
                filters.push(instance);
            }
            groups.push(ResolvedGroup {
                group_id: expanded.group_id,
                group_label: expanded.group_label,
                rank: rank(group_index),
                filters,
            });
        }

        let columns = self.resolve_columns(view, dataset).await?;

        Ok(ResolvedView {
            id: view.id.clone(),
            name: view.name.clone(),
            url_name: view.url_name.clone(),
            source: view.source.clone(),
            groups,
            columns,
        })
    }

    /// Normalize a view's filter list into a uniform group-to-filter shape.
    ///
    /// Standalone references become singleton groups inheriting the filter's
    /// id and label; explicit groups pass through. Declaration order fixes
    /// group rank.
    fn expand_groups(&self, view: &RawView) -> Result<Vec<ExpandedGroup>> {
        let mut groups = Vec::new();
        let mut group_ids: HashSet<String> = HashSet::new();
        for entry in &view.filters {
            let expanded = match entry {
                RawViewFilterEntry::Filter(reference) => {
                    let definition = self.lookup(view, &reference.filter_id)?;
                    ExpandedGroup {
                        group_id: definition.id.clone(),
                        group_label: definition.label.clone(),
                        members: vec![definition],
                    }
                }
                RawViewFilterEntry::Group {
                    group_id,
                    group_label,
                    filters,
                } => {
                    let members = filters
                        .iter()
                        .map(|reference| self.lookup(view, &reference.filter_id))
                        .collect::<Result<Vec<_>>>()?;
                    ExpandedGroup {
                        group_id: group_id.clone(),
                        group_label: group_label.clone(),
                        members,
                    }
                }
            };
            if !group_ids.insert(expanded.group_id.clone()) {
                return Err(MetaError::DuplicateIdentifier {
                    kind: IdentifierKind::Group,
                    id: expanded.group_id,
                });
            }
            groups.push(expanded);
        }
        Ok(groups)
    }

    fn lookup(&self, view: &RawView, filter_id: &str) -> Result<Arc<FilterDefinition>> {
        self.catalog
            .get(filter_id)
            .cloned()
            .ok_or_else(|| MetaError::UnknownFilterReference {
                view_id: view.id.clone(),
                filter_id: filter_id.to_string(),
            })
    }

    async fn resolve_filter(
        &self,
        definition: &Arc<FilterDefinition>,
        dataset: &DatasetHandle,
    ) -> Result<ResolvedFilterInstance> {
        let query_columns = resolve_query_columns(definition);
        for (role, column) in &query_columns {
            if !dataset.column_exists(column).await? {
                return Err(MetaError::UnknownColumn {
                    filter_id: definition.id.clone(),
                    role: role.clone(),
                    column: column.clone(),
                });
            }
        }

        let predicate = self.build_predicate(definition, &query_columns, dataset).await?;
        let values = self.precompute_values(definition, &query_columns, dataset).await?;
        let regex = match &definition.kind {
            FilterKind::Location { regex, .. } => Some(regex.clone()),
            _ => None,
        };

        Ok(ResolvedFilterInstance {
            filter_id: definition.id.clone(),
            label: definition.label.clone(),
            filter_type: definition.filter_type(),
            rank: 0, // assigned by the caller from group position
            query_columns,
            predicate,
            regex,
            values,
            definition: Arc::clone(definition),
        })
    }

    async fn build_predicate(
        &self,
        definition: &FilterDefinition,
        query_columns: &BTreeMap<String, String>,
        dataset: &DatasetHandle,
    ) -> Result<Predicate> {
        let single_column = || {
            query_columns
                .get("column")
                .cloned()
                .unwrap_or_else(|| definition.id.clone())
        };
        let predicate = match &definition.kind {
            FilterKind::Select { match_mode } => match match_mode {
                MatchMode::Exact => Predicate::Equals {
                    column: single_column(),
                },
                MatchMode::Prefix => Predicate::Prefix {
                    column: single_column(),
                },
            },
            FilterKind::SelectIn => Predicate::InSet {
                column: single_column(),
            },
            // Precomputed values are matched back by plain equality.
            FilterKind::SelectList { .. } => Predicate::Equals {
                column: single_column(),
            },
            FilterKind::ListContains => Predicate::ListContains {
                column: single_column(),
            },
            FilterKind::Range { min, max } => {
                let column = single_column();
                let (min, max) = match (*min, *max) {
                    (Some(min), Some(max)) => (min, max),
                    (min, max) => {
                        let (live_min, live_max) = dataset.scalar_range(&column).await?;
                        (min.unwrap_or(live_min), max.unwrap_or(live_max))
                    }
                };
                Predicate::Between { column, min, max }
            }
            FilterKind::Location { columns, .. } => {
                Predicate::Overlap(LocationPredicate::new(columns.clone()))
            }
        };
        Ok(predicate)
    }

    async fn precompute_values(
        &self,
        definition: &FilterDefinition,
        query_columns: &BTreeMap<String, String>,
        dataset: &DatasetHandle,
    ) -> Result<Vec<PrecomputedValue>> {
        let FilterKind::SelectList { filter_labels } = &definition.kind else {
            return Ok(Vec::new());
        };
        let value_column = query_columns
            .get("column")
            .map(String::as_str)
            .unwrap_or(definition.id.as_str());
        let values = dataset
            .distinct_labeled_values(value_column, filter_labels)
            .await?;
        if values.is_empty() {
            warn!("no values found for filter '{}'", definition.id);
        } else if values.len() > self.warn_max {
            warn!(
                "filter '{}' has {} distinct values (threshold {})",
                definition.id,
                values.len(),
                self.warn_max
            );
        }
        Ok(values)
    }

    /// Rank, enrich, and optionally extend the view's column list.
    async fn resolve_columns(
        &self,
        view: &RawView,
        dataset: &DatasetHandle,
    ) -> Result<Vec<ResolvedColumn>> {
        let dataset_columns = dataset.column_names().await?;
        let overrides = self.column_overrides.get(&view.id);
        let mut seen: HashSet<&str> = HashSet::new();
        let mut resolved = Vec::new();

        for (index, declared) in view.columns.iter().enumerate() {
            if !seen.insert(declared.name.as_str()) {
                return Err(MetaError::DuplicateIdentifier {
                    kind: IdentifierKind::Column,
                    id: declared.name.clone(),
                });
            }
            if !dataset_columns.iter().any(|name| name == &declared.name) {
                warn!(
                    "view '{}' declares column '{}' absent from dataset '{}'",
                    view.id, declared.name, view.source
                );
            }
            resolved.push(enrich_column(
                &declared.name,
                declared.enabled,
                rank(index),
                overrides,
            ));
        }

        if view.include_remaining_columns {
            let mut next = view.columns.len();
            for name in &dataset_columns {
                if !seen.contains(name.as_str()) {
                    resolved.push(enrich_column(name, true, rank(next), overrides));
                    next += 1;
                }
            }
        }

        Ok(resolved)
    }
}

/// Role-to-column resolution: explicit `query_columns` win, the single
/// `"column"` role defaults to the filter id, and location roles are always
/// explicit (enforced at catalog construction).
fn resolve_query_columns(definition: &FilterDefinition) -> BTreeMap<String, String> {
    let mut resolved = BTreeMap::new();
    match &definition.kind {
        FilterKind::Location { columns, .. } => {
            resolved.insert("region".to_string(), columns.region.clone());
            resolved.insert("start".to_string(), columns.start.clone());
            resolved.insert("end".to_string(), columns.end.clone());
            if let Some(strand) = &columns.strand {
                resolved.insert("strand".to_string(), strand.clone());
            }
            if let Some(bin) = &columns.bin {
                resolved.insert("bin".to_string(), bin.clone());
            }
        }
        _ => {
            let column = definition
                .column
                .clone()
                .unwrap_or_else(|| definition.id.clone());
            resolved.insert("column".to_string(), column);
        }
    }
    resolved
}

/// 1-based rank from a 0-based declaration index. Declared order is the
/// single source of truth; re-resolving the same input yields the same ranks.
fn rank(index: usize) -> u32 {
    index as u32 + 1
}

fn enrich_column(
    name: &str,
    enabled: bool,
    rank: u32,
    overrides: Option<&HashMap<String, RawColumn>>,
) -> ResolvedColumn {
    let override_column = overrides.and_then(|columns| columns.get(name));
    let label = override_column
        .and_then(|c| c.label.clone())
        .unwrap_or_else(|| derive_label(name));
    match override_column {
        Some(column) => ResolvedColumn {
            name: name.to_string(),
            label,
            column_type: column.column_type,
            sortable: column.sortable,
            hidden: column.hidden,
            url: column.url.clone(),
            delimiter: column.delimiter.clone(),
            rank,
            enabled_by_default: enabled,
        },
        None => ResolvedColumn {
            name: name.to_string(),
            label,
            column_type: ColumnType::Plain,
            sortable: true,
            hidden: false,
            url: None,
            delimiter: None,
            rank,
            enabled_by_default: enabled,
        },
    }
}

/// Default display label for a column: underscores to spaces, first letter
/// upper-cased.
fn derive_label(name: &str) -> String {
    let spaced = name.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => spaced,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_is_one_based_and_order_preserving() {
        let items = ["a", "b", "c"];
        let ranks: Vec<u32> = items.iter().enumerate().map(|(i, _)| rank(i)).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
        // Idempotent: same input, same ranks.
        let again: Vec<u32> = items.iter().enumerate().map(|(i, _)| rank(i)).collect();
        assert_eq!(ranks, again);
        // Reversed input reverses ranks.
        let reversed: Vec<(&str, u32)> = items
            .iter()
            .rev()
            .enumerate()
            .map(|(i, item)| (*item, rank(i)))
            .collect();
        assert_eq!(reversed, vec![("c", 1), ("b", 2), ("a", 3)]);
    }

    #[test]
    fn test_derive_label() {
        assert_eq!(derive_label("gene_symbol"), "Gene symbol");
        assert_eq!(derive_label("chrom"), "Chrom");
        assert_eq!(derive_label(""), "");
    }

    #[test]
    fn test_enrich_column_defaults() {
        let column = enrich_column("antibiotic_class", true, 3, None);
        assert_eq!(column.label, "Antibiotic class");
        assert_eq!(column.column_type, ColumnType::Plain);
        assert!(column.sortable);
        assert!(!column.hidden);
        assert_eq!(column.rank, 3);
    }

    #[test]
    fn test_enrich_column_override_wins() {
        let mut per_view = HashMap::new();
        per_view.insert(
            "accession".to_string(),
            RawColumn {
                label: Some("Accession".to_string()),
                sortable: false,
                hidden: true,
                column_type: ColumnType::Link,
                url: Some("https://example.org/{value}".to_string()),
                delimiter: None,
            },
        );
        let column = enrich_column("accession", false, 1, Some(&per_view));
        assert_eq!(column.column_type, ColumnType::Link);
        assert!(!column.sortable);
        assert!(column.hidden);
        assert_eq!(column.url.as_deref(), Some("https://example.org/{value}"));
        assert!(!column.enabled_by_default);
    }
}
