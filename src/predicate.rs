//! Abstract predicate descriptors compiled from resolved filter instances.
//!
//! Each filter type compiles to one descriptor: an operator plus resolved
//! column names and operand placeholders. Descriptors are what the
//! persistence collaborator stores; for live evaluation (and for tests) each
//! descriptor can also produce the equivalent DataFusion logical [`Expr`].
//!
//! The location descriptor is the algorithmic core: its per-query expression
//! prefixes the exact interval-overlap test with a UCSC bin membership check
//! (see [`crate::binning`]) so the scan can prune non-candidate rows on a
//! cheap equality column before the interval comparison runs.

use crate::binning::overlapping_bins;
use crate::catalog::LocationColumns;
use datafusion::logical_expr::{Expr, col, lit};
use datafusion::functions_nested::expr_fn::array_has;
use serde::Serialize;

/// A compiled predicate descriptor for one resolved filter instance.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "operator", rename_all = "snake_case")]
pub enum Predicate {
    /// `column = :value`
    Equals {
        /// Target column.
        column: String,
    },
    /// `column LIKE :value` — the backend appends the trailing `%`, so the
    /// supplied value must not already carry unintended wildcards.
    Prefix {
        /// Target column.
        column: String,
    },
    /// `column IN (:values...)`
    InSet {
        /// Target column.
        column: String,
    },
    /// `LIST_CONTAINS(column, :value)`
    ListContains {
        /// Array-valued target column.
        column: String,
    },
    /// `column BETWEEN :lo AND :hi`, with the slider bounds frozen at
    /// resolution time (configured, or the live data range).
    Between {
        /// Target column.
        column: String,
        /// Frozen lower bound.
        min: f64,
        /// Frozen upper bound.
        max: f64,
    },
    /// Genomic-coordinate overlap, optionally bin-prefiltered.
    Overlap(LocationPredicate),
}

impl Predicate {
    /// SQL template with named operand placeholders, for the persistence
    /// collaborator.
    pub fn sql(&self) -> String {
        match self {
            Predicate::Equals { column } => format!("{} = :value", quote(column)),
            Predicate::Prefix { column } => format!("{} LIKE :value", quote(column)),
            Predicate::InSet { column } => format!("{} IN (:values)", quote(column)),
            Predicate::ListContains { column } => {
                format!("LIST_CONTAINS({}, :value)", quote(column))
            }
            Predicate::Between { column, .. } => {
                format!("{} BETWEEN :lo AND :hi", quote(column))
            }
            Predicate::Overlap(location) => location.sql(),
        }
    }

    /// DataFusion expression for the single-value operators
    /// (`Equals`, `Prefix`, `ListContains`). `Prefix` appends the wildcard
    /// here, matching what the backend does with the template.
    pub fn value_expr(&self, value: &str) -> Option<Expr> {
        match self {
            Predicate::Equals { column } => Some(col(column.clone()).eq(lit(value))),
            Predicate::Prefix { column } => {
                Some(col(column.clone()).like(lit(format!("{value}%"))))
            }
            Predicate::ListContains { column } => {
                Some(array_has(col(column.clone()), lit(value)))
            }
            _ => None,
        }
    }

    /// DataFusion expression for the `InSet` operator.
    pub fn in_set_expr(&self, values: &[String]) -> Option<Expr> {
        match self {
            Predicate::InSet { column } => Some(col(column.clone()).in_list(
                values.iter().map(|v| lit(v.clone())).collect(),
                false,
            )),
            _ => None,
        }
    }

    /// DataFusion expression testing the frozen `Between` bounds.
    pub fn range_expr(&self) -> Option<Expr> {
        match self {
            Predicate::Between { column, min, max } => {
                Some(col(column.clone()).between(lit(*min), lit(*max)))
            }
            _ => None,
        }
    }
}

/// An incoming location query, already parsed from its raw string form by the
/// downstream consumer of the stored regex. Coordinates are a closed interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationQuery {
    /// Queried region (chromosome/contig) name.
    pub region: String,
    /// Query interval start.
    pub start: u64,
    /// Query interval end, inclusive.
    pub end: u64,
    /// Optional strand constraint.
    pub strand: Option<String>,
}

/// The compiled location overlap predicate.
#[derive(Debug, Clone, Serialize)]
pub struct LocationPredicate {
    /// Resolved columns for the location roles.
    pub columns: LocationColumns,
}

impl LocationPredicate {
    /// Compile from resolved location columns.
    pub fn new(columns: LocationColumns) -> Self {
        LocationPredicate { columns }
    }

    /// SQL template. The bin membership clause is per-query (the candidate
    /// set depends on the query range), so the template only carries the
    /// exact test; [`LocationPredicate::overlap_expr`] emits the optimized
    /// form.
    pub fn sql(&self) -> String {
        let LocationColumns {
            region,
            start,
            end,
            strand,
            ..
        } = &self.columns;
        let mut sql = format!(
            "{start} <= :end AND {end} >= :start AND {region} = :region",
            start = quote(start),
            end = quote(end),
            region = quote(region),
        );
        if let Some(strand) = strand {
            sql.push_str(&format!(" AND {} = :strand", quote(strand)));
        }
        sql
    }

    /// Candidate bin set for a query interval, or `None` when the filter has
    /// no bin column and the predicate degrades to the plain interval test.
    pub fn candidate_bins(&self, query: &LocationQuery) -> Option<Vec<u32>> {
        self.columns
            .bin
            .as_ref()
            .map(|_| overlapping_bins(query.start, query.end))
    }

    /// The full overlap expression for one query:
    ///
    /// ```text
    /// bin IN (<candidates>) AND start <= :end AND end >= :start
    ///     AND region = :region [AND strand = :strand]
    /// ```
    ///
    /// The bin clause is present only when the filter configures a bin
    /// column; it is a prefilter and never the correctness condition. The
    /// strand clause is present only when the filter configures a strand
    /// column *and* the query supplies a strand value.
    pub fn overlap_expr(&self, query: &LocationQuery) -> Expr {
        let columns = &self.columns;
        let mut expr = col(columns.start.clone())
            .lt_eq(lit(query.end))
            .and(col(columns.end.clone()).gt_eq(lit(query.start)))
            .and(col(columns.region.clone()).eq(lit(query.region.clone())));

        if let Some(bin_column) = &columns.bin {
            let bins = overlapping_bins(query.start, query.end);
            let bin_list = bins.into_iter().map(lit).collect();
            expr = col(bin_column.clone()).in_list(bin_list, false).and(expr);
        }

        if let (Some(strand_column), Some(strand)) = (&columns.strand, &query.strand) {
            expr = expr.and(col(strand_column.clone()).eq(lit(strand.clone())));
        }

        expr
    }
}

fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location() -> LocationPredicate {
        LocationPredicate::new(LocationColumns {
            region: "chrom".to_string(),
            start: "start".to_string(),
            end: "end".to_string(),
            strand: Some("strand".to_string()),
            bin: Some("bin".to_string()),
        })
    }

    fn query(region: &str, start: u64, end: u64) -> LocationQuery {
        LocationQuery {
            region: region.to_string(),
            start,
            end,
            strand: None,
        }
    }

    #[test]
    fn test_sql_templates() {
        assert_eq!(
            Predicate::Equals {
                column: "species".to_string()
            }
            .sql(),
            r#""species" = :value"#
        );
        assert_eq!(
            Predicate::Between {
                column: "length".to_string(),
                min: 1.0,
                max: 9.0,
            }
            .sql(),
            r#""length" BETWEEN :lo AND :hi"#
        );
        assert_eq!(
            location().sql(),
            r#""start" <= :end AND "end" >= :start AND "chrom" = :region AND "strand" = :strand"#
        );
    }

    #[test]
    fn test_prefix_appends_wildcard() {
        let predicate = Predicate::Prefix {
            column: "gene".to_string(),
        };
        let expr = predicate.value_expr("ab").unwrap();
        let expected = col("gene").like(lit("ab%"));
        assert_eq!(expr, expected);
    }

    #[test]
    fn test_in_set_expr() {
        let predicate = Predicate::InSet {
            column: "phenotype".to_string(),
        };
        let expr = predicate
            .in_set_expr(&["resistant".to_string(), "susceptible".to_string()])
            .unwrap();
        let expected = col("phenotype").in_list(vec![lit("resistant"), lit("susceptible")], false);
        assert_eq!(expr, expected);
    }

    #[test]
    fn test_value_expr_rejects_other_operators() {
        let predicate = Predicate::InSet {
            column: "phenotype".to_string(),
        };
        assert!(predicate.value_expr("x").is_none());
        assert!(predicate.range_expr().is_none());
    }

    #[test]
    fn test_overlap_expr_includes_bin_prefilter() {
        let expr = location().overlap_expr(&query("1", 150, 160));
        let rendered = format!("{expr}");
        assert!(rendered.contains("bin IN"));
        assert!(rendered.contains("start <= UInt64(160)"));
        assert!(rendered.contains("end >= UInt64(150)"));
        assert!(rendered.contains("chrom = Utf8(\"1\")"));
        // No strand supplied in the query, so no strand clause.
        assert!(!rendered.contains("strand"));
    }

    #[test]
    fn test_overlap_expr_degrades_without_bin_column() {
        let mut predicate = location();
        predicate.columns.bin = None;
        assert!(predicate.candidate_bins(&query("1", 150, 160)).is_none());
        let rendered = format!("{}", predicate.overlap_expr(&query("1", 150, 160)));
        assert!(!rendered.contains("IN"));
    }

    #[test]
    fn test_overlap_expr_strand_requires_both_sides() {
        // Configured strand column + supplied strand value.
        let mut with_strand = query("1", 100, 200);
        with_strand.strand = Some("+".to_string());
        let rendered = format!("{}", location().overlap_expr(&with_strand));
        assert!(rendered.contains("strand = Utf8(\"+\")"));

        // Configured strand column but no value in the query.
        let mut no_strand_column = location();
        no_strand_column.columns.strand = None;
        let rendered = format!("{}", no_strand_column.overlap_expr(&with_strand));
        assert!(!rendered.contains("strand"));
    }
}
