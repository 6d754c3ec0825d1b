//! DataFusion-backed dataset handle.
//!
//! One handle per transformed dataset, wrapping a [`SessionContext`] with the
//! dataset registered as a table. Resolution only ever reads: schema
//! introspection for column-existence validation, `SELECT DISTINCT` for
//! enumerable filter values, and `MIN`/`MAX` for unconfigured range bounds.
//! The handle is cheap to clone and safe to query concurrently.

use crate::errors::{Result, exec_err};
use datafusion::arrow::array::{Array, Float64Array, StringArray};
use datafusion::arrow::compute::cast;
use datafusion::arrow::datatypes::{DataType, SchemaRef};
use datafusion::prelude::{CsvReadOptions, ParquetReadOptions, SessionContext};
use log::debug;
use serde::Serialize;

/// A precomputed `(value, label)` pair for an enumerable filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrecomputedValue {
    /// The raw cell value the filter matches against.
    pub value: String,
    /// The display label produced by the configured label expression.
    pub label: String,
}

/// Read-only handle to one queryable dataset.
#[derive(Clone)]
pub struct DatasetHandle {
    name: String,
    table: String,
    ctx: SessionContext,
}

impl DatasetHandle {
    /// Wrap an already-registered table.
    pub fn new(name: impl Into<String>, table: impl Into<String>, ctx: SessionContext) -> Self {
        DatasetHandle {
            name: name.into(),
            table: table.into(),
            ctx,
        }
    }

    /// Register a parquet file in a fresh session and wrap it.
    pub async fn from_parquet(name: &str, path: &str) -> Result<Self> {
        let ctx = SessionContext::new();
        ctx.register_parquet(name, path, ParquetReadOptions::default())
            .await?;
        Ok(DatasetHandle::new(name, name, ctx))
    }

    /// Register a CSV file in a fresh session and wrap it.
    pub async fn from_csv(name: &str, path: &str) -> Result<Self> {
        let ctx = SessionContext::new();
        ctx.register_csv(name, path, CsvReadOptions::new()).await?;
        Ok(DatasetHandle::new(name, name, ctx))
    }

    /// Dataset name, as referenced by a view's `source`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Arrow schema of the underlying table.
    pub async fn schema(&self) -> Result<SchemaRef> {
        let provider = self.ctx.table_provider(self.table.as_str()).await?;
        Ok(provider.schema())
    }

    /// Whether a column of the given name exists in the table schema.
    pub async fn column_exists(&self, column: &str) -> Result<bool> {
        Ok(self.schema().await?.field_with_name(column).is_ok())
    }

    /// All column names, in schema order.
    pub async fn column_names(&self) -> Result<Vec<String>> {
        Ok(self
            .schema()
            .await?
            .fields()
            .iter()
            .map(|field| field.name().clone())
            .collect())
    }

    /// Distinct `(value, label)` pairs for an enumerable filter.
    ///
    /// Runs `SELECT DISTINCT <label_expr> AS label, <column> AS value`,
    /// excluding NULL values and ordering by label ascending. `label_expr`
    /// is a raw SQL expression from the configuration (e.g. lowercasing or
    /// prefixing the cell contents).
    pub async fn distinct_labeled_values(
        &self,
        value_column: &str,
        label_expr: &str,
    ) -> Result<Vec<PrecomputedValue>> {
        let sql = format!(
            "SELECT DISTINCT {label_expr} AS label, {value} AS value \
             FROM {table} WHERE {value} IS NOT NULL ORDER BY label ASC",
            value = quote_ident(value_column),
            table = quote_ident(&self.table),
        );
        debug!("distinct values for '{}': {sql}", self.name);

        let batches = self.ctx.sql(&sql).await?.collect().await?;
        let mut values = Vec::new();
        for batch in &batches {
            let labels = utf8_column(batch.column(0))?;
            let cells = utf8_column(batch.column(1))?;
            for row in 0..batch.num_rows() {
                let label = if labels.is_null(row) {
                    String::new()
                } else {
                    labels.value(row).to_string()
                };
                values.push(PrecomputedValue {
                    value: cells.value(row).to_string(),
                    label,
                });
            }
        }
        Ok(values)
    }

    /// Live `(MIN, MAX)` of a numeric column, used to freeze range-filter
    /// bounds when the configuration leaves them out.
    pub async fn scalar_range(&self, column: &str) -> Result<(f64, f64)> {
        let sql = format!(
            "SELECT CAST(MIN({column}) AS DOUBLE), CAST(MAX({column}) AS DOUBLE) FROM {table}",
            column = quote_ident(column),
            table = quote_ident(&self.table),
        );
        debug!("scalar range for '{}': {sql}", self.name);

        let batches = self.ctx.sql(&sql).await?.collect().await?;
        let batch = batches
            .first()
            .ok_or_else(|| exec_err(format!("no result computing range of '{column}'")))?;
        let lo = float64_value(batch.column(0).as_ref(), column)?;
        let hi = float64_value(batch.column(1).as_ref(), column)?;
        Ok((lo, hi))
    }
}

fn utf8_column(array: &dyn Array) -> Result<StringArray> {
    let casted = cast(array, &DataType::Utf8)
        .map_err(|e| exec_err(format!("cannot represent column as text: {e}")))?;
    Ok(casted
        .as_any()
        .downcast_ref::<StringArray>()
        .expect("cast to Utf8 yields StringArray")
        .clone())
}

fn float64_value(array: &dyn Array, column: &str) -> Result<f64> {
    let values = array
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| exec_err(format!("range bound for '{column}' is not numeric")))?;
    if values.is_empty() || values.is_null(0) {
        return Err(exec_err(format!(
            "column '{column}' has no values to derive range bounds from"
        )));
    }
    Ok(values.value(0))
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}
