//! Filter/view resolution engine for browser metadata builds.
//!
//! This crate turns declarative browser configuration (filters, views,
//! columns) plus a queryable dataset into fully resolved metadata for a
//! data-browsing front end. It includes:
//!
//! - **Filter catalog**: per-type required-attribute validation as tagged
//!   variant constructors
//! - **View resolution**: group expansion, declaration-order ranking,
//!   query-column resolution and schema cross-validation
//! - **Predicate compilation**: one abstract descriptor per filter type,
//!   including a UCSC-binned genomic overlap predicate
//! - **Distinct-value precomputation**: `(value, label)` enumeration for
//!   `select_list` filters, via Apache DataFusion
//!
//! The configuration arrives already parsed and schema-valid; datasets are
//! handed over as registered DataFusion tables. Persisting the resolved
//! output is the caller's concern.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use datafusion_browser_meta::{DatasetHandle, FilterCatalog, Resolver};
//! use datafusion_browser_meta::config::Config;
//!
//! # async fn example(config: Config) -> datafusion_browser_meta::Result<()> {
//! let catalog = FilterCatalog::from_raw(&config.filters)?;
//! let dataset = DatasetHandle::from_parquet("amr", "release/amr.parquet").await?;
//! let resolver = Resolver::new(catalog, vec![dataset])?
//!     .with_column_overrides(config.columns.clone());
//! let resolved = resolver.resolve_all(&config.views).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`catalog`]: validated filter definitions and the read-only lookup table
//! - [`binning`]: UCSC hierarchical interval binning
//! - [`predicate`]: predicate descriptors and the location overlap engine
//! - [`dataset`]: DataFusion-backed dataset handle
//! - [`resolve`]: the resolution pipeline and its output graph

#![warn(missing_docs)]

/// UCSC-style hierarchical interval binning.
pub mod binning;
/// Filter catalog and tagged filter definitions.
pub mod catalog;
/// Raw configuration records.
pub mod config;
/// DataFusion-backed dataset access.
pub mod dataset;
/// Error taxonomy.
pub mod errors;
/// Predicate descriptors and the location overlap engine.
pub mod predicate;
/// The resolution pipeline.
pub mod resolve;

pub use catalog::{FilterCatalog, FilterDefinition, FilterKind, LocationColumns};
pub use dataset::{DatasetHandle, PrecomputedValue};
pub use errors::{IdentifierKind, MetaError, Result};
pub use predicate::{LocationPredicate, LocationQuery, Predicate};
pub use resolve::{
    ResolvedColumn, ResolvedFilterInstance, ResolvedGroup, ResolvedView, Resolver,
};
