//! Catalog row producers.
//!
//! A [`RowProducer`] runs a [`CatalogQuery`] against one database and yields its rows as a
//! lazy, finite stream. Rows come back in whatever order the server returns them.

mod client;
mod memory;

use std::future::Future;
use std::pin::Pin;

use futures::Stream;

use crate::error::PgDiffResult;
use crate::types::CatalogRow;

pub use client::PgCatalogClient;
pub use memory::MemoryRowProducer;

/// Stream of decoded catalog rows. Not restartable.
pub type RowStream<'a> = Pin<Box<dyn Stream<Item = PgDiffResult<CatalogRow>> + Send + 'a>>;

/// A catalog query and its bound parameters.
///
/// Parameters are sent as text and referenced in the SQL as `$1`, `$2`, ...
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogQuery {
    pub sql: String,
    pub params: Vec<String>,
}

impl CatalogQuery {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn with_param(mut self, param: impl Into<String>) -> Self {
        self.params.push(param.into());
        self
    }
}

/// Source of catalog rows for one side of a diff.
pub trait RowProducer {
    /// Executes `query` and returns a stream of its rows.
    ///
    /// Execution errors are returned either here or as an item of the stream. Both are fatal
    /// to the run.
    fn fetch_rows(
        &self,
        query: &CatalogQuery,
    ) -> impl Future<Output = PgDiffResult<RowStream<'_>>> + Send;
}
