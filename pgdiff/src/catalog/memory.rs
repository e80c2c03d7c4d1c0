use std::future::Future;
use std::sync::Arc;

use futures::stream;
use tokio::sync::Mutex;

use crate::catalog::{CatalogQuery, RowProducer, RowStream};
use crate::error::{PgDiffError, PgDiffResult};
use crate::types::CatalogRow;

#[derive(Debug)]
struct Inner {
    rows: Vec<CatalogRow>,
    error: Option<PgDiffError>,
    queries: Vec<CatalogQuery>,
}

/// In-memory row producer for tests.
///
/// Serves the same rows for every query and records the queries it receives. Cloning shares
/// the underlying state.
#[derive(Debug, Clone)]
pub struct MemoryRowProducer {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryRowProducer {
    pub fn new(rows: Vec<CatalogRow>) -> Self {
        Self::from_inner(Inner {
            rows,
            error: None,
            queries: Vec::new(),
        })
    }

    /// A producer whose queries fail with `error`.
    pub fn failing(error: PgDiffError) -> Self {
        Self::from_inner(Inner {
            rows: Vec::new(),
            error: Some(error),
            queries: Vec::new(),
        })
    }

    fn from_inner(inner: Inner) -> Self {
        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Returns every query executed so far, in order.
    pub async fn queries(&self) -> Vec<CatalogQuery> {
        self.inner.lock().await.queries.clone()
    }
}

impl RowProducer for MemoryRowProducer {
    fn fetch_rows(
        &self,
        query: &CatalogQuery,
    ) -> impl Future<Output = PgDiffResult<RowStream<'_>>> + Send {
        let query = query.clone();

        async move {
            let mut inner = self.inner.lock().await;
            inner.queries.push(query);

            if let Some(error) = &inner.error {
                return Err(error.clone());
            }

            let rows = inner.rows.clone();
            let stream: RowStream<'_> = Box::pin(stream::iter(rows.into_iter().map(Ok)));

            Ok(stream)
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::TryStreamExt;

    use super::*;
    use crate::error::ErrorKind;
    use crate::pgdiff_error;

    #[tokio::test]
    async fn serves_rows_and_records_queries() {
        let row: CatalogRow = [("compare_name", "r.t.c")].into_iter().collect();
        let producer = MemoryRowProducer::new(vec![row.clone()]);
        let query = CatalogQuery::new("SELECT 1").with_param("public");

        let rows: Vec<CatalogRow> = producer
            .fetch_rows(&query)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        assert_eq!(rows, vec![row]);
        assert_eq!(producer.queries().await, vec![query]);
    }

    #[tokio::test]
    async fn failing_producer_returns_its_error() {
        let producer = MemoryRowProducer::failing(pgdiff_error!(
            ErrorKind::PermissionDenied,
            "catalog access denied"
        ));

        let result = producer.fetch_rows(&CatalogQuery::new("SELECT 1")).await;

        assert_eq!(result.err().map(|err| err.kind()), Some(ErrorKind::PermissionDenied));
    }
}
