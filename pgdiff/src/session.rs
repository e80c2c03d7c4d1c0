use futures::TryStreamExt;
use tracing::{Instrument, info, info_span};

use crate::catalog::{CatalogQuery, RowProducer};
use crate::diff::output::{OutputLine, replay};
use crate::diff::{DiffContext, DiffEngine, MergeStats, StatementSink};
use crate::error::PgDiffResult;
use crate::objects::{ObjectKind, ObjectSelection};
use crate::types::CatalogRow;

/// One comparison run between a source and a target database.
///
/// For every object kind both catalogs are read concurrently and fully before merging. When
/// both reads fail the errors are aggregated. The output for a kind reaches the sink only
/// once its merge has succeeded.
#[derive(Debug)]
pub struct DiffSession<S, T> {
    source: S,
    target: T,
    context: DiffContext,
    engine: DiffEngine,
}

impl<S, T> DiffSession<S, T>
where
    S: RowProducer + Sync,
    T: RowProducer + Sync,
{
    pub fn new(source: S, target: T, context: DiffContext, engine: DiffEngine) -> Self {
        Self {
            source,
            target,
            context,
            engine,
        }
    }

    /// Diffs every kind in `selection`, in order. Stops at the first failing kind.
    pub async fn diff(
        &self,
        selection: ObjectSelection,
        sink: &mut dyn StatementSink,
    ) -> PgDiffResult<MergeStats> {
        let mut total = MergeStats::default();
        for kind in selection.kinds() {
            total += self.diff_kind(kind, sink).await?;
        }

        Ok(total)
    }

    /// Diffs one object kind.
    pub async fn diff_kind(
        &self,
        kind: ObjectKind,
        sink: &mut dyn StatementSink,
    ) -> PgDiffResult<MergeStats> {
        let span = info_span!("diff_kind", object_kind = %kind);

        async move {
            let source_query = kind.catalog_query(&self.context.source_scope)?;
            let target_query = kind.catalog_query(&self.context.target_scope)?;

            let (source_rows, target_rows) = match tokio::join!(
                fetch_rows(&self.source, &source_query),
                fetch_rows(&self.target, &target_query),
            ) {
                (Ok(source_rows), Ok(target_rows)) => (source_rows, target_rows),
                (Err(err), Ok(_)) | (Ok(_), Err(err)) => return Err(err),
                (Err(source_err), Err(target_err)) => {
                    return Err(vec![source_err, target_err].into());
                }
            };

            info!(
                source_rows = source_rows.len(),
                target_rows = target_rows.len(),
                "catalog rows fetched"
            );

            let mut source = kind.comparator(source_rows, &self.context)?;
            let mut target = kind.comparator(target_rows, &self.context)?;

            let mut buffer: Vec<OutputLine> = Vec::new();
            let stats = self
                .engine
                .run(source.as_mut(), target.as_mut(), &mut buffer)?;
            replay(buffer, sink)?;

            Ok(stats)
        }
        .instrument(span)
        .await
    }
}

async fn fetch_rows<P: RowProducer>(
    producer: &P,
    query: &CatalogQuery,
) -> PgDiffResult<Vec<CatalogRow>> {
    producer.fetch_rows(query).await?.try_collect().await
}
