use std::cmp::Ordering;
use std::ops::AddAssign;

use pgdiff_config::shared::StructuralErrorPolicy;
use tracing::{debug, error, info, warn};

use crate::diff::comparator::Comparator;
use crate::diff::output::{Statement, StatementSink};
use crate::error::{PgDiffError, PgDiffResult};

/// Counters collected during one merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Keys only present in the source.
    pub adds: usize,
    /// Keys only present in the target.
    pub drops: usize,
    /// Keys present on both sides, whether or not anything changed.
    pub changes: usize,
    /// Statements written to the sink.
    pub statements: usize,
    /// Times a branch ran against an exhausted cursor.
    pub fallbacks: usize,
    /// Structural errors written as comments under [`StructuralErrorPolicy::Report`].
    pub structural_errors: usize,
}

impl AddAssign for MergeStats {
    fn add_assign(&mut self, other: MergeStats) {
        self.adds += other.adds;
        self.drops += other.drops;
        self.changes += other.changes;
        self.statements += other.statements;
        self.fallbacks += other.fallbacks;
        self.structural_errors += other.structural_errors;
    }
}

/// Sorted-merge driver walking two comparators in lockstep.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffEngine {
    policy: StructuralErrorPolicy,
}

impl DiffEngine {
    pub fn new(policy: StructuralErrorPolicy) -> Self {
        Self { policy }
    }

    /// Merges `source` into `target`, writing statements for the target to `sink`.
    ///
    /// Both comparators must be positioned before their first row. Runs in O(n + m).
    pub fn run(
        &self,
        source: &mut dyn Comparator,
        target: &mut dyn Comparator,
        sink: &mut dyn StatementSink,
    ) -> PgDiffResult<MergeStats> {
        let object_kind = source.object_kind();
        let mut stats = MergeStats::default();
        let mut sink = CountingSink {
            inner: sink,
            statements: 0,
        };

        let mut more_source = source.advance();
        let mut more_target = target.advance();

        while more_source || more_target {
            let ordering = match source.compare(&*target) {
                Ok(ordering) => ordering,
                Err(err) => {
                    self.handle_structural_error(err, &mut sink, &mut stats)?;
                    Ordering::Greater
                }
            };

            match ordering {
                Ordering::Equal => {
                    debug!(key = ?source.current_key(), "keys match");
                    stats.changes += 1;
                    if let Err(err) = source.emit_change(&*target, &mut sink) {
                        self.handle_structural_error(err, &mut sink, &mut stats)?;
                    }
                    more_source = source.advance();
                    more_target = target.advance();
                }
                Ordering::Less if more_source => {
                    debug!(key = ?source.current_key(), "key missing from target");
                    stats.adds += 1;
                    source.emit_add(&mut sink)?;
                    more_source = source.advance();
                }
                Ordering::Less => {
                    warn!(
                        %object_kind,
                        key = ?target.current_key(),
                        "source is exhausted but ordered lower, dropping target row"
                    );
                    stats.fallbacks += 1;
                    stats.drops += 1;
                    target.emit_drop(&mut sink)?;
                    more_target = target.advance();
                }
                Ordering::Greater if more_target => {
                    debug!(key = ?target.current_key(), "key missing from source");
                    stats.drops += 1;
                    target.emit_drop(&mut sink)?;
                    more_target = target.advance();
                }
                Ordering::Greater => {
                    warn!(
                        %object_kind,
                        key = ?source.current_key(),
                        "target is exhausted but ordered lower, adding source row"
                    );
                    stats.fallbacks += 1;
                    stats.adds += 1;
                    source.emit_add(&mut sink)?;
                    more_source = source.advance();
                }
            }
        }

        stats.statements = sink.statements;

        info!(
            %object_kind,
            adds = stats.adds,
            drops = stats.drops,
            changes = stats.changes,
            statements = stats.statements,
            fallbacks = stats.fallbacks,
            "diff finished"
        );

        Ok(stats)
    }

    /// Propagates `err` unless it is structural and the policy says to report it.
    fn handle_structural_error(
        &self,
        err: PgDiffError,
        sink: &mut dyn StatementSink,
        stats: &mut MergeStats,
    ) -> PgDiffResult<()> {
        if !err.kind().is_structural() || self.policy == StructuralErrorPolicy::Abort {
            return Err(err);
        }

        let detail = err.detail().unwrap_or_else(|| err.description());
        error!(error = %err, "structural error during diff, continuing");
        sink.comment(&format!("Error: {detail}"))?;
        stats.structural_errors += 1;

        Ok(())
    }
}

struct CountingSink<'a> {
    inner: &'a mut dyn StatementSink,
    statements: usize,
}

impl StatementSink for CountingSink<'_> {
    fn emit(&mut self, statement: Statement) -> PgDiffResult<()> {
        self.inner.emit(statement)?;
        self.statements += 1;
        Ok(())
    }

    fn comment(&mut self, text: &str) -> PgDiffResult<()> {
        self.inner.comment(text)
    }
}
