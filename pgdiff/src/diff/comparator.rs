use std::any::Any;
use std::cmp::Ordering;

use crate::bail;
use crate::diff::output::StatementSink;
use crate::error::{ErrorKind, PgDiffResult};
use crate::objects::ObjectKind;

/// One side of a diff: a sorted cursor over catalog rows of a single object kind.
///
/// The [`crate::diff::engine::DiffEngine`] only talks to this trait. Implementations must sort
/// their rows by the same key [`Comparator::compare`] uses, otherwise the merge silently
/// produces wrong output.
pub trait Comparator {
    /// Object kind of the rows behind this comparator.
    fn object_kind(&self) -> ObjectKind;

    /// Moves to the next row and returns whether the cursor points at one.
    ///
    /// Once it returns `false` every later call returns `false` as well.
    fn advance(&mut self) -> bool;

    /// Orders the current row of `self` against the current row of `other`.
    ///
    /// An exhausted cursor orders after every row. Fails with
    /// [`ErrorKind::ComparatorTypeMismatch`] when `other` is a different comparator type.
    fn compare(&self, other: &dyn Comparator) -> PgDiffResult<Ordering>;

    /// Sort key of the current row, `None` when there is no current row.
    fn current_key(&self) -> Option<Vec<String>>;

    /// Emits what the target database needs to gain the current row.
    fn emit_add(&self, sink: &mut dyn StatementSink) -> PgDiffResult<()>;

    /// Emits what the target database needs to lose the current row.
    fn emit_drop(&self, sink: &mut dyn StatementSink) -> PgDiffResult<()>;

    /// Emits the statements reconciling two rows with equal keys. Writes nothing when they
    /// already agree.
    fn emit_change(&self, other: &dyn Comparator, sink: &mut dyn StatementSink)
    -> PgDiffResult<()>;

    fn as_any(&self) -> &dyn Any;
}

/// Downcasts the peer of a comparator operation to the concrete type `T`.
pub fn downcast_peer<'a, T: 'static>(
    expected: ObjectKind,
    operation: &'static str,
    other: &'a dyn Comparator,
) -> PgDiffResult<&'a T> {
    match other.as_any().downcast_ref::<T>() {
        Some(peer) => Ok(peer),
        None => bail!(
            ErrorKind::ComparatorTypeMismatch,
            "Comparator peer has the wrong type",
            format!(
                "{operation} needs a {expected} comparator, got a {} comparator",
                other.object_kind()
            )
        ),
    }
}

/// Orders two optional keys, placing `None` (an exhausted cursor) after every key.
pub fn compare_cursor_keys<K: Ord>(left: Option<K>, right: Option<K>) -> Ordering {
    match (left, right) {
        (Some(left), Some(right)) => left.cmp(&right),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Forward-only position over materialized, sorted rows.
///
/// A new cursor points before the first row. After advancing past the last row it is
/// exhausted for good.
#[derive(Debug, Clone)]
pub struct Cursor<R> {
    rows: Vec<R>,
    position: Option<usize>,
    exhausted: bool,
}

impl<R> Cursor<R> {
    pub fn new(rows: Vec<R>) -> Self {
        Self {
            rows,
            position: None,
            exhausted: false,
        }
    }

    /// Moves to the next row. Returns `false` once past the last row.
    pub fn advance(&mut self) -> bool {
        if self.exhausted {
            return false;
        }

        let next = self.position.map_or(0, |position| position + 1);
        if next >= self.rows.len() {
            self.position = Some(self.rows.len());
            self.exhausted = true;
            return false;
        }

        self.position = Some(next);
        true
    }

    /// Returns the current row, or `None` before the first advance and once exhausted.
    pub fn current(&self) -> Option<&R> {
        self.position.and_then(|position| self.rows.get(position))
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn position(&self) -> Option<usize> {
        self.position
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
