//! Forward-only result cursors.

use crate::error::ExecutionError;

/// A forward-only, single-pass sequence of result rows.
///
/// `bindings` is stable for the lifetime of the cursor. `values` is only
/// meaningful after `advance` returned `true` and is parallel to `bindings`.
/// Once `advance` returns `false` the cursor stays exhausted.
pub trait ResultCursor {
    /// Names of the bindings of every row.
    fn bindings(&self) -> &[String];

    /// Move to the next row. Returns `false` when exhausted.
    fn advance(&mut self) -> Result<bool, ExecutionError>;

    /// Values of the current row.
    fn values(&self) -> &[String];
}

/// Cursor adapting an iterator of (fallible) rows.
pub struct IterCursor<I> {
    bindings: Vec<String>,
    rows: I,
    current: Vec<String>,
    exhausted: bool,
}

impl<I> IterCursor<I>
where
    I: Iterator<Item = Result<Vec<String>, ExecutionError>>,
{
    /// Wrap a provider iterator.
    pub fn new(bindings: Vec<String>, rows: I) -> Self {
        Self {
            bindings,
            rows,
            current: Vec::new(),
            exhausted: false,
        }
    }
}

/// Row iterator of a cursor over materialized rows.
pub type MaterializedRows = std::vec::IntoIter<Result<Vec<String>, ExecutionError>>;

impl IterCursor<MaterializedRows> {
    /// Cursor over fully materialized rows.
    pub fn from_rows(bindings: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let rows: Vec<_> = rows.into_iter().map(Ok).collect();
        IterCursor::new(bindings, rows.into_iter())
    }
}

impl<I> ResultCursor for IterCursor<I>
where
    I: Iterator<Item = Result<Vec<String>, ExecutionError>>,
{
    fn bindings(&self) -> &[String] {
        &self.bindings
    }

    fn advance(&mut self) -> Result<bool, ExecutionError> {
        if self.exhausted {
            return Ok(false);
        }
        match self.rows.next() {
            Some(Ok(row)) => {
                if row.len() != self.bindings.len() {
                    self.exhausted = true;
                    return Err(ExecutionError::rejected(format!(
                        "row has {} values but {} bindings",
                        row.len(),
                        self.bindings.len()
                    )));
                }
                self.current = row;
                Ok(true)
            }
            Some(Err(e)) => {
                self.exhausted = true;
                Err(e)
            }
            None => {
                self.exhausted = true;
                self.current.clear();
                Ok(false)
            }
        }
    }

    fn values(&self) -> &[String] {
        &self.current
    }
}

/// Drain a cursor into owned rows. Intended for tests and small results.
pub fn collect_rows<C: ResultCursor + ?Sized>(
    cursor: &mut C,
) -> Result<Vec<Vec<String>>, ExecutionError> {
    let mut rows = Vec::new();
    while cursor.advance()? {
        rows.push(cursor.values().to_vec());
    }
    Ok(rows)
}
