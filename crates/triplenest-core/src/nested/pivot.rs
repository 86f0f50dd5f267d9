//! Call-scoped pivot tracking.

use std::collections::HashSet;

use crate::config::PivotOrder;
use crate::error::{Error, Result};

#[derive(Debug)]
struct Frame {
    last: Option<String>,
    // Values whose group already closed. Only kept for `PivotOrder::Verified`.
    closed: Option<HashSet<String>>,
}

/// Last pivot value of every active level.
///
/// A frame is pushed when a level starts streaming rows and popped when its
/// rows are exhausted, so the stack depth never exceeds the chain length.
#[derive(Debug)]
pub(crate) struct PivotStack {
    order: PivotOrder,
    frames: Vec<Frame>,
}

impl PivotStack {
    pub(crate) fn new(order: PivotOrder) -> Self {
        Self {
            order,
            frames: Vec::new(),
        }
    }

    /// Open the frame of a level that starts streaming.
    pub(crate) fn enter(&mut self) {
        let closed = match self.order {
            PivotOrder::Contiguous => None,
            PivotOrder::Verified => Some(HashSet::new()),
        };
        self.frames.push(Frame { last: None, closed });
    }

    /// Record the pivot value of the current row of `level`.
    ///
    /// Returns `true` when the value starts a new group.
    pub(crate) fn observe(&mut self, level: usize, value: &str) -> Result<bool> {
        let Some(frame) = self.frames.last_mut() else {
            return Err(Error::Document(format!(
                "pivot observed at level {} outside a level frame",
                level
            )));
        };
        if frame.last.as_deref() == Some(value) {
            return Ok(false);
        }

        let previous = frame.last.replace(value.to_string());
        if let Some(closed) = frame.closed.as_mut() {
            if closed.contains(value) {
                return Err(Error::UnorderedPivot {
                    level,
                    value: value.to_string(),
                });
            }
            if let Some(previous) = previous {
                closed.insert(previous);
            }
        }
        Ok(true)
    }

    /// Close the frame of the level whose rows are exhausted.
    pub(crate) fn exit(&mut self) {
        self.frames.pop();
    }

    pub(crate) fn depth(&self) -> usize {
        self.frames.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contiguous_detects_transitions() {
        let mut stack = PivotStack::new(PivotOrder::Contiguous);
        stack.enter();
        assert!(stack.observe(0, "a").unwrap());
        assert!(!stack.observe(0, "a").unwrap());
        assert!(stack.observe(0, "b").unwrap());
        // Unverified input simply starts a new group.
        assert!(stack.observe(0, "a").unwrap());
    }

    #[test]
    fn test_reentry_starts_fresh() {
        let mut stack = PivotStack::new(PivotOrder::Verified);
        stack.enter();
        assert!(stack.observe(0, "a").unwrap());
        stack.enter();
        assert!(stack.observe(1, "x").unwrap());
        stack.exit();
        stack.enter();
        assert!(stack.observe(1, "x").unwrap());
        assert_eq!(stack.depth(), 2);
        stack.exit();
        stack.exit();
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn test_verified_rejects_reappearing_value() {
        let mut stack = PivotStack::new(PivotOrder::Verified);
        stack.enter();
        stack.observe(2, "a").unwrap();
        stack.observe(2, "b").unwrap();
        let err = stack.observe(2, "a").unwrap_err();
        assert!(matches!(err, Error::UnorderedPivot { level: 2, ref value } if value == "a"));
    }

    #[test]
    fn test_observe_without_frame_fails() {
        let mut stack = PivotStack::new(PivotOrder::Contiguous);
        assert!(stack.observe(0, "a").is_err());
    }
}
