// Worker Assignment

use std::fmt;
use std::ops::Range;

/// Contiguous slice of a role's endpoints driven by one worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerAssignment {
    pub worker_id: usize,
    /// Half-open endpoint index range; empty when the worker has nothing to drive
    pub range: Range<usize>,
}

impl WorkerAssignment {
    pub fn new(worker_id: usize, range: Range<usize>) -> Self {
        Self { worker_id, range }
    }

    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    /// Inclusive `(from, to)` bounds, `None` for an empty assignment
    pub fn bounds(&self) -> Option<(usize, usize)> {
        if self.is_empty() {
            None
        } else {
            Some((self.range.start, self.range.end - 1))
        }
    }
}

impl fmt::Display for WorkerAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bounds() {
            Some((from, to)) => write!(f, "[{}..{}]", from, to),
            None => f.write_str("[]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_are_inclusive() {
        let a = WorkerAssignment::new(1, 3..6);
        assert_eq!(a.bounds(), Some((3, 5)));
        assert_eq!(a.len(), 3);
        assert_eq!(a.to_string(), "[3..5]");
    }

    #[test]
    fn test_empty_assignment() {
        let a = WorkerAssignment::new(4, 2..2);
        assert!(a.is_empty());
        assert_eq!(a.bounds(), None);
        assert_eq!(a.to_string(), "[]");
    }
}
