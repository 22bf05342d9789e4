//! Breakpoint recorder: an append-only, replayable trace of named state
//! snapshots taken while an algorithm runs.
//!
//! Every instrumented algorithm defines its own snapshot struct and calls
//! [`Trace::checkpoint`] at each named point. The snapshot is cloned at
//! record time, so the live table can keep being mutated in place without
//! ever changing what an earlier breakpoint observed. Recording is fully
//! synchronous; there are no suspension points.

use serde::Serialize;

/// One named snapshot. The previous breakpoint (for "the index was X"
/// style diffing in a renderer) is simply the preceding element of the
/// trace; see [`Trace::prev`].
#[derive(Debug, Clone, Serialize)]
pub struct Breakpoint<S> {
    pub point: &'static str,
    pub state: S,
}

/// An ordered sequence of breakpoints produced by one algorithm
/// invocation. Append-only: recorded breakpoints are never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct Trace<S> {
    steps: Vec<Breakpoint<S>>,
}

impl<S: Clone> Trace<S> {
    pub fn new() -> Self {
        Trace { steps: Vec::new() }
    }

    /// Record the current state under `point`. Takes a snapshot by value
    /// clone; callers pass their live fields.
    pub fn checkpoint(&mut self, point: &'static str, state: &S) {
        self.steps.push(Breakpoint {
            point,
            state: state.clone(),
        });
    }

    pub fn steps(&self) -> &[Breakpoint<S>] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn last(&self) -> Option<&Breakpoint<S>> {
        self.steps.last()
    }

    /// The breakpoint immediately before `idx`, if any.
    pub fn prev(&self, idx: usize) -> Option<&Breakpoint<S>> {
        idx.checked_sub(1).and_then(|i| self.steps.get(i))
    }

    /// Point names in record order; convenient for asserting on the shape
    /// of a run.
    pub fn points(&self) -> Vec<&'static str> {
        self.steps.iter().map(|bp| bp.point).collect()
    }

    pub fn into_steps(self) -> Vec<Breakpoint<S>> {
        self.steps
    }
}

impl<S: Clone> Default for Trace<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Serialize, PartialEq)]
    struct State {
        idx: usize,
        cells: Vec<i64>,
    }

    #[test]
    fn checkpoints_are_ordered() {
        let mut trace = Trace::new();
        let mut s = State {
            idx: 0,
            cells: vec![0],
        };
        trace.checkpoint("start", &s);
        s.idx = 1;
        trace.checkpoint("step", &s);
        assert_eq!(trace.points(), vec!["start", "step"]);
    }

    /// Mutating the live state after a checkpoint must not change what
    /// the recorded breakpoint observed.
    #[test]
    fn snapshots_are_isolated_from_later_mutation() {
        let mut trace = Trace::new();
        let mut s = State {
            idx: 3,
            cells: vec![1, 2, 3],
        };
        trace.checkpoint("before", &s);
        s.cells[0] = 99;
        s.idx = 7;
        trace.checkpoint("after", &s);

        assert_eq!(trace.steps()[0].state.cells, vec![1, 2, 3]);
        assert_eq!(trace.steps()[0].state.idx, 3);
        assert_eq!(trace.steps()[1].state.cells, vec![99, 2, 3]);
    }

    #[test]
    fn prev_links_to_preceding_breakpoint() {
        let mut trace = Trace::new();
        let s = State {
            idx: 0,
            cells: vec![],
        };
        trace.checkpoint("a", &s);
        trace.checkpoint("b", &s);
        assert!(trace.prev(0).is_none());
        assert_eq!(trace.prev(1).unwrap().point, "a");
    }
}
