//! Visibility-triggered pagination.
//!
//! The loader watches the last rendered row. When that row scrolls into the
//! viewport the loader reports it once, and the caller grows the window. A
//! [`VisibilityWatch`] is an owned handle: acquiring a new one always drops
//! the previous one first, and the live count is kept in `Drop`.

use std::cell::Cell;
use std::ops::Range;
use std::rc::Rc;
use tracing::trace;

/// Attach point of a rendered row: the record it shows and its body line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowNode {
    pub id: u32,
    pub line: usize,
}

impl RowNode {
    pub fn new(id: u32, line: usize) -> Self {
        Self { id, line }
    }
}

#[derive(Debug)]
pub struct VisibilityWatch {
    node: RowNode,
    visible: bool,
    live: Rc<Cell<usize>>,
}

impl VisibilityWatch {
    fn acquire(node: RowNode, live: &Rc<Cell<usize>>) -> Self {
        live.set(live.get() + 1);
        trace!("Watching row {} at line {}", node.id, node.line);
        Self {
            node,
            visible: false,
            live: Rc::clone(live),
        }
    }

    pub fn node(&self) -> RowNode {
        self.node
    }

    /// True on the transition from hidden to visible.
    fn observe(&mut self, viewport: &Range<usize>) -> bool {
        let visible = viewport.contains(&self.node.line);
        let entered = visible && !self.visible;
        self.visible = visible;
        entered
    }
}

impl Drop for VisibilityWatch {
    fn drop(&mut self) {
        self.live.set(self.live.get() - 1);
        trace!("Released watch on row {}", self.node.id);
    }
}

#[derive(Debug, Default)]
pub struct IncrementalLoader {
    watch: Option<VisibilityWatch>,
    live: Rc<Cell<usize>>,
}

impl IncrementalLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Points the loader at the current last row, or at nothing when the list
    /// is empty. The same record keeps its watch, only its line moves.
    pub fn attach(&mut self, node: Option<RowNode>) {
        if let (Some(watch), Some(node)) = (self.watch.as_mut(), node)
            && watch.node.id == node.id
        {
            watch.node.line = node.line;
            return;
        }
        self.release();
        self.watch = node.map(|node| VisibilityWatch::acquire(node, &self.live));
    }

    pub fn release(&mut self) {
        self.watch = None;
    }

    /// Returns true once each time the watched row enters `viewport`.
    pub fn check(&mut self, viewport: &Range<usize>) -> bool {
        match self.watch.as_mut() {
            Some(watch) => {
                let entered = watch.observe(viewport);
                if entered {
                    trace!("Last row {} entered viewport {viewport:?}", watch.node.id);
                }
                entered
            }
            None => false,
        }
    }

    pub fn watched(&self) -> Option<RowNode> {
        self.watch.as_ref().map(VisibilityWatch::node)
    }

    pub fn live_watches(&self) -> usize {
        self.live.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_per_entry() {
        let mut loader = IncrementalLoader::new();
        loader.attach(Some(RowNode::new(7, 9)));

        assert!(!loader.check(&(0..5)));
        assert!(loader.check(&(5..10)));
        assert!(!loader.check(&(5..10)));
        assert!(!loader.check(&(6..11)));

        // Leave and come back.
        assert!(!loader.check(&(10..15)));
        assert!(loader.check(&(9..14)));
    }

    #[test]
    fn new_last_row_rearms_detection() {
        let mut loader = IncrementalLoader::new();
        loader.attach(Some(RowNode::new(1, 9)));
        assert!(loader.check(&(0..30)));

        loader.attach(Some(RowNode::new(2, 19)));
        assert!(loader.check(&(0..30)));
        assert!(!loader.check(&(0..30)));
    }

    #[test]
    fn same_row_keeps_its_edge_state() {
        let mut loader = IncrementalLoader::new();
        loader.attach(Some(RowNode::new(1, 9)));
        assert!(loader.check(&(0..30)));

        loader.attach(Some(RowNode::new(1, 4)));
        assert_eq!(loader.watched(), Some(RowNode::new(1, 4)));
        assert!(!loader.check(&(0..30)));
        assert_eq!(loader.live_watches(), 1);
    }

    #[test]
    fn reattaching_never_leaks_watches() {
        let mut loader = IncrementalLoader::new();
        for id in 0..100 {
            loader.attach(Some(RowNode::new(id, id as usize)));
            assert_eq!(loader.live_watches(), 1);
        }
        loader.attach(None);
        assert_eq!(loader.live_watches(), 0);
        assert_eq!(loader.watched(), None);
        assert!(!loader.check(&(0..1000)));
    }

    #[test]
    fn empty_viewport_sees_nothing() {
        let mut loader = IncrementalLoader::new();
        loader.attach(Some(RowNode::new(1, 0)));
        assert!(!loader.check(&(0..0)));
        assert!(loader.check(&(0..1)));
    }
}
