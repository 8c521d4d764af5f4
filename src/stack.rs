//! Progress tracking for suspendable writes
//!
//! Every resource or collection which is currently being written occupies one [`WriteFrame`]
//! of the [`WriteStack`]. When a write suspends, the frames of all in-progress values are
//! kept so that the next call continues with exactly the same progress.

use std::any::Any;
use std::mem;
use std::sync::Arc;

use crate::model::SelectExpandClause;

/// Structural progress of the value of a frame
///
/// Phases are ordered; the phase of a frame only ever advances.
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default, strum::Display, Debug)]
pub enum StructuralPhase {
    /// Nothing has been written yet
    #[default]
    NotStarted,
    /// The start token (`{` or `[`) has been written
    StartToken,
    /// Context URL, id, etag and pre-value annotations have been written
    PreValueMetadataWritten,
    /// All properties (or collection elements) have been written
    PropertiesWritten,
    /// Post-value annotations have been written
    PostValueMetadataWritten,
    /// The end token has been written
    EndToken,
}

/// Saved progress of one value being written
#[derive(Default, Debug)]
pub struct WriteFrame {
    /// Phase which has been completed
    pub phase: StructuralPhase,
    /// Index of the next property (or collection element) to write
    pub child_cursor: usize,
    /// Index of the property (or element) whose name has been written but whose value has
    /// not been completed yet
    pub current_property: Option<usize>,
    /// Writer metadata of the value; stored when the value is started and reused on resume
    pub type_info: Option<Arc<dyn Any + Send + Sync>>,
    /// Whether the frame was suspended and is being resumed
    pub is_continuation: bool,
    /// Select / expand clause governing the properties of the value
    pub select_expand: Option<Arc<SelectExpandClause>>,
    /// Property indices chosen by a property selector, in write order
    pub selection: Option<Arc<[usize]>>,
}

/// Stack of [`WriteFrame`]s, one per value currently being written
///
/// The top frame is stored inline, so writing a single top-level value does not allocate.
/// On suspension the frames are popped with `completed = false`; they are retained and
/// handed out again by the matching [`push`](Self::push) calls of the resumed write.
#[derive(Default, Debug)]
pub struct WriteStack {
    current: WriteFrame,
    /// Frames of the enclosing values; for a suspended write additionally the frames of the
    /// nested values which will be resumed. `stack[count - 1]` is the slot of `current`.
    stack: Vec<WriteFrame>,
    /// Number of active frames, including `current`
    count: usize,
    /// Depth of the innermost suspended frame; 0 if no suspension is pending
    continuation_count: usize,
}

impl WriteStack {
    /// Creates an empty stack
    pub fn new() -> Self {
        WriteStack::default()
    }

    fn ensure_capacity(&mut self, len: usize) {
        if self.stack.len() < len {
            // At least double to amortize growth
            let new_len = len.max(self.stack.len() * 2).max(4);
            self.stack.resize_with(new_len, WriteFrame::default);
        }
    }

    /// Pushes a frame for the value about to be written
    ///
    /// If the stack has a pending suspension, the saved frame of that depth becomes the
    /// current frame again. Otherwise the current frame is a fresh default frame.
    pub fn push(&mut self) {
        if self.continuation_count == 0 {
            if self.count == 0 {
                self.current = WriteFrame::default();
            } else {
                self.ensure_capacity(self.count);
                self.stack[self.count - 1] = mem::take(&mut self.current);
            }
            self.count += 1;
        } else {
            self.count += 1;
            if self.count > 1 {
                self.stack[self.count - 2] = mem::take(&mut self.current);
                self.current = mem::take(&mut self.stack[self.count - 1]);
            }
            if self.continuation_count == self.count {
                // Innermost suspended frame has been reached
                self.continuation_count = 0;
            }
        }
    }

    /// Pops the current frame
    ///
    /// With `completed = false` the value was suspended; the frame is saved unchanged so that
    /// it is restored by the corresponding `push` of the resumed write.
    ///
    /// # Panics
    /// Panics if the stack is empty.
    pub fn pop(&mut self, completed: bool) {
        if self.count == 0 {
            panic!("Incorrect stack usage: Cannot pop empty write stack");
        }

        if completed {
            self.count -= 1;
            if self.count > 0 {
                self.current = mem::take(&mut self.stack[self.count - 1]);
            }
            return;
        }

        if self.continuation_count == 0 {
            if self.count == 1 {
                // Root frame stays inline
                self.continuation_count = 1;
                self.count = 0;
                return;
            }
            self.ensure_capacity(self.count);
            self.continuation_count = self.count;
            self.count -= 1;
        } else {
            self.count -= 1;
            if self.count == 0 {
                return;
            }
        }
        self.stack[self.count] = mem::take(&mut self.current);
        self.current = mem::take(&mut self.stack[self.count - 1]);
    }

    /// Gets the current frame
    ///
    /// # Panics
    /// Panics if the stack is empty.
    pub fn current(&self) -> &WriteFrame {
        if self.count == 0 {
            panic!("Incorrect stack usage: Write stack is empty");
        }
        &self.current
    }

    /// Gets the current frame for modification
    ///
    /// # Panics
    /// Panics if the stack is empty.
    pub fn current_mut(&mut self) -> &mut WriteFrame {
        if self.count == 0 {
            panic!("Incorrect stack usage: Write stack is empty");
        }
        &mut self.current
    }

    /// Gets the frame of the value enclosing the current one
    ///
    /// # Panics
    /// Panics if the current frame has no parent.
    pub fn parent(&self) -> &WriteFrame {
        if self.count < 2 {
            panic!("Incorrect stack usage: Current frame has no parent");
        }
        &self.stack[self.count - 2]
    }

    /// Whether the current value is the top-level value of the document
    pub fn is_top_level(&self) -> bool {
        self.count <= 1
    }

    /// Number of active frames
    pub fn depth(&self) -> usize {
        self.count
    }

    /// Whether a suspended write is waiting to be resumed
    pub fn has_pending_continuation(&self) -> bool {
        self.continuation_count != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_completed() {
        let mut stack = WriteStack::new();
        assert_eq!(0, stack.depth());
        assert_eq!(true, stack.is_top_level());

        stack.push();
        stack.current_mut().child_cursor = 1;
        assert_eq!(true, stack.is_top_level());

        stack.push();
        assert_eq!(0, stack.current().child_cursor);
        stack.current_mut().child_cursor = 2;
        assert_eq!(false, stack.is_top_level());
        assert_eq!(1, stack.parent().child_cursor);

        stack.push();
        assert_eq!(3, stack.depth());
        assert_eq!(2, stack.parent().child_cursor);

        stack.pop(true);
        assert_eq!(2, stack.current().child_cursor);
        stack.pop(true);
        assert_eq!(1, stack.current().child_cursor);
        stack.pop(true);
        assert_eq!(0, stack.depth());
        assert_eq!(false, stack.has_pending_continuation());

        // Fresh push after completion does not see old progress
        stack.push();
        assert_eq!(0, stack.current().child_cursor);
        stack.pop(true);
    }

    #[test]
    fn single_frame_does_not_allocate() {
        let mut stack = WriteStack::new();
        stack.push();
        stack.current_mut().phase = StructuralPhase::StartToken;
        stack.pop(false);
        stack.push();
        stack.pop(true);
        assert_eq!(0, stack.stack.capacity());
    }

    #[test]
    fn suspend_and_resume_root() {
        let mut stack = WriteStack::new();
        stack.push();
        stack.current_mut().phase = StructuralPhase::PreValueMetadataWritten;
        stack.current_mut().child_cursor = 5;
        stack.pop(false);
        assert_eq!(0, stack.depth());
        assert_eq!(true, stack.has_pending_continuation());

        stack.push();
        assert_eq!(false, stack.has_pending_continuation());
        assert_eq!(StructuralPhase::PreValueMetadataWritten, stack.current().phase);
        assert_eq!(5, stack.current().child_cursor);
        stack.pop(true);
        assert_eq!(0, stack.depth());
    }

    #[test]
    fn suspend_and_resume_nested() {
        let mut stack = WriteStack::new();
        for cursor in 1..=3 {
            stack.push();
            stack.current_mut().child_cursor = cursor;
            stack.current_mut().phase = StructuralPhase::StartToken;
        }
        // Innermost suspends, then all enclosing values
        for _ in 0..3 {
            stack.current_mut().is_continuation = true;
            stack.pop(false);
        }
        assert_eq!(0, stack.depth());
        assert_eq!(true, stack.has_pending_continuation());

        for cursor in 1..=3 {
            stack.push();
            assert_eq!(cursor, stack.current().child_cursor);
            assert_eq!(true, stack.current().is_continuation);
            stack.current_mut().is_continuation = false;
        }
        assert_eq!(false, stack.has_pending_continuation());
        assert_eq!(2, stack.parent().child_cursor);

        // Completing the innermost and suspending again in the middle
        stack.pop(true);
        stack.current_mut().child_cursor = 20;
        stack.pop(false);
        stack.pop(false);
        assert_eq!(true, stack.has_pending_continuation());

        stack.push();
        assert_eq!(1, stack.current().child_cursor);
        stack.push();
        assert_eq!(20, stack.current().child_cursor);
        assert_eq!(false, stack.has_pending_continuation());

        // Newly started value after resume gets a fresh frame
        stack.push();
        assert_eq!(0, stack.current().child_cursor);
        assert_eq!(StructuralPhase::NotStarted, stack.current().phase);

        stack.pop(true);
        stack.pop(true);
        stack.pop(true);
        assert_eq!(0, stack.depth());
    }

    #[test]
    #[should_panic(expected = "Incorrect stack usage: Cannot pop empty write stack")]
    fn pop_empty() {
        let mut stack = WriteStack::new();
        stack.pop(true);
    }

    #[test]
    #[should_panic(expected = "Incorrect stack usage: Current frame has no parent")]
    fn parent_of_root() {
        let mut stack = WriteStack::new();
        stack.push();
        stack.parent();
    }

    #[test]
    fn phase_order() {
        assert!(StructuralPhase::NotStarted < StructuralPhase::StartToken);
        assert!(StructuralPhase::PropertiesWritten < StructuralPhase::PostValueMetadataWritten);
        assert_eq!("PreValueMetadataWritten", StructuralPhase::PreValueMetadataWritten.to_string());
    }
}
