//! A named stack of frames representing nested lexical contexts.

use std::rc::Rc;

use crate::names::Frame;
use crate::stack::Stack;
use crate::value::Value;

/// A named LIFO stack of [`Frame`]s, innermost on top.
///
/// A scope with zero frames is a legal state, not an error: lookups
/// simply miss, and frame-targeted updates are no-ops.
#[derive(Debug, Clone, PartialEq)]
pub struct Scope {
    name: Rc<str>,
    frames: Stack<Frame>,
}

impl Scope {
    pub fn new(name: &str) -> Self {
        Scope {
            name: Rc::from(name),
            frames: Stack::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Iterates frames innermost-first.
    pub fn frames(&self) -> impl Iterator<Item = &Frame> {
        self.frames.iter()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Pushes a new frame, optionally seeded with initial bindings.
    pub fn enter<'a>(&self, name: &str, seed: impl IntoIterator<Item = (&'a str, Value)>) -> Self {
        self.with_frames(self.frames.push(Frame::with_binds(name, seed)))
    }

    /// Pops the top frame. Leaving an already-empty scope is a no-op.
    pub fn leave(&self) -> Self {
        self.with_frames(self.frames.pop())
    }

    /// Binds `name` in the top frame only; outer frames are never
    /// searched. No-op when the scope has no frames.
    pub fn bind(&self, name: &str, value: Value) -> Self {
        self.update_top(|f| f.bind(name, value))
    }

    /// Replaces the binding of `name` in the innermost frame that
    /// already contains it. Returns the updated scope and the frame
    /// index (0 = innermost); `None` means no frame binds `name` and
    /// the scope is returned unchanged.
    pub fn rebind(&self, name: &str, value: Value) -> (Self, Option<usize>) {
        let mut above: Vec<Frame> = Vec::new();
        let mut rest = self.frames.clone();

        loop {
            let frame = match rest.peek() {
                Some(f) => f.clone(),
                None => return (self.clone(), None),
            };
            if frame.has_name(name) {
                let index = above.len();
                let mut frames = rest.pop().push(frame.bind(name, value));
                for f in above.into_iter().rev() {
                    frames = frames.push(f);
                }
                return (self.with_frames(frames), Some(index));
            }
            above.push(frame);
            rest = rest.pop();
        }
    }

    /// Searches frames innermost→outermost for `name`.
    pub fn find(&self, name: &str) -> Option<&Value> {
        self.frames.iter().find_map(|f| f.find(name))
    }

    pub fn set_title(&self, v: Value) -> Self {
        self.update_top(|f| f.set_title(v))
    }

    pub fn add_note(&self, v: Value) -> Self {
        self.update_top(|f| f.add_note(v))
    }

    pub fn bind_meta(&self, key: &str, value: Value) -> Self {
        self.update_top(|f| f.bind_meta(key, value))
    }

    fn update_top(&self, f: impl FnOnce(&Frame) -> Frame) -> Self {
        match self.frames.peek() {
            Some(top) => self.with_frames(self.frames.pop().push(f(top))),
            None => self.clone(),
        }
    }

    fn with_frames(&self, frames: Stack<Frame>) -> Self {
        Scope {
            name: self.name.clone(),
            frames,
        }
    }
}
