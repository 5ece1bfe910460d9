//! Persistent LIFO stack.
//!
//! A reference-counted cons list: `push` and `pop` allocate at most one
//! node and share the rest of the spine with the original stack, so any
//! number of historical versions can be retained at O(1) cost each. No
//! operation ever mutates an existing node.
//!
//! `pop` on an empty stack is deliberately a no-op that returns the same
//! empty stack. The machine relies on this leniency for its "never crash
//! on a benign empty state" contract; callers that need to distinguish
//! underflow should check [`Stack::is_empty`] first.

use std::fmt;
use std::rc::Rc;

struct Node<T> {
    elem: T,
    next: Option<Rc<Node<T>>>,
}

/// An immutable stack with structural sharing.
pub struct Stack<T> {
    head: Option<Rc<Node<T>>>,
    len: usize,
}

impl<T> Stack<T> {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Stack { head: None, len: 0 }
    }

    /// Returns a new stack with `elem` on top. The original is untouched
    /// and shares its entire spine with the result.
    pub fn push(&self, elem: T) -> Self {
        Stack {
            head: Some(Rc::new(Node {
                elem,
                next: self.head.clone(),
            })),
            len: self.len + 1,
        }
    }

    /// Returns a new stack without the top element. Popping an empty
    /// stack returns an (equal) empty stack.
    pub fn pop(&self) -> Self {
        match &self.head {
            Some(node) => Stack {
                head: node.next.clone(),
                len: self.len - 1,
            },
            None => Stack::new(),
        }
    }

    /// Borrows the top element, if any. Never mutates.
    pub fn peek(&self) -> Option<&T> {
        self.head.as_deref().map(|node| &node.elem)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Iterates top-down.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            next: self.head.as_deref(),
        }
    }

    /// True when both stacks share the same top node (and therefore the
    /// same entire spine). Used by tests to observe structural sharing.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.head, &other.head) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T> Clone for Stack<T> {
    fn clone(&self) -> Self {
        Stack {
            head: self.head.clone(),
            len: self.len,
        }
    }
}

impl<T> Default for Stack<T> {
    fn default() -> Self {
        Stack::new()
    }
}

impl<T: PartialEq> PartialEq for Stack<T> {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.iter().eq(other.iter())
    }
}

impl<T: fmt::Debug> fmt::Debug for Stack<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

pub struct Iter<'a, T> {
    next: Option<&'a Node<T>>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        let node = self.next?;
        self.next = node.next.as_deref();
        Some(&node.elem)
    }
}
