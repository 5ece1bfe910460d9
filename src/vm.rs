//! The machine state value.
//!
//! A [`VM`] wraps an [`Env`] pre-seeded with the default `"local"` scope
//! and `"data"` stack. Like everything beneath it, a VM is immutable:
//! every operation returns a new VM and the old one stays valid, which
//! is the property the stepper's exact undo relies on.

use thiserror::Error;

use crate::names::{Env, DATA, LOCAL};
use crate::value::Value;

/// Machine-level error conditions.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VmError {
    /// Raised only by the strict lookup path ([`VM::find_at`]): the name
    /// misses every frame of the targeted scope. Every other empty-state
    /// condition in the machine is a silent no-op by design.
    #[error("name '{name}' not found at '{scope}'")]
    NameNotFound { scope: String, name: String },
}

/// One immutable machine state.
#[derive(Debug, Clone, PartialEq)]
pub struct VM {
    env: Env,
}

impl VM {
    /// Creates a machine with the default `"local"` scope (no frames
    /// yet) and the default `"data"` stack.
    pub fn new() -> Self {
        VM {
            env: Env::new().with_scope(LOCAL).with_stack(DATA),
        }
    }

    /// Builds a machine from a custom environment. The caller is
    /// responsible for creating every scope and stack the program will
    /// address; instructions never create containers.
    pub fn from_env(env: Env) -> Self {
        VM { env }
    }

    /// Read-only view of the environment, for snapshot consumers.
    pub fn env(&self) -> &Env {
        &self.env
    }

    // Data stack.

    pub fn push(&self, value: Value) -> Self {
        self.do_to_env(|e| e.push(value))
    }

    pub fn pop(&self) -> Self {
        self.do_to_env(|e| e.pop())
    }

    pub fn peek(&self) -> Option<&Value> {
        self.env.peek()
    }

    pub fn push_at(&self, key: &str, value: Value) -> Self {
        self.do_to_env(|e| e.push_at(key, value))
    }

    pub fn pop_at(&self, key: &str) -> Self {
        self.do_to_env(|e| e.pop_at(key))
    }

    pub fn peek_at(&self, key: &str) -> Option<&Value> {
        self.env.peek_at(key)
    }

    // Scopes.

    /// Strict lookup: pushes the found value onto the active data
    /// stack, or fails with [`VmError::NameNotFound`]. This is the one
    /// lookup path that errors instead of defaulting.
    pub fn find_at(&self, key: &str, name: &str) -> Result<Self, VmError> {
        match self.env.find_at(key, name) {
            Some(v) => Ok(self.push(v.clone())),
            None => Err(VmError::NameNotFound {
                scope: key.to_string(),
                name: name.to_string(),
            }),
        }
    }

    pub fn enter_at(&self, key: &str, name: &str) -> Self {
        self.do_to_env(|e| e.enter_at(key, name, []))
    }

    pub fn leave_at(&self, key: &str) -> Self {
        self.do_to_env(|e| e.leave_at(key))
    }

    pub fn bind_at(&self, key: &str, name: &str, value: Value) -> Self {
        self.do_to_env(|e| e.bind_at(key, name, value))
    }

    /// Attempts a rebind; a miss leaves the environment unchanged. The
    /// instruction layer consumes its operand either way.
    pub fn rebind_at(&self, key: &str, name: &str, value: Value) -> Self {
        VM {
            env: self.env.rebind_at(key, name, value).env,
        }
    }

    // Frame metadata, addressed through the active scope pointer.

    pub fn set_title(&self, v: Value) -> Self {
        self.do_to_env(|e| e.set_title(v))
    }

    pub fn add_note(&self, v: Value) -> Self {
        self.do_to_env(|e| e.add_note(v))
    }

    // Pointers and properties.

    pub fn set_current_scope(&self, key: &str) -> Self {
        self.do_to_env(|e| e.set_cur_scope_key(key))
    }

    pub fn set_current_stack(&self, key: &str) -> Self {
        self.do_to_env(|e| e.set_cur_stack_key(key))
    }

    pub fn set_prop(&self, key: &str, value: Value) -> Self {
        self.do_to_env(|e| e.set_prop(key, value))
    }

    pub fn get_prop(&self, key: &str) -> Option<&Value> {
        self.env.get_prop(key)
    }

    fn do_to_env(&self, f: impl FnOnce(&Env) -> Env) -> Self {
        VM { env: f(&self.env) }
    }
}

impl Default for VM {
    fn default() -> Self {
        VM::new()
    }
}
