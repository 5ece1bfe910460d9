//! The full machine environment: named scopes, named data stacks, and
//! auxiliary properties.

use std::rc::Rc;

use im_rc::OrdMap;

use crate::names::{Scope, DATA, LOCAL};
use crate::stack::Stack;
use crate::value::Value;

/// Result of a [`Env::rebind_at`] attempt: the (possibly unchanged)
/// environment, and the index of the frame that was updated, innermost
/// first. `frame == None` means no frame bound the name and `env` is
/// the receiver unchanged.
#[derive(Debug, Clone)]
pub struct Rebound {
    pub env: Env,
    pub frame: Option<usize>,
}

impl Rebound {
    pub fn found(&self) -> bool {
        self.frame.is_some()
    }
}

/// Immutable environment value.
///
/// Scope and stack containers are created at construction time with the
/// [`Env::with_scope`]/[`Env::with_stack`] builders; instructions never
/// create containers dynamically. Operations addressed at a key that
/// does not exist are silent no-ops, in keeping with the machine's
/// never-crash-on-benign-state contract.
///
/// Most operations come in two addressing forms: explicit `..._at(key)`
/// forms, and pointer-relative convenience forms that go through
/// `cur_scope_key`/`cur_stack_key`.
#[derive(Debug, Clone, PartialEq)]
pub struct Env {
    cur_scope_key: Rc<str>,
    cur_stack_key: Rc<str>,
    scopes: OrdMap<Rc<str>, Scope>,
    stacks: OrdMap<Rc<str>, Stack<Value>>,
    props: OrdMap<Rc<str>, Value>,
}

impl Env {
    /// Creates an environment with no containers. The current-scope and
    /// current-stack pointers start at the well-known defaults.
    pub fn new() -> Self {
        Env {
            cur_scope_key: Rc::from(LOCAL),
            cur_stack_key: Rc::from(DATA),
            scopes: OrdMap::new(),
            stacks: OrdMap::new(),
            props: OrdMap::new(),
        }
    }

    /// Adds an empty scope under `key`.
    pub fn with_scope(&self, key: &str) -> Self {
        Env {
            scopes: self.scopes.update(Rc::from(key), Scope::new(key)),
            ..self.clone()
        }
    }

    /// Adds an empty data stack under `key`.
    pub fn with_stack(&self, key: &str) -> Self {
        Env {
            stacks: self.stacks.update(Rc::from(key), Stack::new()),
            ..self.clone()
        }
    }

    // Scopes, explicit addressing.

    pub fn scope(&self, key: &str) -> Option<&Scope> {
        self.scopes.get(key)
    }

    /// Iterates scopes in key order.
    pub fn scopes(&self) -> impl Iterator<Item = (&str, &Scope)> {
        self.scopes.iter().map(|(k, s)| (k.as_ref(), s))
    }

    pub fn enter_at<'a>(
        &self,
        key: &str,
        name: &str,
        seed: impl IntoIterator<Item = (&'a str, Value)>,
    ) -> Self {
        self.do_to_scope(key, |s| s.enter(name, seed))
    }

    pub fn leave_at(&self, key: &str) -> Self {
        self.do_to_scope(key, |s| s.leave())
    }

    pub fn bind_at(&self, key: &str, name: &str, value: Value) -> Self {
        self.do_to_scope(key, |s| s.bind(name, value))
    }

    /// Rebinds in the innermost frame of scope `key` already holding
    /// `name`; on a miss the environment is returned unchanged. Callers
    /// consume their operand regardless of the outcome.
    pub fn rebind_at(&self, key: &str, name: &str, value: Value) -> Rebound {
        match self.scopes.get(key) {
            Some(scope) => {
                let (scope, frame) = scope.rebind(name, value);
                let env = match frame {
                    Some(_) => Env {
                        scopes: self.scopes.update(Rc::from(key), scope),
                        ..self.clone()
                    },
                    None => self.clone(),
                };
                Rebound { env, frame }
            }
            None => Rebound {
                env: self.clone(),
                frame: None,
            },
        }
    }

    /// Searches scope `key` innermost→outermost. `None` both when the
    /// name is unbound and when the scope does not exist.
    pub fn find_at(&self, key: &str, name: &str) -> Option<&Value> {
        self.scopes.get(key)?.find(name)
    }

    pub fn set_title_at(&self, key: &str, v: Value) -> Self {
        self.do_to_scope(key, |s| s.set_title(v))
    }

    pub fn add_note_at(&self, key: &str, v: Value) -> Self {
        self.do_to_scope(key, |s| s.add_note(v))
    }

    pub fn bind_meta_at(&self, key: &str, meta_key: &str, value: Value) -> Self {
        self.do_to_scope(key, |s| s.bind_meta(meta_key, value))
    }

    // Scopes, pointer-relative convenience forms.

    pub fn cur_scope_key(&self) -> &str {
        &self.cur_scope_key
    }

    pub fn set_cur_scope_key(&self, key: &str) -> Self {
        Env {
            cur_scope_key: Rc::from(key),
            ..self.clone()
        }
    }

    pub fn current_scope(&self) -> Option<&Scope> {
        self.scopes.get(&self.cur_scope_key)
    }

    pub fn enter<'a>(&self, name: &str, seed: impl IntoIterator<Item = (&'a str, Value)>) -> Self {
        self.enter_at(&self.cur_scope_key, name, seed)
    }

    pub fn leave(&self) -> Self {
        self.leave_at(&self.cur_scope_key)
    }

    pub fn bind(&self, name: &str, value: Value) -> Self {
        self.bind_at(&self.cur_scope_key, name, value)
    }

    pub fn rebind(&self, name: &str, value: Value) -> Rebound {
        self.rebind_at(&self.cur_scope_key, name, value)
    }

    pub fn find(&self, name: &str) -> Option<&Value> {
        self.find_at(&self.cur_scope_key, name)
    }

    pub fn set_title(&self, v: Value) -> Self {
        self.set_title_at(&self.cur_scope_key, v)
    }

    pub fn add_note(&self, v: Value) -> Self {
        self.add_note_at(&self.cur_scope_key, v)
    }

    pub fn bind_meta(&self, meta_key: &str, value: Value) -> Self {
        self.bind_meta_at(&self.cur_scope_key, meta_key, value)
    }

    // Data stacks.

    pub fn stack(&self, key: &str) -> Option<&Stack<Value>> {
        self.stacks.get(key)
    }

    /// Iterates data stacks in key order.
    pub fn stacks(&self) -> impl Iterator<Item = (&str, &Stack<Value>)> {
        self.stacks.iter().map(|(k, s)| (k.as_ref(), s))
    }

    pub fn cur_stack_key(&self) -> &str {
        &self.cur_stack_key
    }

    pub fn set_cur_stack_key(&self, key: &str) -> Self {
        Env {
            cur_stack_key: Rc::from(key),
            ..self.clone()
        }
    }

    pub fn push_at(&self, key: &str, value: Value) -> Self {
        self.do_to_stack(key, |s| s.push(value))
    }

    pub fn pop_at(&self, key: &str) -> Self {
        self.do_to_stack(key, |s| s.pop())
    }

    pub fn peek_at(&self, key: &str) -> Option<&Value> {
        self.stacks.get(key)?.peek()
    }

    pub fn push(&self, value: Value) -> Self {
        self.push_at(&self.cur_stack_key, value)
    }

    pub fn pop(&self) -> Self {
        self.pop_at(&self.cur_stack_key)
    }

    pub fn peek(&self) -> Option<&Value> {
        self.peek_at(&self.cur_stack_key)
    }

    // Auxiliary properties: a flat map, unrelated to scoping.

    pub fn set_prop(&self, key: &str, value: Value) -> Self {
        Env {
            props: self.props.update(Rc::from(key), value),
            ..self.clone()
        }
    }

    pub fn get_prop(&self, key: &str) -> Option<&Value> {
        self.props.get(key)
    }

    /// Iterates properties in key order.
    pub fn props(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.props.iter().map(|(k, v)| (k.as_ref(), v))
    }

    fn do_to_scope(&self, key: &str, f: impl FnOnce(&Scope) -> Scope) -> Self {
        match self.scopes.get(key) {
            Some(scope) => Env {
                scopes: self.scopes.update(Rc::from(key), f(scope)),
                ..self.clone()
            },
            None => self.clone(),
        }
    }

    fn do_to_stack(&self, key: &str, f: impl FnOnce(&Stack<Value>) -> Stack<Value>) -> Self {
        match self.stacks.get(key) {
            Some(stack) => Env {
                stacks: self.stacks.update(Rc::from(key), f(stack)),
                ..self.clone()
            },
            None => self.clone(),
        }
    }
}

impl Default for Env {
    fn default() -> Self {
        Env::new()
    }
}
