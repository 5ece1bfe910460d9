//! A single lexical binding record.

use std::rc::Rc;

use im_rc::Vector;

use crate::value::Value;

/// Display metadata attached to a frame: an optional title override, an
/// append-only log of free-text notes, and an auxiliary ordered
/// key/value map. None of it participates in name lookup.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FrameMeta {
    title: Option<Value>,
    notes: Vector<Value>,
    binds: Vector<(Rc<str>, Value)>,
}

impl FrameMeta {
    pub fn title(&self) -> Option<&Value> {
        self.title.as_ref()
    }

    pub fn notes(&self) -> impl Iterator<Item = &Value> {
        self.notes.iter()
    }

    pub fn binds(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.binds.iter().map(|(k, v)| (k.as_ref(), v))
    }

    pub fn set_title(&self, v: Value) -> Self {
        FrameMeta {
            title: Some(v),
            ..self.clone()
        }
    }

    pub fn add_note(&self, v: Value) -> Self {
        let mut notes = self.notes.clone();
        notes.push_back(v);
        FrameMeta {
            notes,
            ..self.clone()
        }
    }

    pub fn bind(&self, key: &str, value: Value) -> Self {
        FrameMeta {
            binds: bind_ordered(&self.binds, key, value),
            ..self.clone()
        }
    }
}

/// An ordered name→value mapping plus its display metadata.
///
/// Insertion order is preserved for deterministic iteration; binding an
/// existing name overwrites its value in place without reordering.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    name: Rc<str>,
    binds: Vector<(Rc<str>, Value)>,
    meta: FrameMeta,
}

impl Frame {
    pub fn new(name: &str) -> Self {
        Frame {
            name: Rc::from(name),
            binds: Vector::new(),
            meta: FrameMeta::default(),
        }
    }

    /// Creates a frame pre-seeded with initial bindings, in order.
    pub fn with_binds<'a>(name: &str, seed: impl IntoIterator<Item = (&'a str, Value)>) -> Self {
        let mut binds = Vector::new();
        for (k, v) in seed {
            binds = bind_ordered(&binds, k, v);
        }
        Frame {
            name: Rc::from(name),
            binds,
            meta: FrameMeta::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The display title: the metadata override when set, else the
    /// frame's own name.
    pub fn title(&self) -> Value {
        match self.meta.title() {
            Some(v) => v.clone(),
            None => Value::Str(self.name.clone()),
        }
    }

    pub fn meta(&self) -> &FrameMeta {
        &self.meta
    }

    /// Binds `name` in this frame, overwriting any existing binding
    /// without changing its position.
    pub fn bind(&self, name: &str, value: Value) -> Self {
        Frame {
            binds: bind_ordered(&self.binds, name, value),
            ..self.clone()
        }
    }

    pub fn find(&self, name: &str) -> Option<&Value> {
        self.binds
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v)
    }

    pub fn has_name(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Iterates bindings in insertion order.
    pub fn binds(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.binds.iter().map(|(k, v)| (k.as_ref(), v))
    }

    pub fn set_title(&self, v: Value) -> Self {
        self.do_to_meta(|m| m.set_title(v))
    }

    pub fn add_note(&self, v: Value) -> Self {
        self.do_to_meta(|m| m.add_note(v))
    }

    pub fn bind_meta(&self, key: &str, value: Value) -> Self {
        self.do_to_meta(|m| m.bind(key, value))
    }

    fn do_to_meta(&self, f: impl FnOnce(&FrameMeta) -> FrameMeta) -> Self {
        Frame {
            meta: f(&self.meta),
            ..self.clone()
        }
    }
}

/// Create-or-overwrite into an insertion-ordered pair vector.
fn bind_ordered(
    binds: &Vector<(Rc<str>, Value)>,
    key: &str,
    value: Value,
) -> Vector<(Rc<str>, Value)> {
    match binds.iter().position(|(k, _)| k.as_ref() == key) {
        Some(i) => binds.update(i, (Rc::from(key), value)),
        None => {
            let mut next = binds.clone();
            next.push_back((Rc::from(key), value));
            next
        }
    }
}
