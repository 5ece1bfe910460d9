//! Read-only text rendering of machine snapshots.
//!
//! These functions consume a [`VM`] purely through its snapshot
//! accessors and never mutate anything; they are the textual stand-in
//! for an external visualization layer.

use std::fmt::Write;

use crate::vm::VM;

/// Renders every scope (frames innermost-first, bindings in insertion
/// order, with title overrides and notes), every named data stack
/// top-down, and the auxiliary properties.
pub fn render_vm(vm: &VM) -> String {
    let mut out = String::new();
    let env = vm.env();

    for (key, scope) in env.scopes() {
        let _ = writeln!(out, "scope {key} ({} frames)", scope.depth());
        for frame in scope.frames() {
            let _ = writeln!(out, "  [{}]", frame.title());
            for (name, value) in frame.binds() {
                let _ = writeln!(out, "    {name} = {value}");
            }
            for note in frame.meta().notes() {
                let _ = writeln!(out, "    ; {note}");
            }
        }
    }

    for (key, stack) in env.stacks() {
        let _ = writeln!(out, "stack {key} ({} values)", stack.len());
        for value in stack.iter() {
            let _ = writeln!(out, "    {value}");
        }
    }

    let mut props = env.props().peekable();
    if props.peek().is_some() {
        let _ = writeln!(out, "props");
        for (key, value) in props {
            let _ = writeln!(out, "    {key} = {value}");
        }
    }

    out
}
