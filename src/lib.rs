//! namevm: a persistent, time-travelling stack machine for teaching
//! lexical scoping and name binding.
//!
//! The machine's environment (nested scopes of name/value frames plus
//! independent value stacks) is fully persistent: every instruction is
//! a pure transition producing a new machine value with structural
//! sharing, so the stepper can retain every prior state and step
//! backward exactly, at O(1) cost per retained snapshot.
//!
//! The pieces, leaves first:
//! - [`stack`]: a persistent LIFO stack.
//! - [`names`]: frames, scopes, and the machine environment.
//! - [`vm`] and [`instr`]: the machine state and its closed, linear
//!   instruction set (no branches, no jumps).
//! - [`compiler`]: the NameLang source language.
//! - [`stepper`]: forward execution with exact undo.
//! - [`render`]: read-only textual snapshots.

pub mod compiler;
pub mod instr;
pub mod names;
pub mod render;
pub mod stack;
pub mod stepper;
pub mod value;
pub mod vm;

use thiserror::Error;
use tracing::info;

use crate::compiler::CompileError;
use crate::instr::Program;
use crate::names::LOCAL;
use crate::vm::{VmError, VM};

/// Unified error for the compile-then-run entry points. The two kinds
/// stay distinct so callers can tell a malformed source from a failed
/// lookup.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Vm(#[from] VmError),
}

/// Compiles NameLang source into a program.
pub fn compile(source: &str) -> Result<Program, CompileError> {
    compiler::compile(source)
}

/// Creates the machine that the run entry points start from: the
/// default containers plus one entered `"main"` frame in the `"local"`
/// scope, so that bindings work from the first instruction.
pub fn boot_vm() -> VM {
    VM::new().enter_at(LOCAL, "main")
}

/// Runs a compiled program to completion against a freshly booted
/// machine, returning the final state or the first failed lookup.
pub fn run_program(program: &Program) -> Result<VM, VmError> {
    let mut vm = boot_vm();
    for (pc, instr) in program.iter().enumerate() {
        info!(pc, %instr, "exec");
        vm = instr.exec(&vm)?;
    }
    Ok(vm)
}

/// Compiles and runs `source` in one shot.
pub fn run_source(source: &str) -> Result<VM, Error> {
    let program = compile(source)?;
    Ok(run_program(&program)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn test_run_source_end_to_end() {
        let vm = run_source("10 20 + 1 *").unwrap();
        let stack: Vec<_> = vm.env().stack("data").unwrap().iter().cloned().collect();
        assert_eq!(stack, vec![Value::Num(30.0)]);
    }

    #[test]
    fn test_error_kinds_stay_distinct() {
        assert!(matches!(
            run_source("frobnicate").unwrap_err(),
            Error::Compile(CompileError::UnknownInstr { .. })
        ));
        assert!(matches!(
            run_source("find(ghost)").unwrap_err(),
            Error::Vm(VmError::NameNotFound { .. })
        ));
    }
}
