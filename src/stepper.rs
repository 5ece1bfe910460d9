//! Sequences a program against a machine, with exact step-back.
//!
//! Forward steps retain the previous machine state on a persistent
//! history stack; backward steps restore it outright. Because every VM
//! value is immutable with structural sharing, holding a snapshot costs
//! O(1) and a restored state is the *same value* the machine had, not a
//! recomputation of it.

use tracing::trace;

use crate::instr::Program;
use crate::stack::Stack;
use crate::value::Value;
use crate::vm::{VmError, VM};

/// Result of a successful forward step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// One instruction was executed.
    Stepped,
    /// The cursor was already at the end of the program; nothing ran.
    Done,
}

/// Instruction cursor plus machine state plus undo history.
#[derive(Debug, Clone)]
pub struct Stepper {
    program: Program,
    pc: usize,
    vm: VM,
    history: Stack<VM>,
}

impl Stepper {
    pub fn new(program: Program, vm: VM) -> Self {
        Stepper {
            program,
            pc: 0,
            vm,
            history: Stack::new(),
        }
    }

    /// The instruction cursor, in `[0, program.len()]`.
    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn vm(&self) -> &VM {
        &self.vm
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn is_done(&self) -> bool {
        self.pc >= self.program.len()
    }

    /// Executes the instruction under the cursor.
    ///
    /// On success the prior machine state is pushed onto the history
    /// stack and the cursor advances. On failure (the strict lookup
    /// missing) nothing changes: the machine state, cursor, and history
    /// are exactly as they were, so earlier snapshots stay usable and
    /// the caller decides whether to halt or skip.
    pub fn step_forward(&mut self) -> Result<StepOutcome, VmError> {
        let Some(instr) = self.program.get(self.pc) else {
            return Ok(StepOutcome::Done);
        };

        trace!(pc = self.pc, instr = %instr, "step forward");
        let next = instr.exec(&self.vm)?;
        self.history = self.history.push(self.vm.clone());
        self.vm = next;
        self.pc += 1;
        Ok(StepOutcome::Stepped)
    }

    /// Restores the most recent snapshot. Returns `false` (and changes
    /// nothing) when already at the start.
    pub fn step_backward(&mut self) -> bool {
        let Some(prev) = self.history.peek() else {
            return false;
        };

        trace!(pc = self.pc, "step backward");
        self.vm = prev.clone();
        self.history = self.history.pop();
        self.pc -= 1;
        true
    }

    /// Rewinds to the initial state by stepping all the way back.
    pub fn reset(&mut self) {
        while self.step_backward() {}
    }

    /// The current-line marker (`"l"` property), set by `line(n)`
    /// instructions. External line-highlighting compares this across
    /// steps to detect a change.
    pub fn current_line(&self) -> Option<&Value> {
        self.vm.get_prop("l")
    }
}
