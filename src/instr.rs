//! The machine's closed instruction set.
//!
//! Every instruction is a pure transition `exec(&VM) -> Result<VM, VmError>`;
//! the only fallible variant is the strict lookup (`Find`/`FindAt`). The
//! set is a closed enum with an exhaustive dispatch, so a new variant
//! without an execution rule is a compile error.
//!
//! Operand convention for every binary operator: `a = pop()` (the most
//! recently pushed value), then `b = pop()`, and the result is
//! `apply(a, b)` with `a` as the LEFT operand of the written operator.
//! So `push 10; push 20; Sub` computes `20 - 10`.
//!
//! Addressing: the short mnemonics `Find`/`Enter`/`Leave`/`Bind`/`Rebind`
//! are hard-wired to the `"local"` scope and never consult the
//! environment's current-scope pointer. Stack-consuming instructions use
//! the *active* data stack, and `SetFrameTitle`/`AddFrameNote` the
//! *active* scope, both of which the `SetCurrent*` instructions retarget.

use std::fmt;

use crate::names::LOCAL;
use crate::value::Value;
use crate::vm::{VmError, VM};

/// One instruction of the fixed, linear instruction set.
#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    Nop,
    Push(Value),
    Pop,
    FindAt(String, String),
    Find(String),
    EnterAt(String, String),
    Enter(String),
    LeaveAt(String),
    Leave,
    BindAt(String, String),
    Bind(String),
    RebindAt(String, String),
    Rebind(String),
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    NotEq,
    Gt,
    Ge,
    Lt,
    Le,
    And,
    Or,
    Not,
    Neg,
    SetFrameTitle,
    AddFrameNote,
    SetProp(String, Value),
    SetCurrentScope(String),
    SetCurrentStack(String),
}

impl Instr {
    /// Executes this instruction against `vm`, returning the successor
    /// state. `vm` itself is never modified.
    pub fn exec(&self, vm: &VM) -> Result<VM, VmError> {
        match self {
            Instr::Nop => Ok(vm.clone()),
            Instr::Push(v) => Ok(vm.push(v.clone())),
            Instr::Pop => Ok(vm.pop()),

            Instr::FindAt(key, name) => vm.find_at(key, name),
            Instr::Find(name) => vm.find_at(LOCAL, name),
            Instr::EnterAt(key, name) => Ok(vm.enter_at(key, name)),
            Instr::Enter(name) => Ok(vm.enter_at(LOCAL, name)),
            Instr::LeaveAt(key) => Ok(vm.leave_at(key)),
            Instr::Leave => Ok(vm.leave_at(LOCAL)),
            Instr::BindAt(key, name) => Ok(exec_bind(vm, key, name)),
            Instr::Bind(name) => Ok(exec_bind(vm, LOCAL, name)),
            Instr::RebindAt(key, name) => Ok(exec_rebind(vm, key, name)),
            Instr::Rebind(name) => Ok(exec_rebind(vm, LOCAL, name)),

            Instr::Add => Ok(exec_bin(vm, add)),
            Instr::Sub => Ok(exec_bin(vm, sub)),
            Instr::Mul => Ok(exec_bin(vm, mul)),
            Instr::Div => Ok(exec_bin(vm, div)),
            Instr::Eq => Ok(exec_bin(vm, eq)),
            Instr::NotEq => Ok(exec_bin(vm, not_eq)),
            Instr::Gt => Ok(exec_bin(vm, gt)),
            Instr::Ge => Ok(exec_bin(vm, ge)),
            Instr::Lt => Ok(exec_bin(vm, lt)),
            Instr::Le => Ok(exec_bin(vm, le)),
            Instr::And => Ok(exec_bin(vm, and)),
            Instr::Or => Ok(exec_bin(vm, or)),
            Instr::Not => Ok(exec_un(vm, |a| Value::Bool(!a.truthy()))),
            Instr::Neg => Ok(exec_un(vm, |a| Value::Num(-a.as_num()))),

            Instr::SetFrameTitle => {
                let (vm, a) = take_operand(vm);
                Ok(vm.set_title(a))
            }
            Instr::AddFrameNote => {
                let (vm, a) = take_operand(vm);
                Ok(vm.add_note(a))
            }
            Instr::SetProp(key, value) => Ok(vm.set_prop(key, value.clone())),
            Instr::SetCurrentScope(key) => Ok(vm.set_current_scope(key)),
            Instr::SetCurrentStack(key) => Ok(vm.set_current_stack(key)),
        }
    }
}

/// Pops one operand off the active data stack; an empty stack reads as
/// `Null`, mirroring the machine-wide leniency for benign empty states.
fn take_operand(vm: &VM) -> (VM, Value) {
    let a = vm.peek().cloned().unwrap_or(Value::Null);
    (vm.pop(), a)
}

fn exec_bind(vm: &VM, key: &str, name: &str) -> VM {
    let (vm, a) = take_operand(vm);
    vm.bind_at(key, name, a)
}

// The operand is consumed whether or not any frame bound the name.
fn exec_rebind(vm: &VM, key: &str, name: &str) -> VM {
    let (vm, a) = take_operand(vm);
    vm.rebind_at(key, name, a)
}

fn exec_bin(vm: &VM, apply: impl FnOnce(Value, Value) -> Value) -> VM {
    let (vm, a) = take_operand(vm);
    let (vm, b) = take_operand(&vm);
    vm.push(apply(a, b))
}

fn exec_un(vm: &VM, apply: impl FnOnce(Value) -> Value) -> VM {
    let (vm, a) = take_operand(vm);
    vm.push(apply(a))
}

// Operator rules, host semantics. `a` is the left operand throughout.

fn add(a: Value, b: Value) -> Value {
    match (&a, &b) {
        (Value::Str(_), _) | (_, Value::Str(_)) => Value::str(format!("{a}{b}")),
        _ => Value::Num(a.as_num() + b.as_num()),
    }
}

fn sub(a: Value, b: Value) -> Value {
    Value::Num(a.as_num() - b.as_num())
}

fn mul(a: Value, b: Value) -> Value {
    Value::Num(a.as_num() * b.as_num())
}

fn div(a: Value, b: Value) -> Value {
    Value::Num(a.as_num() / b.as_num())
}

fn eq(a: Value, b: Value) -> Value {
    Value::Bool(a.strict_eq(&b))
}

fn not_eq(a: Value, b: Value) -> Value {
    Value::Bool(!a.strict_eq(&b))
}

fn cmp(a: &Value, b: &Value, str_cmp: fn(&str, &str) -> bool, num_cmp: fn(f64, f64) -> bool) -> Value {
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => Value::Bool(str_cmp(x, y)),
        _ => Value::Bool(num_cmp(a.as_num(), b.as_num())),
    }
}

fn gt(a: Value, b: Value) -> Value {
    cmp(&a, &b, |x, y| x > y, |x, y| x > y)
}

fn ge(a: Value, b: Value) -> Value {
    cmp(&a, &b, |x, y| x >= y, |x, y| x >= y)
}

fn lt(a: Value, b: Value) -> Value {
    cmp(&a, &b, |x, y| x < y, |x, y| x < y)
}

fn le(a: Value, b: Value) -> Value {
    cmp(&a, &b, |x, y| x <= y, |x, y| x <= y)
}

// Non-short-circuiting by construction: both operands were already
// pushed. Selects an operand by truthiness rather than forcing a bool.
fn and(a: Value, b: Value) -> Value {
    if a.truthy() {
        b
    } else {
        a
    }
}

fn or(a: Value, b: Value) -> Value {
    if a.truthy() {
        a
    } else {
        b
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::Nop => write!(f, "Nop"),
            Instr::Push(v) => write!(f, "Push({v})"),
            Instr::Pop => write!(f, "Pop"),
            Instr::FindAt(key, name) => write!(f, "FindAt({key}, {name})"),
            Instr::Find(name) => write!(f, "Find({name})"),
            Instr::EnterAt(key, name) => write!(f, "EnterAt({key}, {name})"),
            Instr::Enter(name) => write!(f, "Enter({name})"),
            Instr::LeaveAt(key) => write!(f, "LeaveAt({key})"),
            Instr::Leave => write!(f, "Leave"),
            Instr::BindAt(key, name) => write!(f, "BindAt({key}, {name})"),
            Instr::Bind(name) => write!(f, "Bind({name})"),
            Instr::RebindAt(key, name) => write!(f, "RebindAt({key}, {name})"),
            Instr::Rebind(name) => write!(f, "Rebind({name})"),
            Instr::Add => write!(f, "Add"),
            Instr::Sub => write!(f, "Sub"),
            Instr::Mul => write!(f, "Mul"),
            Instr::Div => write!(f, "Div"),
            Instr::Eq => write!(f, "Eq"),
            Instr::NotEq => write!(f, "NotEq"),
            Instr::Gt => write!(f, "Gt"),
            Instr::Ge => write!(f, "Ge"),
            Instr::Lt => write!(f, "Lt"),
            Instr::Le => write!(f, "Le"),
            Instr::And => write!(f, "And"),
            Instr::Or => write!(f, "Or"),
            Instr::Not => write!(f, "Not"),
            Instr::Neg => write!(f, "Neg"),
            Instr::SetFrameTitle => write!(f, "SetFrameTitle"),
            Instr::AddFrameNote => write!(f, "AddFrameNote"),
            Instr::SetProp(key, value) => write!(f, "SetProp({key}, {value})"),
            Instr::SetCurrentScope(key) => write!(f, "SetCurrentScope({key})"),
            Instr::SetCurrentStack(key) => write!(f, "SetCurrentStack({key})"),
        }
    }
}

/// An ordered, fixed sequence of instructions. Immutable once produced
/// by the compiler.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    instrs: Vec<Instr>,
}

impl Program {
    pub fn new(instrs: Vec<Instr>) -> Self {
        Program { instrs }
    }

    pub fn len(&self) -> usize {
        self.instrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }

    pub fn get(&self, pc: usize) -> Option<&Instr> {
        self.instrs.get(pc)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instr> {
        self.instrs.iter()
    }
}

impl From<Vec<Instr>> for Program {
    fn from(instrs: Vec<Instr>) -> Self {
        Program::new(instrs)
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, instr) in self.instrs.iter().enumerate() {
            writeln!(f, "{i:4}  {instr}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: f64) -> Value {
        Value::Num(n)
    }

    /// Executes instructions in order against a fresh machine with one
    /// entered frame, panicking on the first failed step.
    fn run(instrs: &[Instr]) -> VM {
        let mut vm = VM::new().enter_at(LOCAL, "main");
        for instr in instrs {
            vm = instr.exec(&vm).unwrap();
        }
        vm
    }

    #[test]
    fn test_push_pop_nop() {
        let vm = run(&[Instr::Push(num(1.0)), Instr::Nop]);
        assert_eq!(vm.peek(), Some(&num(1.0)));
        assert_eq!(vm.pop().peek(), None);

        // Pop on an empty stack is a no-op.
        let vm = run(&[Instr::Pop]);
        assert_eq!(vm.peek(), None);
    }

    #[test]
    fn test_operand_order_for_sub() {
        // push 10; push 20; Sub computes 20 - 10: the second-pushed
        // operand is the left operand.
        let vm = run(&[Instr::Push(num(10.0)), Instr::Push(num(20.0)), Instr::Sub]);
        assert_eq!(vm.peek(), Some(&num(10.0)));
    }

    #[test]
    fn test_operand_order_for_div() {
        let vm = run(&[Instr::Push(num(2.0)), Instr::Push(num(10.0)), Instr::Div]);
        assert_eq!(vm.peek(), Some(&num(5.0)));
    }

    #[test]
    fn test_arith_scenario() {
        // "10 20 + 1 *" leaves exactly [30].
        let vm = run(&[
            Instr::Push(num(10.0)),
            Instr::Push(num(20.0)),
            Instr::Add,
            Instr::Push(num(1.0)),
            Instr::Mul,
        ]);
        let stack: Vec<_> = vm.env().stack("data").unwrap().iter().cloned().collect();
        assert_eq!(stack, vec![num(30.0)]);
    }

    #[test]
    fn test_string_concat() {
        let vm = run(&[
            Instr::Push(Value::str("x")),
            Instr::Push(Value::str("y")),
            Instr::Add,
        ]);
        assert_eq!(vm.peek(), Some(&Value::str("yx")));
    }

    #[test]
    fn test_comparisons() {
        let vm = run(&[Instr::Push(num(3.0)), Instr::Push(num(4.0)), Instr::Gt]);
        assert_eq!(vm.peek(), Some(&Value::Bool(true)));

        let vm = run(&[Instr::Push(num(3.0)), Instr::Push(num(3.0)), Instr::Le]);
        assert_eq!(vm.peek(), Some(&Value::Bool(true)));

        let vm = run(&[Instr::Push(num(1.0)), Instr::Push(num(2.0)), Instr::Eq]);
        assert_eq!(vm.peek(), Some(&Value::Bool(false)));

        let vm = run(&[Instr::Push(num(1.0)), Instr::Push(num(2.0)), Instr::NotEq]);
        assert_eq!(vm.peek(), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_and_or_select_operands() {
        let vm = run(&[Instr::Push(num(0.0)), Instr::Push(num(7.0)), Instr::And]);
        assert_eq!(vm.peek(), Some(&num(0.0)));

        let vm = run(&[Instr::Push(num(5.0)), Instr::Push(num(7.0)), Instr::And]);
        assert_eq!(vm.peek(), Some(&num(5.0)));

        let vm = run(&[Instr::Push(num(5.0)), Instr::Push(num(0.0)), Instr::Or]);
        assert_eq!(vm.peek(), Some(&num(5.0)));
    }

    #[test]
    fn test_unary_ops() {
        let vm = run(&[Instr::Push(num(5.0)), Instr::Neg]);
        assert_eq!(vm.peek(), Some(&num(-5.0)));

        let vm = run(&[Instr::Push(Value::Bool(true)), Instr::Not]);
        assert_eq!(vm.peek(), Some(&Value::Bool(false)));
    }

    #[test]
    fn test_bind_find() {
        let vm = run(&[
            Instr::Push(num(42.0)),
            Instr::Bind("k1".into()),
            Instr::Find("k1".into()),
        ]);
        let stack: Vec<_> = vm.env().stack("data").unwrap().iter().cloned().collect();
        assert_eq!(stack, vec![num(42.0)]);
    }

    #[test]
    fn test_find_missing_name_fails() {
        let vm = VM::new().enter_at(LOCAL, "main");
        let err = Instr::Find("ghost".into()).exec(&vm).unwrap_err();
        assert!(matches!(err, VmError::NameNotFound { .. }));
    }

    #[test]
    fn test_rebind_updates_innermost_match() {
        let vm = run(&[
            Instr::Push(num(42.0)),
            Instr::Bind("k1".into()),
            Instr::Enter("myscope".into()),
            Instr::Push(num(123.0)),
            Instr::Rebind("k1".into()),
            Instr::Find("k1".into()),
        ]);
        assert_eq!(vm.peek(), Some(&num(123.0)));
        // The binding lives in the outer frame, so it survives leaving.
        let vm = Instr::Pop.exec(&vm).unwrap();
        let vm = Instr::Leave.exec(&vm).unwrap();
        let vm = Instr::Find("k1".into()).exec(&vm).unwrap();
        assert_eq!(vm.peek(), Some(&num(123.0)));
    }

    #[test]
    fn test_failed_rebind_still_consumes_operand() {
        let vm = run(&[Instr::Push(num(1.0)), Instr::Rebind("k".into())]);
        assert_eq!(vm.peek(), None);
        assert_eq!(vm.env().find_at(LOCAL, "k"), None);
    }

    #[test]
    fn test_default_mnemonics_ignore_current_scope_pointer() {
        // Retargeting the current scope must not redirect Bind/Find:
        // they are hard-wired to "local".
        let vm = VM::new().enter_at(LOCAL, "main");
        let vm = Instr::SetCurrentScope("other".into()).exec(&vm).unwrap();
        let vm = Instr::Push(num(1.0)).exec(&vm).unwrap();
        let vm = Instr::Bind("k".into()).exec(&vm).unwrap();
        assert_eq!(vm.env().find_at(LOCAL, "k"), Some(&num(1.0)));
        let vm = Instr::Find("k".into()).exec(&vm).unwrap();
        assert_eq!(vm.peek(), Some(&num(1.0)));
    }

    #[test]
    fn test_set_current_stack_retargets_push() {
        let vm = VM::from_env(
            crate::names::Env::new()
                .with_scope(LOCAL)
                .with_stack("data")
                .with_stack("alt"),
        );
        let vm = Instr::SetCurrentStack("alt".into()).exec(&vm).unwrap();
        let vm = Instr::Push(num(9.0)).exec(&vm).unwrap();
        assert_eq!(vm.peek_at("alt"), Some(&num(9.0)));
        assert_eq!(vm.peek_at("data"), None);
    }

    #[test]
    fn test_frame_meta_instrs() {
        let vm = run(&[
            Instr::Push(Value::str("Main Frame")),
            Instr::SetFrameTitle,
            Instr::Push(Value::str("a note")),
            Instr::AddFrameNote,
        ]);
        assert_eq!(vm.peek(), None);
        let scope = vm.env().scope(LOCAL).unwrap();
        let top = scope.frames().next().unwrap();
        assert_eq!(top.title(), Value::str("Main Frame"));
        let notes: Vec<_> = top.meta().notes().cloned().collect();
        assert_eq!(notes, vec![Value::str("a note")]);
    }

    #[test]
    fn test_set_prop() {
        let vm = run(&[Instr::SetProp("l".into(), num(3.0))]);
        assert_eq!(vm.get_prop("l"), Some(&num(3.0)));
    }

    #[test]
    fn test_display_forms() {
        assert_eq!(Instr::Nop.to_string(), "Nop");
        assert_eq!(Instr::Push(num(42.0)).to_string(), "Push(42)");
        assert_eq!(
            Instr::FindAt("local".into(), "k".into()).to_string(),
            "FindAt(local, k)"
        );
        assert_eq!(Instr::Rebind("k".into()).to_string(), "Rebind(k)");
        assert_eq!(
            Instr::SetProp("l".into(), num(2.0)).to_string(),
            "SetProp(l, 2)"
        );
    }
}
