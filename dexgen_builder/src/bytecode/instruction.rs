//! Virtual instructions.
//!
//! A virtual instruction records one abstract operation of a method body.
//! It is not a concrete DEX instruction: operand resolution (parameter
//! register numbers, branch targets) needs information that only exists
//! once the whole body has been built, so instructions accumulate here and
//! are lowered in a single pass by the method builder.

use dexgen_core::{MethodIndex, Value};
use smallvec::SmallVec;
use std::fmt;

/// The invoke format carries at most five arguments; receiver included,
/// they fit inline.
type ArgVec = SmallVec<[Value; 4]>;

/// The operation performed by a virtual instruction.
///
/// These do not correspond one-to-one to concrete opcodes: the encode pass
/// selects the concrete variant from the operand kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Return,
    ReturnObject,
    Move,
    InvokeVirtual,
    InvokeDirect,
    BindLabel,
    BranchEqz,
    New,
}

impl Op {
    /// Stable name used in diagnostics.
    pub const fn name(self) -> &'static str {
        match self {
            Op::Return => "return",
            Op::ReturnObject => "return-object",
            Op::Move => "move",
            Op::InvokeVirtual => "invoke-virtual",
            Op::InvokeDirect => "invoke-direct",
            Op::BindLabel => "bind-label",
            Op::BranchEqz => "branch-eqz",
            Op::New => "new",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One virtual instruction: an opcode tag, an optional callee, an optional
/// destination, and ordered argument operands. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    op: Op,
    method: Option<MethodIndex>,
    dest: Option<Value>,
    args: ArgVec,
}

impl Instruction {
    /// An instruction with no destination and no arguments.
    pub fn no_args(op: Op) -> Self {
        Self {
            op,
            method: None,
            dest: None,
            args: ArgVec::new(),
        }
    }

    /// An instruction with an optional destination and arguments.
    pub fn with_args(op: Op, dest: Option<Value>, args: &[Value]) -> Self {
        Self {
            op,
            method: None,
            dest,
            args: args.iter().copied().collect(),
        }
    }

    /// A virtual-dispatch call. The receiver is the first argument register.
    pub fn invoke_virtual(
        method: MethodIndex,
        dest: Option<Value>,
        receiver: Value,
        args: &[Value],
    ) -> Self {
        Self::invoke(Op::InvokeVirtual, method, dest, receiver, args)
    }

    /// A direct call, used for constructors and private methods.
    pub fn invoke_direct(
        method: MethodIndex,
        dest: Option<Value>,
        receiver: Value,
        args: &[Value],
    ) -> Self {
        Self::invoke(Op::InvokeDirect, method, dest, receiver, args)
    }

    fn invoke(
        op: Op,
        method: MethodIndex,
        dest: Option<Value>,
        receiver: Value,
        args: &[Value],
    ) -> Self {
        let mut all_args = ArgVec::with_capacity(args.len() + 1);
        all_args.push(receiver);
        all_args.extend(args.iter().copied());
        Self {
            op,
            method: Some(method),
            dest,
            args: all_args,
        }
    }

    /// The operation tag.
    #[inline]
    pub fn op(&self) -> Op {
        self.op
    }

    /// The callee, for invoke operations.
    #[inline]
    pub fn method(&self) -> Option<MethodIndex> {
        self.method
    }

    /// The destination operand, if any.
    #[inline]
    pub fn dest(&self) -> Option<Value> {
        self.dest
    }

    /// The argument operands, in call order.
    #[inline]
    pub fn args(&self) -> &[Value] {
        &self.args
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.op)?;
        let mut sep = " ";
        if let Some(dest) = self.dest {
            write!(f, " {}", dest)?;
            sep = ", ";
        }
        for arg in &self.args {
            write!(f, "{}{}", sep, arg)?;
            sep = ", ";
        }
        if let Some(method) = self.method {
            write!(f, " method@{}", method.index())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invoke_puts_receiver_first() {
        let inst = Instruction::invoke_virtual(
            MethodIndex::new(4),
            None,
            Value::Local(0),
            &[Value::Parameter(0), Value::Parameter(1)],
        );
        assert_eq!(inst.op(), Op::InvokeVirtual);
        assert_eq!(inst.method(), Some(MethodIndex::new(4)));
        assert_eq!(
            inst.args(),
            &[Value::Local(0), Value::Parameter(0), Value::Parameter(1)]
        );
    }

    #[test]
    fn test_display() {
        let inst = Instruction::with_args(
            Op::Move,
            Some(Value::Local(1)),
            &[Value::Immediate(5)],
        );
        assert_eq!(inst.to_string(), "move v1, #5");

        let call = Instruction::invoke_direct(
            MethodIndex::new(2),
            None,
            Value::Local(0),
            &[Value::Local(1)],
        );
        assert_eq!(call.to_string(), "invoke-direct v0, v1 method@2");
    }
}
