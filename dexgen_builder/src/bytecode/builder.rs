//! Method body construction and the encode pass.
//!
//! A [`MethodBuilder`] accumulates virtual instructions, hands out fresh
//! registers and labels, and - once the body is complete - runs a single
//! left-to-right encode pass that selects concrete instruction formats,
//! resolves registers and branch targets, and backpatches forward
//! references. The finished code-unit buffer goes to the container layer
//! together with the frame's register, ins and outs counts.

use crate::bytecode::format::{self, CodeUnit, Opcode};
use crate::bytecode::instruction::{Instruction, Op};
use crate::container::{ContainerSink, MethodCode};
use crate::dex::{DexBuilder, MethodDecl};
use crate::error::{BuilderError, BuilderResult, SymbolKind};
use dexgen_core::{ClassIndex, LabelId, Prototype, TypeDescriptor, Value};

/// A patch site waiting on an unbound label.
#[derive(Debug, Clone, Copy)]
struct LabelReference {
    /// Offset of the first unit of the referencing instruction.
    instruction_offset: usize,
    /// Offset of the unit holding the branch field.
    field_offset: usize,
}

/// Per-label state: the bound address once known, and every site to patch
/// when it becomes known. Only forward references leave pending entries.
#[derive(Debug, Default)]
struct LabelRecord {
    bound_address: Option<usize>,
    references: Vec<LabelReference>,
}

/// Builds one method body.
///
/// Registers are handed out monotonically and never reused; callers manage
/// register pressure. Instructions are encoded in the order they were
/// added. The encode pass runs exactly once; a second invocation is
/// rejected.
pub struct MethodBuilder<'a, S: ContainerSink> {
    dex: &'a mut DexBuilder<S>,
    class: ClassIndex,
    decl: MethodDecl,
    /// Incoming parameter count, fixed by the declared prototype.
    ins: u16,

    /// The body, in program order.
    instructions: Vec<Instruction>,
    /// Encoded output.
    buffer: Vec<CodeUnit>,
    /// How many local registers have been allocated.
    num_registers: u16,
    /// Label arena, indexed by [`LabelId`].
    labels: Vec<LabelRecord>,
    /// Largest argument count of any call in the body, for the outs count.
    max_args: u16,
    encoded: bool,
}

impl<'a, S: ContainerSink> MethodBuilder<'a, S> {
    pub(crate) fn new(
        dex: &'a mut DexBuilder<S>,
        class: ClassIndex,
        decl: MethodDecl,
        ins: u16,
    ) -> Self {
        Self {
            dex,
            class,
            decl,
            ins,
            instructions: Vec::new(),
            buffer: Vec::new(),
            num_registers: 0,
            labels: Vec::new(),
            max_args: 0,
            encoded: false,
        }
    }

    /// The declaration this body is being built for.
    #[inline]
    pub fn decl(&self) -> MethodDecl {
        self.decl
    }

    // =========================================================================
    // Register and label allocation
    // =========================================================================

    /// Allocate a fresh local register.
    ///
    /// These are not SSA registers: there is no liveness tracking and no
    /// reuse, so it is up to the caller to keep the frame small.
    pub fn alloc_register(&mut self) -> BuilderResult<Value> {
        let id = self.num_registers;
        self.num_registers = self
            .num_registers
            .checked_add(1)
            .ok_or(BuilderError::RegisterOverflow)?;
        Ok(Value::Local(id))
    }

    /// Allocate a fresh, unbound label.
    pub fn alloc_label(&mut self) -> Value {
        let id = LabelId::new(self.labels.len() as u32);
        self.labels.push(LabelRecord::default());
        Value::Label(id)
    }

    // =========================================================================
    // Body construction
    // =========================================================================

    /// Append an instruction verbatim. Call order is program order.
    pub fn add_instruction(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }

    /// `return-void`
    pub fn build_return(&mut self) {
        self.add_instruction(Instruction::no_args(Op::Return));
    }

    /// `return` or `return-object`, per the object-reference flag.
    pub fn build_return_value(&mut self, src: Value, is_object: bool) {
        let op = if is_object { Op::ReturnObject } else { Op::Return };
        self.add_instruction(Instruction::with_args(op, None, &[src]));
    }

    /// Load a small constant: `const/4`.
    pub fn build_const4(&mut self, dest: Value, value: i32) {
        self.add_instruction(Instruction::with_args(
            Op::Move,
            Some(dest),
            &[Value::Immediate(value)],
        ));
    }

    /// Load a string constant, interning the literal: `const-string`.
    pub fn build_const_string(&mut self, dest: Value, value: &str) {
        let id = self.dex.get_or_add_string(value);
        self.add_instruction(Instruction::with_args(
            Op::Move,
            Some(dest),
            &[Value::String(id)],
        ));
    }

    /// Branch to `target` if the test register is zero: `if-eqz`.
    pub fn build_branch_eqz(&mut self, test: Value, target: Value) {
        self.add_instruction(Instruction::with_args(
            Op::BranchEqz,
            None,
            &[test, target],
        ));
    }

    /// Mark the current end of the body as the target of `label`.
    ///
    /// Takes effect during the encode pass: the label binds to the position
    /// the stream has reached when this instruction is encountered.
    pub fn bind_label(&mut self, label: Value) {
        self.add_instruction(Instruction::with_args(Op::BindLabel, None, &[label]));
    }

    /// Allocate an instance of `ty` into `dest` and invoke its constructor.
    ///
    /// Emits a `new-instance` immediately followed by an `invoke-direct` on
    /// the interned `<init>` method; the pair is appended atomically, so the
    /// body never holds the allocation without the constructor call.
    pub fn build_new(
        &mut self,
        dest: Value,
        ty: &TypeDescriptor,
        constructor: Prototype,
        args: &[Value],
    ) {
        let ctor = self
            .dex
            .get_or_declare_method(ty.clone(), "<init>", constructor);
        let type_idx = self.dex.get_or_add_type(ty);
        self.add_instruction(Instruction::with_args(
            Op::New,
            Some(dest),
            &[Value::Type(type_idx)],
        ));
        self.add_instruction(Instruction::invoke_direct(ctor.id, None, dest, args));
    }

    // =========================================================================
    // Encode pass
    // =========================================================================

    /// Encode the body and hand the finished code to the container layer.
    ///
    /// Runs exactly once: the instruction sequence is consumed, every label
    /// must end up bound, and the resulting code units plus register/ins/outs
    /// counts are attached to the declared method. A second call reports
    /// [`BuilderError::AlreadyEncoded`].
    pub fn encode(&mut self) -> BuilderResult<()> {
        if self.encoded {
            return Err(BuilderError::AlreadyEncoded);
        }
        self.encoded = true;

        self.encode_instructions()?;

        let registers = self
            .num_registers
            .checked_add(self.ins)
            .ok_or(BuilderError::RegisterOverflow)?;
        let code = MethodCode {
            registers,
            ins: self.ins,
            outs: self.max_args,
            units: std::mem::take(&mut self.buffer),
        };
        self.dex.attach_code(self.class, self.decl.id, code);
        Ok(())
    }

    fn encode_instructions(&mut self) -> BuilderResult<()> {
        let instructions = std::mem::take(&mut self.instructions);
        for (index, instruction) in instructions.iter().enumerate() {
            self.encode_instruction(index, instruction)?;
        }

        // Every referenced label must have bound somewhere in the body;
        // a leftover reference would leave a placeholder offset in the
        // artifact.
        for (id, label) in self.labels.iter().enumerate() {
            if !label.references.is_empty() {
                return Err(BuilderError::UnboundLabel {
                    label: id as u32,
                    pending: label.references.len(),
                });
            }
        }
        Ok(())
    }

    fn encode_instruction(&mut self, index: usize, instruction: &Instruction) -> BuilderResult<()> {
        match instruction.op() {
            Op::Return => self.encode_return(index, instruction, Opcode::Return),
            Op::ReturnObject => self.encode_return(index, instruction, Opcode::ReturnObject),
            Op::Move => self.encode_move(index, instruction),
            Op::InvokeVirtual => self.encode_invoke(index, instruction, Opcode::InvokeVirtual),
            Op::InvokeDirect => self.encode_invoke(index, instruction, Opcode::InvokeDirect),
            Op::BindLabel => self.encode_bind_label(index, instruction),
            Op::BranchEqz => self.encode_branch(index, instruction, Opcode::IfEqz),
            Op::New => self.encode_new(index, instruction),
        }
    }

    /// Resolve a register or parameter to its frame register number.
    ///
    /// Parameters land after every local: their register number is the
    /// local count plus the parameter index, which is only meaningful now
    /// that allocation has finished.
    fn register_value(&self, index: usize, field: &'static str, value: Value) -> BuilderResult<u16> {
        match value {
            Value::Local(id) => Ok(id),
            Value::Parameter(id) => self
                .num_registers
                .checked_add(id)
                .ok_or(BuilderError::RegisterOverflow),
            _ => Err(BuilderError::NotAVariable {
                instruction: index,
                field,
            }),
        }
    }

    fn encode_return(
        &mut self,
        index: usize,
        instruction: &Instruction,
        opcode: Opcode,
    ) -> BuilderResult<()> {
        match instruction.args() {
            [] => self.buffer.push(format::encode_10x(Opcode::ReturnVoid)),
            [src] => {
                let a = self.register_value(index, "register A", *src)?;
                let unit = format::encode_11x(index, opcode, a)?;
                self.buffer.push(unit);
            }
            _ => {
                return Err(BuilderError::UnsupportedOperands {
                    instruction: index,
                    op: instruction.op().name(),
                    detail: "takes at most one value",
                })
            }
        }
        Ok(())
    }

    fn encode_move(&mut self, index: usize, instruction: &Instruction) -> BuilderResult<()> {
        let dest = instruction.dest().ok_or(BuilderError::UnsupportedOperands {
            instruction: index,
            op: Op::Move.name(),
            detail: "requires a destination",
        })?;
        let a = self.register_value(index, "register A", dest)?;

        let &[source] = instruction.args() else {
            return Err(BuilderError::UnsupportedOperands {
                instruction: index,
                op: Op::Move.name(),
                detail: "takes exactly one source",
            });
        };
        match source {
            Value::Immediate(value) => {
                let unit = format::encode_11n(index, Opcode::Const4, a, value)?;
                self.buffer.push(unit);
            }
            Value::String(id) => {
                if !self.dex.has_string(id) {
                    return Err(BuilderError::UnknownSymbol {
                        kind: SymbolKind::String,
                        id: id.index(),
                        limit: self.dex.string_count() as u32,
                    });
                }
                let units = format::encode_21c(index, Opcode::ConstString, a, id.index())?;
                self.buffer.extend_from_slice(&units);
            }
            // Selecting a register-to-register variant would need type
            // knowledge the operand does not carry.
            _ => {
                return Err(BuilderError::UnsupportedOperands {
                    instruction: index,
                    op: Op::Move.name(),
                    detail: "no encoding for this source kind",
                })
            }
        }
        Ok(())
    }

    fn encode_invoke(
        &mut self,
        index: usize,
        instruction: &Instruction,
        opcode: Opcode,
    ) -> BuilderResult<()> {
        let method = instruction
            .method()
            .ok_or(BuilderError::UnsupportedOperands {
                instruction: index,
                op: instruction.op().name(),
                detail: "requires a callee",
            })?;
        if !self.dex.has_method(method) {
            return Err(BuilderError::UnknownSymbol {
                kind: SymbolKind::Method,
                id: method.index(),
                limit: self.dex.method_count() as u32,
            });
        }

        let args = instruction.args();
        if args.len() > 5 {
            return Err(BuilderError::TooManyArguments {
                instruction: index,
                count: args.len(),
                max: 5,
            });
        }
        let mut regs = [0u16; 5];
        for (i, &arg) in args.iter().enumerate() {
            regs[i] = self.register_value(index, "argument register", arg)?;
        }

        let units = format::encode_35c(index, opcode, &regs[..args.len()], method.index())?;
        self.buffer.extend_from_slice(&units);

        // The call result lands in a staging register; copy it out if the
        // caller asked for it.
        if let Some(dest) = instruction.dest() {
            let a = self.register_value(index, "register A", dest)?;
            let unit = format::encode_11x(index, Opcode::MoveResult, a)?;
            self.buffer.push(unit);
        }

        self.max_args = self.max_args.max(args.len() as u16);
        Ok(())
    }

    fn encode_branch(
        &mut self,
        index: usize,
        instruction: &Instruction,
        opcode: Opcode,
    ) -> BuilderResult<()> {
        let &[test, target] = instruction.args() else {
            return Err(BuilderError::UnsupportedOperands {
                instruction: index,
                op: instruction.op().name(),
                detail: "takes a test register and a label",
            });
        };
        let Value::Label(label) = target else {
            return Err(BuilderError::UnsupportedOperands {
                instruction: index,
                op: instruction.op().name(),
                detail: "branch target must be a label",
            });
        };
        let a = self.register_value(index, "register A", test)?;

        let instruction_offset = self.buffer.len();
        let [first, _] = format::encode_21c(index, opcode, a, 0)?;
        self.buffer.push(first);
        let field_offset = self.buffer.len();
        let field = self.label_value(index, label, instruction_offset, field_offset)?;
        self.buffer.push(field);
        Ok(())
    }

    fn encode_new(&mut self, index: usize, instruction: &Instruction) -> BuilderResult<()> {
        let dest = instruction.dest().ok_or(BuilderError::UnsupportedOperands {
            instruction: index,
            op: Op::New.name(),
            detail: "requires a destination",
        })?;
        let &[ty] = instruction.args() else {
            return Err(BuilderError::UnsupportedOperands {
                instruction: index,
                op: Op::New.name(),
                detail: "takes exactly one type operand",
            });
        };
        let Value::Type(type_idx) = ty else {
            return Err(BuilderError::UnsupportedOperands {
                instruction: index,
                op: Op::New.name(),
                detail: "operand must be an interned type",
            });
        };
        if !self.dex.has_type(type_idx) {
            return Err(BuilderError::UnknownSymbol {
                kind: SymbolKind::Type,
                id: type_idx.index(),
                limit: self.dex.type_count() as u32,
            });
        }

        let a = self.register_value(index, "register A", dest)?;
        let units = format::encode_21c(index, Opcode::NewInstance, a, type_idx.index())?;
        self.buffer.extend_from_slice(&units);
        Ok(())
    }

    fn encode_bind_label(&mut self, index: usize, instruction: &Instruction) -> BuilderResult<()> {
        let &[label] = instruction.args() else {
            return Err(BuilderError::UnsupportedOperands {
                instruction: index,
                op: Op::BindLabel.name(),
                detail: "takes exactly one label operand",
            });
        };
        let Value::Label(label) = label else {
            return Err(BuilderError::UnsupportedOperands {
                instruction: index,
                op: Op::BindLabel.name(),
                detail: "operand must be a label",
            });
        };

        let record = self
            .labels
            .get_mut(label.index() as usize)
            .ok_or(BuilderError::UnknownLabel {
                label: label.index(),
            })?;
        if record.bound_address.is_some() {
            return Err(BuilderError::LabelRebound {
                label: label.index(),
            });
        }

        let address = self.buffer.len();
        record.bound_address = Some(address);
        for reference in record.references.drain(..) {
            let field = branch_offset(index, reference.instruction_offset, address)?;
            self.buffer[reference.field_offset] = field;
        }
        Ok(())
    }

    /// The branch field for a label reference at `instruction_offset`.
    ///
    /// Bound labels resolve immediately; unbound ones record a patch site
    /// and leave a placeholder until the label binds.
    fn label_value(
        &mut self,
        index: usize,
        label: LabelId,
        instruction_offset: usize,
        field_offset: usize,
    ) -> BuilderResult<CodeUnit> {
        let record = self
            .labels
            .get_mut(label.index() as usize)
            .ok_or(BuilderError::UnknownLabel {
                label: label.index(),
            })?;
        if let Some(address) = record.bound_address {
            return branch_offset(index, instruction_offset, address);
        }
        record.references.push(LabelReference {
            instruction_offset,
            field_offset,
        });
        Ok(0)
    }
}

/// Relative branch offset in code units, two's-complement 16-bit.
fn branch_offset(instruction: usize, from: usize, to: usize) -> BuilderResult<CodeUnit> {
    let delta = to as i64 - from as i64;
    if delta < i16::MIN as i64 || delta > i16::MAX as i64 {
        return Err(BuilderError::OperandOutOfRange {
            instruction,
            field: "branch offset",
            value: delta,
            min: i16::MIN as i64,
            max: i16::MAX as i64,
        });
    }
    Ok(delta as i16 as CodeUnit)
}
