//! Contract-violation errors reported during bytecode construction.
//!
//! Every variant is a programmer error, not a transient fault: construction
//! aborts on the first one and no partial artifact is produced. Each carries
//! enough context (instruction index, field, expected range) to locate the
//! defect at the call site.

use std::fmt;

/// Which interning table an unknown id was checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    String,
    Type,
    Method,
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SymbolKind::String => "string",
            SymbolKind::Type => "type",
            SymbolKind::Method => "method",
        })
    }
}

/// Error raised while building or encoding a method body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuilderError {
    /// An operand does not fit the instruction-format field it must occupy.
    OperandOutOfRange {
        /// Index of the offending virtual instruction.
        instruction: usize,
        /// Format field the operand was destined for.
        field: &'static str,
        /// The out-of-range value.
        value: i64,
        /// Smallest representable value.
        min: i64,
        /// Largest representable value.
        max: i64,
    },
    /// An invocation names more arguments than the invoke format carries.
    TooManyArguments {
        instruction: usize,
        count: usize,
        max: usize,
    },
    /// The opcode has no encoding for this combination of operand kinds.
    UnsupportedOperands {
        instruction: usize,
        op: &'static str,
        detail: &'static str,
    },
    /// An operand that must resolve to a frame register was something else.
    NotAVariable {
        instruction: usize,
        field: &'static str,
    },
    /// A label was bound a second time.
    LabelRebound { label: u32 },
    /// A label id was not allocated by this method's builder.
    UnknownLabel { label: u32 },
    /// A referenced label was never bound by the end of the encode pass.
    UnboundLabel { label: u32, pending: usize },
    /// A symbol id was never interned by the owning builder.
    UnknownSymbol {
        kind: SymbolKind,
        id: u32,
        /// Current size of the table the id was checked against.
        limit: u32,
    },
    /// The encode pass was invoked a second time.
    AlreadyEncoded,
    /// The method frame exceeds the representable register count.
    RegisterOverflow,
}

impl fmt::Display for BuilderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuilderError::OperandOutOfRange {
                instruction,
                field,
                value,
                min,
                max,
            } => write!(
                f,
                "instruction {}: {} value {} outside {}..={}",
                instruction, field, value, min, max
            ),
            BuilderError::TooManyArguments {
                instruction,
                count,
                max,
            } => write!(
                f,
                "instruction {}: invoke carries {} arguments, format allows {}",
                instruction, count, max
            ),
            BuilderError::UnsupportedOperands {
                instruction,
                op,
                detail,
            } => write!(f, "instruction {}: {}: {}", instruction, op, detail),
            BuilderError::NotAVariable { instruction, field } => write!(
                f,
                "instruction {}: {} must be a local register or parameter",
                instruction, field
            ),
            BuilderError::LabelRebound { label } => {
                write!(f, "label L{} bound twice", label)
            }
            BuilderError::UnknownLabel { label } => {
                write!(f, "label L{} was not allocated by this method", label)
            }
            BuilderError::UnboundLabel { label, pending } => write!(
                f,
                "label L{} never bound, {} reference(s) left unpatched",
                label, pending
            ),
            BuilderError::UnknownSymbol { kind, id, limit } => write!(
                f,
                "{} id {} was never interned (table holds {} entries)",
                kind, id, limit
            ),
            BuilderError::AlreadyEncoded => {
                f.write_str("method body was already encoded")
            }
            BuilderError::RegisterOverflow => {
                f.write_str("method frame exceeds the register limit")
            }
        }
    }
}

impl std::error::Error for BuilderError {}

/// Result type for builder operations.
pub type BuilderResult<T> = Result<T, BuilderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_context() {
        let err = BuilderError::OperandOutOfRange {
            instruction: 3,
            field: "immediate B",
            value: 8,
            min: -8,
            max: 7,
        };
        let message = err.to_string();
        assert!(message.contains("instruction 3"));
        assert!(message.contains("immediate B"));
        assert!(message.contains("-8..=7"));
    }
}
