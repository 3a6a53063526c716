//! Straight-line bytecode and its assembly into `Code` attributes
//!
//! [`Instruction`] keeps symbolic operands (class names, method references) so that instructions
//! can be built up without a constant pool in hand; indices are only interned when the
//! instructions are [encoded](Instruction::encode). [`CodeAssembler`] collects instructions while
//! tracking the operand stack depth, so the final [`Code`](crate::jvm::class_file::Code)
//! attribute carries a `max_stack` that is correct by construction.

mod assembler;
mod instructions;

pub use assembler::*;
pub use instructions::*;
