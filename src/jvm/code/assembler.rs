use super::{Instruction, InstructionSink};
use crate::jvm::class_file::{BytecodeArray, Code, ConstantsPool};
use crate::jvm::stack::Size;
use crate::jvm::Error;

/// Accumulates straight-line instructions while tracking the operand stack
///
/// Every appended instruction adjusts the current stack depth by its
/// [effect](Instruction::size_effect) and the running `max_stack` watermark is kept up to date,
/// so the assembled [`Code`] attribute never understates its stack requirements. Popping below an
/// empty stack is rejected as soon as it happens instead of surfacing as a verification error at
/// class load time.
pub struct CodeAssembler {
    instructions: Vec<Instruction>,
    depth: i32,
    max_stack: i32,
}

impl CodeAssembler {
    pub fn new() -> CodeAssembler {
        CodeAssembler {
            instructions: vec![],
            depth: 0,
            max_stack: 0,
        }
    }

    /// Current operand stack depth, in slots
    pub fn depth(&self) -> i32 {
        self.depth
    }

    /// Highest operand stack depth observed so far, in slots
    pub fn max_stack(&self) -> i32 {
        self.max_stack
    }

    /// Append an instruction, updating the stack accounting
    pub fn push_instruction(&mut self, instruction: Instruction) -> Result<(), Error> {
        let Size { impact, maximal } = instruction.size_effect();
        self.max_stack = self.max_stack.max(self.depth + maximal);
        self.depth += impact;
        if self.depth < 0 {
            return Err(Error::StackUnderflow { depth: self.depth });
        }
        self.instructions.push(instruction);
        Ok(())
    }

    /// Encode all accumulated instructions into a `Code` attribute
    ///
    /// `max_locals` is the caller's to supply since locals are not tracked here.
    pub fn into_code(
        self,
        max_locals: u16,
        constants: &mut ConstantsPool,
    ) -> Result<Code, Error> {
        let mut code_array = vec![];
        for instruction in &self.instructions {
            instruction.encode(constants, &mut code_array)?;
        }

        // Bytecode offsets (eg. in exception tables) are `u16`
        if code_array.len() >= u16::MAX as usize + 1 {
            return Err(Error::MethodCodeOverflow(code_array.len()));
        }
        let max_stack = u16::try_from(self.max_stack)
            .map_err(|_| Error::MethodCodeMaxStackOverflow(self.max_stack))?;

        Ok(Code {
            max_stack,
            max_locals,
            code_array: BytecodeArray(code_array),
            exception_table: vec![],
            attributes: vec![],
        })
    }
}

impl Default for CodeAssembler {
    fn default() -> CodeAssembler {
        CodeAssembler::new()
    }
}

impl InstructionSink for CodeAssembler {
    fn emit(&mut self, instruction: Instruction) -> Result<(), Error> {
        self.push_instruction(instruction)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn tracks_watermark_not_final_depth() {
        let mut assembler = CodeAssembler::new();
        assembler.push_instruction(Instruction::LConst0).unwrap();
        assembler.push_instruction(Instruction::L2F).unwrap();
        assembler.push_instruction(Instruction::FReturn).unwrap();
        assert_eq!(assembler.depth(), 0);
        assert_eq!(assembler.max_stack(), 2);
    }

    #[test]
    fn rejects_underflow() {
        let mut assembler = CodeAssembler::new();
        assembler.push_instruction(Instruction::IConst0).unwrap();
        let result = assembler.push_instruction(Instruction::Pop2);
        assert!(matches!(result, Err(Error::StackUnderflow { depth: -1 })));
    }

    #[test]
    fn assembles_code_attribute() {
        let mut constants = ConstantsPool::new();
        let mut assembler = CodeAssembler::new();
        assembler.push_instruction(Instruction::ILoad(0)).unwrap();
        assembler.push_instruction(Instruction::IReturn).unwrap();
        let code = assembler.into_code(1, &mut constants).unwrap();
        assert_eq!(code.max_stack, 1);
        assert_eq!(code.max_locals, 1);
        assert_eq!(code.code_array.0, vec![0x1a, 0xac]);
    }
}
