use crate::jvm::class_file::ConstantsPool;
use crate::jvm::stack::Size;
use crate::jvm::{
    BinaryName, Error, FieldType, MethodDescriptor, RefType, RenderDescriptor, UnqualifiedName,
};
use crate::util::Width;

/// Symbolic reference to a method, prior to constant pool interning
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct MethodRef {
    pub class: BinaryName,
    pub name: UnqualifiedName,
    pub descriptor: MethodDescriptor<BinaryName>,
}

/// Straight-line instruction
///
/// Only the instructions which the stack manipulation layer emits are represented. Operands stay
/// symbolic (names and descriptors instead of constant pool indices) until
/// [encoding](Instruction::encode).
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-6.html#jvms-6.5
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Instruction {
    AConstNull,
    IConst0,
    LConst0,
    FConst0,
    DConst0,

    ILoad(u16),
    LLoad(u16),
    FLoad(u16),
    DLoad(u16),
    ALoad(u16),

    IALoad,
    LALoad,
    FALoad,
    DALoad,
    AALoad,
    BALoad,
    CALoad,
    SALoad,

    IAStore,
    LAStore,
    FAStore,
    DAStore,
    AAStore,
    BAStore,
    CAStore,
    SAStore,

    Pop,
    Pop2,
    Dup,

    I2L,
    I2F,
    I2D,
    L2F,
    L2D,
    F2D,

    IReturn,
    LReturn,
    FReturn,
    DReturn,
    AReturn,
    Return,

    InvokeVirtual(MethodRef),
    InvokeStatic(MethodRef),

    CheckCast(RefType<BinaryName>),
}

impl Instruction {
    /// Net effect of the instruction on the operand stack
    pub fn size_effect(&self) -> Size {
        use Instruction::*;

        fn pushes(slots: i32) -> Size {
            Size {
                impact: slots,
                maximal: slots,
            }
        }

        fn pops(slots: i32) -> Size {
            Size {
                impact: -slots,
                maximal: 0,
            }
        }

        match self {
            AConstNull | IConst0 | FConst0 => pushes(1),
            LConst0 | DConst0 => pushes(2),

            ILoad(_) | FLoad(_) | ALoad(_) => pushes(1),
            LLoad(_) | DLoad(_) => pushes(2),

            // Pops an array reference and an index, pushes the element
            IALoad | FALoad | AALoad | BALoad | CALoad | SALoad => Size {
                impact: -1,
                maximal: 0,
            },
            LALoad | DALoad => Size {
                impact: 0,
                maximal: 0,
            },

            // Pops an array reference, an index, and the element
            IAStore | FAStore | AAStore | BAStore | CAStore | SAStore => pops(3),
            LAStore | DAStore => pops(4),

            Pop => pops(1),
            Pop2 => pops(2),
            Dup => pushes(1),

            I2L | I2D | F2D => pushes(1),
            I2F | L2D => Size::ZERO,
            L2F => pops(1),

            IReturn | FReturn | AReturn => pops(1),
            LReturn | DReturn => pops(2),
            Return => Size::ZERO,

            InvokeVirtual(method) => invoke_effect(&method.descriptor, true),
            InvokeStatic(method) => invoke_effect(&method.descriptor, false),

            CheckCast(_) => Size::ZERO,
        }
    }

    /// Append the encoded form of the instruction, interning operands into the constant pool
    pub fn encode(
        &self,
        constants: &mut ConstantsPool,
        code: &mut Vec<u8>,
    ) -> Result<(), Error> {
        use Instruction::*;

        /* The load instructions follow the same pattern:
         *
         *   - short forms (0-3) have special bytes
         *   - normal form (0-255) uses `iload` plus a byte operand
         *   - wide form (256-65535) uses `wide iload` plus two byte operands
         */
        fn encode_load(idx: u16, short_form_start: u8, normal_form: u8, code: &mut Vec<u8>) {
            match u8::try_from(idx) {
                Ok(n @ 0..=3) => code.push(short_form_start + n),
                Ok(n) => {
                    code.push(normal_form);
                    code.push(n);
                }
                Err(_) => {
                    code.push(0xC4);
                    code.push(normal_form);
                    code.extend_from_slice(&idx.to_be_bytes());
                }
            }
        }

        match self {
            AConstNull => code.push(0x01),
            IConst0 => code.push(0x03),
            LConst0 => code.push(0x09),
            FConst0 => code.push(0x0b),
            DConst0 => code.push(0x0e),

            ILoad(idx) => encode_load(*idx, 0x1A, 0x15, code),
            LLoad(idx) => encode_load(*idx, 0x1E, 0x16, code),
            FLoad(idx) => encode_load(*idx, 0x22, 0x17, code),
            DLoad(idx) => encode_load(*idx, 0x26, 0x18, code),
            ALoad(idx) => encode_load(*idx, 0x2A, 0x19, code),

            IALoad => code.push(0x2e),
            LALoad => code.push(0x2f),
            FALoad => code.push(0x30),
            DALoad => code.push(0x31),
            AALoad => code.push(0x32),
            BALoad => code.push(0x33),
            CALoad => code.push(0x34),
            SALoad => code.push(0x35),

            IAStore => code.push(0x4f),
            LAStore => code.push(0x50),
            FAStore => code.push(0x51),
            DAStore => code.push(0x52),
            AAStore => code.push(0x53),
            BAStore => code.push(0x54),
            CAStore => code.push(0x55),
            SAStore => code.push(0x56),

            Pop => code.push(0x57),
            Pop2 => code.push(0x58),
            Dup => code.push(0x59),

            I2L => code.push(0x85),
            I2F => code.push(0x86),
            I2D => code.push(0x87),
            L2F => code.push(0x89),
            L2D => code.push(0x8a),
            F2D => code.push(0x8d),

            IReturn => code.push(0xac),
            LReturn => code.push(0xad),
            FReturn => code.push(0xae),
            DReturn => code.push(0xaf),
            AReturn => code.push(0xb0),
            Return => code.push(0xb1),

            InvokeVirtual(method) => {
                let method_ref = constants.get_method_ref(
                    &method.class,
                    &method.name,
                    &method.descriptor.render(),
                    false,
                )?;
                code.push(0xb6);
                code.extend_from_slice(&method_ref.0 .0.to_be_bytes());
            }
            InvokeStatic(method) => {
                let method_ref = constants.get_method_ref(
                    &method.class,
                    &method.name,
                    &method.descriptor.render(),
                    false,
                )?;
                code.push(0xb8);
                code.extend_from_slice(&method_ref.0 .0.to_be_bytes());
            }

            CheckCast(ref_type) => {
                let class = constants.get_class(ref_type)?;
                code.push(0xc0);
                code.extend_from_slice(&class.0 .0.to_be_bytes());
            }
        }
        Ok(())
    }
}

/// Stack effect of calling a method: the arguments (and receiver, if any) come off the stack and
/// the return value goes on
fn invoke_effect(descriptor: &MethodDescriptor<BinaryName>, has_receiver: bool) -> Size {
    let popped = descriptor.parameter_length(has_receiver) as i32;
    let pushed = match &descriptor.return_type {
        None => 0,
        Some(typ) => typ.width() as i32,
    };
    Size {
        impact: pushed - popped,
        maximal: (pushed - popped).max(0),
    }
}

/// Receiver of generated instructions
///
/// [`Vec<Instruction>`] collects instructions as-is; [`CodeAssembler`](super::CodeAssembler)
/// additionally tracks the operand stack while collecting.
pub trait InstructionSink {
    fn emit(&mut self, instruction: Instruction) -> Result<(), Error>;
}

impl InstructionSink for Vec<Instruction> {
    fn emit(&mut self, instruction: Instruction) -> Result<(), Error> {
        self.push(instruction);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::Name;

    #[test]
    fn load_encoding_forms() {
        let mut constants = ConstantsPool::new();
        let mut code = vec![];
        Instruction::ILoad(0).encode(&mut constants, &mut code).unwrap();
        Instruction::ILoad(3).encode(&mut constants, &mut code).unwrap();
        Instruction::ILoad(17).encode(&mut constants, &mut code).unwrap();
        Instruction::ILoad(700).encode(&mut constants, &mut code).unwrap();
        assert_eq!(
            code,
            vec![0x1a, 0x1d, 0x15, 17, 0xc4, 0x15, 0x02, 0xbc]
        );
    }

    #[test]
    fn stack_shuffle_effects_and_encoding() {
        assert_eq!(Instruction::Dup.size_effect(), Size { impact: 1, maximal: 1 });
        assert_eq!(Instruction::Pop.size_effect(), Size { impact: -1, maximal: 0 });
        assert_eq!(Instruction::Pop2.size_effect(), Size { impact: -2, maximal: 0 });

        let mut constants = ConstantsPool::new();
        let mut code = vec![];
        for instruction in [Instruction::Pop, Instruction::Pop2, Instruction::Dup] {
            instruction.encode(&mut constants, &mut code).unwrap();
        }
        assert_eq!(code, vec![0x57, 0x58, 0x59]);
    }

    #[test]
    fn invoke_effects() {
        let valueof = MethodRef {
            class: BinaryName::INTEGER,
            name: UnqualifiedName::VALUEOF,
            descriptor: MethodDescriptor {
                parameters: vec![FieldType::int()],
                return_type: Some(FieldType::object(BinaryName::INTEGER)),
            },
        };
        assert_eq!(
            Instruction::InvokeStatic(valueof).size_effect(),
            Size { impact: 0, maximal: 0 }
        );

        let long_value = MethodRef {
            class: BinaryName::LONG,
            name: UnqualifiedName::from_string(String::from("longValue")).unwrap(),
            descriptor: MethodDescriptor {
                parameters: vec![],
                return_type: Some(FieldType::long()),
            },
        };
        assert_eq!(
            Instruction::InvokeVirtual(long_value).size_effect(),
            Size { impact: 1, maximal: 1 }
        );
    }
}
