//! Composable instruction sequences with operand stack accounting
//!
//! A [`StackManipulation`] is a small, self-describing unit of code generation: it knows whether
//! it is [valid](StackManipulation::is_valid) and, when applied to an
//! [`InstructionSink`](crate::jvm::code::InstructionSink), reports the [`Size`] of its effect on
//! the operand stack. Manipulations compose with [`StackManipulation::Compound`], and the
//! [`assign`] submodule produces them to adapt a value of one type into another.

pub mod assign;
mod collection;
mod size;

pub use collection::*;
pub use size::*;

use crate::jvm::code::{Instruction, InstructionSink, MethodRef};
use crate::jvm::{
    BaseType, BinaryName, Error, FieldType, MethodDescriptor, RefType, UnqualifiedName,
};
use crate::pool::TypeDescription;

/// Effect of a chunk of code on the operand stack
///
/// `impact` is the net change in stack depth after the code runs. `maximal` is the largest
/// interim growth relative to the depth at which the code started, which is what `max_stack`
/// bookkeeping actually needs. Popping never grows the stack, so `maximal` is never negative.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct Size {
    pub impact: i32,
    pub maximal: i32,
}

impl Size {
    pub const ZERO: Size = Size {
        impact: 0,
        maximal: 0,
    };

    /// Combined effect of this code running immediately before `other`
    ///
    /// The second chunk starts at the depth the first one left behind, so its interim peak is
    /// measured from there. Aggregating is how a compound sequence can have a smaller peak than
    /// the sum of its parts: a pop in the middle gives the following code headroom.
    pub fn aggregate(self, other: Size) -> Size {
        Size {
            impact: self.impact + other.impact,
            maximal: self.maximal.max(self.impact + other.maximal),
        }
    }
}

/// Conversion between primitive types that widens the value
///
/// Each variant maps to a single conversion instruction. Conversions that the JVM treats as
/// implicit (between the `int` family members) have no variant since no instruction is needed.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum PrimitiveWidening {
    IntToLong,
    IntToFloat,
    IntToDouble,
    LongToFloat,
    LongToDouble,
    FloatToDouble,
}

impl PrimitiveWidening {
    fn instruction(self) -> Instruction {
        match self {
            PrimitiveWidening::IntToLong => Instruction::I2L,
            PrimitiveWidening::IntToFloat => Instruction::I2F,
            PrimitiveWidening::IntToDouble => Instruction::I2D,
            PrimitiveWidening::LongToFloat => Instruction::L2F,
            PrimitiveWidening::LongToDouble => Instruction::L2D,
            PrimitiveWidening::FloatToDouble => Instruction::F2D,
        }
    }
}

/// Composable unit of code generation
///
/// This is a closed set of the manipulations the adaptation engine needs. [`Illegal`] is the
/// sentinel for "no such conversion exists": producers return it instead of an error so that
/// callers can probe for viability with [`is_valid`](StackManipulation::is_valid) before
/// committing, and only an actual attempt to [apply](StackManipulation::apply) it fails.
///
/// [`Illegal`]: StackManipulation::Illegal
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum StackManipulation {
    /// Legal manipulation that emits nothing
    Trivial,

    /// Sentinel for a manipulation that cannot exist
    Illegal,

    /// Discard the top value of the stack
    Pop(StackSize),

    /// Push the zero value of a primitive type
    DefaultValue(BaseType),

    /// Push `null`
    Null,

    /// Read an element out of an array
    ArrayLoad(ArrayAccess),

    /// Write an element into an array
    ArrayStore(ArrayAccess),

    /// Widen the primitive value on top of the stack
    Widen(PrimitiveWidening),

    /// Box the primitive value on top of the stack into its wrapper object
    Box(BaseType),

    /// Unbox the wrapper object on top of the stack into its primitive value
    Unbox(BaseType),

    /// Runtime-checked cast of the reference on top of the stack
    Cast(RefType<BinaryName>),

    /// Sequence of manipulations, applied in order
    Compound(Vec<StackManipulation>),
}

impl StackManipulation {
    /// Manipulation that pushes the default value of a type
    ///
    /// `void` has no value so nothing gets pushed, reference types default to `null`, and
    /// primitives to their zero value.
    pub fn default_value(typ: &TypeDescription) -> StackManipulation {
        match typ {
            TypeDescription::Void => StackManipulation::Trivial,
            TypeDescription::Base(base_type) => StackManipulation::DefaultValue(*base_type),
            _ => StackManipulation::Null,
        }
    }

    /// Could this manipulation be applied?
    pub fn is_valid(&self) -> bool {
        match self {
            StackManipulation::Illegal => false,
            StackManipulation::Compound(parts) => parts.iter().all(|part| part.is_valid()),
            _ => true,
        }
    }

    /// Emit the instructions for this manipulation and report the stack effect
    ///
    /// Nothing is emitted unless the whole manipulation is valid, so a failing compound does not
    /// leave a half-applied prefix in the sink.
    pub fn apply<S: InstructionSink>(&self, sink: &mut S) -> Result<Size, Error> {
        if !self.is_valid() {
            return Err(Error::IllegalManipulation);
        }
        self.apply_valid(sink)
    }

    fn apply_valid<S: InstructionSink>(&self, sink: &mut S) -> Result<Size, Error> {
        match self {
            StackManipulation::Trivial => Ok(Size::ZERO),
            StackManipulation::Illegal => Err(Error::IllegalManipulation),

            StackManipulation::Pop(StackSize::Zero) => Err(Error::PopVoid),
            StackManipulation::Pop(size @ StackSize::Single) => {
                sink.emit(Instruction::Pop)?;
                Ok(size.to_decreasing_size())
            }
            StackManipulation::Pop(size @ StackSize::Double) => {
                sink.emit(Instruction::Pop2)?;
                Ok(size.to_decreasing_size())
            }

            StackManipulation::DefaultValue(base_type) => {
                let instruction = match base_type {
                    BaseType::Long => Instruction::LConst0,
                    BaseType::Float => Instruction::FConst0,
                    BaseType::Double => Instruction::DConst0,
                    _ => Instruction::IConst0,
                };
                let size = instruction.size_effect();
                sink.emit(instruction)?;
                Ok(size)
            }

            StackManipulation::Null => {
                sink.emit(Instruction::AConstNull)?;
                Ok(StackSize::Single.to_increasing_size())
            }

            StackManipulation::ArrayLoad(access) => {
                sink.emit(access.load_instruction())?;
                Ok(access.load_size())
            }
            StackManipulation::ArrayStore(access) => {
                sink.emit(access.store_instruction())?;
                Ok(access.store_size())
            }

            StackManipulation::Widen(widening) => {
                let instruction = widening.instruction();
                let size = instruction.size_effect();
                sink.emit(instruction)?;
                Ok(size)
            }

            StackManipulation::Box(base_type) => {
                let instruction = Instruction::InvokeStatic(boxing_method(*base_type));
                let size = instruction.size_effect();
                sink.emit(instruction)?;
                Ok(size)
            }

            StackManipulation::Unbox(base_type) => {
                let instruction = Instruction::InvokeVirtual(unboxing_method(*base_type));
                let size = instruction.size_effect();
                sink.emit(instruction)?;
                Ok(size)
            }

            StackManipulation::Cast(ref_type) => {
                sink.emit(Instruction::CheckCast(ref_type.clone()))?;
                Ok(Size::ZERO)
            }

            StackManipulation::Compound(parts) => {
                let mut size = Size::ZERO;
                for part in parts {
                    size = size.aggregate(part.apply_valid(sink)?);
                }
                Ok(size)
            }
        }
    }
}

/// Wrapper class corresponding to a primitive type
pub fn wrapper_class(base_type: BaseType) -> BinaryName {
    match base_type {
        BaseType::Boolean => BinaryName::BOOLEAN,
        BaseType::Byte => BinaryName::BYTE,
        BaseType::Char => BinaryName::CHARACTER,
        BaseType::Short => BinaryName::SHORT,
        BaseType::Int => BinaryName::INTEGER,
        BaseType::Long => BinaryName::LONG,
        BaseType::Float => BinaryName::FLOAT,
        BaseType::Double => BinaryName::DOUBLE,
    }
}

/// `Wrapper.valueOf(primitive)` factory reference
fn boxing_method(base_type: BaseType) -> MethodRef {
    let class = wrapper_class(base_type);
    MethodRef {
        class: class.clone(),
        name: UnqualifiedName::VALUEOF,
        descriptor: MethodDescriptor {
            parameters: vec![FieldType::Base(base_type)],
            return_type: Some(FieldType::object(class)),
        },
    }
}

/// `wrapper.xxxValue()` accessor reference
fn unboxing_method(base_type: BaseType) -> MethodRef {
    let name = match base_type {
        BaseType::Boolean => UnqualifiedName::BOOLEANVALUE,
        BaseType::Byte => UnqualifiedName::BYTEVALUE,
        BaseType::Char => UnqualifiedName::CHARVALUE,
        BaseType::Short => UnqualifiedName::SHORTVALUE,
        BaseType::Int => UnqualifiedName::INTVALUE,
        BaseType::Long => UnqualifiedName::LONGVALUE,
        BaseType::Float => UnqualifiedName::FLOATVALUE,
        BaseType::Double => UnqualifiedName::DOUBLEVALUE,
    };
    MethodRef {
        class: wrapper_class(base_type),
        name,
        descriptor: MethodDescriptor {
            parameters: vec![],
            return_type: Some(FieldType::Base(base_type)),
        },
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn aggregate_tracks_interim_peak() {
        let first = Size { impact: 1, maximal: 3 };
        let second = Size { impact: 1, maximal: 1 };

        // Naive summation of the peaks would claim 4 slots are needed
        assert_eq!(first.aggregate(second), Size { impact: 2, maximal: 3 });
    }

    #[test]
    fn aggregate_after_pops_has_headroom() {
        let pushes_three = Size { impact: 3, maximal: 3 };
        let pops_two = Size { impact: -2, maximal: 0 };
        let pushes_one = Size { impact: 1, maximal: 1 };

        let total = pushes_three.aggregate(pops_two).aggregate(pushes_one);
        assert_eq!(total, Size { impact: 2, maximal: 3 });
    }

    #[test]
    fn compound_validity() {
        let valid = StackManipulation::Compound(vec![
            StackManipulation::Trivial,
            StackManipulation::Null,
        ]);
        assert!(valid.is_valid());

        let invalid = StackManipulation::Compound(vec![
            StackManipulation::Null,
            StackManipulation::Illegal,
        ]);
        assert!(!invalid.is_valid());
    }

    #[test]
    fn illegal_does_not_leave_partial_output() {
        let manipulation = StackManipulation::Compound(vec![
            StackManipulation::Null,
            StackManipulation::Illegal,
        ]);

        let mut instructions: Vec<Instruction> = vec![];
        let result = manipulation.apply(&mut instructions);
        assert!(matches!(result, Err(Error::IllegalManipulation)));
        assert!(instructions.is_empty());
    }

    #[test]
    fn pop_void_is_rejected() {
        let mut instructions: Vec<Instruction> = vec![];
        let result = StackManipulation::Pop(StackSize::Zero).apply(&mut instructions);
        assert!(matches!(result, Err(Error::PopVoid)));
    }

    #[test]
    fn boxing_sizes() {
        let mut instructions: Vec<Instruction> = vec![];

        // int -> Integer swaps one slot for one slot
        let size = StackManipulation::Box(BaseType::Int).apply(&mut instructions).unwrap();
        assert_eq!(size, Size { impact: 0, maximal: 0 });

        // long -> Long shrinks two slots down to one
        let size = StackManipulation::Box(BaseType::Long).apply(&mut instructions).unwrap();
        assert_eq!(size, Size { impact: -1, maximal: 0 });

        // Long -> long grows one slot into two
        let size = StackManipulation::Unbox(BaseType::Long).apply(&mut instructions).unwrap();
        assert_eq!(size, Size { impact: 1, maximal: 1 });
    }
}
