use super::{Size, StackManipulation};
use crate::jvm::code::Instruction;
use crate::jvm::{BaseType, Error};
use crate::pool::TypeDescription;

/// Family of array access instructions for some component type
///
/// The JVM does not distinguish `boolean[]` from `byte[]` at the instruction level, so both
/// component types share the `byte` access family. All reference component types share a single
/// family as well.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum ArrayAccess {
    Byte,
    Short,
    Character,
    Integer,
    Long,
    Float,
    Double,
    Reference,
}

impl ArrayAccess {
    /// Access family for arrays with the given component type
    pub fn of(component_type: &TypeDescription) -> Result<ArrayAccess, Error> {
        let access = match component_type {
            TypeDescription::Void => return Err(Error::VoidArrayComponent),
            TypeDescription::Base(BaseType::Boolean) | TypeDescription::Base(BaseType::Byte) => {
                ArrayAccess::Byte
            }
            TypeDescription::Base(BaseType::Short) => ArrayAccess::Short,
            TypeDescription::Base(BaseType::Char) => ArrayAccess::Character,
            TypeDescription::Base(BaseType::Int) => ArrayAccess::Integer,
            TypeDescription::Base(BaseType::Long) => ArrayAccess::Long,
            TypeDescription::Base(BaseType::Float) => ArrayAccess::Float,
            TypeDescription::Base(BaseType::Double) => ArrayAccess::Double,
            _ => ArrayAccess::Reference,
        };
        Ok(access)
    }

    /// Manipulation that pops an index and an array reference and pushes the element
    pub fn load(self) -> StackManipulation {
        StackManipulation::ArrayLoad(self)
    }

    /// Manipulation that pops a value, an index, and an array reference
    pub fn store(self) -> StackManipulation {
        StackManipulation::ArrayStore(self)
    }

    /// Slots occupied by one element
    fn element_slots(self) -> i32 {
        match self {
            ArrayAccess::Long | ArrayAccess::Double => 2,
            _ => 1,
        }
    }

    pub(super) fn load_instruction(self) -> Instruction {
        match self {
            ArrayAccess::Byte => Instruction::BALoad,
            ArrayAccess::Short => Instruction::SALoad,
            ArrayAccess::Character => Instruction::CALoad,
            ArrayAccess::Integer => Instruction::IALoad,
            ArrayAccess::Long => Instruction::LALoad,
            ArrayAccess::Float => Instruction::FALoad,
            ArrayAccess::Double => Instruction::DALoad,
            ArrayAccess::Reference => Instruction::AALoad,
        }
    }

    pub(super) fn store_instruction(self) -> Instruction {
        match self {
            ArrayAccess::Byte => Instruction::BAStore,
            ArrayAccess::Short => Instruction::SAStore,
            ArrayAccess::Character => Instruction::CAStore,
            ArrayAccess::Integer => Instruction::IAStore,
            ArrayAccess::Long => Instruction::LAStore,
            ArrayAccess::Float => Instruction::FAStore,
            ArrayAccess::Double => Instruction::DAStore,
            ArrayAccess::Reference => Instruction::AAStore,
        }
    }

    pub(super) fn load_size(self) -> Size {
        let slots = self.element_slots();
        Size {
            impact: slots - 2,
            maximal: (slots - 2).max(0),
        }
    }

    pub(super) fn store_size(self) -> Size {
        Size {
            impact: -(2 + self.element_slots()),
            maximal: 0,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::stack::StackSize;
    use crate::pool::TypePool;

    fn base(base_type: BaseType) -> TypeDescription {
        TypeDescription::Base(base_type)
    }

    #[test]
    fn boolean_and_byte_share_a_family() {
        assert_eq!(
            ArrayAccess::of(&base(BaseType::Boolean)).unwrap(),
            ArrayAccess::Byte
        );
        assert_eq!(
            ArrayAccess::of(&base(BaseType::Byte)).unwrap(),
            ArrayAccess::Byte
        );
    }

    #[test]
    fn references_share_a_family() {
        let pool = TypePool::with_java_library_types();
        let object = pool.describe("java.lang.Object").unwrap().resolve().unwrap();
        let string = pool.describe("java.lang.String").unwrap().resolve().unwrap();
        assert_eq!(
            ArrayAccess::of(&object).unwrap(),
            ArrayAccess::of(&string).unwrap()
        );
    }

    #[test]
    fn void_components_are_rejected() {
        assert!(matches!(
            ArrayAccess::of(&TypeDescription::Void),
            Err(Error::VoidArrayComponent)
        ));
    }

    #[test]
    fn every_primitive_component_resolves() {
        let mut load_opcodes = std::collections::HashSet::new();
        for base_type in [
            BaseType::Boolean,
            BaseType::Byte,
            BaseType::Char,
            BaseType::Short,
            BaseType::Int,
            BaseType::Long,
            BaseType::Float,
            BaseType::Double,
        ] {
            let access = ArrayAccess::of(&base(base_type)).unwrap();
            let expected = StackSize::of_base(base_type).size() as i32;
            assert_eq!(access.load_size().impact, expected - 2);
            assert_eq!(access.store_size().impact, -(2 + expected));
            load_opcodes.insert(access.load_instruction());
        }

        // Distinct instruction families for everything except the boolean/byte pair
        assert_eq!(load_opcodes.len(), 7);
    }

    #[test]
    fn load_and_store_effects() {
        let mut instructions = vec![];
        let size = ArrayAccess::Long.load().apply(&mut instructions).unwrap();
        assert_eq!(size, Size { impact: 0, maximal: 0 });
        assert_eq!(instructions, vec![Instruction::LALoad]);

        let mut instructions = vec![];
        let size = ArrayAccess::Reference.store().apply(&mut instructions).unwrap();
        assert_eq!(size, Size { impact: -3, maximal: 0 });
        assert_eq!(instructions, vec![Instruction::AAStore]);
    }

    #[test]
    fn array_type_components() {
        let pool = TypePool::with_java_library_types();
        let ints = pool.describe("int[]").unwrap().resolve().unwrap();
        let component = ints.component_type().unwrap();
        assert_eq!(ArrayAccess::of(component).unwrap(), ArrayAccess::Integer);
    }
}
