use super::Size;
use crate::jvm::BaseType;
use crate::pool::TypeDescription;

/// Number of operand stack slots a value of some type occupies
///
/// `void` occupies no slot at all, `long` and `double` occupy two, everything else (including all
/// reference types) occupies one.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum StackSize {
    Zero,
    Single,
    Double,
}

impl StackSize {
    pub fn of(typ: &TypeDescription) -> StackSize {
        match typ {
            TypeDescription::Void => StackSize::Zero,
            TypeDescription::Base(base_type) => StackSize::of_base(*base_type),
            _ => StackSize::Single,
        }
    }

    pub fn of_base(base_type: BaseType) -> StackSize {
        match base_type {
            BaseType::Long | BaseType::Double => StackSize::Double,
            _ => StackSize::Single,
        }
    }

    /// Number of slots occupied
    pub fn size(self) -> u16 {
        match self {
            StackSize::Zero => 0,
            StackSize::Single => 1,
            StackSize::Double => 2,
        }
    }

    /// Effect of pushing a value of this size onto the stack
    pub fn to_increasing_size(self) -> Size {
        let slots = self.size() as i32;
        Size {
            impact: slots,
            maximal: slots,
        }
    }

    /// Effect of popping a value of this size off the stack
    pub fn to_decreasing_size(self) -> Size {
        Size {
            impact: -(self.size() as i32),
            maximal: 0,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn primitive_sizes() {
        assert_eq!(StackSize::of_base(BaseType::Int).size(), 1);
        assert_eq!(StackSize::of_base(BaseType::Boolean).size(), 1);
        assert_eq!(StackSize::of_base(BaseType::Long).size(), 2);
        assert_eq!(StackSize::of_base(BaseType::Double).size(), 2);
    }

    #[test]
    fn void_occupies_no_slot() {
        assert_eq!(StackSize::of(&TypeDescription::Void), StackSize::Zero);
        assert_eq!(StackSize::of(&TypeDescription::Void).to_increasing_size(), Size::ZERO);
    }

    #[test]
    fn increasing_and_decreasing() {
        assert_eq!(
            StackSize::Double.to_increasing_size(),
            Size { impact: 2, maximal: 2 }
        );
        assert_eq!(
            StackSize::Double.to_decreasing_size(),
            Size { impact: -2, maximal: 0 }
        );
    }
}
