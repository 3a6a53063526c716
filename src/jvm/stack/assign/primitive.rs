use super::Assigner;
use crate::jvm::stack::{wrapper_class, PrimitiveWidening, StackManipulation, StackSize};
use crate::jvm::{BaseType, Error, RefType};
use crate::pool::{Resolution, TypeDescription, TypePool};

/// First layer of the chain: assignments involving `void`
///
/// `void` has no values, so "assigning" it means dropping a value (target `void`) or conjuring
/// one up (source `void`). The latter only works when the assigner was configured to substitute
/// default values.
pub struct VoidAwareAssigner<A> {
    inner: A,
    return_default_value: bool,
}

impl<A> VoidAwareAssigner<A> {
    pub fn new(inner: A, return_default_value: bool) -> VoidAwareAssigner<A> {
        VoidAwareAssigner {
            inner,
            return_default_value,
        }
    }
}

impl<A: Assigner> Assigner for VoidAwareAssigner<A> {
    fn assign(
        &self,
        source: &TypeDescription,
        target: &TypeDescription,
        consider_runtime_type: bool,
    ) -> Result<StackManipulation, Error> {
        match (source, target) {
            (TypeDescription::Void, TypeDescription::Void) => Ok(StackManipulation::Trivial),
            (TypeDescription::Void, _) => {
                if self.return_default_value {
                    Ok(StackManipulation::default_value(target))
                } else {
                    Ok(StackManipulation::Illegal)
                }
            }
            (_, TypeDescription::Void) => Ok(StackManipulation::Pop(StackSize::of(source))),
            _ => self.inner.assign(source, target, consider_runtime_type),
        }
    }
}

/// Middle layer of the chain: assignments involving primitive types
///
/// Between two primitives only widening conversions are legal. Mixed assignments go through the
/// wrapper types: boxing on the way into a reference, unboxing on the way out of one.
pub struct PrimitiveTypeAwareAssigner<'p, A> {
    pool: &'p TypePool,
    inner: A,
}

impl<'p, A> PrimitiveTypeAwareAssigner<'p, A> {
    pub fn new(pool: &'p TypePool, inner: A) -> PrimitiveTypeAwareAssigner<'p, A> {
        PrimitiveTypeAwareAssigner { pool, inner }
    }
}

impl<'p, A: Assigner> PrimitiveTypeAwareAssigner<'p, A> {
    fn box_and_assign(
        &self,
        source: BaseType,
        target: &TypeDescription,
        consider_runtime_type: bool,
    ) -> Result<StackManipulation, Error> {
        let wrapper = wrapper_class(source);
        let wrapper_description = match self.pool.describe(&wrapper.to_dotted())? {
            Resolution::Resolved(description) => description,
            Resolution::Unresolved(_) => return Ok(StackManipulation::Illegal),
        };
        let rest = self
            .inner
            .assign(&wrapper_description, target, consider_runtime_type)?;
        if !rest.is_valid() {
            return Ok(StackManipulation::Illegal);
        }
        Ok(StackManipulation::Compound(vec![
            StackManipulation::Box(source),
            rest,
        ]))
    }

    fn unbox_and_widen(
        &self,
        source: &TypeDescription,
        target: BaseType,
        consider_runtime_type: bool,
    ) -> Result<StackManipulation, Error> {
        // A value known to be a wrapper unboxes directly, possibly widening afterwards
        for wrapped in [
            BaseType::Boolean,
            BaseType::Byte,
            BaseType::Char,
            BaseType::Short,
            BaseType::Int,
            BaseType::Long,
            BaseType::Float,
            BaseType::Double,
        ] {
            if source.represents(&wrapper_class(wrapped).to_dotted()) {
                let widen = widening(wrapped, target);
                if !widen.is_valid() {
                    return Ok(StackManipulation::Illegal);
                }
                return Ok(StackManipulation::Compound(vec![
                    StackManipulation::Unbox(wrapped),
                    widen,
                ]));
            }
        }

        // Any other reference can only be unboxed by casting it down to the target's wrapper
        if consider_runtime_type {
            Ok(StackManipulation::Compound(vec![
                StackManipulation::Cast(RefType::Object(wrapper_class(target))),
                StackManipulation::Unbox(target),
            ]))
        } else {
            Ok(StackManipulation::Illegal)
        }
    }
}

impl<'p, A: Assigner> Assigner for PrimitiveTypeAwareAssigner<'p, A> {
    fn assign(
        &self,
        source: &TypeDescription,
        target: &TypeDescription,
        consider_runtime_type: bool,
    ) -> Result<StackManipulation, Error> {
        match (source, target) {
            (TypeDescription::Base(source), TypeDescription::Base(target)) => {
                Ok(widening(*source, *target))
            }
            (TypeDescription::Base(source), _) => {
                self.box_and_assign(*source, target, consider_runtime_type)
            }
            (_, TypeDescription::Base(target)) => {
                self.unbox_and_widen(source, *target, consider_runtime_type)
            }
            _ => self.inner.assign(source, target, consider_runtime_type),
        }
    }
}

/// Widening conversion between two primitive types
///
/// Follows the Java widening primitive conversions: `boolean` converts to nothing but itself,
/// the sub-`int` integral types widen into the `int` family without any instruction, and the
/// remaining widenings each map to one conversion instruction. Everything else (including all
/// narrowings) is illegal.
fn widening(source: BaseType, target: BaseType) -> StackManipulation {
    use BaseType::*;

    if source == target {
        return StackManipulation::Trivial;
    }
    match (source, target) {
        (Byte, Short | Int) | (Short | Char, Int) => StackManipulation::Trivial,

        (Byte | Short | Char | Int, Long) => {
            StackManipulation::Widen(PrimitiveWidening::IntToLong)
        }
        (Byte | Short | Char | Int, Float) => {
            StackManipulation::Widen(PrimitiveWidening::IntToFloat)
        }
        (Byte | Short | Char | Int, Double) => {
            StackManipulation::Widen(PrimitiveWidening::IntToDouble)
        }
        (Long, Float) => StackManipulation::Widen(PrimitiveWidening::LongToFloat),
        (Long, Double) => StackManipulation::Widen(PrimitiveWidening::LongToDouble),
        (Float, Double) => StackManipulation::Widen(PrimitiveWidening::FloatToDouble),

        _ => StackManipulation::Illegal,
    }
}
