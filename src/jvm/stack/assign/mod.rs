//! Deciding how to adapt a value of one type into another
//!
//! An [`Assigner`] answers "what code turns a `source` value into a `target` value?". The answer
//! is a [`StackManipulation`]: [`Trivial`](StackManipulation::Trivial) when nothing needs to
//! happen, actual conversion code when something does, and the
//! [`Illegal`](StackManipulation::Illegal) sentinel when no conversion exists. Errors are
//! reserved for the machinery breaking (a type lookup failing structurally), never for "these
//! types don't fit".
//!
//! Assigners are layered: each one handles the kinds of types it understands and delegates the
//! rest to the next layer. [`default_assigner`] wires up the standard chain.

mod primitive;

pub use primitive::*;

use crate::jvm::stack::StackManipulation;
use crate::jvm::Error;
use crate::pool::{TypeDescription, TypePool};

pub trait Assigner {
    /// Produce the manipulation adapting a `source` value into a `target` value
    ///
    /// `consider_runtime_type` permits conversions that cannot be proven statically and instead
    /// get checked at runtime (downcasts, unboxing an `Object`).
    fn assign(
        &self,
        source: &TypeDescription,
        target: &TypeDescription,
        consider_runtime_type: bool,
    ) -> Result<StackManipulation, Error>;
}

/// Final layer of the chain: assignments between reference types
///
/// Statically provable assignments (the target is a supertype) need no code at all. Anything
/// else is either a runtime-checked downcast or impossible.
pub struct ReferenceTypeAwareAssigner<'p> {
    pool: &'p TypePool,
}

impl<'p> ReferenceTypeAwareAssigner<'p> {
    pub fn new(pool: &'p TypePool) -> ReferenceTypeAwareAssigner<'p> {
        ReferenceTypeAwareAssigner { pool }
    }
}

impl<'p> Assigner for ReferenceTypeAwareAssigner<'p> {
    fn assign(
        &self,
        source: &TypeDescription,
        target: &TypeDescription,
        consider_runtime_type: bool,
    ) -> Result<StackManipulation, Error> {
        if source.is_primitive_or_void() || target.is_primitive_or_void() {
            return Ok(StackManipulation::Illegal);
        }
        if self.pool.is_assignable(source, target)? {
            return Ok(StackManipulation::Trivial);
        }
        if consider_runtime_type {
            let target_ref = match target.as_ref_type() {
                Some(ref_type) => ref_type,
                None => return Ok(StackManipulation::Illegal),
            };
            return Ok(StackManipulation::Cast(target_ref));
        }
        Ok(StackManipulation::Illegal)
    }
}

/// The standard assigner chain: void handling, then primitives, then references
pub fn default_assigner(
    pool: &TypePool,
    return_default_value: bool,
) -> VoidAwareAssigner<PrimitiveTypeAwareAssigner<'_, ReferenceTypeAwareAssigner<'_>>> {
    VoidAwareAssigner::new(
        PrimitiveTypeAwareAssigner::new(pool, ReferenceTypeAwareAssigner::new(pool)),
        return_default_value,
    )
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::pool::TypePool;

    #[test]
    fn upcasts_are_trivial() {
        let pool = TypePool::with_java_library_types();
        let assigner = ReferenceTypeAwareAssigner::new(&pool);

        let string = pool.describe("java.lang.String").unwrap().resolve().unwrap();
        let object = pool.describe("java.lang.Object").unwrap().resolve().unwrap();

        let manipulation = assigner.assign(&string, &object, false).unwrap();
        assert_eq!(manipulation, StackManipulation::Trivial);
    }

    #[test]
    fn downcasts_need_a_runtime_check() {
        let pool = TypePool::with_java_library_types();
        let assigner = ReferenceTypeAwareAssigner::new(&pool);

        let string = pool.describe("java.lang.String").unwrap().resolve().unwrap();
        let object = pool.describe("java.lang.Object").unwrap().resolve().unwrap();

        let manipulation = assigner.assign(&object, &string, false).unwrap();
        assert_eq!(manipulation, StackManipulation::Illegal);

        let manipulation = assigner.assign(&object, &string, true).unwrap();
        assert!(matches!(manipulation, StackManipulation::Cast(_)));
    }

    #[test]
    fn unrelated_types_do_not_assign() {
        let pool = TypePool::with_java_library_types();
        let assigner = ReferenceTypeAwareAssigner::new(&pool);

        let string = pool.describe("java.lang.String").unwrap().resolve().unwrap();
        let integer = pool.describe("java.lang.Integer").unwrap().resolve().unwrap();

        let manipulation = assigner.assign(&string, &integer, false).unwrap();
        assert_eq!(manipulation, StackManipulation::Illegal);
    }
}
