//! Generate, inspect, and verify JVM class files
//!
//! The crate is split into three layers:
//!
//!   - [`jvm::class_file`] models the binary class file format itself (constant pool, fields,
//!     methods, attributes) and can both serialize and deserialize it
//!
//!   - [`jvm::stack`] models sequences of emitted instructions along with their net effect on the
//!     operand stack, so that generated methods carry provably correct `max_stack` bookkeeping
//!     without ever being executed
//!
//!   - [`pool`] resolves fully-qualified type names into structured, cached type descriptions by
//!     locating and lazily parsing binary class data
//!
//! ### Simple example
//!
//! Computing the instructions (and their stack effect) for adapting an `int` value into a
//! `java.lang.Number`:
//!
//! ```
//! use classforge::jvm::code::Instruction;
//! use classforge::jvm::stack::assign::{default_assigner, Assigner};
//! use classforge::pool::{MapLocator, TypePool};
//! use std::collections::HashMap;
//!
//! # fn adapt() -> Result<(), classforge::jvm::Error> {
//! let pool = TypePool::new(Box::new(MapLocator::new(HashMap::new())));
//! pool.insert_java_library_types();
//! let assigner = default_assigner(&pool, false);
//!
//! let source = pool.describe("int")?.resolve()?;
//! let target = pool.describe("java.lang.Number")?.resolve()?;
//!
//! let manipulation = assigner.assign(&source, &target, false)?;
//! assert!(manipulation.is_valid());
//!
//! let mut instructions: Vec<Instruction> = vec![];
//! let size = manipulation.apply(&mut instructions)?;
//! assert_eq!(size.impact, 0);
//! # Ok(())
//! # }
//! # adapt().unwrap();
//! ```

pub mod jvm;
pub mod pool;
pub mod util;
