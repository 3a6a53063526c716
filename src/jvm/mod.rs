//! Manipulate JVM classes
//!
//! The submodules are layered bottom-up:
//!
//!   - [`names`](crate::jvm::BinaryName) and descriptors model the string-level vocabulary of the
//!     class file format
//!   - [`class_file`] models the binary format itself, readable and writable
//!   - [`code`] models individual instructions and assembles them into `Code` attributes
//!   - [`stack`] models composable instruction sequences along with their operand stack effects,
//!     including the type-assignment engine deciding which conversions are legal

mod access_flags;
pub mod class_file;
pub mod code;
mod descriptors;
mod errors;
mod names;
pub mod stack;

pub use access_flags::*;
pub use descriptors::*;
pub use errors::*;
pub use names::*;
