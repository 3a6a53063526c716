//! Binary representation of the [`class` file format of the JVM][0]
//!
//! Everything here can be written out with [`Serialize`] and most structures can also be read
//! back with [`Deserialize`]: generated classes are serialized, and classes located through a
//! [`crate::pool::ClassFileLocator`] are deserialized back into structured descriptions.
//!
//! [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html

mod attribute;
mod binary_format;
mod class;
mod constants;
mod field;
mod method;
mod version;

pub use attribute::*;
pub use binary_format::*;
pub use class::*;
pub use constants::*;
pub use field::*;
pub use method::*;
pub use version::*;
