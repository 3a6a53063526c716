use super::{Deserialize, Serialize};
use crate::jvm::{BinaryName, Name, RenderDescriptor, RefType, UnqualifiedName};
use crate::util::{Offset, OffsetVec, Width};
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::collections::HashMap;
use std::io;
use std::io::{ErrorKind, Result};

/// Index into the constant pool
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct ConstantIndex(pub u16);

/// Index into the constant pool pointing at a [`Constant::Utf8`]
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct Utf8ConstantIndex(pub ConstantIndex);

/// Index into the constant pool pointing at a [`Constant::Class`]
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct ClassConstantIndex(pub ConstantIndex);

/// Index into the constant pool pointing at a [`Constant::NameAndType`]
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct NameAndTypeConstantIndex(pub ConstantIndex);

/// Index into the constant pool pointing at a [`Constant::MethodRef`]
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct MethodRefConstantIndex(pub ConstantIndex);

impl Serialize for ConstantIndex {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.0.serialize(writer)
    }
}

impl Deserialize for ConstantIndex {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
        Ok(ConstantIndex(u16::deserialize(reader)?))
    }
}

macro_rules! delegate_index {
    ($name:ident) => {
        impl Serialize for $name {
            fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
                self.0.serialize(writer)
            }
        }

        impl Deserialize for $name {
            fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
                Ok($name(ConstantIndex::deserialize(reader)?))
            }
        }

        impl From<$name> for ConstantIndex {
            fn from(idx: $name) -> ConstantIndex {
                idx.0
            }
        }
    };
}

delegate_index!(Utf8ConstantIndex);
delegate_index!(ClassConstantIndex);
delegate_index!(NameAndTypeConstantIndex);
delegate_index!(MethodRefConstantIndex);

/// Entry in the constant pool
///
/// All standard tags are understood when reading; only the subset which generated code needs is
/// ever written.
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.4
#[derive(Clone, Debug, PartialEq)]
pub enum Constant {
    /// Constant UTF-8 encoded raw string value
    ///
    /// Despite the name, the encoding is not quite UTF-8 (the encoding of the null character
    /// `\u{0000}` and of supplementary characters is different). Names and descriptors never hit
    /// the difference, so this implementation uses plain UTF-8.
    Utf8(String),

    /// Constant primitive of type `int`
    Integer(i32),

    /// Constant primitive of type `float`
    Float(f32),

    /// Constant primitive of type `long`
    Long(i64),

    /// Constant primitive of type `double`
    Double(f64),

    /// Class or an interface
    Class(Utf8ConstantIndex),

    /// Constant object of type `java.lang.String`
    String(Utf8ConstantIndex),

    /// Field
    FieldRef(ClassConstantIndex, NameAndTypeConstantIndex),

    /// Method (this combines `Methodref` and `InterfaceMethodref`)
    MethodRef {
        class: ClassConstantIndex,
        name_and_type: NameAndTypeConstantIndex,
        is_interface: bool,
    },

    /// Name and a type (eg. for a field or a method)
    NameAndType {
        name: Utf8ConstantIndex,
        descriptor: Utf8ConstantIndex,
    },

    MethodHandle {
        reference_kind: u8,
        reference: ConstantIndex,
    },

    MethodType(Utf8ConstantIndex),

    Dynamic {
        bootstrap_method: u16,
        name_and_type: NameAndTypeConstantIndex,
    },

    InvokeDynamic {
        bootstrap_method: u16,
        name_and_type: NameAndTypeConstantIndex,
    },

    Module(Utf8ConstantIndex),

    Package(Utf8ConstantIndex),
}

impl Width for Constant {
    fn width(&self) -> usize {
        match self {
            Constant::Long(_) | Constant::Double(_) => 2,
            _ => 1,
        }
    }
}

impl Serialize for Constant {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        match self {
            Constant::Utf8(string) => {
                let len = u16::try_from(string.len()).map_err(|_| {
                    let msg = format!(
                        "Utf8 constant of {} bytes exceeds the 65535 byte maximum",
                        string.len()
                    );
                    io::Error::new(ErrorKind::InvalidData, msg)
                })?;
                1u8.serialize(writer)?;
                len.serialize(writer)?;
                writer.write_all(string.as_bytes())?;
            }
            Constant::Integer(integer) => {
                3u8.serialize(writer)?;
                integer.serialize(writer)?;
            }
            Constant::Float(float) => {
                4u8.serialize(writer)?;
                float.serialize(writer)?;
            }
            Constant::Long(long) => {
                5u8.serialize(writer)?;
                long.serialize(writer)?;
            }
            Constant::Double(double) => {
                6u8.serialize(writer)?;
                double.serialize(writer)?;
            }
            Constant::Class(name) => {
                7u8.serialize(writer)?;
                name.serialize(writer)?;
            }
            Constant::String(utf8) => {
                8u8.serialize(writer)?;
                utf8.serialize(writer)?;
            }
            Constant::FieldRef(class, name_and_type) => {
                9u8.serialize(writer)?;
                class.serialize(writer)?;
                name_and_type.serialize(writer)?;
            }
            Constant::MethodRef {
                class,
                name_and_type,
                is_interface,
            } => {
                (if *is_interface { 11u8 } else { 10u8 }).serialize(writer)?;
                class.serialize(writer)?;
                name_and_type.serialize(writer)?;
            }
            Constant::NameAndType { name, descriptor } => {
                12u8.serialize(writer)?;
                name.serialize(writer)?;
                descriptor.serialize(writer)?;
            }
            Constant::MethodHandle {
                reference_kind,
                reference,
            } => {
                15u8.serialize(writer)?;
                reference_kind.serialize(writer)?;
                reference.serialize(writer)?;
            }
            Constant::MethodType(descriptor) => {
                16u8.serialize(writer)?;
                descriptor.serialize(writer)?;
            }
            Constant::Dynamic {
                bootstrap_method,
                name_and_type,
            } => {
                17u8.serialize(writer)?;
                bootstrap_method.serialize(writer)?;
                name_and_type.serialize(writer)?;
            }
            Constant::InvokeDynamic {
                bootstrap_method,
                name_and_type,
            } => {
                18u8.serialize(writer)?;
                bootstrap_method.serialize(writer)?;
                name_and_type.serialize(writer)?;
            }
            Constant::Module(name) => {
                19u8.serialize(writer)?;
                name.serialize(writer)?;
            }
            Constant::Package(name) => {
                20u8.serialize(writer)?;
                name.serialize(writer)?;
            }
        };
        Ok(())
    }
}

impl Deserialize for Constant {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
        let constant = match u8::deserialize(reader)? {
            1 => {
                let len = u16::deserialize(reader)?;
                let mut bytes = vec![0u8; len as usize];
                reader.read_exact(&mut bytes)?;
                let string = String::from_utf8(bytes).map_err(|err| {
                    io::Error::new(ErrorKind::InvalidData, format!("Bad UTF-8 constant: {}", err))
                })?;
                Constant::Utf8(string)
            }
            3 => Constant::Integer(i32::deserialize(reader)?),
            4 => Constant::Float(f32::deserialize(reader)?),
            5 => Constant::Long(i64::deserialize(reader)?),
            6 => Constant::Double(f64::deserialize(reader)?),
            7 => Constant::Class(Utf8ConstantIndex::deserialize(reader)?),
            8 => Constant::String(Utf8ConstantIndex::deserialize(reader)?),
            9 => Constant::FieldRef(
                ClassConstantIndex::deserialize(reader)?,
                NameAndTypeConstantIndex::deserialize(reader)?,
            ),
            tag @ (10 | 11) => Constant::MethodRef {
                class: ClassConstantIndex::deserialize(reader)?,
                name_and_type: NameAndTypeConstantIndex::deserialize(reader)?,
                is_interface: tag == 11,
            },
            12 => Constant::NameAndType {
                name: Utf8ConstantIndex::deserialize(reader)?,
                descriptor: Utf8ConstantIndex::deserialize(reader)?,
            },
            15 => Constant::MethodHandle {
                reference_kind: u8::deserialize(reader)?,
                reference: ConstantIndex::deserialize(reader)?,
            },
            16 => Constant::MethodType(Utf8ConstantIndex::deserialize(reader)?),
            17 => Constant::Dynamic {
                bootstrap_method: u16::deserialize(reader)?,
                name_and_type: NameAndTypeConstantIndex::deserialize(reader)?,
            },
            18 => Constant::InvokeDynamic {
                bootstrap_method: u16::deserialize(reader)?,
                name_and_type: NameAndTypeConstantIndex::deserialize(reader)?,
            },
            19 => Constant::Module(Utf8ConstantIndex::deserialize(reader)?),
            20 => Constant::Package(Utf8ConstantIndex::deserialize(reader)?),
            tag => {
                let msg = format!("Invalid constant tag {}", tag);
                return Err(io::Error::new(ErrorKind::InvalidData, msg));
            }
        };
        Ok(constant)
    }
}

/// The count written at the front is the offset of the next constant that would be added (so one
/// past the end), not the number of entries, since `long` and `double` occupy two slots.
impl Serialize for OffsetVec<Constant> {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        (self.offset_len().0 as u16).serialize(writer)?;
        for (_, _, constant) in self.iter() {
            constant.serialize(writer)?;
        }
        Ok(())
    }
}

impl Deserialize for OffsetVec<Constant> {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
        let count = u16::deserialize(reader)? as usize;
        let mut constants = OffsetVec::new_starting_at(Offset(1));
        while constants.offset_len().0 < count {
            constants.push(Constant::deserialize(reader)?);
        }
        if constants.offset_len().0 != count {
            let msg = format!(
                "Constant pool two-slot entry runs past the declared count {}",
                count
            );
            return Err(io::Error::new(ErrorKind::InvalidData, msg));
        }
        Ok(constants)
    }
}

/// Read-side view over a parsed constant pool, resolving indices into constants
pub struct ConstantReader<'a> {
    constants: &'a OffsetVec<Constant>,
}

impl<'a> ConstantReader<'a> {
    pub fn new(constants: &'a OffsetVec<Constant>) -> ConstantReader<'a> {
        ConstantReader { constants }
    }

    fn get(&self, index: ConstantIndex) -> Result<&'a Constant> {
        self.constants.get_offset(Offset(index.0 as usize)).ok_or_else(|| {
            let msg = format!("Missing constant at index {}", index.0);
            io::Error::new(ErrorKind::InvalidData, msg)
        })
    }

    pub fn lookup_utf8(&self, index: Utf8ConstantIndex) -> Result<&'a str> {
        match self.get(index.0)? {
            Constant::Utf8(string) => Ok(string),
            other => {
                let msg = format!("Expected Utf8 constant at {}, found {:?}", index.0 .0, other);
                Err(io::Error::new(ErrorKind::InvalidData, msg))
            }
        }
    }

    /// Resolve a `Class` constant into the internal name it spells
    pub fn lookup_class_name(&self, index: ClassConstantIndex) -> Result<&'a str> {
        match self.get(index.0)? {
            Constant::Class(utf8) => self.lookup_utf8(*utf8),
            other => {
                let msg = format!("Expected Class constant at {}, found {:?}", index.0 .0, other);
                Err(io::Error::new(ErrorKind::InvalidData, msg))
            }
        }
    }
}

/// An attempted constant pool insertion that would not fit
///
/// The largest valid index is 65535, indexing starts at 1, and some constants take two slots.
#[derive(Debug)]
pub struct ConstantPoolOverflow {
    pub constant: Constant,
    pub offset: usize,
}

/// Class file constants pool builder
///
/// The pool is append only; after it is fully built up it can be consumed into a regular
/// [`OffsetVec`]. Insertions are memoized, so requesting the same constant twice yields the same
/// index without growing the pool.
pub struct ConstantsPool {
    constants: OffsetVec<Constant>,

    utf8s: HashMap<String, Utf8ConstantIndex>,
    classes: HashMap<String, ClassConstantIndex>,
    name_and_types: HashMap<(Utf8ConstantIndex, Utf8ConstantIndex), NameAndTypeConstantIndex>,
    methodrefs: HashMap<(ClassConstantIndex, NameAndTypeConstantIndex, bool), MethodRefConstantIndex>,
}

impl ConstantsPool {
    /// Make a fresh empty constants pool
    pub fn new() -> ConstantsPool {
        ConstantsPool {
            constants: OffsetVec::new_starting_at(Offset(1)),
            utf8s: HashMap::new(),
            classes: HashMap::new(),
            name_and_types: HashMap::new(),
            methodrefs: HashMap::new(),
        }
    }

    /// Push a constant into the constant pool, provided there is space for it
    fn push_constant(&mut self, constant: Constant) -> std::result::Result<ConstantIndex, ConstantPoolOverflow> {
        let offset = self.constants.offset_len().0;

        // Detect if the next constant would overflow the pool
        if offset + constant.width() > u16::MAX as usize + 1 {
            return Err(ConstantPoolOverflow { constant, offset });
        }

        self.constants.push(constant);
        Ok(ConstantIndex(offset as u16))
    }

    /// Consume the pool and return the final vector of constants
    pub fn into_offset_vec(self) -> OffsetVec<Constant> {
        self.constants
    }

    /// Get or insert a utf8 constant from the constant pool
    pub fn get_utf8(
        &mut self,
        utf8: &str,
    ) -> std::result::Result<Utf8ConstantIndex, ConstantPoolOverflow> {
        if let Some(idx) = self.utf8s.get(utf8) {
            Ok(*idx)
        } else {
            let constant = Constant::Utf8(utf8.to_owned());
            let idx = Utf8ConstantIndex(self.push_constant(constant)?);
            self.utf8s.insert(utf8.to_owned(), idx);
            Ok(idx)
        }
    }

    /// Get or insert a class constant from the constant pool
    ///
    /// Array classes spell their name as a descriptor (`[Ljava/lang/Object;`), plain classes as
    /// their internal name (`java/lang/Object`).
    pub fn get_class(
        &mut self,
        ref_type: &RefType<BinaryName>,
    ) -> std::result::Result<ClassConstantIndex, ConstantPoolOverflow> {
        let name = match ref_type {
            RefType::Object(class) => class.as_str().to_owned(),
            array => array.render(),
        };
        if let Some(idx) = self.classes.get(&name) {
            Ok(*idx)
        } else {
            let utf8 = self.get_utf8(&name)?;
            let idx = ClassConstantIndex(self.push_constant(Constant::Class(utf8))?);
            self.classes.insert(name, idx);
            Ok(idx)
        }
    }

    /// Get or insert a name & type constant from the constant pool
    pub fn get_name_and_type(
        &mut self,
        name: &UnqualifiedName,
        descriptor: &str,
    ) -> std::result::Result<NameAndTypeConstantIndex, ConstantPoolOverflow> {
        let name = self.get_utf8(name.as_str())?;
        let descriptor = self.get_utf8(descriptor)?;
        if let Some(idx) = self.name_and_types.get(&(name, descriptor)) {
            Ok(*idx)
        } else {
            let constant = Constant::NameAndType { name, descriptor };
            let idx = NameAndTypeConstantIndex(self.push_constant(constant)?);
            self.name_and_types.insert((name, descriptor), idx);
            Ok(idx)
        }
    }

    /// Get or insert a method reference constant from the constant pool
    pub fn get_method_ref(
        &mut self,
        class: &BinaryName,
        name: &UnqualifiedName,
        descriptor: &str,
        is_interface: bool,
    ) -> std::result::Result<MethodRefConstantIndex, ConstantPoolOverflow> {
        let class = self.get_class(&RefType::Object(class.clone()))?;
        let name_and_type = self.get_name_and_type(name, descriptor)?;
        if let Some(idx) = self.methodrefs.get(&(class, name_and_type, is_interface)) {
            Ok(*idx)
        } else {
            let constant = Constant::MethodRef {
                class,
                name_and_type,
                is_interface,
            };
            let idx = MethodRefConstantIndex(self.push_constant(constant)?);
            self.methodrefs.insert((class, name_and_type, is_interface), idx);
            Ok(idx)
        }
    }
}

impl Default for ConstantsPool {
    fn default() -> ConstantsPool {
        ConstantsPool::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn memoized_insertions() {
        let mut constants = ConstantsPool::new();
        let object = constants.get_class(&RefType::Object(BinaryName::OBJECT)).unwrap();
        let object_again = constants.get_class(&RefType::Object(BinaryName::OBJECT)).unwrap();
        assert_eq!(object, object_again);

        // Utf8 for the class name + the class constant
        assert_eq!(constants.into_offset_vec().len(), 2);
    }

    #[test]
    fn wide_constants_take_two_slots() {
        let mut constants = ConstantsPool::new();
        let long = constants.push_constant(Constant::Long(4)).unwrap();
        let utf8 = constants.push_constant(Constant::Utf8(String::from("x"))).unwrap();
        assert_eq!(long, ConstantIndex(1));
        assert_eq!(utf8, ConstantIndex(3));
    }

    #[test]
    fn oversize_utf8_constants_are_rejected() {
        let oversize = Constant::Utf8("x".repeat(u16::MAX as usize + 1));
        let mut bytes = vec![];
        let err = oversize.serialize(&mut bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
        assert!(bytes.is_empty());
    }

    #[test]
    fn interface_flag_distinguishes_method_refs() {
        let mut constants = ConstantsPool::new();
        let plain = constants
            .get_method_ref(&BinaryName::INTEGER, &UnqualifiedName::INTVALUE, "()I", false)
            .unwrap();
        let interface = constants
            .get_method_ref(&BinaryName::INTEGER, &UnqualifiedName::INTVALUE, "()I", true)
            .unwrap();
        assert_ne!(plain, interface);

        let constants = constants.into_offset_vec();
        let lookup = |idx: MethodRefConstantIndex| match constants.get_offset(Offset(idx.0 .0 as usize)) {
            Some(Constant::MethodRef { is_interface, .. }) => *is_interface,
            other => panic!("Expected a method ref, found {:?}", other),
        };
        assert!(!lookup(plain));
        assert!(lookup(interface));
    }

    #[test]
    fn pool_round_trips() {
        let mut constants = ConstantsPool::new();
        constants
            .get_method_ref(
                &BinaryName::INTEGER,
                &UnqualifiedName::VALUEOF,
                "(I)Ljava/lang/Integer;",
                false,
            )
            .unwrap();
        let constants = constants.into_offset_vec();

        let mut bytes = vec![];
        constants.serialize(&mut bytes).unwrap();
        let read_back = OffsetVec::<Constant>::deserialize(&mut &bytes[..]).unwrap();
        assert_eq!(constants, read_back);
    }
}
