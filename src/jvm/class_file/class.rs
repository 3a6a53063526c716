use super::{
    Attribute, ClassConstantIndex, Constant, Deserialize, Field, Method, Serialize, Version,
};
use crate::jvm::ClassAccessFlags;
use crate::util::OffsetVec;
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::fs;
use std::io;
use std::io::{ErrorKind, Result};
use std::path::Path;

/// Representation of the [`class` file format of the JVM][0]
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html
#[derive(Debug)]
pub struct ClassFile {
    pub version: Version,
    pub constants: OffsetVec<Constant>,
    pub access_flags: ClassAccessFlags,
    pub this_class: ClassConstantIndex,
    pub super_class: ClassConstantIndex,
    pub interfaces: Vec<ClassConstantIndex>,
    pub fields: Vec<Field>,
    pub methods: Vec<Method>,
    pub attributes: Vec<Attribute>,
}

impl ClassFile {
    /// Magic header bytes that go at the front of the serialized class file
    pub const MAGIC: [u8; 4] = [0xCA, 0xFE, 0xBA, 0xBE];

    /// Save the class file to disk
    pub fn save_to_path<P: AsRef<Path>>(
        &self,
        path: P,
        create_missing_directories: bool,
    ) -> Result<()> {
        let path = path.as_ref();
        if create_missing_directories {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut class_file = fs::File::create(path)?;
        self.serialize(&mut class_file)
    }
}

impl Serialize for ClassFile {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&ClassFile::MAGIC)?;
        self.version.serialize(writer)?;
        self.constants.serialize(writer)?;
        self.access_flags.serialize(writer)?;
        self.this_class.serialize(writer)?;
        self.super_class.serialize(writer)?;
        self.interfaces.serialize(writer)?;
        self.fields.serialize(writer)?;
        self.methods.serialize(writer)?;
        self.attributes.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for ClassFile {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != ClassFile::MAGIC {
            let msg = format!("Invalid magic bytes {:02X?}", magic);
            return Err(io::Error::new(ErrorKind::InvalidData, msg));
        }

        let version = Version::deserialize(reader)?;
        let constants = OffsetVec::<Constant>::deserialize(reader)?;
        let access_flags = ClassAccessFlags::deserialize(reader)?;
        let this_class = ClassConstantIndex::deserialize(reader)?;
        let super_class = ClassConstantIndex::deserialize(reader)?;
        let interfaces = Vec::<ClassConstantIndex>::deserialize(reader)?;
        let fields = Vec::<Field>::deserialize(reader)?;
        let methods = Vec::<Method>::deserialize(reader)?;
        let attributes = Vec::<Attribute>::deserialize(reader)?;

        Ok(ClassFile {
            version,
            constants,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }
}
