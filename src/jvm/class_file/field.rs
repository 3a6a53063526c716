use super::{Attribute, Deserialize, Serialize, Utf8ConstantIndex};
use crate::jvm::FieldAccessFlags;
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::io::Result;

/// Field declared by a class or interface
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.5
#[derive(Debug)]
pub struct Field {
    pub access_flags: FieldAccessFlags,
    pub name_index: Utf8ConstantIndex,
    pub descriptor_index: Utf8ConstantIndex,
    pub attributes: Vec<Attribute>,
}

impl Serialize for Field {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.access_flags.serialize(writer)?;
        self.name_index.serialize(writer)?;
        self.descriptor_index.serialize(writer)?;
        self.attributes.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for Field {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
        let access_flags = FieldAccessFlags::deserialize(reader)?;
        let name_index = Utf8ConstantIndex::deserialize(reader)?;
        let descriptor_index = Utf8ConstantIndex::deserialize(reader)?;
        let attributes = Vec::<Attribute>::deserialize(reader)?;
        Ok(Field {
            access_flags,
            name_index,
            descriptor_index,
            attributes,
        })
    }
}
