use crate::jvm::class_file::{ClassFile, ConstantReader, Deserialize};
use crate::jvm::stack::StackSize;
use crate::jvm::{
    ArrayType, BaseType, BinaryName, ClassAccessFlags, Error, FieldAccessFlags, FieldType,
    MethodAccessFlags, MethodDescriptor, ParseDescriptor, RefType,
};
use std::cell::OnceCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// Structured description of a type
///
/// Descriptions compare structurally by name, so a parsed `java.lang.String` and an explicitly
/// constructed one are the same type regardless of where either came from.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum TypeDescription {
    Void,
    Base(BaseType),
    Array(Box<TypeDescription>),
    Class(Rc<ClassDescription>),
}

impl TypeDescription {
    /// Name in Java source form: `int`, `java.lang.Object`, `java.lang.Object[]`
    pub fn name(&self) -> String {
        match self {
            TypeDescription::Void => String::from("void"),
            TypeDescription::Base(base_type) => String::from(base_type.keyword()),
            TypeDescription::Array(component) => format!("{}[]", component.name()),
            TypeDescription::Class(class) => class.name.clone(),
        }
    }

    /// Does this description describe the type with the given source-form name?
    pub fn represents(&self, type_name: &str) -> bool {
        match self {
            TypeDescription::Void => type_name == "void",
            TypeDescription::Base(base_type) => type_name == base_type.keyword(),
            TypeDescription::Class(class) => class.name == type_name,
            TypeDescription::Array(_) => self.name() == type_name,
        }
    }

    pub fn stack_size(&self) -> StackSize {
        StackSize::of(self)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, TypeDescription::Void)
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, TypeDescription::Base(_))
    }

    pub fn is_primitive_or_void(&self) -> bool {
        self.is_void() || self.is_primitive()
    }

    pub fn is_array(&self) -> bool {
        matches!(self, TypeDescription::Array(_))
    }

    pub fn is_interface(&self) -> bool {
        match self {
            TypeDescription::Class(class) => class.is_interface,
            _ => false,
        }
    }

    /// Component type, for arrays
    pub fn component_type(&self) -> Option<&TypeDescription> {
        match self {
            TypeDescription::Array(component) => Some(component),
            _ => None,
        }
    }

    /// View of this description as a reference type, when it is one
    pub fn as_ref_type(&self) -> Option<RefType<BinaryName>> {
        match self {
            TypeDescription::Void | TypeDescription::Base(_) => None,
            TypeDescription::Class(class) => {
                BinaryName::from_dotted(&class.name).ok().map(RefType::Object)
            }
            TypeDescription::Array(_) => {
                let mut additional_dimensions = 0;
                let mut element = self;
                while let TypeDescription::Array(component) = element {
                    element = component;
                    additional_dimensions += 1;
                }
                additional_dimensions -= 1;
                match element {
                    TypeDescription::Base(base_type) => {
                        Some(RefType::PrimitiveArray(ArrayType {
                            additional_dimensions,
                            element_type: *base_type,
                        }))
                    }
                    TypeDescription::Class(class) => {
                        let name = BinaryName::from_dotted(&class.name).ok()?;
                        Some(RefType::ObjectArray(ArrayType {
                            additional_dimensions,
                            element_type: name,
                        }))
                    }
                    _ => None,
                }
            }
        }
    }

    /// Dotted name of the superclass, when there is one
    ///
    /// Arrays report `java.lang.Object`; primitives, `void`, `java.lang.Object` itself, and
    /// interfaces report nothing.
    pub fn superclass_name(&self) -> Option<&str> {
        match self {
            TypeDescription::Class(class) => class.superclass.as_deref(),
            TypeDescription::Array(_) => Some("java.lang.Object"),
            _ => None,
        }
    }

    /// Dotted names of the directly implemented interfaces
    pub fn interface_names(&self) -> &[String] {
        const ARRAY_INTERFACES: &[String] = &[];
        match self {
            TypeDescription::Class(class) => &class.interfaces,
            _ => ARRAY_INTERFACES,
        }
    }

    pub fn declared_fields(&self) -> Result<&[FieldDescription], Error> {
        match self {
            TypeDescription::Class(class) => class.declared_fields(),
            _ => Ok(&[]),
        }
    }

    pub fn declared_methods(&self) -> Result<&[MethodDescription], Error> {
        match self {
            TypeDescription::Class(class) => class.declared_methods(),
            _ => Ok(&[]),
        }
    }

    /// Dotted type names of the class-level runtime-visible annotations
    pub fn annotation_types(&self) -> Result<&[String], Error> {
        match self {
            TypeDescription::Class(class) => class.annotation_types(),
            _ => Ok(&[]),
        }
    }
}

/// Field as seen by a type description
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct FieldDescription {
    pub name: String,
    pub access_flags: FieldAccessFlags,
    pub descriptor: FieldType<BinaryName>,
}

/// Method as seen by a type description
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct MethodDescription {
    pub name: String,
    pub access_flags: MethodAccessFlags,
    pub descriptor: MethodDescriptor<BinaryName>,
}

/// Description of a class or interface
///
/// The header (name, superclass, interfaces) is always available. Members are either supplied
/// up front or parsed out of retained class file data the first time they are asked for.
pub struct ClassDescription {
    name: String,
    superclass: Option<String>,
    interfaces: Vec<String>,
    is_interface: bool,
    members: MemberSource,
}

enum MemberSource {
    Explicit {
        fields: Vec<FieldDescription>,
        methods: Vec<MethodDescription>,
        annotations: Vec<String>,
    },
    ClassFile(LazyMembers),
}

struct LazyMembers {
    class_file: ClassFile,
    fields: OnceCell<Vec<FieldDescription>>,
    methods: OnceCell<Vec<MethodDescription>>,
    annotations: OnceCell<Vec<String>>,
}

impl ClassDescription {
    /// Construct a description without any backing class file
    pub fn explicit(
        name: &str,
        superclass: Option<&str>,
        interfaces: &[&str],
        is_interface: bool,
    ) -> ClassDescription {
        ClassDescription {
            name: name.to_owned(),
            superclass: superclass.map(str::to_owned),
            interfaces: interfaces.iter().map(|s| (*s).to_owned()).collect(),
            is_interface,
            members: MemberSource::Explicit {
                fields: vec![],
                methods: vec![],
                annotations: vec![],
            },
        }
    }

    /// Parse a description out of raw class file bytes
    ///
    /// The header is read eagerly; fields, methods, and annotations stay unparsed until first
    /// access. `type_name` only labels parse errors.
    pub fn from_class_file(type_name: &str, bytes: &[u8]) -> Result<ClassDescription, Error> {
        let class_file = ClassFile::deserialize(&mut &bytes[..])
            .map_err(|err| malformed(type_name, &err.to_string()))?;

        let constants = ConstantReader::new(&class_file.constants);
        let name = constants
            .lookup_class_name(class_file.this_class)
            .map_err(|err| malformed(type_name, &err.to_string()))?
            .replace('/', ".");
        let superclass = if class_file.super_class.0 .0 == 0 {
            None
        } else {
            let superclass = constants
                .lookup_class_name(class_file.super_class)
                .map_err(|err| malformed(type_name, &err.to_string()))?;
            Some(superclass.replace('/', "."))
        };
        let interfaces = class_file
            .interfaces
            .iter()
            .map(|interface| {
                constants
                    .lookup_class_name(*interface)
                    .map(|name| name.replace('/', "."))
                    .map_err(|err| malformed(type_name, &err.to_string()))
            })
            .collect::<Result<Vec<String>, Error>>()?;
        let is_interface = class_file
            .access_flags
            .contains(ClassAccessFlags::INTERFACE);

        Ok(ClassDescription {
            name,
            superclass,
            interfaces,
            is_interface,
            members: MemberSource::ClassFile(LazyMembers {
                class_file,
                fields: OnceCell::new(),
                methods: OnceCell::new(),
                annotations: OnceCell::new(),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn declared_fields(&self) -> Result<&[FieldDescription], Error> {
        match &self.members {
            MemberSource::Explicit { fields, .. } => Ok(fields),
            MemberSource::ClassFile(lazy) => {
                if let Some(fields) = lazy.fields.get() {
                    return Ok(fields);
                }
                let constants = ConstantReader::new(&lazy.class_file.constants);
                let mut fields = Vec::with_capacity(lazy.class_file.fields.len());
                for field in &lazy.class_file.fields {
                    let name = constants
                        .lookup_utf8(field.name_index)
                        .map_err(|err| malformed(&self.name, &err.to_string()))?;
                    let descriptor = constants
                        .lookup_utf8(field.descriptor_index)
                        .map_err(|err| malformed(&self.name, &err.to_string()))?;
                    let descriptor = FieldType::parse(descriptor)
                        .map_err(|err| Error::BadDescriptor(err.to_string()))?;
                    fields.push(FieldDescription {
                        name: name.to_owned(),
                        access_flags: field.access_flags,
                        descriptor,
                    });
                }
                Ok(lazy.fields.get_or_init(|| fields))
            }
        }
    }

    fn declared_methods(&self) -> Result<&[MethodDescription], Error> {
        match &self.members {
            MemberSource::Explicit { methods, .. } => Ok(methods),
            MemberSource::ClassFile(lazy) => {
                if let Some(methods) = lazy.methods.get() {
                    return Ok(methods);
                }
                let constants = ConstantReader::new(&lazy.class_file.constants);
                let mut methods = Vec::with_capacity(lazy.class_file.methods.len());
                for method in &lazy.class_file.methods {
                    let name = constants
                        .lookup_utf8(method.name_index)
                        .map_err(|err| malformed(&self.name, &err.to_string()))?;
                    let descriptor = constants
                        .lookup_utf8(method.descriptor_index)
                        .map_err(|err| malformed(&self.name, &err.to_string()))?;
                    let descriptor = MethodDescriptor::parse(descriptor)
                        .map_err(|err| Error::BadDescriptor(err.to_string()))?;
                    methods.push(MethodDescription {
                        name: name.to_owned(),
                        access_flags: method.access_flags,
                        descriptor,
                    });
                }
                Ok(lazy.methods.get_or_init(|| methods))
            }
        }
    }

    fn annotation_types(&self) -> Result<&[String], Error> {
        match &self.members {
            MemberSource::Explicit { annotations, .. } => Ok(annotations),
            MemberSource::ClassFile(lazy) => {
                if let Some(annotations) = lazy.annotations.get() {
                    return Ok(annotations);
                }
                let constants = ConstantReader::new(&lazy.class_file.constants);
                let mut annotations = vec![];
                for attribute in &lazy.class_file.attributes {
                    let attribute_name = constants
                        .lookup_utf8(attribute.name_index)
                        .map_err(|err| malformed(&self.name, &err.to_string()))?;
                    if attribute_name != "RuntimeVisibleAnnotations" {
                        continue;
                    }
                    parse_annotation_types(&self.name, &constants, &attribute.info, &mut annotations)?;
                }
                Ok(lazy.annotations.get_or_init(|| annotations))
            }
        }
    }
}

fn malformed(type_name: &str, detail: &str) -> Error {
    Error::ClassFileMalformed {
        type_name: type_name.to_owned(),
        detail: detail.to_owned(),
    }
}

/// Pull the annotation type names out of a `RuntimeVisibleAnnotations` payload
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.16
fn parse_annotation_types(
    type_name: &str,
    constants: &ConstantReader,
    payload: &[u8],
    into: &mut Vec<String>,
) -> Result<(), Error> {
    let mut reader: &[u8] = payload;
    let count = u16::deserialize(&mut reader).map_err(|err| malformed(type_name, &err.to_string()))?;
    for _ in 0..count {
        let annotation_type = parse_annotation(type_name, constants, &mut reader)?;
        into.push(annotation_type);
    }
    Ok(())
}

fn parse_annotation(
    type_name: &str,
    constants: &ConstantReader,
    reader: &mut &[u8],
) -> Result<String, Error> {
    use crate::jvm::class_file::Utf8ConstantIndex;

    let descriptor_index = Utf8ConstantIndex::deserialize(reader)
        .map_err(|err| malformed(type_name, &err.to_string()))?;
    let descriptor = constants
        .lookup_utf8(descriptor_index)
        .map_err(|err| malformed(type_name, &err.to_string()))?;
    let annotation_type = match FieldType::<BinaryName>::parse(descriptor) {
        Ok(FieldType::Ref(RefType::Object(name))) => name.to_dotted(),
        _ => return Err(Error::BadDescriptor(descriptor.to_owned())),
    };

    let pair_count =
        u16::deserialize(reader).map_err(|err| malformed(type_name, &err.to_string()))?;
    for _ in 0..pair_count {
        let _name_index =
            u16::deserialize(reader).map_err(|err| malformed(type_name, &err.to_string()))?;
        skip_element_value(type_name, constants, reader)?;
    }
    Ok(annotation_type)
}

/// Step over one `element_value` without interpreting it
fn skip_element_value(
    type_name: &str,
    constants: &ConstantReader,
    reader: &mut &[u8],
) -> Result<(), Error> {
    let tag = u8::deserialize(reader).map_err(|err| malformed(type_name, &err.to_string()))?;
    match tag {
        // Constants and strings: one constant pool index
        b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b's' | b'c' => {
            u16::deserialize(reader).map_err(|err| malformed(type_name, &err.to_string()))?;
        }
        // Enum constant: type descriptor index plus constant name index
        b'e' => {
            u16::deserialize(reader).map_err(|err| malformed(type_name, &err.to_string()))?;
            u16::deserialize(reader).map_err(|err| malformed(type_name, &err.to_string()))?;
        }
        // Nested annotation
        b'@' => {
            parse_annotation(type_name, constants, reader)?;
        }
        // Array of element values
        b'[' => {
            let count =
                u16::deserialize(reader).map_err(|err| malformed(type_name, &err.to_string()))?;
            for _ in 0..count {
                skip_element_value(type_name, constants, reader)?;
            }
        }
        tag => {
            return Err(malformed(
                type_name,
                &format!("Invalid element_value tag {}", tag),
            ))
        }
    }
    Ok(())
}

/// Identity of a class is its name
impl PartialEq for ClassDescription {
    fn eq(&self, other: &ClassDescription) -> bool {
        self.name == other.name
    }
}

impl Eq for ClassDescription {}

impl Hash for ClassDescription {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Debug for ClassDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn names_in_source_form() {
        let int = TypeDescription::Base(BaseType::Int);
        assert_eq!(int.name(), "int");
        assert!(int.represents("int"));

        let object = TypeDescription::Class(Rc::new(ClassDescription::explicit(
            "java.lang.Object",
            None,
            &[],
            false,
        )));
        assert_eq!(object.name(), "java.lang.Object");

        let matrix = TypeDescription::Array(Box::new(TypeDescription::Array(Box::new(int))));
        assert_eq!(matrix.name(), "int[][]");
        assert!(matrix.represents("int[][]"));
    }

    #[test]
    fn equality_is_structural() {
        let first = TypeDescription::Class(Rc::new(ClassDescription::explicit(
            "com.example.A",
            Some("java.lang.Object"),
            &[],
            false,
        )));
        let second = TypeDescription::Class(Rc::new(ClassDescription::explicit(
            "com.example.A",
            None,
            &["java.io.Serializable"],
            false,
        )));
        assert_eq!(first, second);
    }

    #[test]
    fn ref_type_views() {
        let int = TypeDescription::Base(BaseType::Int);
        assert_eq!(int.as_ref_type(), None);

        let ints = TypeDescription::Array(Box::new(int));
        assert_eq!(
            ints.as_ref_type(),
            Some(RefType::PrimitiveArray(ArrayType {
                additional_dimensions: 0,
                element_type: BaseType::Int,
            }))
        );

        let object = TypeDescription::Class(Rc::new(ClassDescription::explicit(
            "java.lang.Object",
            None,
            &[],
            false,
        )));
        let objectss = TypeDescription::Array(Box::new(TypeDescription::Array(Box::new(object))));
        assert_eq!(
            objectss.as_ref_type(),
            Some(RefType::ObjectArray(ArrayType {
                additional_dimensions: 1,
                element_type: BinaryName::OBJECT,
            }))
        );
    }

    #[test]
    fn arrays_pretend_to_extend_object() {
        let ints = TypeDescription::Array(Box::new(TypeDescription::Base(BaseType::Int)));
        assert_eq!(ints.superclass_name(), Some("java.lang.Object"));
        assert!(ints.interface_names().is_empty());
    }
}
