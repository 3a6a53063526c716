//! End to end: generate a class, serialize it, then describe it back through a type pool

use classforge::jvm::class_file::{
    Attribute, ClassFile, ConstantsPool, Deserialize, Method, Serialize, Version,
};
use classforge::jvm::code::CodeAssembler;
use classforge::jvm::stack::assign::{default_assigner, Assigner};
use classforge::jvm::{
    BinaryName, ClassAccessFlags, FieldType, MethodAccessFlags, MethodDescriptor, RefType,
    RenderDescriptor,
};
use classforge::pool::{ClassPathLocator, MapLocator, TypePool};
use std::collections::HashMap;

/// Generate `com.example.Adapter` with a static method `box(int) -> java.lang.Number` whose body
/// is produced by the assigner chain
fn generate_adapter_class() -> Vec<u8> {
    let pool = TypePool::with_java_library_types();
    let assigner = default_assigner(&pool, false);

    let int = pool.describe("int").unwrap().resolve().unwrap();
    let number = pool.describe("java.lang.Number").unwrap().resolve().unwrap();
    let adaptation = assigner.assign(&int, &number, false).unwrap();
    assert!(adaptation.is_valid());

    let mut constants = ConstantsPool::new();
    let mut assembler = CodeAssembler::new();
    assembler
        .push_instruction(classforge::jvm::code::Instruction::ILoad(0))
        .unwrap();
    adaptation.apply(&mut assembler).unwrap();
    assembler
        .push_instruction(classforge::jvm::code::Instruction::AReturn)
        .unwrap();
    let code = assembler.into_code(1, &mut constants).unwrap();

    let descriptor: MethodDescriptor<BinaryName> = MethodDescriptor {
        parameters: vec![FieldType::int()],
        return_type: Some(FieldType::object(BinaryName::NUMBER)),
    };
    let method = Method {
        access_flags: MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
        name_index: constants.get_utf8("box").unwrap(),
        descriptor_index: constants.get_utf8(&descriptor.render()).unwrap(),
        attributes: vec![Attribute::of(&code, &mut constants).unwrap()],
    };

    let this_class = constants
        .get_class(&RefType::Object(
            BinaryName::from_dotted("com.example.Adapter").unwrap(),
        ))
        .unwrap();
    let super_class = constants.get_class(&RefType::Object(BinaryName::OBJECT)).unwrap();

    let class_file = ClassFile {
        version: Version::JAVA11,
        constants: constants.into_offset_vec(),
        access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
        this_class,
        super_class,
        interfaces: vec![],
        fields: vec![],
        methods: vec![method],
        attributes: vec![],
    };

    let mut bytes = vec![];
    class_file.serialize(&mut bytes).unwrap();
    bytes
}

#[test]
fn generated_class_describes_back() {
    let bytes = generate_adapter_class();

    let mut class_files = HashMap::new();
    class_files.insert(String::from("com.example.Adapter"), bytes);
    let pool = TypePool::new(Box::new(MapLocator::new(class_files)));
    pool.insert_java_library_types();

    let adapter = pool.describe("com.example.Adapter").unwrap().resolve().unwrap();
    assert_eq!(adapter.name(), "com.example.Adapter");
    assert_eq!(adapter.superclass_name(), Some("java.lang.Object"));
    assert!(!adapter.is_interface());
    assert!(adapter.declared_fields().unwrap().is_empty());

    let methods = adapter.declared_methods().unwrap();
    assert_eq!(methods.len(), 1);
    assert_eq!(methods[0].name, "box");
    assert_eq!(methods[0].descriptor.render(), "(I)Ljava/lang/Number;");
    assert!(methods[0].access_flags.contains(MethodAccessFlags::STATIC));

    // And the description plugs back into assignability
    let object = pool.describe("java.lang.Object").unwrap().resolve().unwrap();
    assert!(pool.is_assignable(&adapter, &object).unwrap());
}

#[test]
fn generated_class_round_trips_structurally() {
    let bytes = generate_adapter_class();

    let class_file = ClassFile::deserialize(&mut &bytes[..]).unwrap();
    assert_eq!(class_file.version, Version::JAVA11);
    assert_eq!(class_file.methods.len(), 1);
    assert!(class_file.fields.is_empty());

    let mut reserialized = vec![];
    class_file.serialize(&mut reserialized).unwrap();
    assert_eq!(bytes, reserialized);
}

#[test]
fn saved_class_file_is_locatable_from_disk() {
    let bytes = generate_adapter_class();
    let class_file = ClassFile::deserialize(&mut &bytes[..]).unwrap();

    let root = std::env::temp_dir().join(format!(
        "classforge-save-{}-{:?}",
        std::process::id(),
        std::thread::current().id()
    ));
    let path = root.join("com/example/Adapter.class");
    class_file.save_to_path(&path, true).unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), bytes);

    let pool = TypePool::new(Box::new(ClassPathLocator::new(vec![root.clone()])));
    let adapter = pool.describe("com.example.Adapter").unwrap().resolve().unwrap();
    assert_eq!(adapter.name(), "com.example.Adapter");

    std::fs::remove_dir_all(&root).unwrap();
}

#[test]
fn truncated_class_files_are_malformed() {
    let mut bytes = generate_adapter_class();
    bytes.truncate(bytes.len() / 2);

    let mut class_files = HashMap::new();
    class_files.insert(String::from("com.example.Adapter"), bytes);
    let pool = TypePool::new(Box::new(MapLocator::new(class_files)));

    let result = pool.describe("com.example.Adapter");
    assert!(matches!(
        result,
        Err(classforge::jvm::Error::ClassFileMalformed { .. })
    ));
}
