use super::class_file::ConstantPoolOverflow;

#[derive(Debug)]
pub enum Error {
    /// Underlying transport failure (reading a class file, writing generated output)
    IoError(std::io::Error),

    ConstantPoolOverflow(ConstantPoolOverflow),

    /// The method body grew past the `u16` offsets the `Code` attribute can express
    MethodCodeOverflow(usize),
    MethodCodeMaxStackOverflow(i32),

    /// More values were popped off the operand stack than were ever pushed
    StackUnderflow { depth: i32 },

    /// An invalid stack manipulation was applied instead of being rejected by its producer
    IllegalManipulation,

    /// A value of type `void` was asked to be popped off the stack (void never occupies a slot)
    PopVoid,

    /// `void` was requested as an array component type
    VoidArrayComponent,

    /// Binding a component type locator that was configured as illegal
    IllegalComponentLocator,

    /// An annotation property lookup did not find a matching accessor
    MissingAnnotationProperty { annotation: String, property: String },

    /// Parsed class data did not follow the class file format
    ClassFileMalformed { type_name: String, detail: String },

    BadDescriptor(String),

    /// A type name could not be resolved to a type description
    UnresolvedType(String),

    /// The injected instrumentation capability cannot retransform classes
    RetransformationUnsupported,
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::IoError(err)
    }
}

impl From<ConstantPoolOverflow> for Error {
    fn from(overflow: ConstantPoolOverflow) -> Error {
        Error::ConstantPoolOverflow(overflow)
    }
}
