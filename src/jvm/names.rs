use std::borrow::Cow;
use std::fmt::{Debug, Error as FmtError, Formatter};

/// Names of methods, fields
///
/// See <https://docs.oracle.com/javase/specs/jvms/se16/html/jvms-4.html#jvms-4.2.2>
#[derive(Clone, Hash, Eq, PartialEq)]
pub struct UnqualifiedName(Cow<'static, str>);

/// Names of classes and interfaces, in internal slash-separated form
///
/// See <https://docs.oracle.com/javase/specs/jvms/se16/html/jvms-4.html#jvms-4.2.1>
#[derive(Clone, Hash, Eq, PartialEq)]
pub struct BinaryName(Cow<'static, str>);

/// Extracts the raw underlying string name
impl AsRef<str> for UnqualifiedName {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

/// Extracts the raw underlying string name
impl AsRef<str> for BinaryName {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

pub trait Name: Sized {
    /// Check if a string would be a valid name
    fn check_valid(name: impl AsRef<str>) -> Result<(), String>;

    /// Extract the raw underlying string data
    fn as_cow(&self) -> &Cow<'static, str>;

    /// Extract the raw underlying string name
    fn as_str(&self) -> &str {
        self.as_cow().as_ref()
    }

    /// Try to construct a name from a string
    fn from_string(name: String) -> Result<Self, String>;
}

impl Name for UnqualifiedName {
    fn check_valid(name: impl AsRef<str>) -> Result<(), String> {
        let name = name.as_ref();
        if name.contains(&['.', ';', '[', '/'][..]) {
            Err(format!(
                "Unqualified name '{}' contains an illegal character",
                name
            ))
        } else if name.is_empty() {
            Err(format!("Unqualified name '{}' is empty", name))
        } else {
            Ok(())
        }
    }

    fn as_cow(&self) -> &Cow<'static, str> {
        &self.0
    }

    fn from_string(name: String) -> Result<Self, String> {
        match Self::check_valid(&name) {
            Ok(()) => Ok(UnqualifiedName(Cow::Owned(name))),
            Err(msg) => Err(msg),
        }
    }
}

impl Name for BinaryName {
    fn check_valid(name: impl AsRef<str>) -> Result<(), String> {
        let name = name.as_ref();
        if name.is_empty() {
            Err(format!("Binary name '{}' is empty", name))
        } else {
            name.split('/').map(UnqualifiedName::check_valid).collect()
        }
    }

    fn as_cow(&self) -> &Cow<'static, str> {
        &self.0
    }

    fn from_string(name: String) -> Result<Self, String> {
        match Self::check_valid(&name) {
            Ok(()) => Ok(BinaryName(Cow::Owned(name))),
            Err(msg) => Err(msg),
        }
    }
}

impl Debug for UnqualifiedName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(self.0.as_ref())
    }
}

impl Debug for BinaryName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(self.0.as_ref())
    }
}

impl BinaryName {
    pub const OBJECT: BinaryName = BinaryName(Cow::Borrowed("java/lang/Object"));
    pub const STRING: BinaryName = BinaryName(Cow::Borrowed("java/lang/String"));
    pub const NUMBER: BinaryName = BinaryName(Cow::Borrowed("java/lang/Number"));

    pub const BOOLEAN: BinaryName = BinaryName(Cow::Borrowed("java/lang/Boolean"));
    pub const BYTE: BinaryName = BinaryName(Cow::Borrowed("java/lang/Byte"));
    pub const CHARACTER: BinaryName = BinaryName(Cow::Borrowed("java/lang/Character"));
    pub const SHORT: BinaryName = BinaryName(Cow::Borrowed("java/lang/Short"));
    pub const INTEGER: BinaryName = BinaryName(Cow::Borrowed("java/lang/Integer"));
    pub const LONG: BinaryName = BinaryName(Cow::Borrowed("java/lang/Long"));
    pub const FLOAT: BinaryName = BinaryName(Cow::Borrowed("java/lang/Float"));
    pub const DOUBLE: BinaryName = BinaryName(Cow::Borrowed("java/lang/Double"));

    /// Convert a dotted source name (`java.lang.Object`) into a binary name
    pub fn from_dotted(name: &str) -> Result<BinaryName, String> {
        BinaryName::from_string(name.replace('.', "/"))
    }

    /// Render the name in dotted source form
    pub fn to_dotted(&self) -> String {
        self.as_str().replace('/', ".")
    }
}

impl UnqualifiedName {
    pub const VALUEOF: UnqualifiedName = UnqualifiedName(Cow::Borrowed("valueOf"));
    pub const BOOLEANVALUE: UnqualifiedName = UnqualifiedName(Cow::Borrowed("booleanValue"));
    pub const BYTEVALUE: UnqualifiedName = UnqualifiedName(Cow::Borrowed("byteValue"));
    pub const CHARVALUE: UnqualifiedName = UnqualifiedName(Cow::Borrowed("charValue"));
    pub const SHORTVALUE: UnqualifiedName = UnqualifiedName(Cow::Borrowed("shortValue"));
    pub const INTVALUE: UnqualifiedName = UnqualifiedName(Cow::Borrowed("intValue"));
    pub const LONGVALUE: UnqualifiedName = UnqualifiedName(Cow::Borrowed("longValue"));
    pub const FLOATVALUE: UnqualifiedName = UnqualifiedName(Cow::Borrowed("floatValue"));
    pub const DOUBLEVALUE: UnqualifiedName = UnqualifiedName(Cow::Borrowed("doubleValue"));
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn valid_names() {
        assert!(UnqualifiedName::from_string(String::from("toString")).is_ok());
        assert!(UnqualifiedName::from_string(String::from("<init>")).is_ok());
        assert!(BinaryName::from_string(String::from("java/lang/Object")).is_ok());
    }

    #[test]
    fn invalid_names() {
        assert!(UnqualifiedName::from_string(String::from("")).is_err());
        assert!(UnqualifiedName::from_string(String::from("foo.bar")).is_err());
        assert!(BinaryName::from_string(String::from("java//lang")).is_err());
        assert!(BinaryName::from_string(String::from("java.lang.Object")).is_err());
    }

    #[test]
    fn dotted_form() {
        let name = BinaryName::from_dotted("java.lang.Object").unwrap();
        assert_eq!(name, BinaryName::OBJECT);
        assert_eq!(name.to_dotted(), "java.lang.Object");
    }
}
