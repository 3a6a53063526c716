//! Resolving type names into cached, structured type descriptions
//!
//! A [`TypePool`] turns dotted source-form type names into [`TypeDescription`]s by asking a
//! [`ClassFileLocator`] for the underlying class file and parsing it. Primitive, `void`, and
//! array spellings resolve structurally without touching the locator. Every outcome (found,
//! not found, malformed) is memoized for the lifetime of the pool, so a name is looked up at
//! most once.

mod description;
mod locator;

pub use description::*;
pub use locator::*;

use crate::jvm::{
    BaseType, BinaryName, Error, FieldType, MethodDescriptor, RefType, RenderDescriptor,
};
use elsa::map::FrozenMap;
use std::rc::Rc;

/// Outcome of resolving a type name
///
/// A name that could not be located resolves to [`Unresolved`](Resolution::Unresolved) rather
/// than erroring, so callers can probe for types that may legitimately be absent.
#[derive(Clone, Debug)]
pub enum Resolution {
    Resolved(Rc<TypeDescription>),
    Unresolved(String),
}

impl Resolution {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }

    /// The description, or an error naming the type that was missing
    pub fn resolve(self) -> Result<Rc<TypeDescription>, Error> {
        match self {
            Resolution::Resolved(description) => Ok(description),
            Resolution::Unresolved(name) => Err(Error::UnresolvedType(name)),
        }
    }
}

/// What the cache remembers about a name
///
/// Malformed class data is remembered too: re-describing a broken type reports the same failure
/// without re-reading or re-parsing anything.
enum Cached {
    Resolution(Resolution),
    Malformed(String),
}

/// Memoizing facade over a [`ClassFileLocator`]
pub struct TypePool {
    locator: Box<dyn ClassFileLocator>,
    cache: FrozenMap<String, Box<Cached>>,
}

impl TypePool {
    pub fn new(locator: Box<dyn ClassFileLocator>) -> TypePool {
        TypePool {
            locator,
            cache: FrozenMap::new(),
        }
    }

    /// Empty pool pre-seeded with the standard library types the assigner chain relies on
    pub fn with_java_library_types() -> TypePool {
        let pool = TypePool::new(Box::new(MapLocator::new(Default::default())));
        pool.insert_java_library_types();
        pool
    }

    /// Resolve a source-form type name (`int`, `java.lang.String`, `byte[][]`)
    ///
    /// `Err` means the machinery failed (transport error, malformed class data); a type that
    /// simply is not there comes back as [`Resolution::Unresolved`].
    pub fn describe(&self, type_name: &str) -> Result<Resolution, Error> {
        // Trailing `[]` pairs wrap the resolution of the element type
        if let Some(element_name) = type_name.strip_suffix("[]") {
            return Ok(match self.describe(element_name)? {
                Resolution::Resolved(element) => Resolution::Resolved(Rc::new(
                    TypeDescription::Array(Box::new((*element).clone())),
                )),
                Resolution::Unresolved(_) => Resolution::Unresolved(type_name.to_owned()),
            });
        }

        if type_name == "void" {
            return Ok(Resolution::Resolved(Rc::new(TypeDescription::Void)));
        }
        if let Some(base_type) = BaseType::from_keyword(type_name) {
            return Ok(Resolution::Resolved(Rc::new(TypeDescription::Base(
                base_type,
            ))));
        }

        if let Some(cached) = self.cache.get(type_name) {
            return match cached {
                Cached::Resolution(resolution) => Ok(resolution.clone()),
                Cached::Malformed(detail) => Err(Error::ClassFileMalformed {
                    type_name: type_name.to_owned(),
                    detail: detail.clone(),
                }),
            };
        }

        // Transport failures stay uncached so a flaky source can be retried
        let representation = self.locator.class_file_for(type_name)?;
        let bytes = match representation {
            BinaryRepresentation::Explicit(bytes) => bytes,
            BinaryRepresentation::Illegal => {
                let resolution = Resolution::Unresolved(type_name.to_owned());
                self.cache.insert(
                    type_name.to_owned(),
                    Box::new(Cached::Resolution(resolution.clone())),
                );
                return Ok(resolution);
            }
        };

        match ClassDescription::from_class_file(type_name, &bytes) {
            Ok(description) => {
                let resolution = Resolution::Resolved(Rc::new(TypeDescription::Class(Rc::new(
                    description,
                ))));
                self.cache.insert(
                    type_name.to_owned(),
                    Box::new(Cached::Resolution(resolution.clone())),
                );
                Ok(resolution)
            }
            Err(err) => {
                let detail = match &err {
                    Error::ClassFileMalformed { detail, .. } => detail.clone(),
                    other => format!("{:?}", other),
                };
                self.cache
                    .insert(type_name.to_owned(), Box::new(Cached::Malformed(detail)));
                Err(err)
            }
        }
    }

    /// Register an explicitly constructed description under its own name
    ///
    /// Later describes of that name are answered from the cache without consulting the locator.
    /// Names already cached keep their first description.
    pub fn insert(&self, description: TypeDescription) {
        let name = description.name();
        if self.cache.get(&name).is_none() {
            let resolution = Resolution::Resolved(Rc::new(description));
            self.cache
                .insert(name, Box::new(Cached::Resolution(resolution)));
        }
    }

    /// Seed the pool with the standard library types the assigner chain relies on
    ///
    /// These cover the wrapper classes (with their real superclasses) and the handful of types
    /// with special roles in assignability, so boxing and unboxing work even when no locator can
    /// serve `java.*` class files.
    pub fn insert_java_library_types(&self) {
        let class = |name: &str, superclass: Option<&str>, interfaces: &[&str]| {
            TypeDescription::Class(Rc::new(ClassDescription::explicit(
                name, superclass, interfaces, false,
            )))
        };
        let interface = |name: &str| {
            TypeDescription::Class(Rc::new(ClassDescription::explicit(name, None, &[], true)))
        };

        self.insert(interface("java.io.Serializable"));
        self.insert(interface("java.lang.Cloneable"));
        self.insert(interface("java.lang.Comparable"));
        self.insert(class("java.lang.Object", None, &[]));
        self.insert(class(
            "java.lang.String",
            Some("java.lang.Object"),
            &["java.io.Serializable", "java.lang.Comparable"],
        ));
        self.insert(class(
            "java.lang.Number",
            Some("java.lang.Object"),
            &["java.io.Serializable"],
        ));

        self.insert(class(
            "java.lang.Boolean",
            Some("java.lang.Object"),
            &["java.io.Serializable", "java.lang.Comparable"],
        ));
        self.insert(class(
            "java.lang.Character",
            Some("java.lang.Object"),
            &["java.io.Serializable", "java.lang.Comparable"],
        ));
        for wrapper in [
            "java.lang.Byte",
            "java.lang.Short",
            "java.lang.Integer",
            "java.lang.Long",
            "java.lang.Float",
            "java.lang.Double",
        ] {
            self.insert(class(
                wrapper,
                Some("java.lang.Number"),
                &["java.lang.Comparable"],
            ));
        }
    }

    /// Would a `source` value be accepted where a `target` value is expected?
    ///
    /// This matches the semantics of the `isJavaAssignable(sub_type, super_type)` predicate in
    /// the JVM verifier specification. Supertypes that cannot be resolved through the pool are
    /// skipped (with a debug log) rather than failing the whole query.
    pub fn is_assignable(
        &self,
        source: &TypeDescription,
        target: &TypeDescription,
    ) -> Result<bool, Error> {
        if source == target {
            return Ok(true);
        }
        match (source, target) {
            // Primitives and void assign only to themselves
            (TypeDescription::Void, _)
            | (_, TypeDescription::Void)
            | (TypeDescription::Base(_), _)
            | (_, TypeDescription::Base(_)) => Ok(false),

            // Special superclass and interfaces of all arrays
            (TypeDescription::Array(_), TypeDescription::Class(class)) => Ok(class.name()
                == "java.lang.Object"
                || class.name() == "java.lang.Cloneable"
                || class.name() == "java.io.Serializable"),

            // Covariance of arrays: primitive components must match exactly (caught by the
            // equality check above), reference components recurse
            (TypeDescription::Array(source_component), TypeDescription::Array(target_component)) => {
                if source_component.is_primitive() || target_component.is_primitive() {
                    Ok(false)
                } else {
                    self.is_assignable(source_component, target_component)
                }
            }

            (TypeDescription::Class(_), TypeDescription::Class(_)) => {
                self.is_class_assignable(source, target)
            }

            (TypeDescription::Class(_), TypeDescription::Array(_)) => Ok(false),
        }
    }

    /// Search up the superclass chain (and interface graph, when the target is an interface)
    fn is_class_assignable(
        &self,
        source: &TypeDescription,
        target: &TypeDescription,
    ) -> Result<bool, Error> {
        let target_name = target.name();
        let follow_interfaces = target.is_interface();

        let mut visited: std::collections::HashSet<String> = std::collections::HashSet::new();
        let mut to_visit: Vec<Rc<TypeDescription>> = vec![Rc::new(source.clone())];
        visited.insert(source.name());

        while let Some(description) = to_visit.pop() {
            let mut supertype_names: Vec<&str> = vec![];
            if let Some(superclass) = description.superclass_name() {
                supertype_names.push(superclass);
            }
            if follow_interfaces {
                supertype_names.extend(description.interface_names().iter().map(String::as_str));
            }

            for name in supertype_names {
                if name == target_name {
                    return Ok(true);
                }
                if !visited.insert(name.to_owned()) {
                    continue;
                }
                match self.describe(name)? {
                    Resolution::Resolved(supertype) => to_visit.push(supertype),
                    Resolution::Unresolved(name) => {
                        log::debug!(
                            "Supertype {} is not resolvable, skipping it while checking \
                             assignability to {}",
                            name,
                            target_name
                        );
                    }
                }
            }
        }
        Ok(false)
    }
}

/// Derives the name of an array's component type on demand
///
/// Useful when the component type is only implied: by the return type of an accessor, or by an
/// annotation property.
pub enum ComponentTypeLocator<'p> {
    /// The component type is the return type of this descriptor, minus one array dimension
    ForArrayType(MethodDescriptor<BinaryName>),

    /// The component type comes from the named annotation's property accessor
    ForAnnotationProperty {
        pool: &'p TypePool,
        annotation_name: String,
    },

    /// No component type can ever be derived
    Illegal,
}

impl<'p> ComponentTypeLocator<'p> {
    /// Resolve the component type name implied for `property`
    pub fn bind(&self, property: &str) -> Result<String, Error> {
        match self {
            ComponentTypeLocator::ForArrayType(descriptor) => {
                component_name(descriptor.return_type.as_ref())
            }
            ComponentTypeLocator::ForAnnotationProperty {
                pool,
                annotation_name,
            } => {
                let annotation = pool.describe(annotation_name)?.resolve()?;
                let accessor = annotation
                    .declared_methods()?
                    .iter()
                    .find(|method| method.name == property)
                    .cloned()
                    .ok_or_else(|| Error::MissingAnnotationProperty {
                        annotation: annotation_name.clone(),
                        property: property.to_owned(),
                    })?;
                component_name(accessor.descriptor.return_type.as_ref())
            }
            ComponentTypeLocator::Illegal => Err(Error::IllegalComponentLocator),
        }
    }
}

/// Source-form name of the component of an array-typed return type
fn component_name(return_type: Option<&FieldType<BinaryName>>) -> Result<String, Error> {
    let rendered = |typ: &FieldType<BinaryName>| typ.render();
    match return_type {
        Some(FieldType::Ref(RefType::PrimitiveArray(arr))) => {
            let mut name = String::from(arr.element_type.keyword());
            for _ in 0..arr.additional_dimensions {
                name.push_str("[]");
            }
            Ok(name)
        }
        Some(FieldType::Ref(RefType::ObjectArray(arr))) => {
            let mut name = arr.element_type.to_dotted();
            for _ in 0..arr.additional_dimensions {
                name.push_str("[]");
            }
            Ok(name)
        }
        Some(other) => Err(Error::BadDescriptor(rendered(other))),
        None => Err(Error::BadDescriptor(String::from("V"))),
    }
}
