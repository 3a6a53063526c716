use crate::jvm::Error;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Outcome of looking up the binary form of a class
///
/// Absence is an ordinary answer, not an error: lookups that find nothing return [`Illegal`]
/// instead of failing, and only transport problems surface as `Err`.
///
/// [`Illegal`]: BinaryRepresentation::Illegal
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum BinaryRepresentation {
    /// The raw class file bytes
    Explicit(Vec<u8>),

    /// No binary form could be located
    Illegal,
}

impl BinaryRepresentation {
    pub fn is_valid(&self) -> bool {
        matches!(self, BinaryRepresentation::Explicit(_))
    }
}

/// Source of raw class files, queried by dotted class name (eg. `java.lang.String`)
pub trait ClassFileLocator {
    fn class_file_for(&self, type_name: &str) -> Result<BinaryRepresentation, Error>;
}

/// Locates class files under a list of directory roots
///
/// The dotted class name maps to a slash-separated relative path with a `.class` extension, tried
/// against each root in order. A missing file just means the class is not there; any other I/O
/// failure propagates.
pub struct ClassPathLocator {
    roots: Vec<PathBuf>,
}

impl ClassPathLocator {
    pub fn new(roots: Vec<PathBuf>) -> ClassPathLocator {
        ClassPathLocator { roots }
    }
}

impl ClassFileLocator for ClassPathLocator {
    fn class_file_for(&self, type_name: &str) -> Result<BinaryRepresentation, Error> {
        let relative: PathBuf = format!("{}.class", type_name.replace('.', "/")).into();
        for root in &self.roots {
            match fs::read(root.join(&relative)) {
                Ok(bytes) => return Ok(BinaryRepresentation::Explicit(bytes)),
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => return Err(Error::IoError(err)),
            }
        }
        Ok(BinaryRepresentation::Illegal)
    }
}

/// Locates class files in an in-memory map of dotted names to bytes
pub struct MapLocator {
    class_files: HashMap<String, Vec<u8>>,
}

impl MapLocator {
    pub fn new(class_files: HashMap<String, Vec<u8>>) -> MapLocator {
        MapLocator { class_files }
    }
}

impl ClassFileLocator for MapLocator {
    fn class_file_for(&self, type_name: &str) -> Result<BinaryRepresentation, Error> {
        match self.class_files.get(type_name) {
            Some(bytes) => Ok(BinaryRepresentation::Explicit(bytes.clone())),
            None => Ok(BinaryRepresentation::Illegal),
        }
    }
}

/// Tries several locators in order, first hit wins
///
/// Transport errors from a locator propagate immediately rather than being papered over by a
/// later locator finding nothing.
pub struct CompoundLocator {
    locators: Vec<Box<dyn ClassFileLocator>>,
}

impl CompoundLocator {
    pub fn new(locators: Vec<Box<dyn ClassFileLocator>>) -> CompoundLocator {
        CompoundLocator { locators }
    }
}

impl ClassFileLocator for CompoundLocator {
    fn class_file_for(&self, type_name: &str) -> Result<BinaryRepresentation, Error> {
        for locator in &self.locators {
            let representation = locator.class_file_for(type_name)?;
            if representation.is_valid() {
                return Ok(representation);
            }
        }
        Ok(BinaryRepresentation::Illegal)
    }
}

/// Identity of a class loader, linked to its parent
///
/// Loader identity is pointer identity of the `Arc`, mirroring how loaders compare on the JVM
/// side. A `None` parent means the chain ends at the bootstrap loader.
#[derive(Clone, Debug)]
pub struct ClassLoaderHandle {
    parent: Option<Arc<ClassLoaderHandle>>,
}

impl ClassLoaderHandle {
    pub fn bootstrap_child() -> Arc<ClassLoaderHandle> {
        Arc::new(ClassLoaderHandle { parent: None })
    }

    pub fn child_of(parent: Arc<ClassLoaderHandle>) -> Arc<ClassLoaderHandle> {
        Arc::new(ClassLoaderHandle {
            parent: Some(parent),
        })
    }

    /// Is `ancestor` the same loader as `descendant`, or somewhere up its parent chain?
    ///
    /// The bootstrap loader (represented by `None`) is an ancestor of every loader.
    pub fn is_ancestor_or_self(
        ancestor: Option<&Arc<ClassLoaderHandle>>,
        descendant: Option<&Arc<ClassLoaderHandle>>,
    ) -> bool {
        let ancestor = match ancestor {
            None => return true,
            Some(ancestor) => ancestor,
        };
        let mut current = descendant.cloned();
        while let Some(loader) = current {
            if Arc::ptr_eq(&loader, ancestor) {
                return true;
            }
            current = loader.parent.clone();
        }
        false
    }
}

/// Observer invoked for every class going through retransformation
pub trait ClassFileTransformer {
    /// Look at (but do not modify) the class passing through the pipeline
    fn inspect(&self, loader: Option<&Arc<ClassLoaderHandle>>, type_name: &str, class_file: &[u8]);
}

/// The retransformation capability the agent locator needs from its environment
///
/// Injected rather than discovered, so the locator is usable anywhere the capability can be
/// provided and testable with a scripted double.
pub trait Instrumentation {
    fn is_retransformation_supported(&self) -> bool;

    fn add_transformer(&self, transformer: Arc<dyn ClassFileTransformer>);

    fn remove_transformer(&self, transformer: &Arc<dyn ClassFileTransformer>);

    /// Push a loaded class through the transformation pipeline without changing it
    fn retransform_class(&self, type_name: &str) -> Result<(), Error>;
}

/// Locates class files by capturing them from the instrumentation pipeline
///
/// A lookup installs a short-lived extraction transformer, triggers a no-op retransformation of
/// the requested class, and reads back whatever bytes the pipeline surfaced. Only classes whose
/// defining loader sits below (or at) the configured target loader are captured.
///
/// Synthetic classes that are never retransformable (eg. the VM-anonymous classes backing lambda
/// forms) cannot be located this way.
pub struct AgentLocator<I> {
    instrumentation: I,
    loader: Option<Arc<ClassLoaderHandle>>,
}

impl<I: Instrumentation> AgentLocator<I> {
    /// Set up a locator capturing classes visible to `loader`
    ///
    /// Fails immediately when the instrumentation cannot retransform, instead of failing on
    /// every later lookup.
    pub fn of(
        instrumentation: I,
        loader: Option<Arc<ClassLoaderHandle>>,
    ) -> Result<AgentLocator<I>, Error> {
        if !instrumentation.is_retransformation_supported() {
            return Err(Error::RetransformationUnsupported);
        }
        Ok(AgentLocator {
            instrumentation,
            loader,
        })
    }
}

/// Transformer that holds onto the bytes of one specific class
struct ExtractionTransformer {
    target_name: String,
    target_loader: Option<Arc<ClassLoaderHandle>>,
    captured: Mutex<Option<Vec<u8>>>,
}

impl ClassFileTransformer for ExtractionTransformer {
    fn inspect(&self, loader: Option<&Arc<ClassLoaderHandle>>, type_name: &str, class_file: &[u8]) {
        if type_name != self.target_name {
            return;
        }
        if !ClassLoaderHandle::is_ancestor_or_self(self.target_loader.as_ref(), loader) {
            return;
        }
        *self.captured.lock().unwrap() = Some(class_file.to_vec());
    }
}

/// Removes the transformer when the lookup ends, however it ends
struct InstalledTransformer<'a, I: Instrumentation> {
    instrumentation: &'a I,
    transformer: Arc<dyn ClassFileTransformer>,
}

impl<'a, I: Instrumentation> Drop for InstalledTransformer<'a, I> {
    fn drop(&mut self) {
        self.instrumentation.remove_transformer(&self.transformer);
    }
}

impl<I: Instrumentation> ClassFileLocator for AgentLocator<I> {
    fn class_file_for(&self, type_name: &str) -> Result<BinaryRepresentation, Error> {
        let extraction = Arc::new(ExtractionTransformer {
            target_name: type_name.to_owned(),
            target_loader: self.loader.clone(),
            captured: Mutex::new(None),
        });

        let transformer: Arc<dyn ClassFileTransformer> = extraction.clone();
        self.instrumentation.add_transformer(transformer.clone());
        let installed = InstalledTransformer {
            instrumentation: &self.instrumentation,
            transformer,
        };

        self.instrumentation.retransform_class(type_name)?;
        drop(installed);

        let captured = extraction.captured.lock().unwrap().take();
        match captured {
            Some(bytes) => Ok(BinaryRepresentation::Explicit(bytes)),
            None => Ok(BinaryRepresentation::Illegal),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn compound_first_hit_wins() {
        let mut first = HashMap::new();
        first.insert(String::from("com.example.A"), vec![1u8]);
        let mut second = HashMap::new();
        second.insert(String::from("com.example.A"), vec![2u8]);
        second.insert(String::from("com.example.B"), vec![3u8]);

        let compound = CompoundLocator::new(vec![
            Box::new(MapLocator::new(first)),
            Box::new(MapLocator::new(second)),
        ]);

        assert_eq!(
            compound.class_file_for("com.example.A").unwrap(),
            BinaryRepresentation::Explicit(vec![1])
        );
        assert_eq!(
            compound.class_file_for("com.example.B").unwrap(),
            BinaryRepresentation::Explicit(vec![3])
        );
        assert_eq!(
            compound.class_file_for("com.example.C").unwrap(),
            BinaryRepresentation::Illegal
        );
    }

    #[test]
    fn loader_ancestry() {
        let system = ClassLoaderHandle::bootstrap_child();
        let app = ClassLoaderHandle::child_of(system.clone());
        let other = ClassLoaderHandle::bootstrap_child();

        // Bootstrap is everyone's ancestor
        assert!(ClassLoaderHandle::is_ancestor_or_self(None, Some(&app)));
        assert!(ClassLoaderHandle::is_ancestor_or_self(None, None));

        assert!(ClassLoaderHandle::is_ancestor_or_self(Some(&system), Some(&app)));
        assert!(ClassLoaderHandle::is_ancestor_or_self(Some(&app), Some(&app)));
        assert!(!ClassLoaderHandle::is_ancestor_or_self(Some(&app), Some(&system)));
        assert!(!ClassLoaderHandle::is_ancestor_or_self(Some(&other), Some(&app)));
        assert!(!ClassLoaderHandle::is_ancestor_or_self(Some(&app), None));
    }

    /// Scripted instrumentation: serves classes out of a map, records transformer churn
    struct FakeInstrumentation {
        classes: HashMap<String, (Option<Arc<ClassLoaderHandle>>, Vec<u8>)>,
        transformers: RefCell<Vec<Arc<dyn ClassFileTransformer>>>,
        supported: bool,
    }

    impl Instrumentation for &FakeInstrumentation {
        fn is_retransformation_supported(&self) -> bool {
            self.supported
        }

        fn add_transformer(&self, transformer: Arc<dyn ClassFileTransformer>) {
            self.transformers.borrow_mut().push(transformer);
        }

        fn remove_transformer(&self, transformer: &Arc<dyn ClassFileTransformer>) {
            self.transformers
                .borrow_mut()
                .retain(|installed| !Arc::ptr_eq(installed, transformer));
        }

        fn retransform_class(&self, type_name: &str) -> Result<(), Error> {
            let (loader, bytes) = match self.classes.get(type_name) {
                Some(entry) => entry,
                None => return Ok(()),
            };
            for transformer in self.transformers.borrow().iter() {
                transformer.inspect(loader.as_ref(), type_name, bytes);
            }
            Ok(())
        }
    }

    #[test]
    fn agent_requires_retransformation() {
        let instrumentation = FakeInstrumentation {
            classes: HashMap::new(),
            transformers: RefCell::new(vec![]),
            supported: false,
        };
        assert!(matches!(
            AgentLocator::of(&instrumentation, None),
            Err(Error::RetransformationUnsupported)
        ));
    }

    #[test]
    fn agent_captures_and_cleans_up() {
        let loader = ClassLoaderHandle::bootstrap_child();
        let mut classes = HashMap::new();
        classes.insert(
            String::from("com.example.Seen"),
            (Some(loader.clone()), vec![0xCAu8, 0xFE]),
        );
        let instrumentation = FakeInstrumentation {
            classes,
            transformers: RefCell::new(vec![]),
            supported: true,
        };

        let locator = AgentLocator::of(&instrumentation, Some(loader)).unwrap();
        assert_eq!(
            locator.class_file_for("com.example.Seen").unwrap(),
            BinaryRepresentation::Explicit(vec![0xCA, 0xFE])
        );
        assert_eq!(
            locator.class_file_for("com.example.Unseen").unwrap(),
            BinaryRepresentation::Illegal
        );

        // No transformer left behind by either lookup
        assert!(instrumentation.transformers.borrow().is_empty());
    }

    #[test]
    fn agent_filters_by_loader_ancestry() {
        let target = ClassLoaderHandle::bootstrap_child();
        let sibling = ClassLoaderHandle::bootstrap_child();
        let child = ClassLoaderHandle::child_of(target.clone());

        let mut classes = HashMap::new();
        classes.insert(
            String::from("com.example.InChild"),
            (Some(child), vec![1u8]),
        );
        classes.insert(
            String::from("com.example.InSibling"),
            (Some(sibling), vec![2u8]),
        );
        let instrumentation = FakeInstrumentation {
            classes,
            transformers: RefCell::new(vec![]),
            supported: true,
        };

        let locator = AgentLocator::of(&instrumentation, Some(target)).unwrap();

        // The child loader delegates to the target, so its classes are visible
        assert_eq!(
            locator.class_file_for("com.example.InChild").unwrap(),
            BinaryRepresentation::Explicit(vec![1])
        );

        // The sibling loader does not, so its classes are not
        assert_eq!(
            locator.class_file_for("com.example.InSibling").unwrap(),
            BinaryRepresentation::Illegal
        );
    }
}
