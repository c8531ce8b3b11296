use crate::error::VmError;
use crate::rt::JavaClass;
use crate::source::Source;
use std::collections::HashMap;
use std::path::Path;
use tracing_log::log::debug;
use walkdir::WalkDir;

/// Cache of loaded Smali classes, keyed by demangled class name. Populated
/// before execution and read-only while a method runs.
#[derive(Debug, Default)]
pub struct ClassLoader {
    classes: HashMap<String, JavaClass>,
}

impl ClassLoader {
    pub fn new() -> Self {
        ClassLoader::default()
    }

    /// Parses one `.smali` file and registers its class. Returns the
    /// demangled class name.
    pub fn load_class(&mut self, path: impl AsRef<Path>) -> Result<String, VmError> {
        let source = Source::from_file(path.as_ref())?;
        let name = self.register(JavaClass::parse(&source)?)?;
        debug!("Loaded class \"{}\" from {:?}", name, path.as_ref());
        Ok(name)
    }

    /// Same as [`ClassLoader::load_class`] but from an in-memory listing.
    pub fn load_class_text(&mut self, text: &str) -> Result<String, VmError> {
        self.register(JavaClass::parse(&Source::from(text))?)
    }

    /// Walks a directory tree and loads every `.smali` file found, in path
    /// order. Returns the loaded class names.
    pub fn load_directory(&mut self, root: impl AsRef<Path>) -> Result<Vec<String>, VmError> {
        let mut paths: Vec<_> = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry.file_type().is_file()
                    && entry.path().extension().is_some_and(|ext| ext == "smali")
            })
            .map(|entry| entry.into_path())
            .collect();
        paths.sort();

        let mut loaded = Vec::new();
        for path in paths {
            loaded.push(self.load_class(&path)?);
        }
        Ok(loaded)
    }

    fn register(&mut self, class: JavaClass) -> Result<String, VmError> {
        let name = class.class_name().to_string();
        if self.classes.contains_key(&name) {
            return Err(VmError::DuplicateClass(name));
        }
        self.classes.insert(name.clone(), class);
        Ok(name)
    }

    pub fn get(&self, class_name: &str) -> Option<&JavaClass> {
        self.classes.get(class_name)
    }

    pub fn contains_class(&self, class_name: &str) -> bool {
        self.classes.contains_key(class_name)
    }

    pub fn loaded_class_names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(|name| name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = ".class Lcom/a/b;\n.method static x()V\nreturn-void\n.end method\n";

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut loader = ClassLoader::new();
        assert_eq!(loader.load_class_text(LISTING).unwrap(), "com.a.b");
        assert!(matches!(
            loader.load_class_text(LISTING),
            Err(VmError::DuplicateClass(name)) if name == "com.a.b"
        ));
        assert!(loader.contains_class("com.a.b"));
    }
}
