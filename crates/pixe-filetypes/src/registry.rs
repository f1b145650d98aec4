//! Extension to handler lookup

use crate::error::{PixeError, Result};
use crate::exif::TagWriter;
use crate::handler::TypeHandler;
use crate::image_file::ImageFile;
use crate::{normalize_extension, FileHandle};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Builds a handler bound to one path
pub type HandlerConstructor = Arc<dyn Fn(&Path) -> Box<dyn TypeHandler> + Send + Sync>;

/// Maps normalized extensions to handler constructors.
///
/// A registry is populated once, before any file is processed, and then
/// shared by reference. Registration takes `&mut self`, so it cannot race
/// with lookups.
#[derive(Clone, Default)]
pub struct Registry {
    constructors: HashMap<String, HandlerConstructor>,
}

impl Registry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in handler
    pub fn with_defaults(writer: Arc<dyn TagWriter>) -> Self {
        let mut registry = Self::new();
        ImageFile::register(&mut registry, writer);
        registry
    }

    /// Register `constructor` for each extension.
    ///
    /// Extensions are normalized (leading dots stripped, lower-cased). When an
    /// extension is already registered the new constructor silently replaces
    /// the old one: the last registration wins.
    pub fn register<F>(&mut self, extensions: &[&str], constructor: F)
    where
        F: Fn(&Path) -> Box<dyn TypeHandler> + Send + Sync + 'static,
    {
        let constructor: HandlerConstructor = Arc::new(constructor);
        for extension in extensions {
            self.constructors
                .insert(normalize_extension(extension), Arc::clone(&constructor));
        }
    }

    /// Build the handler for `file`, or fail with `UnsupportedType`
    pub fn resolve(&self, file: &FileHandle) -> Result<Box<dyn TypeHandler>> {
        self.constructors
            .get(file.extension())
            .map(|constructor| constructor(file.path()))
            .ok_or_else(|| PixeError::UnsupportedType {
                path: file.path().to_path_buf(),
                extension: file.extension().to_string(),
            })
    }

    /// Resolve a handler for a bare path
    pub fn resolve_path(&self, path: &Path) -> Result<Box<dyn TypeHandler>> {
        self.resolve(&FileHandle::new(path))
    }

    /// Whether a handler exists for `path`'s extension
    pub fn supports(&self, path: &Path) -> bool {
        self.constructors
            .contains_key(FileHandle::new(path).extension())
    }

    /// Known extensions, sorted
    pub fn extensions(&self) -> Vec<&str> {
        let mut extensions: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        extensions.sort_unstable();
        extensions
    }

    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("extensions", &self.extensions())
            .finish()
    }
}
