//! Caching asset loader.
//!
//! Resolves asset paths to parsed packages, parsing lazily and caching by
//! canonical path. Packages never hold references to other packages, only
//! signed indices and derived paths, so cyclic cross-package imports are
//! permitted and the cache can be evicted freely.

use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

use crate::hierarchy::ClassHierarchy;
use crate::package::{ObjectIndex, ObjectRef, Package};
use crate::Error;

/// Backing store for asset bytes, keyed by canonical asset path.
pub trait AssetSource {
    fn exists(&self, path: &str) -> bool;
    fn read(&self, path: &str) -> Result<Vec<u8>, Error>;
}

/// Filesystem source mapping `/Game/...` asset paths onto a content root.
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn file_for(&self, path: &str) -> Option<PathBuf> {
        let relative = path.strip_prefix("/Game/")?;
        let mut file = self.root.join(relative);
        file.set_extension("uasset");
        Some(file)
    }
}

impl AssetSource for DirSource {
    fn exists(&self, path: &str) -> bool {
        self.file_for(path).is_some_and(|f| f.is_file())
    }

    fn read(&self, path: &str) -> Result<Vec<u8>, Error> {
        let file = self
            .file_for(path)
            .ok_or_else(|| Error::AssetNotFound(path.to_owned()))?;
        match std::fs::read(file) {
            Ok(bytes) => Ok(bytes),
            // The file can vanish between the existence probe and the read;
            // a missing asset is the routine condition either way.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::AssetNotFound(path.to_owned()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Caching loader over an [`AssetSource`], owning the class hierarchy it
/// feeds as packages link.
///
/// Single-threaded by design: parallel runs shard work across workers,
/// each owning its own loader and hierarchy.
pub struct AssetLoader<S: AssetSource> {
    source: S,
    hierarchy: ClassHierarchy,
    cache: HashMap<String, Rc<Package>>,
    parse_count: u64,
}

impl<S: AssetSource> AssetLoader<S> {
    /// The hierarchy is passed in explicitly so callers control its
    /// lifetime and tests get a fresh, isolated index.
    pub fn new(source: S, hierarchy: ClassHierarchy) -> Self {
        Self {
            source,
            hierarchy,
            cache: HashMap::new(),
            parse_count: 0,
        }
    }

    pub fn hierarchy(&self) -> &ClassHierarchy {
        &self.hierarchy
    }

    pub fn hierarchy_mut(&mut self) -> &mut ClassHierarchy {
        &mut self.hierarchy
    }

    /// Number of raw parses performed, cache hits excluded.
    pub fn parse_count(&self) -> u64 {
        self.parse_count
    }

    /// Loads a package, parsing and linking it on first request.
    pub fn load(&mut self, path: &str) -> Result<Rc<Package>, Error> {
        let path = clean_path(path);
        if let Some(package) = self.cache.get(&path) {
            return Ok(Rc::clone(package));
        }
        if !self.source.exists(&path) {
            return Err(Error::AssetNotFound(path));
        }

        let data = self.source.read(&path)?;
        let mut package = Package::decode(&path, data)?;
        let edges = package.link()?;
        self.parse_count += 1;
        self.hierarchy.register_edges(&edges);

        let package = Rc::new(package);
        self.cache.insert(path, Rc::clone(&package));
        Ok(package)
    }

    /// Loads the package an object reference points into.
    ///
    /// This is how one entity's definition reaches another it references,
    /// e.g. a creature reference inside a spawn entry. A null reference or
    /// an import with no backing package path surfaces as
    /// [`Error::AssetNotFound`]; broken references are routine.
    pub fn load_related(
        &mut self,
        package: &Package,
        reference: ObjectIndex,
    ) -> Result<Rc<Package>, Error> {
        let target = match package.resolve_object(reference)? {
            None => {
                return Err(Error::AssetNotFound(format!(
                    "null object reference in {}",
                    package.path
                )))
            }
            Some(ObjectRef::Export(_)) => package.path.clone(),
            Some(ObjectRef::Import(import)) => match &import.package_path {
                Some(path) => path.clone(),
                None => {
                    return Err(Error::AssetNotFound(format!(
                        "import '{}' has no backing package",
                        import.fullname
                    )))
                }
            },
        };
        self.load(&target)
    }

    pub fn cached(&self, path: &str) -> Option<Rc<Package>> {
        self.cache.get(&clean_path(path)).cloned()
    }

    /// Drops a package from the cache; the next load reparses from scratch.
    /// Proxies built from it stay valid, they copy what they need.
    pub fn evict(&mut self, path: &str) -> bool {
        self.cache.remove(&clean_path(path)).is_some()
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

/// Canonicalizes an asset path: strips a trailing extension, collapses
/// repeated slashes, ensures a leading slash.
fn clean_path(path: &str) -> String {
    let path = match path.rfind('.') {
        Some(dot) if !path[dot..].contains('/') => &path[..dot],
        _ => path,
    };
    let mut cleaned = String::with_capacity(path.len() + 1);
    if !path.starts_with('/') {
        cleaned.push('/');
    }
    let mut prev_slash = false;
    for c in path.chars() {
        if c == '/' {
            if prev_slash {
                continue;
            }
            prev_slash = true;
        } else {
            prev_slash = false;
        }
        cleaned.push(c);
    }
    if cleaned.len() > 1 && cleaned.ends_with('/') {
        cleaned.pop();
    }
    cleaned
}

#[cfg(test)]
mod tests {
    use super::clean_path;

    #[test]
    fn path_cleaning() {
        assert_eq!(clean_path("/Game/Foo/Bar.uasset"), "/Game/Foo/Bar");
        assert_eq!(clean_path("/Game//Foo///Bar"), "/Game/Foo/Bar");
        assert_eq!(clean_path("Game/Foo"), "/Game/Foo");
        assert_eq!(clean_path("/Game/Foo/"), "/Game/Foo");
        assert_eq!(clean_path("/Game/Mod.Name/Thing"), "/Game/Mod.Name/Thing");
    }
}
