//! Package decoding and the second-pass reference linker.
//!
//! Parsing is two-phase. [`Package::decode`] reads the Name/Import/Export
//! tables and every export's property stream without resolving any object
//! reference; [`Package::link`] then resolves indices to fullnames and
//! derives each import's target package path from its outer chain. Forward
//! references (an export pointing at a later export, an import satisfied by
//! a package not yet loaded) are routine and never constrain decode order.
//! Linking never loads other packages; only the loader does.

use bitflags::bitflags;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::properties::PropertyTable;
use crate::stream::ByteStream;
use crate::Error;

mod extras;
pub use extras::ExtraData;

/// Tag identifying a cooked package file.
pub const PACKAGE_FILE_TAG: u32 = 0x9E2A_83C1;
/// The single serialization version this crate understands.
pub const PACKAGE_FILE_VERSION: u32 = 5;

pub(crate) const SENTINEL_NONE: &str = "None";

/// Reference into a package's name table: index plus a numeric
/// disambiguation suffix (0 means the bare name, k renders as `Name_{k-1}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameRef {
    pub index: u32,
    pub suffix: u32,
}

impl NameRef {
    pub(crate) fn read(stream: &mut ByteStream) -> Result<Self, Error> {
        Ok(Self {
            index: stream.read_u32()?,
            suffix: stream.read_u32()?,
        })
    }
}

/// Ordered interned strings of a package.
#[derive(Debug, Clone, Default)]
pub struct NameTable {
    entries: Vec<String>,
}

impl NameTable {
    pub(crate) fn decode(stream: &mut ByteStream) -> Result<Self, Error> {
        let count = stream.read_u32()? as usize;
        // Each entry is at least a length prefix; oversized counts must not
        // allocate ahead of what the buffer can hold.
        let mut entries = Vec::with_capacity(stream.capacity_hint(count, 4));
        for _ in 0..count {
            entries.push(stream.read_string()?);
        }
        Ok(Self { entries })
    }

    pub fn resolve(&self, name: NameRef) -> Result<String, Error> {
        let base = self.entries.get(name.index as usize).ok_or_else(|| {
            Error::Format(format!(
                "name index {} out of range (table holds {})",
                name.index,
                self.entries.len()
            ))
        })?;
        Ok(if name.suffix == 0 {
            base.clone()
        } else {
            format!("{base}_{}", name.suffix - 1)
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Signed package-object index: positive selects an export, negative an
/// import, zero is null. This is the engine's own on-disk convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct ObjectIndex(pub i32);

impl ObjectIndex {
    pub const NULL: ObjectIndex = ObjectIndex(0);

    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Export-table slot, if this index selects a local export.
    pub fn export(self) -> Option<usize> {
        (self.0 > 0).then(|| self.0 as usize - 1)
    }

    /// Import-table slot, if this index selects an import.
    pub fn import(self) -> Option<usize> {
        (self.0 < 0).then(|| -(self.0 as i64) as usize - 1)
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ObjectFlags: u32 {
        const PUBLIC = 1 << 0;
        const STANDALONE = 1 << 1;
        const TRANSACTIONAL = 1 << 3;
        const CLASS_DEFAULT_OBJECT = 1 << 4;
        const ARCHETYPE = 1 << 5;
    }
}

/// Reference to an entity defined in a different package.
#[derive(Debug, Clone)]
pub struct Import {
    pub class_package: String,
    pub class_name: String,
    pub outer: ObjectIndex,
    pub object_name: String,

    // Filled by the link pass.
    pub fullname: String,
    /// Canonical path of the package this import points into. `None` for
    /// script-package roots that have no backing asset.
    pub package_path: Option<String>,
}

/// An entity defined within this package.
#[derive(Debug, Clone)]
pub struct Export {
    pub class: ObjectIndex,
    pub outer: ObjectIndex,
    pub object_name: String,
    pub flags: ObjectFlags,
    pub serial_size: u32,
    pub serial_offset: u32,

    pub properties: PropertyTable,
    /// Class-specific trailing payload, when the class is in the registry.
    pub extras: Option<ExtraData>,

    // Filled by the link pass.
    pub fullname: String,
    pub class_fullname: Option<String>,
}

/// A resolved object reference within one package.
#[derive(Debug, Clone, Copy)]
pub enum ObjectRef<'a> {
    Import(&'a Import),
    Export(&'a Export),
}

impl<'a> ObjectRef<'a> {
    pub fn fullname(&self) -> &'a str {
        match self {
            Self::Import(i) => &i.fullname,
            Self::Export(e) => &e.fullname,
        }
    }

    pub fn object_name(&self) -> &'a str {
        match self {
            Self::Import(i) => &i.object_name,
            Self::Export(e) => &e.object_name,
        }
    }
}

/// A `class -> parent class` edge discovered while linking a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassEdge {
    pub class: String,
    pub parent: String,
}

/// One parsed binary unit: Name/Import/Export tables plus per-export
/// property tables and optional trailing payloads.
#[derive(Debug, Clone)]
pub struct Package {
    pub path: String,
    pub names: NameTable,
    pub imports: Vec<Import>,
    pub exports: Vec<Export>,
}

impl Package {
    /// Raw decode: tables and property streams, references unresolved.
    pub(crate) fn decode(path: &str, data: Vec<u8>) -> Result<Self, Error> {
        let mut stream = ByteStream::new(data);

        let tag = stream.read_u32()?;
        if tag != PACKAGE_FILE_TAG {
            return Err(Error::Format(format!("bad package tag {tag:#010x}")));
        }
        let version = stream.read_u32()?;
        if version != PACKAGE_FILE_VERSION {
            return Err(Error::Load(format!(
                "unsupported package version {version} (expected {PACKAGE_FILE_VERSION})"
            )));
        }

        let names = NameTable::decode(&mut stream)?;

        let import_count = stream.read_u32()? as usize;
        let mut imports = Vec::with_capacity(stream.capacity_hint(import_count, 28));
        for _ in 0..import_count {
            imports.push(Import {
                class_package: names.resolve(NameRef::read(&mut stream)?)?,
                class_name: names.resolve(NameRef::read(&mut stream)?)?,
                outer: ObjectIndex(stream.read_i32()?),
                object_name: names.resolve(NameRef::read(&mut stream)?)?,
                fullname: String::new(),
                package_path: None,
            });
        }

        let export_count = stream.read_u32()? as usize;
        let mut exports = Vec::with_capacity(stream.capacity_hint(export_count, 28));
        for _ in 0..export_count {
            exports.push(Export {
                class: ObjectIndex(stream.read_i32()?),
                outer: ObjectIndex(stream.read_i32()?),
                object_name: names.resolve(NameRef::read(&mut stream)?)?,
                flags: ObjectFlags::from_bits_retain(stream.read_u32()?),
                serial_size: stream.read_u32()?,
                serial_offset: stream.read_u32()?,
                properties: PropertyTable::default(),
                extras: None,
                fullname: String::new(),
                class_fullname: None,
            });
        }

        let mut package = Self {
            path: path.to_owned(),
            names,
            imports,
            exports,
        };
        package.decode_export_data(&mut stream)?;
        Ok(package)
    }

    fn decode_export_data(&mut self, stream: &mut ByteStream) -> Result<(), Error> {
        for i in 0..self.exports.len() {
            let (offset, size) = {
                let e = &self.exports[i];
                (e.serial_offset as usize, e.serial_size as usize)
            };
            let class_name = self.object_name_of(self.exports[i].class)?;
            stream.set_offset(offset)?;

            let properties = PropertyTable::decode(stream, &self.names)?;
            let extras = match class_name.as_deref() {
                Some(name) => extras::decode(name, stream, &self.names)?,
                None => None,
            };

            let end = offset + size;
            let consumed = stream.offset();
            if consumed > end {
                return Err(Error::Format(format!(
                    "export '{}' overran its serial range by {} bytes",
                    self.exports[i].object_name,
                    consumed - end
                )));
            }
            if consumed < end {
                log::debug!(
                    "export '{}' left {} trailing bytes undecoded",
                    self.exports[i].object_name,
                    end - consumed
                );
            }

            let e = &mut self.exports[i];
            e.properties = properties;
            e.extras = extras;
        }
        Ok(())
    }

    /// Object name behind an index, resolvable before linking.
    fn object_name_of(&self, index: ObjectIndex) -> Result<Option<String>, Error> {
        if index.is_null() {
            return Ok(None);
        }
        if let Some(slot) = index.export() {
            let export = self.exports.get(slot).ok_or_else(|| {
                Error::Format(format!("export index {slot} out of range"))
            })?;
            return Ok(Some(export.object_name.clone()));
        }
        let slot = index.import().unwrap();
        let import = self.imports.get(slot).ok_or_else(|| {
            Error::Format(format!("import index {slot} out of range"))
        })?;
        Ok(Some(import.object_name.clone()))
    }

    /// Link pass: resolves import outer chains to canonical package paths,
    /// assigns fullnames, and reports discovered class-definition edges.
    ///
    /// An export establishes a class definition when its object name ends in
    /// `_C`; its parent class is its own class reference. Default objects
    /// are instances of their class, never definitions.
    pub(crate) fn link(&mut self) -> Result<Vec<ClassEdge>, Error> {
        for i in 0..self.imports.len() {
            let (fullname, package_path) = self.resolve_import_path(i)?;
            let import = &mut self.imports[i];
            import.fullname = fullname;
            import.package_path = package_path;
        }

        for export in &mut self.exports {
            export.fullname = format!("{}.{}", self.path, export.object_name);
        }
        for i in 0..self.exports.len() {
            let class_fullname = match self.resolve_object(self.exports[i].class)? {
                Some(obj) => Some(obj.fullname().to_owned()),
                None => None,
            };
            self.exports[i].class_fullname = class_fullname;
        }

        let mut edges = Vec::new();
        for export in &self.exports {
            if !export.object_name.ends_with("_C") {
                continue;
            }
            if export.flags.contains(ObjectFlags::CLASS_DEFAULT_OBJECT)
                || export.object_name.starts_with("Default__")
            {
                continue;
            }
            if let Some(parent) = &export.class_fullname {
                edges.push(ClassEdge {
                    class: export.fullname.clone(),
                    parent: parent.clone(),
                });
            }
        }
        Ok(edges)
    }

    /// Walks an import's outer chain to its outermost package entry.
    fn resolve_import_path(&self, slot: usize) -> Result<(String, Option<String>), Error> {
        let import = &self.imports[slot];
        if import.outer.is_null() {
            // Top-level entry; a `Package`-class import names the package
            // itself and anchors the outer chains of its objects.
            let path = (import.class_name == "Package").then(|| import.object_name.clone());
            return Ok((import.object_name.clone(), path));
        }

        let mut current = import.outer;
        // Bounded walk; a longer chain necessarily revisits an entry.
        for _ in 0..=self.imports.len() {
            let outer_slot = current.import().ok_or_else(|| {
                Error::Format(format!(
                    "import '{}' has a non-import outer reference",
                    import.object_name
                ))
            })?;
            let outer = self.imports.get(outer_slot).ok_or_else(|| {
                Error::Format(format!("import outer index {outer_slot} out of range"))
            })?;
            if outer.outer.is_null() {
                let path = outer.object_name.clone();
                return Ok((format!("{path}.{}", import.object_name), Some(path)));
            }
            current = outer.outer;
        }
        Err(Error::Format(format!(
            "cyclic outer chain on import '{}'",
            import.object_name
        )))
    }

    /// Resolves a signed object index within this package.
    ///
    /// `Ok(None)` for null; out-of-range indices are a format violation.
    pub fn resolve_object(&self, index: ObjectIndex) -> Result<Option<ObjectRef<'_>>, Error> {
        if index.is_null() {
            return Ok(None);
        }
        if let Some(slot) = index.export() {
            return self
                .exports
                .get(slot)
                .map(|e| Some(ObjectRef::Export(e)))
                .ok_or_else(|| {
                    Error::Format(format!(
                        "export index {slot} out of range (table holds {})",
                        self.exports.len()
                    ))
                });
        }
        let slot = index.import().unwrap();
        self.imports
            .get(slot)
            .map(|i| Some(ObjectRef::Import(i)))
            .ok_or_else(|| {
                Error::Format(format!(
                    "import index {slot} out of range (table holds {})",
                    self.imports.len()
                ))
            })
    }

    /// The export holding this package's default property values.
    pub fn default_export(&self) -> Option<&Export> {
        self.exports
            .iter()
            .find(|e| e.flags.contains(ObjectFlags::CLASS_DEFAULT_OBJECT))
            .or_else(|| {
                self.exports
                    .iter()
                    .find(|e| e.object_name.starts_with("Default__"))
            })
            .or_else(|| self.exports.first())
    }

    pub fn export_named(&self, name: &str) -> Option<&Export> {
        self.exports.iter().find(|e| e.object_name == name)
    }
}
