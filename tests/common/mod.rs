//! Shared test harness: an in-memory asset source and a builder that
//! assembles synthetic package buffers in the on-disk layout.
#![allow(dead_code)]

use std::collections::HashMap;

use uerip::loader::AssetSource;
use uerip::Error;

pub const TAG: u32 = 0x9E2A_83C1;
pub const VERSION: u32 = 5;
pub const CDO_FLAG: u32 = 1 << 4;

#[derive(Default)]
pub struct MemSource {
    files: HashMap<String, Vec<u8>>,
}

impl MemSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, path: &str, bytes: Vec<u8>) {
        self.files.insert(path.to_owned(), bytes);
    }
}

impl AssetSource for MemSource {
    fn exists(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    fn read(&self, path: &str) -> Result<Vec<u8>, Error> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| Error::AssetNotFound(path.to_owned()))
    }
}

/// Property payload spec for [`PackageBuilder`].
#[derive(Clone)]
pub enum Prop {
    Bool(bool),
    Int(i32),
    Float(f32),
    Str(&'static str),
    NameV(&'static str),
    Text(&'static str),
    Byte(u8),
    Enum(&'static str, &'static str),
    Struct(&'static str, Vec<(&'static str, Prop)>),
    Array(&'static str, Vec<Prop>),
    Object(i32),
    /// Arbitrary tag with a raw payload, for forward-compatibility tests.
    Unknown(&'static str, Vec<u8>),
}

struct ExportSpec {
    class: i32,
    outer: i32,
    name_idx: u32,
    flags: u32,
    payload: Vec<u8>,
}

#[derive(Default)]
pub struct PackageBuilder {
    names: Vec<String>,
    imports: Vec<(u32, u32, i32, u32)>,
    exports: Vec<ExportSpec>,
}

fn w32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn wi32(buf: &mut Vec<u8>, v: i32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn wf32(buf: &mut Vec<u8>, v: f32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn wstr(buf: &mut Vec<u8>, s: &str) {
    w32(buf, s.len() as u32);
    buf.extend_from_slice(s.as_bytes());
}

impl PackageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, s: &str) -> u32 {
        if let Some(i) = self.names.iter().position(|n| n == s) {
            return i as u32;
        }
        self.names.push(s.to_owned());
        self.names.len() as u32 - 1
    }

    fn wname(&mut self, buf: &mut Vec<u8>, s: &str) {
        let idx = self.intern(s);
        w32(buf, idx);
        w32(buf, 0);
    }

    /// Top-level import with no outer; returns its signed object index.
    pub fn import(&mut self, class_package: &str, class_name: &str, object_name: &str) -> i32 {
        self.import_in(class_package, class_name, 0, object_name)
    }

    pub fn import_in(
        &mut self,
        class_package: &str,
        class_name: &str,
        outer: i32,
        object_name: &str,
    ) -> i32 {
        let entry = (
            self.intern(class_package),
            self.intern(class_name),
            outer,
            self.intern(object_name),
        );
        self.imports.push(entry);
        -(self.imports.len() as i32)
    }

    /// Export with a property payload; returns its signed object index.
    pub fn export(
        &mut self,
        object_name: &str,
        class: i32,
        flags: u32,
        props: Vec<(&'static str, Prop)>,
    ) -> i32 {
        self.export_with_extra(object_name, class, flags, props, Vec::new())
    }

    /// Export whose property table is followed by raw trailing bytes.
    pub fn export_with_extra(
        &mut self,
        object_name: &str,
        class: i32,
        flags: u32,
        props: Vec<(&'static str, Prop)>,
        extra: Vec<u8>,
    ) -> i32 {
        let name_idx = self.intern(object_name);
        let mut payload = Vec::new();
        self.wprops(&mut payload, &props);
        payload.extend_from_slice(&extra);
        self.exports.push(ExportSpec {
            class,
            outer: 0,
            name_idx,
            flags,
            payload,
        });
        self.exports.len() as i32
    }

    fn wprops(&mut self, buf: &mut Vec<u8>, props: &[(&'static str, Prop)]) {
        for (name, prop) in props {
            self.wname(buf, name);
            match prop {
                // Bool packs its value into the size field.
                Prop::Bool(b) => {
                    self.wname(buf, "BoolProperty");
                    w32(buf, u32::from(*b));
                }
                Prop::Unknown(tag, raw) => {
                    self.wname(buf, tag);
                    w32(buf, raw.len() as u32);
                    buf.extend_from_slice(raw);
                }
                other => {
                    let tag = tag_of(other);
                    self.wname(buf, tag);
                    let mut payload = Vec::new();
                    self.wvalue(&mut payload, other);
                    w32(buf, payload.len() as u32);
                    buf.extend_from_slice(&payload);
                }
            }
        }
        self.wname(buf, "None");
    }

    fn wvalue(&mut self, buf: &mut Vec<u8>, prop: &Prop) {
        match prop {
            // Only reachable as an array element, where booleans take a
            // payload byte instead of the size field.
            Prop::Bool(b) => buf.push(u8::from(*b)),
            Prop::Int(v) => wi32(buf, *v),
            Prop::Float(v) => wf32(buf, *v),
            Prop::Str(s) | Prop::Text(s) => wstr(buf, s),
            Prop::NameV(s) => self.wname(buf, s),
            Prop::Byte(v) => {
                self.wname(buf, "None");
                buf.push(*v);
            }
            Prop::Enum(enum_name, value) => {
                self.wname(buf, enum_name);
                self.wname(buf, value);
            }
            Prop::Struct(struct_type, fields) => {
                self.wname(buf, struct_type);
                self.wprops(buf, fields);
            }
            Prop::Array(inner, elems) => {
                self.wname(buf, inner);
                w32(buf, elems.len() as u32);
                for elem in elems {
                    self.wvalue(buf, elem);
                }
            }
            Prop::Object(index) => wi32(buf, *index),
            Prop::Unknown(_, raw) => buf.extend_from_slice(raw),
        }
    }

    pub fn build(&self) -> Vec<u8> {
        let names_size: usize = 4 + self.names.iter().map(|n| 4 + n.len()).sum::<usize>();
        let tables_end = 8 + names_size + 4 + self.imports.len() * 28 + 4 + self.exports.len() * 28;

        let mut buf = Vec::new();
        w32(&mut buf, TAG);
        w32(&mut buf, VERSION);

        w32(&mut buf, self.names.len() as u32);
        for name in &self.names {
            wstr(&mut buf, name);
        }

        w32(&mut buf, self.imports.len() as u32);
        for (class_package, class_name, outer, object_name) in &self.imports {
            w32(&mut buf, *class_package);
            w32(&mut buf, 0);
            w32(&mut buf, *class_name);
            w32(&mut buf, 0);
            wi32(&mut buf, *outer);
            w32(&mut buf, *object_name);
            w32(&mut buf, 0);
        }

        w32(&mut buf, self.exports.len() as u32);
        let mut offset = tables_end;
        for export in &self.exports {
            wi32(&mut buf, export.class);
            wi32(&mut buf, export.outer);
            w32(&mut buf, export.name_idx);
            w32(&mut buf, 0);
            w32(&mut buf, export.flags);
            w32(&mut buf, export.payload.len() as u32);
            w32(&mut buf, offset as u32);
            offset += export.payload.len();
        }

        for export in &self.exports {
            buf.extend_from_slice(&export.payload);
        }
        buf
    }
}

/// Builds a package defining one blueprint class plus its default export.
///
/// `parent` is `(package path, class name)`; a package path starting with
/// `/Script/` imports the class directly from the script package.
pub fn blueprint_package(
    parent: (&str, &str),
    class_name: &str,
    props: Vec<(&'static str, Prop)>,
) -> Vec<u8> {
    let (parent_pkg, parent_class) = parent;
    let mut b = PackageBuilder::new();
    let pkg_import = b.import("/Script/CoreUObject", "Package", parent_pkg);
    let class_import = b.import_in(
        "/Script/Engine",
        "BlueprintGeneratedClass",
        pkg_import,
        parent_class,
    );
    let class_export = b.export(class_name, class_import, 0, Vec::new());
    b.export(&format!("Default__{class_name}"), class_export, CDO_FLAG, props);
    b.build()
}

fn tag_of(prop: &Prop) -> &'static str {
    match prop {
        Prop::Bool(_) => "BoolProperty",
        Prop::Int(_) => "IntProperty",
        Prop::Float(_) => "FloatProperty",
        Prop::Str(_) => "StrProperty",
        Prop::NameV(_) => "NameProperty",
        Prop::Text(_) => "TextProperty",
        Prop::Byte(_) | Prop::Enum(..) => "ByteProperty",
        Prop::Struct(..) => "StructProperty",
        Prop::Array(..) => "ArrayProperty",
        Prop::Object(_) => "ObjectProperty",
        Prop::Unknown(tag, _) => tag,
    }
}
