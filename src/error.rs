use std::fmt::Display;

/// Errors raised while loading and resolving packages.
///
/// `Format` and `Load` abort only the package currently being parsed and
/// never affect sibling packages. `AssetNotFound` is the routine, expected
/// failure for broken references from maps and mods; callers are expected
/// to catch it and continue. `UnknownClass` is raised only by non-safe
/// hierarchy queries.
#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),

    /// Malformed or out-of-range binary data; fatal for this package.
    Format(String),
    /// No resource exists at the requested path.
    AssetNotFound(String),
    /// Resource located but unparseable for a non-format reason,
    /// e.g. an unsupported package version.
    Load(String),
    /// Ancestor query on a class the hierarchy has never seen.
    UnknownClass(String),
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => e.fmt(f),

            Self::Format(reason) => write!(f, "Format violation: {reason}"),
            Self::AssetNotFound(path) => write!(f, "Asset not found: {path}"),
            Self::Load(reason) => write!(f, "Load failed: {reason}"),
            Self::UnknownClass(name) => write!(f, "Unknown class: {name}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
