//! Offline decoding of cooked Unreal Engine package assets and the
//! inheritance-aware property resolution the wiki pipeline is built on.
//!
//! Library boundary only: no CLI, no network surface, no asset writing.

pub mod hierarchy;
pub mod loader;
pub mod package;
pub mod properties;
pub mod proxy;
pub mod stream;

mod error;
pub use error::Error;

pub use hierarchy::ClassHierarchy;
pub use loader::{AssetLoader, AssetSource, DirSource};
pub use package::{ObjectIndex, Package};
pub use properties::{Property, PropertyTable, Value};
pub use proxy::{build_proxy, gather_properties, Proxy};
pub use stream::{ByteStream, StripDataFlags};
