//! Inheritance-aware merged views over export properties.
//!
//! A [`Proxy`] resolves effective field values the way the engine does:
//! nearest class wins, first declaration wins within a table, and a closed
//! per-class schema supplies hard-coded defaults for fields absent from the
//! whole chain. Unmodeled classes fall back to a raw bag with no defaults.
//!
//! Proxies copy every table they consult, so cache eviction can never
//! invalidate one. They are cheap, uncached, and rebuildable at will.

use crate::loader::{AssetLoader, AssetSource};
use crate::package::{Export, Package};
use crate::properties::{PropertyTable, Value};
use crate::Error;

/// Identity of the export a proxy was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSource {
    pub package: String,
    pub name: String,
    pub fullname: String,
    pub class_fullname: String,
}

/// Read-only merged view over an export's own property table and its
/// ancestor classes' defaults, nearest first.
#[derive(Debug, Clone)]
pub struct Proxy {
    source: ExportSource,
    chain: Vec<PropertyTable>,
    defaults: Vec<(&'static str, Value)>,
}

impl Proxy {
    /// Effective value for `name` at `index`.
    ///
    /// The first table in the chain that declares `name` supplies all of
    /// its occurrences; index 0 is the single-value case, higher indices
    /// address the legacy duplicate-name multi-value encoding. Absent from
    /// every table, the schema default applies at index 0 only.
    pub fn get(&self, name: &str, index: usize) -> Option<&Value> {
        for table in &self.chain {
            if table.contains(name) {
                return table.get_all(name).into_iter().nth(index);
            }
        }
        if index == 0 {
            return self
                .defaults
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, v)| v);
        }
        None
    }

    pub fn first(&self, name: &str) -> Option<&Value> {
        self.get(name, 0)
    }

    /// Number of values the winning table declares for `name`
    /// (or 1 for a schema default, 0 when wholly absent).
    pub fn count(&self, name: &str) -> usize {
        for table in &self.chain {
            let n = table.get_all(name).len();
            if n > 0 {
                return n;
            }
        }
        usize::from(self.defaults.iter().any(|(n, _)| *n == name))
    }

    /// True iff the export's own table, not an ancestor's, declares the
    /// field. Distinguishes meaningful leaf instances from abstract base
    /// definitions.
    pub fn has_override(&self, name: &str) -> bool {
        self.chain.first().is_some_and(|t| t.contains(name))
    }

    pub fn get_source(&self) -> &ExportSource {
        &self.source
    }
}

struct ProxySchema {
    class: &'static str,
    defaults: fn() -> Vec<(&'static str, Value)>,
}

/// Closed registry of modeled classes: the nearest class in the ancestor
/// chain with an entry supplies the defaults. Everything else gets the
/// raw-bag fallback.
static SCHEMAS: &[ProxySchema] = &[
    ProxySchema {
        class: "/Script/ShooterGame.PrimalStructure",
        defaults: primal_structure_defaults,
    },
    ProxySchema {
        class: "/Script/ShooterGame.NPCSpawnEntriesContainer",
        defaults: spawn_container_defaults,
    },
];

fn primal_structure_defaults() -> Vec<(&'static str, Value)> {
    vec![
        ("DescriptiveName", Value::Text(String::new())),
        ("DecayDestructionPeriod", Value::Float(0.0)),
        ("DecayDestructionPeriodMultiplier", Value::Float(1.0)),
        ("bAllowStructureColors", Value::Bool(false)),
        ("bUsesPaintingComponent", Value::Bool(false)),
    ]
}

fn spawn_container_defaults() -> Vec<(&'static str, Value)> {
    vec![("MaxDesiredNumEnemiesMultiplier", Value::Float(1.0))]
}

/// Builds the merged property view for a package's default export.
pub fn gather_properties<S: AssetSource>(
    loader: &mut AssetLoader<S>,
    package: &Package,
) -> Result<Proxy, Error> {
    let export = package.default_export().ok_or_else(|| {
        Error::Format(format!("package '{}' has no exports", package.path))
    })?;
    build_proxy(loader, package, export)
}

/// Builds the merged property view for a specific export.
pub fn build_proxy<S: AssetSource>(
    loader: &mut AssetLoader<S>,
    package: &Package,
    export: &Export,
) -> Result<Proxy, Error> {
    let class_fullname = export.class_fullname.clone().ok_or_else(|| {
        Error::Format(format!("export '{}' has no class", export.fullname))
    })?;

    // Ancestor chain, nearest first. A class the hierarchy has not seen yet
    // gets its defining package loaded, which registers its parent edge.
    let mut classes = vec![class_fullname.clone()];
    let mut current = class_fullname.clone();
    loop {
        let mut parent = loader.hierarchy().parent_of(&current).map(str::to_owned);
        if parent.is_none()
            && !loader.hierarchy().contains(&current)
            && !current.starts_with("/Script/")
        {
            if let Some(dot) = current.rfind('.') {
                loader.load(&current[..dot])?;
            }
            parent = loader.hierarchy().parent_of(&current).map(str::to_owned);
        }
        match parent {
            Some(p) => {
                if classes.contains(&p) {
                    return Err(Error::Format(format!(
                        "circular class hierarchy at '{p}'"
                    )));
                }
                current = p.clone();
                classes.push(p);
            }
            None => break,
        }
    }

    let defaults = classes
        .iter()
        .find_map(|class| {
            SCHEMAS
                .iter()
                .find(|schema| schema.class == class.as_str())
                .map(|schema| (schema.defaults)())
        })
        .unwrap_or_default();

    let mut chain = vec![export.properties.clone()];
    for class in &classes {
        // Script classes have no loadable package; their defaults are the
        // schema's concern.
        if class.starts_with("/Script/") {
            continue;
        }
        let Some(dot) = class.rfind('.') else {
            continue;
        };
        let (package_path, basename) = (&class[..dot], &class[dot + 1..]);

        let loaded;
        let defining = if package_path == package.path {
            package
        } else {
            loaded = loader.load(package_path)?;
            &*loaded
        };
        let cdo_name = format!("Default__{basename}");
        let Some(cdo) = defining
            .export_named(&cdo_name)
            .or_else(|| defining.default_export())
        else {
            continue;
        };
        // The export's own table already heads the chain.
        if cdo.fullname == export.fullname {
            continue;
        }
        chain.push(cdo.properties.clone());
    }

    Ok(Proxy {
        source: ExportSource {
            package: package.path.clone(),
            name: export.object_name.clone(),
            fullname: export.fullname.clone(),
            class_fullname,
        },
        chain,
        defaults,
    })
}
