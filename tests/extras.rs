mod common;

use common::{MemSource, PackageBuilder};
use uerip::package::ExtraData;
use uerip::{AssetLoader, ClassHierarchy, Error};

fn w32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn wf32(buf: &mut Vec<u8>, v: f32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn instance(buf: &mut Vec<u8>, origin: (f32, f32, f32)) {
    buf.extend_from_slice(&[0u8; 48]); // rotation/scale rows
    wf32(buf, origin.0);
    wf32(buf, origin.1);
    wf32(buf, origin.2);
    buf.extend_from_slice(&[0u8; 4]);
    buf.extend_from_slice(&[0u8; 16]); // UV biases
}

fn hism_package(extra: Vec<u8>) -> Vec<u8> {
    let mut b = PackageBuilder::new();
    let pkg = b.import("/Script/CoreUObject", "Package", "/Script/Engine");
    let class = b.import_in(
        "/Script/CoreUObject",
        "Class",
        pkg,
        "HierarchicalInstancedStaticMeshComponent",
    );
    b.export_with_extra("MeshInstances", class, 0, Vec::new(), extra);
    b.build()
}

fn load(path: &str, bytes: Vec<u8>) -> Result<ExtraData, Error> {
    let mut source = MemSource::new();
    source.add(path, bytes);
    let mut loader = AssetLoader::new(source, ClassHierarchy::new());
    let package = loader.load(path)?;
    Ok(package.exports[0].extras.clone().expect("extras expected"))
}

#[test]
fn instanced_mesh_origins_full_editor_variant() {
    let mut extra = Vec::new();
    w32(&mut extra, 1); // LOD count
    extra.extend_from_slice(&[0x00, 0x00]); // nothing stripped
    extra.extend_from_slice(&[0u8; 8]); // light/shadow map refs
    extra.push(1); // has color data
    extra.extend_from_slice(&[0x00, 0x00]);
    extra.extend_from_slice(&[0u8; 4]);
    w32(&mut extra, 2); // color entries
    extra.extend_from_slice(&[0u8; 4 * 2 + 8]);
    w32(&mut extra, 1); // painted vertices
    extra.extend_from_slice(&[0u8; 29]);

    w32(&mut extra, 80);
    w32(&mut extra, 2);
    instance(&mut extra, (1.0, 2.0, 3.0));
    instance(&mut extra, (-4.0, 0.5, 9.0));

    let extras = load("/Game/Maps/Spot", hism_package(extra)).unwrap();
    assert_eq!(
        extras,
        ExtraData::InstancedStaticMesh {
            visible_instances: vec![(1.0, 2.0, 3.0), (-4.0, 0.5, 9.0)],
        }
    );
}

#[test]
fn instanced_mesh_origins_server_stripped_variant() {
    // Server build: lightmaps, color data and painted vertices all absent.
    let mut extra = Vec::new();
    w32(&mut extra, 1);
    extra.extend_from_slice(&[0x03, 0x02]);

    w32(&mut extra, 80);
    w32(&mut extra, 2);
    instance(&mut extra, (1.0, 2.0, 3.0));
    instance(&mut extra, (-4.0, 0.5, 9.0));

    let extras = load("/Game/Maps/Spot", hism_package(extra)).unwrap();
    assert_eq!(
        extras,
        ExtraData::InstancedStaticMesh {
            visible_instances: vec![(1.0, 2.0, 3.0), (-4.0, 0.5, 9.0)],
        }
    );
}

#[test]
fn instance_layout_guard_rejects_changed_struct_size() {
    let mut extra = Vec::new();
    w32(&mut extra, 0); // no LODs
    w32(&mut extra, 64); // wrong struct size
    w32(&mut extra, 0);

    assert!(matches!(
        load("/Game/Maps/Spot", hism_package(extra)),
        Err(Error::Format(_))
    ));
}

#[test]
fn material_instance_keeps_only_overridden_static_params() {
    let mut b = PackageBuilder::new();
    let pkg = b.import("/Script/CoreUObject", "Package", "/Script/Engine");
    let class = b.import_in("/Script/CoreUObject", "Class", pkg, "MaterialInstanceConstant");

    let glow = b.intern("bUseGlow");
    let alt = b.intern("bAltPalette");
    let dark = b.intern("bDarken");

    let mut extra = Vec::new();
    w32(&mut extra, 3);
    for (name, value, overridden) in [(glow, 1u32, 1u32), (alt, 1, 0), (dark, 0, 1)] {
        w32(&mut extra, name);
        w32(&mut extra, 0); // name suffix
        w32(&mut extra, value);
        w32(&mut extra, overridden);
        extra.extend_from_slice(&[0u8; 16]); // GUID
    }

    b.export_with_extra("Material", class, 0, Vec::new(), extra);
    let mut source = MemSource::new();
    source.add("/Game/Materials/Wall", b.build());
    let mut loader = AssetLoader::new(source, ClassHierarchy::new());
    let package = loader.load("/Game/Materials/Wall").unwrap();

    let ExtraData::MaterialInstance { static_params } =
        package.exports[0].extras.clone().expect("extras expected")
    else {
        panic!("wrong extra kind");
    };
    assert_eq!(static_params.len(), 2);
    assert_eq!(static_params.get("bUseGlow"), Some(&true));
    assert_eq!(static_params.get("bDarken"), Some(&false));
    assert!(!static_params.contains_key("bAltPalette"));
}
