//! Class-specific trailing payloads.
//!
//! Some classes serialize raw binary data after their property table. The
//! decoders live in a fixed class-name registry consulted once per export;
//! classes without an entry have no trailing payload.

use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::package::{NameRef, NameTable, SENTINEL_NONE};
use crate::stream::{ByteStream, StripDataFlags};
use crate::Error;

/// Size of one serialized instance transform, written by the engine ahead
/// of the data as a layout guard.
const INSTANCE_STRUCT_SIZE: u32 = 80;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ExtraData {
    /// Placement origins of an instanced static mesh component, one per
    /// serialized instance. Scale and rotation are discarded.
    InstancedStaticMesh { visible_instances: Vec<(f32, f32, f32)> },
    /// Static switch parameter overrides of a material instance. Only
    /// parameters with the override bit set are kept.
    MaterialInstance { static_params: HashMap<String, bool> },
}

pub(crate) fn decode(
    class_name: &str,
    stream: &mut ByteStream,
    names: &NameTable,
) -> Result<Option<ExtraData>, Error> {
    match class_name {
        "HierarchicalInstancedStaticMeshComponent" => {
            decode_instanced_static_mesh(stream).map(Some)
        }
        "MaterialInstanceConstant" => decode_material_instance(stream, names).map(Some),
        _ => Ok(None),
    }
}

fn decode_instanced_static_mesh(stream: &mut ByteStream) -> Result<ExtraData, Error> {
    let lod_count = stream.read_u32()?;

    for _ in 0..lod_count {
        let strip_flags = StripDataFlags::read(stream)?;

        // Light and shadow map references
        if !strip_flags.is_stripped_for_server() {
            stream.skip(8)?;
        }

        // Vertex colorization data
        if !strip_flags.is_class_data_stripped(1) {
            let has_color_data = stream.read_bool8()?;
            if has_color_data {
                let color_strip = StripDataFlags::read(stream)?;
                stream.skip(4)?;
                let color_num = stream.read_u32()?;

                if color_num > 0 && !color_strip.is_stripped_for_server() {
                    stream.skip(4 * color_num as usize)?;
                    stream.skip(8)?;
                }
            }
        }

        // Painted vertices
        if !strip_flags.is_stripped_for_editor() {
            let paint_count = stream.read_u32()?;
            for _ in 0..paint_count {
                stream.skip(3 * 4 + 4 * 4 + 1)?;
            }
        }
    }

    // The engine writes the struct size ahead of the dump to refuse assets
    // whose instance layout has changed.
    let struct_size = stream.read_u32()?;
    if struct_size != INSTANCE_STRUCT_SIZE {
        return Err(Error::Format(format!(
            "instance struct size {struct_size}, expected {INSTANCE_STRUCT_SIZE}"
        )));
    }

    let num_instances = stream.read_u32()?;
    let mut visible_instances = Vec::with_capacity(
        stream.capacity_hint(num_instances as usize, INSTANCE_STRUCT_SIZE as usize),
    );
    for _ in 0..num_instances {
        // Each instance is a 4x4 matrix whose last row holds the origin.
        stream.skip(4 * 3 * 4)?;
        let x = stream.read_f32()?;
        let y = stream.read_f32()?;
        let z = stream.read_f32()?;
        stream.skip(4)?;
        // UV biases, removed in later engine releases.
        stream.skip(16)?;

        visible_instances.push((x, y, z));
    }

    Ok(ExtraData::InstancedStaticMesh { visible_instances })
}

fn decode_material_instance(
    stream: &mut ByteStream,
    names: &NameTable,
) -> Result<ExtraData, Error> {
    let num = stream.read_u32()?;
    let mut static_params = HashMap::new();
    for _ in 0..num {
        let name = names.resolve(NameRef::read(stream)?)?;
        if name == SENTINEL_NONE {
            return Err(Error::Format(
                "material static parameter named 'None'".to_owned(),
            ));
        }
        let value = stream.read_bool32()?;
        let overridden = stream.read_bool32()?;
        // GUID
        stream.skip(16)?;

        if overridden {
            static_params.insert(name, value);
        }
    }

    Ok(ExtraData::MaterialInstance { static_params })
}
