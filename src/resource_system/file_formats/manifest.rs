// On-disk model manifest: a JSON document next to two binary sidecars holding
// the interleaved vertex data and the u16 index data.

use serde::{Deserialize, Serialize};

use super::modelspec::{
    BoneSpec, Bounds, CameraSpec, DrawGroup, GeometrySpec, MaterialColorSpec, MaterialSpec,
    ModelSpec, SequenceSpec, TextureTransformSpec, TextureWeightSpec,
};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ModelManifest {
    pub name: String,
    /// path of the vertex sidecar, relative to the manifest
    pub vertex_buffer: String,
    /// path of the index sidecar, relative to the manifest
    pub index_buffer: String,
    pub groups: Vec<DrawGroup>,
    #[serde(default)]
    pub bounds: Bounds,
    #[serde(default)]
    pub materials: Vec<MaterialSpec>,
    #[serde(default)]
    pub bones: Vec<BoneSpec>,
    #[serde(default)]
    pub cameras: Vec<CameraSpec>,
    #[serde(default)]
    pub loops: Vec<u32>,
    #[serde(default)]
    pub sequences: Vec<SequenceSpec>,
    #[serde(default)]
    pub texture_weights: Vec<TextureWeightSpec>,
    #[serde(default)]
    pub texture_transforms: Vec<TextureTransformSpec>,
    #[serde(default)]
    pub material_colors: Vec<MaterialColorSpec>,
    #[serde(default)]
    pub skinned: bool,
}
impl ModelManifest {
    pub fn into_spec(self, vertex_buffer: Vec<u8>, index_buffer: Vec<u8>) -> ModelSpec {
        ModelSpec {
            name: self.name,
            geometry: GeometrySpec {
                vertex_buffer,
                index_buffer,
                groups: self.groups,
            },
            bounds: self.bounds,
            materials: self.materials,
            bones: self.bones,
            cameras: self.cameras,
            loops: self.loops,
            sequences: self.sequences,
            texture_weights: self.texture_weights,
            texture_transforms: self.texture_transforms,
            material_colors: self.material_colors,
            skinned: self.skinned,
        }
    }
}

/// Resolves a sidecar path against the directory of the manifest that names it.
pub fn sidecar_path(manifest_path: &str, sidecar: &str) -> String {
    match manifest_path.rfind('/') {
        Some(pos) => format!("{}/{}", &manifest_path[..pos], sidecar),
        None => sidecar.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sidecars_resolve_next_to_manifest() {
        assert_eq!(sidecar_path("creature/wolf/wolf.json", "wolf.vtx"), "creature/wolf/wolf.vtx");
        assert_eq!(sidecar_path("wolf.json", "wolf.vtx"), "wolf.vtx");
    }

    #[test]
    fn minimal_manifest_parses_with_defaults() {
        let json = r#"{
            "name": "box",
            "vertex_buffer": "box.vtx",
            "index_buffer": "box.idx",
            "groups": [{ "start": 0, "count": 36, "material_index": 0 }],
            "materials": [{ "blend": 2, "vertex_shader": 0, "fragment_shader": 1 }],
            "sequences": [{ "id": 0, "duration": 1000 }]
        }"#;
        let manifest: ModelManifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.groups[0].count, 36);
        assert!(manifest.sequences[0].looping);
        assert!(!manifest.skinned);

        let spec = manifest.into_spec(vec![0; 48], vec![0; 2]);
        assert_eq!(spec.name, "box");
        assert_eq!(spec.geometry.vertex_buffer.len(), 48);
        assert_eq!(spec.materials[0].blend, super::super::modelspec::BlendMode::Alpha);
    }
}
