use std::{
    borrow::Cow,
    collections::{BTreeSet, HashMap},
    sync::Arc,
};

pub mod compose;
pub mod fog;
pub mod fragment;
pub mod vertex;

use compose::{ShaderProgram, ShaderStage};
use fragment::{fragment_tables, FragmentShaderKind};
use vertex::{vertex_tables, VertexShaderKind};

#[derive(Hash, Eq, PartialEq, Debug, Clone, Copy, Ord, PartialOrd)]
pub enum ShaderFeature {
    Skinning,
    AlphaTest,
    Unlit,
    Unfogged,
}

#[derive(Hash, Eq, PartialEq, Debug, Clone, Copy, Ord, PartialOrd)]
pub enum ShaderKind {
    Vertex(VertexShaderKind),
    Fragment(FragmentShaderKind),
}

#[derive(Hash, Eq, PartialEq, Debug, Clone)]
pub struct VariantKey {
    pub kind: ShaderKind,
    pub features: BTreeSet<ShaderFeature>,
}

#[derive(Debug)]
pub struct ComposedShader {
    pub key: VariantKey,
    pub program: ShaderProgram,
    pub source: String,
}
impl ComposedShader {
    pub fn stage(&self) -> ShaderStage {
        self.program.stage
    }

    pub fn entry_point(&self) -> &'static str {
        self.program.stage.entry_point()
    }

    pub fn module_descriptor(&self) -> wgpu::ShaderModuleDescriptor<'_> {
        wgpu::ShaderModuleDescriptor {
            label: Some(match self.program.stage {
                ShaderStage::Vertex => "Model vertex shader",
                ShaderStage::Fragment => "Model fragment shader",
            }),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(&self.source)),
        }
    }
}

/// Memoizes composed shader variants by kind and enabled features.
#[derive(Default)]
pub struct ShaderCache {
    variants: HashMap<VariantKey, Arc<ComposedShader>>,
}

impl ShaderCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vertex_shader(&mut self, raw: u16, features: &BTreeSet<ShaderFeature>) -> Arc<ComposedShader> {
        let kind = VertexShaderKind::from_raw(raw).unwrap_or_else(|| {
            log::warn!("model: unimplemented vertex shader {raw}, using fallback");
            VertexShaderKind::Unknown
        });
        self.get(ShaderKind::Vertex(kind), features)
    }

    pub fn fragment_shader(&mut self, raw: u16, features: &BTreeSet<ShaderFeature>) -> Arc<ComposedShader> {
        let kind = FragmentShaderKind::from_raw(raw).unwrap_or_else(|| {
            log::warn!("model: unimplemented fragment shader {raw}, using fallback");
            FragmentShaderKind::Unknown
        });
        self.get(ShaderKind::Fragment(kind), features)
    }

    pub fn get(&mut self, kind: ShaderKind, features: &BTreeSet<ShaderFeature>) -> Arc<ComposedShader> {
        let key = VariantKey {
            kind,
            features: features.clone(),
        };
        self.variants
            .entry(key.clone())
            .or_insert_with(|| {
                log::debug!("composing shader variant {:?}", key);
                let tables = match kind {
                    ShaderKind::Vertex(kind) => vertex_tables(kind),
                    ShaderKind::Fragment(kind) => fragment_tables(kind),
                };
                let program = tables.compose(features);
                let source = program.to_wgsl();
                Arc::new(ComposedShader { key, program, source })
            })
            .clone()
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}
