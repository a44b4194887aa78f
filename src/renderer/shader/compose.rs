use std::{borrow::Cow, collections::BTreeSet, fmt::Write as _};

use super::ShaderFeature;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gate {
    Always,
    If(ShaderFeature),
    Unless(ShaderFeature),
}
impl Gate {
    pub fn allows(&self, features: &BTreeSet<ShaderFeature>) -> bool {
        match self {
            Gate::Always => true,
            Gate::If(feature) => features.contains(feature),
            Gate::Unless(feature) => !features.contains(feature),
        }
    }
}

/// One `(name, type, gate)` row of a declaration table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub name: Cow<'static, str>,
    pub ty: Cow<'static, str>,
    /// fixed `@location` for stage inputs and outputs
    pub location: Option<u32>,
    pub gate: Gate,
}
impl Declaration {
    pub const fn new(name: &'static str, ty: &'static str) -> Self {
        Self {
            name: Cow::Borrowed(name),
            ty: Cow::Borrowed(ty),
            location: None,
            gate: Gate::Always,
        }
    }

    pub fn at(mut self, location: u32) -> Self {
        self.location = Some(location);
        self
    }

    pub fn gated(mut self, gate: Gate) -> Self {
        self.gate = gate;
        self
    }
}

/// A block of source included when its gate allows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snippet {
    pub code: Cow<'static, str>,
    pub gate: Gate,
}
impl Snippet {
    pub fn always(code: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code: code.into(),
            gate: Gate::Always,
        }
    }

    pub fn gated(code: impl Into<Cow<'static, str>>, gate: Gate) -> Self {
        Self {
            code: code.into(),
            gate,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}
impl ShaderStage {
    pub fn entry_point(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vs_main",
            ShaderStage::Fragment => "fs_main",
        }
    }

    /// Bind group holding this stage's uniforms and resources.
    pub fn bind_group(self) -> u32 {
        match self {
            ShaderStage::Vertex => 0,
            ShaderStage::Fragment => 1,
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "Vertex",
            ShaderStage::Fragment => "Fragment",
        }
    }
}

/// Unfiltered declaration tables for one shader kind.
#[derive(Debug, Clone)]
pub struct ShaderTables {
    pub stage: ShaderStage,
    pub uniforms: Vec<Declaration>,
    pub bindings: Vec<Declaration>,
    pub inputs: Vec<Declaration>,
    pub outputs: Vec<Declaration>,
    pub functions: Vec<Snippet>,
    pub main: Vec<Snippet>,
}
impl ShaderTables {
    pub fn new(stage: ShaderStage) -> Self {
        Self {
            stage,
            uniforms: vec![],
            bindings: vec![],
            inputs: vec![],
            outputs: vec![],
            functions: vec![],
            main: vec![],
        }
    }

    pub fn compose(&self, features: &BTreeSet<ShaderFeature>) -> ShaderProgram {
        let declarations = |rows: &[Declaration]| -> Vec<Declaration> {
            rows.iter().filter(|row| row.gate.allows(features)).cloned().collect()
        };
        let snippets = |rows: &[Snippet]| -> Vec<Cow<'static, str>> {
            rows.iter()
                .filter(|row| row.gate.allows(features))
                .map(|row| row.code.clone())
                .collect()
        };
        ShaderProgram {
            stage: self.stage,
            uniforms: declarations(&self.uniforms),
            bindings: declarations(&self.bindings),
            inputs: declarations(&self.inputs),
            outputs: declarations(&self.outputs),
            functions: snippets(&self.functions),
            main: snippets(&self.main),
        }
    }
}

/// Feature-filtered program, independent of the target shading language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderProgram {
    pub stage: ShaderStage,
    pub uniforms: Vec<Declaration>,
    pub bindings: Vec<Declaration>,
    pub inputs: Vec<Declaration>,
    pub outputs: Vec<Declaration>,
    pub functions: Vec<Cow<'static, str>>,
    pub main: Vec<Cow<'static, str>>,
}
impl ShaderProgram {
    pub fn has_input(&self, name: &str) -> bool {
        self.inputs.iter().any(|d| d.name == name)
    }

    pub fn has_output(&self, name: &str) -> bool {
        self.outputs.iter().any(|d| d.name == name)
    }

    pub fn has_binding(&self, name: &str) -> bool {
        self.bindings.iter().any(|d| d.name == name)
    }

    /// Binding index of a resource; the uniform block always takes binding 0.
    pub fn binding_index(&self, name: &str) -> Option<u32> {
        self.bindings.iter().position(|d| d.name == name).map(|i| i as u32 + 1)
    }

    pub fn to_wgsl(&self) -> String {
        let prefix = self.stage.prefix();
        let group = self.stage.bind_group();
        let mut src = String::new();

        if !self.uniforms.is_empty() {
            let _ = writeln!(src, "struct {prefix}Uniforms {{");
            for u in &self.uniforms {
                let _ = writeln!(src, "    {}: {},", u.name, u.ty);
            }
            src.push_str("};\n\n");
            let _ = writeln!(src, "@group({group}) @binding(0) var<uniform> u: {prefix}Uniforms;");
        }
        for (i, b) in self.bindings.iter().enumerate() {
            let _ = writeln!(src, "@group({group}) @binding({}) var {}: {};", i + 1, b.name, b.ty);
        }
        src.push('\n');

        let _ = writeln!(src, "struct {prefix}Input {{");
        for input in &self.inputs {
            let _ = writeln!(src, "    @location({}) {}: {},", input.location.unwrap_or(0), input.name, input.ty);
        }
        src.push_str("};\n\n");

        let _ = writeln!(src, "struct {prefix}Output {{");
        if self.stage == ShaderStage::Vertex {
            src.push_str("    @builtin(position) clip_position: vec4<f32>,\n");
        }
        for output in &self.outputs {
            let _ = writeln!(src, "    @location({}) {}: {},", output.location.unwrap_or(0), output.name, output.ty);
        }
        src.push_str("};\n");

        for function in &self.functions {
            src.push('\n');
            src.push_str(function.trim_matches('\n'));
            src.push('\n');
        }

        let attribute = match self.stage {
            ShaderStage::Vertex => "@vertex",
            ShaderStage::Fragment => "@fragment",
        };
        let _ = writeln!(src, "\n{attribute}");
        let _ = writeln!(
            src,
            "fn {}(input: {prefix}Input) -> {prefix}Output {{",
            self.stage.entry_point()
        );
        let _ = writeln!(src, "    var output: {prefix}Output;");
        for block in &self.main {
            for line in block.trim_matches('\n').lines() {
                if line.trim().is_empty() {
                    src.push('\n');
                } else {
                    let _ = writeln!(src, "    {line}");
                }
            }
        }
        src.push_str("    return output;\n}\n");
        src
    }
}
