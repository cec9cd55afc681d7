//! Structured kernel composition.
//!
//! A kernel is authored as an explicit input list plus a body, and the
//! builder assembles the full WGSL module around it: the shared float
//! codec, one binding per input, the fullscreen vertex stage, and the
//! pack/unpack wrapper. Splicing strings into an opaque shader template is
//! exactly what this replaces; the input list here is the same list the
//! field uses to build its bind group layout, so the two cannot drift.
//!
//! Inside the body:
//! - `value` is the element's own decoded previous-step value,
//! - `texel` is the element's integer texel coordinate,
//! - each texture input `n` is readable as `n(texel)`,
//! - each vec3/scalar input is in scope under its declared name,
//! - the body must `return` the element's next value.

use crate::codec;

/// Names claimed by the generated module scaffolding.
const RESERVED: &[&str] = &[
    "state_tex",
    "value",
    "texel",
    "params",
    "update",
    "vs_main",
    "fs_main",
    "pack_float",
    "unpack_float",
];

#[derive(Clone)]
pub(crate) enum InputKind {
    /// Sampled packed texture, resolved by name at compute time (another
    /// field's live output or a constant).
    Texture,
    /// vec3 uniform (one 16-byte slot).
    Vec3([f32; 3]),
    /// Scalar uniform (one 16-byte slot, `.x` used).
    Scalar(f32),
}

#[derive(Clone)]
pub(crate) struct Input {
    pub name: String,
    pub kind: InputKind,
}

/// Builds the WGSL module for one field's per-element kernel.
#[derive(Clone, Default)]
pub struct KernelBuilder {
    body: Option<String>,
    inputs: Vec<Input>,
}

impl KernelBuilder {
    /// An identity kernel with no inputs; the body defaults to
    /// `return value;` until [`KernelBuilder::body`] replaces it.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the kernel body (the tail of the generated `update` function).
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Declare a packed-texture input. The name doubles as the registry
    /// name it resolves against and the accessor function in the body.
    pub fn texture(mut self, name: impl Into<String>) -> Self {
        self.push(name.into(), InputKind::Texture);
        self
    }

    /// Declare a vec3 uniform with an initial value.
    pub fn vec3(mut self, name: impl Into<String>, value: [f32; 3]) -> Self {
        self.push(name.into(), InputKind::Vec3(value));
        self
    }

    /// Declare a scalar uniform with an initial value.
    pub fn scalar(mut self, name: impl Into<String>, value: f32) -> Self {
        self.push(name.into(), InputKind::Scalar(value));
        self
    }

    fn push(&mut self, name: String, kind: InputKind) {
        assert!(is_wgsl_ident(&name), "kernel input {name:?} is not a valid identifier");
        assert!(!RESERVED.contains(&name.as_str()), "kernel input {name:?} is reserved");
        assert!(
            self.inputs.iter().all(|i| i.name != name),
            "kernel input {name:?} declared twice"
        );
        self.inputs.push(Input { name, kind });
    }

    pub(crate) fn has_input(&self, name: &str) -> bool {
        self.inputs.iter().any(|i| i.name == name)
    }

    /// Append a texture input after construction; used by engine wiring.
    /// No-op when the name is already declared.
    pub(crate) fn add_texture(&mut self, name: &str) -> bool {
        if self.has_input(name) {
            return false;
        }
        self.push(name.to_owned(), InputKind::Texture);
        true
    }

    /// Declared texture input names, in binding order.
    pub(crate) fn textures(&self) -> impl Iterator<Item = &str> {
        self.inputs.iter().filter_map(|i| match i.kind {
            InputKind::Texture => Some(i.name.as_str()),
            _ => None,
        })
    }

    /// Declared value uniforms in slot order, each widened to one vec4.
    pub(crate) fn values(&self) -> Vec<(String, [f32; 4])> {
        self.inputs
            .iter()
            .filter_map(|i| match i.kind {
                InputKind::Vec3([x, y, z]) => Some((i.name.clone(), [x, y, z, 0.0])),
                InputKind::Scalar(x) => Some((i.name.clone(), [x, 0.0, 0.0, 0.0])),
                InputKind::Texture => None,
            })
            .collect()
    }

    /// Assemble the complete WGSL module.
    pub(crate) fn build_wgsl(&self) -> String {
        let mut src = String::with_capacity(2048);

        src.push_str(codec::WGSL);
        src.push('\n');

        // Binding 0 is always the field's own previous-step texture.
        src.push_str("@group(0) @binding(0) var state_tex: texture_2d<f32>;\n");
        let mut binding = 1u32;
        for name in self.textures() {
            src.push_str(&format!(
                "@group(0) @binding({binding}) var {name}_tex: texture_2d<f32>;\n"
            ));
            binding += 1;
        }

        let values = self.values();
        if !values.is_empty() {
            src.push_str("\nstruct Params {\n");
            for (name, _) in &values {
                src.push_str(&format!("    {name}: vec4<f32>,\n"));
            }
            src.push_str("}\n");
            src.push_str(&format!(
                "@group(0) @binding({binding}) var<uniform> params: Params;\n"
            ));
        }

        src.push('\n');
        for name in self.textures() {
            src.push_str(&format!(
                "fn {name}(texel: vec2<i32>) -> f32 {{\n    \
                 return unpack_float(textureLoad({name}_tex, texel, 0));\n}}\n\n"
            ));
        }

        src.push_str(
            "@vertex\n\
             fn vs_main(@builtin(vertex_index) index: u32) -> @builtin(position) vec4<f32> {\n    \
             let xy = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));\n    \
             return vec4<f32>(xy * 2.0 - 1.0, 0.0, 1.0);\n}\n\n",
        );

        src.push_str("fn update(texel: vec2<i32>, value: f32) -> f32 {\n");
        for input in &self.inputs {
            match input.kind {
                InputKind::Vec3(_) => {
                    src.push_str(&format!("    let {0} = params.{0}.xyz;\n", input.name));
                }
                InputKind::Scalar(_) => {
                    src.push_str(&format!("    let {0} = params.{0}.x;\n", input.name));
                }
                InputKind::Texture => {}
            }
        }
        match &self.body {
            Some(body) => {
                for line in body.lines() {
                    src.push_str("    ");
                    src.push_str(line);
                    src.push('\n');
                }
            }
            None => src.push_str("    return value;\n"),
        }
        src.push_str("}\n\n");

        src.push_str(
            "@fragment\n\
             fn fs_main(@builtin(position) frag: vec4<f32>) -> @location(0) vec4<f32> {\n    \
             let texel = vec2<i32>(frag.xy);\n    \
             let value = unpack_float(textureLoad(state_tex, texel, 0));\n    \
             return pack_float(update(texel, value));\n}\n",
        );

        src
    }
}

fn is_wgsl_ident(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
