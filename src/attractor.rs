//! Cursor-attraction particle simulation built on the engine.
//!
//! Three mutually wired fields hold the x/y/z coordinates of every
//! particle; three constants hold the immutable rest positions. Each axis
//! kernel relaxes its coordinate toward a blend of the rest position and
//! the cursor, weighted by a clamped inverse-cube pull (a stylized force,
//! not physical gravity). Every element updates independently, which is
//! what lets the whole step run as one texel-parallel pass per axis.

use glam::Vec3;

use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::field::{FieldSpec, Seed};
use crate::kernel::KernelBuilder;

/// Force tuning for one axis.
#[derive(Debug, Clone, Copy)]
pub struct AxisParams {
    /// Sign and scale of the pull; negative attracts.
    pub multiplier: f32,
    /// Force constant (the original shaders use gravitational-constant
    /// flavored magnitudes, nothing physical).
    pub g: f32,
    /// Clamp on the blend weight; bounds the near-singular `1/|d|^3` pull
    /// when the cursor sits on top of an element.
    pub max_force: f32,
    /// Per-tick relaxation rate toward the blend target.
    pub lerp_speed: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct AttractorParams {
    pub x: AxisParams,
    pub y: AxisParams,
    pub z: AxisParams,
}

impl Default for AttractorParams {
    /// The per-axis constants of the original shaders; the asymmetry
    /// between axes is deliberate tuning, not an error.
    fn default() -> Self {
        Self {
            x: AxisParams {
                multiplier: -1.0,
                g: 6.67408,
                max_force: 5.0,
                lerp_speed: 0.03,
            },
            y: AxisParams {
                multiplier: -4.0,
                g: 6.674,
                max_force: 6.674,
                lerp_speed: 0.03,
            },
            z: AxisParams {
                multiplier: -1.0,
                g: 6.674,
                max_force: 6.674,
                lerp_speed: 0.03,
            },
        }
    }
}

#[derive(Clone, Copy)]
enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    fn name(self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        }
    }

    fn peers(self) -> [&'static str; 2] {
        match self {
            Axis::X => ["y", "z"],
            Axis::Y => ["x", "z"],
            Axis::Z => ["x", "y"],
        }
    }

    /// The position vector with `value` standing in for this axis and the
    /// two peers sampled from their pre-tick outputs.
    fn position_expr(self) -> &'static str {
        match self {
            Axis::X => "vec3<f32>(value, y(texel), z(texel))",
            Axis::Y => "vec3<f32>(x(texel), value, z(texel))",
            Axis::Z => "vec3<f32>(x(texel), y(texel), value)",
        }
    }
}

fn axis_kernel(axis: Axis, p: &AxisParams) -> KernelBuilder {
    let name = axis.name();
    // `target` is reserved in WGSL, hence `goal`. The distance floor keeps
    // the division defined when the cursor coincides with an element; WGSL
    // does not guarantee an infinity for x / 0.0, so the clamp alone is not
    // enough there.
    let body = format!(
        "let rest = start_{name}(texel);\n\
         let delta = cursor - {pos};\n\
         let dist = max(pow(length(delta), 3.0), 1e-9);\n\
         let force = clamp({mult:?} * {g:?} / dist, -{fmax:?}, {fmax:?});\n\
         let goal = mix(rest, cursor.{name}, force);\n\
         return mix(value, goal, {lerp:?});",
        pos = axis.position_expr(),
        mult = p.multiplier,
        g = p.g,
        fmax = p.max_force,
        lerp = p.lerp_speed,
    );

    KernelBuilder::new()
        .texture(format!("start_{name}"))
        .vec3("cursor", [0.0; 3])
        .body(body)
}

/// Registers the coordinate fields, rest-position constants, and mutual
/// wiring on an engine, and drives them through it afterwards.
pub struct Attractor {
    count: usize,
}

impl Attractor {
    /// `positions` are the rest positions; fields are seeded with them, so
    /// an untouched cloud stays put.
    pub fn build(
        engine: &mut Engine,
        positions: &[Vec3],
        params: AttractorParams,
    ) -> Result<Self> {
        if positions.is_empty() {
            return Err(Error::InvalidCount);
        }

        let xs: Vec<f32> = positions.iter().map(|p| p.x).collect();
        let ys: Vec<f32> = positions.iter().map(|p| p.y).collect();
        let zs: Vec<f32> = positions.iter().map(|p| p.z).collect();

        engine.register_constant("start_x", &xs)?;
        engine.register_constant("start_y", &ys)?;
        engine.register_constant("start_z", &zs)?;

        for (axis, axis_params, seed) in [
            (Axis::X, &params.x, xs.clone()),
            (Axis::Y, &params.y, ys.clone()),
            (Axis::Z, &params.z, zs.clone()),
        ] {
            engine.register_field(
                axis.name(),
                FieldSpec {
                    seed: Seed::Data(seed),
                    kernel: axis_kernel(axis, axis_params),
                },
            )?;
        }

        // Each axis samples both peers' pre-tick outputs.
        for axis in [Axis::X, Axis::Y, Axis::Z] {
            for peer in axis.peers() {
                engine.wire(axis.name(), peer)?;
            }
        }

        log::info!("attractor ready: {} particles", positions.len());
        Ok(Self {
            count: positions.len(),
        })
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Feed the per-tick cursor position to all three axis kernels.
    pub fn set_cursor(&self, engine: &mut Engine, cursor: Vec3) {
        engine.set_vec3("cursor", cursor.to_array());
    }

    /// Debug readback of all particle positions. Blocks on the GPU three
    /// times; never call this per frame outside diagnostics.
    pub fn positions(&self, engine: &Engine) -> Result<Vec<Vec3>> {
        let xs = engine.read("x")?;
        let ys = engine.read("y")?;
        let zs = engine.read("z")?;
        Ok(xs
            .iter()
            .zip(&ys)
            .zip(&zs)
            .map(|((&x, &y), &z)| Vec3::new(x, y, z))
            .collect())
    }
}

/// Evenly spread points on a sphere surface (Fibonacci lattice); the demo
/// seeding, standing in for mesh-derived vertex positions.
pub fn sphere_surface(count: usize, radius: f32) -> Vec<Vec3> {
    let golden_angle = std::f32::consts::PI * (3.0 - 5.0f32.sqrt());
    (0..count)
        .map(|i| {
            let y = 1.0 - 2.0 * (i as f32 + 0.5) / count as f32;
            let r = (1.0 - y * y).sqrt();
            let theta = golden_angle * i as f32;
            Vec3::new(theta.cos() * r, y, theta.sin() * r) * radius
        })
        .collect()
}
