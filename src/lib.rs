//! Texture-resident GPGPU float fields.
//!
//! Simulation state lives in ordinary 8-bit RGBA textures: a bespoke codec
//! packs one 32-bit float per texel, per-element kernels run as fragment
//! passes over offscreen targets, and each mutable field ping-pongs
//! between two targets so a pass never reads what it writes. An engine
//! registry wires fields to each other's outputs and advances everything
//! one step per tick, with all cross-field reads taken from a pre-tick
//! snapshot so mutually dependent fields update simultaneously.
//!
//! ```no_run
//! use floatfield::{Attractor, AttractorParams, Engine, GpuContext};
//!
//! let ctx = GpuContext::new_blocking()?;
//! let mut engine = Engine::new(ctx);
//! let seed = floatfield::sphere_surface(1000, 3.5);
//! let cloud = Attractor::build(&mut engine, &seed, AttractorParams::default())?;
//!
//! cloud.set_cursor(&mut engine, glam::Vec3::new(1.0, 0.0, 0.0));
//! engine.tick()?;
//! // engine.output("x") etc. feed the render side as texture inputs.
//! # Ok::<(), floatfield::Error>(())
//! ```

pub mod attractor;
pub mod codec;
pub mod constant;
pub mod context;
pub mod engine;
pub mod error;
pub mod field;
pub mod kernel;
pub mod sizing;

pub use attractor::{sphere_surface, Attractor, AttractorParams, AxisParams};
pub use constant::Constant;
pub use context::GpuContext;
pub use engine::Engine;
pub use error::{Error, Result};
pub use field::{Field, FieldSpec, Seed};
pub use kernel::KernelBuilder;
