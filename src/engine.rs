//! The orchestrator: a registry of named fields and constants advanced one
//! step per `tick`.
//!
//! Cross-field wiring may form cycles (x reads y and z, y reads x and z,
//! ...), so a tick is a synchronous simultaneous update: every field's
//! output reference is captured before any field advances, all kernels
//! bind against that frozen snapshot, and only then are the passes
//! recorded. Registration order therefore cannot influence the result of a
//! tick, only the order passes land in the command buffer.

use std::collections::HashMap;

use crate::constant::Constant;
use crate::context::GpuContext;
use crate::error::{Error, Result};
use crate::field::{Field, FieldSpec};

enum Entry {
    Field(Field),
    Constant(Constant),
}

pub struct Engine {
    ctx: GpuContext,
    /// Registration order; `tick` walks this.
    entries: Vec<Entry>,
    /// Shared namespace over fields and constants.
    index: HashMap<String, usize>,
}

impl Engine {
    /// The context is created once by the caller and owned here for the
    /// life of the engine; exactly one backend per process is an ownership
    /// invariant, not a global.
    pub fn new(ctx: GpuContext) -> Self {
        Self {
            ctx,
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn context(&self) -> &GpuContext {
        &self.ctx
    }

    fn entry_mut(&mut self, name: &str) -> Result<&mut Entry> {
        let &i = self
            .index
            .get(name)
            .ok_or_else(|| Error::NotFound(name.to_owned()))?;
        Ok(&mut self.entries[i])
    }

    pub fn register_field(&mut self, name: impl Into<String>, spec: FieldSpec) -> Result<()> {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(Error::AlreadyExists(name));
        }
        let field = Field::new(&self.ctx, name.clone(), spec)?;
        self.index.insert(name, self.entries.len());
        self.entries.push(Entry::Field(field));
        Ok(())
    }

    pub fn register_constant(&mut self, name: impl Into<String>, data: &[f32]) -> Result<()> {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(Error::AlreadyExists(name));
        }
        let constant = Constant::new(&self.ctx, name.clone(), data)?;
        self.index.insert(name, self.entries.len());
        self.entries.push(Entry::Constant(constant));
        Ok(())
    }

    /// Let `target`'s kernel sample `source`'s live output under the
    /// source's name. The edge takes effect on the next tick; wiring must
    /// happen before the first tick whose kernel body references the
    /// source.
    pub fn wire(&mut self, target: &str, source: &str) -> Result<()> {
        if !self.index.contains_key(source) {
            return Err(Error::NotFound(source.to_owned()));
        }
        match self.entry_mut(target)? {
            Entry::Field(field) => field.wire_input(source),
            Entry::Constant(_) => Err(Error::NotFound(format!("{target} is not a field"))),
        }
    }

    /// Set a vec3 uniform on every field that declares it, the per-tick
    /// external input channel (e.g. a cursor position).
    pub fn set_vec3(&mut self, name: &str, value: [f32; 3]) {
        for entry in &mut self.entries {
            if let Entry::Field(field) = entry {
                if field.has_value(name) {
                    // Disposed fields are skipped; they fail at tick time.
                    let _ = field.set_vec3(name, value);
                }
            }
        }
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        match self.index.get(name).map(|&i| &self.entries[i]) {
            Some(Entry::Field(field)) => Some(field),
            _ => None,
        }
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut Field> {
        match self.index.get(name).map(|&i| &mut self.entries[i]) {
            Some(Entry::Field(field)) => Some(field),
            _ => None,
        }
    }

    pub fn constant(&self, name: &str) -> Option<&Constant> {
        match self.index.get(name).map(|&i| &self.entries[i]) {
            Some(Entry::Constant(constant)) => Some(constant),
            _ => None,
        }
    }

    /// The named entry's live output reference, for external consumers
    /// binding it as a texture input.
    pub fn output(&self, name: &str) -> Result<&wgpu::TextureView> {
        let &i = self
            .index
            .get(name)
            .ok_or_else(|| Error::NotFound(name.to_owned()))?;
        match &self.entries[i] {
            Entry::Field(field) => field.output(),
            Entry::Constant(constant) => constant.output(),
        }
    }

    /// Blocking debug readback of a field's decoded values.
    pub fn read(&self, name: &str) -> Result<Vec<f32>> {
        self.field(name)
            .ok_or_else(|| Error::NotFound(name.to_owned()))?
            .read(&self.ctx)
    }

    /// Dispose the named entry and drop it from the registry.
    pub fn remove(&mut self, name: &str) -> Result<()> {
        let i = self
            .index
            .remove(name)
            .ok_or_else(|| Error::NotFound(name.to_owned()))?;
        match self.entries.remove(i) {
            Entry::Field(mut field) => field.dispose(),
            Entry::Constant(mut constant) => constant.dispose(),
        }
        for slot in self.index.values_mut() {
            if *slot > i {
                *slot -= 1;
            }
        }
        Ok(())
    }

    /// Advance every registered field exactly once, in registration order,
    /// against the pre-tick snapshot of all outputs. Enqueues a single
    /// command buffer and returns without waiting for the GPU.
    pub fn tick(&mut self) -> Result<()> {
        let Self {
            ctx,
            entries,
            index,
        } = self;

        for entry in entries.iter_mut() {
            if let Entry::Field(field) = entry {
                field.ensure_compiled(ctx)?;
            }
        }

        // Which target each field exposed before anything advanced.
        let snapshot: Vec<Option<usize>> = entries
            .iter()
            .map(|entry| match entry {
                Entry::Field(field) => field.output_index().map(Some),
                Entry::Constant(_) => Ok(None),
            })
            .collect::<Result<_>>()?;

        let bind_groups: Vec<Option<wgpu::BindGroup>> = {
            let shared: &[Entry] = entries;
            let resolver = |name: &str| -> Option<&wgpu::TextureView> {
                let &i = index.get(name)?;
                match &shared[i] {
                    Entry::Field(field) => field.view_at(snapshot[i]?).ok(),
                    Entry::Constant(constant) => constant.output().ok(),
                }
            };
            shared
                .iter()
                .map(|entry| match entry {
                    Entry::Field(field) => field.bind_inputs(ctx, &resolver).map(Some),
                    Entry::Constant(_) => Ok(None),
                })
                .collect::<Result<_>>()?
        };

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("engine tick"),
            });
        for (entry, bind_group) in entries.iter_mut().zip(&bind_groups) {
            if let (Entry::Field(field), Some(bind_group)) = (entry, bind_group) {
                field.encode_pass(ctx, &mut encoder, bind_group)?;
            }
        }
        ctx.queue.submit(std::iter::once(encoder.finish()));

        Ok(())
    }
}
