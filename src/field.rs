//! A field is one named scalar channel over N elements, advanced once per
//! tick by its kernel.
//!
//! State lives in two alternating `Rgba8Unorm` targets. A compute pass
//! reads whichever target is current, writes the other, then exposes the
//! freshly written one as the field's output. A pass can never read the
//! texture it is rendering into, and any peer holding the pre-swap output
//! keeps sampling consistent previous-step values.

use wgpu::util::DeviceExt;

use crate::codec;
use crate::context::{GpuContext, TEXEL_FORMAT};
use crate::error::{Error, Result};
use crate::kernel::KernelBuilder;
use crate::sizing;

/// Initial contents of a field.
pub enum Seed {
    /// Explicit per-element values; the element count is the data length.
    Data(Vec<f32>),
    /// `count` elements, every texel initialized to `value`.
    Fill { count: usize, value: f32 },
}

/// Construction recipe for a field: seed data plus the kernel that advances
/// it. Texture inputs declared on the kernel are resolved by name against
/// the engine registry at tick time; more can be added later via wiring.
pub struct FieldSpec {
    pub seed: Seed,
    pub kernel: KernelBuilder,
}

impl FieldSpec {
    /// A field seeded from data with an identity kernel.
    pub fn from_data(data: Vec<f32>) -> Self {
        Self {
            seed: Seed::Data(data),
            kernel: KernelBuilder::new(),
        }
    }

    pub fn kernel(mut self, kernel: KernelBuilder) -> Self {
        self.kernel = kernel;
        self
    }
}

/// Resolves a kernel's texture inputs by registry name to whichever output
/// view that source currently exposes.
pub type InputResolver<'a> = dyn Fn(&str) -> Option<&'a wgpu::TextureView> + 'a;

/// A resolver for fields with no texture inputs.
pub fn no_inputs<'a>(_: &str) -> Option<&'a wgpu::TextureView> {
    None
}

struct Compiled {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    uniforms: Option<wgpu::Buffer>,
}

struct FieldGpu {
    targets: [wgpu::Texture; 2],
    views: [wgpu::TextureView; 2],
    /// Index of the readable output target; the other is the next write
    /// target.
    current: usize,
    /// Compiled lazily on first use and invalidated by wiring, so inputs
    /// may be added any time before the first tick that needs them.
    compiled: Option<Compiled>,
}

pub struct Field {
    name: String,
    count: usize,
    size: u32,
    kernel: KernelBuilder,
    /// Live uniform values in slot order, each one 16-byte slot.
    values: Vec<(String, [f32; 4])>,
    /// `None` once disposed.
    gpu: Option<FieldGpu>,
}

impl Field {
    pub fn new(ctx: &GpuContext, name: impl Into<String>, spec: FieldSpec) -> Result<Self> {
        let name = name.into();
        let (count, seed_values) = match spec.seed {
            Seed::Data(data) => {
                let count = data.len();
                (count, data)
            }
            Seed::Fill { count, value } => {
                // The original fills the whole texture, padding included.
                let size = sizing::texture_size(count)?;
                (count, vec![value; (size * size) as usize])
            }
        };

        let size = sizing::texture_size(count)?;
        let max_dim = ctx.device.limits().max_texture_dimension_2d;
        if size > max_dim {
            return Err(Error::Unsupported(format!(
                "field {name}: {count} elements need a {size}x{size} texture (max {max_dim})"
            )));
        }

        let mut bytes = vec![0u8; (size * size * 4) as usize];
        codec::pack_into(&seed_values, &mut bytes[..seed_values.len() * 4]);

        let targets = [
            ctx.create_target(size, &format!("field {name} target 0")),
            ctx.create_target(size, &format!("field {name} target 1")),
        ];
        let views = [
            targets[0].create_view(&wgpu::TextureViewDescriptor::default()),
            targets[1].create_view(&wgpu::TextureViewDescriptor::default()),
        ];
        ctx.upload(&targets[0], size, &bytes);

        let values = spec.kernel.values();

        Ok(Self {
            name,
            count,
            size,
            kernel: spec.kernel,
            values,
            gpu: Some(FieldGpu {
                targets,
                views,
                current: 0,
                compiled: None,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Side length of the backing square textures.
    pub fn size(&self) -> u32 {
        self.size
    }

    fn gpu(&self) -> Result<&FieldGpu> {
        self.gpu
            .as_ref()
            .ok_or_else(|| Error::Disposed(format!("field {}", self.name)))
    }

    fn gpu_mut(&mut self) -> Result<&mut FieldGpu> {
        self.gpu
            .as_mut()
            .ok_or_else(|| Error::Disposed(format!("field {}", self.name)))
    }

    /// The live output reference: whichever target holds the latest
    /// computed state. Safe to share read-only with any number of
    /// consumers; only this field's own compute pass ever writes it.
    pub fn output(&self) -> Result<&wgpu::TextureView> {
        let gpu = self.gpu()?;
        Ok(&gpu.views[gpu.current])
    }

    /// Which of the two targets `output` currently points at (0 or 1).
    /// Alternates on every compute; the buffer read as kernel input is
    /// always the other one.
    pub fn output_index(&self) -> Result<usize> {
        Ok(self.gpu()?.current)
    }

    pub(crate) fn view_at(&self, index: usize) -> Result<&wgpu::TextureView> {
        Ok(&self.gpu()?.views[index])
    }

    /// True when the kernel declares a value uniform under this name.
    pub fn has_value(&self, name: &str) -> bool {
        self.values.iter().any(|(n, _)| n == name)
    }

    /// Update a declared vec3 uniform; takes effect on the next compute.
    pub fn set_vec3(&mut self, name: &str, value: [f32; 3]) -> Result<()> {
        self.set_slot(name, [value[0], value[1], value[2], 0.0])
    }

    /// Update a declared scalar uniform; takes effect on the next compute.
    pub fn set_scalar(&mut self, name: &str, value: f32) -> Result<()> {
        self.set_slot(name, [value, 0.0, 0.0, 0.0])
    }

    fn set_slot(&mut self, name: &str, slot: [f32; 4]) -> Result<()> {
        self.gpu()?;
        let entry = self
            .values
            .iter_mut()
            .find(|(n, _)| n == name)
            .ok_or_else(|| Error::NotFound(format!("uniform {name} on field {}", self.name)))?;
        entry.1 = slot;
        Ok(())
    }

    /// Add a texture input feeding from the named source's output. Forces a
    /// pipeline rebuild on the next compute; no-op when already declared.
    pub(crate) fn wire_input(&mut self, source: &str) -> Result<()> {
        self.gpu()?;
        if self.kernel.add_texture(source) {
            self.gpu_mut()?.compiled = None;
        }
        Ok(())
    }

    /// Compile the kernel pipeline if missing or invalidated by wiring.
    pub(crate) fn ensure_compiled(&mut self, ctx: &GpuContext) -> Result<()> {
        let gpu = self
            .gpu
            .as_mut()
            .ok_or_else(|| Error::Disposed(format!("field {}", self.name)))?;
        if gpu.compiled.is_some() {
            return Ok(());
        }

        let device = &ctx.device;
        let wgsl = self.kernel.build_wgsl();
        log::debug!("compiling kernel for field {}", self.name);

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&format!("field {} kernel", self.name)),
            source: wgpu::ShaderSource::Wgsl(wgsl.into()),
        });

        let texture_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };

        let mut entries = vec![texture_entry(0)];
        let mut binding = 1u32;
        for _ in self.kernel.textures() {
            entries.push(texture_entry(binding));
            binding += 1;
        }
        if !self.values.is_empty() {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new((self.values.len() * 16) as u64),
                },
                count: None,
            });
        }

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(&format!("field {} bind layout", self.name)),
            entries: &entries,
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("field {} pipeline layout", self.name)),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&format!("field {} pipeline", self.name)),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: TEXEL_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let uniforms = if self.values.is_empty() {
            None
        } else {
            let slots: Vec<[f32; 4]> = self.values.iter().map(|(_, v)| *v).collect();
            Some(
                device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&format!("field {} uniforms", self.name)),
                    contents: bytemuck::cast_slice(&slots),
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                }),
            )
        };

        gpu.compiled = Some(Compiled {
            pipeline,
            layout,
            uniforms,
        });
        Ok(())
    }

    /// Build the bind group for the next compute pass against the field's
    /// current (pre-swap) state and the resolver-supplied peer outputs.
    /// Also flushes live uniform values. Requires a compiled kernel.
    pub(crate) fn bind_inputs(
        &self,
        ctx: &GpuContext,
        resolver: &InputResolver<'_>,
    ) -> Result<wgpu::BindGroup> {
        let gpu = self.gpu()?;
        let compiled = gpu
            .compiled
            .as_ref()
            .expect("kernel compiled before binding inputs");

        let mut entries = vec![wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::TextureView(&gpu.views[gpu.current]),
        }];
        let mut binding = 1u32;
        for name in self.kernel.textures() {
            let view = resolver(name)
                .ok_or_else(|| Error::NotFound(format!("input {name} of field {}", self.name)))?;
            entries.push(wgpu::BindGroupEntry {
                binding,
                resource: wgpu::BindingResource::TextureView(view),
            });
            binding += 1;
        }
        if let Some(uniforms) = &compiled.uniforms {
            let slots: Vec<[f32; 4]> = self.values.iter().map(|(_, v)| *v).collect();
            ctx.queue
                .write_buffer(uniforms, 0, bytemuck::cast_slice(&slots));
            entries.push(wgpu::BindGroupEntry {
                binding,
                resource: uniforms.as_entire_binding(),
            });
        }

        Ok(ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("field {} bind group", self.name)),
            layout: &compiled.layout,
            entries: &entries,
        }))
    }

    /// Swap targets and record the kernel pass into the new write target.
    /// After this returns, `output` points at the freshly written texture.
    pub(crate) fn encode_pass(
        &mut self,
        ctx: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        bind_group: &wgpu::BindGroup,
    ) -> Result<()> {
        let gpu = self.gpu_mut()?;
        let compiled = gpu
            .compiled
            .as_ref()
            .expect("kernel compiled before encoding");

        gpu.current ^= 1;
        ctx.run_kernel(
            encoder,
            &compiled.pipeline,
            bind_group,
            &gpu.views[gpu.current],
        );
        Ok(())
    }

    /// Advance this field once, standalone. Enqueues the kernel pass and
    /// returns without waiting for the GPU. Fields driven by an engine are
    /// advanced by `Engine::tick` instead, which batches every field into
    /// one submission against a shared pre-tick snapshot.
    pub fn compute(&mut self, ctx: &GpuContext, resolver: &InputResolver<'_>) -> Result<()> {
        self.ensure_compiled(ctx)?;
        let bind_group = self.bind_inputs(ctx, resolver)?;

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(&format!("field {} compute", self.name)),
            });
        self.encode_pass(ctx, &mut encoder, &bind_group)?;
        ctx.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    /// Copy the current output back and decode it. Blocks until the GPU
    /// catches up; debug and test use only, never the hot path.
    pub fn read(&self, ctx: &GpuContext) -> Result<Vec<f32>> {
        let gpu = self.gpu()?;
        let bytes = ctx.read_target(&gpu.targets[gpu.current], self.size)?;
        let mut data = codec::unpack(&bytes);
        data.truncate(self.count);
        Ok(data)
    }

    /// Release both targets. Every subsequent operation fails with
    /// [`Error::Disposed`]. Idempotent.
    pub fn dispose(&mut self) {
        if let Some(gpu) = self.gpu.take() {
            for target in &gpu.targets {
                target.destroy();
            }
            log::debug!("disposed field {}", self.name);
        }
    }
}

impl Drop for Field {
    fn drop(&mut self) {
        self.dispose();
    }
}
