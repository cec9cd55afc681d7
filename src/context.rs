//! GPU context: device, queue, and the fullscreen kernel-execution pass.
//!
//! Every kernel runs as a fragment shader over one fullscreen triangle,
//! rendered into an offscreen `Rgba8Unorm` target. `run_kernel` is the sole
//! execution primitive; fields and constants never touch a render pass
//! directly. The context is created once and passed down explicitly rather
//! than living in a process-wide global.

use std::sync::Arc;

use crate::error::{Error, Result};

/// Texel format shared by every field and constant buffer.
pub const TEXEL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Smallest texture side the capability check demands headroom for.
const MIN_TEXTURE_DIM: u32 = 1024;

/// Kernels bind the executing field plus its wired inputs; 8 sampled
/// textures covers the three-axis attractor with margin.
const MIN_SAMPLED_TEXTURES: u32 = 8;

pub struct GpuContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    /// Nearest/clamp sampler for external render consumers. Kernels address
    /// texels with `textureLoad` and never interpolate; anything sampling a
    /// packed texture from outside must do the same, since filtering
    /// encoded texels corrupts the bit layout.
    pub nearest_sampler: wgpu::Sampler,
}

impl GpuContext {
    /// Acquire a headless device. Fails with [`Error::NoAdapter`] when no
    /// GPU is present and [`Error::Unsupported`] when the adapter cannot
    /// sample enough textures from the fragment stage. There is no CPU
    /// fallback, so the caller must treat that as fatal.
    pub async fn new() -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(Error::NoAdapter)?;

        log::info!("Using GPU: {:?}", adapter.get_info());

        let limits = adapter.limits();
        if limits.max_texture_dimension_2d < MIN_TEXTURE_DIM {
            return Err(Error::Unsupported(format!(
                "max 2d texture dimension {} below required {}",
                limits.max_texture_dimension_2d, MIN_TEXTURE_DIM
            )));
        }
        if limits.max_sampled_textures_per_shader_stage < MIN_SAMPLED_TEXTURES {
            return Err(Error::Unsupported(format!(
                "only {} sampled textures per stage (need {})",
                limits.max_sampled_textures_per_shader_stage, MIN_SAMPLED_TEXTURES
            )));
        }

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("floatfield device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults()
                        .using_resolution(adapter.limits()),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
            .map_err(|e| Error::Unsupported(e.to_string()))?;

        Ok(Self::from_device(Arc::new(device), Arc::new(queue)))
    }

    /// Blocking convenience wrapper around [`GpuContext::new`].
    pub fn new_blocking() -> Result<Self> {
        pollster::block_on(Self::new())
    }

    /// Wrap an existing device/queue pair, for embedding into an
    /// application that already owns a wgpu context.
    pub fn from_device(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        let nearest_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("floatfield nearest sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            device,
            queue,
            nearest_sampler,
        }
    }

    /// Allocate one `size x size` packed-texel target. Targets are both
    /// render attachments (kernel output) and sampled textures (kernel
    /// input / external consumption), plus copy src/dst for seeding and
    /// readback.
    pub fn create_target(&self, size: u32, label: &str) -> wgpu::Texture {
        self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TEXEL_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        })
    }

    /// Upload packed texel bytes into a target. `bytes` must cover the full
    /// `size x size` texture (4 bytes per texel).
    pub fn upload(&self, target: &wgpu::Texture, size: u32, bytes: &[u8]) {
        debug_assert_eq!(bytes.len(), (size * size * 4) as usize);
        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: target,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytes,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(size * 4),
                rows_per_image: Some(size),
            },
            wgpu::Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: 1,
            },
        );
    }

    /// Record one full-buffer kernel pass into `target`. Output goes only
    /// to `target`; the pass holds no other attachments.
    pub fn run_kernel(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        pipeline: &wgpu::RenderPipeline,
        bind_group: &wgpu::BindGroup,
        target: &wgpu::TextureView,
    ) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("field kernel pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        // One oversized triangle covers the whole target.
        pass.draw(0..3, 0..1);
    }

    /// Blocking copy of a full target back to the CPU. Slow; debug and test
    /// use only. Returns the raw packed bytes, row padding stripped.
    pub fn read_target(&self, target: &wgpu::Texture, size: u32) -> Result<Vec<u8>> {
        let unpadded_bytes_per_row = size * 4;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(align) * align;

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("field readback staging"),
            size: (padded_bytes_per_row * size) as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("field readback encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: target,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &staging,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(size),
                },
            },
            wgpu::Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);

        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(Error::Readback(format!("{e:?}"))),
            Err(_) => return Err(Error::Readback("map channel disconnected".into())),
        }

        let data = slice.get_mapped_range();
        let mut bytes = Vec::with_capacity((unpadded_bytes_per_row * size) as usize);
        for row in 0..size {
            let start = (row * padded_bytes_per_row) as usize;
            bytes.extend_from_slice(&data[start..start + unpadded_bytes_per_row as usize]);
        }
        drop(data);
        staging.unmap();

        Ok(bytes)
    }
}
