//! A constant is a named immutable scalar channel: encoded once at
//! creation, never recomputed, sampled by field kernels like any other
//! packed texture.

use crate::codec;
use crate::context::GpuContext;
use crate::error::{Error, Result};
use crate::sizing;

pub struct Constant {
    name: String,
    count: usize,
    size: u32,
    gpu: Option<(wgpu::Texture, wgpu::TextureView)>,
}

impl Constant {
    pub fn new(ctx: &GpuContext, name: impl Into<String>, data: &[f32]) -> Result<Self> {
        let name = name.into();
        let count = data.len();
        let size = sizing::texture_size(count)?;

        let mut bytes = vec![0u8; (size * size * 4) as usize];
        codec::pack_into(data, &mut bytes[..count * 4]);

        let texture = ctx.create_target(size, &format!("constant {name}"));
        ctx.upload(&texture, size, &bytes);
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Ok(Self {
            name,
            count,
            size,
            gpu: Some((texture, view)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// The permanent output reference.
    pub fn output(&self) -> Result<&wgpu::TextureView> {
        self.gpu
            .as_ref()
            .map(|(_, view)| view)
            .ok_or_else(|| Error::Disposed(format!("constant {}", self.name)))
    }

    /// Release the buffer; subsequent `output` calls fail with
    /// [`Error::Disposed`]. Idempotent.
    pub fn dispose(&mut self) {
        if let Some((texture, _)) = self.gpu.take() {
            texture.destroy();
            log::debug!("disposed constant {}", self.name);
        }
    }
}

impl Drop for Constant {
    fn drop(&mut self) {
        self.dispose();
    }
}
