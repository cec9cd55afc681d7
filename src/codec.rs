//! Encodes 32-bit floats into 4-byte RGBA8 texels and back.
//!
//! Simulation state lives in plain `Rgba8Unorm` textures, which every
//! backend can both render into and sample, unlike float render targets.
//! The layout is a magnitude/exponent/mantissa split, not IEEE-754:
//!
//! - byte 0: biased exponent `e + 127`
//! - bytes 1-2: high and mid mantissa bytes (mantissa scaled into `[0,256)`)
//! - byte 3: low 7 mantissa bits packed with the sign as the low bit
//!
//! Zero is the unique all-zero texel. The encoding is lossy (~22 effective
//! mantissa bits) and undefined for non-finite input. The WGSL side of the
//! codec lives in `shaders/codec.wgsl` and is spliced into every generated
//! kernel; both sides must implement the identical layout, since `read()`
//! decodes GPU-written texels on the CPU.

/// WGSL source for `pack_float` / `unpack_float`, prepended to every kernel.
pub const WGSL: &str = include_str!("shaders/codec.wgsl");

/// Encode each value into 4 bytes of `out`. `out` must hold at least
/// `4 * values.len()` bytes; texels beyond the input keep their contents.
pub fn pack_into(values: &[f32], out: &mut [u8]) {
    assert!(out.len() >= values.len() * 4, "output buffer too small");

    for (i, &value) in values.iter().enumerate() {
        let j = i * 4;
        if value == 0.0 {
            out[j..j + 4].fill(0);
            continue;
        }

        // Intermediate math in f64, matching the precision the GPU side
        // only approximates.
        let value = value as f64;
        let mag = value.abs();

        // floor(log2) can land one off at power-of-two boundaries; nudge it
        // so that exp2(exponent) <= mag < exp2(exponent + 1).
        let mut exponent = mag.log2().floor();
        let exp2 = exponent.exp2();
        if exp2 <= mag / 2.0 {
            exponent += 1.0;
        }
        if exp2 > mag {
            exponent -= 1.0;
        }

        // For large exponents exp2 overflows f32 range mid-computation on
        // the GPU; scale in two steps there and mirror it here.
        let mut mantissa = if exponent > 100.0 {
            mag / 1024.0 / (exponent - 10.0).exp2() - 1.0
        } else {
            mag / exponent.exp2() - 1.0
        };

        out[j] = (exponent + 127.0) as u8;
        mantissa *= 256.0;

        let hi = mantissa.floor();
        out[j + 1] = hi as u8;
        mantissa = (mantissa - hi) * 256.0;

        let mid = mantissa.floor();
        out[j + 2] = mid as u8;
        mantissa = (mantissa - mid) * 128.0;

        out[j + 3] = (mantissa.floor() as u8) << 1 | u8::from(value < 0.0);
    }
}

/// Encode a slice of values into a fresh byte buffer (4 bytes per value).
pub fn pack(values: &[f32]) -> Vec<u8> {
    let mut out = vec![0u8; values.len() * 4];
    pack_into(values, &mut out);
    out
}

/// Decode 4-byte texels into `out`. `bytes.len()` must be a multiple of 4
/// and `out` must hold `bytes.len() / 4` values.
pub fn unpack_into(bytes: &[u8], out: &mut [f32]) {
    assert_eq!(bytes.len() % 4, 0, "byte length must be a multiple of 4");
    assert!(out.len() >= bytes.len() / 4, "output slice too small");

    for (i, texel) in bytes.chunks_exact(4).enumerate() {
        let r = texel[0] as f64;
        let g = texel[1] as f64;
        let b = texel[2] as f64;
        let a = texel[3] as f64;

        let exponent = r - 127.0;
        let sign = 1.0 - (a % 2.0) * 2.0;
        let mantissa = f64::from(r > 0.0) + g / 256.0 + b / 65536.0 + (a / 2.0).floor() / 8388608.0;

        out[i] = (sign * mantissa * exponent.exp2()) as f32;
    }
}

/// Decode a byte buffer into a fresh float vector.
pub fn unpack(bytes: &[u8]) -> Vec<f32> {
    let mut out = vec![0.0f32; bytes.len() / 4];
    unpack_into(bytes, &mut out);
    out
}
