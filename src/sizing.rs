//! Square power-of-two texture sizing for element counts.

use crate::error::{Error, Result};

/// Smallest power-of-two side `S` with `S * S >= count`, minimum 2.
///
/// Every downstream allocation goes through this guard, so a zero count
/// fails here before any GPU resource is touched. Ex: 1000 elements fit a
/// 32x32 texture (1024 texels), 1100 need 64x64.
pub fn texture_size(count: usize) -> Result<u32> {
    if count == 0 {
        return Err(Error::InvalidCount);
    }

    let mut size: u64 = 2;
    while size * size < count as u64 {
        size *= 2;
    }

    Ok(size as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documented_examples() {
        assert_eq!(texture_size(1000).unwrap(), 32);
        assert_eq!(texture_size(1100).unwrap(), 64);
    }

    #[test]
    fn minimum_side_is_two() {
        assert_eq!(texture_size(1).unwrap(), 2);
        assert_eq!(texture_size(4).unwrap(), 2);
        assert_eq!(texture_size(5).unwrap(), 4);
    }

    #[test]
    fn zero_count_is_rejected() {
        assert!(matches!(texture_size(0), Err(Error::InvalidCount)));
    }

    #[test]
    fn side_is_minimal_and_monotonic() {
        let mut last = 0;
        for n in 1..5000usize {
            let s = texture_size(n).unwrap() as usize;
            assert!(s * s >= n, "{s}x{s} cannot hold {n}");
            assert!(s == 2 || (s / 2) * (s / 2) < n, "{s} is not minimal for {n}");
            assert!(s >= last);
            last = s;
        }
    }
}
