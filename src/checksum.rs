// Adler-32 checksum of baseline class bytes.
//
// Binary patch records carry the Adler-32 of the class they were generated
// against. It detects a wrong or corrupted baseline; it is not a security
// boundary.

/// Compute the Adler-32 checksum of `data`.
///
/// Uses `simd-adler32` when the `adler32` feature is enabled and a scalar
/// loop otherwise. Both produce identical values.
pub fn adler32(data: &[u8]) -> u32 {
    #[cfg(feature = "adler32")]
    {
        let mut hasher = simd_adler32::Adler32::new();
        hasher.write(data);
        hasher.finish()
    }
    #[cfg(not(feature = "adler32"))]
    {
        adler32_scalar(data)
    }
}

/// Scalar Adler-32, used when the SIMD backend is disabled and as a test oracle.
#[cfg_attr(feature = "adler32", allow(dead_code))]
pub(crate) fn adler32_scalar(data: &[u8]) -> u32 {
    const MOD_ADLER: u32 = 65521;
    // Largest n such that 255n(n+1)/2 + (n+1)(MOD_ADLER-1) fits in u32.
    const NMAX: usize = 5552;

    let mut a: u32 = 1;
    let mut b: u32 = 0;
    for chunk in data.chunks(NMAX) {
        for &byte in chunk {
            a += u32::from(byte);
            b += a;
        }
        a %= MOD_ADLER;
        b %= MOD_ADLER;
    }
    (b << 16) | a
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_one() {
        assert_eq!(adler32(b""), 1);
    }

    #[test]
    fn known_vector() {
        // RFC 1950 reference value for "Wikipedia".
        assert_eq!(adler32(b"Wikipedia"), 0x11E6_0398);
    }

    #[test]
    fn small_class_bytes() {
        // a = 1 + 1 + 2 + 3 = 7, b = 2 + 4 + 7 = 13
        assert_eq!(adler32(&[0x01, 0x02, 0x03]), (13 << 16) | 7);
    }

    #[test]
    fn simd_matches_scalar() {
        let data: Vec<u8> = (0..100_000u32).map(|i| (i * 31 % 251) as u8).collect();
        assert_eq!(adler32(&data), adler32_scalar(&data));
    }
}
