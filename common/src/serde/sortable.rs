//! Order-preserving integer encodings.
//!
//! Maps `i64` and `f64` onto `u64` such that the unsigned ordering of the
//! encoded form matches the natural ordering of the source value. Callers
//! that index signed or floating-point columns encode through these before
//! handing values to an unsigned index.

const SIGN_BIT: u64 = 1 << 63;

/// Encode an i64 so that unsigned comparison of the result matches signed
/// comparison of the input (-1 encodes below 0, which encodes below 1).
pub fn encode_i64_sortable(value: i64) -> u64 {
    (value as u64) ^ SIGN_BIT
}

/// Inverse of [`encode_i64_sortable`].
pub fn decode_i64_sortable(encoded: u64) -> i64 {
    (encoded ^ SIGN_BIT) as i64
}

/// Encode an f64 so that unsigned comparison of the result matches the IEEE
/// 754 total order of the input. Positive values get the sign bit set,
/// negative values are bit-inverted so larger magnitudes sort lower.
pub fn encode_f64_sortable(value: f64) -> u64 {
    let bits = value.to_bits();
    if bits & SIGN_BIT != 0 {
        !bits
    } else {
        bits | SIGN_BIT
    }
}

/// Inverse of [`encode_f64_sortable`].
pub fn decode_f64_sortable(encoded: u64) -> f64 {
    let bits = if encoded & SIGN_BIT != 0 {
        encoded ^ SIGN_BIT
    } else {
        !encoded
    };
    f64::from_bits(bits)
}
