use super::galois::{Poly, G};

// Error correction codeword generator
//------------------------------------------------------------------------------

/// Generator polynomial for `ec_len` codewords:
/// g(x) = (x - a^0)(x - a^1)..(x - a^(ec_len-1))
fn generator(ec_len: usize) -> Poly {
    let mut g = Poly::from_bytes(&[1]);
    for i in 0..ec_len {
        g = g.mul(&Poly::new(vec![G(1), G::gen_pow(i)]));
    }
    g
}

/// Systematic encode: the remainder of data(x) * x^ec_len divided by the
/// generator, padded with leading zeros to exactly `ec_len` bytes.
pub fn ecc(data: &[u8], ec_len: usize) -> Vec<u8> {
    debug_assert!(ec_len > 0, "At least one ec codeword is required");

    let info = Poly::from_bytes(data).mul_by_monomial(ec_len, G(1));
    let (_, rem) = info.div(&generator(ec_len));

    let mut res = vec![0u8; ec_len];
    let rem_len = if rem.is_zero() { 0 } else { rem.degree() + 1 };
    for d in 0..rem_len {
        res[ec_len - 1 - d] = rem.coeff(d).into();
    }
    res
}
