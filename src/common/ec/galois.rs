use std::ops::{Add, AddAssign, Div, Mul, MulAssign};

// GF(256) element
//------------------------------------------------------------------------------

/// Element of GF(2^8) under the primitive polynomial 0x11D with
/// generator alpha = 2.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct G(pub u8);

const PRIMITIVE: usize = 0x11D;

const fn build_exp_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut x = 1usize;
    let mut i = 0;
    while i < 255 {
        table[i] = x as u8;
        x <<= 1;
        if x >= 256 {
            x ^= PRIMITIVE;
        }
        i += 1;
    }
    // exp wraps with period 255
    table[255] = table[0];
    table
}

const fn build_log_table() -> [u8; 256] {
    let exp = build_exp_table();
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 255 {
        table[exp[i] as usize] = i as u8;
        i += 1;
    }
    table
}

static EXP_TABLE: [u8; 256] = build_exp_table();

static LOG_TABLE: [u8; 256] = build_log_table();

impl G {
    /// alpha^p
    pub fn gen_pow(p: usize) -> G {
        G(EXP_TABLE[p % 255])
    }

    pub fn log(self) -> usize {
        debug_assert!(self.0 != 0, "Log of zero is undefined");
        LOG_TABLE[self.0 as usize] as usize
    }

    pub fn inv(self) -> G {
        debug_assert!(self.0 != 0, "Inverse of zero is undefined");
        G(EXP_TABLE[255 - self.log()])
    }
}

impl Add for G {
    type Output = G;
    fn add(self, rhs: G) -> G {
        G(self.0 ^ rhs.0)
    }
}

impl AddAssign for G {
    fn add_assign(&mut self, rhs: G) {
        self.0 ^= rhs.0;
    }
}

impl Mul for G {
    type Output = G;
    fn mul(self, rhs: G) -> G {
        if self.0 == 0 || rhs.0 == 0 {
            return G(0);
        }
        G(EXP_TABLE[(self.log() + rhs.log()) % 255])
    }
}

impl MulAssign for G {
    fn mul_assign(&mut self, rhs: G) {
        *self = *self * rhs;
    }
}

impl Div for G {
    type Output = G;
    fn div(self, rhs: G) -> G {
        self * rhs.inv()
    }
}

impl From<G> for u8 {
    fn from(g: G) -> u8 {
        g.0
    }
}


// Polynomial over GF(256)
//------------------------------------------------------------------------------

/// Coefficients are stored high-degree first. Leading zeros are trimmed
/// except for the canonical zero [0].
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Poly {
    coeffs: Vec<G>,
}

impl Poly {
    pub fn new(coeffs: Vec<G>) -> Self {
        let first_nz = coeffs.iter().position(|c| c.0 != 0);
        match first_nz {
            Some(0) => Self { coeffs },
            Some(i) => Self { coeffs: coeffs[i..].to_vec() },
            None => Self::zero(),
        }
    }

    pub fn zero() -> Self {
        Self { coeffs: vec![G(0)] }
    }

    pub fn monomial(degree: usize, coeff: G) -> Self {
        if coeff.0 == 0 {
            return Self::zero();
        }
        let mut coeffs = vec![G(0); degree + 1];
        coeffs[0] = coeff;
        Self { coeffs }
    }

    pub fn from_bytes(data: &[u8]) -> Self {
        Self::new(data.iter().map(|&b| G(b)).collect())
    }

    pub fn is_zero(&self) -> bool {
        self.coeffs[0].0 == 0
    }

    pub fn degree(&self) -> usize {
        self.coeffs.len() - 1
    }

    pub fn leading(&self) -> G {
        self.coeffs[0]
    }

    /// Coefficient of x^degree.
    pub fn coeff(&self, degree: usize) -> G {
        let len = self.coeffs.len();
        if degree >= len {
            return G(0);
        }
        self.coeffs[len - 1 - degree]
    }

    pub fn coeffs(&self) -> &[G] {
        &self.coeffs
    }

    pub fn eval(&self, x: G) -> G {
        if x.0 == 0 {
            return self.coeff(0);
        }
        if x.0 == 1 {
            return self.coeffs.iter().fold(G(0), |acc, &c| acc + c);
        }
        // Horner
        self.coeffs.iter().fold(G(0), |acc, &c| acc * x + c)
    }

    pub fn add(&self, other: &Poly) -> Poly {
        if self.is_zero() {
            return other.clone();
        }
        if other.is_zero() {
            return self.clone();
        }

        let (longer, shorter) =
            if self.coeffs.len() >= other.coeffs.len() { (self, other) } else { (other, self) };
        let mut coeffs = longer.coeffs.clone();
        let off = longer.coeffs.len() - shorter.coeffs.len();
        for (i, &c) in shorter.coeffs.iter().enumerate() {
            coeffs[off + i] += c;
        }
        Poly::new(coeffs)
    }

    pub fn mul(&self, other: &Poly) -> Poly {
        if self.is_zero() || other.is_zero() {
            return Poly::zero();
        }
        let mut coeffs = vec![G(0); self.coeffs.len() + other.coeffs.len() - 1];
        for (i, &a) in self.coeffs.iter().enumerate() {
            for (j, &b) in other.coeffs.iter().enumerate() {
                coeffs[i + j] += a * b;
            }
        }
        Poly::new(coeffs)
    }

    pub fn mul_scalar(&self, s: G) -> Poly {
        if s.0 == 0 {
            return Poly::zero();
        }
        Poly::new(self.coeffs.iter().map(|&c| c * s).collect())
    }

    pub fn mul_by_monomial(&self, degree: usize, coeff: G) -> Poly {
        if self.is_zero() || coeff.0 == 0 {
            return Poly::zero();
        }
        let mut coeffs: Vec<G> = self.coeffs.iter().map(|&c| c * coeff).collect();
        coeffs.extend(std::iter::repeat(G(0)).take(degree));
        Poly::new(coeffs)
    }

    /// Long division by repeated leading-term cancellation.
    pub fn div(&self, divisor: &Poly) -> (Poly, Poly) {
        debug_assert!(!divisor.is_zero(), "Division by the zero polynomial");

        let mut quotient = Poly::zero();
        let mut remainder = self.clone();
        let denom_lead_inv = divisor.leading().inv();

        while !remainder.is_zero() && remainder.degree() >= divisor.degree() {
            let deg_diff = remainder.degree() - divisor.degree();
            let scale = remainder.leading() * denom_lead_inv;
            quotient = quotient.add(&Poly::monomial(deg_diff, scale));
            remainder = remainder.add(&divisor.mul_by_monomial(deg_diff, scale));
        }

        (quotient, remainder)
    }
}

#[cfg(test)]
mod poly_tests {
    use super::{Poly, G};

    #[test]
    fn test_trim() {
        let p = Poly::new(vec![G(0), G(0), G(3), G(1)]);
        assert_eq!(p.degree(), 1);
        assert_eq!(p.coeff(1), G(3));
        assert_eq!(p.coeff(0), G(1));
        assert_eq!(p.coeff(5), G(0));
        assert!(Poly::new(vec![G(0), G(0)]).is_zero());
    }

    #[test]
    fn test_eval() {
        // x^2 + 2x + 3
        let p = Poly::new(vec![G(1), G(2), G(3)]);
        assert_eq!(p.eval(G(0)), G(3));
        assert_eq!(p.eval(G(1)), G(1) + G(2) + G(3));
        let x = G(5);
        assert_eq!(p.eval(x), x * x + G(2) * x + G(3));
    }

    #[test]
    fn test_add() {
        let a = Poly::new(vec![G(1), G(2), G(3)]);
        let b = Poly::new(vec![G(3), G(1)]);
        assert_eq!(a.add(&b), Poly::new(vec![G(1), G(1), G(2)]));
        // Self-cancellation yields zero
        assert!(a.add(&a).is_zero());
    }

    #[test]
    fn test_mul_div_roundtrip() {
        let a = Poly::from_bytes(&[32, 91, 11, 45, 89]);
        let b = Poly::from_bytes(&[87, 2, 255]);
        let prod = a.mul(&b);
        let (q, r) = prod.div(&b);
        assert!(r.is_zero());
        assert_eq!(q, a);
    }

    #[test]
    fn test_div_remainder() {
        let a = Poly::from_bytes(&[1, 0, 0, 0]);
        let b = Poly::from_bytes(&[1, 1]);
        // x^3 = (x^2 + x + 1)(x + 1) + 1
        let (q, r) = a.div(&b);
        assert_eq!(q, Poly::from_bytes(&[1, 1, 1]));
        assert_eq!(r, Poly::from_bytes(&[1]));
    }

    #[test]
    fn test_monomial_mul() {
        let p = Poly::from_bytes(&[1, 2]);
        let m = p.mul_by_monomial(2, G(1));
        assert_eq!(m, Poly::from_bytes(&[1, 2, 0, 0]));
    }
}
