use super::galois::{Poly, G};
use super::Block;
use crate::common::error::{QRError, QRResult};

// Rectifier
//------------------------------------------------------------------------------

impl Block {
    /// Corrects in-place and returns how many codewords were repaired.
    pub fn rectify(&mut self) -> QRResult<usize> {
        let ec_len = self.ec_len();

        let synd = match self.syndromes() {
            Ok(()) => return Ok(0),
            Err(s) => s,
        };

        // Extended Euclidean on (x^t, S(x)) down to deg(remainder) < t/2
        let (sigma, omega) = euclidean(&Poly::monomial(ec_len, G(1)), &synd, ec_len)?;

        let locators = chien_search(&sigma)?;
        let magnitudes = forney(&omega, &locators);

        let len = self.len();
        let full = self.full_mut();
        for (locator, magnitude) in locators.iter().zip(magnitudes.iter()) {
            let pos = len.checked_sub(1 + locator.log()).ok_or(QRError::UncorrectableError)?;
            full[pos] ^= magnitude.0;
        }

        match self.syndromes() {
            Ok(()) => Ok(locators.len()),
            Err(_) => Err(QRError::UncorrectableError),
        }
    }

    /// S_i = R(a^i) for i in 0..ec_len; Ok(()) when all vanish, otherwise
    /// the syndrome polynomial.
    fn syndromes(&self) -> Result<(), Poly> {
        let ec_len = self.ec_len();
        let received = Poly::from_bytes(self.full());

        let mut coeffs = vec![G(0); ec_len];
        let mut clean = true;
        for i in 0..ec_len {
            let s = received.eval(G::gen_pow(i));
            if s.0 != 0 {
                clean = false;
            }
            // High-degree first: S_i is the coefficient of x^i
            coeffs[ec_len - 1 - i] = s;
        }

        if clean {
            Ok(())
        } else {
            Err(Poly::new(coeffs))
        }
    }
}

/// Returns (error locator sigma, error evaluator omega).
fn euclidean(a: &Poly, b: &Poly, ec_len: usize) -> QRResult<(Poly, Poly)> {
    let (mut r_last, mut r) =
        if a.degree() < b.degree() { (b.clone(), a.clone()) } else { (a.clone(), b.clone()) };
    let mut t_last = Poly::zero();
    let mut t = Poly::from_bytes(&[1]);

    while 2 * r.degree() >= ec_len {
        std::mem::swap(&mut r_last, &mut r);
        std::mem::swap(&mut t_last, &mut t);

        if r_last.is_zero() {
            return Err(QRError::UncorrectableError);
        }

        // r = r_new_last mod r_last, accumulating the quotient
        let mut quotient = Poly::zero();
        let lead_inv = r_last.leading().inv();
        while !r.is_zero() && r.degree() >= r_last.degree() {
            let deg_diff = r.degree() - r_last.degree();
            let scale = r.leading() * lead_inv;
            quotient = quotient.add(&Poly::monomial(deg_diff, scale));
            r = r.add(&r_last.mul_by_monomial(deg_diff, scale));
        }

        t = quotient.mul(&t_last).add(&t);

        if !r.is_zero() && r.degree() >= r_last.degree() {
            return Err(QRError::UncorrectableError);
        }
    }

    let sigma_zero = t.coeff(0);
    if sigma_zero.0 == 0 {
        return Err(QRError::UncorrectableError);
    }

    let inv = sigma_zero.inv();
    Ok((t.mul_scalar(inv), r.mul_scalar(inv)))
}

/// Scans the field for roots of sigma; returns the error locators X_j.
/// Fails when the root count disagrees with the locator degree.
fn chien_search(sigma: &Poly) -> QRResult<Vec<G>> {
    let num_errors = sigma.degree();
    if num_errors == 0 {
        return Err(QRError::UncorrectableError);
    }
    if num_errors == 1 {
        return Ok(vec![sigma.coeff(1) / sigma.coeff(0)]);
    }

    let mut locators = Vec::with_capacity(num_errors);
    for i in 1..=255u16 {
        if sigma.eval(G(i as u8)).0 == 0 {
            locators.push(G(i as u8).inv());
            if locators.len() == num_errors {
                break;
            }
        }
    }

    if locators.len() != num_errors {
        return Err(QRError::UncorrectableError);
    }
    Ok(locators)
}

/// Error magnitudes e_j = omega(X_j^-1) / prod_{k != j} (1 - X_k X_j^-1).
fn forney(omega: &Poly, locators: &[G]) -> Vec<G> {
    locators
        .iter()
        .enumerate()
        .map(|(j, &xj)| {
            let xj_inv = xj.inv();
            let mut denominator = G(1);
            for (k, &xk) in locators.iter().enumerate() {
                if k != j {
                    denominator *= G(1) + xk * xj_inv;
                }
            }
            omega.eval(xj_inv) / denominator
        })
        .collect()
}

#[cfg(test)]
mod ec_rectifier_tests {
    use rand::{rng, Rng};
    use test_case::test_case;

    use super::Block;

    #[test_case(&[32, 91, 11, 45, 89, 123, 77, 44, 56, 99, 202], &[32, 91, 11, 45, 89, 46, 77, 44, 56, 99, 202]; "single error")]
    #[test_case(&[32, 91, 11, 45, 89, 123, 77, 44, 56, 99, 202], &[32, 91, 11, 45, 89, 46, 77, 44, 56, 99, 249]; "double error")]
    fn test_rectifier(data: &[u8], bad: &[u8]) {
        let mut blk = Block::new(data, 16);
        let expected = blk.full().to_vec();
        blk.full_mut()[..11].copy_from_slice(bad);
        let corrected = blk.rectify().unwrap();
        assert!(corrected > 0);
        assert_eq!(blk.full(), expected);
    }

    #[test]
    fn test_rectifier_counts_errors() {
        let data = b"some data protected by rs";
        let mut blk = Block::new(data, data.len() + 10);
        let expected = blk.full().to_vec();
        for i in [3, 7, 12, 20, 24] {
            blk.full_mut()[i] ^= 0x5A;
        }
        assert_eq!(blk.rectify().unwrap(), 5);
        assert_eq!(blk.full(), expected);
    }

    #[test]
    fn test_rectifier_corrects_ec_codewords() {
        let data = &[32, 91, 11, 45, 89, 123, 77, 44, 56, 99, 202];
        let mut blk = Block::new(data, 16);
        let expected = blk.full().to_vec();
        blk.full_mut()[13] ^= 0xFF;
        assert_eq!(blk.rectify().unwrap(), 1);
        assert_eq!(blk.full(), expected);
    }

    #[test]
    #[should_panic]
    fn test_rectifier_fail() {
        let data = &[32, 91, 11, 45, 89, 123, 77, 44, 56, 99, 202];
        let bad = &[138, 91, 161, 45, 243, 46, 231, 44, 146, 99, 202];
        let mut blk = Block::new(data, 16);
        blk.full_mut()[..11].copy_from_slice(bad);
        blk.rectify().unwrap();
    }

    #[test]
    fn test_rectifier_random_round_trips() {
        let mut rng = rng();
        for _ in 0..50 {
            let dlen = rng.random_range(4..=100usize);
            let ec_len = rng.random_range(2..=30usize);
            let data: Vec<u8> = (0..dlen).map(|_| rng.random()).collect();

            let mut blk = Block::new(&data, dlen + ec_len);
            let expected = blk.full().to_vec();

            // Flip up to floor(t/2) distinct codewords
            let errors = rng.random_range(1..=(ec_len / 2).max(1));
            let mut hit = std::collections::HashSet::new();
            while hit.len() < errors {
                hit.insert(rng.random_range(0..dlen + ec_len));
            }
            for &i in &hit {
                let flip = rng.random_range(1..=255u8);
                blk.full_mut()[i] ^= flip;
            }

            assert_eq!(blk.rectify().unwrap(), errors);
            assert_eq!(blk.full(), expected);
        }
    }

    #[test]
    fn test_rectifier_beyond_capacity_never_lies() {
        // t/2 + 1 errors either fail or leave a mismatch somewhere; the
        // decoder must not silently "correct" into the original codeword
        let mut rng = rng();
        for _ in 0..20 {
            let data: Vec<u8> = (0..30).map(|_| rng.random()).collect();
            let ec_len = 10;
            let mut blk = Block::new(&data, 30 + ec_len);
            let expected = blk.full().to_vec();

            let mut hit = std::collections::HashSet::new();
            while hit.len() < ec_len / 2 + 1 {
                hit.insert(rng.random_range(0..30 + ec_len));
            }
            for &i in &hit {
                blk.full_mut()[i] ^= rng.random_range(1..=255u8);
            }

            match blk.rectify() {
                Ok(_) => assert_ne!(blk.full(), expected),
                Err(_) => {}
            }
        }
    }
}

// Rectifier for format and version infos
//------------------------------------------------------------------------------

/// Picks the table codeword with minimum Hamming distance to `info`, or
/// fails when even the best is farther than `err_capacity` bits.
pub fn rectify_info(info: u32, valid_codewords: &[u32], err_capacity: u32) -> Option<u32> {
    let res = *valid_codewords.iter().min_by_key(|&n| (info ^ n).count_ones())?;

    if (info ^ res).count_ones() <= err_capacity {
        Some(res)
    } else {
        None
    }
}
