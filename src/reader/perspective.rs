use crate::common::matrix::BitMatrix;

// Perspective transform
//------------------------------------------------------------------------------

/// 3x3 projective map in homogeneous coordinates. Quads are ordered
/// top-left, top-right, bottom-right, bottom-left.
#[derive(Debug, Clone, PartialEq)]
pub struct Perspective {
    a11: f64,
    a21: f64,
    a31: f64,
    a12: f64,
    a22: f64,
    a32: f64,
    a13: f64,
    a23: f64,
    a33: f64,
}

type Quad = [(f64, f64); 4];

impl Perspective {
    pub fn quad_to_quad(src: Quad, dst: Quad) -> Perspective {
        Self::square_to_quad(dst).times(&Self::quad_to_square(src))
    }

    pub fn square_to_quad(q: Quad) -> Perspective {
        let [(x0, y0), (x1, y1), (x2, y2), (x3, y3)] = q;
        let dx3 = x0 - x1 + x2 - x3;
        let dy3 = y0 - y1 + y2 - y3;
        if dx3 == 0.0 && dy3 == 0.0 {
            // Affine
            return Perspective {
                a11: x1 - x0,
                a21: x2 - x1,
                a31: x0,
                a12: y1 - y0,
                a22: y2 - y1,
                a32: y0,
                a13: 0.0,
                a23: 0.0,
                a33: 1.0,
            };
        }
        let dx1 = x1 - x2;
        let dx2 = x3 - x2;
        let dy1 = y1 - y2;
        let dy2 = y3 - y2;
        let denominator = dx1 * dy2 - dx2 * dy1;
        let a13 = (dx3 * dy2 - dx2 * dy3) / denominator;
        let a23 = (dx1 * dy3 - dx3 * dy1) / denominator;
        Perspective {
            a11: x1 - x0 + a13 * x1,
            a21: x3 - x0 + a23 * x3,
            a31: x0,
            a12: y1 - y0 + a13 * y1,
            a22: y3 - y0 + a23 * y3,
            a32: y0,
            a13,
            a23,
            a33: 1.0,
        }
    }

    pub fn quad_to_square(q: Quad) -> Perspective {
        Self::square_to_quad(q).adjoint()
    }

    // The adjoint inverts up to scale, which homogeneous coordinates
    // don't care about
    fn adjoint(&self) -> Perspective {
        Perspective {
            a11: self.a22 * self.a33 - self.a23 * self.a32,
            a21: self.a23 * self.a31 - self.a21 * self.a33,
            a31: self.a21 * self.a32 - self.a22 * self.a31,
            a12: self.a13 * self.a32 - self.a12 * self.a33,
            a22: self.a11 * self.a33 - self.a13 * self.a31,
            a32: self.a12 * self.a31 - self.a11 * self.a32,
            a13: self.a12 * self.a23 - self.a13 * self.a22,
            a23: self.a13 * self.a21 - self.a11 * self.a23,
            a33: self.a11 * self.a22 - self.a12 * self.a21,
        }
    }

    fn times(&self, other: &Perspective) -> Perspective {
        Perspective {
            a11: self.a11 * other.a11 + self.a21 * other.a12 + self.a31 * other.a13,
            a21: self.a11 * other.a21 + self.a21 * other.a22 + self.a31 * other.a23,
            a31: self.a11 * other.a31 + self.a21 * other.a32 + self.a31 * other.a33,
            a12: self.a12 * other.a11 + self.a22 * other.a12 + self.a32 * other.a13,
            a22: self.a12 * other.a21 + self.a22 * other.a22 + self.a32 * other.a23,
            a32: self.a12 * other.a31 + self.a22 * other.a32 + self.a32 * other.a33,
            a13: self.a13 * other.a11 + self.a23 * other.a12 + self.a33 * other.a13,
            a23: self.a13 * other.a21 + self.a23 * other.a22 + self.a33 * other.a23,
            a33: self.a13 * other.a31 + self.a23 * other.a32 + self.a33 * other.a33,
        }
    }

    pub fn transform(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let denominator = self.a13 * x + self.a23 * y + self.a33;
        if denominator.abs() <= f64::EPSILON {
            return None;
        }
        Some((
            (self.a11 * x + self.a21 * y + self.a31) / denominator,
            (self.a12 * x + self.a22 * y + self.a32) / denominator,
        ))
    }
}

// Grid sampling
//------------------------------------------------------------------------------

/// Maps each cell center through the transform and reads the source
/// pixel. Truncated indices landing outside the image abort the sample.
pub fn sample_grid(img: &BitMatrix, transform: &Perspective, size: usize) -> Option<BitMatrix> {
    let mut matrix = BitMatrix::square(size);
    for y in 0..size {
        for x in 0..size {
            let (sx, sy) = transform.transform(x as f64 + 0.5, y as f64 + 0.5)?;
            let (ix, iy) = (sx as i64, sy as i64);
            if ix < 0 || iy < 0 || ix as usize >= img.width() || iy as usize >= img.height() {
                return None;
            }
            if img.get(ix as usize, iy as usize) {
                matrix.set(x, y);
            }
        }
    }
    Some(matrix)
}
