use image::{GrayImage, RgbImage, RgbaImage};

use crate::common::{
    error::{QRError, QRResult},
    matrix::BitMatrix,
};

// Binarizer
//------------------------------------------------------------------------------
// Small images take the histogram path: a 32-bucket luminance histogram
// over the middle 3/5 region, two dominant peaks and the best valley
// between them. Anything at least 40px in both dimensions uses the
// adaptive path: per 8x8 block averages thresholded against the mean of
// the 5x5 neighborhood of block averages.

pub trait Binarize {
    fn binarize(&self) -> QRResult<BitMatrix>;
}

impl Binarize for GrayImage {
    fn binarize(&self) -> QRResult<BitMatrix> {
        let (w, h) = self.dimensions();
        binarize_luma(self.as_raw(), w as usize, h as usize)
    }
}

impl Binarize for RgbImage {
    fn binarize(&self) -> QRResult<BitMatrix> {
        let (w, h) = self.dimensions();
        let luma: Vec<u8> = self.pixels().map(|p| luminance(p[0], p[1], p[2])).collect();
        binarize_luma(&luma, w as usize, h as usize)
    }
}

impl Binarize for RgbaImage {
    fn binarize(&self) -> QRResult<BitMatrix> {
        let (w, h) = self.dimensions();
        let luma: Vec<u8> = self.pixels().map(|p| luminance(p[0], p[1], p[2])).collect();
        binarize_luma(&luma, w as usize, h as usize)
    }
}

#[inline]
pub fn luminance(r: u8, g: u8, b: u8) -> u8 {
    ((299 * r as u32 + 587 * g as u32 + 114 * b as u32) / 1000) as u8
}

const MIN_ADAPTIVE_DIMENSION: usize = 40;

pub fn binarize_luma(luma: &[u8], w: usize, h: usize) -> QRResult<BitMatrix> {
    debug_assert!(luma.len() == w * h, "Luminance buffer doesn't match dimensions");

    if w < MIN_ADAPTIVE_DIMENSION || h < MIN_ADAPTIVE_DIMENSION {
        histogram_binarize(luma, w, h)
    } else {
        Ok(adaptive_binarize(luma, w, h))
    }
}

// Histogram path
//------------------------------------------------------------------------------

const BUCKET_COUNT: usize = 32;

// Right shift turning 0..=255 luminance into a bucket index
const LUMINANCE_SHIFT: usize = 3;

fn histogram_binarize(luma: &[u8], w: usize, h: usize) -> QRResult<BitMatrix> {
    let mut buckets = [0u32; BUCKET_COUNT];

    // Sample the middle 3/5 in both directions
    for y in h / 5..h * 4 / 5 {
        for x in w / 5..w * 4 / 5 {
            buckets[(luma[y * w + x] >> LUMINANCE_SHIFT) as usize] += 1;
        }
    }

    let threshold = estimate_black_point(&buckets)?;

    let mut matrix = BitMatrix::new(w, h);
    for y in 0..h {
        for x in 0..w {
            if luma[y * w + x] < threshold {
                matrix.set(x, y);
            }
        }
    }
    Ok(matrix)
}

fn estimate_black_point(buckets: &[u32; BUCKET_COUNT]) -> QRResult<u8> {
    // Tallest peak
    let mut first_peak = 0;
    let mut first_peak_size = 0;
    let mut max_bucket_count = 0;
    for (x, &count) in buckets.iter().enumerate() {
        if count > first_peak_size {
            first_peak = x as i32;
            first_peak_size = count;
        }
        max_bucket_count = max_bucket_count.max(count);
    }

    // Second-tallest peak, weighted to be far from the first
    let mut second_peak = 0;
    let mut second_peak_score = 0u64;
    for (x, &count) in buckets.iter().enumerate() {
        let distance = x as i32 - first_peak;
        let score = count as u64 * (distance * distance) as u64;
        if score > second_peak_score {
            second_peak = x as i32;
            second_peak_score = score;
        }
    }

    if first_peak > second_peak {
        std::mem::swap(&mut first_peak, &mut second_peak);
    }

    if second_peak - first_peak <= BUCKET_COUNT as i32 / 16 {
        return Err(QRError::InsufficientContrast);
    }

    // Best valley between the peaks
    let mut best_valley = second_peak - 1;
    let mut best_valley_score = -1i64;
    let mut x = second_peak - 1;
    while x > first_peak {
        let from_first = (x - first_peak) as i64;
        let score = from_first
            * from_first
            * (second_peak - x) as i64
            * (max_bucket_count - buckets[x as usize]) as i64;
        if score > best_valley_score {
            best_valley = x;
            best_valley_score = score;
        }
        x -= 1;
    }

    Ok((best_valley << LUMINANCE_SHIFT) as u8)
}

// Adaptive path
//------------------------------------------------------------------------------

const BLOCK_SIZE: usize = 8;

const MIN_DYNAMIC_RANGE: u8 = 24;

fn adaptive_binarize(luma: &[u8], w: usize, h: usize) -> BitMatrix {
    let wsteps = w.div_ceil(BLOCK_SIZE);
    let hsteps = h.div_ceil(BLOCK_SIZE);
    let len = wsteps * hsteps;

    let mut avg = vec![0usize; len];
    let mut min_max = vec![(u8::MAX, u8::MIN); len];

    // Sum 8x8 pixels per block. Fractional edge blocks reuse the last 8
    // pixels, so a few pixels may be counted for two blocks
    let (wr, hr) = (w & !0b111, h & !0b111);
    for y in 0..hr {
        let row_off = (y >> 3) * wsteps;
        for x in 0..wr {
            let idx = row_off + (x >> 3);
            accumulate(&mut avg[idx], &mut min_max[idx], luma[y * w + x]);
        }
    }

    if w & 0b111 != 0 {
        for y in 0..hr {
            let idx = ((y >> 3) + 1) * wsteps - 1;
            for x in w - 8..w {
                accumulate(&mut avg[idx], &mut min_max[idx], luma[y * w + x]);
            }
        }
    }

    if h & 0b111 != 0 {
        let last_row = wsteps * (hsteps - 1);
        for y in h - 8..h {
            for x in 0..wr {
                let idx = last_row + (x >> 3);
                accumulate(&mut avg[idx], &mut min_max[idx], luma[y * w + x]);
            }
        }
    }

    if w & 0b111 != 0 && h & 0b111 != 0 {
        for y in h - 8..h {
            for x in w - 8..w {
                accumulate(&mut avg[len - 1], &mut min_max[len - 1], luma[y * w + x]);
            }
        }
    }

    // Low variance means the block is probably featureless; take min/2,
    // or inherit from neighbors when they are darker
    for i in 0..len {
        let (mn, mx) = min_max[i];
        if mx - mn <= MIN_DYNAMIC_RANGE {
            avg[i] = (mn as usize) / 2;
            if i > wsteps && i % wsteps > 0 {
                let ng_avg = (2 * avg[i - 1] + avg[i - wsteps] + avg[i - wsteps - 1]) / 4;
                if (mn as usize) < ng_avg {
                    avg[i] = ng_avg;
                }
            }
        } else {
            avg[i] >>= 6;
        }
    }

    // Threshold per block: mean of the 5x5 neighborhood of block
    // averages around the clamped block index
    let mut threshold = vec![0u8; len];
    for y in 0..hsteps {
        let cy = y.clamp(2, hsteps - 3);
        for x in 0..wsteps {
            let cx = x.clamp(2, wsteps - 3);
            let mut sum = 0usize;
            for ny in cy - 2..=cy + 2 {
                let ni = ny * wsteps + cx;
                sum += avg[ni - 2..=ni + 2].iter().sum::<usize>();
            }
            threshold[y * wsteps + x] = (sum / 25) as u8;
        }
    }

    // A pixel equal to the threshold counts as dark
    let mut matrix = BitMatrix::new(w, h);
    for y in 0..h {
        let thresh_row_off = (y >> 3) * wsteps;
        for x in 0..w {
            if luma[y * w + x] <= threshold[thresh_row_off + (x >> 3)] {
                matrix.set(x, y);
            }
        }
    }
    matrix
}

#[inline]
fn accumulate(avg: &mut usize, min_max: &mut (u8, u8), p: u8) {
    *avg += p as usize;
    min_max.0 = min_max.0.min(p);
    min_max.1 = min_max.1.max(p);
}

#[cfg(test)]
mod binarize_tests {
    use super::*;
    use crate::builder::QRBuilder;
    use crate::common::metadata::ECLevel;

    #[test]
    fn test_luminance_weights() {
        assert_eq!(luminance(255, 255, 255), 255);
        assert_eq!(luminance(0, 0, 0), 0);
        assert_eq!(luminance(255, 0, 0), 76);
        assert_eq!(luminance(0, 255, 0), 149);
        assert_eq!(luminance(0, 0, 255), 29);
    }

    #[test]
    fn test_histogram_flat_image_fails() {
        let luma = vec![128u8; 30 * 30];
        assert_eq!(binarize_luma(&luma, 30, 30).unwrap_err(), QRError::InsufficientContrast);
    }

    #[test]
    fn test_histogram_two_level_image() {
        // 30x30: left half dark, right half light
        let mut luma = vec![0u8; 30 * 30];
        for y in 0..30 {
            for x in 15..30 {
                luma[y * 30 + x] = 220;
            }
        }
        let m = binarize_luma(&luma, 30, 30).unwrap();
        assert!(m.get(3, 10));
        assert!(!m.get(25, 10));
    }

    #[test]
    fn test_adaptive_binarize_rendered_symbol() {
        let qr = QRBuilder::new(b"BINARIZE ME").ec_level(ECLevel::M).build().unwrap();
        let img = qr.to_image(4);
        let m = img.binarize().unwrap();
        assert_eq!(m.width() as u32, img.width());

        // Every module of the symbol must binarize to its drawn color
        let w = qr.width();
        for r in 0..w {
            for c in 0..w {
                let dark = matches!(
                    *qr.get(r as i16, c as i16),
                    crate::common::metadata::Color::Dark
                );
                // Sample the module center
                let px = (16 + c * 4 + 2) as usize;
                let py = (16 + r * 4 + 2) as usize;
                assert_eq!(m.get(px, py), dark, "module ({r}, {c})");
            }
        }
    }

    #[test]
    fn test_adaptive_handles_gradient() {
        // Smooth horizontal gradient: nothing should be uniformly dark
        let w = 64;
        let luma: Vec<u8> = (0..64 * 64).map(|i| ((i % 64) * 3 + 32) as u8).collect();
        let m = binarize_luma(&luma, w, 64).unwrap();
        // The gradient is locally flat, so the low-variance rule paints
        // it light nearly everywhere
        assert!(m.count_set() < 64 * 64 / 4);
    }
}
