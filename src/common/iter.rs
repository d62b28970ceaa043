use super::metadata::Version;

// Iterator over the encoding region of a symbol
//------------------------------------------------------------------------------

/// Walks column pairs right to left, snaking upward then downward, right
/// column before left, skipping the vertical timing column entirely.
/// Yields (row, col) for every cell; callers skip reserved ones.
pub struct EncRegionIter {
    width: i16,
    col: i16,
    row: i16,
    upward: bool,
    right: bool,
}

impl EncRegionIter {
    pub fn new(version: Version) -> Self {
        let w = version.width() as i16;
        Self { width: w, col: w - 1, row: w - 1, upward: true, right: true }
    }
}

impl Iterator for EncRegionIter {
    type Item = (i16, i16);

    fn next(&mut self) -> Option<Self::Item> {
        if self.col < 0 {
            return None;
        }

        let res = (self.row, if self.right { self.col } else { self.col - 1 });

        if self.right {
            self.right = false;
        } else {
            self.right = true;
            let at_edge = if self.upward { self.row == 0 } else { self.row == self.width - 1 };
            if at_edge {
                self.upward = !self.upward;
                self.col -= 2;
                // The vertical timing column is not part of any pair
                if self.col == 6 {
                    self.col -= 1;
                }
            } else {
                self.row += if self.upward { -1 } else { 1 };
            }
        }

        Some(res)
    }
}

#[cfg(test)]
mod iter_tests {
    use super::EncRegionIter;
    use crate::common::metadata::Version;

    #[test]
    fn test_starts_bottom_right_and_snakes_up() {
        let v = Version::new(1).unwrap();
        let coords = EncRegionIter::new(v).take(6).collect::<Vec<_>>();
        assert_eq!(coords, [(20, 20), (20, 19), (19, 20), (19, 19), (18, 20), (18, 19)]);
    }

    #[test]
    fn test_skips_vertical_timing_column() {
        let v = Version::new(1).unwrap();
        assert!(EncRegionIter::new(v).all(|(_, c)| c != 6));
    }

    #[test]
    fn test_covers_all_cells_once() {
        for v in [1, 2, 7, 14, 25, 40] {
            let ver = Version::new(v).unwrap();
            let w = ver.width();
            let mut seen = vec![false; w * w];
            let mut count = 0;
            for (r, c) in EncRegionIter::new(ver) {
                let idx = r as usize * w + c as usize;
                assert!(!seen[idx], "cell visited twice: ({r}, {c})");
                seen[idx] = true;
                count += 1;
            }
            // Everything except the vertical timing column
            assert_eq!(count, w * (w - 1), "v{v}");
        }
    }
}
