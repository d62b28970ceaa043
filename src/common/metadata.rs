use std::fmt::{Display, Error, Formatter};
use std::ops::Deref;

use super::codec::Mode;
use super::error::{QRError, QRResult};
use super::mask::MaskPattern;

// Color of a module
//------------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Color {
    Light,
    Dark,
}

impl std::ops::Not for Color {
    type Output = Self;
    fn not(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }
}

impl Color {
    pub fn select<T>(&self, dark: T, light: T) -> T {
        match self {
            Self::Dark => dark,
            Self::Light => light,
        }
    }
}

// Error correction level
//------------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq, Clone, Copy, PartialOrd, Ord)]
pub enum ECLevel {
    L = 0,
    M = 1,
    Q = 2,
    H = 3,
}

impl ECLevel {
    /// Two-bit value carried in format info; distinct from the table index.
    pub fn bits(self) -> u32 {
        match self {
            Self::L => 0b01,
            Self::M => 0b00,
            Self::Q => 0b11,
            Self::H => 0b10,
        }
    }

    pub fn from_bits(bits: u32) -> QRResult<Self> {
        match bits {
            0b01 => Ok(Self::L),
            0b00 => Ok(Self::M),
            0b11 => Ok(Self::Q),
            0b10 => Ok(Self::H),
            _ => Err(QRError::IllegalLevel),
        }
    }
}

// Version
//------------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq, Clone, Copy, PartialOrd, Ord)]
pub struct Version(usize);

impl Deref for Version {
    type Target = usize;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut Formatter) -> Result<(), Error> {
        write!(f, "{}", self.0)
    }
}

impl Version {
    pub fn new(v: usize) -> QRResult<Self> {
        if (1..=40).contains(&v) {
            Ok(Self(v))
        } else {
            Err(QRError::IllegalVersion)
        }
    }

    pub const fn width(self) -> usize {
        17 + 4 * self.0
    }

    pub fn from_grid_size(size: usize) -> Option<Self> {
        if size < 21 || size > 177 || (size - 17) % 4 != 0 {
            return None;
        }
        Some(Self((size - 17) / 4))
    }

    pub fn alignment_pattern(self) -> &'static [i16] {
        ALIGNMENT_PATTERN_POSITIONS[self.0 - 1]
    }

    /// 18-bit version info for v >= 7: 6 data bits + 12 BCH bits.
    pub fn info(self) -> u32 {
        debug_assert!(self.0 >= 7, "Version info only exists for v >= 7");
        VERSION_INFOS[self.0 - 7]
    }

    pub const fn mode_bits(self) -> usize {
        4
    }

    /// Index into the char-count width triples: v1-9, v10-26, v27-40.
    fn class(self) -> usize {
        match self.0 {
            1..=9 => 0,
            10..=26 => 1,
            _ => 2,
        }
    }

    pub fn char_cnt_bits(self, mode: Mode) -> usize {
        mode.char_cnt_bits(self.class())
    }

    pub fn ecc_per_block(self, ec_level: ECLevel) -> usize {
        EC_BLOCK_TABLE[self.0 - 1][ec_level as usize].0
    }

    /// Returns (block1_size, block1_count, block2_size, block2_count);
    /// block1 is the shorter group and is interleaved first.
    pub fn data_codewords_per_block(self, ec_level: ECLevel) -> (usize, usize, usize, usize) {
        let (_, c1, d1, c2, d2) = EC_BLOCK_TABLE[self.0 - 1][ec_level as usize];
        (d1, c1, d2, c2)
    }

    pub fn total_codewords(self) -> usize {
        let (ec, c1, d1, c2, d2) = EC_BLOCK_TABLE[self.0 - 1][0];
        c1 * (d1 + ec) + c2 * (d2 + ec)
    }

    pub fn data_codewords(self, ec_level: ECLevel) -> usize {
        let (_, c1, d1, c2, d2) = EC_BLOCK_TABLE[self.0 - 1][ec_level as usize];
        c1 * d1 + c2 * d2
    }

    pub fn data_bit_capacity(self, ec_level: ECLevel) -> usize {
        self.data_codewords(ec_level) << 3
    }

    pub fn remainder_bits(self) -> usize {
        match self.0 {
            2..=6 => 7,
            14..=20 | 28..=34 => 3,
            21..=27 => 4,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod version_tests {
    use super::{ECLevel, Version};

    #[test]
    fn test_width() {
        assert_eq!(Version(1).width(), 21);
        assert_eq!(Version(7).width(), 45);
        assert_eq!(Version(40).width(), 177);
    }

    #[test]
    fn test_from_grid_size() {
        assert_eq!(Version::from_grid_size(21), Some(Version(1)));
        assert_eq!(Version::from_grid_size(177), Some(Version(40)));
        assert_eq!(Version::from_grid_size(22), None);
        assert_eq!(Version::from_grid_size(181), None);
    }

    #[test]
    fn test_total_codewords() {
        let totals = [
            26, 44, 70, 100, 134, 172, 196, 242, 292, 346, 404, 466, 532, 581, 655, 733, 815, 901,
            991, 1085, 1156, 1258, 1364, 1474, 1588, 1706, 1828, 1921, 2051, 2185, 2323, 2465,
            2611, 2761, 2876, 3034, 3196, 3362, 3532, 3706,
        ];
        for v in 1..=40 {
            assert_eq!(Version(v).total_codewords(), totals[v - 1], "v{v}");
        }
    }

    #[test]
    fn test_block_tables_agree_on_totals() {
        // Every level of a version must account for the same codeword count
        for v in 1..=40 {
            let ver = Version(v);
            let total = ver.total_codewords();
            for ecl in [ECLevel::L, ECLevel::M, ECLevel::Q, ECLevel::H] {
                let ec = ver.ecc_per_block(ecl);
                let (d1, c1, d2, c2) = ver.data_codewords_per_block(ecl);
                assert_eq!(
                    c1 * (d1 + ec) + c2 * (d2 + ec),
                    total,
                    "v{v} {ecl:?} blocks don't cover the symbol"
                );
            }
        }
    }

    #[test]
    fn test_module_accounting() {
        // size^2 = function modules + 8 * codewords + remainder bits
        for v in 1..=40 {
            let ver = Version(v);
            let w = ver.width();
            let finders = 3 * 64; // 7x7 finders with their separators
            let timing = 2 * (w - 16);
            let centers = ver.alignment_pattern().len();
            let aligns = if centers == 0 {
                0
            } else {
                let total = centers * centers - 3;
                // Alignment patterns overlapping the timing lines replace
                // 5 timing modules each
                let on_timing = 2 * (centers - 2);
                total * 25 - on_timing * 5
            };
            let format = 31; // 2x15 + dark module
            let version_info = if v >= 7 { 36 } else { 0 };
            let function = finders + timing + aligns + format + version_info;
            assert_eq!(
                w * w,
                function + 8 * ver.total_codewords() + ver.remainder_bits(),
                "v{v} module accounting"
            );
        }
    }

    #[test]
    fn test_version_info_bch() {
        assert_eq!(Version(7).info(), 0x07C94);
        assert_eq!(Version(21).info(), 0x15683);
        assert_eq!(Version(40).info(), 0x28C69);
    }
}

// Format info
//------------------------------------------------------------------------------

pub const FORMAT_INFO_BIT_LEN: usize = 15;

pub const FORMAT_ERROR_CAPACITY: u32 = 3;

pub const VERSION_ERROR_CAPACITY: u32 = 3;

const FORMAT_GEN: u32 = 0x537;

const VERSION_GEN: u32 = 0x1F25;

pub const FORMAT_MASK: u32 = 0x5412;

/// GF(2) polynomial residue of `value` modulo `poly`.
const fn gf2_residue(mut value: u32, poly: u32) -> u32 {
    let deg = 31 - poly.leading_zeros();
    while value >> deg != 0 {
        let shift = (31 - value.leading_zeros()) - deg;
        value ^= poly << shift;
    }
    value
}

/// All 32 masked 15-bit format codewords, indexed by (level_bits << 3 | mask).
pub static FORMAT_INFOS: [u32; 32] = {
    let mut infos = [0u32; 32];
    let mut i = 0u32;
    while i < 32 {
        let shifted = i << 10;
        infos[i as usize] = (shifted | gf2_residue(shifted, FORMAT_GEN)) ^ FORMAT_MASK;
        i += 1;
    }
    infos
};

/// The 34 valid 18-bit version codewords for v in 7..=40.
pub static VERSION_INFOS: [u32; 34] = {
    let mut infos = [0u32; 34];
    let mut v = 7u32;
    while v <= 40 {
        let shifted = v << 12;
        infos[(v - 7) as usize] = shifted | gf2_residue(shifted, VERSION_GEN);
        v += 1;
    }
    infos
};

pub fn generate_format_info(ec_level: ECLevel, mask: MaskPattern) -> u32 {
    FORMAT_INFOS[((ec_level.bits() << 3) | *mask as u32) as usize]
}

pub fn parse_format_info(info: u32) -> (ECLevel, MaskPattern) {
    let unmasked = info ^ FORMAT_MASK;
    let data = unmasked >> 10;
    let ec_level = ECLevel::from_bits(data >> 3).expect("2-bit value is always a level");
    let mask = MaskPattern::new((data & 0b111) as u8);
    (ec_level, mask)
}

/// Format info coordinates (x, y), LSB of the codeword first. Negative
/// indices wrap from the far edge.
pub static FORMAT_INFO_COORDS_MAIN: [(i16, i16); 15] = [
    (8, 0),
    (8, 1),
    (8, 2),
    (8, 3),
    (8, 4),
    (8, 5),
    (8, 7),
    (8, 8),
    (7, 8),
    (5, 8),
    (4, 8),
    (3, 8),
    (2, 8),
    (1, 8),
    (0, 8),
];

pub static FORMAT_INFO_COORDS_SIDE: [(i16, i16); 15] = [
    (-1, 8),
    (-2, 8),
    (-3, 8),
    (-4, 8),
    (-5, 8),
    (-6, 8),
    (-7, 8),
    (-8, 8),
    (8, -7),
    (8, -6),
    (8, -5),
    (8, -4),
    (8, -3),
    (8, -2),
    (8, -1),
];

/// Version info coordinates (x, y) for bits 0..18, LSB first. The
/// bottom-left block is 6 wide by 3 tall; the top-right block is its
/// transpose.
pub fn version_info_coords_bl() -> impl Iterator<Item = (i16, i16)> {
    (0..18).map(|i| (i / 3, -11 + (i % 3)))
}

pub fn version_info_coords_tr() -> impl Iterator<Item = (i16, i16)> {
    (0..18).map(|i| (-11 + (i % 3), i / 3))
}

#[cfg(test)]
mod format_info_tests {
    use super::*;
    use crate::common::mask::MaskPattern;

    #[test]
    fn test_generate_format_info() {
        // Worked example from the standard: M level, mask 5
        assert_eq!(generate_format_info(ECLevel::M, MaskPattern::new(5)), 0b100000011001110);
        assert_eq!(generate_format_info(ECLevel::L, MaskPattern::new(0)), 0b111011111000100);
    }

    #[test]
    fn test_parse_format_info() {
        for (i, &info) in FORMAT_INFOS.iter().enumerate() {
            let (ecl, mask) = parse_format_info(info);
            assert_eq!(((ecl.bits() << 3) | *mask as u32) as usize, i);
        }
    }

    #[test]
    fn test_format_info_distance() {
        // The 32 codewords are pairwise at Hamming distance >= 7, so up to
        // 3 bit errors are always repairable
        for (i, a) in FORMAT_INFOS.iter().enumerate() {
            for b in FORMAT_INFOS.iter().skip(i + 1) {
                assert!((a ^ b).count_ones() >= 7);
            }
        }
    }

    #[test]
    fn test_version_info_distance() {
        for (i, a) in VERSION_INFOS.iter().enumerate() {
            for b in VERSION_INFOS.iter().skip(i + 1) {
                assert!((a ^ b).count_ones() >= 8);
            }
        }
    }
}

// Version tables
//------------------------------------------------------------------------------

/// Per version and level: (ec codewords per block,
/// group1 count, group1 data codewords, group2 count, group2 data codewords).
static EC_BLOCK_TABLE: [[(usize, usize, usize, usize, usize); 4]; 40] = [
    // v1
    [(7, 1, 19, 0, 0), (10, 1, 16, 0, 0), (13, 1, 13, 0, 0), (17, 1, 9, 0, 0)],
    // v2
    [(10, 1, 34, 0, 0), (16, 1, 28, 0, 0), (22, 1, 22, 0, 0), (28, 1, 16, 0, 0)],
    // v3
    [(15, 1, 55, 0, 0), (26, 1, 44, 0, 0), (18, 2, 17, 0, 0), (22, 2, 13, 0, 0)],
    // v4
    [(20, 1, 80, 0, 0), (18, 2, 32, 0, 0), (26, 2, 24, 0, 0), (16, 4, 9, 0, 0)],
    // v5
    [(26, 1, 108, 0, 0), (24, 2, 43, 0, 0), (18, 2, 15, 2, 16), (22, 2, 11, 2, 12)],
    // v6
    [(18, 2, 68, 0, 0), (16, 4, 27, 0, 0), (24, 4, 19, 0, 0), (28, 4, 15, 0, 0)],
    // v7
    [(20, 2, 78, 0, 0), (18, 4, 31, 0, 0), (18, 2, 14, 4, 15), (26, 4, 13, 1, 14)],
    // v8
    [(24, 2, 97, 0, 0), (22, 2, 38, 2, 39), (22, 4, 18, 2, 19), (26, 4, 14, 2, 15)],
    // v9
    [(30, 2, 116, 0, 0), (22, 3, 36, 2, 37), (20, 4, 16, 4, 17), (24, 4, 12, 4, 13)],
    // v10
    [(18, 2, 68, 2, 69), (26, 4, 43, 1, 44), (24, 6, 19, 2, 20), (28, 6, 15, 2, 16)],
    // v11
    [(20, 4, 81, 0, 0), (30, 1, 50, 4, 51), (28, 4, 22, 4, 23), (24, 3, 12, 8, 13)],
    // v12
    [(24, 2, 92, 2, 93), (22, 6, 36, 2, 37), (26, 4, 20, 6, 21), (28, 7, 14, 4, 15)],
    // v13
    [(26, 4, 107, 0, 0), (22, 8, 37, 1, 38), (24, 8, 20, 4, 21), (22, 12, 11, 4, 12)],
    // v14
    [(30, 3, 115, 1, 116), (24, 4, 40, 5, 41), (20, 11, 16, 5, 17), (24, 11, 12, 5, 13)],
    // v15
    [(22, 5, 87, 1, 88), (24, 5, 41, 5, 42), (30, 5, 24, 7, 25), (24, 11, 12, 7, 13)],
    // v16
    [(24, 5, 98, 1, 99), (28, 7, 45, 3, 46), (24, 15, 19, 2, 20), (30, 3, 15, 13, 16)],
    // v17
    [(28, 1, 107, 5, 108), (28, 10, 46, 1, 47), (28, 1, 22, 15, 23), (28, 2, 14, 17, 15)],
    // v18
    [(30, 5, 120, 1, 121), (26, 9, 43, 4, 44), (28, 17, 22, 1, 23), (28, 2, 14, 19, 15)],
    // v19
    [(28, 3, 113, 4, 114), (26, 3, 44, 11, 45), (26, 17, 21, 4, 22), (26, 9, 13, 16, 14)],
    // v20
    [(28, 3, 107, 5, 108), (26, 3, 41, 13, 42), (30, 15, 24, 5, 25), (28, 15, 15, 10, 16)],
    // v21
    [(28, 4, 116, 4, 117), (26, 17, 42, 0, 0), (28, 17, 22, 6, 23), (30, 19, 16, 6, 17)],
    // v22
    [(28, 2, 111, 7, 112), (28, 17, 46, 0, 0), (30, 7, 24, 16, 25), (24, 34, 13, 0, 0)],
    // v23
    [(30, 4, 121, 5, 122), (28, 4, 47, 14, 48), (30, 11, 24, 14, 25), (30, 16, 15, 14, 16)],
    // v24
    [(30, 6, 117, 4, 118), (28, 6, 45, 14, 46), (30, 11, 24, 16, 25), (30, 30, 16, 2, 17)],
    // v25
    [(26, 8, 106, 4, 107), (28, 8, 47, 13, 48), (30, 7, 24, 22, 25), (30, 22, 15, 13, 16)],
    // v26
    [(28, 10, 114, 2, 115), (28, 19, 46, 4, 47), (28, 28, 22, 6, 23), (30, 33, 16, 4, 17)],
    // v27
    [(30, 8, 122, 4, 123), (28, 22, 45, 3, 46), (30, 8, 23, 26, 24), (30, 12, 15, 28, 16)],
    // v28
    [(30, 3, 117, 10, 118), (28, 3, 45, 23, 46), (30, 4, 24, 31, 25), (30, 11, 15, 31, 16)],
    // v29
    [(30, 7, 116, 7, 117), (28, 21, 45, 7, 46), (30, 1, 23, 37, 24), (30, 19, 15, 26, 16)],
    // v30
    [(30, 5, 115, 10, 116), (28, 19, 47, 10, 48), (30, 15, 24, 25, 25), (30, 23, 15, 25, 16)],
    // v31
    [(30, 13, 115, 3, 116), (28, 2, 46, 29, 47), (30, 42, 24, 1, 25), (30, 23, 15, 28, 16)],
    // v32
    [(30, 17, 115, 0, 0), (28, 10, 46, 23, 47), (30, 10, 24, 35, 25), (30, 19, 15, 35, 16)],
    // v33
    [(30, 17, 115, 1, 116), (28, 14, 46, 21, 47), (30, 29, 24, 19, 25), (30, 11, 15, 46, 16)],
    // v34
    [(30, 13, 115, 6, 116), (28, 14, 46, 23, 47), (30, 44, 24, 7, 25), (30, 59, 16, 1, 17)],
    // v35
    [(30, 12, 121, 7, 122), (28, 12, 47, 26, 48), (30, 39, 24, 14, 25), (30, 22, 15, 41, 16)],
    // v36
    [(30, 6, 121, 14, 122), (28, 6, 47, 34, 48), (30, 46, 24, 10, 25), (30, 2, 15, 64, 16)],
    // v37
    [(30, 17, 122, 4, 123), (28, 29, 46, 14, 47), (30, 49, 24, 10, 25), (30, 24, 15, 46, 16)],
    // v38
    [(30, 4, 122, 18, 123), (28, 13, 46, 32, 47), (30, 48, 24, 14, 25), (30, 42, 15, 32, 16)],
    // v39
    [(30, 20, 117, 4, 118), (28, 40, 47, 7, 48), (30, 43, 24, 22, 25), (30, 10, 15, 67, 16)],
    // v40
    [(30, 19, 118, 6, 119), (28, 18, 47, 31, 48), (30, 34, 24, 34, 25), (30, 20, 15, 61, 16)],
];

static ALIGNMENT_PATTERN_POSITIONS: [&[i16]; 40] = [
    &[],
    &[6, 18],
    &[6, 22],
    &[6, 26],
    &[6, 30],
    &[6, 34],
    &[6, 22, 38],
    &[6, 24, 42],
    &[6, 26, 46],
    &[6, 28, 50],
    &[6, 30, 54],
    &[6, 32, 58],
    &[6, 34, 62],
    &[6, 26, 46, 66],
    &[6, 26, 48, 70],
    &[6, 26, 50, 74],
    &[6, 30, 54, 78],
    &[6, 30, 56, 82],
    &[6, 30, 58, 86],
    &[6, 34, 62, 90],
    &[6, 28, 50, 72, 94],
    &[6, 26, 50, 74, 98],
    &[6, 30, 54, 78, 102],
    &[6, 28, 54, 80, 106],
    &[6, 32, 58, 84, 110],
    &[6, 30, 58, 86, 114],
    &[6, 34, 62, 90, 118],
    &[6, 26, 50, 74, 98, 122],
    &[6, 30, 54, 78, 102, 126],
    &[6, 26, 52, 78, 104, 130],
    &[6, 30, 56, 82, 108, 134],
    &[6, 34, 60, 86, 112, 138],
    &[6, 30, 58, 86, 114, 142],
    &[6, 34, 62, 90, 118, 146],
    &[6, 30, 54, 78, 102, 126, 150],
    &[6, 24, 50, 76, 102, 128, 154],
    &[6, 28, 54, 80, 106, 132, 158],
    &[6, 32, 58, 84, 110, 136, 162],
    &[6, 26, 54, 82, 110, 138, 166],
    &[6, 30, 58, 86, 114, 142, 170],
];
