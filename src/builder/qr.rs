use image::{GrayImage, Luma, Rgb, RgbImage};

use crate::common::{
    iter::EncRegionIter,
    mask::MaskPattern,
    matrix::BitMatrix,
    metadata::{
        generate_format_info, version_info_coords_bl, version_info_coords_tr, Color, ECLevel,
        Version, FORMAT_INFO_BIT_LEN, FORMAT_INFO_COORDS_MAIN, FORMAT_INFO_COORDS_SIDE,
    },
};

// Module
//------------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Module {
    Empty,
    Func(Color),
    Version(Color),
    Format(Color),
    Data(Color),
}

impl std::ops::Deref for Module {
    type Target = Color;
    fn deref(&self) -> &Self::Target {
        match self {
            Module::Empty => &Color::Dark,
            Module::Func(c) => c,
            Module::Version(c) => c,
            Module::Format(c) => c,
            Module::Data(c) => c,
        }
    }
}

// Render palette
//------------------------------------------------------------------------------

/// Foreground paints dark modules, background paints light modules and
/// the quiet zone.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Palette {
    pub foreground: [u8; 3],
    pub background: [u8; 3],
}

impl Default for Palette {
    fn default() -> Self {
        Self { foreground: [0, 0, 0], background: [255, 255, 255] }
    }
}

/// Quiet zone width in modules required by the symbology.
pub const QUIET_ZONE: u32 = 4;

// QR canvas
//------------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct QR {
    version: Version,
    width: usize,
    ec_level: ECLevel,
    mask_pattern: Option<MaskPattern>,
    grid: Vec<Module>,
}

impl QR {
    pub fn new(version: Version, ec_level: ECLevel) -> Self {
        let width = version.width();
        Self { version, width, ec_level, mask_pattern: None, grid: vec![Module::Empty; width * width] }
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn ec_level(&self) -> ECLevel {
        self.ec_level
    }

    pub fn mask_pattern(&self) -> Option<MaskPattern> {
        self.mask_pattern
    }

    pub fn count_dark_modules(&self) -> usize {
        self.grid.iter().filter(|&m| matches!(**m, Color::Dark)).count()
    }

    pub fn to_debug_str(&self) -> String {
        let w = self.width as i16;
        let mut res = String::with_capacity((w * (w + 1)) as usize);
        res.push('\n');
        for i in 0..w {
            for j in 0..w {
                let c = match self.get(i, j) {
                    Module::Empty => '.',
                    Module::Func(Color::Dark) => 'f',
                    Module::Func(Color::Light) => 'F',
                    Module::Version(Color::Dark) => 'v',
                    Module::Version(Color::Light) => 'V',
                    Module::Format(Color::Dark) => 'm',
                    Module::Format(Color::Light) => 'M',
                    Module::Data(Color::Dark) => 'd',
                    Module::Data(Color::Light) => 'D',
                };
                res.push(c);
            }
            res.push('\n');
        }
        res
    }

    fn coord_to_index(&self, r: i16, c: i16) -> usize {
        let w = self.width as i16;
        debug_assert!(-w <= r && r < w, "row out of bounds");
        debug_assert!(-w <= c && c < w, "column out of bounds");

        let r = if r < 0 { r + w } else { r };
        let c = if c < 0 { c + w } else { c };
        (r * w + c) as _
    }

    /// Negative indices count back from the far edge.
    pub fn get(&self, r: i16, c: i16) -> Module {
        self.grid[self.coord_to_index(r, c)]
    }

    pub fn get_mut(&mut self, r: i16, c: i16) -> &mut Module {
        let index = self.coord_to_index(r, c);
        &mut self.grid[index]
    }

    pub fn set(&mut self, r: i16, c: i16, module: Module) {
        *self.get_mut(r, c) = module;
    }
}


// Finder patterns
//------------------------------------------------------------------------------

impl QR {
    fn draw_finder_patterns(&mut self) {
        self.draw_finder_pattern_at(3, 3);
        self.draw_finder_pattern_at(3, -4);
        self.draw_finder_pattern_at(-4, 3);
    }

    // Draws the 7x7 concentric square plus its light separator ring
    fn draw_finder_pattern_at(&mut self, r: i16, c: i16) {
        let (dr_top, dr_bottom) = if r > 0 { (-3, 4) } else { (-4, 3) };
        let (dc_left, dc_right) = if c > 0 { (-3, 4) } else { (-4, 3) };
        for i in dr_top..=dr_bottom {
            for j in dc_left..=dc_right {
                self.set(
                    r + i,
                    c + j,
                    match (i, j) {
                        (4 | -4, _) | (_, 4 | -4) => Module::Func(Color::Light),
                        (3 | -3, _) | (_, 3 | -3) => Module::Func(Color::Dark),
                        (2 | -2, _) | (_, 2 | -2) => Module::Func(Color::Light),
                        _ => Module::Func(Color::Dark),
                    },
                );
            }
        }
    }
}

#[cfg(test)]
mod finder_pattern_tests {
    use super::QR;
    use crate::common::metadata::{ECLevel, Version};

    #[test]
    fn test_finder_patterns() {
        let mut qr = QR::new(Version::new(1).unwrap(), ECLevel::L);
        qr.draw_finder_patterns();
        assert_eq!(
            qr.to_debug_str(),
            "\n\
             fffffffF.....Ffffffff\n\
             fFFFFFfF.....FfFFFFFf\n\
             fFfffFfF.....FfFfffFf\n\
             fFfffFfF.....FfFfffFf\n\
             fFfffFfF.....FfFfffFf\n\
             fFFFFFfF.....FfFFFFFf\n\
             fffffffF.....Ffffffff\n\
             FFFFFFFF.....FFFFFFFF\n\
             .....................\n\
             .....................\n\
             .....................\n\
             .....................\n\
             .....................\n\
             FFFFFFFF.............\n\
             fffffffF.............\n\
             fFFFFFfF.............\n\
             fFfffFfF.............\n\
             fFfffFfF.............\n\
             fFfffFfF.............\n\
             fFFFFFfF.............\n\
             fffffffF.............\n"
        );
    }
}

// Timing patterns
//------------------------------------------------------------------------------

impl QR {
    fn draw_timing_patterns(&mut self) {
        let w = self.width as i16;
        self.draw_line(6, 8, 6, w - 9);
        self.draw_line(8, 6, w - 9, 6);
    }

    fn draw_line(&mut self, r1: i16, c1: i16, r2: i16, c2: i16) {
        debug_assert!(r1 == r2 || c1 == c2, "Line is neither vertical nor horizontal");

        if r1 == r2 {
            for j in c1..=c2 {
                let m =
                    if j & 1 == 0 { Module::Func(Color::Dark) } else { Module::Func(Color::Light) };
                self.set(r1, j, m);
            }
        } else {
            for i in r1..=r2 {
                let m =
                    if i & 1 == 0 { Module::Func(Color::Dark) } else { Module::Func(Color::Light) };
                self.set(i, c1, m);
            }
        }
    }
}


// Alignment patterns
//------------------------------------------------------------------------------

impl QR {
    fn draw_alignment_patterns(&mut self) {
        let positions = self.version.alignment_pattern();
        for &r in positions {
            for &c in positions {
                self.draw_alignment_pattern_at(r, c)
            }
        }
    }

    fn draw_alignment_pattern_at(&mut self, r: i16, c: i16) {
        let w = self.width as i16;
        // Skip the three centers inside finder patterns
        if (r == 6 && (c == 6 || c - w == -7)) || (r - w == -7 && c == 6) {
            return;
        }
        for i in -2..=2 {
            for j in -2..=2 {
                self.set(
                    r + i,
                    c + j,
                    match (i, j) {
                        (-2 | 2, _) | (_, -2 | 2) | (0, 0) => Module::Func(Color::Dark),
                        _ => Module::Func(Color::Light),
                    },
                )
            }
        }
    }
}


// All function patterns
//------------------------------------------------------------------------------

impl QR {
    pub fn draw_all_function_patterns(&mut self) {
        self.draw_finder_patterns();
        self.draw_timing_patterns();
        self.draw_alignment_patterns();
    }
}

// Format & version info
//------------------------------------------------------------------------------

impl QR {
    fn reserve_format_area(&mut self) {
        self.draw_format_info((1 << FORMAT_INFO_BIT_LEN) - 1);
    }

    fn draw_format_info(&mut self, format_info: u32) {
        self.draw_number(format_info, Module::Format(Color::Light), Module::Format(Color::Dark), &FORMAT_INFO_COORDS_MAIN);
        self.draw_number(format_info, Module::Format(Color::Light), Module::Format(Color::Dark), &FORMAT_INFO_COORDS_SIDE);
        // Dark module
        self.set(-8, 8, Module::Format(Color::Dark));
    }

    fn draw_version_info(&mut self) {
        if *self.version < 7 {
            return;
        }
        let info = self.version.info();
        let bl = version_info_coords_bl().collect::<Vec<_>>();
        let tr = version_info_coords_tr().collect::<Vec<_>>();
        self.draw_number(info, Module::Version(Color::Light), Module::Version(Color::Dark), &bl);
        self.draw_number(info, Module::Version(Color::Light), Module::Version(Color::Dark), &tr);
    }

    // Coordinates are (x, y) pairs carrying bit 0 first
    fn draw_number(
        &mut self,
        number: u32,
        off_color: Module,
        on_color: Module,
        coords: &[(i16, i16)],
    ) {
        for (i, (x, y)) in coords.iter().enumerate() {
            let module = if number >> i & 1 == 0 { off_color } else { on_color };
            self.set(*y, *x, module);
        }
    }
}


// Encoding region
//------------------------------------------------------------------------------

impl QR {
    pub fn draw_encoding_region(&mut self, payload: &[u8]) {
        self.reserve_format_area();
        self.draw_version_info();
        self.draw_payload(payload);

        debug_assert!(!self.grid.contains(&Module::Empty), "Empty module found after drawing");
    }

    fn draw_payload(&mut self, payload: &[u8]) {
        let mut coords = EncRegionIter::new(self.version);
        self.draw_codewords(payload, &mut coords);
        self.fill_remainder_bits(&mut coords);
    }

    fn draw_codewords(&mut self, codewords: &[u8], coords: &mut EncRegionIter) {
        for &codeword in codewords.iter() {
            for i in (0..8).rev() {
                let bit = (codeword >> i) & 1;
                let module = Module::Data(if bit == 0 { Color::Light } else { Color::Dark });
                for (r, c) in coords.by_ref() {
                    if matches!(self.get(r, c), Module::Empty) {
                        self.set(r, c, module);
                        break;
                    }
                }
            }
        }
    }

    fn fill_remainder_bits(&mut self, coords: &mut EncRegionIter) {
        let empty_modules =
            coords.filter(|(r, c)| self.get(*r, *c) == Module::Empty).collect::<Vec<_>>();
        debug_assert!(
            self.version.remainder_bits() == empty_modules.len(),
            "Incorrect number of empty modules for remainder bits: Version {:?}, Empty bits {}",
            self.version,
            empty_modules.len()
        );
        empty_modules.iter().for_each(|(r, c)| self.set(*r, *c, Module::Data(Color::Light)));
    }

    pub fn mask(&mut self, pattern: MaskPattern) {
        self.mask_pattern = Some(pattern);
        let mask_function = pattern.mask_function();
        let w = self.width as i16;
        for r in 0..w {
            for c in 0..w {
                if mask_function(c, r) {
                    if let Module::Data(clr) = self.get(r, c) {
                        self.set(r, c, Module::Data(!clr))
                    }
                }
            }
        }
        let format_info = generate_format_info(self.ec_level, pattern);
        self.draw_format_info(format_info);
    }
}

/// Marks every function-pattern and info cell of a version; the parser
/// skips these while extracting codewords.
pub(crate) fn function_map(version: Version) -> BitMatrix {
    let mut qr = QR::new(version, ECLevel::L);
    qr.draw_all_function_patterns();
    qr.reserve_format_area();
    qr.draw_version_info();

    let w = qr.width();
    let mut map = BitMatrix::square(w);
    for r in 0..w {
        for c in 0..w {
            if !matches!(qr.get(r as i16, c as i16), Module::Empty) {
                map.set(c, r);
            }
        }
    }
    map
}

// Render
//------------------------------------------------------------------------------

impl QR {
    pub fn to_bit_matrix(&self) -> BitMatrix {
        let w = self.width;
        let mut matrix = BitMatrix::square(w);
        for r in 0..w {
            for c in 0..w {
                if matches!(*self.get(r as i16, c as i16), Color::Dark) {
                    matrix.set(c, r);
                }
            }
        }
        matrix
    }

    pub fn to_image(&self, module_size: u32) -> GrayImage {
        self.to_image_with_margin(module_size, QUIET_ZONE)
    }

    pub fn to_image_with_margin(&self, module_size: u32, margin: u32) -> GrayImage {
        let qz_size = margin * module_size;
        let qr_size = self.width as u32 * module_size;
        let total_size = qz_size + qr_size + qz_size;

        let mut canvas = GrayImage::new(total_size, total_size);
        for y in 0..total_size {
            for x in 0..total_size {
                if y < qz_size || y >= qz_size + qr_size || x < qz_size || x >= qz_size + qr_size {
                    canvas.put_pixel(x, y, Luma([255]));
                    continue;
                }
                let r = ((y - qz_size) / module_size) as i16;
                let c = ((x - qz_size) / module_size) as i16;
                let pixel = self.get(r, c).select(Luma([0]), Luma([255]));
                canvas.put_pixel(x, y, pixel);
            }
        }
        canvas
    }

    pub fn to_rgb_image(&self, module_size: u32, margin: u32, palette: &Palette) -> RgbImage {
        let qz_size = margin * module_size;
        let qr_size = self.width as u32 * module_size;
        let total_size = qz_size + qr_size + qz_size;

        let mut canvas = RgbImage::new(total_size, total_size);
        for y in 0..total_size {
            for x in 0..total_size {
                if y < qz_size || y >= qz_size + qr_size || x < qz_size || x >= qz_size + qr_size {
                    canvas.put_pixel(x, y, Rgb(palette.background));
                    continue;
                }
                let r = ((y - qz_size) / module_size) as i16;
                let c = ((x - qz_size) / module_size) as i16;
                let pixel = self.get(r, c).select(Rgb(palette.foreground), Rgb(palette.background));
                canvas.put_pixel(x, y, pixel);
            }
        }
        canvas
    }

    pub fn to_str(&self, module_size: usize) -> String {
        let qz_size = QUIET_ZONE as usize * module_size;
        let qr_size = self.width * module_size;
        let total_size = qz_size + qr_size + qz_size;

        let mut canvas = String::new();
        for i in 0..total_size {
            for j in 0..total_size {
                if i < qz_size || i >= qz_size + qr_size || j < qz_size || j >= qz_size + qr_size {
                    canvas.push('█');
                    continue;
                }
                let r = ((i - qz_size) / module_size) as i16;
                let c = ((j - qz_size) / module_size) as i16;
                canvas.push(self.get(r, c).select(' ', '█'));
            }
            canvas.push('\n');
        }
        canvas
    }
}

#[cfg(test)]
mod render_tests {
    use super::{Palette, QR};
    use crate::builder::QRBuilder;
    use crate::common::metadata::ECLevel;

    fn sample() -> QR {
        QRBuilder::new(b"RENDER").ec_level(ECLevel::M).build().unwrap()
    }

    #[test]
    fn test_image_dimensions() {
        let qr = sample();
        let img = qr.to_image(4);
        let exp = ((qr.width() + 8) * 4) as u32;
        assert_eq!(img.dimensions(), (exp, exp));
    }

    #[test]
    fn test_margin_is_uniform_background() {
        let qr = sample();
        let img = qr.to_image_with_margin(2, 3);
        let total = img.width();
        for i in 0..total {
            assert_eq!(img.get_pixel(i, 0)[0], 255);
            assert_eq!(img.get_pixel(0, i)[0], 255);
            assert_eq!(img.get_pixel(i, total - 1)[0], 255);
            assert_eq!(img.get_pixel(total - 1, i)[0], 255);
        }
    }

    #[test]
    fn test_rgb_palette() {
        let qr = sample();
        let palette = Palette { foreground: [20, 30, 40], background: [250, 240, 230] };
        let img = qr.to_rgb_image(1, 1, &palette);
        // Top-left finder corner module is dark
        assert_eq!(img.get_pixel(1, 1).0, [20, 30, 40]);
        assert_eq!(img.get_pixel(0, 0).0, [250, 240, 230]);
    }

    #[test]
    fn test_bit_matrix_matches_modules() {
        let qr = sample();
        let m = qr.to_bit_matrix();
        assert_eq!(m.width(), qr.width());
        assert_eq!(m.count_set(), qr.count_dark_modules());
        // Finder corners
        assert!(m.get(0, 0));
        assert!(m.get(m.width() - 1, 0));
        assert!(m.get(0, m.width() - 1));
    }
}
