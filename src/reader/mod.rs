pub mod binarize;
pub mod detect;
pub mod finder;
pub mod parse;
pub mod perspective;

pub use binarize::Binarize;
pub use detect::{Detection, Detector};

use image::GrayImage;

use crate::common::{
    bits::BitStream,
    codec::{decode, Fnc1, StructuredAppend},
    ec::Block,
    error::{QRError, QRResult},
    mask::MaskPattern,
    matrix::BitMatrix,
    metadata::{ECLevel, Version},
};
use parse::parse;

// Decoded symbol
//------------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Decoded {
    pub content: String,
    /// Rectified data codewords, deinterleaved
    pub codewords: Vec<u8>,
    pub structured: Option<StructuredAppend>,
    pub symbology: String,
    pub fnc1: Option<Fnc1>,
    pub version: Version,
    pub ec_level: ECLevel,
    pub mask: MaskPattern,
    pub mirrored: bool,
    pub corrected_errors: usize,
}

// Reader
//------------------------------------------------------------------------------

pub struct QRReader();

impl QRReader {
    /// Decodes a sampled module matrix, trying the mirrored orientation
    /// once when the direct read fails anywhere between the version read
    /// and error correction.
    pub fn decode(matrix: &BitMatrix) -> QRResult<Decoded> {
        match Self::decode_oriented(matrix, false) {
            Ok(decoded) => Ok(decoded),
            Err(_) => Self::decode_oriented(&matrix.transposed(), true),
        }
    }

    fn decode_oriented(matrix: &BitMatrix, mirrored: bool) -> QRResult<Decoded> {
        let parsed = parse(matrix)?;
        let (version, ec_level) = (parsed.version, parsed.ec_level);

        let blocks = Self::deinterleave(&parsed.codewords, version, ec_level);

        let mut corrected_errors = 0;
        let mut enc = BitStream::new(version.data_bit_capacity(ec_level));
        let mut rectified = Vec::with_capacity(version.data_codewords(ec_level));
        for mut block in blocks {
            corrected_errors += block.rectify()?;
            enc.extend(block.data());
            rectified.extend_from_slice(block.data());
        }

        let payload = decode(&mut enc, version)?;

        Ok(Decoded {
            content: payload.content,
            codewords: rectified,
            structured: payload.structured,
            symbology: payload.symbology,
            fnc1: payload.fnc1,
            version,
            ec_level,
            mask: parsed.mask,
            mirrored,
            corrected_errors,
        })
    }

    /// Reads the first decodable symbol in the image.
    pub fn read(img: &GrayImage) -> QRResult<Decoded> {
        let binary = img.binarize()?;

        let mut detector = Detector::new(&binary);
        while let Some(detection) = detector.advance(false) {
            if let Ok(decoded) = Self::decode(&detection.matrix) {
                return Ok(decoded);
            }
        }
        Err(QRError::DetectionExhausted)
    }

    /// Full pipeline: binarize, detect and decode every symbol in the
    /// image. Detection advances on the decode outcome of each
    /// candidate.
    pub fn scan(img: &GrayImage) -> Vec<Decoded> {
        let Ok(binary) = img.binarize() else { return Vec::new() };

        let mut decoded = Vec::new();
        let mut detector = Detector::new(&binary);
        let mut success = false;
        while let Some(detection) = detector.advance(success) {
            match Self::decode(&detection.matrix) {
                Ok(d) => {
                    decoded.push(d);
                    success = true;
                }
                Err(_) => success = false,
            }
        }
        decoded
    }

    /// Splits the interleaved stream back into blocks: data codewords
    /// striped by index over all blocks (short blocks first), then ec
    /// codewords striped the same way.
    fn deinterleave(data: &[u8], version: Version, ec_level: ECLevel) -> Vec<Block> {
        // b1s = block1_size, b1c = block1_count
        let (b1s, b1c, b2s, b2c) = version.data_codewords_per_block(ec_level);
        let ec_len = version.ecc_per_block(ec_level);

        let total_blocks = b1c + b2c;
        let split = b1s * total_blocks;
        let data_size = b1s * b1c + b2s * b2c;

        let mut blocks = vec![Vec::with_capacity(b2s + ec_len); total_blocks];

        // Data codewords: every block participates up to the shorter
        // length, the tail indices come from longer blocks only
        data[..split]
            .chunks(total_blocks)
            .for_each(|ch| ch.iter().enumerate().for_each(|(i, v)| blocks[i].push(*v)));
        if b2c > 0 {
            data[split..data_size]
                .chunks(b2c)
                .for_each(|ch| ch.iter().enumerate().for_each(|(i, v)| blocks[b1c + i].push(*v)));
        }

        // EC codewords
        data[data_size..]
            .chunks(total_blocks)
            .for_each(|ch| ch.iter().enumerate().for_each(|(i, v)| blocks[i].push(*v)));

        blocks.iter().map(|b| Block::with_encoded(b, b.len() - ec_len)).collect()
    }
}

#[cfg(test)]
mod reader_tests {
    use test_case::test_case;

    use super::QRReader;
    use crate::builder::QRBuilder;
    use crate::common::metadata::{ECLevel, Version};

    #[test]
    fn test_deinterleave_inverts_interleave() {
        let ver = Version::new(5).unwrap();
        let ecl = ECLevel::Q;
        let data: Vec<u8> = (0..ver.data_codewords(ecl) as u32).map(|i| (i * 7) as u8).collect();

        let exp_blocks = QRBuilder::blockify(&data, ver, ecl);

        let data_views = exp_blocks.iter().map(|b| b.data()).collect::<Vec<_>>();
        let ec_views = exp_blocks.iter().map(|b| b.ecc()).collect::<Vec<_>>();
        let mut stream = QRBuilder::interleave(&data_views);
        stream.extend(QRBuilder::interleave(&ec_views));

        let blocks = QRReader::deinterleave(&stream, ver, ecl);
        assert_eq!(blocks, exp_blocks);
    }

    #[test]
    fn test_deinterleave_uneven_blocks() {
        // v10 L has two 68-byte and two 69-byte blocks
        let ver = Version::new(10).unwrap();
        let ecl = ECLevel::L;
        let data: Vec<u8> = (0..ver.data_codewords(ecl) as u32).map(|i| (i % 251) as u8).collect();

        let exp_blocks = QRBuilder::blockify(&data, ver, ecl);
        let data_views = exp_blocks.iter().map(|b| b.data()).collect::<Vec<_>>();
        let ec_views = exp_blocks.iter().map(|b| b.ecc()).collect::<Vec<_>>();
        let mut stream = QRBuilder::interleave(&data_views);
        stream.extend(QRBuilder::interleave(&ec_views));

        let blocks = QRReader::deinterleave(&stream, ver, ecl);
        assert_eq!(blocks, exp_blocks);
    }

    #[test_case("Hello, world!🌎", 1, ECLevel::L)]
    #[test_case("TEST", 1, ECLevel::M)]
    #[test_case("12345", 1, ECLevel::Q)]
    #[test_case("OK", 1, ECLevel::H)]
    #[test_case("A11111111111111", 2, ECLevel::M)]
    #[test_case("aAAAAAA1111111111111AAAAAAa", 5, ECLevel::Q)]
    #[test_case("1234567890", 7, ECLevel::H)]
    fn test_decode_matrix_round_trip(data: &str, version: usize, ecl: ECLevel) {
        let qr = QRBuilder::new(data.as_bytes())
            .version(Version::new(version).unwrap())
            .ec_level(ecl)
            .build()
            .unwrap();

        let decoded = QRReader::decode(&qr.to_bit_matrix()).unwrap();
        assert_eq!(decoded.content, data);
        assert_eq!(decoded.version, Version::new(version).unwrap());
        assert_eq!(decoded.ec_level, ecl);
        assert_eq!(decoded.mask, qr.mask_pattern().unwrap());
        assert!(!decoded.mirrored);
        assert_eq!(decoded.corrected_errors, 0);
    }

    #[test]
    fn test_decode_mirrored_matrix() {
        let qr = QRBuilder::new(b"MIRROR MIRROR").ec_level(ECLevel::M).build().unwrap();
        let mirrored = qr.to_bit_matrix().transposed();

        let decoded = QRReader::decode(&mirrored).unwrap();
        assert_eq!(decoded.content, "MIRROR MIRROR");
        assert!(decoded.mirrored);
    }

    #[test]
    fn test_decode_with_damaged_codewords() {
        let ver = Version::new(2).unwrap();
        let qr = QRBuilder::new(b"DAMAGE TOLERANT").ec_level(ECLevel::Q).build().unwrap();
        let mut m = qr.to_bit_matrix();

        // v2 Q corrects up to 11 codewords; flipping two full modules'
        // bytes worth of cells in the data region damages at most a few
        for (x, y) in [(12, 22), (13, 22), (12, 23), (13, 23)] {
            m.flip(x, y);
        }

        let decoded = QRReader::decode(&m).unwrap();
        assert_eq!(decoded.content, "DAMAGE TOLERANT");
        assert_eq!(decoded.version, ver);
        assert!(decoded.corrected_errors > 0);
    }

    #[test]
    fn test_scan_rendered_image() {
        let qr = QRBuilder::new(b"SCAN PIPELINE").ec_level(ECLevel::M).build().unwrap();
        let img = qr.to_image(6);

        let decoded = QRReader::scan(&img);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].content, "SCAN PIPELINE");
    }

    #[test]
    fn test_scan_blank_image() {
        let img = image::GrayImage::from_pixel(120, 120, image::Luma([255]));
        assert!(QRReader::scan(&img).is_empty());
    }

    #[test]
    fn test_read_single_symbol() {
        let qr = QRBuilder::new(b"FIRST HIT").ec_level(ECLevel::M).build().unwrap();
        let decoded = QRReader::read(&qr.to_image(5)).unwrap();
        assert_eq!(decoded.content, "FIRST HIT");
    }

    #[test]
    fn test_read_exhausts_on_blank() {
        let img = image::GrayImage::from_pixel(120, 120, image::Luma([255]));
        assert_eq!(
            QRReader::read(&img).unwrap_err(),
            crate::common::error::QRError::DetectionExhausted
        );
    }
}
