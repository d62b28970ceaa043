use crate::builder::function_map;
use crate::common::{
    ec::rectify_info,
    error::{QRError, QRResult},
    iter::EncRegionIter,
    mask::MaskPattern,
    matrix::BitMatrix,
    metadata::{
        parse_format_info, version_info_coords_bl, version_info_coords_tr, ECLevel, Version,
        FORMAT_ERROR_CAPACITY, FORMAT_INFOS, FORMAT_INFO_COORDS_MAIN, FORMAT_INFO_COORDS_SIDE,
        VERSION_ERROR_CAPACITY, VERSION_INFOS,
    },
};

// Matrix parser
//------------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ParsedMatrix {
    pub version: Version,
    pub ec_level: ECLevel,
    pub mask: MaskPattern,
    pub codewords: Vec<u8>,
}

/// Reads version, format and codewords off a sampled module matrix. The
/// mirrored retry lives in the caller; this parses one orientation.
pub fn parse(matrix: &BitMatrix) -> QRResult<ParsedMatrix> {
    if matrix.width() != matrix.height() {
        return Err(QRError::VersionUnreadable);
    }
    let size = matrix.width();
    let provisional = Version::from_grid_size(size).ok_or(QRError::VersionUnreadable)?;

    let version = if *provisional <= 6 { provisional } else { read_version_info(matrix)? };
    if version.width() != size {
        return Err(QRError::VersionUnreadable);
    }

    let (ec_level, mask) = read_format_info(matrix)?;
    let codewords = extract_codewords(matrix, version, mask);

    Ok(ParsedMatrix { version, ec_level, mask, codewords })
}

#[inline]
fn get_wrapped(matrix: &BitMatrix, x: i16, y: i16) -> bool {
    let w = matrix.width() as i16;
    let x = if x < 0 { x + w } else { x };
    let y = if y < 0 { y + w } else { y };
    matrix.get(x as usize, y as usize)
}

/// Coordinate lists carry bit 0 first.
fn read_number(matrix: &BitMatrix, coords: impl Iterator<Item = (i16, i16)>) -> u32 {
    let mut number = 0;
    for (i, (x, y)) in coords.enumerate() {
        number |= (get_wrapped(matrix, x, y) as u32) << i;
    }
    number
}

/// Both 6x3 blocks are tried; either within Hamming distance 3 of a
/// valid codeword settles the version.
fn read_version_info(matrix: &BitMatrix) -> QRResult<Version> {
    for coords in [
        read_number(matrix, version_info_coords_bl()),
        read_number(matrix, version_info_coords_tr()),
    ] {
        if let Some(info) = rectify_info(coords, &VERSION_INFOS, VERSION_ERROR_CAPACITY) {
            return Version::new((info >> 12) as usize);
        }
    }
    Err(QRError::VersionUnreadable)
}

fn read_format_info(matrix: &BitMatrix) -> QRResult<(ECLevel, MaskPattern)> {
    for coords in [FORMAT_INFO_COORDS_MAIN, FORMAT_INFO_COORDS_SIDE] {
        let raw = read_number(matrix, coords.iter().copied());
        if let Some(info) = rectify_info(raw, &FORMAT_INFOS, FORMAT_ERROR_CAPACITY) {
            return Ok(parse_format_info(info));
        }
    }
    Err(QRError::FormatInfoUnreadable)
}

/// Walks the encoding region, unmasking every data cell, and packs the
/// bits into codewords. Remainder bits past the last codeword are
/// dropped.
fn extract_codewords(matrix: &BitMatrix, version: Version, mask: MaskPattern) -> Vec<u8> {
    let func = function_map(version);
    let mask_fn = mask.mask_function();
    let total = version.total_codewords();

    let mut codewords = Vec::with_capacity(total);
    let mut byte = 0u8;
    let mut bits = 0;
    for (r, c) in EncRegionIter::new(version) {
        if func.get(c as usize, r as usize) {
            continue;
        }
        let bit = matrix.get(c as usize, r as usize) ^ mask_fn(c, r);
        byte = (byte << 1) | bit as u8;
        bits += 1;
        if bits == 8 {
            codewords.push(byte);
            byte = 0;
            bits = 0;
            if codewords.len() == total {
                break;
            }
        }
    }
    codewords
}

#[cfg(test)]
mod parse_tests {
    use super::*;
    use crate::builder::{QRBuilder, QR};
    use crate::common::metadata::ECLevel;

    fn build(data: &str, version: usize, ec_level: ECLevel) -> QR {
        QRBuilder::new(data.as_bytes())
            .version(Version::new(version).unwrap())
            .ec_level(ec_level)
            .build()
            .unwrap()
    }

    #[test]
    fn test_parse_reads_metadata() {
        let qr = build("PARSE", 1, ECLevel::Q);
        let parsed = parse(&qr.to_bit_matrix()).unwrap();
        assert_eq!(parsed.version, Version::new(1).unwrap());
        assert_eq!(parsed.ec_level, ECLevel::Q);
        assert_eq!(parsed.mask, qr.mask_pattern().unwrap());
        assert_eq!(parsed.codewords.len(), Version::new(1).unwrap().total_codewords());
    }

    #[test]
    fn test_parse_version_from_info_blocks() {
        let qr = build("VERSION SEVEN", 7, ECLevel::L);
        let parsed = parse(&qr.to_bit_matrix()).unwrap();
        assert_eq!(parsed.version, Version::new(7).unwrap());
    }

    #[test]
    fn test_parse_version_with_corrupt_block() {
        let qr = build("VERSION SEVEN", 7, ECLevel::L);
        let mut m = qr.to_bit_matrix();
        // Damage three bits of the bottom-left block
        for (x, y) in version_info_coords_bl().take(3) {
            let w = m.width() as i16;
            let (x, y) = (x as usize, (y + w) as usize);
            m.flip(x, y);
        }
        let parsed = parse(&m).unwrap();
        assert_eq!(parsed.version, Version::new(7).unwrap());
    }

    #[test]
    fn test_parse_format_with_damaged_main_copy() {
        let qr = build("FORMAT", 2, ECLevel::H);
        let mut m = qr.to_bit_matrix();
        // Three bit errors stay within repair range of the original and
        // outside range of every other codeword
        for (x, y) in FORMAT_INFO_COORDS_MAIN.iter().take(3) {
            m.flip(*x as usize, *y as usize);
        }
        let parsed = parse(&m).unwrap();
        assert_eq!(parsed.ec_level, ECLevel::H);
        assert_eq!(parsed.mask, qr.mask_pattern().unwrap());
    }

    #[test]
    fn test_parse_format_with_both_copies_inverted() {
        let qr = build("FORMAT", 2, ECLevel::H);
        let mut m = qr.to_bit_matrix();
        let w = m.width() as i16;
        for (x, y) in FORMAT_INFO_COORDS_MAIN.iter().chain(FORMAT_INFO_COORDS_SIDE.iter()) {
            let x = if *x < 0 { x + w } else { *x } as usize;
            let y = if *y < 0 { y + w } else { *y } as usize;
            m.flip(x, y);
        }
        // Flipping all 15 bits of both copies yields another valid-ish
        // word only if the complement is in the table; either way the
        // original must not come back
        match parse(&m) {
            Ok(parsed) => assert_ne!(
                (parsed.ec_level, parsed.mask),
                (qr.ec_level(), qr.mask_pattern().unwrap())
            ),
            Err(e) => assert_eq!(e, QRError::FormatInfoUnreadable),
        }
    }

    #[test]
    fn test_parse_rejects_bad_size() {
        let m = BitMatrix::square(20);
        assert_eq!(parse(&m).unwrap_err(), QRError::VersionUnreadable);
    }

    #[test]
    fn test_extracted_codewords_round_trip() {
        // The first data codeword of a Byte-mode v1 symbol starts with
        // nibble 0100 and the upper length bits
        let qr = build("ROUNDTRIP", 1, ECLevel::L);
        let parsed = parse(&qr.to_bit_matrix()).unwrap();
        assert_eq!(parsed.codewords[0] >> 4, 0b0100);
    }
}
