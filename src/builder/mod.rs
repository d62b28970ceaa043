mod qr;

pub(crate) use qr::function_map;
pub use qr::{Module, Palette, QR, QUIET_ZONE};

use crate::common::{
    bits::BitStream,
    codec::{encode, encode_segments, encode_with_version, Fnc1, Segment, StructuredAppend},
    ec::Block,
    error::QRResult,
    mask::{apply_best_mask, MaskPattern},
    metadata::{ECLevel, Version},
};

// Builder
//------------------------------------------------------------------------------

pub struct QRBuilder<'a> {
    data: &'a [u8],
    segments: Option<Vec<Segment>>,
    version: Option<Version>,
    ec_level: ECLevel,
    mask: Option<MaskPattern>,
    fnc1: Option<Fnc1>,
    structured: Option<StructuredAppend>,
}

impl<'a> QRBuilder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            segments: None,
            version: None,
            ec_level: ECLevel::M,
            mask: None,
            fnc1: None,
            structured: None,
        }
    }

    /// Explicit segments override auto-segmentation of `data`.
    pub fn segments(&mut self, segments: Vec<Segment>) -> &mut Self {
        self.segments = Some(segments);
        self
    }

    pub fn version(&mut self, version: Version) -> &mut Self {
        self.version = Some(version);
        self
    }

    pub fn unset_version(&mut self) -> &mut Self {
        self.version = None;
        self
    }

    pub fn ec_level(&mut self, ec_level: ECLevel) -> &mut Self {
        self.ec_level = ec_level;
        self
    }

    pub fn mask(&mut self, mask: MaskPattern) -> &mut Self {
        self.mask = Some(mask);
        self
    }

    pub fn fnc1(&mut self, fnc1: Fnc1) -> &mut Self {
        self.fnc1 = Some(fnc1);
        self
    }

    pub fn structured_append(&mut self, index: u8, count: u8, parity: u8) -> &mut Self {
        self.structured = Some(StructuredAppend { index, count, parity });
        self
    }

    pub fn metadata(&self) -> String {
        match self.version {
            Some(v) => format!("{{ Version: {}, Ec level: {:?} }}", *v, self.ec_level),
            None => format!("{{ Version: None, Ec level: {:?} }}", self.ec_level),
        }
    }
}

#[cfg(test)]
mod qrbuilder_util_tests {
    use super::QRBuilder;
    use crate::common::metadata::{ECLevel, Version};

    #[test]
    fn test_metadata() {
        let data = "Hello, world!".as_bytes();
        let mut qr_builder = QRBuilder::new(data);
        qr_builder.version(Version::new(1).unwrap()).ec_level(ECLevel::L);
        assert_eq!(qr_builder.metadata(), "{ Version: 1, Ec level: L }");
        qr_builder.unset_version();
        assert_eq!(qr_builder.metadata(), "{ Version: None, Ec level: L }");
    }
}

impl QRBuilder<'_> {
    pub fn build(&self) -> QRResult<QR> {
        println!("Generating QR {}...", self.metadata());

        let (encoded, version) = match &self.segments {
            Some(segs) => {
                encode_segments(segs, self.ec_level, self.version, self.fnc1, self.structured)?
            }
            None => match self.version {
                Some(ver) => {
                    let bs =
                        encode_with_version(self.data, self.ec_level, ver, self.fnc1, self.structured)?;
                    (bs, ver)
                }
                None => encode(self.data, self.ec_level, self.fnc1, self.structured)?,
            },
        };

        // Compute error correction and interleave
        let payload = Self::assemble_payload(encoded, version, self.ec_level);

        // Construct QR
        let mut qr = QR::new(version, self.ec_level);
        qr.draw_all_function_patterns();
        qr.draw_encoding_region(payload.data());

        let mask = match self.mask {
            Some(m) => {
                qr.mask(m);
                m
            }
            None => apply_best_mask(&mut qr),
        };

        println!(
            "QR generated: version {}, level {:?}, mask {}",
            *version,
            self.ec_level,
            *mask
        );

        Ok(qr)
    }

    /// Splits data codewords into blocks, appends ec codewords and
    /// interleaves both striped by index: short blocks first, ec after
    /// all data.
    fn assemble_payload(encoded: BitStream, version: Version, ec_level: ECLevel) -> BitStream {
        let total_codewords = version.total_codewords();
        let blocks = Self::blockify(encoded.data(), version, ec_level);

        let mut payload = BitStream::new(total_codewords << 3);
        let data_views = blocks.iter().map(|b| b.data()).collect::<Vec<_>>();
        payload.extend(&Self::interleave(&data_views));
        let ec_views = blocks.iter().map(|b| b.ecc()).collect::<Vec<_>>();
        payload.extend(&Self::interleave(&ec_views));
        payload
    }

    pub(crate) fn blockify(data: &[u8], version: Version, ec_level: ECLevel) -> Vec<Block> {
        let ec_len = version.ecc_per_block(ec_level);
        let (block1_size, block1_count, block2_size, block2_count) =
            version.data_codewords_per_block(ec_level);

        let total_block1_size = block1_size * block1_count;
        let total_size = total_block1_size + block2_size * block2_count;

        debug_assert!(
            total_size == data.len(),
            "Data len doesn't match total size of blocks: Data len {}, Total block size {}",
            data.len(),
            total_size
        );

        let mut blocks = Vec::with_capacity(block1_count + block2_count);
        blocks.extend(
            data[..total_block1_size].chunks(block1_size).map(|c| Block::new(c, c.len() + ec_len)),
        );
        if block2_size > 0 {
            blocks.extend(
                data[total_block1_size..]
                    .chunks(block2_size)
                    .map(|c| Block::new(c, c.len() + ec_len)),
            );
        }
        blocks
    }

    pub(crate) fn interleave<T: Copy, V: std::ops::Deref<Target = [T]>>(blocks: &[V]) -> Vec<T> {
        let max_block_size = blocks.iter().map(|b| b.len()).max().expect("Blocks is empty");
        let total_size = blocks.iter().map(|b| b.len()).sum::<usize>();
        let mut res = Vec::with_capacity(total_size);
        for i in 0..max_block_size {
            for b in blocks {
                if i < b.len() {
                    res.push(b[i]);
                }
            }
        }
        res
    }
}

#[cfg(test)]
mod builder_tests {
    use test_case::test_case;

    use super::QRBuilder;
    use crate::common::metadata::{ECLevel, Version};

    #[test]
    fn test_blockify_and_ecc_simple() {
        let msg = b" [\x0bx\xd1r\xdcMC@\xec\x11\xec\x11\xec\x11";
        let blocks = QRBuilder::blockify(msg, Version::new(1).unwrap(), ECLevel::M);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].ecc(), b"\xc4\x23\x27\x77\xeb\xd7\xe7\xe2\x5d\x17");
    }

    #[test]
    fn test_blockify_and_ecc_complex() {
        let msg = b"CUF\x86W&U\xc2w2\x06\x12\x06g&\xf6\xf6B\x07v\x86\xf2\x07&V\x16\xc6\xc7\x92\x06\
                    \xb6\xe6\xf7w2\x07v\x86W&R\x06\x86\x972\x07F\xf7vV\xc2\x06\x972\x10\xec\x11\xec\
                    \x11\xec\x11\xec";
        let expected_ec: [&[u8]; 4] = [
            b"\xd5\xc7\x0b\x2d\x73\xf7\xf1\xdf\xe5\xf8\x9a\x75\x9a\x6f\x56\xa1\x6f\x27",
            b"\x57\xcc\x60\x3c\xca\xb6\x7c\x9d\xc8\x86\x1b\x81\xd1\x11\xa3\xa3\x78\x85",
            b"\x94\x74\xb1\xd4\x4c\x85\x4b\xf2\xee\x4c\xc3\xe6\xbd\x0a\x6c\xf0\xc0\x8d",
            b"\xeb\x9f\x05\xad\x18\x93\x3b\x21\x6a\x28\xff\xac\x52\x02\x83\x20\xb2\xec",
        ];
        let blocks = QRBuilder::blockify(msg, Version::new(5).unwrap(), ECLevel::Q);
        assert_eq!(blocks.len(), 4);
        for (block, exp) in blocks.iter().zip(expected_ec.iter()) {
            assert_eq!(block.ecc(), *exp);
        }
    }

    #[test]
    fn test_interleave() {
        let blocks = vec![vec![1, 2, 3], vec![4, 5, 6], vec![7, 8, 9, 0]];
        let interleaved = QRBuilder::interleave(&blocks);
        let exp_interleaved = vec![1, 4, 7, 2, 5, 8, 3, 6, 9, 0];
        assert_eq!(interleaved, exp_interleaved);
    }

    #[test_case("Hello, world!🌎", Version::new(1).unwrap(), ECLevel::L)]
    #[test_case("TEST", Version::new(1).unwrap(), ECLevel::M)]
    #[test_case("12345", Version::new(1).unwrap(), ECLevel::Q)]
    #[test_case("OK", Version::new(1).unwrap(), ECLevel::H)]
    fn test_builder_produces_complete_matrix(data: &str, version: Version, ec_level: ECLevel) {
        let qr = QRBuilder::new(data.as_bytes())
            .version(version)
            .ec_level(ec_level)
            .build()
            .unwrap();
        assert_eq!(qr.width(), version.width());
        assert!(qr.mask_pattern().is_some());
        // Every module resolved; debug string contains no Empty marker
        assert!(!qr.to_debug_str().contains('.'));
    }

    #[test]
    fn test_builder_data_overflow() {
        let data = "1234567890".repeat(306);
        assert!(QRBuilder::new(data.as_bytes())
            .version(Version::new(40).unwrap())
            .ec_level(ECLevel::H)
            .build()
            .is_err());
    }

    #[test]
    fn test_builder_empty_data() {
        assert!(QRBuilder::new(b"").build().is_err());
    }
}
