pub use encode::*;

// Encoder
//------------------------------------------------------------------------------

pub mod encode {
    use std::mem::swap;

    use crate::common::bits::BitStream;
    use crate::common::codec::types::{Charset, Mode, Segment, AUTO_MODES};
    use crate::common::codec::{Fnc1, StructuredAppend};
    use crate::common::error::{QRError, QRResult};
    use crate::common::metadata::{ECLevel, Version};

    use super::writer::{pad_remaining_capacity, push_headers, push_segment, push_terminator};

    /// Auto-segments `data` and encodes it into the smallest version that
    /// fits.
    pub fn encode(
        data: &[u8],
        ecl: ECLevel,
        fnc1: Option<Fnc1>,
        structured: Option<StructuredAppend>,
    ) -> QRResult<(BitStream, Version)> {
        if data.is_empty() {
            return Err(QRError::IllegalContent);
        }

        let mut segs = vec![];
        let mut sz = usize::MAX;
        for v in 1..=40 {
            let ver = Version::new(v).expect("loop stays in range");
            let bcap = ver.data_bit_capacity(ecl);
            if v == 1 || v == 10 || v == 27 {
                segs = compute_optimal_segments(data, ver);
                sz = header_len(fnc1, structured)
                    + segs.iter().map(|s| s.bit_len(ver)).sum::<usize>();
            }
            if sz <= bcap {
                let bs = encode_segments_with_version(&segs, ecl, ver, fnc1, structured)?;
                return Ok((bs, ver));
            }
        }
        Err(QRError::DataTooLarge)
    }

    /// Auto-segments `data` against a pinned version.
    pub fn encode_with_version(
        data: &[u8],
        ecl: ECLevel,
        ver: Version,
        fnc1: Option<Fnc1>,
        structured: Option<StructuredAppend>,
    ) -> QRResult<BitStream> {
        if data.is_empty() {
            return Err(QRError::IllegalContent);
        }
        let segs = compute_optimal_segments(data, ver);
        encode_segments_with_version(&segs, ecl, ver, fnc1, structured)
    }

    /// Encodes caller-provided segments, selecting the version when not
    /// pinned.
    pub fn encode_segments(
        segs: &[Segment],
        ecl: ECLevel,
        version: Option<Version>,
        fnc1: Option<Fnc1>,
        structured: Option<StructuredAppend>,
    ) -> QRResult<(BitStream, Version)> {
        if segs.is_empty() || segs.iter().all(|s| s.data.is_empty()) {
            return Err(QRError::IllegalContent);
        }
        for seg in segs {
            seg.validate()?;
        }

        match version {
            Some(ver) => {
                let bs = encode_segments_with_version(segs, ecl, ver, fnc1, structured)?;
                Ok((bs, ver))
            }
            None => {
                for v in 1..=40 {
                    let ver = Version::new(v).expect("loop stays in range");
                    let sz = header_len(fnc1, structured)
                        + segs.iter().map(|s| s.bit_len(ver)).sum::<usize>();
                    if sz <= ver.data_bit_capacity(ecl) {
                        let bs = encode_segments_with_version(segs, ecl, ver, fnc1, structured)?;
                        return Ok((bs, ver));
                    }
                }
                Err(QRError::DataTooLarge)
            }
        }
    }

    fn encode_segments_with_version(
        segs: &[Segment],
        ecl: ECLevel,
        ver: Version,
        fnc1: Option<Fnc1>,
        structured: Option<StructuredAppend>,
    ) -> QRResult<BitStream> {
        let sz = header_len(fnc1, structured)
            + segs.iter().map(|s| s.bit_len(ver)).sum::<usize>();
        let bcap = ver.data_bit_capacity(ecl);
        if sz > bcap {
            return Err(QRError::DataTooLarge);
        }

        let mut bs = BitStream::new(bcap);
        push_headers(fnc1, structured, &mut bs);
        let mut charset = Charset::Latin1;
        for seg in segs {
            charset = push_segment(seg, ver, charset, &mut bs);
        }
        push_terminator(&mut bs);
        pad_remaining_capacity(&mut bs);
        Ok(bs)
    }

    /// Bits taken by symbol-level headers ahead of the first segment.
    fn header_len(fnc1: Option<Fnc1>, structured: Option<StructuredAppend>) -> usize {
        let fnc1_bits = match fnc1 {
            None => 0,
            Some(Fnc1::Gs1) => 4,
            Some(Fnc1::Aim(_)) => 12,
        };
        let sa_bits = if structured.is_some() { 20 } else { 0 };
        sa_bits + fnc1_bits
    }

    // Dynamic programming to compute optimum mode segments
    fn compute_optimal_segments(data: &[u8], ver: Version) -> Vec<Segment> {
        debug_assert!(!data.is_empty(), "Empty data");

        let len = data.len();
        // Costs are in sixths of a bit so per-char fractions stay integral
        let mut prev_cost = [0usize; 3];
        AUTO_MODES
            .iter()
            .enumerate()
            .for_each(|(i, &m)| prev_cost[i] = (4 + ver.char_cnt_bits(m)) * 6);
        let mut cur_cost = [usize::MAX; 3];
        let mut min_path = vec![[usize::MAX; 3]; len];
        for (i, b) in data.iter().enumerate() {
            for (j, to_mode) in AUTO_MODES.iter().enumerate() {
                if !to_mode.contains(*b) {
                    continue;
                }
                let encoded_char_size = match to_mode {
                    Mode::Numeric => 20,
                    Mode::Alphanumeric => 33,
                    _ => 48,
                };
                for (k, from_mode) in AUTO_MODES.iter().enumerate() {
                    if prev_cost[k] == usize::MAX {
                        continue;
                    }
                    let mut cost = 0;
                    if to_mode != from_mode {
                        cost += prev_cost[k].div_ceil(6) * 6;
                        cost += (4 + ver.char_cnt_bits(*to_mode)) * 6;
                    } else {
                        cost += prev_cost[k];
                    }
                    cost += encoded_char_size;
                    if cost < cur_cost[j] {
                        cur_cost[j] = cost;
                        min_path[i][j] = k;
                    }
                }
            }
            swap(&mut prev_cost, &mut cur_cost);
            cur_cost.fill(usize::MAX);
        }

        let char_modes = trace_optimal_modes(min_path, prev_cost);
        build_segments(char_modes, data)
    }

    // Backtrack min_path and identify the optimal mode per character
    fn trace_optimal_modes(min_path: Vec<[usize; 3]>, prev_cost: [usize; 3]) -> Vec<Mode> {
        let len = min_path.len();
        let mut mode_index = 0;
        for i in 1..3 {
            if prev_cost[i] < prev_cost[mode_index] {
                mode_index = i;
            }
        }
        (0..len)
            .rev()
            .scan(mode_index, |mi, i| {
                let old_mi = *mi;
                *mi = min_path[i][*mi];
                Some(AUTO_MODES[old_mi])
            })
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect()
    }

    // Merge consecutive equal char modes into segments
    fn build_segments(char_modes: Vec<Mode>, data: &[u8]) -> Vec<Segment> {
        let len = data.len();
        let mut segs: Vec<Segment> = vec![];
        let mut seg_start = 0;
        let mut seg_mode = char_modes[0];
        for (i, &m) in char_modes.iter().enumerate().skip(1) {
            if seg_mode != m {
                segs.push(Segment::new(seg_mode, data[seg_start..i].to_vec()));
                seg_mode = m;
                seg_start = i;
            }
        }
        segs.push(Segment::new(seg_mode, data[seg_start..len].to_vec()));

        segs
    }

}

// Writer for encoded data
//------------------------------------------------------------------------------

pub(super) mod writer {
    use crate::common::bits::BitStream;
    use crate::common::codec::types::{
        eci_designator_len, Charset, Mode, Segment, HANZI_SUBSET, PADDING_CODEWORDS,
    };
    use crate::common::codec::{Fnc1, StructuredAppend};
    use crate::common::metadata::Version;

    /// Symbol-level headers precede all segments: structured append, then
    /// the FNC1 latch.
    pub fn push_headers(
        fnc1: Option<Fnc1>,
        structured: Option<StructuredAppend>,
        out: &mut BitStream,
    ) {
        if let Some(sa) = structured {
            debug_assert!(sa.count >= 1 && sa.index < sa.count, "Invalid structured append");
            out.push_bits(Mode::StructuredAppend as u8, 4);
            out.push_bits(sa.index, 4);
            out.push_bits(sa.count - 1, 4);
            out.push_bits(sa.parity, 8);
        }
        match fnc1 {
            None => {}
            Some(Fnc1::Gs1) => out.push_bits(Mode::Fnc1First as u8, 4),
            Some(Fnc1::Aim(indicator)) => {
                out.push_bits(Mode::Fnc1Second as u8, 4);
                out.push_bits(indicator, 8);
            }
        }
    }

    /// Returns the charset in effect after the segment so later Byte
    /// segments can omit redundant ECI headers.
    pub fn push_segment(
        seg: &Segment,
        ver: Version,
        active: Charset,
        out: &mut BitStream,
    ) -> Charset {
        let mut active = active;
        if let Some(cs) = seg.charset {
            if cs != active {
                push_eci(cs.eci(), out);
                active = cs;
            }
        }

        push_header(seg, ver, out);
        match seg.mode {
            Mode::Numeric => push_numeric_data(&seg.data, out),
            Mode::Alphanumeric => push_alphanumeric_data(&seg.data, out),
            Mode::Byte => push_byte_data(&seg.data, out),
            Mode::Kanji | Mode::Hanzi => push_double_byte_data(seg.mode, &seg.data, out),
            _ => unreachable!("Headers are pushed separately"),
        }
        active
    }

    fn push_eci(designator: u32, out: &mut BitStream) {
        out.push_bits(Mode::Eci as u8, 4);
        match eci_designator_len(designator) {
            8 => out.push_bits(designator, 8),
            16 => out.push_bits(0b10 << 14 | designator, 16),
            _ => out.push_bits(0b110 << 21 | designator, 24),
        }
    }

    fn push_header(seg: &Segment, ver: Version, out: &mut BitStream) {
        out.push_bits(seg.mode as u8, 4);
        if seg.mode == Mode::Hanzi {
            out.push_bits(HANZI_SUBSET, 4);
        }
        let char_cnt = seg.mode.char_count(seg.data.len());
        let len_bits = ver.char_cnt_bits(seg.mode);
        debug_assert!(
            char_cnt < (1 << len_bits),
            "Char count exceeds bit length: Char count {char_cnt}, Char count bits {len_bits}"
        );
        out.push_bits(char_cnt as u16, len_bits);
    }

    fn push_numeric_data(data: &[u8], out: &mut BitStream) {
        for chunk in data.chunks(3) {
            let len = (chunk.len() * 10 + 2) / 3;
            out.push_bits(Mode::Numeric.encode_chunk(chunk), len);
        }
    }

    fn push_alphanumeric_data(data: &[u8], out: &mut BitStream) {
        for chunk in data.chunks(2) {
            let len = (chunk.len() * 11 + 1) / 2;
            out.push_bits(Mode::Alphanumeric.encode_chunk(chunk), len);
        }
    }

    fn push_byte_data(data: &[u8], out: &mut BitStream) {
        for &byte in data {
            out.push_bits(byte, 8);
        }
    }

    fn push_double_byte_data(mode: Mode, data: &[u8], out: &mut BitStream) {
        for chunk in data.chunks_exact(2) {
            out.push_bits(mode.encode_chunk(chunk), 13);
        }
    }

    pub fn push_terminator(out: &mut BitStream) {
        let bit_len = out.len();
        let bit_capacity = out.capacity();
        if bit_len < bit_capacity {
            let term_len = std::cmp::min(4, bit_capacity - bit_len);
            out.push_bits(0u8, term_len);
        }
    }

    pub fn pad_remaining_capacity(out: &mut BitStream) {
        push_padding_bits(out);
        push_padding_codewords(out);
    }

    fn push_padding_bits(out: &mut BitStream) {
        let offset = out.len() & 7;
        if offset > 0 {
            out.push_bits(0u8, 8 - offset);
        }
    }

    fn push_padding_codewords(out: &mut BitStream) {
        debug_assert!(
            out.len() & 7 == 0,
            "Bit offset should be zero before padding codewords: {}",
            out.len() & 7
        );

        let remain_byte_capacity = (out.capacity() - out.len()) >> 3;
        PADDING_CODEWORDS.iter().copied().cycle().take(remain_byte_capacity).for_each(|pc| {
            out.push_bits(pc, 8);
        });
    }

}
