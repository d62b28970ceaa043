use super::types::{Charset, Mode, HANZI_SUBSET};
use super::{Fnc1, StructuredAppend};
use crate::common::bits::BitStream;
use crate::common::error::{QRError, QRResult};
use crate::common::metadata::Version;

// Decoded payload
//------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPayload {
    pub content: String,
    pub fnc1: Option<Fnc1>,
    pub structured: Option<StructuredAppend>,
    /// AIM symbology identifier, e.g. "]Q1"
    pub symbology: String,
}

const GROUP_SEPARATOR: char = '\u{1D}';

// Decoder
//------------------------------------------------------------------------------

/// Reads segments off the bit stream until the terminator or exhaustion.
pub fn decode(bs: &mut BitStream, version: Version) -> QRResult<DecodedPayload> {
    let mut content = String::new();
    let mut charset = Charset::Latin1;
    let mut eci_seen = false;
    let mut fnc1 = None;
    let mut structured = None;

    loop {
        if bs.remaining() < 4 {
            break;
        }
        let nibble = bs.take_bits(4).expect("at least 4 bits remain");
        let mode = Mode::from_nibble(nibble)?;

        match mode {
            Mode::Terminator => break,
            Mode::Eci => {
                let designator = take_eci_designator(bs)?;
                eci_seen = true;
                // Unknown but well-formed designators fall back to the
                // default charset rather than aborting the whole symbol
                charset = Charset::from_eci(designator).unwrap_or(Charset::Latin1);
            }
            Mode::Fnc1First => fnc1 = Some(Fnc1::Gs1),
            Mode::Fnc1Second => {
                let indicator = bs.take_bits(8).ok_or(QRError::IllegalSegment)?;
                fnc1 = Some(Fnc1::Aim(indicator as u8));
            }
            Mode::StructuredAppend => {
                let index = bs.take_bits(4).ok_or(QRError::IllegalSegment)? as u8;
                let count = bs.take_bits(4).ok_or(QRError::IllegalSegment)? as u8 + 1;
                let parity = bs.take_bits(8).ok_or(QRError::IllegalSegment)? as u8;
                structured = Some(StructuredAppend { index, count, parity });
            }
            Mode::Numeric => decode_numeric(bs, version, &mut content)?,
            Mode::Alphanumeric => decode_alphanumeric(bs, version, fnc1.is_some(), &mut content)?,
            Mode::Byte => decode_byte(bs, version, charset, &mut content)?,
            Mode::Kanji => decode_double_byte(bs, version, Mode::Kanji, &mut content)?,
            Mode::Hanzi => {
                let subset = bs.take_bits(4).ok_or(QRError::IllegalSegment)?;
                if subset != HANZI_SUBSET as u32 {
                    return Err(QRError::IllegalSegment);
                }
                decode_double_byte(bs, version, Mode::Hanzi, &mut content)?
            }
        }
    }

    let symbology = symbology_identifier(fnc1, eci_seen);
    Ok(DecodedPayload { content, fnc1, structured, symbology })
}

/// ECI designators are 1, 2 or 3 bytes wide; the leading bit pattern of
/// the first byte picks the width.
fn take_eci_designator(bs: &mut BitStream) -> QRResult<u32> {
    let first = bs.take_bits(8).ok_or(QRError::IllegalSegment)?;
    if first >> 7 == 0 {
        Ok(first & 0x7F)
    } else if first >> 6 == 0b10 {
        let second = bs.take_bits(8).ok_or(QRError::IllegalSegment)?;
        Ok(((first & 0x3F) << 8) | second)
    } else if first >> 5 == 0b110 {
        let rest = bs.take_bits(16).ok_or(QRError::IllegalSegment)?;
        Ok(((first & 0x1F) << 16) | rest)
    } else {
        Err(QRError::IllegalSegment)
    }
}

fn take_char_count(bs: &mut BitStream, version: Version, mode: Mode) -> QRResult<usize> {
    let len_bits = version.char_cnt_bits(mode);
    Ok(bs.take_bits(len_bits).ok_or(QRError::IllegalSegment)? as usize)
}

fn decode_numeric(bs: &mut BitStream, version: Version, out: &mut String) -> QRResult<()> {
    let mut count = take_char_count(bs, version, Mode::Numeric)?;
    while count > 0 {
        let chars = count.min(3);
        let bit_len = match chars {
            3 => 10,
            2 => 7,
            _ => 4,
        };
        let chunk = bs.take_bits(bit_len).ok_or(QRError::IllegalSegment)?;
        if chunk >= 10u32.pow(chars as u32) {
            return Err(QRError::IllegalSegment);
        }
        let bytes = Mode::Numeric.decode_chunk(chunk as u16, bit_len);
        out.push_str(std::str::from_utf8(&bytes).expect("digits are ascii"));
        count -= chars;
    }
    Ok(())
}

fn decode_alphanumeric(
    bs: &mut BitStream,
    version: Version,
    fnc1_active: bool,
    out: &mut String,
) -> QRResult<()> {
    let mut count = take_char_count(bs, version, Mode::Alphanumeric)?;
    let mut raw = Vec::with_capacity(count);
    while count > 0 {
        let chars = count.min(2);
        let bit_len = if chars == 2 { 11 } else { 6 };
        let chunk = bs.take_bits(bit_len).ok_or(QRError::IllegalSegment)?;
        if chunk >= 45u32.pow(chars as u32) {
            return Err(QRError::IllegalSegment);
        }
        raw.extend(Mode::Alphanumeric.decode_chunk(chunk as u16, bit_len));
        count -= chars;
    }

    if fnc1_active {
        // "%%" is a literal percent; a lone "%" is the group separator
        let mut iter = raw.iter().peekable();
        while let Some(&b) = iter.next() {
            if b == b'%' {
                if iter.peek() == Some(&&b'%') {
                    iter.next();
                    out.push('%');
                } else {
                    out.push(GROUP_SEPARATOR);
                }
            } else {
                out.push(b as char);
            }
        }
    } else {
        out.push_str(std::str::from_utf8(&raw).expect("alphanumeric alphabet is ascii"));
    }
    Ok(())
}

fn decode_byte(
    bs: &mut BitStream,
    version: Version,
    charset: Charset,
    out: &mut String,
) -> QRResult<()> {
    let count = take_char_count(bs, version, Mode::Byte)?;
    let mut raw = Vec::with_capacity(count);
    for _ in 0..count {
        raw.push(bs.take_bits(8).ok_or(QRError::IllegalSegment)? as u8);
    }

    // Without a designator, well-formed UTF-8 is far more common in the
    // wild than actual Latin-1
    if charset == Charset::Latin1 {
        if let Ok(text) = std::str::from_utf8(&raw) {
            out.push_str(text);
            return Ok(());
        }
    }
    out.push_str(&charset.decode(&raw));
    Ok(())
}

fn decode_double_byte(
    bs: &mut BitStream,
    version: Version,
    mode: Mode,
    out: &mut String,
) -> QRResult<()> {
    let count = take_char_count(bs, version, mode)?;
    let mut raw = Vec::with_capacity(count * 2);
    for _ in 0..count {
        let chunk = bs.take_bits(13).ok_or(QRError::IllegalSegment)?;
        raw.extend(mode.decode_chunk(chunk as u16, 13));
    }

    let charset = if mode == Mode::Kanji { Charset::ShiftJis } else { Charset::Gb2312 };
    out.push_str(&charset.decode(&raw));
    Ok(())
}

/// AIM modifier: encodes which FNC1 position is latched and whether an
/// ECI designator appeared.
fn symbology_identifier(fnc1: Option<Fnc1>, eci_seen: bool) -> String {
    let modifier = match (fnc1, eci_seen) {
        (None, false) => 1,
        (None, true) => 2,
        (Some(Fnc1::Gs1), false) => 3,
        (Some(Fnc1::Gs1), true) => 4,
        (Some(Fnc1::Aim(_)), false) => 5,
        (Some(Fnc1::Aim(_)), true) => 6,
    };
    format!("]Q{modifier}")
}
