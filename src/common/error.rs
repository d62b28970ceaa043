use std::fmt::{Debug, Display, Error, Formatter};

// Error
//------------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum QRError {
    // Builder
    IllegalContent,
    IllegalCharset,
    IllegalVersion,
    IllegalLevel,
    DataTooLarge,

    // Binarizer
    InsufficientContrast,

    // Matrix parser
    VersionUnreadable,
    FormatInfoUnreadable,

    // Segment codec
    IllegalMode,
    IllegalSegment,

    // Error correction
    UncorrectableError,

    // Detector
    DetectionExhausted,
}

impl Display for QRError {
    fn fmt(&self, f: &mut Formatter) -> Result<(), Error> {
        let msg = match *self {
            Self::IllegalContent => "Content not encodable in the requested mode",
            Self::IllegalCharset => "Charset has no ECI designator or cannot encode the content",
            Self::IllegalVersion => "Version outside 1..=40",
            Self::IllegalLevel => "Invalid error correction level",
            Self::DataTooLarge => "Payload exceeds version 40 capacity",
            Self::InsufficientContrast => "Histogram peaks too close to binarize",
            Self::VersionUnreadable => "Both version info blocks beyond repair",
            Self::FormatInfoUnreadable => "Both format info copies beyond repair",
            Self::IllegalMode => "Unknown mode nibble in bit stream",
            Self::IllegalSegment => "Corrupt segment in bit stream",
            Self::UncorrectableError => "Too many errors to correct",
            Self::DetectionExhausted => "No candidate yielded a decodable symbol",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for QRError {}

pub type QRResult<T> = Result<T, QRError>;
