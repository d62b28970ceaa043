//! Encoder, detector and decoder for ISO/IEC 18004 matrix symbols.
//!
//! The builder side turns a payload into a module matrix:
//!
//! ```
//! use matriq::{ECLevel, QRBuilder};
//!
//! let qr = QRBuilder::new(b"Hello, world!").ec_level(ECLevel::Q).build().unwrap();
//! let image = qr.to_image(8);
//! # assert!(image.width() > 0);
//! ```
//!
//! The reader side goes the other way, from raster image to payload:
//!
//! ```
//! # use matriq::{ECLevel, QRBuilder, QRReader};
//! # let qr = QRBuilder::new(b"Hello, world!").ec_level(ECLevel::Q).build().unwrap();
//! # let image = qr.to_image(8);
//! let decoded = QRReader::scan(&image);
//! assert_eq!(decoded[0].content, "Hello, world!");
//! ```

pub mod builder;
mod common;
pub mod reader;

pub use builder::{Palette, QRBuilder, QR};
pub use common::bits::BitStream;
pub use common::codec::{Charset, Fnc1, Mode, Segment, StructuredAppend};
pub use common::error::{QRError, QRResult};
pub use common::mask::MaskPattern;
pub use common::matrix::BitMatrix;
pub use common::metadata::{ECLevel, Version};
pub use reader::{Binarize, Decoded, Detection, Detector, QRReader};
