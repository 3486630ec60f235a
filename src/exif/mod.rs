//! EXIF, XMP, and IPTC container codec.
//!
//! - [`decode`]: parse the metadata of a JPEG, PNG, or TIFF byte buffer into a [`RawContainer`]
//! - [`merge`]: apply a [`MetadataPatch`](crate::record::MetadataPatch) to the writer-owned fields
//! - [`encode`]: rebuild a JPEG with the container's metadata, image data untouched
//!
//! The container keeps every IFD field it decodes, typed, so fields the engine
//! does not interpret survive a write.

mod container;
mod iptc;
mod reader;
pub mod tags;
mod tiff;
mod writer;
pub mod xmp;

pub use container::{ByteOrder, FieldValue, RawContainer, Segment};
pub use iptc::{IptcBlock, IptcRecord};
pub use reader::decode;
pub use writer::{encode, merge};
