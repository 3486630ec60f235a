//! Field ids used by the engine. Everything else in a container is passed through.

// IFD0
pub const TAG_IMAGE_DESCRIPTION: u16 = 0x010E;
pub const TAG_MAKE: u16 = 0x010F;
pub const TAG_MODEL: u16 = 0x0110;
pub const TAG_DATE_TIME: u16 = 0x0132;
pub const TAG_XMP_PACKET: u16 = 0x02BC;
pub const TAG_RATING: u16 = 0x4746;
pub const TAG_RATING_PERCENT: u16 = 0x4749;
pub const TAG_IPTC_NAA: u16 = 0x83BB;
pub const TAG_XP_COMMENT: u16 = 0x9C9C;
pub const TAG_XP_KEYWORDS: u16 = 0x9C9E;
pub const TAG_XP_SUBJECT: u16 = 0x9C9F;

// Exif IFD
pub const TAG_EXPOSURE_TIME: u16 = 0x829A;
pub const TAG_F_NUMBER: u16 = 0x829D;
pub const TAG_ISO: u16 = 0x8827;
pub const TAG_DATE_TIME_ORIGINAL: u16 = 0x9003;
pub const TAG_DATE_TIME_DIGITIZED: u16 = 0x9004;
pub const TAG_OFFSET_TIME_ORIGINAL: u16 = 0x9011;
pub const TAG_FOCAL_LENGTH: u16 = 0x920A;
pub const TAG_USER_COMMENT: u16 = 0x9286;
pub const TAG_LENS_MODEL: u16 = 0xA434;

// Structural pointers
pub const TAG_EXIF_IFD: u16 = 0x8769;
pub const TAG_GPS_IFD: u16 = 0x8825;
pub const TAG_INTEROP_IFD: u16 = 0xA005;
pub const TAG_THUMBNAIL_OFFSET: u16 = 0x0201;
pub const TAG_THUMBNAIL_LENGTH: u16 = 0x0202;
