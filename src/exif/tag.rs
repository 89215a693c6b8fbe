//! Tag registry: tag names ⇄ `(group, id, declared type)`.
//!
//! Ids follow the published Exif 2.32 / TIFF 6.0 numbering so that
//! blocks written here read back identically in any third-party tool.
//! Names are unique across all groups; where TIFF repeats an Exif
//! attribute in the image IFD (`ExposureTime`, `FNumber`, ...) only the
//! Exif IFD entry is registered.

use std::collections::HashMap;
use std::sync::OnceLock;

/// The IFD a tag belongs to. The thumbnail IFD (`1st`) shares the
/// numbering of [`TagGroup::Image`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TagGroup {
    Image,
    Exif,
    Gps,
    Interop,
}

impl TagGroup {
    /// Numbering context of this group in kamadak-exif.
    pub fn context(self) -> exif::Context {
        match self {
            Self::Image => exif::Context::Tiff,
            Self::Exif => exif::Context::Exif,
            Self::Gps => exif::Context::Gps,
            Self::Interop => exif::Context::Interop,
        }
    }
}

/// Declared type of a registered tag. Decides how a textual edit is
/// converted before it is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Byte,
    Ascii,
    Short,
    SShort,
    Long,
    Rational,
    SRational,
    Undefined,
}

/// One known tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagDescriptor {
    pub name: &'static str,
    pub group: TagGroup,
    pub id: u16,
    pub value_type: ValueType,
}

// Pointer and thumbnail-location tags managed by the block encoder.
pub const TAG_EXIF_POINTER: u16 = 0x8769;
pub const TAG_GPS_POINTER: u16 = 0x8825;
pub const TAG_INTEROP_POINTER: u16 = 0xA005;
pub const TAG_JPEG_THUMBNAIL_OFFSET: u16 = 0x0201;
pub const TAG_JPEG_THUMBNAIL_LENGTH: u16 = 0x0202;
pub const TAG_STRIP_OFFSETS: u16 = 0x0111;
pub const TAG_STRIP_BYTE_COUNTS: u16 = 0x0117;
pub const TAG_TILE_OFFSETS: u16 = 0x0144;
pub const TAG_TILE_BYTE_COUNTS: u16 = 0x0145;

pub const TAG_USER_COMMENT: u16 = 0x9286;
pub const TAG_GPS_LATITUDE_REF: u16 = 0x0001;
pub const TAG_GPS_LATITUDE: u16 = 0x0002;
pub const TAG_GPS_LONGITUDE_REF: u16 = 0x0003;
pub const TAG_GPS_LONGITUDE: u16 = 0x0004;

macro_rules! tags {
    ($( $group:ident $id:literal $name:ident $typ:ident ),* $(,)?) => {
        &[ $( TagDescriptor {
            name: stringify!($name),
            group: TagGroup::$group,
            id: $id,
            value_type: ValueType::$typ,
        } ),* ]
    };
}

static TAGS: &[TagDescriptor] = tags![
    // Image IFD (0th)
    Image 0x000B ProcessingSoftware Ascii,
    Image 0x00FE NewSubfileType Long,
    Image 0x00FF SubfileType Short,
    Image 0x0100 ImageWidth Long,
    Image 0x0101 ImageLength Long,
    Image 0x0102 BitsPerSample Short,
    Image 0x0103 Compression Short,
    Image 0x0106 PhotometricInterpretation Short,
    Image 0x0107 Threshholding Short,
    Image 0x0108 CellWidth Short,
    Image 0x0109 CellLength Short,
    Image 0x010A FillOrder Short,
    Image 0x010D DocumentName Ascii,
    Image 0x010E ImageDescription Ascii,
    Image 0x010F Make Ascii,
    Image 0x0110 Model Ascii,
    Image 0x0111 StripOffsets Long,
    Image 0x0112 Orientation Short,
    Image 0x0115 SamplesPerPixel Short,
    Image 0x0116 RowsPerStrip Long,
    Image 0x0117 StripByteCounts Long,
    Image 0x011A XResolution Rational,
    Image 0x011B YResolution Rational,
    Image 0x011C PlanarConfiguration Short,
    Image 0x0122 GrayResponseUnit Short,
    Image 0x0123 GrayResponseCurve Short,
    Image 0x0124 T4Options Long,
    Image 0x0125 T6Options Long,
    Image 0x0128 ResolutionUnit Short,
    Image 0x012D TransferFunction Short,
    Image 0x0131 Software Ascii,
    Image 0x0132 DateTime Ascii,
    Image 0x013B Artist Ascii,
    Image 0x013C HostComputer Ascii,
    Image 0x013D Predictor Short,
    Image 0x013E WhitePoint Rational,
    Image 0x013F PrimaryChromaticities Rational,
    Image 0x0140 ColorMap Short,
    Image 0x0141 HalftoneHints Short,
    Image 0x0142 TileWidth Short,
    Image 0x0143 TileLength Short,
    Image 0x0144 TileOffsets Short,
    Image 0x0145 TileByteCounts Short,
    Image 0x014A SubIFDs Long,
    Image 0x014C InkSet Short,
    Image 0x014D InkNames Ascii,
    Image 0x014E NumberOfInks Short,
    Image 0x0150 DotRange Byte,
    Image 0x0151 TargetPrinter Ascii,
    Image 0x0152 ExtraSamples Short,
    Image 0x0153 SampleFormat Short,
    Image 0x0154 SMinSampleValue Short,
    Image 0x0155 SMaxSampleValue Short,
    Image 0x0156 TransferRange Short,
    Image 0x0157 ClipPath Byte,
    Image 0x0158 XClipPathUnits Long,
    Image 0x0159 YClipPathUnits Long,
    Image 0x015A Indexed Short,
    Image 0x015B JPEGTables Undefined,
    Image 0x015F OPIProxy Short,
    Image 0x0200 JPEGProc Long,
    Image 0x0201 JPEGInterchangeFormat Long,
    Image 0x0202 JPEGInterchangeFormatLength Long,
    Image 0x0203 JPEGRestartInterval Short,
    Image 0x0211 YCbCrCoefficients Rational,
    Image 0x0212 YCbCrSubSampling Short,
    Image 0x0213 YCbCrPositioning Short,
    Image 0x0214 ReferenceBlackWhite Rational,
    Image 0x02BC XMLPacket Byte,
    Image 0x4746 Rating Short,
    Image 0x4749 RatingPercent Short,
    Image 0x800D ImageID Ascii,
    Image 0x828D CFARepeatPatternDim Short,
    Image 0x828F BatteryLevel Rational,
    Image 0x8298 Copyright Ascii,
    Image 0x83BB IPTCNAA Long,
    Image 0x8649 ImageResources Byte,
    Image 0x8769 ExifTag Long,
    Image 0x8773 InterColorProfile Undefined,
    Image 0x8825 GPSTag Long,
    Image 0x8829 Interlace Short,
    Image 0x882A TimeZoneOffset SShort,
    Image 0x882B SelfTimerMode Short,
    Image 0x9211 ImageNumber Long,
    Image 0x9212 SecurityClassification Ascii,
    Image 0x9213 ImageHistory Ascii,
    Image 0x9C9B XPTitle Byte,
    Image 0x9C9C XPComment Byte,
    Image 0x9C9D XPAuthor Byte,
    Image 0x9C9E XPKeywords Byte,
    Image 0x9C9F XPSubject Byte,
    Image 0xC4A5 PrintImageMatching Undefined,
    Image 0xC612 DNGVersion Byte,
    Image 0xC613 DNGBackwardVersion Byte,
    Image 0xC614 UniqueCameraModel Ascii,
    Image 0xC615 LocalizedCameraModel Byte,
    Image 0xC62F CameraSerialNumber Ascii,
    Image 0xC630 LensInfo Rational,
    // Exif IFD
    Exif 0x829A ExposureTime Rational,
    Exif 0x829D FNumber Rational,
    Exif 0x8822 ExposureProgram Short,
    Exif 0x8824 SpectralSensitivity Ascii,
    Exif 0x8827 ISOSpeedRatings Short,
    Exif 0x8828 OECF Undefined,
    Exif 0x8830 SensitivityType Short,
    Exif 0x8831 StandardOutputSensitivity Long,
    Exif 0x8832 RecommendedExposureIndex Long,
    Exif 0x8833 ISOSpeed Long,
    Exif 0x8834 ISOSpeedLatitudeyyy Long,
    Exif 0x8835 ISOSpeedLatitudezzz Long,
    Exif 0x9000 ExifVersion Undefined,
    Exif 0x9003 DateTimeOriginal Ascii,
    Exif 0x9004 DateTimeDigitized Ascii,
    Exif 0x9010 OffsetTime Ascii,
    Exif 0x9011 OffsetTimeOriginal Ascii,
    Exif 0x9012 OffsetTimeDigitized Ascii,
    Exif 0x9101 ComponentsConfiguration Undefined,
    Exif 0x9102 CompressedBitsPerPixel Rational,
    Exif 0x9201 ShutterSpeedValue SRational,
    Exif 0x9202 ApertureValue Rational,
    Exif 0x9203 BrightnessValue SRational,
    Exif 0x9204 ExposureBiasValue SRational,
    Exif 0x9205 MaxApertureValue Rational,
    Exif 0x9206 SubjectDistance Rational,
    Exif 0x9207 MeteringMode Short,
    Exif 0x9208 LightSource Short,
    Exif 0x9209 Flash Short,
    Exif 0x920A FocalLength Rational,
    Exif 0x9214 SubjectArea Short,
    Exif 0x927C MakerNote Undefined,
    Exif 0x9286 UserComment Undefined,
    Exif 0x9290 SubSecTime Ascii,
    Exif 0x9291 SubSecTimeOriginal Ascii,
    Exif 0x9292 SubSecTimeDigitized Ascii,
    Exif 0x9400 Temperature SRational,
    Exif 0x9401 Humidity Rational,
    Exif 0x9402 Pressure Rational,
    Exif 0x9403 WaterDepth SRational,
    Exif 0x9404 Acceleration Rational,
    Exif 0x9405 CameraElevationAngle SRational,
    Exif 0xA000 FlashpixVersion Undefined,
    Exif 0xA001 ColorSpace Short,
    Exif 0xA002 PixelXDimension Long,
    Exif 0xA003 PixelYDimension Long,
    Exif 0xA004 RelatedSoundFile Ascii,
    Exif 0xA005 InteroperabilityTag Long,
    Exif 0xA20B FlashEnergy Rational,
    Exif 0xA20C SpatialFrequencyResponse Undefined,
    Exif 0xA20E FocalPlaneXResolution Rational,
    Exif 0xA20F FocalPlaneYResolution Rational,
    Exif 0xA210 FocalPlaneResolutionUnit Short,
    Exif 0xA214 SubjectLocation Short,
    Exif 0xA215 ExposureIndex Rational,
    Exif 0xA217 SensingMethod Short,
    Exif 0xA300 FileSource Undefined,
    Exif 0xA301 SceneType Undefined,
    Exif 0xA302 CFAPattern Undefined,
    Exif 0xA401 CustomRendered Short,
    Exif 0xA402 ExposureMode Short,
    Exif 0xA403 WhiteBalance Short,
    Exif 0xA404 DigitalZoomRatio Rational,
    Exif 0xA405 FocalLengthIn35mmFilm Short,
    Exif 0xA406 SceneCaptureType Short,
    Exif 0xA407 GainControl Short,
    Exif 0xA408 Contrast Short,
    Exif 0xA409 Saturation Short,
    Exif 0xA40A Sharpness Short,
    Exif 0xA40B DeviceSettingDescription Undefined,
    Exif 0xA40C SubjectDistanceRange Short,
    Exif 0xA420 ImageUniqueID Ascii,
    Exif 0xA430 CameraOwnerName Ascii,
    Exif 0xA431 BodySerialNumber Ascii,
    Exif 0xA432 LensSpecification Rational,
    Exif 0xA433 LensMake Ascii,
    Exif 0xA434 LensModel Ascii,
    Exif 0xA435 LensSerialNumber Ascii,
    Exif 0xA460 CompositeImage Short,
    Exif 0xA461 SourceImageNumberOfCompositeImage Short,
    Exif 0xA462 SourceExposureTimesOfCompositeImage Undefined,
    Exif 0xA500 Gamma Rational,
    // GPS IFD
    Gps 0x0000 GPSVersionID Byte,
    Gps 0x0001 GPSLatitudeRef Ascii,
    Gps 0x0002 GPSLatitude Rational,
    Gps 0x0003 GPSLongitudeRef Ascii,
    Gps 0x0004 GPSLongitude Rational,
    Gps 0x0005 GPSAltitudeRef Byte,
    Gps 0x0006 GPSAltitude Rational,
    Gps 0x0007 GPSTimeStamp Rational,
    Gps 0x0008 GPSSatellites Ascii,
    Gps 0x0009 GPSStatus Ascii,
    Gps 0x000A GPSMeasureMode Ascii,
    Gps 0x000B GPSDOP Rational,
    Gps 0x000C GPSSpeedRef Ascii,
    Gps 0x000D GPSSpeed Rational,
    Gps 0x000E GPSTrackRef Ascii,
    Gps 0x000F GPSTrack Rational,
    Gps 0x0010 GPSImgDirectionRef Ascii,
    Gps 0x0011 GPSImgDirection Rational,
    Gps 0x0012 GPSMapDatum Ascii,
    Gps 0x0013 GPSDestLatitudeRef Ascii,
    Gps 0x0014 GPSDestLatitude Rational,
    Gps 0x0015 GPSDestLongitudeRef Ascii,
    Gps 0x0016 GPSDestLongitude Rational,
    Gps 0x0017 GPSDestBearingRef Ascii,
    Gps 0x0018 GPSDestBearing Rational,
    Gps 0x0019 GPSDestDistanceRef Ascii,
    Gps 0x001A GPSDestDistance Rational,
    Gps 0x001B GPSProcessingMethod Undefined,
    Gps 0x001C GPSAreaInformation Undefined,
    Gps 0x001D GPSDateStamp Ascii,
    Gps 0x001E GPSDifferential Short,
    Gps 0x001F GPSHPositioningError Rational,
    // Interoperability IFD
    Interop 0x0001 InteroperabilityIndex Ascii,
    Interop 0x0002 InteroperabilityVersion Undefined,
    Interop 0x1000 RelatedImageFileFormat Ascii,
    Interop 0x1001 RelatedImageWidth Long,
    Interop 0x1002 RelatedImageLength Long,
];

/// Name and id indices over the static tag table.
///
/// Build it once (or use [`TagRegistry::standard`]) and pass it by
/// reference to the decoder, mutator and template filter.
#[derive(Debug)]
pub struct TagRegistry {
    by_name: HashMap<&'static str, &'static TagDescriptor>,
    by_id: HashMap<(TagGroup, u16), &'static TagDescriptor>,
}

impl TagRegistry {
    pub fn new() -> Self {
        let mut by_name = HashMap::with_capacity(TAGS.len());
        let mut by_id = HashMap::with_capacity(TAGS.len());
        for desc in TAGS {
            by_name.insert(desc.name, desc);
            by_id.insert((desc.group, desc.id), desc);
        }
        Self { by_name, by_id }
    }

    /// Process-wide registry, built on first use.
    pub fn standard() -> &'static TagRegistry {
        static REGISTRY: OnceLock<TagRegistry> = OnceLock::new();
        REGISTRY.get_or_init(TagRegistry::new)
    }

    /// Look up a tag by its name.
    pub fn resolve(&self, name: &str) -> Option<&'static TagDescriptor> {
        self.by_name.get(name).copied()
    }

    /// Look up a tag by group and numeric id.
    pub fn lookup(&self, group: TagGroup, id: u16) -> Option<&'static TagDescriptor> {
        self.by_id.get(&(group, id)).copied()
    }

    pub fn lookup_name(&self, group: TagGroup, id: u16) -> Option<&'static str> {
        self.lookup(group, id).map(|d| d.name)
    }
}

impl Default for TagRegistry {
    fn default() -> Self {
        Self::new()
    }
}
