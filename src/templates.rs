//! Named allow-lists of tag names for [`keep_only_tags`](crate::exif::keep_only_tags).

use crate::exif::TagSelection;

/// Photo-sharing profile: camera, exposure, dates, GPS, orientation,
/// software and credit fields. Serial numbers, owner names and maker
/// notes are dropped.
const FLICKR: &[&str] = &[
    // Camera
    "Make", "Model", "LensModel", "LensMake", "LensSpecification",
    // Shooting settings
    "ISOSpeedRatings", "ISO", "FNumber", "ExposureTime", "FocalLength", "FocalLengthIn35mmFilm",
    "ExposureBiasValue", "WhiteBalance", "Flash", "MeteringMode", "ExposureProgram",
    // Dates
    "DateTimeOriginal", "DateTimeDigitized", "DateTime",
    // GPS
    "GPSVersionID", "GPSLatitudeRef", "GPSLatitude", "GPSLongitudeRef", "GPSLongitude",
    "GPSAltitudeRef", "GPSAltitude", "GPSTimeStamp", "GPSSatellites", "GPSStatus",
    "GPSMeasureMode", "GPSDOP", "GPSSpeedRef", "GPSSpeed", "GPSTrackRef", "GPSTrack",
    "GPSImgDirectionRef", "GPSImgDirection", "GPSMapDatum", "GPSDestLatitudeRef",
    "GPSDestLatitude", "GPSDestLongitudeRef", "GPSDestLongitude", "GPSDestBearingRef",
    "GPSDestBearing", "GPSDestDistanceRef", "GPSDestDistance", "GPSProcessingMethod",
    "GPSAreaInformation", "GPSDateStamp", "GPSDifferential",
    "Orientation",
    "Software",
    "ImageDescription", "Artist", "Copyright",
];

const TEMPLATES: &[(&str, &[&str])] = &[("flickr", FLICKR)];

/// Names of all templates.
pub fn list_templates() -> Vec<&'static str> {
    TEMPLATES.iter().map(|(name, _)| *name).collect()
}

/// The keep-set of a template, or `None` for an unknown name.
pub fn get_template(name: &str) -> Option<TagSelection> {
    TEMPLATES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, tags)| tags.iter().copied().collect())
}
