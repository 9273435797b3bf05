//! Static tag → typed field table.
//!
//! Each entry names one tag reported by the metadata tool and the
//! [`ImageMetadata`] field it populates, together with the field's type.
//! Values that fail to parse for their declared type are skipped with a
//! warning; the remaining fields are still populated.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use tracing::warn;

use crate::catalog::ImageMetadata;

/// Flat tag name → printed value map, as reported by the metadata tool
pub type TagMap = HashMap<String, String>;

/// Typed setter for one metadata field
#[derive(Clone, Copy)]
pub enum FieldSetter {
    Text(fn(&mut ImageMetadata, String)),
    Float(fn(&mut ImageMetadata, f64)),
    Integer(fn(&mut ImageMetadata, i64)),
    Timestamp(fn(&mut ImageMetadata, DateTime<FixedOffset>)),
}

#[derive(Clone, Copy)]
pub struct FieldMapping {
    pub tag: &'static str,
    pub setter: FieldSetter,
}

macro_rules! field {
    ($tag:literal => $field:ident: Text) => {
        FieldMapping {
            tag: $tag,
            setter: FieldSetter::Text(|m, v| m.$field = Some(v)),
        }
    };
    ($tag:literal => $field:ident: Float) => {
        FieldMapping {
            tag: $tag,
            setter: FieldSetter::Float(|m, v| m.$field = Some(v)),
        }
    };
    ($tag:literal => $field:ident: Integer) => {
        FieldMapping {
            tag: $tag,
            setter: FieldSetter::Integer(|m, v| m.$field = Some(v)),
        }
    };
    ($tag:literal => $field:ident: Timestamp) => {
        FieldMapping {
            tag: $tag,
            setter: FieldSetter::Timestamp(|m, v| m.$field = Some(v)),
        }
    };
}

pub static FIELD_MAPPINGS: &[FieldMapping] = &[
    field!("Aperture" => aperture: Float),
    field!("ApertureValue" => aperture_value: Float),
    field!("Model" => camera_model: Text),
    field!("ColorSpace" => color_space: Text),
    field!("DateTimeCreated" => date_time_created: Timestamp),
    field!("DateTimeOriginal" => date_time_original: Timestamp),
    field!("DeviceManufacturer" => device_manufacturer: Text),
    field!("DeviceModel" => device_model: Text),
    field!("DigitalCreationDateTime" => digital_creation_date_time: Timestamp),
    field!("ExposureCompensation" => exposure_compensation: Float),
    field!("ExposureMode" => exposure_mode: Text),
    field!("ExposureProgram" => exposure_program: Text),
    field!("ExposureTime" => exposure_time: Text),
    field!("FileName" => file_name: Text),
    field!("Flash" => flash: Text),
    field!("FNumber" => f_number: Float),
    field!("FocalLength" => focal_length: Text),
    field!("FocalLengthIn35mmFormat" => focal_length_in_35mm_format: Text),
    field!("FocalPlaneResolutionUnit" => focal_plane_resolution_unit: Text),
    field!("FocalPlaneXResolution" => focal_plane_x_resolution: Float),
    field!("FocalPlaneYResolution" => focal_plane_y_resolution: Float),
    field!("Format" => format: Text),
    field!("GPSAltitude" => gps_altitude: Text),
    field!("GPSDestBearing" => gps_dest_bearing: Text),
    field!("GPSImgDirection" => gps_img_direction: Text),
    field!("GPSLatitude" => gps_latitude: Text),
    field!("GPSLongitude" => gps_longitude: Text),
    field!("GPSPosition" => gps_position: Text),
    field!("GPSSpeed" => gps_speed: Text),
    field!("ImageHeight" => image_height: Float),
    field!("ImageNumber" => image_number: Float),
    field!("ImageSize" => image_size: Text),
    field!("ImageWidth" => image_width: Text),
    field!("ISO" => iso: Float),
    field!("Lens" => lens: Text),
    field!("LensID" => lens_id: Text),
    field!("LensInfo" => lens_info: Text),
    field!("LensMake" => lens_make: Text),
    field!("LensModel" => lens_model: Text),
    field!("LensSerialNumber" => lens_serial_number: Text),
    field!("Make" => make: Text),
    field!("Megapixels" => megapixels: Float),
    field!("MIMEType" => mime_type: Text),
    field!("ModifyDate" => modify_date: Text),
    field!("Orientation" => orientation: Text),
    field!("Rating" => rating: Integer),
    field!("ResolutionUnit" => resolution_unit: Text),
    field!("SerialNumber" => serial_number: Text),
    field!("ShutterSpeed" => shutter_speed: Text),
    field!("ShutterSpeedValue" => shutter_speed_value: Text),
    field!("Software" => software: Text),
    field!("XResolution" => x_resolution: Float),
    field!("YResolution" => y_resolution: Float),
];

/// Build typed metadata from a flat tag map.
pub fn populate_metadata(tags: &TagMap) -> ImageMetadata {
    let mut metadata = ImageMetadata::default();

    for mapping in FIELD_MAPPINGS {
        let Some(value) = tags.get(mapping.tag).map(|v| v.trim()) else {
            continue;
        };
        if value.is_empty() {
            continue;
        }

        let applied = match mapping.setter {
            FieldSetter::Text(set) => {
                set(&mut metadata, value.to_string());
                true
            }
            FieldSetter::Float(set) => parse_float(value).map(|v| set(&mut metadata, v)).is_some(),
            FieldSetter::Integer(set) => value
                .parse::<i64>()
                .ok()
                .map(|v| set(&mut metadata, v))
                .is_some(),
            FieldSetter::Timestamp(set) => parse_timestamp(value)
                .map(|v| set(&mut metadata, v))
                .is_some(),
        };

        if !applied {
            warn!(tag = mapping.tag, value, "Unable to parse tag value, skipping");
        }
    }

    metadata
}

/// Parse a decimal or a rational such as `1/250` or `+1/3`.
pub fn parse_float(value: &str) -> Option<f64> {
    if let Ok(v) = value.parse::<f64>() {
        return v.is_finite().then_some(v);
    }

    let (num, den) = value.split_once('/')?;
    let num = num.trim().parse::<f64>().ok()?;
    let den = den.trim().parse::<f64>().ok()?;
    if den == 0.0 {
        return None;
    }
    Some(num / den)
}

const ZONED_LAYOUTS: &[&str] = &["%Y:%m:%d %H:%M:%S%:z", "%Y:%m:%d %H:%M:%S%.f%:z"];
const NAIVE_LAYOUTS: &[&str] = &["%Y:%m:%d %H:%M:%S", "%Y:%m:%d %H:%M:%S%.f"];

/// Parse an EXIF timestamp such as `2021:12:11 09:17:18-08:00`.
///
/// Timestamps without an offset are taken as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<FixedOffset>> {
    for layout in ZONED_LAYOUTS {
        if let Ok(ts) = DateTime::parse_from_str(value, layout) {
            return Some(ts);
        }
    }

    for layout in NAIVE_LAYOUTS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, layout) {
            return Some(ts.and_utc().fixed_offset());
        }
    }

    None
}
