use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

/// One imported photograph
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ImageRecord {
    pub image_id: String,
    pub import_batch_id: String,
    pub original_filename: String,
    pub width_pixels: u32,
    pub height_pixels: u32,
    pub is_processed: bool,
    #[serde(flatten)]
    pub metadata: ImageMetadata,
}

/// Capture metadata read from the embedded tags
///
/// Every field is optional: the tool only reports tags present in the file,
/// and values that fail to parse are left unset.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ImageMetadata {
    pub aperture: Option<f64>,
    pub aperture_value: Option<f64>,
    pub camera_model: Option<String>,
    pub color_space: Option<String>,
    pub date_time_created: Option<DateTime<FixedOffset>>,
    pub date_time_original: Option<DateTime<FixedOffset>>,
    pub device_manufacturer: Option<String>,
    pub device_model: Option<String>,
    pub digital_creation_date_time: Option<DateTime<FixedOffset>>,
    pub exposure_compensation: Option<f64>,
    pub exposure_mode: Option<String>,
    pub exposure_program: Option<String>,
    pub exposure_time: Option<String>,
    pub file_name: Option<String>,
    pub flash: Option<String>,
    pub f_number: Option<f64>,
    pub focal_length: Option<String>,
    pub focal_length_in_35mm_format: Option<String>,
    pub focal_plane_resolution_unit: Option<String>,
    pub focal_plane_x_resolution: Option<f64>,
    pub focal_plane_y_resolution: Option<f64>,
    pub format: Option<String>,
    pub gps_altitude: Option<String>,
    pub gps_dest_bearing: Option<String>,
    pub gps_img_direction: Option<String>,
    pub gps_latitude: Option<String>,
    pub gps_longitude: Option<String>,
    pub gps_position: Option<String>,
    pub gps_speed: Option<String>,
    pub image_height: Option<f64>,
    pub image_number: Option<f64>,
    pub image_size: Option<String>,
    pub image_width: Option<String>,
    pub iso: Option<f64>,
    pub lens: Option<String>,
    pub lens_id: Option<String>,
    pub lens_info: Option<String>,
    pub lens_make: Option<String>,
    pub lens_model: Option<String>,
    pub lens_serial_number: Option<String>,
    pub make: Option<String>,
    pub megapixels: Option<f64>,
    pub mime_type: Option<String>,
    pub modify_date: Option<String>,
    pub orientation: Option<String>,
    pub rating: Option<i64>,
    pub resolution_unit: Option<String>,
    pub serial_number: Option<String>,
    pub shutter_speed: Option<String>,
    pub shutter_speed_value: Option<String>,
    pub software: Option<String>,
    pub x_resolution: Option<f64>,
    pub y_resolution: Option<f64>,
}

/// One stored object belonging to an image: the original or a rendition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileRecord {
    pub file_id: String,
    pub image_id: String,
    pub import_batch_id: String,
    /// Object name without the media prefix, e.g. `{image_id}_thumb.webp`
    pub filename: String,
    pub storage_path: String,
    pub public_url: String,
    pub is_original: bool,
    pub width: u32,
    pub height: u32,
}

/// Task-status row polled by clients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImportTaskRow {
    pub image_id: String,
    pub import_batch_id: String,
    pub filename: String,
    pub is_processed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Album {
    pub album_id: String,
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
}
