//! Pure calculation functions for rendition dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

use image::metadata::Orientation;

/// The larger of width and height.
pub fn long_edge(dimensions: (u32, u32)) -> u32 {
    dimensions.0.max(dimensions.1)
}

/// Whether applying `orientation` swaps width and height.
pub fn is_quarter_turn(orientation: Orientation) -> bool {
    matches!(
        orientation,
        Orientation::Rotate90
            | Orientation::Rotate270
            | Orientation::Rotate90FlipH
            | Orientation::Rotate270FlipH
    )
}

/// Dimensions of the image as displayed, given its stored dimensions.
///
/// # Examples
/// ```
/// # use darkroom::imaging::oriented_dimensions;
/// use image::metadata::Orientation;
///
/// assert_eq!(oriented_dimensions((4000, 3000), Orientation::Rotate90), (3000, 4000));
/// assert_eq!(oriented_dimensions((4000, 3000), Orientation::Rotate180), (4000, 3000));
/// ```
pub fn oriented_dimensions(stored: (u32, u32), orientation: Orientation) -> (u32, u32) {
    if is_quarter_turn(orientation) {
        (stored.1, stored.0)
    } else {
        stored
    }
}

/// Scale `source` so that its long edge becomes `target_long_edge`.
///
/// The aspect ratio is kept (the short edge is rounded to the nearest pixel,
/// never below 1) and the result never exceeds the source: a target at or
/// above the source long edge returns the source dimensions unchanged.
///
/// # Examples
/// ```
/// # use darkroom::imaging::target_dimensions;
/// // Landscape 4000x3000 → long edge 200 gives 200x150
/// assert_eq!(target_dimensions((4000, 3000), 200), (200, 150));
///
/// // No upscaling: 1200x800 asked for 2560 stays 1200x800
/// assert_eq!(target_dimensions((1200, 800), 2560), (1200, 800));
/// ```
pub fn target_dimensions(source: (u32, u32), target_long_edge: u32) -> (u32, u32) {
    let (src_w, src_h) = source;
    let src_long = long_edge(source);

    if src_long == 0 || target_long_edge >= src_long {
        return source;
    }

    let scale = target_long_edge as f64 / src_long as f64;
    let scale_edge = |edge: u32| ((edge as f64 * scale).round() as u32).max(1);

    if src_w >= src_h {
        (target_long_edge, scale_edge(src_h))
    } else {
        (scale_edge(src_w), target_long_edge)
    }
}
