//! Page size detection.

use std::io::Cursor;

use image::ImageReader;

/// Width and height read from the image header, if the format is recognised.
///
/// Only the header is decoded, so this is cheap even for large pages.
pub fn probe_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .ok()?;
    match reader.into_dimensions() {
        Ok(dims) => Some(dims),
        Err(e) => {
            tracing::debug!("Could not read page dimensions: {}", e);
            None
        }
    }
}
