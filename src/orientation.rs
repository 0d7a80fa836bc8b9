//! Image orientation normalization.
//!
//! Phone cameras usually store pixels in sensor order and record the real
//! orientation in EXIF. Plants are stored with the rotation applied so every
//! consumer sees the image upright.

use async_trait::async_trait;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageReader};
use std::io::Cursor;

use crate::error::SyncError;

/// Blob to blob transform applied to images before they are stored.
#[async_trait]
pub trait ImageNormalizer: Send + Sync {
    async fn normalize(&self, blob: Vec<u8>) -> Result<Vec<u8>, SyncError>;
}

/// Leaves images untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

#[async_trait]
impl ImageNormalizer for Passthrough {
    async fn normalize(&self, blob: Vec<u8>) -> Result<Vec<u8>, SyncError> {
        Ok(blob)
    }
}

/// Applies the EXIF orientation tag to the pixels.
///
/// Images that cannot be decoded (unknown or disabled formats such as GIF
/// or HEIC) are kept as they are.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExifOrientation;

#[async_trait]
impl ImageNormalizer for ExifOrientation {
    async fn normalize(&self, blob: Vec<u8>) -> Result<Vec<u8>, SyncError> {
        let fixed = tokio::task::spawn_blocking(move || match fix_orientation(&blob) {
            Ok(Some(fixed)) => fixed,
            Ok(None) => blob,
            Err(e) => {
                tracing::warn!("Storing image without orientation fix: {}", e);
                blob
            }
        })
        .await?;
        Ok(fixed)
    }
}

/// Returns the re-encoded image if its orientation needed fixing, `None` if
/// the image is already upright.
pub fn fix_orientation(bytes: &[u8]) -> Result<Option<Vec<u8>>, image::ImageError> {
    let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    let format = reader.format().ok_or_else(|| {
        image::ImageError::Unsupported(image::error::UnsupportedError::from_format_and_kind(
            image::error::ImageFormatHint::Unknown,
            image::error::UnsupportedErrorKind::Format(image::error::ImageFormatHint::Unknown),
        ))
    })?;

    let mut decoder = reader.into_decoder()?;
    let orientation = decoder.orientation()?;
    if matches!(orientation, Orientation::NoTransforms) {
        return Ok(None);
    }

    tracing::debug!("Applying EXIF orientation {:?}", orientation);
    let mut img = DynamicImage::from_decoder(decoder)?;
    img.apply_orientation(orientation);

    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, format)?;
    Ok(Some(out.into_inner()))
}

/// A valid 1x1 GIF, a format this crate does not decode.
#[cfg(test)]
pub(crate) const GIF_1X1: &[u8] = b"GIF89a\x01\x00\x01\x00\x80\x00\x00\xff\xff\xff\x00\x00\x00!\xf9\x04\x01\x00\x00\x00\x00,\x00\x00\x00\x00\x01\x00\x01\x00\x00\x02\x02D\x01\x00;";
