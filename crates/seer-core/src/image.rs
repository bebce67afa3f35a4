//! Image inputs and their base64 transport encoding.
//!
//! Callers may hand over an image in any of three forms: raw encoded bytes, an in-memory
//! buffer, or an already decoded [`DynamicImage`]. All of them end up as standard padded base64
//! text before they are embedded in a request.

use std::{io::Cursor, path::Path};

use ::image::{DynamicImage, ImageFormat};
use base64::{Engine, prelude::BASE64_STANDARD};
use bytes::Bytes;

use crate::error::VisionError;

/// Media type advertised for every embedded image.
pub const IMAGE_MEDIA_TYPE: &str = "image/jpeg";

#[derive(Debug, Clone)]
pub enum ImageInput {
    /// Encoded image file contents.
    Bytes(Bytes),
    /// Encoded image file contents behind a cursor. The position is ignored.
    Buffer(Cursor<Vec<u8>>),
    Decoded(DynamicImage),
}

impl ImageInput {
    /// Read an encoded image file from disk without decoding it.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, VisionError> {
        Ok(ImageInput::Bytes(Bytes::from(std::fs::read(path)?)))
    }

    pub fn to_base64(&self) -> Result<String, VisionError> {
        image_to_base64(self)
    }

    /// Decode the image into pixels, whatever form it was given in.
    pub fn decode(&self) -> Result<DynamicImage, VisionError> {
        match self {
            ImageInput::Bytes(bytes) => Ok(::image::load_from_memory(bytes)?),
            ImageInput::Buffer(cursor) => Ok(::image::load_from_memory(cursor.get_ref())?),
            ImageInput::Decoded(image) => Ok(image.clone()),
        }
    }
}

impl From<Vec<u8>> for ImageInput {
    fn from(value: Vec<u8>) -> Self {
        ImageInput::Bytes(Bytes::from(value))
    }
}

impl From<&[u8]> for ImageInput {
    fn from(value: &[u8]) -> Self {
        ImageInput::Bytes(Bytes::copy_from_slice(value))
    }
}

impl From<Bytes> for ImageInput {
    fn from(value: Bytes) -> Self {
        ImageInput::Bytes(value)
    }
}

impl From<Cursor<Vec<u8>>> for ImageInput {
    fn from(value: Cursor<Vec<u8>>) -> Self {
        ImageInput::Buffer(value)
    }
}

impl From<DynamicImage> for ImageInput {
    fn from(value: DynamicImage) -> Self {
        ImageInput::Decoded(value)
    }
}

/// Encode an image as base64 text.
///
/// Bytes and buffers are encoded as-is. A decoded image is serialized to JPEG, or to PNG when
/// the JPEG encoder rejects its color type.
pub fn image_to_base64(image: &ImageInput) -> Result<String, VisionError> {
    match image {
        ImageInput::Bytes(bytes) => Ok(BASE64_STANDARD.encode(bytes)),
        ImageInput::Buffer(cursor) => Ok(BASE64_STANDARD.encode(cursor.get_ref())),
        ImageInput::Decoded(image) => Ok(BASE64_STANDARD.encode(encode_decoded(image)?)),
    }
}

fn encode_decoded(image: &DynamicImage) -> Result<Vec<u8>, VisionError> {
    let mut buffer = Cursor::new(Vec::new());
    if let Err(err) = image.write_to(&mut buffer, ImageFormat::Jpeg) {
        tracing::debug!(target: "seer", "jpeg encoding failed ({err}), falling back to png");
        buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, ImageFormat::Png)?;
    }
    Ok(buffer.into_inner())
}

/// Save the image as a JPEG file, converting it to RGB first.
pub(crate) fn save_jpeg(image: &ImageInput, path: &Path) -> Result<(), VisionError> {
    let rgb = DynamicImage::ImageRgb8(image.decode()?.to_rgb8());
    rgb.save_with_format(path, ImageFormat::Jpeg)?;
    Ok(())
}
