//! Grayscale frame handed from a frame source to the fusion pipeline.

use image::GrayImage;

/// A captured grayscale frame.
#[derive(Clone)]
pub struct Frame {
    /// Grayscale pixel data (width * height bytes).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub sequence: u32,
}

impl Frame {
    pub fn from_image(image: GrayImage, sequence: u32) -> Self {
        let (width, height) = image.dimensions();
        Self {
            data: image.into_raw(),
            width,
            height,
            sequence,
        }
    }

    /// View the pixel buffer as an image.
    ///
    /// Fails when the buffer does not hold exactly `width * height` bytes.
    pub fn to_image(&self) -> Result<GrayImage, FrameError> {
        let expected = self.width as usize * self.height as usize;
        if self.data.len() != expected {
            return Err(FrameError::InvalidLength {
                expected,
                actual: self.data.len(),
            });
        }
        GrayImage::from_raw(self.width, self.height, self.data.clone()).ok_or(
            FrameError::InvalidLength {
                expected,
                actual: self.data.len(),
            },
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid frame buffer length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_roundtrip_keeps_pixels() {
        let image = GrayImage::from_fn(4, 3, |x, y| image::Luma([(x + y * 4) as u8]));
        let frame = Frame::from_image(image.clone(), 7);
        assert_eq!(frame.width, 4);
        assert_eq!(frame.height, 3);
        assert_eq!(frame.sequence, 7);
        assert_eq!(frame.to_image().unwrap(), image);
    }

    #[test]
    fn test_to_image_rejects_short_buffer() {
        let frame = Frame { data: vec![0; 5], width: 3, height: 2, sequence: 0 };
        match frame.to_image() {
            Err(FrameError::InvalidLength { expected, actual }) => {
                assert_eq!(expected, 6);
                assert_eq!(actual, 5);
            }
            Ok(_) => panic!("short buffer accepted"),
        }
    }
}
