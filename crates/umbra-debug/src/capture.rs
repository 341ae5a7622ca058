//! PNG encoding of shadow map depth readbacks.

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("depth data has {actual} values, expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("PNG encoding failed: {0}")]
    Encoding(#[from] png::EncodingError),
}

/// Encodes row-major depth in `[0, 1]` as a 16-bit grayscale PNG.
/// Cleared texels (depth 1.0) come out white.
pub fn encode_depth_png(width: u32, height: u32, depth: &[f32]) -> Result<Vec<u8>, CaptureError> {
    let expected = width as usize * height as usize;
    if depth.len() != expected {
        return Err(CaptureError::SizeMismatch {
            expected,
            actual: depth.len(),
        });
    }

    let samples: Vec<u8> = depth
        .iter()
        .flat_map(|d| {
            let value = (d.clamp(0.0, 1.0) * u16::MAX as f32).round() as u16;
            value.to_be_bytes()
        })
        .collect();

    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, width, height);
        encoder.set_color(png::ColorType::Grayscale);
        encoder.set_depth(png::BitDepth::Sixteen);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(&samples)?;
        writer.finish()?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_depth_png_decodes() {
        let depth = [0.0, 0.25, 0.5, 1.0, 1.5, -1.0];
        let bytes = encode_depth_png(3, 2, &depth).unwrap();
        assert_eq!(&bytes[0..4], &[0x89, 0x50, 0x4E, 0x47]);

        let decoder = png::Decoder::new(Cursor::new(bytes));
        let mut reader = decoder.read_info().unwrap();
        let mut buf = vec![0; reader.output_buffer_size()];
        let info = reader.next_frame(&mut buf).unwrap();
        assert_eq!((info.width, info.height), (3, 2));
        assert_eq!(info.bit_depth, png::BitDepth::Sixteen);

        let values: Vec<u16> = buf[..info.buffer_size()]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        assert_eq!(values[0], 0);
        assert_eq!(values[2], 32768);
        assert_eq!(values[3], u16::MAX);
        // Out-of-range input is clamped.
        assert_eq!(values[4], u16::MAX);
        assert_eq!(values[5], 0);
    }

    #[test]
    fn test_size_mismatch() {
        let err = encode_depth_png(4, 4, &[0.5; 15]).unwrap_err();
        assert!(matches!(
            err,
            CaptureError::SizeMismatch {
                expected: 16,
                actual: 15
            }
        ));
    }
}
