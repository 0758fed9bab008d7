use crate::color::ColorTransmittanceExt;
use crate::helpers::RenderColor;
use crate::output::Film;
use palette::Srgb;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Unable to write image: {0}")]
    Io(#[from] std::io::Error),

    #[error("PNG encoding failed: {0}")]
    Encoding(#[from] png::EncodingError),
}

/// Writes a resolved film as an 8-bit sRGB PNG.
#[derive(Debug, Clone)]
pub struct PngOutput {
    path: PathBuf,
}

impl PngOutput {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_film(&self, film: &Film, samples_per_pixel: u32) -> Result<(), OutputError> {
        let file = File::create(&self.path)?;
        encode(
            BufWriter::new(file),
            film.width(),
            film.height(),
            &film.resolve(samples_per_pixel),
        )?;
        tracing::info!(path = %self.path.display(), "image written");
        Ok(())
    }
}

fn encode<W: Write>(w: W, width: u32, height: u32, pixels: &[RenderColor]) -> Result<(), OutputError> {
    let mut encoder = png::Encoder::new(w, width, height);
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;

    let data: Vec<u8> = pixels
        .iter()
        .map(|p| {
            let linear = p.color.map_channels(|c| c.clamp(0.0, 1.0));
            Srgb::<f32>::from_linear(linear).into_format::<u8>()
        })
        .flat_map(|p| [p.red, p.green, p.blue])
        .collect();

    writer.write_image_data(&data)?;
    Ok(())
}

#[cfg(test)]
mod test_png_output {
    use super::*;
    use crate::helpers::ColorType;

    #[test]
    fn test_encodes_png_signature_and_size() {
        let pixels = vec![
            ColorType::white().with_alpha(1.0),
            ColorType::splat(4.0).with_alpha(1.0),
            ColorType::black().with_alpha(0.0),
            ColorType::new(0.5, 0.0, 0.25).with_alpha(1.0),
        ];
        let mut bytes = Vec::new();
        encode(&mut bytes, 2, 2, &pixels).unwrap();

        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
        let decoder = png::Decoder::new(bytes.as_slice());
        let reader = decoder.read_info().unwrap();
        assert_eq!((reader.info().width, reader.info().height), (2, 2));
    }
}
