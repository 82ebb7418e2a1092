//! QR code rendering for deep links

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use passmint_common::{Error, Result};
use qrcode::types::QrError;
use qrcode::{Color, EcLevel, QrCode, Version};
use std::io::Cursor;

const MAX_VERSION: i16 = 40;

/// Renders payloads as PNG QR codes wrapped in a data URI.
///
/// Output is a pure function of the payload and these parameters.
#[derive(Debug, Clone, Copy)]
pub struct QrEncoder {
    pub ec_level: EcLevel,
    /// Smallest symbol version tried; larger ones are used when the payload does not fit
    pub min_version: i16,
    /// Pixels per module
    pub box_size: u32,
    /// Quiet zone width in modules
    pub border: u32,
}

impl Default for QrEncoder {
    fn default() -> Self {
        Self {
            ec_level: EcLevel::L,
            min_version: 1,
            box_size: 10,
            border: 4,
        }
    }
}

impl QrEncoder {
    /// Encode `payload` as `data:image/png;base64,...`.
    pub fn encode(&self, payload: &str) -> Result<String> {
        let png = self.encode_png(payload)?;
        Ok(format!("data:image/png;base64,{}", STANDARD.encode(png)))
    }

    /// Encode `payload` as raw PNG bytes.
    pub fn encode_png(&self, payload: &str) -> Result<Vec<u8>> {
        if self.box_size == 0 {
            return Err(Error::Encoding("box size must be at least 1".to_string()));
        }

        let code = self.fit(payload.as_bytes())?;
        let modules = code.width() as u32;
        let colors = code.to_colors();

        let side = (modules + 2 * self.border) * self.box_size;
        let mut img = GrayImage::from_pixel(side, side, Luma([255u8]));

        for (index, color) in colors.iter().enumerate() {
            if *color != Color::Dark {
                continue;
            }
            let x0 = (index as u32 % modules + self.border) * self.box_size;
            let y0 = (index as u32 / modules + self.border) * self.box_size;
            for dy in 0..self.box_size {
                for dx in 0..self.box_size {
                    img.put_pixel(x0 + dx, y0 + dy, Luma([0u8]));
                }
            }
        }

        let mut png = Cursor::new(Vec::new());
        DynamicImage::ImageLuma8(img)
            .write_to(&mut png, ImageFormat::Png)
            .map_err(|e| Error::Encoding(format!("failed to write PNG: {}", e)))?;

        Ok(png.into_inner())
    }

    fn fit(&self, data: &[u8]) -> Result<QrCode> {
        if !(1..=MAX_VERSION).contains(&self.min_version) {
            return Err(Error::Encoding(format!(
                "minimum version must be 1-{}, got {}",
                MAX_VERSION, self.min_version
            )));
        }

        for version in self.min_version..=MAX_VERSION {
            match QrCode::with_version(data, Version::Normal(version), self.ec_level) {
                Ok(code) => return Ok(code),
                Err(QrError::DataTooLong) => continue,
                Err(e) => return Err(Error::Encoding(e.to_string())),
            }
        }

        Err(Error::Encoding(format!(
            "payload of {} bytes does not fit in a QR code",
            data.len()
        )))
    }
}
