//! Per-pixel undistortion/rectification lookup tables.

use crate::error::{CalibrationError, Result};
use crate::result::CalibrationResult;
use fishtrack_core::{CameraSide, Pt2, Real};
use fishtrack_linear::unrectify_pixel;
use image::{GrayImage, Luma};

/// For every rectified pixel, the raw source pixel it samples from.
///
/// Entries that fall outside the raw image are `NaN` and render black.
#[derive(Debug, Clone)]
pub struct RectificationMaps {
    pub width: u32,
    pub height: u32,
    pub map_x: Vec<f32>,
    pub map_y: Vec<f32>,
}

impl RectificationMaps {
    pub fn build(result: &CalibrationResult, side: CameraSide) -> Result<Self> {
        let (primary, secondary, stereo) = result.stereo_parts()?;
        let rect = &stereo.rectification;
        let (camera, r, p) = match side {
            CameraSide::Primary => (primary.camera(), &rect.r1, &rect.p1),
            CameraSide::Secondary => (secondary.camera(), &rect.r2, &rect.p2),
        };

        let (width, height) = (result.image_width, result.image_height);
        let n = (width as usize) * (height as usize);
        let mut map_x = Vec::with_capacity(n);
        let mut map_y = Vec::with_capacity(n);
        for v in 0..height {
            for u in 0..width {
                let rect_px = Pt2::new(Real::from(u), Real::from(v));
                match unrectify_pixel(&camera, r, p, &rect_px) {
                    Some(src) => {
                        map_x.push(src.x as f32);
                        map_y.push(src.y as f32);
                    }
                    None => {
                        map_x.push(f32::NAN);
                        map_y.push(f32::NAN);
                    }
                }
            }
        }
        log::debug!("built {width}x{height} rectification map for {} camera", side.as_str());

        Ok(Self {
            width,
            height,
            map_x,
            map_y,
        })
    }

    /// Resample `image` through the map with bilinear interpolation.
    pub fn remap(&self, image: &GrayImage) -> Result<GrayImage> {
        if image.width() != self.width || image.height() != self.height {
            return Err(CalibrationError::InvalidConfiguration(format!(
                "image is {}x{}, map expects {}x{}",
                image.width(),
                image.height(),
                self.width,
                self.height
            )));
        }
        let mut out = GrayImage::new(self.width, self.height);
        for (idx, (x, y)) in self.map_x.iter().zip(&self.map_y).enumerate() {
            let value = sample_bilinear(image, *x, *y).unwrap_or(0);
            let u = (idx % self.width as usize) as u32;
            let v = (idx / self.width as usize) as u32;
            out.put_pixel(u, v, Luma([value]));
        }
        Ok(out)
    }
}

fn sample_bilinear(image: &GrayImage, x: f32, y: f32) -> Option<u8> {
    if !x.is_finite() || !y.is_finite() {
        return None;
    }
    let max_x = image.width() as f32 - 1.0;
    let max_y = image.height() as f32 - 1.0;
    if x < 0.0 || y < 0.0 || x > max_x || y > max_y {
        return None;
    }
    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(image.width() - 1);
    let y1 = (y0 + 1).min(image.height() - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let at = |u: u32, v: u32| f32::from(image.get_pixel(u, v)[0]);
    let top = at(x0, y0) * (1.0 - fx) + at(x1, y0) * fx;
    let bottom = at(x0, y1) * (1.0 - fx) + at(x1, y1) * fx;
    Some((top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bilinear_interpolates_between_pixels() {
        let mut img = GrayImage::new(2, 2);
        img.put_pixel(0, 0, Luma([0]));
        img.put_pixel(1, 0, Luma([100]));
        img.put_pixel(0, 1, Luma([100]));
        img.put_pixel(1, 1, Luma([200]));
        assert_eq!(sample_bilinear(&img, 0.5, 0.5), Some(100));
        assert_eq!(sample_bilinear(&img, 1.0, 0.0), Some(100));
        assert_eq!(sample_bilinear(&img, -0.1, 0.0), None);
        assert_eq!(sample_bilinear(&img, f32::NAN, 0.0), None);
    }

    #[test]
    fn remap_through_identity_and_shift() {
        let img = GrayImage::from_fn(4, 3, |u, v| Luma([(10 * u + 50 * v) as u8]));
        let identity = RectificationMaps {
            width: 4,
            height: 3,
            map_x: (0..12).map(|i| (i % 4) as f32).collect(),
            map_y: (0..12).map(|i| (i / 4) as f32).collect(),
        };
        assert_eq!(identity.remap(&img).unwrap(), img);

        let shifted = RectificationMaps {
            map_x: identity.map_x.iter().map(|x| x + 1.0).collect(),
            ..identity.clone()
        };
        let out = shifted.remap(&img).unwrap();
        assert_eq!(out.get_pixel(0, 1)[0], 60);
        assert_eq!(out.get_pixel(3, 1)[0], 0);

        assert!(identity.remap(&GrayImage::new(5, 3)).is_err());
    }
}
