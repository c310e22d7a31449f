use image::RgbImage;
use image::imageops::{self, FilterType};

/// Resize a frame to a square model input and lay it out as planar RGB.
///
/// Values are scaled to `[0, 1]`. The returned vector holds `3 * size * size`
/// floats in channel-major order (CHW).
pub fn to_chw_tensor(frame: &RgbImage, size: u32) -> Vec<f32> {
    let resized = imageops::resize(frame, size, size, FilterType::Triangle);
    let plane = (size * size) as usize;
    let mut data = vec![0.0f32; 3 * plane];

    for (x, y, pixel) in resized.enumerate_pixels() {
        let offset = (y * size + x) as usize;
        for channel in 0..3 {
            data[channel * plane + offset] = pixel[channel] as f32 / 255.0;
        }
    }

    data
}

/// Copy a region out of a frame
pub fn crop(frame: &RgbImage, x: u32, y: u32, width: u32, height: u32) -> RgbImage {
    imageops::crop_imm(frame, x, y, width, height).to_image()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn chw_tensor_is_planar_and_normalized() {
        let frame = RgbImage::from_pixel(4, 4, Rgb([255, 0, 51]));
        let data = to_chw_tensor(&frame, 2);

        assert_eq!(data.len(), 12);
        assert!(data[0..4].iter().all(|v| (*v - 1.0).abs() < 1e-6));
        assert!(data[4..8].iter().all(|v| *v == 0.0));
        assert!(data[8..12].iter().all(|v| (*v - 0.2).abs() < 1e-6));
    }

    #[test]
    fn crop_copies_region() {
        let mut frame = RgbImage::new(10, 10);
        frame.put_pixel(3, 4, Rgb([9, 9, 9]));
        let cropped = crop(&frame, 3, 4, 2, 2);

        assert_eq!(cropped.dimensions(), (2, 2));
        assert_eq!(cropped.get_pixel(0, 0), &Rgb([9, 9, 9]));
    }
}
