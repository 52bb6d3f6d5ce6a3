//! Bilinear resizing with OpenCV `INTER_LINEAR` sampling.

use crate::image::{Image, CHANNELS};
use crate::util::math::round_half_even;
use crate::util::{DetPostError, DetPostResult};

/// Output size for scaling `len` by `scale`, rounded half-to-even.
pub(crate) fn scaled_len(len: usize, scale: f64) -> usize {
    round_half_even(len as f64 * scale).max(0.0) as usize
}

/// Resizes `src` by a uniform `scale` factor.
///
/// Destination pixel centers map back to `(d + 0.5) / scale - 0.5` in source
/// coordinates; samples before the first pixel or past the last one clamp to
/// the border.
pub(crate) fn resize_bilinear(src: &Image, scale: f64) -> DetPostResult<Image> {
    if !(scale.is_finite() && scale > 0.0) {
        return Err(DetPostError::InvalidConfig("scale factor must be positive"));
    }
    let dst_width = scaled_len(src.width(), scale);
    let dst_height = scaled_len(src.height(), scale);
    let mut out = Image::zeros(dst_width, dst_height)?;

    let xs = sample_axis(src.width(), dst_width, scale);
    let ys = sample_axis(src.height(), dst_height, scale);

    let dst_stride = dst_width * CHANNELS;
    let data = out.data_mut();
    for (dy, &(y0, y1, fy)) in ys.iter().enumerate() {
        let row0 = src.row(y0).ok_or(DetPostError::IndexOutOfBounds {
            index: y0,
            len: src.height(),
            context: "row",
        })?;
        let row1 = src.row(y1).ok_or(DetPostError::IndexOutOfBounds {
            index: y1,
            len: src.height(),
            context: "row",
        })?;
        let dst_row = &mut data[dy * dst_stride..(dy + 1) * dst_stride];
        for (dx, &(x0, x1, fx)) in xs.iter().enumerate() {
            for c in 0..CHANNELS {
                let a = row0[x0 * CHANNELS + c];
                let b = row0[x1 * CHANNELS + c];
                let p = row1[x0 * CHANNELS + c];
                let q = row1[x1 * CHANNELS + c];
                let top = a + (b - a) * fx;
                let bottom = p + (q - p) * fx;
                dst_row[dx * CHANNELS + c] = top + (bottom - top) * fy;
            }
        }
    }

    Ok(out)
}

/// Precomputes `(i0, i1, frac)` per destination index along one axis.
fn sample_axis(src_len: usize, dst_len: usize, scale: f64) -> Vec<(usize, usize, f32)> {
    let last = src_len - 1;
    (0..dst_len)
        .map(|d| {
            let pos = (d as f64 + 0.5) / scale - 0.5;
            let base = pos.floor();
            let mut frac = (pos - base) as f32;
            let mut i0 = base as isize;
            if i0 < 0 {
                i0 = 0;
                frac = 0.0;
            }
            let mut i0 = i0 as usize;
            if i0 >= last {
                i0 = last;
                frac = 0.0;
            }
            let i1 = (i0 + 1).min(last);
            (i0, i1, frac)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{resize_bilinear, scaled_len};
    use crate::image::Image;

    #[test]
    fn scaled_len_rounds_half_even() {
        assert_eq!(scaled_len(800, 1.2), 960);
        assert_eq!(scaled_len(5, 0.5), 2);
        assert_eq!(scaled_len(7, 0.5), 4);
    }

    #[test]
    fn identity_scale_preserves_pixels() {
        let data: Vec<u8> = (0u8..48).collect();
        let img = Image::from_u8(&data, 4, 4).unwrap();
        let out = resize_bilinear(&img, 1.0).unwrap();
        assert_eq!(out, img);
    }

    #[test]
    fn upsampling_interpolates_between_columns() {
        let img = Image::new(vec![0.0, 0.0, 0.0, 4.0, 4.0, 4.0], 2, 1).unwrap();
        let out = resize_bilinear(&img, 2.0).unwrap();
        assert_eq!(out.width(), 4);
        assert_eq!(out.height(), 2);
        let firsts: Vec<f32> = (0..4).map(|x| out.pixel(x, 0).unwrap()[0]).collect();
        assert_eq!(firsts, vec![0.0, 1.0, 3.0, 4.0]);
    }

    #[test]
    fn rejects_non_positive_scale() {
        let img = Image::zeros(2, 2).unwrap();
        assert!(resize_bilinear(&img, 0.0).is_err());
    }
}
