//! Raster resampling used when packing bands of heterogeneous resolutions.

use ndarray::Array3;

use crate::error::{Result, TerrabenchError};

/// Resample a `[height, width, channels]` array by a uniform spatial factor
/// using polynomial interpolation of the given order: 0 (nearest),
/// 1 (bilinear) or 3 (cubic, Catmull-Rom). Sampling is edge-clamped, so a
/// constant plane stays constant at any factor.
pub fn zoom(data: &Array3<f32>, factor: f64, order: usize) -> Result<Array3<f32>> {
    if !matches!(order, 0 | 1 | 3) {
        return Err(TerrabenchError::UnsupportedResampleOrder { order });
    }
    let (height, width, channels) = data.dim();
    let out_height = (height as f64 * factor).round() as usize;
    let out_width = (width as f64 * factor).round() as usize;

    let mut out = Array3::<f32>::zeros((out_height, out_width, channels));
    for y in 0..out_height {
        let (y_base, y_weights) = kernel_weights(src_coord(y, factor), order);
        for x in 0..out_width {
            let (x_base, x_weights) = kernel_weights(src_coord(x, factor), order);
            for c in 0..channels {
                let mut acc = 0.0f64;
                for (i, wy) in y_weights.iter().enumerate() {
                    let yy = clamp_index(y_base + i as isize, height);
                    for (j, wx) in x_weights.iter().enumerate() {
                        let xx = clamp_index(x_base + j as isize, width);
                        acc += wy * wx * data[(yy, xx, c)] as f64;
                    }
                }
                out[(y, x, c)] = acc as f32;
            }
        }
    }
    Ok(out)
}

/// Map an output pixel centre back to input coordinates.
fn src_coord(out_index: usize, factor: f64) -> f64 {
    (out_index as f64 + 0.5) / factor - 0.5
}

fn clamp_index(index: isize, len: usize) -> usize {
    index.clamp(0, len as isize - 1) as usize
}

/// Base input index and interpolation weights for one axis.
fn kernel_weights(t: f64, order: usize) -> (isize, Vec<f64>) {
    match order {
        0 => (t.round() as isize, vec![1.0]),
        1 => {
            let base = t.floor();
            let f = t - base;
            (base as isize, vec![1.0 - f, f])
        }
        3 => {
            let base = t.floor();
            let f = t - base;
            // Catmull-Rom spline; the four weights sum to one.
            let w0 = ((-0.5 * f + 1.0) * f - 0.5) * f;
            let w1 = ((1.5 * f - 2.5) * f) * f + 1.0;
            let w2 = ((-1.5 * f + 2.0) * f + 0.5) * f;
            let w3 = (0.5 * f - 0.5) * f * f;
            (base as isize - 1, vec![w0, w1, w2, w3])
        }
        _ => unreachable!("order validated in zoom"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unsupported_order() {
        let data = Array3::<f32>::zeros((2, 2, 1));
        assert!(matches!(
            zoom(&data, 2.0, 2),
            Err(TerrabenchError::UnsupportedResampleOrder { order: 2 })
        ));
    }

    #[test]
    fn doubles_spatial_shape() {
        let data = Array3::<f32>::zeros((5, 5, 2));
        let out = zoom(&data, 2.0, 3).unwrap();
        assert_eq!(out.dim(), (10, 10, 2));
    }

    #[test]
    fn constant_plane_stays_constant() {
        for order in [0, 1, 3] {
            let data = Array3::<f32>::from_elem((4, 4, 1), 7.0);
            let out = zoom(&data, 2.5, order).unwrap();
            assert_eq!(out.dim(), (10, 10, 1));
            for v in out.iter() {
                assert!((v - 7.0).abs() < 1e-4, "order {order}: got {v}");
            }
        }
    }

    #[test]
    fn identity_factor_preserves_values() {
        let data =
            Array3::<f32>::from_shape_fn((3, 3, 1), |(y, x, _)| (y * 3 + x) as f32);
        for order in [0, 1, 3] {
            let out = zoom(&data, 1.0, order).unwrap();
            assert_eq!(out, data, "order {order}");
        }
    }
}
