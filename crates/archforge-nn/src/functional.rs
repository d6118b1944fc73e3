//! Functional API - Stateless Layer Operations
//!
//! Reference CPU kernels and the shape checks every layer shares. Layers hold
//! their configuration and parameters and delegate the arithmetic here.
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use archforge_core::{Error, Result};
use archforge_tensor::{flattened_shape, window_output, Shape, Tensor};

// =============================================================================
// Shape Checks
// =============================================================================

/// Fails unless `input` has exactly `rank` dimensions.
pub fn expect_rank(layer: &str, input: &[usize], rank: usize) -> Result<()> {
    if input.len() != rank {
        return Err(Error::invalid_shape(
            layer,
            input,
            format!("expected a rank-{rank} input"),
        ));
    }
    Ok(())
}

/// Fails unless `input` is `[N, channels, H, W]`.
pub fn expect_image(layer: &str, input: &[usize], channels: usize) -> Result<()> {
    expect_rank(layer, input, 4)?;
    if input[1] != channels {
        return Err(Error::invalid_shape(
            layer,
            input,
            format!("expected {channels} input channels, got {}", input[1]),
        ));
    }
    Ok(())
}

/// Spatial output size of a 2D sliding window over `[N, C, H, W]`.
pub fn window_shape(
    layer: &str,
    input: &[usize],
    kernel: (usize, usize),
    stride: (usize, usize),
    padding: (usize, usize),
) -> Result<(usize, usize)> {
    expect_rank(layer, input, 4)?;
    let out_h = window_output(input[2], kernel.0, stride.0, padding.0);
    let out_w = window_output(input[3], kernel.1, stride.1, padding.1);
    match (out_h, out_w) {
        (Some(h), Some(w)) => Ok((h, w)),
        _ => Err(Error::invalid_shape(
            layer,
            input,
            format!(
                "window {kernel:?} (stride {stride:?}, padding {padding:?}) does not fit the spatial extent"
            ),
        )),
    }
}

fn dims4(input: &Tensor) -> (usize, usize, usize, usize) {
    let s = input.shape();
    (s[0], s[1], s[2], s[3])
}

// =============================================================================
// Convolution
// =============================================================================

/// 2D convolution. `weight` is `[C_out, C_in, kH, kW]`.
pub fn conv2d(
    input: &Tensor,
    weight: &Tensor,
    bias: Option<&Tensor>,
    stride: (usize, usize),
    padding: (usize, usize),
) -> Result<Tensor> {
    let w_shape = weight.shape();
    let (out_channels, in_channels, kh, kw) = (w_shape[0], w_shape[1], w_shape[2], w_shape[3]);
    expect_image("conv2d", input.shape(), in_channels)?;
    let (out_h, out_w) = window_shape("conv2d", input.shape(), (kh, kw), stride, padding)?;

    let (batch, _, in_h, in_w) = dims4(input);
    let (sh, sw) = stride;
    let (ph, pw) = padding;
    let input_vec = input.as_slice();
    let weight_vec = weight.as_slice();
    let plane = out_h * out_w;
    let mut output = vec![0.0f32; batch * out_channels * plane];

    for b in 0..batch {
        for oc in 0..out_channels {
            let out_base = (b * out_channels + oc) * plane;
            if let Some(bias) = bias {
                output[out_base..out_base + plane].fill(bias.as_slice()[oc]);
            }
            for ic in 0..in_channels {
                let in_base = (b * in_channels + ic) * in_h * in_w;
                for ki in 0..kh {
                    for kj in 0..kw {
                        let wv = weight_vec[((oc * in_channels + ic) * kh + ki) * kw + kj];
                        for oy in 0..out_h {
                            let iy = oy * sh + ki;
                            if iy < ph || iy - ph >= in_h {
                                continue;
                            }
                            let row = in_base + (iy - ph) * in_w;
                            for ox in 0..out_w {
                                let ix = ox * sw + kj;
                                if ix < pw || ix - pw >= in_w {
                                    continue;
                                }
                                output[out_base + oy * out_w + ox] += wv * input_vec[row + ix - pw];
                            }
                        }
                    }
                }
            }
        }
    }

    Tensor::from_vec(output, &[batch, out_channels, out_h, out_w])
}

// =============================================================================
// Pooling
// =============================================================================

fn pool2d<F>(
    layer: &str,
    input: &Tensor,
    kernel: (usize, usize),
    stride: (usize, usize),
    padding: (usize, usize),
    reduce: F,
) -> Result<Tensor>
where
    F: Fn(&mut dyn Iterator<Item = f32>) -> f32,
{
    let (out_h, out_w) = window_shape(layer, input.shape(), kernel, stride, padding)?;
    let (batch, channels, in_h, in_w) = dims4(input);
    let input_vec = input.as_slice();
    let mut output = Vec::with_capacity(batch * channels * out_h * out_w);

    for bc in 0..batch * channels {
        let base = bc * in_h * in_w;
        for oy in 0..out_h {
            for ox in 0..out_w {
                let mut window = (0..kernel.0)
                    .flat_map(|ki| (0..kernel.1).map(move |kj| (ki, kj)))
                    .filter_map(|(ki, kj)| {
                        let iy = (oy * stride.0 + ki).checked_sub(padding.0)?;
                        let ix = (ox * stride.1 + kj).checked_sub(padding.1)?;
                        (iy < in_h && ix < in_w).then(|| input_vec[base + iy * in_w + ix])
                    });
                output.push(reduce(&mut window));
            }
        }
    }

    Tensor::from_vec(output, &[batch, channels, out_h, out_w])
}

/// 2D max pooling. Padded positions never win.
pub fn max_pool2d(
    input: &Tensor,
    kernel: (usize, usize),
    stride: (usize, usize),
    padding: (usize, usize),
) -> Result<Tensor> {
    pool2d("max_pool2d", input, kernel, stride, padding, |window| {
        window.fold(f32::NEG_INFINITY, f32::max)
    })
}

/// 2D average pooling over the in-bounds part of each window.
pub fn avg_pool2d(
    input: &Tensor,
    kernel: (usize, usize),
    stride: (usize, usize),
    padding: (usize, usize),
) -> Result<Tensor> {
    pool2d("avg_pool2d", input, kernel, stride, padding, |window| {
        let (sum, count) = window.fold((0.0f32, 0usize), |(s, c), x| (s + x, c + 1));
        if count > 0 {
            sum / count as f32
        } else {
            0.0
        }
    })
}

/// Adaptive average pooling to a fixed spatial size.
pub fn adaptive_avg_pool2d(input: &Tensor, output_size: (usize, usize)) -> Result<Tensor> {
    expect_rank("adaptive_avg_pool2d", input.shape(), 4)?;
    let (batch, channels, in_h, in_w) = dims4(input);
    let (out_h, out_w) = output_size;
    let input_vec = input.as_slice();
    let mut output = Vec::with_capacity(batch * channels * out_h * out_w);

    for bc in 0..batch * channels {
        let base = bc * in_h * in_w;
        for oy in 0..out_h {
            let y0 = (oy * in_h) / out_h;
            let y1 = ((oy + 1) * in_h).div_ceil(out_h);
            for ox in 0..out_w {
                let x0 = (ox * in_w) / out_w;
                let x1 = ((ox + 1) * in_w).div_ceil(out_w);
                let mut sum = 0.0f32;
                for iy in y0..y1 {
                    for ix in x0..x1 {
                        sum += input_vec[base + iy * in_w + ix];
                    }
                }
                let count = (y1 - y0) * (x1 - x0);
                output.push(if count > 0 { sum / count as f32 } else { 0.0 });
            }
        }
    }

    Tensor::from_vec(output, &[batch, channels, out_h, out_w])
}

// =============================================================================
// Dense
// =============================================================================

/// Fully connected layer, y = xW^T + b, for `[N, in_features]` input.
pub fn linear(input: &Tensor, weight: &Tensor, bias: Option<&Tensor>) -> Result<Tensor> {
    let (out_features, in_features) = (weight.shape()[0], weight.shape()[1]);
    expect_rank("linear", input.shape(), 2)?;
    if input.shape()[1] != in_features {
        return Err(Error::invalid_shape(
            "linear",
            input.shape(),
            format!("expected {in_features} input features"),
        ));
    }

    let batch = input.shape()[0];
    let x = input.as_slice();
    let w = weight.as_slice();
    let mut output = vec![0.0f32; batch * out_features];

    for b in 0..batch {
        let row = &x[b * in_features..(b + 1) * in_features];
        for o in 0..out_features {
            let weights = &w[o * in_features..(o + 1) * in_features];
            let dot: f32 = row.iter().zip(weights).map(|(a, b)| a * b).sum();
            let bias_v = bias.map_or(0.0, |t| t.as_slice()[o]);
            output[b * out_features + o] = dot + bias_v;
        }
    }

    Tensor::from_vec(output, &[batch, out_features])
}

/// Collapses all non-batch dimensions.
pub fn flatten(input: &Tensor) -> Result<Tensor> {
    let shape: Shape = flattened_shape(input.shape());
    input.reshape(&shape)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_4x4() -> Tensor {
        Tensor::from_vec((1..=16).map(|v| v as f32).collect(), &[1, 1, 4, 4]).unwrap()
    }

    #[test]
    fn test_conv2d_identity_kernel() {
        let weight = Tensor::from_vec(vec![1.0], &[1, 1, 1, 1]).unwrap();
        let out = conv2d(&grid_4x4(), &weight, None, (1, 1), (0, 0)).unwrap();
        assert_eq!(out.to_vec(), grid_4x4().to_vec());
    }

    #[test]
    fn test_conv2d_padding_and_bias() {
        let input = Tensor::ones(&[1, 1, 3, 3]);
        let weight = Tensor::ones(&[1, 1, 3, 3]);
        let bias = Tensor::from_vec(vec![0.5], &[1]).unwrap();
        let out = conv2d(&input, &weight, Some(&bias), (1, 1), (1, 1)).unwrap();
        assert_eq!(out.shape(), &[1, 1, 3, 3]);
        // Corner sees 4 ones, edge 6, centre 9
        assert_eq!(out.to_vec()[0], 4.5);
        assert_eq!(out.to_vec()[1], 6.5);
        assert_eq!(out.to_vec()[4], 9.5);
    }

    #[test]
    fn test_conv2d_channel_mismatch() {
        let weight = Tensor::zeros(&[4, 3, 3, 3]);
        let err = conv2d(&Tensor::zeros(&[1, 1, 8, 8]), &weight, None, (1, 1), (1, 1));
        assert!(err.is_err());
    }

    #[test]
    fn test_max_pool2d() {
        let out = max_pool2d(&grid_4x4(), (2, 2), (2, 2), (0, 0)).unwrap();
        assert_eq!(out.to_vec(), vec![6.0, 8.0, 14.0, 16.0]);
    }

    #[test]
    fn test_avg_pool2d() {
        let out = avg_pool2d(&grid_4x4(), (2, 2), (2, 2), (0, 0)).unwrap();
        assert_eq!(out.to_vec(), vec![3.5, 5.5, 11.5, 13.5]);
    }

    #[test]
    fn test_max_pool2d_padding() {
        let out = max_pool2d(&grid_4x4(), (3, 3), (2, 2), (1, 1)).unwrap();
        assert_eq!(out.shape(), &[1, 1, 2, 2]);
        assert_eq!(out.to_vec(), vec![6.0, 8.0, 14.0, 16.0]);
    }

    #[test]
    fn test_adaptive_avg_pool2d_global() {
        let out = adaptive_avg_pool2d(&grid_4x4(), (1, 1)).unwrap();
        assert_eq!(out.to_vec(), vec![8.5]);
    }

    #[test]
    fn test_linear() {
        let input = Tensor::from_vec(vec![1.0, 2.0], &[1, 2]).unwrap();
        let weight = Tensor::from_vec(vec![1.0, 1.0, 2.0, -1.0], &[2, 2]).unwrap();
        let bias = Tensor::from_vec(vec![0.0, 1.0], &[2]).unwrap();
        let out = linear(&input, &weight, Some(&bias)).unwrap();
        assert_eq!(out.to_vec(), vec![3.0, 1.0]);
    }

    #[test]
    fn test_window_shape_rejects_small_input() {
        let err = window_shape("pool", &[1, 8, 1, 1], (2, 2), (2, 2), (0, 0)).unwrap_err();
        assert!(err.is_shape_error());
    }

    #[test]
    fn test_flatten() {
        let out = flatten(&Tensor::zeros(&[2, 3, 4, 4])).unwrap();
        assert_eq!(out.shape(), &[2, 48]);
    }
}
