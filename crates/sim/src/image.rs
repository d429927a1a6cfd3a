//! Reference image filters.
//!
//! The GPU filter chain in `glow::gpu::filters` runs the same three operators
//! as fragment passes. Both sides share the kernel sizing helpers below so a
//! given `FilterConfig` means the same neighbourhood on host and device.
//!
//! Filters act on the colour channels; alpha is carried through unchanged.
//! Reads outside the image clamp to the nearest edge pixel.

use crate::config::FilterConfig;

/// Upper bound on the blur kernel radius in pixels.
pub const MAX_BLUR_RADIUS: u32 = 32;

/// Tap offsets `(first, last)` of an area-max window `extent` pixels wide.
///
/// Even extents put the extra tap on the negative side, so extent 4 reads
/// offsets -2..=1. An extent of 0 or 1 is a single pixel, i.e. the identity.
#[inline]
pub fn dilate_offsets(extent: u32) -> (i32, i32) {
    let extent = extent.max(1) as i32;
    (-(extent / 2), (extent - 1) / 2)
}

/// Gaussian support radius: three sigma, clamped to [`MAX_BLUR_RADIUS`].
#[inline]
pub fn blur_radius(sigma: f32) -> u32 {
    if sigma <= 0.0 {
        0
    } else {
        ((3.0 * sigma).ceil() as u32).min(MAX_BLUR_RADIUS)
    }
}

/// Normalised 1D Gaussian weights for offsets `0..=radius`.
pub fn blur_weights(sigma: f32) -> Vec<f32> {
    let radius = blur_radius(sigma);
    if radius == 0 {
        return vec![1.0];
    }
    let denom = 2.0 * sigma * sigma;
    let mut weights: Vec<f32> = (0..=radius).map(|i| (-((i * i) as f32) / denom).exp()).collect();
    let total = weights[0] + 2.0 * weights[1..].iter().sum::<f32>();
    for w in &mut weights {
        *w /= total;
    }
    weights
}

/// RGBA float image, row-major, top row first.
#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<[f32; 4]>,
}

impl Image {
    pub fn new(width: u32, height: u32, fill: [f32; 4]) -> Self {
        Self {
            width,
            height,
            pixels: vec![fill; (width * height) as usize],
        }
    }

    /// Build from tightly packed 8-bit RGBA.
    pub fn from_rgba8(width: u32, height: u32, bytes: &[u8]) -> Self {
        assert_eq!(bytes.len(), (width * height * 4) as usize);
        let pixels = bytes
            .chunks_exact(4)
            .map(|px| std::array::from_fn(|c| px[c] as f32 / 255.0))
            .collect();
        Self { width, height, pixels }
    }

    pub fn to_rgba8(&self) -> Vec<u8> {
        self.pixels
            .iter()
            .flat_map(|px| px.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8))
            .collect()
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> [f32; 4] {
        self.pixels[(y * self.width + x) as usize]
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, value: [f32; 4]) {
        let idx = (y * self.width + x) as usize;
        self.pixels[idx] = value;
    }

    /// Sample with clamp-to-edge addressing.
    #[inline]
    pub fn get_clamped(&self, x: i64, y: i64) -> [f32; 4] {
        let x = x.clamp(0, self.width as i64 - 1) as u32;
        let y = y.clamp(0, self.height as i64 - 1) as u32;
        self.get(x, y)
    }

    fn map_pixels(&self, f: impl Fn(u32, u32) -> [f32; 4]) -> Image {
        let mut out = Image::new(self.width, self.height, [0.0; 4]);
        for y in 0..self.height {
            for x in 0..self.width {
                out.set(x, y, f(x, y));
            }
        }
        out
    }
}

/// A stateless image operator: `apply(input) -> output` of the same size.
pub trait ImageOperator: Send + Sync {
    fn name(&self) -> &'static str;

    /// True when `apply` would return its input unchanged.
    fn is_identity(&self) -> bool;

    fn apply(&self, input: &Image) -> Image;
}

/// 4-neighbour Laplacian plus a constant bias, clamped to [0, 1].
#[derive(Clone, Copy, Debug)]
pub struct Laplacian {
    pub enabled: bool,
    pub bias: f32,
}

impl ImageOperator for Laplacian {
    fn name(&self) -> &'static str {
        "edge_detect"
    }

    fn is_identity(&self) -> bool {
        !self.enabled
    }

    fn apply(&self, input: &Image) -> Image {
        if self.is_identity() {
            return input.clone();
        }
        input.map_pixels(|x, y| {
            let (x, y) = (x as i64, y as i64);
            let c = input.get_clamped(x, y);
            let n = [
                input.get_clamped(x, y - 1),
                input.get_clamped(x, y + 1),
                input.get_clamped(x - 1, y),
                input.get_clamped(x + 1, y),
            ];
            let mut out = c;
            for ch in 0..3 {
                let sum = n[0][ch] + n[1][ch] + n[2][ch] + n[3][ch] - 4.0 * c[ch];
                out[ch] = (sum + self.bias).clamp(0.0, 1.0);
            }
            out
        })
    }
}

/// Maximum over a square window of side `extent`.
#[derive(Clone, Copy, Debug)]
pub struct AreaMax {
    pub extent: u32,
}

impl AreaMax {
    fn pass(input: &Image, (first, last): (i32, i32), dx: i64, dy: i64) -> Image {
        input.map_pixels(|x, y| {
            let mut out = input.get(x, y);
            for i in first as i64..=last as i64 {
                let s = input.get_clamped(x as i64 + i * dx, y as i64 + i * dy);
                for ch in 0..3 {
                    out[ch] = out[ch].max(s[ch]);
                }
            }
            out
        })
    }
}

impl ImageOperator for AreaMax {
    fn name(&self) -> &'static str {
        "dilate"
    }

    fn is_identity(&self) -> bool {
        self.extent <= 1
    }

    fn apply(&self, input: &Image) -> Image {
        if self.is_identity() {
            return input.clone();
        }
        let taps = dilate_offsets(self.extent);
        let horizontal = Self::pass(input, taps, 1, 0);
        Self::pass(&horizontal, taps, 0, 1)
    }
}

/// Separable Gaussian blur.
#[derive(Clone, Copy, Debug)]
pub struct GaussianBlur {
    pub sigma: f32,
}

impl GaussianBlur {
    fn pass(input: &Image, weights: &[f32], dx: i64, dy: i64) -> Image {
        let r = weights.len() as i64 - 1;
        input.map_pixels(|x, y| {
            let mut out = [0.0, 0.0, 0.0, input.get(x, y)[3]];
            for i in -r..=r {
                let s = input.get_clamped(x as i64 + i * dx, y as i64 + i * dy);
                let w = weights[i.unsigned_abs() as usize];
                for ch in 0..3 {
                    out[ch] += s[ch] * w;
                }
            }
            out
        })
    }
}

impl ImageOperator for GaussianBlur {
    fn name(&self) -> &'static str {
        "blur"
    }

    fn is_identity(&self) -> bool {
        blur_radius(self.sigma) == 0
    }

    fn apply(&self, input: &Image) -> Image {
        if self.is_identity() {
            return input.clone();
        }
        let weights = blur_weights(self.sigma);
        let horizontal = Self::pass(input, &weights, 1, 0);
        Self::pass(&horizontal, &weights, 0, 1)
    }
}

/// Edge detect, dilate, blur - always in that order.
pub struct FilterChain {
    stages: Vec<Box<dyn ImageOperator>>,
}

impl FilterChain {
    pub fn from_config(config: &FilterConfig) -> Self {
        Self {
            stages: vec![
                Box::new(Laplacian {
                    enabled: config.edge_detect,
                    bias: config.edge_bias,
                }),
                Box::new(AreaMax {
                    extent: config.dilate_size,
                }),
                Box::new(GaussianBlur {
                    sigma: config.blur_sigma,
                }),
            ],
        }
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn is_identity(&self) -> bool {
        self.stages.iter().all(|s| s.is_identity())
    }

    pub fn apply(&self, input: &Image) -> Image {
        let mut current = input.clone();
        for stage in self.stages.iter().filter(|s| !s.is_identity()) {
            current = stage.apply(&current);
        }
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLACK: [f32; 4] = [0.0, 0.0, 0.0, 1.0];
    const WHITE: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

    fn dot_image(size: u32, at: (u32, u32)) -> Image {
        let mut img = Image::new(size, size, BLACK);
        img.set(at.0, at.1, WHITE);
        img
    }

    #[test]
    fn test_chain_order_is_fixed() {
        let chain = FilterChain::from_config(&FilterConfig::default());
        assert_eq!(chain.stage_names(), vec!["edge_detect", "dilate", "blur"]);
    }

    #[test]
    fn test_kernel_sizing() {
        assert_eq!(dilate_offsets(0), (0, 0));
        assert_eq!(dilate_offsets(1), (0, 0));
        assert_eq!(dilate_offsets(2), (-1, 0));
        assert_eq!(dilate_offsets(4), (-2, 1));
        assert_eq!(dilate_offsets(5), (-2, 2));
        assert_eq!(dilate_offsets(10), (-5, 4));
        assert_eq!(blur_radius(0.0), 0);
        assert_eq!(blur_radius(2.5), 8);
        assert_eq!(blur_radius(100.0), MAX_BLUR_RADIUS);
    }

    #[test]
    fn test_blur_weights_sum_to_one() {
        for sigma in [0.5, 1.0, 2.5, 7.0] {
            let w = blur_weights(sigma);
            let total = w[0] + 2.0 * w[1..].iter().sum::<f32>();
            assert!((total - 1.0).abs() < 1e-5);
            assert!(w.windows(2).all(|pair| pair[0] >= pair[1]));
        }
    }

    #[test]
    fn test_laplacian_flat_region_is_bias() {
        let img = Image::new(8, 8, [0.3, 0.3, 0.3, 1.0]);
        let out = Laplacian { enabled: true, bias: 0.25 }.apply(&img);
        for px in &out.pixels {
            assert!((px[0] - 0.25).abs() < 1e-6);
            assert_eq!(px[3], 1.0);
        }
    }

    #[test]
    fn test_laplacian_highlights_silhouette() {
        let img = dot_image(5, (2, 2));
        let out = Laplacian { enabled: true, bias: 0.0 }.apply(&img);
        // Centre: 0 - 4 clamps to 0; neighbours see +1.
        assert_eq!(out.get(2, 2)[0], 0.0);
        assert_eq!(out.get(1, 2)[0], 1.0);
        assert_eq!(out.get(2, 3)[0], 1.0);
        assert_eq!(out.get(0, 0)[0], 0.0);
    }

    #[test]
    fn test_area_max_widens_to_square() {
        let img = dot_image(9, (4, 4));
        let out = AreaMax { extent: 4 }.apply(&img);
        for y in 0..9 {
            for x in 0..9 {
                let inside = (3..=6).contains(&x) && (3..=6).contains(&y);
                assert_eq!(out.get(x, y)[0], if inside { 1.0 } else { 0.0 }, "({x},{y})");
            }
        }
    }

    #[test]
    fn test_area_max_window_matches_extent() {
        for extent in 1..=11u32 {
            let mut img = Image::new(15, 1, BLACK);
            img.set(7, 0, WHITE);
            let out = AreaMax { extent }.apply(&img);
            let lit = (0..15).filter(|&x| out.get(x, 0)[0] == 1.0).count();
            assert_eq!(lit, extent as usize, "extent {extent}");
        }
    }

    #[test]
    fn test_blur_preserves_energy_away_from_edges() {
        let img = dot_image(33, (16, 16));
        let out = GaussianBlur { sigma: 2.0 }.apply(&img);
        let total: f32 = out.pixels.iter().map(|p| p[0]).sum();
        assert!((total - 1.0).abs() < 1e-4);
        assert!(out.get(16, 16)[0] < 1.0);
        assert!(out.get(16, 16)[0] > out.get(18, 16)[0]);
    }

    #[test]
    fn test_passthrough_chain_is_identity() {
        let chain = FilterChain::from_config(&FilterConfig::passthrough());
        assert!(chain.is_identity());
        let img = dot_image(7, (1, 5));
        assert_eq!(chain.apply(&img), img);
    }

    #[test]
    fn test_rgba8_roundtrip_is_exact() {
        let bytes: Vec<u8> = (0..=255u8).cycle().take(16 * 4 * 4).collect();
        let img = Image::from_rgba8(16, 4, &bytes);
        assert_eq!(img.to_rgba8(), bytes);
    }
}
