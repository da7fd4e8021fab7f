//! Dense optical flow between two grayscale frames.
//!
//! # Algorithm
//!
//! The default estimator is a coarse-to-fine dense Lucas–Kanade solver:
//!
//! 1. **Pyramid:** both frames are reduced by 2×2 averaging until the
//!    configured level count or the window size is reached.
//! 2. **Structure tensor:** per pixel, the windowed sums of `Ix²`, `IxIy`,
//!    `Iy²` of the first frame, computed with integral images.
//! 3. **Iterate:** warp the second frame by the current flow, box-sum the
//!    gradient-weighted residual, solve the 2×2 system per pixel, update.
//! 4. **Propagate:** upsample the flow (×2) as the next level's start.
//!
//! Pixels whose tensor is near singular (flat or purely one-dimensional
//! texture) keep the displacement they were initialised with.

use image::GrayImage;

/// Per-pixel displacement field.
///
/// `(dx, dy)` at `(x, y)` means the content at `(x, y)` in the first frame
/// is found at `(x + dx, y + dy)` in the second.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowField {
    width: usize,
    height: usize,
    dx: Vec<f32>,
    dy: Vec<f32>,
}

impl FlowField {
    /// A field with no motion.
    pub fn zeros(width: usize, height: usize) -> Self {
        Self::uniform(width, height, 0.0, 0.0)
    }

    /// Every pixel moves by the same vector.
    pub fn uniform(width: usize, height: usize, dx: f32, dy: f32) -> Self {
        Self {
            width,
            height,
            dx: vec![dx; width * height],
            dy: vec![dy; width * height],
        }
    }

    /// Build a field from per-pixel components in row-major order.
    ///
    /// Returns `None` if the component lengths don't match `width * height`.
    pub fn from_components(
        width: usize,
        height: usize,
        dx: Vec<f32>,
        dy: Vec<f32>,
    ) -> Option<Self> {
        let len = width * height;
        if dx.len() != len || dy.len() != len {
            return None;
        }
        Some(Self {
            width,
            height,
            dx,
            dy,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn len(&self) -> usize {
        self.dx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dx.is_empty()
    }

    pub fn dx(&self) -> &[f32] {
        &self.dx
    }

    pub fn dy(&self) -> &[f32] {
        &self.dy
    }

    pub fn get(&self, x: usize, y: usize) -> Option<(f32, f32)> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = y * self.width + x;
        Some((self.dx[i], self.dy[i]))
    }

    /// Per-pixel displacement magnitudes.
    pub fn magnitudes(&self) -> Vec<f32> {
        self.dx
            .iter()
            .zip(&self.dy)
            .map(|(dx, dy)| dx.hypot(*dy))
            .collect()
    }
}

/// Computes a dense flow field between two frames of equal size.
pub trait DenseFlowEstimator: Send + Sync {
    /// Estimate motion from `prev` to `next`.
    fn estimate(&self, prev: &GrayImage, next: &GrayImage) -> FlowField;

    /// Estimator name for logs.
    fn name(&self) -> &str;
}

/// Tuning for [`PyramidalLucasKanade`].
#[derive(Debug, Clone, Copy)]
pub struct LucasKanadeConfig {
    /// Maximum number of pyramid levels, including full resolution.
    pub levels: usize,
    /// Half-width of the square aggregation window (7 ⇒ 15×15).
    pub window_radius: usize,
    /// Refinement passes per level.
    pub iterations: usize,
    /// Minimum eigenvalue of the window-averaged structure tensor, with
    /// intensities scaled to `[0, 1]`.
    pub min_eigenvalue: f64,
}

impl Default for LucasKanadeConfig {
    fn default() -> Self {
        Self {
            levels: 3,
            window_radius: 7,
            iterations: 3,
            min_eigenvalue: 1e-4,
        }
    }
}

/// Coarse-to-fine dense Lucas–Kanade flow.
#[derive(Debug, Clone, Default)]
pub struct PyramidalLucasKanade {
    config: LucasKanadeConfig,
}

impl PyramidalLucasKanade {
    pub fn new(config: LucasKanadeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LucasKanadeConfig {
        &self.config
    }

    fn build_pyramid(&self, base: Plane) -> Vec<Plane> {
        let min_side = 2 * self.config.window_radius + 1;
        let mut pyramid = vec![base];
        while pyramid.len() < self.config.levels.max(1) {
            let Some(top) = pyramid.last() else {
                break;
            };
            if top.width / 2 < min_side || top.height / 2 < min_side {
                break;
            }
            let next = top.downsample();
            pyramid.push(next);
        }
        pyramid
    }

    /// Refine `flow` at one pyramid level.
    fn refine_level(&self, prev: &Plane, next: &Plane, flow: &mut FlowField) {
        let (w, h) = (prev.width, prev.height);
        let r = self.config.window_radius;
        let area = ((2 * r + 1) * (2 * r + 1)) as f64;

        let (ix, iy) = prev.gradients();
        let ixx = Integral::new(w, h, ix.iter().map(|g| (g * g) as f64));
        let ixy = Integral::new(w, h, ix.iter().zip(&iy).map(|(a, b)| (a * b) as f64));
        let iyy = Integral::new(w, h, iy.iter().map(|g| (g * g) as f64));

        let mut residual_x = vec![0.0f64; w * h];
        let mut residual_y = vec![0.0f64; w * h];

        for _ in 0..self.config.iterations.max(1) {
            for y in 0..h {
                for x in 0..w {
                    let i = y * w + x;
                    let warped = next.sample(x as f32 + flow.dx[i], y as f32 + flow.dy[i]);
                    let it = (prev.data[i] - warped) as f64;
                    residual_x[i] = ix[i] as f64 * it;
                    residual_y[i] = iy[i] as f64 * it;
                }
            }
            let bx = Integral::new(w, h, residual_x.iter().copied());
            let by = Integral::new(w, h, residual_y.iter().copied());

            for y in 0..h {
                let y0 = y.saturating_sub(r);
                let y1 = (y + r).min(h - 1);
                for x in 0..w {
                    let x0 = x.saturating_sub(r);
                    let x1 = (x + r).min(w - 1);

                    let a = ixx.sum(x0, y0, x1, y1);
                    let b = ixy.sum(x0, y0, x1, y1);
                    let c = iyy.sum(x0, y0, x1, y1);

                    let half_trace = (a + c) / 2.0;
                    let min_eig = half_trace - (((a - c) / 2.0).powi(2) + b * b).sqrt();
                    if min_eig / area < self.config.min_eigenvalue {
                        continue;
                    }

                    let det = a * c - b * b;
                    let ex = bx.sum(x0, y0, x1, y1);
                    let ey = by.sum(x0, y0, x1, y1);
                    let step_x = (c * ex - b * ey) / det;
                    let step_y = (a * ey - b * ex) / det;

                    let i = y * w + x;
                    flow.dx[i] += step_x as f32;
                    flow.dy[i] += step_y as f32;
                }
            }
        }
    }
}

impl DenseFlowEstimator for PyramidalLucasKanade {
    fn estimate(&self, prev: &GrayImage, next: &GrayImage) -> FlowField {
        let (w, h) = (prev.width() as usize, prev.height() as usize);
        if w == 0 || h == 0 || prev.dimensions() != next.dimensions() {
            return FlowField::zeros(w, h);
        }

        let prev_pyramid = self.build_pyramid(Plane::from_gray(prev));
        let next_pyramid = self.build_pyramid(Plane::from_gray(next));

        let coarsest = prev_pyramid.len() - 1;
        let top = &prev_pyramid[coarsest];
        let mut flow = FlowField::zeros(top.width, top.height);

        for level in (0..=coarsest).rev() {
            let prev_level = &prev_pyramid[level];
            let next_level = &next_pyramid[level];
            if level != coarsest {
                flow = upsample_flow(&flow, prev_level.width, prev_level.height);
            }
            self.refine_level(prev_level, next_level, &mut flow);
        }

        flow
    }

    fn name(&self) -> &str {
        "pyramidal-lucas-kanade"
    }
}

/// Double a coarse flow field onto a `width × height` grid.
fn upsample_flow(coarse: &FlowField, width: usize, height: usize) -> FlowField {
    let mut dx = Vec::with_capacity(width * height);
    let mut dy = Vec::with_capacity(width * height);
    for y in 0..height {
        let cy = (y / 2).min(coarse.height - 1);
        for x in 0..width {
            let cx = (x / 2).min(coarse.width - 1);
            let i = cy * coarse.width + cx;
            dx.push(coarse.dx[i] * 2.0);
            dy.push(coarse.dy[i] * 2.0);
        }
    }
    FlowField {
        width,
        height,
        dx,
        dy,
    }
}

/// Grayscale plane with intensities in `[0, 1]`.
#[derive(Debug, Clone)]
struct Plane {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl Plane {
    fn from_gray(image: &GrayImage) -> Self {
        Self {
            width: image.width() as usize,
            height: image.height() as usize,
            data: image.as_raw().iter().map(|&p| p as f32 / 255.0).collect(),
        }
    }

    fn at(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    /// Half-resolution plane by 2×2 averaging.
    fn downsample(&self) -> Self {
        let width = (self.width / 2).max(1);
        let height = (self.height / 2).max(1);
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            let (y0, y1) = (2 * y, (2 * y + 1).min(self.height - 1));
            for x in 0..width {
                let (x0, x1) = (2 * x, (2 * x + 1).min(self.width - 1));
                let sum = self.at(x0, y0) + self.at(x1, y0) + self.at(x0, y1) + self.at(x1, y1);
                data.push(sum / 4.0);
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Central-difference gradients, one-sided at the borders.
    fn gradients(&self) -> (Vec<f32>, Vec<f32>) {
        let (w, h) = (self.width, self.height);
        let mut gx = vec![0.0; w * h];
        let mut gy = vec![0.0; w * h];
        for y in 0..h {
            let (yu, yd) = (y.saturating_sub(1), (y + 1).min(h - 1));
            for x in 0..w {
                let (xl, xr) = (x.saturating_sub(1), (x + 1).min(w - 1));
                let i = y * w + x;
                if xr > xl {
                    gx[i] = (self.at(xr, y) - self.at(xl, y)) / (xr - xl) as f32;
                }
                if yd > yu {
                    gy[i] = (self.at(x, yd) - self.at(x, yu)) / (yd - yu) as f32;
                }
            }
        }
        (gx, gy)
    }

    /// Bilinear sample with coordinates clamped to the plane.
    fn sample(&self, x: f32, y: f32) -> f32 {
        let max_x = (self.width - 1) as f32;
        let max_y = (self.height - 1) as f32;
        let x = if x.is_finite() { x.clamp(0.0, max_x) } else { 0.0 };
        let y = if y.is_finite() { y.clamp(0.0, max_y) } else { 0.0 };

        let x0 = x.floor() as usize;
        let y0 = y.floor() as usize;
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);
        let fx = x - x0 as f32;
        let fy = y - y0 as f32;

        let top = self.at(x0, y0) * (1.0 - fx) + self.at(x1, y0) * fx;
        let bottom = self.at(x0, y1) * (1.0 - fx) + self.at(x1, y1) * fx;
        top * (1.0 - fy) + bottom * fy
    }
}

/// Summed-area table for O(1) window sums.
struct Integral {
    stride: usize,
    table: Vec<f64>,
}

impl Integral {
    fn new(width: usize, height: usize, mut values: impl Iterator<Item = f64>) -> Self {
        let stride = width + 1;
        let mut table = vec![0.0; stride * (height + 1)];
        for y in 0..height {
            let mut row = 0.0;
            for x in 0..width {
                row += values.next().unwrap_or(0.0);
                table[(y + 1) * stride + x + 1] = table[y * stride + x + 1] + row;
            }
        }
        Self { stride, table }
    }

    /// Sum over the inclusive rectangle `[x0, x1] × [y0, y1]`.
    fn sum(&self, x0: usize, y0: usize, x1: usize, y1: usize) -> f64 {
        let s = self.stride;
        self.table[(y1 + 1) * s + x1 + 1] - self.table[y0 * s + x1 + 1]
            - self.table[(y1 + 1) * s + x0]
            + self.table[y0 * s + x0]
    }
}
