//! Iterative two-class foreground/background segmentation seeded by a
//! polygon mask.
//!
//! Every pixel carries one of four [`Label`]s. Pixels outside the seed
//! start as definite background and never change; pixels inside start as
//! probable foreground and are re-decided on every iteration:
//!
//! 1. Fit a colour mixture model (up to [`COMPONENTS`] diagonal Gaussians)
//!    to the current foreground set and another to the background set.
//! 2. Sweep every probable pixel once and give it the label with lower
//!    energy: negative log-likelihood under that class's model, plus a
//!    contrast-sensitive Potts penalty for each 4-neighbour currently
//!    holding the other class.
//!
//! Ties keep the current label. Iteration stops early once a sweep
//! changes nothing or either class is empty.
//!
//! Only [`Labeling::foreground_mask`] leaves this module; the four-state
//! labels stay on this side of the compositor.

use crate::mask::Mask;
use crate::types::{PipelineError, RgbImage};

/// Mixture components per class.
pub const COMPONENTS: usize = 5;

/// Potts smoothness weight.
const GAMMA: f64 = 50.0;

/// Lower bound on per-channel variance, in squared 8-bit units.
const VARIANCE_FLOOR: f64 = 1.0;

/// Hard-assignment refinement rounds when fitting a mixture.
const FIT_ROUNDS: usize = 3;

/// Per-pixel segmentation state, with the conventional numeric codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Label {
    /// Definitely background; never revised.
    Background = 0,
    /// Definitely foreground; never revised.
    Foreground = 1,
    /// Background hypothesis, open to revision.
    ProbableBackground = 2,
    /// Foreground hypothesis, open to revision.
    ProbableForeground = 3,
}

impl Label {
    /// Definite-or-probable foreground.
    #[must_use]
    pub const fn is_foreground(self) -> bool {
        matches!(self, Self::Foreground | Self::ProbableForeground)
    }

    /// Whether iterations may revise this label.
    #[must_use]
    pub const fn is_probable(self) -> bool {
        matches!(self, Self::ProbableBackground | Self::ProbableForeground)
    }
}

/// A label per pixel, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Labeling {
    width: u32,
    height: u32,
    labels: Vec<Label>,
}

impl Labeling {
    /// Seed labels from a region mask: inside is probable foreground,
    /// outside is definite background.
    #[must_use]
    pub fn from_seed(seed: &Mask) -> Self {
        let dims = seed.dimensions();
        let labels = seed
            .as_raw()
            .iter()
            .map(|&v| {
                if v == crate::mask::INSIDE {
                    Label::ProbableForeground
                } else {
                    Label::Background
                }
            })
            .collect();
        Self {
            width: dims.width,
            height: dims.height,
            labels,
        }
    }

    /// Label at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is out of bounds.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Label {
        self.labels[y as usize * self.width as usize + x as usize]
    }

    /// Number of pixels holding `label`.
    #[must_use]
    pub fn count(&self, label: Label) -> usize {
        self.labels.iter().filter(|&&l| l == label).count()
    }

    /// Collapse to a binary mask: inside where the label is definite or
    /// probable foreground.
    #[must_use]
    pub fn foreground_mask(&self) -> Mask {
        Mask::from_fn(self.width, self.height, |x, y| {
            self.get(x, y).is_foreground()
        })
    }
}

/// One diagonal-covariance Gaussian of a mixture.
#[derive(Debug, Clone, Copy)]
struct Component {
    log_weight: f64,
    mean: [f64; 3],
    inv_var: [f64; 3],
    /// `-0.5 * ln((2 pi)^3 * prod(var))`
    log_norm: f64,
}

impl Component {
    /// Fit to the pixels of `image` listed in `members`, weighted against
    /// a class of `total` pixels.
    fn fit(image: &RgbImage, members: &[usize], total: usize) -> Option<Self> {
        if members.is_empty() {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let n = members.len() as f64;
        let mut mean = [0.0; 3];
        for &idx in members {
            let s = colour_at(image, idx);
            for c in 0..3 {
                mean[c] += s[c];
            }
        }
        mean = mean.map(|m| m / n);

        let mut var = [0.0; 3];
        for &idx in members {
            let s = colour_at(image, idx);
            for c in 0..3 {
                let d = s[c] - mean[c];
                var[c] = d.mul_add(d, var[c]);
            }
        }
        let var = var.map(|v| (v / n).max(VARIANCE_FLOOR));

        let log_det: f64 = var.iter().map(|v| v.ln()).sum();
        #[allow(clippy::cast_precision_loss)]
        let log_weight = (n / total as f64).ln();
        Some(Self {
            log_weight,
            mean,
            inv_var: var.map(f64::recip),
            log_norm: -0.5 * (3.0 * std::f64::consts::TAU.ln() + log_det),
        })
    }

    /// `ln(weight * N(colour))`
    fn log_density(&self, colour: [f64; 3]) -> f64 {
        let mut mahalanobis = 0.0;
        for c in 0..3 {
            let d = colour[c] - self.mean[c];
            mahalanobis = (d * d).mul_add(self.inv_var[c], mahalanobis);
        }
        self.log_weight + self.log_norm - 0.5 * mahalanobis
    }
}

/// Gaussian mixture colour model for one class.
#[derive(Debug, Clone)]
struct ColorModel {
    components: Vec<Component>,
}

impl ColorModel {
    /// Fit a mixture to the pixels listed in `members` by hard assignment.
    /// Components are initialized by splitting the members into brightness
    /// quantiles, then refined by reassigning each to its most likely
    /// component.
    fn fit(image: &RgbImage, members: &[usize]) -> Option<Self> {
        if members.is_empty() {
            return None;
        }
        let k = COMPONENTS.min(members.len());

        let brightness = |idx: usize| colour_at(image, idx).iter().sum::<f64>();
        let mut order: Vec<usize> = (0..members.len()).collect();
        order.sort_by(|&a, &b| brightness(members[a]).total_cmp(&brightness(members[b])));
        let mut assignment = vec![0usize; members.len()];
        for (rank, &slot) in order.iter().enumerate() {
            assignment[slot] = rank * k / members.len();
        }

        let mut model = Self::from_assignment(image, members, &assignment, k)?;
        for _ in 0..FIT_ROUNDS {
            for (slot, &idx) in assignment.iter_mut().zip(members) {
                *slot = model.most_likely(colour_at(image, idx));
            }
            model = Self::from_assignment(image, members, &assignment, model.components.len())?;
        }
        Some(model)
    }

    fn from_assignment(
        image: &RgbImage,
        members: &[usize],
        assignment: &[usize],
        k: usize,
    ) -> Option<Self> {
        let mut groups: Vec<Vec<usize>> = vec![Vec::new(); k];
        for (&idx, &a) in members.iter().zip(assignment) {
            groups[a].push(idx);
        }
        let components: Vec<Component> = groups
            .iter()
            .filter_map(|g| Component::fit(image, g, members.len()))
            .collect();
        if components.is_empty() {
            None
        } else {
            Some(Self { components })
        }
    }

    fn most_likely(&self, colour: [f64; 3]) -> usize {
        let mut best = 0;
        let mut best_density = f64::NEG_INFINITY;
        for (i, comp) in self.components.iter().enumerate() {
            let d = comp.log_density(colour);
            if d > best_density {
                best = i;
                best_density = d;
            }
        }
        best
    }

    /// `-ln(sum_k w_k N_k(colour))`, as a running log-sum-exp.
    fn cost(&self, colour: [f64; 3]) -> f64 {
        let (max, sum) = self
            .components
            .iter()
            .map(|c| c.log_density(colour))
            .fold((f64::NEG_INFINITY, 0.0_f64), |(max, sum), l| {
                if l > max {
                    (l, sum.mul_add((max - l).exp(), 1.0))
                } else {
                    (max, sum + (l - max).exp())
                }
            });
        -(max + sum.ln())
    }
}

fn colour_at(image: &RgbImage, idx: usize) -> [f64; 3] {
    let raw = &image.as_raw()[idx * 3..idx * 3 + 3];
    [f64::from(raw[0]), f64::from(raw[1]), f64::from(raw[2])]
}

fn squared_distance(a: [f64; 3], b: [f64; 3]) -> f64 {
    (0..3).map(|c| (a[c] - b[c]) * (a[c] - b[c])).sum()
}

/// `beta = 1 / (2 * mean squared colour difference)` over 4-neighbour
/// pairs; zero for a flat image.
#[allow(clippy::cast_precision_loss)]
fn contrast_beta(image: &RgbImage) -> f64 {
    let (w, h) = (image.width() as usize, image.height() as usize);
    let mut total = 0.0;
    let mut pairs = 0usize;
    for y in 0..h {
        for x in 0..w {
            let here = colour_at(image, y * w + x);
            if x + 1 < w {
                total += squared_distance(here, colour_at(image, y * w + x + 1));
                pairs += 1;
            }
            if y + 1 < h {
                total += squared_distance(here, colour_at(image, (y + 1) * w + x));
                pairs += 1;
            }
        }
    }
    if pairs == 0 || total <= 0.0 {
        0.0
    } else {
        1.0 / (2.0 * total / pairs as f64)
    }
}

/// Run `iterations` rounds of segmentation on `image`, seeded by `seed`.
///
/// # Errors
///
/// Returns [`PipelineError::InternalInvariantViolation`] if the seed mask
/// and the image differ in size.
pub fn segment(image: &RgbImage, seed: &Mask, iterations: u32) -> Result<Labeling, PipelineError> {
    let dims = seed.dimensions();
    if (dims.width, dims.height) != image.dimensions() {
        return Err(PipelineError::InternalInvariantViolation(format!(
            "seed mask is {}x{} but image is {}x{}",
            dims.width,
            dims.height,
            image.width(),
            image.height()
        )));
    }

    let mut labeling = Labeling::from_seed(seed);
    if iterations == 0 {
        return Ok(labeling);
    }

    let (w, h) = (image.width() as usize, image.height() as usize);
    let beta = contrast_beta(image);

    for _ in 0..iterations {
        let (fg_members, bg_members): (Vec<usize>, Vec<usize>) =
            (0..w * h).partition(|&i| labeling.labels[i].is_foreground());

        let (Some(fg_model), Some(bg_model)) = (
            ColorModel::fit(image, &fg_members),
            ColorModel::fit(image, &bg_members),
        ) else {
            break;
        };

        let mut changed = false;
        for idx in 0..w * h {
            let current = labeling.labels[idx];
            if !current.is_probable() {
                continue;
            }
            let (x, y) = (idx % w, idx / w);
            let here = colour_at(image, idx);

            let mut fg_energy = fg_model.cost(here);
            let mut bg_energy = bg_model.cost(here);
            let neighbours = [
                (x > 0).then(|| idx - 1),
                (x + 1 < w).then(|| idx + 1),
                (y > 0).then(|| idx - w),
                (y + 1 < h).then(|| idx + w),
            ];
            for n in neighbours.into_iter().flatten() {
                let penalty = GAMMA * (-beta * squared_distance(here, colour_at(image, n))).exp();
                if labeling.labels[n].is_foreground() {
                    bg_energy += penalty;
                } else {
                    fg_energy += penalty;
                }
            }

            let next = if fg_energy < bg_energy {
                Label::ProbableForeground
            } else if bg_energy < fg_energy {
                Label::ProbableBackground
            } else {
                current
            };
            if next != current {
                labeling.labels[idx] = next;
                changed = true;
            }
        }

        if !changed {
            break;
        }
    }

    Ok(labeling)
}
