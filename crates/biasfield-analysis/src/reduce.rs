//! Reduction of a volume to a pair of scalar statistics.
//!
//! [`reduce`] summarizes one volume twice: over the whole region (the entire
//! array, or the brain when a brain mask restricts it) and over the
//! subregion selected by a tumor [`Mask`]. An empty selection, or one
//! holding a non-finite intensity, yields a missing value rather than an
//! error.
//!
//! Point-valued statistics also keep the coordinates behind the scalar in
//! [`RegionPoints`]; [`reduce_with_points`] returns both.

use std::{fmt, str::FromStr};

use biasfield_stats::{histogram2d::Histogram2d, percentiles};
use ndarray::{Array3, ArrayView3};
use serde::{Deserialize, Serialize};

use crate::volume::Mask;

/// Scalar statistic computed over a set of voxels.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Statistic {
    /// Median over every selected voxel, zero intensities included.
    Median,
    /// Median over selected voxels with positive intensity.
    ///
    /// The whole-region side thresholds on `volume > 0` and ignores the tumor
    /// mask; the subregion side keeps the positive elements of
    /// `volume * mask`.
    #[default]
    MedianNonzero,
    /// Arithmetic mean over every selected voxel.
    Mean,
    /// Intensity at the intensity-weighted centroid, trilinearly interpolated.
    ///
    /// The centroid itself is kept as a `(z, y, x)` point.
    WeightedCentroidIntensity,
    /// Center of mass of the joint histogram of reference intensity (x)
    /// against volume intensity (y), over voxels with positive reference
    /// intensity.
    ///
    /// The whole region excludes the subregion. The scalar is the y
    /// coordinate; the full center is kept as an `(x, y)` point.
    Histogram2dCenter,
}

/// Bins per axis of the joint histogram behind [`Statistic::Histogram2dCenter`].
pub const HISTOGRAM2D_BINS: usize = 100;

impl Statistic {
    pub const ALL: [Self; 5] = [
        Self::Median,
        Self::MedianNonzero,
        Self::Mean,
        Self::WeightedCentroidIntensity,
        Self::Histogram2dCenter,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Median => "median",
            Self::MedianNonzero => "median_nonzero",
            Self::Mean => "mean",
            Self::WeightedCentroidIntensity => "weighted_centroid_intensity",
            Self::Histogram2dCenter => "histogram2d_center",
        }
    }

    /// Axis labels of the point behind the scalar; empty for plain scalars.
    #[must_use]
    pub fn point_axes(self) -> &'static [&'static str] {
        match self {
            Self::Median | Self::MedianNonzero | Self::Mean => &[],
            Self::WeightedCentroidIntensity => &["z", "y", "x"],
            Self::Histogram2dCenter => &["x", "y"],
        }
    }

    /// Whether the statistic pairs the volume with a reference volume.
    #[must_use]
    pub fn needs_reference(self) -> bool {
        matches!(self, Self::Histogram2dCenter)
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("unknown {kind} '{value}'")]
pub struct ParseNameError {
    kind: &'static str,
    value: String,
}

impl FromStr for Statistic {
    type Err = ParseNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|stat| stat.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseNameError {
                kind: "statistic",
                value: s.to_owned(),
            })
    }
}

/// Which voxels make up the whole region.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WholeRegionRule {
    /// The entire array.
    #[default]
    EntireVolume,
    /// Voxels inside the patient's brain segmentation.
    BrainMask,
}

impl WholeRegionRule {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::EntireVolume => "entire_volume",
            Self::BrainMask => "brain_mask",
        }
    }
}

impl fmt::Display for WholeRegionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WholeRegionRule {
    type Err = ParseNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::EntireVolume, Self::BrainMask]
            .into_iter()
            .find(|rule| rule.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseNameError {
                kind: "whole-region rule",
                value: s.to_owned(),
            })
    }
}

/// Statistic of the whole region and of the masked subregion.
///
/// `None` marks a missing value (empty selection or zero centroid mass).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RegionPair {
    pub whole: Option<f64>,
    pub subregion: Option<f64>,
}

impl RegionPair {
    /// `whole - subregion`, missing if either side is missing.
    ///
    /// # Examples
    ///
    /// ```
    /// use biasfield_analysis::reduce::RegionPair;
    ///
    /// let pair = RegionPair { whole: Some(7.5), subregion: Some(5.0) };
    /// assert_eq!(pair.distance(), Some(2.5));
    /// assert_eq!(pair.swapped().distance(), Some(-2.5));
    /// ```
    #[must_use]
    pub fn distance(&self) -> Option<f64> {
        Some(self.whole? - self.subregion?)
    }

    #[must_use]
    pub fn swapped(&self) -> Self {
        Self {
            whole: self.subregion,
            subregion: self.whole,
        }
    }
}

/// Coordinates behind a point-valued statistic, one entry per
/// [`Statistic::point_axes`] label.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RegionPoints {
    pub whole: Option<Vec<f64>>,
    pub subregion: Option<Vec<f64>>,
}

/// Full result of [`reduce_with_points`].
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Reduction {
    pub pair: RegionPair,
    pub points: RegionPoints,
    /// Selected voxels with a non-finite intensity, counted per side.
    pub non_finite: usize,
}

#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
pub enum ReduceError {
    #[display("{what} shape {actual:?} does not match volume shape {expected:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: (usize, usize, usize),
        actual: (usize, usize, usize),
    },
    #[display("{statistic} requires a reference volume")]
    MissingReference { statistic: Statistic },
}

/// Reduces `volume` to a [`RegionPair`] of `statistic`.
///
/// `mask` selects the subregion. `whole_region` restricts the whole region
/// to a brain segmentation; `None` uses the entire array.
/// [`Statistic::Histogram2dCenter`] needs a reference volume and is only
/// available through [`reduce_with_points`].
///
/// # Examples
///
/// ```
/// use biasfield_analysis::{reduce::{reduce, Statistic}, volume::Mask};
/// use ndarray::Array3;
///
/// let volume = Array3::from_shape_vec((1, 1, 5), vec![0.0, 0.0, 5.0, 10.0, 0.0]).unwrap();
/// let mask = Mask::new(Array3::from_shape_vec((1, 1, 5), vec![0.0, 1.0, 1.0, 0.0, 0.0]).unwrap());
///
/// let pair = reduce(volume.view(), &mask, Statistic::MedianNonzero, None).unwrap();
/// assert_eq!(pair.whole, Some(7.5));
/// assert_eq!(pair.subregion, Some(5.0));
/// assert_eq!(pair.distance(), Some(2.5));
/// ```
pub fn reduce(
    volume: ArrayView3<'_, f64>,
    mask: &Mask,
    statistic: Statistic,
    whole_region: Option<&Mask>,
) -> Result<RegionPair, ReduceError> {
    reduce_with_points(volume, None, mask, statistic, whole_region).map(|r| r.pair)
}

/// Like [`reduce`], also returning the points behind point-valued
/// statistics and the number of non-finite voxels met.
///
/// `reference` is the x-axis volume of [`Statistic::Histogram2dCenter`]
/// (the uncorrected image) and is ignored by every other statistic.
pub fn reduce_with_points(
    volume: ArrayView3<'_, f64>,
    reference: Option<ArrayView3<'_, f64>>,
    mask: &Mask,
    statistic: Statistic,
    whole_region: Option<&Mask>,
) -> Result<Reduction, ReduceError> {
    check_shape("mask", volume.dim(), mask.dim())?;
    if let Some(brain) = whole_region {
        check_shape("brain mask", volume.dim(), brain.dim())?;
    }
    let in_whole = |idx: usize, brain: &[bool]| brain.is_empty() || brain[idx];
    let brain = whole_region.map(|b| b.iter().collect::<Vec<_>>()).unwrap_or_default();

    let reduction = match statistic {
        Statistic::Median | Statistic::Mean | Statistic::MedianNonzero => {
            let positive_only = statistic == Statistic::MedianNonzero;
            let mut whole = Selection::default();
            let mut sub = Selection::default();
            for (idx, (&v, in_mask)) in volume.iter().zip(mask.iter()).enumerate() {
                let keep = !positive_only || v > 0.0;
                if keep && in_whole(idx, &brain) {
                    whole.push(v);
                }
                if keep && in_mask {
                    sub.push(v);
                }
            }
            let summarize = |selection: &mut Selection| {
                if selection.non_finite > 0 {
                    None
                } else if statistic == Statistic::Mean {
                    mean(&selection.values)
                } else {
                    percentiles::median_in_place(&mut selection.values)
                }
            };
            Reduction {
                pair: RegionPair {
                    whole: summarize(&mut whole),
                    subregion: summarize(&mut sub),
                },
                points: RegionPoints::default(),
                non_finite: whole.non_finite + sub.non_finite,
            }
        }
        Statistic::WeightedCentroidIntensity => {
            let mut non_finite = 0;
            let mut whole = Array3::<f64>::zeros(volume.dim());
            let mut sub = Array3::<f64>::zeros(volume.dim());
            for (idx, (((&v, in_mask), w), s)) in volume
                .iter()
                .zip(mask.iter())
                .zip(whole.iter_mut())
                .zip(sub.iter_mut())
                .enumerate()
            {
                if in_whole(idx, &brain) {
                    *w = v;
                    non_finite += usize::from(!v.is_finite());
                }
                if in_mask {
                    *s = v;
                    non_finite += usize::from(!v.is_finite());
                }
            }
            let whole_point = weighted_centroid(whole.view());
            let sub_point = weighted_centroid(sub.view());
            Reduction {
                pair: RegionPair {
                    whole: whole_point.and_then(|p| trilinear(whole.view(), p)),
                    subregion: sub_point.and_then(|p| trilinear(sub.view(), p)),
                },
                points: RegionPoints {
                    whole: whole_point.map(Vec::from),
                    subregion: sub_point.map(Vec::from),
                },
                non_finite,
            }
        }
        Statistic::Histogram2dCenter => {
            let reference = reference.ok_or(ReduceError::MissingReference { statistic })?;
            check_shape("reference", volume.dim(), reference.dim())?;
            let mut whole = PairedSelection::default();
            let mut sub = PairedSelection::default();
            for (idx, ((&x, &y), in_mask)) in reference
                .iter()
                .zip(volume.iter())
                .zip(mask.iter())
                .enumerate()
            {
                if x.is_nan() || x <= 0.0 {
                    continue;
                }
                if in_mask {
                    sub.push(x, y);
                } else if in_whole(idx, &brain) {
                    whole.push(x, y);
                }
            }
            let whole_center = whole.center();
            let sub_center = sub.center();
            Reduction {
                pair: RegionPair {
                    whole: whole_center.map(|(_, y)| y),
                    subregion: sub_center.map(|(_, y)| y),
                },
                points: RegionPoints {
                    whole: whole_center.map(|(x, y)| vec![x, y]),
                    subregion: sub_center.map(|(x, y)| vec![x, y]),
                },
                non_finite: whole.non_finite + sub.non_finite,
            }
        }
    };
    Ok(reduction)
}

#[derive(Debug, Default)]
struct Selection {
    values: Vec<f64>,
    non_finite: usize,
}

impl Selection {
    fn push(&mut self, value: f64) {
        if value.is_finite() {
            self.values.push(value);
        } else {
            self.non_finite += 1;
        }
    }
}

#[derive(Debug, Default)]
struct PairedSelection {
    xs: Vec<f64>,
    ys: Vec<f64>,
    non_finite: usize,
}

impl PairedSelection {
    fn push(&mut self, x: f64, y: f64) {
        if x.is_finite() && y.is_finite() {
            self.xs.push(x);
            self.ys.push(y);
        } else {
            self.non_finite += 1;
        }
    }

    fn center(&self) -> Option<(f64, f64)> {
        if self.non_finite > 0 {
            return None;
        }
        Histogram2d::new(&self.xs, &self.ys, HISTOGRAM2D_BINS, HISTOGRAM2D_BINS)?.center_of_mass()
    }
}

fn check_shape(
    what: &'static str,
    expected: (usize, usize, usize),
    actual: (usize, usize, usize),
) -> Result<(), ReduceError> {
    if expected == actual {
        Ok(())
    } else {
        Err(ReduceError::ShapeMismatch {
            what,
            expected,
            actual,
        })
    }
}

#[expect(clippy::cast_precision_loss)]
fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Intensity-weighted centroid `(Σ idx·v) / Σ v` per axis.
///
/// Returns `None` when the total mass is zero or not finite.
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn weighted_centroid(array: ArrayView3<'_, f64>) -> Option<[f64; 3]> {
    let mut mass = 0.0;
    let mut moments = [0.0; 3];
    for ((z, y, x), &v) in array.indexed_iter() {
        mass += v;
        moments[0] += z as f64 * v;
        moments[1] += y as f64 * v;
        moments[2] += x as f64 * v;
    }
    if mass == 0.0 || !mass.is_finite() {
        return None;
    }
    Some(moments.map(|m| m / mass))
}

/// Samples `array` at a fractional coordinate with trilinear interpolation.
///
/// Returns `None` for coordinates outside the grid rather than a zero fill
/// value, so a centroid pushed off the grid by negative intensities reads
/// as missing.
#[expect(
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation
)]
#[must_use]
pub fn trilinear(array: ArrayView3<'_, f64>, point: [f64; 3]) -> Option<f64> {
    let (nz, ny, nx) = array.dim();
    let shape = [nz, ny, nx];
    let mut lower = [0_usize; 3];
    let mut frac = [0.0; 3];
    for axis in 0..3 {
        if shape[axis] == 0 {
            return None;
        }
        let max = (shape[axis] - 1) as f64;
        let p = point[axis];
        if !(0.0..=max).contains(&p) {
            return None;
        }
        let floor = p.floor();
        lower[axis] = floor as usize;
        frac[axis] = p - floor;
    }

    let mut value = 0.0;
    for corner in 0..8_usize {
        let mut idx = [0_usize; 3];
        let mut weight = 1.0;
        for axis in 0..3 {
            if (corner >> axis) & 1 == 1 {
                idx[axis] = (lower[axis] + 1).min(shape[axis] - 1);
                weight *= frac[axis];
            } else {
                idx[axis] = lower[axis];
                weight *= 1.0 - frac[axis];
            }
        }
        if weight > 0.0 {
            value += weight * array[idx];
        }
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use ndarray::{Array3, array};

    use super::*;

    fn line(values: &[f64]) -> Array3<f64> {
        Array3::from_shape_vec((1, 1, values.len()), values.to_vec()).unwrap()
    }

    #[test]
    fn test_median_nonzero_concrete_scenario() {
        let volume = line(&[0.0, 0.0, 5.0, 10.0, 0.0]);
        let mask = Mask::new(line(&[0.0, 1.0, 1.0, 0.0, 0.0]));
        let pair = reduce(volume.view(), &mask, Statistic::MedianNonzero, None).unwrap();
        assert_eq!(pair.whole, Some(7.5));
        assert_eq!(pair.subregion, Some(5.0));
        assert_eq!(pair.distance(), Some(2.5));
    }

    #[test]
    fn test_whole_median_nonzero_ignores_mask() {
        let volume = line(&[0.0, 3.0, 5.0, 10.0, 2.0, 0.0]);
        let masks = [
            [0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            [1.0, 1.0, 1.0, 1.0, 1.0, 1.0],
            [0.0, 1.0, 0.0, 0.0, 1.0, 0.0],
            [1.0, 0.0, 0.0, 1.0, 0.0, 0.0],
        ];
        let expected = reduce(
            volume.view(),
            &Mask::new(line(&masks[0])),
            Statistic::MedianNonzero,
            None,
        )
        .unwrap()
        .whole;
        assert_eq!(expected, Some(4.0));
        for mask in &masks[1..] {
            let pair = reduce(
                volume.view(),
                &Mask::new(line(mask)),
                Statistic::MedianNonzero,
                None,
            )
            .unwrap();
            assert_eq!(pair.whole, expected);
        }
    }

    fn reduce_self_referenced(
        volume: &Array3<f64>,
        mask: &Mask,
        statistic: Statistic,
    ) -> Result<Reduction, ReduceError> {
        reduce_with_points(volume.view(), Some(volume.view()), mask, statistic, None)
    }

    #[test]
    fn test_all_zero_mask_gives_missing_subregion() {
        let volume = line(&[1.0, 2.0, 3.0]);
        let mask = Mask::new(line(&[0.0; 3]));
        for statistic in Statistic::ALL {
            let pair = reduce_self_referenced(&volume, &mask, statistic).unwrap().pair;
            assert_eq!(pair.subregion, None, "{statistic}");
            assert!(pair.whole.is_some(), "{statistic}");
            assert_eq!(pair.distance(), None);
        }
    }

    #[test]
    fn test_all_zero_volume_gives_missing_nonzero_median() {
        let volume = line(&[0.0; 4]);
        let mask = Mask::new(line(&[1.0; 4]));
        let pair = reduce(volume.view(), &mask, Statistic::MedianNonzero, None).unwrap();
        assert_eq!(pair, RegionPair::default());

        let pair = reduce(volume.view(), &mask, Statistic::Median, None).unwrap();
        assert_eq!(pair.whole, Some(0.0));
        assert_eq!(pair.subregion, Some(0.0));
    }

    #[test]
    fn test_median_and_mean_include_zeros_under_mask() {
        let volume = line(&[0.0, 0.0, 6.0, 10.0]);
        let mask = Mask::new(line(&[0.0, 1.0, 1.0, 0.0]));

        let median = reduce(volume.view(), &mask, Statistic::Median, None).unwrap();
        assert_eq!(median.whole, Some(3.0));
        assert_eq!(median.subregion, Some(3.0));

        let mean = reduce(volume.view(), &mask, Statistic::Mean, None).unwrap();
        assert_eq!(mean.whole, Some(4.0));
        assert_eq!(mean.subregion, Some(3.0));
    }

    #[test]
    fn test_brain_mask_restricts_whole_region() {
        let volume = line(&[1.0, 2.0, 30.0, 40.0]);
        let mask = Mask::new(line(&[0.0, 0.0, 0.0, 1.0]));
        let brain = Mask::new(line(&[1.0, 1.0, 0.0, 0.0]));
        let pair = reduce(volume.view(), &mask, Statistic::MedianNonzero, Some(&brain)).unwrap();
        assert_eq!(pair.whole, Some(1.5));
        assert_eq!(pair.subregion, Some(40.0));
    }

    #[test]
    fn test_shape_mismatch() {
        let volume = line(&[1.0, 2.0, 3.0]);
        let mask = Mask::new(line(&[1.0, 0.0]));
        let err = reduce(volume.view(), &mask, Statistic::Median, None).unwrap_err();
        assert!(matches!(
            err,
            ReduceError::ShapeMismatch { what: "mask", .. }
        ));

        let mask = Mask::new(line(&[1.0, 0.0, 0.0]));
        let brain = Mask::new(Array3::zeros((2, 1, 3)));
        let err = reduce(volume.view(), &mask, Statistic::Median, Some(&brain)).unwrap_err();
        assert!(matches!(
            err,
            ReduceError::ShapeMismatch {
                what: "brain mask",
                ..
            }
        ));
    }

    #[test]
    fn test_distance_antisymmetry() {
        let pairs = [
            RegionPair {
                whole: Some(12.5),
                subregion: Some(30.0),
            },
            RegionPair {
                whole: Some(-1.0),
                subregion: Some(0.0),
            },
            RegionPair {
                whole: None,
                subregion: Some(3.0),
            },
        ];
        for pair in pairs {
            assert_eq!(
                pair.swapped().distance(),
                pair.distance().map(|d| -d),
                "{pair:?}"
            );
        }
    }

    #[test]
    fn test_centroid_on_grid_point() {
        // Symmetric mass around the center voxel
        let volume = array![[[0.0, 0.0, 0.0], [2.0, 4.0, 2.0], [0.0, 0.0, 0.0]]];
        assert_eq!(weighted_centroid(volume.view()), Some([0.0, 1.0, 1.0]));
        let mask = Mask::new(Array3::ones((1, 3, 3)));
        let pair = reduce(
            volume.view(),
            &mask,
            Statistic::WeightedCentroidIntensity,
            None,
        )
        .unwrap();
        assert_eq!(pair.whole, Some(4.0));
        assert_eq!(pair.subregion, Some(4.0));
    }

    #[test]
    fn test_centroid_interpolates_between_voxels() {
        let volume = line(&[0.0, 2.0, 6.0, 0.0]);
        // centroid at x = (2 + 12) / 8 = 1.75
        let point = weighted_centroid(volume.view()).unwrap();
        assert!((point[2] - 1.75).abs() < 1e-12);
        let value = trilinear(volume.view(), point).unwrap();
        assert!((value - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_centroid_zero_mass_is_missing() {
        let volume = line(&[1.0, 2.0, 3.0]);
        let mask = Mask::new(line(&[0.0; 3]));
        let pair = reduce(
            volume.view(),
            &mask,
            Statistic::WeightedCentroidIntensity,
            None,
        )
        .unwrap();
        assert!(pair.whole.is_some());
        assert_eq!(pair.subregion, None);
    }

    #[test]
    fn test_centroid_points_are_kept() {
        let volume = line(&[0.0, 2.0, 6.0, 0.0]);
        let mask = Mask::new(line(&[0.0, 0.0, 1.0, 0.0]));
        let reduction = reduce_with_points(
            volume.view(),
            None,
            &mask,
            Statistic::WeightedCentroidIntensity,
            None,
        )
        .unwrap();
        assert_eq!(reduction.points.whole, Some(vec![0.0, 0.0, 1.75]));
        assert_eq!(reduction.points.subregion, Some(vec![0.0, 0.0, 2.0]));
        assert_eq!(reduction.pair.whole, Some(5.0));
        assert_eq!(reduction.pair.subregion, Some(6.0));

        let empty = Mask::new(line(&[0.0; 4]));
        let reduction = reduce_with_points(
            volume.view(),
            None,
            &empty,
            Statistic::WeightedCentroidIntensity,
            None,
        )
        .unwrap();
        assert_eq!(reduction.points.subregion, None);
    }

    #[test]
    fn test_centroid_off_grid_is_missing() {
        // mass 1, x moment 6: the centroid lands past the last voxel
        let volume = line(&[-1.0, 0.0, 0.0, 2.0]);
        let mask = Mask::new(line(&[1.0; 4]));
        let reduction = reduce_with_points(
            volume.view(),
            None,
            &mask,
            Statistic::WeightedCentroidIntensity,
            None,
        )
        .unwrap();
        assert_eq!(reduction.points.whole, Some(vec![0.0, 0.0, 6.0]));
        assert_eq!(reduction.pair.whole, None);
    }

    #[test]
    fn test_non_finite_voxel_gives_missing_side() {
        let volume = line(&[1.0, f64::NAN, 3.0]);
        let mask = Mask::new(line(&[1.0, 0.0, 1.0]));
        for statistic in [Statistic::Median, Statistic::Mean] {
            let reduction =
                reduce_with_points(volume.view(), None, &mask, statistic, None).unwrap();
            assert_eq!(reduction.pair.whole, None, "{statistic}");
            assert_eq!(reduction.pair.subregion, Some(2.0), "{statistic}");
            assert_eq!(reduction.non_finite, 1);
        }

        // NaN is never positive; infinity is
        let pair = reduce(volume.view(), &mask, Statistic::MedianNonzero, None).unwrap();
        assert_eq!(pair.whole, Some(2.0));
        let volume = line(&[1.0, f64::INFINITY, 3.0]);
        let pair = reduce(volume.view(), &mask, Statistic::MedianNonzero, None).unwrap();
        assert_eq!(pair.whole, None);
        assert_eq!(pair.subregion, Some(2.0));

        let volume = line(&[1.0, f64::NAN, 3.0]);
        let reduction = reduce_with_points(
            volume.view(),
            None,
            &mask,
            Statistic::WeightedCentroidIntensity,
            None,
        )
        .unwrap();
        assert_eq!(reduction.pair.whole, None);
        // centroid of [1, 0, 3] at x = 1.5
        assert_eq!(reduction.pair.subregion, Some(1.5));
    }

    #[test]
    fn test_histogram2d_center_per_region() {
        let reference = line(&[0.0, 10.0, 10.0, 20.0, 20.0]);
        let volume = line(&[5.0, 30.0, 30.0, 40.0, 40.0]);
        let mask = Mask::new(line(&[0.0, 0.0, 0.0, 1.0, 1.0]));
        let reduction = reduce_with_points(
            volume.view(),
            Some(reference.view()),
            &mask,
            Statistic::Histogram2dCenter,
            None,
        )
        .unwrap();

        // constant values land in one bin of width 0.01 next to the value;
        // the whole region leaves out both the subregion and x = 0
        let close = |point: Option<Vec<f64>>, expected: [f64; 2]| {
            let point = point.unwrap();
            point.len() == 2 && point.iter().zip(expected).all(|(a, b)| (a - b).abs() < 0.01)
        };
        assert!(close(reduction.points.whole.clone(), [10.0, 30.0]));
        assert!(close(reduction.points.subregion.clone(), [20.0, 40.0]));
        assert_eq!(
            reduction.pair.whole,
            reduction.points.whole.map(|point| point[1])
        );
        let distance = reduction.pair.distance().unwrap();
        assert!((distance + 10.0).abs() < 0.02);
    }

    #[test]
    fn test_histogram2d_center_requires_reference() {
        let volume = line(&[1.0, 2.0]);
        let mask = Mask::new(line(&[1.0, 0.0]));
        let err = reduce(volume.view(), &mask, Statistic::Histogram2dCenter, None).unwrap_err();
        assert!(matches!(err, ReduceError::MissingReference { .. }));

        let reference = line(&[1.0, 2.0, 3.0]);
        let err = reduce_with_points(
            volume.view(),
            Some(reference.view()),
            &mask,
            Statistic::Histogram2dCenter,
            None,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ReduceError::ShapeMismatch {
                what: "reference",
                ..
            }
        ));
    }

    #[test]
    fn test_trilinear_outside_grid() {
        let volume = line(&[1.0, 2.0]);
        assert_eq!(trilinear(volume.view(), [0.0, 0.0, 1.5]), None);
        assert_eq!(trilinear(volume.view(), [0.0, 0.0, -0.1]), None);
        assert_eq!(trilinear(volume.view(), [0.0, 0.0, 1.0]), Some(2.0));
    }

    #[test]
    fn test_reduce_is_deterministic() {
        let volume = line(&[3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0]);
        let mask = Mask::new(line(&[0.0, 1.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0]));
        for statistic in Statistic::ALL {
            let a = reduce_self_referenced(&volume, &mask, statistic).unwrap();
            let b = reduce_self_referenced(&volume, &mask, statistic).unwrap();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_parse_names() {
        assert_eq!(
            "median_nonzero".parse::<Statistic>().unwrap(),
            Statistic::MedianNonzero
        );
        assert_eq!(
            "Weighted_Centroid_Intensity".parse::<Statistic>().unwrap(),
            Statistic::WeightedCentroidIntensity
        );
        assert_eq!(
            "histogram2d_center".parse::<Statistic>().unwrap(),
            Statistic::Histogram2dCenter
        );
        assert!("mode".parse::<Statistic>().is_err());
        assert_eq!(
            "brain_mask".parse::<WholeRegionRule>().unwrap(),
            WholeRegionRule::BrainMask
        );
        assert_eq!(WholeRegionRule::default().to_string(), "entire_volume");
    }
}
