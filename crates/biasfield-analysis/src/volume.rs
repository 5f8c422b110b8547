//! Voxel arrays and binary masks.

use ndarray::{Array3, ArrayView3};

/// One 3D intensity array, shape (Z, Y, X).
pub type Volume = Array3<f64>;

/// Binary mask over a [`Volume`].
///
/// Every voxel is either 1.0 (set) or 0.0, so multiplying a volume by the
/// mask keeps the volume under the mask and zeroes everything else.
#[derive(Debug, Clone, PartialEq)]
pub struct Mask(Array3<f64>);

impl Mask {
    /// Binarizes `array`: values `> 0` become 1.0, everything else 0.0.
    #[must_use]
    pub fn new(array: Array3<f64>) -> Self {
        Self(array.mapv_into(|v| if v > 0.0 { 1.0 } else { 0.0 }))
    }

    #[must_use]
    pub fn view(&self) -> ArrayView3<'_, f64> {
        self.0.view()
    }

    #[must_use]
    pub fn dim(&self) -> (usize, usize, usize) {
        self.0.dim()
    }

    /// Number of set voxels.
    #[must_use]
    pub fn count(&self) -> usize {
        self.0.iter().filter(|&&v| v > 0.0).count()
    }

    /// Iterates the set/unset state of every voxel in logical order.
    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        self.0.iter().map(|&v| v > 0.0)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn test_binarizes_values() {
        let mask = Mask::new(array![[[0.0, 3.0], [-1.0, 0.5]]]);
        assert_eq!(mask.view(), array![[[0.0, 1.0], [0.0, 1.0]]].view());
        assert_eq!(mask.count(), 2);
        assert_eq!(mask.iter().collect::<Vec<_>>(), [false, true, false, true]);
    }
}
