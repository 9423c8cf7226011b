//! Reductions over large arrays of values.
//!
//! [`Summation`] sums in blocks and then sums the block sums,
//! which keeps round-off from growing with the array size
//! the way it does with a single running total.
//! [`DataInfo`] gathers basic statistics of an array.

/// The quantity summed by [`Summation::sum`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SumKind {
    /// Σ vᵢ
    Sum,
    /// Σ wᵢ vᵢ
    WeightedSum,
    /// Σ |vᵢ|
    SumAbs,
    /// Σ wᵢ |vᵢ|
    WeightedSumAbs,
    /// Σ vᵢ²
    Sum2,
    /// Σ wᵢ vᵢ²
    WeightedSum2,
}

impl SumKind {
    /// Whether the sum needs weights.
    #[inline]
    pub fn is_weighted(self) -> bool {
        matches!(
            self,
            SumKind::WeightedSum | SumKind::WeightedSumAbs | SumKind::WeightedSum2
        )
    }

    #[inline]
    fn term(self, v: f64) -> f64 {
        match self {
            SumKind::Sum | SumKind::WeightedSum => v,
            SumKind::SumAbs | SumKind::WeightedSumAbs => v.abs(),
            SumKind::Sum2 | SumKind::WeightedSum2 => v * v,
        }
    }
}

/// Blocked summation with a reusable scratch buffer.
///
/// Values are summed in blocks of about √n entries,
/// block sums are stored in the scratch buffer
/// and summed again in superblocks of the same size.
///
/// # Examples
///
/// ```
/// # use meshdef::toolbox::{SumKind, Summation};
/// let values = vec![0.1; 10_000];
/// let mut sum = Summation::new(values.len());
/// let total = sum.sum(SumKind::Sum, &values, None);
/// assert!((total - 1000.).abs() < 1e-10);
/// ```
#[derive(Clone, Debug)]
pub struct Summation {
    block_size: usize,
    scratch: Vec<f64>,
}

impl Summation {
    /// Create a summation sized for arrays of about `ref_size` values.
    pub fn new(ref_size: usize) -> Self {
        let block_size = Self::block_size_for(ref_size);
        Self {
            block_size,
            scratch: Vec::with_capacity(ref_size.div_ceil(block_size)),
        }
    }

    fn block_size_for(n: usize) -> usize {
        ((n as f64).sqrt().ceil() as usize).max(1)
    }

    /// Size of the blocks currently used.
    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Sum `values` according to `kind`.
    ///
    /// Weighted kinds need `weights` of the same length as `values`.
    /// Arrays much larger than the reference size
    /// given at construction grow the blocks to match.
    pub fn sum(&mut self, kind: SumKind, values: &[f64], weights: Option<&[f64]>) -> f64 {
        let weights = if kind.is_weighted() {
            let w = weights.expect("Weighted sums need weights");
            assert_eq!(w.len(), values.len(), "Mismatched weight count");
            Some(w)
        } else {
            None
        };

        if values.len() > self.block_size * self.block_size {
            self.block_size = Self::block_size_for(values.len());
        }
        let bs = self.block_size;

        //
        // block sums
        //

        self.scratch.clear();
        for (b, block) in values.chunks(bs).enumerate() {
            let block_sum: f64 = match weights {
                Some(w) => block
                    .iter()
                    .zip(&w[b * bs..])
                    .map(|(&v, &wi)| wi * kind.term(v))
                    .sum(),
                None => block.iter().map(|&v| kind.term(v)).sum(),
            };
            self.scratch.push(block_sum);
        }

        //
        // superblock sums
        //

        self.scratch
            .chunks(bs)
            .map(|superblock| superblock.iter().sum::<f64>())
            .sum()
    }
}

/// Basic statistics of an array.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DataInfo {
    /// Smallest analysed value.
    pub min: f64,
    /// Largest analysed value.
    pub max: f64,
    /// Arithmetic mean.
    pub mean: f64,
    /// Standard deviation around the mean.
    pub sigma: f64,
    /// Square root of the sum of squares.
    pub euclidean_norm: f64,
}

impl DataInfo {
    /// Analyse `values` holding `stride` components per entity.
    ///
    /// With a stride of 1 the values themselves are analysed,
    /// otherwise the Euclidean norm of each entity.
    /// An empty array gives all zeros.
    ///
    /// # Examples
    ///
    /// ```
    /// # use meshdef::toolbox::DataInfo;
    /// let info = DataInfo::analyse(&[3., 4., 0., 0.], 2);
    /// assert_eq!(info.min, 0.);
    /// assert_eq!(info.max, 5.);
    /// assert_eq!(info.mean, 2.5);
    /// ```
    pub fn analyse(values: &[f64], stride: usize) -> Self {
        assert!(stride > 0, "Stride must be positive");
        assert!(
            values.len() % stride == 0,
            "Array length is not a multiple of the stride"
        );
        let analysed: Vec<f64> = if stride == 1 {
            values.to_vec()
        } else {
            values
                .chunks_exact(stride)
                .map(|e| e.iter().map(|v| v * v).sum::<f64>().sqrt())
                .collect()
        };
        let n = analysed.len();
        if n == 0 {
            return Self::default();
        }

        let (min, max) = analysed
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });

        let mut summation = Summation::new(n);
        let mean = summation.sum(SumKind::Sum, &analysed, None) / n as f64;
        let sum2 = summation.sum(SumKind::Sum2, &analysed, None);
        let deviations: Vec<f64> = analysed.iter().map(|v| v - mean).collect();
        let variance = summation.sum(SumKind::Sum2, &deviations, None) / n as f64;

        Self {
            min,
            max,
            mean,
            sigma: variance.sqrt(),
            euclidean_norm: sum2.sqrt(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn sum_kinds() {
        let v = [1., -2., 3., -4.];
        let w = [0.5, 1., 2., 0.];
        let mut s = Summation::new(v.len());
        assert_eq!(s.block_size(), 2);

        let cases = [
            (SumKind::Sum, -2.),
            (SumKind::WeightedSum, 0.5 - 2. + 6.),
            (SumKind::SumAbs, 10.),
            (SumKind::WeightedSumAbs, 0.5 + 2. + 6.),
            (SumKind::Sum2, 30.),
            (SumKind::WeightedSum2, 0.5 + 4. + 18.),
        ];
        for (kind, expected) in cases {
            assert_relative_eq!(s.sum(kind, &v, Some(&w)), expected);
        }
        // unweighted kinds ignore weights
        assert_eq!(s.sum(SumKind::Sum, &v, None), -2.);
    }

    #[test]
    fn blocked_sum_is_accurate() {
        let n = 1_000_003;
        let values = vec![0.1; n];
        let mut s = Summation::new(1000);
        let blocked = s.sum(SumKind::Sum, &values, None);
        // the blocks grew to fit the array
        assert!(s.block_size() * s.block_size() >= n);

        assert!((blocked - 0.1 * n as f64).abs() < 1e-8);
    }

    #[test]
    fn empty_and_uneven_arrays() {
        let mut s = Summation::new(10);
        assert_eq!(s.sum(SumKind::Sum2, &[], None), 0.);
        let values: Vec<f64> = (1..=11).map(f64::from).collect();
        assert_eq!(s.sum(SumKind::Sum, &values, None), 66.);
    }

    #[test]
    #[should_panic(expected = "Weighted sums need weights")]
    fn weighted_sum_without_weights() {
        Summation::new(4).sum(SumKind::WeightedSum, &[1., 2.], None);
    }

    #[test]
    fn scalar_statistics() {
        let info = DataInfo::analyse(&[2., 4., 4., 4., 5., 5., 7., 9.], 1);
        assert_eq!(info.min, 2.);
        assert_eq!(info.max, 9.);
        assert_relative_eq!(info.mean, 5.);
        assert_relative_eq!(info.sigma, 2.);
        assert_relative_eq!(info.euclidean_norm, 232f64.sqrt());
    }

    #[test]
    fn vector_statistics() {
        // entity norms 5, 1 and 3
        let info = DataInfo::analyse(&[3., 4., 0., 0., 0., -1., 0., 3., 0.], 3);
        assert_eq!(info.min, 1.);
        assert_eq!(info.max, 5.);
        assert_relative_eq!(info.mean, 3.);
        assert_relative_eq!(info.sigma, (8f64 / 3.).sqrt());
        assert_relative_eq!(info.euclidean_norm, 35f64.sqrt());

        assert_eq!(DataInfo::analyse(&[], 3), DataInfo::default());
    }
}
