//! Addressing of the entities a bulk evaluation touches.
//!
//! A [`Selection`] says both which entities are read
//! and where their results go in the output buffer:
//! - [`All(n)`][Selection::All]: entities `0..n`, written densely.
//! - [`Scattered(ids)`][Selection::Scattered]: entities `ids`,
//!   each written at its own index in a buffer sized for every entity.
//! - [`Compact(ids)`][Selection::Compact]: entities `ids`,
//!   written densely in the order given (a buffer sized for the subset).
//!
//! The same contract holds for every stride
//! (1 for scalars, 3 for vectors, 9 for tensors).

use rayon::prelude::*;

/// Which entities to evaluate and how to lay out the results.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Selection<'a> {
    /// Every entity in `0..n`, output at the entity index.
    All(usize),
    /// A subset of entities, output at the entity index.
    Scattered(&'a [usize]),
    /// A subset of entities, output at the position in the list.
    Compact(&'a [usize]),
}

impl<'a> Selection<'a> {
    /// Number of entities evaluated.
    #[inline]
    pub fn len(&self) -> usize {
        match self {
            Selection::All(n) => *n,
            Selection::Scattered(ids) | Selection::Compact(ids) => ids.len(),
        }
    }

    /// Whether no entity is evaluated.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The explicit list of entities, if there is one.
    #[inline]
    pub fn ids(&self) -> Option<&'a [usize]> {
        match self {
            Selection::All(_) => None,
            Selection::Scattered(ids) | Selection::Compact(ids) => Some(ids),
        }
    }

    /// Index of the `i`th evaluated entity.
    #[inline]
    pub fn source(&self, i: usize) -> usize {
        match self {
            Selection::All(_) => i,
            Selection::Scattered(ids) | Selection::Compact(ids) => ids[i],
        }
    }

    /// Position in the output (in units of the stride)
    /// where the `i`th evaluated entity is written.
    #[inline]
    pub fn target(&self, i: usize) -> usize {
        match self {
            Selection::All(_) | Selection::Compact(_) => i,
            Selection::Scattered(ids) => ids[i],
        }
    }

    /// Call `f(entity, out_slot)` for each selected entity,
    /// where `out_slot` is the `stride`-length part of `out`
    /// reserved for that entity's result.
    pub fn for_each<F>(&self, stride: usize, out: &mut [f64], mut f: F)
    where
        F: FnMut(usize, &mut [f64]),
    {
        match self {
            Selection::All(n) => {
                for (entity, slot) in out[..n * stride].chunks_exact_mut(stride).enumerate() {
                    f(entity, slot);
                }
            }
            Selection::Compact(ids) => {
                for (&entity, slot) in ids
                    .iter()
                    .zip(out[..ids.len() * stride].chunks_exact_mut(stride))
                {
                    f(entity, slot);
                }
            }
            Selection::Scattered(ids) => {
                for &entity in ids.iter() {
                    f(entity, &mut out[entity * stride..(entity + 1) * stride]);
                }
            }
        }
    }

    /// Parallel version of [`for_each`][Self::for_each],
    /// used when the selection has at least `threshold` entities.
    ///
    /// Scattered selections are always processed sequentially,
    /// since nothing guarantees their indices are distinct.
    pub fn par_for_each<F>(&self, stride: usize, out: &mut [f64], threshold: usize, f: F)
    where
        F: Fn(usize, &mut [f64]) + Send + Sync,
    {
        if self.len() < threshold {
            self.for_each(stride, out, f);
            return;
        }
        match self {
            Selection::All(n) => {
                out[..n * stride]
                    .par_chunks_mut(stride)
                    .enumerate()
                    .for_each(|(entity, slot)| f(entity, slot));
            }
            Selection::Compact(ids) => {
                out[..ids.len() * stride]
                    .par_chunks_mut(stride)
                    .zip(ids.par_iter())
                    .for_each(|(slot, &entity)| f(entity, slot));
            }
            Selection::Scattered(_) => self.for_each(stride, out, f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_index(entity: usize, slot: &mut [f64]) {
        for (k, v) in slot.iter_mut().enumerate() {
            *v = (10 * entity + k) as f64;
        }
    }

    #[test]
    fn addressing_modes() {
        let ids = [2, 5, 7];

        let mut dense = vec![0.; 10 * 3];
        Selection::All(10).for_each(3, &mut dense, write_index);
        assert_eq!(&dense[21..24], &[70., 71., 72.]);

        let mut scattered = vec![-1.; 10 * 3];
        Selection::Scattered(&ids).for_each(3, &mut scattered, write_index);
        let mut compact = vec![-1.; 3 * 3];
        Selection::Compact(&ids).for_each(3, &mut compact, write_index);

        for (i, &id) in ids.iter().enumerate() {
            assert_eq!(&scattered[3 * id..3 * id + 3], &compact[3 * i..3 * i + 3]);
            assert_eq!(&scattered[3 * id..3 * id + 3], &dense[3 * id..3 * id + 3]);
        }
        // untouched entries of a scattered write keep their old values
        assert_eq!(scattered[0], -1.);
        assert_eq!(scattered[3 * 9 + 2], -1.);
    }

    #[test]
    fn parallel_matches_sequential() {
        let ids: Vec<usize> = (0..500).rev().step_by(3).collect();
        for sel in [
            Selection::All(500),
            Selection::Compact(&ids),
            Selection::Scattered(&ids),
        ] {
            let mut seq = vec![0.; 500 * 9];
            let mut par = vec![0.; 500 * 9];
            sel.for_each(9, &mut seq, write_index);
            sel.par_for_each(9, &mut par, 16, write_index);
            assert_eq!(seq, par, "mismatch for {sel:?}");
        }
    }

    #[test]
    fn source_and_target() {
        let ids = [4, 1];
        let s = Selection::Scattered(&ids);
        let c = Selection::Compact(&ids);
        assert_eq!((s.source(1), s.target(1)), (1, 1));
        assert_eq!((s.source(0), s.target(0)), (4, 4));
        assert_eq!((c.source(0), c.target(0)), (4, 0));
        assert_eq!(Selection::All(3).len(), 3);
        assert!(Selection::Compact(&[]).is_empty());
    }
}
