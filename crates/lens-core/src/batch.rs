//! Order-preserving parallel map used for batch extraction.

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::Serialize;

use crate::features::FeatureVector;
use crate::types::Bytecode;

/// One batch input: bytecode plus a caller-defined label carried through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample<'a, L> {
    pub label: L,
    pub bytecode: Bytecode<'a>,
}

impl<'a, L> Sample<'a, L> {
    pub fn new(label: L, bytecode: impl Into<Bytecode<'a>>) -> Self {
        Self {
            label,
            bytecode: bytecode.into(),
        }
    }
}

/// One batch output, in the position of the sample it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabeledFeatures<L> {
    pub label: L,
    pub features: FeatureVector,
}

/// Apply `f` to every item and return the results in input order.
///
/// With `workers <= 1` everything runs on the calling thread. Otherwise a
/// dedicated pool of `workers` threads is built for this call; failing to
/// build it is the only error.
pub fn par_map_ordered<T, R, F>(items: Vec<T>, workers: usize, f: F) -> Result<Vec<R>>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Send + Sync,
{
    if workers <= 1 || items.len() <= 1 {
        log::debug!("running {} items sequentially", items.len());
        return Ok(items.into_iter().map(f).collect());
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("lens-worker-{}", i))
        .build()
        .with_context(|| format!("failed to build a pool of {} workers", workers))?;

    log::debug!("running {} items on {} workers", items.len(), workers);
    // Indexed parallel iterators collect in source order.
    Ok(pool.install(|| items.into_par_iter().map(f).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_and_parallel_agree() {
        let items: Vec<u64> = (0..1000).collect();
        let square = |x: u64| x * x;

        let seq = par_map_ordered(items.clone(), 1, square).unwrap();
        let par = par_map_ordered(items.clone(), 4, square).unwrap();

        assert_eq!(seq, par);
        assert_eq!(par[999], 999 * 999);
    }

    #[test]
    fn order_survives_uneven_work() {
        // Early items take longest, so they finish last.
        let items: Vec<u32> = (0..32).collect();
        let out = par_map_ordered(items, 8, |i| {
            let spin = (32 - i) * 2000;
            let mut acc = 0u64;
            for k in 0..spin {
                acc = acc.wrapping_add(u64::from(k));
            }
            (i, acc)
        })
        .unwrap();

        let order: Vec<u32> = out.iter().map(|(i, _)| *i).collect();
        assert_eq!(order, (0..32).collect::<Vec<_>>());
    }

    #[test]
    fn empty_input() {
        let out: Vec<u8> = par_map_ordered(Vec::<u8>::new(), 4, |x| x).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn sample_from_hex_and_bytes() {
        let hex = Sample::new("a", "0x00");
        let raw_bytes = vec![0u8];
        let raw = Sample::new("b", &raw_bytes);
        assert_eq!(hex.bytecode.to_bytes(), raw.bytecode.to_bytes());
        assert_eq!(hex.label, "a");
    }
}
