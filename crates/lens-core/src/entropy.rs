/// Shannon entropy, in nats, of the distribution described by `counts`.
///
/// Counts are normalised by their sum; zero counts contribute nothing.
/// Returns 0.0 for an empty or all-zero distribution.
pub fn shannon_entropy<I>(counts: I) -> f64
where
    I: IntoIterator<Item = u64>,
    I::IntoIter: Clone,
{
    let counts = counts.into_iter();
    let total: u64 = counts.clone().sum();
    if total == 0 {
        return 0.0;
    }

    let total = total as f64;
    counts
        .filter(|&c| c > 0)
        .map(|c| {
            let p = c as f64 / total;
            -p * p.ln()
        })
        .sum()
}
