//! Weighted random choice over a fixed set of keys.

use rand::Rng;

use sift_core::Error;

/// Cumulative-sum lookup table for weighted selection.
///
/// Thresholds are strictly increasing and the last one equals the total
/// weight. A draw in `1..=total` maps to the first entry whose threshold is
/// greater than or equal to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightedChoice<K> {
    total_weight: u64,
    cumulative: Vec<(u64, K)>,
}

impl<K: Clone> WeightedChoice<K> {
    pub fn new<I>(weights: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (K, i64)>,
    {
        let mut total_weight = 0u64;
        let mut cumulative = Vec::new();
        for (key, weight) in weights {
            if weight <= 0 {
                return Err(Error::invalid_argument(format!(
                    "weights must be positive integers, got {}",
                    weight
                )));
            }
            total_weight = total_weight
                .checked_add(weight as u64)
                .ok_or_else(|| Error::invalid_argument("total weight overflows"))?;
            cumulative.push((total_weight, key));
        }
        if cumulative.is_empty() {
            return Err(Error::invalid_argument(
                "weighted choice needs at least one entry",
            ));
        }
        Ok(Self {
            total_weight,
            cumulative,
        })
    }

    pub fn total_weight(&self) -> u64 {
        self.total_weight
    }

    pub fn len(&self) -> usize {
        self.cumulative.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cumulative.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.cumulative.iter().map(|(_, key)| key)
    }

    /// Weight of each entry, recovered from the thresholds.
    pub fn weights(&self) -> impl Iterator<Item = (&K, u64)> {
        let mut previous = 0;
        self.cumulative.iter().map(move |(threshold, key)| {
            let weight = threshold - previous;
            previous = *threshold;
            (key, weight)
        })
    }

    /// The key for a draw in `1..=total_weight`. Out-of-range draws clamp.
    pub fn lookup(&self, draw: u64) -> &K {
        let index = self
            .cumulative
            .partition_point(|(threshold, _)| *threshold < draw)
            .min(self.cumulative.len() - 1);
        &self.cumulative[index].1
    }

    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> &K {
        self.lookup(rng.gen_range(1..=self.total_weight))
    }

    /// A table over the entries `keep` accepts, with their original weights.
    pub fn retain(&self, mut keep: impl FnMut(&K) -> bool) -> Result<Self, Error> {
        let remaining: Vec<(K, i64)> = self
            .weights()
            .filter(|(key, _)| keep(key))
            .map(|(key, weight)| (key.clone(), weight as i64))
            .collect();
        Self::new(remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn thresholds_map_draws_to_keys() {
        let choice = WeightedChoice::new([("x", 5), ("y", 3), ("z", 2)]).unwrap();
        assert_eq!(choice.total_weight(), 10);

        assert_eq!(*choice.lookup(1), "x");
        assert_eq!(*choice.lookup(5), "x");
        assert_eq!(*choice.lookup(6), "y");
        assert_eq!(*choice.lookup(8), "y");
        assert_eq!(*choice.lookup(9), "z");
        assert_eq!(*choice.lookup(10), "z");
    }

    #[test]
    fn non_positive_weights_are_rejected() {
        assert!(WeightedChoice::new([("a", 1), ("b", 0)]).is_err());
        assert!(WeightedChoice::new([("a", -4)]).is_err());
        assert!(WeightedChoice::<&str>::new([]).is_err());
    }

    #[test]
    fn draws_follow_weights() {
        let choice = WeightedChoice::new([("a", 3), ("b", 1)]).unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        let mut a = 0u32;
        let mut b = 0u32;
        for _ in 0..10_000 {
            match *choice.choose(&mut rng) {
                "a" => a += 1,
                _ => b += 1,
            }
        }

        let ratio = a as f64 / b as f64;
        assert!((2.7..3.3).contains(&ratio), "ratio was {ratio}");
    }

    #[test]
    fn retain_keeps_original_weights() {
        let choice = WeightedChoice::new([("a", 2), ("b", 5), ("c", 1)]).unwrap();
        let rest = choice.retain(|k| *k != "b").unwrap();

        assert_eq!(rest.total_weight(), 3);
        assert_eq!(rest.weights().collect::<Vec<_>>(), vec![(&"a", 2), (&"c", 1)]);
        assert!(choice.retain(|_| false).is_err());
    }
}
