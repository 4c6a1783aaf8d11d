use crate::error::{CoreError, Result};
use crate::types::{DistributionPlan, DistributionPolicy, SongEntry};
use rand::seq::index;
use rand::Rng;

/// Songs per variant when the caller does not specify a count.
pub const DEFAULT_SONGS_PER_VARIANT: usize = 5;

/// Split the eligible pool into `variants` song sequences of `per_variant`
/// songs each.
///
/// `Sequential` hands out contiguous, non-overlapping slices of the pool in
/// order: variant `i` gets `pool[i*n..(i+1)*n]`. `Random` draws `n` distinct
/// songs per variant independently, so variants may share songs. The random
/// source is injected so runs are reproducible from a seed.
pub fn distribute<R: Rng + ?Sized>(
    pool: &[SongEntry],
    variants: usize,
    per_variant: usize,
    policy: DistributionPolicy,
    rng: &mut R,
) -> Result<DistributionPlan> {
    if variants == 0 {
        return Err(CoreError::InvalidInput(
            "variant count must be at least 1".into(),
        ));
    }
    if per_variant == 0 {
        return Err(CoreError::InvalidInput(
            "songs per variant must be at least 1".into(),
        ));
    }

    let variants = match policy {
        DistributionPolicy::Sequential => {
            let needed = variants.checked_mul(per_variant).ok_or_else(|| {
                CoreError::InvalidInput(format!(
                    "{variants} variants of {per_variant} songs is too many to distribute"
                ))
            })?;
            if pool.len() < needed {
                return Err(CoreError::CatalogExhausted {
                    needed,
                    available: pool.len(),
                });
            }
            pool.chunks_exact(per_variant)
                .take(variants)
                .map(<[SongEntry]>::to_vec)
                .collect()
        }
        DistributionPolicy::Random => {
            if pool.len() < per_variant {
                return Err(CoreError::CatalogExhausted {
                    needed: per_variant,
                    available: pool.len(),
                });
            }
            (0..variants)
                .map(|_| {
                    index::sample(&mut *rng, pool.len(), per_variant)
                        .into_iter()
                        .map(|i| pool[i].clone())
                        .collect()
                })
                .collect()
        }
    };

    Ok(DistributionPlan { policy, variants })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TimeUs;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn pool(n: u32) -> Vec<SongEntry> {
        (1..=n)
            .map(|i| {
                let mut s = SongEntry::new(i, format!("{i}_song"));
                s.duration = TimeUs::from_secs(180);
                s
            })
            .collect()
    }

    fn ids(songs: &[SongEntry]) -> Vec<u32> {
        songs.iter().map(|s| s.id).collect()
    }

    #[test]
    fn sequential_slices_pool_in_order() {
        let pool = pool(15);
        let mut rng = StdRng::seed_from_u64(1);
        let plan = distribute(&pool, 3, 5, DistributionPolicy::Sequential, &mut rng).unwrap();
        assert_eq!(plan.variant_count(), 3);
        assert_eq!(ids(&plan.variants[0]), vec![1, 2, 3, 4, 5]);
        assert_eq!(ids(&plan.variants[1]), vec![6, 7, 8, 9, 10]);
        assert_eq!(ids(&plan.variants[2]), vec![11, 12, 13, 14, 15]);
    }

    #[test]
    fn sequential_ignores_leftover_entries() {
        let pool = pool(17);
        let mut rng = StdRng::seed_from_u64(1);
        let plan = distribute(&pool, 3, 5, DistributionPolicy::Sequential, &mut rng).unwrap();
        let used: Vec<u32> = plan.variants.iter().flat_map(|v| ids(v)).collect();
        assert_eq!(used, (1..=15).collect::<Vec<_>>());
    }

    #[test]
    fn sequential_variants_never_overlap() {
        for (p, v, n) in [(10, 2, 5), (30, 4, 7), (9, 9, 1)] {
            let pool = pool(p);
            let mut rng = StdRng::seed_from_u64(0);
            let plan = distribute(&pool, v, n, DistributionPolicy::Sequential, &mut rng).unwrap();
            let mut seen = HashSet::new();
            for (i, variant) in plan.variants.iter().enumerate() {
                assert_eq!(ids(variant), ids(&pool[i * n..(i + 1) * n]));
                for song in variant {
                    assert!(seen.insert(song.id), "song {} reused", song.id);
                }
            }
        }
    }

    #[test]
    fn sequential_twelve_songs_cannot_fill_three_by_five() {
        let pool = pool(12);
        let mut rng = StdRng::seed_from_u64(1);
        let err = distribute(&pool, 3, 5, DistributionPolicy::Sequential, &mut rng).unwrap_err();
        assert!(matches!(
            err,
            CoreError::CatalogExhausted {
                needed: 15,
                available: 12
            }
        ));
    }

    #[test]
    fn oversized_request_is_rejected_not_wrapped() {
        let pool = pool(12);
        let mut rng = StdRng::seed_from_u64(1);
        let err = distribute(&pool, usize::MAX, 2, DistributionPolicy::Sequential, &mut rng)
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(msg) if msg.contains("too many")));
    }

    #[test]
    fn random_variants_have_no_internal_duplicates() {
        let pool = pool(8);
        let mut rng = StdRng::seed_from_u64(42);
        let plan = distribute(&pool, 20, 5, DistributionPolicy::Random, &mut rng).unwrap();
        assert_eq!(plan.variant_count(), 20);
        for variant in &plan.variants {
            assert_eq!(variant.len(), 5);
            let unique: HashSet<u32> = variant.iter().map(|s| s.id).collect();
            assert_eq!(unique.len(), 5);
        }
    }

    #[test]
    fn random_is_reproducible_from_seed() {
        let pool = pool(30);
        let a = distribute(&pool, 4, 6, DistributionPolicy::Random, &mut StdRng::seed_from_u64(7)).unwrap();
        let b = distribute(&pool, 4, 6, DistributionPolicy::Random, &mut StdRng::seed_from_u64(7)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn random_only_needs_one_variant_worth_of_songs() {
        let pool = pool(5);
        let mut rng = StdRng::seed_from_u64(3);
        assert!(distribute(&pool, 10, 5, DistributionPolicy::Random, &mut rng).is_ok());

        let err = distribute(&pool, 1, 6, DistributionPolicy::Random, &mut rng).unwrap_err();
        assert!(matches!(
            err,
            CoreError::CatalogExhausted {
                needed: 6,
                available: 5
            }
        ));
    }

    #[test]
    fn zero_counts_are_rejected() {
        let pool = pool(5);
        let mut rng = StdRng::seed_from_u64(3);
        assert!(matches!(
            distribute(&pool, 0, 5, DistributionPolicy::Sequential, &mut rng),
            Err(CoreError::InvalidInput(_))
        ));
        assert!(matches!(
            distribute(&pool, 1, 0, DistributionPolicy::Random, &mut rng),
            Err(CoreError::InvalidInput(_))
        ));
    }
}
