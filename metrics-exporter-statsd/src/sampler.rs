//! Probabilistic sampling of payloads.
//!
//! Sampled payloads carry a `|@<rate>` annotation so the collector can scale counts and timings back up by
//! `1 / rate`. Payloads sent at full rate are never annotated.

use std::fmt::Write as _;

use rand::Rng;

/// Samples the payload at the given rate using the thread-local random number generator.
///
/// Returns the payload to transmit, annotated with the rate when `rate < 1.0`, or `None` if the payload should be
/// suppressed.
pub fn sample(rate: f64, payload: String) -> Option<String> {
    sample_with(&mut rand::rng(), rate, payload)
}

/// Samples the payload at the given rate using the provided random number generator.
///
/// See [`sample`] for details.
pub fn sample_with<R>(rng: &mut R, rate: f64, mut payload: String) -> Option<String>
where
    R: Rng,
{
    if rate >= 1.0 {
        return Some(payload);
    }

    // A non-positive (or NaN) rate can never be greater than a draw from [0, 1), so it always suppresses.
    if rng.random::<f64>() < rate {
        let _ = write!(payload, "|@{rate:.6}");
        Some(payload)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng as _;
    use rand_xoshiro::Xoshiro256StarStar;

    use super::{sample, sample_with};

    const TRIALS: usize = 100_000;

    fn seeded() -> Xoshiro256StarStar {
        Xoshiro256StarStar::seed_from_u64(0x5eed_5eed)
    }

    fn transmitted_fraction(rate: f64) -> f64 {
        let mut rng = seeded();
        let transmitted = (0..TRIALS)
            .filter_map(|_| sample_with(&mut rng, rate, "m:1.000000|c".to_string()))
            .count();

        transmitted as f64 / TRIALS as f64
    }

    #[test]
    fn full_rate_is_never_annotated_or_suppressed() {
        let mut rng = seeded();
        for rate in [1.0, 1.5, 100.0, f64::INFINITY] {
            for _ in 0..1_000 {
                let payload = sample_with(&mut rng, rate, "m:1.000000|c".to_string());
                assert_eq!(payload.as_deref(), Some("m:1.000000|c"));
            }
        }
    }

    #[test]
    fn non_positive_rate_always_suppresses() {
        let mut rng = seeded();
        for rate in [0.0, -0.0, -0.5, -1.0, f64::NEG_INFINITY, f64::NAN] {
            for _ in 0..10_000 {
                assert_eq!(sample_with(&mut rng, rate, "m:1.000000|c".to_string()), None);
            }
        }
    }

    #[test]
    fn sampled_payloads_are_annotated() {
        let mut rng = seeded();
        let sampled = (0..1_000)
            .find_map(|_| sample_with(&mut rng, 0.5, "page.views:1.000000|c".to_string()))
            .expect("at least one of 1,000 draws should pass at a rate of 0.5");

        assert_eq!(sampled, "page.views:1.000000|c|@0.500000");
    }

    #[test]
    fn transmitted_fraction_converges_to_rate() {
        // With 100,000 trials the standard error is at most ~0.0016, so 0.01 is more than six sigma.
        for rate in [0.01, 0.1, 0.25, 0.5, 0.75, 0.99] {
            let fraction = transmitted_fraction(rate);
            assert!(
                (fraction - rate).abs() < 0.01,
                "rate {rate}: transmitted fraction {fraction} too far from expected"
            );
        }
    }

    #[test]
    fn thread_local_rng_path() {
        assert_eq!(sample(1.0, "m:1.000000|g".to_string()).as_deref(), Some("m:1.000000|g"));
        assert_eq!(sample(0.0, "m:1.000000|c".to_string()), None);
    }
}
