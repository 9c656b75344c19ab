use rand::RngCore;

/// Local seed value meaning "unset": a fresh seed is drawn before the next request.
pub const UNSET_SEED: i64 = 0;

/// Seed value the server interprets as "pick one yourself".
pub const SERVER_RANDOM_SEED: i64 = -1;

/// Source of random 64-bit seeds.
pub trait SeedSource: Send + Sync {
    /// Draw a seed in `[min, max)`. Returns `min` when the range is empty.
    fn next_seed(&self, min: i64, max: i64) -> i64;
}

/// Seeds drawn from `rand`'s thread-local CSPRNG (ChaCha, reseeded from the OS).
///
/// The raw 64 bits are reduced with `|raw mod (max - min)| + min`, which is
/// slightly biased at the modulus boundary. That is fine for picking
/// generation seeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct CryptoSeedSource;

impl SeedSource for CryptoSeedSource {
    fn next_seed(&self, min: i64, max: i64) -> i64 {
        let mut buf = [0u8; 8];
        rand::rng().fill_bytes(&mut buf);
        reduce(i64::from_le_bytes(buf), min, max)
    }
}

fn reduce(raw: i64, min: i64, max: i64) -> i64 {
    if min >= max {
        return min;
    }
    // i128 so that `max - min` cannot overflow (e.g. -1..i64::MAX)
    let span = max as i128 - min as i128;
    let value = (raw as i128 % span).abs() + min as i128;
    value as i64
}

/// What happens to the local seed after the server reports the seed it used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeedResetPolicy {
    /// Reset locally drawn seeds to unset; keep any seed the user set,
    /// including [`SERVER_RANDOM_SEED`].
    #[default]
    KeepPinned,
    /// Reset to unset after every generation whose info decoded, pinned or not.
    ResetAlways,
}

/// The node's mutable seed field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedState {
    value: i64,
    drawn: bool,
}

impl Default for SeedState {
    fn default() -> Self {
        Self::new(SERVER_RANDOM_SEED)
    }
}

impl SeedState {
    pub fn new(value: i64) -> Self {
        Self {
            value,
            drawn: false,
        }
    }

    pub fn value(&self) -> i64 {
        self.value
    }

    /// Pin a specific seed (or pass [`UNSET_SEED`] to re-randomize every run).
    pub fn set(&mut self, value: i64) {
        self.value = value;
        self.drawn = false;
    }

    /// Whether the current value was drawn locally rather than set by the user.
    pub fn was_drawn(&self) -> bool {
        self.drawn
    }

    /// Return the seed for the next request, drawing one if unset.
    pub fn resolve(&mut self, source: &dyn SeedSource) -> i64 {
        if self.value == UNSET_SEED {
            self.value = source.next_seed(SERVER_RANDOM_SEED, i64::MAX);
            self.drawn = true;
            log::debug!("Drew fresh seed {}", self.value);
        }
        self.value
    }

    /// Apply `policy` once the server has reported the seed it used.
    pub fn after_generation(&mut self, policy: SeedResetPolicy) {
        let reset = match policy {
            SeedResetPolicy::ResetAlways => true,
            SeedResetPolicy::KeepPinned => self.drawn,
        };
        if reset {
            self.value = UNSET_SEED;
        }
        self.drawn = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(i64);

    impl SeedSource for Fixed {
        fn next_seed(&self, _min: i64, _max: i64) -> i64 {
            self.0
        }
    }

    #[test]
    fn test_reduce_stays_in_range() {
        for raw in [i64::MIN, i64::MIN + 1, -12345, -1, 0, 1, 98765, i64::MAX] {
            let seed = reduce(raw, -1, i64::MAX);
            assert!((-1..i64::MAX).contains(&seed), "{} -> {}", raw, seed);

            let small = reduce(raw, 10, 20);
            assert!((10..20).contains(&small), "{} -> {}", raw, small);
        }
    }

    #[test]
    fn test_reduce_empty_range_returns_min() {
        assert_eq!(reduce(42, 5, 5), 5);
        assert_eq!(reduce(42, 9, 3), 9);
    }

    #[test]
    fn test_crypto_source_range() {
        let source = CryptoSeedSource;
        for _ in 0..1000 {
            let seed = source.next_seed(100, 200);
            assert!((100..200).contains(&seed));
        }
    }

    #[test]
    fn test_crypto_source_varies() {
        let source = CryptoSeedSource;
        let a = source.next_seed(-1, i64::MAX);
        let b = source.next_seed(-1, i64::MAX);
        let c = source.next_seed(-1, i64::MAX);
        assert!(a != b || b != c);
    }

    #[test]
    fn test_resolve_draws_only_when_unset() {
        let mut seed = SeedState::new(UNSET_SEED);
        assert_eq!(seed.resolve(&Fixed(777)), 777);
        assert!(seed.was_drawn());

        let mut pinned = SeedState::new(1234);
        assert_eq!(pinned.resolve(&Fixed(777)), 1234);
        assert!(!pinned.was_drawn());

        let mut server = SeedState::default();
        assert_eq!(server.resolve(&Fixed(777)), SERVER_RANDOM_SEED);
    }

    #[test]
    fn test_keep_pinned_policy() {
        let mut drawn = SeedState::new(UNSET_SEED);
        drawn.resolve(&Fixed(777));
        drawn.after_generation(SeedResetPolicy::KeepPinned);
        assert_eq!(drawn.value(), UNSET_SEED);

        let mut server = SeedState::default();
        server.after_generation(SeedResetPolicy::KeepPinned);
        assert_eq!(server.value(), SERVER_RANDOM_SEED);

        let mut pinned = SeedState::new(1234);
        pinned.after_generation(SeedResetPolicy::KeepPinned);
        assert_eq!(pinned.value(), 1234);
    }

    #[test]
    fn test_reset_always_policy() {
        let mut pinned = SeedState::new(1234);
        pinned.after_generation(SeedResetPolicy::ResetAlways);
        assert_eq!(pinned.value(), UNSET_SEED);

        let mut server = SeedState::default();
        server.after_generation(SeedResetPolicy::ResetAlways);
        assert_eq!(server.value(), UNSET_SEED);
    }

    #[test]
    fn test_set_clears_drawn_flag() {
        let mut seed = SeedState::new(UNSET_SEED);
        seed.resolve(&Fixed(5));
        seed.set(5);
        assert!(!seed.was_drawn());
        seed.after_generation(SeedResetPolicy::KeepPinned);
        assert_eq!(seed.value(), 5);
    }
}
