//! Human behavior simulation
//!
//! Jitters tap positions and cycle delays so the action stream carries the
//! variance a human finger would.

use rand::RngExt;

/// Human reaction time range in milliseconds
const MIN_REACTION_TIME_MS: u64 = 180;
const MAX_REACTION_TIME_MS: u64 = 350;

/// Visual processing time range
const MIN_PROCESSING_TIME_MS: u64 = 100;
const MAX_PROCESSING_TIME_MS: u64 = 300;

/// Humanizer for generating realistic timing and positions
pub struct Humanizer {
    rng: rand::rngs::ThreadRng,
}

impl Default for Humanizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Humanizer {
    /// Create a new humanizer
    pub fn new() -> Self {
        Self { rng: rand::rng() }
    }

    /// Get a humanized pre-action delay
    ///
    /// Combines reaction time + visual processing time + occasional hesitation
    pub fn action_delay_ms(&mut self) -> u64 {
        let reaction_time = self
            .rng
            .random_range(MIN_REACTION_TIME_MS..=MAX_REACTION_TIME_MS);
        let processing_time = self
            .rng
            .random_range(MIN_PROCESSING_TIME_MS..=MAX_PROCESSING_TIME_MS);

        // 5% chance of hesitation (200-800ms)
        let hesitation = if self.rng.random::<f32>() < 0.05 {
            self.rng.random_range(200..=800)
        } else {
            0
        };

        reaction_time + processing_time + hesitation
    }

    /// Humanize a delay with variance
    pub fn humanize_delay(&mut self, base_delay_ms: u64, variance_percent: u32) -> u64 {
        if variance_percent == 0 {
            return base_delay_ms;
        }

        let variance = (base_delay_ms as f64 * variance_percent as f64 / 100.0) as i64;
        if variance == 0 {
            return base_delay_ms;
        }
        let offset = self.rng.random_range(-variance..=variance);

        (base_delay_ms as i64 + offset).max(50) as u64
    }

    /// Humanize a tap position with a slight offset.
    /// Returns `(offset_x, offset_y)` to add to the target position.
    pub fn jitter_position(&mut self, max_offset: i32) -> (i32, i32) {
        if max_offset == 0 {
            return (0, 0);
        }

        // Use gaussian-like distribution for more realistic spread
        let offset_x = self.gaussian_offset(max_offset);
        let offset_y = self.gaussian_offset(max_offset);

        (offset_x, offset_y)
    }

    /// Generate gaussian-distributed offset
    fn gaussian_offset(&mut self, max_offset: i32) -> i32 {
        // Simple approximation using sum of uniform randoms
        let sum: f32 = (0..3).map(|_| self.rng.random::<f32>() - 0.5).sum();

        (sum * max_offset as f32 * 0.67) as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_delays_within_bounds() {
        let mut humanizer = Humanizer::new();

        for _ in 0..100 {
            let delay = humanizer.action_delay_ms();
            assert!(delay >= MIN_REACTION_TIME_MS + MIN_PROCESSING_TIME_MS);
            assert!(delay <= MAX_REACTION_TIME_MS + MAX_PROCESSING_TIME_MS + 800);
        }
    }

    #[test]
    fn test_position_jitter_bounded() {
        let mut humanizer = Humanizer::new();

        for _ in 0..100 {
            let (x, y) = humanizer.jitter_position(10);
            assert!((-10..=10).contains(&x));
            assert!((-10..=10).contains(&y));
        }
    }

    #[test]
    fn test_humanize_delay_variance() {
        let mut humanizer = Humanizer::new();
        let base = 500u64;

        let mut min_seen = base;
        let mut max_seen = base;

        for _ in 0..1000 {
            let delay = humanizer.humanize_delay(base, 30);
            min_seen = min_seen.min(delay);
            max_seen = max_seen.max(delay);
        }

        // Should see variance in both directions
        assert!(min_seen < base);
        assert!(max_seen > base);
    }

    #[test]
    fn test_zero_variance_returns_base() {
        let mut humanizer = Humanizer::new();

        for _ in 0..10 {
            assert_eq!(humanizer.humanize_delay(500, 0), 500);
        }
    }

    #[test]
    fn test_zero_offset_returns_origin() {
        let mut humanizer = Humanizer::new();
        assert_eq!(humanizer.jitter_position(0), (0, 0));
    }
}
