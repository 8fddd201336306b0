// Euclid - closed-form pattern generation and debounced regeneration

use super::track::MAX_STEPS;

/// Quiet period after the last edit before a pattern is regenerated
pub const PATTERN_DEBOUNCE_MS: u64 = 120;

/// Hit flags for up to `MAX_STEPS` steps, one bit per step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pattern {
    bits: u32,
    len: u8,
}

impl Pattern {
    /// Step `i` is a hit iff `(i * hits) % steps < hits`, then the whole
    /// sequence is rotated right by `offset`.
    ///
    /// `steps` is clamped to `1..=MAX_STEPS`, `hits` to `steps`.
    pub fn generate(steps: u8, hits: u8, offset: u8) -> Self {
        let steps = steps.clamp(1, MAX_STEPS) as u32;
        let hits = (hits as u32).min(steps);
        let offset = offset as u32 % steps;

        let mut bits = 0u32;
        for i in 0..steps {
            let src = (i + steps - offset) % steps;
            if (src * hits) % steps < hits {
                bits |= 1 << i;
            }
        }

        Self {
            bits,
            len: steps as u8,
        }
    }

    pub fn len(&self) -> u8 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// Out-of-range steps are rests
    pub fn is_hit(&self, step: u8) -> bool {
        step < self.len && self.bits & (1 << step) != 0
    }

    pub fn hit_count(&self) -> u32 {
        self.bits.count_ones()
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.len).map(move |i| self.is_hit(i))
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }
}

impl Default for Pattern {
    fn default() -> Self {
        Pattern::generate(16, 4, 0)
    }
}

/// A pattern plus the edit timestamp that delays its regeneration
#[derive(Debug, Clone, Default)]
pub struct DebouncedPattern {
    pattern: Pattern,
    dirty_since_ms: Option<u64>,
}

impl DebouncedPattern {
    pub fn new(steps: u8, hits: u8, offset: u8) -> Self {
        Self {
            pattern: Pattern::generate(steps, hits, offset),
            dirty_since_ms: None,
        }
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// Each edit restarts the quiet period
    pub fn mark_dirty(&mut self, now_ms: u64) {
        self.dirty_since_ms = Some(now_ms);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty_since_ms.is_some()
    }

    /// Regenerate if the quiet period has elapsed; true when regenerated
    pub fn poll(&mut self, now_ms: u64, steps: u8, hits: u8, offset: u8) -> bool {
        match self.dirty_since_ms {
            Some(since) if now_ms.saturating_sub(since) >= PATTERN_DEBOUNCE_MS => {
                self.regenerate(steps, hits, offset);
                true
            }
            _ => false,
        }
    }

    /// Regenerate immediately, dropping any pending edit
    pub fn regenerate(&mut self, steps: u8, hits: u8, offset: u8) {
        self.pattern = Pattern::generate(steps, hits, offset);
        self.dirty_since_ms = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit_indices(pattern: &Pattern) -> Vec<u8> {
        (0..pattern.len()).filter(|i| pattern.is_hit(*i)).collect()
    }

    #[test]
    fn test_sixteen_four() {
        let pattern = Pattern::generate(16, 4, 0);
        assert_eq!(hit_indices(&pattern), vec![0, 4, 8, 12]);
    }

    #[test]
    fn test_hit_count_matches() {
        for steps in 1..=MAX_STEPS {
            for hits in 0..=steps {
                let pattern = Pattern::generate(steps, hits, 0);
                assert_eq!(pattern.hit_count(), hits as u32, "steps={} hits={}", steps, hits);
            }
        }
    }

    #[test]
    fn test_extremes() {
        let rests = Pattern::generate(7, 0, 3);
        assert!(rests.iter().all(|b| !b));
        let full = Pattern::generate(7, 7, 3);
        assert!(full.iter().all(|b| b));
        let clamped = Pattern::generate(5, 9, 0);
        assert_eq!(clamped.hit_count(), 5);
    }

    #[test]
    fn test_offset_rotates_right() {
        let base = Pattern::generate(8, 3, 0);
        let rotated = Pattern::generate(8, 3, 2);
        for i in 0..8u8 {
            assert_eq!(rotated.is_hit((i + 2) % 8), base.is_hit(i));
        }
    }

    #[test]
    fn test_full_rotation_is_identity() {
        for steps in 1..=MAX_STEPS {
            let hits = steps / 3;
            assert_eq!(Pattern::generate(steps, hits, 0), Pattern::generate(steps, hits, steps));
        }
    }

    #[test]
    fn test_out_of_range_step_is_rest() {
        let pattern = Pattern::generate(4, 4, 0);
        assert!(!pattern.is_hit(4));
        assert!(!pattern.is_hit(31));
    }

    #[test]
    fn test_debounce_coalesces_edits() {
        let mut debounced = DebouncedPattern::new(16, 4, 0);
        debounced.mark_dirty(1_000);
        debounced.mark_dirty(1_080);
        assert!(!debounced.poll(1_150, 8, 3, 0));
        assert_eq!(debounced.pattern().len(), 16);

        assert!(debounced.poll(1_200, 8, 3, 0));
        assert_eq!(debounced.pattern().len(), 8);
        assert!(!debounced.is_dirty());
        assert!(!debounced.poll(5_000, 4, 4, 0));
    }
}
