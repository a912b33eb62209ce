//! Sliding-window duplicate-packet-id detector.

/// A bitmap of `W` bits against a high-water-mark, rejecting packet-ids
/// that were already seen or that fall more than `W` behind the highest
/// one observed.
pub struct ReplayProtector {
    window_bits: u32,
    bitmap: Vec<u64>,
    high_water_mark: u32,
}

impl ReplayProtector {
    /// `window_bits` must be a positive multiple of 64 (the spec's
    /// defaults are 128 and 256).
    pub fn new(window_bits: u32) -> Self {
        assert!(window_bits > 0 && window_bits % 64 == 0, "window size must be a positive multiple of 64");
        Self { window_bits, bitmap: vec![0u64; (window_bits / 64) as usize], high_water_mark: 0 }
    }

    fn bit(&self, b: u32) -> bool {
        let word = (b / 64) as usize;
        let offset = b % 64;
        (self.bitmap[word] >> offset) & 1 != 0
    }

    fn set_bit(&mut self, b: u32) {
        let word = (b / 64) as usize;
        let offset = b % 64;
        self.bitmap[word] |= 1u64 << offset;
    }

    fn shift_left(&mut self, amount: u32) {
        if amount >= self.window_bits {
            for w in self.bitmap.iter_mut() {
                *w = 0;
            }
            return;
        }
        let word_shift = (amount / 64) as usize;
        let bit_shift = amount % 64;
        let n = self.bitmap.len();
        if word_shift > 0 {
            for i in (word_shift..n).rev() {
                self.bitmap[i] = self.bitmap[i - word_shift];
            }
            for i in 0..word_shift {
                self.bitmap[i] = 0;
            }
        }
        if bit_shift > 0 {
            let mut carry = 0u64;
            for i in 0..n {
                let cur = self.bitmap[i];
                self.bitmap[i] = (cur << bit_shift) | carry;
                carry = cur >> (64 - bit_shift);
            }
        }
    }

    /// Returns `true` if `pid` is a replay (already seen, reserved, or
    /// stale beyond the window) and should be dropped.
    pub fn is_replayed(&mut self, pid: u32) -> bool {
        if pid == 0 {
            return true;
        }
        if pid > self.high_water_mark {
            let advance = pid - self.high_water_mark;
            self.shift_left(advance);
            self.set_bit(0);
            self.high_water_mark = pid;
            return false;
        }
        let behind = self.high_water_mark - pid;
        if behind >= self.window_bits {
            return true;
        }
        if self.bit(behind) {
            return true;
        }
        self.set_bit(behind);
        false
    }
}
