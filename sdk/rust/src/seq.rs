//! Modular arithmetic over the cyclic sequence-number range `[0, size)`.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeqSpace {
    size: usize,
}

impl SeqSpace {
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "sequence space must be non-empty");
        Self { size }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn advance(&self, seq: usize) -> usize {
        (seq + 1) % self.size
    }

    pub fn retreat(&self, seq: usize) -> usize {
        (seq + self.size - 1) % self.size
    }

    /// Number of steps needed to go forward from `from` to `to`.
    pub fn distance(&self, from: usize, to: usize) -> usize {
        (to + self.size - from % self.size) % self.size
    }

    /// Whether `seq` lies in the half-open cyclic interval `[base, base + len)`.
    /// Handles wraparound past the end of the space.
    pub fn in_window(&self, seq: usize, base: usize, len: usize) -> bool {
        seq < self.size && self.distance(base, seq) < len
    }

    /// Interpret a header field as a sequence number. Values outside the
    /// space (unused fields, damaged headers) yield `None`.
    pub fn from_wire(&self, raw: i32) -> Option<usize> {
        usize::try_from(raw).ok().filter(|seq| *seq < self.size)
    }

    pub fn to_wire(&self, seq: usize) -> i32 {
        // sequence spaces are tiny; this never truncates
        seq as i32
    }

    /// Iterate `[base, end)` in sequence order, wrapping at the end of the space.
    pub fn range(&self, base: usize, end: usize) -> impl Iterator<Item = usize> + '_ {
        let len = self.distance(base, end);
        (0..len).map(move |offset| (base + offset) % self.size)
    }
}
