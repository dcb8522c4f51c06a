//! Venue label to dense slot mapping.
//!
//! Every per-exchange array in the workspace is sized by [`SLOT_COUNT`] and
//! indexed through an [`ExchangeSlot`], so an unknown label can never index
//! out of bounds: it lands in the overflow slot.

/// Known consolidated-tape participant labels, in slot order (slot 1 first).
pub const KNOWN_LABELS: [char; 16] = [
    'A', 'B', 'C', 'D', 'I', 'J', 'K', 'M', 'N', 'P', 'Q', 'T', 'W', 'X', 'Y', 'Z',
];

/// Number of slots, including the trailing overflow slot.
pub const SLOT_COUNT: usize = KNOWN_LABELS.len() + 1;

/// A one-based exchange slot in `1..=SLOT_COUNT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExchangeSlot(u8);

impl ExchangeSlot {
    /// The slot shared by every unrecognized label.
    pub const OVERFLOW: ExchangeSlot = ExchangeSlot(SLOT_COUNT as u8);

    /// One-based slot number.
    #[inline]
    pub fn get(self) -> usize {
        self.0 as usize
    }

    /// Zero-based array index, always `< SLOT_COUNT`.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize - 1
    }

    #[inline]
    pub fn is_overflow(self) -> bool {
        self == Self::OVERFLOW
    }

    /// Label for this slot, `None` for the overflow slot.
    pub fn label(self) -> Option<char> {
        KNOWN_LABELS.get(self.index()).copied()
    }
}

/// Maps venue labels to slots.
///
/// The table is fixed; `map` never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExchangeCodec;

impl ExchangeCodec {
    pub fn new() -> Self {
        Self
    }

    /// Map a label (case-insensitive) to its slot.
    pub fn map(&self, label: char) -> ExchangeSlot {
        let upper = label.to_ascii_uppercase();
        KNOWN_LABELS
            .iter()
            .position(|&known| known == upper)
            .map(|pos| ExchangeSlot(pos as u8 + 1))
            .unwrap_or(ExchangeSlot::OVERFLOW)
    }

    /// Iterate over every slot, overflow last.
    pub fn slots(&self) -> impl Iterator<Item = ExchangeSlot> {
        (1..=SLOT_COUNT as u8).map(ExchangeSlot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_labels_are_dense() {
        let codec = ExchangeCodec::new();
        for (i, &label) in KNOWN_LABELS.iter().enumerate() {
            let slot = codec.map(label);
            assert_eq!(slot.get(), i + 1);
            assert_eq!(slot.index(), i);
            assert_eq!(slot.label(), Some(label));
            assert!(!slot.is_overflow());
        }
    }

    #[test]
    fn test_unknown_label_goes_to_overflow() {
        let codec = ExchangeCodec::new();
        let slot = codec.map('?');
        assert!(slot.is_overflow());
        assert_eq!(slot.get(), SLOT_COUNT);
        assert_eq!(slot.index(), SLOT_COUNT - 1);
        assert_eq!(slot.label(), None);
        assert_eq!(codec.map('E'), ExchangeSlot::OVERFLOW);
    }

    #[test]
    fn test_case_insensitive() {
        let codec = ExchangeCodec::new();
        assert_eq!(codec.map('n'), codec.map('N'));
    }

    #[test]
    fn test_slots_cover_every_index() {
        let codec = ExchangeCodec::new();
        let indices: Vec<usize> = codec.slots().map(|s| s.index()).collect();
        assert_eq!(indices, (0..SLOT_COUNT).collect::<Vec<_>>());
    }
}
