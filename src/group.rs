//! Control-byte groups: the block compare primitive used by the probe loops.
//!
//! A group is a run of `WIDTH` consecutive control bytes loaded at once and
//! compared against a broadcast byte, producing one bit per byte. Two
//! backends exist: [`ScalarGroup`] compares a single byte, and `Sse2Group`
//! compares sixteen with `pcmpeqb`/`pmovmskb`. [`DefaultGroup`] is picked at
//! compile time.

/// Control byte for a slot that has never held an entry.
///
/// The sign bit marks availability, so the SSE2 backend can find available
/// slots with a single `movemask` over the raw bytes.
pub const EMPTY: u8 = 0b1000_0000;

/// Control byte for a slot whose entry has been removed.
pub const TOMBSTONE: u8 = 0b1000_0001;

/// Bit shared by [`EMPTY`] and [`TOMBSTONE`]; clear on occupied slots.
pub const AVAILABLE: u8 = 1 << 7;

const _: () = assert!(EMPTY & AVAILABLE != 0 && TOMBSTONE & AVAILABLE != 0);

/// Returns `true` if the control byte marks a live entry.
#[inline(always)]
pub const fn is_full(ctrl: u8) -> bool {
    ctrl & AVAILABLE == 0
}

/// The control byte stored for an entry with the given hash: the top seven
/// bits of the hash truncated to the platform word.
#[inline(always)]
pub const fn hashtag(hash: u64) -> u8 {
    ((hash as usize) >> (usize::BITS - 7)) as u8
}

cfg_if::cfg_if! {
    // NEON has no cheap way to collapse a comparison into a bitmask, so on
    // ARM the scalar loop is as fast and simpler.
    if #[cfg(all(
        target_feature = "sse2",
        any(target_arch = "x86", target_arch = "x86_64"),
        not(miri),
        not(feature = "force-scalar"),
    ))] {
        /// The group backend used when no other is requested.
        pub type DefaultGroup = Sse2Group;
    } else {
        /// The group backend used when no other is requested.
        pub type DefaultGroup = ScalarGroup;
    }
}

/// A set of byte positions within a group, one bit per control byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitMask(pub u16);

impl BitMask {
    /// Returns `true` if any position is set.
    #[inline(always)]
    pub fn any_bit_set(self) -> bool {
        self.0 != 0
    }

    /// Returns the first set position.
    #[inline(always)]
    pub fn lowest_set_bit(self) -> Option<usize> {
        if self.0 == 0 {
            None
        } else {
            Some(self.0.trailing_zeros() as usize)
        }
    }

    /// Keeps only the positions strictly before `end`.
    #[inline(always)]
    pub fn truncate(self, end: usize) -> Self {
        if end >= 16 {
            self
        } else {
            BitMask(self.0 & ((1u16 << end) - 1))
        }
    }
}

impl IntoIterator for BitMask {
    type Item = usize;
    type IntoIter = BitMaskIter;

    #[inline(always)]
    fn into_iter(self) -> BitMaskIter {
        BitMaskIter(self.0)
    }
}

/// Iterator over the set positions of a [`BitMask`], lowest first.
#[derive(Debug, Clone)]
pub struct BitMaskIter(u16);

impl Iterator for BitMaskIter {
    type Item = usize;

    #[inline(always)]
    fn next(&mut self) -> Option<usize> {
        if self.0 == 0 {
            return None;
        }
        let bit = self.0.trailing_zeros() as usize;
        self.0 &= self.0 - 1;
        Some(bit)
    }
}

/// A block of control bytes that can be compared as a unit.
///
/// Tables size their control buffer so that a group loaded at any slot index
/// below the capacity stays in bounds.
pub trait ControlGroup: Copy {
    /// Number of control bytes in a group; at most 16.
    const WIDTH: usize;

    /// Loads `WIDTH` control bytes starting at `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr..ptr + WIDTH` must be readable. No alignment is required.
    unsafe fn load(ptr: *const u8) -> Self;

    /// Positions whose control byte equals `byte`.
    fn match_byte(self, byte: u8) -> BitMask;

    /// Positions holding [`EMPTY`].
    #[inline(always)]
    fn match_empty(self) -> BitMask {
        self.match_byte(EMPTY)
    }

    /// Positions holding either [`EMPTY`] or [`TOMBSTONE`].
    fn match_available(self) -> BitMask;
}

/// Byte-at-a-time backend, used where no vector compare is available.
#[derive(Debug, Clone, Copy)]
pub struct ScalarGroup(u8);

impl ControlGroup for ScalarGroup {
    const WIDTH: usize = 1;

    #[inline(always)]
    unsafe fn load(ptr: *const u8) -> Self {
        // SAFETY: The caller guarantees one readable byte.
        ScalarGroup(unsafe { *ptr })
    }

    #[inline(always)]
    fn match_byte(self, byte: u8) -> BitMask {
        BitMask((self.0 == byte) as u16)
    }

    #[inline(always)]
    fn match_available(self) -> BitMask {
        BitMask(!is_full(self.0) as u16)
    }
}

#[cfg(all(target_feature = "sse2", any(target_arch = "x86", target_arch = "x86_64")))]
pub use sse2::Sse2Group;

#[cfg(all(target_feature = "sse2", any(target_arch = "x86", target_arch = "x86_64")))]
mod sse2 {
    #[cfg(target_arch = "x86")]
    use core::arch::x86 as arch;
    #[cfg(target_arch = "x86_64")]
    use core::arch::x86_64 as arch;

    use super::BitMask;
    use super::ControlGroup;

    /// Sixteen-byte SSE2 backend.
    #[derive(Debug, Clone, Copy)]
    pub struct Sse2Group(arch::__m128i);

    impl ControlGroup for Sse2Group {
        const WIDTH: usize = 16;

        #[inline(always)]
        unsafe fn load(ptr: *const u8) -> Self {
            // SAFETY: The caller guarantees sixteen readable bytes; the load is
            // unaligned.
            unsafe { Sse2Group(arch::_mm_loadu_si128(ptr as *const arch::__m128i)) }
        }

        #[inline(always)]
        fn match_byte(self, byte: u8) -> BitMask {
            // SAFETY: The module only exists when the target enables SSE2.
            unsafe {
                let cmp = arch::_mm_cmpeq_epi8(self.0, arch::_mm_set1_epi8(byte as i8));
                BitMask(arch::_mm_movemask_epi8(cmp) as u16)
            }
        }

        #[inline(always)]
        fn match_available(self) -> BitMask {
            // SAFETY: As in `match_byte`. Available bytes are exactly those
            // with the sign bit set.
            unsafe { BitMask(arch::_mm_movemask_epi8(self.0) as u16) }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_matches<G: ControlGroup>() {
        let mut bytes = [EMPTY; 32];
        bytes[0] = 0x12;
        if G::WIDTH > 1 {
            bytes[3] = TOMBSTONE;
            bytes[5] = 0x12;
            bytes[G::WIDTH - 1] = 0x7F;
        }

        // SAFETY: `bytes` holds at least `WIDTH` bytes.
        let group = unsafe { G::load(bytes.as_ptr()) };
        let tags: alloc::vec::Vec<usize> = group.match_byte(0x12).into_iter().collect();
        let empty = group.match_empty();
        let available = group.match_available();

        if G::WIDTH == 1 {
            assert_eq!(tags, [0]);
            assert!(!empty.any_bit_set());
            assert!(!available.any_bit_set());
        } else {
            assert_eq!(tags, [0, 5]);
            assert_eq!(empty.lowest_set_bit(), Some(1));
            assert_eq!(empty.0 & (1 << 3), 0);
            assert_ne!(available.0 & (1 << 3), 0);
            assert_eq!(available.0 & (1 << (G::WIDTH - 1)), 0);
            assert_eq!(available.0.count_ones() as usize, G::WIDTH - 3);
        }
    }

    #[test]
    fn scalar_matches() {
        check_matches::<ScalarGroup>();

        // SAFETY: Single readable byte.
        let tomb = unsafe { ScalarGroup::load(&TOMBSTONE) };
        assert!(!tomb.match_empty().any_bit_set());
        assert!(tomb.match_available().any_bit_set());
    }

    #[cfg(all(target_feature = "sse2", any(target_arch = "x86", target_arch = "x86_64")))]
    #[test]
    fn sse2_matches() {
        check_matches::<Sse2Group>();
    }

    #[test]
    fn default_group_follows_target_features() {
        let expected = if cfg!(all(
            target_feature = "sse2",
            any(target_arch = "x86", target_arch = "x86_64"),
            not(miri),
            not(feature = "force-scalar"),
        )) {
            16
        } else {
            1
        };
        assert_eq!(DefaultGroup::WIDTH, expected);
    }

    #[test]
    fn hashtag_is_never_available() {
        for hash in [0u64, u64::MAX, 1 << 63, 0x0123_4567_89AB_CDEF, usize::MAX as u64] {
            assert!(is_full(hashtag(hash)));
        }
        assert_eq!(hashtag(u64::MAX), 0x7F);
    }

    #[test]
    fn bitmask_truncate_and_iterate() {
        let mask = BitMask(0b1010_0110);
        assert_eq!(mask.truncate(3), BitMask(0b110));
        assert_eq!(mask.truncate(0), BitMask(0));
        assert_eq!(mask.truncate(16), mask);
        assert_eq!(mask.lowest_set_bit(), Some(1));
        assert_eq!(mask.into_iter().collect::<alloc::vec::Vec<_>>(), [1, 2, 5, 7]);
        assert_eq!(BitMask(0).lowest_set_bit(), None);
    }
}
