//! Bit-flag helpers for composite state values.
//!
//! Every state is identified by exactly one bit of a `u32`. A composite state
//! is the OR of several of those bits. Bit 31 is reserved and never names a
//! state. Iteration is always in descending bit order; the transition engine
//! relies on that order being stable.

/// Reserved bit. Never a valid state flag.
pub const RESERVED_BIT: u32 = 1 << 31;

/// The highest bit usable as a state flag.
pub const MAX_FLAG: u32 = 1 << 30;

/// Mask of every usable state bit.
pub const ALL_FLAGS: u32 = !RESERVED_BIT;

/// Highest single flag contained in `flags`, or 0 when `flags` is 0.
///
/// ```rust
/// use flagstate::core::bits::highest_flag;
///
/// assert_eq!(highest_flag(0b0110), 0b0100);
/// assert_eq!(highest_flag(1), 1);
/// assert_eq!(highest_flag(0), 0);
/// ```
pub fn highest_flag(flags: u32) -> u32 {
    if flags == 0 {
        0
    } else {
        1 << (31 - flags.leading_zeros())
    }
}

/// Lowest single flag contained in `flags`, or 0 when `flags` is 0.
pub fn lowest_flag(flags: u32) -> u32 {
    flags & flags.wrapping_neg()
}

/// True when `flags` is exactly one bit.
pub fn is_single_flag(flags: u32) -> bool {
    flags.is_power_of_two()
}

/// Number of individual flags in `flags`.
pub fn flag_count(flags: u32) -> u32 {
    flags.count_ones()
}

/// True when `flags` names at least one state and avoids the reserved bit.
pub fn is_valid_flags(flags: u32) -> bool {
    flags != 0 && flags & RESERVED_BIT == 0
}

/// Iterator over the single flags of a composite value, highest first.
#[derive(Clone, Debug)]
pub struct Flags {
    remaining: u32,
}

impl Iterator for Flags {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.remaining == 0 {
            return None;
        }
        let flag = highest_flag(self.remaining);
        self.remaining &= !flag;
        Some(flag)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining.count_ones() as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for Flags {}

/// Iterate the single flags of `flags` in descending order.
///
/// ```rust
/// use flagstate::core::bits::iter_flags;
///
/// let flags: Vec<u32> = iter_flags(0b1011).collect();
/// assert_eq!(flags, vec![8, 2, 1]);
/// ```
pub fn iter_flags(flags: u32) -> Flags {
    Flags { remaining: flags }
}

/// Decompose a composite value into its single flags, highest first.
pub fn decompose(flags: u32) -> Vec<u32> {
    iter_flags(flags).collect()
}
