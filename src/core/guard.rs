//! Guard predicates over an active flag mask.
//!
//! Guards decide whether a transaction may apply its operation. They are
//! pure functions of the current flags and have no side effects.

use std::fmt;

/// Pure predicate evaluated against a controller's current flags.
///
/// # Example
///
/// ```rust
/// use flagstate::core::FlagGuard;
///
/// const EAT: u32 = 1;
/// const SLEEP: u32 = 2;
///
/// let awake = FlagGuard::new(|flags| flags & SLEEP == 0);
/// assert!(awake.check(EAT));
/// assert!(!awake.check(EAT | SLEEP));
///
/// assert!(FlagGuard::has(SLEEP).check(EAT | SLEEP));
/// assert!(!FlagGuard::equals(SLEEP).check(EAT | SLEEP));
/// ```
pub struct FlagGuard {
    predicate: Box<dyn Fn(u32) -> bool>,
    label: GuardLabel,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum GuardLabel {
    Has(u32),
    Equals(u32),
    Custom,
}

impl FlagGuard {
    /// Create a guard from a pure predicate.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(u32) -> bool + 'static,
    {
        FlagGuard {
            predicate: Box::new(predicate),
            label: GuardLabel::Custom,
        }
    }

    /// Passes when any bit of `mask` is active.
    pub fn has(mask: u32) -> Self {
        FlagGuard {
            predicate: Box::new(move |flags| flags & mask != 0),
            label: GuardLabel::Has(mask),
        }
    }

    /// Passes when the active flags are exactly `mask`.
    pub fn equals(mask: u32) -> Self {
        FlagGuard {
            predicate: Box::new(move |flags| flags == mask),
            label: GuardLabel::Equals(mask),
        }
    }

    /// Evaluate the guard against `flags`.
    pub fn check(&self, flags: u32) -> bool {
        (self.predicate)(flags)
    }

    /// The comparison mask for `has`/`equals` guards.
    pub fn mask(&self) -> Option<u32> {
        match self.label {
            GuardLabel::Has(mask) | GuardLabel::Equals(mask) => Some(mask),
            GuardLabel::Custom => None,
        }
    }
}

impl fmt::Debug for FlagGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.label {
            GuardLabel::Has(mask) => write!(f, "FlagGuard::Has({mask:#x})"),
            GuardLabel::Equals(mask) => write!(f, "FlagGuard::Equals({mask:#x})"),
            GuardLabel::Custom => write!(f, "FlagGuard::Custom"),
        }
    }
}
