//! Macros for declaring state flags.

/// Declare an enum of named single-bit state flags.
///
/// Each variant names a bit index; the generated `flag()` returns the mask
/// `1 << index`. Indices must stay below 31, bit 31 is reserved.
///
/// # Example
///
/// ```
/// use flagstate::state_flags;
///
/// state_flags! {
///     pub enum Activity {
///         Eat = 0,
///         Sleep = 1,
///         Work = 4,
///     }
/// }
///
/// assert_eq!(Activity::Work.flag(), 0x10);
/// assert_eq!(Activity::from_flag(0x2), Some(Activity::Sleep));
/// assert_eq!(Activity::mask(&[Activity::Eat, Activity::Sleep]), 0x3);
/// ```
#[macro_export]
macro_rules! state_flags {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident = $index:literal
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, serde::Serialize, serde::Deserialize)]
        #[repr(u32)]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant = $index
            ),*
        }

        const _: () = {
            $(assert!($index < 31, "state flag index must be below 31");)*
        };

        impl $name {
            /// Every declared flag, in declaration order.
            pub const ALL: &'static [$name] = &[$(Self::$variant),*];

            /// Single-bit mask of this flag.
            pub const fn flag(self) -> u32 {
                1u32 << (self as u32)
            }

            pub fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => stringify!($variant)),*
                }
            }

            /// The variant whose mask is exactly `flag`.
            pub fn from_flag(flag: u32) -> Option<Self> {
                Self::ALL.iter().copied().find(|v| v.flag() == flag)
            }

            /// Union of the given flags.
            pub fn mask(flags: &[Self]) -> u32 {
                flags.iter().fold(0, |mask, v| mask | v.flag())
            }

            /// Declared flags present in `mask`, in declaration order.
            pub fn from_mask(mask: u32) -> Vec<Self> {
                Self::ALL.iter().copied().filter(|v| mask & v.flag() != 0).collect()
            }
        }

        impl From<$name> for u32 {
            fn from(value: $name) -> u32 {
                value.flag()
            }
        }
    };
}
