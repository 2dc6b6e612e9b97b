//! A small numeric abstraction so `Linear<Pos>` and `PrePostOrder<Order,
//! Level>` can be written once and instantiated at the narrowest
//! integer width the registry picks for a given component's statistics.

use std::convert::TryFrom;
use std::fmt::Debug;
use std::hash::Hash;

pub trait NumValue: Copy + Ord + Eq + Hash + Debug + Send + Sync + 'static {
    fn zero() -> Self;
    fn one() -> Self;
    fn checked_add_one(self) -> Option<Self>;
    fn from_usize(v: usize) -> Option<Self>;
    fn to_usize(self) -> usize;
    fn max_value() -> Self;
}

macro_rules! impl_num_value {
    ($t:ty) => {
        impl NumValue for $t {
            fn zero() -> Self {
                0
            }
            fn one() -> Self {
                1
            }
            fn checked_add_one(self) -> Option<Self> {
                self.checked_add(1)
            }
            fn from_usize(v: usize) -> Option<Self> {
                <$t>::try_from(v).ok()
            }
            fn to_usize(self) -> usize {
                self as usize
            }
            fn max_value() -> Self {
                <$t>::MAX
            }
        }
    };
}

impl_num_value!(u8);
impl_num_value!(u16);
impl_num_value!(u32);
impl_num_value!(i8);
impl_num_value!(i16);
impl_num_value!(i32);

/// The narrowest unsigned width that can represent `value`, used by the
/// registry heuristic to pick `Pos`/`Order`.
pub fn narrowest_unsigned_width(value: usize) -> &'static str {
    if value <= u8::MAX as usize {
        "u8"
    } else if value <= u16::MAX as usize {
        "u16"
    } else {
        "u32"
    }
}

/// The narrowest signed width that can represent `value`, used for `Level`.
pub fn narrowest_signed_width(value: usize) -> &'static str {
    if value <= i8::MAX as usize {
        "i8"
    } else if value <= i16::MAX as usize {
        "i16"
    } else {
        "i32"
    }
}
