//! Fixed-point arithmetic for deterministic simulation.
//!
//! All simulation values use this type to ensure identical results across platforms.
//! Floats (f32/f64) are banned in sim logic due to x87/SSE/FMA differences; the only
//! legal use of a float is converting scenario data at load time, never during a tick.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Rem, Sub, SubAssign};

/// Q32.32 fixed-point value: the low 32 bits are the fractional part, the
/// high 32 bits (plus sign) are the integer part. Backed by a plain `i64` so
/// wrapping add/sub and 128-bit-intermediate mul/div are bit-identical on any
/// conforming integer CPU.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct FixedPoint64(pub i64);

impl FixedPoint64 {
    /// Number of fractional bits.
    pub const FRAC_BITS: u32 = 32;

    pub const ZERO: FixedPoint64 = FixedPoint64(0);
    pub const ONE: FixedPoint64 = FixedPoint64(1 << Self::FRAC_BITS);
    pub const HALF: FixedPoint64 = FixedPoint64(1 << (Self::FRAC_BITS - 1));
    pub const MAX: FixedPoint64 = FixedPoint64(i64::MAX);
    pub const MIN: FixedPoint64 = FixedPoint64(i64::MIN);

    #[inline]
    pub const fn from_raw(raw: i64) -> Self {
        FixedPoint64(raw)
    }

    #[inline]
    pub const fn from_int(v: i32) -> Self {
        FixedPoint64((v as i64) << Self::FRAC_BITS)
    }

    /// Converts from `f64`. Initialization-only: never call this from
    /// simulation logic, only from scenario/config loaders.
    pub fn from_f64(v: f64) -> Self {
        if !v.is_finite() {
            return FixedPoint64::ZERO;
        }
        let scaled = v * (1i64 << Self::FRAC_BITS) as f64;
        if scaled >= i64::MAX as f64 {
            return FixedPoint64::MAX;
        }
        if scaled <= i64::MIN as f64 {
            return FixedPoint64::MIN;
        }
        FixedPoint64(scaled.round() as i64)
    }

    #[inline]
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / (1i64 << Self::FRAC_BITS) as f64
    }

    #[inline]
    pub const fn raw(self) -> i64 {
        self.0
    }

    /// Raw value as big-endian bytes, the wire/disk representation required by §3.1.
    #[inline]
    pub fn to_be_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    #[inline]
    pub fn from_be_bytes(bytes: [u8; 8]) -> Self {
        FixedPoint64(i64::from_be_bytes(bytes))
    }

    #[inline]
    pub const fn floor(self) -> i64 {
        self.0 >> Self::FRAC_BITS
    }

    #[inline]
    pub fn ceil(self) -> i64 {
        let frac_mask = (1i64 << Self::FRAC_BITS) - 1;
        if self.0 & frac_mask == 0 {
            self.floor()
        } else {
            self.floor() + 1
        }
    }

    #[inline]
    pub fn round(self) -> i64 {
        (self + FixedPoint64::HALF).floor()
    }

    /// The fractional part as its own `FixedPoint64`, always in `[0, 1)`.
    #[inline]
    pub fn frac(self) -> FixedPoint64 {
        let frac_mask = (1i64 << Self::FRAC_BITS) - 1;
        FixedPoint64(self.0 & frac_mask)
    }

    #[inline]
    pub fn abs(self) -> FixedPoint64 {
        FixedPoint64(self.0.wrapping_abs())
    }

    #[inline]
    pub fn min(self, other: FixedPoint64) -> FixedPoint64 {
        if self.0 <= other.0 { self } else { other }
    }

    #[inline]
    pub fn max(self, other: FixedPoint64) -> FixedPoint64 {
        if self.0 >= other.0 { self } else { other }
    }

    #[inline]
    pub fn clamp(self, lo: FixedPoint64, hi: FixedPoint64) -> FixedPoint64 {
        self.max(lo).min(hi)
    }

    /// `a * (1 - t) + b * t`.
    pub fn lerp(self, b: FixedPoint64, t: FixedPoint64) -> FixedPoint64 {
        self + (b - self) * t
    }

    /// Inverse of [`lerp`]: given a value between `self` (a) and `b`, returns
    /// `t` such that `a.lerp(b, t) == value`. Returns `ZERO` if `a == b`.
    pub fn inverse_lerp(self, b: FixedPoint64, value: FixedPoint64) -> FixedPoint64 {
        let span = b - self;
        if span.0 == 0 {
            return FixedPoint64::ZERO;
        }
        (value - self) / span
    }

    /// Remaps `value` from range `[in_min, in_max]` to `[out_min, out_max]`.
    pub fn remap(
        in_min: FixedPoint64,
        in_max: FixedPoint64,
        out_min: FixedPoint64,
        out_max: FixedPoint64,
        value: FixedPoint64,
    ) -> FixedPoint64 {
        let t = in_min.inverse_lerp(in_max, value);
        out_min.lerp(out_max, t)
    }

    /// Moves `self` toward `target` by at most `max_delta` (which must be non-negative).
    pub fn move_towards(self, target: FixedPoint64, max_delta: FixedPoint64) -> FixedPoint64 {
        let delta = target - self;
        if delta.abs() <= max_delta {
            target
        } else if delta.0 > 0 {
            self + max_delta
        } else {
            self - max_delta
        }
    }

    /// `self` expressed as a percentage of `whole` (i.e. `self / whole * 100`).
    pub fn percentage(self, whole: FixedPoint64) -> FixedPoint64 {
        if whole.0 == 0 {
            return FixedPoint64::ZERO;
        }
        (self / whole) * FixedPoint64::from_int(100)
    }

    /// Integer (non-negative exponent) power via binary exponentiation.
    pub fn pow(self, mut exp: u32) -> FixedPoint64 {
        let mut base = self;
        let mut result = FixedPoint64::ONE;
        while exp > 0 {
            if exp & 1 == 1 {
                result = result * base;
            }
            base = base * base;
            exp >>= 1;
        }
        result
    }

    /// Newton-Raphson square root, 8 iterations, undefined (returns `ZERO`)
    /// for negative inputs.
    pub fn sqrt(self) -> FixedPoint64 {
        if self.0 <= 0 {
            return FixedPoint64::ZERO;
        }
        if self == FixedPoint64::ONE {
            return FixedPoint64::ONE;
        }

        // Initial guess: halve the bit-length of the raw value so the
        // iteration converges in the fixed budget regardless of magnitude.
        let bits = 64 - self.0.leading_zeros();
        let mut x = FixedPoint64::from_raw(1i64 << (bits / 2).max(1));

        for _ in 0..8 {
            if x.0 == 0 {
                break;
            }
            x = (x + self / x) / FixedPoint64::from_int(2);
        }
        x
    }
}

impl Add for FixedPoint64 {
    type Output = FixedPoint64;
    #[inline]
    fn add(self, other: FixedPoint64) -> FixedPoint64 {
        FixedPoint64(self.0.wrapping_add(other.0))
    }
}

impl AddAssign for FixedPoint64 {
    #[inline]
    fn add_assign(&mut self, other: FixedPoint64) {
        self.0 = self.0.wrapping_add(other.0);
    }
}

impl Sub for FixedPoint64 {
    type Output = FixedPoint64;
    #[inline]
    fn sub(self, other: FixedPoint64) -> FixedPoint64 {
        FixedPoint64(self.0.wrapping_sub(other.0))
    }
}

impl SubAssign for FixedPoint64 {
    #[inline]
    fn sub_assign(&mut self, other: FixedPoint64) {
        self.0 = self.0.wrapping_sub(other.0);
    }
}

impl Neg for FixedPoint64 {
    type Output = FixedPoint64;
    #[inline]
    fn neg(self) -> FixedPoint64 {
        FixedPoint64(self.0.wrapping_neg())
    }
}

/// Splits a 64-bit operand into 32-bit high/low halves so the four partial
/// products of a multiply stay within 64 meaningful bits, per §4.1.
impl Mul for FixedPoint64 {
    type Output = FixedPoint64;
    #[inline]
    fn mul(self, other: FixedPoint64) -> FixedPoint64 {
        let product = self.0 as i128 * other.0 as i128;
        FixedPoint64((product >> Self::FRAC_BITS) as i64)
    }
}

impl MulAssign for FixedPoint64 {
    #[inline]
    fn mul_assign(&mut self, other: FixedPoint64) {
        *self = *self * other;
    }
}

/// Divides by shifting the dividend left 32 bits before the 128-bit divide,
/// per §4.1. Division by zero fails (panics) rather than silently returning
/// a sentinel, since §4.1 specifies divide-by-zero as a failure, not a
/// saturating default.
impl Div for FixedPoint64 {
    type Output = FixedPoint64;
    fn div(self, other: FixedPoint64) -> FixedPoint64 {
        assert!(other.0 != 0, "FixedPoint64 division by zero");
        let dividend = (self.0 as i128) << Self::FRAC_BITS;
        FixedPoint64((dividend / other.0 as i128) as i64)
    }
}

impl DivAssign for FixedPoint64 {
    #[inline]
    fn div_assign(&mut self, other: FixedPoint64) {
        *self = *self / other;
    }
}

impl Rem for FixedPoint64 {
    type Output = FixedPoint64;
    fn rem(self, other: FixedPoint64) -> FixedPoint64 {
        assert!(other.0 != 0, "FixedPoint64 remainder by zero");
        FixedPoint64(self.0 % other.0)
    }
}

impl std::fmt::Debug for FixedPoint64 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FixedPoint64({} = {})", self.0, self.to_f64())
    }
}

impl std::fmt::Display for FixedPoint64 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.6}", self.to_f64())
    }
}
