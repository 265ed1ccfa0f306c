// crates/annex-flywheel/src/exp.rs
//
// Deterministic scaled-integer arithmetic.
//
// Two scales are in use:
//   - Exp:    value * 10^18 (rates, token amounts)
//   - Double: value * 10^36 (reward indices)
//
// Indices use the larger scale so that dividing an emitted amount by a
// total-supply mantissa keeps its precision. Every operation truncates toward
// zero and fails instead of wrapping, so the sum of what is paid out can never
// exceed what was emitted.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uint::construct_uint;

use crate::error::FlywheelError;

construct_uint! {
    /// 256-bit unsigned integer.
    pub struct U256(4);
}

/// 10^18 as a plain integer. One whole ANN in its smallest unit.
pub const EXP_SCALE: u128 = 1_000_000_000_000_000_000;

/// 10^18 as a `U256`.
pub fn exp_scale() -> U256 {
    U256::from(EXP_SCALE)
}

/// 10^36 as a `U256`.
pub fn double_scale() -> U256 {
    U256::from(EXP_SCALE) * U256::from(EXP_SCALE)
}

pub fn checked_add(a: U256, b: U256, what: &'static str) -> Result<U256, FlywheelError> {
    a.checked_add(b).ok_or(FlywheelError::ArithmeticOverflow(what))
}

pub fn checked_sub(a: U256, b: U256, what: &'static str) -> Result<U256, FlywheelError> {
    a.checked_sub(b).ok_or(FlywheelError::ArithmeticUnderflow(what))
}

pub fn checked_mul(a: U256, b: U256, what: &'static str) -> Result<U256, FlywheelError> {
    a.checked_mul(b).ok_or(FlywheelError::ArithmeticOverflow(what))
}

/// Truncating division. Fails with `DivisionByZero` when `b == 0`.
pub fn div(a: U256, b: U256) -> Result<U256, FlywheelError> {
    if b.is_zero() {
        return Err(FlywheelError::DivisionByZero);
    }
    Ok(a / b)
}

/// Multiply two scaled values and drop one 10^18 factor.
///
/// For `a` at scale 1eX and `b` at scale 1eY the result is at 1e(X+Y-18).
pub fn mul_scaled(a: U256, b: U256) -> Result<U256, FlywheelError> {
    let product = checked_mul(a, b, "mul_scaled")?;
    div(product, exp_scale())
}

/// Narrow a `U256` into a `u128` token amount.
pub fn to_amount(value: U256, what: &'static str) -> Result<u128, FlywheelError> {
    if value > U256::from(u128::MAX) {
        return Err(FlywheelError::ArithmeticOverflow(what));
    }
    Ok(value.low_u128())
}

/// `amount * index / 1e36`, truncated: the token amount earned by `amount`
/// units of activity over an index delta.
pub fn mul_amount_by_double(amount: u128, index: Double) -> Result<u128, FlywheelError> {
    let product = checked_mul(U256::from(amount), index.mantissa, "amount * index")?;
    to_amount(div(product, double_scale())?, "amount * index")
}

/// A value scaled by 10^18.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Exp {
    mantissa: U256,
}

impl Exp {
    pub fn from_mantissa(mantissa: impl Into<U256>) -> Self {
        Self {
            mantissa: mantissa.into(),
        }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    pub fn one() -> Self {
        Self {
            mantissa: exp_scale(),
        }
    }

    pub fn mantissa(&self) -> U256 {
        self.mantissa
    }

    pub fn is_zero(&self) -> bool {
        self.mantissa.is_zero()
    }

    /// `self * scalar`, staying at scale 1e18 (e.g. rate per block times
    /// elapsed blocks gives the amount emitted).
    pub fn mul_scalar(&self, scalar: u64) -> Result<U256, FlywheelError> {
        checked_mul(self.mantissa, U256::from(scalar), "exp * scalar")
    }

    pub fn mul_scaled(&self, other: Exp) -> Result<Exp, FlywheelError> {
        Ok(Exp::from_mantissa(mul_scaled(self.mantissa, other.mantissa)?))
    }

    /// Whole units, truncated.
    pub fn truncate(&self) -> U256 {
        self.mantissa / exp_scale()
    }

    /// Re-express at scale 1e36. Exact.
    pub fn to_double(&self) -> Result<Double, FlywheelError> {
        Ok(Double::from_mantissa(checked_mul(
            self.mantissa,
            exp_scale(),
            "exp to double",
        )?))
    }
}

/// A value scaled by 10^36. Reward indices are always `Double`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Double {
    mantissa: U256,
}

impl Double {
    pub fn from_mantissa(mantissa: impl Into<U256>) -> Self {
        Self {
            mantissa: mantissa.into(),
        }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    /// 1.0 at scale 1e36; the index every market starts from.
    pub fn one() -> Self {
        Self {
            mantissa: double_scale(),
        }
    }

    pub fn mantissa(&self) -> U256 {
        self.mantissa
    }

    pub fn is_zero(&self) -> bool {
        self.mantissa.is_zero()
    }

    /// `numerator * 1e36 / denominator`. The up-scale happens before the
    /// division.
    pub fn fraction(numerator: U256, denominator: U256) -> Result<Double, FlywheelError> {
        let scaled = checked_mul(numerator, double_scale(), "fraction numerator")?;
        Ok(Double::from_mantissa(div(scaled, denominator)?))
    }

    pub fn checked_add(&self, other: Double) -> Result<Double, FlywheelError> {
        Ok(Double::from_mantissa(checked_add(
            self.mantissa,
            other.mantissa,
            "index addition",
        )?))
    }

    pub fn checked_sub(&self, other: Double) -> Result<Double, FlywheelError> {
        Ok(Double::from_mantissa(checked_sub(
            self.mantissa,
            other.mantissa,
            "index subtraction",
        )?))
    }

    /// Scale a `Double` by an `Exp`, staying at scale 1e36.
    pub fn mul_exp(&self, other: Exp) -> Result<Double, FlywheelError> {
        Ok(Double::from_mantissa(mul_scaled(
            self.mantissa,
            other.mantissa(),
        )?))
    }

    /// Re-express at scale 1e18, truncating the low 18 digits.
    pub fn to_exp(&self) -> Exp {
        Exp::from_mantissa(self.mantissa / exp_scale())
    }
}

impl fmt::Display for Exp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mantissa)
    }
}

impl fmt::Display for Double {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mantissa)
    }
}

/// Decimal-string serde for 256-bit mantissas. JSON numbers cannot carry
/// values this large without loss.
pub mod u256_dec {
    use super::U256;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let s = String::deserialize(deserializer)?;
        U256::from_dec_str(&s).map_err(|e| serde::de::Error::custom(format!("{:?}", e)))
    }
}

impl Serialize for Exp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        u256_dec::serialize(&self.mantissa, serializer)
    }
}

impl<'de> Deserialize<'de> for Exp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Exp::from_mantissa(u256_dec::deserialize(deserializer)?))
    }
}

impl Serialize for Double {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        u256_dec::serialize(&self.mantissa, serializer)
    }
}

impl<'de> Deserialize<'de> for Double {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Double::from_mantissa(u256_dec::deserialize(deserializer)?))
    }
}
