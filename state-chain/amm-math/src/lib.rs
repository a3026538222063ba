// Copyright 2025 Chainflip Labs GmbH
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

//! Fixed-point and fee kernels used by both pricing engines.
//!
//! Everything in this crate is a pure function over wide integers. Square-root prices are
//! Q64.96 values, bin prices and fee-growth accumulators are Q128.128 values, and every
//! multiply-then-divide goes through a 512-bit intermediate.

#![cfg_attr(not(feature = "std"), no_std)]

use codec::{Decode, Encode, MaxEncodedLen};
use scale_info::TypeInfo;
pub use sp_arithmetic::ArithmeticError;
use sp_core::{U256, U512};

pub mod bin_math;
pub mod cast;
pub mod fees;
pub mod packed;
pub mod sqrt_price_math;
pub mod swap_math;
pub mod tick_math;

pub use packed::PackedAmounts;
pub use tick_math::{
	sqrt_price_at_tick, tick_at_sqrt_price, MAX_SQRT_PRICE, MAX_TICK, MIN_SQRT_PRICE, MIN_TICK,
};

/// A discrete price coordinate of the tick engine. `sqrt_price_at_tick(t) = 1.0001^(t/2)`.
pub type Tick = i32;

/// The square root of a price, as a Q64.96 fixed point number.
pub type SqrtPriceQ64F96 = U256;

/// A Q128.128 fixed point number, used for fee growth accumulators and bin prices.
pub type Q128F128 = U256;

/// Liquidity of a position, a tick, or of the currently active range.
pub type Liquidity = u128;

pub type Amount = U256;

pub const SQRT_PRICE_FRACTIONAL_BITS: u32 = 96;
pub const Q128_FRACTIONAL_BITS: u32 = 128;

/// 2^96
pub fn q96() -> U256 {
	U256::one() << SQRT_PRICE_FRACTIONAL_BITS
}

/// 2^128
pub fn q128() -> U256 {
	U256::one() << Q128_FRACTIONAL_BITS
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Encode, Decode, TypeInfo, MaxEncodedLen)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum MathError {
	/// Overflow, underflow or division by zero in a primitive operation.
	#[cfg_attr(feature = "std", error("Arithmetic error: {0:?}"))]
	Arithmetic(ArithmeticError),
	/// A narrowing conversion would lose information.
	#[cfg_attr(feature = "std", error("Value does not fit in the target type"))]
	CastOverflow,
	/// Removing the requested amount would move the price below zero.
	#[cfg_attr(feature = "std", error("Not enough liquidity to remove the requested amount"))]
	NotEnoughLiquidity,
	/// A computed square root price does not fit in 160 bits.
	#[cfg_attr(feature = "std", error("Square root price overflow"))]
	PriceOverflow,
	#[cfg_attr(feature = "std", error("Tick out of range"))]
	InvalidTick,
	#[cfg_attr(feature = "std", error("Square root price out of range"))]
	InvalidSqrtPrice,
	#[cfg_attr(feature = "std", error("Bin id out of range"))]
	InvalidBinId,
	/// A bin price underflowed to zero.
	#[cfg_attr(feature = "std", error("Power underflow"))]
	PowUnderflow,
}

impl From<ArithmeticError> for MathError {
	fn from(error: ArithmeticError) -> Self {
		MathError::Arithmetic(error)
	}
}

pub const OVERFLOW: MathError = MathError::Arithmetic(ArithmeticError::Overflow);
pub const UNDERFLOW: MathError = MathError::Arithmetic(ArithmeticError::Underflow);
pub const DIVISION_BY_ZERO: MathError = MathError::Arithmetic(ArithmeticError::DivisionByZero);

/// Computes `floor(a * b / c)`.
///
/// Panics if the result does not fit in 256 bits or `c` is zero. Only use this where the bounds
/// of the inputs guarantee neither can happen, otherwise use `checked_mul_div_floor`.
pub fn mul_div_floor<C: Into<U512>>(a: U256, b: U256, c: C) -> U256 {
	let c: U512 = c.into();
	(U256::full_mul(a, b) / c).try_into().unwrap()
}

/// Computes `ceil(a * b / c)`. Same panic conditions as `mul_div_floor`.
pub fn mul_div_ceil<C: Into<U512>>(a: U256, b: U256, c: C) -> U256 {
	mul_div(a, b, c).1
}

/// Returns `(floor(a * b / c), ceil(a * b / c))`.
pub fn mul_div<C: Into<U512>>(a: U256, b: U256, c: C) -> (U256, U256) {
	let c: U512 = c.into();

	let (d, m) = U512::div_mod(U256::full_mul(a, b), c);

	(
		d.try_into().unwrap(),
		if m > U512::zero() {
			// for m > 0, c must be > 1, so d + 1 <= a * b cannot overflow
			d + 1
		} else {
			d
		}
		.try_into()
		.unwrap(),
	)
}

pub fn checked_mul_div_floor<C: Into<U512>>(a: U256, b: U256, c: C) -> Result<U256, MathError> {
	let c: U512 = c.into();
	if c.is_zero() {
		return Err(DIVISION_BY_ZERO)
	}
	(U256::full_mul(a, b) / c).try_into().map_err(|_| OVERFLOW)
}

pub fn checked_mul_div_ceil<C: Into<U512>>(a: U256, b: U256, c: C) -> Result<U256, MathError> {
	let c: U512 = c.into();
	if c.is_zero() {
		return Err(DIVISION_BY_ZERO)
	}
	let (d, m) = U512::div_mod(U256::full_mul(a, b), c);
	let d = if m.is_zero() { d } else { d + 1 };
	d.try_into().map_err(|_| OVERFLOW)
}

/// `ceil(a / b)`. Panics if `b` is zero.
pub fn div_rounding_up(a: U256, b: U256) -> U256 {
	let (d, m) = a.div_mod(b);
	if m.is_zero() {
		d
	} else {
		d + 1
	}
}
