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

//! Amounts of each asset between two square root prices for a given liquidity, and the price
//! reached after adding or removing an amount of one asset.
//!
//! Rounding always favours the pool: amounts owed to the pool round up, amounts paid out round
//! down.

use sp_core::U256;

use crate::{
	cast, checked_mul_div_ceil, checked_mul_div_floor, div_rounding_up, mul_div_ceil,
	mul_div_floor, q96, Amount, Liquidity, MathError, SqrtPriceQ64F96, SQRT_PRICE_FRACTIONAL_BITS,
};

fn max_u160() -> U256 {
	(U256::one() << 160) - 1
}

fn sorted(a: SqrtPriceQ64F96, b: SqrtPriceQ64F96) -> (SqrtPriceQ64F96, SqrtPriceQ64F96) {
	if a > b {
		(b, a)
	} else {
		(a, b)
	}
}

/// `liquidity / sqrt(lower) - liquidity / sqrt(upper)`, the amount of asset 0 held by
/// `liquidity` between the two prices.
pub fn amount0_delta(
	sqrt_price_a: SqrtPriceQ64F96,
	sqrt_price_b: SqrtPriceQ64F96,
	liquidity: Liquidity,
	round_up: bool,
) -> Result<Amount, MathError> {
	let (lower, upper) = sorted(sqrt_price_a, sqrt_price_b);
	if lower.is_zero() {
		return Err(MathError::InvalidSqrtPrice)
	}

	let numerator_1 = U256::from(liquidity) << SQRT_PRICE_FRACTIONAL_BITS;
	let numerator_2 = upper - lower;

	// numerator_2 < upper, so the intermediate quotient is below numerator_1 and fits.
	Ok(if round_up {
		div_rounding_up(mul_div_ceil(numerator_1, numerator_2, upper), lower)
	} else {
		mul_div_floor(numerator_1, numerator_2, upper) / lower
	})
}

/// `liquidity * (sqrt(upper) - sqrt(lower))`, the amount of asset 1 held by `liquidity` between
/// the two prices.
pub fn amount1_delta(
	sqrt_price_a: SqrtPriceQ64F96,
	sqrt_price_b: SqrtPriceQ64F96,
	liquidity: Liquidity,
	round_up: bool,
) -> Amount {
	let (lower, upper) = sorted(sqrt_price_a, sqrt_price_b);
	// liquidity is 128 bits and the price difference 160 bits, so the result fits in 192 bits.
	if round_up {
		mul_div_ceil(U256::from(liquidity), upper - lower, q96())
	} else {
		mul_div_floor(U256::from(liquidity), upper - lower, q96())
	}
}

/// Signed asset 0 delta for a liquidity change. Adding liquidity (positive) yields a negative
/// amount rounded up in magnitude, i.e. owed to the pool.
pub fn signed_amount0_delta(
	sqrt_price_a: SqrtPriceQ64F96,
	sqrt_price_b: SqrtPriceQ64F96,
	liquidity: i128,
) -> Result<i128, MathError> {
	if liquidity < 0 {
		cast::to_i128(amount0_delta(sqrt_price_a, sqrt_price_b, liquidity.unsigned_abs(), false)?)
	} else {
		cast::to_i128(amount0_delta(sqrt_price_a, sqrt_price_b, liquidity as u128, true)?)
			.map(|amount| -amount)
	}
}

/// Signed asset 1 delta for a liquidity change, same sign convention as
/// `signed_amount0_delta`.
pub fn signed_amount1_delta(
	sqrt_price_a: SqrtPriceQ64F96,
	sqrt_price_b: SqrtPriceQ64F96,
	liquidity: i128,
) -> Result<i128, MathError> {
	if liquidity < 0 {
		cast::to_i128(amount1_delta(sqrt_price_a, sqrt_price_b, liquidity.unsigned_abs(), false))
	} else {
		cast::to_i128(amount1_delta(sqrt_price_a, sqrt_price_b, liquidity as u128, true))
			.map(|amount| -amount)
	}
}

/// Price after adding (`add`) or removing `amount` of asset 0, rounded up so the price moves
/// no further than the amount pays for.
pub fn next_sqrt_price_from_amount0_rounding_up(
	sqrt_price: SqrtPriceQ64F96,
	liquidity: Liquidity,
	amount: Amount,
	add: bool,
) -> Result<SqrtPriceQ64F96, MathError> {
	if amount.is_zero() {
		return Ok(sqrt_price)
	}
	let numerator_1 = U256::from(liquidity) << SQRT_PRICE_FRACTIONAL_BITS;

	if add {
		if let Some(product) = amount.checked_mul(sqrt_price) {
			if let Some(denominator) = numerator_1.checked_add(product) {
				// Always fits as the result is at most sqrt_price.
				return Ok(mul_div_ceil(numerator_1, sqrt_price, denominator))
			}
		}
		// Less precise form, only reached for amounts near the 256 bit limit.
		let denominator = (numerator_1 / sqrt_price).checked_add(amount).ok_or(crate::OVERFLOW)?;
		Ok(div_rounding_up(numerator_1, denominator))
	} else {
		let product = amount.checked_mul(sqrt_price).ok_or(MathError::PriceOverflow)?;
		if numerator_1 <= product {
			return Err(MathError::PriceOverflow)
		}
		let next = checked_mul_div_ceil(numerator_1, sqrt_price, numerator_1 - product)?;
		if next > max_u160() {
			return Err(MathError::PriceOverflow)
		}
		Ok(next)
	}
}

/// Price after adding (`add`) or removing `amount` of asset 1, rounded down.
pub fn next_sqrt_price_from_amount1_rounding_down(
	sqrt_price: SqrtPriceQ64F96,
	liquidity: Liquidity,
	amount: Amount,
	add: bool,
) -> Result<SqrtPriceQ64F96, MathError> {
	if liquidity == 0 {
		return Err(crate::DIVISION_BY_ZERO)
	}
	let liquidity = U256::from(liquidity);

	if add {
		let quotient = if amount <= max_u160() {
			(amount << SQRT_PRICE_FRACTIONAL_BITS) / liquidity
		} else {
			checked_mul_div_floor(amount, q96(), liquidity)?
		};
		let next = sqrt_price.checked_add(quotient).ok_or(MathError::PriceOverflow)?;
		if next > max_u160() {
			return Err(MathError::PriceOverflow)
		}
		Ok(next)
	} else {
		let quotient = if amount <= max_u160() {
			div_rounding_up(amount << SQRT_PRICE_FRACTIONAL_BITS, liquidity)
		} else {
			checked_mul_div_ceil(amount, q96(), liquidity)?
		};
		if sqrt_price <= quotient {
			return Err(MathError::NotEnoughLiquidity)
		}
		Ok(sqrt_price - quotient)
	}
}

/// Price after `amount_in` enters the pool in the given direction.
pub fn next_sqrt_price_from_input(
	sqrt_price: SqrtPriceQ64F96,
	liquidity: Liquidity,
	amount_in: Amount,
	zero_for_one: bool,
) -> Result<SqrtPriceQ64F96, MathError> {
	if sqrt_price.is_zero() {
		return Err(MathError::InvalidSqrtPrice)
	}
	if liquidity == 0 {
		return Err(MathError::NotEnoughLiquidity)
	}
	if zero_for_one {
		next_sqrt_price_from_amount0_rounding_up(sqrt_price, liquidity, amount_in, true)
	} else {
		next_sqrt_price_from_amount1_rounding_down(sqrt_price, liquidity, amount_in, true)
	}
}

/// Price after `amount_out` leaves the pool in the given direction.
pub fn next_sqrt_price_from_output(
	sqrt_price: SqrtPriceQ64F96,
	liquidity: Liquidity,
	amount_out: Amount,
	zero_for_one: bool,
) -> Result<SqrtPriceQ64F96, MathError> {
	if sqrt_price.is_zero() {
		return Err(MathError::InvalidSqrtPrice)
	}
	if liquidity == 0 {
		return Err(MathError::NotEnoughLiquidity)
	}
	if zero_for_one {
		next_sqrt_price_from_amount1_rounding_down(sqrt_price, liquidity, amount_out, false)
	} else {
		next_sqrt_price_from_amount0_rounding_up(sqrt_price, liquidity, amount_out, false)
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::tick_math::sqrt_price_at_tick;

	fn e18() -> U256 {
		U256::exp10(18)
	}

	/// sqrt(121/100) * 2^96
	fn sqrt_price_1_21() -> U256 {
		U256::from_dec_str("87150978765690771352898345369").unwrap()
	}

	#[test]
	fn amount0_delta_matches_known_values() {
		let liquidity = e18().low_u128();
		let rounded_up = amount0_delta(q96(), sqrt_price_1_21(), liquidity, true).unwrap();
		let rounded_down = amount0_delta(q96(), sqrt_price_1_21(), liquidity, false).unwrap();
		assert_eq!(rounded_up, U256::from_dec_str("90909090909090910").unwrap());
		assert_eq!(rounded_down, rounded_up - 1);
		assert_eq!(amount0_delta(q96(), q96(), liquidity, true).unwrap(), U256::zero());
		assert_eq!(
			amount0_delta(U256::zero(), q96(), liquidity, true),
			Err(MathError::InvalidSqrtPrice)
		);
	}

	#[test]
	fn amount1_delta_matches_known_values() {
		let liquidity = e18().low_u128();
		let rounded_up = amount1_delta(q96(), sqrt_price_1_21(), liquidity, true);
		let rounded_down = amount1_delta(q96(), sqrt_price_1_21(), liquidity, false);
		assert_eq!(rounded_up, U256::from_dec_str("100000000000000000").unwrap());
		assert_eq!(rounded_down, rounded_up - 1);
		// Argument order does not matter.
		assert_eq!(amount1_delta(sqrt_price_1_21(), q96(), liquidity, true), rounded_up);
	}

	#[test]
	fn signed_deltas_are_owed_when_adding_liquidity() {
		let (lower, upper) = (sqrt_price_at_tick(-60), sqrt_price_at_tick(60));
		let added = signed_amount0_delta(lower, upper, 1_000_000).unwrap();
		let removed = signed_amount0_delta(lower, upper, -1_000_000).unwrap();
		assert!(added < 0);
		assert!(removed > 0);
		// Rounding favours the pool, so the round trip never pays out more than was paid in.
		assert!(added + removed <= 0);
		assert!(
			signed_amount1_delta(lower, upper, 1_000_000).unwrap() +
				signed_amount1_delta(lower, upper, -1_000_000).unwrap() <=
				0
		);
	}

	#[test]
	fn next_price_from_input() {
		let liquidity = e18().low_u128();
		// 0.1 of asset 0 into a pool at price 1 with liquidity 1
		assert_eq!(
			next_sqrt_price_from_input(q96(), liquidity, e18() / 10, true).unwrap(),
			U256::from_dec_str("72025602285694852357767227579").unwrap()
		);
		// 0.1 of asset 1
		assert_eq!(
			next_sqrt_price_from_input(q96(), liquidity, e18() / 10, false).unwrap(),
			U256::from_dec_str("87150978765690771352898345369").unwrap()
		);
		// zero input leaves the price unchanged
		assert_eq!(next_sqrt_price_from_input(q96(), liquidity, U256::zero(), true).unwrap(), q96());
		assert_eq!(
			next_sqrt_price_from_input(q96(), 0, U256::one(), true),
			Err(MathError::NotEnoughLiquidity)
		);
	}

	#[test]
	fn next_price_from_output() {
		let liquidity = e18().low_u128();
		assert_eq!(
			next_sqrt_price_from_output(q96(), liquidity, e18() / 10, false).unwrap(),
			U256::from_dec_str("88031291682515930659493278152").unwrap()
		);
		assert_eq!(
			next_sqrt_price_from_output(q96(), liquidity, e18() / 10, true).unwrap(),
			U256::from_dec_str("71305346262837903834189555302").unwrap()
		);
		// Cannot take out all of asset 1
		assert_eq!(
			next_sqrt_price_from_output(q96(), 1, U256::from(1u128 << 100), true),
			Err(MathError::NotEnoughLiquidity)
		);
		// Cannot take out more asset 0 than the pool holds
		assert_eq!(
			next_sqrt_price_from_output(q96(), 1, U256::from(2u32), false),
			Err(MathError::PriceOverflow)
		);
	}
}
