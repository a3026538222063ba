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

//! Prices and per-bin amounts of the bin engine.
//!
//! The price of bin `id` is `(1 + bin_step / 10_000)^(id - 2^23)` as a Q128.128 number, so the
//! bin with id `ACTIVE_ID_PARITY` has price 1. A bin's price is the price of X in units of Y.

use sp_core::U256;

use crate::{
	cast, checked_mul_div_ceil, checked_mul_div_floor, fees, q128, MathError, PackedAmounts,
	Q128F128, OVERFLOW,
};

/// The bin whose price is exactly 1.
pub const ACTIVE_ID_PARITY: u32 = 1 << 23;
/// Bin ids are 24 bit.
pub const MAX_BIN_ID: u32 = (1 << 24) - 1;
pub const BASIS_POINT_MAX: u32 = 10_000;
pub const SCALE_OFFSET: u32 = 128;

/// `pow` is only defined for exponents below this magnitude.
const MAX_EXPONENT: u32 = 0x10_0000;

/// `1 + bin_step / 10_000` as Q128.128.
pub fn base(bin_step: u16) -> Q128F128 {
	q128() + (U256::from(bin_step) << SCALE_OFFSET) / U256::from(BASIS_POINT_MAX)
}

fn mul_shift_128(a: U256, b: U256) -> U256 {
	// One operand is at most 2^128 and the other below it at every call site, so the product
	// fits.
	(a * b) >> SCALE_OFFSET
}

/// `x^y` for a Q128.128 `x` by binary exponentiation.
///
/// Bases above 1 are inverted first so every intermediate stays below 2^128, and the result is
/// inverted back at the end.
pub fn pow(x: Q128F128, y: i32) -> Result<Q128F128, MathError> {
	if y == 0 {
		return Ok(q128())
	}

	let mut invert = y < 0;
	let abs_y = y.unsigned_abs();

	let mut result = U256::zero();
	if abs_y < MAX_EXPONENT {
		result = q128();
		let mut squared = x;
		if x > U256::from(u128::MAX) {
			squared = U256::MAX / squared;
			invert = !invert;
		}
		for bit in 0..20 {
			if abs_y & (1 << bit) != 0 {
				result = mul_shift_128(result, squared);
			}
			squared = mul_shift_128(squared, squared);
		}
	}

	if result.is_zero() {
		return Err(MathError::PowUnderflow)
	}

	Ok(if invert { U256::MAX / result } else { result })
}

/// The Q128.128 price of bin `id`.
pub fn price_from_id(id: u32, bin_step: u16) -> Result<Q128F128, MathError> {
	if id > MAX_BIN_ID {
		return Err(MathError::InvalidBinId)
	}
	pow(base(bin_step), id as i32 - ACTIVE_ID_PARITY as i32)
}

/// Base 2 logarithm of a non-zero Q128.128 value, as a signed Q64.64 number.
pub fn log2(x: Q128F128) -> Result<i128, MathError> {
	if x.is_zero() {
		return Err(crate::DIVISION_BY_ZERO)
	}

	let most_significant_bit = 255 - x.leading_zeros();
	let mut log = (most_significant_bit as i128 - SCALE_OFFSET as i128) << 64;

	// Mantissa in [2^127, 2^128), i.e. a Q1.127 number in [1, 2).
	let mut mantissa = if most_significant_bit >= 127 {
		x >> (most_significant_bit - 127)
	} else {
		x << (127 - most_significant_bit)
	}
	.low_u128();

	for bit in (0..64).rev() {
		let squared = (U256::from(mantissa) * U256::from(mantissa)) >> 127;
		mantissa = if squared.bit(128) {
			log |= 1i128 << bit;
			(squared >> 1).low_u128()
		} else {
			squared.low_u128()
		};
	}

	Ok(log)
}

/// The greatest bin id whose price is at most `price`.
pub fn id_from_price(price: Q128F128, bin_step: u16) -> Result<u32, MathError> {
	if bin_step == 0 {
		return Err(MathError::InvalidBinId)
	}
	let estimate = ACTIVE_ID_PARITY as i128 + log2(price)?.div_euclid(log2(base(bin_step))?);
	if !(0..=MAX_BIN_ID as i128).contains(&estimate) {
		return Err(MathError::InvalidBinId)
	}

	// The estimate is within one bin of the answer, correct it against the exact prices.
	let mut id = estimate as u32;
	for _ in 0..4 {
		if price_from_id(id, bin_step)? > price {
			id = id.checked_sub(1).ok_or(MathError::InvalidBinId)?;
			continue
		}
		match id.checked_add(1).filter(|next| *next <= MAX_BIN_ID) {
			Some(next) if price_from_id(next, bin_step).is_ok_and(|p| p <= price) => id = next,
			_ => return Ok(id),
		}
	}
	Err(MathError::InvalidBinId)
}

/// `price * x + (y << 128)`, the value of some amounts in units of Y, scaled by 2^128.
pub fn liquidity(amounts: PackedAmounts, price: Q128F128) -> Result<U256, MathError> {
	let x_value = price.checked_mul(U256::from(amounts.x)).ok_or(OVERFLOW)?;
	x_value.checked_add(U256::from(amounts.y) << SCALE_OFFSET).ok_or(OVERFLOW)
}

/// Shares minted for depositing `amounts_in` into a bin, and the part of `amounts_in` actually
/// used. Value above what the shares are worth is handed back, Y first.
pub fn shares_and_effective_amounts_in(
	bin_reserves: PackedAmounts,
	amounts_in: PackedAmounts,
	price: Q128F128,
	total_supply: U256,
) -> Result<(U256, PackedAmounts), MathError> {
	let user_liquidity = liquidity(amounts_in, price)?;
	if user_liquidity.is_zero() {
		return Ok((U256::zero(), PackedAmounts::ZERO))
	}

	let bin_liquidity = liquidity(bin_reserves, price)?;
	if bin_liquidity.is_zero() || total_supply.is_zero() {
		return Ok((user_liquidity, amounts_in))
	}

	let shares = checked_mul_div_floor(user_liquidity, total_supply, bin_liquidity)?;
	let effective_liquidity = checked_mul_div_ceil(shares, bin_liquidity, total_supply)?;

	let PackedAmounts { mut x, mut y } = amounts_in;
	if user_liquidity > effective_liquidity {
		let mut delta_liquidity = user_liquidity - effective_liquidity;

		if delta_liquidity >= q128() {
			let delta_y = cast::to_u128(delta_liquidity >> SCALE_OFFSET)?.min(y);
			y -= delta_y;
			delta_liquidity -= U256::from(delta_y) << SCALE_OFFSET;
		}

		if delta_liquidity >= price {
			let delta_x = cast::to_u128(delta_liquidity / price)?.min(x);
			x -= delta_x;
		}
	}

	Ok((shares, PackedAmounts { x, y }))
}

/// Amounts released by burning `amount_to_burn` of a bin's `total_supply` shares, rounded down.
pub fn amount_out_of_bin(
	bin_reserves: PackedAmounts,
	amount_to_burn: U256,
	total_supply: U256,
) -> Result<PackedAmounts, MathError> {
	let share_of = |reserve: u128| -> Result<u128, MathError> {
		cast::to_u128(checked_mul_div_floor(amount_to_burn, U256::from(reserve), total_supply)?)
	};
	Ok(PackedAmounts { x: share_of(bin_reserves.x)?, y: share_of(bin_reserves.y)? })
}

/// Converts an amount of the input asset into the output asset at `price`.
fn convert(
	amount: u128,
	price: Q128F128,
	swap_for_y: bool,
	round_up: bool,
) -> Result<u128, MathError> {
	let amount = U256::from(amount);
	let (numerator, denominator) = if swap_for_y { (price, q128()) } else { (q128(), price) };
	cast::to_u128(if round_up {
		checked_mul_div_ceil(amount, numerator, denominator)?
	} else {
		checked_mul_div_floor(amount, numerator, denominator)?
	})
}

/// The input needed to receive `amount_out`, rounded up.
fn input_for_output(
	amount_out: u128,
	price: Q128F128,
	swap_for_y: bool,
) -> Result<u128, MathError> {
	// Buying Y with X divides by the price, buying X with Y multiplies by it.
	convert(amount_out, price, !swap_for_y, true)
}

/// Amounts exchanged with a single bin.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct BinSwap {
	/// Input taken by the bin, including `fee`.
	pub amount_in_with_fees: u128,
	pub amount_out: u128,
	pub fee: u128,
}

/// Swaps up to `amount_in_left` (fee inclusive) against a bin's `reserve_out`.
pub fn amounts_out(
	reserve_out: u128,
	fee: u32,
	price: Q128F128,
	swap_for_y: bool,
	amount_in_left: u128,
) -> Result<BinSwap, MathError> {
	let max_amount_in = input_for_output(reserve_out, price, swap_for_y)?;
	let max_fee = fees::bin::fee_amount(max_amount_in, fee).ok_or(OVERFLOW)?;
	let max_amount_in_with_fees = max_amount_in.checked_add(max_fee).ok_or(OVERFLOW)?;

	if amount_in_left >= max_amount_in_with_fees {
		Ok(BinSwap {
			amount_in_with_fees: max_amount_in_with_fees,
			amount_out: reserve_out,
			fee: max_fee,
		})
	} else {
		let fee = fees::bin::fee_amount_from(amount_in_left, fee);
		let amount_out = convert(amount_in_left - fee, price, swap_for_y, false)?.min(reserve_out);
		Ok(BinSwap { amount_in_with_fees: amount_in_left, amount_out, fee })
	}
}

/// Takes up to `amount_out_left` from a bin's `reserve_out`, charging the fee on top.
pub fn amounts_in(
	reserve_out: u128,
	fee: u32,
	price: Q128F128,
	swap_for_y: bool,
	amount_out_left: u128,
) -> Result<BinSwap, MathError> {
	let amount_out = amount_out_left.min(reserve_out);
	let amount_in_without_fee = input_for_output(amount_out, price, swap_for_y)?;
	let fee = fees::bin::fee_amount(amount_in_without_fee, fee).ok_or(OVERFLOW)?;
	Ok(BinSwap {
		amount_in_with_fees: amount_in_without_fee.checked_add(fee).ok_or(OVERFLOW)?,
		amount_out,
		fee,
	})
}

#[cfg(test)]
mod test {
	use super::*;

	const E18: u128 = 1_000_000_000_000_000_000;

	#[test]
	fn parity_bin_has_price_one() {
		for bin_step in [1, 10, 25, 100] {
			assert_eq!(price_from_id(ACTIVE_ID_PARITY, bin_step), Ok(q128()));
		}
	}

	#[test]
	fn known_bin_prices() {
		let expected = |s: &str| U256::from_dec_str(s).unwrap();
		assert_eq!(
			price_from_id(ACTIVE_ID_PARITY + 1, 25),
			Ok(expected("341133072838240809622033043950347631984"))
		);
		assert_eq!(
			price_from_id(ACTIVE_ID_PARITY - 1, 25),
			Ok(expected("339433782464776522157979658286053078759"))
		);
		assert_eq!(
			price_from_id(ACTIVE_ID_PARITY + 100, 100),
			Ok(expected("920400451956044402369644152208374628459"))
		);
		assert_eq!(
			price_from_id(ACTIVE_ID_PARITY - 1, 100),
			Ok(expected("336913234575186597488489710328483377679"))
		);
	}

	#[test]
	fn extreme_bins_have_no_price() {
		assert_eq!(price_from_id(MAX_BIN_ID, 1), Err(MathError::PowUnderflow));
		assert_eq!(price_from_id(0, 100), Err(MathError::PowUnderflow));
		assert_eq!(price_from_id(MAX_BIN_ID + 1, 1), Err(MathError::InvalidBinId));
	}

	#[test]
	fn log2_of_powers_of_two() {
		assert_eq!(log2(q128()), Ok(0));
		assert_eq!(log2(q128() << 1), Ok(1 << 64));
		assert_eq!(log2(q128() >> 1), Ok(-(1 << 64)));
		assert_eq!(log2(U256::zero()), Err(crate::DIVISION_BY_ZERO));
	}

	#[test]
	fn id_from_price_inverts_price_from_id() {
		for bin_step in [1u16, 10, 25, 100] {
			for offset in [0i32, 1, -1, 500, -500, 8000, -8000] {
				let id = (ACTIVE_ID_PARITY as i32 + offset) as u32;
				let price = price_from_id(id, bin_step).unwrap();
				assert_eq!(id_from_price(price, bin_step), Ok(id));
				assert_eq!(id_from_price(price + 1, bin_step), Ok(id));
				assert_eq!(id_from_price(price - 1, bin_step), Ok(id - 1));
			}
		}
	}

	#[test]
	fn liquidity_values_both_sides_in_y() {
		let price = q128() * 2;
		assert_eq!(
			liquidity(PackedAmounts::new(3, 5), price),
			Ok(U256::from(11u32) << SCALE_OFFSET)
		);
		assert_eq!(liquidity(PackedAmounts::new(u128::MAX, 0), U256::MAX), Err(OVERFLOW));
	}

	#[test]
	fn first_deposit_mints_its_liquidity() {
		let (shares, effective) = shares_and_effective_amounts_in(
			PackedAmounts::ZERO,
			PackedAmounts::new(E18, E18),
			q128(),
			U256::zero(),
		)
		.unwrap();
		assert_eq!(shares, U256::from(2 * E18) << SCALE_OFFSET);
		assert_eq!(effective, PackedAmounts::new(E18, E18));
	}

	#[test]
	fn later_deposits_mint_proportionally() {
		let reserves = PackedAmounts::new(E18, E18);
		let supply = U256::from(2 * E18) << SCALE_OFFSET;
		let (shares, effective) = shares_and_effective_amounts_in(
			reserves,
			PackedAmounts::new(E18 / 2, E18 / 2),
			q128(),
			supply,
		)
		.unwrap();
		assert_eq!(shares, supply / 2);
		assert_eq!(effective, PackedAmounts::new(E18 / 2, E18 / 2));
	}

	#[test]
	fn excess_value_is_refunded_in_y_first() {
		// Three Y backing two shares, so each share is worth 1.5 Y.
		let reserves = PackedAmounts::new(0, 3);
		let supply = U256::from(2u32);

		let (shares, effective) =
			shares_and_effective_amounts_in(reserves, PackedAmounts::new(0, 4), q128(), supply)
				.unwrap();
		assert_eq!(shares, U256::from(2u32));
		assert_eq!(effective, PackedAmounts::new(0, 3));

		// Without Y to hand back, the excess comes out of X.
		let (shares, effective) =
			shares_and_effective_amounts_in(reserves, PackedAmounts::new(4, 0), q128(), supply)
				.unwrap();
		assert_eq!(shares, U256::from(2u32));
		assert_eq!(effective, PackedAmounts::new(3, 0));

		// Less than one unit of excess is kept by the bin.
		let (shares, effective) =
			shares_and_effective_amounts_in(reserves, PackedAmounts::new(0, 2), q128(), supply)
				.unwrap();
		assert_eq!(shares, U256::one());
		assert_eq!(effective, PackedAmounts::new(0, 2));
	}

	#[test]
	fn burn_releases_proportional_reserves() {
		let out = amount_out_of_bin(PackedAmounts::new(100, 7), U256::from(1u32), U256::from(2u32))
			.unwrap();
		assert_eq!(out, PackedAmounts::new(50, 3));
		assert!(amount_out_of_bin(PackedAmounts::new(1, 1), U256::one(), U256::zero()).is_err());
	}

	#[test]
	fn single_bin_exact_input_deducts_fee() {
		let swap = amounts_out(E18, 3000, q128(), true, E18).unwrap();
		assert_eq!(swap.amount_in_with_fees, E18);
		assert_eq!(swap.fee, 3_000_000_000_000_000);
		assert_eq!(swap.amount_out, 997_000_000_000_000_000);
	}

	#[test]
	fn exact_input_drains_bin_when_enough_is_paid() {
		let swap = amounts_out(1_000, 3000, q128(), false, 10_000).unwrap();
		assert_eq!(swap.amount_out, 1_000);
		assert_eq!(swap.amount_in_with_fees, 1_000 + 4);
		assert_eq!(swap.fee, 4);
	}

	#[test]
	fn exact_output_adds_fee_on_top() {
		let swap = amounts_in(E18, 3000, q128(), true, 997_000_000_000_000_000).unwrap();
		assert_eq!(swap.amount_out, 997_000_000_000_000_000);
		assert_eq!(swap.fee, 3_000_000_000_000_000);
		assert_eq!(swap.amount_in_with_fees, E18);
		// Never more than the reserve
		assert_eq!(amounts_in(10, 0, q128(), true, 20).unwrap().amount_out, 10);
	}
}
