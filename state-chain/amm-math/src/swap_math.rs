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

use sp_core::U256;

use crate::{
	checked_mul_div_ceil, fees::ONE_IN_PIPS, mul_div_floor, sqrt_price_math, Amount, Liquidity,
	MathError, SqrtPriceQ64F96,
};

/// The result of swapping within a single price range of constant liquidity.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SwapStep {
	pub sqrt_price_next: SqrtPriceQ64F96,
	/// Input, excluding the fee.
	pub amount_in: Amount,
	pub amount_out: Amount,
	pub fee_amount: Amount,
}

/// Swaps `amount_remaining` (negative for exact input, positive for exact output) against
/// `liquidity`, moving the price from `sqrt_price_current` at most to `sqrt_price_target`. The
/// direction is implied by the order of the two prices.
///
/// For exact input, `amount_in + fee_amount` never exceeds the remaining amount, and equals it
/// whenever the target is not reached.
pub fn compute_swap_step(
	sqrt_price_current: SqrtPriceQ64F96,
	sqrt_price_target: SqrtPriceQ64F96,
	liquidity: Liquidity,
	amount_remaining: i128,
	fee_pips: u32,
) -> Result<SwapStep, MathError> {
	let zero_for_one = sqrt_price_current >= sqrt_price_target;

	let amount_to_target_in = |to: SqrtPriceQ64F96| -> Result<Amount, MathError> {
		if zero_for_one {
			sqrt_price_math::amount0_delta(to, sqrt_price_current, liquidity, true)
		} else {
			Ok(sqrt_price_math::amount1_delta(sqrt_price_current, to, liquidity, true))
		}
	};
	let amount_to_target_out = |to: SqrtPriceQ64F96| -> Result<Amount, MathError> {
		if zero_for_one {
			Ok(sqrt_price_math::amount1_delta(to, sqrt_price_current, liquidity, false))
		} else {
			sqrt_price_math::amount0_delta(sqrt_price_current, to, liquidity, false)
		}
	};
	let fee_on = |amount_in: Amount| {
		checked_mul_div_ceil(amount_in, U256::from(fee_pips), U256::from(ONE_IN_PIPS - fee_pips))
	};

	if amount_remaining < 0 {
		let amount_remaining = U256::from(amount_remaining.unsigned_abs());
		let amount_remaining_less_fee = mul_div_floor(
			amount_remaining,
			U256::from(ONE_IN_PIPS - fee_pips),
			U256::from(ONE_IN_PIPS),
		);
		let amount_in = amount_to_target_in(sqrt_price_target)?;

		let (sqrt_price_next, amount_in, fee_amount) = if amount_remaining_less_fee >= amount_in {
			(
				sqrt_price_target,
				amount_in,
				if fee_pips == ONE_IN_PIPS { amount_in } else { fee_on(amount_in)? },
			)
		} else {
			(
				sqrt_price_math::next_sqrt_price_from_input(
					sqrt_price_current,
					liquidity,
					amount_remaining_less_fee,
					zero_for_one,
				)?,
				amount_remaining_less_fee,
				// The whole remainder is consumed.
				amount_remaining - amount_remaining_less_fee,
			)
		};

		Ok(SwapStep {
			sqrt_price_next,
			amount_in,
			amount_out: amount_to_target_out(sqrt_price_next)?,
			fee_amount,
		})
	} else {
		if fee_pips >= ONE_IN_PIPS {
			return Err(crate::DIVISION_BY_ZERO)
		}
		let amount_remaining = U256::from(amount_remaining as u128);
		let amount_out = amount_to_target_out(sqrt_price_target)?;

		let (sqrt_price_next, amount_out) = if amount_remaining >= amount_out {
			(sqrt_price_target, amount_out)
		} else {
			(
				sqrt_price_math::next_sqrt_price_from_output(
					sqrt_price_current,
					liquidity,
					amount_remaining,
					zero_for_one,
				)?,
				amount_remaining,
			)
		};

		let amount_in = amount_to_target_in(sqrt_price_next)?;
		Ok(SwapStep { sqrt_price_next, amount_in, amount_out, fee_amount: fee_on(amount_in)? })
	}
}
