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

//! The concentrated liquidity engine. Liquidity is provided over ranges of ticks and the price
//! moves continuously along `sqrt(1.0001^tick)`.


use serde::{Deserialize, Serialize};
use sp_std::{collections::btree_map::BTreeMap, vec::Vec};

use codec::{Decode, Encode, MaxEncodedLen};
use scale_info::TypeInfo;
use sp_core::U256;

use amm_math::{
	cast, checked_mul_div_floor,
	fees::{lp_fee, protocol_fee, FeeError, ONE_IN_PIPS},
	q128, sqrt_price_math,
	swap_math::compute_swap_step,
	tick_math::{checked_tick_at_sqrt_price, sqrt_price_at_tick},
	Liquidity, MathError, SqrtPriceQ64F96, Tick, MAX_SQRT_PRICE, MAX_TICK, MIN_SQRT_PRICE,
	MIN_TICK, OVERFLOW,
};

use crate::{
	common::{BalanceDelta, CurrencyMap, OneToZero, Salt, Side, ZeroToOne},
	tick_bitmap::{TickBitmap, TickMisaligned},
};

pub type FeeGrowthQ128F128 = U256;

/// The maximum gross liquidity that may reference a single tick. Bounding every tick this way
/// keeps the pool's total liquidity within `Liquidity` however many ticks are in use.
pub fn max_liquidity_per_tick(tick_spacing: Tick) -> Liquidity {
	let min_tick = MIN_TICK.div_euclid(tick_spacing);
	let max_tick = MAX_TICK / tick_spacing;
	let num_ticks = (max_tick - min_tick + 1) as u128;
	Liquidity::MAX / num_ticks
}

fn wrapping_sub(a: U256, b: U256) -> U256 {
	a.overflowing_sub(b).0
}

fn wrapping_add(a: U256, b: U256) -> U256 {
	a.overflowing_add(b).0
}

/// The price marker and fee rates, always written together.
#[derive(
	Copy,
	Clone,
	Debug,
	Default,
	PartialEq,
	Eq,
	TypeInfo,
	Encode,
	Decode,
	MaxEncodedLen,
	Serialize,
	Deserialize,
)]
pub struct Slot0 {
	/// Zero until the pool is initialized.
	pub sqrt_price: SqrtPriceQ64F96,
	/// The greatest tick whose price is at or below `sqrt_price`, except immediately after a
	/// zero-for-one swap stops exactly on a tick, where it is one less.
	pub tick: Tick,
	pub protocol_fee: u32,
	pub lp_fee: u32,
}

#[derive(
	Clone,
	Debug,
	Default,
	PartialEq,
	Eq,
	TypeInfo,
	Encode,
	Decode,
	MaxEncodedLen,
	Serialize,
	Deserialize,
)]
pub struct TickInfo {
	/// The sum of the liquidity of all positions that start or end at this tick. This is the
	/// value `max_liquidity_per_tick` applies to.
	pub liquidity_gross: Liquidity,
	/// The change in active liquidity when the price moves up across this tick.
	pub liquidity_net: i128,
	/// Fee growth per unit of liquidity on the other side of this tick from the current price.
	/// It only changes when the price crosses the tick.
	pub fee_growth_outside: CurrencyMap<FeeGrowthQ128F128>,
}

#[derive(
	Clone,
	Debug,
	Default,
	PartialEq,
	Eq,
	TypeInfo,
	Encode,
	Decode,
	MaxEncodedLen,
	Serialize,
	Deserialize,
)]
pub struct Position {
	pub liquidity: Liquidity,
	pub fee_growth_inside_last: CurrencyMap<FeeGrowthQ128F128>,
}

#[derive(Clone, Debug, PartialEq, Eq, TypeInfo, Encode, Decode, Serialize, Deserialize)]
pub struct PoolState<LiquidityProvider: Ord> {
	slot0: Slot0,
	fee_growth_global: CurrencyMap<FeeGrowthQ128F128>,
	/// The liquidity active at the current price.
	liquidity: Liquidity,
	/// Every tick with non-zero gross liquidity.
	ticks: BTreeMap<Tick, TickInfo>,
	tick_bitmap: TickBitmap,
	positions: BTreeMap<(LiquidityProvider, Tick, Tick, Salt), Position>,
}

impl<LiquidityProvider: Ord> Default for PoolState<LiquidityProvider> {
	fn default() -> Self {
		Self {
			slot0: Default::default(),
			fee_growth_global: Default::default(),
			liquidity: 0,
			ticks: Default::default(),
			tick_bitmap: Default::default(),
			positions: Default::default(),
		}
	}
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ModifyLiquidityParams {
	pub tick_lower: Tick,
	pub tick_upper: Tick,
	pub liquidity_delta: i128,
	pub salt: Salt,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SwapParams {
	pub zero_for_one: bool,
	/// Negative for exact input, positive for exact output.
	pub amount_specified: i128,
	pub sqrt_price_limit: SqrtPriceQ64F96,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SwapOutcome {
	/// The swapper's delta, fees included.
	pub delta: BalanceDelta,
	/// The part of the input owed to the protocol.
	pub amount_to_protocol: u128,
	/// The combined protocol and LP rate the swap was charged at.
	pub swap_fee: u32,
	pub sqrt_price: SqrtPriceQ64F96,
	pub tick: Tick,
	pub liquidity: Liquidity,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum InitializeError {
	#[cfg_attr(feature = "std", error("Pool is already initialized"))]
	AlreadyInitialized,
	#[cfg_attr(feature = "std", error("Initial price is out of range"))]
	InvalidSqrtPrice,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum ModifyLiquidityError {
	#[cfg_attr(feature = "std", error("Pool is not initialized"))]
	PoolNotInitialized,
	#[cfg_attr(feature = "std", error("Lower tick {0} must be below upper tick {1}"))]
	TicksMisordered(Tick, Tick),
	#[cfg_attr(feature = "std", error("Lower tick {0} is below the minimum tick"))]
	TickLowerOutOfBounds(Tick),
	#[cfg_attr(feature = "std", error("Upper tick {0} is above the maximum tick"))]
	TickUpperOutOfBounds(Tick),
	#[cfg_attr(feature = "std", error("{0}"))]
	TickMisaligned(TickMisaligned),
	/// The gross liquidity referencing the tick would exceed `max_liquidity_per_tick`.
	#[cfg_attr(feature = "std", error("Tick {0} would hold too much liquidity"))]
	TickLiquidityOverflow(Tick),
	#[cfg_attr(feature = "std", error("Cannot poke a position with no liquidity"))]
	CannotUpdateEmptyPosition,
	#[cfg_attr(feature = "std", error("{0}"))]
	Math(MathError),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum SwapError {
	#[cfg_attr(feature = "std", error("Pool is not initialized"))]
	PoolNotInitialized,
	#[cfg_attr(feature = "std", error("Swap amount cannot be zero"))]
	SwapAmountCannotBeZero,
	/// The limit is not beyond the current price in the direction of the swap.
	#[cfg_attr(feature = "std", error("Price limit {limit} is already exceeded by {current}"))]
	PriceLimitAlreadyExceeded { current: SqrtPriceQ64F96, limit: SqrtPriceQ64F96 },
	#[cfg_attr(feature = "std", error("Price limit {0} is out of bounds"))]
	PriceLimitOutOfBounds(SqrtPriceQ64F96),
	/// A 100% fee consumes the whole input, so no output can be guaranteed.
	#[cfg_attr(feature = "std", error("Exact output swaps are impossible with a 100% fee"))]
	InvalidFeeForExactOut,
	#[cfg_attr(feature = "std", error("{0}"))]
	InvalidLpFeeOverride(FeeError),
	#[cfg_attr(feature = "std", error("{0}"))]
	Math(MathError),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum DonateError {
	#[cfg_attr(feature = "std", error("Pool is not initialized"))]
	PoolNotInitialized,
	#[cfg_attr(feature = "std", error("There is no active liquidity to receive the donation"))]
	NoLiquidityToReceiveFees,
	#[cfg_attr(feature = "std", error("{0}"))]
	Math(MathError),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum SetFeeError {
	#[cfg_attr(feature = "std", error("Pool is not initialized"))]
	PoolNotInitialized,
}

impl From<MathError> for ModifyLiquidityError {
	fn from(error: MathError) -> Self {
		ModifyLiquidityError::Math(error)
	}
}
impl From<MathError> for SwapError {
	fn from(error: MathError) -> Self {
		SwapError::Math(error)
	}
}
impl From<MathError> for DonateError {
	fn from(error: MathError) -> Self {
		DonateError::Math(error)
	}
}

trait SwapDirection: crate::common::SwapDirection {
	/// Checks the limit lies strictly beyond the current price and inside the price range.
	fn validate_price_limit(
		current: SqrtPriceQ64F96,
		limit: SqrtPriceQ64F96,
	) -> Result<(), SwapError>;

	/// For a given tick calculates the change in current liquidity when that tick is crossed
	fn liquidity_delta_on_crossing_tick(tick_info: &TickInfo) -> i128;

	/// The current tick is always the closest tick less than the current sqrt_price
	fn current_tick_after_crossing_tick(tick: Tick) -> Tick;
}

impl SwapDirection for ZeroToOne {
	fn validate_price_limit(
		current: SqrtPriceQ64F96,
		limit: SqrtPriceQ64F96,
	) -> Result<(), SwapError> {
		if limit >= current {
			Err(SwapError::PriceLimitAlreadyExceeded { current, limit })
		} else if limit <= MIN_SQRT_PRICE {
			Err(SwapError::PriceLimitOutOfBounds(limit))
		} else {
			Ok(())
		}
	}

	fn liquidity_delta_on_crossing_tick(tick_info: &TickInfo) -> i128 {
		// liquidity_net is never i128::MIN as it is bounded by max_liquidity_per_tick.
		-tick_info.liquidity_net
	}

	fn current_tick_after_crossing_tick(tick: Tick) -> Tick {
		tick - 1
	}
}

impl SwapDirection for OneToZero {
	fn validate_price_limit(
		current: SqrtPriceQ64F96,
		limit: SqrtPriceQ64F96,
	) -> Result<(), SwapError> {
		if limit <= current {
			Err(SwapError::PriceLimitAlreadyExceeded { current, limit })
		} else if limit >= MAX_SQRT_PRICE {
			Err(SwapError::PriceLimitOutOfBounds(limit))
		} else {
			Ok(())
		}
	}

	fn liquidity_delta_on_crossing_tick(tick_info: &TickInfo) -> i128 {
		tick_info.liquidity_net
	}

	fn current_tick_after_crossing_tick(tick: Tick) -> Tick {
		tick
	}
}

fn add_liquidity_delta(liquidity: Liquidity, delta: i128) -> Result<Liquidity, MathError> {
	if delta < 0 {
		liquidity.checked_sub(delta.unsigned_abs()).ok_or(MathError::NotEnoughLiquidity)
	} else {
		liquidity.checked_add(delta as u128).ok_or(OVERFLOW)
	}
}

impl<LiquidityProvider: Clone + Ord> PoolState<LiquidityProvider> {
	pub fn new() -> Self {
		Default::default()
	}

	pub fn is_initialized(&self) -> bool {
		!self.slot0.sqrt_price.is_zero()
	}

	/// Sets the starting price and fees, and returns the starting tick.
	///
	/// This function never panics
	///
	/// If this function returns an `Err(_)` no state changes have occurred
	pub fn initialize(
		&mut self,
		sqrt_price: SqrtPriceQ64F96,
		protocol_fee: u32,
		lp_fee: u32,
	) -> Result<Tick, InitializeError> {
		if self.is_initialized() {
			return Err(InitializeError::AlreadyInitialized)
		}
		let tick =
			checked_tick_at_sqrt_price(sqrt_price).map_err(|_| InitializeError::InvalidSqrtPrice)?;
		self.slot0 = Slot0 { sqrt_price, tick, protocol_fee, lp_fee };
		Ok(tick)
	}

	pub fn set_protocol_fee(&mut self, protocol_fee: u32) -> Result<(), SetFeeError> {
		if !self.is_initialized() {
			return Err(SetFeeError::PoolNotInitialized)
		}
		self.slot0.protocol_fee = protocol_fee;
		Ok(())
	}

	pub fn set_lp_fee(&mut self, lp_fee: u32) -> Result<(), SetFeeError> {
		if !self.is_initialized() {
			return Err(SetFeeError::PoolNotInitialized)
		}
		self.slot0.lp_fee = lp_fee;
		Ok(())
	}

	/// Fee growth per unit of liquidity inside `[tick_lower, tick_upper)` over all time. Only
	/// differences between two readings are meaningful, as the value wraps.
	pub fn fee_growth_inside(
		&self,
		tick_lower: Tick,
		tick_upper: Tick,
	) -> CurrencyMap<FeeGrowthQ128F128> {
		let default_info = TickInfo::default();
		let lower = self.ticks.get(&tick_lower).unwrap_or(&default_info);
		let upper = self.ticks.get(&tick_upper).unwrap_or(&default_info);
		self.fee_growth_inside_with(tick_lower, lower, tick_upper, upper)
	}

	fn fee_growth_inside_with(
		&self,
		tick_lower: Tick,
		lower: &TickInfo,
		tick_upper: Tick,
		upper: &TickInfo,
	) -> CurrencyMap<FeeGrowthQ128F128> {
		let current_tick = self.slot0.tick;
		self.fee_growth_global.map(|side, global| {
			let (lower_outside, upper_outside) =
				(lower.fee_growth_outside[side], upper.fee_growth_outside[side]);
			if current_tick < tick_lower {
				wrapping_sub(lower_outside, upper_outside)
			} else if current_tick >= tick_upper {
				wrapping_sub(upper_outside, lower_outside)
			} else {
				wrapping_sub(wrapping_sub(global, lower_outside), upper_outside)
			}
		})
	}

	/// The tick's state after adding `liquidity_delta` to the range it bounds, and whether its
	/// gross liquidity moved to or from zero.
	fn updated_tick(
		&self,
		tick: Tick,
		liquidity_delta: i128,
		upper: bool,
	) -> Result<(TickInfo, bool), MathError> {
		let mut info = match self.ticks.get(&tick) {
			Some(info) => info.clone(),
			None => TickInfo {
				// By convention all growth before a tick was initialized happened below it.
				fee_growth_outside: if tick <= self.slot0.tick {
					self.fee_growth_global
				} else {
					Default::default()
				},
				..Default::default()
			},
		};
		let gross_before = info.liquidity_gross;
		info.liquidity_gross = add_liquidity_delta(gross_before, liquidity_delta)?;
		let flipped = (info.liquidity_gross == 0) != (gross_before == 0);
		info.liquidity_net = if upper {
			info.liquidity_net.checked_sub(liquidity_delta)
		} else {
			info.liquidity_net.checked_add(liquidity_delta)
		}
		.ok_or(OVERFLOW)?;
		Ok((info, flipped))
	}

	/// Adds or removes liquidity of the position `(owner, tick_lower, tick_upper, salt)` and
	/// collects the fees it has earned since it was last touched. A `liquidity_delta` of zero only
	/// collects fees. Returns the principal delta and the fee delta separately, both from the
	/// owner's point of view (negative is owed to the pool).
	///
	/// This function never panics
	///
	/// If this function returns an `Err(_)` no state changes have occurred
	pub fn modify_liquidity(
		&mut self,
		owner: &LiquidityProvider,
		params: &ModifyLiquidityParams,
		tick_spacing: Tick,
	) -> Result<(BalanceDelta, BalanceDelta), ModifyLiquidityError> {
		let ModifyLiquidityParams { tick_lower, tick_upper, liquidity_delta, salt } = *params;

		if !self.is_initialized() {
			return Err(ModifyLiquidityError::PoolNotInitialized)
		}
		if tick_lower >= tick_upper {
			return Err(ModifyLiquidityError::TicksMisordered(tick_lower, tick_upper))
		}
		if tick_lower < MIN_TICK {
			return Err(ModifyLiquidityError::TickLowerOutOfBounds(tick_lower))
		}
		if tick_upper > MAX_TICK {
			return Err(ModifyLiquidityError::TickUpperOutOfBounds(tick_upper))
		}
		for tick in [tick_lower, tick_upper] {
			if tick % tick_spacing != 0 {
				return Err(ModifyLiquidityError::TickMisaligned(TickMisaligned {
					tick,
					tick_spacing,
				}))
			}
		}

		let position_key = (owner.clone(), tick_lower, tick_upper, salt);
		let mut position = self.positions.get(&position_key).cloned().unwrap_or_default();
		if liquidity_delta == 0 && position.liquidity == 0 {
			return Err(ModifyLiquidityError::CannotUpdateEmptyPosition)
		}
		let new_position_liquidity = add_liquidity_delta(position.liquidity, liquidity_delta)?;

		let (lower_info, upper_info, flipped_lower, flipped_upper) = if liquidity_delta != 0 {
			let (lower_info, flipped_lower) =
				self.updated_tick(tick_lower, liquidity_delta, false)?;
			let (upper_info, flipped_upper) = self.updated_tick(tick_upper, liquidity_delta, true)?;
			if liquidity_delta > 0 {
				let max_liquidity = max_liquidity_per_tick(tick_spacing);
				if lower_info.liquidity_gross > max_liquidity {
					return Err(ModifyLiquidityError::TickLiquidityOverflow(tick_lower))
				}
				if upper_info.liquidity_gross > max_liquidity {
					return Err(ModifyLiquidityError::TickLiquidityOverflow(tick_upper))
				}
			}
			(lower_info, upper_info, flipped_lower, flipped_upper)
		} else {
			(
				self.ticks.get(&tick_lower).cloned().unwrap_or_default(),
				self.ticks.get(&tick_upper).cloned().unwrap_or_default(),
				false,
				false,
			)
		};

		let fee_growth_inside =
			self.fee_growth_inside_with(tick_lower, &lower_info, tick_upper, &upper_info);
		let fees_owed = fee_growth_inside.try_map(|side, fee_growth_inside| {
			// The growth difference is exact modulo 2^256, and a position's fees cannot exceed
			// the pool's balance, so the result fits.
			cast::to_i128(checked_mul_div_floor(
				wrapping_sub(fee_growth_inside, position.fee_growth_inside_last[side]),
				U256::from(position.liquidity),
				q128(),
			)?)
		})?;
		let fee_delta = BalanceDelta::new(fees_owed.zero, fees_owed.one);

		let sqrt_price = self.slot0.sqrt_price;
		let current_tick = self.slot0.tick;
		let (delta, new_liquidity) = if liquidity_delta == 0 {
			(BalanceDelta::ZERO, self.liquidity)
		} else {
			let (sqrt_price_lower, sqrt_price_upper) =
				(sqrt_price_at_tick(tick_lower), sqrt_price_at_tick(tick_upper));
			if current_tick < tick_lower {
				(
					BalanceDelta::new(
						sqrt_price_math::signed_amount0_delta(
							sqrt_price_lower,
							sqrt_price_upper,
							liquidity_delta,
						)?,
						0,
					),
					self.liquidity,
				)
			} else if current_tick < tick_upper {
				(
					BalanceDelta::new(
						sqrt_price_math::signed_amount0_delta(
							sqrt_price,
							sqrt_price_upper,
							liquidity_delta,
						)?,
						sqrt_price_math::signed_amount1_delta(
							sqrt_price_lower,
							sqrt_price,
							liquidity_delta,
						)?,
					),
					add_liquidity_delta(self.liquidity, liquidity_delta)?,
				)
			} else {
				(
					BalanceDelta::new(
						0,
						sqrt_price_math::signed_amount1_delta(
							sqrt_price_lower,
							sqrt_price_upper,
							liquidity_delta,
						)?,
					),
					self.liquidity,
				)
			}
		};

		if flipped_lower {
			self.tick_bitmap
				.flip_tick(tick_lower, tick_spacing)
				.map_err(ModifyLiquidityError::TickMisaligned)?;
		}
		if flipped_upper {
			self.tick_bitmap
				.flip_tick(tick_upper, tick_spacing)
				.map_err(ModifyLiquidityError::TickMisaligned)?;
		}
		for (tick, info) in [(tick_lower, lower_info), (tick_upper, upper_info)] {
			if info.liquidity_gross == 0 {
				self.ticks.remove(&tick);
			} else {
				self.ticks.insert(tick, info);
			}
		}

		position.liquidity = new_position_liquidity;
		position.fee_growth_inside_last = fee_growth_inside;
		if position.liquidity == 0 {
			self.positions.remove(&position_key);
		} else {
			self.positions.insert(position_key, position);
		}
		self.liquidity = new_liquidity;

		Ok((delta, fee_delta))
	}

	/// Swaps until the specified amount is used up or `sqrt_price_limit` is reached. A valid
	/// `lp_fee_override` (one carrying the override flag) replaces the pool's LP fee for this
	/// swap only.
	///
	/// This function never panics
	///
	/// If this function returns an `Err(_)` no state changes have occurred
	pub fn swap(
		&mut self,
		params: &SwapParams,
		tick_spacing: Tick,
		lp_fee_override: u32,
	) -> Result<SwapOutcome, SwapError> {
		if params.zero_for_one {
			self.inner_swap::<ZeroToOne>(params, tick_spacing, lp_fee_override)
		} else {
			self.inner_swap::<OneToZero>(params, tick_spacing, lp_fee_override)
		}
	}

	fn inner_swap<SD: SwapDirection>(
		&mut self,
		params: &SwapParams,
		tick_spacing: Tick,
		lp_fee_override: u32,
	) -> Result<SwapOutcome, SwapError> {
		if !self.is_initialized() {
			return Err(SwapError::PoolNotInitialized)
		}
		if params.amount_specified == 0 {
			return Err(SwapError::SwapAmountCannotBeZero)
		}

		let slot0_start = self.slot0;
		let protocol_fee = protocol_fee::lane(slot0_start.protocol_fee, SD::ZERO_FOR_ONE);
		let lp_fee = if lp_fee::is_override(lp_fee_override) {
			lp_fee::remove_override_and_validate(lp_fee_override, lp_fee::ONE_HUNDRED_PERCENT_FEE)
				.map_err(SwapError::InvalidLpFeeOverride)?
		} else {
			slot0_start.lp_fee
		};
		let swap_fee = if protocol_fee == 0 {
			lp_fee
		} else {
			protocol_fee::calculate_swap_fee(protocol_fee, lp_fee)
		};
		let exact_input = params.amount_specified < 0;
		if swap_fee >= ONE_IN_PIPS && !exact_input {
			return Err(SwapError::InvalidFeeForExactOut)
		}

		SD::validate_price_limit(slot0_start.sqrt_price, params.sqrt_price_limit)?;

		let mut amount_specified_remaining = params.amount_specified;
		let mut amount_calculated = 0i128;
		let mut amount_to_protocol = 0u128;
		let mut sqrt_price = slot0_start.sqrt_price;
		let mut tick = slot0_start.tick;
		let mut liquidity = self.liquidity;
		let mut fee_growth_global = self.fee_growth_global[SD::INPUT_SIDE];
		// Ticks crossed, with the fee growth globals at the time. Applied once the swap succeeds.
		let mut crossed_ticks: Vec<(Tick, CurrencyMap<FeeGrowthQ128F128>)> = Vec::new();

		while amount_specified_remaining != 0 && sqrt_price != params.sqrt_price_limit {
			let sqrt_price_start = sqrt_price;
			let (tick_next, initialized) = self.tick_bitmap.next_initialized_tick_within_one_word(
				tick,
				tick_spacing,
				SD::ZERO_FOR_ONE,
			);
			// The bitmap is not aware of the tick bounds.
			let tick_next = tick_next.clamp(MIN_TICK, MAX_TICK);
			let sqrt_price_next = sqrt_price_at_tick(tick_next);

			let sqrt_price_target =
				if SD::sqrt_price_op_more_than(sqrt_price_next, params.sqrt_price_limit) {
					params.sqrt_price_limit
				} else {
					sqrt_price_next
				};

			let step = compute_swap_step(
				sqrt_price,
				sqrt_price_target,
				liquidity,
				amount_specified_remaining,
				swap_fee,
			)?;
			sqrt_price = step.sqrt_price_next;

			let amount_in = cast::to_i128(step.amount_in)?;
			let amount_out = cast::to_i128(step.amount_out)?;
			let mut fee_amount = cast::to_u128(step.fee_amount)?;
			let amount_in_with_fee = amount_in.checked_add(fee_amount as i128).ok_or(OVERFLOW)?;

			if exact_input {
				// amount_in + fee never exceeds the remaining input.
				amount_specified_remaining += amount_in_with_fee;
				amount_calculated = amount_calculated.checked_add(amount_out).ok_or(OVERFLOW)?;
			} else {
				amount_specified_remaining -= amount_out;
				amount_calculated =
					amount_calculated.checked_sub(amount_in_with_fee).ok_or(OVERFLOW)?;
			}

			if protocol_fee > 0 {
				// Rounds down in favour of the LPs.
				let protocol_amount = if swap_fee == protocol_fee {
					fee_amount
				} else {
					(U256::from(amount_in_with_fee as u128) * U256::from(protocol_fee) /
						U256::from(ONE_IN_PIPS))
					.low_u128()
				};
				fee_amount -= protocol_amount;
				amount_to_protocol =
					amount_to_protocol.checked_add(protocol_amount).ok_or(OVERFLOW)?;
			}

			if liquidity > 0 {
				fee_growth_global = wrapping_add(
					fee_growth_global,
					checked_mul_div_floor(U256::from(fee_amount), q128(), U256::from(liquidity))?,
				);
			}

			if sqrt_price == sqrt_price_next {
				if initialized {
					let fee_growth_globals = {
						let mut globals = self.fee_growth_global;
						globals[SD::INPUT_SIDE] = fee_growth_global;
						globals
					};
					if let Some(tick_info) = self.ticks.get(&tick_next) {
						liquidity = add_liquidity_delta(
							liquidity,
							SD::liquidity_delta_on_crossing_tick(tick_info),
						)?;
					}
					crossed_ticks.push((tick_next, fee_growth_globals));
				}
				tick = SD::current_tick_after_crossing_tick(tick_next);
			} else if sqrt_price != sqrt_price_start {
				// Recompute unless we are on a lower tick boundary and have not moved.
				tick = checked_tick_at_sqrt_price(sqrt_price)?;
			}
		}

		let specified_used = params
			.amount_specified
			.checked_sub(amount_specified_remaining)
			.ok_or(OVERFLOW)?;
		// The delta of the specified currency comes first if it is the input of an exact input
		// swap, or the output of an exact output swap.
		let delta = if SD::ZERO_FOR_ONE == exact_input {
			BalanceDelta::new(specified_used, amount_calculated)
		} else {
			BalanceDelta::new(amount_calculated, specified_used)
		};

		// No errors past this point.

		for (crossed_tick, fee_growth_globals) in crossed_ticks {
			if let Some(tick_info) = self.ticks.get_mut(&crossed_tick) {
				let outside = tick_info.fee_growth_outside;
				tick_info.fee_growth_outside =
					fee_growth_globals.map(|side, global| wrapping_sub(global, outside[side]));
			}
		}
		self.slot0.sqrt_price = sqrt_price;
		self.slot0.tick = tick;
		self.liquidity = liquidity;
		self.fee_growth_global[SD::INPUT_SIDE] = fee_growth_global;

		log::trace!(
			"Tick pool swap: zero_for_one {}, delta {:?}, tick {} -> {}",
			SD::ZERO_FOR_ONE,
			delta,
			slot0_start.tick,
			tick,
		);

		Ok(SwapOutcome { delta, amount_to_protocol, swap_fee, sqrt_price, tick, liquidity })
	}

	/// Pays `amount0` and `amount1` to the liquidity active at the current price, as fees.
	///
	/// This function never panics
	///
	/// If this function returns an `Err(_)` no state changes have occurred
	pub fn donate(&mut self, amount0: u128, amount1: u128) -> Result<BalanceDelta, DonateError> {
		if !self.is_initialized() {
			return Err(DonateError::PoolNotInitialized)
		}
		if self.liquidity == 0 {
			return Err(DonateError::NoLiquidityToReceiveFees)
		}
		let amounts = CurrencyMap { zero: amount0, one: amount1 };
		let delta = BalanceDelta::new(
			cast::checked_neg(cast::u128_to_i128(amount0)?)?,
			cast::checked_neg(cast::u128_to_i128(amount1)?)?,
		);
		let growth = amounts.try_map(|_, amount| {
			checked_mul_div_floor(U256::from(amount), q128(), U256::from(self.liquidity))
		})?;
		for side in [Side::Zero, Side::One] {
			self.fee_growth_global[side] =
				wrapping_add(self.fee_growth_global[side], growth[side]);
		}
		Ok(delta)
	}

	pub fn slot0(&self) -> Slot0 {
		self.slot0
	}

	pub fn liquidity(&self) -> Liquidity {
		self.liquidity
	}

	pub fn fee_growth_globals(&self) -> CurrencyMap<FeeGrowthQ128F128> {
		self.fee_growth_global
	}

	pub fn tick_info(&self, tick: Tick) -> Option<&TickInfo> {
		self.ticks.get(&tick)
	}

	pub fn tick_bitmap_word(&self, word_position: i16) -> U256 {
		self.tick_bitmap.word(word_position)
	}

	pub fn position(
		&self,
		owner: &LiquidityProvider,
		tick_lower: Tick,
		tick_upper: Tick,
		salt: Salt,
	) -> Position {
		self.positions
			.get(&(owner.clone(), tick_lower, tick_upper, salt))
			.cloned()
			.unwrap_or_default()
	}

	#[allow(clippy::type_complexity)]
	pub fn positions(
		&self,
	) -> impl Iterator<Item = (&(LiquidityProvider, Tick, Tick, Salt), &Position)> {
		self.positions.iter()
	}
}
