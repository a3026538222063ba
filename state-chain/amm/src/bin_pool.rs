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

//! The bin engine. Liquidity sits in discrete bins, each holding X and Y at a fixed price of
//! `(1 + bin_step / 10_000) ^ (id - 2^23)`. Bins below the active bin hold only Y, bins above it
//! only X. Swaps drain one bin at a time and move the active id along the tree of non-empty bins.


use serde::{Deserialize, Serialize};
use sp_std::{collections::btree_map::BTreeMap, vec::Vec};

use codec::{Decode, Encode, MaxEncodedLen};
use scale_info::TypeInfo;
use sp_core::U256;

use amm_math::{
	bin_math::{self, price_from_id},
	cast, checked_mul_div_floor,
	fees::{bin as bin_fees, lp_fee, protocol_fee, FeeError, ONE_IN_PIPS},
	packed::{PackedAmounts, DISTRIBUTION_PRECISION},
	MathError, Q128F128,
};

use crate::{
	bin_tree::BinTree,
	common::{BalanceDelta, Salt},
};

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
	pub active_id: u32,
	pub protocol_fee: u32,
	pub lp_fee: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, TypeInfo, Encode, Decode, Serialize, Deserialize)]
pub struct PoolState<LiquidityProvider: Ord> {
	slot0: Slot0,
	reserve_of_bin: BTreeMap<u32, PackedAmounts>,
	/// Total shares of each bin. A bin is in `tree` exactly when this is non-zero.
	share_of_bin: BTreeMap<u32, U256>,
	tree: BinTree,
	positions: BTreeMap<(LiquidityProvider, u32, Salt), U256>,
}

impl<LiquidityProvider: Ord> Default for PoolState<LiquidityProvider> {
	fn default() -> Self {
		Self {
			slot0: Default::default(),
			reserve_of_bin: Default::default(),
			share_of_bin: Default::default(),
			tree: Default::default(),
			positions: Default::default(),
		}
	}
}

/// How much of a mint's `amount_in` goes to bin `id`, in units of `DISTRIBUTION_PRECISION`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Encode, Decode, TypeInfo)]
pub struct LiquidityConfig {
	pub id: u32,
	pub distribution_x: u64,
	pub distribution_y: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MintParams {
	pub liquidity_configs: Vec<LiquidityConfig>,
	pub amount_in: PackedAmounts,
	pub salt: Salt,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MintOutcome {
	/// The owner's delta: everything taken from `amount_in`, composition fees included.
	pub delta: BalanceDelta,
	/// The part of the composition fee owed to the protocol.
	pub fee_to_protocol: PackedAmounts,
	pub composition_fee: PackedAmounts,
	pub ids: Vec<u32>,
	/// The amounts added to each bin, excluding the protocol's part of the composition fee.
	pub amounts: Vec<PackedAmounts>,
	pub shares_minted: Vec<U256>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BurnParams {
	pub ids: Vec<u32>,
	pub amounts_to_burn: Vec<U256>,
	pub salt: Salt,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BurnOutcome {
	pub delta: BalanceDelta,
	pub ids: Vec<u32>,
	pub amounts: Vec<PackedAmounts>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SwapParams {
	/// Sell X for Y. The active id moves down.
	pub swap_for_y: bool,
	/// Negative for exact input, positive for exact output.
	pub amount_specified: i128,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SwapOutcome {
	pub delta: BalanceDelta,
	/// Owed to the protocol, in the input currency.
	pub amount_to_protocol: u128,
	pub swap_fee: u32,
	pub active_id: u32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum InitializeError {
	#[cfg_attr(feature = "std", error("Pool is already initialized"))]
	AlreadyInitialized,
	#[cfg_attr(feature = "std", error("Bin {0} has no price at this bin step"))]
	InvalidActiveId(u32),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum MintError {
	#[cfg_attr(feature = "std", error("Pool is not initialized"))]
	PoolNotInitialized,
	#[cfg_attr(feature = "std", error("No liquidity configurations given"))]
	EmptyLiquidityConfigs,
	#[cfg_attr(feature = "std", error("Distribution for bin {0} exceeds 100%"))]
	InvalidConfig(u32),
	/// A bin below the active bin may only receive Y, a bin above it only X.
	#[cfg_attr(feature = "std", error("Deposit into bin {0} is on the wrong side of the price"))]
	CompositionFactorFlawed(u32),
	#[cfg_attr(feature = "std", error("Deposit into bin {0} mints no shares"))]
	ZeroShares(u32),
	#[cfg_attr(feature = "std", error("Bin {0} would hold too much liquidity"))]
	LiquidityOverflow(u32),
	#[cfg_attr(feature = "std", error("{0}"))]
	InvalidLpFeeOverride(FeeError),
	#[cfg_attr(feature = "std", error("{0}"))]
	Math(MathError),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum BurnError {
	#[cfg_attr(feature = "std", error("Pool is not initialized"))]
	PoolNotInitialized,
	/// Ids and amounts must be non-empty and of equal length.
	#[cfg_attr(feature = "std", error("Invalid burn input"))]
	InvalidBurnInput,
	#[cfg_attr(feature = "std", error("Cannot burn zero shares of bin {0}"))]
	BurnZeroAmount(u32),
	#[cfg_attr(feature = "std", error("Not enough shares of bin {0}"))]
	InsufficientShares(u32),
	#[cfg_attr(feature = "std", error("Burning from bin {0} releases nothing"))]
	ZeroAmountsOut(u32),
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
	#[cfg_attr(feature = "std", error("Exact output swaps are impossible with a 100% fee"))]
	InvalidFeeForExactOut,
	#[cfg_attr(feature = "std", error("{0}"))]
	InvalidLpFeeOverride(FeeError),
	/// The non-empty bins in the swap direction cannot satisfy the amount.
	#[cfg_attr(feature = "std", error("Not enough liquidity to complete the swap"))]
	OutOfLiquidity,
	#[cfg_attr(feature = "std", error("{0}"))]
	Math(MathError),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum DonateError {
	#[cfg_attr(feature = "std", error("Pool is not initialized"))]
	PoolNotInitialized,
	#[cfg_attr(feature = "std", error("The active bin has no shares to receive the donation"))]
	NoLiquidityToReceiveFees,
	#[cfg_attr(feature = "std", error("Bin {0} would hold too much liquidity"))]
	LiquidityOverflow(u32),
	#[cfg_attr(feature = "std", error("{0}"))]
	Math(MathError),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum SetFeeError {
	#[cfg_attr(feature = "std", error("Pool is not initialized"))]
	PoolNotInitialized,
}

impl From<MathError> for MintError {
	fn from(error: MathError) -> Self {
		MintError::Math(error)
	}
}
impl From<MathError> for BurnError {
	fn from(error: MathError) -> Self {
		BurnError::Math(error)
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

/// Bin reserves, bin supplies and the caller's share balances touched by a mint or burn. Written
/// to the pool only after every bin succeeded, so an id may appear more than once in a request.
struct StagedBins {
	bins: BTreeMap<u32, (PackedAmounts, U256)>,
	balances: BTreeMap<u32, U256>,
}

/// Rejects deposits on the wrong side of the active bin.
fn verify_amounts(amounts: PackedAmounts, active_id: u32, id: u32) -> Result<(), MintError> {
	if (id < active_id && amounts.x > 0) || (id > active_id && amounts.y > 0) {
		Err(MintError::CompositionFactorFlawed(id))
	} else {
		Ok(())
	}
}

/// The fee charged on a deposit into the active bin that does not match the bin's composition,
/// and the protocol's part of it. The fee is taken from the lane the depositor effectively
/// swapped out of, at the swap fee for that direction.
fn composition_fees(
	reserves: PackedAmounts,
	amounts_in: PackedAmounts,
	total_supply: U256,
	shares: U256,
	protocol_fee_word: u32,
	lp_fee: u32,
) -> Result<(PackedAmounts, PackedAmounts), MathError> {
	if shares.is_zero() {
		return Ok((PackedAmounts::ZERO, PackedAmounts::ZERO))
	}
	let received = bin_math::amount_out_of_bin(
		reserves.checked_add(amounts_in)?,
		shares,
		total_supply.checked_add(shares).ok_or(amm_math::OVERFLOW)?,
	)?;

	let charge = |protocol_fee: u32, excess: u128, is_x: bool| {
		let fee = if protocol_fee == 0 {
			lp_fee
		} else {
			protocol_fee::calculate_swap_fee(protocol_fee, lp_fee)
		};
		let fee_amount = bin_fees::composition_fee(excess, fee);
		(
			PackedAmounts::single(fee_amount, is_x),
			PackedAmounts::single(protocol_fee::share_of(fee_amount, protocol_fee, fee), is_x),
		)
	};

	Ok(if received.x > amounts_in.x {
		// Y was effectively swapped for X.
		let excess = amounts_in.y.checked_sub(received.y).ok_or(amm_math::UNDERFLOW)?;
		charge(protocol_fee::one_for_zero(protocol_fee_word), excess, false)
	} else if received.y > amounts_in.y {
		let excess = amounts_in.x.checked_sub(received.x).ok_or(amm_math::UNDERFLOW)?;
		charge(protocol_fee::zero_for_one(protocol_fee_word), excess, true)
	} else {
		(PackedAmounts::ZERO, PackedAmounts::ZERO)
	})
}

fn negated(amounts: PackedAmounts) -> Result<BalanceDelta, MathError> {
	Ok(BalanceDelta::new(
		cast::checked_neg(cast::u128_to_i128(amounts.x)?)?,
		cast::checked_neg(cast::u128_to_i128(amounts.y)?)?,
	))
}

impl<LiquidityProvider: Clone + Ord> PoolState<LiquidityProvider> {
	pub fn new() -> Self {
		Default::default()
	}

	pub fn is_initialized(&self) -> bool {
		self.slot0.active_id != 0
	}

	/// This function never panics
	///
	/// If this function returns an `Err(_)` no state changes have occurred
	pub fn initialize(
		&mut self,
		active_id: u32,
		protocol_fee: u32,
		lp_fee: u32,
		bin_step: u16,
	) -> Result<(), InitializeError> {
		if self.is_initialized() {
			return Err(InitializeError::AlreadyInitialized)
		}
		if active_id == 0 || price_from_id(active_id, bin_step).is_err() {
			return Err(InitializeError::InvalidActiveId(active_id))
		}
		self.slot0 = Slot0 { active_id, protocol_fee, lp_fee };
		Ok(())
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

	fn staged_bin(&self, staged: &StagedBins, id: u32) -> (PackedAmounts, U256) {
		staged.bins.get(&id).copied().unwrap_or_else(|| self.bin(id))
	}

	fn staged_balance(
		&self,
		staged: &StagedBins,
		owner: &LiquidityProvider,
		id: u32,
		salt: Salt,
	) -> U256 {
		staged
			.balances
			.get(&id)
			.copied()
			.unwrap_or_else(|| self.position(owner, id, salt))
	}

	fn commit(&mut self, owner: &LiquidityProvider, salt: Salt, staged: StagedBins) {
		for (id, (reserves, supply)) in staged.bins {
			if supply.is_zero() {
				self.tree.remove(id);
				self.reserve_of_bin.remove(&id);
				self.share_of_bin.remove(&id);
			} else {
				self.tree.add(id);
				self.reserve_of_bin.insert(id, reserves);
				self.share_of_bin.insert(id, supply);
			}
		}
		for (id, balance) in staged.balances {
			let key = (owner.clone(), id, salt);
			if balance.is_zero() {
				self.positions.remove(&key);
			} else {
				self.positions.insert(key, balance);
			}
		}
	}

	/// Deposits into each configured bin its share of `amount_in`, and mints shares of those
	/// bins to `owner`. Deposits into the active bin that would change its composition pay a
	/// composition fee. A valid `lp_fee_override` replaces the LP fee used for it.
	///
	/// This function never panics
	///
	/// If this function returns an `Err(_)` no state changes have occurred
	pub fn mint(
		&mut self,
		owner: &LiquidityProvider,
		params: &MintParams,
		bin_step: u16,
		lp_fee_override: u32,
	) -> Result<MintOutcome, MintError> {
		if !self.is_initialized() {
			return Err(MintError::PoolNotInitialized)
		}
		if params.liquidity_configs.is_empty() {
			return Err(MintError::EmptyLiquidityConfigs)
		}
		let active_id = self.slot0.active_id;
		let lp_fee = if lp_fee::is_override(lp_fee_override) {
			lp_fee::remove_override_and_validate(lp_fee_override, lp_fee::TEN_PERCENT_FEE)
				.map_err(MintError::InvalidLpFeeOverride)?
		} else {
			self.slot0.lp_fee
		};

		let mut staged = StagedBins { bins: BTreeMap::new(), balances: BTreeMap::new() };
		let mut amounts_left = params.amount_in;
		let mut fee_to_protocol = PackedAmounts::ZERO;
		let mut composition_fee = PackedAmounts::ZERO;
		let count = params.liquidity_configs.len();
		let (mut ids, mut amounts, mut shares_minted) =
			(Vec::with_capacity(count), Vec::with_capacity(count), Vec::with_capacity(count));

		for &LiquidityConfig { id, distribution_x, distribution_y } in &params.liquidity_configs {
			if distribution_x as u128 > DISTRIBUTION_PRECISION ||
				distribution_y as u128 > DISTRIBUTION_PRECISION
			{
				return Err(MintError::InvalidConfig(id))
			}
			let max_amounts_in =
				params.amount_in.scale_by_distribution(distribution_x, distribution_y);
			let price = price_from_id(id, bin_step)?;
			let (reserves, supply) = self.staged_bin(&staged, id);

			let (mut shares, amounts_in) = bin_math::shares_and_effective_amounts_in(
				reserves,
				max_amounts_in,
				price,
				supply,
			)?;
			let mut amounts_in_to_bin = amounts_in;

			if id == active_id {
				let (fees, to_protocol) = composition_fees(
					reserves,
					amounts_in,
					supply,
					shares,
					self.slot0.protocol_fee,
					lp_fee,
				)?;
				if !fees.is_zero() {
					let user_liquidity = bin_math::liquidity(amounts_in.checked_sub(fees)?, price)?;
					let bin_liquidity = bin_math::liquidity(reserves, price)?;
					shares = checked_mul_div_floor(user_liquidity, supply, bin_liquidity)?;
					amounts_in_to_bin = amounts_in_to_bin.checked_sub(to_protocol)?;
					composition_fee = composition_fee.checked_add(fees)?;
					fee_to_protocol = fee_to_protocol.checked_add(to_protocol)?;
				}
			} else {
				verify_amounts(amounts_in, active_id, id)?;
			}

			if shares.is_zero() {
				return Err(MintError::ZeroShares(id))
			}
			let new_reserves = reserves.checked_add(amounts_in_to_bin)?;
			bin_math::liquidity(new_reserves, price)
				.map_err(|_| MintError::LiquidityOverflow(id))?;
			let new_supply = supply.checked_add(shares).ok_or(amm_math::OVERFLOW)?;
			let balance = self.staged_balance(&staged, owner, id, params.salt);
			staged.bins.insert(id, (new_reserves, new_supply));
			staged
				.balances
				.insert(id, balance.checked_add(shares).ok_or(amm_math::OVERFLOW)?);

			amounts_left = amounts_left.checked_sub(amounts_in)?;
			ids.push(id);
			amounts.push(amounts_in_to_bin);
			shares_minted.push(shares);
		}

		let delta = negated(params.amount_in.checked_sub(amounts_left)?)?;

		self.commit(owner, params.salt, staged);

		Ok(MintOutcome { delta, fee_to_protocol, composition_fee, ids, amounts, shares_minted })
	}

	/// Burns `owner`'s shares of each bin for its proportional part of the bin's reserves.
	///
	/// This function never panics
	///
	/// If this function returns an `Err(_)` no state changes have occurred
	pub fn burn(
		&mut self,
		owner: &LiquidityProvider,
		params: &BurnParams,
	) -> Result<BurnOutcome, BurnError> {
		if !self.is_initialized() {
			return Err(BurnError::PoolNotInitialized)
		}
		if params.ids.is_empty() || params.ids.len() != params.amounts_to_burn.len() {
			return Err(BurnError::InvalidBurnInput)
		}

		let mut staged = StagedBins { bins: BTreeMap::new(), balances: BTreeMap::new() };
		let mut amounts_out = PackedAmounts::ZERO;
		let mut amounts = Vec::with_capacity(params.ids.len());

		for (&id, &amount_to_burn) in params.ids.iter().zip(&params.amounts_to_burn) {
			if amount_to_burn.is_zero() {
				return Err(BurnError::BurnZeroAmount(id))
			}
			let balance = self.staged_balance(&staged, owner, id, params.salt);
			let balance =
				balance.checked_sub(amount_to_burn).ok_or(BurnError::InsufficientShares(id))?;
			let (reserves, supply) = self.staged_bin(&staged, id);

			let amounts_out_of_bin = bin_math::amount_out_of_bin(reserves, amount_to_burn, supply)?;
			if amounts_out_of_bin.is_zero() {
				return Err(BurnError::ZeroAmountsOut(id))
			}
			// A position's balance never exceeds its bin's supply.
			let new_supply = supply.checked_sub(amount_to_burn).ok_or(amm_math::UNDERFLOW)?;
			staged.bins.insert(id, (reserves.checked_sub(amounts_out_of_bin)?, new_supply));
			staged.balances.insert(id, balance);

			amounts_out = amounts_out.checked_add(amounts_out_of_bin)?;
			amounts.push(amounts_out_of_bin);
		}

		let delta = BalanceDelta::new(
			cast::u128_to_i128(amounts_out.x)?,
			cast::u128_to_i128(amounts_out.y)?,
		);

		self.commit(owner, params.salt, staged);

		Ok(BurnOutcome { delta, ids: params.ids.clone(), amounts })
	}

	/// Swaps bin by bin, starting at the active bin, until the specified amount is used up.
	/// Fails if the bins run out first. A valid `lp_fee_override` replaces the pool's LP fee for
	/// this swap only.
	///
	/// This function never panics
	///
	/// If this function returns an `Err(_)` no state changes have occurred
	pub fn swap(
		&mut self,
		params: &SwapParams,
		bin_step: u16,
		lp_fee_override: u32,
	) -> Result<SwapOutcome, SwapError> {
		if !self.is_initialized() {
			return Err(SwapError::PoolNotInitialized)
		}
		if params.amount_specified == 0 {
			return Err(SwapError::SwapAmountCannotBeZero)
		}

		let SwapParams { swap_for_y, amount_specified } = *params;
		let slot0_start = self.slot0;
		let protocol_fee = protocol_fee::lane(slot0_start.protocol_fee, swap_for_y);
		let lp_fee = if lp_fee::is_override(lp_fee_override) {
			lp_fee::remove_override_and_validate(lp_fee_override, lp_fee::TEN_PERCENT_FEE)
				.map_err(SwapError::InvalidLpFeeOverride)?
		} else {
			slot0_start.lp_fee
		};
		let swap_fee = if protocol_fee == 0 {
			lp_fee
		} else {
			protocol_fee::calculate_swap_fee(protocol_fee, lp_fee)
		};
		let exact_input = amount_specified < 0;
		if swap_fee >= ONE_IN_PIPS && !exact_input {
			return Err(SwapError::InvalidFeeForExactOut)
		}

		let mut active_id = slot0_start.active_id;
		let mut amount_remaining = amount_specified.unsigned_abs();
		let mut amount_unspecified = 0u128;
		let mut amount_to_protocol = 0u128;
		// New reserves of each bin swapped against. Applied once the swap succeeds.
		let mut updated_bins: Vec<(u32, PackedAmounts)> = Vec::new();

		loop {
			let reserves = self.reserve_of_bin.get(&active_id).copied().unwrap_or_default();
			if !reserves.is_empty(!swap_for_y) {
				let price: Q128F128 = price_from_id(active_id, bin_step)?;
				let reserve_out = reserves.get(!swap_for_y);
				let bin_swap = if exact_input {
					let bin_swap = bin_math::amounts_out(
						reserve_out,
						swap_fee,
						price,
						swap_for_y,
						amount_remaining,
					)?;
					amount_remaining -= bin_swap.amount_in_with_fees;
					amount_unspecified = amount_unspecified
						.checked_add(bin_swap.amount_out)
						.ok_or(amm_math::OVERFLOW)?;
					bin_swap
				} else {
					let bin_swap = bin_math::amounts_in(
						reserve_out,
						swap_fee,
						price,
						swap_for_y,
						amount_remaining,
					)?;
					amount_remaining -= bin_swap.amount_out;
					amount_unspecified = amount_unspecified
						.checked_add(bin_swap.amount_in_with_fees)
						.ok_or(amm_math::OVERFLOW)?;
					bin_swap
				};

				if bin_swap.amount_in_with_fees > 0 {
					let protocol_amount =
						protocol_fee::share_of(bin_swap.fee, protocol_fee, swap_fee);
					amount_to_protocol = amount_to_protocol
						.checked_add(protocol_amount)
						.ok_or(amm_math::OVERFLOW)?;
					let amount_in_to_bin = bin_swap.amount_in_with_fees - protocol_amount;
					updated_bins.push((
						active_id,
						reserves
							.checked_add(PackedAmounts::single(amount_in_to_bin, swap_for_y))?
							.checked_sub(PackedAmounts::single(bin_swap.amount_out, !swap_for_y))?,
					));
				}
			}

			if amount_remaining == 0 {
				break
			}
			active_id = self
				.next_non_empty_bin(swap_for_y, active_id)
				.ok_or(SwapError::OutOfLiquidity)?;
		}

		let specified = amount_specified.unsigned_abs();
		let (amount_in, amount_out) = if exact_input {
			(specified, amount_unspecified)
		} else {
			(amount_unspecified, specified)
		};
		let (amount_in, amount_out) = (
			cast::checked_neg(cast::u128_to_i128(amount_in)?)?,
			cast::u128_to_i128(amount_out)?,
		);
		let delta = if swap_for_y {
			BalanceDelta::new(amount_in, amount_out)
		} else {
			BalanceDelta::new(amount_out, amount_in)
		};

		for (id, reserves) in updated_bins {
			self.reserve_of_bin.insert(id, reserves);
		}
		self.slot0.active_id = active_id;

		log::trace!(
			"Bin pool swap: swap_for_y {}, delta {:?}, active id {} -> {}",
			swap_for_y,
			delta,
			slot0_start.active_id,
			active_id,
		);

		Ok(SwapOutcome { delta, amount_to_protocol, swap_fee, active_id })
	}

	/// Adds `amount0` and `amount1` to the active bin, raising the value of its shares.
	///
	/// This function never panics
	///
	/// If this function returns an `Err(_)` no state changes have occurred
	pub fn donate(
		&mut self,
		amount0: u128,
		amount1: u128,
		bin_step: u16,
	) -> Result<(BalanceDelta, u32), DonateError> {
		if !self.is_initialized() {
			return Err(DonateError::PoolNotInitialized)
		}
		let active_id = self.slot0.active_id;
		let (reserves, supply) = self.bin(active_id);
		if supply.is_zero() {
			return Err(DonateError::NoLiquidityToReceiveFees)
		}
		let amounts = PackedAmounts::new(amount0, amount1);
		let delta = negated(amounts)?;
		let new_reserves = reserves.checked_add(amounts)?;
		bin_math::liquidity(new_reserves, price_from_id(active_id, bin_step)?)
			.map_err(|_| DonateError::LiquidityOverflow(active_id))?;

		self.reserve_of_bin.insert(active_id, new_reserves);
		Ok((delta, active_id))
	}

	pub fn slot0(&self) -> Slot0 {
		self.slot0
	}

	/// The reserves and total shares of bin `id`.
	pub fn bin(&self, id: u32) -> (PackedAmounts, U256) {
		(
			self.reserve_of_bin.get(&id).copied().unwrap_or_default(),
			self.share_of_bin.get(&id).copied().unwrap_or_default(),
		)
	}

	pub fn position(&self, owner: &LiquidityProvider, id: u32, salt: Salt) -> U256 {
		self.positions.get(&(owner.clone(), id, salt)).copied().unwrap_or_default()
	}

	pub fn positions(&self) -> impl Iterator<Item = (&(LiquidityProvider, u32, Salt), &U256)> {
		self.positions.iter()
	}

	/// The next bin with shares in the direction a swap moves: lower ids when selling X for Y.
	pub fn next_non_empty_bin(&self, swap_for_y: bool, id: u32) -> Option<u32> {
		if swap_for_y {
			self.tree.find_first_right(id)
		} else {
			self.tree.find_first_left(id)
		}
	}
}
