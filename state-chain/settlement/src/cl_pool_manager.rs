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

//! Drives tick pools: validates keys, runs the hook protocol around each engine call, and
//! accounts the resulting deltas in the vault.

use amm::{
	common::{AccountId, BalanceDelta, Currency, PoolKey, Salt},
	hooks::{self, ClHookDispatch},
	tick_pool::{self, ModifyLiquidityParams, PoolState, Position, Slot0, SwapParams},
};
use amm_math::{
	fees::{lp_fee, protocol_fee},
	Liquidity, SqrtPriceQ64F96, Tick,
};
use codec::{Decode, Encode};
use scale_info::TypeInfo;
use sp_std::{collections::btree_map::BTreeMap, vec::Vec};

use crate::{accrue_protocol_fee, App, AssetBank, ClContext, Error, Event, Exchange, PoolPrice};

/// The LP fee cap of tick pools.
pub const MAX_LP_FEE: u32 = lp_fee::ONE_HUNDRED_PERCENT_FEE;

#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode, TypeInfo)]
pub struct ClPoolManager {
	pools: BTreeMap<PoolKey, PoolState<AccountId>>,
	/// Protocol fees taken from swaps and not yet collected. They are part of the app's reserves.
	protocol_fees_accrued: BTreeMap<Currency, u128>,
}

impl ClPoolManager {
	fn pool_mut(&mut self, key: &PoolKey) -> Result<&mut PoolState<AccountId>, Error> {
		self.pools.get_mut(key).ok_or(Error::PoolNotInitialized)
	}

	pub(crate) fn initialize(
		&mut self,
		ctx: ClContext<'_>,
		sender: &AccountId,
		key: &PoolKey,
		sqrt_price: SqrtPriceQ64F96,
	) -> Result<Tick, Error> {
		let tick_spacing = key.parameters.tick_spacing();
		if tick_spacing > ctx.config.max_tick_spacing {
			return Err(Error::TickSpacingTooLarge(tick_spacing))
		}
		if tick_spacing < ctx.config.min_tick_spacing {
			return Err(Error::TickSpacingTooSmall(tick_spacing))
		}
		ctx.validate_currencies(key)?;
		if !key.parameters.tick_pool_bits_valid() {
			return Err(Error::UnusedParameterBitsSet)
		}
		hooks::validate_hook_config(key, ctx.hooks.map(|hooks| hooks.hook_permissions()))?;
		hooks::validate_permissions_conflict(key)?;
		let mut lp_fee = lp_fee::initial(key.fee, MAX_LP_FEE)?;
		if self.pools.contains_key(key) {
			return Err(Error::PoolAlreadyInitialized)
		}

		let dispatch = ClHookDispatch::new(key, ctx.hooks);
		if let Some(fee) = dispatch.before_initialize(sender, sqrt_price)? {
			if lp_fee::is_override(fee) {
				lp_fee = lp_fee::remove_override_and_validate(fee, MAX_LP_FEE)?;
			}
		}
		let protocol_fee = ctx.protocol_fee_for_pool(key);

		let mut pool = PoolState::new();
		let tick = pool.initialize(sqrt_price, protocol_fee, lp_fee)?;
		self.pools.insert(key.clone(), pool);
		ctx.events.deposit_event(Event::Initialize {
			key: key.clone(),
			sender: sender.clone(),
			price: PoolPrice::Tick { sqrt_price, tick },
			protocol_fee,
			lp_fee,
		});

		dispatch.after_initialize(sender, sqrt_price, tick)?;
		Ok(tick)
	}

	/// Returns the caller's delta, fees included, and the fees alone.
	pub(crate) fn modify_liquidity(
		&mut self,
		mut ctx: ClContext<'_>,
		sender: &AccountId,
		key: &PoolKey,
		params: &ModifyLiquidityParams,
	) -> Result<(BalanceDelta, BalanceDelta), Error> {
		ctx.vault.ensure_locked()?;
		let pool = self.pool_mut(key)?;
		let dispatch = ClHookDispatch::new(key, ctx.hooks);

		dispatch.before_modify_liquidity(sender, params)?;
		let (principal_delta, fee_delta) =
			pool.modify_liquidity(sender, params, key.parameters.tick_spacing())?;
		let delta = principal_delta.checked_add(fee_delta)?;
		ctx.events.deposit_event(Event::ModifyLiquidity {
			key: key.clone(),
			sender: sender.clone(),
			tick_lower: params.tick_lower,
			tick_upper: params.tick_upper,
			liquidity_delta: params.liquidity_delta,
			salt: params.salt,
		});

		let (caller_delta, hook_delta) =
			dispatch.after_modify_liquidity(sender, params, delta, fee_delta)?;
		ctx.account_deltas(App::ClPoolManager, key, sender, caller_delta, hook_delta)?;
		Ok((caller_delta, fee_delta))
	}

	pub(crate) fn swap(
		&mut self,
		mut ctx: ClContext<'_>,
		sender: &AccountId,
		key: &PoolKey,
		params: &SwapParams,
	) -> Result<BalanceDelta, Error> {
		ctx.vault.ensure_locked()?;
		if params.amount_specified == 0 {
			return Err(Error::SwapAmountCannotBeZero)
		}
		let pool = self.pools.get_mut(key).ok_or(Error::PoolNotInitialized)?;
		let dispatch = ClHookDispatch::new(key, ctx.hooks);

		let (amount_to_swap, before_swap_delta, lp_fee_override) =
			dispatch.before_swap(sender, params)?;
		// The hook may have taken the whole amount.
		let (swap_delta, swap_fee) = if amount_to_swap == 0 {
			(BalanceDelta::ZERO, 0)
		} else {
			let outcome = pool.swap(
				&SwapParams { amount_specified: amount_to_swap, ..*params },
				key.parameters.tick_spacing(),
				lp_fee_override,
			)?;
			let input_currency = if params.zero_for_one { key.currency0 } else { key.currency1 };
			accrue_protocol_fee(
				&mut self.protocol_fees_accrued,
				input_currency,
				outcome.amount_to_protocol,
			)?;
			(outcome.delta, outcome.swap_fee)
		};
		let slot0 = pool.slot0();
		ctx.events.deposit_event(Event::Swap {
			key: key.clone(),
			sender: sender.clone(),
			delta: swap_delta,
			price: PoolPrice::Tick { sqrt_price: slot0.sqrt_price, tick: slot0.tick },
			swap_fee,
			protocol_fee: slot0.protocol_fee,
		});

		let (swapper_delta, hook_delta) =
			dispatch.after_swap(sender, params, swap_delta, before_swap_delta)?;
		ctx.account_deltas(App::ClPoolManager, key, sender, swapper_delta, hook_delta)?;
		Ok(swapper_delta)
	}

	pub(crate) fn donate(
		&mut self,
		ctx: ClContext<'_>,
		sender: &AccountId,
		key: &PoolKey,
		amount0: u128,
		amount1: u128,
	) -> Result<BalanceDelta, Error> {
		ctx.vault.ensure_locked()?;
		let pool = self.pool_mut(key)?;
		let dispatch = ClHookDispatch::new(key, ctx.hooks);

		dispatch.before_donate(sender, amount0, amount1)?;
		let delta = pool.donate(amount0, amount1)?;
		ctx.vault.account_app_balance_delta(App::ClPoolManager, key, delta, sender)?;
		let slot0 = pool.slot0();
		ctx.events.deposit_event(Event::Donate {
			key: key.clone(),
			sender: sender.clone(),
			amount0,
			amount1,
			price: PoolPrice::Tick { sqrt_price: slot0.sqrt_price, tick: slot0.tick },
		});

		dispatch.after_donate(sender, amount0, amount1)?;
		Ok(delta)
	}

	/// Sets the LP fee of a dynamic fee pool. Only the pool's hook may call this.
	pub(crate) fn update_dynamic_lp_fee(
		&mut self,
		ctx: ClContext<'_>,
		caller: &AccountId,
		key: &PoolKey,
		lp_fee: u32,
	) -> Result<(), Error> {
		if !lp_fee::is_dynamic(key.fee) || !key.is_hook(caller) {
			return Err(Error::UnauthorizedDynamicLpFeeUpdate)
		}
		lp_fee::validate(lp_fee, MAX_LP_FEE)?;
		self.pool_mut(key)?.set_lp_fee(lp_fee)?;
		ctx.events.deposit_event(Event::DynamicLpFeeUpdated { key: key.clone(), lp_fee });
		Ok(())
	}

	pub(crate) fn set_protocol_fee(
		&mut self,
		ctx: ClContext<'_>,
		caller: &AccountId,
		key: &PoolKey,
		protocol_fee: u32,
	) -> Result<(), Error> {
		if !ctx.protocol_fee_controller.is_controller(caller) {
			return Err(Error::InvalidCaller)
		}
		protocol_fee::validate(protocol_fee, ctx.config.max_protocol_fee)?;
		self.pool_mut(key)?.set_protocol_fee(protocol_fee)?;
		ctx.events.deposit_event(Event::ProtocolFeeUpdated { key: key.clone(), protocol_fee });
		Ok(())
	}

	pub fn pool(&self, key: &PoolKey) -> Option<&PoolState<AccountId>> {
		self.pools.get(key)
	}

	pub fn slot0(&self, key: &PoolKey) -> Option<Slot0> {
		self.pool(key).map(PoolState::slot0)
	}

	pub fn liquidity(&self, key: &PoolKey) -> Option<Liquidity> {
		self.pool(key).map(PoolState::liquidity)
	}

	pub fn position(
		&self,
		key: &PoolKey,
		owner: &AccountId,
		tick_lower: Tick,
		tick_upper: Tick,
		salt: Salt,
	) -> Option<Position> {
		self.pool(key).map(|pool| pool.position(owner, tick_lower, tick_upper, salt))
	}

	pub fn tick_info(&self, key: &PoolKey, tick: Tick) -> Option<tick_pool::TickInfo> {
		self.pool(key).and_then(|pool| pool.tick_info(tick).cloned())
	}

	pub fn protocol_fees_accrued(&self, currency: Currency) -> u128 {
		self.protocol_fees_accrued.get(&currency).copied().unwrap_or_default()
	}

	/// The SCALE encoding of a pool's whole state.
	pub fn encoded_pool_state(&self, key: &PoolKey) -> Option<Vec<u8>> {
		self.pool(key).map(Encode::encode)
	}
}

impl<B: AssetBank + Clone> Exchange<B> {
	/// Pays accrued protocol fees of tick pools to `recipient`. An `amount` of zero collects
	/// everything accrued. Returns the amount collected.
	pub fn cl_collect_protocol_fees(
		&mut self,
		caller: &AccountId,
		recipient: &AccountId,
		currency: Currency,
		amount: u128,
	) -> Result<u128, Error> {
		if !self.protocol_fee_controller.is_controller(caller) {
			return Err(Error::InvalidCaller)
		}
		let snapshot = self.state.cl.clone();
		let collected =
			crate::take_protocol_fees(&mut self.state.cl.protocol_fees_accrued, currency, amount)?;
		self.collect_fee(App::ClPoolManager, currency, collected, recipient).map_err(|error| {
			self.state.cl = snapshot;
			error
		})?;
		Ok(collected)
	}
}
