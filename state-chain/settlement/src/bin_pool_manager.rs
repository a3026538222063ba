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

//! Drives bin pools, in the same way `cl_pool_manager` drives tick pools.

use amm::{
	bin_pool::{BurnOutcome, BurnParams, MintOutcome, MintParams, PoolState, Slot0, SwapParams},
	common::{AccountId, BalanceDelta, Currency, PoolKey, Salt},
	hooks::{self, BinHookDispatch},
};
use amm_math::{
	fees::{lp_fee, protocol_fee},
	packed::PackedAmounts,
};
use codec::{Decode, Encode};
use scale_info::TypeInfo;
use sp_core::U256;
use sp_std::{collections::btree_map::BTreeMap, vec::Vec};

use crate::{accrue_protocol_fee, App, AssetBank, BinContext, Error, Event, Exchange, PoolPrice};

/// The LP fee cap of bin pools.
pub const MAX_LP_FEE: u32 = lp_fee::TEN_PERCENT_FEE;

#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode, TypeInfo)]
pub struct BinPoolManager {
	pools: BTreeMap<PoolKey, PoolState<AccountId>>,
	protocol_fees_accrued: BTreeMap<Currency, u128>,
}

impl BinPoolManager {
	fn pool_mut(&mut self, key: &PoolKey) -> Result<&mut PoolState<AccountId>, Error> {
		self.pools.get_mut(key).ok_or(Error::PoolNotInitialized)
	}

	pub(crate) fn initialize(
		&mut self,
		ctx: BinContext<'_>,
		sender: &AccountId,
		key: &PoolKey,
		active_id: u32,
	) -> Result<(), Error> {
		let bin_step = key.parameters.bin_step();
		if bin_step < ctx.config.min_bin_step {
			return Err(Error::BinStepTooSmall(bin_step))
		}
		if bin_step > ctx.config.max_bin_step {
			return Err(Error::BinStepTooLarge(bin_step))
		}
		ctx.validate_currencies(key)?;
		if !key.parameters.bin_pool_bits_valid() {
			return Err(Error::UnusedParameterBitsSet)
		}
		hooks::validate_hook_config(key, ctx.hooks.map(|hooks| hooks.hook_permissions()))?;
		hooks::validate_permissions_conflict(key)?;
		let mut lp_fee = lp_fee::initial(key.fee, MAX_LP_FEE)?;
		if self.pools.contains_key(key) {
			return Err(Error::PoolAlreadyInitialized)
		}

		let dispatch = BinHookDispatch::new(key, ctx.hooks);
		if let Some(fee) = dispatch.before_initialize(sender, active_id)? {
			if lp_fee::is_override(fee) {
				lp_fee = lp_fee::remove_override_and_validate(fee, MAX_LP_FEE)?;
			}
		}
		let protocol_fee = ctx.protocol_fee_for_pool(key);

		let mut pool = PoolState::new();
		pool.initialize(active_id, protocol_fee, lp_fee, bin_step)?;
		self.pools.insert(key.clone(), pool);
		ctx.events.deposit_event(Event::Initialize {
			key: key.clone(),
			sender: sender.clone(),
			price: PoolPrice::Bin { active_id },
			protocol_fee,
			lp_fee,
		});

		dispatch.after_initialize(sender, active_id)?;
		Ok(())
	}

	pub(crate) fn mint(
		&mut self,
		mut ctx: BinContext<'_>,
		sender: &AccountId,
		key: &PoolKey,
		params: &MintParams,
	) -> Result<(BalanceDelta, MintOutcome), Error> {
		ctx.vault.ensure_locked()?;
		let pool = self.pools.get_mut(key).ok_or(Error::PoolNotInitialized)?;
		let dispatch = BinHookDispatch::new(key, ctx.hooks);

		let lp_fee_override = dispatch.before_mint(sender, params)?;
		let outcome = pool.mint(sender, params, key.parameters.bin_step(), lp_fee_override)?;
		accrue_protocol_fee(
			&mut self.protocol_fees_accrued,
			key.currency0,
			outcome.fee_to_protocol.x,
		)?;
		accrue_protocol_fee(
			&mut self.protocol_fees_accrued,
			key.currency1,
			outcome.fee_to_protocol.y,
		)?;
		ctx.events.deposit_event(Event::Mint {
			key: key.clone(),
			sender: sender.clone(),
			ids: outcome.ids.clone(),
			salt: params.salt,
			amounts: outcome.amounts.clone(),
			composition_fee: outcome.composition_fee,
			fee_to_protocol: outcome.fee_to_protocol,
		});

		let (caller_delta, hook_delta) = dispatch.after_mint(sender, params, outcome.delta)?;
		ctx.account_deltas(App::BinPoolManager, key, sender, caller_delta, hook_delta)?;
		Ok((caller_delta, outcome))
	}

	pub(crate) fn burn(
		&mut self,
		mut ctx: BinContext<'_>,
		sender: &AccountId,
		key: &PoolKey,
		params: &BurnParams,
	) -> Result<(BalanceDelta, BurnOutcome), Error> {
		ctx.vault.ensure_locked()?;
		let pool = self.pool_mut(key)?;
		let dispatch = BinHookDispatch::new(key, ctx.hooks);

		dispatch.before_burn(sender, params)?;
		let outcome = pool.burn(sender, params)?;
		ctx.events.deposit_event(Event::Burn {
			key: key.clone(),
			sender: sender.clone(),
			ids: outcome.ids.clone(),
			salt: params.salt,
			amounts: outcome.amounts.clone(),
		});

		let (caller_delta, hook_delta) = dispatch.after_burn(sender, params, outcome.delta)?;
		ctx.account_deltas(App::BinPoolManager, key, sender, caller_delta, hook_delta)?;
		Ok((caller_delta, outcome))
	}

	pub(crate) fn swap(
		&mut self,
		mut ctx: BinContext<'_>,
		sender: &AccountId,
		key: &PoolKey,
		params: &SwapParams,
	) -> Result<BalanceDelta, Error> {
		ctx.vault.ensure_locked()?;
		if params.amount_specified == 0 {
			return Err(Error::SwapAmountCannotBeZero)
		}
		let pool = self.pools.get_mut(key).ok_or(Error::PoolNotInitialized)?;
		let dispatch = BinHookDispatch::new(key, ctx.hooks);

		let (amount_to_swap, before_swap_delta, lp_fee_override) =
			dispatch.before_swap(sender, params)?;
		let (swap_delta, swap_fee) = if amount_to_swap == 0 {
			(BalanceDelta::ZERO, 0)
		} else {
			let outcome = pool.swap(
				&SwapParams { amount_specified: amount_to_swap, ..*params },
				key.parameters.bin_step(),
				lp_fee_override,
			)?;
			let input_currency = if params.swap_for_y { key.currency0 } else { key.currency1 };
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
			price: PoolPrice::Bin { active_id: slot0.active_id },
			swap_fee,
			protocol_fee: slot0.protocol_fee,
		});

		let (swapper_delta, hook_delta) =
			dispatch.after_swap(sender, params, swap_delta, before_swap_delta)?;
		ctx.account_deltas(App::BinPoolManager, key, sender, swapper_delta, hook_delta)?;
		Ok(swapper_delta)
	}

	/// Donates to the active bin.
	pub(crate) fn donate(
		&mut self,
		ctx: BinContext<'_>,
		sender: &AccountId,
		key: &PoolKey,
		amount0: u128,
		amount1: u128,
	) -> Result<BalanceDelta, Error> {
		ctx.vault.ensure_locked()?;
		let pool = self.pool_mut(key)?;
		let dispatch = BinHookDispatch::new(key, ctx.hooks);

		dispatch.before_donate(sender, amount0, amount1)?;
		let (delta, active_id) = pool.donate(amount0, amount1, key.parameters.bin_step())?;
		ctx.vault.account_app_balance_delta(App::BinPoolManager, key, delta, sender)?;
		ctx.events.deposit_event(Event::Donate {
			key: key.clone(),
			sender: sender.clone(),
			amount0,
			amount1,
			price: PoolPrice::Bin { active_id },
		});

		dispatch.after_donate(sender, amount0, amount1)?;
		Ok(delta)
	}

	pub(crate) fn update_dynamic_lp_fee(
		&mut self,
		ctx: BinContext<'_>,
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
		ctx: BinContext<'_>,
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

	/// The reserves and total shares of a bin.
	pub fn bin(&self, key: &PoolKey, id: u32) -> Option<(PackedAmounts, U256)> {
		self.pool(key).map(|pool| pool.bin(id))
	}

	pub fn position(&self, key: &PoolKey, owner: &AccountId, id: u32, salt: Salt) -> Option<U256> {
		self.pool(key).map(|pool| pool.position(owner, id, salt))
	}

	pub fn next_non_empty_bin(&self, key: &PoolKey, swap_for_y: bool, id: u32) -> Option<u32> {
		self.pool(key).and_then(|pool| pool.next_non_empty_bin(swap_for_y, id))
	}

	pub fn protocol_fees_accrued(&self, currency: Currency) -> u128 {
		self.protocol_fees_accrued.get(&currency).copied().unwrap_or_default()
	}

	pub fn encoded_pool_state(&self, key: &PoolKey) -> Option<Vec<u8>> {
		self.pool(key).map(Encode::encode)
	}
}

impl<B: AssetBank + Clone> Exchange<B> {
	/// Pays accrued protocol fees of bin pools to `recipient`, see
	/// [`Exchange::cl_collect_protocol_fees`].
	pub fn bin_collect_protocol_fees(
		&mut self,
		caller: &AccountId,
		recipient: &AccountId,
		currency: Currency,
		amount: u128,
	) -> Result<u128, Error> {
		if !self.protocol_fee_controller.is_controller(caller) {
			return Err(Error::InvalidCaller)
		}
		let snapshot = self.state.bin.clone();
		let collected =
			crate::take_protocol_fees(&mut self.state.bin.protocol_fees_accrued, currency, amount)?;
		self.collect_fee(App::BinPoolManager, currency, collected, recipient).map_err(|error| {
			self.state.bin = snapshot;
			error
		})?;
		Ok(collected)
	}
}
