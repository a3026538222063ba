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


//! The settlement core of the exchange. All pools share one vault. Callers take the vault's lock,
//! run any number of pool operations and transfers under it, and must leave every delta settled
//! before the lock is released. Otherwise the whole locked operation is rolled back.

#![cfg_attr(not(feature = "std"), no_std)]

pub mod bin_pool_manager;
pub mod cl_pool_manager;
pub mod config;
pub mod error;
pub mod events;
pub mod ledger;
pub mod vault;

#[cfg(test)]
mod mock;

use amm::{
	bin_pool,
	common::{AccountId, BalanceDelta, Currency, PoolKey},
	hooks::{BinHooks, ClHooks},
	tick_pool,
};
use amm_math::{fees::protocol_fee, SqrtPriceQ64F96, Tick, OVERFLOW, UNDERFLOW};
use sp_std::{boxed::Box, collections::btree_map::BTreeMap, vec::Vec};

pub use bin_pool_manager::BinPoolManager;
pub use cl_pool_manager::ClPoolManager;
pub use config::{Config, NoProtocolFee, ProtocolFeeController};
pub use error::Error;
pub use events::{Event, Events, PoolPrice};
pub use vault::{App, AssetBank, InMemoryBank, VaultState};

/// Everything a failed lock or operation rolls back.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct State {
	vault: VaultState,
	cl: ClPoolManager,
	bin: BinPoolManager,
	events: Events,
}

/// The hook modules pools may name in their keys.
#[derive(Default)]
pub struct HookRegistry {
	cl: BTreeMap<AccountId, Box<dyn ClHooks>>,
	bin: BTreeMap<AccountId, Box<dyn BinHooks>>,
}

impl HookRegistry {
	fn cl(&self, key: &PoolKey) -> Option<&dyn ClHooks> {
		key.hooks.as_ref().and_then(|hook| self.cl.get(hook)).map(|hooks| hooks.as_ref())
	}

	fn bin(&self, key: &PoolKey) -> Option<&dyn BinHooks> {
		key.hooks.as_ref().and_then(|hook| self.bin.get(hook)).map(|hooks| hooks.as_ref())
	}
}

/// What a pool manager operation may touch besides its own pools.
pub struct Context<'a, H: ?Sized> {
	pub config: &'a Config,
	pub protocol_fee_controller: &'a dyn ProtocolFeeController,
	pub hooks: Option<&'a H>,
	pub vault: &'a mut VaultState,
	pub events: &'a mut Events,
}

pub type ClContext<'a> = Context<'a, dyn ClHooks + 'a>;
pub type BinContext<'a> = Context<'a, dyn BinHooks + 'a>;

impl<H: ?Sized> Context<'_, H> {
	/// The protocol fee a new pool starts with. An invalid fee from the controller is ignored.
	fn protocol_fee_for_pool(&self, key: &PoolKey) -> u32 {
		let fee = self.protocol_fee_controller.protocol_fee_for_pool(key);
		match protocol_fee::validate(fee, self.config.max_protocol_fee) {
			Ok(()) => fee,
			Err(error) => {
				log::warn!("Ignoring protocol fee for new pool: {error:?}");
				0
			},
		}
	}

	/// Checks the parts of a pool key both engines share.
	fn validate_currencies(&self, key: &PoolKey) -> Result<(), Error> {
		if !key.currencies_ordered() {
			return Err(Error::CurrenciesOutOfOrderOrEqual)
		}
		if key.currency0.is_native() && !self.config.native_currency_enabled {
			return Err(Error::NativeCurrencyDisabled)
		}
		Ok(())
	}

	/// Accounts an operation's result to its caller and the hook's claim on it to the hook.
	fn account_deltas(
		&mut self,
		app: App,
		key: &PoolKey,
		sender: &AccountId,
		caller_delta: BalanceDelta,
		hook_delta: BalanceDelta,
	) -> Result<(), Error> {
		match &key.hooks {
			Some(hook) if !hook_delta.is_zero() => self.vault.account_split_balance_delta(
				app,
				key,
				(sender, caller_delta),
				(hook, hook_delta),
			),
			_ => self.vault.account_app_balance_delta(app, key, caller_delta, sender),
		}
	}
}

fn accrue_protocol_fee(
	accrued: &mut BTreeMap<Currency, u128>,
	currency: Currency,
	amount: u128,
) -> Result<(), Error> {
	if amount > 0 {
		let total = accrued.entry(currency).or_default();
		*total = total.checked_add(amount).ok_or(OVERFLOW)?;
	}
	Ok(())
}

/// Removes `amount` from the accrued protocol fees, or all of them if `amount` is zero, and
/// returns the amount removed.
fn take_protocol_fees(
	accrued: &mut BTreeMap<Currency, u128>,
	currency: Currency,
	amount: u128,
) -> Result<u128, Error> {
	let total = accrued.get(&currency).copied().unwrap_or_default();
	let collected = if amount == 0 { total } else { amount };
	let remaining = total.checked_sub(collected).ok_or(UNDERFLOW)?;
	if remaining == 0 {
		accrued.remove(&currency);
	} else {
		accrued.insert(currency, remaining);
	}
	Ok(collected)
}

/// Runs `f`, restoring `state` if it fails.
///
/// The snapshot is a clone of the whole state, every pool of both managers included, so each
/// call costs time linear in the total state. [`Exchange::lock`] clones it again with the bank.
fn with_transaction<R>(
	state: &mut State,
	f: impl FnOnce(&mut State) -> Result<R, Error>,
) -> Result<R, Error> {
	let snapshot = state.clone();
	f(state).map_err(|error| {
		log::warn!("Operation failed and was rolled back: {error:?}");
		*state = snapshot;
		error
	})
}

/// The vault, both pool managers and the hook modules they call.
pub struct Exchange<B> {
	config: Config,
	protocol_fee_controller: Box<dyn ProtocolFeeController>,
	hooks: HookRegistry,
	bank: B,
	state: State,
}

impl<B: AssetBank + Clone> Exchange<B> {
	pub fn new(
		config: Config,
		bank: B,
		protocol_fee_controller: Box<dyn ProtocolFeeController>,
	) -> Self {
		Self {
			config,
			protocol_fee_controller,
			hooks: Default::default(),
			bank,
			state: Default::default(),
		}
	}

	pub fn register_cl_hooks(&mut self, account: AccountId, hooks: Box<dyn ClHooks>) {
		self.hooks.cl.insert(account, hooks);
	}

	pub fn register_bin_hooks(&mut self, account: AccountId, hooks: Box<dyn BinHooks>) {
		self.hooks.bin.insert(account, hooks);
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn bank(&self) -> &B {
		&self.bank
	}

	/// For transfers into the vault made outside its own calls, between `sync` and `settle`.
	pub fn bank_mut(&mut self) -> &mut B {
		&mut self.bank
	}

	pub fn vault(&self) -> &VaultState {
		&self.state.vault
	}

	pub fn cl(&self) -> &ClPoolManager {
		&self.state.cl
	}

	pub fn bin(&self) -> &BinPoolManager {
		&self.state.bin
	}

	pub fn events(&self) -> &[Event] {
		self.state.events.as_slice()
	}

	pub fn take_events(&mut self) -> Vec<Event> {
		self.state.events.take()
	}

	fn with_cl<R>(
		&mut self,
		key: &PoolKey,
		f: impl FnOnce(&mut ClPoolManager, ClContext<'_>) -> Result<R, Error>,
	) -> Result<R, Error> {
		let Self { config, protocol_fee_controller, hooks, state, .. } = self;
		let hooks = hooks.cl(key);
		with_transaction(state, |state| {
			let State { vault, cl, events, .. } = state;
			f(
				cl,
				Context {
					config,
					protocol_fee_controller: &**protocol_fee_controller,
					hooks,
					vault,
					events,
				},
			)
		})
	}

	fn with_bin<R>(
		&mut self,
		key: &PoolKey,
		f: impl FnOnce(&mut BinPoolManager, BinContext<'_>) -> Result<R, Error>,
	) -> Result<R, Error> {
		let Self { config, protocol_fee_controller, hooks, state, .. } = self;
		let hooks = hooks.bin(key);
		with_transaction(state, |state| {
			let State { vault, bin, events, .. } = state;
			f(
				bin,
				Context {
					config,
					protocol_fee_controller: &**protocol_fee_controller,
					hooks,
					vault,
					events,
				},
			)
		})
	}

	pub fn cl_initialize(
		&mut self,
		sender: &AccountId,
		key: &PoolKey,
		sqrt_price: SqrtPriceQ64F96,
	) -> Result<Tick, Error> {
		self.with_cl(key, |cl, ctx| cl.initialize(ctx, sender, key, sqrt_price))
	}

	/// Returns the caller's delta, fees included, and the fees alone.
	pub fn cl_modify_liquidity(
		&mut self,
		sender: &AccountId,
		key: &PoolKey,
		params: &tick_pool::ModifyLiquidityParams,
	) -> Result<(BalanceDelta, BalanceDelta), Error> {
		self.with_cl(key, |cl, ctx| cl.modify_liquidity(ctx, sender, key, params))
	}

	pub fn cl_swap(
		&mut self,
		sender: &AccountId,
		key: &PoolKey,
		params: &tick_pool::SwapParams,
	) -> Result<BalanceDelta, Error> {
		self.with_cl(key, |cl, ctx| cl.swap(ctx, sender, key, params))
	}

	pub fn cl_donate(
		&mut self,
		sender: &AccountId,
		key: &PoolKey,
		amount0: u128,
		amount1: u128,
	) -> Result<BalanceDelta, Error> {
		self.with_cl(key, |cl, ctx| cl.donate(ctx, sender, key, amount0, amount1))
	}

	pub fn cl_update_dynamic_lp_fee(
		&mut self,
		caller: &AccountId,
		key: &PoolKey,
		lp_fee: u32,
	) -> Result<(), Error> {
		self.with_cl(key, |cl, ctx| cl.update_dynamic_lp_fee(ctx, caller, key, lp_fee))
	}

	pub fn cl_set_protocol_fee(
		&mut self,
		caller: &AccountId,
		key: &PoolKey,
		protocol_fee: u32,
	) -> Result<(), Error> {
		self.with_cl(key, |cl, ctx| cl.set_protocol_fee(ctx, caller, key, protocol_fee))
	}

	pub fn bin_initialize(
		&mut self,
		sender: &AccountId,
		key: &PoolKey,
		active_id: u32,
	) -> Result<(), Error> {
		self.with_bin(key, |bin, ctx| bin.initialize(ctx, sender, key, active_id))
	}

	/// Returns the caller's delta and the engine's record of the mint.
	pub fn bin_mint(
		&mut self,
		sender: &AccountId,
		key: &PoolKey,
		params: &bin_pool::MintParams,
	) -> Result<(BalanceDelta, bin_pool::MintOutcome), Error> {
		self.with_bin(key, |bin, ctx| bin.mint(ctx, sender, key, params))
	}

	pub fn bin_burn(
		&mut self,
		sender: &AccountId,
		key: &PoolKey,
		params: &bin_pool::BurnParams,
	) -> Result<(BalanceDelta, bin_pool::BurnOutcome), Error> {
		self.with_bin(key, |bin, ctx| bin.burn(ctx, sender, key, params))
	}

	pub fn bin_swap(
		&mut self,
		sender: &AccountId,
		key: &PoolKey,
		params: &bin_pool::SwapParams,
	) -> Result<BalanceDelta, Error> {
		self.with_bin(key, |bin, ctx| bin.swap(ctx, sender, key, params))
	}

	pub fn bin_donate(
		&mut self,
		sender: &AccountId,
		key: &PoolKey,
		amount0: u128,
		amount1: u128,
	) -> Result<BalanceDelta, Error> {
		self.with_bin(key, |bin, ctx| bin.donate(ctx, sender, key, amount0, amount1))
	}

	pub fn bin_update_dynamic_lp_fee(
		&mut self,
		caller: &AccountId,
		key: &PoolKey,
		lp_fee: u32,
	) -> Result<(), Error> {
		self.with_bin(key, |bin, ctx| bin.update_dynamic_lp_fee(ctx, caller, key, lp_fee))
	}

	pub fn bin_set_protocol_fee(
		&mut self,
		caller: &AccountId,
		key: &PoolKey,
		protocol_fee: u32,
	) -> Result<(), Error> {
		self.with_bin(key, |bin, ctx| bin.set_protocol_fee(ctx, caller, key, protocol_fee))
	}
}
