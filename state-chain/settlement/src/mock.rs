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

use core::cell::RefCell;
use sp_std::rc::Rc;

use amm::{
	bin_pool,
	common::{AccountId, BalanceDelta, Currency, Parameters, PoolKey},
	hooks::{BeforeSwapDelta, BinHooks, ClHooks, HookPermissions},
	tick_pool,
};
use amm_math::{SqrtPriceQ64F96, Tick};
use sp_core::H160;

use crate::{AssetBank, Config, Error, Exchange, InMemoryBank, ProtocolFeeController};

pub type TestExchange = Exchange<InMemoryBank>;

pub const ALICE: AccountId = AccountId::new([1; 32]);
pub const BOB: AccountId = AccountId::new([2; 32]);
pub const CAROL: AccountId = AccountId::new([3; 32]);
pub const HOOK: AccountId = AccountId::new([0xAA; 32]);
pub const CONTROLLER: AccountId = AccountId::new([0xCC; 32]);

pub const TOKEN_A: Currency = Currency::Token(H160([0x0A; 20]));
pub const TOKEN_B: Currency = Currency::Token(H160([0x0B; 20]));
pub const CURRENCIES: [Currency; 3] = [Currency::Native, TOKEN_A, TOKEN_B];

/// What every account except the controller starts with, in each currency.
pub const INITIAL_BALANCE: u128 = 1_000_000_000_000_000_000_000_000;

pub struct MockController {
	pub fee: u32,
}

impl ProtocolFeeController for MockController {
	fn protocol_fee_for_pool(&self, _key: &PoolKey) -> u32 {
		self.fee
	}

	fn is_controller(&self, account: &AccountId) -> bool {
		*account == CONTROLLER
	}
}

pub fn new_exchange_with(config: Config, protocol_fee: u32) -> TestExchange {
	let mut bank = InMemoryBank::default();
	for account in [ALICE, BOB, CAROL, HOOK] {
		for currency in CURRENCIES {
			bank.fund(&account, currency, INITIAL_BALANCE).unwrap();
		}
	}
	Exchange::new(config, bank, Box::new(MockController { fee: protocol_fee }))
}

pub fn new_exchange() -> TestExchange {
	new_exchange_with(Config::default(), 0)
}

pub fn cl_key(fee: u32, tick_spacing: Tick) -> PoolKey {
	PoolKey {
		currency0: TOKEN_A,
		currency1: TOKEN_B,
		hooks: None,
		fee,
		parameters: Parameters::for_tick_pool(0, tick_spacing),
	}
}

pub fn hooked_cl_key(permissions: HookPermissions, fee: u32, tick_spacing: Tick) -> PoolKey {
	PoolKey {
		hooks: Some(HOOK),
		parameters: Parameters::for_tick_pool(permissions.bitmap(), tick_spacing),
		..cl_key(fee, tick_spacing)
	}
}

pub fn bin_key(fee: u32, bin_step: u16) -> PoolKey {
	PoolKey {
		currency0: TOKEN_A,
		currency1: TOKEN_B,
		hooks: None,
		fee,
		parameters: Parameters::for_bin_pool(0, bin_step),
	}
}

pub fn hooked_bin_key(permissions: HookPermissions, fee: u32, bin_step: u16) -> PoolKey {
	PoolKey {
		hooks: Some(HOOK),
		parameters: Parameters::for_bin_pool(permissions.bitmap(), bin_step),
		..bin_key(fee, bin_step)
	}
}

/// Pays `amount` into the vault for `account` and credits it: tokens by transfer, the native
/// currency as value.
pub fn pay(
	exchange: &mut TestExchange,
	account: &AccountId,
	currency: Currency,
	amount: u128,
) -> Result<(), Error> {
	exchange.sync(currency);
	if currency.is_native() {
		exchange.settle(account, amount)?;
	} else {
		exchange.bank_mut().transfer_to_vault(account, currency, amount)?;
		exchange.settle(account, 0)?;
	}
	Ok(())
}

/// Pays whatever `account` owes and takes whatever it is owed.
pub fn settle_all(exchange: &mut TestExchange, account: &AccountId) -> Result<(), Error> {
	for currency in CURRENCIES {
		let delta = exchange.vault().currency_delta(account, currency);
		if delta < 0 {
			pay(exchange, account, currency, delta.unsigned_abs())?;
		} else if delta > 0 {
			exchange.take(account, currency, account, delta.unsigned_abs())?;
		}
	}
	Ok(())
}

pub fn balance(exchange: &TestExchange, account: &AccountId, currency: Currency) -> u128 {
	exchange.bank().balance_of(account, currency)
}

pub fn vault_balance(exchange: &TestExchange, currency: Currency) -> u128 {
	exchange.bank().vault_balance(currency)
}

pub type Calls = Rc<RefCell<Vec<&'static str>>>;

/// A hook whose answers are fixed up front, recording the calls it receives.
#[derive(Default)]
pub struct TestHook {
	pub permissions: HookPermissions,
	pub calls: Calls,
	pub initial_fee: Option<u32>,
	pub liquidity_claim: BalanceDelta,
	pub before_swap: (BeforeSwapDelta, u32),
	pub after_swap: i128,
	pub fail_swaps: Option<&'static str>,
}

impl TestHook {
	pub fn new(permissions: HookPermissions) -> (Self, Calls) {
		let hook = Self { permissions, ..Default::default() };
		let calls = hook.calls.clone();
		(hook, calls)
	}

	fn record(&self, call: &'static str) {
		self.calls.borrow_mut().push(call);
	}

	fn swap_result<T>(&self, call: &'static str, value: T) -> Result<T, &'static str> {
		self.record(call);
		match self.fail_swaps {
			Some(reason) => Err(reason),
			None => Ok(value),
		}
	}
}

impl ClHooks for TestHook {
	fn hook_permissions(&self) -> HookPermissions {
		self.permissions
	}

	fn before_initialize(
		&self,
		_sender: &AccountId,
		_key: &PoolKey,
		_sqrt_price: SqrtPriceQ64F96,
	) -> Result<Option<u32>, &'static str> {
		self.record("before_initialize");
		Ok(self.initial_fee)
	}

	fn after_initialize(
		&self,
		_sender: &AccountId,
		_key: &PoolKey,
		_sqrt_price: SqrtPriceQ64F96,
		_tick: Tick,
	) -> Result<(), &'static str> {
		self.record("after_initialize");
		Ok(())
	}

	fn before_add_liquidity(
		&self,
		_sender: &AccountId,
		_key: &PoolKey,
		_params: &tick_pool::ModifyLiquidityParams,
	) -> Result<(), &'static str> {
		self.record("before_add_liquidity");
		Ok(())
	}

	fn after_add_liquidity(
		&self,
		_sender: &AccountId,
		_key: &PoolKey,
		_params: &tick_pool::ModifyLiquidityParams,
		_delta: BalanceDelta,
		_fee_delta: BalanceDelta,
	) -> Result<BalanceDelta, &'static str> {
		self.record("after_add_liquidity");
		Ok(self.liquidity_claim)
	}

	fn before_swap(
		&self,
		_sender: &AccountId,
		_key: &PoolKey,
		_params: &tick_pool::SwapParams,
	) -> Result<(BeforeSwapDelta, u32), &'static str> {
		self.swap_result("before_swap", self.before_swap)
	}

	fn after_swap(
		&self,
		_sender: &AccountId,
		_key: &PoolKey,
		_params: &tick_pool::SwapParams,
		_delta: BalanceDelta,
	) -> Result<i128, &'static str> {
		self.swap_result("after_swap", self.after_swap)
	}
}

impl BinHooks for TestHook {
	fn hook_permissions(&self) -> HookPermissions {
		self.permissions
	}

	fn before_initialize(
		&self,
		_sender: &AccountId,
		_key: &PoolKey,
		_active_id: u32,
	) -> Result<Option<u32>, &'static str> {
		self.record("before_initialize");
		Ok(self.initial_fee)
	}

	fn before_mint(
		&self,
		_sender: &AccountId,
		_key: &PoolKey,
		_params: &bin_pool::MintParams,
	) -> Result<u32, &'static str> {
		self.record("before_mint");
		Ok(0)
	}

	fn after_mint(
		&self,
		_sender: &AccountId,
		_key: &PoolKey,
		_params: &bin_pool::MintParams,
		_delta: BalanceDelta,
	) -> Result<BalanceDelta, &'static str> {
		self.record("after_mint");
		Ok(self.liquidity_claim)
	}

	fn before_swap(
		&self,
		_sender: &AccountId,
		_key: &PoolKey,
		_params: &bin_pool::SwapParams,
	) -> Result<(BeforeSwapDelta, u32), &'static str> {
		self.swap_result("before_swap", self.before_swap)
	}

	fn after_swap(
		&self,
		_sender: &AccountId,
		_key: &PoolKey,
		_params: &bin_pool::SwapParams,
		_delta: BalanceDelta,
	) -> Result<i128, &'static str> {
		self.swap_result("after_swap", self.after_swap)
	}
}
