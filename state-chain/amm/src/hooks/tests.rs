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

use amm_math::fees::lp_fee::{DYNAMIC_FEE_FLAG, OVERRIDE_FEE_FLAG};
use sp_core::{H160, H256};

use super::*;
use crate::{
	common::{Currency, Parameters},
	tick_pool::{ModifyLiquidityParams, SwapParams},
};

fn hook_account() -> AccountId {
	AccountId::new([0xAA; 32])
}

fn alice() -> AccountId {
	AccountId::new([1; 32])
}

fn key_with(permissions: HookPermissions, fee: u32) -> PoolKey {
	PoolKey {
		currency0: Currency::Native,
		currency1: Currency::Token(H160::repeat_byte(1)),
		hooks: Some(hook_account()),
		fee,
		parameters: Parameters::for_tick_pool(permissions.bitmap(), 10),
	}
}

#[derive(Default)]
struct Recorder {
	permissions: HookPermissions,
	before_swap: (BeforeSwapDelta, u32),
	after_swap: i128,
	after_liquidity: BalanceDelta,
	fail_with: Option<&'static str>,
	calls: RefCell<Vec<&'static str>>,
}

impl Recorder {
	fn record(&self, call: &'static str) -> Result<(), &'static str> {
		self.calls.borrow_mut().push(call);
		match self.fail_with {
			Some(reason) => Err(reason),
			None => Ok(()),
		}
	}

	fn calls(&self) -> Vec<&'static str> {
		self.calls.borrow().clone()
	}
}

impl ClHooks for Recorder {
	fn hook_permissions(&self) -> HookPermissions {
		self.permissions
	}

	fn before_add_liquidity(
		&self,
		_sender: &AccountId,
		_key: &PoolKey,
		_params: &ModifyLiquidityParams,
	) -> Result<(), &'static str> {
		self.record("before_add_liquidity")
	}

	fn before_remove_liquidity(
		&self,
		_sender: &AccountId,
		_key: &PoolKey,
		_params: &ModifyLiquidityParams,
	) -> Result<(), &'static str> {
		self.record("before_remove_liquidity")
	}

	fn after_add_liquidity(
		&self,
		_sender: &AccountId,
		_key: &PoolKey,
		_params: &ModifyLiquidityParams,
		_delta: BalanceDelta,
		_fee_delta: BalanceDelta,
	) -> Result<BalanceDelta, &'static str> {
		self.record("after_add_liquidity").map(|_| self.after_liquidity)
	}

	fn before_swap(
		&self,
		_sender: &AccountId,
		_key: &PoolKey,
		_params: &SwapParams,
	) -> Result<(BeforeSwapDelta, u32), &'static str> {
		self.record("before_swap").map(|_| self.before_swap)
	}

	fn after_swap(
		&self,
		_sender: &AccountId,
		_key: &PoolKey,
		_params: &SwapParams,
		_delta: BalanceDelta,
	) -> Result<i128, &'static str> {
		self.record("after_swap").map(|_| self.after_swap)
	}
}

fn liquidity_params(liquidity_delta: i128) -> ModifyLiquidityParams {
	ModifyLiquidityParams { tick_lower: -60, tick_upper: 60, liquidity_delta, salt: H256::zero() }
}

fn swap_params(zero_for_one: bool, amount_specified: i128) -> SwapParams {
	SwapParams { zero_for_one, amount_specified, sqrt_price_limit: Default::default() }
}

#[test]
fn permission_sets() {
	let permissions: HookPermissions =
		[Permission::BeforeSwap, Permission::AfterDonate].into_iter().collect();
	assert_eq!(permissions.bitmap(), (1 << 6) | (1 << 9));
	assert!(permissions.contains(Permission::BeforeSwap));
	assert!(!permissions.contains(Permission::AfterSwap));
	assert_eq!(
		permissions.iter().collect::<Vec<_>>(),
		vec![Permission::BeforeSwap, Permission::AfterDonate]
	);
	assert_eq!(HookPermissions::from_bitmap(0x3FFF).iter().count(), Permission::ALL.len());
}

#[test]
fn hook_config_validation() {
	let permissions = HookPermissions::NONE.with(Permission::BeforeSwap);
	let key = key_with(permissions, 3000);
	assert_eq!(validate_hook_config(&key, Some(permissions)), Ok(()));
	assert_eq!(
		validate_hook_config(&key, Some(permissions.with(Permission::AfterSwap))),
		Err(HookError::ConfigValidation)
	);
	// The hook must be known to declare its permissions.
	assert_eq!(validate_hook_config(&key, None), Err(HookError::ConfigValidation));

	let no_hook = PoolKey { hooks: None, parameters: Parameters::for_tick_pool(0, 10), ..key };
	assert_eq!(validate_hook_config(&no_hook, None), Ok(()));
	assert_eq!(
		validate_hook_config(&PoolKey { fee: DYNAMIC_FEE_FLAG, ..no_hook.clone() }, None),
		Err(HookError::ConfigValidation)
	);
	assert_eq!(
		validate_hook_config(
			&PoolKey { parameters: Parameters::for_tick_pool(1, 10), ..no_hook },
			None
		),
		Err(HookError::ConfigValidation)
	);
}

#[test]
fn returns_delta_requires_its_call() {
	for permission in Permission::ALL {
		let key = key_with(HookPermissions::NONE.with(permission), 0);
		match permission.requires() {
			Some(_) => assert_eq!(
				validate_permissions_conflict(&key),
				Err(HookError::PermissionsConflict(permission))
			),
			None => assert_eq!(validate_permissions_conflict(&key), Ok(())),
		}
		if let Some(required) = permission.requires() {
			let key = key_with(HookPermissions::NONE.with(permission).with(required), 0);
			assert_eq!(validate_permissions_conflict(&key), Ok(()));
		}
	}
}

#[test]
fn before_swap_delta_keeps_the_swap_type() {
	assert_eq!(apply_before_swap_delta(-100, 0), Ok(-100));
	assert_eq!(apply_before_swap_delta(-100, 30), Ok(-70));
	assert_eq!(apply_before_swap_delta(-100, 100), Ok(0));
	assert_eq!(apply_before_swap_delta(-100, 101), Err(HookError::DeltaExceedsSwapAmount));
	assert_eq!(apply_before_swap_delta(100, -40), Ok(60));
	assert_eq!(apply_before_swap_delta(100, -101), Err(HookError::DeltaExceedsSwapAmount));
	assert!(matches!(apply_before_swap_delta(i128::MAX, 1), Err(HookError::Math(_))));
}

#[test]
fn swap_delta_split_follows_the_specified_currency() {
	let swap_delta = BalanceDelta::new(-100, 90);
	// Exact input of currency zero: specified is currency zero.
	assert_eq!(
		split_swap_delta(-100, true, swap_delta, 10, -5),
		Ok((BalanceDelta::new(-110, 95), BalanceDelta::new(10, -5)))
	);
	// Exact output of currency zero: specified is currency zero.
	assert_eq!(
		split_swap_delta(100, false, swap_delta, 10, -5),
		Ok((BalanceDelta::new(-110, 95), BalanceDelta::new(10, -5)))
	);
	// Exact input of currency one: specified is currency one.
	assert_eq!(
		split_swap_delta(-100, false, swap_delta, 10, -5),
		Ok((BalanceDelta::new(-95, 80), BalanceDelta::new(-5, 10)))
	);
	assert_eq!(split_swap_delta(-100, true, swap_delta, 0, 0), Ok((swap_delta, BalanceDelta::ZERO)));
}

#[test]
fn calls_are_gated_by_permissions() {
	let hooks = Recorder {
		permissions: HookPermissions::NONE.with(Permission::BeforeAddLiquidity),
		..Default::default()
	};
	let key = key_with(hooks.permissions, 3000);
	let dispatch = ClHookDispatch::new(&key, Some(&hooks));

	dispatch.before_modify_liquidity(&alice(), &liquidity_params(10)).unwrap();
	dispatch.before_modify_liquidity(&alice(), &liquidity_params(-10)).unwrap();
	dispatch.before_modify_liquidity(&alice(), &liquidity_params(0)).unwrap();
	assert_eq!(
		dispatch.before_swap(&alice(), &swap_params(true, -100)).unwrap(),
		(-100, BeforeSwapDelta::ZERO, 0)
	);
	assert_eq!(hooks.calls(), vec!["before_add_liquidity"]);
}

#[test]
fn hooks_are_not_called_for_their_own_operations() {
	let hooks = Recorder {
		permissions: HookPermissions::NONE
			.with(Permission::BeforeSwap)
			.with(Permission::BeforeSwapReturnsDelta)
			.with(Permission::AfterSwap),
		before_swap: (BeforeSwapDelta { specified: 10, unspecified: 0 }, 0),
		..Default::default()
	};
	let key = key_with(hooks.permissions, 3000);
	let dispatch = ClHookDispatch::new(&key, Some(&hooks));
	let params = swap_params(true, -100);

	assert_eq!(
		dispatch.before_swap(&hook_account(), &params).unwrap(),
		(-100, BeforeSwapDelta::ZERO, 0)
	);
	assert_eq!(
		dispatch
			.after_swap(&hook_account(), &params, BalanceDelta::new(-100, 99), BeforeSwapDelta::ZERO)
			.unwrap(),
		(BalanceDelta::new(-100, 99), BalanceDelta::ZERO)
	);
	assert!(hooks.calls().is_empty());
}

#[test]
fn swap_claims_flow_from_before_to_after() {
	let hooks = Recorder {
		permissions: HookPermissions::NONE
			.with(Permission::BeforeSwap)
			.with(Permission::BeforeSwapReturnsDelta)
			.with(Permission::AfterSwap)
			.with(Permission::AfterSwapReturnsDelta),
		before_swap: (BeforeSwapDelta { specified: 20, unspecified: -3 }, 0),
		after_swap: 7,
		..Default::default()
	};
	let key = key_with(hooks.permissions, 3000);
	let dispatch = ClHookDispatch::new(&key, Some(&hooks));
	let params = swap_params(true, -100);

	let (amount_to_swap, before, lp_fee_override) = dispatch.before_swap(&alice(), &params).unwrap();
	assert_eq!(amount_to_swap, -80);
	assert_eq!(before, BeforeSwapDelta { specified: 20, unspecified: -3 });
	assert_eq!(lp_fee_override, 0);

	// The engine swapped 80 for 79.
	let (swapper, hook) =
		dispatch.after_swap(&alice(), &params, BalanceDelta::new(-80, 79), before).unwrap();
	assert_eq!(hook, BalanceDelta::new(20, 4));
	assert_eq!(swapper, BalanceDelta::new(-100, 75));
	assert_eq!(hooks.calls(), vec!["before_swap", "after_swap"]);
}

#[test]
fn returned_deltas_need_their_permission() {
	let hooks = Recorder {
		permissions: HookPermissions::NONE
			.with(Permission::BeforeSwap)
			.with(Permission::AfterSwap)
			.with(Permission::AfterAddLiquidity),
		before_swap: (BeforeSwapDelta { specified: 20, unspecified: -3 }, 0),
		after_swap: 7,
		after_liquidity: BalanceDelta::new(1, 1),
		..Default::default()
	};
	let key = key_with(hooks.permissions, 3000);
	let dispatch = ClHookDispatch::new(&key, Some(&hooks));
	let params = swap_params(false, 50);

	let (amount_to_swap, before, _) = dispatch.before_swap(&alice(), &params).unwrap();
	assert_eq!((amount_to_swap, before), (50, BeforeSwapDelta::ZERO));
	let delta = BalanceDelta::new(50, -51);
	assert_eq!(
		dispatch.after_swap(&alice(), &params, delta, before).unwrap(),
		(delta, BalanceDelta::ZERO)
	);
	let delta = BalanceDelta::new(-10, -10);
	assert_eq!(
		dispatch
			.after_modify_liquidity(&alice(), &liquidity_params(5), delta, BalanceDelta::ZERO)
			.unwrap(),
		(delta, BalanceDelta::ZERO)
	);
}

#[test]
fn liquidity_claims_are_taken_from_the_caller() {
	let hooks = Recorder {
		permissions: HookPermissions::NONE
			.with(Permission::AfterAddLiquidity)
			.with(Permission::AfterAddLiquidityReturnsDelta),
		after_liquidity: BalanceDelta::new(4, -2),
		..Default::default()
	};
	let key = key_with(hooks.permissions, 3000);
	let dispatch = ClHookDispatch::new(&key, Some(&hooks));
	assert_eq!(
		dispatch
			.after_modify_liquidity(
				&alice(),
				&liquidity_params(5),
				BalanceDelta::new(-10, -10),
				BalanceDelta::ZERO
			)
			.unwrap(),
		(BalanceDelta::new(-14, -8), BalanceDelta::new(4, -2))
	);
}

#[test]
fn lp_fee_overrides_only_apply_to_dynamic_pools() {
	let proposed = OVERRIDE_FEE_FLAG | 5000;
	let hooks = Recorder {
		permissions: HookPermissions::NONE.with(Permission::BeforeSwap),
		before_swap: (BeforeSwapDelta::ZERO, proposed),
		..Default::default()
	};
	let params = swap_params(true, -100);

	let static_key = key_with(hooks.permissions, 3000);
	let (_, _, lp_fee_override) =
		ClHookDispatch::new(&static_key, Some(&hooks)).before_swap(&alice(), &params).unwrap();
	assert_eq!(lp_fee_override, 0);

	let dynamic_key = key_with(hooks.permissions, DYNAMIC_FEE_FLAG);
	let (_, _, lp_fee_override) =
		ClHookDispatch::new(&dynamic_key, Some(&hooks)).before_swap(&alice(), &params).unwrap();
	assert_eq!(lp_fee_override, proposed);
}

#[test]
fn failures_name_the_hook() {
	let hooks = Recorder {
		permissions: HookPermissions::NONE.with(Permission::BeforeSwap),
		fail_with: Some("paused"),
		..Default::default()
	};
	let key = key_with(hooks.permissions, 3000);
	assert_eq!(
		ClHookDispatch::new(&key, Some(&hooks)).before_swap(&alice(), &swap_params(true, -1)),
		Err(HookError::Failed { hook: hook_account(), reason: "paused" })
	);
}

#[test]
fn exact_output_claims_cannot_flip_the_swap() {
	let hooks = Recorder {
		permissions: HookPermissions::NONE
			.with(Permission::BeforeSwap)
			.with(Permission::BeforeSwapReturnsDelta),
		before_swap: (BeforeSwapDelta { specified: -60, unspecified: 0 }, 0),
		..Default::default()
	};
	let key = key_with(hooks.permissions, 3000);
	let dispatch = ClHookDispatch::new(&key, Some(&hooks));
	assert_eq!(dispatch.before_swap(&alice(), &swap_params(true, 60)).unwrap().0, 0);
	assert_eq!(
		dispatch.before_swap(&alice(), &swap_params(true, 59)),
		Err(HookError::DeltaExceedsSwapAmount)
	);
}
