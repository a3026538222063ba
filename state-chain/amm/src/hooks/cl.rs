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

//! Hooks of tick pools.

use amm_math::{SqrtPriceQ64F96, Tick, OVERFLOW};

use super::{
	apply_before_swap_delta, failed, split_swap_delta, BeforeSwapDelta, HookDispatch, HookError,
	HookPermissions, Permission,
};
use crate::{
	common::{AccountId, BalanceDelta, PoolKey},
	tick_pool::{ModifyLiquidityParams, SwapParams},
};

/// A hook module of tick pools. Only the calls enabled in a pool's permission bitmap are made,
/// and returned deltas are ignored unless the matching returns-delta permission is set.
///
/// An `Err` aborts the operation that made the call.
#[allow(unused_variables)]
pub trait ClHooks {
	/// The permission bitmap pools using this hook must carry.
	fn hook_permissions(&self) -> HookPermissions;

	/// May return an initial LP fee, flagged with `lp_fee::OVERRIDE_FEE_FLAG`, replacing the one
	/// derived from the key.
	fn before_initialize(
		&self,
		sender: &AccountId,
		key: &PoolKey,
		sqrt_price: SqrtPriceQ64F96,
	) -> Result<Option<u32>, &'static str> {
		Ok(None)
	}

	fn after_initialize(
		&self,
		sender: &AccountId,
		key: &PoolKey,
		sqrt_price: SqrtPriceQ64F96,
		tick: Tick,
	) -> Result<(), &'static str> {
		Ok(())
	}

	fn before_add_liquidity(
		&self,
		sender: &AccountId,
		key: &PoolKey,
		params: &ModifyLiquidityParams,
	) -> Result<(), &'static str> {
		Ok(())
	}

	/// `delta` is the caller's delta, fees included. Returns the part of it the hook takes.
	fn after_add_liquidity(
		&self,
		sender: &AccountId,
		key: &PoolKey,
		params: &ModifyLiquidityParams,
		delta: BalanceDelta,
		fee_delta: BalanceDelta,
	) -> Result<BalanceDelta, &'static str> {
		Ok(BalanceDelta::ZERO)
	}

	fn before_remove_liquidity(
		&self,
		sender: &AccountId,
		key: &PoolKey,
		params: &ModifyLiquidityParams,
	) -> Result<(), &'static str> {
		Ok(())
	}

	fn after_remove_liquidity(
		&self,
		sender: &AccountId,
		key: &PoolKey,
		params: &ModifyLiquidityParams,
		delta: BalanceDelta,
		fee_delta: BalanceDelta,
	) -> Result<BalanceDelta, &'static str> {
		Ok(BalanceDelta::ZERO)
	}

	/// Returns the hook's claim on the swap and an LP fee override. The override only applies to
	/// dynamic fee pools and must carry `lp_fee::OVERRIDE_FEE_FLAG`.
	fn before_swap(
		&self,
		sender: &AccountId,
		key: &PoolKey,
		params: &SwapParams,
	) -> Result<(BeforeSwapDelta, u32), &'static str> {
		Ok((BeforeSwapDelta::ZERO, 0))
	}

	/// Returns the hook's claim on the unspecified currency.
	fn after_swap(
		&self,
		sender: &AccountId,
		key: &PoolKey,
		params: &SwapParams,
		delta: BalanceDelta,
	) -> Result<i128, &'static str> {
		Ok(0)
	}

	fn before_donate(
		&self,
		sender: &AccountId,
		key: &PoolKey,
		amount0: u128,
		amount1: u128,
	) -> Result<(), &'static str> {
		Ok(())
	}

	fn after_donate(
		&self,
		sender: &AccountId,
		key: &PoolKey,
		amount0: u128,
		amount1: u128,
	) -> Result<(), &'static str> {
		Ok(())
	}
}

pub type ClHookDispatch<'a> = HookDispatch<'a, dyn ClHooks + 'a>;

impl<'a> HookDispatch<'a, dyn ClHooks + 'a> {
	pub fn before_initialize(
		&self,
		sender: &AccountId,
		sqrt_price: SqrtPriceQ64F96,
	) -> Result<Option<u32>, HookError> {
		match self.active(Permission::BeforeInitialize, sender) {
			Some((account, hooks)) =>
				hooks.before_initialize(sender, self.key, sqrt_price).map_err(failed(account)),
			None => Ok(None),
		}
	}

	pub fn after_initialize(
		&self,
		sender: &AccountId,
		sqrt_price: SqrtPriceQ64F96,
		tick: Tick,
	) -> Result<(), HookError> {
		match self.active(Permission::AfterInitialize, sender) {
			Some((account, hooks)) => hooks
				.after_initialize(sender, self.key, sqrt_price, tick)
				.map_err(failed(account)),
			None => Ok(()),
		}
	}

	/// Calls the add or remove hook depending on the sign of the liquidity delta. A zero delta
	/// counts as a removal.
	pub fn before_modify_liquidity(
		&self,
		sender: &AccountId,
		params: &ModifyLiquidityParams,
	) -> Result<(), HookError> {
		if params.liquidity_delta > 0 {
			match self.active(Permission::BeforeAddLiquidity, sender) {
				Some((account, hooks)) => hooks
					.before_add_liquidity(sender, self.key, params)
					.map_err(failed(account)),
				None => Ok(()),
			}
		} else {
			match self.active(Permission::BeforeRemoveLiquidity, sender) {
				Some((account, hooks)) => hooks
					.before_remove_liquidity(sender, self.key, params)
					.map_err(failed(account)),
				None => Ok(()),
			}
		}
	}

	/// Returns `(caller, hook)` deltas, which sum to `delta`.
	pub fn after_modify_liquidity(
		&self,
		sender: &AccountId,
		params: &ModifyLiquidityParams,
		delta: BalanceDelta,
		fee_delta: BalanceDelta,
	) -> Result<(BalanceDelta, BalanceDelta), HookError> {
		let returned = if params.liquidity_delta > 0 {
			match self.active(Permission::AfterAddLiquidity, sender) {
				Some((account, hooks)) => self.returned(
					Permission::AfterAddLiquidityReturnsDelta,
					hooks
						.after_add_liquidity(sender, self.key, params, delta, fee_delta)
						.map_err(failed(account))?,
				),
				None => BalanceDelta::ZERO,
			}
		} else {
			match self.active(Permission::AfterRemoveLiquidity, sender) {
				Some((account, hooks)) => self.returned(
					Permission::AfterRemoveLiquidityReturnsDelta,
					hooks
						.after_remove_liquidity(sender, self.key, params, delta, fee_delta)
						.map_err(failed(account))?,
				),
				None => BalanceDelta::ZERO,
			}
		};
		Ok((delta.checked_sub(returned)?, returned))
	}

	/// Returns the amount left to swap, the hook's claim to pass on to `after_swap`, and the LP
	/// fee override.
	pub fn before_swap(
		&self,
		sender: &AccountId,
		params: &SwapParams,
	) -> Result<(i128, BeforeSwapDelta, u32), HookError> {
		match self.active(Permission::BeforeSwap, sender) {
			Some((account, hooks)) => {
				let (delta, proposed_fee) =
					hooks.before_swap(sender, self.key, params).map_err(failed(account))?;
				let delta = self.returned(Permission::BeforeSwapReturnsDelta, delta);
				Ok((
					apply_before_swap_delta(params.amount_specified, delta.specified)?,
					delta,
					self.lp_fee_override(proposed_fee),
				))
			},
			None => Ok((params.amount_specified, BeforeSwapDelta::ZERO, 0)),
		}
	}

	/// Returns `(swapper, hook)` deltas. `params` are the swap's parameters before the hook's
	/// claim was taken off the amount.
	pub fn after_swap(
		&self,
		sender: &AccountId,
		params: &SwapParams,
		swap_delta: BalanceDelta,
		before_swap_delta: BeforeSwapDelta,
	) -> Result<(BalanceDelta, BalanceDelta), HookError> {
		if self.is_self_call(sender) {
			return Ok((swap_delta, BalanceDelta::ZERO))
		}
		let mut unspecified = before_swap_delta.unspecified;
		if let Some((account, hooks)) = self.active(Permission::AfterSwap, sender) {
			let returned = hooks
				.after_swap(sender, self.key, params, swap_delta)
				.map_err(failed(account))?;
			unspecified = unspecified
				.checked_add(self.returned(Permission::AfterSwapReturnsDelta, returned))
				.ok_or(OVERFLOW)?;
		}
		split_swap_delta(
			params.amount_specified,
			params.zero_for_one,
			swap_delta,
			before_swap_delta.specified,
			unspecified,
		)
	}

	pub fn before_donate(
		&self,
		sender: &AccountId,
		amount0: u128,
		amount1: u128,
	) -> Result<(), HookError> {
		match self.active(Permission::BeforeDonate, sender) {
			Some((account, hooks)) =>
				hooks.before_donate(sender, self.key, amount0, amount1).map_err(failed(account)),
			None => Ok(()),
		}
	}

	pub fn after_donate(
		&self,
		sender: &AccountId,
		amount0: u128,
		amount1: u128,
	) -> Result<(), HookError> {
		match self.active(Permission::AfterDonate, sender) {
			Some((account, hooks)) =>
				hooks.after_donate(sender, self.key, amount0, amount1).map_err(failed(account)),
			None => Ok(()),
		}
	}
}
