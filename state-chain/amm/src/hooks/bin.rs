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

//! Hooks of bin pools. Adding and removing liquidity are minting and burning here, and share
//! their permission bits with the tick engine's.

use amm_math::OVERFLOW;

use super::{
	apply_before_swap_delta, failed, split_swap_delta, BeforeSwapDelta, HookDispatch, HookError,
	HookPermissions, Permission,
};
use crate::{
	bin_pool::{BurnParams, MintParams, SwapParams},
	common::{AccountId, BalanceDelta, PoolKey},
};

/// A hook module of bin pools. See [`super::ClHooks`] for how calls and returned deltas are
/// gated.
#[allow(unused_variables)]
pub trait BinHooks {
	fn hook_permissions(&self) -> HookPermissions;

	/// May return an initial LP fee flagged with `lp_fee::OVERRIDE_FEE_FLAG`.
	fn before_initialize(
		&self,
		sender: &AccountId,
		key: &PoolKey,
		active_id: u32,
	) -> Result<Option<u32>, &'static str> {
		Ok(None)
	}

	fn after_initialize(
		&self,
		sender: &AccountId,
		key: &PoolKey,
		active_id: u32,
	) -> Result<(), &'static str> {
		Ok(())
	}

	/// Returns an LP fee override for the composition fee, honoured on dynamic fee pools.
	fn before_mint(
		&self,
		sender: &AccountId,
		key: &PoolKey,
		params: &MintParams,
	) -> Result<u32, &'static str> {
		Ok(0)
	}

	fn after_mint(
		&self,
		sender: &AccountId,
		key: &PoolKey,
		params: &MintParams,
		delta: BalanceDelta,
	) -> Result<BalanceDelta, &'static str> {
		Ok(BalanceDelta::ZERO)
	}

	fn before_burn(
		&self,
		sender: &AccountId,
		key: &PoolKey,
		params: &BurnParams,
	) -> Result<(), &'static str> {
		Ok(())
	}

	fn after_burn(
		&self,
		sender: &AccountId,
		key: &PoolKey,
		params: &BurnParams,
		delta: BalanceDelta,
	) -> Result<BalanceDelta, &'static str> {
		Ok(BalanceDelta::ZERO)
	}

	fn before_swap(
		&self,
		sender: &AccountId,
		key: &PoolKey,
		params: &SwapParams,
	) -> Result<(BeforeSwapDelta, u32), &'static str> {
		Ok((BeforeSwapDelta::ZERO, 0))
	}

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

pub type BinHookDispatch<'a> = HookDispatch<'a, dyn BinHooks + 'a>;

impl<'a> HookDispatch<'a, dyn BinHooks + 'a> {
	pub fn before_initialize(
		&self,
		sender: &AccountId,
		active_id: u32,
	) -> Result<Option<u32>, HookError> {
		match self.active(Permission::BeforeInitialize, sender) {
			Some((account, hooks)) =>
				hooks.before_initialize(sender, self.key, active_id).map_err(failed(account)),
			None => Ok(None),
		}
	}

	pub fn after_initialize(&self, sender: &AccountId, active_id: u32) -> Result<(), HookError> {
		match self.active(Permission::AfterInitialize, sender) {
			Some((account, hooks)) =>
				hooks.after_initialize(sender, self.key, active_id).map_err(failed(account)),
			None => Ok(()),
		}
	}

	/// Returns the LP fee override for the mint.
	pub fn before_mint(&self, sender: &AccountId, params: &MintParams) -> Result<u32, HookError> {
		match self.active(Permission::BeforeAddLiquidity, sender) {
			Some((account, hooks)) => Ok(self.lp_fee_override(
				hooks.before_mint(sender, self.key, params).map_err(failed(account))?,
			)),
			None => Ok(0),
		}
	}

	/// Returns `(caller, hook)` deltas, which sum to `delta`.
	pub fn after_mint(
		&self,
		sender: &AccountId,
		params: &MintParams,
		delta: BalanceDelta,
	) -> Result<(BalanceDelta, BalanceDelta), HookError> {
		let returned = match self.active(Permission::AfterAddLiquidity, sender) {
			Some((account, hooks)) => self.returned(
				Permission::AfterAddLiquidityReturnsDelta,
				hooks.after_mint(sender, self.key, params, delta).map_err(failed(account))?,
			),
			None => BalanceDelta::ZERO,
		};
		Ok((delta.checked_sub(returned)?, returned))
	}

	pub fn before_burn(&self, sender: &AccountId, params: &BurnParams) -> Result<(), HookError> {
		match self.active(Permission::BeforeRemoveLiquidity, sender) {
			Some((account, hooks)) =>
				hooks.before_burn(sender, self.key, params).map_err(failed(account)),
			None => Ok(()),
		}
	}

	pub fn after_burn(
		&self,
		sender: &AccountId,
		params: &BurnParams,
		delta: BalanceDelta,
	) -> Result<(BalanceDelta, BalanceDelta), HookError> {
		let returned = match self.active(Permission::AfterRemoveLiquidity, sender) {
			Some((account, hooks)) => self.returned(
				Permission::AfterRemoveLiquidityReturnsDelta,
				hooks.after_burn(sender, self.key, params, delta).map_err(failed(account))?,
			),
			None => BalanceDelta::ZERO,
		};
		Ok((delta.checked_sub(returned)?, returned))
	}

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
			params.swap_for_y,
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
