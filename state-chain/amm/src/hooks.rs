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

//! The protocol between the engines and a pool's hook module. Each entry point of a pool manager
//! brackets the engine call with optional before and after calls, selected by the permission
//! bitmap in the pool key. After calls may claim part of the caller's delta for the hook.
//!
//! Hooks are not invoked for operations the hook itself originates.

pub mod bin;
pub mod cl;

#[cfg(test)]
mod tests;

use codec::{Decode, Encode, MaxEncodedLen};
use scale_info::TypeInfo;
use serde::{Deserialize, Serialize};

use amm_math::{fees::lp_fee, MathError, OVERFLOW};

use crate::common::{AccountId, BalanceDelta, PoolKey};

pub use bin::{BinHookDispatch, BinHooks};
pub use cl::{ClHookDispatch, ClHooks};

/// A bit of the permission bitmap. In the bin engine adding and removing liquidity are called
/// minting and burning.
#[derive(
	Copy,
	Clone,
	Debug,
	PartialEq,
	Eq,
	PartialOrd,
	Ord,
	Encode,
	Decode,
	TypeInfo,
	MaxEncodedLen,
	Serialize,
	Deserialize,
)]
pub enum Permission {
	BeforeInitialize = 0,
	AfterInitialize = 1,
	BeforeAddLiquidity = 2,
	AfterAddLiquidity = 3,
	BeforeRemoveLiquidity = 4,
	AfterRemoveLiquidity = 5,
	BeforeSwap = 6,
	AfterSwap = 7,
	BeforeDonate = 8,
	AfterDonate = 9,
	BeforeSwapReturnsDelta = 10,
	AfterSwapReturnsDelta = 11,
	AfterAddLiquidityReturnsDelta = 12,
	AfterRemoveLiquidityReturnsDelta = 13,
}

impl Permission {
	pub const ALL: [Permission; 14] = [
		Permission::BeforeInitialize,
		Permission::AfterInitialize,
		Permission::BeforeAddLiquidity,
		Permission::AfterAddLiquidity,
		Permission::BeforeRemoveLiquidity,
		Permission::AfterRemoveLiquidity,
		Permission::BeforeSwap,
		Permission::AfterSwap,
		Permission::BeforeDonate,
		Permission::AfterDonate,
		Permission::BeforeSwapReturnsDelta,
		Permission::AfterSwapReturnsDelta,
		Permission::AfterAddLiquidityReturnsDelta,
		Permission::AfterRemoveLiquidityReturnsDelta,
	];

	pub fn offset(self) -> u8 {
		self as u8
	}

	/// For a permission to return a delta, the call it returns the delta from.
	pub fn requires(self) -> Option<Permission> {
		match self {
			Permission::BeforeSwapReturnsDelta => Some(Permission::BeforeSwap),
			Permission::AfterSwapReturnsDelta => Some(Permission::AfterSwap),
			Permission::AfterAddLiquidityReturnsDelta => Some(Permission::AfterAddLiquidity),
			Permission::AfterRemoveLiquidityReturnsDelta => Some(Permission::AfterRemoveLiquidity),
			_ => None,
		}
	}
}

/// A set of permissions, stored as the bitmap found in the low bits of a pool's parameters.
#[derive(
	Copy,
	Clone,
	Debug,
	Default,
	PartialEq,
	Eq,
	Encode,
	Decode,
	TypeInfo,
	MaxEncodedLen,
	Serialize,
	Deserialize,
)]
pub struct HookPermissions(u16);

impl HookPermissions {
	pub const NONE: Self = Self(0);

	pub const fn from_bitmap(bitmap: u16) -> Self {
		Self(bitmap)
	}

	pub fn of_key(key: &PoolKey) -> Self {
		Self(key.parameters.hooks_registration_bitmap())
	}

	pub fn bitmap(&self) -> u16 {
		self.0
	}

	pub fn contains(&self, permission: Permission) -> bool {
		self.0 & (1 << permission.offset()) != 0
	}

	pub fn with(self, permission: Permission) -> Self {
		Self(self.0 | (1 << permission.offset()))
	}

	pub fn iter(&self) -> impl Iterator<Item = Permission> + '_ {
		Permission::ALL.into_iter().filter(|permission| self.contains(*permission))
	}
}

impl FromIterator<Permission> for HookPermissions {
	fn from_iter<I: IntoIterator<Item = Permission>>(permissions: I) -> Self {
		permissions.into_iter().fold(Self::NONE, Self::with)
	}
}

/// What a before-swap call claims. `specified` applies to the specified currency and is taken
/// off the amount to swap, `unspecified` to the other currency.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Encode, Decode, TypeInfo)]
pub struct BeforeSwapDelta {
	pub specified: i128,
	pub unspecified: i128,
}

impl BeforeSwapDelta {
	pub const ZERO: Self = Self { specified: 0, unspecified: 0 };
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum HookError {
	/// Without a hook the bitmap must be empty and the fee static. With one, the bitmap must
	/// match the one the hook declares.
	#[cfg_attr(feature = "std", error("Hook configuration does not match the pool key"))]
	ConfigValidation,
	/// A returns-delta permission is set without the call it belongs to.
	#[cfg_attr(feature = "std", error("Permission {0:?} requires its call permission"))]
	PermissionsConflict(Permission),
	/// A before-swap delta would turn an exact input swap into an exact output one, or the
	/// other way around.
	#[cfg_attr(feature = "std", error("Hook delta exceeds the swap amount"))]
	DeltaExceedsSwapAmount,
	#[cfg_attr(feature = "std", error("{0}"))]
	Math(MathError),
	/// The hook rejected the call.
	#[cfg_attr(feature = "std", error("Hook {hook} failed: {reason}"))]
	Failed { hook: AccountId, reason: &'static str },
}

impl From<MathError> for HookError {
	fn from(error: MathError) -> Self {
		HookError::Math(error)
	}
}

/// Checks the key's hook fields against the permissions the hook declares, if there is a hook.
pub fn validate_hook_config(
	key: &PoolKey,
	declared: Option<HookPermissions>,
) -> Result<(), HookError> {
	let bitmap = key.parameters.hooks_registration_bitmap();
	match (&key.hooks, declared) {
		(None, _) if bitmap == 0 && !lp_fee::is_dynamic(key.fee) => Ok(()),
		(Some(_), Some(declared)) if declared.bitmap() == bitmap => Ok(()),
		_ => Err(HookError::ConfigValidation),
	}
}

pub fn validate_permissions_conflict(key: &PoolKey) -> Result<(), HookError> {
	let permissions = HookPermissions::of_key(key);
	let conflict = permissions.iter().find(|permission| {
		permission.requires().is_some_and(|required| !permissions.contains(required))
	});
	match conflict {
		Some(permission) => Err(HookError::PermissionsConflict(permission)),
		None => Ok(()),
	}
}

/// Calls into a pool's hook for one operation.
pub struct HookDispatch<'a, H: ?Sized> {
	key: &'a PoolKey,
	hooks: Option<&'a H>,
}

impl<'a, H: ?Sized> HookDispatch<'a, H> {
	pub fn new(key: &'a PoolKey, hooks: Option<&'a H>) -> Self {
		Self { key, hooks }
	}

	fn permissions(&self) -> HookPermissions {
		HookPermissions::of_key(self.key)
	}

	fn is_self_call(&self, sender: &AccountId) -> bool {
		self.key.is_hook(sender)
	}

	/// The hook, if it is to be called for `permission` on behalf of `sender`.
	fn active(&self, permission: Permission, sender: &AccountId) -> Option<(&'a AccountId, &'a H)> {
		match (&self.key.hooks, self.hooks) {
			(Some(account), Some(hooks))
				if self.permissions().contains(permission) && account != sender =>
				Some((account, hooks)),
			_ => None,
		}
	}

	/// The delta returned by a hook, or zero if it lacks the permission to return one.
	fn returned<T: Default>(&self, permission: Permission, returned: T) -> T {
		if self.permissions().contains(permission) {
			returned
		} else {
			T::default()
		}
	}

	/// The LP fee override proposed by a hook. Only dynamic fee pools take overrides.
	fn lp_fee_override(&self, proposed: u32) -> u32 {
		if lp_fee::is_dynamic(self.key.fee) {
			proposed
		} else {
			0
		}
	}
}

fn failed(hook: &AccountId) -> impl FnOnce(&'static str) -> HookError + '_ {
	move |reason| HookError::Failed { hook: hook.clone(), reason }
}

/// The amount left to swap after the hook has claimed `hook_delta_specified` of it.
pub fn apply_before_swap_delta(
	amount_specified: i128,
	hook_delta_specified: i128,
) -> Result<i128, HookError> {
	if hook_delta_specified == 0 {
		return Ok(amount_specified)
	}
	let exact_input = amount_specified < 0;
	let amount_to_swap = amount_specified.checked_add(hook_delta_specified).ok_or(OVERFLOW)?;
	if (exact_input && amount_to_swap > 0) || (!exact_input && amount_to_swap < 0) {
		Err(HookError::DeltaExceedsSwapAmount)
	} else {
		Ok(amount_to_swap)
	}
}

/// Splits a swap's delta between the swapper and the hook, given the hook's claims on the
/// specified and unspecified currencies. Returns `(swapper, hook)`.
pub fn split_swap_delta(
	amount_specified: i128,
	zero_for_one: bool,
	swap_delta: BalanceDelta,
	hook_delta_specified: i128,
	hook_delta_unspecified: i128,
) -> Result<(BalanceDelta, BalanceDelta), HookError> {
	if hook_delta_specified == 0 && hook_delta_unspecified == 0 {
		return Ok((swap_delta, BalanceDelta::ZERO))
	}
	// The specified currency is currency zero when selling it exactly, or buying it exactly.
	let hook_delta = if (amount_specified < 0) == zero_for_one {
		BalanceDelta::new(hook_delta_specified, hook_delta_unspecified)
	} else {
		BalanceDelta::new(hook_delta_unspecified, hook_delta_specified)
	};
	Ok((swap_delta.checked_sub(hook_delta)?, hook_delta))
}
