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

use amm::{bin_pool, hooks::HookError, tick_pool};
use amm_math::{fees::FeeError, MathError, Tick};

/// Every way an operation on the exchange can fail. Whatever fails inside a lock discards all
/// changes made under that lock.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum Error {
	// Pool key and configuration.
	#[cfg_attr(feature = "std", error("Pool currencies must be strictly ordered"))]
	CurrenciesOutOfOrderOrEqual,
	#[cfg_attr(feature = "std", error("Tick spacing {0} is too small"))]
	TickSpacingTooSmall(Tick),
	#[cfg_attr(feature = "std", error("Tick spacing {0} is too large"))]
	TickSpacingTooLarge(Tick),
	#[cfg_attr(feature = "std", error("Bin step {0} is too small"))]
	BinStepTooSmall(u16),
	#[cfg_attr(feature = "std", error("Bin step {0} is too large"))]
	BinStepTooLarge(u16),
	#[cfg_attr(feature = "std", error("Unused bits of the pool parameters are set"))]
	UnusedParameterBitsSet,
	#[cfg_attr(feature = "std", error("The native currency is disabled"))]
	NativeCurrencyDisabled,
	#[cfg_attr(feature = "std", error("{0}"))]
	Fee(FeeError),

	// Pool state and authorization.
	#[cfg_attr(feature = "std", error("Pool is not initialized"))]
	PoolNotInitialized,
	#[cfg_attr(feature = "std", error("Pool is already initialized"))]
	PoolAlreadyInitialized,
	#[cfg_attr(feature = "std", error("Only the pool's hook may update a dynamic LP fee"))]
	UnauthorizedDynamicLpFeeUpdate,
	#[cfg_attr(feature = "std", error("Caller is not the protocol fee controller"))]
	InvalidCaller,
	#[cfg_attr(feature = "std", error("Swap amount cannot be zero"))]
	SwapAmountCannotBeZero,

	// Arithmetic and the engines.
	#[cfg_attr(feature = "std", error("{0}"))]
	Math(MathError),
	#[cfg_attr(feature = "std", error("{0}"))]
	ClInitialize(tick_pool::InitializeError),
	#[cfg_attr(feature = "std", error("{0}"))]
	ClModifyLiquidity(tick_pool::ModifyLiquidityError),
	#[cfg_attr(feature = "std", error("{0}"))]
	ClSwap(tick_pool::SwapError),
	#[cfg_attr(feature = "std", error("{0}"))]
	ClDonate(tick_pool::DonateError),
	#[cfg_attr(feature = "std", error("{0}"))]
	BinInitialize(bin_pool::InitializeError),
	#[cfg_attr(feature = "std", error("{0}"))]
	BinMint(bin_pool::MintError),
	#[cfg_attr(feature = "std", error("{0}"))]
	BinBurn(bin_pool::BurnError),
	#[cfg_attr(feature = "std", error("{0}"))]
	BinSwap(bin_pool::SwapError),
	#[cfg_attr(feature = "std", error("{0}"))]
	BinDonate(bin_pool::DonateError),

	// Hooks.
	#[cfg_attr(feature = "std", error("{0}"))]
	Hook(HookError),

	// Settlement.
	#[cfg_attr(feature = "std", error("The operation requires the lock"))]
	NoLocker,
	#[cfg_attr(feature = "std", error("The lock is held by another locker"))]
	LockerAlreadySet,
	#[cfg_attr(feature = "std", error("The lock cannot be held for this operation"))]
	LockHeld,
	#[cfg_attr(feature = "std", error("{0} currency deltas are not settled"))]
	CurrencyNotSettled(u32),
	#[cfg_attr(feature = "std", error("The app does not hold enough reserves"))]
	InsufficientAppReserves,
	#[cfg_attr(feature = "std", error("Insufficient balance"))]
	InsufficientBalance,
	#[cfg_attr(feature = "std", error("A value was supplied to settle a token"))]
	SettleNonNativeCurrencyWithValue,
	#[cfg_attr(feature = "std", error("Only an exactly matching positive delta can be cleared"))]
	MustClearExactPositiveDelta,
	#[cfg_attr(feature = "std", error("Fees cannot be collected in the synced currency"))]
	FeeCurrencySynced,
}

macro_rules! from_errors {
	($($source:ty => $variant:ident),+ $(,)?) => {
		$(
			impl From<$source> for Error {
				fn from(error: $source) -> Self {
					Error::$variant(error)
				}
			}
		)+
	};
}

from_errors! {
	FeeError => Fee,
	MathError => Math,
	HookError => Hook,
	tick_pool::InitializeError => ClInitialize,
	tick_pool::ModifyLiquidityError => ClModifyLiquidity,
	tick_pool::SwapError => ClSwap,
	tick_pool::DonateError => ClDonate,
	bin_pool::InitializeError => BinInitialize,
	bin_pool::MintError => BinMint,
	bin_pool::BurnError => BinBurn,
	bin_pool::SwapError => BinSwap,
	bin_pool::DonateError => BinDonate,
}

impl From<tick_pool::SetFeeError> for Error {
	fn from(_: tick_pool::SetFeeError) -> Self {
		Error::PoolNotInitialized
	}
}

impl From<bin_pool::SetFeeError> for Error {
	fn from(_: bin_pool::SetFeeError) -> Self {
		Error::PoolNotInitialized
	}
}
