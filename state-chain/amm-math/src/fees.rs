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

//! Fee words and fee amounts. All rates are in pips, parts of `ONE_IN_PIPS`.

use codec::{Decode, Encode, MaxEncodedLen};
use scale_info::TypeInfo;
use sp_core::U256;

/// 100%
pub const ONE_IN_PIPS: u32 = 1_000_000;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Encode, Decode, TypeInfo, MaxEncodedLen)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum FeeError {
	/// The LP fee exceeds the engine's cap.
	#[cfg_attr(feature = "std", error("LP fee {0} is too large"))]
	LpFeeTooLarge(u32),
	/// One of the protocol fee lanes exceeds the configured maximum.
	#[cfg_attr(feature = "std", error("Protocol fee {0:#x} is too large"))]
	ProtocolFeeTooLarge(u32),
}

/// The LP fee word of a pool key. Either a static rate or `DYNAMIC_FEE_FLAG`.
pub mod lp_fee {
	use super::*;

	/// Marks a pool whose LP fee is set by its hook rather than fixed in the key.
	pub const DYNAMIC_FEE_FLAG: u32 = 0x80_0000;
	/// Set on a fee returned by a hook to mark it as a per-call override.
	pub const OVERRIDE_FEE_FLAG: u32 = 0x40_0000;
	pub const REMOVE_OVERRIDE_MASK: u32 = 0xBF_FFFF;

	/// Cap for the tick engine.
	pub const ONE_HUNDRED_PERCENT_FEE: u32 = 1_000_000;
	/// Cap for the bin engine.
	pub const TEN_PERCENT_FEE: u32 = 100_000;

	pub fn is_dynamic(fee: u32) -> bool {
		fee == DYNAMIC_FEE_FLAG
	}

	pub fn validate(fee: u32, max_fee: u32) -> Result<(), FeeError> {
		if fee > max_fee {
			Err(FeeError::LpFeeTooLarge(fee))
		} else {
			Ok(())
		}
	}

	/// The LP fee a pool starts with: zero for dynamic pools, whose hook sets the rate, and the
	/// key's own rate otherwise.
	pub fn initial(fee: u32, max_fee: u32) -> Result<u32, FeeError> {
		if is_dynamic(fee) {
			Ok(0)
		} else {
			validate(fee, max_fee)?;
			Ok(fee)
		}
	}

	pub fn is_override(fee: u32) -> bool {
		fee & OVERRIDE_FEE_FLAG != 0
	}

	pub fn remove_override_flag(fee: u32) -> u32 {
		fee & REMOVE_OVERRIDE_MASK
	}

	pub fn remove_override_and_validate(fee: u32, max_fee: u32) -> Result<u32, FeeError> {
		let fee = remove_override_flag(fee);
		validate(fee, max_fee)?;
		Ok(fee)
	}
}

/// The protocol fee word: two 12 bit lanes, zero-for-one in the low bits and one-for-zero in
/// the high bits.
pub mod protocol_fee {
	use super::*;

	pub const LANE_BITS: u32 = 12;
	pub const LANE_MASK: u32 = 0xFFF;

	pub fn zero_for_one(fee: u32) -> u32 {
		fee & LANE_MASK
	}

	pub fn one_for_zero(fee: u32) -> u32 {
		(fee >> LANE_BITS) & LANE_MASK
	}

	pub fn lane(fee: u32, zero_for_one: bool) -> u32 {
		if zero_for_one {
			self::zero_for_one(fee)
		} else {
			one_for_zero(fee)
		}
	}

	pub fn pack(zero_for_one: u32, one_for_zero: u32) -> u32 {
		((one_for_zero & LANE_MASK) << LANE_BITS) | (zero_for_one & LANE_MASK)
	}

	pub fn validate(fee: u32, max_fee: u32) -> Result<(), FeeError> {
		if fee > 0xFF_FFFF || zero_for_one(fee) > max_fee || one_for_zero(fee) > max_fee {
			Err(FeeError::ProtocolFeeTooLarge(fee))
		} else {
			Ok(())
		}
	}

	/// The fee charged to a swapper when the protocol takes `protocol_fee` of the input first and
	/// the LP fee is charged on the remainder: `p + lp - p * lp / 1e6`, rounded up.
	pub fn calculate_swap_fee(protocol_fee: u32, lp_fee: u32) -> u32 {
		let (protocol_fee, lp_fee) = (protocol_fee as u64, lp_fee as u64);
		let numerator = protocol_fee * lp_fee;
		let product_rounded_down = numerator / ONE_IN_PIPS as u64;
		(protocol_fee + lp_fee - product_rounded_down) as u32
	}

	/// The protocol's part of `fee_amount`, a fee charged at `swap_fee`.
	pub fn share_of(fee_amount: u128, protocol_fee: u32, swap_fee: u32) -> u128 {
		if protocol_fee == 0 || swap_fee == 0 {
			return 0
		}
		// protocol_fee <= swap_fee so the result is at most fee_amount.
		(U256::from(fee_amount) * U256::from(protocol_fee) / U256::from(swap_fee)).low_u128()
	}
}

/// Fee amounts for the bin engine, where fees are taken from each bin's input.
pub mod bin {
	use super::*;

	/// The fee contained in a gross amount: `ceil(amount * fee / 1e6)`.
	pub fn fee_amount_from(amount_with_fees: u128, total_fee: u32) -> u128 {
		let denominator = U256::from(ONE_IN_PIPS);
		// amount and fee are bounded by 2^128 and 2^24, so this cannot overflow and the result
		// is at most the amount.
		((U256::from(amount_with_fees) * U256::from(total_fee) + denominator - 1) / denominator)
			.low_u128()
	}

	/// The fee to add on top of a net amount: `ceil(amount * fee / (1e6 - fee))`.
	///
	/// Returns `None` for a 100% fee, or if the fee does not fit in 128 bits.
	pub fn fee_amount(amount: u128, total_fee: u32) -> Option<u128> {
		if total_fee >= ONE_IN_PIPS {
			return None
		}
		let denominator = U256::from(ONE_IN_PIPS - total_fee);
		let fee = (U256::from(amount) * U256::from(total_fee) + denominator - 1) / denominator;
		(fee <= U256::from(u128::MAX)).then(|| fee.low_u128())
	}

	/// Fee charged on the part of a deposit that rebalances the active bin:
	/// `amount * fee * (fee + 1e6) / 1e12`.
	pub fn composition_fee(amount_with_fees: u128, total_fee: u32) -> u128 {
		let total_fee = U256::from(total_fee);
		let precision = U256::from(ONE_IN_PIPS);
		// Bin fees are capped far below 100%, where the result stays below the amount.
		(U256::from(amount_with_fees) * total_fee * (total_fee + precision) /
			(precision * precision))
			.low_u128()
	}
}
