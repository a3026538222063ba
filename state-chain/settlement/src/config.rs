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

use amm::common::{AccountId, PoolKey};
use amm_math::Tick;
use codec::{Decode, Encode, MaxEncodedLen};
use scale_info::TypeInfo;
use serde::{Deserialize, Serialize};

/// Bounds applied when pools are initialized and fees are set.
#[derive(
	Clone,
	Debug,
	PartialEq,
	Eq,
	Encode,
	Decode,
	TypeInfo,
	MaxEncodedLen,
	Serialize,
	Deserialize,
)]
pub struct Config {
	/// The greatest protocol fee per swap direction, in pips.
	pub max_protocol_fee: u32,
	pub min_tick_spacing: Tick,
	pub max_tick_spacing: Tick,
	pub min_bin_step: u16,
	pub max_bin_step: u16,
	/// If false, pools over the native currency cannot be created and it cannot be settled.
	pub native_currency_enabled: bool,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			max_protocol_fee: 4_000,
			min_tick_spacing: 1,
			max_tick_spacing: 32_767,
			min_bin_step: 1,
			max_bin_step: 100,
			native_currency_enabled: true,
		}
	}
}

/// Governs protocol fees. A fee it supplies that exceeds `Config::max_protocol_fee` is ignored.
pub trait ProtocolFeeController {
	/// The protocol fee a new pool starts with.
	fn protocol_fee_for_pool(&self, _key: &PoolKey) -> u32 {
		0
	}

	/// Whether `account` may set protocol fees and collect them.
	fn is_controller(&self, _account: &AccountId) -> bool {
		false
	}
}

/// Charges no protocol fee and admits no controller.
pub struct NoProtocolFee;

impl ProtocolFeeController for NoProtocolFee {}
