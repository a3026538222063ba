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

use amm::common::{AccountId, BalanceDelta, PoolKey, Salt};
use amm_math::{packed::PackedAmounts, SqrtPriceQ64F96, Tick};
use codec::{Decode, Encode};
use scale_info::TypeInfo;
use sp_std::vec::Vec;

/// Where a pool's price stands after an event.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Encode, Decode, TypeInfo)]
pub enum PoolPrice {
	Tick { sqrt_price: SqrtPriceQ64F96, tick: Tick },
	Bin { active_id: u32 },
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, TypeInfo)]
pub enum Event {
	Initialize {
		key: PoolKey,
		sender: AccountId,
		price: PoolPrice,
		protocol_fee: u32,
		lp_fee: u32,
	},
	ModifyLiquidity {
		key: PoolKey,
		sender: AccountId,
		tick_lower: Tick,
		tick_upper: Tick,
		liquidity_delta: i128,
		salt: Salt,
	},
	Swap {
		key: PoolKey,
		sender: AccountId,
		/// The engine's delta, before any hook claims.
		delta: BalanceDelta,
		price: PoolPrice,
		swap_fee: u32,
		protocol_fee: u32,
	},
	Donate {
		key: PoolKey,
		sender: AccountId,
		amount0: u128,
		amount1: u128,
		price: PoolPrice,
	},
	Mint {
		key: PoolKey,
		sender: AccountId,
		ids: Vec<u32>,
		salt: Salt,
		amounts: Vec<PackedAmounts>,
		composition_fee: PackedAmounts,
		fee_to_protocol: PackedAmounts,
	},
	Burn {
		key: PoolKey,
		sender: AccountId,
		ids: Vec<u32>,
		salt: Salt,
		amounts: Vec<PackedAmounts>,
	},
	DynamicLpFeeUpdated {
		key: PoolKey,
		lp_fee: u32,
	},
	ProtocolFeeUpdated {
		key: PoolKey,
		protocol_fee: u32,
	},
	LockAcquired {
		locker: AccountId,
	},
	LockReleased {
		locker: AccountId,
	},
}

/// Events deposited since the exchange was created, or since they were last taken.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Events(Vec<Event>);

impl Events {
	pub fn deposit_event(&mut self, event: Event) {
		log::debug!("Event: {event:?}");
		self.0.push(event);
	}

	pub fn as_slice(&self) -> &[Event] {
		&self.0
	}

	pub fn take(&mut self) -> Vec<Event> {
		core::mem::take(&mut self.0)
	}
}
