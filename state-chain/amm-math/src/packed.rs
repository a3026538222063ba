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

use codec::{Decode, Encode, MaxEncodedLen};
use scale_info::TypeInfo;
use sp_core::U256;

use crate::{MathError, OVERFLOW, UNDERFLOW};

/// Precision of liquidity distributions: 1e18 is 100%.
pub const DISTRIBUTION_PRECISION: u128 = 1_000_000_000_000_000_000;

/// A pair of X/Y amounts that is always read and written together, e.g. the reserves of a bin.
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
	serde::Serialize,
	serde::Deserialize,
)]
pub struct PackedAmounts {
	pub x: u128,
	pub y: u128,
}

impl PackedAmounts {
	pub const ZERO: Self = Self { x: 0, y: 0 };

	pub const fn new(x: u128, y: u128) -> Self {
		Self { x, y }
	}

	/// `x` if `is_x`, otherwise `y`.
	pub fn get(&self, is_x: bool) -> u128 {
		if is_x {
			self.x
		} else {
			self.y
		}
	}

	/// A value with `amount` in one lane and zero in the other.
	pub fn single(amount: u128, is_x: bool) -> Self {
		if is_x {
			Self::new(amount, 0)
		} else {
			Self::new(0, amount)
		}
	}

	pub fn is_zero(&self) -> bool {
		self.x == 0 && self.y == 0
	}

	/// Whether the selected lane is empty.
	pub fn is_empty(&self, is_x: bool) -> bool {
		self.get(is_x) == 0
	}

	pub fn checked_add(self, other: Self) -> Result<Self, MathError> {
		Ok(Self {
			x: self.x.checked_add(other.x).ok_or(OVERFLOW)?,
			y: self.y.checked_add(other.y).ok_or(OVERFLOW)?,
		})
	}

	pub fn checked_sub(self, other: Self) -> Result<Self, MathError> {
		Ok(Self {
			x: self.x.checked_sub(other.x).ok_or(UNDERFLOW)?,
			y: self.y.checked_sub(other.y).ok_or(UNDERFLOW)?,
		})
	}

	/// True if either lane of `self` exceeds the matching lane of `other`.
	pub fn any_gt(&self, other: &Self) -> bool {
		self.x > other.x || self.y > other.y
	}

	/// Scales each lane by its distribution, in units of `DISTRIBUTION_PRECISION`, rounding
	/// down.
	pub fn scale_by_distribution(&self, distribution_x: u64, distribution_y: u64) -> Self {
		let scale = |amount: u128, distribution: u64| {
			// distribution <= 1e18, so the result never exceeds amount.
			(U256::from(amount) * U256::from(distribution) / U256::from(DISTRIBUTION_PRECISION))
				.low_u128()
		};
		Self { x: scale(self.x, distribution_x), y: scale(self.y, distribution_y) }
	}
}
