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

//! Checked narrowing conversions. None of these truncate.

use sp_core::U256;

use crate::MathError;

pub fn to_u128(value: U256) -> Result<u128, MathError> {
	if value > U256::from(u128::MAX) {
		Err(MathError::CastOverflow)
	} else {
		Ok(value.low_u128())
	}
}

pub fn to_i128(value: U256) -> Result<i128, MathError> {
	u128_to_i128(to_u128(value)?)
}

pub fn u128_to_i128(value: u128) -> Result<i128, MathError> {
	i128::try_from(value).map_err(|_| MathError::CastOverflow)
}

/// Validates a value fits in 24 unsigned bits.
pub fn to_u24(value: u32) -> Result<u32, MathError> {
	if value > 0xFF_FFFF {
		Err(MathError::CastOverflow)
	} else {
		Ok(value)
	}
}

/// Negation that rejects `i128::MIN`.
pub fn checked_neg(value: i128) -> Result<i128, MathError> {
	value.checked_neg().ok_or(MathError::CastOverflow)
}
