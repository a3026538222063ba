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

use amm_math::{MathError, SqrtPriceQ64F96, Tick, OVERFLOW};
use codec::{Decode, Encode, MaxEncodedLen};
use scale_info::TypeInfo;
use serde::{Deserialize, Serialize};
use sp_core::{H160, H256, U256};

pub type AccountId = sp_core::crypto::AccountId32;

/// Distinguishes positions held by the same owner over the same range or bin.
pub type Salt = H256;

/// An asset identifier. The native asset orders before every token.
#[derive(
	Copy,
	Clone,
	Debug,
	PartialEq,
	Eq,
	PartialOrd,
	Ord,
	Hash,
	Encode,
	Decode,
	TypeInfo,
	MaxEncodedLen,
	Serialize,
	Deserialize,
)]
pub enum Currency {
	Native,
	Token(H160),
}

impl Currency {
	pub fn is_native(&self) -> bool {
		matches!(self, Currency::Native)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode, MaxEncodedLen, TypeInfo)]
pub enum Side {
	Zero,
	One,
}

impl core::ops::Not for Side {
	type Output = Self;

	fn not(self) -> Self::Output {
		match self {
			Side::Zero => Side::One,
			Side::One => Side::Zero,
		}
	}
}

/// One value per currency of a pool.
#[derive(
	Copy,
	Clone,
	Default,
	Debug,
	TypeInfo,
	PartialEq,
	Eq,
	Encode,
	Decode,
	MaxEncodedLen,
	Serialize,
	Deserialize,
)]
pub struct CurrencyMap<T> {
	pub zero: T,
	pub one: T,
}
impl<T> CurrencyMap<T> {
	pub fn from_array(array: [T; 2]) -> Self {
		let [zero, one] = array;
		Self { zero, one }
	}

	pub fn map<R>(self, mut f: impl FnMut(Side, T) -> R) -> CurrencyMap<R> {
		CurrencyMap { zero: f(Side::Zero, self.zero), one: f(Side::One, self.one) }
	}

	pub fn try_map<R, E>(
		self,
		mut f: impl FnMut(Side, T) -> Result<R, E>,
	) -> Result<CurrencyMap<R>, E> {
		Ok(CurrencyMap { zero: f(Side::Zero, self.zero)?, one: f(Side::One, self.one)? })
	}
}
impl<T> core::ops::Index<Side> for CurrencyMap<T> {
	type Output = T;
	fn index(&self, side: Side) -> &T {
		match side {
			Side::Zero => &self.zero,
			Side::One => &self.one,
		}
	}
}
impl<T> core::ops::IndexMut<Side> for CurrencyMap<T> {
	fn index_mut(&mut self, side: Side) -> &mut T {
		match side {
			Side::Zero => &mut self.zero,
			Side::One => &mut self.one,
		}
	}
}

pub struct ZeroToOne {}
pub struct OneToZero {}

pub trait SwapDirection {
	const INPUT_SIDE: Side;
	const ZERO_FOR_ONE: bool;

	/// Determines if a given sqrt_price is further along the swap than another
	fn sqrt_price_op_more_than(
		sqrt_price: SqrtPriceQ64F96,
		sqrt_price_other: SqrtPriceQ64F96,
	) -> bool;
}
impl SwapDirection for ZeroToOne {
	const INPUT_SIDE: Side = Side::Zero;
	const ZERO_FOR_ONE: bool = true;

	fn sqrt_price_op_more_than(
		sqrt_price: SqrtPriceQ64F96,
		sqrt_price_other: SqrtPriceQ64F96,
	) -> bool {
		sqrt_price < sqrt_price_other
	}
}
impl SwapDirection for OneToZero {
	const INPUT_SIDE: Side = Side::One;
	const ZERO_FOR_ONE: bool = false;

	fn sqrt_price_op_more_than(
		sqrt_price: SqrtPriceQ64F96,
		sqrt_price_other: SqrtPriceQ64F96,
	) -> bool {
		sqrt_price > sqrt_price_other
	}
}

/// The parameter word of a pool key.
///
/// Bits 0..16 hold the hook permission bitmap. The tick engine keeps a signed 24 bit tick spacing
/// in bits 16..40, the bin engine an unsigned 16 bit bin step in bits 16..32. Higher bits must be
/// clear.
#[derive(
	Copy,
	Clone,
	Debug,
	Default,
	PartialEq,
	Eq,
	PartialOrd,
	Ord,
	Hash,
	Encode,
	Decode,
	TypeInfo,
	MaxEncodedLen,
	Serialize,
	Deserialize,
)]
pub struct Parameters(pub U256);

impl Parameters {
	pub const HOOKS_BITMAP_BITS: usize = 16;
	pub const OFFSET_TICK_SPACING: usize = 16;
	pub const OFFSET_BIN_STEP: usize = 16;
	const TICK_SPACING_BITS: usize = 24;
	const BIN_STEP_BITS: usize = 16;

	pub fn for_tick_pool(hooks_bitmap: u16, tick_spacing: Tick) -> Self {
		let spacing = U256::from((tick_spacing as u32) & 0xFF_FFFF);
		Self(U256::from(hooks_bitmap) | (spacing << Self::OFFSET_TICK_SPACING))
	}

	pub fn for_bin_pool(hooks_bitmap: u16, bin_step: u16) -> Self {
		Self(U256::from(hooks_bitmap) | (U256::from(bin_step) << Self::OFFSET_BIN_STEP))
	}

	pub fn hooks_registration_bitmap(&self) -> u16 {
		self.0.low_u32() as u16
	}

	pub fn should_call(&self, offset: u8) -> bool {
		self.0.bit(offset as usize)
	}

	pub fn tick_spacing(&self) -> Tick {
		let raw = (self.0 >> Self::OFFSET_TICK_SPACING).low_u32() & 0xFF_FFFF;
		// Sign extend from 24 bits.
		((raw << 8) as i32) >> 8
	}

	pub fn bin_step(&self) -> u16 {
		(self.0 >> Self::OFFSET_BIN_STEP).low_u32() as u16
	}

	/// True if no bits above the tick spacing are set.
	pub fn tick_pool_bits_valid(&self) -> bool {
		(self.0 >> (Self::OFFSET_TICK_SPACING + Self::TICK_SPACING_BITS)).is_zero()
	}

	/// True if no bits above the bin step are set.
	pub fn bin_pool_bits_valid(&self) -> bool {
		(self.0 >> (Self::OFFSET_BIN_STEP + Self::BIN_STEP_BITS)).is_zero()
	}
}

/// Identifies a pool. Pools are keyed by the full key, so two pools over the same pair may differ
/// in fee, hook module or parameters.
#[derive(
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
pub struct PoolKey {
	pub currency0: Currency,
	pub currency1: Currency,
	pub hooks: Option<AccountId>,
	/// Either a static LP fee in pips or `lp_fee::DYNAMIC_FEE_FLAG`.
	pub fee: u32,
	pub parameters: Parameters,
}

impl PoolKey {
	pub fn currencies(&self) -> CurrencyMap<Currency> {
		CurrencyMap { zero: self.currency0, one: self.currency1 }
	}

	pub fn currencies_ordered(&self) -> bool {
		self.currency0 < self.currency1
	}

	pub fn is_hook(&self, account: &AccountId) -> bool {
		self.hooks.as_ref() == Some(account)
	}
}

/// A signed amount per currency, from the point of view of whoever it is accounted to. Negative
/// values are owed to the pool, positive values are owed by it.
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
pub struct BalanceDelta {
	pub amount0: i128,
	pub amount1: i128,
}

impl BalanceDelta {
	pub const ZERO: Self = Self { amount0: 0, amount1: 0 };

	pub const fn new(amount0: i128, amount1: i128) -> Self {
		Self { amount0, amount1 }
	}

	pub fn is_zero(&self) -> bool {
		self.amount0 == 0 && self.amount1 == 0
	}

	pub fn get(&self, side: Side) -> i128 {
		match side {
			Side::Zero => self.amount0,
			Side::One => self.amount1,
		}
	}

	pub fn checked_add(self, other: Self) -> Result<Self, MathError> {
		Ok(Self {
			amount0: self.amount0.checked_add(other.amount0).ok_or(OVERFLOW)?,
			amount1: self.amount1.checked_add(other.amount1).ok_or(OVERFLOW)?,
		})
	}

	pub fn checked_sub(self, other: Self) -> Result<Self, MathError> {
		Ok(Self {
			amount0: self.amount0.checked_sub(other.amount0).ok_or(OVERFLOW)?,
			amount1: self.amount1.checked_sub(other.amount1).ok_or(OVERFLOW)?,
		})
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn tick_spacing_is_sign_extended() {
		let parameters = Parameters::for_tick_pool(0b101, 60);
		assert_eq!(parameters.tick_spacing(), 60);
		assert_eq!(parameters.hooks_registration_bitmap(), 0b101);
		assert!(parameters.should_call(0));
		assert!(!parameters.should_call(1));
		assert!(parameters.tick_pool_bits_valid());

		assert_eq!(Parameters::for_tick_pool(0, -1).tick_spacing(), -1);
		assert_eq!(Parameters::for_tick_pool(0, 0x7F_FFFF).tick_spacing(), 0x7F_FFFF);
		assert_eq!(Parameters::for_tick_pool(0, -0x80_0000).tick_spacing(), -0x80_0000);

		assert!(!Parameters(U256::one() << 40).tick_pool_bits_valid());
	}

	#[test]
	fn bin_step_and_unused_bits() {
		let parameters = Parameters::for_bin_pool(0xFFFF, 25);
		assert_eq!(parameters.bin_step(), 25);
		assert_eq!(parameters.hooks_registration_bitmap(), 0xFFFF);
		assert!(parameters.bin_pool_bits_valid());
		assert!(!Parameters(parameters.0 | (U256::one() << 32)).bin_pool_bits_valid());
	}

	#[test]
	fn native_orders_first() {
		assert!(Currency::Native < Currency::Token(H160::zero()));
		assert!(Currency::Token(H160::repeat_byte(1)) < Currency::Token(H160::repeat_byte(2)));
	}

	#[test]
	fn balance_delta_arithmetic() {
		let a = BalanceDelta::new(5, -7);
		assert_eq!(a.checked_add(BalanceDelta::new(-5, 7)), Ok(BalanceDelta::ZERO));
		assert_eq!(a.checked_sub(a), Ok(BalanceDelta::ZERO));
		assert_eq!(BalanceDelta::new(i128::MAX, 0).checked_add(BalanceDelta::new(1, 0)), Err(OVERFLOW));
		assert_eq!(a.get(Side::One), -7);
	}
}
