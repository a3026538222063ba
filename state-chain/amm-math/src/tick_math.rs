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

//! Conversion between ticks and Q64.96 square root prices.

use sp_core::U256;

use crate::{MathError, SqrtPriceQ64F96, Tick};

/// The minimum tick that may be passed to `sqrt_price_at_tick`, log base 1.0001 of 2**-128.
pub const MIN_TICK: Tick = -887272;
/// The maximum tick that may be passed to `sqrt_price_at_tick`, log base 1.0001 of 2**128.
pub const MAX_TICK: Tick = -MIN_TICK;
/// Equivalent to `sqrt_price_at_tick(MIN_TICK)`.
pub const MIN_SQRT_PRICE: SqrtPriceQ64F96 = U256([0x1000276a3u64, 0x0, 0x0, 0x0]);
/// Equivalent to `sqrt_price_at_tick(MAX_TICK)`.
pub const MAX_SQRT_PRICE: SqrtPriceQ64F96 =
	U256([0x5d951d5263988d26u64, 0xefd1fc6a50648849u64, 0xfffd8963u64, 0x0u64]);

/// `1 / sqrt(1.0001)^(2^i)` as Q128.128 for i in 1..20. Bit 0 is handled when initialising the
/// ratio.
const INVERSE_SQRT_RATIOS: [u128; 19] = [
	0xfff97272373d413259a46990580e213a,
	0xfff2e50f5f656932ef12357cf3c7fdcc,
	0xffe5caca7e10e4e61c3624eaa0941cd0,
	0xffcb9843d60f6159c9db58835c926644,
	0xff973b41fa98c081472e6896dfb254c0,
	0xff2ea16466c96a3843ec78b326b52861,
	0xfe5dee046a99a2a811c461f1969c3053,
	0xfcbe86c7900a88aedcffc83b479aa3a4,
	0xf987a7253ac413176f2b074cf7815e54,
	0xf3392b0822b70005940c7a398e4b70f3,
	0xe7159475a2c29b7443b29c7fa6e889d9,
	0xd097f3bdfd2022b8845ad8f792aa5825,
	0xa9f746462d870fdf8a65dc1f90e061e5,
	0x70d869a156d2a1b890bb3df62baf32f7,
	0x31be135f97d08fd981231505542fcfa6,
	0x9aa508b5b7a84e1c677de54f3e99bc9,
	0x5d6af8dedb81196699c329225ee604,
	0x2216e584f5fa1ea926041bedfe98,
	0x48a170391f7dc42444e8fa2,
];

pub fn is_tick_valid(tick: Tick) -> bool {
	(MIN_TICK..=MAX_TICK).contains(&tick)
}

/// Square root prices a pool may sit at. `MAX_SQRT_PRICE` itself is excluded as no tick lies
/// above it.
pub fn is_sqrt_price_valid(sqrt_price: SqrtPriceQ64F96) -> bool {
	(MIN_SQRT_PRICE..MAX_SQRT_PRICE).contains(&sqrt_price)
}

pub fn checked_sqrt_price_at_tick(tick: Tick) -> Result<SqrtPriceQ64F96, MathError> {
	if is_tick_valid(tick) {
		Ok(sqrt_price_at_tick(tick))
	} else {
		Err(MathError::InvalidTick)
	}
}

pub fn checked_tick_at_sqrt_price(sqrt_price: SqrtPriceQ64F96) -> Result<Tick, MathError> {
	if is_sqrt_price_valid(sqrt_price) {
		Ok(tick_at_sqrt_price(sqrt_price))
	} else {
		Err(MathError::InvalidSqrtPrice)
	}
}

/// Computes `sqrt(1.0001^tick) * 2^96`, rounded up.
///
/// Panics if the tick is outside `MIN_TICK..=MAX_TICK`.
pub fn sqrt_price_at_tick(tick: Tick) -> SqrtPriceQ64F96 {
	assert!(is_tick_valid(tick));

	let abs_tick = tick.unsigned_abs();

	let mut ratio = if abs_tick & 0x1u32 != 0 {
		U256::from(0xfffcb933bd6fad37aa2d162d1a594001u128)
	} else {
		U256::one() << 128u32
	};

	// The ratio starts at or below 2^128 and every constant is below 2^128, so each product is
	// below 2^256 and each shifted result stays at or below 2^128.
	for (i, constant) in INVERSE_SQRT_RATIOS.iter().enumerate() {
		if abs_tick & (0x2u32 << i) != 0 {
			ratio = (ratio * U256::from(*constant)) >> 128u32;
		}
	}
	// MIN_TICK and MAX_TICK fit in 20 bits, so all higher bits of abs_tick are zero.

	let sqrt_price_q32f128 = if tick > 0 { U256::MAX / ratio } else { ratio };

	// Rounding up keeps tick_at_sqrt_price(sqrt_price_at_tick(t)) == t.
	(sqrt_price_q32f128 >> 32u32) +
		if sqrt_price_q32f128.low_u32() == 0 { U256::zero() } else { U256::one() }
}

/// Calculates the greatest tick such that `sqrt_price_at_tick(tick) <= sqrt_price`.
///
/// Panics if the price is outside `MIN_SQRT_PRICE..MAX_SQRT_PRICE`.
pub fn tick_at_sqrt_price(sqrt_price: SqrtPriceQ64F96) -> Tick {
	assert!(is_sqrt_price_valid(sqrt_price));

	let sqrt_price_q64f128 = sqrt_price << 32u32;

	// sqrt_price_q64f128 is below 2^192 so the most significant bit index fits in a u8.
	let most_significant_bit = (255 - sqrt_price_q64f128.leading_zeros()) as u8;

	let integer_log_2 = most_significant_bit as i128 - 128;
	// Normalised so that the mantissa lies in [2^127, 2^128).
	let mut mantissa = if most_significant_bit >= 128u8 {
		sqrt_price_q64f128 >> (most_significant_bit - 127u8)
	} else {
		sqrt_price_q64f128 << (127u8 - most_significant_bit)
	}
	.low_u128();

	let mut log_2_q63f64 = integer_log_2 << 64u8;
	// 14 fractional bits are enough to pin down the tick to within one.
	for bit in (50u8..64u8).rev() {
		// Squaring doubles the log.
		let mantissa_sq = (U256::from(mantissa) * U256::from(mantissa)) >> 127u8;
		mantissa = if mantissa_sq.bit(128) {
			log_2_q63f64 |= 1i128 << bit;
			(mantissa_sq >> 1u8).low_u128()
		} else {
			mantissa_sq.low_u128()
		};
	}

	// There is no signed 256 bit type, so sign extend into the upper limbs by hand.
	let log_sqrt10001_q127f128 = U256::overflowing_mul(
		if log_2_q63f64 < 0 {
			(U256::from(u128::MAX) << 128u8) | U256::from(log_2_q63f64 as u128)
		} else {
			U256::from(log_2_q63f64 as u128)
		},
		U256::from(255738958999603826347141u128),
	)
	.0;

	let tick_low = (U256::overflowing_sub(
		log_sqrt10001_q127f128,
		U256::from(3402992956809132418596140100660247210u128),
	)
	.0 >> 128u8)
		.low_u128() as Tick;
	let tick_high = (U256::overflowing_add(
		log_sqrt10001_q127f128,
		U256::from(291339464771989622907027621153398088495u128),
	)
	.0 >> 128u8)
		.low_u128() as Tick;

	if tick_low == tick_high {
		tick_low
	} else if sqrt_price_at_tick(tick_high) <= sqrt_price {
		tick_high
	} else {
		tick_low
	}
}
