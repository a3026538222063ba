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

//! A sparse bitmap over compressed ticks (`tick / tick_spacing`), 256 ticks per word. Used by the
//! tick pool to find the next tick with liquidity without walking every tick in between.

use amm_math::Tick;
use codec::{Decode, Encode};
use scale_info::TypeInfo;
use serde::{Deserialize, Serialize};
use sp_core::U256;
use sp_std::collections::btree_map::BTreeMap;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
#[cfg_attr(feature = "std", error("Tick {tick} is not a multiple of the tick spacing {tick_spacing}"))]
pub struct TickMisaligned {
	pub tick: Tick,
	pub tick_spacing: Tick,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, TypeInfo, Encode, Decode, Serialize, Deserialize)]
pub struct TickBitmap {
	/// Only non-zero words are stored.
	words: BTreeMap<i16, U256>,
}

/// Rounds towards negative infinity.
fn compress(tick: Tick, tick_spacing: Tick) -> i32 {
	tick.div_euclid(tick_spacing)
}

/// The word and bit of a compressed tick.
fn position(compressed: i32) -> (i16, u8) {
	((compressed >> 8) as i16, (compressed & 0xff) as u8)
}

impl TickBitmap {
	pub fn word(&self, word_position: i16) -> U256 {
		self.words.get(&word_position).copied().unwrap_or_default()
	}

	pub fn is_initialized(&self, tick: Tick, tick_spacing: Tick) -> bool {
		let (word, bit) = position(compress(tick, tick_spacing));
		self.word(word).bit(bit as usize)
	}

	/// Toggles the bit for `tick`, which must be a multiple of `tick_spacing`.
	pub fn flip_tick(&mut self, tick: Tick, tick_spacing: Tick) -> Result<(), TickMisaligned> {
		if tick % tick_spacing != 0 {
			return Err(TickMisaligned { tick, tick_spacing })
		}
		let (word_position, bit) = position(tick / tick_spacing);
		let word = self.word(word_position) ^ (U256::one() << bit);
		if word.is_zero() {
			self.words.remove(&word_position);
		} else {
			self.words.insert(word_position, word);
		}
		Ok(())
	}

	/// Finds the next initialized tick in the same word as `tick`, searching at or below `tick`
	/// if `lte`, strictly above it otherwise. If there is none, returns the last tick of the word
	/// in the search direction and `false`, so the caller can step word by word.
	pub fn next_initialized_tick_within_one_word(
		&self,
		tick: Tick,
		tick_spacing: Tick,
		lte: bool,
	) -> (Tick, bool) {
		let compressed = compress(tick, tick_spacing);

		if lte {
			let (word_position, bit) = position(compressed);
			// All bits at or below `bit`.
			let mask = (U256::one() << bit) - 1 + (U256::one() << bit);
			let masked = self.word(word_position) & mask;

			if masked.is_zero() {
				((compressed - bit as i32) * tick_spacing, false)
			} else {
				let most_significant_bit = 255 - masked.leading_zeros() as i32;
				((compressed - (bit as i32 - most_significant_bit)) * tick_spacing, true)
			}
		} else {
			let compressed = compressed + 1;
			let (word_position, bit) = position(compressed);
			// All bits at or above `bit`.
			let mask = !((U256::one() << bit) - 1);
			let masked = self.word(word_position) & mask;

			if masked.is_zero() {
				((compressed + (255 - bit as i32)) * tick_spacing, false)
			} else {
				let least_significant_bit = masked.trailing_zeros() as i32;
				((compressed + (least_significant_bit - bit as i32)) * tick_spacing, true)
			}
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn bitmap_with(ticks: &[Tick]) -> TickBitmap {
		let mut bitmap = TickBitmap::default();
		for tick in ticks {
			bitmap.flip_tick(*tick, 1).unwrap();
		}
		bitmap
	}

	#[test]
	fn flipping_twice_clears_the_word() {
		let mut bitmap = TickBitmap::default();
		bitmap.flip_tick(-230, 10).unwrap();
		assert!(bitmap.is_initialized(-230, 10));
		assert!(!bitmap.is_initialized(-220, 10));
		assert_eq!(bitmap.word(-1), U256::one() << 233);
		bitmap.flip_tick(-230, 10).unwrap();
		assert_eq!(bitmap, TickBitmap::default());
	}

	#[test]
	fn misaligned_ticks_are_rejected() {
		let mut bitmap = TickBitmap::default();
		assert_eq!(bitmap.flip_tick(15, 10), Err(TickMisaligned { tick: 15, tick_spacing: 10 }));
		assert_eq!(bitmap.flip_tick(-5, 10), Err(TickMisaligned { tick: -5, tick_spacing: 10 }));
	}

	#[test]
	fn search_above() {
		let bitmap = bitmap_with(&[-200, -55, -4, 70, 78, 84, 139, 240, 535]);
		assert_eq!(bitmap.next_initialized_tick_within_one_word(78, 1, false), (84, true));
		assert_eq!(bitmap.next_initialized_tick_within_one_word(77, 1, false), (78, true));
		assert_eq!(bitmap.next_initialized_tick_within_one_word(-56, 1, false), (-55, true));
		assert_eq!(bitmap.next_initialized_tick_within_one_word(-55, 1, false), (-4, true));
		// Stops at the word boundary.
		assert_eq!(bitmap.next_initialized_tick_within_one_word(255, 1, false), (511, false));
		assert_eq!(bitmap.next_initialized_tick_within_one_word(-257, 1, false), (-200, true));
		assert_eq!(bitmap.next_initialized_tick_within_one_word(328, 1, false), (511, false));
		assert_eq!(bitmap.next_initialized_tick_within_one_word(508, 1, false), (511, false));
		assert_eq!(bitmap.next_initialized_tick_within_one_word(510, 1, false), (511, false));
	}

	#[test]
	fn search_at_or_below() {
		let bitmap = bitmap_with(&[-200, -55, -4, 70, 78, 84, 139, 240, 535]);
		assert_eq!(bitmap.next_initialized_tick_within_one_word(78, 1, true), (78, true));
		assert_eq!(bitmap.next_initialized_tick_within_one_word(79, 1, true), (78, true));
		assert_eq!(bitmap.next_initialized_tick_within_one_word(258, 1, true), (256, false));
		assert_eq!(bitmap.next_initialized_tick_within_one_word(256, 1, true), (256, false));
		assert_eq!(bitmap.next_initialized_tick_within_one_word(72, 1, true), (70, true));
		assert_eq!(bitmap.next_initialized_tick_within_one_word(-257, 1, true), (-512, false));
		assert_eq!(bitmap.next_initialized_tick_within_one_word(1023, 1, true), (768, false));
		assert_eq!(bitmap.next_initialized_tick_within_one_word(900, 1, true), (768, false));
	}

	#[test]
	fn negative_ticks_round_down_with_spacing() {
		let mut bitmap = TickBitmap::default();
		bitmap.flip_tick(-60, 10).unwrap();
		bitmap.flip_tick(60, 10).unwrap();
		// -1 compresses to -1, whose word also holds -60.
		assert_eq!(bitmap.next_initialized_tick_within_one_word(-1, 10, true), (-60, true));
		assert_eq!(bitmap.next_initialized_tick_within_one_word(0, 10, true), (0, false));
		assert_eq!(bitmap.next_initialized_tick_within_one_word(0, 10, false), (60, true));
		assert_eq!(bitmap.next_initialized_tick_within_one_word(-61, 10, false), (-60, true));
	}
}
