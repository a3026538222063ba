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

//! A three level bitmap over the 24 bit bin id space. Each level is a 256 bit word per parent
//! bit: level 0 marks non-empty level 1 words, level 1 marks non-empty level 2 words, and level
//! 2 marks the ids themselves. Finding the nearest set id in either direction touches at most
//! two words per level.
//!
//! Lower ids are to the "right" (cheaper for X), higher ids to the "left".

use amm_math::bin_math::MAX_BIN_ID;
use codec::{Decode, Encode};
use scale_info::TypeInfo;
use serde::{Deserialize, Serialize};
use sp_core::U256;
use sp_std::collections::btree_map::BTreeMap;

#[derive(Clone, Debug, Default, PartialEq, Eq, TypeInfo, Encode, Decode, Serialize, Deserialize)]
pub struct BinTree {
	level0: U256,
	/// Keyed by `id >> 16`. Only non-zero words are stored.
	level1: BTreeMap<u32, U256>,
	/// Keyed by `id >> 8`. Only non-zero words are stored.
	level2: BTreeMap<u32, U256>,
}

fn bit_of(key: u32) -> usize {
	(key & 0xff) as usize
}

fn most_significant_bit(word: U256) -> u32 {
	255 - word.leading_zeros()
}

fn least_significant_bit(word: U256) -> u32 {
	word.trailing_zeros()
}

/// The highest set bit strictly below `bit`.
fn closest_bit_below(word: U256, bit: usize) -> Option<u32> {
	if bit == 0 {
		return None
	}
	let masked = word & ((U256::one() << bit) - 1);
	(!masked.is_zero()).then(|| most_significant_bit(masked))
}

/// The lowest set bit strictly above `bit`.
fn closest_bit_above(word: U256, bit: usize) -> Option<u32> {
	if bit == 255 {
		return None
	}
	let masked = word & !((U256::one() << (bit + 1)) - 1);
	(!masked.is_zero()).then(|| least_significant_bit(masked))
}

impl BinTree {
	fn word(map: &BTreeMap<u32, U256>, key: u32) -> U256 {
		map.get(&key).copied().unwrap_or_default()
	}

	fn store(map: &mut BTreeMap<u32, U256>, key: u32, word: U256) {
		if word.is_zero() {
			map.remove(&key);
		} else {
			map.insert(key, word);
		}
	}

	pub fn is_empty(&self) -> bool {
		self.level0.is_zero()
	}

	pub fn contains(&self, id: u32) -> bool {
		Self::word(&self.level2, id >> 8).bit(bit_of(id))
	}

	/// Returns true if `id` was not already present. Ids above `MAX_BIN_ID` are ignored.
	pub fn add(&mut self, id: u32) -> bool {
		if id > MAX_BIN_ID || self.contains(id) {
			return false
		}
		let key2 = id >> 8;
		let leaves = Self::word(&self.level2, key2);
		Self::store(&mut self.level2, key2, leaves | (U256::one() << bit_of(id)));
		if leaves.is_zero() {
			let key1 = key2 >> 8;
			let leaves = Self::word(&self.level1, key1);
			Self::store(&mut self.level1, key1, leaves | (U256::one() << bit_of(key2)));
			if leaves.is_zero() {
				self.level0 |= U256::one() << bit_of(key1);
			}
		}
		true
	}

	/// Returns true if `id` was present.
	pub fn remove(&mut self, id: u32) -> bool {
		if id > MAX_BIN_ID || !self.contains(id) {
			return false
		}
		let key2 = id >> 8;
		let leaves = Self::word(&self.level2, key2) & !(U256::one() << bit_of(id));
		Self::store(&mut self.level2, key2, leaves);
		if leaves.is_zero() {
			let key1 = key2 >> 8;
			let leaves = Self::word(&self.level1, key1) & !(U256::one() << bit_of(key2));
			Self::store(&mut self.level1, key1, leaves);
			if leaves.is_zero() {
				self.level0 &= !(U256::one() << bit_of(key1));
			}
		}
		true
	}

	/// The greatest id strictly below `id`.
	pub fn find_first_right(&self, id: u32) -> Option<u32> {
		let key2 = id >> 8;
		if let Some(bit) = closest_bit_below(Self::word(&self.level2, key2), bit_of(id)) {
			return Some(key2 << 8 | bit)
		}

		let key1 = key2 >> 8;
		if let Some(bit) = closest_bit_below(Self::word(&self.level1, key1), bit_of(key2)) {
			let key2 = key1 << 8 | bit;
			return Some(key2 << 8 | most_significant_bit(Self::word(&self.level2, key2)))
		}

		closest_bit_below(self.level0, bit_of(key1)).map(|key1| {
			let key2 = key1 << 8 | most_significant_bit(Self::word(&self.level1, key1));
			key2 << 8 | most_significant_bit(Self::word(&self.level2, key2))
		})
	}

	/// The smallest id strictly above `id`.
	pub fn find_first_left(&self, id: u32) -> Option<u32> {
		let key2 = id >> 8;
		if let Some(bit) = closest_bit_above(Self::word(&self.level2, key2), bit_of(id)) {
			return Some(key2 << 8 | bit)
		}

		let key1 = key2 >> 8;
		if let Some(bit) = closest_bit_above(Self::word(&self.level1, key1), bit_of(key2)) {
			let key2 = key1 << 8 | bit;
			return Some(key2 << 8 | least_significant_bit(Self::word(&self.level2, key2)))
		}

		closest_bit_above(self.level0, bit_of(key1)).map(|key1| {
			let key2 = key1 << 8 | least_significant_bit(Self::word(&self.level1, key1));
			key2 << 8 | least_significant_bit(Self::word(&self.level2, key2))
		})
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use rand::{Rng, SeedableRng};
	use sp_std::collections::btree_set::BTreeSet;

	#[test]
	fn add_and_remove() {
		let mut tree = BinTree::default();
		assert!(tree.is_empty());
		assert!(tree.add(1 << 23));
		assert!(!tree.add(1 << 23));
		assert!(tree.contains(1 << 23));
		assert!(!tree.contains((1 << 23) + 1));
		assert!(!tree.add(MAX_BIN_ID + 1));

		assert!(tree.remove(1 << 23));
		assert!(!tree.remove(1 << 23));
		assert_eq!(tree, BinTree::default());
	}

	#[test]
	fn search_within_a_word() {
		let mut tree = BinTree::default();
		for id in [10, 20, 30] {
			tree.add(id);
		}
		assert_eq!(tree.find_first_right(20), Some(10));
		assert_eq!(tree.find_first_right(10), None);
		assert_eq!(tree.find_first_right(25), Some(20));
		assert_eq!(tree.find_first_left(20), Some(30));
		assert_eq!(tree.find_first_left(30), None);
		assert_eq!(tree.find_first_left(0), Some(10));
	}

	#[test]
	fn search_across_words_and_levels() {
		let mut tree = BinTree::default();
		for id in [0, 255, 256, 65_535, 65_536, MAX_BIN_ID] {
			tree.add(id);
		}
		assert_eq!(tree.find_first_right(256), Some(255));
		assert_eq!(tree.find_first_right(255), Some(0));
		assert_eq!(tree.find_first_right(65_536), Some(65_535));
		assert_eq!(tree.find_first_right(65_535), Some(256));
		assert_eq!(tree.find_first_right(MAX_BIN_ID), Some(65_536));
		assert_eq!(tree.find_first_right(0), None);

		assert_eq!(tree.find_first_left(0), Some(255));
		assert_eq!(tree.find_first_left(255), Some(256));
		assert_eq!(tree.find_first_left(256), Some(65_535));
		assert_eq!(tree.find_first_left(65_535), Some(65_536));
		assert_eq!(tree.find_first_left(65_536), Some(MAX_BIN_ID));
		assert_eq!(tree.find_first_left(MAX_BIN_ID), None);
	}

	#[test]
	fn matches_an_ordered_set() {
		let mut rng = rand::rngs::StdRng::seed_from_u64(0);
		let mut tree = BinTree::default();
		let mut set = BTreeSet::new();
		let around = 1u32 << 23;

		for _ in 0..2_000 {
			// Mostly clustered ids, with some spread over the whole range.
			let id = if rng.gen_bool(0.8) {
				rng.gen_range(around - 70_000..around + 70_000)
			} else {
				rng.gen_range(0..=MAX_BIN_ID)
			};
			if rng.gen_bool(0.7) {
				assert_eq!(tree.add(id), set.insert(id));
			} else {
				assert_eq!(tree.remove(id), set.remove(&id));
			}

			let probe = rng.gen_range(0..=MAX_BIN_ID);
			assert_eq!(tree.contains(probe), set.contains(&probe));
			assert_eq!(tree.find_first_right(probe), set.range(..probe).next_back().copied());
			assert_eq!(tree.find_first_left(probe), set.range(probe + 1..).next().copied());
		}

		while let Some(id) = set.pop_first() {
			assert_eq!(tree.find_first_right(id), None);
			assert_eq!(tree.find_first_left(id), set.first().copied());
			assert!(tree.remove(id));
		}
		assert!(tree.is_empty());
	}
}
