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

//! Per-lock accounting of what each settler owes the vault, or is owed by it.

use amm::common::{AccountId, Currency};
use amm_math::{MathError, OVERFLOW};
use codec::{Decode, Encode};
use scale_info::TypeInfo;
use sp_std::collections::btree_map::BTreeMap;

use crate::Error;

#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode, TypeInfo)]
pub struct SettlementGuard {
	locker: Option<AccountId>,
	/// The number of non-zero entries in `currency_delta`.
	unsettled_deltas_count: u32,
	/// Positive entries are owed to the settler, negative ones by it. Zero entries are removed.
	currency_delta: BTreeMap<(AccountId, Currency), i128>,
}

impl SettlementGuard {
	pub fn locker(&self) -> Option<&AccountId> {
		self.locker.as_ref()
	}

	pub fn set_locker(&mut self, locker: AccountId) -> Result<(), Error> {
		if self.locker.is_some() {
			return Err(Error::LockerAlreadySet)
		}
		self.locker = Some(locker);
		Ok(())
	}

	/// Releases the lock. Fails unless every delta is settled, in which case nothing changes.
	pub fn release(&mut self) -> Result<AccountId, Error> {
		if self.unsettled_deltas_count != 0 {
			return Err(Error::CurrencyNotSettled(self.unsettled_deltas_count))
		}
		self.locker.take().ok_or(Error::NoLocker)
	}

	pub fn unsettled_deltas_count(&self) -> u32 {
		self.unsettled_deltas_count
	}

	pub fn currency_delta(&self, settler: &AccountId, currency: Currency) -> i128 {
		self.currency_delta.get(&(settler.clone(), currency)).copied().unwrap_or_default()
	}

	/// Adds `delta` to the settler's entry for `currency`.
	///
	/// If this function returns an `Err(_)` no state changes have occurred
	pub fn account_delta(
		&mut self,
		settler: &AccountId,
		currency: Currency,
		delta: i128,
	) -> Result<(), MathError> {
		if delta == 0 {
			return Ok(())
		}
		let entry = (settler.clone(), currency);
		let previous = self.currency_delta.get(&entry).copied().unwrap_or_default();
		let next = previous.checked_add(delta).ok_or(OVERFLOW)?;

		if next == 0 {
			self.unsettled_deltas_count -= 1;
			self.currency_delta.remove(&entry);
		} else {
			if previous == 0 {
				self.unsettled_deltas_count += 1;
			}
			self.currency_delta.insert(entry, next);
		}
		Ok(())
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use sp_core::H160;

	fn account(n: u8) -> AccountId {
		AccountId::new([n; 32])
	}

	const TOKEN: Currency = Currency::Token(H160([7; 20]));

	#[test]
	fn counts_non_zero_entries() {
		let mut guard = SettlementGuard::default();
		guard.account_delta(&account(1), TOKEN, 0).unwrap();
		assert_eq!(guard.unsettled_deltas_count(), 0);

		guard.account_delta(&account(1), TOKEN, -5).unwrap();
		guard.account_delta(&account(1), TOKEN, -5).unwrap();
		guard.account_delta(&account(1), Currency::Native, 3).unwrap();
		assert_eq!(guard.unsettled_deltas_count(), 2);
		assert_eq!(guard.currency_delta(&account(1), TOKEN), -10);

		// Crossing zero without landing on it keeps the entry.
		guard.account_delta(&account(1), TOKEN, 15).unwrap();
		assert_eq!(guard.unsettled_deltas_count(), 2);
		guard.account_delta(&account(1), TOKEN, -5).unwrap();
		guard.account_delta(&account(1), Currency::Native, -3).unwrap();
		assert_eq!(guard.unsettled_deltas_count(), 0);
		assert_eq!(guard, SettlementGuard::default());
	}

	#[test]
	fn overflow_leaves_the_entry_unchanged() {
		let mut guard = SettlementGuard::default();
		guard.account_delta(&account(1), TOKEN, i128::MAX).unwrap();
		assert_eq!(guard.account_delta(&account(1), TOKEN, 1), Err(OVERFLOW));
		assert_eq!(guard.currency_delta(&account(1), TOKEN), i128::MAX);
		assert_eq!(guard.unsettled_deltas_count(), 1);
	}

	#[test]
	fn one_locker_at_a_time() {
		let mut guard = SettlementGuard::default();
		assert_eq!(guard.release(), Err(Error::NoLocker));
		guard.set_locker(account(1)).unwrap();
		assert_eq!(guard.set_locker(account(2)), Err(Error::LockerAlreadySet));
		guard.account_delta(&account(2), TOKEN, 1).unwrap();
		assert_eq!(guard.release(), Err(Error::CurrencyNotSettled(1)));
		assert_eq!(guard.locker(), Some(&account(1)));
		guard.account_delta(&account(2), TOKEN, -1).unwrap();
		assert_eq!(guard.release(), Ok(account(1)));
		assert_eq!(guard.locker(), None);
	}

	mod properties {
		use super::*;
		use proptest::prelude::*;

		const CURRENCIES: [Currency; 2] = [Currency::Native, TOKEN];

		proptest! {
			#[test]
			fn count_tracks_non_zero_entries(
				deltas in prop::collection::vec((0u8..3, any::<bool>(), -3i128..=3), 0..64),
			) {
				let mut guard = SettlementGuard::default();
				for (settler, native, delta) in deltas {
					let currency = if native { Currency::Native } else { TOKEN };
					guard.account_delta(&account(settler), currency, delta).unwrap();

					let non_zero = (0u8..3)
						.flat_map(|settler| {
							CURRENCIES
								.map(|currency| guard.currency_delta(&account(settler), currency))
						})
						.filter(|delta| *delta != 0)
						.count();
					prop_assert_eq!(guard.unsettled_deltas_count() as usize, non_zero);
				}
			}
		}
	}
}
