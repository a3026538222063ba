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

//! The vault holds every pool's assets. Under its lock, pool operations and transfers record
//! what each settler owes or is owed, and the lock can only be released once all of it is
//! settled.

use amm::common::{AccountId, BalanceDelta, Currency, PoolKey};
use amm_math::{cast, OVERFLOW, UNDERFLOW};
use codec::{Decode, Encode, MaxEncodedLen};
use scale_info::TypeInfo;
use sp_std::collections::btree_map::BTreeMap;

use crate::{ledger::SettlementGuard, Error, Event, Exchange};

/// Moves assets in and out of the vault. The vault only learns of token deposits made by other
/// means through its balance, see [`Exchange::sync`].
pub trait AssetBank {
	fn vault_balance(&self, currency: Currency) -> u128;

	/// Moves value attached to a call from `from` into the vault.
	fn receive(&mut self, from: &AccountId, currency: Currency, amount: u128) -> Result<(), Error>;

	/// Pays `amount` out of the vault to `to`.
	fn send(&mut self, to: &AccountId, currency: Currency, amount: u128) -> Result<(), Error>;
}

/// Balances held in memory, for tests and simulations.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InMemoryBank {
	vault: BTreeMap<Currency, u128>,
	accounts: BTreeMap<(AccountId, Currency), u128>,
}

impl InMemoryBank {
	pub fn balance_of(&self, account: &AccountId, currency: Currency) -> u128 {
		self.accounts.get(&(account.clone(), currency)).copied().unwrap_or_default()
	}

	/// Credits `account` with newly created funds.
	pub fn fund(
		&mut self,
		account: &AccountId,
		currency: Currency,
		amount: u128,
	) -> Result<(), Error> {
		let balance = self.accounts.entry((account.clone(), currency)).or_default();
		*balance = balance.checked_add(amount).ok_or(OVERFLOW)?;
		Ok(())
	}

	/// A transfer into the vault that the vault is not told about.
	pub fn transfer_to_vault(
		&mut self,
		from: &AccountId,
		currency: Currency,
		amount: u128,
	) -> Result<(), Error> {
		self.receive(from, currency, amount)
	}

	fn debit_account(
		&mut self,
		account: &AccountId,
		currency: Currency,
		amount: u128,
	) -> Result<(), Error> {
		let balance = self.balance_of(account, currency);
		let remaining = balance.checked_sub(amount).ok_or(Error::InsufficientBalance)?;
		if remaining == 0 {
			self.accounts.remove(&(account.clone(), currency));
		} else {
			self.accounts.insert((account.clone(), currency), remaining);
		}
		Ok(())
	}
}

impl AssetBank for InMemoryBank {
	fn vault_balance(&self, currency: Currency) -> u128 {
		self.vault.get(&currency).copied().unwrap_or_default()
	}

	fn receive(&mut self, from: &AccountId, currency: Currency, amount: u128) -> Result<(), Error> {
		let vault_balance = self.vault_balance(currency).checked_add(amount).ok_or(OVERFLOW)?;
		self.debit_account(from, currency, amount)?;
		self.vault.insert(currency, vault_balance);
		Ok(())
	}

	fn send(&mut self, to: &AccountId, currency: Currency, amount: u128) -> Result<(), Error> {
		let vault_balance =
			self.vault_balance(currency).checked_sub(amount).ok_or(Error::InsufficientBalance)?;
		let balance = self.balance_of(to, currency).checked_add(amount).ok_or(OVERFLOW)?;
		self.vault.insert(currency, vault_balance);
		self.accounts.insert((to.clone(), currency), balance);
		Ok(())
	}
}

/// An app registered with the vault. Each keeps its own reserves, so no app can pay out assets
/// accounted into another.
#[derive(
	Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Encode, Decode, TypeInfo, MaxEncodedLen,
)]
pub enum App {
	ClPoolManager,
	BinPoolManager,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode, TypeInfo)]
pub struct VaultState {
	guard: SettlementGuard,
	reserves_of_app: BTreeMap<(App, Currency), u128>,
	/// The token and balance recorded by the last `sync`, until the next `settle`. `None` means
	/// the next settle is of the native currency.
	reserve_checkpoint: Option<(Currency, u128)>,
}

impl VaultState {
	pub fn locker(&self) -> Option<&AccountId> {
		self.guard.locker()
	}

	pub fn unsettled_deltas_count(&self) -> u32 {
		self.guard.unsettled_deltas_count()
	}

	pub fn currency_delta(&self, settler: &AccountId, currency: Currency) -> i128 {
		self.guard.currency_delta(settler, currency)
	}

	pub fn reserves_of_app(&self, app: App, currency: Currency) -> u128 {
		self.reserves_of_app.get(&(app, currency)).copied().unwrap_or_default()
	}

	pub fn reserve_checkpoint(&self) -> Option<(Currency, u128)> {
		self.reserve_checkpoint
	}

	pub(crate) fn ensure_locked(&self) -> Result<(), Error> {
		match self.guard.locker() {
			Some(_) => Ok(()),
			None => Err(Error::NoLocker),
		}
	}

	fn set_reserves_of_app(&mut self, app: App, currency: Currency, reserves: u128) {
		if reserves == 0 {
			self.reserves_of_app.remove(&(app, currency));
		} else {
			self.reserves_of_app.insert((app, currency), reserves);
		}
	}

	/// A positive delta is paid out of the app's reserves, a negative one paid into them.
	fn account_delta_for_app(
		&mut self,
		app: App,
		currency: Currency,
		delta: i128,
	) -> Result<(), Error> {
		let reserves = self.reserves_of_app(app, currency);
		let reserves = if delta >= 0 {
			reserves.checked_sub(delta.unsigned_abs()).ok_or(Error::InsufficientAppReserves)?
		} else {
			reserves.checked_add(delta.unsigned_abs()).ok_or(OVERFLOW)?
		};
		self.set_reserves_of_app(app, currency, reserves);
		Ok(())
	}

	/// Accounts a pool's delta to `settler`, and the opposite to the app's reserves.
	pub(crate) fn account_app_balance_delta(
		&mut self,
		app: App,
		key: &PoolKey,
		delta: BalanceDelta,
		settler: &AccountId,
	) -> Result<(), Error> {
		self.account_app_delta(app, key.currency0, delta.amount0, settler)?;
		self.account_app_delta(app, key.currency1, delta.amount1, settler)
	}

	/// Accounts an operation's delta split between its caller and the pool's hook. The app's
	/// reserves move by the sum, so the order of the two claims does not matter.
	pub(crate) fn account_split_balance_delta(
		&mut self,
		app: App,
		key: &PoolKey,
		(caller, caller_delta): (&AccountId, BalanceDelta),
		(hook, hook_delta): (&AccountId, BalanceDelta),
	) -> Result<(), Error> {
		self.ensure_locked()?;
		let total = caller_delta.checked_add(hook_delta)?;
		self.account_delta_for_app(app, key.currency0, total.amount0)?;
		self.account_delta_for_app(app, key.currency1, total.amount1)?;
		for (settler, delta) in [(caller, caller_delta), (hook, hook_delta)] {
			self.guard.account_delta(settler, key.currency0, delta.amount0)?;
			self.guard.account_delta(settler, key.currency1, delta.amount1)?;
		}
		Ok(())
	}

	/// The single currency form of `account_app_balance_delta`.
	pub(crate) fn account_app_delta(
		&mut self,
		app: App,
		currency: Currency,
		delta: i128,
		settler: &AccountId,
	) -> Result<(), Error> {
		self.ensure_locked()?;
		if delta == 0 {
			return Ok(())
		}
		self.account_delta_for_app(app, currency, delta)?;
		self.guard.account_delta(settler, currency, delta)?;
		Ok(())
	}
}

impl<B: AssetBank + Clone> Exchange<B> {
	/// Runs `f` while `locker` holds the lock. The lock is released when `f` returns, which fails
	/// unless every delta is settled. If `f` or the release fails, the vault, the pools, the
	/// events and the bank are restored to what they were before the lock was taken.
	///
	/// Any sync checkpoint is dropped when the lock is released, whether or not `f` succeeded.
	///
	/// Locking again with the lock's holder runs `f` directly.
	pub fn lock<R>(
		&mut self,
		locker: &AccountId,
		f: impl FnOnce(&mut Self) -> Result<R, Error>,
	) -> Result<R, Error> {
		match self.state.vault.guard.locker().cloned() {
			Some(holder) if holder == *locker => return f(self),
			Some(_) => return Err(Error::LockerAlreadySet),
			None => {},
		}

		let snapshot = (self.state.clone(), self.bank.clone());
		self.state.vault.guard.set_locker(locker.clone())?;
		self.state.events.deposit_event(Event::LockAcquired { locker: locker.clone() });

		let result = f(self);
		let result = match result.and_then(|value| self.state.vault.guard.release().map(|_| value)) {
			Ok(value) => {
				self.state.events.deposit_event(Event::LockReleased { locker: locker.clone() });
				Ok(value)
			},
			Err(error) => {
				log::warn!("Lock held by {locker:?} failed: {error:?}");
				(self.state, self.bank) = snapshot;
				Err(error)
			},
		};
		// A checkpoint never outlives the lock it was taken under.
		self.state.vault.reserve_checkpoint = None;
		result
	}

	/// Records the vault's balance of `currency`, so that the next `settle` can tell how much
	/// was transferred in since. Syncing the native currency clears the checkpoint.
	pub fn sync(&mut self, currency: Currency) {
		self.state.vault.reserve_checkpoint = match currency {
			Currency::Native => None,
			token => Some((token, self.bank.vault_balance(token))),
		};
	}

	/// Credits the caller with what it paid in. See [`Self::settle_for`].
	pub fn settle(&mut self, caller: &AccountId, value: u128) -> Result<u128, Error> {
		self.settle_for(caller, caller, value)
	}

	/// Credits `recipient` with what was paid in: for a synced token, the growth of the vault's
	/// balance since `sync`, otherwise `value` of the native currency, taken from `caller`.
	/// Returns the amount credited.
	pub fn settle_for(
		&mut self,
		caller: &AccountId,
		recipient: &AccountId,
		value: u128,
	) -> Result<u128, Error> {
		let Self { config, bank, state, .. } = self;
		crate::with_transaction(state, |state| {
			state.vault.ensure_locked()?;
			let (currency, paid) = match state.vault.reserve_checkpoint {
				Some((token, reserves_before)) => {
					if value > 0 {
						return Err(Error::SettleNonNativeCurrencyWithValue)
					}
					let paid =
						bank.vault_balance(token).checked_sub(reserves_before).ok_or(UNDERFLOW)?;
					state.vault.reserve_checkpoint = None;
					(token, paid)
				},
				None => {
					if !config.native_currency_enabled {
						return Err(Error::NativeCurrencyDisabled)
					}
					(Currency::Native, value)
				},
			};
			state.vault.guard.account_delta(recipient, currency, cast::u128_to_i128(paid)?)?;
			if currency.is_native() && paid > 0 {
				bank.receive(caller, currency, paid)?;
			}
			log::debug!("{caller:?} settled {paid} of {currency:?} for {recipient:?}");
			Ok(paid)
		})
	}

	/// Pays `amount` of `currency` to `to`, debiting the caller.
	pub fn take(
		&mut self,
		caller: &AccountId,
		currency: Currency,
		to: &AccountId,
		amount: u128,
	) -> Result<(), Error> {
		let Self { bank, state, .. } = self;
		crate::with_transaction(state, |state| {
			state.vault.ensure_locked()?;
			let delta = cast::checked_neg(cast::u128_to_i128(amount)?)?;
			state.vault.guard.account_delta(caller, currency, delta)?;
			bank.send(to, currency, amount)
		})
	}

	/// Gives up the caller's positive delta of `currency`, which must equal `amount`. Used for
	/// amounts not worth taking.
	pub fn clear(
		&mut self,
		caller: &AccountId,
		currency: Currency,
		amount: u128,
	) -> Result<(), Error> {
		let vault = &mut self.state.vault;
		vault.ensure_locked()?;
		let amount = cast::u128_to_i128(amount)?;
		if vault.currency_delta(caller, currency) != amount {
			return Err(Error::MustClearExactPositiveDelta)
		}
		vault.guard.account_delta(caller, currency, cast::checked_neg(amount)?)?;
		Ok(())
	}

	/// Pays `amount` out of an app's reserves. Only allowed outside a lock, and not in the
	/// currency awaiting settlement.
	pub(crate) fn collect_fee(
		&mut self,
		app: App,
		currency: Currency,
		amount: u128,
		recipient: &AccountId,
	) -> Result<(), Error> {
		let vault = &mut self.state.vault;
		if vault.locker().is_some() {
			return Err(Error::LockHeld)
		}
		if matches!(vault.reserve_checkpoint, Some((synced, _)) if synced == currency) {
			return Err(Error::FeeCurrencySynced)
		}
		let reserves = vault
			.reserves_of_app(app, currency)
			.checked_sub(amount)
			.ok_or(Error::InsufficientAppReserves)?;
		self.bank.send(recipient, currency, amount)?;
		self.state.vault.set_reserves_of_app(app, currency, reserves);
		Ok(())
	}
}
