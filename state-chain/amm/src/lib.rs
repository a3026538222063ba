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


//! Pricing engines for two-asset pools, and the hook protocol the pool managers drive them with.
//!
//! The engines only track pool state and compute balance deltas. Moving assets and checking that
//! every delta is settled is left to the caller.

#![cfg_attr(not(feature = "std"), no_std)]

pub mod bin_pool;
pub mod bin_tree;
pub mod common;
pub mod hooks;
pub mod tick_bitmap;
pub mod tick_pool;

pub use amm_math as math;
