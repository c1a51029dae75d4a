// Copyright (c) WalletSync Contributors
// SPDX-License-Identifier: Apache-2.0

pub mod broadcaster;

pub use broadcaster::{BroadcastKind, Broadcaster};
