// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2024.

//! Interface for busy-wait delays.

/// Blocking delay source used during hardware bring-up, before any timer
/// interrupt infrastructure is available.
pub trait BusyDelay {
    /// Spin for at least `us` microseconds.
    fn delay_us(&self, us: u32);
}
