// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2024.

//! Interface for peripheral clock gating.

pub trait ClockGate {
    /// Open (`on == true`) or close the clock gate with identifier `gate`.
    fn set_clock_gate(&self, gate: u32, on: bool);
}
