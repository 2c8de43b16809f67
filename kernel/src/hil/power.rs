// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2024.

//! Interface for switching power domains.

/// Control over the SoC power domains.
pub trait PowerControl {
    /// Switch `domain` on or off. Callers are expected to wait for the rail
    /// to settle before touching peripherals inside the domain.
    fn set_power(&self, domain: u32, on: bool);
}
