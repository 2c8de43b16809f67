// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2024.

//! Interfaces for routing hardware interrupt lines to drivers.

/// A driver that services an interrupt line.
pub trait InterruptHandler {
    /// Called by the interrupt controller when the line fires. `token` is
    /// the value passed to [`InterruptController::install`].
    fn handle_interrupt(&self, token: u32);
}

/// The platform interrupt controller.
pub trait InterruptController<'a> {
    /// Route `irq` to `handler`. Installing a handler on a line replaces
    /// the previous one.
    fn install(&self, irq: u32, handler: &'a dyn InterruptHandler, token: u32);

    /// Unmask `irq`.
    fn enable(&self, irq: u32);
}
