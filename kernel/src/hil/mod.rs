// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2024.

//! Public traits for interfaces between drivers and the platform services
//! they depend on.

pub mod clock_gate;
pub mod interrupt;
pub mod power;
pub mod time;
pub mod usb;
