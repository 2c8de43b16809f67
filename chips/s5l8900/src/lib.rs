// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2024.

//! Peripheral implementations for the Samsung S5L8900 SoC.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod usb;
