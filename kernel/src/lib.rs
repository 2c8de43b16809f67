// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2024.

//! Core boot-environment kernel.
//!
//! This crate holds the pieces shared between chip drivers and the boards
//! that instantiate them: the hardware interface layer (HIL) traits that
//! decouple drivers from the collaborators they call into, the standard
//! [`ErrorCode`], compile-time configuration, and the register and cell
//! utilities re-exported from `tock-registers` and `tock-cells`.

#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod errorcode;
pub mod hil;
pub mod utilities;

pub use crate::errorcode::ErrorCode;
