// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2024.

//! Data structure for storing compile-time configuration options.
//!
//! Configuration lives in a typed `const` object rather than behind `#[cfg]`
//! attributes scattered through the code. Every code path stays type-checked
//! whether or not an option is enabled, and the compiler folds the constant
//! away so a disabled option costs nothing in the final image.
//!
//! Cargo features only select the values in [`CONFIG`]; this file is the one
//! place where `cfg!(feature = ...)` is allowed.

/// Data structure holding compile-time configuration options.
///
/// To change the configuration, enable the matching Cargo feature on the
/// `kernel` dependency of the board crate.
pub struct Config {
    /// Whether peripheral drivers should trace every step of their bring-up
    /// sequence to the log output.
    ///
    /// If enabled, the USB controller logs each register-programming step and
    /// settle delay at trace level while `setup()` runs. This is useful when a
    /// controller silently fails to enumerate and the failing step has to be
    /// located.
    pub trace_usb_setup: bool,
}

/// A unique instance of `Config` where compile-time configuration options are
/// defined.
pub const CONFIG: Config = Config {
    trace_usb_setup: cfg!(feature = "trace_usb_setup"),
};
