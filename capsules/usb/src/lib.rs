// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2024.

//! Platform-independent USB 2.0 device support.
//!
//! `descriptors` holds the wire types, `descriptor_set` the growable tree a
//! controller driver builds while the host enumerates it.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod descriptor_set;
pub mod descriptors;
