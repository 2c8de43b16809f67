// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2024.

//! Board-level parameters of the USB controller.

pub const USB_OTG_BASE: usize = 0x3840_0000;
pub const USB_PHY_BASE: usize = 0x3C40_0000;

/// Endpoints wired to hardware in each bank.
pub const NUM_ENDPOINTS: usize = 6;

/// How the driver waits for the core soft reset to finish.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResetWait {
    /// Poll up to `attempts` times, `interval_us` apart, then give up with a
    /// timeout error.
    Bounded { attempts: u32, interval_us: u32 },
    /// Spin until the hardware answers.
    Forever,
}

/// What the device reports about itself during enumeration.
#[derive(Clone, Copy, Debug)]
pub struct DeviceIdentity {
    pub vendor_id: u16,
    pub product_id: u16,
    pub device_release: u16,
    pub manufacturer: &'static str,
    pub product: &'static str,
    pub serial_number: &'static str,
    pub configuration: &'static str,
    pub interface: &'static str,
    pub interface_class: u8,
    pub interface_subclass: u8,
    pub interface_protocol: u8,
    /// Bus current draw in mA.
    pub max_power_ma: u16,
}

#[derive(Clone, Copy, Debug)]
pub struct UsbPlatform {
    pub power_domain: u32,
    pub otg_clock_gate: u32,
    pub phy_clock_gate: u32,
    pub edram_clock_gate: u32,
    pub irq: u32,
    /// Two bits per endpoint, endpoint 0 in the low bits: 0 = either
    /// direction, 1 = IN only, 2 = OUT only.
    pub endpoint_directions: u32,
    pub reset_wait: ResetWait,
    pub identity: DeviceIdentity,
}

pub const S5L8900_USB: UsbPlatform = UsbPlatform {
    power_domain: 0x200,
    otg_clock_gate: 0x2,
    phy_clock_gate: 0x23,
    edram_clock_gate: 0x1B,
    irq: 0x13,
    endpoint_directions: 0x990,
    reset_wait: ResetWait::Bounded {
        attempts: 10_000,
        interval_us: 1,
    },
    identity: DeviceIdentity {
        vendor_id: 0x05AC,
        product_id: 0x1280,
        device_release: 0x1103,
        manufacturer: "Apple Inc.",
        product: "Apple Mobile Device (Boot Mode)",
        serial_number: "",
        configuration: "Boot Mode Configuration",
        interface: "IF0",
        interface_class: 0xFF,
        interface_subclass: 0xFF,
        interface_protocol: 0x51,
        max_power_ma: 500,
    },
};

/// Settle times in microseconds, each taken after the matching bring-up or
/// teardown step.
pub(crate) mod delay {
    pub const START: u32 = 10_000;
    pub const SFTDISCONNECT: u32 = 4_000;
    pub const ONOFFSTART: u32 = 100;
    pub const PHYPWRPOWERON: u32 = 10;
    pub const RESET2: u32 = 10;
    pub const RESET: u32 = 1_000;
    pub const RESETWAITFINISH: u32 = 1_000;
    pub const SFTCONNECT: u32 = 250;
    pub const PROGRAMDONE: u32 = 10;
}

/// FIFO sizes in 32-bit words.
pub(crate) const RX_FIFO_DEPTH: u32 = 0x1C0;
pub(crate) const TX_FIFO_DEPTH: u32 = 0x1C0;
pub(crate) const TX_FIFO_START: u32 = 0x200;
