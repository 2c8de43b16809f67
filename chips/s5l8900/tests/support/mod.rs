// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2024.

//! A fake board for running the controller on the host.
//!
//! Register windows are plain leaked memory. One `FakeBoard` stands in for
//! every collaborator and logs each call in order. The core soft reset is
//! modelled in the delay hook: if the reset request bit is set when the
//! driver waits, the fake core clears it and, unless told otherwise, reports
//! the AHB master idle.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};

use kernel::hil::clock_gate::ClockGate;
use kernel::hil::interrupt::{InterruptController, InterruptHandler};
use kernel::hil::power::PowerControl;
use kernel::hil::time::BusyDelay;
use kernel::utilities::StaticRef;
use s5l8900::usb::config::{ResetWait, UsbPlatform, S5L8900_USB};
use s5l8900::usb::registers::{UsbOtgRegisters, UsbPhyRegisters};
use s5l8900::usb::UsbOtg;

const OTG_WINDOW: usize = 0xE04;
const PHY_WINDOW: usize = 0x0C;

// Word offsets into the OTG window.
pub const GOTGCTL: usize = 0x000 / 4;
pub const GAHBCFG: usize = 0x008 / 4;
pub const GRSTCTL: usize = 0x010 / 4;
pub const GINTMSK: usize = 0x018 / 4;
pub const GRXFSIZ: usize = 0x024 / 4;
pub const GNPTXFSIZ: usize = 0x028 / 4;
pub const QUIRK: usize = 0x02C / 4;
pub const DCFG: usize = 0x800 / 4;
pub const DCTL: usize = 0x804 / 4;
pub const DSTS: usize = 0x808 / 4;
pub const DIEPMSK: usize = 0x810 / 4;
pub const DOEPMSK: usize = 0x814 / 4;
pub const DAINT: usize = 0x818 / 4;
pub const DAINTMSK: usize = 0x81C / 4;
pub const PCGCCTL: usize = 0xE00 / 4;

// Word offsets into the PHY window.
pub const OPHYPWR: usize = 0;
pub const OPHYCLK: usize = 1;
pub const ORSTCON: usize = 2;

pub fn in_ep_control(n: usize) -> usize {
    (0x900 + 0x20 * n) / 4
}

pub fn in_ep_interrupt(n: usize) -> usize {
    (0x908 + 0x20 * n) / 4
}

pub fn out_ep_control(n: usize) -> usize {
    (0xB00 + 0x20 * n) / 4
}

pub fn out_ep_interrupt(n: usize) -> usize {
    (0xB08 + 0x20 * n) / 4
}

pub const RESET_POLL_ATTEMPTS: u32 = 8;

pub fn test_platform() -> UsbPlatform {
    UsbPlatform {
        reset_wait: ResetWait::Bounded {
            attempts: RESET_POLL_ATTEMPTS,
            interval_us: 1,
        },
        ..S5L8900_USB
    }
}

/// How the fake core answers a soft reset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResetResponse {
    Completes,
    /// Clears the reset request but never reports the AHB master idle.
    StuckBusy,
    Ignores,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    Power(u32, bool),
    ClockGate(u32, bool),
    InstallIrq(u32, u32),
    EnableIrq(u32),
    Delay(u32),
}

fn leak_words(bytes: usize) -> &'static [Cell<u32>] {
    let words: &'static mut [u32] = Box::leak(vec![0u32; bytes / 4].into_boxed_slice());
    Cell::from_mut(words).as_slice_of_cells()
}

pub struct FakeBoard {
    pub otg: &'static [Cell<u32>],
    pub phy: &'static [Cell<u32>],
    events: RefCell<Vec<Event>>,
    reset: ResetResponse,
    handler: Cell<Option<(&'static dyn InterruptHandler, u32)>>,
}

impl FakeBoard {
    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    pub fn clear_events(&self) {
        self.events.borrow_mut().clear();
    }

    pub fn delays(&self) -> Vec<u32> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                Event::Delay(us) => Some(*us),
                _ => None,
            })
            .collect()
    }

    /// Raise the controller's interrupt line.
    pub fn fire(&self) {
        if let Some((handler, token)) = self.handler.get() {
            handler.handle_interrupt(token);
        }
    }

    pub fn otg(&self, word: usize) -> u32 {
        self.otg[word].get()
    }

    pub fn set_otg(&self, word: usize, value: u32) {
        self.otg[word].set(value);
    }

    pub fn phy(&self, word: usize) -> u32 {
        self.phy[word].get()
    }

    pub fn fill_otg(&self, value: u32) {
        for word in self.otg.iter() {
            word.set(value);
        }
    }

    pub fn otg_snapshot(&self) -> Vec<u32> {
        self.otg.iter().map(Cell::get).collect()
    }

    fn log(&self, event: Event) {
        self.events.borrow_mut().push(event);
    }
}

impl PowerControl for FakeBoard {
    fn set_power(&self, domain: u32, on: bool) {
        self.log(Event::Power(domain, on));
    }
}

impl ClockGate for FakeBoard {
    fn set_clock_gate(&self, gate: u32, on: bool) {
        self.log(Event::ClockGate(gate, on));
    }
}

impl InterruptController<'static> for FakeBoard {
    fn install(&self, irq: u32, handler: &'static dyn InterruptHandler, token: u32) {
        self.log(Event::InstallIrq(irq, token));
        self.handler.set(Some((handler, token)));
    }

    fn enable(&self, irq: u32) {
        self.log(Event::EnableIrq(irq));
    }
}

impl BusyDelay for FakeBoard {
    fn delay_us(&self, us: u32) {
        self.log(Event::Delay(us));
        let grstctl = &self.otg[GRSTCTL];
        if grstctl.get() & 1 != 0 {
            match self.reset {
                ResetResponse::Completes => grstctl.set(1 << 31),
                ResetResponse::StuckBusy => grstctl.set(0),
                ResetResponse::Ignores => {}
            }
        }
    }
}

pub struct Harness {
    pub board: &'static FakeBoard,
    pub usb: &'static UsbOtg<'static>,
}

pub fn harness() -> Harness {
    harness_with(test_platform(), ResetResponse::Completes)
}

/// A controller whose core never finishes its soft reset.
pub fn unresponsive_harness() -> Harness {
    harness_with(test_platform(), ResetResponse::Ignores)
}

pub fn harness_with(platform: UsbPlatform, reset: ResetResponse) -> Harness {
    let board: &'static FakeBoard = Box::leak(Box::new(FakeBoard {
        otg: leak_words(OTG_WINDOW),
        phy: leak_words(PHY_WINDOW),
        events: RefCell::new(Vec::new()),
        reset,
        handler: Cell::new(None),
    }));
    // SAFETY: both windows are leaked, word aligned and at least as large as
    // the register blocks.
    let (otg_regs, phy_regs) = unsafe {
        (
            StaticRef::new(board.otg.as_ptr().cast::<UsbOtgRegisters>()),
            StaticRef::new(board.phy.as_ptr().cast::<UsbPhyRegisters>()),
        )
    };
    let usb: &'static UsbOtg<'static> = Box::leak(Box::new(UsbOtg::new(
        otg_regs, phy_regs, platform, board, board, board, board,
    )));
    Harness { board, usb }
}

/// Leak `value` for the lifetime of the test binary.
pub fn leak<T>(value: T) -> &'static T {
    Box::leak(Box::new(value))
}
