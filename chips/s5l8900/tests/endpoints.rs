// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2024.

mod support;

use std::cell::RefCell;

use kernel::hil::usb::{EndpointDirection, EndpointEvent, EndpointHandler};
use kernel::utilities::StaticRef;
use s5l8900::usb::endpoints::Capability;
use s5l8900::usb::interrupt::{EndpointDispatcher, RegisterInterruptSource};
use s5l8900::usb::registers::UsbOtgRegisters;
use s5l8900::usb::UsbError;
use support::*;

#[derive(Default)]
struct Recorder {
    seen: RefCell<Vec<(u32, EndpointEvent, usize)>>,
}

impl EndpointHandler for Recorder {
    fn endpoint_event(&self, token: u32, event: EndpointEvent, buffer: &mut [u8]) {
        self.seen.borrow_mut().push((token, event, buffer.len()));
    }
}

#[test]
fn registration_is_permissive_before_setup() {
    let h = harness();
    let rec = leak(Recorder::default());
    assert_eq!(h.usb.endpoints().capability(2), Some(Capability::Unknown));
    assert_eq!(
        h.usb.install_ep_handler(2, EndpointDirection::Out, rec, 0),
        Ok(())
    );
}

#[test]
fn setup_clears_handlers_and_applies_direction_map() {
    let h = harness();
    let rec = leak(Recorder::default());
    h.usb
        .install_ep_handler(2, EndpointDirection::Out, rec, 0)
        .unwrap();

    h.usb.setup().unwrap();

    assert!(h
        .usb
        .endpoints()
        .handler(2, EndpointDirection::Out)
        .is_none());
    assert_eq!(
        h.usb.install_ep_handler(2, EndpointDirection::Out, rec, 0),
        Err(UsbError::DirectionNotSupported)
    );
    assert_eq!(
        h.usb.install_ep_handler(2, EndpointDirection::In, rec, 0),
        Ok(())
    );
    assert_eq!(
        h.usb.install_ep_handler(3, EndpointDirection::In, rec, 0),
        Err(UsbError::DirectionNotSupported)
    );
    assert_eq!(
        h.usb.install_ep_handler(1, EndpointDirection::BiDir, rec, 0),
        Err(UsbError::BidirectionalHandler)
    );
    assert_eq!(
        h.usb.install_ep_handler(6, EndpointDirection::In, rec, 0),
        Err(UsbError::InvalidEndpoint)
    );
}

#[test]
fn handlers_survive_shutdown() {
    let h = harness();
    let rec = leak(Recorder::default());
    h.usb.setup().unwrap();
    h.usb
        .install_ep_handler(1, EndpointDirection::In, rec, 5)
        .unwrap();

    h.usb.shutdown().unwrap();

    let entry = h.usb.endpoints().handler(1, EndpointDirection::In);
    assert_eq!(entry.map(|e| e.token), Some(5));
}

#[test]
fn interrupt_without_dispatcher_is_inert() {
    let h = harness();
    let rec = leak(Recorder::default());
    h.usb.setup().unwrap();
    h.usb
        .install_ep_handler(0, EndpointDirection::Out, rec, 0)
        .unwrap();
    h.board.set_otg(DAINT, 1 << 16);
    h.board.set_otg(out_ep_interrupt(0), 0b1001);

    h.board.fire();

    assert!(rec.seen.borrow().is_empty());
    assert_eq!(h.board.otg(out_ep_interrupt(0)), 0b1001);
}

#[test]
fn setup_packet_reaches_control_handler() {
    let h = harness();
    let rec = leak(Recorder::default());
    h.usb.setup().unwrap();

    // SAFETY: the harness window outlives the test.
    let regs: StaticRef<UsbOtgRegisters> =
        unsafe { StaticRef::new(h.board.otg.as_ptr().cast::<UsbOtgRegisters>()) };
    let source = leak(RegisterInterruptSource::new(regs));
    let dispatcher = leak(EndpointDispatcher::new(source));
    h.usb.set_dispatcher(dispatcher);
    h.usb
        .install_ep_handler(0, EndpointDirection::Out, rec, 42)
        .unwrap();

    h.board.set_otg(DAINT, 1 << 16);
    // Setup done, transfer complete and an unrelated bit
    h.board.set_otg(out_ep_interrupt(0), 0b1011);
    h.board.fire();

    assert_eq!(
        *rec.seen.borrow(),
        vec![
            (42, EndpointEvent::SetupReceived, 128),
            (42, EndpointEvent::TransferComplete, 128),
        ]
    );
    // Only the serviced bits are written back.
    assert_eq!(h.board.otg(out_ep_interrupt(0)), 0b1001);
}
