// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2024.

//! Interrupt front-end of the USB controller.
//!
//! The controller owns the interrupt line but does no transfer work itself.
//! When the line fires it hands its endpoint registry and scratch buffers to
//! whatever [`Dispatcher`] has been set, and does nothing if none has.
//!
//! [`EndpointDispatcher`] is the standard dispatcher. It reads per-endpoint
//! status through an [`InterruptSource`], runs the installed handler for
//! every transfer-complete or SETUP bit it finds, and acknowledges exactly
//! the bits it handed to a handler. Bits on endpoints without a handler stay
//! pending.

use alloc::alloc::{alloc_zeroed, Layout};
use alloc::boxed::Box;
use kernel::hil::usb::{EndpointDirection, EndpointEvent};
use kernel::utilities::cells::MapCell;
use kernel::utilities::registers::interfaces::{Readable, Writeable};
use kernel::utilities::StaticRef;

use super::config::NUM_ENDPOINTS;
use super::endpoints::EndpointRegistry;
use super::registers::UsbOtgRegisters;
use super::UsbError;

/// Size of each DMA scratch buffer in bytes.
pub const SCRATCH_SIZE: usize = 128;

/// Bit of [`InterruptSource::pending`] for the OUT direction of endpoint 0;
/// IN endpoints start at bit 0.
pub const OUT_PENDING_SHIFT: usize = 16;

// EPINT::XFERCOMPL and EPINT::SETUP
const XFERCOMPL: u32 = 1 << 0;
const SETUP: u32 = 1 << 3;

#[repr(C, align(64))]
pub struct DmaBuffer(pub [u8; SCRATCH_SIZE]);

/// Allocate a zeroed buffer, or `None` if the heap is exhausted.
fn try_new_buffer() -> Option<Box<DmaBuffer>> {
    let layout = Layout::new::<DmaBuffer>();
    // SAFETY: `DmaBuffer` is not zero-sized.
    let ptr = unsafe { alloc_zeroed(layout) }.cast::<DmaBuffer>();
    if ptr.is_null() {
        None
    } else {
        // SAFETY: `ptr` comes from the global allocator with the layout of
        // `DmaBuffer`, and all-zero bytes are a valid `DmaBuffer`.
        Some(unsafe { Box::from_raw(ptr) })
    }
}

/// The two DMA scratch buffers, one per direction. They are allocated the
/// first time the controller is brought up and kept across shutdowns.
pub struct ScratchBuffers {
    in_buffer: MapCell<Box<DmaBuffer>>,
    out_buffer: MapCell<Box<DmaBuffer>>,
}

impl ScratchBuffers {
    pub fn new() -> Self {
        ScratchBuffers {
            in_buffer: MapCell::empty(),
            out_buffer: MapCell::empty(),
        }
    }

    /// Allocate whichever buffers are missing.
    pub fn allocate(&self) -> Result<(), UsbError> {
        for cell in [&self.in_buffer, &self.out_buffer] {
            if cell.is_none() {
                cell.put(try_new_buffer().ok_or(UsbError::OutOfMemory)?);
            }
        }
        Ok(())
    }

    pub fn is_allocated(&self) -> bool {
        self.in_buffer.is_some() && self.out_buffer.is_some()
    }

    /// Run `f` on the buffer for `direction`. Returns `None` if the buffer
    /// does not exist or is already in use.
    pub fn with<F, R>(&self, direction: EndpointDirection, f: F) -> Option<R>
    where
        F: FnOnce(&mut [u8]) -> R,
    {
        let cell = match direction {
            EndpointDirection::In => &self.in_buffer,
            EndpointDirection::Out => &self.out_buffer,
            EndpointDirection::BiDir => return None,
        };
        cell.map(|buffer| f(&mut buffer.0))
    }
}

/// Per-endpoint interrupt status as seen by a dispatcher.
pub trait InterruptSource {
    /// Endpoints with a pending interrupt: bit `n` for IN endpoint `n`, bit
    /// `OUT_PENDING_SHIFT + n` for OUT endpoint `n`.
    fn pending(&self) -> u32;

    /// Raw interrupt status of one endpoint direction.
    fn endpoint_status(&self, endpoint: usize, direction: EndpointDirection) -> u32;

    /// Clear `bits` in one endpoint direction's status.
    fn acknowledge(&self, endpoint: usize, direction: EndpointDirection, bits: u32);
}

/// Receives the controller's interrupts.
pub trait Dispatcher<'a> {
    fn dispatch(&self, endpoints: &EndpointRegistry<'a>, buffers: &ScratchBuffers);
}

/// [`InterruptSource`] backed by the OTG core registers.
pub struct RegisterInterruptSource {
    registers: StaticRef<UsbOtgRegisters>,
}

impl RegisterInterruptSource {
    pub const fn new(registers: StaticRef<UsbOtgRegisters>) -> Self {
        RegisterInterruptSource { registers }
    }
}

impl InterruptSource for RegisterInterruptSource {
    fn pending(&self) -> u32 {
        self.registers.daint.get()
    }

    fn endpoint_status(&self, endpoint: usize, direction: EndpointDirection) -> u32 {
        let bank = match direction {
            EndpointDirection::In => &self.registers.in_endpoints,
            EndpointDirection::Out => &self.registers.out_endpoints,
            EndpointDirection::BiDir => return 0,
        };
        bank.get(endpoint).map_or(0, |ep| ep.interrupt.get())
    }

    fn acknowledge(&self, endpoint: usize, direction: EndpointDirection, bits: u32) {
        let bank = match direction {
            EndpointDirection::In => &self.registers.in_endpoints,
            EndpointDirection::Out => &self.registers.out_endpoints,
            EndpointDirection::BiDir => return,
        };
        // Write-one-to-clear
        if let Some(ep) = bank.get(endpoint) {
            ep.interrupt.set(bits);
        }
    }
}

pub struct EndpointDispatcher<'s> {
    source: &'s dyn InterruptSource,
}

impl<'s> EndpointDispatcher<'s> {
    pub const fn new(source: &'s dyn InterruptSource) -> Self {
        EndpointDispatcher { source }
    }

    fn service(
        &self,
        endpoints: &EndpointRegistry<'_>,
        buffers: &ScratchBuffers,
        endpoint: usize,
        direction: EndpointDirection,
    ) {
        let status = self.source.endpoint_status(endpoint, direction);
        let mut events = [None, None];
        if direction == EndpointDirection::Out && status & SETUP != 0 {
            events[0] = Some((SETUP, EndpointEvent::SetupReceived));
        }
        if status & XFERCOMPL != 0 {
            events[1] = Some((XFERCOMPL, EndpointEvent::TransferComplete));
        }

        let mut consumed = 0;
        for (bit, event) in events.into_iter().flatten() {
            match endpoints.handler(endpoint, direction) {
                Some(entry) => {
                    let ran = buffers.with(direction, |buffer| {
                        entry.handler.endpoint_event(entry.token, event, buffer);
                    });
                    if ran.is_some() {
                        consumed |= bit;
                    }
                }
                None => {
                    log::debug!("usb: ep{} {:?} {:?} with no handler", endpoint, direction, event);
                }
            }
        }

        if consumed != 0 {
            self.source.acknowledge(endpoint, direction, consumed);
        }
    }
}

impl<'a> Dispatcher<'a> for EndpointDispatcher<'_> {
    fn dispatch(&self, endpoints: &EndpointRegistry<'a>, buffers: &ScratchBuffers) {
        let pending = self.source.pending();
        for endpoint in 0..NUM_ENDPOINTS {
            if pending & (1 << endpoint) != 0 {
                self.service(endpoints, buffers, endpoint, EndpointDirection::In);
            }
            if pending & (1 << (OUT_PENDING_SHIFT + endpoint)) != 0 {
                self.service(endpoints, buffers, endpoint, EndpointDirection::Out);
            }
        }
    }
}
