// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2024.

//! Per-endpoint direction capabilities and installed handlers.

use core::cell::Cell;
use kernel::hil::usb::{EndpointDirection, EndpointHandler};
use kernel::utilities::cells::OptionalCell;

use super::config::NUM_ENDPOINTS;
use super::UsbError;

/// What an endpoint can be used for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capability {
    /// The direction map has not been read yet; any concrete direction is
    /// accepted.
    Unknown,
    Supports(EndpointDirection),
    /// The direction map holds the reserved code for this endpoint.
    Unusable,
}

impl Capability {
    /// Decode one 2-bit entry of the hardware endpoint direction map.
    pub fn from_map_entry(bits: u32) -> Capability {
        match bits & 0b11 {
            0 => Capability::Supports(EndpointDirection::BiDir),
            1 => Capability::Supports(EndpointDirection::In),
            2 => Capability::Supports(EndpointDirection::Out),
            _ => Capability::Unusable,
        }
    }

    fn allows(self, direction: EndpointDirection) -> bool {
        match self {
            Capability::Unknown => true,
            Capability::Supports(cap) => cap.supports(direction),
            Capability::Unusable => false,
        }
    }
}

/// A handler bound to one direction of one endpoint.
#[derive(Clone, Copy)]
pub struct HandlerEntry<'a> {
    pub handler: &'a dyn EndpointHandler,
    pub token: u32,
}

struct Slot<'a> {
    capability: Cell<Capability>,
    in_handler: OptionalCell<HandlerEntry<'a>>,
    out_handler: OptionalCell<HandlerEntry<'a>>,
}

impl<'a> Slot<'a> {
    const fn new() -> Self {
        Slot {
            capability: Cell::new(Capability::Unknown),
            in_handler: OptionalCell::empty(),
            out_handler: OptionalCell::empty(),
        }
    }

    fn handler_cell(&self, direction: EndpointDirection) -> Option<&OptionalCell<HandlerEntry<'a>>> {
        match direction {
            EndpointDirection::In => Some(&self.in_handler),
            EndpointDirection::Out => Some(&self.out_handler),
            EndpointDirection::BiDir => None,
        }
    }
}

pub struct EndpointRegistry<'a> {
    slots: [Slot<'a>; NUM_ENDPOINTS],
}

impl<'a> EndpointRegistry<'a> {
    pub const fn new() -> Self {
        EndpointRegistry {
            slots: [
                Slot::new(),
                Slot::new(),
                Slot::new(),
                Slot::new(),
                Slot::new(),
                Slot::new(),
            ],
        }
    }

    /// Fix every endpoint's capability from the packed direction map.
    pub fn set_capabilities(&self, direction_map: u32) {
        for (i, slot) in self.slots.iter().enumerate() {
            slot.capability
                .set(Capability::from_map_entry(direction_map >> (2 * i)));
        }
    }

    pub fn clear_handlers(&self) {
        for slot in self.slots.iter() {
            slot.in_handler.clear();
            slot.out_handler.clear();
        }
    }

    /// Bind `handler` to one direction of `endpoint`, replacing any handler
    /// already there.
    pub fn install(
        &self,
        endpoint: usize,
        direction: EndpointDirection,
        handler: &'a dyn EndpointHandler,
        token: u32,
    ) -> Result<(), UsbError> {
        let slot = self.slots.get(endpoint).ok_or(UsbError::InvalidEndpoint)?;
        if !slot.capability.get().allows(direction) {
            return Err(UsbError::DirectionNotSupported);
        }
        let cell = slot
            .handler_cell(direction)
            .ok_or(UsbError::BidirectionalHandler)?;
        cell.set(HandlerEntry { handler, token });
        Ok(())
    }

    pub fn handler(&self, endpoint: usize, direction: EndpointDirection) -> Option<HandlerEntry<'a>> {
        self.slots
            .get(endpoint)
            .and_then(|slot| slot.handler_cell(direction))
            .and_then(OptionalCell::get)
    }

    pub fn capability(&self, endpoint: usize) -> Option<Capability> {
        self.slots.get(endpoint).map(|slot| slot.capability.get())
    }
}
