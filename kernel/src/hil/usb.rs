// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2024.

//! Interface to USB device controller hardware.

/// Direction of an endpoint, as seen from the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndpointDirection {
    /// Host to device.
    Out = 0,
    /// Device to host.
    In = 1,
    /// Capability value only: the endpoint may be used in either direction.
    BiDir = 2,
}

impl EndpointDirection {
    pub fn from_raw(raw: u8) -> Option<EndpointDirection> {
        match raw {
            0 => Some(EndpointDirection::Out),
            1 => Some(EndpointDirection::In),
            2 => Some(EndpointDirection::BiDir),
            _ => None,
        }
    }

    /// Whether an endpoint with this capability can carry traffic in
    /// `direction`.
    pub fn supports(self, direction: EndpointDirection) -> bool {
        self == EndpointDirection::BiDir || self == direction
    }
}

/// USB transfer type, encoded as in bits 0-1 of `bmAttributes`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferType {
    Control = 0,
    Isochronous = 1,
    Bulk = 2,
    Interrupt = 3,
}

/// Bus speed, using the controller's enumerated speed identifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Speed {
    High = 0,
    Full = 1,
    Low = 2,
    /// Full speed with the PHY clocked at 48 MHz.
    Full48MHz = 3,
}

impl Speed {
    pub fn from_id(id: u8) -> Option<Speed> {
        match id {
            0 => Some(Speed::High),
            1 => Some(Speed::Full),
            2 => Some(Speed::Low),
            3 => Some(Speed::Full48MHz),
            _ => None,
        }
    }

    /// Maximum bulk packet size for this speed.
    pub fn max_packet_size(self) -> u16 {
        match self {
            Speed::High => 512,
            Speed::Full | Speed::Full48MHz => 64,
            Speed::Low => 32,
        }
    }
}

/// Endpoint events delivered to an [`EndpointHandler`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndpointEvent {
    /// A transfer on the endpoint finished.
    TransferComplete,
    /// A SETUP packet arrived on a control OUT endpoint.
    SetupReceived,
}

/// Receiver of endpoint events.
pub trait EndpointHandler {
    /// `token` is the value given when the handler was installed.
    /// `buffer` is the controller scratch buffer for the endpoint's
    /// direction.
    fn endpoint_event(&self, token: u32, event: EndpointEvent, buffer: &mut [u8]);
}
