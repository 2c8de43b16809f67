// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2024.

//! USB 2.0 OTG controller, device mode.
//!
//! [`UsbOtg`] brings the OTG core and its PHY out of reset, answers the
//! descriptor queries the host makes while enumerating the device, and keeps
//! the table of per-endpoint handlers that the interrupt front-end feeds.
//!
//! The controller reaches the rest of the system only through the kernel
//! HILs it is constructed with: a power switch, clock gates, the interrupt
//! controller and a busy-wait delay. A board wires it up roughly like this:
//!
//! ```rust,ignore
//! let usb = static_init!(
//!     UsbOtg<'static>,
//!     UsbOtg::new(otg_regs, phy_regs, S5L8900_USB, power, clocks, irqs, delay)
//! );
//! usb.setup()?;
//! usb.install_ep_handler(1, EndpointDirection::In, bulk_in, 0)?;
//! ```
//!
//! Every settle delay in the bring-up and teardown sequences is required by
//! the hardware; a register write issued before the previous one has settled
//! can be silently dropped.

pub mod config;
pub mod endpoints;
pub mod interrupt;
pub mod registers;

use core::cell::Cell;

use capsules_usb::descriptor_set::{DescriptorError, DescriptorSet};
use capsules_usb::descriptors::{
    ConfigurationAttributes, ConfigurationDescriptor, Descriptor, DeviceDescriptor,
    EndpointAttributes, InterfaceDescriptor, StringEntry, USB_2_0,
};
use kernel::config::CONFIG;
use kernel::hil::clock_gate::ClockGate;
use kernel::hil::interrupt::{InterruptController, InterruptHandler};
use kernel::hil::power::PowerControl;
use kernel::hil::time::BusyDelay;
use kernel::hil::usb::{EndpointDirection, EndpointHandler, Speed, TransferType};
use kernel::utilities::cells::{MapCell, OptionalCell};
use kernel::utilities::registers::interfaces::{ReadWriteable, Readable, Writeable};
use kernel::utilities::StaticRef;
use kernel::ErrorCode;

use self::config::{delay, ResetWait, UsbPlatform, NUM_ENDPOINTS};
use self::config::{RX_FIFO_DEPTH, TX_FIFO_DEPTH, TX_FIFO_START};
use self::endpoints::EndpointRegistry;
use self::interrupt::{Dispatcher, ScratchBuffers};
use self::registers::*;

/// Packet size reported for a speed id the controller does not know.
pub const INVALID_PACKET_SIZE: u16 = 0xFFFF;

/// Max packet size of the control endpoint.
pub const EP0_MAX_PACKET_SIZE: u8 = 64;

/// Number of the bulk endpoint pair in the vendor interface.
pub const BULK_ENDPOINT: u8 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UsbState {
    Start,
    Powered,
    Configured,
}

/// Which wait of the core soft reset gave up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResetStage {
    /// The core never cleared its reset request bit.
    ResetRequest,
    /// The AHB master never reported idle.
    AhbIdle,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UsbError {
    InvalidEndpoint,
    /// The endpoint's fixed direction does not allow this direction.
    DirectionNotSupported,
    /// Handlers bind to IN or OUT, never both.
    BidirectionalHandler,
    ResetTimeout(ResetStage),
    /// The descriptor tree is in use further up the call stack.
    Busy,
    OutOfMemory,
    Descriptor(DescriptorError),
}

impl From<DescriptorError> for UsbError {
    fn from(err: DescriptorError) -> UsbError {
        match err {
            DescriptorError::OutOfMemory => UsbError::OutOfMemory,
            err => UsbError::Descriptor(err),
        }
    }
}

impl From<UsbError> for ErrorCode {
    fn from(err: UsbError) -> ErrorCode {
        match err {
            UsbError::InvalidEndpoint | UsbError::BidirectionalHandler => ErrorCode::INVAL,
            UsbError::DirectionNotSupported => ErrorCode::NOSUPPORT,
            UsbError::ResetTimeout(_) => ErrorCode::NOACK,
            UsbError::Busy => ErrorCode::BUSY,
            UsbError::OutOfMemory => ErrorCode::NOMEM,
            UsbError::Descriptor(err) => err.into(),
        }
    }
}

/// Max bulk packet size for an enumerated speed id.
pub fn packet_size_from_speed(speed: u8) -> u16 {
    Speed::from_id(speed).map_or(INVALID_PACKET_SIZE, Speed::max_packet_size)
}

// Values written to every endpoint's interrupt register during bring-up.
const IN_EP_INTERRUPTS: u32 = 0x7F; // INEPNAKEFF..XFERCOMPL
const OUT_EP_INTERRUPTS: u32 = 0x1F; // OUTTKNEPDIS..XFERCOMPL
const ALL_INTERRUPTS: u32 = 0xFFFF_FFFF;

pub struct UsbOtg<'a> {
    registers: StaticRef<UsbOtgRegisters>,
    phy: StaticRef<UsbPhyRegisters>,
    platform: UsbPlatform,
    power: &'a dyn PowerControl,
    clocks: &'a dyn ClockGate,
    interrupts: &'a dyn InterruptController<'a>,
    delay: &'a dyn BusyDelay,

    initialized: Cell<bool>,
    state: Cell<UsbState>,
    endpoints: EndpointRegistry<'a>,
    buffers: ScratchBuffers,
    descriptors: MapCell<DescriptorSet>,
    dispatcher: OptionalCell<&'a dyn Dispatcher<'a>>,
}

impl<'a> UsbOtg<'a> {
    pub fn new(
        registers: StaticRef<UsbOtgRegisters>,
        phy: StaticRef<UsbPhyRegisters>,
        platform: UsbPlatform,
        power: &'a dyn PowerControl,
        clocks: &'a dyn ClockGate,
        interrupts: &'a dyn InterruptController<'a>,
        delay: &'a dyn BusyDelay,
    ) -> UsbOtg<'a> {
        UsbOtg {
            registers,
            phy,
            platform,
            power,
            clocks,
            interrupts,
            delay,
            initialized: Cell::new(false),
            state: Cell::new(UsbState::Start),
            endpoints: EndpointRegistry::new(),
            buffers: ScratchBuffers::new(),
            descriptors: MapCell::new(DescriptorSet::new()),
            dispatcher: OptionalCell::empty(),
        }
    }

    pub fn state(&self) -> UsbState {
        self.state.get()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.get()
    }

    pub fn endpoints(&self) -> &EndpointRegistry<'a> {
        &self.endpoints
    }

    /// Route interrupts to `dispatcher`. Until one is set the interrupt
    /// handler does nothing.
    pub fn set_dispatcher(&self, dispatcher: &'a dyn Dispatcher<'a>) {
        self.dispatcher.set(dispatcher);
    }

    /// Speed the core negotiated with the host.
    pub fn negotiated_speed(&self) -> Option<Speed> {
        Speed::from_id(self.registers.dsts.read(DSTS::ENUMSPD) as u8)
    }

    fn change_state(&self, new_state: UsbState) {
        let old_state = self.state.replace(new_state);
        if old_state != new_state {
            log::debug!("usb: {:?} -> {:?}", old_state, new_state);
        }
    }

    fn step(&self, what: &str) {
        if CONFIG.trace_usb_setup {
            log::trace!("usb: {}", what);
        }
    }

    fn settle(&self, us: u32) {
        if CONFIG.trace_usb_setup {
            log::trace!("usb: settle {}us", us);
        }
        self.delay.delay_us(us);
    }

    /// Poll `done` according to the platform's reset wait policy.
    fn wait_for_reset(&self, stage: ResetStage, done: impl Fn() -> bool) -> Result<(), UsbError> {
        match self.platform.reset_wait {
            ResetWait::Forever => {
                while !done() {
                    core::hint::spin_loop();
                }
                Ok(())
            }
            ResetWait::Bounded {
                attempts,
                interval_us,
            } => {
                for _ in 0..attempts {
                    if done() {
                        return Ok(());
                    }
                    self.delay.delay_us(interval_us);
                }
                if done() {
                    Ok(())
                } else {
                    log::warn!("usb: core reset timed out waiting for {:?}", stage);
                    Err(UsbError::ResetTimeout(stage))
                }
            }
        }
    }

    fn program_endpoint_interrupts(&self, include_spare: bool) {
        let regs = self.registers;
        // The boot ROM also programs the slot just past the last wired
        // endpoint on the first pass.
        if include_spare {
            regs.in_endpoints[NUM_ENDPOINTS]
                .interrupt
                .set(IN_EP_INTERRUPTS);
            regs.out_endpoints[NUM_ENDPOINTS]
                .interrupt
                .set(OUT_EP_INTERRUPTS);
        }
        for i in 0..NUM_ENDPOINTS {
            regs.in_endpoints[i].interrupt.set(IN_EP_INTERRUPTS);
            regs.out_endpoints[i].interrupt.set(OUT_EP_INTERRUPTS);
        }
    }

    fn with_descriptors<R>(
        &self,
        f: impl FnOnce(&mut DescriptorSet) -> Result<R, DescriptorError>,
    ) -> Result<R, UsbError> {
        self.descriptors
            .map(|set| f(set).map_err(UsbError::from))
            .unwrap_or(Err(UsbError::Busy))
    }

    /// Bring the controller from reset to an enumerable, powered state.
    /// Does nothing if the controller is already up.
    pub fn setup(&'a self) -> Result<(), UsbError> {
        if self.initialized.get() {
            return Ok(());
        }
        log::debug!("usb: setup");

        let regs = self.registers;
        let phy = self.phy;
        let platform = &self.platform;

        // Both endpoint banks live inside the core's register window, so
        // there is nothing else to bind.
        self.change_state(UsbState::Start);

        self.step("power on");
        self.power.set_power(platform.power_domain, true);
        self.settle(delay::START);

        self.endpoints.set_capabilities(platform.endpoint_directions);
        self.endpoints.clear_handlers();

        self.step("clock gates on");
        self.clocks.set_clock_gate(platform.otg_clock_gate, true);
        self.clocks.set_clock_gate(platform.phy_clock_gate, true);
        self.clocks.set_clock_gate(platform.edram_clock_gate, true);

        self.step("soft disconnect");
        regs.dctl.modify(DCTL::SFTDISCON::SET);
        self.settle(delay::SFTDISCONNECT);

        self.step("OTG on");
        regs.pcgcctl
            .modify(PCGCCTL::STOPPCLK::CLEAR + PCGCCTL::GATEHCLK::CLEAR);
        self.settle(delay::ONOFFSTART);

        self.step("PHY on");
        phy.ophypwr.set(0);
        self.settle(delay::PHYPWRPOWERON);
        phy.ophyclk.modify(OPHYCLK::CLKSEL::Clk48MHz);

        self.step("PHY reset");
        phy.orstcon.modify(ORSTCON::PHYSWRESET::SET);
        self.settle(delay::RESET2);
        phy.orstcon.modify(ORSTCON::PHYSWRESET::CLEAR);
        self.settle(delay::RESET);

        self.step("core soft reset");
        regs.grstctl.write(GRSTCTL::CSFTRST::SET);
        self.wait_for_reset(ResetStage::ResetRequest, || {
            !regs.grstctl.is_set(GRSTCTL::CSFTRST)
        })?;
        self.wait_for_reset(ResetStage::AhbIdle, || {
            regs.grstctl.is_set(GRSTCTL::AHBIDLE)
        })?;
        self.settle(delay::RESETWAITFINISH);

        self.step("soft connect");
        regs.dctl.modify(DCTL::SFTDISCON::CLEAR);
        self.settle(delay::SFTCONNECT);

        self.program_endpoint_interrupts(true);

        // Nothing is unmasked until the rest of the core is configured.
        regs.gintmsk.set(0);
        regs.diepmsk.set(0);
        regs.doepmsk.set(0);

        self.interrupts.install(platform.irq, self, 0);
        self.interrupts.enable(platform.irq);

        self.with_descriptors(|set| {
            set.clear();
            Ok(())
        })?;
        self.buffers.allocate()?;

        self.step("core configuration");
        regs.gahbcfg.write(
            GAHBCFG::DMAEN::SET + GAHBCFG::HBSTLEN::Incr8 + GAHBCFG::GLBLINTRMSK::SET,
        );
        regs.quirk.set(1);
        regs.dcfg.write(DCFG::NZSTSOUTHSHK::SET);
        regs.dcfg.modify(DCFG::DEVADDR.val(0));
        regs.in_endpoints[0].control.write(EPCTL::USBAEP::SET);
        regs.out_endpoints[0].control.write(EPCTL::USBAEP::SET);

        regs.grxfsiz.set(RX_FIFO_DEPTH);
        // Standard depth-in-the-high-half layout; the boot ROM's value puts
        // the depth at bit 8 instead.
        regs.gnptxfsiz.write(
            GNPTXFSIZ::NPTXFDEP.val(TX_FIFO_DEPTH) + GNPTXFSIZ::NPTXFSTADDR.val(TX_FIFO_START),
        );

        self.program_endpoint_interrupts(false);

        self.step("unmask interrupts");
        regs.gintmsk.write(
            GINT::OTGINT::SET
                + GINT::USBSUSP::SET
                + GINT::USBRST::SET
                + GINT::IEPINT::SET
                + GINT::OEPINT::SET
                + GINT::DISCINT::SET,
        );
        regs.daintmsk.set(ALL_INTERRUPTS);
        // The boot ROM writes each of these twice.
        for _ in 0..2 {
            regs.doepmsk
                .write(DOEPMSK::XFRCM::SET + DOEPMSK::STUPM::SET + DOEPMSK::B2BSTUP::SET);
        }
        for _ in 0..2 {
            regs.diepmsk
                .write(DIEPMSK::XFRCM::SET + DIEPMSK::AHBERRM::SET + DIEPMSK::TOM::SET);
        }
        regs.in_endpoints[0].interrupt.set(ALL_INTERRUPTS);
        regs.out_endpoints[0].interrupt.set(ALL_INTERRUPTS);

        self.step("program done");
        regs.dctl
            .write(DCTL::PWRONPRGDONE::SET + DCTL::CGOUTNAK::SET + DCTL::CGNPINNAK::SET);
        self.settle(delay::PROGRAMDONE);
        regs.gotgctl.modify(GOTGCTL::SESREQ::SET);

        self.change_state(UsbState::Powered);
        self.initialized.set(true);
        log::debug!("usb: powered");
        Ok(())
    }

    /// Power the controller down and release the descriptor tree.
    ///
    /// Power and clocks are switched back on first so the teardown writes
    /// reach the hardware even if something gated them in the meantime.
    /// Installed endpoint handlers survive; the next `setup` clears them.
    pub fn shutdown(&self) -> Result<(), UsbError> {
        log::debug!("usb: shutdown");
        let regs = self.registers;
        let phy = self.phy;
        let platform = &self.platform;

        self.power.set_power(platform.power_domain, true);
        self.clocks.set_clock_gate(platform.otg_clock_gate, true);
        self.clocks.set_clock_gate(platform.phy_clock_gate, true);

        self.step("link off");
        regs.pcgcctl
            .modify(PCGCCTL::STOPPCLK::SET + PCGCCTL::GATEHCLK::SET);
        phy.ophypwr.write(
            OPHYPWR::FORCESUSPEND::SET
                + OPHYPWR::PLLPOWERDOWN::SET
                + OPHYPWR::XOPOWERDOWN::SET
                + OPHYPWR::ANALOGPOWERDOWN::SET
                + OPHYPWR::OTGDISABLE::SET,
        );
        phy.orstcon.write(
            ORSTCON::PHYSWRESET::SET + ORSTCON::LINKSWRESET::SET + ORSTCON::PHYLINKSWRESET::SET,
        );
        self.settle(delay::RESET);

        self.clocks.set_clock_gate(platform.otg_clock_gate, false);
        self.clocks.set_clock_gate(platform.phy_clock_gate, false);
        self.power.set_power(platform.power_domain, false);

        self.with_descriptors(|set| {
            set.clear();
            Ok(())
        })?;

        self.initialized.set(false);
        self.change_state(UsbState::Start);
        Ok(())
    }

    /// Build the device descriptor and its configuration if that has not
    /// happened yet.
    fn build_device(&self, set: &mut DescriptorSet) -> Result<DeviceDescriptor, DescriptorError> {
        if let Some(device) = set.device() {
            return Ok(*device);
        }

        let identity = &self.platform.identity;
        let device = DeviceDescriptor {
            usb_release: USB_2_0,
            class: 0,
            subclass: 0,
            protocol: 0,
            max_packet_size_ep0: EP0_MAX_PACKET_SIZE,
            vendor_id: identity.vendor_id,
            product_id: identity.product_id,
            device_release: identity.device_release,
            manufacturer_string: set.add_string(identity.manufacturer)?,
            product_string: set.add_string(identity.product)?,
            serial_number_string: set.add_string(identity.serial_number)?,
            num_configurations: 0,
        };
        set.set_device(device);

        let configuration_string = set.add_string(identity.configuration)?;
        set.add_configuration(
            1,
            configuration_string,
            ConfigurationAttributes::new(false, false),
            identity.max_power_ma,
        )?;

        Ok(DeviceDescriptor {
            num_configurations: set.num_configurations() as u8,
            ..device
        })
    }

    /// Add the vendor interface and its bulk endpoint pair to configuration
    /// 0, then close it.
    fn build_interface(&self, set: &mut DescriptorSet, speed: u8) -> Result<(), DescriptorError> {
        let identity = &self.platform.identity;
        let interface_string = set.add_string(identity.interface)?;
        let interface = set.add_interface(
            0,
            InterfaceDescriptor {
                interface_number: 0,
                alternate_setting: 0,
                num_endpoints: 0,
                interface_class: identity.interface_class,
                interface_subclass: identity.interface_subclass,
                interface_protocol: identity.interface_protocol,
                string_index: interface_string,
            },
        )?;

        let packet_size = packet_size_from_speed(speed);
        let bulk = EndpointAttributes::data(TransferType::Bulk);
        for direction in [EndpointDirection::In, EndpointDirection::Out] {
            set.add_endpoint(
                0,
                interface,
                BULK_ENDPOINT,
                direction as u8,
                bulk,
                packet_size,
                0,
            )?;
        }
        set.end_configuration(0)?;
        Ok(())
    }

    pub fn get_device_descriptor(&self) -> Result<DeviceDescriptor, UsbError> {
        self.with_descriptors(|set| self.build_device(set))
    }

    /// Configuration `index`. The first query for configuration 0 fills in
    /// its interface, sizing the bulk endpoints for `speed` (an enumerated
    /// speed id as found in DSTS).
    pub fn get_configuration_descriptor(
        &self,
        index: u8,
        speed: u8,
    ) -> Result<ConfigurationDescriptor, UsbError> {
        self.with_descriptors(|set| {
            self.build_device(set)?;
            if index == 0 && set.configuration(0)?.num_interfaces == 0 && !set.is_closed(0)? {
                self.build_interface(set, speed)?;
            }
            set.configuration(index).copied()
        })
    }

    /// Write the full configuration tree for a GET_DESCRIPTOR request into
    /// `buf`, returning its length.
    pub fn write_configuration(&self, index: u8, speed: u8, buf: &mut [u8]) -> Result<usize, UsbError> {
        self.get_configuration_descriptor(index, speed)?;
        self.with_descriptors(|set| set.write_configuration(index, buf))
    }

    /// Run `f` on string descriptor `index` as registered. Index 0 is the
    /// supported-languages table.
    pub fn map_string_descriptor<R>(
        &self,
        index: u8,
        f: impl FnOnce(StringEntry<'_>) -> R,
    ) -> Result<R, UsbError> {
        self.with_descriptors(|set| set.string(index).map(f))
    }

    /// Write string descriptor `index` into `buf` in wire format, returning
    /// its length.
    pub fn get_string_descriptor(&self, index: u8, buf: &mut [u8]) -> Result<usize, UsbError> {
        self.map_string_descriptor(index, |entry| {
            if entry.size() > buf.len() {
                Err(DescriptorError::BufferTooSmall)
            } else {
                Ok(entry.write_to(buf))
            }
        })?
        .map_err(UsbError::from)
    }

    /// Bind `handler` to one direction of `endpoint`. The direction must be
    /// IN or OUT and allowed by the endpoint's hardware capability.
    pub fn install_ep_handler(
        &self,
        endpoint: usize,
        direction: EndpointDirection,
        handler: &'a dyn EndpointHandler,
        token: u32,
    ) -> Result<(), UsbError> {
        self.endpoints.install(endpoint, direction, handler, token)
    }
}

impl InterruptHandler for UsbOtg<'_> {
    fn handle_interrupt(&self, _token: u32) {
        self.dispatcher
            .map(|dispatcher| dispatcher.dispatch(&self.endpoints, &self.buffers));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packet_sizes() {
        assert_eq!(packet_size_from_speed(0), 512);
        assert_eq!(packet_size_from_speed(1), 64);
        assert_eq!(packet_size_from_speed(3), 64);
        assert_eq!(packet_size_from_speed(2), 32);
        assert_eq!(packet_size_from_speed(4), INVALID_PACKET_SIZE);
        assert_eq!(packet_size_from_speed(0xff), INVALID_PACKET_SIZE);
    }

    #[test]
    fn error_codes() {
        assert_eq!(ErrorCode::from(UsbError::InvalidEndpoint), ErrorCode::INVAL);
        assert_eq!(
            ErrorCode::from(UsbError::DirectionNotSupported),
            ErrorCode::NOSUPPORT
        );
        assert_eq!(
            ErrorCode::from(UsbError::ResetTimeout(ResetStage::AhbIdle)),
            ErrorCode::NOACK
        );
        assert_eq!(
            ErrorCode::from(UsbError::from(DescriptorError::InvalidDirection(5))),
            ErrorCode::INVAL
        );
        assert_eq!(
            UsbError::from(DescriptorError::OutOfMemory),
            UsbError::OutOfMemory
        );
    }
}
