// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2024.

//! USB 2.0 descriptor data types and their wire encoding.

use alloc::vec::Vec;
use kernel::hil::usb::{EndpointDirection, TransferType};

/// Language id for English (United States).
pub const LANGID_ENGLISH_US: u16 = 0x0409;

/// `bcdUSB` value for USB 2.0.
pub const USB_2_0: u16 = 0x0200;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DescriptorType {
    Device = 1,
    Configuration,
    String,
    Interface,
    Endpoint,
    DeviceQualifier,
    OtherSpeedConfiguration,
    InterfacePower,
}

pub trait Descriptor {
    /// Serialized size of Descriptor
    fn size(&self) -> usize;

    /// Serialize the descriptor to a buffer for transmission on the bus.
    /// Returns the number of bytes written, or 0 if `buf` is too short.
    fn write_to(&self, buf: &mut [u8]) -> usize {
        if self.size() > buf.len() {
            0
        } else {
            self.write_to_unchecked(buf)
        }
    }

    /// Same as `write_to()`, but doesn't check that `buf` is long enough
    /// before indexing into it.  This should be used only if the result
    /// of `size()` is first consulted.
    fn write_to_unchecked(&self, buf: &mut [u8]) -> usize;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Valid values include 0x0100 (USB1.0), 0x0110 (USB1.1) and 0x0200 (USB2.0)
    pub usb_release: u16,

    /// 0x00 means each interface defines its own class.
    /// 0xFF means the class behavior is defined by the vendor.
    pub class: u8,
    pub subclass: u8,
    pub protocol: u8,

    /// Max packet size for endpoint 0.  Must be 8, 16, 32 or 64
    pub max_packet_size_ep0: u8,

    pub vendor_id: u16,
    pub product_id: u16,

    /// Device release number in binary coded decimal (BCD)
    pub device_release: u16,

    /// Index of the string descriptor describing manufacturer, or 0 if none
    pub manufacturer_string: u8,

    /// Index of the string descriptor describing product, or 0 if none
    pub product_string: u8,

    /// Index of the string descriptor giving device serial number, or 0 if none
    pub serial_number_string: u8,

    pub num_configurations: u8,
}

impl Default for DeviceDescriptor {
    fn default() -> Self {
        DeviceDescriptor {
            usb_release: USB_2_0,
            class: 0,
            subclass: 0,
            protocol: 0,
            max_packet_size_ep0: 64,
            vendor_id: 0,
            product_id: 0,
            device_release: 0,
            manufacturer_string: 0,
            product_string: 0,
            serial_number_string: 0,
            num_configurations: 0,
        }
    }
}

impl Descriptor for DeviceDescriptor {
    fn size(&self) -> usize {
        18
    }

    fn write_to_unchecked(&self, buf: &mut [u8]) -> usize {
        buf[0] = 18; // Size of descriptor
        buf[1] = DescriptorType::Device as u8;
        put_u16(&mut buf[2..4], self.usb_release);
        buf[4] = self.class;
        buf[5] = self.subclass;
        buf[6] = self.protocol;
        buf[7] = self.max_packet_size_ep0;
        put_u16(&mut buf[8..10], self.vendor_id);
        put_u16(&mut buf[10..12], self.product_id);
        put_u16(&mut buf[12..14], self.device_release);
        buf[14] = self.manufacturer_string;
        buf[15] = self.product_string;
        buf[16] = self.serial_number_string;
        buf[17] = self.num_configurations;
        18
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ConfigurationDescriptor {
    /// Length of this descriptor plus every interface and endpoint
    /// descriptor that follows it. Zero until the configuration is closed.
    pub total_length: u16,
    pub num_interfaces: u8,
    pub configuration_value: u8,
    pub string_index: u8,
    pub attributes: ConfigurationAttributes,
    pub max_power: u8, // in 2mA units
}

impl Descriptor for ConfigurationDescriptor {
    fn size(&self) -> usize {
        9
    }

    fn write_to_unchecked(&self, buf: &mut [u8]) -> usize {
        buf[0] = 9; // Size of descriptor
        buf[1] = DescriptorType::Configuration as u8;
        put_u16(&mut buf[2..4], self.total_length);
        buf[4] = self.num_interfaces;
        buf[5] = self.configuration_value;
        buf[6] = self.string_index;
        buf[7] = u8::from(self.attributes);
        buf[8] = self.max_power;
        9
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ConfigurationAttributes(u8);

impl ConfigurationAttributes {
    pub fn new(is_self_powered: bool, supports_remote_wakeup: bool) -> Self {
        ConfigurationAttributes(
            (1 << 7)
                | if is_self_powered { 1 << 6 } else { 0 }
                | if supports_remote_wakeup { 1 << 5 } else { 0 },
        )
    }

    pub fn is_self_powered(self) -> bool {
        self.0 & (1 << 6) != 0
    }

    pub fn supports_remote_wakeup(self) -> bool {
        self.0 & (1 << 5) != 0
    }
}

impl From<ConfigurationAttributes> for u8 {
    fn from(ca: ConfigurationAttributes) -> u8 {
        ca.0
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct InterfaceDescriptor {
    pub interface_number: u8,
    pub alternate_setting: u8,
    pub num_endpoints: u8, // (excluding default control endpoint)
    pub interface_class: u8,
    pub interface_subclass: u8,
    pub interface_protocol: u8,
    pub string_index: u8,
}

impl Default for InterfaceDescriptor {
    fn default() -> Self {
        InterfaceDescriptor {
            interface_number: 0,
            alternate_setting: 0,
            num_endpoints: 0,
            interface_class: 0xff, // vendor_specific
            interface_subclass: 0,
            interface_protocol: 0,
            string_index: 0,
        }
    }
}

impl Descriptor for InterfaceDescriptor {
    fn size(&self) -> usize {
        9
    }

    fn write_to_unchecked(&self, buf: &mut [u8]) -> usize {
        buf[0] = 9; // Size of descriptor
        buf[1] = DescriptorType::Interface as u8;
        buf[2] = self.interface_number;
        buf[3] = self.alternate_setting;
        buf[4] = self.num_endpoints;
        buf[5] = self.interface_class;
        buf[6] = self.interface_subclass;
        buf[7] = self.interface_protocol;
        buf[8] = self.string_index;
        9
    }
}

/// `bEndpointAddress`: endpoint number in bits 0-3, direction in bit 7.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EndpointAddress(u8);

impl EndpointAddress {
    /// `BiDir` has no wire encoding of its own and is written as OUT.
    pub const fn new(endpoint: u8, direction: EndpointDirection) -> Self {
        let in_bit = match direction {
            EndpointDirection::In => 1 << 7,
            EndpointDirection::Out | EndpointDirection::BiDir => 0,
        };
        EndpointAddress((endpoint & 0xf) | in_bit)
    }

    pub fn number(self) -> u8 {
        self.0 & 0xf
    }

    pub fn is_in(self) -> bool {
        self.0 & (1 << 7) != 0
    }
}

impl From<EndpointAddress> for u8 {
    fn from(addr: EndpointAddress) -> u8 {
        addr.0
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SynchronizationType {
    NoSynchronization = 0,
    Asynchronous = 1,
    Adaptive = 2,
    Synchronous = 3,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UsageType {
    Data = 0,
    Feedback = 1,
    ImplicitFeedbackData = 2,
}

/// `bmAttributes` of an endpoint descriptor.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EndpointAttributes {
    pub transfer_type: TransferType,
    pub synchronization: SynchronizationType,
    pub usage: UsageType,
}

impl EndpointAttributes {
    /// A plain data endpoint of the given transfer type.
    pub const fn data(transfer_type: TransferType) -> Self {
        EndpointAttributes {
            transfer_type,
            synchronization: SynchronizationType::NoSynchronization,
            usage: UsageType::Data,
        }
    }
}

impl From<EndpointAttributes> for u8 {
    fn from(attr: EndpointAttributes) -> u8 {
        (attr.transfer_type as u8 & 0x3)
            | ((attr.synchronization as u8 & 0x3) << 2)
            | ((attr.usage as u8 & 0x3) << 4)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EndpointDescriptor {
    pub endpoint_address: EndpointAddress,
    pub attributes: EndpointAttributes,
    pub max_packet_size: u16,
    // Poll for device data every `interval` frames
    pub interval: u8,
}

impl Descriptor for EndpointDescriptor {
    fn size(&self) -> usize {
        7
    }

    fn write_to_unchecked(&self, buf: &mut [u8]) -> usize {
        let len = self.size();
        buf[0] = len as u8;
        buf[1] = DescriptorType::Endpoint as u8;
        buf[2] = u8::from(self.endpoint_address);
        buf[3] = u8::from(self.attributes);
        // Written as given; an unknown link speed is visible to the host as
        // an invalid size rather than silently truncated.
        put_u16(&mut buf[4..6], self.max_packet_size);
        buf[6] = self.interval;
        len
    }
}

/// String descriptor zero: the table of supported language ids.
pub struct LanguagesDescriptor<'a> {
    pub langs: &'a [u16],
}

impl Descriptor for LanguagesDescriptor<'_> {
    fn size(&self) -> usize {
        2 + (2 * self.langs.len())
    }

    fn write_to_unchecked(&self, buf: &mut [u8]) -> usize {
        let len = self.size();
        buf[0] = len as u8;
        buf[1] = DescriptorType::String as u8;
        for (i, lang) in self.langs.iter().enumerate() {
            put_u16(&mut buf[2 + (2 * i)..4 + (2 * i)], *lang);
        }
        len
    }
}

/// A string descriptor, held as UTF-16 code units.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StringDescriptor {
    units: Vec<u16>,
}

impl StringDescriptor {
    /// Most code units a single descriptor can hold, since `bLength` is one
    /// byte.
    pub const MAX_UNITS: usize = (u8::MAX as usize - 2) / 2;

    /// Wrap already encoded code units. The caller is responsible for
    /// staying within [`Self::MAX_UNITS`].
    pub fn from_units(units: Vec<u16>) -> Self {
        StringDescriptor { units }
    }

    pub fn units(&self) -> &[u16] {
        &self.units
    }

    pub fn chars(&self) -> impl Iterator<Item = char> + '_ {
        char::decode_utf16(self.units.iter().copied())
            .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
    }
}

impl Descriptor for StringDescriptor {
    fn size(&self) -> usize {
        2 + (2 * self.units.len())
    }

    // Encode as utf16-le
    fn write_to_unchecked(&self, buf: &mut [u8]) -> usize {
        let len = self.size();
        buf[0] = len as u8;
        buf[1] = DescriptorType::String as u8;
        for (i, unit) in self.units.iter().enumerate() {
            put_u16(&mut buf[2 + (2 * i)..4 + (2 * i)], *unit);
        }
        len
    }
}

/// Result of a string descriptor lookup: index 0 is the language table,
/// everything else a registered string.
pub enum StringEntry<'a> {
    Languages(LanguagesDescriptor<'a>),
    String(&'a StringDescriptor),
}

impl Descriptor for StringEntry<'_> {
    fn size(&self) -> usize {
        match self {
            StringEntry::Languages(langs) => langs.size(),
            StringEntry::String(s) => s.size(),
        }
    }

    fn write_to_unchecked(&self, buf: &mut [u8]) -> usize {
        match self {
            StringEntry::Languages(langs) => langs.write_to_unchecked(buf),
            StringEntry::String(s) => s.write_to_unchecked(buf),
        }
    }
}

/// Write a `u16` to a buffer for transmission on the bus
fn put_u16(buf: &mut [u8], n: u16) {
    buf[0] = (n & 0xff) as u8;
    buf[1] = (n >> 8) as u8;
}
