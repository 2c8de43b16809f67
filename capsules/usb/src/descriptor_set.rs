// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2024.

//! Growable descriptor tree for a USB device.
//!
//! A [`DescriptorSet`] owns the device descriptor, every configuration with
//! its interfaces and endpoints, and the string table. Records are addressed
//! by index only; the set never hands out references that outlive the
//! borrow used to look them up, so growing a collection cannot invalidate
//! anything a caller holds.
//!
//! Index assignment follows call order:
//!
//! - configurations, interfaces and endpoints are numbered from 0 within
//!   their owner;
//! - strings are numbered from 1, and index 0 is the language table, which
//!   gains one [`LANGID_ENGLISH_US`] entry per registered string.
//!
//! Growth goes through `Vec::try_reserve`, so running out of heap surfaces
//! as [`DescriptorError::OutOfMemory`] instead of aborting.

use alloc::vec::Vec;
use kernel::hil::usb::EndpointDirection;
use kernel::ErrorCode;

use crate::descriptors::{
    ConfigurationAttributes, ConfigurationDescriptor, Descriptor, DeviceDescriptor,
    EndpointAddress, EndpointAttributes, EndpointDescriptor, InterfaceDescriptor,
    LanguagesDescriptor, StringDescriptor, StringEntry, LANGID_ENGLISH_US,
};

const CONFIGURATION_LENGTH: usize = 9;
const INTERFACE_LENGTH: usize = 9;
const ENDPOINT_LENGTH: usize = 7;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DescriptorError {
    /// The raw direction code is none of Out, In or BiDir.
    InvalidDirection(u8),
    NoSuchConfiguration,
    NoSuchInterface,
    NoSuchString,
    /// An index would no longer fit in its one-byte field.
    TableFull,
    StringTooLong,
    /// The configuration was already closed with `end_configuration`.
    AlreadyClosed,
    BufferTooSmall,
    OutOfMemory,
}

impl From<DescriptorError> for ErrorCode {
    fn from(err: DescriptorError) -> ErrorCode {
        match err {
            DescriptorError::InvalidDirection(_)
            | DescriptorError::NoSuchConfiguration
            | DescriptorError::NoSuchInterface
            | DescriptorError::NoSuchString => ErrorCode::INVAL,
            DescriptorError::TableFull
            | DescriptorError::StringTooLong
            | DescriptorError::BufferTooSmall => ErrorCode::SIZE,
            DescriptorError::AlreadyClosed => ErrorCode::ALREADY,
            DescriptorError::OutOfMemory => ErrorCode::NOMEM,
        }
    }
}

struct Interface {
    descriptor: InterfaceDescriptor,
    endpoints: Vec<EndpointDescriptor>,
}

struct Configuration {
    descriptor: ConfigurationDescriptor,
    interfaces: Vec<Interface>,
    closed: bool,
}

impl Configuration {
    fn wire_length(&self) -> usize {
        self.interfaces
            .iter()
            .fold(CONFIGURATION_LENGTH, |len, iface| {
                len + INTERFACE_LENGTH + ENDPOINT_LENGTH * iface.endpoints.len()
            })
    }
}

/// Append `item`, returning its index, or fail if the new index would not
/// fit in a descriptor's one-byte field.
fn push<T>(vec: &mut Vec<T>, item: T) -> Result<u8, DescriptorError> {
    // The owner's count field is a u8 as well.
    if vec.len() >= u8::MAX as usize {
        return Err(DescriptorError::TableFull);
    }
    vec.try_reserve(1)
        .map_err(|_| DescriptorError::OutOfMemory)?;
    vec.push(item);
    Ok((vec.len() - 1) as u8)
}

pub struct DescriptorSet {
    device: Option<DeviceDescriptor>,
    configurations: Vec<Configuration>,
    strings: Vec<StringDescriptor>,
    languages: Vec<u16>,
}

impl DescriptorSet {
    /// Most strings the set holds. The language table carries one entry
    /// per string and its one-byte length must still cover all of them.
    pub const MAX_STRINGS: usize = (u8::MAX as usize - 2) / 2;

    pub const fn new() -> DescriptorSet {
        DescriptorSet {
            device: None,
            configurations: Vec::new(),
            strings: Vec::new(),
            languages: Vec::new(),
        }
    }

    /// Release every descriptor and reset all counts to zero.
    pub fn clear(&mut self) {
        self.device = None;
        self.configurations = Vec::new();
        self.strings = Vec::new();
        self.languages = Vec::new();
    }

    /// Install the device descriptor. `num_configurations` is maintained by
    /// the set and overrides whatever `descriptor` carries.
    pub fn set_device(&mut self, descriptor: DeviceDescriptor) {
        self.device = Some(DeviceDescriptor {
            num_configurations: self.configurations.len() as u8,
            ..descriptor
        });
    }

    pub fn device(&self) -> Option<&DeviceDescriptor> {
        self.device.as_ref()
    }

    pub fn num_configurations(&self) -> usize {
        self.configurations.len()
    }

    /// Append a configuration and return its 0-based index.
    ///
    /// `max_power_ma` is in milliamps and stored in the descriptor's 2 mA
    /// units.
    pub fn add_configuration(
        &mut self,
        configuration_value: u8,
        string_index: u8,
        attributes: ConfigurationAttributes,
        max_power_ma: u16,
    ) -> Result<u8, DescriptorError> {
        let configuration = Configuration {
            descriptor: ConfigurationDescriptor {
                total_length: 0,
                num_interfaces: 0,
                configuration_value,
                string_index,
                attributes,
                max_power: (max_power_ma / 2).min(u8::MAX as u16) as u8,
            },
            interfaces: Vec::new(),
            closed: false,
        };
        let index = push(&mut self.configurations, configuration)?;
        if let Some(device) = self.device.as_mut() {
            device.num_configurations += 1;
        }
        Ok(index)
    }

    pub fn configuration(&self, index: u8) -> Result<&ConfigurationDescriptor, DescriptorError> {
        self.configurations
            .get(index as usize)
            .map(|c| &c.descriptor)
            .ok_or(DescriptorError::NoSuchConfiguration)
    }

    pub fn is_closed(&self, index: u8) -> Result<bool, DescriptorError> {
        self.configurations
            .get(index as usize)
            .map(|c| c.closed)
            .ok_or(DescriptorError::NoSuchConfiguration)
    }

    /// Finalize the total length of a configuration: its own header, plus
    /// each interface header and that interface's endpoint headers. This can
    /// only happen once per configuration.
    pub fn end_configuration(&mut self, index: u8) -> Result<u16, DescriptorError> {
        let configuration = self.open_configuration(index)?;
        let total = u16::try_from(configuration.wire_length())
            .map_err(|_| DescriptorError::TableFull)?;
        configuration.descriptor.total_length = total;
        configuration.closed = true;
        Ok(total)
    }

    fn open_configuration(&mut self, index: u8) -> Result<&mut Configuration, DescriptorError> {
        let configuration = self
            .configurations
            .get_mut(index as usize)
            .ok_or(DescriptorError::NoSuchConfiguration)?;
        if configuration.closed {
            return Err(DescriptorError::AlreadyClosed);
        }
        Ok(configuration)
    }

    /// Append an interface to `configuration` and return its 0-based index.
    /// The interface starts without endpoints whatever `descriptor` says.
    pub fn add_interface(
        &mut self,
        configuration: u8,
        descriptor: InterfaceDescriptor,
    ) -> Result<u8, DescriptorError> {
        let config = self.open_configuration(configuration)?;
        let interface = Interface {
            descriptor: InterfaceDescriptor {
                num_endpoints: 0,
                ..descriptor
            },
            endpoints: Vec::new(),
        };
        let index = push(&mut config.interfaces, interface)?;
        config.descriptor.num_interfaces += 1;
        Ok(index)
    }

    pub fn interface(
        &self,
        configuration: u8,
        interface: u8,
    ) -> Result<&InterfaceDescriptor, DescriptorError> {
        self.configurations
            .get(configuration as usize)
            .ok_or(DescriptorError::NoSuchConfiguration)?
            .interfaces
            .get(interface as usize)
            .map(|i| &i.descriptor)
            .ok_or(DescriptorError::NoSuchInterface)
    }

    /// Append an endpoint to an interface and return its 0-based index.
    ///
    /// `direction` is the raw [`EndpointDirection`] code. Anything outside
    /// the recognized set is rejected and the interface is left untouched.
    pub fn add_endpoint(
        &mut self,
        configuration: u8,
        interface: u8,
        number: u8,
        direction: u8,
        attributes: EndpointAttributes,
        max_packet_size: u16,
        interval: u8,
    ) -> Result<u8, DescriptorError> {
        let direction = EndpointDirection::from_raw(direction)
            .ok_or(DescriptorError::InvalidDirection(direction))?;
        let iface = self
            .open_configuration(configuration)?
            .interfaces
            .get_mut(interface as usize)
            .ok_or(DescriptorError::NoSuchInterface)?;
        let endpoint = EndpointDescriptor {
            endpoint_address: EndpointAddress::new(number, direction),
            attributes,
            max_packet_size,
            interval,
        };
        let index = push(&mut iface.endpoints, endpoint)?;
        iface.descriptor.num_endpoints += 1;
        Ok(index)
    }

    pub fn endpoints(
        &self,
        configuration: u8,
        interface: u8,
    ) -> Result<&[EndpointDescriptor], DescriptorError> {
        self.configurations
            .get(configuration as usize)
            .ok_or(DescriptorError::NoSuchConfiguration)?
            .interfaces
            .get(interface as usize)
            .map(|i| i.endpoints.as_slice())
            .ok_or(DescriptorError::NoSuchInterface)
    }

    /// Register a string and return its 1-based index.
    pub fn add_string(&mut self, string: &str) -> Result<u8, DescriptorError> {
        if self.strings.len() >= Self::MAX_STRINGS {
            return Err(DescriptorError::TableFull);
        }
        let len = string.encode_utf16().count();
        if len > StringDescriptor::MAX_UNITS {
            return Err(DescriptorError::StringTooLong);
        }
        let mut units = Vec::new();
        units
            .try_reserve_exact(len)
            .map_err(|_| DescriptorError::OutOfMemory)?;
        units.extend(string.encode_utf16());

        // Reserve both tables up front so a failure leaves them in step.
        self.strings
            .try_reserve(1)
            .map_err(|_| DescriptorError::OutOfMemory)?;
        self.languages
            .try_reserve(1)
            .map_err(|_| DescriptorError::OutOfMemory)?;
        self.strings.push(StringDescriptor::from_units(units));
        self.languages.push(LANGID_ENGLISH_US);
        Ok(self.strings.len() as u8)
    }

    pub fn num_strings(&self) -> usize {
        self.strings.len()
    }

    pub fn string(&self, index: u8) -> Result<StringEntry<'_>, DescriptorError> {
        match index {
            0 => Ok(StringEntry::Languages(LanguagesDescriptor {
                langs: &self.languages,
            })),
            n => self
                .strings
                .get(n as usize - 1)
                .map(StringEntry::String)
                .ok_or(DescriptorError::NoSuchString),
        }
    }

    /// Serialize a configuration and everything below it: the configuration
    /// header, then each interface header followed by its endpoints.
    /// Returns the number of bytes written.
    pub fn write_configuration(&self, index: u8, buf: &mut [u8]) -> Result<usize, DescriptorError> {
        let configuration = self
            .configurations
            .get(index as usize)
            .ok_or(DescriptorError::NoSuchConfiguration)?;
        if configuration.wire_length() > buf.len() {
            return Err(DescriptorError::BufferTooSmall);
        }

        let mut len = configuration.descriptor.write_to_unchecked(buf);
        for iface in configuration.interfaces.iter() {
            len += iface.descriptor.write_to_unchecked(&mut buf[len..]);
            for ep in iface.endpoints.iter() {
                len += ep.write_to_unchecked(&mut buf[len..]);
            }
        }
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel::hil::usb::TransferType;

    fn bulk() -> EndpointAttributes {
        EndpointAttributes::data(TransferType::Bulk)
    }

    fn one_interface(set: &mut DescriptorSet) -> (u8, u8) {
        let config = set
            .add_configuration(1, 0, ConfigurationAttributes::new(false, false), 500)
            .unwrap();
        let iface = set
            .add_interface(config, InterfaceDescriptor::default())
            .unwrap();
        (config, iface)
    }

    #[test]
    fn indices_are_dense() {
        let mut set = DescriptorSet::new();
        assert_eq!(set.add_string("a"), Ok(1));
        assert_eq!(set.add_string("b"), Ok(2));
        let (config, iface) = one_interface(&mut set);
        assert_eq!((config, iface), (0, 0));
        assert_eq!(
            set.add_interface(config, InterfaceDescriptor::default()),
            Ok(1)
        );
        assert_eq!(set.add_endpoint(0, 1, 1, 1, bulk(), 512, 0), Ok(0));
        assert_eq!(set.add_endpoint(0, 1, 1, 0, bulk(), 512, 0), Ok(1));
        assert_eq!(set.configuration(0).unwrap().num_interfaces, 2);
        assert_eq!(set.interface(0, 1).unwrap().num_endpoints, 2);
    }

    #[test]
    fn invalid_direction_leaves_count_unchanged() {
        let mut set = DescriptorSet::new();
        let (config, iface) = one_interface(&mut set);
        assert_eq!(
            set.add_endpoint(config, iface, 1, 3, bulk(), 64, 0),
            Err(DescriptorError::InvalidDirection(3))
        );
        assert_eq!(set.interface(config, iface).unwrap().num_endpoints, 0);
        assert!(set.endpoints(config, iface).unwrap().is_empty());
    }

    #[test]
    fn bidir_endpoint_is_accepted() {
        let mut set = DescriptorSet::new();
        let (config, iface) = one_interface(&mut set);
        assert_eq!(set.add_endpoint(config, iface, 2, 2, bulk(), 64, 0), Ok(0));
        let ep = set.endpoints(config, iface).unwrap()[0];
        assert!(!ep.endpoint_address.is_in());
        assert_eq!(ep.endpoint_address.number(), 2);
    }

    #[test]
    fn end_configuration_sums_headers_once() {
        let mut set = DescriptorSet::new();
        let (config, iface) = one_interface(&mut set);
        set.add_endpoint(config, iface, 1, 1, bulk(), 512, 0).unwrap();
        set.add_endpoint(config, iface, 1, 0, bulk(), 512, 0).unwrap();
        assert_eq!(set.configuration(config).unwrap().total_length, 0);
        assert_eq!(set.end_configuration(config), Ok(9 + 9 + 2 * 7));
        assert_eq!(set.configuration(config).unwrap().total_length, 32);
        assert_eq!(
            set.end_configuration(config),
            Err(DescriptorError::AlreadyClosed)
        );
        assert_eq!(
            set.add_interface(config, InterfaceDescriptor::default()),
            Err(DescriptorError::AlreadyClosed)
        );
    }

    #[test]
    fn device_tracks_configuration_count() {
        let mut set = DescriptorSet::new();
        set.set_device(DeviceDescriptor {
            num_configurations: 7,
            ..Default::default()
        });
        assert_eq!(set.device().unwrap().num_configurations, 0);
        one_interface(&mut set);
        assert_eq!(set.device().unwrap().num_configurations, 1);
    }

    #[test]
    fn language_table_follows_strings() {
        let mut set = DescriptorSet::new();
        for s in ["x", "", "yz"] {
            set.add_string(s).unwrap();
        }
        let mut buf = [0u8; 16];
        let len = set.string(0).unwrap().write_to(&mut buf);
        assert_eq!(len, 2 + 2 * 3);
        assert_eq!(&buf[..len], &[8, 3, 0x09, 0x04, 0x09, 0x04, 0x09, 0x04]);

        let len = set.string(3).unwrap().write_to(&mut buf);
        assert_eq!(&buf[..len], &[6, 3, b'y', 0, b'z', 0]);
        let len = set.string(2).unwrap().write_to(&mut buf);
        assert_eq!(&buf[..len], &[2, 3]);
        assert!(matches!(set.string(4), Err(DescriptorError::NoSuchString)));
    }

    #[test]
    fn language_table_length_stays_in_one_byte() {
        let mut set = DescriptorSet::new();
        for _ in 0..DescriptorSet::MAX_STRINGS {
            set.add_string("s").unwrap();
        }
        assert_eq!(set.add_string("s"), Err(DescriptorError::TableFull));
        assert_eq!(set.num_strings(), 126);

        let mut buf = [0u8; 256];
        let len = set.string(0).unwrap().write_to(&mut buf);
        assert_eq!(len, 254);
        assert_eq!(buf[0] as usize, len);
        let len = set.string(126).unwrap().write_to(&mut buf);
        assert_eq!(&buf[..len], &[4, 3, b's', 0]);
    }

    #[test]
    fn oversized_string_is_rejected() {
        let mut set = DescriptorSet::new();
        let long = "a".repeat(StringDescriptor::MAX_UNITS + 1);
        assert_eq!(set.add_string(&long), Err(DescriptorError::StringTooLong));
        assert_eq!(set.num_strings(), 0);
        let fits = "a".repeat(StringDescriptor::MAX_UNITS);
        assert_eq!(set.add_string(&fits), Ok(1));
    }

    #[test]
    fn write_configuration_serializes_tree() {
        let mut set = DescriptorSet::new();
        let (config, iface) = one_interface(&mut set);
        set.add_endpoint(config, iface, 1, 1, bulk(), 64, 0).unwrap();
        set.end_configuration(config).unwrap();

        let mut small = [0u8; 24];
        assert_eq!(
            set.write_configuration(config, &mut small),
            Err(DescriptorError::BufferTooSmall)
        );

        let mut buf = [0u8; 64];
        assert_eq!(set.write_configuration(config, &mut buf), Ok(25));
        assert_eq!(&buf[..9], &[9, 2, 25, 0, 1, 1, 0, 0x80, 250]);
        assert_eq!(&buf[9..11], &[9, 4]);
        assert_eq!(&buf[18..25], &[7, 5, 0x81, 2, 64, 0, 0]);
    }

    #[test]
    fn clear_resets_counts() {
        let mut set = DescriptorSet::new();
        set.set_device(DeviceDescriptor::default());
        set.add_string("a").unwrap();
        one_interface(&mut set);
        set.clear();
        assert!(set.device().is_none());
        assert_eq!(set.num_configurations(), 0);
        assert_eq!(set.num_strings(), 0);
        assert_eq!(set.add_string("a"), Ok(1));
    }
}
