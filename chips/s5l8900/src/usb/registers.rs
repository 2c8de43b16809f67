// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2024.

//! Register map of the OTG core and its PHY.

use kernel::utilities::registers::{register_bitfields, register_structs, ReadOnly, ReadWrite};

/// Endpoint slots per bank. Only the first few are wired to hardware, the
/// rest of the bank is address space.
pub const ENDPOINT_SLOTS: usize = 16;

register_structs! {
    pub UsbOtgRegisters {
        // Core global registers
        (0x000 => pub gotgctl: ReadWrite<u32, GOTGCTL::Register>),
        (0x004 => _reserved0),
        (0x008 => pub gahbcfg: ReadWrite<u32, GAHBCFG::Register>),
        (0x00C => _reserved1),
        (0x010 => pub grstctl: ReadWrite<u32, GRSTCTL::Register>),
        (0x014 => pub gintsts: ReadWrite<u32, GINT::Register>),
        (0x018 => pub gintmsk: ReadWrite<u32, GINT::Register>),
        (0x01C => _reserved2),
        (0x024 => pub grxfsiz: ReadWrite<u32>),
        (0x028 => pub gnptxfsiz: ReadWrite<u32, GNPTXFSIZ::Register>),
        // Not in any datasheet; the boot ROM writes 1 here before enabling
        // the device and the core misbehaves without it.
        (0x02C => pub quirk: ReadWrite<u32>),
        (0x030 => _reserved3),
        // Device-mode registers
        (0x800 => pub dcfg: ReadWrite<u32, DCFG::Register>),
        (0x804 => pub dctl: ReadWrite<u32, DCTL::Register>),
        (0x808 => pub dsts: ReadOnly<u32, DSTS::Register>),
        (0x80C => _reserved4),
        (0x810 => pub diepmsk: ReadWrite<u32, DIEPMSK::Register>),
        (0x814 => pub doepmsk: ReadWrite<u32, DOEPMSK::Register>),
        (0x818 => pub daint: ReadOnly<u32>),
        (0x81C => pub daintmsk: ReadWrite<u32>),
        (0x820 => _reserved5),
        (0x900 => pub in_endpoints: [EndpointRegisters; ENDPOINT_SLOTS]),
        (0xB00 => pub out_endpoints: [EndpointRegisters; ENDPOINT_SLOTS]),
        (0xD00 => _reserved6),
        // Power and clock gating, "on/off" in the boot ROM
        (0xE00 => pub pcgcctl: ReadWrite<u32, PCGCCTL::Register>),
        (0xE04 => @END),
    },

    pub EndpointRegisters {
        (0x000 => pub control: ReadWrite<u32, EPCTL::Register>),
        (0x004 => _reserved0),
        (0x008 => pub interrupt: ReadWrite<u32, EPINT::Register>),
        (0x00C => _reserved1),
        (0x010 => pub transfer_size: ReadWrite<u32>),
        (0x014 => pub dma_address: ReadWrite<u32>),
        (0x018 => _reserved2),
        (0x020 => @END),
    },

    pub UsbPhyRegisters {
        (0x000 => pub ophypwr: ReadWrite<u32, OPHYPWR::Register>),
        (0x004 => pub ophyclk: ReadWrite<u32, OPHYCLK::Register>),
        (0x008 => pub orstcon: ReadWrite<u32, ORSTCON::Register>),
        (0x00C => @END),
    }
}

register_bitfields![u32,
    pub GOTGCTL [
        /// Session request
        SESREQ OFFSET(1) NUMBITS(1) []
    ],

    pub GAHBCFG [
        /// Global interrupt mask (1 = interrupts delivered)
        GLBLINTRMSK OFFSET(0) NUMBITS(1) [],
        /// AHB burst length
        HBSTLEN OFFSET(1) NUMBITS(4) [
            Single = 0,
            Incr = 1,
            Incr4 = 3,
            Incr8 = 5,
            Incr16 = 7
        ],
        DMAEN OFFSET(5) NUMBITS(1) []
    ],

    pub GRSTCTL [
        /// Core soft reset, self-clearing
        CSFTRST OFFSET(0) NUMBITS(1) [],
        /// AHB master idle
        AHBIDLE OFFSET(31) NUMBITS(1) []
    ],

    // Shared by GINTSTS and GINTMSK
    pub GINT [
        OTGINT OFFSET(2) NUMBITS(1) [],
        USBSUSP OFFSET(11) NUMBITS(1) [],
        USBRST OFFSET(12) NUMBITS(1) [],
        IEPINT OFFSET(18) NUMBITS(1) [],
        OEPINT OFFSET(19) NUMBITS(1) [],
        DISCINT OFFSET(29) NUMBITS(1) []
    ],

    pub GNPTXFSIZ [
        NPTXFSTADDR OFFSET(0) NUMBITS(16) [],
        NPTXFDEP OFFSET(16) NUMBITS(16) []
    ],

    pub DCFG [
        /// Non-zero-length status OUT handshake
        NZSTSOUTHSHK OFFSET(2) NUMBITS(1) [],
        DEVADDR OFFSET(4) NUMBITS(7) []
    ],

    pub DCTL [
        SFTDISCON OFFSET(1) NUMBITS(1) [],
        CGNPINNAK OFFSET(8) NUMBITS(1) [],
        CGOUTNAK OFFSET(10) NUMBITS(1) [],
        PWRONPRGDONE OFFSET(11) NUMBITS(1) []
    ],

    pub DSTS [
        ENUMSPD OFFSET(1) NUMBITS(2) [
            High = 0,
            Full = 1,
            Low = 2,
            Full48MHz = 3
        ]
    ],

    pub DIEPMSK [
        XFRCM OFFSET(0) NUMBITS(1) [],
        EPDM OFFSET(1) NUMBITS(1) [],
        AHBERRM OFFSET(2) NUMBITS(1) [],
        TOM OFFSET(3) NUMBITS(1) []
    ],

    pub DOEPMSK [
        XFRCM OFFSET(0) NUMBITS(1) [],
        EPDM OFFSET(1) NUMBITS(1) [],
        AHBERRM OFFSET(2) NUMBITS(1) [],
        STUPM OFFSET(3) NUMBITS(1) [],
        B2BSTUP OFFSET(6) NUMBITS(1) []
    ],

    pub PCGCCTL [
        STOPPCLK OFFSET(0) NUMBITS(1) [],
        GATEHCLK OFFSET(1) NUMBITS(1) []
    ],

    pub EPCTL [
        /// USB active endpoint
        USBAEP OFFSET(15) NUMBITS(1) []
    ],

    // Endpoint interrupt status and enable. Some bits mean different
    // things in the IN and OUT banks.
    pub EPINT [
        XFERCOMPL OFFSET(0) NUMBITS(1) [],
        EPDISBLD OFFSET(1) NUMBITS(1) [],
        AHBERR OFFSET(2) NUMBITS(1) [],
        /// IN: timeout
        TIMEOUT OFFSET(3) NUMBITS(1) [],
        /// OUT: SETUP phase done
        SETUP OFFSET(3) NUMBITS(1) [],
        /// IN: token received while TX FIFO empty
        INTKNTXFEMP OFFSET(4) NUMBITS(1) [],
        /// OUT: token received while endpoint disabled
        OUTTKNEPDIS OFFSET(4) NUMBITS(1) [],
        INTKNEPMIS OFFSET(5) NUMBITS(1) [],
        INEPNAKEFF OFFSET(6) NUMBITS(1) []
    ],

    pub OPHYPWR [
        FORCESUSPEND OFFSET(0) NUMBITS(1) [],
        PLLPOWERDOWN OFFSET(1) NUMBITS(1) [],
        XOPOWERDOWN OFFSET(2) NUMBITS(1) [],
        ANALOGPOWERDOWN OFFSET(3) NUMBITS(1) [],
        OTGDISABLE OFFSET(4) NUMBITS(1) []
    ],

    pub OPHYCLK [
        CLKSEL OFFSET(0) NUMBITS(2) [
            Clk48MHz = 0,
            Clk12MHz = 2,
            Clk24MHz = 3
        ]
    ],

    pub ORSTCON [
        PHYSWRESET OFFSET(0) NUMBITS(1) [],
        LINKSWRESET OFFSET(1) NUMBITS(1) [],
        PHYLINKSWRESET OFFSET(2) NUMBITS(1) []
    ]
];
