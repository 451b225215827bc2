//! Known UF2 family IDs.
//!
//! A family ID is advisory: it never changes how a file is parsed or
//! assembled, it only names the board the image was built for.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Family {
    pub id: u32,
    pub name: &'static str,
}

impl Family {
    pub const fn new(id: u32, name: &'static str) -> Self {
        Self { id, name }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:#010x})", self.name, self.id)
    }
}

pub const RP2040_FAMILY_ID: u32 = 0xe48bff56;

// See https://github.com/microsoft/uf2/blob/master/utils/uf2families.json for list
// Kept sorted by id.
pub const FAMILIES: &[Family] = &[
    Family::new(0x00ff6919, "ST STM32L4xx"),
    Family::new(0x04240bdf, "ST STM32L5xx"),
    Family::new(0x16573617, "Microchip (Atmel) ATmega32"),
    Family::new(0x1851780a, "Microchip (Atmel) SAML21"),
    Family::new(0x1b57745f, "Nordic NRF52"),
    Family::new(0x1c5f21b0, "ESP32"),
    Family::new(0x1e1f432d, "ST STM32L1xx"),
    Family::new(0x202e3a91, "ST STM32L0xx"),
    Family::new(0x21460ff0, "ST STM32WLxx"),
    Family::new(0x2abc77ec, "NXP LPC55xx"),
    Family::new(0x300f5633, "ST STM32G0xx"),
    Family::new(0x31d228c6, "GD32F350"),
    Family::new(0x4c71240a, "ST STM32G4xx"),
    Family::new(0x4fb2d5bd, "NXP i.MX RT10XX"),
    Family::new(0x53b80f00, "ST STM32F7xx"),
    Family::new(0x55114460, "Microchip (Atmel) SAMD51"),
    Family::new(0x57755a57, "ST STM32F401"),
    Family::new(0x5a18069b, "Cypress FX2"),
    Family::new(0x5d1a0a2e, "ST STM32F2xx"),
    Family::new(0x5ee21072, "ST STM32F103"),
    Family::new(0x647824b6, "ST STM32F0xx"),
    Family::new(0x68ed2b88, "Microchip (Atmel) SAMD21"),
    Family::new(0x6b846188, "ST STM32F3xx"),
    Family::new(0x6d0922fa, "ST STM32F407"),
    Family::new(0x6db66082, "ST STM32H7xx"),
    Family::new(0x70d16653, "ST STM32WBxx"),
    Family::new(0x7eab61ed, "ESP8266"),
    Family::new(0x7f83e793, "NXP KL32L2x"),
    Family::new(0x8fb060fe, "ST STM32F407VG"),
    Family::new(0xada52840, "Nordic NRF52840"),
    Family::new(0xbfdd4eee, "ESP32-S2"),
    Family::new(0xc47e5767, "ESP32-S3"),
    Family::new(0xd42ba06c, "ESP32-C3"),
    Family::new(RP2040_FAMILY_ID, "Raspberry Pi RP2040"),
    Family::new(
        0xe48bff57,
        "Raspberry Pi Microcontrollers: Absolute (unpartitioned) download",
    ),
    Family::new(0xe48bff58, "Raspberry Pi Microcontrollers: Data partition download"),
    Family::new(0xe48bff59, "Raspberry Pi RP2350, Secure Arm image"),
    Family::new(0xe48bff5a, "Raspberry Pi RP2350, RISC-V image"),
    Family::new(0xe48bff5b, "Raspberry Pi RP2350, Non-secure Arm image"),
];

pub fn lookup(id: u32) -> Option<&'static Family> {
    FAMILIES
        .binary_search_by_key(&id, |family| family.id)
        .ok()
        .map(|index| &FAMILIES[index])
}

pub fn find_by_name(name: &str) -> Option<&'static Family> {
    FAMILIES
        .iter()
        .find(|family| family.name.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_sorted_and_unique() {
        assert!(FAMILIES.windows(2).all(|pair| pair[0].id < pair[1].id));
    }

    #[test]
    fn lookup_known_ids() {
        assert_eq!(lookup(0xe48bff56).unwrap().name, "Raspberry Pi RP2040");
        assert_eq!(lookup(0x00ff6919).unwrap().name, "ST STM32L4xx");
        assert_eq!(lookup(0xada52840).unwrap().name, "Nordic NRF52840");
    }

    #[test]
    fn lookup_unknown_id() {
        assert_eq!(lookup(0), None);
        assert_eq!(lookup(0xffffffff), None);
    }

    #[test]
    fn find_by_name_ignores_case() {
        assert_eq!(find_by_name("esp32-s3").unwrap().id, 0xc47e5767);
        assert_eq!(find_by_name("raspberry pi rp2040").unwrap().id, RP2040_FAMILY_ID);
        assert_eq!(find_by_name("rp2041"), None);
    }
}
