//! Thai national ID card reader
//!
//! This crate drives a Thai national ID card through a CCID-style reader:
//! ISO 7816-4 case chaining on top of the reader session, the PIN
//! challenge-response handshake, and readers for the card's personal data,
//! chip administration record and picture.
//!
//! The main entry point is [`ThaiIdCard`], built over any
//! [`BulkTransport`](nexum_ccid_core::BulkTransport).

#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]

pub mod apdu;
pub mod card;
pub mod commands;
pub mod crypto;
pub mod error;
pub mod fields;
pub mod pin;

// Re-exports
pub use apdu::{ApduError, ApduSession, Command, ExchangeState, StatusWord};
pub use card::{ChipInfo, ThaiIdCard};
pub use commands::Applet;
pub use crypto::{Challenge, KeyMaterial, Pin, PinAnswer, pin_answer};
pub use error::{Error, Result, ResultExt};
pub use fields::{FieldSpec, PERSONAL_FIELDS, PersonalInformation, PersonalRecord};
pub use pin::{PinStage, PinStatus, PinVerifier};

// Re-export the reader layer for convenience
pub use nexum_ccid_core::{CcidConfig, CcidReader, Protocol};
