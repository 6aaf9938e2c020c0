//! PIN-derived key material and challenge encryption
//!
//! The card proves knowledge of the PIN through a challenge-response. The host
//! hashes the PIN, spreads the digest over a 32-byte derivation buffer, and
//! encrypts the card's 32-byte challenge with three cascaded two-key
//! triple-DES passes keyed from overlapping windows of that buffer.

use std::fmt;

use cipher::{Block, BlockEncryptMut, Key, KeyIvInit};
use derive_more::{AsRef, Deref};
use des::TdesEde3;
use sha1::{Digest, Sha1};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{Error, Result};

/// Length of the card challenge and of the answer
pub const CHALLENGE_LEN: usize = 32;

/// Length of a PIN in ASCII digits
pub const PIN_LEN: usize = 4;

/// Start offsets of the round keys within the derivation buffer
const ROUND_OFFSETS: [usize; 3] = [0, 8, 16];

/// Card challenge returned by the extension applet
pub type Challenge = [u8; CHALLENGE_LEN];

/// A four digit PIN, wiped from memory on drop
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Pin([u8; PIN_LEN]);

impl Pin {
    /// Validate and store a PIN
    pub fn new(pin: &str) -> Result<Self> {
        let bytes: [u8; PIN_LEN] = pin.as_bytes().try_into().map_err(|_| Error::InvalidPin)?;
        if !bytes.iter().all(u8::is_ascii_digit) {
            return Err(Error::InvalidPin);
        }
        Ok(Self(bytes))
    }

    /// ASCII digits of the PIN
    pub const fn as_bytes(&self) -> &[u8; PIN_LEN] {
        &self.0
    }
}

impl fmt::Debug for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Pin(****)")
    }
}

impl std::str::FromStr for Pin {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

/// Key derivation buffer built from the PIN digest
#[derive(Clone, Deref, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial([u8; 32]);

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("KeyMaterial").field(&"..").finish()
    }
}

/// Encrypted challenge submitted with VERIFY
#[derive(Clone, PartialEq, Eq, AsRef, Deref)]
pub struct PinAnswer([u8; CHALLENGE_LEN]);

impl fmt::Debug for PinAnswer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PinAnswer({})", hex::encode(self.0))
    }
}

/// SHA-1 over the PIN digits padded to 32 bytes with `0xFF`
pub fn pin_digest(pin: &Pin) -> [u8; 20] {
    let mut expanded = [0xFFu8; 32];
    expanded[..PIN_LEN].copy_from_slice(pin.as_bytes());
    let digest = Sha1::digest(expanded);
    expanded.zeroize();
    digest.into()
}

/// Spread the PIN digest over a buffer seeded with `00 01 .. 1F`
///
/// Each 4-byte digest group lands 7 bytes after the previous one, so the
/// seed shows through in the 3-byte gaps.
pub fn derive_key_material(pin: &Pin) -> KeyMaterial {
    let mut digest = pin_digest(pin);
    let mut material: [u8; 32] = core::array::from_fn(|i| i as u8);

    for (group, chunk) in digest.chunks_exact(4).enumerate() {
        let at = group * 7;
        material[at..at + 4].copy_from_slice(chunk);
    }

    digest.zeroize();
    KeyMaterial(material)
}

/// Encrypt the card challenge with the three round keys in turn
pub fn encrypt_challenge(key: &KeyMaterial, challenge: &Challenge) -> PinAnswer {
    encrypt_rounds(key, challenge, &ROUND_OFFSETS)
}

/// Compute the VERIFY answer for a PIN and challenge
pub fn pin_answer(pin: &Pin, challenge: &Challenge) -> PinAnswer {
    encrypt_challenge(&derive_key_material(pin), challenge)
}

fn encrypt_rounds(key: &KeyMaterial, challenge: &Challenge, offsets: &[usize]) -> PinAnswer {
    let mut blocks = [Block::<TdesEde3>::default(); CHALLENGE_LEN / 8];
    for (block, chunk) in blocks.iter_mut().zip(challenge.chunks_exact(8)) {
        block.copy_from_slice(chunk);
    }

    for &offset in offsets {
        let mut round_key = resize_key(&key[offset..offset + 16]);
        let mut encryptor = cbc::Encryptor::<TdesEde3>::new(&round_key, &Default::default());
        encryptor.encrypt_blocks_mut(&mut blocks);
        round_key.as_mut_slice().zeroize();
    }

    let mut answer = [0u8; CHALLENGE_LEN];
    for (chunk, block) in answer.chunks_exact_mut(8).zip(&blocks) {
        chunk.copy_from_slice(block);
    }
    PinAnswer(answer)
}

/// Expand a 16-byte two-key value to K1 K2 K1
fn resize_key(key: &[u8]) -> Key<TdesEde3> {
    let mut result = Key::<TdesEde3>::default();
    result[..16].copy_from_slice(key);
    result[16..24].copy_from_slice(&key[..8]);
    result
}
