//! PIN verification handshake
//!
//! 1. Select the extension applet
//! 2. Fetch the 32-byte card challenge
//! 3. Derive key material from the PIN
//! 4. Encrypt the challenge in three rounds
//! 5. Submit the answer with VERIFY
//!
//! The handshake runs once; a failed attempt is never retried here since every
//! wrong answer costs a card retry.

use derive_more::Display;
use nexum_ccid_core::BulkTransport;
use tracing::{debug, trace};

use crate::card::ThaiIdCard;
use crate::commands::Applet;
use crate::crypto::{Pin, derive_key_material, encrypt_challenge};
use crate::{Result, ResultExt};

/// Outcome of a VERIFY exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinStatus {
    /// Card accepted the PIN
    Verified,
    /// Card rejected the PIN
    WrongPin {
        /// Attempts left before the PIN blocks
        remaining: u8,
    },
}

/// Step of the handshake
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum PinStage {
    /// Selecting the extension applet
    #[display("select applet")]
    SelectApplet,
    /// Fetching the card challenge
    #[display("challenge")]
    Challenge,
    /// Deriving key material from the PIN
    #[display("derive")]
    Derive,
    /// Encrypting the challenge
    #[display("encrypt")]
    Encrypt,
    /// Submitting the answer
    #[display("verify")]
    Verify,
    /// Handshake finished with a card verdict
    #[display("done")]
    Done,
}

/// Runs the handshake and remembers where it stopped
#[derive(Debug)]
pub struct PinVerifier {
    stage: PinStage,
}

impl Default for PinVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl PinVerifier {
    /// Create a verifier at the first stage
    pub const fn new() -> Self {
        Self {
            stage: PinStage::SelectApplet,
        }
    }

    /// Stage reached, or the stage that failed
    pub const fn stage(&self) -> PinStage {
        self.stage
    }

    /// Run the handshake against a card
    ///
    /// Errors are wrapped with the name of the failing stage.
    pub fn verify<T: BulkTransport>(
        &mut self,
        card: &mut ThaiIdCard<T>,
        pin: &Pin,
    ) -> Result<PinStatus> {
        self.enter(PinStage::SelectApplet);
        card.select_applet(Applet::Extension)
            .context(self.context())?;

        self.enter(PinStage::Challenge);
        let challenge = card.pin_challenge().context(self.context())?;
        trace!(challenge = %hex::encode(challenge), "Received challenge");

        self.enter(PinStage::Derive);
        let key = derive_key_material(pin);

        self.enter(PinStage::Encrypt);
        let answer = encrypt_challenge(&key, &challenge);
        drop(key);

        self.enter(PinStage::Verify);
        let status = card.verify_pin_answer(&answer).context(self.context())?;

        self.enter(PinStage::Done);
        Ok(status)
    }

    fn enter(&mut self, stage: PinStage) {
        debug!(%stage, "PIN verification");
        self.stage = stage;
    }

    fn context(&self) -> String {
        format!("PIN verification failed at {} stage", self.stage)
    }
}
