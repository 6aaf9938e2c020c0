//! End-to-end card flows against a scripted reader

use bytes::Bytes;
use hex_literal::hex;
use nexum_ccid_core::mock::{MockTransport, data_block_frame};
use nexum_thaiid::{
    Error, Pin, PinStage, PinStatus, PinVerifier, StatusWord, ThaiIdCard, pin_answer,
};

const SELECT_EXTENSION: [u8; 13] = hex!("00 A4 04 00 08 A0 00 00 00 84 06 00 02");
const SELECT_STORAGE: [u8; 13] = hex!("00 A4 04 00 08 A0 00 00 00 54 48 00 01");

/// Queues card replies in the order the host will read them
struct Script {
    mock: MockTransport,
}

impl Script {
    fn new() -> Self {
        Self {
            mock: MockTransport::new(64),
        }
    }

    fn reply(mut self, payload: &[u8]) -> Self {
        self.mock.push_frame(&data_block_frame(0, 0, payload));
        self
    }

    fn slot_error(mut self, status: u8, error: u8) -> Self {
        self.mock.push_frame(&data_block_frame(status, error, &[]));
        self
    }

    /// `61 XX` followed by the body and `90 00`
    fn chained(self, data: &[u8]) -> Self {
        let mut body = data.to_vec();
        body.extend_from_slice(&hex!("90 00"));
        self.reply(&[0x61, data.len() as u8]).reply(&body)
    }

    fn selected(self) -> Self {
        self.chained(&[])
    }

    fn card(self) -> ThaiIdCard<MockTransport> {
        ThaiIdCard::from_transport(self.mock)
    }
}

fn sent(card: &ThaiIdCard<MockTransport>) -> Vec<Bytes> {
    card.session().reader().transport().sent_payloads()
}

#[test]
fn verify_pin_end_to_end() {
    let mut card = Script::new()
        .selected()
        .chained(&[0u8; 32])
        .reply(&hex!("90 00"))
        .card();

    let status = card.verify_pin(&Pin::new("0000").unwrap()).unwrap();
    assert_eq!(status, PinStatus::Verified);

    let sent = sent(&card);
    assert_eq!(sent.len(), 5);
    assert_eq!(sent[0].as_ref(), SELECT_EXTENSION);
    assert_eq!(sent[1].as_ref(), hex!("00 C0 00 00 00"));
    assert_eq!(sent[2].as_ref(), hex!("80 B4 00 00"));
    assert_eq!(sent[3].as_ref(), hex!("00 C0 00 00 20"));

    let mut verify = hex!("80 20 01 00 20").to_vec();
    verify.extend_from_slice(&hex!(
        "1daec80149dd00126b798eea34ce0cb6f085e590a7109516b9e8f8d6694518be"
    ));
    assert_eq!(sent[4].as_ref(), verify.as_slice());
}

#[test]
fn verify_pin_reports_remaining_attempts() {
    let challenge: [u8; 32] = core::array::from_fn(|i| i as u8);
    let mut card = Script::new()
        .selected()
        .chained(&challenge)
        .reply(&hex!("63 02"))
        .card();

    let pin = Pin::new("1234").unwrap();
    let status = card.verify_pin(&pin).unwrap();
    assert_eq!(status, PinStatus::WrongPin { remaining: 2 });

    let sent = sent(&card);
    assert_eq!(&sent[4][5..], &pin_answer(&pin, &challenge)[..]);
}

#[test]
fn verify_pin_rejects_unknown_verdict() {
    let mut card = Script::new()
        .selected()
        .chained(&[0u8; 32])
        .reply(&hex!("69 83"))
        .card();

    let mut verifier = PinVerifier::new();
    let err = verifier
        .verify(&mut card, &Pin::new("0000").unwrap())
        .unwrap_err();

    assert_eq!(verifier.stage(), PinStage::Verify);
    assert!(matches!(err.root(), Error::InvalidResponse(_)));
    assert!(err.to_string().starts_with("PIN verification failed at verify stage"));
}

#[test]
fn verify_verdict_from_status_word() {
    let answer = pin_answer(&Pin::new("0000").unwrap(), &[0u8; 32]);
    let mut card = Script::new()
        .reply(&hex!("63 00"))
        .reply(&hex!("90 01"))
        .reply(&hex!("90"))
        .card();

    assert_eq!(
        card.verify_pin_answer(&answer).unwrap(),
        PinStatus::WrongPin { remaining: 0 }
    );
    assert_eq!(card.verify_pin_answer(&answer).unwrap(), PinStatus::Verified);
    assert!(matches!(
        card.verify_pin_answer(&answer),
        Err(Error::InvalidResponse(_))
    ));
    // VERIFY is never chained
    assert_eq!(sent(&card).len(), 3);
}

#[test]
fn verify_pin_aborts_on_short_challenge() {
    let mut card = Script::new()
        .selected()
        .chained(&[0u8; 16])
        .card();

    let mut verifier = PinVerifier::new();
    let err = verifier
        .verify(&mut card, &Pin::new("0000").unwrap())
        .unwrap_err();

    assert_eq!(verifier.stage(), PinStage::Challenge);
    assert!(matches!(
        err.root(),
        Error::InvalidLength {
            expected: 34,
            actual: 18
        }
    ));
    // No VERIFY was sent
    assert_eq!(sent(&card).len(), 4);
}

#[test]
fn verify_pin_aborts_when_select_fails() {
    let mut card = Script::new().slot_error(0x41, 0xFE).card();

    let mut verifier = PinVerifier::new();
    let err = verifier
        .verify(&mut card, &Pin::new("0000").unwrap())
        .unwrap_err();

    assert_eq!(verifier.stage(), PinStage::SelectApplet);
    assert!(matches!(
        err.root(),
        Error::SlotError {
            status: 0x41,
            error: 0xFE
        }
    ));
}

#[test]
fn card_presence_from_atr() {
    let mut card = Script::new()
        .reply(&hex!("3B 78 18 00 00 00 73 C8 40 13 00 90 00"))
        .card();
    assert!(card.is_inserted().unwrap());

    let mut card = Script::new().slot_error(0x42, 0xFE).card();
    assert!(!card.is_inserted().unwrap());
}

#[test]
fn card_id_from_chip_record() {
    let record: Vec<u8> = (0..45u8).collect();
    let mut card = Script::new().selected().chained(&record).card();

    assert_eq!(card.card_id().unwrap(), "0d0e0f1011121314");

    let sent = sent(&card);
    assert_eq!(sent[0].as_ref(), hex!("00 A4 04 00"));
    assert_eq!(sent[2].as_ref(), hex!("80 CA 9F 7F"));
    assert_eq!(sent[3].as_ref(), hex!("00 C0 00 00 2D"));
}

#[test]
fn card_id_rejects_error_status() {
    let mut body = vec![0u8; 45];
    body.extend_from_slice(&hex!("6A 82"));
    let mut card = Script::new()
        .selected()
        .reply(&hex!("61 2D"))
        .reply(&body)
        .card();

    let err = card.card_id().unwrap_err();
    assert!(matches!(err.root(), Error::CardStatus(sw) if *sw == StatusWord::new(0x6A, 0x82)));
}

#[test]
fn personal_information_reads_three_blocks() {
    let mut first = vec![b' '; 0xFF];
    first[..4].copy_from_slice(b"0001");
    first[4..17].copy_from_slice(b"3100600123456");
    first[17..29].copy_from_slice(b"NAME#SURNAME");
    first[246..253].copy_from_slice(b"OFFICE ");
    let mut second = vec![b' '; 0x7A];
    // Record offsets 346.. land at 91.. in the second block
    second[91..104].copy_from_slice(b"1234567890123");
    second[120..122].copy_from_slice(b"02");
    let mut address = vec![b' '; 0xAE];
    address[..10].copy_from_slice(b"12#Road#BK");

    let mut card = Script::new()
        .selected()
        .chained(&first)
        .chained(&second)
        .chained(&address)
        .card();

    let info = card.personal_information().unwrap();
    assert_eq!(info.personal_id.as_ref(), b"3100600123456");
    assert_eq!(info.name_th.as_ref(), b"NAME SURNAME");
    assert_eq!(info.issuer.as_ref(), b"OFFICE");
    assert_eq!(info.issuer_code.as_ref(), b"1234567890123");
    assert_eq!(info.address.as_ref(), b"12 Road BK");
    assert!(info.card_info.starts_with(b"02-0001-"));

    let sent = sent(&card);
    assert_eq!(sent[0].as_ref(), SELECT_STORAGE);
    assert_eq!(sent[2].as_ref(), hex!("80 B0 00 00 02 00 FF"));
    assert_eq!(sent[4].as_ref(), hex!("80 B0 00 FF 02 00 7A"));
    assert_eq!(sent[6].as_ref(), hex!("80 B0 15 79 02 00 AE"));
}

#[test]
fn personal_information_fails_on_short_block() {
    let mut card = Script::new()
        .selected()
        .chained(&[b' '; 0x10])
        .card();

    let err = card.personal_information().unwrap_err();
    assert!(matches!(
        err.root(),
        Error::InvalidLength {
            expected: 0x101,
            actual: 0x12
        }
    ));
}

#[test]
fn chip_info_fields() {
    let mut record = vec![0u8; 0x17];
    record[..4].copy_from_slice(&[1, 2, 3, 4]);
    record[7..23].copy_from_slice(b"JT1-1234567-89AB");

    let mut card = Script::new().selected().chained(&record).card();
    let info = card.chip_info().unwrap();

    assert_eq!(info.version, (1, 2));
    assert_eq!(info.state, 3);
    assert_eq!(info.authorize, 4);
    assert_eq!(info.laser_number.as_ref(), b"JT1-1234567-89AB");
    assert_eq!(sent(&card)[2].as_ref(), hex!("80 00 00 00"));
}

#[test]
fn picture_reads_in_blocks_and_trims_padding() {
    const PICTURE_LEN: usize = 5118;
    let mut picture = vec![b' '; PICTURE_LEN];
    for (i, byte) in picture.iter_mut().take(4000).enumerate() {
        *byte = (i % 200) as u8 + 0x30;
    }

    let mut script = Script::new().selected();
    for block in picture.chunks(0xFF) {
        script = script.chained(block);
    }
    let mut card = script.card();

    let read = card.picture().unwrap();
    assert_eq!(read.as_ref(), &picture[..4000]);

    let sent = sent(&card);
    // Select plus one command and one GET RESPONSE per block
    assert_eq!(sent.len(), 2 + 2 * PICTURE_LEN.div_ceil(0xFF));
    assert_eq!(sent[2].as_ref(), hex!("80 B0 01 7B 02 00 FF"));
    assert_eq!(sent[4].as_ref(), hex!("80 B0 02 7A 02 00 FF"));
    assert_eq!(sent.last().map(|s| s[..4].to_vec()), Some(hex!("00 C0 00 00").to_vec()));
    assert_eq!(sent[sent.len() - 2].as_ref(), hex!("80 B0 15 67 02 00 12"));
}
