//! Offline tool for Thai ID reader frames
//!
//! Builds command frames, decodes captured replies, encodes escape objects and
//! computes PIN answers without talking to a device. Useful for checking USB
//! captures against what the library would send.

use clap::{Parser, Subcommand, ValueEnum};
use nexum_ccid_core::constants::response;
use nexum_ccid_core::{
    CcidConfig, DataBlock, EscapeBlock, EscapeObject, FrameBuilder, Protocol, SlotStatus,
};
use nexum_thaiid::crypto::CHALLENGE_LEN;
use nexum_thaiid::{Pin, StatusWord, pin_answer};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log protocol decisions and hex dumps
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a command frame
    Frame {
        /// Slot to address
        #[arg(short, long, default_value_t = 0)]
        slot: u8,

        /// Transfer protocol for transfer-block frames
        #[arg(short, long, value_enum, default_value = "t0")]
        protocol: ProtocolArg,

        /// Largest packet the transport accepts
        #[arg(short, long, default_value_t = 64)]
        max_packet: usize,

        #[command(subcommand)]
        kind: FrameKind,
    },

    /// Decode a reply frame (hex)
    Parse {
        /// Captured frame
        #[arg(value_parser = parse_hex)]
        frame: ::std::vec::Vec<u8>,
    },

    /// Encode or decode an escape object
    Escape {
        #[command(subcommand)]
        action: EscapeAction,
    },

    /// Compute the VERIFY answer for a PIN and card challenge
    PinAnswer {
        /// Four digit PIN
        pin: Pin,

        /// 32-byte challenge (hex)
        #[arg(value_parser = parse_hex)]
        challenge: ::std::vec::Vec<u8>,
    },
}

#[derive(Subcommand)]
enum FrameKind {
    /// Power the card on
    PowerOn,
    /// Power the card off
    PowerOff,
    /// Query the slot status
    SlotStatus,
    /// Reset protocol parameters
    Reset,
    /// Transfer an APDU (hex)
    Xfr {
        #[arg(value_parser = parse_hex)]
        apdu: ::std::vec::Vec<u8>,
    },
    /// Vendor escape payload (hex)
    Escape {
        #[arg(value_parser = parse_hex)]
        payload: ::std::vec::Vec<u8>,
    },
}

#[derive(Subcommand)]
enum EscapeAction {
    /// Wrap data in a flat escape object
    Encode {
        /// Object tag
        #[arg(short, long, default_value = "c5", value_parser = parse_tag)]
        tag: u8,

        /// Object data (hex)
        #[arg(value_parser = parse_hex)]
        data: ::std::vec::Vec<u8>,
    },
    /// Unwrap a flat escape object (hex)
    Decode {
        #[arg(value_parser = parse_hex)]
        object: ::std::vec::Vec<u8>,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum ProtocolArg {
    T0,
    T1,
}

impl From<ProtocolArg> for Protocol {
    fn from(arg: ProtocolArg) -> Self {
        match arg {
            ProtocolArg::T0 => Self::T0,
            ProtocolArg::T1 => Self::T1,
        }
    }
}

fn parse_hex(s: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let cleaned: String = s.chars().filter(|c| !c.is_whitespace() && *c != ':').collect();
    hex::decode(cleaned.trim_start_matches("0x"))
}

fn parse_tag(s: &str) -> Result<u8, std::num::ParseIntError> {
    u8::from_str_radix(s.trim_start_matches("0x"), 16)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // RUST_LOG takes precedence over --verbose; logs go to stderr
    let level = if cli.verbose { "trace" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .init();

    match cli.command {
        Commands::Frame {
            slot,
            protocol,
            max_packet,
            kind,
        } => {
            let config = CcidConfig::new()
                .with_slot(slot)?
                .with_protocol(protocol.into());
            build_frame(FrameBuilder::new(config), kind, max_packet)?;
        }
        Commands::Parse { frame } => parse_frame(&frame)?,
        Commands::Escape { action } => match action {
            EscapeAction::Encode { tag, data } => {
                let object = EscapeObject::with_data(tag, data).serialize()?;
                println!("{}", hex::encode(object));
            }
            EscapeAction::Decode { object } => {
                let object = EscapeObject::deserialize(&object)?;
                println!("Tag:  {:02x}", object.command());
                if let Some(data) = object.data() {
                    println!("Data: {}", hex::encode(data));
                }
            }
        },
        Commands::PinAnswer { pin, challenge } => {
            let challenge: [u8; CHALLENGE_LEN] = challenge.as_slice().try_into().map_err(|_| {
                format!("challenge must be {CHALLENGE_LEN} bytes, got {}", challenge.len())
            })?;
            let answer = pin_answer(&pin, &challenge);
            println!("{}", hex::encode(*answer));
        }
    }

    Ok(())
}

fn build_frame(
    mut builder: FrameBuilder,
    kind: FrameKind,
    max_packet: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let segments = match kind {
        FrameKind::PowerOn => vec![builder.power_on()],
        FrameKind::PowerOff => vec![builder.power_off()],
        FrameKind::SlotStatus => vec![builder.slot_status()],
        FrameKind::Reset => vec![builder.reset()],
        FrameKind::Xfr { apdu } => builder.xfr_block_segments(&apdu, max_packet)?,
        FrameKind::Escape { payload } => vec![builder.escape_command(&payload)],
    };

    debug!(segments = segments.len(), "Built frame");
    for segment in segments {
        println!("{}", hex::encode(segment));
    }
    Ok(())
}

fn parse_frame(frame: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
    let Some(&marker) = frame.first() else {
        return Err("empty frame".into());
    };

    match marker {
        response::DATA_BLOCK => {
            let block = DataBlock::parse(frame)?;
            println!("Data block ({:?})", block.kind);
            println!("Status: {:02x}  Error: {:02x}", block.status, block.error);
            println!("Data:   {}", hex::encode(&block.data));
            if let Some((_, sw)) = StatusWord::split(&block.data) {
                println!("SW:     {sw} ({})", sw.description());
            }
        }
        response::ESCAPE => {
            let block = EscapeBlock::parse(frame)?;
            println!("Escape block");
            println!("Status: {:02x}  Error: {:02x}", block.status, block.error);
            println!("Data:   {}", hex::encode(&block.data));
        }
        response::SLOT_STATUS | response::PARAMETERS => {
            let block = SlotStatus::parse(frame)?;
            let label = if block.is_parameters() {
                "Parameters"
            } else {
                "Slot status"
            };
            println!("{label} (card present: {})", block.card_present());
            println!(
                "Status: {:02x}  Error: {:02x}  Extra: {:02x}",
                block.status, block.error, block.extra
            );
            if !block.data.is_empty() {
                println!("Data:   {}", hex::encode(&block.data));
            }
        }
        other => return Err(format!("unknown reply marker {other:#04x}").into()),
    }
    Ok(())
}
