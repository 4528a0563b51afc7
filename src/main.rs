//! `t1-cli` - a small command-line tool for driving a T=1 secure element
//! from a shell, grounded on the subcommand shape of
//! `examples/jfabienke-mbuscrate/src/main.rs` with the `tokio` runtime
//! dropped (the engine here is synchronous/blocking by design).

use std::fs::OpenOptions;

use anyhow::Context;
use clap::{Parser, Subcommand};

use iso7816_t1::transport::CharDeviceTransport;
use iso7816_t1::util::hex::{decode_hex, encode_hex};
use iso7816_t1::{init_logger, log_info, SessionConfig, T1Device};

#[derive(Parser)]
#[command(name = "t1-cli")]
#[command(about = "Drive an ISO/IEC 7816-3 T=1 secure element over a character device")]
struct Cli {
    /// Path to the character device the eSE is attached to.
    #[arg(long, default_value = "/dev/t1ese0")]
    device: String,

    /// Block framing dialect to speak.
    #[arg(long, value_enum, default_value = "classic")]
    dialect: DialectArg,

    /// Our own node address (NAD source nibble).
    #[arg(long, default_value_t = 2)]
    src: u8,

    /// The card's node address (NAD destination nibble).
    #[arg(long, default_value_t = 1)]
    dst: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum DialectArg {
    Classic,
    Extended,
}

#[derive(Subcommand)]
enum Commands {
    /// Re-arm the one-shot reset handshake and drive it to completion.
    Reset,
    /// Fetch (or re-read, if already cached) the ATR.
    GetAtr,
    /// Send one hex-encoded APDU and print the response.
    Transceive { hex_apdu: String },
    /// Announce a new device receive capacity (IFSD) to the card.
    NegotiateIfsd { new_ifsd: u16 },
    /// Re-synchronise sequence numbers with the card.
    Resync,
}

fn main() -> anyhow::Result<()> {
    init_logger();
    let cli = Cli::parse();

    let config = match cli.dialect {
        DialectArg::Classic => SessionConfig::classic(),
        DialectArg::Extended => SessionConfig::extended(),
    };

    let port = OpenOptions::new()
        .read(true)
        .write(true)
        .open(&cli.device)
        .with_context(|| format!("opening character device {}", cli.device))?;

    let mut device = T1Device::new(config, CharDeviceTransport::new(port));
    device.bind(cli.src, cli.dst);

    match cli.command {
        Commands::Reset => {
            device.reset()?;
            log_info("reset complete");
        }
        Commands::GetAtr => {
            let mut atr = [0u8; 32];
            let n = device.get_atr(&mut atr)?;
            log_info(&format!("ATR: {}", encode_hex(&atr[..n])));
        }
        Commands::Transceive { hex_apdu } => {
            let apdu = decode_hex(&hex_apdu).context("parsing hex APDU")?;
            let mut resp = [0u8; 4096];
            let n = device.transceive(&apdu, &mut resp)?;
            log_info(&format!("response: {}", encode_hex(&resp[..n])));
        }
        Commands::NegotiateIfsd { new_ifsd } => {
            device.negotiate_ifsd(new_ifsd)?;
            log_info("IFSD negotiation complete");
        }
        Commands::Resync => {
            device.resync()?;
            log_info("resync complete");
        }
    }

    Ok(())
}
