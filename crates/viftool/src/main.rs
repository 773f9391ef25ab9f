mod report;

use clap::{Parser, Subcommand};
use eyre_pretty::{Context, Result};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use vif::{Config, dmac::Mode, modules::IntcLine, system::System};
use vumicro::{Ins, NopExecutor, Pipeline, Vu0};

/// Parses a number in decimal, or in hexadecimal/binary with a `0x`/`0b` prefix. Underscores are
/// ignored.
fn parse_u32(text: &str) -> std::result::Result<u32, std::num::ParseIntError> {
    let text = text.replace("_", "");
    if let Some(text) = text.strip_prefix("0x") {
        u32::from_str_radix(text, 16)
    } else if let Some(text) = text.strip_prefix("0b") {
        u32::from_str_radix(text, 2)
    } else {
        text.parse()
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Decode a VU0 micro instruction and show the registers it uses.
    Decode {
        code: String,
        /// Decode as a lower pipeline instruction instead of an upper one
        #[arg(long, default_value_t = false)]
        lower: bool,
    },
    /// List every micro instruction and its position in the dispatch tables.
    Tables,
    /// Run a VIF0 transfer out of a memory image.
    Run {
        /// Path to a raw little-endian memory image
        #[arg(short, long)]
        image: PathBuf,
        /// Byte address the image is loaded at
        #[arg(long, value_parser = parse_u32, default_value = "0")]
        base: u32,
        /// Source address of a normal transfer
        #[arg(long, value_parser = parse_u32, default_value = "0")]
        madr: u32,
        /// Quadwords of a normal transfer
        #[arg(long, value_parser = parse_u32, default_value = "0")]
        qwc: u32,
        /// Address of the first tag of a chain transfer
        #[arg(long, value_parser = parse_u32, default_value = "0")]
        tadr: u32,
        /// Walk a chain of tags starting at TADR
        #[arg(long, default_value_t = false)]
        chain: bool,
        /// Feed the upper half of every tag to the VIF (TTE)
        #[arg(long, default_value_t = false)]
        tte: bool,
        /// Honor the IRQ bit of tags (TIE)
        #[arg(long, default_value_t = false)]
        tie: bool,
        /// Mask invalid command errors (ME1)
        #[arg(long, default_value_t = false)]
        mask_mismatch: bool,
        /// Mask command interrupts (MII)
        #[arg(long, default_value_t = false)]
        mask_interrupt: bool,
        /// Release every stall as soon as the transfer is waiting on it
        #[arg(long, default_value_t = false)]
        release: bool,
        /// Cycles charged per quadword transferred
        #[arg(long, default_value_t = Config::default().bias)]
        bias: u64,
        /// Delay between channel events
        #[arg(long, default_value_t = Config::default().event_delay)]
        event_delay: u64,
        /// Stop after this many cycles
        #[arg(long, default_value_t = u64::MAX)]
        cycles: u64,
    },
}

/// A CLI to inspect VU0 micro code and run VIF0 transfers.
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// Action to take
    #[command(subcommand)]
    command: Command,
}

fn setup_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or(EnvFilter::new("viftool=info,vif=debug,vumicro=info"));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(env_filter)
        .init();
}

fn decode(code: String, lower: bool) -> Result<()> {
    let ins = Ins::new(parse_u32(&code).context("parsing instruction code")?);
    let pipeline = if lower {
        Pipeline::Lower
    } else {
        Pipeline::Upper
    };

    let op = vumicro::mnemonic(ins, pipeline);
    let usage = vumicro::analyze(ins, pipeline);
    report::usage(ins, op, &usage);

    Ok(())
}

struct Transfer {
    image: PathBuf,
    base: u32,
    madr: u32,
    qwc: u32,
    tadr: u32,
    chain: bool,
    tte: bool,
    tie: bool,
    mask_mismatch: bool,
    mask_interrupt: bool,
    release: bool,
    config: Config,
    cycles: u64,
}

/// Sets up the channel registers and error masks of VIF0 from `transfer`.
fn configure(sys: &mut System, transfer: &Transfer) {
    let channel = &mut sys.vif0.channel;
    channel.madr = transfer.madr;
    channel.qwc = transfer.qwc;
    channel.tadr = transfer.tadr;
    channel
        .control
        .set_mode(if transfer.chain { Mode::Chain } else { Mode::Normal });
    channel.control.set_tag_transfer(transfer.tte);
    channel.control.set_tag_interrupt(transfer.tie);

    let err = &mut sys.vif0.regs.err;
    err.set_mask_invalid_command(transfer.mask_mismatch);
    err.set_mask_interrupt(transfer.mask_interrupt);
}

fn run(transfer: Transfer) -> Result<()> {
    let mut sys = System::new(transfer.config, Box::new(Vu0::new(NopExecutor)));
    sys.intc.mask = IntcLine::Vif0.mask();
    sys.dmac
        .memory
        .load(&transfer.image, transfer.base)
        .context("loading memory image")?;

    configure(&mut sys, &transfer);
    sys.start_vif0();

    let mut interrupts = 0;
    let mut elapsed = sys.run(transfer.cycles);
    loop {
        if sys.intc.stat & IntcLine::Vif0.mask() != 0 {
            interrupts += 1;
            sys.intc.stat &= !IntcLine::Vif0.mask();
        }

        if !transfer.release || !sys.vif0.regs.stat.is_stalled() {
            break;
        }

        tracing::info!(elapsed, "releasing vif0 stall");
        sys.release_vif0_stall();
        elapsed = sys.run(transfer.cycles);
    }

    report::transfer(&sys, elapsed, interrupts);

    Ok(())
}

fn main() -> Result<()> {
    eyre_pretty::install()?;
    setup_tracing();

    let args = Args::parse();
    match args.command {
        Command::Decode { code, lower } => decode(code, lower),
        Command::Tables => {
            report::tables();
            Ok(())
        }
        Command::Run {
            image,
            base,
            madr,
            qwc,
            tadr,
            chain,
            tte,
            tie,
            mask_mismatch,
            mask_interrupt,
            release,
            bias,
            event_delay,
            cycles,
        } => run(Transfer {
            image,
            base,
            madr,
            qwc,
            tadr,
            chain,
            tte,
            tie,
            mask_mismatch,
            mask_interrupt,
            release,
            config: Config { bias, event_delay },
            cycles,
        }),
    }
}
