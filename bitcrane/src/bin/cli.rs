//! Command-line bench tool for bitcrane.
//!
//! Each subcommand opens the control bridge (and the ASIC port where
//! needed), performs one operation and exits. `ping` loops until
//! interrupted unless `--once` is given. Ports are closed on every exit
//! path, including Ctrl-C.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;
use tokio::time;
use tracing_subscriber::filter::LevelFilter;

use bitcrane::asic::bm13xx::{Command as AsicCommand, Register};
use bitcrane::asic::port::PING_RESPONSE_LEN;
use bitcrane::asic::word::WORD_MAX;
use bitcrane::asic::AsicPort;
use bitcrane::config::Config;
use bitcrane::hexfmt::{HexBytes, HexWords};
use bitcrane::mgmt_protocol::adc::Domain;
use bitcrane::mgmt_protocol::{ControlChannel, Hashboard, I2cBridge, Page};
use bitcrane::peripheral::{tmp75, ApwPsu, Tmp75};
use bitcrane::tracing::{self, prelude::*};
use bitcrane::transport::SerialTransport;

/// Transaction IDs used for temperature sensor traffic.
const SENSOR_WRITE_ID: u8 = 0x01;
const SENSOR_READ_ID: u8 = 0xBB;

/// Pause between the steps of the ping sequence.
const STEP_DELAY: Duration = Duration::from_millis(100);

/// Pause between ping rounds.
const ROUND_DELAY: Duration = Duration::from_secs(1);

/// Upper bound on ping responses collected in one round.
const MAX_RESPONSES: usize = 256;

/// Bench control for hashboards, PSU, fans and sensors behind a bitcrane
/// control bridge.
#[derive(Parser, Debug)]
#[command(name = "bitcrane-cli", version)]
struct Cli {
    /// JSON configuration file. Environment variables override it.
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Log wire traffic. RUST_LOG takes precedence.
    #[arg(long, short)]
    debug: bool,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Switch the PSU on or off through its enable pin.
    PsuEnable {
        #[arg(value_enum)]
        state: OnOff,
    },
    /// Read the PSU hardware version.
    PsuVersion,
    /// Enable or disable the PSU watchdog.
    PsuWatchdog {
        #[arg(value_enum)]
        state: OnOff,
    },
    /// Program the PSU output voltage (volts).
    PsuSetVoltage { volts: f32 },
    /// Program the PSU output with an already-encoded setting.
    PsuSetRaw { raw: u8 },
    /// Read back the programmed PSU voltage.
    PsuGetVoltage,
    /// Read the raw PSU output measurement.
    PsuMeasure,
    /// Set a fan's duty cycle.
    FanSpeed { channel: u8, percent: u8 },
    /// Read a fan's tachometer.
    FanRpm { channel: u8 },
    /// Read the hashboard temperature sensors.
    Temp,
    /// Set the status LED colour.
    Led { red: u8, green: u8, blue: u8 },
    /// Read an ADC voltage domain (1-3).
    Adc { domain: u8 },
    /// Pulse a hashboard's ASIC reset line.
    Reset { hashboard: u8 },
    /// Reset a hashboard, ping its ASIC chain and read its temperatures.
    Ping {
        hashboard: u8,
        /// Run a single round.
        #[arg(long)]
        once: bool,
    },
    /// Send 9-bit words, given in hex (e.g. 1fa 0f0), to the ASIC port.
    AsicWrite {
        #[arg(required = true)]
        words: Vec<String>,
    },
    /// Read 9-bit words from the ASIC port.
    AsicRead { count: usize },
    /// Reset a hashboard, address its chips and ping the chain.
    AsicAddress {
        hashboard: u8,
        /// Number of chips on the chain.
        chips: usize,
        /// Address step between neighbouring chips.
        #[arg(long, default_value_t = 2)]
        interval: u8,
    },
    /// Send a raw hex frame to the ASIC port and print the responses.
    AsicRaw {
        frame: String,
        /// Length of each response frame.
        #[arg(long, default_value_t = PING_RESPONSE_LEN)]
        response_len: usize,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OnOff {
    On,
    Off,
}

impl OnOff {
    fn is_on(self) -> bool {
        matches!(self, OnOff::On)
    }
}

type Control = ControlChannel<SerialTransport>;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing::init_with_default(if cli.debug {
        LevelFilter::TRACE
    } else {
        LevelFilter::INFO
    });

    let config = Config::load(cli.config.as_deref())?;
    let mut ctrl = ControlChannel::new(SerialTransport::open(&config.control)?);

    tokio::select! {
        result = run(cli.cmd, &config, &mut ctrl) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted.");
            Ok(())
        }
    }
}

async fn run(cmd: Cmd, config: &Config, ctrl: &mut Control) -> Result<()> {
    match cmd {
        Cmd::PsuEnable { state } => {
            let pin = config.psu.enable_pin()?;
            ctrl.gpio().set_psu_enable(pin, state.is_on()).await?;
        }
        Cmd::PsuVersion => {
            let reply = psu(ctrl, config).get_hw_version().await?;
            println!("PSU HW version: [{reply}]");
        }
        Cmd::PsuWatchdog { state } => {
            let reply = psu(ctrl, config).config_watchdog(state.is_on()).await?;
            println!("PSU watchdog: [{reply}]");
        }
        Cmd::PsuSetVoltage { volts } => {
            let reply = psu(ctrl, config).set_voltage(volts).await?;
            println!("PSU set voltage: [{reply}]");
        }
        Cmd::PsuSetRaw { raw } => {
            let reply = psu(ctrl, config).set_voltage_raw(raw).await?;
            println!("PSU set voltage: [{reply}]");
        }
        Cmd::PsuGetVoltage => {
            let volts = psu(ctrl, config).get_voltage().await?;
            println!("Voltage = {volts:.2} V");
        }
        Cmd::PsuMeasure => {
            let raw = psu(ctrl, config).measure_voltage().await?;
            println!("Measured = {raw} (0x{raw:04X})");
        }
        Cmd::FanSpeed { channel, percent } => {
            ctrl.fans().set_speed(channel, percent).await?;
        }
        Cmd::FanRpm { channel } => {
            let rpm = ctrl.fans().read_rpm(channel).await?;
            println!("Fan {channel}: {rpm} RPM");
        }
        Cmd::Temp => print_temperatures(ctrl).await?,
        Cmd::Led { red, green, blue } => {
            ctrl.led().set_color(red, green, blue).await?;
        }
        Cmd::Adc { domain } => {
            let domain = match domain {
                1 => Domain::Domain1,
                2 => Domain::Domain2,
                3 => Domain::Domain3,
                other => bail!("ADC domain {other} (must be 1-3)"),
            };
            let millivolts = ctrl.adc().read_millivolts(domain).await?;
            println!("{domain}: {millivolts} mV");
        }
        Cmd::Reset { hashboard } => {
            let board = Hashboard::new(hashboard)?;
            reset(ctrl, board, config).await?;
        }
        Cmd::Ping { hashboard, once } => {
            let board = Hashboard::new(hashboard)?;
            let mut asic = open_asic(config)?;
            loop {
                if let Err(e) = ping_round(ctrl, &mut asic, board, config).await {
                    if once {
                        return Err(e);
                    }
                    error!("Ping round failed: {:#}", e);
                }
                if once {
                    break;
                }
                time::sleep(ROUND_DELAY).await;
            }
        }
        Cmd::AsicWrite { words } => {
            let words = words
                .iter()
                .map(|w| parse_word(w))
                .collect::<Result<Vec<_>>>()?;
            open_asic(config)?.write_words(&words).await?;
        }
        Cmd::AsicRead { count } => {
            let words = open_asic(config)?.read_words(count).await?;
            let bytes = bitcrane::asic::encode_words(&words);
            println!("asic rx: [{}]", HexWords(&bytes));
        }
        Cmd::AsicAddress {
            hashboard,
            chips,
            interval,
        } => {
            let board = Hashboard::new(hashboard)?;
            let mut asic = open_asic(config)?;
            reset(ctrl, board, config).await?;
            time::sleep(STEP_DELAY).await;

            asic.clear_input().await?;
            let addresses = asic.assign_addresses(chips, interval).await?;
            println!("Assigned {} addresses: {}", addresses.len(), HexBytes(&addresses));
            time::sleep(STEP_DELAY).await;

            asic.clear_input().await?;
            asic.send_command(AsicCommand::ping()).await?;
            let frames = asic
                .collect_responses(PING_RESPONSE_LEN, MAX_RESPONSES)
                .await?;
            print_responses(&frames);
        }
        Cmd::AsicRaw {
            frame,
            response_len,
        } => {
            let bytes = hex::decode(frame.replace([' ', ':'], ""))
                .with_context(|| format!("invalid hex frame {frame:?}"))?;
            let mut asic = open_asic(config)?;
            asic.clear_input().await?;
            asic.write_raw(&bytes).await?;
            let frames = asic.collect_responses(response_len, MAX_RESPONSES).await?;
            print_responses(&frames);
        }
    }
    Ok(())
}

fn psu<'a>(ctrl: &'a mut Control, config: &Config) -> ApwPsu<I2cBridge<'a, SerialTransport>> {
    ApwPsu::new(ctrl.i2c(Page::PsuI2c), config.psu.clone())
}

fn open_asic(config: &Config) -> Result<AsicPort<SerialTransport>> {
    let port = config
        .asic
        .as_ref()
        .context("no ASIC port configured (set asic.port_path or BITCRANE_ASIC_PORT)")?;
    Ok(AsicPort::new(SerialTransport::open(port)?))
}

fn parse_word(text: &str) -> Result<u16> {
    let digits = text.trim_start_matches("0x").trim_start_matches("0X");
    let word = u16::from_str_radix(digits, 16)
        .with_context(|| format!("invalid hex word {text:?}"))?;
    if word > WORD_MAX {
        bail!("word {text} exceeds 9 bits");
    }
    Ok(word)
}

fn print_responses(frames: &[Vec<u8>]) {
    for (i, frame) in frames.iter().enumerate() {
        println!("response {:02}: {}", i + 1, HexBytes(frame));
    }
}

/// Pulse the reset line the way the bench scripts do: ID 0 and no acks.
async fn reset(ctrl: &mut Control, board: Hashboard, config: &Config) -> Result<()> {
    ctrl.gpio()
        .with_id(0x00)
        .expect_ack(false)
        .reset_hashboard(board, config.timing.reset_pulse)
        .await?;
    Ok(())
}

async fn print_temperatures(ctrl: &mut Control) -> Result<()> {
    for index in 0..tmp75::ADDRESSES.len() as u8 {
        let bridge = ctrl
            .i2c(Page::I2c)
            .with_ids(SENSOR_WRITE_ID, SENSOR_READ_ID);
        let mut sensor = Tmp75::by_index(bridge, index)?;
        match sensor.read_temperature().await {
            Ok(celsius) => println!("Temp {index}: {celsius:.2} C"),
            Err(e) => println!("Temp {index}: {e}"),
        }
    }
    Ok(())
}

async fn ping_round(
    ctrl: &mut Control,
    asic: &mut AsicPort<SerialTransport>,
    board: Hashboard,
    config: &Config,
) -> Result<()> {
    println!("Hashboard {}", board.index());

    reset(ctrl, board, config).await?;
    time::sleep(STEP_DELAY).await;

    asic.send_command(AsicCommand::WriteRegister {
        all: true,
        address: 0,
        register: Register::VersionRolling,
        data: [0x90, 0x00, 0xff, 0xff],
    })
    .await?;
    time::sleep(STEP_DELAY).await;

    asic.clear_input().await?;
    asic.send_command(AsicCommand::ping()).await?;
    let frames = asic
        .collect_responses(PING_RESPONSE_LEN, MAX_RESPONSES)
        .await?;
    print_responses(&frames);
    info!(hashboard = board.index(), chips = frames.len(), "Ping complete");

    time::sleep(STEP_DELAY).await;
    print_temperatures(ctrl).await
}
