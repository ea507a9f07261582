//! BM13xx command frames.
//!
//! Commands sent on the ASIC data port are `55 AA`, a command field, a
//! length counting everything after the preamble, the command body and a
//! 5-bit CRC over the bytes after the preamble.

use bitvec::prelude::*;
use bytes::{BufMut, BytesMut};
use crc_all::Crc;
use strum::{Display, FromRepr};
use tokio_util::codec::Encoder;

use crate::error::{Error, Result};

pub const COMMAND_PREAMBLE: [u8; 2] = [0x55, 0xaa];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, FromRepr)]
#[repr(u8)]
pub enum Register {
    ChipAddress = 0x00,
    VersionRolling = 0xa4,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Assign `address` to the first chip that has none.
    SetChipAddress { address: u8 },
    /// Stop every chip from forwarding commands down the chain.
    ChainInactive,
    ReadRegister {
        all: bool,
        address: u8,
        register: Register,
    },
    WriteRegister {
        all: bool,
        address: u8,
        register: Register,
        data: [u8; 4],
    },
}

impl Command {
    /// Broadcast chip-address read: every chip on the chain answers.
    pub fn ping() -> Self {
        Command::ReadRegister {
            all: true,
            address: 0,
            register: Register::ChipAddress,
        }
    }
}

struct CommandFieldBuilder {
    field: u8,
}

#[repr(u8)]
enum CommandFieldType {
    Command = 2,
}

#[repr(u8)]
enum CommandFieldCmd {
    SetAddress = 0,
    WriteRegisterOrJob = 1,
    ReadRegister = 2,
    ChainInactive = 3,
}

impl CommandFieldBuilder {
    fn new() -> Self {
        Self { field: 0 }
    }

    fn with_type(mut self, command_type: CommandFieldType) -> Self {
        let view = self.field.view_bits_mut::<Lsb0>();
        view[5..7].store(command_type as u8);
        self
    }

    fn with_all(mut self, all: bool) -> Self {
        let view = self.field.view_bits_mut::<Lsb0>();
        view[4..5].store(all as u8);
        self
    }

    fn with_cmd(mut self, cmd: CommandFieldCmd) -> Self {
        let view = self.field.view_bits_mut::<Lsb0>();
        view[0..4].store(cmd as u8);
        self
    }

    fn for_command(self, command: &Command) -> Self {
        let (all, cmd) = match command {
            Command::SetChipAddress { .. } => (false, CommandFieldCmd::SetAddress),
            Command::ChainInactive => (true, CommandFieldCmd::ChainInactive),
            Command::ReadRegister { all, .. } => (*all, CommandFieldCmd::ReadRegister),
            Command::WriteRegister { all, .. } => (*all, CommandFieldCmd::WriteRegisterOrJob),
        };
        self.with_type(CommandFieldType::Command)
            .with_all(all)
            .with_cmd(cmd)
    }

    fn build(self) -> u8 {
        self.field
    }
}

pub fn crc5_usb(bytes: &[u8]) -> u8 {
    const POLYNOMIAL: u8 = 0x05;
    const WIDTH: usize = 5;
    const INITIAL: u8 = 0x1f;
    const XOR: u8 = 0;
    const REFLECT: bool = false;
    let mut crc5_usb = Crc::<u8>::new(POLYNOMIAL, WIDTH, INITIAL, XOR, REFLECT);

    crc5_usb.update(bytes);
    crc5_usb.finish()
}

fn put_frame(command: Command, dst: &mut BytesMut) {
    let start = dst.len();
    dst.put_slice(&COMMAND_PREAMBLE);

    let command_field = CommandFieldBuilder::new().for_command(&command).build();
    dst.put_u8(command_field);

    match command {
        Command::SetChipAddress { address } => {
            dst.put_u8(5);
            dst.put_u8(address);
            dst.put_u8(0);
        }
        Command::ChainInactive => {
            dst.put_u8(5);
            dst.put_u8(0);
            dst.put_u8(0);
        }
        Command::ReadRegister {
            address, register, ..
        } => {
            dst.put_u8(5);
            dst.put_u8(address);
            dst.put_u8(register as u8);
        }
        Command::WriteRegister {
            address,
            register,
            data,
            ..
        } => {
            dst.put_u8(9);
            dst.put_u8(address);
            dst.put_u8(register as u8);
            dst.put_slice(&data);
        }
    }

    let crc = crc5_usb(&dst[start + COMMAND_PREAMBLE.len()..]);
    dst.put_u8(crc);
}

#[derive(Debug, Default)]
pub struct FrameCodec;

impl Encoder<Command> for FrameCodec {
    type Error = Error;

    fn encode(&mut self, command: Command, dst: &mut BytesMut) -> Result<()> {
        put_frame(command, dst);
        Ok(())
    }
}
