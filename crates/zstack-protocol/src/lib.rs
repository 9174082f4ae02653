//! Z-Stack Monitor/Test (MT) serial protocol implementation
//!
//! This crate implements the serial protocol spoken by TI Z-Stack Zigbee
//! coordinator radios (CC2652-class dongles): the byte-level framing, a
//! resumable stream parser, a request/response client, and decoders for
//! ZDO management frames and AF/ZCL application messages.

pub mod af;
pub mod client;
pub mod commands;
pub mod frame;
pub mod parser;
pub mod transport;
pub mod types;
pub mod zcl;
pub mod zdo;

pub use af::{AfPacket, Reading};
pub use client::{MtClient, DEFAULT_TIMEOUT};
pub use commands::{cmd0, command_name, CommandType, Subsystem};
pub use frame::{checksum, MtFrame, MAX_PAYLOAD, START_OF_FRAME};
pub use parser::Parser;
pub use transport::{SerialTransport, UartTransport};
pub use types::*;
pub use zdo::ZdoPacket;
