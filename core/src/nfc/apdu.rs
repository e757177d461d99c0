mod command;
mod response;

pub use command::{Case, Command, CommandError, MAX_PAYLOAD_LEN};
pub use response::{Response, StatusWord};

pub const CLA_DEFAULT: u8 = 0x00;
pub const CLA_PROPRIETARY: u8 = 0x80;

/// Instruction codes used against the card.
pub mod ins {
    pub const VERIFY: u8 = 0x20;
    pub const COMPUTE_SIGNATURE: u8 = 0x2A;
    pub const SELECT_FILE: u8 = 0xA4;
    pub const READ_BINARY: u8 = 0xB0;
}
