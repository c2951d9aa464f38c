//! GDB 远程串行协议的编解码

pub mod codec;
pub mod command;
pub mod packet;
pub mod stop_reply;

pub use codec::{CodecError, decode_register, decode_word_le, encode_register};
pub use command::Command;
pub use stop_reply::{StopEvent, StopReplyError};
