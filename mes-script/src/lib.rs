//! mes-script
//!
//! Tokenizer and text codec for MES visual novel scripts.
//!
//! A script is a label table, a version signature and a byte-coded opcode
//! stream. The stream is split into tokens according to a per-title
//! [`profile::FormatProfile`]; text-bearing tokens can be extracted and
//! replaced, with the label table patched to follow the moved instructions.
//! `#ADV_TXT` scripts are handled by [`advtxt`].

pub mod advtxt;
pub mod codec;
pub mod error;
pub mod profile;
pub mod variant;
pub mod view;

pub use advtxt::{AdvTxtProfile, AdvTxtRegistry, AdvTxtView};
pub use codec::TextEntry;
pub use error::CodecError;
pub use profile::{FormatProfile, HeaderLayout, OpcodeRange, TokenKind};
pub use variant::ScriptVariant;
pub use view::{ScriptView, Token, TokenRef};
