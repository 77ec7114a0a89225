#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("no text entries to import")]
    NoEntries,
    #[error("script is not parsed (unknown title or malformed opcode stream)")]
    NotParsed,
    #[error("text at offset 0x{offset:X} would embed a terminator byte")]
    InteriorNul { offset: i32 },
    #[error("rebuilt script does not tokenize like the source")]
    Reparse,
}
