//! mes-text
//!
//! Everything between raw script text and the files translators edit: the
//! dump format, the `.MesTextTool` configuration and the line wrapper applied
//! on import.

pub mod config;
pub mod dump;
pub mod format;

pub use config::{ToolConfig, CONFIG_FILE_NAME};
pub use dump::{parse_dump, write_dump, DumpEntry};
pub use format::{FormatterConfig, LineWrapFormatter};
