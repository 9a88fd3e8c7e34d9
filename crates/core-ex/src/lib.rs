//! Ex command-line parsing: addresses, ranges, command names and arguments.

mod address;
mod command;
mod error;
mod range;
mod resolve;
mod table;

pub use address::{AddressRef, ExAddress, ExAddressParser, SearchDirection, SearchOffset, parse_address};
pub use command::{ExCommandParser, GOTO_COMMAND, ParsedExCommand, parse_command_line};
pub use error::{ExError, ExErrorKind};
pub use range::{ExAddressRange, ExRangeParser, Separator};
pub use resolve::{LineContext, LineSpan};
pub use table::{ErrorPolicy, ExCommandDef, ExCommandTable, ExTableError};
