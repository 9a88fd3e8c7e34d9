//! Key input: Vim notation tokenizer and terminal event adapter.

mod key_token;
mod tokenizer;

pub use key_token::{KeyPress, map_key_event};
pub use tokenizer::{KeyNotationError, KeyTokenizer, tokenize};
