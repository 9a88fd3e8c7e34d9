//! State shared by every view of an editing session.

use std::collections::BTreeMap;
use std::fmt;

use core_config::{Config, InputConfig};
use core_ex::{ExCommandTable, LineContext};
use core_keymap::{CommandRegistry, Mapping, MappingScope, Mappings};
use core_state::{Mark, Marks, Registers};
use tracing::info;

use crate::MachineError;

/// Registry, remaps, registers and marks, plus what the host reports back
/// (cursor position and, optionally, buffer lines for range resolution).
pub struct Session {
    pub registry: CommandRegistry,
    pub mappings: Mappings,
    pub registers: Registers,
    pub marks: Marks,
    pub ex_table: ExCommandTable,
    pub input: InputConfig,
    /// Arguments of the last `:substitute` (`pattern`, `replacement`, `flags`).
    pub last_substitute: Option<BTreeMap<String, String>>,
    /// Cursor of the focused view, kept current by the host.
    pub cursor: Mark,
    lines: Option<Box<dyn LineContext>>,
}

impl Session {
    /// Built-in registry and default remaps, no user mappings.
    pub fn new() -> Result<Self, MachineError> {
        Self::from_config(&Config::default())
    }

    /// Build a session from loaded configuration, validating every mapping.
    pub fn from_config(config: &Config) -> Result<Self, MachineError> {
        let registry = CommandRegistry::builtin()?;
        let input = config.input().clone();
        let mut mappings = if input.default_mappings {
            Mappings::with_defaults(&registry)?
        } else {
            Mappings::new()
        };
        for (index, entry) in config.mappings().iter().enumerate() {
            let mapping = Mapping::parse(
                &entry.lhs,
                &entry.rhs,
                entry.recursive,
                MappingScope::User,
                &registry,
            )
            .map_err(|source| MachineError::InvalidMapping {
                index,
                lhs: entry.lhs.clone(),
                source,
            })?;
            mappings.add(entry.mode, mapping);
        }
        info!(
            target: "runtime",
            user_mappings = config.mappings().len(),
            default_mappings = input.default_mappings,
            "session_ready"
        );
        Ok(Self {
            registry,
            mappings,
            registers: Registers::new(),
            marks: Marks::default(),
            ex_table: ExCommandTable::builtin()?,
            input,
            last_substitute: None,
            cursor: Mark::default(),
            lines: None,
        })
    }

    /// Let Ex ranges be resolved to line numbers before dispatch.
    pub fn set_line_context(&mut self, lines: Box<dyn LineContext>) {
        self.lines = Some(lines);
    }

    pub fn clear_line_context(&mut self) {
        self.lines = None;
    }

    pub fn line_context(&self) -> Option<&dyn LineContext> {
        self.lines.as_deref()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("input", &self.input)
            .field("cursor", &self.cursor)
            .field("last_substitute", &self.last_substitute)
            .field("has_line_context", &self.lines.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_config::MappingConfig;
    use core_events::Mode;

    fn config_with(mappings: Vec<MappingConfig>) -> Config {
        let mut cfg = Config::default();
        cfg.file.mappings = mappings;
        cfg
    }

    #[test]
    fn installs_user_mappings() {
        let cfg = config_with(vec![MappingConfig {
            mode: Mode::Insert,
            lhs: "jk".into(),
            rhs: "<esc>".into(),
            recursive: false,
        }]);
        let session = Session::from_config(&cfg).unwrap();
        assert_eq!(session.mappings.list(Mode::Insert).len(), 1);
    }

    #[test]
    fn bad_mapping_names_the_entry() {
        let cfg = config_with(vec![
            MappingConfig {
                mode: Mode::Normal,
                lhs: "Q".into(),
                rhs: "gq".into(),
                recursive: false,
            },
            MappingConfig {
                mode: Mode::Normal,
                lhs: "<C-".into(),
                rhs: "x".into(),
                recursive: false,
            },
        ]);
        match Session::from_config(&cfg) {
            Err(MachineError::InvalidMapping { index, lhs, .. }) => {
                assert_eq!(index, 1);
                assert_eq!(lhs, "<C-");
            }
            other => panic!("expected invalid mapping, got {other:?}"),
        }
    }

    #[test]
    fn defaults_can_be_disabled() {
        let mut cfg = Config::default();
        cfg.file.input.default_mappings = false;
        let session = Session::from_config(&cfg).unwrap();
        assert!(session.mappings.list(Mode::Normal).is_empty());
        let with_defaults = Session::new().unwrap();
        assert!(!with_defaults.mappings.list(Mode::Normal).is_empty());
    }
}
