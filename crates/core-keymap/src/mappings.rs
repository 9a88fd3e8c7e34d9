//! Per-mode key remaps.
//!
//! Two layers: `Default` remaps installed at startup (`D` → `d$`, ...) and
//! `User` remaps from config or `:map`. A user remap with the same lhs shadows
//! the default one; removing it uncovers the default again.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

use core_events::{KeyToken, Mode, notation};
use tracing::debug;

use crate::KeymapError;
use crate::command::CommandDef;
use crate::registry::CommandRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingScope {
    Default,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingTarget {
    Keys(Vec<KeyToken>),
    Command(CommandDef),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    pub lhs: Vec<KeyToken>,
    pub target: MappingTarget,
    pub scope: MappingScope,
    /// Whether the expansion may itself be remapped (`map` vs `noremap`).
    pub recursive: bool,
}

impl Mapping {
    /// Parse a mapping from notation. An rhs shaped like `:command-name` names a
    /// registry command; anything else is a key sequence.
    pub fn parse(
        lhs: &str,
        rhs: &str,
        recursive: bool,
        scope: MappingScope,
        registry: &CommandRegistry,
    ) -> Result<Self, KeymapError> {
        let lhs_keys = core_input::tokenize(lhs).map_err(|source| KeymapError::Notation {
            context: format!("mapping lhs '{lhs}'"),
            source,
        })?;
        if lhs_keys.is_empty() {
            return Err(KeymapError::EmptyLhs);
        }
        let target = match command_name(rhs) {
            Some(name) => MappingTarget::Command(registry.command_named(name)?),
            None => MappingTarget::Keys(core_input::tokenize(rhs).map_err(|source| {
                KeymapError::Notation {
                    context: format!("mapping rhs '{rhs}'"),
                    source,
                }
            })?),
        };
        Ok(Self {
            lhs: lhs_keys,
            target,
            scope,
            recursive,
        })
    }

    pub fn rhs_notation(&self) -> String {
        match &self.target {
            MappingTarget::Keys(keys) => notation(keys),
            MappingTarget::Command(command) => format!(":{}", command.name()),
        }
    }
}

fn command_name(rhs: &str) -> Option<&str> {
    let name = rhs.strip_prefix(':')?;
    let mut chars = name.chars();
    let first = chars.next()?;
    (first.is_ascii_lowercase() && chars.all(|c| c.is_ascii_lowercase() || c == '-')).then_some(name)
}

/// Built-in Normal-mode remaps.
pub const DEFAULT_REMAPS: &[(&str, &str)] = &[
    ("D", "d$"),
    ("C", "c$"),
    ("Y", "yy"),
    ("S", "cc"),
    ("s", "cl"),
    ("x", "dl"),
    ("X", "dh"),
];

type Table = HashMap<Mode, BTreeMap<Vec<KeyToken>, Mapping>>;

#[derive(Debug, Clone, Default)]
pub struct Mappings {
    user: Table,
    defaults: Table,
}

impl Mappings {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding the built-in Normal-mode remaps.
    pub fn with_defaults(registry: &CommandRegistry) -> Result<Self, KeymapError> {
        let mut mappings = Self::new();
        for (lhs, rhs) in DEFAULT_REMAPS {
            let mapping = Mapping::parse(lhs, rhs, false, MappingScope::Default, registry)?;
            mappings.add(Mode::Normal, mapping);
        }
        Ok(mappings)
    }

    pub fn add(&mut self, mode: Mode, mapping: Mapping) {
        debug!(
            target: "input.map",
            mode = %mode,
            lhs = %notation(&mapping.lhs),
            rhs = %mapping.rhs_notation(),
            recursive = mapping.recursive,
            scope = ?mapping.scope,
            "mapping_added"
        );
        let table = match mapping.scope {
            MappingScope::Default => &mut self.defaults,
            MappingScope::User => &mut self.user,
        };
        table
            .entry(mode)
            .or_default()
            .insert(mapping.lhs.clone(), mapping);
    }

    /// Remove a user mapping; default remaps cannot be removed.
    pub fn remove(&mut self, mode: Mode, lhs: &[KeyToken]) -> Option<Mapping> {
        let removed = self.user.get_mut(&mode)?.remove(lhs);
        if removed.is_some() {
            debug!(target: "input.map", mode = %mode, lhs = %notation(lhs), "mapping_removed");
        }
        removed
    }

    /// Drop every user mapping for `mode`.
    pub fn clear(&mut self, mode: Mode) {
        self.user.remove(&mode);
    }

    fn layers(&self, include_user: bool) -> impl Iterator<Item = &Table> {
        include_user
            .then_some(&self.user)
            .into_iter()
            .chain(std::iter::once(&self.defaults))
    }

    pub fn exact(&self, mode: Mode, keys: &[KeyToken], include_user: bool) -> Option<&Mapping> {
        self.layers(include_user)
            .find_map(|table| table.get(&mode).and_then(|t| t.get(keys)))
    }

    /// True if some mapping strictly extends `keys`.
    pub fn has_longer(&self, mode: Mode, keys: &[KeyToken], include_user: bool) -> bool {
        self.layers(include_user).any(|table| {
            table.get(&mode).is_some_and(|t| {
                t.range::<[KeyToken], _>((Bound::Excluded(keys), Bound::Unbounded))
                    .next()
                    .is_some_and(|(lhs, _)| lhs.starts_with(keys))
            })
        })
    }

    /// Effective mappings for `mode`, user entries shadowing defaults, ordered by lhs.
    pub fn list(&self, mode: Mode) -> Vec<&Mapping> {
        let mut merged: BTreeMap<&[KeyToken], &Mapping> = BTreeMap::new();
        for table in [&self.defaults, &self.user] {
            if let Some(t) = table.get(&mode) {
                merged.extend(t.iter().map(|(k, m)| (k.as_slice(), m)));
            }
        }
        merged.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Motion, Operator, WindowCommand};
    use core_input::tokenize;
    use pretty_assertions::assert_eq;

    fn registry() -> CommandRegistry {
        CommandRegistry::builtin().unwrap()
    }

    fn keys(s: &str) -> Vec<KeyToken> {
        tokenize(s).unwrap()
    }

    #[test]
    fn parse_key_and_command_targets() {
        let reg = registry();
        let m = Mapping::parse("jk", "<esc>", false, MappingScope::User, &reg).unwrap();
        assert_eq!(m.target, MappingTarget::Keys(vec![KeyToken::ESC]));
        let m = Mapping::parse("<C-h>", ":focus-pane-left", true, MappingScope::User, &reg).unwrap();
        assert_eq!(
            m.target,
            MappingTarget::Command(CommandDef::Operator(Operator::Window(WindowCommand::FocusLeft)))
        );
        let m = Mapping::parse("Q", ":w<cr>", false, MappingScope::User, &reg).unwrap();
        assert!(matches!(m.target, MappingTarget::Keys(ref k) if k.len() == 3));
    }

    #[test]
    fn parse_errors() {
        let reg = registry();
        assert!(matches!(
            Mapping::parse("", "x", true, MappingScope::User, &reg),
            Err(KeymapError::EmptyLhs)
        ));
        assert!(matches!(
            Mapping::parse("<bogus>", "x", true, MappingScope::User, &reg),
            Err(KeymapError::Notation { .. })
        ));
        assert!(matches!(
            Mapping::parse("x", ":nope", true, MappingScope::User, &reg),
            Err(KeymapError::UnknownCommand(_))
        ));
    }

    #[test]
    fn user_shadows_default_and_unmap_uncovers_it() {
        let reg = registry();
        let mut m = Mappings::with_defaults(&reg).unwrap();
        let x = keys("x");
        assert_eq!(
            m.exact(Mode::Normal, &x, true).map(|m| m.rhs_notation()),
            Some("dl".to_string())
        );
        m.add(
            Mode::Normal,
            Mapping::parse("x", ":word-forward", false, MappingScope::User, &reg).unwrap(),
        );
        assert_eq!(
            m.exact(Mode::Normal, &x, true).map(|m| m.target.clone()),
            Some(MappingTarget::Command(CommandDef::Motion(Motion::WordForward)))
        );
        assert_eq!(
            m.exact(Mode::Normal, &x, false).map(|m| m.rhs_notation()),
            Some("dl".to_string())
        );
        assert!(m.remove(Mode::Normal, &x).is_some());
        assert_eq!(m.exact(Mode::Normal, &x, true).map(|m| m.scope), Some(MappingScope::Default));
        assert!(m.remove(Mode::Normal, &x).is_none());
    }

    #[test]
    fn prefix_detection() {
        let reg = registry();
        let mut m = Mappings::new();
        m.add(Mode::Insert, Mapping::parse("jk", "<esc>", false, MappingScope::User, &reg).unwrap());
        assert!(m.has_longer(Mode::Insert, &keys("j"), true));
        assert!(!m.has_longer(Mode::Insert, &keys("jk"), true));
        assert!(!m.has_longer(Mode::Insert, &keys("i"), true));
        assert!(!m.has_longer(Mode::Insert, &keys("j"), false));
        assert!(!m.has_longer(Mode::Normal, &keys("j"), true));
    }

    #[test]
    fn listing_merges_layers() {
        let reg = registry();
        let mut m = Mappings::with_defaults(&reg).unwrap();
        m.add(Mode::Normal, Mapping::parse("Y", "y$", false, MappingScope::User, &reg).unwrap());
        let listed: Vec<_> = m
            .list(Mode::Normal)
            .into_iter()
            .map(|m| (notation(&m.lhs), m.rhs_notation()))
            .collect();
        assert_eq!(listed.len(), DEFAULT_REMAPS.len());
        assert!(listed.contains(&("Y".to_string(), "y$".to_string())));
    }
}
