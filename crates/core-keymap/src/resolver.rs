use core_events::{KeyToken, Mode, notation};
use tracing::debug;

use crate::command::CommandDef;
use crate::mappings::{MappingTarget, Mappings};
use crate::registry::{CommandRegistry, Lookup};

/// Outcome of resolving a pending key sequence in one mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedCommand {
    Command(CommandDef),
    /// A remap to another key sequence, to be fed back through the machine.
    Keys {
        keys: Vec<KeyToken>,
        recursive: bool,
    },
    /// Strict prefix of a remap; more keys (or a timeout) decide.
    Incomplete,
    /// Strict prefix of a built-in command (`g`, `z`, `<C-w>`).
    OpenNamespace,
    Missing,
}

impl ResolvedCommand {
    pub fn needs_more(&self) -> bool {
        matches!(self, ResolvedCommand::Incomplete | ResolvedCommand::OpenNamespace)
    }
}

/// Strip a leading register selection (`"x`) and count (`[1-9][0-9]*`).
///
/// A lone `0` is the line-start motion, not a count, so it is kept. If nothing
/// would remain the sequence is returned untouched.
pub fn to_bare_command_name(seq: &[KeyToken]) -> &[KeyToken] {
    let mut rest = seq;
    if let [KeyToken::Char('"'), _, tail @ ..] = rest {
        rest = tail;
    }
    if let [first, ..] = rest
        && matches!(first, KeyToken::Char('1'..='9'))
    {
        let digits = rest.iter().take_while(|t| t.is_digit()).count();
        rest = &rest[digits..];
    }
    if rest.is_empty() { seq } else { rest }
}

#[derive(Debug, Clone, Copy)]
pub struct MappingResolver<'a> {
    mappings: &'a Mappings,
    registry: &'a CommandRegistry,
}

impl<'a> MappingResolver<'a> {
    pub fn new(mappings: &'a Mappings, registry: &'a CommandRegistry) -> Self {
        Self { mappings, registry }
    }

    /// Resolve `seq` in `mode`. With `user_mappings` false only default remaps
    /// and the registry are consulted (`noremap` expansions, prefix fallback).
    pub fn resolve(&self, mode: Mode, seq: &[KeyToken], user_mappings: bool) -> ResolvedCommand {
        let bare = to_bare_command_name(seq);
        let resolved = self.resolve_bare(mode, bare, user_mappings);
        debug!(
            target: "input.map",
            mode = %mode,
            seq = %notation(bare),
            user_mappings,
            resolved = ?resolved,
            "resolve"
        );
        resolved
    }

    fn resolve_bare(&self, mode: Mode, bare: &[KeyToken], user_mappings: bool) -> ResolvedCommand {
        if let Some(mapping) = self.mappings.exact(mode, bare, user_mappings) {
            return match &mapping.target {
                MappingTarget::Command(command) => ResolvedCommand::Command(*command),
                MappingTarget::Keys(keys) => ResolvedCommand::Keys {
                    keys: keys.clone(),
                    recursive: mapping.recursive,
                },
            };
        }
        if self.mappings.has_longer(mode, bare, user_mappings) {
            return ResolvedCommand::Incomplete;
        }
        match self.registry.lookup(mode, bare) {
            Lookup::Exact { command, .. } => ResolvedCommand::Command(command),
            Lookup::Prefix => ResolvedCommand::OpenNamespace,
            Lookup::Miss => ResolvedCommand::Missing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Motion, Operator, OperatorKind, WindowCommand};
    use crate::mappings::{Mapping, MappingScope};
    use core_input::tokenize;
    use pretty_assertions::assert_eq;

    fn keys(s: &str) -> Vec<KeyToken> {
        tokenize(s).unwrap()
    }

    fn setup() -> (Mappings, CommandRegistry) {
        let registry = CommandRegistry::builtin().unwrap();
        let mut mappings = Mappings::with_defaults(&registry).unwrap();
        mappings.add(
            Mode::Insert,
            Mapping::parse("jk", "<esc>", false, MappingScope::User, &registry).unwrap(),
        );
        mappings.add(
            Mode::Normal,
            Mapping::parse(",w", ":focus-pane-next", false, MappingScope::User, &registry)
                .unwrap(),
        );
        (mappings, registry)
    }

    #[test]
    fn bare_name_strips_register_and_count() {
        assert_eq!(to_bare_command_name(&keys("\"a12dw")), keys("dw").as_slice());
        assert_eq!(to_bare_command_name(&keys("3j")), keys("j").as_slice());
        assert_eq!(to_bare_command_name(&keys("0")), keys("0").as_slice());
        assert_eq!(to_bare_command_name(&keys("\"a")), keys("\"a").as_slice());
    }

    #[test]
    fn user_exact_wins() {
        let (m, r) = setup();
        let resolver = MappingResolver::new(&m, &r);
        assert_eq!(
            resolver.resolve(Mode::Normal, &keys(",w"), true),
            ResolvedCommand::Command(CommandDef::Operator(Operator::Window(WindowCommand::Next)))
        );
        assert_eq!(
            resolver.resolve(Mode::Insert, &keys("jk"), true),
            ResolvedCommand::Keys {
                keys: vec![KeyToken::ESC],
                recursive: false
            }
        );
    }

    #[test]
    fn user_prefix_is_incomplete() {
        let (m, r) = setup();
        let resolver = MappingResolver::new(&m, &r);
        assert_eq!(resolver.resolve(Mode::Insert, &keys("j"), true), ResolvedCommand::Incomplete);
        assert_eq!(resolver.resolve(Mode::Normal, &keys(","), true), ResolvedCommand::Incomplete);
        assert_eq!(
            resolver.resolve(Mode::Normal, &keys(","), false),
            ResolvedCommand::Command(CommandDef::Motion(Motion::RepeatCharSearchReverse))
        );
    }

    #[test]
    fn defaults_apply_without_user_mappings() {
        let (m, r) = setup();
        let resolver = MappingResolver::new(&m, &r);
        assert_eq!(
            resolver.resolve(Mode::Normal, &keys("x"), false),
            ResolvedCommand::Keys {
                keys: keys("dl"),
                recursive: false
            }
        );
    }

    #[test]
    fn registry_namespaces_and_misses() {
        let (m, r) = setup();
        let resolver = MappingResolver::new(&m, &r);
        assert_eq!(
            resolver.resolve(Mode::Normal, &keys("<C-w>"), true),
            ResolvedCommand::OpenNamespace
        );
        assert_eq!(
            resolver.resolve(Mode::Normal, &keys("<C-w>h"), true),
            ResolvedCommand::Command(CommandDef::Operator(Operator::Window(
                WindowCommand::FocusLeft
            )))
        );
        assert_eq!(
            resolver.resolve(Mode::Normal, &keys("2dd"), true),
            ResolvedCommand::Command(CommandDef::Operator(Operator::Linewise(OperatorKind::Delete)))
        );
        assert_eq!(resolver.resolve(Mode::Normal, &keys("Q"), true), ResolvedCommand::Missing);
        assert!(resolver.resolve(Mode::Normal, &keys("g"), true).needs_more());
    }
}
