//! Motion / operator -> `ConcreteCommand`.
//!
//! Arguments every command carries: `count` and `mode` (the mode it was
//! issued from). Inputs collected after the key (`f{char}`, `'{mark}`,
//! `/pattern`) become named arguments. Operators that use registers carry
//! `register`; pastes also carry the register's `values` so the host never
//! reads registers itself.

use core_events::{ConcreteCommand, Mode};
use core_keymap::{Motion, Operator};
use tracing::trace;

use crate::MachineError;
use crate::machine::CommandStateMachine;
use crate::session::Session;

/// Motions that record the previous-context mark before moving.
fn is_jump(motion: Motion) -> bool {
    matches!(
        motion,
        Motion::FileStart
            | Motion::FileEnd
            | Motion::SearchForward
            | Motion::SearchBackward
            | Motion::SearchNext
            | Motion::SearchPrev
            | Motion::SearchWordForward
            | Motion::SearchWordBackward
            | Motion::MarkExact
            | Motion::MarkLine
            | Motion::MatchPair
            | Motion::ParagraphForward
            | Motion::ParagraphBackward
            | Motion::SentenceForward
            | Motion::SentenceBackward
    )
}

/// Motions that keep the sticky column.
fn is_vertical(motion: Motion) -> bool {
    matches!(
        motion,
        Motion::Up
            | Motion::Down
            | Motion::DisplayUp
            | Motion::DisplayDown
            | Motion::HalfPageUp
            | Motion::HalfPageDown
            | Motion::PageUp
            | Motion::PageDown
    )
}

impl CommandStateMachine {
    /// `Ok(None)` when the motion cannot run: `;` with no previous character
    /// search, `n` with no previous pattern, an unset mark.
    pub(crate) fn translate_motion(
        &mut self,
        session: &mut Session,
        motion: Motion,
        count: u32,
        explicit: Option<u32>,
        mode: Mode,
    ) -> Result<Option<ConcreteCommand>, MachineError> {
        let Some(mut cmd) = self.motion_command(session, motion, count, explicit, mode)? else {
            return Ok(None);
        };
        if is_vertical(motion) {
            let xpos = *self.state.xpos.get_or_insert(session.cursor.col);
            cmd = cmd.with_arg("xpos", xpos);
        } else {
            self.state.xpos = None;
        }
        trace!(target: "input.machine", command = %cmd, "motion_translated");
        Ok(Some(cmd))
    }

    fn motion_command(
        &mut self,
        session: &mut Session,
        motion: Motion,
        count: u32,
        explicit: Option<u32>,
        mode: Mode,
    ) -> Result<Option<ConcreteCommand>, MachineError> {
        let mut input = self.state.motion_input.clone();
        let motion = match motion {
            Motion::RepeatCharSearch | Motion::RepeatCharSearchReverse => {
                let (Some(base), Some(c)) = (
                    self.state.last_char_search_command,
                    self.state.last_character_search,
                ) else {
                    return Ok(None);
                };
                input = Some(c.to_string());
                if motion == Motion::RepeatCharSearchReverse {
                    base.reversed()
                } else {
                    base
                }
            }
            m if m.is_char_search() => {
                let Some(c) = input.as_deref().and_then(|s| s.chars().next()) else {
                    return Ok(None);
                };
                self.state.last_character_search = Some(c);
                self.state.last_char_search_command = Some(m);
                m
            }
            m => m,
        };

        let mut cmd = match (motion, explicit) {
            (Motion::FileStart | Motion::FileEnd, Some(line)) => {
                ConcreteCommand::new("goto-line").with_arg("line", line)
            }
            _ => ConcreteCommand::new(motion.name()).with_arg("count", count),
        };
        cmd = cmd.with_arg("mode", mode.as_str());

        cmd = match motion {
            m if m.is_char_search() => match input {
                Some(c) => cmd.with_arg("char", c),
                None => return Ok(None),
            },
            Motion::MarkExact | Motion::MarkLine => {
                let Some(name) = input.as_deref().and_then(|s| s.chars().next()) else {
                    return Ok(None);
                };
                let Some(mark) = session.marks.get(name) else {
                    return Ok(None);
                };
                cmd.with_arg("mark", name.to_string())
                    .with_arg("position", serde_json::to_value(mark)?)
            }
            Motion::SearchForward | Motion::SearchBackward => match input {
                Some(pattern) => cmd.with_arg("pattern", pattern),
                None => return Ok(None),
            },
            Motion::SearchNext | Motion::SearchPrev => {
                let Some(pattern) = self.state.last_buffer_search.clone() else {
                    return Ok(None);
                };
                let forward = self.state.last_buffer_search_command != Some(Motion::SearchBackward);
                let direction = if (motion == Motion::SearchNext) == forward {
                    "forward"
                } else {
                    "backward"
                };
                cmd.with_arg("pattern", pattern).with_arg("direction", direction)
            }
            Motion::TextObject { .. } => match input {
                Some(object) => cmd.with_arg("object", object),
                None => return Ok(None),
            },
            _ => cmd,
        };

        if is_jump(motion) {
            session.marks.set_previous_context(session.cursor);
        }
        Ok(Some(cmd))
    }

    pub(crate) fn translate_operator(
        &mut self,
        session: &mut Session,
        op: Operator,
        count: u32,
        mode: Mode,
        register: char,
    ) -> Result<ConcreteCommand, MachineError> {
        self.state.xpos = None;
        let mut cmd = ConcreteCommand::new(op.name())
            .with_arg("count", count)
            .with_arg("mode", mode.as_str());
        if op.uses_register() {
            cmd = cmd.with_arg("register", register.to_string());
        }
        let input = self.state.action_input.clone();
        cmd = match op {
            Operator::ReplaceChar | Operator::Surround => match input {
                Some(c) => cmd.with_arg("char", c),
                None => cmd,
            },
            Operator::PasteAfter | Operator::PasteBefore => {
                let values = session.registers.get(register)?.unwrap_or_default();
                cmd.with_arg("values", values)
            }
            Operator::InsertRegister => {
                let name = input.as_deref().and_then(|s| s.chars().next()).unwrap_or('"');
                let values = session.registers.get(name)?.unwrap_or_default();
                cmd.with_arg("register", name.to_string()).with_arg("values", values)
            }
            _ => cmd,
        };
        Ok(cmd)
    }
}
