use core_events::{KeyToken, ModMask, NamedKey};
use crossterm::event::{
    KeyCode as CKeyCode, KeyEvent as CKeyEvent, KeyEventKind as CKeyEventKind,
    KeyModifiers as CKeyModifiers,
};

/// A terminal key press translated into a canonical token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPress {
    pub token: KeyToken,
    pub repeat: bool,
}

/// Map a crossterm key event into a canonical token.
///
/// Returns `None` for releases and for key codes with no Vim notation
/// (media keys, lock keys, bare modifiers).
pub fn map_key_event(event: &CKeyEvent) -> Option<KeyPress> {
    if matches!(event.kind, CKeyEventKind::Release) {
        return None;
    }
    let (base, implied) = map_key_code(&event.code)?;
    let mut mods = map_mod_mask(event.modifiers) | implied;
    // Shift is already folded into the character itself (`A`, `?`, ...).
    if matches!(base, KeyToken::Char(_)) && !mods.intersects(ModMask::CTRL | ModMask::ALT) {
        mods.remove(ModMask::SHIFT);
    }
    Some(KeyPress {
        token: KeyToken::chord(mods, base),
        repeat: matches!(event.kind, CKeyEventKind::Repeat),
    })
}

/// Base token for a key code plus any modifier the code itself implies.
fn map_key_code(code: &CKeyCode) -> Option<(KeyToken, ModMask)> {
    let named = |k| Some((KeyToken::Named(k), ModMask::empty()));
    match code {
        CKeyCode::Char(c) => Some((KeyToken::Char(*c), ModMask::empty())),
        CKeyCode::Enter => named(NamedKey::Enter),
        CKeyCode::Esc => named(NamedKey::Esc),
        CKeyCode::Backspace => named(NamedKey::Backspace),
        CKeyCode::Tab => named(NamedKey::Tab),
        CKeyCode::BackTab => Some((KeyToken::Named(NamedKey::Tab), ModMask::SHIFT)),
        CKeyCode::Up => named(NamedKey::Up),
        CKeyCode::Down => named(NamedKey::Down),
        CKeyCode::Left => named(NamedKey::Left),
        CKeyCode::Right => named(NamedKey::Right),
        CKeyCode::Home => named(NamedKey::Home),
        CKeyCode::End => named(NamedKey::End),
        CKeyCode::PageUp => named(NamedKey::PageUp),
        CKeyCode::PageDown => named(NamedKey::PageDown),
        CKeyCode::Insert => named(NamedKey::Insert),
        CKeyCode::Delete => named(NamedKey::Delete),
        CKeyCode::F(n) if (1..=15).contains(n) => named(NamedKey::F(*n)),
        _ => None,
    }
}

fn map_mod_mask(mods: CKeyModifiers) -> ModMask {
    let mut out = ModMask::empty();
    if mods.contains(CKeyModifiers::CONTROL) {
        out |= ModMask::CTRL;
    }
    if mods.intersects(CKeyModifiers::ALT | CKeyModifiers::META) {
        out |= ModMask::ALT;
    }
    if mods.contains(CKeyModifiers::SHIFT) {
        out |= ModMask::SHIFT;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState as CKeyEventState;

    fn key_event(code: CKeyCode, modifiers: CKeyModifiers, kind: CKeyEventKind) -> CKeyEvent {
        CKeyEvent {
            code,
            modifiers,
            kind,
            state: CKeyEventState::empty(),
        }
    }

    fn press(code: CKeyCode, modifiers: CKeyModifiers) -> Option<KeyToken> {
        map_key_event(&key_event(code, modifiers, CKeyEventKind::Press)).map(|p| p.token)
    }

    #[test]
    fn maps_basic_char() {
        assert_eq!(press(CKeyCode::Char('a'), CKeyModifiers::NONE), Some(KeyToken::Char('a')));
    }

    #[test]
    fn shifted_printable_drops_shift() {
        assert_eq!(press(CKeyCode::Char('A'), CKeyModifiers::SHIFT), Some(KeyToken::Char('A')));
    }

    #[test]
    fn control_char_becomes_chord() {
        assert_eq!(
            press(CKeyCode::Char('w'), CKeyModifiers::CONTROL),
            Some(KeyToken::ctrl('w'))
        );
        let tok = press(CKeyCode::Char('d'), CKeyModifiers::CONTROL | CKeyModifiers::SHIFT).unwrap();
        assert_eq!(tok.to_string(), "<C-S-d>");
    }

    #[test]
    fn backtab_is_shift_tab() {
        let tok = press(CKeyCode::BackTab, CKeyModifiers::SHIFT).unwrap();
        assert_eq!(tok.to_string(), "<S-tab>");
    }

    #[test]
    fn maps_named_and_function_keys() {
        assert_eq!(press(CKeyCode::Enter, CKeyModifiers::NONE), Some(KeyToken::ENTER));
        assert_eq!(
            press(CKeyCode::F(5), CKeyModifiers::NONE),
            Some(KeyToken::Named(NamedKey::F(5)))
        );
        assert_eq!(press(CKeyCode::F(20), CKeyModifiers::NONE), None);
    }

    #[test]
    fn release_is_ignored_and_repeat_flagged() {
        let release = key_event(CKeyCode::Char('j'), CKeyModifiers::NONE, CKeyEventKind::Release);
        assert_eq!(map_key_event(&release), None);
        let repeat = key_event(CKeyCode::Char('j'), CKeyModifiers::NONE, CKeyEventKind::Repeat);
        assert!(map_key_event(&repeat).unwrap().repeat);
    }
}
