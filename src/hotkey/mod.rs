//! Hotkey combinations and key-state tracking.
//!
//! A configured string such as `Ctrl+Shift+O` becomes a `Hotkey`. The
//! `ComboTracker` keeps the set of keys currently held down and reports the
//! moment the combination becomes satisfied. Whatever hooks the keyboard
//! feeds `key_down` / `key_up` and forwards the triggers.

#[cfg(feature = "hotkey-hook")]
mod rdev_hook;

#[cfg(feature = "hotkey-hook")]
pub use rdev_hook::spawn_keyboard_hook;

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::Duration;

pub const DEFAULT_HOTKEY: &str = "Ctrl+Shift+O";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Modifier {
    Ctrl,
    Shift,
    Alt,
    Meta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
    Modifier(Modifier),
    /// Letters are stored lowercase.
    Char(char),
    Function(u8),
    Space,
    Enter,
    Escape,
    Tab,
    PrintScreen,
}

impl Key {
    fn parse(token: &str) -> Option<Key> {
        let lower = token.to_ascii_lowercase();
        let key = match lower.as_str() {
            "ctrl" | "control" => Key::Modifier(Modifier::Ctrl),
            "shift" => Key::Modifier(Modifier::Shift),
            "alt" | "option" => Key::Modifier(Modifier::Alt),
            "meta" | "cmd" | "command" | "super" | "win" => Key::Modifier(Modifier::Meta),
            "space" => Key::Space,
            "enter" | "return" => Key::Enter,
            "esc" | "escape" => Key::Escape,
            "tab" => Key::Tab,
            "printscreen" | "prtsc" => Key::PrintScreen,
            _ => {
                let mut chars = lower.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) if c.is_ascii_alphanumeric() => Key::Char(c),
                    (Some('f'), Some(_)) => match lower[1..].parse::<u8>() {
                        Ok(n @ 1..=24) => Key::Function(n),
                        _ => return None,
                    },
                    _ => return None,
                }
            }
        };
        Some(key)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Modifier(m) => write!(f, "{m:?}"),
            Key::Char(c) => write!(f, "{}", c.to_ascii_uppercase()),
            Key::Function(n) => write!(f, "F{n}"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// A set of modifiers plus exactly one non-modifier key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hotkey {
    modifiers: BTreeSet<Modifier>,
    key: Key,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HotkeyError {
    #[error("hotkey is empty")]
    Empty,

    #[error("unknown key `{0}` in hotkey")]
    UnknownKey(String),

    #[error("hotkey needs one non-modifier key")]
    MissingKey,

    #[error("hotkey has more than one non-modifier key")]
    MultipleKeys,
}

impl Hotkey {
    pub fn parse(spec: &str) -> Result<Self, HotkeyError> {
        if spec.trim().is_empty() {
            return Err(HotkeyError::Empty);
        }

        let mut modifiers = BTreeSet::new();
        let mut key = None;
        for token in spec.split('+').map(str::trim) {
            match Key::parse(token) {
                Some(Key::Modifier(m)) => {
                    modifiers.insert(m);
                }
                Some(k) if key.is_none() => key = Some(k),
                Some(_) => return Err(HotkeyError::MultipleKeys),
                None => return Err(HotkeyError::UnknownKey(token.to_string())),
            }
        }

        Ok(Self {
            modifiers,
            key: key.ok_or(HotkeyError::MissingKey)?,
        })
    }

    pub fn key(&self) -> Key {
        self.key
    }

    pub fn modifiers(&self) -> impl Iterator<Item = Modifier> + '_ {
        self.modifiers.iter().copied()
    }

    fn involves(&self, key: Key) -> bool {
        match key {
            Key::Modifier(m) => self.modifiers.contains(&m),
            other => other == self.key,
        }
    }
}

impl FromStr for Hotkey {
    type Err = HotkeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Hotkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for m in &self.modifiers {
            write!(f, "{m:?}+")?;
        }
        write!(f, "{}", self.key)
    }
}

#[derive(Debug, Default)]
struct KeyState {
    down: BTreeSet<Key>,
    /// Set once the combination fires; cleared when any part of it is released.
    fired: bool,
}

/// Edge-triggered matcher for one `Hotkey`.
#[derive(Debug)]
pub struct ComboTracker {
    hotkey: Hotkey,
    state: Mutex<KeyState>,
}

impl ComboTracker {
    pub fn new(hotkey: Hotkey) -> Self {
        Self {
            hotkey,
            state: Mutex::new(KeyState::default()),
        }
    }

    pub fn hotkey(&self) -> &Hotkey {
        &self.hotkey
    }

    /// Records a key press. Returns `true` exactly when the combination
    /// becomes satisfied; holding it (or key repeat) does not fire again.
    pub fn key_down(&self, key: Key) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        state.down.insert(key);
        if state.fired || !self.satisfied(&state.down) {
            return false;
        }
        state.fired = true;
        true
    }

    pub fn key_up(&self, key: Key) {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        state.down.remove(&key);
        if self.hotkey.involves(key) {
            state.fired = false;
        }
    }

    /// Forgets all held keys. Used when the keyboard hook restarts, since
    /// releases that happened while it was down were never seen.
    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        *state = KeyState::default();
    }

    /// The trigger key is down and the held modifiers are exactly the
    /// hotkey's modifiers.
    fn satisfied(&self, down: &BTreeSet<Key>) -> bool {
        if !down.contains(&self.hotkey.key) {
            return false;
        }
        let held: BTreeSet<Modifier> = down
            .iter()
            .filter_map(|k| match k {
                Key::Modifier(m) => Some(*m),
                _ => None,
            })
            .collect();
        held == self.hotkey.modifiers
    }
}

/// Runs a blocking keyboard listener, restarting it up to `max_restarts`
/// times after it fails. The tracker is reset before every restart.
#[cfg_attr(not(feature = "hotkey-hook"), allow(dead_code))]
pub(crate) fn listen_with_restarts<E, L>(
    tracker: &ComboTracker,
    max_restarts: u32,
    delay: Duration,
    mut listen: L,
) -> Result<(), E>
where
    E: fmt::Debug,
    L: FnMut() -> Result<(), E>,
{
    let mut attempt = 0;
    loop {
        match listen() {
            Ok(()) => return Ok(()),
            Err(e) if attempt < max_restarts => {
                attempt += 1;
                log::warn!(
                    "[HOTKEY] Keyboard hook failed ({:?}), restart {}/{}",
                    e,
                    attempt,
                    max_restarts
                );
                tracker.reset();
                std::thread::sleep(delay);
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CTRL: Key = Key::Modifier(Modifier::Ctrl);
    const SHIFT: Key = Key::Modifier(Modifier::Shift);
    const ALT: Key = Key::Modifier(Modifier::Alt);

    fn tracker(spec: &str) -> ComboTracker {
        ComboTracker::new(Hotkey::parse(spec).unwrap())
    }

    #[test]
    fn parses_modifiers_and_key() {
        let hotkey = Hotkey::parse("ctrl + Shift + o").unwrap();
        assert_eq!(hotkey.key(), Key::Char('o'));
        assert_eq!(
            hotkey.modifiers().collect::<Vec<_>>(),
            vec![Modifier::Ctrl, Modifier::Shift]
        );
        assert_eq!(hotkey.to_string(), "Ctrl+Shift+O");
        assert_eq!(Hotkey::parse("F12").unwrap().key(), Key::Function(12));
    }

    #[test]
    fn rejects_malformed_hotkeys() {
        assert_eq!(Hotkey::parse(" "), Err(HotkeyError::Empty));
        assert_eq!(Hotkey::parse("Ctrl+Shift"), Err(HotkeyError::MissingKey));
        assert_eq!(Hotkey::parse("Ctrl+A+B"), Err(HotkeyError::MultipleKeys));
        assert_eq!(
            Hotkey::parse("Ctrl+Hyper+O"),
            Err(HotkeyError::UnknownKey("Hyper".into()))
        );
        assert!(Hotkey::parse("F25").is_err());
    }

    #[test]
    fn fires_once_per_press() {
        let t = tracker("Ctrl+Shift+O");
        assert!(!t.key_down(CTRL));
        assert!(!t.key_down(SHIFT));
        assert!(t.key_down(Key::Char('o')));
        // Key repeat while held
        assert!(!t.key_down(Key::Char('o')));

        t.key_up(Key::Char('o'));
        assert!(t.key_down(Key::Char('o')));
    }

    #[test]
    fn order_of_presses_does_not_matter() {
        let t = tracker("Ctrl+Shift+O");
        assert!(!t.key_down(Key::Char('o')));
        assert!(!t.key_down(SHIFT));
        assert!(t.key_down(CTRL));
    }

    #[test]
    fn extra_modifier_blocks_the_combination() {
        let t = tracker("Ctrl+O");
        t.key_down(ALT);
        t.key_down(CTRL);
        assert!(!t.key_down(Key::Char('o')));

        t.key_up(ALT);
        t.key_up(Key::Char('o'));
        assert!(t.key_down(Key::Char('o')));
    }

    #[test]
    fn missed_key_up_is_recovered_by_reset() {
        let t = tracker("Ctrl+O");
        t.key_down(CTRL);
        assert!(t.key_down(Key::Char('o')));
        t.reset();
        t.key_down(CTRL);
        assert!(t.key_down(Key::Char('o')));
    }

    #[test]
    fn hook_restart_forgets_keys_held_when_it_failed() {
        let t = tracker("Ctrl+O");
        let mut attempts = 0;
        let result = listen_with_restarts(&t, 2, Duration::ZERO, || {
            attempts += 1;
            if attempts == 1 {
                // Ctrl+O is down when the hook dies; the releases are lost.
                t.key_down(CTRL);
                assert!(t.key_down(Key::Char('o')));
                return Err("hook died");
            }
            // Restarted hook: a fresh press must fire again.
            t.key_down(CTRL);
            assert!(t.key_down(Key::Char('o')));
            Ok(())
        });
        assert_eq!(result, Ok(()));
        assert_eq!(attempts, 2);
    }

    #[test]
    fn hook_gives_up_after_max_restarts() {
        let t = tracker("Ctrl+O");
        let mut attempts = 0;
        let result = listen_with_restarts(&t, 2, Duration::ZERO, || {
            attempts += 1;
            Err::<(), _>(attempts)
        });
        assert_eq!(result, Err(3));
    }
}
