//! Global keyboard hook via `rdev`.
//!
//! `rdev::listen` blocks its thread for the life of the process, so the hook
//! owns a dedicated OS thread and hands triggers to the async side over a
//! channel.

use super::{listen_with_restarts, ComboTracker, Key, Modifier};
use rdev::{Event, EventType, Key as RdevKey};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc;

const MAX_RESTARTS: u32 = 5;
const RESTART_DELAY: Duration = Duration::from_secs(1);

/// Starts listening for `tracker`'s combination and sends `()` on each hit.
///
/// A trigger that arrives while the channel is full is dropped: the busy
/// gate would reject it anyway.
pub fn spawn_keyboard_hook(tracker: Arc<ComboTracker>, triggers: mpsc::Sender<()>) -> JoinHandle<()> {
    std::thread::spawn(move || {
        log::info!("[HOTKEY] Listening for {}", tracker.hotkey());
        let result = listen_with_restarts(&tracker, MAX_RESTARTS, RESTART_DELAY, || {
            let tracker = Arc::clone(&tracker);
            let triggers = triggers.clone();
            rdev::listen(move |event| handle_event(&tracker, &triggers, event))
        });
        if let Err(e) = result {
            log::error!("[HOTKEY] Keyboard hook stopped: {:?}", e);
        }
    })
}

fn handle_event(tracker: &ComboTracker, triggers: &mpsc::Sender<()>, event: Event) {
    match event.event_type {
        EventType::KeyPress(k) => {
            if let Some(key) = map_key(k) {
                if tracker.key_down(key) && triggers.try_send(()).is_err() {
                    log::debug!("[HOTKEY] Trigger dropped, previous one still pending");
                }
            }
        }
        EventType::KeyRelease(k) => {
            if let Some(key) = map_key(k) {
                tracker.key_up(key);
            }
        }
        _ => {}
    }
}

fn map_key(key: RdevKey) -> Option<Key> {
    use RdevKey::*;
    let mapped = match key {
        ControlLeft | ControlRight => Key::Modifier(Modifier::Ctrl),
        ShiftLeft | ShiftRight => Key::Modifier(Modifier::Shift),
        Alt | AltGr => Key::Modifier(Modifier::Alt),
        MetaLeft | MetaRight => Key::Modifier(Modifier::Meta),
        Space => Key::Space,
        Return => Key::Enter,
        Escape => Key::Escape,
        Tab => Key::Tab,
        PrintScreen => Key::PrintScreen,
        F1 => Key::Function(1),
        F2 => Key::Function(2),
        F3 => Key::Function(3),
        F4 => Key::Function(4),
        F5 => Key::Function(5),
        F6 => Key::Function(6),
        F7 => Key::Function(7),
        F8 => Key::Function(8),
        F9 => Key::Function(9),
        F10 => Key::Function(10),
        F11 => Key::Function(11),
        F12 => Key::Function(12),
        Num0 => Key::Char('0'),
        Num1 => Key::Char('1'),
        Num2 => Key::Char('2'),
        Num3 => Key::Char('3'),
        Num4 => Key::Char('4'),
        Num5 => Key::Char('5'),
        Num6 => Key::Char('6'),
        Num7 => Key::Char('7'),
        Num8 => Key::Char('8'),
        Num9 => Key::Char('9'),
        KeyA => Key::Char('a'),
        KeyB => Key::Char('b'),
        KeyC => Key::Char('c'),
        KeyD => Key::Char('d'),
        KeyE => Key::Char('e'),
        KeyF => Key::Char('f'),
        KeyG => Key::Char('g'),
        KeyH => Key::Char('h'),
        KeyI => Key::Char('i'),
        KeyJ => Key::Char('j'),
        KeyK => Key::Char('k'),
        KeyL => Key::Char('l'),
        KeyM => Key::Char('m'),
        KeyN => Key::Char('n'),
        KeyO => Key::Char('o'),
        KeyP => Key::Char('p'),
        KeyQ => Key::Char('q'),
        KeyR => Key::Char('r'),
        KeyS => Key::Char('s'),
        KeyT => Key::Char('t'),
        KeyU => Key::Char('u'),
        KeyV => Key::Char('v'),
        KeyW => Key::Char('w'),
        KeyX => Key::Char('x'),
        KeyY => Key::Char('y'),
        KeyZ => Key::Char('z'),
        _ => return None,
    };
    Some(mapped)
}
