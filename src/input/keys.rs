//! Physical input codes and their display names
//!
//! Codes follow the Windows virtual-key numbering on every platform so the
//! keybinding document is portable. `0` always means "unbound".

pub const UNBOUND: i32 = 0;

pub const VK_LBUTTON: i32 = 0x01;
pub const VK_RBUTTON: i32 = 0x02;
pub const VK_MBUTTON: i32 = 0x04;
pub const VK_XBUTTON1: i32 = 0x05;
pub const VK_XBUTTON2: i32 = 0x06;
pub const VK_BACK: i32 = 0x08;
pub const VK_TAB: i32 = 0x09;
pub const VK_RETURN: i32 = 0x0D;
pub const VK_SHIFT: i32 = 0x10;
pub const VK_CONTROL: i32 = 0x11;
pub const VK_MENU: i32 = 0x12;
pub const VK_PAUSE: i32 = 0x13;
pub const VK_CAPITAL: i32 = 0x14;
pub const VK_ESCAPE: i32 = 0x1B;
pub const VK_SPACE: i32 = 0x20;
pub const VK_PRIOR: i32 = 0x21;
pub const VK_NEXT: i32 = 0x22;
pub const VK_END: i32 = 0x23;
pub const VK_HOME: i32 = 0x24;
pub const VK_LEFT: i32 = 0x25;
pub const VK_UP: i32 = 0x26;
pub const VK_RIGHT: i32 = 0x27;
pub const VK_DOWN: i32 = 0x28;
pub const VK_INSERT: i32 = 0x2D;
pub const VK_DELETE: i32 = 0x2E;
pub const VK_F1: i32 = 0x70;
pub const VK_F5: i32 = 0x74;
pub const VK_F12: i32 = 0x7B;

/// Highest code a binding may use
pub const MAX_CODE: i32 = 0xFE;

/// Whether `code` is a bindable (non-zero, in-range) input code
pub fn is_valid_code(code: i32) -> bool {
    (1..=MAX_CODE).contains(&code)
}

/// Human-readable name for an input code
pub fn code_name(code: i32) -> String {
    let fixed = match code {
        UNBOUND => "(none)",
        VK_LBUTTON => "Mouse1 (LMB)",
        VK_RBUTTON => "Mouse2 (RMB)",
        VK_MBUTTON => "Mouse3 (MMB)",
        VK_XBUTTON1 => "Mouse4",
        VK_XBUTTON2 => "Mouse5",
        VK_BACK => "Backspace",
        VK_TAB => "Tab",
        VK_RETURN => "Enter",
        VK_SHIFT => "Shift",
        VK_CONTROL => "Ctrl",
        VK_MENU => "Alt",
        VK_PAUSE => "Pause",
        VK_CAPITAL => "CapsLock",
        VK_ESCAPE => "Esc",
        VK_SPACE => "Space",
        VK_PRIOR => "PageUp",
        VK_NEXT => "PageDown",
        VK_END => "End",
        VK_HOME => "Home",
        VK_LEFT => "Left",
        VK_UP => "Up",
        VK_RIGHT => "Right",
        VK_DOWN => "Down",
        VK_INSERT => "Insert",
        VK_DELETE => "Delete",
        _ => "",
    };
    if !fixed.is_empty() {
        return fixed.to_string();
    }

    match code {
        c if (VK_F1..=VK_F12).contains(&c) => format!("F{}", c - VK_F1 + 1),
        c if (0x30..=0x39).contains(&c) || (0x41..=0x5A).contains(&c) => {
            char::from(c as u8).to_string()
        }
        c => format!("(vk 0x{:02X})", c),
    }
}

/// Parse a code from a name (`F5`, `End`, `mouse2`, `A`) or a number (`0x2D`, `45`)
pub fn parse_code(text: &str) -> Option<i32> {
    let t = text.trim();
    if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        return i32::from_str_radix(hex, 16).ok();
    }
    if let Ok(n) = t.parse::<i32>() {
        return Some(n);
    }

    let lower = t.to_lowercase();
    let named = match lower.as_str() {
        "none" | "unbound" => UNBOUND,
        "lmb" | "mouse1" => VK_LBUTTON,
        "rmb" | "mouse2" => VK_RBUTTON,
        "mmb" | "mouse3" => VK_MBUTTON,
        "mouse4" => VK_XBUTTON1,
        "mouse5" => VK_XBUTTON2,
        "backspace" => VK_BACK,
        "tab" => VK_TAB,
        "enter" => VK_RETURN,
        "shift" => VK_SHIFT,
        "ctrl" => VK_CONTROL,
        "alt" => VK_MENU,
        "pause" => VK_PAUSE,
        "capslock" => VK_CAPITAL,
        "esc" => VK_ESCAPE,
        "space" => VK_SPACE,
        "pageup" => VK_PRIOR,
        "pagedown" => VK_NEXT,
        "end" => VK_END,
        "home" => VK_HOME,
        "left" => VK_LEFT,
        "up" => VK_UP,
        "right" => VK_RIGHT,
        "down" => VK_DOWN,
        "insert" => VK_INSERT,
        "delete" => VK_DELETE,
        _ => {
            if let Some(n) = lower.strip_prefix('f').and_then(|n| n.parse::<i32>().ok()) {
                return (1..=12).contains(&n).then(|| VK_F1 + n - 1);
            }
            let mut chars = t.chars();
            return match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_ascii_alphanumeric() => {
                    Some(c.to_ascii_uppercase() as i32)
                }
                _ => None,
            };
        }
    };
    Some(named)
}
