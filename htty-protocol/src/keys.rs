//! Symbolic key names understood by the controller's `sendKeys` command.
//!
//! Anything that is not one of these names is sent as literal text.

use std::fmt;
use std::str::FromStr;

macro_rules! presses {
    ($($variant:ident => $wire:literal, $name:literal;)+) => {
        /// A special key the controller knows by name.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Press {
            $($variant,)+
        }

        impl Press {
            /// Every named key, in declaration order.
            pub const ALL: &'static [Press] = &[$(Press::$variant,)+];

            /// The string sent on the wire, e.g. `"C-a"`.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Press::$variant => $wire,)+
                }
            }

            /// Upper-snake name accepted on the command line, e.g. `"CTRL_A"`.
            pub fn name(&self) -> &'static str {
                match self {
                    $(Press::$variant => $name,)+
                }
            }
        }
    };
}

presses! {
    Enter => "Enter", "ENTER";
    Tab => "Tab", "TAB";
    Space => "Space", "SPACE";
    Escape => "Escape", "ESCAPE";
    Left => "Left", "LEFT";
    Right => "Right", "RIGHT";
    Up => "Up", "UP";
    Down => "Down", "DOWN";
    Home => "Home", "HOME";
    End => "End", "END";
    PageUp => "PageUp", "PAGE_UP";
    PageDown => "PageDown", "PAGE_DOWN";
    Backspace => "Backspace", "BACKSPACE";
    F1 => "F1", "F1";
    F2 => "F2", "F2";
    F3 => "F3", "F3";
    F4 => "F4", "F4";
    F5 => "F5", "F5";
    F6 => "F6", "F6";
    F7 => "F7", "F7";
    F8 => "F8", "F8";
    F9 => "F9", "F9";
    F10 => "F10", "F10";
    F11 => "F11", "F11";
    F12 => "F12", "F12";
    CtrlA => "C-a", "CTRL_A";
    CtrlB => "C-b", "CTRL_B";
    CtrlC => "C-c", "CTRL_C";
    CtrlD => "C-d", "CTRL_D";
    CtrlE => "C-e", "CTRL_E";
    CtrlF => "C-f", "CTRL_F";
    CtrlG => "C-g", "CTRL_G";
    CtrlH => "C-h", "CTRL_H";
    CtrlI => "C-i", "CTRL_I";
    CtrlJ => "C-j", "CTRL_J";
    CtrlK => "C-k", "CTRL_K";
    CtrlL => "C-l", "CTRL_L";
    CtrlM => "C-m", "CTRL_M";
    CtrlN => "C-n", "CTRL_N";
    CtrlO => "C-o", "CTRL_O";
    CtrlP => "C-p", "CTRL_P";
    CtrlQ => "C-q", "CTRL_Q";
    CtrlR => "C-r", "CTRL_R";
    CtrlS => "C-s", "CTRL_S";
    CtrlT => "C-t", "CTRL_T";
    CtrlU => "C-u", "CTRL_U";
    CtrlV => "C-v", "CTRL_V";
    CtrlW => "C-w", "CTRL_W";
    CtrlX => "C-x", "CTRL_X";
    CtrlY => "C-y", "CTRL_Y";
    CtrlZ => "C-z", "CTRL_Z";
}

impl fmt::Display for Press {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Press {
    type Err = String;

    /// Accepts the wire string (`"PageUp"`) or the upper-snake name in any case (`"page_up"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        Press::ALL
            .iter()
            .copied()
            .find(|press| press.as_str() == s || press.name() == upper)
            .ok_or_else(|| format!("not a key name: {}", s))
    }
}

impl From<Press> for String {
    fn from(press: Press) -> Self {
        press.as_str().to_string()
    }
}

/// Map user input to what goes on the wire: a key name if it is one, else the text itself.
pub fn key_to_wire(input: &str) -> String {
    input
        .parse::<Press>()
        .map(String::from)
        .unwrap_or_else(|_| input.to_string())
}
