//! ANSI escape sequences to HTML.
//!
//! Only SGR (`ESC [ ... m`) affects the output. Other CSI sequences are
//! dropped, OSC strings are skipped up to their terminator, and text is
//! HTML-escaped. Each run of identically styled text becomes one `<span>`.

use std::fmt::Write as _;

const BASIC_COLORS: [&str; 8] = [
    "#000000", "#cd0000", "#00cd00", "#cdcd00", "#0000ee", "#cd00cd", "#00cdcd", "#e5e5e5",
];

const BRIGHT_COLORS: [&str; 8] = [
    "#7f7f7f", "#ff0000", "#00ff00", "#ffff00", "#5c5cff", "#ff00ff", "#00ffff", "#ffffff",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    Indexed(u8),
    Rgb(u8, u8, u8),
}

impl Color {
    fn css(self) -> String {
        match self {
            Color::Indexed(n) if n < 8 => BASIC_COLORS[n as usize].to_string(),
            Color::Indexed(n) if n < 16 => BRIGHT_COLORS[(n - 8) as usize].to_string(),
            Color::Indexed(n) if n < 232 => {
                // 6x6x6 colour cube
                let n = n - 16;
                let level = |v: u8| if v == 0 { 0 } else { 55 + v * 40 };
                format!(
                    "#{:02x}{:02x}{:02x}",
                    level(n / 36),
                    level((n / 6) % 6),
                    level(n % 6)
                )
            }
            Color::Indexed(n) => {
                let gray = 8 + (n - 232) * 10;
                format!("#{:02x}{:02x}{:02x}", gray, gray, gray)
            }
            Color::Rgb(r, g, b) => format!("#{:02x}{:02x}{:02x}", r, g, b),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Style {
    bold: bool,
    italic: bool,
    underline: bool,
    inverse: bool,
    fg: Option<Color>,
    bg: Option<Color>,
}

impl Style {
    fn is_plain(&self) -> bool {
        *self == Style::default()
    }

    fn css(&self) -> String {
        let (fg, bg) = if self.inverse {
            (
                Some(self.bg.map_or_else(|| "#000000".to_string(), Color::css)),
                Some(self.fg.map_or_else(|| "#e5e5e5".to_string(), Color::css)),
            )
        } else {
            (self.fg.map(Color::css), self.bg.map(Color::css))
        };

        let mut css = String::new();
        if let Some(fg) = fg {
            let _ = write!(css, "color:{};", fg);
        }
        if let Some(bg) = bg {
            let _ = write!(css, "background-color:{};", bg);
        }
        if self.bold {
            css.push_str("font-weight:bold;");
        }
        if self.italic {
            css.push_str("font-style:italic;");
        }
        if self.underline {
            css.push_str("text-decoration:underline;");
        }
        css
    }

    fn apply_sgr(&mut self, params: &[u16]) {
        if params.is_empty() {
            *self = Style::default();
            return;
        }
        let mut i = 0;
        while i < params.len() {
            match params[i] {
                0 => *self = Style::default(),
                1 => self.bold = true,
                3 => self.italic = true,
                4 => self.underline = true,
                7 => self.inverse = true,
                22 => self.bold = false,
                23 => self.italic = false,
                24 => self.underline = false,
                27 => self.inverse = false,
                n @ 30..=37 => self.fg = Some(Color::Indexed((n - 30) as u8)),
                39 => self.fg = None,
                n @ 40..=47 => self.bg = Some(Color::Indexed((n - 40) as u8)),
                49 => self.bg = None,
                n @ 90..=97 => self.fg = Some(Color::Indexed((n - 90 + 8) as u8)),
                n @ 100..=107 => self.bg = Some(Color::Indexed((n - 100 + 8) as u8)),
                n @ (38 | 48) => {
                    let (color, consumed) = extended_color(&params[i + 1..]);
                    if let Some(color) = color {
                        if n == 38 {
                            self.fg = Some(color);
                        } else {
                            self.bg = Some(color);
                        }
                    }
                    i += consumed;
                }
                _ => {}
            }
            i += 1;
        }
    }
}

/// Parse the tail of a `38;...` or `48;...` sequence.
/// Returns the colour and how many parameters it used.
fn extended_color(rest: &[u16]) -> (Option<Color>, usize) {
    match rest {
        [5, n, ..] => (u8::try_from(*n).ok().map(Color::Indexed), 2),
        [2, r, g, b, ..] => {
            let channel = |v: u16| u8::try_from(v).unwrap_or(u8::MAX);
            (Some(Color::Rgb(channel(*r), channel(*g), channel(*b))), 4)
        }
        [5, ..] => (None, rest.len()),
        [2, ..] => (None, rest.len()),
        _ => (None, 0),
    }
}

fn push_escaped(out: &mut String, c: char) {
    match c {
        '&' => out.push_str("&amp;"),
        '<' => out.push_str("&lt;"),
        '>' => out.push_str("&gt;"),
        '"' => out.push_str("&quot;"),
        '\'' => out.push_str("&#39;"),
        _ => out.push(c),
    }
}

struct HtmlWriter {
    out: String,
    run: String,
    style: Style,
}

impl HtmlWriter {
    fn flush(&mut self) {
        if self.run.is_empty() {
            return;
        }
        if self.style.is_plain() {
            self.out.push_str(&self.run);
        } else {
            let _ = write!(
                self.out,
                "<span style=\"{}\">{}</span>",
                self.style.css(),
                self.run
            );
        }
        self.run.clear();
    }

    fn set_style(&mut self, style: Style) {
        if style != self.style {
            self.flush();
            self.style = style;
        }
    }
}

/// Render a raw terminal byte stream (as text) to HTML.
pub fn ansi_to_html(raw: &str) -> String {
    let mut writer = HtmlWriter {
        out: String::with_capacity(raw.len()),
        run: String::new(),
        style: Style::default(),
    };
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\x1b' => match chars.next() {
                Some('[') => {
                    let mut body = String::new();
                    let mut final_byte = None;
                    for c in chars.by_ref() {
                        if ('\x40'..='\x7e').contains(&c) {
                            final_byte = Some(c);
                            break;
                        }
                        body.push(c);
                    }
                    if final_byte == Some('m') {
                        let params: Vec<u16> = body
                            .split([';', ':'])
                            .filter(|p| !p.is_empty())
                            .filter_map(|p| p.parse().ok())
                            .collect();
                        let mut style = writer.style;
                        style.apply_sgr(&params);
                        writer.set_style(style);
                    }
                }
                Some(']') => {
                    // OSC, terminated by BEL or ESC \
                    while let Some(c) = chars.next() {
                        if c == '\x07' {
                            break;
                        }
                        if c == '\x1b' && chars.peek() == Some(&'\\') {
                            chars.next();
                            break;
                        }
                    }
                }
                // Charset designation carries one more byte
                Some('(' | ')' | '*' | '+') => {
                    chars.next();
                }
                Some(_) | None => {}
            },
            '\r' | '\x07' | '\x08' => {}
            '\n' | '\t' => writer.run.push(c),
            c if c.is_control() => {}
            c => push_escaped(&mut writer.run, c),
        }
    }
    writer.flush();
    writer.out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_escaped() {
        assert_eq!(ansi_to_html("a < b && c\r\n"), "a &lt; b &amp;&amp; c\n");
    }

    #[test]
    fn test_sgr_colors_and_reset() {
        let html = ansi_to_html("\x1b[1;31mERR\x1b[0m ok");
        assert_eq!(
            html,
            "<span style=\"color:#cd0000;font-weight:bold;\">ERR</span> ok"
        );
    }

    #[test]
    fn test_extended_colors() {
        let html = ansi_to_html("\x1b[38;5;196mx\x1b[48;2;1;2;3my");
        assert_eq!(
            html,
            "<span style=\"color:#ff0000;\">x</span>\
             <span style=\"color:#ff0000;background-color:#010203;\">y</span>"
        );
    }

    #[test]
    fn test_non_sgr_sequences_are_dropped() {
        let html = ansi_to_html("\x1b[2J\x1b[H\x1b]0;title\x07\x1b(Bhello\x1b[?25l");
        assert_eq!(html, "hello");
    }

    #[test]
    fn test_inverse_swaps_default_colors() {
        let html = ansi_to_html("\x1b[7mcursor\x1b[27m");
        assert_eq!(
            html,
            "<span style=\"color:#000000;background-color:#e5e5e5;\">cursor</span>"
        );
    }

    #[test]
    fn test_grayscale_ramp() {
        assert_eq!(Color::Indexed(232).css(), "#080808");
        assert_eq!(Color::Indexed(16).css(), "#000000");
        assert_eq!(Color::Indexed(231).css(), "#ffffff");
    }
}
