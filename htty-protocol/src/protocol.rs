/// Flag carrying the comma-separated event subscription list.
pub const SUBSCRIBE_FLAG: &str = "--subscribe";

/// Flag carrying the terminal size as `COLSxROWS`.
pub const SIZE_FLAG: &str = "--size";

/// Separator between controller flags and the user's command.
pub const COMMAND_SEPARATOR: &str = "--";

/// Every protocol message, in both directions, is one JSON object per line.
pub const LINE_TERMINATOR: char = '\n';

/// Format a terminal size the way the controller's `--size` flag expects it.
pub fn size_arg(rows: u16, cols: u16) -> String {
    format!("{}x{}", cols, rows)
}
