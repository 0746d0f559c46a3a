//! ANSI escape stripping for remote command output.

use vte::{Params, Parser, Perform};

/// Removes terminal control sequences from command output.
pub struct OutputSanitizer;

impl OutputSanitizer {
    /// Strip ANSI escape codes from raw bytes.
    ///
    /// Printable text, newlines and tabs survive; every other control byte
    /// and every CSI, OSC, DCS or ESC sequence is dropped.
    pub fn strip_ansi(input: &[u8]) -> String {
        let mut text = PlainText::default();
        let mut parser = Parser::new();
        parser.advance(&mut text, input);
        text.into_string()
    }

    /// Strip ANSI codes from a string.
    pub fn strip_ansi_str(input: &str) -> String {
        Self::strip_ansi(input.as_bytes())
    }
}

/// VTE performer collecting printable text only.
#[derive(Default)]
struct PlainText {
    output: String,
}

impl PlainText {
    fn into_string(self) -> String {
        self.output
    }
}

impl Perform for PlainText {
    fn print(&mut self, c: char) {
        self.output.push(c);
    }

    fn execute(&mut self, byte: u8) {
        if matches!(byte, b'\n' | b'\t') {
            self.output.push(byte as char);
        }
    }

    fn hook(&mut self, _params: &Params, _intermediates: &[u8], _ignore: bool, _action: char) {}

    fn put(&mut self, _byte: u8) {}

    fn unhook(&mut self) {}

    fn osc_dispatch(&mut self, _params: &[&[u8]], _bell_terminated: bool) {}

    fn csi_dispatch(
        &mut self,
        _params: &Params,
        _intermediates: &[u8],
        _ignore: bool,
        _action: char,
    ) {
    }

    fn esc_dispatch(&mut self, _intermediates: &[u8], _ignore: bool, _byte: u8) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_unchanged() {
        let output = OutputSanitizer::strip_ansi(b"uid=2000(shell) gid=2000(shell)\n");
        assert_eq!(output, "uid=2000(shell) gid=2000(shell)\n");
    }

    #[test]
    fn test_strip_toybox_ls_colors() {
        let input = b"\x1b[1;34macct\x1b[0m  \x1b[1;36mbin\x1b[0m  init\n";
        let output = OutputSanitizer::strip_ansi(input);
        assert_eq!(output, "acct  bin  init\n");
    }

    #[test]
    fn test_preserve_tabs_and_newlines() {
        let input = b"PID\tNAME\n1\tinit\n";
        assert_eq!(OutputSanitizer::strip_ansi(input), "PID\tNAME\n1\tinit\n");
    }

    #[test]
    fn test_drop_other_controls() {
        // Bell and backspace
        let input = b"a\x07b\x08c";
        assert_eq!(OutputSanitizer::strip_ansi(input), "abc");
    }

    #[test]
    fn test_strip_osc_title() {
        let input = b"\x1b]0;root@device\x07ready";
        assert_eq!(OutputSanitizer::strip_ansi(input), "ready");
    }

    #[test]
    fn test_utf8_survives() {
        let output = OutputSanitizer::strip_ansi_str("\x1b[32mgrün\x1b[0m ✓");
        assert_eq!(output, "grün ✓");
    }

    #[test]
    fn test_only_escape_codes() {
        let output = OutputSanitizer::strip_ansi(b"\x1b[31m\x1b[0m\x1b[2J");
        assert_eq!(output, "");
    }
}
