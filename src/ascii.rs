//! ASCII conventions for text-driven programs.
//!
//! Many programs talk in ASCII: each input value is one character code and a
//! command ends with a newline (10). Output mixes character codes with the
//! occasional out-of-range value, typically a final answer or score.

/// Highest value treated as a character.
pub const ASCII_MAX: i64 = 127;

/// Encode one command line, appending the newline.
pub fn encode_line(line: &str) -> Vec<i64> {
    line.bytes()
        .map(i64::from)
        .chain(std::iter::once(i64::from(b'\n')))
        .collect()
}

/// Encode a script: one command per non-blank line.
pub fn encode_script(script: &str) -> Vec<i64> {
    script
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .flat_map(encode_line)
        .collect()
}

/// Program output split into text and non-character values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AsciiOutput {
    /// Every in-range value, as text.
    pub text: String,
    /// Values outside `0..=127`, in output order.
    pub values: Vec<i64>,
}

impl AsciiOutput {
    /// Lines of text, skipping blank ones.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.text.lines().filter(|line| !line.is_empty())
    }
}

/// Split raw output into text and out-of-range values.
pub fn decode(output: &[i64]) -> AsciiOutput {
    let mut decoded = AsciiOutput::default();
    for &value in output {
        match u8::try_from(value) {
            Ok(byte) if i64::from(byte) <= ASCII_MAX => decoded.text.push(char::from(byte)),
            _ => decoded.values.push(value),
        }
    }
    decoded
}
