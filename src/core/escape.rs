//! Escape sequence codec for local-line mode
//!
//! Converts a line of typed text into the exact bytes to transmit.
//!
//! | Sequence | Byte |
//! |----------|------|
//! | `\n` | 0x0A |
//! | `\r` | 0x0D |
//! | `\t` | 0x09 |
//! | `\b` | 0x08 |
//! | `\f` | 0x0C |
//! | `\\` | 0x5C |
//! | `\xHH` | HH (hex) |
//! | `\oOOO` | OOO (octal) |
//!
//! A malformed escape rejects the whole line; nothing is ever partially encoded.

use thiserror::Error;

/// Byte appended after every encoded line before it is transmitted
pub const LINE_TERMINATOR: u8 = 0x0D;

/// Errors produced while encoding a line. Columns are 1-based character positions
/// of the offending backslash.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EscapeSyntaxError {
    #[error("trailing backslash at column {column}")]
    TrailingBackslash { column: usize },

    #[error("unknown escape sequence '\\{found}' at column {column}")]
    UnknownEscape { column: usize, found: char },

    #[error("invalid base-{radix} digits '{digits}' at column {column}")]
    InvalidDigits {
        column: usize,
        radix: u32,
        digits: String,
    },

    #[error("octal value '{digits}' at column {column} does not fit in a byte")]
    OutOfRange { column: usize, digits: String },
}

/// The bytes produced from one line of typed text
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EncodedLine(Vec<u8>);

impl EncodedLine {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consume the line, appending the line terminator
    pub fn into_terminated(mut self) -> Vec<u8> {
        self.0.push(LINE_TERMINATOR);
        self.0
    }
}

/// Encode a line of text into bytes, resolving escape sequences.
///
/// Characters outside of escapes are emitted as their UTF-8 bytes, which for
/// ASCII is the character's own value. The terminator is not appended here.
pub fn encode(text: &str) -> Result<EncodedLine, EscapeSyntaxError> {
    let chars: Vec<char> = text.chars().collect();
    let mut out = Vec::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        if ch != '\\' {
            let mut buf = [0u8; 4];
            out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            i += 1;
            continue;
        }

        let column = i + 1;
        let Some(&next) = chars.get(i + 1) else {
            return Err(EscapeSyntaxError::TrailingBackslash { column });
        };
        let remaining = chars.len() - i;

        match next {
            'n' => out.push(0x0A),
            'r' => out.push(0x0D),
            't' => out.push(0x09),
            'b' => out.push(0x08),
            'f' => out.push(0x0C),
            '\\' => out.push(0x5C),
            'x' if remaining >= 4 => {
                out.push(parse_digits(&chars[i + 2..i + 4], 16, column)?);
                i += 2;
            }
            'o' if remaining >= 5 => {
                out.push(parse_digits(&chars[i + 2..i + 5], 8, column)?);
                i += 3;
            }
            found => return Err(EscapeSyntaxError::UnknownEscape { column, found }),
        }
        i += 2;
    }

    Ok(EncodedLine(out))
}

fn parse_digits(digits: &[char], radix: u32, column: usize) -> Result<u8, EscapeSyntaxError> {
    let text: String = digits.iter().collect();

    // from_str_radix accepts a leading '+', so check every digit explicitly
    if !digits.iter().all(|c| c.is_digit(radix)) {
        return Err(EscapeSyntaxError::InvalidDigits {
            column,
            radix,
            digits: text,
        });
    }

    let value = u16::from_str_radix(&text, radix).map_err(|_| EscapeSyntaxError::InvalidDigits {
        column,
        radix,
        digits: text.clone(),
    })?;

    u8::try_from(value).map_err(|_| EscapeSyntaxError::OutOfRange { column, digits: text })
}

/// Render a byte in the escape syntax accepted by [`encode`]
pub fn escape_byte(byte: u8) -> String {
    match byte {
        0x0A => "\\n".to_string(),
        0x0D => "\\r".to_string(),
        0x09 => "\\t".to_string(),
        0x08 => "\\b".to_string(),
        0x0C => "\\f".to_string(),
        0x5C => "\\\\".to_string(),
        b => format!("\\x{:02x}", b),
    }
}
