//! [`KeyPress`] command: sends the byte sequence a terminal produces for one key.
//!
//! Script syntax: `key Enter`, `key Ctrl+C`, `key Alt+b`, `key Shift+Tab`, `key Up`

use crate::command::{Context, ScriptCommand};
use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;

/// Sends a single key press, optionally with `Ctrl+`, `Alt+` and `Shift+`
/// modifiers (in any order, case-insensitive).
pub struct KeyPress {
    pub key: String,
    pub data: Vec<u8>,
}

impl KeyPress {
    pub const NAME: &'static str = "key";
}

/// Bytes for a named key without modifiers.
fn named_key(name: &str) -> Option<&'static [u8]> {
    let bytes: &'static [u8] = match name.to_ascii_lowercase().as_str() {
        "enter" | "return" => b"\r",
        "tab" => b"\t",
        "space" => b" ",
        "backspace" => b"\x7f",
        "esc" | "escape" => b"\x1b",
        "up" => b"\x1b[A",
        "down" => b"\x1b[B",
        "right" => b"\x1b[C",
        "left" => b"\x1b[D",
        "home" => b"\x1b[H",
        "end" => b"\x1b[F",
        "delete" | "del" => b"\x1b[3~",
        "pageup" => b"\x1b[5~",
        "pagedown" => b"\x1b[6~",
        _ => return None,
    };
    Some(bytes)
}

fn encode(spec: &str) -> Result<Vec<u8>> {
    let mut ctrl = false;
    let mut alt = false;
    let mut shift = false;

    // `Alt++` names the plus key itself.
    let (modifiers, key) = if spec == "+" {
        ("", "+")
    } else if let Some(prefix) = spec.strip_suffix("++") {
        (prefix, "+")
    } else {
        spec.rsplit_once('+').unwrap_or(("", spec))
    };
    if key.is_empty() {
        bail!("Missing key name");
    }
    if !modifiers.is_empty() {
        for modifier in modifiers.split('+') {
            match modifier.to_ascii_lowercase().as_str() {
                "ctrl" | "control" => ctrl = true,
                "alt" | "meta" => alt = true,
                "shift" => shift = true,
                other => bail!("Unknown modifier: {other}"),
            }
        }
    }

    let mut data = if shift && key.eq_ignore_ascii_case("tab") {
        b"\x1b[Z".to_vec()
    } else if let Some(bytes) = named_key(key) {
        bytes.to_vec()
    } else {
        let mut chars = key.chars();
        let (Some(ch), None) = (chars.next(), chars.next()) else {
            bail!("Unknown key: {key}");
        };
        let ch = if shift { ch.to_ascii_uppercase() } else { ch };
        if ctrl {
            let byte = control_byte(ch).ok_or_else(|| anyhow!("No control code for Ctrl+{ch}"))?;
            vec![byte]
        } else {
            ch.to_string().into_bytes()
        }
    };

    if alt {
        data.insert(0, 0x1b);
    }
    Ok(data)
}

/// The C0 control code for `Ctrl+ch`.
fn control_byte(ch: char) -> Option<u8> {
    match ch {
        'a'..='z' => Some(ch as u8 - b'a' + 1),
        '@' | ' ' => Some(0),
        'A'..='Z' | '[' | '\\' | ']' | '^' | '_' => Some(ch as u8 & 0x1f),
        '?' => Some(0x7f),
        _ => None,
    }
}

#[async_trait(?Send)]
impl ScriptCommand for KeyPress {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(args: &str) -> Result<Self> {
        let key = args.trim();
        if key.is_empty() {
            bail!("Expected a key name after 'key'");
        }
        Ok(Self {
            key: key.to_string(),
            data: encode(key)?,
        })
    }

    async fn execute(&self, ctx: &mut Context) -> Result<()> {
        ctx.write_to_pty(&self.data).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::ScriptCommand;

    fn bytes(spec: &str) -> Vec<u8> {
        KeyPress::parse(spec).unwrap().data
    }

    #[test]
    fn test_named_keys() {
        assert_eq!(bytes("Enter"), b"\r");
        assert_eq!(bytes("tab"), b"\t");
        assert_eq!(bytes("Up"), b"\x1b[A");
        assert_eq!(bytes("Escape"), b"\x1b");
    }

    #[test]
    fn test_ctrl_letters() {
        assert_eq!(bytes("Ctrl+C"), b"\x03");
        assert_eq!(bytes("ctrl+d"), b"\x04");
        assert_eq!(bytes("Ctrl+["), b"\x1b");
    }

    #[test]
    fn test_alt_and_shift() {
        assert_eq!(bytes("Alt+b"), b"\x1bb");
        assert_eq!(bytes("Shift+a"), b"A");
        assert_eq!(bytes("Shift+Tab"), b"\x1b[Z");
        assert_eq!(bytes("Alt+Enter"), b"\x1b\r");
    }

    #[test]
    fn test_plus_key() {
        assert_eq!(bytes("+"), b"+");
        assert_eq!(bytes("Alt++"), b"\x1b+");
    }

    #[test]
    fn test_invalid_keys() {
        assert!(KeyPress::parse("").is_err());
        assert!(KeyPress::parse("Hyper+x").is_err());
        assert!(KeyPress::parse("NotAKey").is_err());
        assert!(KeyPress::parse("Ctrl+1").is_err());
    }
}
