//! Line protocol for the `uservars` shell.
//!
//! One command per line, tokens separated by whitespace:
//!
//! ```text
//! set <key> <value>
//! get <key>
//! del <key>
//! len | keys | quit
//! ```
//!
//! The bare token `NULL` is the absent marker. Inside a token, `\xNN`
//! writes the byte `0xNN`, `\0` a zero byte, `\s` a space and `\\` a
//! backslash; `\e` contributes nothing and spells the empty string.

use crate::error::{Result, UserVarError};
use crate::session;
use std::io::{BufRead, Write};

/// A parsed shell command. `None` arguments are the absent marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Set {
        key: Option<Vec<u8>>,
        value: Option<Vec<u8>>,
    },
    Get {
        key: Option<Vec<u8>>,
    },
    Del {
        key: Option<Vec<u8>>,
    },
    Len,
    Keys,
    Quit,
}

pub const NULL_TOKEN: &str = "NULL";

/// Decode one token into bytes, or `None` for the absent marker.
pub fn decode_token(token: &str) -> Result<Option<Vec<u8>>> {
    if token == NULL_TOKEN {
        return Ok(None);
    }
    let mut out = Vec::with_capacity(token.len());
    let mut bytes = token.bytes();
    while let Some(b) = bytes.next() {
        if b != b'\\' {
            out.push(b);
            continue;
        }
        match bytes.next() {
            Some(b'\\') => out.push(b'\\'),
            Some(b's') => out.push(b' '),
            Some(b'0') => out.push(0),
            Some(b'e') => {}
            Some(b'x') => {
                let hi = bytes.next().and_then(hex_digit);
                let lo = bytes.next().and_then(hex_digit);
                match (hi, lo) {
                    (Some(hi), Some(lo)) => out.push((hi << 4) | lo),
                    _ => {
                        return Err(UserVarError::Parse(format!(
                            "bad \\x escape in {token:?}"
                        )))
                    }
                }
            }
            other => {
                return Err(UserVarError::Parse(format!(
                    "unknown escape \\{} in {token:?}",
                    other.map(char::from).unwrap_or(' ')
                )))
            }
        }
    }
    Ok(Some(out))
}

fn hex_digit(b: u8) -> Option<u8> {
    (b as char).to_digit(16).map(|d| d as u8)
}

/// Render bytes so that `decode_token` reads them back unchanged.
pub fn encode_bytes(bytes: &[u8]) -> String {
    if bytes == NULL_TOKEN.as_bytes() {
        // Keep a stored "NULL" distinguishable from the absent marker.
        return "\\x4eULL".to_string();
    }
    if bytes.is_empty() {
        return "\\e".to_string();
    }
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        match b {
            b'\\' => out.push_str("\\\\"),
            b' ' => out.push_str("\\s"),
            0 => out.push_str("\\0"),
            0x21..=0x7e => out.push(b as char),
            _ => out.push_str(&format!("\\x{b:02x}")),
        }
    }
    out
}

/// Parse a line. Blank lines and `#` comments yield `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<Command>> {
    let mut tokens = line.split_whitespace();
    let Some(verb) = tokens.next() else {
        return Ok(None);
    };
    if verb.starts_with('#') {
        return Ok(None);
    }
    let args: Vec<&str> = tokens.collect();
    let arity = |n: usize| -> Result<()> {
        if args.len() == n {
            Ok(())
        } else {
            Err(UserVarError::Parse(format!(
                "{verb} expects {n} argument(s), got {}",
                args.len()
            )))
        }
    };
    let command = match verb.to_ascii_lowercase().as_str() {
        "set" => {
            arity(2)?;
            Command::Set {
                key: decode_token(args[0])?,
                value: decode_token(args[1])?,
            }
        }
        "get" => {
            arity(1)?;
            Command::Get {
                key: decode_token(args[0])?,
            }
        }
        "del" | "delete" => {
            arity(1)?;
            Command::Del {
                key: decode_token(args[0])?,
            }
        }
        "len" => {
            arity(0)?;
            Command::Len
        }
        "keys" => {
            arity(0)?;
            Command::Keys
        }
        "quit" | "exit" => {
            arity(0)?;
            Command::Quit
        }
        other => return Err(UserVarError::Parse(format!("unknown command {other:?}"))),
    };
    Ok(Some(command))
}

fn render_flag(flag: Option<bool>) -> String {
    match flag {
        Some(true) => "t".to_string(),
        Some(false) => "f".to_string(),
        None => NULL_TOKEN.to_string(),
    }
}

/// Run a command against this thread's session and render the reply.
/// `Quit` renders as an empty reply; the caller decides to stop.
pub fn execute(command: &Command) -> Result<String> {
    match command {
        Command::Set { key, value } => {
            session::setvar(key.as_deref(), value.as_deref()).map(render_flag)
        }
        Command::Get { key } => Ok(match session::getvar(key.as_deref())? {
            Some(value) => encode_bytes(&value),
            None => NULL_TOKEN.to_string(),
        }),
        Command::Del { key } => session::delvar(key.as_deref()).map(render_flag),
        Command::Len => session::with_store(|s| s.len().to_string()),
        Command::Keys => session::with_store(|s| {
            let mut keys: Vec<String> = s.keys().map(encode_bytes).collect();
            keys.sort();
            keys.join("\n")
        }),
        Command::Quit => Ok(String::new()),
    }
}

/// Drive the session from `input` until it ends or a `quit` line.
///
/// Each command gets one reply line; failures reply `ERROR: <msg>` and the
/// loop carries on. Blank and `#` lines get no reply. Only I/O errors end
/// the loop early.
pub fn run(input: impl BufRead, mut output: impl Write) -> Result<()> {
    for line in input.lines() {
        let line = line?;
        let command = match parse_line(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                writeln!(output, "ERROR: {e}")?;
                output.flush()?;
                continue;
            }
        };
        if command == Command::Quit {
            break;
        }
        match execute(&command) {
            Ok(reply) => writeln!(output, "{reply}")?,
            Err(e) => writeln!(output, "ERROR: {e}")?,
        }
        output.flush()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MissingKeyPolicy, StoreConfig};
    use std::io::Cursor;

    fn transcript(input: &str) -> String {
        let mut out = Vec::new();
        run(Cursor::new(input), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn decodes_escapes_and_null() {
        assert_eq!(decode_token("NULL").unwrap(), None);
        assert_eq!(decode_token("a\\0b").unwrap(), Some(b"a\0b".to_vec()));
        assert_eq!(decode_token("\\x41\\s\\\\").unwrap(), Some(b"A \\".to_vec()));
        assert!(decode_token("\\xZ1").is_err());
        assert!(decode_token("\\q").is_err());
    }

    #[test]
    fn encoding_reads_back() {
        for bytes in [&b""[..], b"a\0b", b"NULL", b"\xff \\x", b"plain"] {
            let token = encode_bytes(bytes);
            assert!(!token.contains(' '));
            assert_eq!(decode_token(&token).unwrap().as_deref(), Some(bytes));
        }
    }

    #[test]
    fn parses_commands() {
        assert_eq!(parse_line("   ").unwrap(), None);
        assert_eq!(parse_line("# note").unwrap(), None);
        assert_eq!(
            parse_line("SET k NULL").unwrap(),
            Some(Command::Set {
                key: Some(b"k".to_vec()),
                value: None
            })
        );
        assert_eq!(parse_line("del NULL").unwrap(), Some(Command::Del { key: None }));
        assert!(matches!(parse_line("get"), Err(UserVarError::Parse(_))));
        assert!(matches!(parse_line("frobnicate x"), Err(UserVarError::Parse(_))));
        assert!(matches!(decode_token("\\q"), Err(UserVarError::Parse(_))));
    }

    #[test]
    fn quit_takes_no_arguments() {
        assert_eq!(parse_line("quit").unwrap(), Some(Command::Quit));
        assert_eq!(parse_line("EXIT").unwrap(), Some(Command::Quit));
        let err = parse_line("quit now").unwrap_err();
        assert_eq!(err.to_string(), "parse error: quit expects 0 argument(s), got 1");
    }

    #[test]
    fn executes_against_session() {
        session::end_session();
        let run = |line: &str| execute(&parse_line(line).unwrap().unwrap()).unwrap();
        assert_eq!(run("set a 1"), "t");
        assert_eq!(run("set a\\0b 2"), "t");
        assert_eq!(run("get a"), "1");
        assert_eq!(run("get a\\0b"), "2");
        assert_eq!(run("set NULL x"), "NULL");
        assert_eq!(run("len"), "2");
        assert_eq!(run("del a"), "t");
        assert_eq!(run("del a"), "f");
        assert_eq!(run("get a"), "NULL");
        assert_eq!(run("keys"), "a\\0b");
        session::end_session();
    }

    #[test]
    fn run_replies_once_per_command_and_skips_blank_and_comment_lines() {
        session::end_session();
        let out = transcript("set a 1\n\n   \n# comment\nget a\nget b\nlen\ndel a\ndel a\n");
        assert_eq!(out, "t\n1\nNULL\n1\nt\nf\n");
        session::end_session();
    }

    #[test]
    fn run_reports_parse_errors_and_keeps_going() {
        session::end_session();
        let out = transcript("frob x\nset onlykey\nget \\xZZ\nset k v\nget k\n");
        assert_eq!(
            out,
            "ERROR: parse error: unknown command \"frob\"\n\
             ERROR: parse error: set expects 2 argument(s), got 1\n\
             ERROR: parse error: bad \\x escape in \"\\\\xZZ\"\n\
             t\n\
             v\n"
        );
        session::end_session();
    }

    #[test]
    fn run_reports_execution_errors_under_strict_delete() {
        session::end_session();
        session::configure(
            StoreConfig::builder()
                .missing_key_policy(MissingKeyPolicy::Error)
                .build(),
        )
        .unwrap();
        let out = transcript("del missing\nset k v\ndel k\ndel k\nlen\n");
        assert_eq!(out, "ERROR: key not found\nt\nt\nERROR: key not found\n0\n");
        session::end_session();
    }

    #[test]
    fn run_stops_at_quit() {
        session::end_session();
        let out = transcript("set a 1\nquit\nset b 2\nget a\n");
        assert_eq!(out, "t\n");
        assert_eq!(session::getvar(Some(b"b".as_slice())).unwrap(), None);
        assert_eq!(session::getvar(Some(b"a".as_slice())).unwrap(), Some(b"1".to_vec()));
        session::end_session();
    }

    #[test]
    fn run_rejects_quit_with_arguments_and_continues() {
        session::end_session();
        let out = transcript("quit now\nset a 1\n");
        assert_eq!(out, "ERROR: parse error: quit expects 0 argument(s), got 1\nt\n");
        session::end_session();
    }
}
