//! # Command Dispatch
//!
//! Translate a parsed RESP command (array of bulk strings) into `KVEngine`
//! calls and encode the result as a reply frame.
//!
//! ## Supported Commands
//! - `PING [message]`, `ECHO message`
//! - `SET key value [EX seconds | PX millis] [NX | XX]`, `GET key`
//! - `DEL key...`, `EXISTS key...`
//! - `TTL key`, `PTTL key`, `EXPIRE key seconds`
//! - `SCAN cursor [MATCH pattern] [COUNT n]`, `KEYS pattern`
//! - `DBSIZE`, `FLUSHDB`

use std::time::Duration;

use bytes::Bytes;
use thiserror::Error;

use ekv_common::{EkvError, Frame};

use crate::engine::{KVEngine, SetCondition, SetOptions};

/// Default number of keys visited by `SCAN` without `COUNT`.
pub const DEFAULT_SCAN_COUNT: usize = 10;

/// Failures that turn into `-ERR` replies.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("ERR unknown command '{0}'")]
    Unknown(String),
    #[error("ERR wrong number of arguments for '{0}' command")]
    WrongArity(String),
    #[error("ERR syntax error")]
    Syntax,
    #[error("ERR value is not an integer or out of range")]
    NotInteger,
    #[error("ERR invalid expire time in '{0}' command")]
    InvalidExpire(String),
    #[error("ERR invalid cursor")]
    InvalidCursor,
    #[error("ERR {0}")]
    Engine(#[from] EkvError),
}

/// Executes one command against the engine. Never fails: errors become
/// error frames.
pub fn execute<E: KVEngine + ?Sized>(engine: &E, args: &[Bytes]) -> Frame {
    match dispatch(engine, args) {
        Ok(frame) => frame,
        Err(err) => Frame::error(err.to_string()),
    }
}

fn dispatch<E: KVEngine + ?Sized>(engine: &E, args: &[Bytes]) -> Result<Frame, CommandError> {
    let Some((name, rest)) = args.split_first() else {
        return Err(CommandError::Unknown(String::new()));
    };
    let name = String::from_utf8_lossy(name).to_ascii_lowercase();

    match name.as_str() {
        "ping" => match rest {
            [] => Ok(Frame::Simple("PONG".to_string())),
            [message] => Ok(Frame::Bulk(message.clone())),
            _ => Err(CommandError::WrongArity(name)),
        },
        "echo" => match rest {
            [message] => Ok(Frame::Bulk(message.clone())),
            _ => Err(CommandError::WrongArity(name)),
        },
        "set" => set(engine, &name, rest),
        "get" => match rest {
            [key] => Ok(engine.get(key)?.map_or(Frame::Null, Frame::Bulk)),
            _ => Err(CommandError::WrongArity(name)),
        },
        "del" | "exists" => {
            if rest.is_empty() {
                return Err(CommandError::WrongArity(name));
            }
            let mut count = 0;
            for key in rest {
                let hit = if name == "del" {
                    engine.delete(key)?
                } else {
                    engine.exists(key)?
                };
                count += i64::from(hit);
            }
            Ok(Frame::Integer(count))
        }
        "ttl" => match rest {
            [key] => Ok(Frame::Integer(engine.ttl(key)?.to_secs_reply())),
            _ => Err(CommandError::WrongArity(name)),
        },
        "pttl" => match rest {
            [key] => Ok(Frame::Integer(engine.ttl(key)?.to_millis_reply())),
            _ => Err(CommandError::WrongArity(name)),
        },
        "expire" => match rest {
            [key, seconds] => {
                let seconds = parse_int(seconds)?;
                let applied = if seconds <= 0 {
                    engine.delete(key)?
                } else {
                    engine
                        .expire(key, Duration::from_secs(seconds as u64))
                        .map_err(|err| expire_failure(&name, err))?
                };
                Ok(Frame::Integer(i64::from(applied)))
            }
            _ => Err(CommandError::WrongArity(name)),
        },
        "scan" => scan(engine, &name, rest),
        "keys" => match rest {
            [pattern] => Ok(Frame::Array(
                engine.keys(pattern)?.into_iter().map(|k| Frame::Bulk(Bytes::from(k))).collect(),
            )),
            _ => Err(CommandError::WrongArity(name)),
        },
        "dbsize" => Ok(Frame::Integer(engine.len()? as i64)),
        "flushdb" => {
            engine.clear()?;
            Ok(Frame::ok())
        }
        _ => Err(CommandError::Unknown(name)),
    }
}

fn set<E: KVEngine + ?Sized>(engine: &E, name: &str, rest: &[Bytes]) -> Result<Frame, CommandError> {
    let [key, value, flags @ ..] = rest else {
        return Err(CommandError::WrongArity(name.to_string()));
    };

    let mut options = SetOptions::default();
    let mut flags = flags.iter();
    while let Some(flag) = flags.next() {
        match flag.to_ascii_uppercase().as_slice() {
            b"EX" | b"PX" if options.ttl.is_none() => {
                let amount = parse_int(flags.next().ok_or(CommandError::Syntax)?)?;
                if amount <= 0 {
                    return Err(CommandError::InvalidExpire(name.to_string()));
                }
                let amount = amount as u64;
                options.ttl = Some(if flag.eq_ignore_ascii_case(b"EX") {
                    Duration::from_secs(amount)
                } else {
                    Duration::from_millis(amount)
                });
            }
            b"NX" if options.condition == SetCondition::Always => {
                options.condition = SetCondition::IfAbsent;
            }
            b"XX" if options.condition == SetCondition::Always => {
                options.condition = SetCondition::IfPresent;
            }
            _ => return Err(CommandError::Syntax),
        }
    }

    let written = engine
        .set(key.to_vec(), value.clone(), options)
        .map_err(|err| expire_failure(name, err))?;
    if written {
        Ok(Frame::ok())
    } else {
        Ok(Frame::Null)
    }
}

/// The engine rejects unrepresentable deadlines with `InvalidArgument`.
fn expire_failure(name: &str, err: EkvError) -> CommandError {
    match err {
        EkvError::InvalidArgument(_) => CommandError::InvalidExpire(name.to_string()),
        other => CommandError::Engine(other),
    }
}

fn scan<E: KVEngine + ?Sized>(engine: &E, name: &str, rest: &[Bytes]) -> Result<Frame, CommandError> {
    let [cursor, options @ ..] = rest else {
        return Err(CommandError::WrongArity(name.to_string()));
    };
    let cursor = std::str::from_utf8(cursor)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or(CommandError::InvalidCursor)?;

    let mut pattern: Option<&[u8]> = None;
    let mut count = DEFAULT_SCAN_COUNT;
    let mut options = options.iter();
    while let Some(option) = options.next() {
        let value = options.next().ok_or(CommandError::Syntax)?;
        match option.to_ascii_uppercase().as_slice() {
            b"MATCH" => pattern = Some(&value[..]),
            b"COUNT" => {
                let n = parse_int(value)?;
                if n < 1 {
                    return Err(CommandError::Syntax);
                }
                count = n as usize;
            }
            _ => return Err(CommandError::Syntax),
        }
    }

    let page = engine.scan(cursor, pattern, count)?;
    Ok(Frame::Array(vec![
        Frame::bulk(page.next_cursor.to_string()),
        Frame::Array(page.keys.into_iter().map(|k| Frame::Bulk(Bytes::from(k))).collect()),
    ]))
}

fn parse_int(arg: &[u8]) -> Result<i64, CommandError> {
    std::str::from_utf8(arg)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or(CommandError::NotInteger)
}
