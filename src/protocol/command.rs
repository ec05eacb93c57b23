use crate::protocol::resp::Reply;
use crate::storage::Store;
use bytes::Bytes;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// A command handler: takes the arguments after the command name and the
/// store, produces exactly one reply. Handlers validate their own arity.
type Handler = fn(&[Vec<u8>], &mut Store) -> Reply;

/// Handler table, built once and read-only afterwards. Names are
/// registered uppercase and matched exactly; no case folding happens at
/// dispatch.
static COMMANDS: Lazy<HashMap<&'static str, Handler>> = Lazy::new(|| {
    let mut table: HashMap<&'static str, Handler> = HashMap::new();
    table.insert("SET", set);
    table.insert("GET", get);
    table.insert("DEL", del);
    table.insert("EXISTS", exists);
    table.insert("PING", ping);
    table.insert("HELLO", hello);
    table
});

/// Resolve and run a parsed command against the store.
///
/// Resolution failures (empty command, unknown name) and handler
/// failures alike come back as error replies, never as faults; the
/// caller always gets exactly one reply per command.
pub fn dispatch(command: &[Vec<u8>], store: &mut Store) -> Reply {
    let Some(name) = command.first() else {
        return Reply::Error("Empty command".to_string());
    };

    let handler = std::str::from_utf8(name)
        .ok()
        .and_then(|name| COMMANDS.get(name));

    match handler {
        Some(handler) => handler(&command[1..], store),
        None => Reply::Error(format!(
            "Unknown command: {}",
            String::from_utf8_lossy(name)
        )),
    }
}

fn set(args: &[Vec<u8>], store: &mut Store) -> Reply {
    let [key, value] = args else {
        return Reply::Error("Invalid command arguments".to_string());
    };
    store.set(key.clone(), Bytes::copy_from_slice(value));
    Reply::Simple("OK".to_string())
}

fn get(args: &[Vec<u8>], store: &mut Store) -> Reply {
    let [key] = args else {
        return Reply::Error("Invalid command arguments".to_string());
    };
    match store.get(key) {
        Ok(Some(value)) => Reply::Bulk(value),
        Ok(None) => Reply::NullBulk,
        Err(e) => Reply::Error(e.to_string()),
    }
}

fn del(args: &[Vec<u8>], store: &mut Store) -> Reply {
    if args.is_empty() {
        return Reply::Error("Empty command arguments".to_string());
    }
    // A duplicate key only counts once: the second removal finds it gone.
    let removed = args.iter().filter(|key| store.del(key)).count();
    Reply::Integer(removed as i64)
}

fn exists(args: &[Vec<u8>], store: &mut Store) -> Reply {
    if args.is_empty() {
        return Reply::Error("Empty command arguments".to_string());
    }
    // Duplicates each count, matching Redis EXISTS semantics.
    let found = args.iter().filter(|key| store.exists(key)).count();
    Reply::Integer(found as i64)
}

fn ping(args: &[Vec<u8>], _store: &mut Store) -> Reply {
    match args {
        [] => Reply::Simple("PONG".to_string()),
        [message] => Reply::Bulk(Bytes::copy_from_slice(message)),
        _ => Reply::Error("Invalid command arguments".to_string()),
    }
}

fn hello(args: &[Vec<u8>], _store: &mut Store) -> Reply {
    match args {
        [] => identity(),
        [protover] if protover.as_slice() == b"2" => identity(),
        [_] => Reply::Error("NOPROTO unsupported protocol version".to_string()),
        _ => Reply::Error("Invalid command arguments".to_string()),
    }
}

fn identity() -> Reply {
    Reply::Array(vec![
        Bytes::from_static(b"server"),
        Bytes::from_static(b"cinder"),
        Bytes::from_static(b"proto"),
        Bytes::from_static(b"2"),
        Bytes::from_static(b"version"),
        Bytes::from_static(env!("CARGO_PKG_VERSION").as_bytes()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Value;
    use std::collections::VecDeque;

    fn cmd(parts: &[&[u8]]) -> Vec<Vec<u8>> {
        parts.iter().map(|p| p.to_vec()).collect()
    }

    #[test]
    fn empty_command_is_an_error() {
        let mut store = Store::new();
        assert_eq!(
            dispatch(&[], &mut store),
            Reply::Error("Empty command".to_string())
        );
    }

    #[test]
    fn unknown_command_names_the_offender() {
        let mut store = Store::new();
        assert_eq!(
            dispatch(&cmd(&[b"FLUSH"]), &mut store),
            Reply::Error("Unknown command: FLUSH".to_string())
        );
    }

    #[test]
    fn command_names_are_case_sensitive() {
        let mut store = Store::new();
        assert_eq!(
            dispatch(&cmd(&[b"ping"]), &mut store),
            Reply::Error("Unknown command: ping".to_string())
        );
    }

    #[test]
    fn set_then_get_returns_the_value() {
        let mut store = Store::new();
        assert_eq!(
            dispatch(&cmd(&[b"SET", b"foo", b"bar"]), &mut store),
            Reply::Simple("OK".to_string())
        );
        assert_eq!(
            dispatch(&cmd(&[b"GET", b"foo"]), &mut store),
            Reply::Bulk(Bytes::from_static(b"bar"))
        );
    }

    #[test]
    fn set_accepts_empty_and_binary_values() {
        let mut store = Store::new();
        dispatch(&cmd(&[b"SET", b"empty", b""]), &mut store);
        assert_eq!(
            dispatch(&cmd(&[b"GET", b"empty"]), &mut store),
            Reply::Bulk(Bytes::new())
        );

        dispatch(&cmd(&[b"SET", b"bin", b"\x00\xff\r\n"]), &mut store);
        assert_eq!(
            dispatch(&cmd(&[b"GET", b"bin"]), &mut store),
            Reply::Bulk(Bytes::from_static(b"\x00\xff\r\n"))
        );
    }

    #[test]
    fn set_arity_is_exactly_two() {
        let mut store = Store::new();
        let err = Reply::Error("Invalid command arguments".to_string());
        assert_eq!(dispatch(&cmd(&[b"SET", b"k"]), &mut store), err);
        assert_eq!(dispatch(&cmd(&[b"SET", b"k", b"v", b"x"]), &mut store), err);
        assert!(!store.exists(b"k"));
    }

    #[test]
    fn get_missing_key_is_null_bulk() {
        let mut store = Store::new();
        assert_eq!(dispatch(&cmd(&[b"GET", b"nope"]), &mut store), Reply::NullBulk);
        // Read-only ops are idempotent.
        assert_eq!(dispatch(&cmd(&[b"GET", b"nope"]), &mut store), Reply::NullBulk);
    }

    #[test]
    fn get_wrong_kind_is_a_type_error() {
        let mut store = Store::new();
        store.insert(&b"queue"[..], Value::List(VecDeque::new()));
        let reply = dispatch(&cmd(&[b"GET", b"queue"]), &mut store);
        match reply {
            Reply::Error(message) => assert!(message.starts_with("WRONGTYPE")),
            other => panic!("expected error reply, got {other:?}"),
        }
    }

    #[test]
    fn del_counts_removed_keys_once_each() {
        let mut store = Store::new();
        dispatch(&cmd(&[b"SET", b"a", b"1"]), &mut store);
        dispatch(&cmd(&[b"SET", b"b", b"2"]), &mut store);

        assert_eq!(
            dispatch(&cmd(&[b"DEL", b"a", b"a", b"b", b"missing"]), &mut store),
            Reply::Integer(2)
        );
        assert_eq!(dispatch(&cmd(&[b"DEL", b"a"]), &mut store), Reply::Integer(0));
        assert_eq!(
            dispatch(&cmd(&[b"DEL"]), &mut store),
            Reply::Error("Empty command arguments".to_string())
        );
    }

    #[test]
    fn exists_counts_duplicates() {
        let mut store = Store::new();
        dispatch(&cmd(&[b"SET", b"k", b"v"]), &mut store);

        assert_eq!(
            dispatch(&cmd(&[b"EXISTS", b"k", b"k"]), &mut store),
            Reply::Integer(2)
        );
        assert_eq!(
            dispatch(&cmd(&[b"EXISTS", b"k", b"missing"]), &mut store),
            Reply::Integer(1)
        );
        assert_eq!(
            dispatch(&cmd(&[b"EXISTS", b"missing", b"k"]), &mut store),
            Reply::Integer(1)
        );
        assert_eq!(
            dispatch(&cmd(&[b"EXISTS"]), &mut store),
            Reply::Error("Empty command arguments".to_string())
        );
    }

    #[test]
    fn ping_with_and_without_message() {
        let mut store = Store::new();
        assert_eq!(
            dispatch(&cmd(&[b"PING"]), &mut store),
            Reply::Simple("PONG".to_string())
        );
        assert_eq!(
            dispatch(&cmd(&[b"PING", b"hello"]), &mut store),
            Reply::Bulk(Bytes::from_static(b"hello"))
        );
        assert_eq!(
            dispatch(&cmd(&[b"PING", b"a", b"b"]), &mut store),
            Reply::Error("Invalid command arguments".to_string())
        );
    }

    #[test]
    fn hello_reports_identity_for_proto_two() {
        let mut store = Store::new();
        let expected = Reply::Array(vec![
            Bytes::from_static(b"server"),
            Bytes::from_static(b"cinder"),
            Bytes::from_static(b"proto"),
            Bytes::from_static(b"2"),
            Bytes::from_static(b"version"),
            Bytes::from_static(env!("CARGO_PKG_VERSION").as_bytes()),
        ]);
        assert_eq!(dispatch(&cmd(&[b"HELLO"]), &mut store), expected);
        assert_eq!(dispatch(&cmd(&[b"HELLO", b"2"]), &mut store), expected);
    }

    #[test]
    fn hello_rejects_other_protocol_versions() {
        let mut store = Store::new();
        let reply = dispatch(&cmd(&[b"HELLO", b"3"]), &mut store);
        match reply {
            Reply::Error(message) => assert!(message.starts_with("NOPROTO")),
            other => panic!("expected error reply, got {other:?}"),
        }
    }
}
