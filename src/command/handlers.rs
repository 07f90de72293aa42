//! Command implementations.
//!
//! Each handler validates its own arity, does its work against the
//! session's current bucket or the registry, and builds a [`RespValue`]
//! reply. `BUCKET DROP` silently skips the caller's current bucket rather
//! than erroring.

use tracing::warn;

use super::registry::{CommandRegistry, HandlerOutcome};
use super::resp::{Command, RespValue};
use super::session::Session;
use crate::server::Handler;

fn wrong_args(name: &str) -> HandlerOutcome {
    HandlerOutcome::reply(RespValue::error(format!(
        "ERR wrong number of arguments for '{name}' command"
    )))
}

fn unknown_subcommand(parent: &str, sub: &str) -> HandlerOutcome {
    HandlerOutcome::reply(RespValue::error(format!(
        "ERR unknown command '{parent} {sub}'"
    )))
}

// ---------------------------------------------------------------------------
// General
// ---------------------------------------------------------------------------

fn ping(_: &Handler, _: &mut Session, cmd: &Command) -> HandlerOutcome {
    if cmd.args.len() != 1 {
        return wrong_args("ping");
    }
    HandlerOutcome::reply(RespValue::simple("PONG"))
}

fn quit(_: &Handler, _: &mut Session, cmd: &Command) -> HandlerOutcome {
    if cmd.args.len() != 1 {
        return wrong_args("quit");
    }
    HandlerOutcome::close_after(RespValue::simple("BYE"))
}

fn info(handler: &Handler, session: &mut Session, cmd: &Command) -> HandlerOutcome {
    if cmd.args.len() != 1 {
        return wrong_args("info");
    }
    let text = format!(
        "DataBuddy {} {} ({}) client: {}",
        env!("CARGO_PKG_VERSION"),
        handler.config.resp_addr(),
        handler.local_hostname(),
        session.remote_addr(),
    );
    HandlerOutcome::reply(RespValue::bulk(text.into_bytes()))
}

// ---------------------------------------------------------------------------
// Bucket management
// ---------------------------------------------------------------------------

fn bucket(handler: &Handler, session: &mut Session, cmd: &Command) -> HandlerOutcome {
    if cmd.args.len() == 1 {
        return HandlerOutcome::reply(RespValue::simple(session.bucket_name().to_string()));
    }

    let sub = cmd.arg_str(1).to_lowercase();
    match sub.as_str() {
        "count" => bucket_count(handler, cmd),
        "list" => bucket_list(handler, cmd),
        "create" => bucket_create(handler, cmd),
        "use" => bucket_use(handler, session, cmd),
        "drop" => bucket_drop(handler, session, cmd),
        _ => unknown_subcommand("bucket", &sub),
    }
}

fn bucket_count(handler: &Handler, cmd: &Command) -> HandlerOutcome {
    if cmd.args.len() != 2 {
        return wrong_args("bucket count");
    }
    HandlerOutcome::reply(RespValue::Integer(handler.registry.count() as i64))
}

fn bucket_list(handler: &Handler, cmd: &Command) -> HandlerOutcome {
    if cmd.args.len() < 2 || cmd.args.len() > 3 {
        return wrong_args("bucket list");
    }
    let prefix = if cmd.args.len() == 3 {
        cmd.arg_str(2).to_lowercase()
    } else {
        String::new()
    };
    HandlerOutcome::reply(RespValue::string_array(handler.registry.list(&prefix)))
}

fn bucket_create(handler: &Handler, cmd: &Command) -> HandlerOutcome {
    if cmd.args.len() != 3 {
        return wrong_args("bucket create");
    }
    let name = cmd.arg_str(2);
    match handler.registry.create(&name) {
        Ok(()) => HandlerOutcome::reply(RespValue::simple("OK")),
        Err(e) => HandlerOutcome::reply(RespValue::error(format!(
            "ERR creating bucket '{name}': {e}"
        ))),
    }
}

fn bucket_use(handler: &Handler, session: &mut Session, cmd: &Command) -> HandlerOutcome {
    if cmd.args.len() != 3 {
        return wrong_args("bucket use");
    }
    let name = cmd.arg_str(2);
    if name == session.bucket_name() {
        return HandlerOutcome::reply(RespValue::simple("OK bucket already used"));
    }

    match handler.registry.get(&name) {
        Ok(_) => {
            session.set_bucket_name(name);
            HandlerOutcome::reply(RespValue::simple("OK"))
        }
        Err(e) => HandlerOutcome::reply(RespValue::error(format!(
            "ERR opening bucket '{name}': {e}"
        ))),
    }
}

fn bucket_drop(handler: &Handler, session: &mut Session, cmd: &Command) -> HandlerOutcome {
    if cmd.args.len() < 3 {
        return wrong_args("bucket drop");
    }
    let mut dropped = 0i64;
    for i in 2..cmd.args.len() {
        let name = cmd.arg_str(i);
        if name == session.bucket_name() {
            warn!(bucket = name, "skipping drop of caller's current bucket");
            continue;
        }
        match handler.registry.drop_bucket(&name) {
            Ok(()) => dropped += 1,
            Err(e) => warn!(bucket = name, error = %e, "dropping bucket"),
        }
    }
    HandlerOutcome::reply(RespValue::Integer(dropped))
}

// ---------------------------------------------------------------------------
// Key-value
// ---------------------------------------------------------------------------

fn keys(handler: &Handler, session: &mut Session, cmd: &Command) -> HandlerOutcome {
    if cmd.args.len() > 2 {
        return wrong_args("keys");
    }
    let prefix = if cmd.args.len() == 2 {
        cmd.args[1].clone()
    } else {
        Vec::new()
    };

    let bucket = match handler.registry.get(session.bucket_name()) {
        Ok(b) => b,
        Err(e) => return HandlerOutcome::reply(RespValue::error(format!("ERR {e}"))),
    };

    match bucket.list(&prefix) {
        Ok(keys) => HandlerOutcome::reply(RespValue::Array(Some(
            keys.into_iter().map(RespValue::bulk).collect(),
        ))),
        Err(e) => HandlerOutcome::reply(RespValue::error(format!("ERR listing keys: {e}"))),
    }
}

fn get(handler: &Handler, session: &mut Session, cmd: &Command) -> HandlerOutcome {
    if cmd.args.len() != 2 {
        return wrong_args("get");
    }
    let key = cmd.arg_str(1);

    let bucket = match handler.registry.get(session.bucket_name()) {
        Ok(b) => b,
        Err(e) => return HandlerOutcome::reply(RespValue::error(format!("ERR {e}"))),
    };

    match bucket.get(&cmd.args[1]) {
        Ok(value) => HandlerOutcome::reply(RespValue::Bulk(value)),
        Err(e) => HandlerOutcome::reply(RespValue::error(format!(
            "ERR getting item '{key}': {e}"
        ))),
    }
}

fn set(handler: &Handler, session: &mut Session, cmd: &Command) -> HandlerOutcome {
    if cmd.args.len() != 3 {
        return wrong_args("set");
    }
    let key = cmd.arg_str(1);

    let bucket = match handler.registry.get(session.bucket_name()) {
        Ok(b) => b,
        Err(e) => return HandlerOutcome::reply(RespValue::error(format!("ERR {e}"))),
    };

    match bucket.set(&cmd.args[1], &cmd.args[2], None, 0) {
        Ok(()) => HandlerOutcome::reply(RespValue::simple("OK")),
        Err(e) => HandlerOutcome::reply(RespValue::error(format!(
            "ERR setting item '{key}': {e}"
        ))),
    }
}

fn del(handler: &Handler, session: &mut Session, cmd: &Command) -> HandlerOutcome {
    if cmd.args.len() < 2 {
        return wrong_args("del");
    }

    let bucket = match handler.registry.get(session.bucket_name()) {
        Ok(b) => b,
        Err(e) => return HandlerOutcome::reply(RespValue::error(format!("ERR {e}"))),
    };

    let mut deleted = 0i64;
    for i in 1..cmd.args.len() {
        let key = cmd.arg_str(i);
        match bucket.delete(&cmd.args[i]) {
            Ok(true) => deleted += 1,
            Ok(false) => {}
            Err(e) => warn!(key, error = %e, "deleting key"),
        }
    }
    HandlerOutcome::reply(RespValue::Integer(deleted))
}

// ---------------------------------------------------------------------------
// Cluster
// ---------------------------------------------------------------------------

fn cluster(handler: &Handler, _session: &mut Session, cmd: &Command) -> HandlerOutcome {
    if cmd.args.len() != 2 {
        return wrong_args("cluster");
    }
    let sub = cmd.arg_str(1).to_lowercase();
    match sub.as_str() {
        "count" => cluster_count(handler),
        "peers" => cluster_peers(handler),
        _ => unknown_subcommand("cluster", &sub),
    }
}

fn cluster_count(handler: &Handler) -> HandlerOutcome {
    HandlerOutcome::reply(RespValue::Integer(handler.cluster.num_nodes() as i64))
}

fn cluster_peers(handler: &Handler) -> HandlerOutcome {
    let members = handler.cluster.members();
    let entries = members
        .into_iter()
        .map(|m| {
            RespValue::Array(Some(vec![
                RespValue::bulk(m.name.into_bytes()),
                RespValue::bulk(m.address.into_bytes()),
                RespValue::Map(m.tags),
                RespValue::bulk(m.status.into_bytes()),
                RespValue::Array(Some(vec![
                    RespValue::Integer(m.protocol_version.0 as i64),
                    RespValue::Integer(m.protocol_version.1 as i64),
                    RespValue::Integer(m.protocol_version.2 as i64),
                ])),
            ]))
        })
        .collect();
    HandlerOutcome::reply(RespValue::Array(Some(entries)))
}

// ---------------------------------------------------------------------------
// COMMAND introspection
// ---------------------------------------------------------------------------

fn command(handler: &Handler, _session: &mut Session, cmd: &Command) -> HandlerOutcome {
    if cmd.args.len() == 1 {
        return command_info(handler, &[]);
    }
    let sub = cmd.arg_str(1).to_lowercase();
    let rest = &cmd.args[2..];
    match sub.as_str() {
        "count" => command_count(handler),
        "list" => command_list(handler),
        "info" => command_info(handler, rest),
        "docs" => command_docs(handler, rest),
        _ => unknown_subcommand("command", &sub),
    }
}

fn command_count(handler: &Handler) -> HandlerOutcome {
    HandlerOutcome::reply(RespValue::Integer(handler.commands.count() as i64))
}

fn command_list(handler: &Handler) -> HandlerOutcome {
    HandlerOutcome::reply(RespValue::string_array(handler.commands.names()))
}

fn command_info(handler: &Handler, names: &[Vec<u8>]) -> HandlerOutcome {
    let names: Vec<String> = if names.is_empty() {
        handler.commands.names()
    } else {
        names
            .iter()
            .map(|n| String::from_utf8_lossy(n).to_lowercase())
            .collect()
    };

    let entries = names
        .into_iter()
        .map(|name| match handler.commands.info_for(&name) {
            Some(info) => RespValue::Array(Some(vec![
                RespValue::bulk(info.name.clone().into_bytes()),
                RespValue::Integer(info.arity as i64),
                RespValue::string_array(info.flags.clone()),
                RespValue::Integer(info.first_key as i64),
                RespValue::Integer(info.last_key as i64),
                RespValue::Integer(info.step_key as i64),
                RespValue::string_array(info.categories.clone()),
                RespValue::string_array([info.tips.0.clone(), info.tips.1.clone()]),
            ])),
            None => RespValue::error(format!("ERR unknown command '{name}'")),
        })
        .collect();

    HandlerOutcome::reply(RespValue::Array(Some(entries)))
}

fn command_docs(handler: &Handler, names: &[Vec<u8>]) -> HandlerOutcome {
    let names: Vec<String> = if names.is_empty() {
        handler.commands.names()
    } else {
        names
            .iter()
            .map(|n| String::from_utf8_lossy(n).to_lowercase())
            .collect()
    };

    let entries = names
        .into_iter()
        .map(|name| match handler.commands.info_for(&name) {
            Some(info) => RespValue::string_array([info.tips.0.clone(), info.tips.1.clone()]),
            None => RespValue::error(format!("ERR unknown command '{name}'")),
        })
        .collect();

    HandlerOutcome::reply(RespValue::Array(Some(entries)))
}

/// Registers every command and subcommand the server understands.
pub fn register_all(registry: &mut CommandRegistry) {
    registry.register("ping", ping, 1, &[], -1, -1, 0, &["general"], ("PING", "ping the server"));
    registry.register(
        "quit",
        quit,
        1,
        &[],
        -1,
        -1,
        0,
        &["general"],
        ("QUIT", "close the connection"),
    );
    registry.register(
        "info",
        info,
        1,
        &[],
        -1,
        -1,
        0,
        &["general"],
        ("INFO", "return server information"),
    );

    registry.register(
        "bucket",
        bucket,
        -1,
        &[],
        -1,
        -1,
        0,
        &["bucket"],
        ("BUCKET", "container for bucket commands"),
    );
    registry.register_child(
        "bucket count",
        2,
        &[],
        -1,
        -1,
        0,
        &["bucket"],
        ("BUCKET COUNT", "return count of all registered buckets"),
    );
    registry.register_child(
        "bucket list",
        -2,
        &[],
        -1,
        -1,
        0,
        &["bucket"],
        ("BUCKET LIST", "return names of all registered buckets"),
    );
    registry.register_child(
        "bucket create",
        3,
        &["write"],
        -1,
        -1,
        0,
        &["bucket"],
        ("BUCKET CREATE", "create a new bucket"),
    );
    registry.register_child(
        "bucket use",
        3,
        &[],
        -1,
        -1,
        0,
        &["bucket"],
        ("BUCKET USE", "select a bucket for the connection"),
    );
    registry.register_child(
        "bucket drop",
        -3,
        &["write"],
        -1,
        -1,
        0,
        &["bucket"],
        ("BUCKET DROP", "drop one or more buckets"),
    );

    registry.register(
        "keys",
        keys,
        -1,
        &["readonly"],
        -1,
        -1,
        0,
        &["kv"],
        ("KEYS", "list keys with an optional prefix"),
    );
    registry.register(
        "get",
        get,
        2,
        &["readonly"],
        1,
        1,
        1,
        &["kv"],
        ("GET", "get the value of a key"),
    );
    registry.register(
        "set",
        set,
        3,
        &["write"],
        1,
        1,
        1,
        &["kv"],
        ("SET", "set the value of a key"),
    );
    registry.register(
        "del",
        del,
        -2,
        &["write"],
        1,
        -1,
        1,
        &["kv"],
        ("DEL", "delete one or more keys"),
    );

    registry.register(
        "cluster",
        cluster,
        2,
        &[],
        -1,
        -1,
        0,
        &["cluster"],
        ("CLUSTER", "container for cluster commands"),
    );
    registry.register_child(
        "cluster count",
        2,
        &[],
        -1,
        -1,
        0,
        &["cluster"],
        ("CLUSTER COUNT", "return count of all known members of cluster"),
    );
    registry.register_child(
        "cluster peers",
        2,
        &[],
        -1,
        -1,
        0,
        &["cluster"],
        ("CLUSTER PEERS", "return list of all known members of cluster"),
    );

    registry.register(
        "command",
        command,
        -1,
        &[],
        -1,
        -1,
        0,
        &["meta"],
        ("COMMAND", "container for command introspection"),
    );
    registry.register_child(
        "command count",
        2,
        &[],
        -1,
        -1,
        0,
        &["meta"],
        ("COMMAND COUNT", "return count of registered commands"),
    );
    registry.register_child(
        "command list",
        2,
        &[],
        -1,
        -1,
        0,
        &["meta"],
        ("COMMAND LIST", "return names of registered commands"),
    );
    registry.register_child(
        "command info",
        -2,
        &[],
        -1,
        -1,
        0,
        &["meta"],
        ("COMMAND INFO", "return metadata for one or more commands"),
    );
    registry.register_child(
        "command docs",
        -2,
        &[],
        -1,
        -1,
        0,
        &["meta"],
        ("COMMAND DOCS", "return tips for one or more commands"),
    );
}
