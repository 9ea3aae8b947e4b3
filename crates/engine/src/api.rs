//! The request/reply control plane: well-known subjects and their
//! handlers.
//!
//! Each operation lives on a fixed subject under the `$JS.` prefix. The
//! system account exports the wildcarded form (`$JS.*.<OP>`); each
//! enabled account imports it so the account-facing subject is the
//! concrete `$JS.<OP>`. Handlers parse, validate, mutate the registry,
//! and reply with `+OK`, `-ERR <reason>`, or a pretty-printed JSON
//! document. Parse failures answer `bad request` and are never logged.

use std::sync::Arc;

use snafu::ResultExt;

use jetstream_types::{CreateObservableRequest, MsgSetConfig, MsgSetInfo};

use crate::broker::SubjectHandler;
use crate::engine::Engine;
use crate::error::{Result, SubscriptionsSnafu};

/// Probe whether jetstream is enabled for the account.
pub const JS_ENABLED: &str = "$JS.ENABLED";
const JS_ENABLED_EXPORT: &str = "$JS.*.ENABLED";

/// Account usage and limits, as JSON.
pub const JS_INFO: &str = "$JS.INFO";
const JS_INFO_EXPORT: &str = "$JS.*.INFO";

/// Create a message set from a JSON configuration.
pub const JS_MSGSET_CREATE: &str = "$JS.MSGSET.CREATE";
const JS_MSGSET_CREATE_EXPORT: &str = "$JS.*.MSGSET.CREATE";

/// List message-set names, as a JSON array.
pub const JS_MSGSETS: &str = "$JS.MSGSETS";
const JS_MSGSETS_EXPORT: &str = "$JS.*.MSGSETS";

/// Message-set configuration and statistics, as JSON.
pub const JS_MSGSET_INFO: &str = "$JS.MSGSET.INFO";
const JS_MSGSET_INFO_EXPORT: &str = "$JS.*.MSGSET.INFO";

/// Delete a message set by name.
pub const JS_MSGSET_DELETE: &str = "$JS.MSGSET.DELETE";
const JS_MSGSET_DELETE_EXPORT: &str = "$JS.*.MSGSET.DELETE";

/// Purge a message set's retained messages.
pub const JS_MSGSET_PURGE: &str = "$JS.MSGSET.PURGE";
const JS_MSGSET_PURGE_EXPORT: &str = "$JS.*.MSGSET.PURGE";

/// Erase one message: body is `"<set> <seq>"`.
pub const JS_MSG_DELETE: &str = "$JS.MSGSET.MSG.DELETE";
const JS_MSG_DELETE_EXPORT: &str = "$JS.*.MSGSET.MSG.DELETE";

/// Create an observable from a JSON request.
pub const JS_OBSERVABLE_CREATE: &str = "$JS.OBSERVABLE.CREATE";
const JS_OBSERVABLE_CREATE_EXPORT: &str = "$JS.*.OBSERVABLE.CREATE";

/// List observable names for a set, as a JSON array.
pub const JS_OBSERVABLES: &str = "$JS.OBSERVABLES";
const JS_OBSERVABLES_EXPORT: &str = "$JS.*.OBSERVABLES";

/// Observable info: body is `"<set> <obs>"`.
pub const JS_OBSERVABLE_INFO: &str = "$JS.OBSERVABLE.INFO";
const JS_OBSERVABLE_INFO_EXPORT: &str = "$JS.*.OBSERVABLE.INFO";

/// Delete an observable: body is `"<set> <obs>"`.
pub const JS_OBSERVABLE_DELETE: &str = "$JS.OBSERVABLE.DELETE";
const JS_OBSERVABLE_DELETE_EXPORT: &str = "$JS.*.OBSERVABLE.DELETE";

/// Subject prefix for observable acks (delivery layer).
pub const JS_ACK_PREFIX: &str = "$JS.A";

/// Subject prefix for pull/worker next-message requests (delivery layer).
pub const JS_REQUEST_NEXT_PREFIX: &str = "$JS.RN";

/// Subject prefix for direct by-sequence lookups (delivery layer).
pub const JS_MSG_BY_SEQ_PREFIX: &str = "$JS.BYSEQ";

/// Subject prefix for ack-sample events (delivery layer).
pub const JS_ACK_SAMPLE_PREFIX: &str = "$JS.EVENTS.OBSERVABLE.ACKSAMPLE";

/// Subject prefix for max-delivery-exceeded events (delivery layer).
pub const JS_MAX_DELIVER_PREFIX: &str = "$JS.EVENTS.OBSERVABLE.MAXDELIVER";

/// Positive reply.
pub const OK_RESPONSE: &str = "+OK";

/// Error reply prefix.
pub const ERR_PREFIX: &str = "-ERR";

/// Reply when the requesting account has no jetstream state.
pub const NOT_ENABLED_RESPONSE: &str = "-ERR 'jetstream not enabled for account'";

/// Reply when the request body could not be parsed.
pub const BAD_REQUEST_RESPONSE: &str = "-ERR 'bad request'";

/// Every control-plane export, in installation order.
pub const ALL_EXPORTS: [&str; 12] = [
    JS_ENABLED_EXPORT,
    JS_INFO_EXPORT,
    JS_MSGSET_CREATE_EXPORT,
    JS_MSGSETS_EXPORT,
    JS_MSGSET_INFO_EXPORT,
    JS_MSGSET_DELETE_EXPORT,
    JS_MSGSET_PURGE_EXPORT,
    JS_MSG_DELETE_EXPORT,
    JS_OBSERVABLE_CREATE_EXPORT,
    JS_OBSERVABLES_EXPORT,
    JS_OBSERVABLE_INFO_EXPORT,
    JS_OBSERVABLE_DELETE_EXPORT,
];

/// Account-side import subject for an export template:
/// `$JS.*.MSGSET.CREATE` -> `$JS.MSGSET.CREATE`.
pub fn import_from(export: &str) -> String {
    export.replacen(".*.", ".", 1)
}

/// System-side rewritten subject for an export template and account:
/// `$JS.*.MSGSET.CREATE` + `ACME` -> `$JS.ACME.MSGSET.CREATE`.
pub fn import_to(export: &str, account: &str) -> String {
    export.replacen('*', account, 1)
}

/// Installs the twelve control-plane handlers as internal subscriptions
/// on the system account. Handlers hold a weak engine reference;
/// requests arriving after shutdown are dropped.
pub(crate) fn install_handlers(engine: &Arc<Engine>) -> Result<()> {
    type HandlerFn = fn(&Engine, &str, &str, &[u8]);
    let handlers: [(&str, HandlerFn); 12] = [
        (JS_ENABLED_EXPORT, handle_enabled),
        (JS_INFO_EXPORT, handle_account_info),
        (JS_MSGSET_CREATE_EXPORT, handle_msg_set_create),
        (JS_MSGSETS_EXPORT, handle_msg_set_list),
        (JS_MSGSET_INFO_EXPORT, handle_msg_set_info),
        (JS_MSGSET_DELETE_EXPORT, handle_msg_set_delete),
        (JS_MSGSET_PURGE_EXPORT, handle_msg_set_purge),
        (JS_MSG_DELETE_EXPORT, handle_msg_delete),
        (JS_OBSERVABLE_CREATE_EXPORT, handle_observable_create),
        (JS_OBSERVABLES_EXPORT, handle_observable_list),
        (JS_OBSERVABLE_INFO_EXPORT, handle_observable_info),
        (JS_OBSERVABLE_DELETE_EXPORT, handle_observable_delete),
    ];

    for (subject, handler) in handlers {
        let weak = Arc::downgrade(engine);
        let wrapped: SubjectHandler =
            Arc::new(move |account: &str, _subject: &str, reply: &str, body: &[u8]| {
                if let Some(engine) = weak.upgrade() {
                    handler(&engine, account, reply, body);
                }
            });
        engine.broker().sys_subscribe(subject, wrapped).context(SubscriptionsSnafu)?;
    }
    Ok(())
}

fn respond(engine: &Engine, account: &str, reply: &str, payload: &[u8]) {
    if reply.is_empty() {
        return;
    }
    engine.broker().send_internal_account_msg(account, reply, payload);
}

fn handle_enabled(engine: &Engine, account: &str, reply: &str, _body: &[u8]) {
    let response = if engine.account_enabled(account) {
        OK_RESPONSE
    } else {
        NOT_ENABLED_RESPONSE
    };
    respond(engine, account, reply, response.as_bytes());
}

fn handle_account_info(engine: &Engine, account: &str, reply: &str, _body: &[u8]) {
    let Some(jsa) = engine.lookup_account(account) else {
        respond(engine, account, reply, NOT_ENABLED_RESPONSE.as_bytes());
        return;
    };
    let Ok(body) = serde_json::to_vec_pretty(&jsa.usage()) else { return };
    respond(engine, account, reply, &body);
}

fn handle_msg_set_create(engine: &Engine, account: &str, reply: &str, body: &[u8]) {
    let Some(jsa) = engine.lookup_account(account) else {
        respond(engine, account, reply, NOT_ENABLED_RESPONSE.as_bytes());
        return;
    };
    let Ok(config) = serde_json::from_slice::<MsgSetConfig>(body) else {
        respond(engine, account, reply, BAD_REQUEST_RESPONSE.as_bytes());
        return;
    };
    let response = match jsa.add_msg_set(config) {
        Ok(_) => OK_RESPONSE.to_string(),
        Err(err) => format!("{ERR_PREFIX} {err}"),
    };
    respond(engine, account, reply, response.as_bytes());
}

fn handle_msg_set_list(engine: &Engine, account: &str, reply: &str, _body: &[u8]) {
    let Some(jsa) = engine.lookup_account(account) else {
        respond(engine, account, reply, NOT_ENABLED_RESPONSE.as_bytes());
        return;
    };
    let mut names: Vec<String> =
        jsa.msg_sets().iter().map(|mset| mset.name().to_string()).collect();
    names.sort_unstable();
    let Ok(body) = serde_json::to_vec_pretty(&names) else { return };
    respond(engine, account, reply, &body);
}

fn handle_msg_set_info(engine: &Engine, account: &str, reply: &str, body: &[u8]) {
    let Some(jsa) = engine.lookup_account(account) else {
        respond(engine, account, reply, NOT_ENABLED_RESPONSE.as_bytes());
        return;
    };
    let Some(name) = non_empty_str(body) else {
        respond(engine, account, reply, BAD_REQUEST_RESPONSE.as_bytes());
        return;
    };
    let mset = match jsa.lookup_msg_set(name) {
        Ok(mset) => mset,
        Err(err) => {
            respond(engine, account, reply, format!("{ERR_PREFIX} '{err}'").as_bytes());
            return;
        },
    };
    let info = MsgSetInfo { config: mset.config(), stats: mset.stats() };
    let Ok(body) = serde_json::to_vec_pretty(&info) else { return };
    respond(engine, account, reply, &body);
}

fn handle_msg_set_delete(engine: &Engine, account: &str, reply: &str, body: &[u8]) {
    let Some(jsa) = engine.lookup_account(account) else {
        respond(engine, account, reply, NOT_ENABLED_RESPONSE.as_bytes());
        return;
    };
    let Some(name) = non_empty_str(body) else {
        respond(engine, account, reply, BAD_REQUEST_RESPONSE.as_bytes());
        return;
    };
    let response = match jsa.lookup_msg_set(name) {
        Ok(mset) => match mset.delete() {
            Ok(()) => OK_RESPONSE.to_string(),
            Err(err) => format!("{ERR_PREFIX} {err}"),
        },
        Err(err) => format!("{ERR_PREFIX} {err}"),
    };
    respond(engine, account, reply, response.as_bytes());
}

fn handle_msg_set_purge(engine: &Engine, account: &str, reply: &str, body: &[u8]) {
    let Some(jsa) = engine.lookup_account(account) else {
        respond(engine, account, reply, NOT_ENABLED_RESPONSE.as_bytes());
        return;
    };
    let Some(name) = non_empty_str(body) else {
        respond(engine, account, reply, BAD_REQUEST_RESPONSE.as_bytes());
        return;
    };
    let response = match jsa.lookup_msg_set(name) {
        Ok(mset) => {
            mset.purge();
            OK_RESPONSE.to_string()
        },
        Err(err) => format!("{ERR_PREFIX} {err}"),
    };
    respond(engine, account, reply, response.as_bytes());
}

fn handle_msg_delete(engine: &Engine, account: &str, reply: &str, body: &[u8]) {
    let Some(jsa) = engine.lookup_account(account) else {
        respond(engine, account, reply, NOT_ENABLED_RESPONSE.as_bytes());
        return;
    };
    let args: Vec<&str> = match std::str::from_utf8(body) {
        Ok(text) => text.split(' ').collect(),
        Err(_) => {
            respond(engine, account, reply, BAD_REQUEST_RESPONSE.as_bytes());
            return;
        },
    };
    if args.len() != 2 {
        respond(engine, account, reply, BAD_REQUEST_RESPONSE.as_bytes());
        return;
    }
    // An unparsable sequence is treated as 0, which never exists.
    let seq: u64 = args[1].parse().unwrap_or(0);
    let response = match jsa.lookup_msg_set(args[0]) {
        Ok(mset) => {
            if mset.erase_msg(seq) {
                OK_RESPONSE.to_string()
            } else {
                format!("{ERR_PREFIX} sequence [{seq}] not found")
            }
        },
        Err(err) => format!("{ERR_PREFIX} {err}"),
    };
    respond(engine, account, reply, response.as_bytes());
}

fn handle_observable_create(engine: &Engine, account: &str, reply: &str, body: &[u8]) {
    let Some(jsa) = engine.lookup_account(account) else {
        respond(engine, account, reply, NOT_ENABLED_RESPONSE.as_bytes());
        return;
    };
    let Ok(request) = serde_json::from_slice::<CreateObservableRequest>(body) else {
        respond(engine, account, reply, BAD_REQUEST_RESPONSE.as_bytes());
        return;
    };
    let response = match jsa.lookup_msg_set(&request.msg_set) {
        Ok(mset) => match mset.add_observable(request.config) {
            Ok(_) => OK_RESPONSE.to_string(),
            Err(err) => format!("{ERR_PREFIX} '{err}'"),
        },
        Err(err) => format!("{ERR_PREFIX} {err}"),
    };
    respond(engine, account, reply, response.as_bytes());
}

fn handle_observable_list(engine: &Engine, account: &str, reply: &str, body: &[u8]) {
    let Some(jsa) = engine.lookup_account(account) else {
        respond(engine, account, reply, NOT_ENABLED_RESPONSE.as_bytes());
        return;
    };
    let Some(name) = non_empty_str(body) else {
        respond(engine, account, reply, BAD_REQUEST_RESPONSE.as_bytes());
        return;
    };
    let mset = match jsa.lookup_msg_set(name) {
        Ok(mset) => mset,
        Err(err) => {
            respond(engine, account, reply, format!("{ERR_PREFIX} {err}").as_bytes());
            return;
        },
    };
    let mut names: Vec<String> =
        mset.observables().iter().map(|obs| obs.name().to_string()).collect();
    names.sort_unstable();
    let Ok(body) = serde_json::to_vec_pretty(&names) else { return };
    respond(engine, account, reply, &body);
}

fn handle_observable_info(engine: &Engine, account: &str, reply: &str, body: &[u8]) {
    let Some(jsa) = engine.lookup_account(account) else {
        respond(engine, account, reply, NOT_ENABLED_RESPONSE.as_bytes());
        return;
    };
    let Some((set_name, obs_name)) = two_names(body) else {
        respond(engine, account, reply, BAD_REQUEST_RESPONSE.as_bytes());
        return;
    };
    let mset = match jsa.lookup_msg_set(set_name) {
        Ok(mset) => mset,
        Err(err) => {
            respond(engine, account, reply, format!("{ERR_PREFIX} {err}").as_bytes());
            return;
        },
    };
    let Some(obs) = mset.lookup_observable(obs_name) else {
        respond(engine, account, reply, format!("{ERR_PREFIX} observable not found").as_bytes());
        return;
    };
    let Ok(body) = serde_json::to_vec_pretty(&obs.info()) else { return };
    respond(engine, account, reply, &body);
}

fn handle_observable_delete(engine: &Engine, account: &str, reply: &str, body: &[u8]) {
    let Some(jsa) = engine.lookup_account(account) else {
        respond(engine, account, reply, NOT_ENABLED_RESPONSE.as_bytes());
        return;
    };
    let Some((set_name, obs_name)) = two_names(body) else {
        respond(engine, account, reply, BAD_REQUEST_RESPONSE.as_bytes());
        return;
    };
    let mset = match jsa.lookup_msg_set(set_name) {
        Ok(mset) => mset,
        Err(err) => {
            respond(engine, account, reply, format!("{ERR_PREFIX} {err}").as_bytes());
            return;
        },
    };
    let Some(obs) = mset.lookup_observable(obs_name) else {
        respond(engine, account, reply, format!("{ERR_PREFIX} observable not found").as_bytes());
        return;
    };
    let response = match obs.delete() {
        Ok(()) => OK_RESPONSE.to_string(),
        Err(err) => format!("{ERR_PREFIX} {err}"),
    };
    respond(engine, account, reply, response.as_bytes());
}

fn non_empty_str(body: &[u8]) -> Option<&str> {
    let text = std::str::from_utf8(body).ok()?;
    if text.is_empty() { None } else { Some(text) }
}

fn two_names(body: &[u8]) -> Option<(&str, &str)> {
    let text = non_empty_str(body)?;
    let mut parts = text.split(' ');
    let first = parts.next()?;
    let second = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    Some((first, second))
}
