//! RESP command dispatch: wire framing, the command registry, session
//! state, and the handler implementations.

pub mod handlers;
pub mod registry;
pub mod resp;
pub mod session;

pub use registry::{CommandInfo, CommandRegistry, HandlerOutcome};
pub use resp::{Command, RespValue};
pub use session::Session;

use crate::server::Handler;

/// Dispatches a decoded command to its registered handler.
///
/// Looks up `args[0]` lowercased only — subcommands (`BUCKET USE`, `CLUSTER
/// PEERS`, ...) are dispatched by their parent handler's own switch on
/// `args[1]`; the dotted registry entries exist purely for `COMMAND`
/// introspection.
pub fn dispatch(handler: &Handler, session: &mut Session, cmd: &Command) -> HandlerOutcome {
    let name = cmd.name_lower();
    match handler.commands.handler_for(&name) {
        Some(f) => f(handler, session, cmd),
        None => HandlerOutcome::reply(RespValue::error(format!("ERR unknown command '{name}'"))),
    }
}
