//! Command dispatcher: request decoding, the closed command table and the
//! envelopes that carry replies and events back out.
use alloc::string::String;

use liftpuck_icd::Code;

use crate::context::{AppContext, LinkStatus};
use crate::storage::BlockStorage;

pub mod command;
pub mod envelope;
mod handlers;
pub mod notifier;
pub mod pending;

pub use command::{parse_request, Command, Rejection, Request};
pub use envelope::{Body, Envelopes, Event, Reply};
pub use handlers::Outcome;
pub use notifier::EdgeNotifier;
pub use pending::{Pending, PendingStart};

/// A handled payload, ready to be wrapped in a `resp` envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatched {
    /// Name echoed in the response.
    pub name: String,
    pub reference: Option<String>,
    pub outcome: Outcome,
}

/// Decodes one payload and runs the command it names.
pub fn dispatch<S: BlockStorage>(
    ctx: &mut AppContext<S>,
    payload: &[u8],
    links: LinkStatus,
    now_ms: u64,
) -> Dispatched {
    let request = match parse_request(payload) {
        Ok(request) => request,
        Err(Rejection { name, reference, code, msg }) => {
            warn!("payload rejected: {}", code);
            return Dispatched {
                name,
                reference,
                outcome: Reply::err(code, msg).into(),
            };
        }
    };

    let outcome = match Command::from_name(&request.name) {
        Some(command) => ctx.handle(command, &request.args, links, now_ms),
        None => {
            debug!("unsupported command {}", request.name.as_str());
            Reply::err(Code::Unsupported, "Command not supported on this firmware")
                .into()
        }
    };
    Dispatched { name: request.name, reference: request.reference, outcome }
}
