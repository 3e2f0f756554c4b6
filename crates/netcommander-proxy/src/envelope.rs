//! The outer `<rpc>` envelope.
//!
//! The proxy strips the NETCONF `rpc-reply` wrapper itself, so each record's
//! output is the reply element list. [`RpcEnvelope::unwrap`] peels one more
//! level so callers get the command's own reply element.

use netcommander_core::{Element, Error};

use crate::request::RequestBody;
use crate::Result;

/// Name of the envelope element.
pub const RPC_ELEMENT: &str = "rpc";

/// Wraps request bodies and unwraps replies.
#[derive(Debug, Clone, Copy, Default)]
pub struct RpcEnvelope;

impl RpcEnvelope {
    /// Produce `<rpc>{body}</rpc>`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedRequest`] if a text body does not parse.
    pub fn wrap(body: impl Into<RequestBody>) -> Result<Element> {
        let body = body.into().into_element()?;
        Ok(Element::new(RPC_ELEMENT).with_child(body))
    }

    /// Return the first child element of a decoded reply.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedResponse`] naming `host` when the reply has
    /// no child element.
    pub fn unwrap(output: Element, host: Option<&str>) -> Result<Element> {
        let name = output.name().to_string();
        output.into_first_child_element().ok_or_else(|| {
            Error::malformed_response(host, format!("reply element `{name}` has no child element"))
        })
    }
}
