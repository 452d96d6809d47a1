use bytes::Bytes;
use sllp_frame::Framing;

/// Answers one complete request message with one reply message.
///
/// Implementations never fail: a request they cannot honor gets a reply
/// that says so in the protocol's own terms.
pub trait Handler: Send {
    /// How requests are delimited on the stream.
    fn framing(&self) -> Framing;

    /// Reply to `request`, which holds exactly one message.
    fn handle(&mut self, request: &[u8]) -> Bytes;
}

impl<H: Handler + ?Sized> Handler for Box<H> {
    fn framing(&self) -> Framing {
        (**self).framing()
    }

    fn handle(&mut self, request: &[u8]) -> Bytes {
        (**self).handle(request)
    }
}
