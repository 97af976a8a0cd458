use crate::error::DynResult;
use crate::utils::dyn_future::DynFuture;

/// Out-of-band line state the adapter cares about.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct LineControl {
    pub dtr: Option<bool>,
    pub rts: Option<bool>,
}

impl LineControl {
    pub fn dtr(on: bool) -> LineControl {
        LineControl {
            dtr: Some(on),
            ..Default::default()
        }
    }
}

/// Event stream from the link to the adapter.
#[derive(Debug)]
pub enum TransportEvent {
    /// The link is up. Emitted once, first, also when the link was
    /// already up when the consumer attached.
    Opened,
    /// One received chunk, delimited on ETB with the delimiter kept.
    Data(Vec<u8>),
    /// The link went down. Terminal.
    Closed(Option<Box<dyn std::error::Error + Send + Sync>>),
}

/// Byte link carrying the adapter's ASCII frames. Implementations
/// must make `next_event` cancel safe as it is polled inside select
/// loops.
pub trait FoxtronTransport: Send {
    fn send<'a>(&'a mut self, data: &'a [u8]) -> DynFuture<'a, DynResult<()>>;
    fn set_line(&mut self, line: LineControl) -> DynFuture<'_, DynResult<()>>;
    fn is_open(&self) -> bool;
    fn next_event(&mut self) -> DynFuture<'_, TransportEvent>;
    fn close(&mut self);
}
