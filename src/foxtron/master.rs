use crate::base::command::{CommandError, DaliCommandCode};
use crate::foxtron::frame::{FoxtronRequest, FoxtronResponse, FrameError};
use crate::foxtron::transport::{FoxtronTransport, LineControl, TransportEvent};
use crate::utils::dyn_future::DynFutureStatic;
use futures::future::ready;
use log::{debug, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};

/// Grace period for the adapter's bootloader before the channel is
/// declared usable.
pub const BOOT_WAITING_TIME: Duration = Duration::from_secs(5);

const DEFAULT_EVENT_QUEUE: usize = 16;

/// How to treat the adapter when the link comes up.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum BootMethod {
    /// Firmware is already running, use the channel right away.
    #[default]
    Running,
    /// Give the bootloader time to time out into the application.
    WaitForBoot,
    /// Raise DTR to kick the adapter out of the bootloader, then wait.
    SetDtr,
}

#[derive(Debug)]
pub struct MasterConfig {
    pub boot_method: BootMethod,
    /// Depth of each unsolicited event queue. Events past a full
    /// queue are discarded.
    pub event_queue: usize,
}

impl Default for MasterConfig {
    fn default() -> MasterConfig {
        MasterConfig {
            boot_method: BootMethod::default(),
            event_queue: DEFAULT_EVENT_QUEUE,
        }
    }
}

#[derive(Debug)]
pub enum MasterError {
    /// Only one correlated request may be on the wire at a time.
    RequestAlreadyInFlight,
    Cancelled,
    Frame(FrameError),
    Driver(Box<dyn std::error::Error + Send + Sync>),
}

impl std::fmt::Display for MasterError {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::result::Result<(), std::fmt::Error> {
        match self {
            MasterError::RequestAlreadyInFlight => {
                write!(fmt, "Another request is already in flight")
            }
            MasterError::Cancelled => write!(fmt, "Request cancelled"),
            MasterError::Frame(e) => e.fmt(fmt),
            MasterError::Driver(e) => write!(fmt, "Driver error: {}", e),
        }
    }
}

impl std::error::Error for MasterError {}

impl From<FrameError> for MasterError {
    fn from(e: FrameError) -> MasterError {
        MasterError::Frame(e)
    }
}

impl From<CommandError> for MasterError {
    fn from(e: CommandError) -> MasterError {
        MasterError::Frame(FrameError::Command(e))
    }
}

/// Lifecycle notifications for the channel itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Open,
    Closed(Option<String>),
}

/// Receiving ends for unsolicited traffic. Handed out once when the
/// master is created; drop the receivers you do not care about.
pub struct MasterEvents {
    pub response: mpsc::Receiver<FoxtronResponse>,
    pub no_response: mpsc::Receiver<FoxtronResponse>,
    pub spec_received: mpsc::Receiver<FoxtronResponse>,
    pub conf_response: mpsc::Receiver<FoxtronResponse>,
    pub conf_change_ack: mpsc::Receiver<FoxtronResponse>,
    pub firmware_reset: mpsc::Receiver<FoxtronResponse>,
    pub any: mpsc::Receiver<FoxtronResponse>,
    pub session: mpsc::Receiver<SessionEvent>,
}

struct EventSenders {
    response: mpsc::Sender<FoxtronResponse>,
    no_response: mpsc::Sender<FoxtronResponse>,
    spec_received: mpsc::Sender<FoxtronResponse>,
    conf_response: mpsc::Sender<FoxtronResponse>,
    conf_change_ack: mpsc::Sender<FoxtronResponse>,
    firmware_reset: mpsc::Sender<FoxtronResponse>,
    any: mpsc::Sender<FoxtronResponse>,
    session: mpsc::Sender<SessionEvent>,
}

struct Shared {
    /// Link up and boot grace period over.
    usable: AtomicBool,
    destroyed: AtomicBool,
    in_flight: AtomicBool,
}

struct Pending {
    remaining: u8,
    reply: oneshot::Sender<Result<FoxtronResponse, MasterError>>,
}

/// Releases the in-flight flag if a request future is dropped before
/// its frame reaches the engine. Once the engine holds the slot, the
/// engine owns the flag.
struct InFlightGuard {
    shared: Arc<Shared>,
    armed: bool,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.armed {
            self.shared.in_flight.store(false, Ordering::Release);
        }
    }
}

enum EngineMsg {
    Transmit {
        frame: Vec<u8>,
        slot: Option<Pending>,
    },
    Reset,
    Close,
}

/// Master side of one DALI channel behind a Foxtron adapter.
///
/// Owns a background engine task that drives the transport; the
/// handle itself is cheap and all request methods return futures
/// resolved by the engine.
pub struct FoxtronDaliMaster {
    shared: Arc<Shared>,
    engine: mpsc::Sender<EngineMsg>,
}

impl FoxtronDaliMaster {
    pub fn new<T>(transport: T, config: MasterConfig) -> (FoxtronDaliMaster, MasterEvents)
    where
        T: FoxtronTransport + 'static,
    {
        let shared = Arc::new(Shared {
            usable: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
            in_flight: AtomicBool::new(false),
        });
        let queue = config.event_queue.max(1);
        let (msg_tx, msg_rx) = mpsc::channel(queue);
        let (response_tx, response_rx) = mpsc::channel(queue);
        let (no_response_tx, no_response_rx) = mpsc::channel(queue);
        let (spec_tx, spec_rx) = mpsc::channel(queue);
        let (conf_response_tx, conf_response_rx) = mpsc::channel(queue);
        let (conf_change_tx, conf_change_rx) = mpsc::channel(queue);
        let (firmware_tx, firmware_rx) = mpsc::channel(queue);
        let (any_tx, any_rx) = mpsc::channel(queue);
        let (session_tx, session_rx) = mpsc::channel(queue);
        let events = EventSenders {
            response: response_tx,
            no_response: no_response_tx,
            spec_received: spec_tx,
            conf_response: conf_response_tx,
            conf_change_ack: conf_change_tx,
            firmware_reset: firmware_tx,
            any: any_tx,
            session: session_tx,
        };
        tokio::spawn(engine(
            transport,
            msg_rx,
            shared.clone(),
            config.boot_method,
            events,
        ));
        (
            FoxtronDaliMaster {
                shared,
                engine: msg_tx,
            },
            MasterEvents {
                response: response_rx,
                no_response: no_response_rx,
                spec_received: spec_rx,
                conf_response: conf_response_rx,
                conf_change_ack: conf_change_rx,
                firmware_reset: firmware_rx,
                any: any_rx,
                session: session_rx,
            },
        )
    }

    /// Channel is connected and past its boot grace period.
    pub fn is_open(&self) -> bool {
        !self.shared.destroyed.load(Ordering::Acquire)
            && self.shared.usable.load(Ordering::Acquire)
    }

    pub fn is_destroyed(&self) -> bool {
        self.shared.destroyed.load(Ordering::Acquire)
    }

    /// Submit a request. Correlated requests resolve with the
    /// adapter's reply; a plain `Send` resolves with `None` as soon as
    /// it is on the wire. On a session that is not open every request
    /// resolves immediately with a `ChannelNotOpen` special message.
    ///
    /// Nothing is transmitted until the returned future is polled;
    /// dropping it beforehand releases the channel for the next
    /// request.
    pub fn send_cmd(
        &self,
        req: impl Into<FoxtronRequest>,
    ) -> DynFutureStatic<Result<Option<FoxtronResponse>, MasterError>> {
        let req = req.into();
        let frame = match req.encode() {
            Ok(frame) => frame,
            Err(e) => return Box::pin(ready(Err(MasterError::Frame(e)))),
        };
        if !self.is_open() {
            return Box::pin(ready(Ok(Some(FoxtronResponse::channel_not_open()))));
        }
        if !req.is_correlated() {
            let engine = self.engine.clone();
            return Box::pin(async move {
                engine
                    .send(EngineMsg::Transmit { frame, slot: None })
                    .await
                    .map_err(|_| MasterError::Cancelled)?;
                Ok(None)
            });
        }
        if self.shared.in_flight.swap(true, Ordering::AcqRel) {
            return Box::pin(ready(Err(MasterError::RequestAlreadyInFlight)));
        }
        let mut guard = InFlightGuard {
            shared: self.shared.clone(),
            armed: true,
        };
        let engine = self.engine.clone();
        let replies = req.expected_replies();
        Box::pin(async move {
            let (reply_tx, reply_rx) = oneshot::channel();
            let slot = Pending {
                remaining: replies,
                reply: reply_tx,
            };
            if engine
                .send(EngineMsg::Transmit {
                    frame,
                    slot: Some(slot),
                })
                .await
                .is_err()
            {
                return Err(MasterError::Cancelled);
            }
            guard.armed = false;
            match reply_rx.await {
                Ok(res) => res.map(Some),
                Err(_) => Err(MasterError::Cancelled),
            }
        })
    }

    /// Shorthand for transmitting a commissioning command.
    pub fn send_special(
        &self,
        code: DaliCommandCode,
        value: u32,
    ) -> DynFutureStatic<Result<Option<FoxtronResponse>, MasterError>> {
        match FoxtronRequest::special(code, value) {
            Ok(req) => self.send_cmd(req),
            Err(e) => Box::pin(ready(Err(e.into()))),
        }
    }

    /// Load a 24-bit search address into the gear on the bus, high
    /// byte first, one register at a time.
    pub fn set_search_address(
        &self,
        search: u32,
    ) -> DynFutureStatic<Result<Vec<Option<FoxtronResponse>>, MasterError>> {
        if search > 0xffffff {
            return Box::pin(ready(Err(CommandError::ValueOutOfRange {
                min: 0,
                max: 0xffffff,
            }
            .into())));
        }
        let this = FoxtronDaliMaster {
            shared: self.shared.clone(),
            engine: self.engine.clone(),
        };
        Box::pin(async move {
            let mut replies = Vec::with_capacity(3);
            for code in [
                DaliCommandCode::SearchAddressH,
                DaliCommandCode::SearchAddressM,
                DaliCommandCode::SearchAddressL,
            ] {
                replies.push(this.send_special(code, search).await?);
            }
            Ok(replies)
        })
    }

    /// Abandon the request currently in flight, if any. Its future
    /// resolves with `Cancelled`.
    pub fn reset(&self) {
        let _ = self.engine.try_send(EngineMsg::Reset);
    }

    /// Shut the channel down. The engine closes the transport and all
    /// event channels end.
    pub fn close(&self) {
        let _ = self.engine.try_send(EngineMsg::Close);
    }
}

enum Step {
    Msg(Option<EngineMsg>),
    Transport(TransportEvent),
    BootDone,
}

async fn engine<T>(
    mut transport: T,
    mut msg_rx: mpsc::Receiver<EngineMsg>,
    shared: Arc<Shared>,
    boot_method: BootMethod,
    events: EventSenders,
) where
    T: FoxtronTransport,
{
    let mut slot: Option<Pending> = None;
    let mut boot_deadline: Option<Instant> = None;

    loop {
        let step = tokio::select! {
            msg = msg_rx.recv() => Step::Msg(msg),
            event = transport.next_event() => Step::Transport(event),
            _ = async {
                match boot_deadline {
                    Some(deadline) => sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            } => Step::BootDone,
        };
        match step {
            Step::Msg(None) | Step::Msg(Some(EngineMsg::Close)) => {
                debug!("Closing DALI channel");
                transport.close();
                shutdown(&shared, &mut slot, &events, None);
                return;
            }
            Step::Msg(Some(EngineMsg::Transmit {
                frame,
                slot: new_slot,
            })) => {
                let correlated = new_slot.is_some();
                if let Some(pending) = new_slot {
                    slot = Some(pending);
                }
                debug!("Sending frame: {}", String::from_utf8_lossy(&frame));
                if let Err(e) = transport.send(&frame).await {
                    warn!("Transport write failed: {}", e);
                    // A failed plain Send must not touch an unrelated
                    // request still waiting for its reply.
                    if correlated {
                        if let Some(pending) = slot.take() {
                            let _ = pending.reply.send(Err(MasterError::Driver(e)));
                        }
                        shared.in_flight.store(false, Ordering::Release);
                    }
                }
            }
            Step::Msg(Some(EngineMsg::Reset)) => {
                if let Some(pending) = slot.take() {
                    let _ = pending.reply.send(Err(MasterError::Cancelled));
                }
                shared.in_flight.store(false, Ordering::Release);
            }
            Step::Transport(TransportEvent::Opened) => match boot_method {
                BootMethod::Running => {
                    shared.usable.store(true, Ordering::Release);
                    let _ = events.session.try_send(SessionEvent::Open);
                }
                BootMethod::WaitForBoot => {
                    boot_deadline = Some(Instant::now() + BOOT_WAITING_TIME);
                }
                BootMethod::SetDtr => {
                    if let Err(e) = transport.set_line(LineControl::dtr(true)).await {
                        warn!("Setting DTR failed: {}", e);
                    }
                    boot_deadline = Some(Instant::now() + BOOT_WAITING_TIME);
                }
            },
            Step::BootDone => {
                boot_deadline = None;
                shared.usable.store(true, Ordering::Release);
                let _ = events.session.try_send(SessionEvent::Open);
            }
            Step::Transport(TransportEvent::Data(chunk)) => {
                debug!("Received frame: {}", String::from_utf8_lossy(&chunk));
                match FoxtronResponse::decode(&chunk) {
                    Ok(resp) => route(resp, &mut slot, &shared, &events),
                    Err(e) => warn!("Dropping malformed frame: {}", e),
                }
            }
            Step::Transport(TransportEvent::Closed(err)) => {
                debug!("Transport closed");
                shutdown(&shared, &mut slot, &events, err.map(|e| e.to_string()));
                return;
            }
        }
    }
}

fn shutdown(
    shared: &Shared,
    slot: &mut Option<Pending>,
    events: &EventSenders,
    reason: Option<String>,
) {
    shared.usable.store(false, Ordering::Release);
    shared.destroyed.store(true, Ordering::Release);
    if let Some(pending) = slot.take() {
        let _ = pending.reply.send(Err(MasterError::Cancelled));
    }
    shared.in_flight.store(false, Ordering::Release);
    let _ = events.session.try_send(SessionEvent::Closed(reason));
}

fn route(
    resp: FoxtronResponse,
    slot: &mut Option<Pending>,
    shared: &Shared,
    events: &EventSenders,
) {
    match resp {
        FoxtronResponse::DistinctResponse(_) | FoxtronResponse::DistinctNoResponse(_) => {
            match slot.as_mut() {
                Some(pending) if pending.remaining > 1 => {
                    pending.remaining -= 1;
                    debug!("Holding reply, {} echo(es) outstanding", pending.remaining);
                }
                Some(_) => {
                    if let Some(pending) = slot.take() {
                        let _ = pending.reply.send(Ok(resp));
                    }
                    shared.in_flight.store(false, Ordering::Release);
                }
                None => debug!("Unmatched transmission report dropped"),
            }
        }
        FoxtronResponse::Response(_) => {
            let _ = events.response.try_send(resp);
            let _ = events.any.try_send(resp);
        }
        FoxtronResponse::NoResponse(_) => {
            let _ = events.no_response.try_send(resp);
            let _ = events.any.try_send(resp);
        }
        FoxtronResponse::SpecReceived(_) => {
            let _ = events.spec_received.try_send(resp);
            let _ = events.any.try_send(resp);
        }
        FoxtronResponse::ConfResponse { .. } => {
            let _ = events.conf_response.try_send(resp);
            let _ = events.any.try_send(resp);
        }
        FoxtronResponse::ConfChangeAck { .. } => {
            let _ = events.conf_change_ack.try_send(resp);
            let _ = events.any.try_send(resp);
        }
        FoxtronResponse::FirmwareResetAck => {
            let _ = events.firmware_reset.try_send(resp);
            let _ = events.any.try_send(resp);
        }
    }
}
