//! # Link
//!
//! The link is split in two. [`LinkCore`] owns the transport and performs a single cycle of the
//! worker (receive, heartbeat, transmit) at a given instant. [`Link`] runs the core on a
//! background thread and is the handle the rest of the software talks to.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, info, trace, warn};
use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex,
    },
    thread,
    time::{Duration, Instant},
};

use util::rate::Rate;

use super::{
    msg::{Message, Payload, Priority},
    queue::OutboundQueue,
    transport::{LinkTransport, SendOutcome, ZmqTransport},
    Latency, LinkError, LinkParams,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// State shared between the [`Link`] handle and the worker.
#[derive(Clone, Default)]
struct Shared {
    outbound: Arc<Mutex<OutboundQueue>>,

    inbound: Arc<Mutex<VecDeque<Message>>>,

    latency: Arc<Mutex<Latency>>,

    ping_count: Arc<AtomicU64>,
}

/// A single endpoint of the link without a thread of its own.
///
/// Call [`LinkCore::cycle`] periodically to service the transport.
pub struct LinkCore {
    name: String,

    transport: Box<dyn LinkTransport>,

    ping_interval: Duration,

    ping_timeout: Duration,

    shared: Shared,

    /// Time the last ping was queued, `None` before the first ping.
    ping_sent: Option<Instant>,

    /// True while waiting for the reply to the last ping.
    awaiting_reping: bool,
}

/// A prioritised, heartbeat monitored link to a peer, serviced by a background worker thread.
pub struct Link {
    name: String,

    params: LinkParams,

    shared: Shared,

    running: Arc<AtomicBool>,

    sleeping: Arc<AtomicBool>,

    /// The core while the worker is not running
    core: Option<LinkCore>,

    worker: Option<thread::JoinHandle<LinkCore>>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Shared {
    fn enqueue(&self, msg: Message) {
        self.outbound
            .lock()
            .expect("Link outbound queue mutex poisoned")
            .push(msg);
    }

    fn receive(&self) -> Option<Message> {
        self.inbound
            .lock()
            .expect("Link inbound queue mutex poisoned")
            .pop_front()
    }

    fn data_available(&self) -> bool {
        !self
            .inbound
            .lock()
            .expect("Link inbound queue mutex poisoned")
            .is_empty()
    }

    fn latency(&self) -> Latency {
        *self.latency.lock().expect("Link latency mutex poisoned")
    }

    fn set_latency(&self, latency: Latency) {
        *self.latency.lock().expect("Link latency mutex poisoned") = latency;
    }
}

impl LinkCore {
    /// Create a new core over the given transport.
    pub fn new<T>(name: &str, transport: T, params: &LinkParams) -> Self
    where
        T: LinkTransport + 'static,
    {
        Self {
            name: name.into(),
            transport: Box::new(transport),
            ping_interval: util::time::seconds_to_duration(params.ping_interval_s),
            ping_timeout: util::time::seconds_to_duration(params.ping_timeout_s),
            shared: Shared::default(),
            ping_sent: None,
            awaiting_reping: false,
        }
    }

    /// Queue a payload for sending, returning the ID of the message.
    pub fn send(&self, data: Payload, priority: Priority) -> String {
        let msg = Message::new(&self.name, priority, data);
        let id = msg.msg_id.clone();
        self.shared.enqueue(msg);
        id
    }

    /// Pop the oldest received message.
    pub fn receive(&self) -> Option<Message> {
        self.shared.receive()
    }

    pub fn latency(&self) -> Latency {
        self.shared.latency()
    }

    /// Number of heartbeats completed, either answered or timed out.
    pub fn ping_count(&self) -> u64 {
        self.shared.ping_count.load(Ordering::Relaxed)
    }

    /// Number of messages waiting to be sent.
    pub fn num_queued(&self) -> usize {
        self.shared
            .outbound
            .lock()
            .expect("Link outbound queue mutex poisoned")
            .len()
    }

    /// Perform one cycle of the link at the instant `now`.
    ///
    /// Transport errors are returned after the rest of the cycle has been attempted, so a failing
    /// receive does not prevent sending.
    pub fn cycle(&mut self, now: Instant) -> Result<(), LinkError> {
        let recv_result = self.receive_all(now);
        self.heartbeat(now);
        let send_result = self.transmit();

        recv_result.and(send_result)
    }

    /// Drain everything the transport currently has available.
    fn receive_all(&mut self, now: Instant) -> Result<(), LinkError> {
        while let Some(frame) = self.transport.try_recv()? {
            let msg = match Message::from_bytes(&frame) {
                Ok(m) => m,
                Err(e) => {
                    warn!(
                        "{}: dropping frame: {}",
                        self.name,
                        LinkError::DeserializationError(e)
                    );
                    continue;
                }
            };

            if msg.is_ping() {
                let count = match msg.data {
                    Payload::Heartbeat(c) => c,
                    _ => 0,
                };
                self.shared.enqueue(Message::reping(&self.name, count));
            } else if msg.is_reping() {
                match (self.awaiting_reping, self.ping_sent) {
                    (true, Some(sent)) => {
                        let latency = now.saturating_duration_since(sent);
                        trace!("{}: latency {:?}", self.name, latency);

                        self.shared.set_latency(Latency::Measured(latency));
                        self.awaiting_reping = false;
                        self.shared.ping_count.fetch_add(1, Ordering::Relaxed);
                    }
                    _ => trace!("{}: ignoring stale reping", self.name),
                }
            } else {
                self.shared
                    .inbound
                    .lock()
                    .expect("Link inbound queue mutex poisoned")
                    .push_back(msg);
            }
        }

        Ok(())
    }

    /// Time out the outstanding ping, or send a new one if the interval has elapsed.
    fn heartbeat(&mut self, now: Instant) {
        let since_ping = self
            .ping_sent
            .map(|sent| now.saturating_duration_since(sent));

        if self.awaiting_reping {
            if since_ping.map_or(false, |d| d > self.ping_timeout) {
                if self.shared.latency().is_connected() {
                    warn!("{}: no heartbeat reply, link disconnected", self.name);
                }

                self.shared.set_latency(Latency::Disconnected);
                self.awaiting_reping = false;
                self.shared.ping_count.fetch_add(1, Ordering::Relaxed);
            }
        } else if since_ping.map_or(true, |d| d > self.ping_interval) {
            self.shared
                .enqueue(Message::ping(&self.name, self.ping_count()));
            self.ping_sent = Some(now);
            self.awaiting_reping = true;
        }
    }

    /// Send queued messages, highest priority first, until the queue is empty or the transport
    /// would block.
    fn transmit(&mut self) -> Result<(), LinkError> {
        // Held for the whole drain so the selected index stays valid until it's removed
        let mut outbound = self
            .shared
            .outbound
            .lock()
            .expect("Link outbound queue mutex poisoned");

        while let Some(i) = outbound.select() {
            let frame = match outbound.get(i).map(Message::to_bytes) {
                Some(Ok(f)) => f,
                Some(Err(e)) => {
                    // Can never succeed so drop it rather than block the queue
                    warn!(
                        "{}: dropping message: {}",
                        self.name,
                        LinkError::SerializationError(e)
                    );
                    outbound.remove(i);
                    continue;
                }
                None => break,
            };

            match self.transport.try_send(&frame)? {
                SendOutcome::Sent => {
                    outbound.remove(i);
                }
                SendOutcome::WouldBlock => break,
            }
        }

        Ok(())
    }
}

impl Link {
    /// Create a new link over the given transport. The worker is not started until
    /// [`Link::start`] is called, but messages may be queued before then.
    pub fn new<T>(name: &str, transport: T, params: &LinkParams) -> Result<Self, LinkError>
    where
        T: LinkTransport + 'static,
    {
        params.validate().map_err(LinkError::InvalidParams)?;

        let core = LinkCore::new(name, transport, params);

        Ok(Self {
            name: name.into(),
            params: params.clone(),
            shared: core.shared.clone(),
            running: Arc::new(AtomicBool::new(false)),
            sleeping: Arc::new(AtomicBool::new(false)),
            core: Some(core),
            worker: None,
        })
    }

    /// Create a new link over a ZMQ `PAIR` socket.
    pub fn zmq(name: &str, ctx: &zmq::Context, params: &LinkParams) -> Result<Self, LinkError> {
        params.validate().map_err(LinkError::InvalidParams)?;

        let transport = ZmqTransport::new(ctx, params)?;

        info!("{}: link on {}", name, params.endpoint());

        Self::new(name, transport, params)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Start the background worker. Does nothing if the worker is already running.
    pub fn start(&mut self) -> Result<(), LinkError> {
        let core = match self.core.take() {
            Some(c) => c,
            None => return Ok(()),
        };

        self.running.store(true, Ordering::Relaxed);

        let running = self.running.clone();
        let sleeping = self.sleeping.clone();
        let fast_rate_hz = self.params.fast_rate_hz;
        let slow_rate_hz = self.params.slow_rate_hz;

        let worker = thread::Builder::new()
            .name(format!("link_{}", self.name))
            .spawn(move || run_worker(core, running, sleeping, fast_rate_hz, slow_rate_hz))
            .map_err(LinkError::SpawnError)?;

        self.worker = Some(worker);

        debug!("{}: link worker started", self.name);

        Ok(())
    }

    /// Stop the background worker, blocking until it has exited. Queued messages are kept and
    /// will be sent if the link is started again.
    pub fn stop(&mut self) -> Result<(), LinkError> {
        self.running.store(false, Ordering::Relaxed);

        if let Some(worker) = self.worker.take() {
            let core = worker.join().map_err(|_| LinkError::WorkerPanicked)?;
            self.core = Some(core);

            debug!("{}: link worker stopped", self.name);
        }

        Ok(())
    }

    /// Switch the worker between its fast and slow polling rates.
    pub fn set_sleep(&self, sleep: bool) {
        if self.sleeping.swap(sleep, Ordering::Relaxed) != sleep {
            info!(
                "{}: link {}",
                self.name,
                if sleep { "sleeping" } else { "awake" }
            );
        }
    }

    pub fn is_sleeping(&self) -> bool {
        self.sleeping.load(Ordering::Relaxed)
    }

    /// Queue a payload for sending, returning the ID of the message. Never blocks on the network.
    pub fn send(&self, data: Payload, priority: Priority) -> String {
        let msg = Message::new(&self.name, priority, data);
        let id = msg.msg_id.clone();
        self.shared.enqueue(msg);
        id
    }

    /// True if there are received messages waiting.
    pub fn data_available(&self) -> bool {
        self.shared.data_available()
    }

    /// Pop the oldest received message.
    pub fn receive(&self) -> Option<Message> {
        self.shared.receive()
    }

    pub fn latency(&self) -> Latency {
        self.shared.latency()
    }

    /// Number of heartbeats completed, either answered or timed out.
    pub fn ping_count(&self) -> u64 {
        self.shared.ping_count.load(Ordering::Relaxed)
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("{}: error stopping link: {}", self.name, e);
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Body of the worker thread, returns the core once stopped.
fn run_worker(
    mut core: LinkCore,
    running: Arc<AtomicBool>,
    sleeping: Arc<AtomicBool>,
    fast_rate_hz: f64,
    slow_rate_hz: f64,
) -> LinkCore {
    let mut was_sleeping = sleeping.load(Ordering::Relaxed);
    let mut rate = Rate::new(if was_sleeping { slow_rate_hz } else { fast_rate_hz });

    while running.load(Ordering::Relaxed) {
        if let Err(e) = core.cycle(Instant::now()) {
            warn!("{}: {}", core.name, e);
        }

        let is_sleeping = sleeping.load(Ordering::Relaxed);
        if is_sleeping != was_sleeping {
            rate = Rate::new(if is_sleeping { slow_rate_hz } else { fast_rate_hz });
            was_sleeping = is_sleeping;
        }

        rate.sleep();
    }

    core
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::net::transport::ChannelTransport;
    use approx::assert_relative_eq;

    /// Read every frame the peer has received, decoded.
    fn drain(peer: &mut ChannelTransport) -> Vec<Message> {
        std::iter::from_fn(|| peer.try_recv().unwrap())
            .map(|b| Message::from_bytes(&b).unwrap())
            .collect()
    }

    fn cmds(msgs: &[Message]) -> Vec<String> {
        msgs.iter()
            .filter_map(|m| match &m.data {
                Payload::Cmd(s) => Some(s.clone()),
                _ => None,
            })
            .collect()
    }

    fn send_to(peer: &mut ChannelTransport, msg: &Message) {
        peer.try_send(&msg.to_bytes().unwrap()).unwrap();
    }

    #[test]
    fn test_priority_order() {
        let (t, mut peer) = ChannelTransport::pair();
        let mut core = LinkCore::new("a", t, &LinkParams::default());

        core.send(Payload::Cmd("low".into()), Priority::Low);
        core.send(Payload::Cmd("high".into()), Priority::High);
        core.send(Payload::Cmd("med".into()), Priority::Med);

        core.cycle(Instant::now()).unwrap();

        let msgs = drain(&mut peer);
        assert_eq!(cmds(&msgs), vec!["high", "med", "low"]);
        assert_eq!(core.num_queued(), 0);

        // The ping queued during the cycle goes out too
        assert!(msgs.iter().any(|m| m.is_ping()));
    }

    #[test]
    fn test_would_block_retries() {
        let (t, mut peer) = ChannelTransport::pair();
        let blocker = t.blocker();
        let mut core = LinkCore::new("a", t, &LinkParams::default());
        let t0 = Instant::now();

        blocker.store(true, Ordering::Relaxed);
        core.send(Payload::Cmd("one".into()), Priority::Low);
        core.cycle(t0).unwrap();

        assert!(drain(&mut peer).is_empty());
        // The message plus the first ping
        assert_eq!(core.num_queued(), 2);

        blocker.store(false, Ordering::Relaxed);
        core.cycle(t0 + Duration::from_millis(5)).unwrap();

        let msgs = drain(&mut peer);
        assert_eq!(cmds(&msgs), vec!["one"]);
        assert!(msgs[0].is_ping());
        assert_eq!(core.num_queued(), 0);
    }

    #[test]
    fn test_latency_measurement() {
        let (t, mut peer) = ChannelTransport::pair();
        let mut core = LinkCore::new("a", t, &LinkParams::default());
        let t0 = Instant::now();

        assert_eq!(core.latency(), Latency::Disconnected);

        core.cycle(t0).unwrap();
        let ping = drain(&mut peer)
            .into_iter()
            .find(|m| m.is_ping())
            .expect("No ping sent");
        assert_eq!(ping.data, Payload::Heartbeat(0));

        send_to(&mut peer, &Message::reping("b", 0));
        core.cycle(t0 + Duration::from_millis(120)).unwrap();

        match core.latency() {
            Latency::Measured(d) => assert_relative_eq!(d.as_secs_f64(), 0.120, epsilon = 1e-9),
            l => panic!("Expected a measured latency, got {:?}", l),
        }
        assert_eq!(core.ping_count(), 1);

        // A duplicate reply changes nothing
        send_to(&mut peer, &Message::reping("b", 0));
        core.cycle(t0 + Duration::from_millis(200)).unwrap();
        match core.latency() {
            Latency::Measured(d) => assert_relative_eq!(d.as_secs_f64(), 0.120, epsilon = 1e-9),
            l => panic!("Expected a measured latency, got {:?}", l),
        }
        assert_eq!(core.ping_count(), 1);
    }

    #[test]
    fn test_heartbeat_timeout() {
        let (t, mut peer) = ChannelTransport::pair();
        let params = LinkParams::default();
        let mut core = LinkCore::new("a", t, &params);
        let t0 = Instant::now();

        // Establish a latency
        core.cycle(t0).unwrap();
        send_to(&mut peer, &Message::reping("b", 0));
        core.cycle(t0 + Duration::from_millis(10)).unwrap();
        assert!(core.latency().is_connected());

        // Next ping after the interval, which is never answered
        let t1 = t0 + Duration::from_millis(600);
        core.cycle(t1).unwrap();
        drain(&mut peer);

        core.cycle(t1 + Duration::from_millis(2900)).unwrap();
        assert!(core.latency().is_connected());

        core.cycle(t1 + Duration::from_millis(3100)).unwrap();
        assert_eq!(core.latency(), Latency::Disconnected);
        assert_eq!(core.latency().to_string(), "??? ms");
        assert_eq!(core.ping_count(), 2);

        // A late reply to the timed out ping is ignored
        send_to(&mut peer, &Message::reping("b", 1));
        core.cycle(t1 + Duration::from_millis(3105)).unwrap();
        assert_eq!(core.latency(), Latency::Disconnected);
    }

    #[test]
    fn test_ping_reply() {
        let (t, mut peer) = ChannelTransport::pair();
        let mut core = LinkCore::new("a", t, &LinkParams::default());

        send_to(&mut peer, &Message::ping("b", 7));
        core.cycle(Instant::now()).unwrap();

        let msgs = drain(&mut peer);
        let reping = msgs.iter().find(|m| m.is_reping()).expect("No reping sent");
        assert_eq!(reping.data, Payload::Heartbeat(7));
        assert_eq!(reping.priority, Priority::High);

        // Heartbeats never reach the inbound queue
        assert!(core.receive().is_none());
    }

    #[test]
    fn test_inbound_fifo() {
        let (t, mut peer) = ChannelTransport::pair();
        let mut core = LinkCore::new("a", t, &LinkParams::default());

        send_to(&mut peer, &Message::new("b", Priority::Low, Payload::Cmd("1".into())));
        peer.try_send(b"not json").unwrap();
        send_to(&mut peer, &Message::new("b", Priority::High, Payload::Cmd("2".into())));
        core.cycle(Instant::now()).unwrap();

        let received: Vec<Message> = std::iter::from_fn(|| core.receive()).collect();
        assert_eq!(cmds(&received), vec!["1", "2"]);
        assert_eq!(received[0].sender, "b");
    }

    #[test]
    fn test_invalid_rates_rejected() {
        let params = LinkParams {
            slow_rate_hz: 0.0,
            ..Default::default()
        };

        let (ta, _tb) = ChannelTransport::pair();
        assert!(matches!(
            Link::new("a", ta, &params),
            Err(LinkError::InvalidParams(_))
        ));

        // Rejected before any socket is opened
        let ctx = zmq::Context::new();
        assert!(matches!(
            Link::zmq("a", &ctx, &params),
            Err(LinkError::InvalidParams(_))
        ));
    }

    #[test]
    fn test_threaded_links() {
        let (ta, tb) = ChannelTransport::pair();
        let params = LinkParams::default();

        let mut a = Link::new("a", ta, &params).unwrap();
        let mut b = Link::new("b", tb, &params).unwrap();

        let id = a.send(Payload::Cmd("hello".into()), Priority::Med);

        a.start().unwrap();
        b.start().unwrap();
        assert!(a.is_running());

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut received = None;
        while Instant::now() < deadline {
            if let Some(m) = b.receive() {
                received = Some(m);
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }

        let msg = received.expect("Message not received");
        assert_eq!(msg.msg_id, id);
        assert_eq!(msg.sender, "a");
        assert_eq!(msg.data, Payload::Cmd("hello".into()));

        // Both ends should see each other's heartbeats
        while Instant::now() < deadline && !(a.latency().is_connected() && b.latency().is_connected()) {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(a.latency().is_connected());
        assert!(b.latency().is_connected());

        a.set_sleep(true);
        assert!(a.is_sleeping());

        a.stop().unwrap();
        b.stop().unwrap();
        assert!(!a.is_running());

        // Restartable
        a.start().unwrap();
        a.stop().unwrap();
    }
}
