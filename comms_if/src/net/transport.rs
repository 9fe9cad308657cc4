//! # Link transports
//!
//! A transport moves serialised messages between the two ends of a link. All operations are
//! non-blocking, a transport which cannot currently send or receive must say so rather than wait.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::trace;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc::{self, Receiver, Sender, TryRecvError},
    Arc,
};

use super::{LinkError, LinkParams};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A non-blocking duplex channel of byte frames.
pub trait LinkTransport: Send {
    /// Attempt to send a frame without blocking.
    fn try_send(&mut self, frame: &[u8]) -> Result<SendOutcome, LinkError>;

    /// Attempt to receive a frame without blocking, `Ok(None)` if nothing is available.
    fn try_recv(&mut self) -> Result<Option<Vec<u8>>, LinkError>;
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Result of a send attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The frame has been handed to the transport
    Sent,

    /// The transport cannot accept the frame right now, try again later
    WouldBlock,
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Transport over a ZMQ `PAIR` socket.
pub struct ZmqTransport {
    socket: zmq::Socket,
}

/// In-process transport built on channels, mainly used for testing.
///
/// Create a connected pair with [`ChannelTransport::pair`].
pub struct ChannelTransport {
    tx: Sender<Vec<u8>>,

    rx: Receiver<Vec<u8>>,

    blocked: Arc<AtomicBool>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ZmqTransport {
    /// Create the socket and either bind it (if `params.bind` is set) or connect it to the peer.
    ///
    /// Connecting does not wait for the peer to exist, ZMQ will connect in the background.
    pub fn new(ctx: &zmq::Context, params: &LinkParams) -> Result<Self, LinkError> {
        let socket = ctx.socket(zmq::PAIR).map_err(LinkError::CreateSocketError)?;

        socket
            .set_linger(params.linger_ms)
            .map_err(|e| LinkError::SocketOptionError("linger".into(), e))?;

        let endpoint = params.endpoint();

        if params.bind {
            socket.bind(&endpoint)
        } else {
            socket.connect(&endpoint)
        }
        .map_err(|e| LinkError::ConnectError(endpoint.clone(), e))?;

        trace!("ZMQ PAIR socket on {} (bind: {})", endpoint, params.bind);

        Ok(Self { socket })
    }
}

impl LinkTransport for ZmqTransport {
    fn try_send(&mut self, frame: &[u8]) -> Result<SendOutcome, LinkError> {
        match self.socket.send(frame, zmq::DONTWAIT) {
            Ok(()) => Ok(SendOutcome::Sent),
            Err(zmq::Error::EAGAIN) => Ok(SendOutcome::WouldBlock),
            Err(e) => Err(LinkError::SocketError(e)),
        }
    }

    fn try_recv(&mut self) -> Result<Option<Vec<u8>>, LinkError> {
        match self.socket.recv_bytes(zmq::DONTWAIT) {
            Ok(b) => Ok(Some(b)),
            Err(zmq::Error::EAGAIN) => Ok(None),
            Err(e) => Err(LinkError::SocketError(e)),
        }
    }
}

impl ChannelTransport {
    /// Create two transports connected to each other.
    pub fn pair() -> (Self, Self) {
        let (tx_a, rx_b) = mpsc::channel();
        let (tx_b, rx_a) = mpsc::channel();

        (
            Self {
                tx: tx_a,
                rx: rx_a,
                blocked: Arc::new(AtomicBool::new(false)),
            },
            Self {
                tx: tx_b,
                rx: rx_b,
                blocked: Arc::new(AtomicBool::new(false)),
            },
        )
    }

    /// Handle which, while set, makes every send from this transport report
    /// [`SendOutcome::WouldBlock`].
    pub fn blocker(&self) -> Arc<AtomicBool> {
        self.blocked.clone()
    }
}

impl LinkTransport for ChannelTransport {
    fn try_send(&mut self, frame: &[u8]) -> Result<SendOutcome, LinkError> {
        if self.blocked.load(Ordering::Relaxed) {
            return Ok(SendOutcome::WouldBlock);
        }

        // A dropped peer loses the frame, the same as an unconnected socket
        if self.tx.send(frame.to_vec()).is_err() {
            trace!("ChannelTransport peer has gone, frame dropped");
        }

        Ok(SendOutcome::Sent)
    }

    fn try_recv(&mut self) -> Result<Option<Vec<u8>>, LinkError> {
        match self.rx.try_recv() {
            Ok(b) => Ok(Some(b)),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => Ok(None),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_channel_pair() {
        let (mut a, mut b) = ChannelTransport::pair();

        assert_eq!(b.try_recv().unwrap(), None);
        assert_eq!(a.try_send(b"hello").unwrap(), SendOutcome::Sent);
        assert_eq!(b.try_recv().unwrap(), Some(b"hello".to_vec()));

        b.try_send(b"back").unwrap();
        assert_eq!(a.try_recv().unwrap(), Some(b"back".to_vec()));
    }

    #[test]
    fn test_channel_blocked() {
        let (mut a, mut b) = ChannelTransport::pair();
        let blocker = a.blocker();

        blocker.store(true, Ordering::Relaxed);
        assert_eq!(a.try_send(b"x").unwrap(), SendOutcome::WouldBlock);
        assert_eq!(b.try_recv().unwrap(), None);

        blocker.store(false, Ordering::Relaxed);
        assert_eq!(a.try_send(b"x").unwrap(), SendOutcome::Sent);
        assert_eq!(b.try_recv().unwrap(), Some(b"x".to_vec()));
    }

    #[test]
    fn test_zmq_pair() {
        let ctx = zmq::Context::new();

        let mut server_params = LinkParams::default();
        server_params.bind = true;
        server_params.port = 42113;
        let mut server = ZmqTransport::new(&ctx, &server_params).unwrap();

        let mut client_params = server_params.clone();
        client_params.bind = false;
        client_params.host = "localhost".into();
        let mut client = ZmqTransport::new(&ctx, &client_params).unwrap();

        // Connection happens in the background so poll for a while
        let mut received = None;
        for _ in 0..200 {
            if client.try_send(b"ping").unwrap() == SendOutcome::Sent {
                if let Some(b) = server.try_recv().unwrap() {
                    received = Some(b);
                    break;
                }
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }

        assert_eq!(received, Some(b"ping".to_vec()));
    }
}
