use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::ack::AckState;
use crate::bridge::headers::{ETHERNET_HEADER_LEN, ETHERTYPE_IPV4};
use crate::bridge::BridgeRewriter;
use crate::config::NodeConfig;
use crate::frame::EthernetFrame;
use crate::net::FrameSocket;
use crate::phy::{PhyError, SymbolRx, SymbolTx};
use crate::queue::{FrameQueue, PopError, PushError};
use crate::symbol::{Deframer, Framer, LinkEvent};

const SOCKET_RECV_TIMEOUT: Duration = Duration::from_millis(100);
const ENQUEUE_TIMEOUT: Duration = Duration::from_millis(100);
const ACK_WAIT_SLICE: Duration = Duration::from_millis(100);

#[cfg(feature = "arq_ack")]
const ARQ_ACK_TIMEOUT: Duration = Duration::from_millis(200);
#[cfg(feature = "arq_ack")]
const ARQ_MAX_RESENDS: u32 = 1;

/// Everything the five stages share: one queue per direction, the two
/// ACK flags and the shutdown signal. No state lives outside of it.
pub struct LinkContext {
    pub up: FrameQueue,
    pub down: FrameQueue,
    pub ack: AckState,
    pub shutdown: AtomicBool,
}

impl LinkContext {
    fn new(queue_capacity: usize) -> Self {
        Self {
            up: FrameQueue::new(queue_capacity),
            down: FrameQueue::new(queue_capacity),
            ack: AckState::new(),
            shutdown: AtomicBool::new(false),
        }
    }
}

/// Owns the five stage threads of one node. Construction wires the
/// stages to the injected ports and socket; `shutdown` stops and joins
/// them all.
pub struct PipelineSupervisor {
    context: Arc<LinkContext>,
    handles: Vec<JoinHandle<()>>,
}

impl PipelineSupervisor {
    pub fn launch<R, D, T, F, S>(
        config: NodeConfig,
        optical_rx: R,
        deframer: D,
        optical_tx: T,
        framer: F,
        socket: S,
    ) -> Self
    where
        R: SymbolRx + Send + 'static,
        D: Deframer<Symbol = R::Symbol> + Send + 'static,
        T: SymbolTx + Send + 'static,
        F: Framer<Symbol = T::Symbol> + Send + Sync + 'static,
        S: FrameSocket + Send + Sync + 'static,
    {
        let context = Arc::new(LinkContext::new(config.queue_capacity));
        let rewriter = BridgeRewriter::new(&config);
        let socket = Arc::new(socket);
        // One transmit-side lock shared by the data and ACK senders so
        // symbols of the two never interleave mid-sequence.
        let optical_tx = Arc::new(Mutex::new(optical_tx));
        let framer = Arc::new(framer);
        let own_mac = config.own_mac;

        info!("Launching {:?} pipeline on {}", config.role, config.iface);

        let mut handles = Vec::with_capacity(5);

        let stage_context = context.clone();
        handles.push(std::thread::spawn(move || {
            optical_ingress(&stage_context, optical_rx, deframer)
        }));

        let stage_context = context.clone();
        let stage_socket = socket.clone();
        handles.push(std::thread::spawn(move || {
            network_egress(&stage_context, rewriter, &*stage_socket)
        }));

        let stage_context = context.clone();
        handles.push(std::thread::spawn(move || {
            network_ingress(&stage_context, &*socket, own_mac)
        }));

        let stage_context = context.clone();
        let stage_tx = optical_tx.clone();
        let stage_framer = framer.clone();
        handles.push(std::thread::spawn(move || {
            optical_egress(&stage_context, &stage_tx, &*stage_framer)
        }));

        let stage_context = context.clone();
        handles.push(std::thread::spawn(move || {
            ack_sender(&stage_context, &optical_tx, &*framer)
        }));

        Self { context, handles }
    }

    pub fn context(&self) -> &Arc<LinkContext> {
        &self.context
    }

    /// Signals every stage, wakes all waiters and joins the threads.
    pub fn shutdown(self) {
        info!("Shutting down pipeline...");
        self.context.shutdown.store(true, Ordering::Relaxed);
        self.context.up.close();
        self.context.down.close();

        for handle in self.handles {
            let _ = handle.join();
        }
        info!("Pipeline stopped");
    }
}

/// Exact destination-MAC match plus EtherType IPv4; everything else on
/// the wire is ignored.
fn accepts(frame: &EthernetFrame, own_mac: [u8; 6]) -> bool {
    let bytes = frame.as_bytes();
    if bytes.len() < ETHERNET_HEADER_LEN {
        return false;
    }
    bytes[0..6] == own_mac && u16::from_be_bytes([bytes[12], bytes[13]]) == ETHERTYPE_IPV4
}

/// Optical symbols in, frames (or ACK flag updates) out.
fn optical_ingress<R, D>(context: &LinkContext, optical_rx: R, mut deframer: D)
where
    R: SymbolRx,
    D: Deframer<Symbol = R::Symbol>,
{
    loop {
        let symbol = match optical_rx.recv(&context.shutdown) {
            Ok(symbol) => symbol,
            Err(PhyError::Timeout) => {
                warn!("Optical receive timed out, still polling");
                continue;
            }
            Err(PhyError::Stopped) | Err(PhyError::Disconnected) => break,
        };

        match deframer.update(symbol) {
            Some(LinkEvent::Frame(frame)) => {
                #[cfg(feature = "arq_ack")]
                context.ack.request_send();

                match context.down.push_timeout(frame, Some(ENQUEUE_TIMEOUT)) {
                    Ok(()) => {}
                    Err(PushError::Closed(_)) => break,
                    Err(_) => warn!("Downlink queue full, frame dropped"),
                }
            }
            Some(LinkEvent::Ack) => context.ack.set_received(),
            Some(LinkEvent::HeaderMismatch) => warn!("Optical header missing, resynchronizing"),
            Some(LinkEvent::TooLarge { declared }) => {
                warn!("Oversize optical frame of {declared} bytes dropped")
            }
            None => {}
        }
    }
}

/// Downlink queue through the bridge rewriter onto the wire.
fn network_egress<S: FrameSocket + ?Sized>(
    context: &LinkContext,
    rewriter: BridgeRewriter,
    socket: &S,
) {
    loop {
        let frame = match context.down.pop_timeout(None) {
            Ok(frame) => frame,
            Err(PopError::Closed) => break,
            Err(_) => continue,
        };

        if let Some(rewritten) = rewriter.rewrite(&frame) {
            if let Err(err) = socket.send_frame(&rewritten) {
                warn!("Network send failed: {err}");
            }
        }
    }
}

/// Socket receive, destination filter, uplink queue.
fn network_ingress<S: FrameSocket + ?Sized>(context: &LinkContext, socket: &S, own_mac: [u8; 6]) {
    while !context.shutdown.load(Ordering::Relaxed) {
        let frame = match socket.recv_frame(SOCKET_RECV_TIMEOUT) {
            Ok(Some(frame)) => frame,
            Ok(None) => continue,
            Err(err) => {
                warn!("Network receive failed: {err}");
                break;
            }
        };

        if !accepts(&frame, own_mac) {
            continue;
        }

        match context.up.push_timeout(frame, Some(ENQUEUE_TIMEOUT)) {
            Ok(()) => {}
            Err(PushError::Closed(_)) => break,
            Err(_) => warn!("Uplink queue full, frame dropped"),
        }
    }
}

/// Sends one whole symbol sequence under the transmit lock.
fn send_sequence<T: SymbolTx>(
    optical_tx: &Mutex<T>,
    symbols: Vec<T::Symbol>,
    stop: &AtomicBool,
) -> Result<(), PhyError> {
    let port = optical_tx.lock().unwrap();
    for symbol in symbols {
        port.send(symbol, stop)?;
    }
    Ok(())
}

/// Uplink queue to optical symbols. With `arq_ack` each frame is
/// retransmitted a bounded number of times until acknowledged;
/// without it every frame goes out exactly once.
fn optical_egress<T, F>(context: &LinkContext, optical_tx: &Mutex<T>, framer: &F)
where
    T: SymbolTx,
    F: Framer<Symbol = T::Symbol>,
{
    loop {
        let frame = match context.up.pop_timeout(None) {
            Ok(frame) => frame,
            Err(PopError::Closed) => break,
            Err(_) => continue,
        };

        #[cfg(feature = "arq_ack")]
        context.ack.clear_received();

        if send_sequence(optical_tx, framer.encode(&frame), &context.shutdown).is_err() {
            break;
        }

        #[cfg(feature = "arq_ack")]
        {
            let mut resends = 0;
            while !context.ack.wait_received(ARQ_ACK_TIMEOUT) {
                if resends >= ARQ_MAX_RESENDS || context.shutdown.load(Ordering::Relaxed) {
                    break;
                }
                resends += 1;
                warn!("No ACK within {ARQ_ACK_TIMEOUT:?}, resend {resends}");
                if send_sequence(optical_tx, framer.encode(&frame), &context.shutdown).is_err() {
                    return;
                }
            }
        }
    }
}

/// Waits for an ACK transmission request and emits the fixed pattern,
/// sharing the transmit lock with the data sender.
fn ack_sender<T, F>(context: &LinkContext, optical_tx: &Mutex<T>, framer: &F)
where
    T: SymbolTx,
    F: Framer<Symbol = T::Symbol>,
{
    while !context.shutdown.load(Ordering::Relaxed) {
        if !context.ack.take_send_request(ACK_WAIT_SLICE) {
            continue;
        }

        if send_sequence(optical_tx, framer.ack(), &context.shutdown).is_err() {
            break;
        }
    }
}
