//! Connection transport.
//!
//! A connection is split into two pipes, each served by exactly one task:
//!
//! - the **reader** task reads frames, decodes each into a typed packet and
//!   queues the result for the single consumer holding the
//!   [`PacketReceiver`];
//! - the **writer** task drains one queue fed by every clone of the
//!   [`PacketSender`], so concurrent senders end up in one ordered stream.
//!
//! Per-packet decode failures are handed to the consumer as errors and the
//! reader carries on with the next frame. Stream failures end the reader,
//! which the consumer observes as `None`.

use std::marker::PhantomData;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::codec::{self, read_frame, write_frame};
use crate::error::NetError;
use crate::packet::{Packet, WirePacket};

/// Decoded packets buffered between the reader task and the consumer.
const INBOUND_CAPACITY: usize = 256;

/// Cloneable handle onto a connection's single outbound queue.
#[derive(Debug)]
pub struct PacketSender<P> {
    tx: mpsc::UnboundedSender<P>,
}

impl<P> Clone for PacketSender<P> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<P: Packet> PacketSender<P> {
    /// Queue a packet for the writer task.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Closed`] once the writer has gone away. Sending
    /// into a closed connection never panics.
    pub fn send(&self, packet: P) -> Result<(), NetError> {
        self.tx.send(packet).map_err(|_| NetError::Closed)
    }

    /// Returns `true` once nothing sent can reach the peer any more.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// The consuming end of a connection's inbound pipe.
#[derive(Debug)]
pub struct PacketReceiver<P> {
    rx: mpsc::Receiver<Result<P, NetError>>,
}

impl<P: Packet> PacketReceiver<P> {
    /// Wait for the next inbound item.
    ///
    /// `Some(Err(_))` is a packet that could not be decoded; the stream is
    /// still open. `None` means the stream has ended or broken.
    pub async fn recv(&mut self) -> Option<Result<P, NetError>> {
        self.rx.recv().await
    }
}

/// Create an outbound queue without a socket behind it.
///
/// The writer task of [`split`] consumes the returned receiver; tests and
/// in-process peers can consume it directly.
#[must_use]
pub fn outbound<P>() -> (PacketSender<P>, mpsc::UnboundedReceiver<P>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (PacketSender { tx }, rx)
}

/// Create an inbound pipe without a socket behind it.
#[must_use]
pub fn inbound<P>() -> (mpsc::Sender<Result<P, NetError>>, PacketReceiver<P>) {
    let (tx, rx) = mpsc::channel(INBOUND_CAPACITY);
    (tx, PacketReceiver { rx })
}

/// Split a byte stream into a typed packet pipe pair.
///
/// `In` is what the peer sends us, `Out` what we send. Spawns the reader and
/// writer tasks on the current tokio runtime.
pub fn split<In, Out, S>(stream: S) -> (PacketSender<Out>, PacketReceiver<In>)
where
    In: Packet,
    Out: Packet,
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (reader, writer) = tokio::io::split(stream);
    let (out_tx, out_rx) = outbound::<Out>();
    let (in_tx, in_rx) = inbound::<In>();
    tokio::spawn(read_loop(reader, in_tx));
    tokio::spawn(write_loop(writer, out_rx));
    (out_tx, in_rx)
}

async fn read_loop<In, R>(mut reader: R, tx: mpsc::Sender<Result<In, NetError>>)
where
    In: Packet,
    R: AsyncRead + Unpin,
{
    loop {
        let bytes = match read_frame(&mut reader).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!("peer closed the stream");
                break;
            }
            Err(e) => {
                warn!(%e, "inbound stream failed");
                break;
            }
        };
        let item = codec::decode::<WirePacket>(&bytes).and_then(In::from_wire);
        if tx.send(item).await.is_err() {
            debug!("packet consumer went away");
            break;
        }
    }
}

async fn write_loop<Out, W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<Out>)
where
    Out: Packet,
    W: AsyncWrite + Unpin,
{
    while let Some(packet) = rx.recv().await {
        let tag = packet.tag();
        let bytes = match packet.to_wire().and_then(|wire| codec::encode(&wire)) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(tag, %e, "dropping packet that failed to encode");
                continue;
            }
        };
        if let Err(e) = write_frame(&mut writer, &bytes).await {
            warn!(tag, %e, "outbound stream failed");
            break;
        }
    }
    let _ = writer.shutdown().await;
    debug!("writer finished");
}

/// TCP entry points.
///
/// `In` and `Out` have the same meaning as in [`split`].
#[derive(Debug)]
pub struct Transport<In, Out> {
    _packets: PhantomData<fn(In) -> Out>,
}

impl<In: Packet, Out: Packet> Transport<In, Out> {
    /// Dial `addr` and split the connection.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Io`] if the connection cannot be established.
    pub async fn connect<A>(addr: A) -> Result<(PacketSender<Out>, PacketReceiver<In>), NetError>
    where
        A: ToSocketAddrs + std::fmt::Debug,
    {
        info!(?addr, "connecting");
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        info!(peer = ?stream.peer_addr().ok(), "connection established");
        Ok(Self::accept(stream))
    }

    /// Split an accepted connection.
    #[must_use]
    pub fn accept(stream: TcpStream) -> (PacketSender<Out>, PacketReceiver<In>) {
        split::<In, Out, _>(stream)
    }
}
