//! SSH2 packet reader/writer over a byte stream.
//!
//! [`Packetizer`] turns a bidirectional byte stream into a sequence of
//! authenticated, optionally encrypted SSH messages and tracks when the
//! session must rekey.
//!
//! # Concurrency
//!
//! - One task reads. `read` takes the read lock for the whole packet, so a
//!   second concurrent reader simply waits its turn.
//! - Any number of tasks write. The write lock covers padding, MAC,
//!   encryption, the outbound sequence number, the stream write and the
//!   outbound rekey counters, so packets leave in sequence-number order.
//! - The inbound cipher is only swapped between packets. If a read holds the
//!   reader state, the new slot is parked; the reader installs it on its next
//!   poll for a packet's first block, before deciphering any of its bytes.
//!
//! # Blocking model
//!
//! Each underlying read/write attempt is bounded by
//! [`PacketizerConfig::poll_interval`]. A timed-out attempt is retried, not
//! reported. Between attempts the loops re-check the closed flag, and the
//! read loop polls the keep-alive scheduler.
//!
//! # MAC ordering
//!
//! Outbound: MAC over `uint32 sequence || plaintext packet`, then encrypt the
//! packet. Inbound: decrypt, then verify the MAC over the same plaintext.
//! Tags are compared in constant time.
//!
//! # Example
//!
//! ```rust
//! use wirelay_proto::ssh::config::PacketizerConfig;
//! use wirelay_proto::ssh::packetizer::Packetizer;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let (a, b) = tokio::io::duplex(4096);
//! let client = Packetizer::from_stream(a, PacketizerConfig::default())?;
//! let server = Packetizer::from_stream(b, PacketizerConfig::default())?;
//!
//! client.write(b"\x05ssh-userauth").await?;
//! let packet = server.read().await?.expect("packet");
//! assert_eq!(packet.payload(), b"\x05ssh-userauth");
//! assert_eq!(packet.sequence(), 0);
//! # Ok(())
//! # }
//! ```

use crate::ssh::config::PacketizerConfig;
use crate::ssh::crypto::{CipherSlot, MAX_BLOCK_SIZE};
use crate::ssh::keepalive::{create_keepalive_message, KeepAliveHandler, KeepAliveScheduler};
use crate::ssh::logging;
use crate::ssh::message::describe_payload;
use crate::ssh::packet::{frame, parse_header, Direction, Packet, HEADER_LEN, PLAINTEXT_BLOCK_SIZE};
use crate::ssh::rekey::RekeyPolicy;
use crate::ssh::sequence::SequenceCounter;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, MutexGuard};
use std::time::Duration;
use subtle::ConstantTimeEq;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{watch, Mutex};
use tokio::time::{timeout, Instant};
use wirelay_platform::{WirelayError, WirelayResult};

/// Random bytes carried by keep-alive SSH_MSG_IGNORE messages.
pub const KEEPALIVE_DATA_LEN: usize = 32;

struct ReadState<R> {
    stream: R,
    slot: Option<CipherSlot>,
    sequence: SequenceCounter,
}

struct WriteState<W> {
    stream: W,
    slot: Option<CipherSlot>,
    sequence: SequenceCounter,
    rng: Box<dyn RngCore + Send>,
}

/// SSH binary packet reader/writer.
pub struct Packetizer<R, W> {
    reader: Mutex<ReadState<R>>,
    writer: Mutex<WriteState<W>>,
    pending_inbound: std::sync::Mutex<Option<CipherSlot>>,
    rekey: std::sync::Mutex<RekeyPolicy>,
    rekey_tx: watch::Sender<bool>,
    keepalive: std::sync::Mutex<KeepAliveScheduler>,
    outbound_active: AtomicBool,
    closed: AtomicBool,
    config: PacketizerConfig,
}

impl<R, W> std::fmt::Debug for Packetizer<R, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Packetizer")
            .field("config", &self.config)
            .field("outbound_active", &self.outbound_active.load(Ordering::Relaxed))
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

// Poisoning only means another thread panicked mid-update of plain counters.
fn lock<T>(mutex: &std::sync::Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn is_transient(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::TimedOut
    )
}

impl<S> Packetizer<ReadHalf<S>, WriteHalf<S>>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Creates a packetizer over a single duplex stream such as a `TcpStream`.
    pub fn from_stream(stream: S, config: PacketizerConfig) -> WirelayResult<Self> {
        let (reader, writer) = tokio::io::split(stream);
        Self::new(reader, writer, config)
    }
}

impl<R, W> Packetizer<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Creates a packetizer in plaintext mode over separate read/write halves.
    ///
    /// # Errors
    ///
    /// Returns [`WirelayError::Config`] if `config` fails validation.
    pub fn new(reader: R, writer: W, config: PacketizerConfig) -> WirelayResult<Self> {
        config.validate()?;
        let (rekey_tx, _) = watch::channel(false);
        Ok(Self {
            reader: Mutex::new(ReadState {
                stream: reader,
                slot: None,
                sequence: SequenceCounter::new(),
            }),
            writer: Mutex::new(WriteState {
                stream: writer,
                slot: None,
                sequence: SequenceCounter::new(),
                rng: Box::new(StdRng::from_entropy()),
            }),
            pending_inbound: std::sync::Mutex::new(None),
            rekey: std::sync::Mutex::new(RekeyPolicy::new(config.rekey)),
            rekey_tx,
            keepalive: std::sync::Mutex::new(KeepAliveScheduler::new()),
            outbound_active: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            config,
        })
    }

    /// Replaces the randomness source used for padding bytes.
    pub fn with_rng(mut self, rng: impl RngCore + Send + 'static) -> Self {
        self.writer.get_mut().rng = Box::new(rng);
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &PacketizerConfig {
        &self.config
    }

    /// Marks the connection closed.
    ///
    /// Blocked reads return "no message" at their next poll; writes fail
    /// with [`WirelayError::Closed`].
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Returns true once [`Packetizer::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Returns true if it is time to renegotiate keys.
    pub fn need_rekey(&self) -> bool {
        lock(&self.rekey).need_rekey()
    }

    /// Subscribes to changes of the rekey flag.
    ///
    /// The value flips to `true` when traffic crosses a rekey limit and back
    /// to `false` once both directions have installed new ciphers.
    pub fn subscribe_rekey(&self) -> watch::Receiver<bool> {
        self.rekey_tx.subscribe()
    }

    /// Configures the idle keep-alive. A zero interval disables it.
    pub fn set_keep_alive(&self, interval: Duration, handler: KeepAliveHandler) {
        lock(&self.keepalive).configure(interval, handler);
    }

    /// Installs a new outbound cipher.
    ///
    /// Waits for any in-flight write to finish; the next packet written uses
    /// the new slot.
    pub async fn install_outbound_cipher(&self, slot: CipherSlot) {
        let mut state = self.writer.lock().await;
        logging::log_cipher_installed(Direction::Outbound, slot.block_size(), slot.mac_size());
        state.slot = Some(slot);
        self.outbound_active.store(true, Ordering::Release);
        lock(&self.rekey).outbound_installed();
        self.publish_rekey_state();
    }

    /// Installs a new inbound cipher.
    ///
    /// Takes effect immediately if no read is in progress. Otherwise the slot
    /// is handed to the reader. A reader waiting for the next packet installs
    /// it before deciphering that packet's first block; a packet whose first
    /// block was already deciphered finishes with the old slot.
    pub fn install_inbound_cipher(&self, slot: CipherSlot) {
        match self.reader.try_lock() {
            Ok(mut state) => {
                lock(&self.pending_inbound).take();
                self.activate_inbound(&mut state, slot);
            }
            Err(_) => {
                *lock(&self.pending_inbound) = Some(slot);
                logging::log_cipher_deferred();
            }
        }
    }

    /// Writes one message.
    ///
    /// `payload` starts with the message-type byte. The message is padded to
    /// the outbound block size and, if a cipher is installed, authenticated
    /// and encrypted.
    ///
    /// # Errors
    ///
    /// - [`WirelayError::Closed`] after [`Packetizer::close`]
    /// - [`WirelayError::Protocol`] for payloads over the packet size limit
    /// - [`WirelayError::Crypto`] if the cipher or MAC engine fails
    /// - [`WirelayError::Io`] if the stream fails
    ///
    /// Any error leaves the outbound stream in an unknown state; the
    /// connection must be torn down.
    pub async fn write(&self, payload: &[u8]) -> WirelayResult<()> {
        if self.is_closed() {
            return Err(WirelayError::Closed);
        }
        let mut state = self.writer.lock().await;
        let result = self.write_packet(&mut state, payload).await;
        if let Err(e) = &result {
            logging::log_failure(Direction::Outbound, e);
        }
        result
    }

    /// Reads one message.
    ///
    /// Returns `Ok(None)` on end of stream, including end of stream in the
    /// middle of a packet, and once the packetizer has been closed.
    ///
    /// A corrupted length field is only detectable through framing checks,
    /// since the MAC covers bytes that have to be read first. Such a packet
    /// fails with [`WirelayError::Framing`] or, if the stream ends before the
    /// bogus length is satisfied, returns `Ok(None)`. It never yields a
    /// message.
    ///
    /// # Errors
    ///
    /// - [`WirelayError::Framing`] for a misaligned length or bad padding
    /// - [`WirelayError::Authentication`] if the MAC does not match
    /// - [`WirelayError::RekeyIgnored`] if the peer keeps sending after a rekey request
    /// - [`WirelayError::Crypto`] / [`WirelayError::Io`] on engine or stream failure
    pub async fn read(&self) -> WirelayResult<Option<Packet>> {
        if self.is_closed() {
            return Ok(None);
        }
        let mut state = self.reader.lock().await;
        self.apply_pending_inbound(&mut state);
        let result = self.read_packet(&mut state).await;
        if let Err(e) = &result {
            logging::log_failure(Direction::Inbound, e);
        }
        result
    }

    /// Reads one banner line before any cipher is active.
    ///
    /// Bytes are consumed one at a time so nothing past the line terminator
    /// is taken from the stream. A trailing `\r` is stripped. A zero
    /// `deadline` waits forever.
    ///
    /// Returns `Ok(None)` on end of stream, and whatever was accumulated so
    /// far if the packetizer is closed mid-line.
    ///
    /// # Errors
    ///
    /// - [`WirelayError::Timeout`] when the deadline passes
    /// - [`WirelayError::Protocol`] for a line longer than `max_banner_line`
    pub async fn read_banner_line(&self, deadline: Duration) -> WirelayResult<Option<String>> {
        let deadline = (!deadline.is_zero()).then(|| Instant::now() + deadline);
        let mut state = self.reader.lock().await;
        let mut line = Vec::new();
        let mut byte = [0u8; 1];

        loop {
            let wait = match deadline {
                Some(at) => self
                    .config
                    .poll_interval
                    .min(at.saturating_duration_since(Instant::now())),
                None => self.config.poll_interval,
            };
            match timeout(wait, state.stream.read(&mut byte)).await {
                Ok(Ok(0)) => return Ok(None),
                Ok(Ok(_)) => {
                    if byte[0] == b'\n' {
                        if line.last() == Some(&b'\r') {
                            line.pop();
                        }
                        return Ok(Some(String::from_utf8_lossy(&line).into_owned()));
                    }
                    if line.len() >= self.config.max_banner_line {
                        return Err(WirelayError::Protocol(format!(
                            "Banner line longer than {} bytes",
                            self.config.max_banner_line
                        )));
                    }
                    line.push(byte[0]);
                }
                Ok(Err(e)) if is_transient(&e) => {}
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => {}
            }

            if deadline.is_some_and(|at| Instant::now() >= at) {
                return Err(WirelayError::Timeout(
                    "No banner line before deadline".to_string(),
                ));
            }
            if self.is_closed() {
                return Ok(Some(String::from_utf8_lossy(&line).into_owned()));
            }
        }
    }

    /// Writes a banner line exactly as given, without framing.
    ///
    /// The caller supplies the `\r\n` terminator.
    pub async fn write_banner_line(&self, line: &str) -> WirelayResult<()> {
        if self.is_closed() {
            return Err(WirelayError::Closed);
        }
        let mut state = self.writer.lock().await;
        self.write_full(&mut state.stream, line.as_bytes()).await?;
        state.stream.flush().await?;
        Ok(())
    }

    /// Consumes the packetizer and returns the underlying halves.
    pub fn into_parts(self) -> (R, W) {
        (
            self.reader.into_inner().stream,
            self.writer.into_inner().stream,
        )
    }

    async fn write_packet(&self, state: &mut WriteState<W>, payload: &[u8]) -> WirelayResult<()> {
        let block_size = state
            .slot
            .as_ref()
            .map_or(PLAINTEXT_BLOCK_SIZE, CipherSlot::block_size);
        let mut packet = frame(payload, block_size, state.rng.as_mut())?;
        let length = packet.len();

        logging::log_packet(Direction::Outbound, &describe_payload(payload), length);
        if self.config.dump_packets {
            logging::log_dump(Direction::Outbound, &packet);
        }

        if let Some(slot) = state.slot.as_mut() {
            let tag = slot.sign(state.sequence.current(), &packet)?;
            slot.apply(&mut packet)?;
            packet.extend_from_slice(&tag);
        }
        state.sequence.advance();

        self.write_full(&mut state.stream, &packet).await?;
        state.stream.flush().await?;

        self.account_sent(length as u64);
        Ok(())
    }

    async fn read_packet(&self, state: &mut ReadState<R>) -> WirelayResult<Option<Packet>> {
        let (raw, block_size) = match self.read_first_block(state).await? {
            Some(first) => first,
            None => return Ok(None),
        };

        let mut first = raw[..block_size].to_vec();
        if let Some(slot) = state.slot.as_mut() {
            slot.apply(&mut first)?;
        }
        if self.config.dump_packets {
            logging::log_dump(Direction::Inbound, &first);
        }

        let header = parse_header(&first, block_size)?;
        let carried = &raw[block_size..];
        let read_from = block_size + carried.len();
        if read_from > header.frame_length() {
            return Err(WirelayError::Framing(format!(
                "Packet of {} bytes shorter than its first read",
                header.frame_length()
            )));
        }
        let mut packet = vec![0u8; header.frame_length()];
        packet[..block_size].copy_from_slice(&first);
        packet[block_size..read_from].copy_from_slice(carried);
        if !self
            .read_full(&mut state.stream, &mut packet[read_from..])
            .await?
        {
            return Ok(None);
        }

        let sequence = state.sequence.current();
        let mut mac_size = 0;
        if let Some(slot) = state.slot.as_mut() {
            slot.apply(&mut packet[block_size..])?;
            let expected = slot.sign(sequence, &packet)?;

            mac_size = slot.mac_size();
            let mut received = vec![0u8; mac_size];
            if !self.read_full(&mut state.stream, &mut received).await? {
                return Ok(None);
            }
            if !bool::from(expected.as_slice().ct_eq(received.as_slice())) {
                return Err(WirelayError::Authentication(format!(
                    "MAC mismatch on packet {}",
                    sequence
                )));
            }
        }
        if self.config.dump_packets {
            logging::log_dump(Direction::Inbound, &packet[block_size..]);
        }

        state.sequence.advance();
        let payload = packet[HEADER_LEN..HEADER_LEN + header.payload_length()].to_vec();
        let packet = Packet::new(payload, sequence);
        logging::log_packet(Direction::Inbound, &packet.describe(), packet.payload().len());

        self.account_received((header.packet_length() + mac_size + 4) as u64)?;
        Ok(Some(packet))
    }

    // Reads raw bytes until a whole first block is buffered, installing a
    // parked inbound slot on every poll. Returns the raw bytes with the block
    // size they were read for; bytes past the block (left over from a larger
    // previous block size) belong to the rest of the packet.
    async fn read_first_block(
        &self,
        state: &mut ReadState<R>,
    ) -> WirelayResult<Option<(Vec<u8>, usize)>> {
        let mut raw = Vec::with_capacity(MAX_BLOCK_SIZE);
        let mut chunk = [0u8; MAX_BLOCK_SIZE];
        loop {
            self.apply_pending_inbound(state);
            let block_size = state
                .slot
                .as_ref()
                .map_or(PLAINTEXT_BLOCK_SIZE, CipherSlot::block_size);
            if raw.len() >= block_size {
                return Ok(Some((raw, block_size)));
            }

            let want = block_size - raw.len();
            match timeout(self.config.poll_interval, state.stream.read(&mut chunk[..want])).await {
                Ok(Ok(0)) => return Ok(None),
                Ok(Ok(n)) => {
                    raw.extend_from_slice(&chunk[..n]);
                    if raw.len() >= block_size {
                        continue;
                    }
                }
                Ok(Err(e)) if is_transient(&e) => {}
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => {}
            }
            if self.is_closed() {
                return Ok(None);
            }
            self.check_keep_alive();
        }
    }

    // Returns Ok(false) on EOF or close; partial data is discarded.
    async fn read_full(&self, stream: &mut R, buf: &mut [u8]) -> WirelayResult<bool> {
        let mut filled = 0;
        while filled < buf.len() {
            match timeout(self.config.poll_interval, stream.read(&mut buf[filled..])).await {
                Ok(Ok(0)) => return Ok(false),
                Ok(Ok(n)) => filled += n,
                Ok(Err(e)) if is_transient(&e) => {}
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => {}
            }
            if filled == buf.len() {
                break;
            }
            if self.is_closed() {
                return Ok(false);
            }
            self.check_keep_alive();
        }
        Ok(true)
    }

    async fn write_full(&self, stream: &mut W, buf: &[u8]) -> WirelayResult<()> {
        let mut written = 0;
        while written < buf.len() {
            match timeout(self.config.poll_interval, stream.write(&buf[written..])).await {
                Ok(Ok(0)) => {
                    return Err(WirelayError::Io(std::io::Error::new(
                        ErrorKind::WriteZero,
                        "stream accepted no bytes",
                    )))
                }
                Ok(Ok(n)) => written += n,
                Ok(Err(e)) if is_transient(&e) => {}
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => {}
            }
            if written < buf.len() && self.is_closed() {
                return Err(WirelayError::Closed);
            }
        }
        Ok(())
    }

    fn apply_pending_inbound(&self, state: &mut ReadState<R>) {
        let pending = lock(&self.pending_inbound).take();
        if let Some(slot) = pending {
            self.activate_inbound(state, slot);
        }
    }

    fn activate_inbound(&self, state: &mut ReadState<R>, slot: CipherSlot) {
        logging::log_cipher_installed(Direction::Inbound, slot.block_size(), slot.mac_size());
        state.slot = Some(slot);
        lock(&self.rekey).inbound_installed();
        self.publish_rekey_state();
    }

    fn account_sent(&self, bytes: u64) {
        let triggered = {
            let mut rekey = lock(&self.rekey);
            rekey.record_sent(bytes).then(|| rekey.sent())
        };
        if let Some((bytes, packets)) = triggered {
            logging::log_rekey_triggered(Direction::Outbound, packets, bytes);
            self.publish_rekey_state();
        }
    }

    fn account_received(&self, bytes: u64) -> WirelayResult<()> {
        let triggered = {
            let mut rekey = lock(&self.rekey);
            rekey.record_received(bytes)?.then(|| rekey.received())
        };
        if let Some((bytes, packets)) = triggered {
            logging::log_rekey_triggered(Direction::Inbound, packets, bytes);
            self.publish_rekey_state();
        }
        Ok(())
    }

    fn publish_rekey_state(&self) {
        let need = self.need_rekey();
        self.rekey_tx.send_if_modified(|current| {
            if *current == need {
                return false;
            }
            *current = need;
            true
        });
    }

    fn check_keep_alive(&self) {
        let cipher_active = self.outbound_active.load(Ordering::Acquire);
        let rekey_pending = self.need_rekey();
        let (due, interval) = {
            let mut scheduler = lock(&self.keepalive);
            let due = scheduler.poll(Instant::now(), cipher_active, rekey_pending);
            (due, scheduler.interval())
        };
        if let Some(handler) = due {
            logging::log_keepalive_fired(interval);
            handler();
        }
    }
}

impl<R, W> Packetizer<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Enables keep-alives that send an SSH_MSG_IGNORE through [`Packetizer::write`].
    ///
    /// Each keep-alive is written from a spawned task so the reader is never
    /// blocked on the write lock. The handler holds only a weak reference.
    pub fn enable_ignore_keep_alive(self: &Arc<Self>, interval: Duration) {
        let weak = Arc::downgrade(self);
        self.set_keep_alive(
            interval,
            Arc::new(move || {
                if let Some(packetizer) = weak.upgrade() {
                    tokio::spawn(async move {
                        let msg = create_keepalive_message(KEEPALIVE_DATA_LEN);
                        if let Err(e) = packetizer.write(&msg).await {
                            tracing::warn!(error = %e, "Keep-alive write failed");
                        }
                    });
                }
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssh::crypto::{CipherAlgorithm, MacAlgorithm};
    use crate::ssh::message::MessageType;
    use tokio::io::DuplexStream;

    type Pair = Packetizer<ReadHalf<DuplexStream>, WriteHalf<DuplexStream>>;

    fn pair() -> (Pair, Pair) {
        let (a, b) = tokio::io::duplex(1 << 16);
        (
            Packetizer::from_stream(a, PacketizerConfig::default()).unwrap(),
            Packetizer::from_stream(b, PacketizerConfig::default()).unwrap(),
        )
    }

    fn slot(direction: Direction) -> CipherSlot {
        CipherSlot::from_algorithms(
            CipherAlgorithm::Aes128Ctr,
            direction,
            &[0x11; 16],
            &[0x22; 16],
            MacAlgorithm::HmacSha256,
            &[0x33; 32],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_plaintext_round_trip() {
        let (a, b) = pair();
        a.write(b"\x00hello").await.unwrap();
        let packet = b.read().await.unwrap().unwrap();
        assert_eq!(packet.payload(), b"\x00hello");
        assert_eq!(packet.sequence(), 0);
    }

    #[tokio::test]
    async fn test_sequence_numbers_advance_per_direction() {
        let (a, b) = pair();
        for _ in 0..3 {
            a.write(&[MessageType::Ignore as u8]).await.unwrap();
        }
        b.write(&[MessageType::Ignore as u8]).await.unwrap();

        for expected in 0..3 {
            assert_eq!(b.read().await.unwrap().unwrap().sequence(), expected);
        }
        assert_eq!(a.read().await.unwrap().unwrap().sequence(), 0);
    }

    #[tokio::test]
    async fn test_sequence_wraps_under_mac() {
        let (mut a, mut b) = pair();
        a.writer.get_mut().sequence = SequenceCounter::starting_at(u32::MAX);
        b.reader.get_mut().sequence = SequenceCounter::starting_at(u32::MAX);
        a.install_outbound_cipher(slot(Direction::Outbound)).await;
        b.install_inbound_cipher(slot(Direction::Inbound));

        a.write(b"\x02first").await.unwrap();
        a.write(b"\x02second").await.unwrap();

        let first = b.read().await.unwrap().unwrap();
        let second = b.read().await.unwrap().unwrap();
        assert_eq!(first.sequence(), u32::MAX);
        assert_eq!(second.sequence(), 0);
        assert_eq!(second.payload(), b"\x02second");
    }

    #[tokio::test]
    async fn test_inbound_install_reaches_waiting_reader() {
        let (a, b) = pair();
        let b = Arc::new(b);

        a.write(&[MessageType::NewKeys as u8]).await.unwrap();
        let newkeys = b.read().await.unwrap().unwrap();
        assert_eq!(newkeys.message_type(), Some(MessageType::NewKeys));

        let reader = Arc::clone(&b);
        let pending_read = tokio::spawn(async move { reader.read().await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Reader holds the state while waiting, so the slot is parked.
        b.install_inbound_cipher(slot(Direction::Inbound));
        assert!(lock(&b.pending_inbound).is_some());

        a.install_outbound_cipher(slot(Direction::Outbound)).await;
        a.write(b"\x05ssh-userauth").await.unwrap();

        let packet = pending_read.await.unwrap().unwrap().unwrap();
        assert_eq!(packet.payload(), b"\x05ssh-userauth");
        assert_eq!(packet.sequence(), 1);
        assert!(lock(&b.pending_inbound).is_none());
    }

    #[tokio::test]
    async fn test_parked_install_applies_before_bytes_arrive() {
        let (a, b) = pair();
        let b = Arc::new(b);

        let reader = Arc::clone(&b);
        let pending_read = tokio::spawn(async move { reader.read().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        b.install_inbound_cipher(slot(Direction::Inbound));

        // Reader picks the slot up on its next poll, with no data yet.
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(lock(&b.pending_inbound).is_none());

        a.install_outbound_cipher(slot(Direction::Outbound)).await;
        a.write(b"\x5eafter").await.unwrap();
        assert_eq!(
            pending_read.await.unwrap().unwrap().unwrap().payload(),
            b"\x5eafter"
        );
    }

    #[tokio::test]
    async fn test_write_after_close_fails() {
        let (a, _b) = pair();
        a.close();
        assert!(matches!(a.write(b"\x02").await, Err(WirelayError::Closed)));
        assert!(a.read().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let (a, _b) = tokio::io::duplex(64);
        let config = PacketizerConfig {
            poll_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(matches!(
            Packetizer::from_stream(a, config),
            Err(WirelayError::Config(_))
        ));
    }
}
