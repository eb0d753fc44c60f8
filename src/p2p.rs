use {
    super::*,
    bitcoin::p2p::{
        Magic, ServiceFlags,
        address::Address as P2pAddress,
        message_blockdata::Inventory,
        message_network::VersionMessage,
    },
    tokio::io::{AsyncReadExt, AsyncWriteExt},
};

const PROTOCOL_VERSION: u32 = 70001;
const MAX_PAYLOAD_SIZE: usize = 4 * 1024 * 1024;
const MAX_RECONNECT_BACKOFF: Duration = Duration::from_secs(60);

/// One parsed wire frame: 24-byte header stripped, checksum verified.
#[derive(Debug, PartialEq)]
struct Frame {
    command: String,
    payload: Vec<u8>,
}

/// Listens on the coin's own p2p port for `inv` block announcements, a
/// lower-latency block-change signal than template polling. Handles the
/// minimum message set and relays no transactions.
pub(crate) struct P2pListener {
    host: String,
    port: u16,
    magic: Magic,
    relay_transactions: bool,
    block_tx: mpsc::UnboundedSender<BlockHash>,
    cancel: CancellationToken,
}

impl P2pListener {
    pub(crate) fn new(
        host: String,
        port: u16,
        magic: Magic,
        relay_transactions: bool,
        block_tx: mpsc::UnboundedSender<BlockHash>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            host,
            port,
            magic,
            relay_transactions,
            block_tx,
            cancel,
        }
    }

    pub(crate) fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut backoff = Duration::from_secs(1);

            loop {
                if self.cancel.is_cancelled() {
                    break;
                }

                match self.connect_and_listen().await {
                    Ok(()) => break,
                    Err(err) => {
                        warn!(
                            "P2P connection to {}:{} failed: {err}; reconnecting in {}s",
                            self.host,
                            self.port,
                            backoff.as_secs()
                        );
                    }
                }

                tokio::select! {
                    _ = self.cancel.cancelled() => break,
                    _ = sleep(backoff) => {}
                }

                backoff = (backoff * 2).min(MAX_RECONNECT_BACKOFF);
            }

            info!("P2P listener stopped");
        })
    }

    async fn connect_and_listen(&self) -> Result {
        let mut stream = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .context("p2p connect failed")?;

        info!("P2P connected to {}:{}", self.host, self.port);

        let version = self.version_message(&stream)?;
        stream
            .write_all(&build_frame(
                self.magic,
                "version",
                &consensus::serialize(&version),
            ))
            .await?;

        let mut buffer: Vec<u8> = Vec::with_capacity(64 * 1024);

        loop {
            while let Some(frame) = extract_frame(&mut buffer, self.magic)? {
                self.handle_frame(&mut stream, frame).await?;
            }

            let mut chunk = [0u8; 16 * 1024];
            tokio::select! {
                _ = self.cancel.cancelled() => return Ok(()),
                read = stream.read(&mut chunk) => {
                    let n = read.context("p2p read failed")?;
                    if n == 0 {
                        bail!("p2p peer closed the connection");
                    }
                    buffer.extend_from_slice(&chunk[..n]);
                }
            }
        }
    }

    async fn handle_frame(&self, stream: &mut TcpStream, frame: Frame) -> Result {
        match frame.command.as_str() {
            "version" => {
                debug!("P2P version received, sending verack");
                stream
                    .write_all(&build_frame(self.magic, "verack", &[]))
                    .await?;
            }
            "verack" => {
                info!("P2P handshake complete");
            }
            "ping" => {
                stream
                    .write_all(&build_frame(self.magic, "pong", &frame.payload))
                    .await?;
            }
            "inv" => {
                for hash in block_hashes(&frame.payload)? {
                    debug!("P2P inv block {hash}");
                    let _ = self.block_tx.send(hash);
                }
            }
            _ => {}
        }

        Ok(())
    }

    fn version_message(&self, stream: &TcpStream) -> Result<VersionMessage> {
        let receiver = stream.peer_addr()?;
        let sender = stream.local_addr()?;

        Ok(VersionMessage {
            version: PROTOCOL_VERSION,
            services: ServiceFlags::NONE,
            timestamp: unix_now() as i64,
            receiver: P2pAddress::new(&receiver, ServiceFlags::NONE),
            sender: P2pAddress::new(&sender, ServiceFlags::NONE),
            nonce: rand::rng().random(),
            user_agent: format!("/galena:{}/", env!("CARGO_PKG_VERSION")),
            start_height: 0,
            relay: self.relay_transactions,
        })
    }
}

/// `magic ‖ command(12, null-padded) ‖ length ‖ sha256d(payload)[0..4]`
/// followed by the payload.
fn build_frame(magic: Magic, command: &str, payload: &[u8]) -> Vec<u8> {
    let mut command_bytes = [0u8; 12];
    command_bytes[..command.len()].copy_from_slice(command.as_bytes());

    let checksum = sha256d::Hash::hash(payload);

    let mut frame = Vec::with_capacity(24 + payload.len());
    frame.extend_from_slice(&magic.to_bytes());
    frame.extend_from_slice(&command_bytes);
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(&checksum.as_byte_array()[..4]);
    frame.extend_from_slice(payload);
    frame
}

/// Pulls the next complete frame out of the stream buffer. Garbage before
/// the magic is scanned past; frames with a bad checksum are dropped and
/// parsing continues.
fn extract_frame(buffer: &mut Vec<u8>, magic: Magic) -> Result<Option<Frame>> {
    let magic_bytes = magic.to_bytes();

    loop {
        if buffer.len() < 24 {
            return Ok(None);
        }

        if buffer[..4] != magic_bytes {
            match buffer
                .windows(4)
                .position(|window| window == magic_bytes.as_slice())
            {
                Some(position) => {
                    warn!("P2P stream out of sync, skipping {position} bytes");
                    buffer.drain(..position);
                }
                None => {
                    // keep a partial magic that may complete on the next read
                    let keep = buffer.len().saturating_sub(3);
                    buffer.drain(..keep);
                    return Ok(None);
                }
            }
            continue;
        }

        let length = u32::from_le_bytes(buffer[16..20].try_into().unwrap()) as usize;
        ensure!(length <= MAX_PAYLOAD_SIZE, "p2p payload of {length} bytes");

        if buffer.len() < 24 + length {
            return Ok(None);
        }

        let payload = buffer[24..24 + length].to_vec();
        let checksum = &buffer[20..24];

        if sha256d::Hash::hash(&payload).as_byte_array()[..4] != *checksum {
            warn!("Dropping p2p message with bad checksum");
            buffer.drain(..24 + length);
            continue;
        }

        let command = String::from_utf8_lossy(&buffer[4..16])
            .trim_end_matches('\0')
            .to_string();

        buffer.drain(..24 + length);

        return Ok(Some(Frame { command, payload }));
    }
}

/// Block hashes announced in an `inv` payload.
fn block_hashes(payload: &[u8]) -> Result<Vec<BlockHash>> {
    let inventory: Vec<Inventory> =
        consensus::deserialize(payload).context("invalid inv payload")?;

    Ok(inventory
        .into_iter()
        .filter_map(|entry| match entry {
            Inventory::Block(hash) | Inventory::WitnessBlock(hash) => Some(hash),
            _ => None,
        })
        .collect())
}
