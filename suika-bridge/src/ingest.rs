//! Ingestion task: frame reader, parser, classifier and snapshot store.
//!
//! The [`Ingestor`] owns the [`SnapshotWriter`] and is the only code that
//! changes published state. One frame is processed per iteration; between
//! frames it applies queued [`BridgeCommand`]s.

use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncRead, BufReader};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, trace, warn};

use suika_common::{Counters, Uptime};

use crate::classifier::classify_document;
use crate::commands::BridgeCommand;
use crate::config::{InputConfig, InputSource};
use crate::frame::{FrameError, FrameEvent, FrameReader, RateLimiter, RawFrame};
use crate::parser::{ParseError, parse};
use crate::snapshot::{BridgeState, SnapshotWriter};

/// Why a stream stopped being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// The producer closed the stream.
    Eof,
    /// Shutdown was requested.
    Shutdown,
}

/// Drives frames from an input source into the snapshot store.
pub struct Ingestor {
    writer: SnapshotWriter,
    commands: mpsc::Receiver<BridgeCommand>,
    limiter: RateLimiter,
    uptime: Uptime,
    config: InputConfig,
}

impl Ingestor {
    pub fn new(
        writer: SnapshotWriter,
        commands: mpsc::Receiver<BridgeCommand>,
        uptime: Uptime,
        config: InputConfig,
    ) -> Self {
        Self {
            writer,
            commands,
            limiter: RateLimiter::new(config.min_interval_ms),
            uptime,
            config,
        }
    }

    /// The state as last published.
    pub fn state(&self) -> &BridgeState {
        self.writer.current()
    }

    /// Apply one reader event to the store.
    pub fn handle_event(&mut self, event: FrameEvent) {
        let now = self.uptime.millis();
        let read_at = self.limiter.last_accepted_ms().unwrap_or(now);

        match event {
            FrameEvent::Dropped => {
                trace!("Frame dropped by rate limiter");
                self.writer.update(BridgeState::record_drop);
            }
            FrameEvent::Oversized { len, limit, head } => {
                let err = ParseError::Oversized { len, limit };
                debug!(len, limit, "Rejected oversized frame");
                self.writer.update(|state| {
                    state.record_read(&head.text(), read_at);
                    state.reject(&err);
                });
            }
            FrameEvent::Frame(frame) => self.handle_frame(&frame, read_at, now),
        }
    }

    fn handle_frame(&mut self, frame: &RawFrame, read_at: u64, now: u64) {
        let values = parse(frame).map(|document| classify_document(&document));

        let result = self.writer.update(|state| {
            state.record_read(&frame.text(), read_at);
            match values {
                Ok(values) => state.publish(&values, now),
                Err(err) => {
                    state.reject(&err);
                    Err(err)
                }
            }
        });

        match result {
            Ok(()) => trace!(bytes = frame.len(), "Frame accepted"),
            Err(e) => debug!(error = %e, "Frame rejected"),
        }
    }

    /// Apply one control command.
    pub fn handle_command(&mut self, command: BridgeCommand) {
        match command {
            BridgeCommand::Reset => {
                let counters = self.state().counters;
                self.writer.update(BridgeState::reset);
                info!(
                    frames_seen = counters.frames_seen,
                    frames_accepted = counters.frames_accepted,
                    frames_rejected = counters.frames_rejected,
                    frames_dropped = counters.frames_dropped,
                    "Sensor state reset"
                );
            }
        }
    }

    /// Read frames from one stream until it ends or shutdown is requested.
    pub async fn ingest_stream<R>(
        &mut self,
        reader: R,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<StreamEnd, FrameError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut frames = FrameReader::new(reader, self.config.max_frame_bytes);

        loop {
            if *shutdown.borrow() {
                return Ok(StreamEnd::Shutdown);
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if shutdown_requested(changed, shutdown) {
                        return Ok(StreamEnd::Shutdown);
                    }
                }
                Some(command) = self.commands.recv() => self.handle_command(command),
                event = frames.next_frame(&mut self.limiter, &self.uptime) => {
                    match event? {
                        Some(event) => self.handle_event(event),
                        None => return Ok(StreamEnd::Eof),
                    }
                }
            }
        }
    }

    /// Keep applying commands until `duration` elapses (forever if `None`).
    ///
    /// Returns `true` if shutdown was requested meanwhile.
    async fn idle(
        &mut self,
        duration: Option<Duration>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> bool {
        let sleep = async {
            match duration {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(sleep);

        loop {
            if *shutdown.borrow() {
                return true;
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if shutdown_requested(changed, shutdown) {
                        return true;
                    }
                }
                Some(command) = self.commands.recv() => self.handle_command(command),
                _ = &mut sleep => return false,
            }
        }
    }

    /// Accept producer connections one at a time from `listener`.
    pub async fn serve_tcp(
        &mut self,
        listener: TcpListener,
        shutdown: &mut watch::Receiver<bool>,
    ) {
        loop {
            if *shutdown.borrow() {
                return;
            }

            let (stream, peer) = tokio::select! {
                changed = shutdown.changed() => {
                    if shutdown_requested(changed, shutdown) {
                        return;
                    }
                    continue;
                }
                Some(command) = self.commands.recv() => {
                    self.handle_command(command);
                    continue;
                }
                accepted = listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!(error = %e, "Failed to accept producer connection");
                        continue;
                    }
                },
            };

            info!(%peer, "Producer connected");
            match self.ingest_stream(BufReader::new(stream), shutdown).await {
                Ok(StreamEnd::Eof) => info!(%peer, "Producer disconnected"),
                Ok(StreamEnd::Shutdown) => return,
                Err(e) => warn!(%peer, error = %e, "Producer connection failed"),
            }
        }
    }

    async fn open_device(&self) -> std::io::Result<Box<dyn AsyncRead + Unpin + Send>> {
        match self.config.source {
            InputSource::Serial => {
                let port = tokio_serial::SerialStream::open(&self.config.serial_builder())
                    .map_err(std::io::Error::from)?;
                Ok(Box::new(port))
            }
            _ => Ok(Box::new(tokio::fs::File::open(&self.config.path).await?)),
        }
    }

    /// Read a device or file, reopening it after `reconnect_delay_ms` on EOF
    /// or failure.
    pub async fn serve_device(&mut self, shutdown: &mut watch::Receiver<bool>) {
        let delay = Duration::from_millis(self.config.reconnect_delay_ms);
        let path = self.config.path.clone();

        loop {
            match self.open_device().await {
                Ok(device) => {
                    info!(path = %path, source = %self.config.source, "Input opened");
                    match self.ingest_stream(BufReader::new(device), shutdown).await {
                        Ok(StreamEnd::Eof) => debug!(path = %path, "Input reached end of stream"),
                        Ok(StreamEnd::Shutdown) => return,
                        Err(e) => warn!(path = %path, error = %e, "Input read failed"),
                    }
                }
                Err(e) => warn!(path = %path, error = %e, "Failed to open input"),
            }

            if self.idle(Some(delay), shutdown).await {
                return;
            }
        }
    }

    async fn serve_stdin(&mut self, shutdown: &mut watch::Receiver<bool>) {
        info!("Reading frames from stdin");
        match self.ingest_stream(BufReader::new(tokio::io::stdin()), shutdown).await {
            Ok(StreamEnd::Shutdown) => return,
            Ok(StreamEnd::Eof) => info!("Stdin closed, serving last snapshot"),
            Err(e) => error!(error = %e, "Stdin read failed, serving last snapshot"),
        }
        self.idle(None, shutdown).await;
    }

    /// Run until shutdown, returning the final counters.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<Counters> {
        info!(
            source = %self.config.source,
            max_frame_bytes = self.config.max_frame_bytes,
            min_interval_ms = self.config.min_interval_ms,
            "Ingestion started"
        );

        match self.config.source {
            InputSource::Stdin => self.serve_stdin(&mut shutdown).await,
            InputSource::Tcp => {
                let listener = TcpListener::bind(&self.config.bind)
                    .await
                    .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", self.config.bind, e))?;
                info!(addr = %self.config.bind, "Waiting for producer connections");
                self.serve_tcp(listener, &mut shutdown).await;
            }
            InputSource::Path | InputSource::Serial => self.serve_device(&mut shutdown).await,
        }

        info!("Ingestion stopped");
        Ok(self.state().counters)
    }
}

fn shutdown_requested(
    changed: Result<(), watch::error::RecvError>,
    shutdown: &watch::Receiver<bool>,
) -> bool {
    changed.is_err() || *shutdown.borrow()
}
