//! The persistent TCP session to the cloud gateway.
//!
//! A single background task owns the TLS socket and runs the whole
//! lifecycle: connect (strict TLS first, relaxed on failure), log in, then
//! run the reader, heartbeat and writer-drain loops under one `select!`.
//! Any loop error tears the connection down and the outer loop
//! reconnects after a fixed delay. Callers never touch the socket; they post
//! frames through a queue that only drains once the server has acknowledged
//! the login.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::{Duration, sleep};
use tokio_native_tls::{TlsConnector, TlsStream};
use tokio_util::sync::CancellationToken;

use cync_proto::builder;
use cync_proto::frame::FrameAssembler;
use cync_proto::parser::{self, InboundMessage};

use crate::auth::UserCredentials;
use crate::config::SessionConfig;
use crate::error::{CyncError, CyncResult};
use crate::topology::TopologyStore;

type CyncStream = TlsStream<TcpStream>;

/// Connection lifecycle, observable through [`Session::state`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    LoggingIn,
    Ready,
    Closing,
}

pub(crate) struct Session {
    shared: Arc<SessionShared>,
}

struct SessionShared {
    credentials: UserCredentials,
    store: Arc<TopologyStore>,
    config: SessionConfig,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    state: watch::Sender<SessionState>,
    /// Flips once the first probe acknowledgement of a connection arrives;
    /// hub resolution blocks on it so commands cannot race the probe burst.
    statuses_updated: AtomicBool,
    closing: AtomicBool,
    cancel: CancellationToken,
}

impl Session {
    /// Spawns the background connection task. Must be called on a tokio
    /// runtime.
    pub fn spawn(
        credentials: UserCredentials,
        store: Arc<TopologyStore>,
        config: SessionConfig,
    ) -> Self {
        let (outbound, queue) = mpsc::unbounded_channel();
        let shared = Arc::new(SessionShared {
            credentials,
            store,
            config,
            outbound,
            state: watch::Sender::new(SessionState::Disconnected),
            statuses_updated: AtomicBool::new(false),
            closing: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        });

        tokio::spawn(run(shared.clone(), queue));

        Self { shared }
    }

    /// Queues a frame for delivery. Non-blocking; the frame goes out in post
    /// order once the session is ready.
    pub fn post(&self, frame: Vec<u8>) -> CyncResult<()> {
        self.shared.post(frame)
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.shared.state.borrow()
    }

    #[must_use]
    pub fn statuses_updated(&self) -> bool {
        self.shared.statuses_updated.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_closing(&self) -> bool {
        self.shared.is_closing()
    }

    /// Signals the connection task to send a Disconnect and exit.
    pub fn shut_down(&self) {
        self.shared.closing.store(true, Ordering::Release);
        self.shared.set_state(SessionState::Closing);
        self.shared.cancel.cancel();
    }
}

impl SessionShared {
    fn post(&self, frame: Vec<u8>) -> CyncResult<()> {
        if self.is_closing() {
            return Err(CyncError::ShuttingDown);
        }
        self.outbound
            .send(frame)
            .map_err(|_| CyncError::ShuttingDown)
    }

    fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }

    fn set_state(&self, next: SessionState) {
        self.state.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            log::debug!("session state {state:?} -> {next:?}");
            *state = next;
            true
        });
    }

    fn user_id(&self) -> u32 {
        self.credentials.user_id
    }
}

async fn run(shared: Arc<SessionShared>, mut queue: mpsc::UnboundedReceiver<Vec<u8>>) {
    while !shared.is_closing() {
        shared.set_state(SessionState::Connecting);
        let stream = match connect(&shared.config).await {
            Ok(stream) => stream,
            Err(err) => {
                log::error!(
                    "failed to connect to Cync server: {err}; retrying in {}s",
                    shared.config.tls_retry_delay_secs
                );
                if sleep_or_cancel(&shared, shared.config.tls_retry_delay()).await {
                    break;
                }
                continue;
            }
        };

        shared.set_state(SessionState::LoggingIn);
        shared.statuses_updated.store(false, Ordering::Release);

        // Whatever was queued against the previous connection is stale now:
        // the hub may have changed. Drop, never replay.
        while queue.try_recv().is_ok() {}

        let (reader, mut writer) = tokio::io::split(stream);
        let login = builder::login_request(
            &shared.credentials.authorize_token,
            shared.credentials.user_id,
        );
        if let Err(err) = write_frame(&mut writer, &login).await {
            log::error!("failed to send login request: {err}");
            if sleep_or_cancel(&shared, shared.config.reconnect_delay()).await {
                break;
            }
            continue;
        }

        let (ready_tx, ready_rx) = watch::channel(false);
        let result = tokio::select! {
            res = read_loop(reader, &shared, &ready_tx) => res,
            res = heartbeat_loop(&shared) => res,
            res = drain_writes(&mut writer, &mut queue, ready_rx, &shared) => res,
        };

        shared.set_state(SessionState::Disconnected);
        match result {
            Err(CyncError::ShuttingDown) => {
                log::info!("Cync client shutting down");
                break;
            }
            Err(err) => log::error!("Cync session error: {err}"),
            Ok(()) => {}
        }

        if shared.is_closing() {
            break;
        }
        log::info!(
            "Cync server connection closed, reconnecting in {}s",
            shared.config.reconnect_delay_secs
        );
        if sleep_or_cancel(&shared, shared.config.reconnect_delay()).await {
            break;
        }
    }

    shared.set_state(SessionState::Disconnected);
}

/// Waits out `delay` unless shutdown is signalled first. Returns whether the
/// session is shutting down.
async fn sleep_or_cancel(shared: &SessionShared, delay: Duration) -> bool {
    tokio::select! {
        () = shared.cancel.cancelled() => true,
        () = sleep(delay) => shared.is_closing(),
    }
}

async fn open_tls(config: &SessionConfig, relaxed: bool) -> CyncResult<CyncStream> {
    let mut tls = native_tls::TlsConnector::builder();
    if relaxed {
        tls.danger_accept_invalid_certs(true);
        tls.danger_accept_invalid_hostnames(true);
    }
    let connector = TlsConnector::from(tls.build()?);

    let tcp = TcpStream::connect((config.server_host.as_str(), config.server_port)).await?;
    Ok(connector.connect(&config.server_host, tcp).await?)
}

async fn connect(config: &SessionConfig) -> CyncResult<CyncStream> {
    match open_tls(config, false).await {
        Ok(stream) => Ok(stream),
        Err(err) => {
            // The vendor's certificate has been expired for years and its
            // common name doesn't match the host. The devices themselves
            // accept it, so fall back to a relaxed context.
            log::debug!("strict TLS connect failed ({err}); retrying with relaxed verification");
            open_tls(config, true).await
        }
    }
}

async fn write_frame(writer: &mut WriteHalf<CyncStream>, frame: &[u8]) -> CyncResult<()> {
    writer.write_all(frame).await?;
    writer.flush().await?;
    Ok(())
}

async fn read_loop(
    mut reader: ReadHalf<CyncStream>,
    shared: &SessionShared,
    ready: &watch::Sender<bool>,
) -> CyncResult<()> {
    let mut assembler = FrameAssembler::new();
    loop {
        let n = reader.read_buf(assembler.buffer_mut()).await?;
        if n == 0 {
            return Err(CyncError::ConnectionClosed);
        }
        while let Some(frame) = assembler.next_frame() {
            handle_frame(shared, ready, &frame)?;
        }
    }
}

fn handle_frame(
    shared: &SessionShared,
    ready: &watch::Sender<bool>,
    frame: &[u8],
) -> CyncResult<()> {
    let endpoints = shared.store.mesh_endpoints(shared.user_id());
    let message = match parser::parse_frame(frame, &endpoints) {
        Ok(message) => message,
        Err(err) => {
            // Undecodable frames are dropped; the session stays up.
            log::debug!("skipping inbound frame: {err}");
            return Ok(());
        }
    };

    match message {
        InboundMessage::LoginAck { is_response, .. } => {
            if is_response {
                log::info!("logged in to Cync server");
                shared.set_state(SessionState::Ready);
                ready.send_replace(true);
                // Probe every known device so hub resolution can see which
                // ones are reachable over Wi-Fi.
                for device in shared.store.flattened_devices(shared.user_id()) {
                    let _ = shared.outbound.send(builder::probe_request(device.device_id));
                }
            }
        }
        InboundMessage::ProbeAck {
            device_id, version, ..
        } => {
            if version != 0 {
                shared.store.mark_wifi_connected(shared.user_id(), device_id, true);
                shared.statuses_updated.store(true, Ordering::Release);
            }
        }
        InboundMessage::Sync { updates, .. } | InboundMessage::Pipe { updates, .. } => {
            shared.store.apply_status_updates(shared.user_id(), &updates);
            if let Some(callback) = shared.store.update_callback(shared.user_id()) {
                callback(&updates);
            }
        }
        InboundMessage::Disconnect => {
            ready.send_replace(false);
            return Err(CyncError::ConnectionClosed);
        }
    }
    Ok(())
}

async fn heartbeat_loop(shared: &SessionShared) -> CyncResult<()> {
    loop {
        sleep(shared.config.heartbeat_interval()).await;
        if shared.is_closing() {
            return Err(CyncError::ShuttingDown);
        }
        shared
            .outbound
            .send(builder::heartbeat())
            .map_err(|_| CyncError::ConnectionClosed)?;
    }
}

async fn drain_writes(
    writer: &mut WriteHalf<CyncStream>,
    queue: &mut mpsc::UnboundedReceiver<Vec<u8>>,
    mut ready: watch::Receiver<bool>,
    shared: &SessionShared,
) -> CyncResult<()> {
    loop {
        let frame = tokio::select! {
            () = shared.cancel.cancelled() => return goodbye(writer).await,
            frame = queue.recv() => frame.ok_or(CyncError::ConnectionClosed)?,
        };

        // Frames posted before the login ack are buffered, not dropped.
        while !*ready.borrow() {
            tokio::select! {
                () = shared.cancel.cancelled() => return goodbye(writer).await,
                changed = ready.changed() => {
                    changed.map_err(|_| CyncError::ConnectionClosed)?;
                }
            }
        }

        write_frame(writer, &frame).await?;
    }
}

/// Best-effort Disconnect on shutdown.
async fn goodbye(writer: &mut WriteHalf<CyncStream>) -> CyncResult<()> {
    let _ = write_frame(writer, &builder::disconnect_request()).await;
    Err(CyncError::ShuttingDown)
}
