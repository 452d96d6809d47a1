use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use sllp_frame::{FrameConfig, FrameError, FrameReader, FrameWriter};
use sllp_transport::{Endpoint, EndpointListener, InstrumentStream, TransportError};
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::handler::Handler;

/// Serves one [`Handler`] to every client of a bound endpoint.
///
/// Each accepted connection gets its own thread; all of them share the
/// handler behind a mutex, so requests from different clients are
/// answered one at a time against the same state.
pub struct Server<H> {
    listener: EndpointListener,
    handler: Arc<Mutex<H>>,
    config: ServerConfig,
    running: Arc<AtomicBool>,
}

impl<H: Handler + 'static> Server<H> {
    /// Bind `endpoint` with default settings and the handler's framing.
    pub fn bind(endpoint: &Endpoint, handler: H) -> Result<Self> {
        let config = ServerConfig {
            framing: handler.framing(),
            ..ServerConfig::default()
        };
        Self::with_config(endpoint, handler, config)
    }

    pub fn with_config(endpoint: &Endpoint, handler: H, config: ServerConfig) -> Result<Self> {
        if config.framing != handler.framing() {
            return Err(ServerError::Config(format!(
                "server framing {} does not match handler framing {}",
                config.framing,
                handler.framing()
            )));
        }
        if config.max_connections == 0 {
            return Err(ServerError::Config(
                "max_connections must be at least 1".to_string(),
            ));
        }
        let listener = EndpointListener::bind(endpoint)?;
        info!(
            endpoint = %listener.endpoint(),
            framing = %config.framing,
            "instrument server ready"
        );
        Ok(Self {
            listener,
            handler: Arc::new(Mutex::new(handler)),
            config,
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    /// The endpoint actually bound.
    pub fn endpoint(&self) -> &Endpoint {
        self.listener.endpoint()
    }

    /// Shared handle to the served state.
    pub fn handler(&self) -> Arc<Mutex<H>> {
        Arc::clone(&self.handler)
    }

    /// Flag that keeps [`serve`](Self::serve) running. Store `false` to
    /// stop it; suitable for a Ctrl-C handler.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Accept and serve clients until stopped. Returns once every
    /// connection thread has finished.
    pub fn serve(&self) -> Result<()> {
        self.listener.set_nonblocking(true)?;
        let mut workers: Vec<JoinHandle<()>> = Vec::new();

        while self.running.load(Ordering::SeqCst) {
            workers.retain(|worker| !worker.is_finished());
            if workers.len() >= self.config.max_connections {
                thread::sleep(self.config.poll_interval);
                continue;
            }
            match self.listener.accept() {
                Ok(stream) => workers.push(self.spawn_connection(stream)),
                Err(TransportError::Accept(err)) if err.kind() == ErrorKind::WouldBlock => {
                    thread::sleep(self.config.poll_interval);
                }
                Err(err) => {
                    warn!(%err, "accept failed");
                    thread::sleep(self.config.poll_interval);
                }
            }
        }

        debug!(connections = workers.len(), "server stopping");
        for worker in workers {
            if worker.join().is_err() {
                warn!("connection thread panicked");
            }
        }
        Ok(())
    }

    /// Accept a single client and serve it on the calling thread until it
    /// disconnects or the server is stopped.
    pub fn serve_one(&self) -> Result<()> {
        self.listener.set_nonblocking(false)?;
        let stream = self.listener.accept()?;
        serve_connection(stream, &self.handler, &self.config, &self.running)
    }

    fn spawn_connection(&self, stream: InstrumentStream) -> JoinHandle<()> {
        let handler = Arc::clone(&self.handler);
        let running = Arc::clone(&self.running);
        let config = self.config.clone();
        thread::spawn(move || {
            if let Err(err) = serve_connection(stream, &handler, &config, &running) {
                warn!(%err, "connection ended with error");
            }
        })
    }
}

fn serve_connection<H: Handler>(
    stream: InstrumentStream,
    handler: &Mutex<H>,
    config: &ServerConfig,
    running: &AtomicBool,
) -> Result<()> {
    let peer = stream.peer_label();
    stream.set_nonblocking(false)?;
    info!(%peer, "client connected");

    let frame_config = FrameConfig {
        read_timeout: Some(config.poll_interval),
        ..FrameConfig::default()
    };
    let mut reader = FrameReader::with_config_stream(stream.try_clone()?, frame_config.clone())?;
    let mut writer = FrameWriter::with_config_stream(stream, frame_config)?;
    let end = config.framing.message_end();

    while running.load(Ordering::SeqCst) {
        let request = match reader.read_message(end) {
            Ok(request) => request,
            Err(FrameError::Io(err))
                if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
            {
                continue;
            }
            Err(FrameError::ConnectionClosed) => {
                info!(%peer, "client disconnected");
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };

        let reply = handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .handle(&request);
        writer.send_raw(&reply)?;
    }
    debug!(%peer, "connection closed by shutdown");
    Ok(())
}
