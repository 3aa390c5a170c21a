//! Control channel transport
//!
//! Line-oriented TCP between the two endpoints. Each side runs both
//! halves: a dialer that connects to the peer's listener and carries
//! outgoing commands, and a listener that accepts the peer's dialer and
//! feeds incoming lines to a handler. The halves recover differently: the
//! listener re-accepts after a dropped session for as long as the call
//! runs, while the dialer only retries until the first connection is
//! established. Once an established connection drops, outgoing relay is
//! gone for the rest of the call.

use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;

use crate::constants::RECONNECT_BACKOFF;
use crate::error::ControlError;
use crate::net;
use crate::state::Toggle;

/// Poll period of the non-blocking accept loop.
const ACCEPT_POLL: Duration = Duration::from_millis(150);
/// Read timeout on accepted sessions, so the reader can poll shutdown.
const READ_POLL: Duration = Duration::from_secs(1);

/// Outbound half as seen by the command router.
pub trait ControlLink: Send + Sync {
    fn send_line(&self, line: &str) -> Result<(), ControlError>;
}

/// Connects to the peer's control listener and carries relay lines.
pub struct ControlDialer {
    writer: Arc<Mutex<Option<TcpStream>>>,
    running: Toggle,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ControlDialer {
    /// Start dialing `peer` in the background, retrying every 2 seconds
    /// until connected or stopped.
    pub fn start(peer: SocketAddr) -> Result<Self, ControlError> {
        let writer = Arc::new(Mutex::new(None));
        let running = Toggle::new(true);
        let handle = {
            let slot = writer.clone();
            let flag = running.clone();
            thread::Builder::new()
                .name("control-dial".to_string())
                .spawn(move || dial_loop(peer, slot, flag))
                .map_err(|e| ControlError::ConnectionFailed(e.to_string()))?
        };
        Ok(Self {
            writer,
            running,
            handle: Mutex::new(Some(handle)),
        })
    }

    pub fn is_connected(&self) -> bool {
        self.writer.lock().is_some()
    }

    pub fn stop(&self) {
        self.running.set(false);
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
    }
}

impl ControlLink for ControlDialer {
    fn send_line(&self, line: &str) -> Result<(), ControlError> {
        let mut slot = self.writer.lock();
        let stream = match slot.as_mut() {
            Some(stream) => stream,
            None => return Err(ControlError::NotConnected),
        };
        let result = stream
            .write_all(line.as_bytes())
            .and_then(|_| stream.write_all(b"\n"));
        if let Err(e) = result {
            // established session dropped; outgoing relay stays down
            tracing::warn!("Control connection lost: {}", e);
            *slot = None;
            return Err(ControlError::SendFailed(e.to_string()));
        }
        Ok(())
    }
}

impl Drop for ControlDialer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Sleep out the reconnect backoff in short slices so a stop request
/// does not wait out the full period.
fn backoff_sleep(running: &Toggle) {
    let slice = Duration::from_millis(100);
    let mut slept = Duration::ZERO;
    while running.get() && slept < RECONNECT_BACKOFF {
        thread::sleep(slice);
        slept += slice;
    }
}

fn dial_loop(peer: SocketAddr, slot: Arc<Mutex<Option<TcpStream>>>, running: Toggle) {
    tracing::info!("Dialing control channel at {}", peer);
    while running.get() {
        match TcpStream::connect_timeout(&peer, RECONNECT_BACKOFF) {
            Ok(stream) => {
                let _ = stream.set_nodelay(true);
                tracing::info!("Control channel connected to {}", peer);
                *slot.lock() = Some(stream);
                return;
            }
            Err(e) => {
                tracing::debug!(
                    "Control dial to {} failed ({}), retrying in {}s",
                    peer,
                    e,
                    RECONNECT_BACKOFF.as_secs()
                );
                backoff_sleep(&running);
            }
        }
    }
    tracing::debug!("Control dial loop exited before connecting");
}

/// Accepts the peer's dialer and feeds received lines to the handler.
pub struct ControlListener {
    running: Toggle,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ControlListener {
    /// Start accepting on a listener prepared by [`net::control_listener`].
    pub fn start<F>(listener: TcpListener, handler: F) -> Result<Self, ControlError>
    where
        F: FnMut(&str) + Send + 'static,
    {
        let running = Toggle::new(true);
        let handle = {
            let flag = running.clone();
            thread::Builder::new()
                .name("control-accept".to_string())
                .spawn(move || accept_loop(listener, handler, flag))
                .map_err(|e| ControlError::BindFailed(e.to_string()))?
        };
        Ok(Self {
            running,
            handle: Mutex::new(Some(handle)),
        })
    }

    pub fn stop(&self) {
        self.running.set(false);
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ControlListener {
    fn drop(&mut self) {
        self.stop();
    }
}

fn accept_loop<F>(listener: TcpListener, mut handler: F, running: Toggle)
where
    F: FnMut(&str),
{
    match listener.local_addr() {
        Ok(addr) => tracing::info!("Control channel listening on {}", addr),
        Err(_) => tracing::info!("Control channel listening"),
    }
    while running.get() {
        let (stream, peer) = match listener.accept() {
            Ok(connection) => connection,
            Err(e) if net::is_timeout(&e) => {
                thread::sleep(ACCEPT_POLL);
                continue;
            }
            Err(e) => {
                if running.get() {
                    tracing::warn!("Control accept failed: {}", e);
                    backoff_sleep(&running);
                }
                continue;
            }
        };
        tracing::info!("Control channel accepted {}", peer);
        // accepted sockets inherit non-blocking from the listener
        if stream.set_nonblocking(false).is_err()
            || stream.set_read_timeout(Some(READ_POLL)).is_err()
        {
            tracing::warn!("Failed to configure control session socket");
            continue;
        }
        read_session(stream, &mut handler, &running);
        if running.get() {
            tracing::info!("Control session ended, waiting for the peer to reconnect");
        }
    }
    tracing::debug!("Control accept loop exited");
}

/// Read lines until EOF, a hard error or shutdown. Read timeouts only
/// poll the running flag; a partial line survives them and completes on
/// the next read.
fn read_session<F>(stream: TcpStream, handler: &mut F, running: &Toggle)
where
    F: FnMut(&str),
{
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    while running.get() {
        match reader.read_line(&mut line) {
            // clean EOF
            Ok(0) => return,
            Ok(_) => {
                let command = line.trim();
                if !command.is_empty() {
                    handler(command);
                }
                line.clear();
            }
            Err(e) if net::is_timeout(&e) => continue,
            Err(e) => {
                if running.get() {
                    tracing::warn!("Control read failed: {}", e);
                }
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::io::Read;

    fn wait_for_connection(dialer: &ControlDialer) {
        for _ in 0..200 {
            if dialer.is_connected() {
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("dialer never connected");
    }

    #[test]
    fn test_dialer_delivers_lines() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let dialer = ControlDialer::start(addr).unwrap();
        let (mut stream, _) = listener.accept().unwrap();
        wait_for_connection(&dialer);

        dialer.send_line("/mute").unwrap();
        dialer.send_line("/pause").unwrap();

        stream
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let mut received = String::new();
        let mut buf = [0u8; 64];
        while !received.contains("/pause\n") {
            let n = stream.read(&mut buf).unwrap();
            assert!(n > 0, "stream closed early");
            received.push_str(std::str::from_utf8(&buf[..n]).unwrap());
        }
        assert_eq!(received, "/mute\n/pause\n");
        dialer.stop();
    }

    #[test]
    fn test_send_before_connect_reports_not_connected() {
        // grab a port with no listener behind it
        let placeholder = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = placeholder.local_addr().unwrap();
        drop(placeholder);

        let dialer = ControlDialer::start(addr).unwrap();
        match dialer.send_line("/audio") {
            Err(ControlError::NotConnected) => {}
            other => panic!("expected NotConnected, got {:?}", other),
        }
        dialer.stop();
    }

    #[test]
    fn test_dialer_does_not_redial_after_drop() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let dialer = ControlDialer::start(addr).unwrap();
        let (stream, _) = listener.accept().unwrap();
        wait_for_connection(&dialer);
        drop(stream);

        // writes fail once the reset propagates; the writer slot clears
        let mut failed = false;
        for _ in 0..50 {
            if dialer.send_line("/mute").is_err() {
                failed = true;
                break;
            }
            thread::sleep(Duration::from_millis(20));
        }
        assert!(failed, "send kept succeeding after peer closed");
        assert!(!dialer.is_connected());

        // no new connection attempt shows up at the listener
        listener.set_nonblocking(true).unwrap();
        thread::sleep(Duration::from_millis(200));
        assert!(listener.accept().is_err());
        dialer.stop();
    }

    #[test]
    fn test_listener_survives_session_drop() {
        let listener = net::control_listener(0).unwrap();
        let addr = listener.local_addr().unwrap();
        let port = addr.port();

        let (tx, rx) = unbounded::<String>();
        let control = ControlListener::start(listener, move |line| {
            let _ = tx.send(line.to_string());
        })
        .unwrap();

        {
            let mut first = TcpStream::connect(("127.0.0.1", port)).unwrap();
            first.write_all(b"/pause\n").unwrap();
            let line = rx.recv_timeout(Duration::from_secs(3)).unwrap();
            assert_eq!(line, "/pause");
        }
        // first session dropped; a second dialer must be accepted
        {
            let mut second = TcpStream::connect(("127.0.0.1", port)).unwrap();
            second.write_all(b"/mute\n").unwrap();
            let line = rx.recv_timeout(Duration::from_secs(3)).unwrap();
            assert_eq!(line, "/mute");
        }
        control.stop();
    }

    #[test]
    fn test_partial_line_completes_across_reads() {
        let listener = net::control_listener(0).unwrap();
        let port = listener.local_addr().unwrap().port();

        let (tx, rx) = unbounded::<String>();
        let control = ControlListener::start(listener, move |line| {
            let _ = tx.send(line.to_string());
        })
        .unwrap();

        let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
        stream.write_all(b"/au").unwrap();
        stream.flush().unwrap();
        thread::sleep(Duration::from_millis(100));
        stream.write_all(b"dio\n").unwrap();

        let line = rx.recv_timeout(Duration::from_secs(3)).unwrap();
        assert_eq!(line, "/audio");
        control.stop();
    }
}
