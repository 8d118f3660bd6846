//! The send loop: connect, frame, send, optionally wait for an ACK, and
//! reconnect with backoff whenever anything goes wrong.

use std::borrow::Cow;
use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use crate::config::{as_timeout, EncodingPolicy, RunConfig};
use crate::control_id::{control_id, fresh_control_id, rewrite_control_id};
use crate::encoding::Encoding;
use crate::error::SendError;
use crate::frame::{encode_frame, is_terminated, unwrap_frame};
use crate::messages::MessageSet;

const BUFFER_SIZE: usize = 4096;
const MAX_BACKOFF_STEPS: u32 = 30;

/// Opens a fresh connection to the configured endpoint.
///
/// Every resolved address is tried in turn; the error of the last attempt is
/// returned if none accepts.
pub fn connect(config: &RunConfig) -> io::Result<TcpStream> {
    let mut last_err = None;
    for addr in (config.host.as_str(), config.port).to_socket_addrs()? {
        let attempt = match as_timeout(config.connect_timeout) {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
            None => TcpStream::connect(addr),
        };
        match attempt {
            Ok(stream) => {
                stream.set_read_timeout(as_timeout(config.io_timeout))?;
                stream.set_write_timeout(as_timeout(config.io_timeout))?;
                stream.set_nodelay(true)?;
                return Ok(stream);
            }
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("{}:{} did not resolve to any address", config.host, config.port),
        )
    }))
}

/// Delay before reconnecting after `consecutive_failures` faults in a row.
pub fn backoff_delay(consecutive_failures: u32, unit: Duration) -> Duration {
    unit * consecutive_failures.saturating_add(1).min(MAX_BACKOFF_STEPS)
}

/// Counters of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunState {
    sent_total: u64,
    cycle_index: u64,
    consecutive_failures: u32,
}

impl RunState {
    /// Messages written (and acknowledged, in ACK mode) so far.
    pub fn sent_total(&self) -> u64 {
        self.sent_total
    }

    /// Completed passes over the message set.
    pub fn cycle_index(&self) -> u64 {
        self.cycle_index
    }
}

pub struct Sender {
    messages: MessageSet,
    config: RunConfig,
    state: RunState,
}

impl Sender {
    pub fn new(messages: MessageSet, config: RunConfig) -> Self {
        Self {
            messages,
            config,
            state: RunState::default(),
        }
    }

    /// Sends until the configured count is reached, then returns the final
    /// counters. With a count of 0 this never returns.
    pub fn run(mut self) -> RunState {
        info!(
            host = %self.config.host,
            port = self.config.port,
            messages = self.messages.len(),
            count = self.config.count,
            ack = self.config.ack,
            encoding = %self.config.encoding,
            "starting MLLP sender"
        );
        loop {
            match self.run_connection() {
                Ok(()) => {
                    info!(
                        sent = self.state.sent_total,
                        cycles = self.state.cycle_index,
                        "message count reached"
                    );
                    return self.state;
                }
                Err(err) => {
                    self.state.consecutive_failures =
                        self.state.consecutive_failures.saturating_add(1);
                    let delay =
                        backoff_delay(self.state.consecutive_failures, self.config.backoff_unit);
                    warn!(
                        error = %err,
                        failures = self.state.consecutive_failures,
                        sent = self.state.sent_total,
                        "send cycle aborted, reconnecting in {:?}",
                        delay
                    );
                    thread::sleep(delay);
                }
            }
        }
    }

    /// One connection's worth of sending. Returns `Ok` only when the count is
    /// reached; the stream is closed on every return path when it drops.
    fn run_connection(&mut self) -> Result<(), SendError> {
        let Self {
            messages,
            config,
            state,
        } = self;

        let mut stream = connect(config)?;
        state.consecutive_failures = 0;
        debug!(host = %config.host, port = config.port, "connected");

        loop {
            let mut skipped = None;
            let mut sent_in_pass = 0usize;

            for original in messages.iter() {
                let message = match rewrite_control_id(original, &fresh_control_id()) {
                    Some(rewritten) => Cow::Owned(rewritten),
                    None => Cow::Borrowed(original),
                };

                let frame = match encode_frame(&message, config.encoding) {
                    Ok(frame) => frame,
                    Err(err) if config.encoding_policy == EncodingPolicy::Skip => {
                        warn!(error = %err, "skipping message");
                        skipped = Some(err);
                        continue;
                    }
                    Err(err) => return Err(err.into()),
                };

                stream.write_all(&frame)?;
                stream.flush()?;

                if config.ack {
                    let response = await_ack(&mut stream)?;
                    trace!(ack = ?ack_text(&response, config.encoding), "ack received");
                }

                state.sent_total += 1;
                sent_in_pass += 1;
                debug!(
                    sent = state.sent_total,
                    control_id = control_id(&message).unwrap_or_default(),
                    bytes = frame.len(),
                    "message sent"
                );

                if config.count > 0 && state.sent_total >= config.count {
                    return Ok(());
                }

                thread::sleep(config.interval);

                if config.new_conn_each {
                    drop(stream);
                    stream = connect(config)?;
                    trace!("reconnected for next message");
                }
            }

            // A pass where every message was skipped would spin without ever
            // touching the network.
            if sent_in_pass == 0 {
                if let Some(err) = skipped {
                    return Err(err.into());
                }
            }

            state.cycle_index += 1;
            info!(
                cycle = state.cycle_index,
                sent = state.sent_total,
                "completed pass over message set"
            );
        }
    }
}

/// Reads until the peer closes the stream or the accumulated response ends
/// with the MLLP trailer. The content itself is not interpreted.
fn await_ack(stream: &mut TcpStream) -> io::Result<Vec<u8>> {
    let mut response = Vec::new();
    let mut chunk = [0; BUFFER_SIZE];

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                response.extend_from_slice(&chunk[..n]);
                if is_terminated(&response) {
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(response)
}

fn ack_text(response: &[u8], encoding: Encoding) -> Option<String> {
    encoding
        .decode(unwrap_frame(response))
        .map(|text| text.replace('\r', "\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn failures_reset_after_successful_connect() {
        // Free the port so the first connects are refused.
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let config = RunConfig {
            host: "127.0.0.1".to_string(),
            port,
            interval: Duration::ZERO,
            count: 1,
            backoff_unit: Duration::from_millis(10),
            ..RunConfig::default()
        };
        let messages = MessageSet::new(vec!["MSH|^~\\&|A|B|C|D|E|F|G|H|I".to_string()]).unwrap();
        let handle = thread::spawn(move || Sender::new(messages, config).run());

        thread::sleep(Duration::from_millis(100));
        let listener = TcpListener::bind(("127.0.0.1", port)).unwrap();
        let (mut stream, _) = listener.accept().unwrap();
        let mut frame = Vec::new();
        let mut buffer = [0; 1024];
        while !is_terminated(&frame) {
            let n = stream.read(&mut buffer).unwrap();
            assert!(n > 0);
            frame.extend_from_slice(&buffer[..n]);
        }

        let state = handle.join().unwrap();
        assert_eq!(state.sent_total, 1);
        assert_eq!(state.consecutive_failures, 0);
    }

    #[test]
    fn backoff_grows_linearly_then_caps() {
        let unit = Duration::from_secs(1);
        assert_eq!(backoff_delay(0, unit), Duration::from_secs(1));
        assert_eq!(backoff_delay(1, unit), Duration::from_secs(2));
        assert_eq!(backoff_delay(5, unit), Duration::from_secs(6));
        assert_eq!(backoff_delay(29, unit), Duration::from_secs(30));
        assert_eq!(backoff_delay(30, unit), Duration::from_secs(30));
        assert_eq!(backoff_delay(u32::MAX, unit), Duration::from_secs(30));
    }

    #[test]
    fn backoff_is_monotonic() {
        let unit = Duration::from_millis(10);
        let delays: Vec<_> = (0..40).map(|k| backoff_delay(k, unit)).collect();
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*delays.last().unwrap(), unit * 30);
    }

    #[test]
    fn ack_text_strips_frame() {
        let ack = b"\x0bMSH|^~\\&|R\rMSA|AA|1\x1c\x0d";
        assert_eq!(
            ack_text(ack, Encoding::Utf8).as_deref(),
            Some("MSH|^~\\&|R\nMSA|AA|1")
        );
    }
}
