//! The session state machine: one logical call runs
//! `Idle → HeaderSent → (sideband)* → ResultCountRead → ResultsRead(n) → Idle`,
//! with a failed call surfacing as an error from the call method. There is no
//! multiplexing: a call owns the channel until its terminating frame.

use std::time::Duration;

use objwire_channel::{ByteChannel, ChannelConfig, WireStream};
use objwire_codec::{binary, encode, graph::PointerTable, lexer, DecodeError, Value};
use tracing::{debug, info};

use crate::error::{CallError, Result};
use crate::idalloc::IdAllocator;
use crate::sideband::{LogFrame, ProgressFrame, ProgressRegistry, SidebandHandler, TracingSideband};

/// Configuration for a [`Session`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// First object id handed out. Id 0 is the wire-level Null pointer and
    /// is never allocated.
    pub id_base: u64,
    /// Clear the pointer table at each call start. Callers that want
    /// back-references to span calls opt out via
    /// [`Session::retain_references`].
    pub clear_refs_per_call: bool,
    /// Timeout used by [`Session::is_alive`].
    pub ping_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            id_base: 1,
            clear_refs_per_call: true,
            ping_timeout: Duration::from_secs(5),
        }
    }
}

/// A client-side proxy for an object living in the remote server's memory.
///
/// Handles are created only by the session that owns them and destroyed by
/// an explicit [`Session::delete_object`]; a dropped handle leaks the remote
/// object.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct RemoteHandle {
    id: u64,
}

impl RemoteHandle {
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// One connection to a remote object server.
pub struct Session<T: WireStream> {
    chan: ByteChannel<T>,
    refs: PointerTable,
    ids: IdAllocator,
    handler: Box<dyn SidebandHandler>,
    progress: ProgressRegistry,
    config: SessionConfig,
    retain_refs: bool,
    closed: bool,
}

impl<T: WireStream> Session<T> {
    /// Open a session over a connected duplex stream.
    pub fn new(stream: T) -> Result<Self> {
        Self::with_config(stream, SessionConfig::default())
    }

    /// Open a session with explicit configuration.
    pub fn with_config(stream: T, config: SessionConfig) -> Result<Self> {
        let chan = ByteChannel::with_config(stream, ChannelConfig::default())?;
        info!(id_base = config.id_base, "session opened");
        Ok(Self {
            chan,
            refs: PointerTable::new(),
            ids: IdAllocator::new(config.id_base),
            handler: Box::new(TracingSideband),
            progress: ProgressRegistry::default(),
            config,
            retain_refs: false,
            closed: false,
        })
    }

    /// Replace the sideband handler.
    pub fn set_sideband_handler(&mut self, handler: Box<dyn SidebandHandler>) {
        self.handler = handler;
    }

    /// Keep pointer back-references across call boundaries. Off by default;
    /// the table is otherwise cleared when each call starts.
    pub fn retain_references(&mut self, retain: bool) {
        self.retain_refs = retain;
    }

    /// The pointer table of the current exchange.
    pub fn references(&self) -> &PointerTable {
        &self.refs
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        self.chan.get_ref()
    }

    /// Construct a remote object from its textual spec.
    pub fn new_object(&mut self, spec: &str) -> Result<RemoteHandle> {
        self.begin_call();
        let id = self.ids.allocate();
        let outcome = self
            .send_line(&format!("!N {id} {spec}\n"))
            .and_then(|()| self.expect_zero_results());
        match outcome {
            Ok(()) => {
                debug!(id, "remote object created");
                Ok(RemoteHandle { id })
            }
            Err(err) => {
                self.ids.release(id);
                Err(err)
            }
        }
    }

    /// Load a remote object from a path on the server side.
    pub fn load_object(&mut self, path: &str) -> Result<RemoteHandle> {
        self.begin_call();
        let id = self.ids.allocate();
        let quoted = encode(&Value::str(path));
        let outcome = self
            .send_line(&format!("!L {id} {quoted}\n"))
            .and_then(|()| self.expect_zero_results());
        match outcome {
            Ok(()) => {
                debug!(id, path, "remote object loaded");
                Ok(RemoteHandle { id })
            }
            Err(err) => {
                self.ids.release(id);
                Err(err)
            }
        }
    }

    /// Take ownership of an object that already exists on the server under a
    /// known id, e.g. one named on a command line. Fails if this session is
    /// already tracking that id.
    pub fn adopt(&mut self, id: u64) -> Result<RemoteHandle> {
        if id == 0 || !self.ids.reserve(id) {
            return Err(CallError::IdUnavailable(id));
        }
        Ok(RemoteHandle { id })
    }

    /// Delete one remote object and release its id.
    pub fn delete_object(&mut self, handle: RemoteHandle) -> Result<()> {
        self.begin_call();
        self.send_line(&format!("!D {}\n", handle.id))?;
        self.expect_zero_results()?;
        self.ids.release(handle.id);
        debug!(id = handle.id, "remote object deleted");
        Ok(())
    }

    /// Delete every object this session created.
    pub fn delete_all(&mut self) -> Result<()> {
        self.begin_call();
        self.send_line("!Z \n")?;
        self.expect_zero_results()?;
        self.ids.release_all();
        debug!("all remote objects deleted");
        Ok(())
    }

    /// Call a free function on the server.
    pub fn call_function(&mut self, name: &str, args: &[Value]) -> Result<Vec<Value>> {
        self.begin_call();
        self.send_line(&call_line(&format!("!F {name}"), args))?;
        self.read_response()
    }

    /// Call a method on a remote object.
    pub fn call_method(
        &mut self,
        handle: &RemoteHandle,
        name: &str,
        args: &[Value],
    ) -> Result<Vec<Value>> {
        self.begin_call();
        self.send_line(&call_line(&format!("!M {} {name}", handle.id), args))?;
        self.read_response()
    }

    /// Probe the server with a `!P` ping, bounding the wait.
    ///
    /// The read timeout is restored whether the probe succeeds, fails or
    /// times out, so the bound never leaks into a later call.
    pub fn ping(&mut self, timeout: Duration) -> Result<()> {
        self.chan.set_read_timeout(Some(timeout))?;
        let outcome = self.run_ping();
        let restore = self.chan.set_read_timeout(None);
        let outcome = outcome.map_err(|err| match err {
            CallError::Channel(err) if err.is_timeout() => CallError::Timeout(timeout),
            CallError::Decode(DecodeError::Channel(err)) if err.is_timeout() => {
                CallError::Timeout(timeout)
            }
            other => other,
        });
        outcome?;
        restore?;
        Ok(())
    }

    fn run_ping(&mut self) -> Result<()> {
        self.begin_call();
        self.send_line("!P \n")?;
        self.expect_zero_results()
    }

    /// True when the server answers a ping within the configured timeout.
    /// Errors are not propagated; a dead peer reads as `false`.
    pub fn is_alive(&mut self) -> bool {
        self.is_alive_within(self.config.ping_timeout)
    }

    /// [`Session::is_alive`] with an explicit bound.
    pub fn is_alive_within(&mut self, timeout: Duration) -> bool {
        self.ping(timeout).is_ok()
    }

    /// End the session with a `!Q` frame and shut the channel down.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.chan.write_all(b"!Q")?;
        self.chan.close()?;
        info!("session closed");
        Ok(())
    }

    fn begin_call(&mut self) {
        if self.config.clear_refs_per_call && !self.retain_refs {
            self.refs.clear();
        }
    }

    fn send_line(&mut self, line: &str) -> Result<()> {
        self.chan.write_all(line.as_bytes())?;
        self.chan.flush()?;
        Ok(())
    }

    fn expect_zero_results(&mut self) -> Result<()> {
        let values = self.read_response()?;
        if !values.is_empty() {
            return Err(CallError::ResultCountMismatch {
                expected: 0,
                got: values.len(),
            });
        }
        Ok(())
    }

    /// Drain sideband frames, then decode the terminating `!R`/`!E` frame.
    fn read_response(&mut self) -> Result<Vec<Value>> {
        loop {
            lexer::skip_blanks_and_comments(&mut self.chan).map_err(CallError::Decode)?;
            match self.chan.read_byte().map_err(CallError::Channel)? {
                b'*' => self.read_sideband()?,
                b'!' => break,
                found => return Err(CallError::Protocol { found }),
            }
        }
        match self.chan.read_byte().map_err(CallError::Channel)? {
            b'R' => {
                let count = lexer::read_int_u64(&mut self.chan, &mut self.refs)? as usize;
                // The count field is untrusted; treat it as a hint only and
                // let the decode loop find the real length.
                let mut values = Vec::with_capacity(count.min(64));
                for got in 0..count {
                    match binary::decode(&mut self.chan, &mut self.refs) {
                        Ok(value) => values.push(value),
                        Err(DecodeError::Channel(
                            objwire_channel::ChannelError::Truncated { .. },
                        )) => {
                            return Err(CallError::ResultCountMismatch {
                                expected: count,
                                got,
                            })
                        }
                        Err(err) => return Err(err.into()),
                    }
                }
                Ok(values)
            }
            b'E' => {
                lexer::skip_blanks(&mut self.chan).map_err(CallError::Decode)?;
                let message = lexer::read_quoted_string(&mut self.chan)?;
                debug!(message, "remote call failed");
                Err(CallError::Remote(message))
            }
            found => Err(CallError::Protocol { found }),
        }
    }

    /// Parse one sideband frame; the leading `*` is already consumed.
    fn read_sideband(&mut self) -> Result<()> {
        match self.chan.read_byte().map_err(CallError::Channel)? {
            b'L' => {
                lexer::skip_blanks(&mut self.chan).map_err(CallError::Decode)?;
                let module = lexer::read_word(&mut self.chan)?;
                let level = lexer::read_int_i64(&mut self.chan, &mut self.refs)?;
                lexer::skip_blanks(&mut self.chan).map_err(CallError::Decode)?;
                let message = lexer::read_quoted_string(&mut self.chan)?;
                self.handler.log(LogFrame {
                    module,
                    level,
                    message,
                });
            }
            b'P' => {
                lexer::skip_blanks(&mut self.chan).map_err(CallError::Decode)?;
                let cmd = lexer::read_word(&mut self.chan)?;
                let ptr = lexer::read_int_u64(&mut self.chan, &mut self.refs)?;
                match cmd.as_str() {
                    "A" => {
                        let steps = lexer::read_int_u64(&mut self.chan, &mut self.refs)?;
                        lexer::skip_blanks(&mut self.chan).map_err(CallError::Decode)?;
                        let title = if self.chan.peek().map_err(CallError::Channel)? == b'"' {
                            lexer::read_quoted_string(&mut self.chan)?
                        } else {
                            String::new()
                        };
                        self.progress.begin(ptr);
                        self.handler.progress(ProgressFrame::Begin { ptr, steps, title });
                    }
                    "K" => {
                        // Closing a bar is session bookkeeping, not an event
                        // the handler sees.
                        self.progress.kill(ptr);
                    }
                    _ => {
                        let pos = lexer::read_int_u64(&mut self.chan, &mut self.refs)?;
                        self.progress.update(ptr);
                        self.handler.progress(ProgressFrame::Update { ptr, pos });
                    }
                }
            }
            found => return Err(CallError::Protocol { found }),
        }
        Ok(())
    }
}

impl<T: WireStream> Drop for Session<T> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Assemble a call line: header, argument count, space-joined typed
/// arguments. The count field always carries a trailing space, arguments or
/// not, per the wire grammar.
fn call_line(header: &str, args: &[Value]) -> String {
    let mut line = format!("{header} {} ", args.len());
    for arg in args {
        line.push_str(&encode(arg));
        line.push(' ');
    }
    line.push('\n');
    line
}
