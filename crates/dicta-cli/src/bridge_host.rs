//! Parent-side handle to the input-bridge helper process.
//!
//! Spawns the child, turns its stdout into a lazy stream of key events,
//! and exposes injection as a command-and-acknowledge call. The bridge is
//! treated as a restartable, possibly-absent collaborator: when it dies,
//! the service sees `HostEvent::Closed`, resets to idle, and respawns it.

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender, unbounded};

use dicta_core::{InjectionError, KeyEvent, TextInjector};

use crate::bridge::{BridgeCommand, BridgeEvent};

const ACK_TIMEOUT: Duration = Duration::from_secs(5);

/// What the service sees from the bridge.
pub enum HostEvent {
    Key(KeyEvent),
    /// The hook could not be registered in the child.
    Fatal(String),
    /// The child exited or closed its stdout.
    Closed,
}

struct BridgeIo {
    stdin: ChildStdin,
    ack_rx: Receiver<Result<(), String>>,
}

pub struct BridgeHost {
    trigger_key: String,
    events_tx: Sender<HostEvent>,
    events_rx: Receiver<HostEvent>,
    io: Arc<Mutex<Option<BridgeIo>>>,
    child: Option<Child>,
}

impl BridgeHost {
    pub fn spawn(trigger_key: &str) -> Result<Self> {
        let (events_tx, events_rx) = unbounded();
        let mut host = Self {
            trigger_key: trigger_key.to_string(),
            events_tx,
            events_rx,
            io: Arc::new(Mutex::new(None)),
            child: None,
        };
        host.spawn_child()?;
        Ok(host)
    }

    fn spawn_child(&mut self) -> Result<()> {
        let exe = std::env::current_exe().context("Failed to locate own executable")?;
        let mut child = Command::new(exe)
            .args(["bridge", "--trigger", &self.trigger_key])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .context("Failed to spawn the input bridge process")?;

        let stdin = child
            .stdin
            .take()
            .context("Bridge child has no stdin handle")?;
        let stdout = child
            .stdout
            .take()
            .context("Bridge child has no stdout handle")?;

        let (ack_tx, ack_rx) = unbounded();
        *self.io.lock().unwrap() = Some(BridgeIo { stdin, ack_rx });

        let events_tx = self.events_tx.clone();
        let io = self.io.clone();
        std::thread::Builder::new()
            .name("dicta-bridge-reader".to_string())
            .spawn(move || {
                let reader = BufReader::new(stdout);
                for line in reader.lines() {
                    let Ok(line) = line else { break };
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<BridgeEvent>(&line) {
                        Ok(BridgeEvent::Ready) => tracing::info!("input bridge ready"),
                        Ok(BridgeEvent::Key {
                            key,
                            kind,
                            timestamp_ms,
                        }) => {
                            let _ = events_tx.send(HostEvent::Key(KeyEvent {
                                key,
                                kind,
                                timestamp_ms,
                            }));
                        }
                        Ok(BridgeEvent::WriteResult { ok, error }) => {
                            let result = if ok {
                                Ok(())
                            } else {
                                Err(error.unwrap_or_else(|| "unknown injection failure".to_string()))
                            };
                            let _ = ack_tx.send(result);
                        }
                        Ok(BridgeEvent::Fatal { message }) => {
                            let _ = events_tx.send(HostEvent::Fatal(message));
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, line = %line, "unparseable bridge event");
                        }
                    }
                }
                // EOF: invalidate the injection channel, then tell the
                // service so it can reset and respawn.
                io.lock().unwrap().take();
                let _ = events_tx.send(HostEvent::Closed);
            })
            .context("Failed to spawn bridge reader thread")?;

        self.child = Some(child);
        Ok(())
    }

    /// Non-blocking event poll for the service loop.
    pub fn try_event(&self) -> Option<HostEvent> {
        self.events_rx.try_recv().ok()
    }

    /// Kill whatever is left of the child and start a fresh one.
    pub fn respawn(&mut self) -> Result<()> {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        self.spawn_child()
    }

    /// Cloneable injection handle for the coordinator. Stays valid across
    /// respawns because it shares the live io slot.
    pub fn injector(&self) -> BridgeInjector {
        BridgeInjector {
            io: self.io.clone(),
        }
    }
}

impl Drop for BridgeHost {
    fn drop(&mut self) {
        if let Some(io) = self.io.lock().unwrap().as_mut()
            && let Ok(json) = serde_json::to_string(&BridgeCommand::Shutdown)
        {
            let _ = writeln!(io.stdin, "{json}");
            let _ = io.stdin.flush();
        }
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// `TextInjector` backed by the bridge process: send a `write` command and
/// wait for its acknowledgement. One injection at a time.
#[derive(Clone)]
pub struct BridgeInjector {
    io: Arc<Mutex<Option<BridgeIo>>>,
}

impl TextInjector for BridgeInjector {
    fn inject(&self, text: &str) -> Result<(), InjectionError> {
        let mut guard = self.io.lock().unwrap();
        let io = guard.as_mut().ok_or(InjectionError::BridgeUnavailable)?;

        let command = serde_json::to_string(&BridgeCommand::Write {
            text: text.to_string(),
        })
        .map_err(|e| InjectionError::Failed(e.to_string()))?;

        writeln!(io.stdin, "{command}")
            .and_then(|_| io.stdin.flush())
            .map_err(|_| InjectionError::BridgeUnavailable)?;

        match io.ack_rx.recv_timeout(ACK_TIMEOUT) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(message)) => Err(InjectionError::Failed(message)),
            Err(_) => Err(InjectionError::AckTimeout),
        }
    }
}
