//! Background stdin reader.
//!
//! Raw-mode stdin reads block, so a dedicated thread reads chunks and ships
//! them over a channel; the event loop polls with a timeout and stays
//! responsive for timers and redraws.

use std::io::{self, Read};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StdinMessage {
    Data(Vec<u8>),
    /// EOF or a read error; no more input will arrive.
    Closed,
}

pub struct StdinReader {
    rx: Receiver<StdinMessage>,
}

impl StdinReader {
    /// Spawn the reader thread. The thread exits when stdin closes or the
    /// receiver is dropped.
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut stdin = io::stdin();
            let mut buf = [0u8; 1024];
            loop {
                match stdin.read(&mut buf) {
                    Ok(0) => {
                        let _ = tx.send(StdinMessage::Closed);
                        break;
                    }
                    Ok(n) => {
                        if tx.send(StdinMessage::Data(buf[..n].to_vec())).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(_) => {
                        let _ = tx.send(StdinMessage::Closed);
                        break;
                    }
                }
            }
        });
        Self { rx }
    }

    /// Wait up to `timeout` for the next chunk.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<StdinMessage> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Non-blocking poll for already-buffered chunks.
    pub fn try_recv(&self) -> Option<StdinMessage> {
        self.rx.try_recv().ok()
    }
}
