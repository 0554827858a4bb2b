//! Input triggers
//!
//! A trigger starts one pipeline run: either a line of typed text or a
//! push-to-talk request. Sources are polled without waiting so the idle view
//! keeps ticking while nobody is talking.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc::{self, error::TryRecvError};

use crate::voice::StopFlag;

/// Queue depth between the reader task and the session loop
const TRIGGER_QUEUE: usize = 32;

/// Something that starts a turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// Typed text, used directly as the transcript
    Text(String),
    /// Record speech for the configured window
    PushToTalk,
    /// Forget the conversation so far
    Reset,
}

/// Non-blocking source of triggers
pub trait TriggerSource {
    /// Next pending trigger, if any
    fn poll(&mut self) -> Option<Trigger>;

    /// Discard everything pending; returns how many triggers were dropped
    fn drain(&mut self) -> usize {
        let mut dropped = 0;
        while self.poll().is_some() {
            dropped += 1;
        }
        dropped
    }
}

/// Special lines recognized by the line reader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputCommands {
    pub talk: String,
    pub stop: String,
    pub reset: String,
}

impl Default for InputCommands {
    fn default() -> Self {
        Self {
            talk: "/talk".to_string(),
            stop: "/stop".to_string(),
            reset: "/reset".to_string(),
        }
    }
}

/// Triggers delivered over a channel
#[derive(Debug)]
pub struct ChannelTrigger {
    rx: mpsc::Receiver<Trigger>,
    closed: bool,
}

impl ChannelTrigger {
    /// Create a source and the sender that feeds it
    #[must_use]
    pub fn new() -> (mpsc::Sender<Trigger>, Self) {
        let (tx, rx) = mpsc::channel(TRIGGER_QUEUE);
        (tx, Self { rx, closed: false })
    }
}

impl TriggerSource for ChannelTrigger {
    fn poll(&mut self) -> Option<Trigger> {
        match self.rx.try_recv() {
            Ok(trigger) => Some(trigger),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                if !self.closed {
                    tracing::info!("input closed");
                    self.closed = true;
                }
                None
            }
        }
    }
}

/// Read triggers line by line from `reader` on a background task
///
/// The stop command does not produce a trigger; it raises `stop` so a
/// running recording or playback ends early.
pub fn spawn_line_reader<R>(reader: R, commands: InputCommands, stop: StopFlag) -> ChannelTrigger
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (tx, source) = ChannelTrigger::new();

    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "input read failed");
                    break;
                }
            };

            let Some(trigger) = parse_line(&line, &commands, &stop) else {
                continue;
            };
            if tx.send(trigger).await.is_err() {
                break;
            }
        }
        tracing::debug!("line reader finished");
    });

    source
}

fn parse_line(line: &str, commands: &InputCommands, stop: &StopFlag) -> Option<Trigger> {
    let line = line.trim_end_matches('\r').trim();

    if line.is_empty() {
        return None;
    }
    if line.eq_ignore_ascii_case(&commands.stop) {
        tracing::debug!("stop requested");
        stop.raise();
        return None;
    }
    if line.eq_ignore_ascii_case(&commands.talk) {
        return Some(Trigger::PushToTalk);
    }
    if line.eq_ignore_ascii_case(&commands.reset) {
        return Some(Trigger::Reset);
    }

    Some(Trigger::Text(line.to_string()))
}
