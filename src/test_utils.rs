//! Deterministic stand-ins for the backend, the clock and the log sink.

use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;

use crate::backend::{BackendReply, TranslationBackend};
use crate::pacing::Sleeper;

type Responder = Box<dyn FnMut(usize, &str) -> anyhow::Result<String>>;

/// Backend whose replies come from a closure of `(call_index, payload)`.
pub(crate) struct ScriptedBackend {
    responder: Responder,
    /// Every payload received, in order.
    pub(crate) calls: Vec<String>,
}

impl ScriptedBackend {
    pub(crate) fn new(responder: impl FnMut(usize, &str) -> anyhow::Result<String> + 'static) -> Self {
        Self {
            responder: Box::new(responder),
            calls: Vec::new(),
        }
    }

    pub(crate) fn always(reply: &str) -> Self {
        let reply = reply.to_string();
        Self::new(move |_, _| Ok(reply.clone()))
    }

    pub(crate) fn always_failing() -> Self {
        Self::new(|_, _| Err(anyhow!("connection reset by peer")))
    }
}

impl TranslationBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn complete(&mut self, _system: &str, user: &str) -> anyhow::Result<BackendReply> {
        let idx = self.calls.len();
        self.calls.push(user.to_string());
        (self.responder)(idx, user).map(BackendReply::from_text)
    }
}

/// Records requested pauses instead of sleeping.
#[derive(Default)]
pub(crate) struct RecordingSleeper {
    pub(crate) slept: Vec<Duration>,
}

impl Sleeper for RecordingSleeper {
    fn sleep(&mut self, dur: Duration) {
        self.slept.push(dur);
    }
}

/// Collects formatted log lines emitted inside [`CapturedLogs::capture`].
#[derive(Clone, Default)]
pub(crate) struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub(crate) fn capture<T>(&self, f: impl FnOnce() -> T) -> T {
        let sink = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .with_writer(move || sink.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f)
    }

    pub(crate) fn contents(&self) -> String {
        let buf = self.0.lock().map(|b| b.clone()).unwrap_or_default();
        String::from_utf8_lossy(&buf).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if let Ok(mut buf) = self.0.lock() {
            buf.extend_from_slice(data);
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
