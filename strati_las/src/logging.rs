/////////////////////////////////////////////////////////////////////////////////////////////
//
// Defines diagnostic messages, log sinks, and helper functions for reporting engine events.
//
// Created on: 27 Apr 2026     Author: Daniel Owen
//
// Copyright (c) 2026, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! Diagnostic reporting primitives for the field generator.

use std::fmt::{self, Debug};
use std::sync::{Arc, mpsc};
use std::thread;

/// Diagnostic events emitted by the generator.
#[derive(Debug, Clone)]
pub enum LogMsg {
    /// A Cholesky factorization completed with a relative residual above the
    /// configured tolerance. The factor is still used.
    FactorResidual {
        context: String,
        rerr: f64,
        tol: f64,
    },

    /// A non-positive seed was supplied and a seed was drawn from system
    /// entropy instead.
    EntropySeed { seed: i32 },

    /// Elapsed wall-clock time of a generator phase.
    Timing { label: &'static str, seconds: f64 },

    /// A fatal condition that aborts the current operation.
    Fatal { message: String },

    /// Arbitrary informational message.
    Message { message: String },
}

impl fmt::Display for LogMsg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogMsg::FactorResidual { context, rerr, tol } => write!(
                f,
                "Warning: {context} Cholesky relative residual {rerr:.3e} exceeds tolerance {tol:.3e}"
            ),
            LogMsg::EntropySeed { seed } => {
                write!(f, "generator seeded from system entropy: {seed}")
            }
            LogMsg::Timing { label, seconds } => write!(f, "{label} time: {seconds:.3} s"),
            LogMsg::Fatal { message } => write!(f, "Error: {message}"),
            LogMsg::Message { message } => write!(f, "{message}"),
        }
    }
}

/// Sink that consumes diagnostic messages.
pub trait LogSink: Send + Sync + Debug {
    fn emit(&self, msg: LogMsg);
}

/// Log sink that forwards messages over a channel.
#[derive(Debug)]
pub struct ClosureSink {
    tx: mpsc::SyncSender<LogMsg>,
}

impl LogSink for ClosureSink {
    #[inline]
    fn emit(&self, msg: LogMsg) {
        let _ = self.tx.try_send(msg);
    }
}

/// Spawns a listener thread that runs a handler closure for each message.
pub fn closure_sink<F>(buffer: usize, mut handler: F) -> (Arc<dyn LogSink>, thread::JoinHandle<()>)
where
    F: FnMut(LogMsg) + Send + 'static,
{
    let (tx, rx) = mpsc::sync_channel::<LogMsg>(buffer.max(1));
    let sink: Arc<dyn LogSink> = Arc::new(ClosureSink { tx });

    let handle = thread::spawn(move || {
        while let Ok(msg) = rx.recv() {
            handler(msg);
        }
    });

    (sink, handle)
}

/// Log sink that prints each rendered message to standard error.
#[derive(Debug, Default)]
pub struct StderrSink;

impl LogSink for StderrSink {
    fn emit(&self, msg: LogMsg) {
        eprintln!("{msg}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_render_with_documented_prefixes() {
        let warning = LogMsg::FactorResidual {
            context: "stage 2".into(),
            rerr: 2e-3,
            tol: 1e-3,
        };
        assert!(warning.to_string().starts_with("Warning:"));

        let fatal = LogMsg::Fatal {
            message: "grid cannot be decomposed".into(),
        };
        assert!(fatal.to_string().starts_with("Error:"));
    }

    #[test]
    fn closure_sink_delivers_messages() {
        let (counter_tx, counter_rx) = mpsc::channel();
        let (sink, handle) = closure_sink(8, move |msg| {
            counter_tx.send(msg.to_string()).unwrap();
        });
        sink.emit(LogMsg::Message {
            message: "hello".into(),
        });
        assert_eq!(counter_rx.recv().unwrap(), "hello");
        drop(sink);
        handle.join().unwrap();
    }
}
