//! Test fixtures for conversion and batch tests
//!
//! A scripted stand-in for ffmpeg, a sink that records batch events, and
//! helpers for laying out source files in a temp directory.

#![cfg(test)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::batch::{BatchEvent, EventSink};
use crate::conversion::{Encoder, EncoderRequest, EncoderStatus, Quality, TargetFormat};

/// What the fake encoder does on one invocation
#[derive(Debug, Clone)]
pub enum FakeStep {
    /// Write `encoded:` followed by the input bytes
    Succeed,
    /// Report success after writing a zero-byte file
    SucceedEmpty,
    /// Report success without touching the output
    SucceedWithoutWriting,
    /// Report cancellation
    Cancel,
    /// Write partial output and fail with the given diagnostic
    Fail(String),
}

/// One recorded invocation
#[derive(Debug, Clone)]
pub struct FakeCall {
    pub input: PathBuf,
    pub output: PathBuf,
    pub format: TargetFormat,
    pub quality: Quality,
    pub input_existed: bool,
}

/// Encoder that follows a script instead of running ffmpeg
///
/// Once the script runs out every invocation succeeds. Like ffmpeg, a
/// pending cancel makes the next invocation report `Cancelled`.
#[derive(Default)]
pub struct FakeEncoder {
    script: Mutex<VecDeque<FakeStep>>,
    calls: Mutex<Vec<FakeCall>>,
    cancels: AtomicUsize,
    resets: AtomicUsize,
    cancel_pending: AtomicBool,
}

impl FakeEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scripted(steps: impl IntoIterator<Item = FakeStep>) -> Self {
        Self {
            script: Mutex::new(steps.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<FakeCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn cancel_count(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }

    pub fn reset_count(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }
}

impl Encoder for FakeEncoder {
    fn invoke(&self, request: &EncoderRequest<'_>) -> EncoderStatus {
        self.calls.lock().unwrap().push(FakeCall {
            input: request.input.to_path_buf(),
            output: request.output.to_path_buf(),
            format: request.format,
            quality: request.quality,
            input_existed: request.input.is_file(),
        });

        if self.cancel_pending.load(Ordering::SeqCst) {
            return EncoderStatus::Cancelled;
        }

        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(FakeStep::Succeed);

        match step {
            FakeStep::Succeed => {
                let mut bytes = b"encoded:".to_vec();
                bytes.extend(std::fs::read(request.input).unwrap());
                std::fs::write(request.output, bytes).unwrap();
                EncoderStatus::Success
            }
            FakeStep::SucceedEmpty => {
                std::fs::write(request.output, b"").unwrap();
                EncoderStatus::Success
            }
            FakeStep::SucceedWithoutWriting => EncoderStatus::Success,
            FakeStep::Cancel => EncoderStatus::Cancelled,
            FakeStep::Fail(diagnostic) => {
                std::fs::write(request.output, b"partial").unwrap();
                EncoderStatus::Failure(diagnostic)
            }
        }
    }

    fn cancel_all(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        self.cancel_pending.store(true, Ordering::SeqCst);
    }

    fn reset_cancel(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
        self.cancel_pending.store(false, Ordering::SeqCst);
    }
}

/// Sink that keeps every event it receives
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<BatchEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<BatchEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, predicate: impl Fn(&BatchEvent) -> bool) -> usize {
        self.events.lock().unwrap().iter().filter(|e| predicate(*e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: BatchEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Wraps a closure as a sink
pub struct FnSink<F>(pub F);

impl<F> EventSink for FnSink<F>
where
    F: Fn(BatchEvent) + Send + Sync,
{
    fn emit(&self, event: BatchEvent) {
        (self.0)(event)
    }
}

/// Write a source file, creating parent directories
pub fn write_source(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, bytes).unwrap();
    path
}
