//! Channel-backed [`CapturerListener`] for consumers that prefer pulling events.

use crate::capturer::CapturerListener;
use crate::types::VideoFrame;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum CaptureEvent {
    Started(bool),
    Frame(VideoFrame),
}

/// Forwards capturer callbacks into a bounded channel.
///
/// Frames that do not fit are dropped and counted. Start results never block the driver
/// thread: when the queue is full the oldest queued event is evicted to make room.
pub struct ChannelListener {
    sender: Sender<CaptureEvent>,
    evict: Receiver<CaptureEvent>,
    dropped: Arc<AtomicU64>,
}

impl ChannelListener {
    pub fn new(capacity: usize) -> (Arc<Self>, Receiver<CaptureEvent>) {
        let (sender, receiver) = bounded(capacity.max(1));
        let listener = Arc::new(Self {
            sender,
            evict: receiver.clone(),
            dropped: Arc::new(AtomicU64::new(0)),
        });
        (listener, receiver)
    }

    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl CapturerListener for ChannelListener {
    fn on_capturer_started(&self, success: bool) {
        let mut event = CaptureEvent::Started(success);
        loop {
            match self.sender.try_send(event) {
                Ok(()) => return,
                Err(TrySendError::Full(back)) => {
                    event = back;
                    match self.evict.try_recv() {
                        Ok(CaptureEvent::Frame(_)) => {
                            self.dropped.fetch_add(1, Ordering::Relaxed);
                        }
                        Ok(CaptureEvent::Started(stale)) => {
                            log::debug!("Evicted unread start result {}", stale);
                        }
                        Err(_) => {}
                    }
                }
                Err(TrySendError::Disconnected(_)) => {
                    log::debug!("Capture event receiver dropped");
                    return;
                }
            }
        }
    }

    fn on_frame_captured(&self, frame: VideoFrame) {
        match self.sender.try_send(CaptureEvent::Frame(frame)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}
