//! Channel plumbing between the simulator connector and the render worker.
//!
//! Inbound messages travel over a small bounded channel so a stalled
//! renderer backpressures the connector instead of queueing stale state.
//! Outbound frames go through the [`FrameSink`] trait; production attaches
//! the simulator bridge, tests attach [`ChannelSink`].

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::trace;

use crate::types::{FrameMetadata, Side, SimMessage};
use crate::LinkError;

/// Create the inbound message channel.
pub fn message_channel(capacity: usize) -> (Sender<SimMessage>, Receiver<SimMessage>) {
    bounded(capacity)
}

/// Consumer of rendered frames and their metadata.
pub trait FrameSink: Send + Sync {
    fn send_metadata(&self, side: Side, metadata: &FrameMetadata) -> Result<(), LinkError>;
    fn send_frame(&self, side: Side, png: Vec<u8>) -> Result<(), LinkError>;
}

/// Events observed by a [`ChannelSink`] consumer.
#[derive(Clone, Debug)]
pub enum SinkEvent {
    Metadata { side: Side, metadata: FrameMetadata },
    Frame { side: Side, png: Vec<u8> },
}

/// Sink forwarding every emission over a channel.
pub struct ChannelSink {
    tx: Sender<SinkEvent>,
}

/// Create a channel-backed sink plus the receiving end.
pub fn sink_channel(capacity: usize) -> (ChannelSink, Receiver<SinkEvent>) {
    let (tx, rx) = bounded(capacity);
    (ChannelSink { tx }, rx)
}

impl FrameSink for ChannelSink {
    fn send_metadata(&self, side: Side, metadata: &FrameMetadata) -> Result<(), LinkError> {
        self.tx
            .send(SinkEvent::Metadata {
                side,
                metadata: *metadata,
            })
            .map_err(|_| LinkError::Disconnected)
    }

    fn send_frame(&self, side: Side, png: Vec<u8>) -> Result<(), LinkError> {
        self.tx
            .send(SinkEvent::Frame { side, png })
            .map_err(|_| LinkError::Disconnected)
    }
}

/// Sink used when no simulator bridge is attached.
pub struct DiscardSink;

impl FrameSink for DiscardSink {
    fn send_metadata(&self, side: Side, metadata: &FrameMetadata) -> Result<(), LinkError> {
        trace!(side = side.label(), reset = metadata.is_reset(), "metadata discarded");
        Ok(())
    }

    fn send_frame(&self, side: Side, png: Vec<u8>) -> Result<(), LinkError> {
        trace!(side = side.label(), bytes = png.len(), "frame discarded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_sink_forwards_events_in_order() {
        let (sink, rx) = sink_channel(8);
        sink.send_metadata(Side::Capt, &FrameMetadata::reset())
            .unwrap();
        sink.send_frame(Side::Capt, vec![1, 2, 3]).unwrap();

        assert!(matches!(
            rx.recv().unwrap(),
            SinkEvent::Metadata { side: Side::Capt, .. }
        ));
        match rx.recv().unwrap() {
            SinkEvent::Frame { side, png } => {
                assert_eq!(side, Side::Capt);
                assert_eq!(png, vec![1, 2, 3]);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn dropped_receiver_reports_disconnect() {
        let (sink, rx) = sink_channel(1);
        drop(rx);
        assert!(sink.send_frame(Side::Fo, Vec::new()).is_err());
    }
}
