//! Acquisition boundary: where raw channel samples come from

use crate::ecg_types::ChannelPair;
use crate::error::EcgResult;

/// A source of raw two-channel samples, read once per tick
///
/// Implementations must deliver both channels together so the pipeline never
/// filters one channel of a tick before the other has been read.
pub trait ChannelSource {
    /// Read the raw value of both channels for the current tick
    fn read_channels(&mut self) -> EcgResult<ChannelPair<f32>>;

    /// Short human-readable name used in logs
    fn name(&self) -> &str;
}

impl<S: ChannelSource + ?Sized> ChannelSource for Box<S> {
    fn read_channels(&mut self) -> EcgResult<ChannelPair<f32>> {
        (**self).read_channels()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
