//! ECG-specific channel and lead types

use crate::error::{EcgError, EcgResult};
use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};
use uuid::Uuid;

/// One of the two acquired input channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    /// Lead I potential (left arm minus right arm)
    Lead1,
    /// Lead II potential (left leg minus right arm)
    Lead2,
}

impl Channel {
    /// Both channels in acquisition order
    pub const ALL: [Channel; 2] = [Channel::Lead1, Channel::Lead2];

    /// Zero-based channel index
    pub const fn index(self) -> usize {
        match self {
            Channel::Lead1 => 0,
            Channel::Lead2 => 1,
        }
    }
}

impl TryFrom<usize> for Channel {
    type Error = EcgError;

    fn try_from(index: usize) -> EcgResult<Self> {
        match index {
            0 => Ok(Channel::Lead1),
            1 => Ok(Channel::Lead2),
            _ => Err(EcgError::InvalidChannel { index }),
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Lead1 => write!(f, "Lead I"),
            Channel::Lead2 => write!(f, "Lead II"),
        }
    }
}

/// A value held once per acquired channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelPair<T> {
    pub lead1: T,
    pub lead2: T,
}

impl<T> ChannelPair<T> {
    pub const fn new(lead1: T, lead2: T) -> Self {
        Self { lead1, lead2 }
    }

    /// Apply `f` to both channels, keeping the pairing
    pub fn map<U>(self, mut f: impl FnMut(Channel, T) -> U) -> ChannelPair<U> {
        ChannelPair {
            lead1: f(Channel::Lead1, self.lead1),
            lead2: f(Channel::Lead2, self.lead2),
        }
    }
}

impl<T: Clone> ChannelPair<T> {
    /// Same value on both channels
    pub fn splat(value: T) -> Self {
        Self {
            lead1: value.clone(),
            lead2: value,
        }
    }
}

impl<T> Index<Channel> for ChannelPair<T> {
    type Output = T;

    fn index(&self, channel: Channel) -> &T {
        match channel {
            Channel::Lead1 => &self.lead1,
            Channel::Lead2 => &self.lead2,
        }
    }
}

impl<T> IndexMut<Channel> for ChannelPair<T> {
    fn index_mut(&mut self, channel: Channel) -> &mut T {
        match channel {
            Channel::Lead1 => &mut self.lead1,
            Channel::Lead2 => &mut self.lead2,
        }
    }
}

/// The six-lead record emitted once per tick
///
/// Lead I and Lead II are the calibrated acquired channels; the other four are
/// derived from them. Field names are the boundary names seen by consumers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LeadRecord {
    pub lead1: f32,
    pub lead2: f32,
    pub lead3: f32,
    pub avr: f32,
    pub avl: f32,
    pub avf: f32,
}

impl LeadRecord {
    /// Boundary field names in emission order
    pub const FIELD_NAMES: [&'static str; 6] = ["lead1", "lead2", "lead3", "avr", "avl", "avf"];

    /// Values in the same order as [`LeadRecord::FIELD_NAMES`]
    pub fn values(&self) -> [f32; 6] {
        [self.lead1, self.lead2, self.lead3, self.avr, self.avl, self.avf]
    }

    /// Apply a linear unit conversion to every lead
    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            lead1: self.lead1 * factor,
            lead2: self.lead2 * factor,
            lead3: self.lead3 * factor,
            avr: self.avr * factor,
            avl: self.avl * factor,
            avf: self.avf * factor,
        }
    }
}

/// Identifier distinguishing coexisting pipelines in logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        SessionId(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
