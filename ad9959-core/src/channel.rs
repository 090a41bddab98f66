use thiserror::Error;

/// An error produced while normalizing a channel selection.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ChannelError {
    /// The channel index is outside `[0, 3]`.
    #[error("Channel index ({0}) must be 0, 1, 2 or 3")]
    InvalidChannel(u8),
    /// The selection contains no channel at all.
    #[error("At least one channel must be selected")]
    EmptySelection,
}

/// One of the four DDS output channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Channel {
    Ch0 = 0,
    Ch1 = 1,
    Ch2 = 2,
    Ch3 = 3,
}

impl Channel {
    /// All channels, in index order.
    pub const ALL: [Channel; 4] = [Channel::Ch0, Channel::Ch1, Channel::Ch2, Channel::Ch3];

    /// The zero-based index of the channel.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl TryFrom<u8> for Channel {
    type Error = ChannelError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Channel::Ch0),
            1 => Ok(Channel::Ch1),
            2 => Ok(Channel::Ch2),
            3 => Ok(Channel::Ch3),
            _ => Err(ChannelError::InvalidChannel(value)),
        }
    }
}

/// A validated, deduplicated set of channels, stored as the 4-bit enable
/// nibble of the CSR register.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelMask(u8);

impl ChannelMask {
    /// Every channel enabled.
    pub const ALL: ChannelMask = ChannelMask(0x0F);

    /// The low nibble written alongside the enable bits; keeps the serial
    /// interface in 3-wire mode.
    const SERIAL_3WIRE: u8 = 0b0010;

    /// Builds a mask from one or more channels. Duplicates collapse.
    pub fn new(channels: impl IntoIterator<Item = Channel>) -> Result<Self, ChannelError> {
        let bits = channels
            .into_iter()
            .fold(0u8, |bits, ch| bits | (1 << ch.index()));
        if bits == 0 {
            return Err(ChannelError::EmptySelection);
        }
        Ok(Self(bits))
    }

    /// Builds a mask from raw channel indices, validating each.
    pub fn from_indices(indices: impl IntoIterator<Item = u8>) -> Result<Self, ChannelError> {
        Self::new(
            indices
                .into_iter()
                .map(Channel::try_from)
                .collect::<Result<Vec<_>, _>>()?,
        )
    }

    /// Decodes the enable nibble of a live CSR byte. May be empty.
    #[must_use]
    pub const fn from_csr(byte: u8) -> Self {
        Self(byte >> 4)
    }

    /// The raw 4-bit enable mask.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// The full CSR byte selecting these channels.
    #[must_use]
    pub const fn csr_byte(self) -> u8 {
        self.0 << 4 | Self::SERIAL_3WIRE
    }

    #[must_use]
    pub const fn contains(self, channel: Channel) -> bool {
        self.0 & (1 << channel.index()) != 0
    }

    /// The selected channels, in index order.
    pub fn iter(self) -> impl Iterator<Item = Channel> {
        Channel::ALL.into_iter().filter(move |ch| self.contains(*ch))
    }
}

impl From<Channel> for ChannelMask {
    fn from(ch: Channel) -> Self {
        Self(1 << ch.index())
    }
}

impl core::fmt::Debug for ChannelMask {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
