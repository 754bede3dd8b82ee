use std::fmt;
use std::fmt::{Display, Formatter};

use itertools::iproduct;
use serde::{Deserialize, Serialize};

use crate::data::spectrum::FragmentType;
use crate::error::ProfileError;

/// One (charge, ion type) combination, a single slice of the channel axis.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Channel {
    pub charge: i32,
    pub kind: FragmentType,
}

impl Channel {
    pub fn new(charge: i32, kind: FragmentType) -> Self {
        Channel { charge, kind }
    }

    /// Ion type letter followed by one `+` per charge.
    ///
    /// # Example
    ///
    /// ```
    /// use msprofile::data::channel::Channel;
    /// use msprofile::data::spectrum::FragmentType;
    ///
    /// assert_eq!(Channel::new(2, FragmentType::Y).label(), "y++");
    /// ```
    pub fn label(&self) -> String {
        format!("{}{}", self.kind, "+".repeat(self.charge.max(0) as usize))
    }
}

impl Display for Channel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Charge-major ordering of channels shared by every builder of a request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelLayout {
    charges: Vec<i32>,
    ion_types: Vec<FragmentType>,
    channels: Vec<Channel>,
}

impl ChannelLayout {
    /// Enumerates channels, for each charge every ion type in the given order.
    ///
    /// # Example
    ///
    /// ```
    /// use msprofile::data::channel::ChannelLayout;
    /// use msprofile::data::spectrum::FragmentType;
    ///
    /// let layout = ChannelLayout::new(&[1, 2], &[FragmentType::Y, FragmentType::B]).unwrap();
    /// assert_eq!(layout.labels(), vec!["y+", "b+", "y++", "b++"]);
    /// ```
    pub fn new(charges: &[i32], ion_types: &[FragmentType]) -> Result<Self, ProfileError> {
        if charges.is_empty() {
            return Err(ProfileError::Configuration("no charges to consider".to_string()));
        }
        if ion_types.is_empty() {
            return Err(ProfileError::Configuration("no ion types to consider".to_string()));
        }
        if let Some(charge) = charges.iter().find(|&&c| c <= 0) {
            return Err(ProfileError::Configuration(format!("charges must be positive, got {}", charge)));
        }

        let channels = iproduct!(charges.iter(), ion_types.iter())
            .map(|(&charge, &kind)| Channel::new(charge, kind))
            .collect();

        Ok(ChannelLayout {
            charges: charges.to_vec(),
            ion_types: ion_types.to_vec(),
            channels,
        })
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn charges(&self) -> &[i32] {
        &self.charges
    }

    pub fn ion_types(&self) -> &[FragmentType] {
        &self.ion_types
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn labels(&self) -> Vec<String> {
        self.channels.iter().map(Channel::label).collect()
    }

    /// Position of a channel on the channel axis.
    pub fn index_of(&self, channel: &Channel) -> Option<usize> {
        self.channels.iter().position(|c| c == channel)
    }
}
