// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

use crate::api::EndpointStatus;
use crate::api::EndpointSummary;

/// What has been seen from one side of a flow.
///
/// Until a message is recorded the side is inactive; a recorded
/// length of zero is still activity.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct EndpointState {
    size: Option<u32>,
}

impl EndpointState {
    /// Record the length of the latest message from this side.
    pub fn record(&mut self, len: u32) {
        self.size = Some(len);
    }

    pub fn summary(&self) -> EndpointSummary {
        match self.size {
            Some(size) => {
                EndpointSummary { size, state: EndpointStatus::Active }
            }
            None => EndpointSummary::default(),
        }
    }
}
