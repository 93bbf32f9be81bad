// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The records, events and configuration shared between the analyzer
//! and whatever consumes its output.
//!
//! Field order in the record types is part of the contract with the
//! event consumer: serializers emit fields in declaration order.

pub mod cfg;
pub mod event;
pub mod ip;
pub mod record;

pub use cfg::*;
pub use event::*;
pub use ip::*;
pub use record::*;
