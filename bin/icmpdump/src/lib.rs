// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Run the ICMP analyzer over a packet capture.

pub mod capture;
pub mod config;
pub mod dumper;
pub mod log;

pub use capture::LinkType;
pub use capture::Record;
pub use capture::read_capture;
pub use config::Config;
pub use dumper::Dumper;
pub use dumper::Report;
