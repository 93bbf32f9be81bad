// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! An ICMP and ICMPv6 protocol analyzer.
//!
//! The analyzer consumes the ICMP messages of one tracked flow at a
//! time and turns them into structured events: echo exchanges, error
//! messages together with the datagram they quote, router discovery,
//! and a catch-all for everything else. See [`engine::IcmpAnalyzer`].

#![allow(clippy::len_without_is_empty)]
#![deny(unreachable_patterns)]
#![deny(unused_must_use)]

pub mod api;
pub mod engine;
#[cfg(feature = "std")]
pub mod print;
pub mod provider;
