// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The flow table implementation.
//!
//! This holds the per-flow state of everything tracked by a
//! connection's identity, aging entries out on the capture clock.

use super::time::MILLIS;
use super::time::Moment;
use crate::api::ConnId;
use crate::api::cfg::ICMP_INACTIVITY_TIMEOUT_SECS;
use core::fmt;
use core::num::NonZeroU32;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use thiserror::Error;

pub const FLOW_DEF_TTL: Ttl = Ttl::new_seconds(ICMP_INACTIVITY_TIMEOUT_SECS);

#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum FlowTableError {
    #[error("flow table at max capacity: {0}")]
    MaxCapacity(u64),
}

type Result<T> = core::result::Result<T, FlowTableError>;

/// The Time To Live in milliseconds.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Ttl(u64);

impl Ttl {
    pub fn as_seconds(&self) -> u64 {
        self.0 / MILLIS
    }

    pub fn as_milliseconds(&self) -> u64 {
        self.0
    }

    /// Is `last_hit` expired?
    pub fn is_expired(&self, last_hit: Moment, now: Moment) -> bool {
        now.delta_as_millis(last_hit) >= self.0
    }

    /// Create a new TTL based on seconds.
    pub const fn new_seconds(seconds: u64) -> Self {
        Ttl(seconds * MILLIS)
    }
}

pub type FlowTableDump<T> = Vec<(ConnId, T)>;

#[derive(Debug)]
pub struct FlowTable<S: Dump> {
    limit: NonZeroU32,
    ttl: Ttl,
    map: BTreeMap<ConnId, FlowEntry<S>>,
}

impl<S> FlowTable<S>
where
    S: fmt::Debug + Dump,
{
    /// Add a new entry to the flow table, first seen at `now`.
    ///
    /// # Errors
    ///
    /// If the table is at max capacity, an error is returned and no
    /// modification is made to the table.
    ///
    /// If an entry already exists for this flow, it is overwritten.
    pub fn add(
        &mut self,
        flow_id: ConnId,
        state: S,
        now: Moment,
    ) -> Result<&mut FlowEntry<S>> {
        if self.map.len() >= self.limit.get() as usize
            && !self.map.contains_key(&flow_id)
        {
            return Err(FlowTableError::MaxCapacity(u64::from(
                self.limit.get(),
            )));
        }

        let entry = FlowEntry::new(state, now);
        match self.map.entry(flow_id) {
            Entry::Occupied(mut e) => {
                e.insert(entry);
                Ok(e.into_mut())
            }
            Entry::Vacant(e) => Ok(e.insert(entry)),
        }
    }

    // Clear all entries from the flow table.
    pub fn clear(&mut self) {
        self.map.clear()
    }

    pub fn dump(&self) -> FlowTableDump<S::DumpVal> {
        let mut flows = Vec::with_capacity(self.map.len());
        for (flow_id, entry) in &self.map {
            flows.push((*flow_id, entry.dump()));
        }
        flows
    }

    /// Remove every entry that hasn't been hit within the TTL as of
    /// `now`, returning the removed flows.
    pub fn expire_flows(&mut self, now: Moment) -> Vec<(ConnId, S)> {
        let ttl = self.ttl;
        let expired: Vec<ConnId> = self
            .map
            .iter()
            .filter(|(_, entry)| entry.is_expired(now, ttl))
            .map(|(flow_id, _)| *flow_id)
            .collect();

        expired
            .into_iter()
            .filter_map(|flow_id| {
                self.map.remove(&flow_id).map(|e| (flow_id, e.state))
            })
            .collect()
    }

    /// Remove every entry, returning the flows in identity order.
    pub fn drain(&mut self) -> Vec<(ConnId, S)> {
        core::mem::take(&mut self.map)
            .into_iter()
            .map(|(flow_id, entry)| (flow_id, entry.state))
            .collect()
    }

    /// Get the maximum number of entries this flow table may hold.
    pub fn get_limit(&self) -> NonZeroU32 {
        self.limit
    }

    /// Get a reference to the flow entry for a given flow, if one
    /// exists.
    pub fn get(&self, flow_id: &ConnId) -> Option<&FlowEntry<S>> {
        self.map.get(flow_id)
    }

    /// Get a mutable reference to the flow entry for a given flow, if
    /// one exists.
    pub fn get_mut(&mut self, flow_id: &ConnId) -> Option<&mut FlowEntry<S>> {
        self.map.get_mut(flow_id)
    }

    pub fn new(limit: NonZeroU32, ttl: Option<Ttl>) -> FlowTable<S> {
        let ttl = ttl.unwrap_or(FLOW_DEF_TTL);

        Self { limit, ttl, map: BTreeMap::new() }
    }

    /// Get the number of flows in this table.
    pub fn num_flows(&self) -> u32 {
        self.map.len() as u32
    }

    pub fn remove(&mut self, flow: &ConnId) -> Option<FlowEntry<S>> {
        self.map.remove(flow)
    }

    pub fn ttl(&self) -> Ttl {
        self.ttl
    }
}

/// A type that can be "dumped" for the purposes of presenting an
/// external view into internal state of the [`FlowEntry<T>`].
pub trait Dump {
    type DumpVal: DeserializeOwned + Serialize;

    fn dump(&self, hits: u64) -> Self::DumpVal;
}

/// The FlowEntry holds any arbitrary state type `S`.
#[derive(Clone, Debug)]
pub struct FlowEntry<S: Dump> {
    state: S,

    /// Number of times this flow has been matched.
    hits: u64,

    /// This tracks the last time the flow was matched.
    last_hit: Moment,
}

impl<S: Dump> FlowEntry<S> {
    fn dump(&self) -> S::DumpVal {
        self.state.dump(self.hits)
    }

    pub fn state_mut(&mut self) -> &mut S {
        &mut self.state
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn hit(&mut self, now: Moment) {
        self.hits += 1;
        self.last_hit = self.last_hit.max(now);
    }

    pub fn last_hit(&self) -> Moment {
        self.last_hit
    }

    fn is_expired(&self, now: Moment, ttl: Ttl) -> bool {
        ttl.is_expired(self.last_hit, now)
    }

    fn new(state: S, now: Moment) -> Self {
        FlowEntry { state, hits: 0, last_hit: now }
    }
}

impl Dump for () {
    type DumpVal = ();

    fn dump(&self, _hits: u64) {}
}
