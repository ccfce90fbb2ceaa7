// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Guest-subnet membership check for the bootstrap/report listener
//! (spec section 4.4: "drop if remote IP is not within the configured
//! agent subnet"). IPv4-only, matching `guest_listen_addr`'s own
//! IPv4-only address space; an IPv6 peer is never in the agent subnet.

use std::net::{IpAddr, Ipv4Addr};

/// Whether `addr` falls within `cidr` (e.g. `"10.77.0.0/16"`).
/// A malformed `cidr` never matches anything.
pub fn contains(cidr: &str, addr: IpAddr) -> bool {
    let IpAddr::V4(addr) = addr else { return false };
    let Some((network, prefix)) = cidr.split_once('/') else { return false };
    let Ok(network) = network.parse::<Ipv4Addr>() else { return false };
    let Ok(prefix) = prefix.parse::<u32>() else { return false };
    if prefix > 32 {
        return false;
    }
    let mask = if prefix == 0 { 0u32 } else { u32::MAX << (32 - prefix) };
    u32::from(network) & mask == u32::from(addr) & mask
}
