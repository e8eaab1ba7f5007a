// Copyright (c) 2025 the beacon authors. All rights reserved.
// SPDX-License-Identifier: MIT

//! Anonymous distinct ID generation.
//!
//! The generated identifier is five dash-joined hex segments: tick entropy,
//! a random integer, a user-agent fold, a CRC-32 of the client IP, and a
//! second tick entropy sample. It is practically unique per browser/agent
//! but deliberately not a standards-compliant UUID and not cryptographically
//! strong. The exact bit layout is kept compatible with identifiers issued
//! by the companion browser-side client, so previously stored IDs stay
//! valid.

use std::time::{SystemTime, UNIX_EPOCH};

/// Produces anonymous identifiers from request-derived entropy.
pub trait IdGenerator {
	/// Generates a quasi-unique identifier for the given agent and IP.
	///
	/// Never fails; empty inputs simply contribute less entropy.
	fn generate(&self, user_agent: &str, client_ip: &str) -> String;
}

/// The default entropy-mixing generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntropyIdGenerator;

impl EntropyIdGenerator {
	pub fn new() -> Self {
		Self
	}
}

impl IdGenerator for EntropyIdGenerator {
	fn generate(&self, user_agent: &str, client_ip: &str) -> String {
		[
			ticks_entropy(),
			random_entropy(),
			agent_entropy(user_agent),
			ip_entropy(client_ip),
			ticks_entropy(),
		]
		.join("-")
	}
}

fn now_millis() -> u128 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_millis())
		.unwrap_or_default()
}

/// Samples the millisecond clock, then counts iterations until it changes.
/// Both the timestamp and the iteration count feed the segment, so two
/// samples taken microseconds apart already differ.
fn ticks_entropy() -> String {
	let start = now_millis();
	let mut spins: u64 = 0;

	while now_millis() == start {
		spins = spins.wrapping_add(1);
	}

	format!("{start:x}{spins:x}")
}

fn random_entropy() -> String {
	format!("{:x}", rand::random::<u32>())
}

/// XOR-folds the user agent into 32 bits.
///
/// Bytes are pushed onto the front of a 4-byte window; each full window is
/// packed little-endian and folded into the accumulator, with a final
/// partial window flushed at the end. The back-to-front ordering is odd but
/// must match the layout of previously issued identifiers.
fn agent_entropy(user_agent: &str) -> String {
	let mut acc: u32 = 0;
	let mut window: Vec<u8> = Vec::with_capacity(4);

	for byte in user_agent.bytes() {
		window.insert(0, byte);
		if window.len() >= 4 {
			acc ^= pack_window(&window);
			window.clear();
		}
	}

	if !window.is_empty() {
		acc ^= pack_window(&window);
	}

	format!("{acc:x}")
}

fn pack_window(window: &[u8]) -> u32 {
	let mut packed: u32 = 0;
	for (i, byte) in window.iter().enumerate() {
		packed |= u32::from(*byte) << (i * 8);
	}
	packed
}

/// CRC-32 of the IP with separators stripped, so `10.0.0.1` and `100.0.01`
/// style variations of the same digits collapse to one checksum input.
fn ip_entropy(client_ip: &str) -> String {
	let stripped: String = client_ip.chars().filter(|c| *c != '.' && *c != ':').collect();
	format!("{:x}", crc32fast::hash(stripped.as_bytes()))
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashSet;

	const UA: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36";
	const IP: &str = "192.168.1.77";

	#[test]
	fn hundred_generations_are_pairwise_distinct() {
		let generator = EntropyIdGenerator::new();
		let mut seen = HashSet::new();

		for _ in 0..100 {
			let id = generator.generate(UA, IP);
			assert!(seen.insert(id), "generator produced a duplicate identifier");
		}
	}

	#[test]
	fn identifier_has_five_hex_segments() {
		let id = EntropyIdGenerator::new().generate(UA, IP);
		let segments: Vec<&str> = id.split('-').collect();

		assert_eq!(segments.len(), 5);
		for segment in segments {
			assert!(!segment.is_empty());
			assert!(segment.chars().all(|c| c.is_ascii_hexdigit()));
		}
	}

	#[test]
	fn empty_inputs_still_produce_an_identifier() {
		let id = EntropyIdGenerator::new().generate("", "");
		assert_eq!(id.split('-').count(), 5);
	}

	#[test]
	fn agent_entropy_known_vector() {
		// "abcd" fills exactly one window: [d, c, b, a] packed little-endian
		// is 0x61626364.
		assert_eq!(agent_entropy("abcd"), "61626364");
	}

	#[test]
	fn agent_entropy_empty_is_zero() {
		assert_eq!(agent_entropy(""), "0");
	}

	#[test]
	fn agent_entropy_flushes_partial_window() {
		// A single byte packs into the low 8 bits.
		assert_eq!(agent_entropy("a"), "61");
		assert_ne!(agent_entropy("abcd"), agent_entropy("abcde"));
	}

	#[test]
	fn ip_entropy_ignores_separator_placement() {
		assert_eq!(ip_entropy("127.0.0.1"), ip_entropy("12.70.01"));
		assert_eq!(ip_entropy("fe80::1"), ip_entropy("fe801"));
	}

	#[test]
	fn ip_entropy_differs_for_different_addresses() {
		assert_ne!(ip_entropy("10.0.0.1"), ip_entropy("10.0.0.2"));
	}

	#[test]
	fn ticks_entropy_is_hex() {
		let ticks = ticks_entropy();
		assert!(!ticks.is_empty());
		assert!(ticks.chars().all(|c| c.is_ascii_hexdigit()));
	}
}
