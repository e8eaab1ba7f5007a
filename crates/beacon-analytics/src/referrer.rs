// Copyright (c) 2025 the beacon authors. All rights reserved.
// SPDX-License-Identifier: MIT

//! Referrer and search engine classification.

use url::Url;

/// The sentinel stored when a user arrived without a referrer.
pub const DIRECT_REFERRER: &str = "$direct";

/// A recognized search engine and the query parameter carrying the keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchEngine {
	pub name: &'static str,
	pub keyword_param: &'static str,
}

const ENGINES: &[(&str, SearchEngine)] = &[
	(
		"google.",
		SearchEngine {
			name: "google",
			keyword_param: "q",
		},
	),
	(
		"bing.com",
		SearchEngine {
			name: "bing",
			keyword_param: "q",
		},
	),
	(
		"yahoo.com",
		SearchEngine {
			name: "yahoo",
			keyword_param: "p",
		},
	),
	(
		"duckduckgo.com",
		SearchEngine {
			name: "duckduckgo",
			keyword_param: "q",
		},
	),
];

/// Identifies the search engine a referrer URL points at, if any.
pub fn search_engine(referrer: &str) -> Option<SearchEngine> {
	let url = Url::parse(referrer).ok()?;
	let host = url.host_str()?;

	ENGINES
		.iter()
		.find(|(marker, _)| host.contains(marker))
		.map(|(_, engine)| *engine)
}

/// Extracts the search keyword from a search engine referrer.
pub fn search_keyword(referrer: &str, engine: SearchEngine) -> Option<String> {
	let url = Url::parse(referrer).ok()?;
	url.query_pairs()
		.find(|(name, _)| name == engine.keyword_param)
		.map(|(_, value)| value.into_owned())
		.filter(|keyword| !keyword.is_empty())
}

/// The host part of a referrer URL, e.g. `www.google.com`.
pub fn referring_domain(referrer: &str) -> Option<String> {
	let url = Url::parse(referrer).ok()?;
	url.host_str().map(str::to_string)
}
