// Copyright (c) 2025 the beacon authors. All rights reserved.
// SPDX-License-Identifier: MIT

//! User agent classification.
//!
//! Deliberately a handful of substring checks, not a full UA database.
//! The check order matters: many user agents embed keywords used by later
//! checks (every WebKit browser says "Safari", most browsers say "Mozilla").
//! The resulting names match what the companion browser-side client reports,
//! so server- and client-tracked events bucket identically.

fn contains_ci(haystack: &str, needle: &str) -> bool {
	haystack.to_ascii_lowercase().contains(needle)
}

fn is_blackberry(user_agent: &str) -> bool {
	contains_ci(user_agent, "blackberry")
		|| contains_ci(user_agent, "playbook")
		|| contains_ci(user_agent, "bb10")
}

/// Returns the normalized operating system name, or `""` when unknown.
pub fn operating_system(user_agent: &str) -> &'static str {
	if contains_ci(user_agent, "windows") {
		if user_agent.contains("Phone") {
			"Windows Mobile"
		} else {
			"Windows"
		}
	} else if user_agent.contains("iPhone")
		|| user_agent.contains("iPad")
		|| user_agent.contains("iPod")
	{
		"iOS"
	} else if user_agent.contains("Android") {
		"Android"
	} else if is_blackberry(user_agent) {
		"BlackBerry"
	} else if contains_ci(user_agent, "mac") {
		"Mac OS X"
	} else if user_agent.contains("Linux") {
		"Linux"
	} else {
		""
	}
}

/// Returns the normalized browser name, or `""` when unknown.
///
/// Android is checked before the Apple/Safari pair: without access to the
/// browser's vendor string, every WebKit agent matches "Apple" and
/// "Safari", and Android stock browsers would otherwise be misreported as
/// Mobile Safari.
pub fn browser(user_agent: &str) -> &'static str {
	if user_agent.contains("Opera") {
		if user_agent.contains("Mini") {
			"Opera Mini"
		} else {
			"Opera"
		}
	} else if is_blackberry(user_agent) {
		"BlackBerry"
	} else if user_agent.contains("Chrome") {
		"Chrome"
	} else if user_agent.contains("Android") {
		"Android Mobile"
	} else if user_agent.contains("Apple") && user_agent.contains("Safari") {
		if user_agent.contains("Mobile") {
			"Mobile Safari"
		} else {
			"Safari"
		}
	} else if user_agent.contains("Konqueror") {
		"Konqueror"
	} else if user_agent.contains("Firefox") {
		"Firefox"
	} else if user_agent.contains("MSIE") {
		"Internet Explorer"
	} else if user_agent.contains("Gecko") {
		"Mozilla"
	} else {
		""
	}
}

/// Returns the normalized hardware device name, or `""` when unknown.
pub fn device(user_agent: &str) -> &'static str {
	if contains_ci(user_agent, "windows phone") {
		"Windows Phone"
	} else if user_agent.contains("iPad") {
		"iPad"
	} else if user_agent.contains("iPod") {
		"iPod Touch"
	} else if user_agent.contains("iPhone") {
		"iPhone"
	} else if is_blackberry(user_agent) {
		"BlackBerry"
	} else if user_agent.contains("Android") {
		"Android"
	} else {
		""
	}
}

/// Returns true for crawlers and preview fetchers whose traffic should
/// never be tracked.
pub fn is_blocked(user_agent: &str) -> bool {
	let ua = user_agent.to_ascii_lowercase();
	ua.contains("google web preview") || ua.contains("baiduspider") || ua.contains("yandexbot")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn operating_system_detection() {
		let cases = [
			("Android", "Mozilla/5.0 (Linux; U; Android 4.0.4; en-gb; GT-I9300 Build/IMM76D) AppleWebKit/534.30 Mobile Safari/534.30"),
			("Windows Mobile", "Mozilla/5.0 (compatible; MSIE 9.0; Windows Phone OS 7.5; Trident/5.0; IEMobile/9.0; SAMSUNG; SGH-i917)"),
			("Windows", "Mozilla/5.0 (Windows NT 6.1; WOW64) AppleWebKit/537.17 Chrome/24.0.1312.60 Safari/537.17"),
			("Windows", "Opera/9.80 (Windows NT 6.0) Presto/2.12.388 Version/12.14"),
			("Windows", "Mozilla/6.0 (Windows NT 6.2; WOW64; rv:16.0.1) Gecko/20121011 Firefox/16.0.1"),
			("Linux", "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/535.11 Chrome/17.0.963.66 Safari/535.11"),
			("Linux", "Opera/9.52 (X11; Linux x86_64; U; ru)"),
			("Linux", "Mozilla/5.0 (X11; Ubuntu; Linux i686; rv:15.0) Gecko/20100101 Firefox/15.0.1"),
			("iOS", "Mozilla/5.0 (iPhone; U; CPU iPhone OS 3_0 like Mac OS X; en-us) AppleWebKit/528.18 Mobile/7A341 Safari/528.16"),
			("iOS", "Mozilla/5.0 (iPad; U; CPU iPhone OS 3_2 like Mac OS X; en-us) AppleWebKit/531.21.10 Mobile/7B314 Safari/531.21.10"),
			("iOS", "Mozilla/5.0 (iPod; U; CPU iPhone OS 4_3_3 like Mac OS X; ja-jp) AppleWebKit/533.17.9 Mobile/8J2 Safari/6533.18.5"),
			("BlackBerry", "Mozilla/5.0 (BlackBerry; U; BlackBerry 9900; en) AppleWebKit/534.11+ Mobile Safari/534.11+"),
			("BlackBerry", "Mozilla/5.0 (PlayBook; U; RIM Tablet OS 2.0.1; en-US) AppleWebKit/535.8+ Safari/535.8+"),
			("BlackBerry", "Mozilla/5.0 (BB10; Device) AppleWebKit/535.8+ Mobile Safari/534.11+"),
			("Mac OS X", "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_6_8) AppleWebKit/537.13+ Safari/534.57.2"),
			("Mac OS X", "Opera/9.52 (Macintosh; PPC Mac OS X; U; fr)"),
			("Mac OS X", "Mozilla/6.0 (Macintosh; I; Intel Mac OS X 11_7_9; de-LI; rv:1.9b4) Gecko/2012010317 Firefox/10.0a4"),
			("", "Unknown"),
		];

		for (expected, ua) in cases {
			assert_eq!(operating_system(ua), expected, "ua: {ua}");
		}
	}

	#[test]
	fn browser_detection() {
		let cases = [
			("Opera Mini", "Opera/9.80 (J2ME/MIDP; Opera Mini/9.80 (J2ME/22.478; U; en) Presto/2.5.25 Version/10.54"),
			("Konqueror", "Mozilla/5.0 (X11; Linux 3.5.4-1-ARCH i686; es) KHTML/4.9.1 (like Gecko) Konqueror/4.9"),
			("Mozilla", "Mozilla/5.0 (Windows; U; Win 9x 4.90; SG; rv:1.9.2.4) Gecko/20101104 Netscape/9.1.0285"),
			("Android Mobile", "Mozilla/5.0 (Linux; U; Android 4.0; xx-xx; GT-I9300 Build/IMM76D) AppleWebKit/534.30 Version/4.0 Mobile Safari/534.30"),
			("Internet Explorer", "Mozilla/5.0 (compatible; MSIE 9.0; Windows Phone OS 7.5; Trident/5.0; IEMobile/9.0; SAMSUNG; SGH-i917)"),
			("Chrome", "Mozilla/5.0 (Windows NT 6.1; WOW64) AppleWebKit/537.17 Chrome/24.0.1312.60 Safari/537.17"),
			("Opera", "Opera/9.80 (Windows NT 6.0) Presto/2.12.388 Version/12.14"),
			("Firefox", "Mozilla/6.0 (Windows NT 6.2; WOW64; rv:16.0.1) Gecko/20121011 Firefox/16.0.1"),
			("Chrome", "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/535.11 Chrome/17.0.963.66 Safari/535.11"),
			("Opera", "Opera/9.52 (X11; Linux x86_64; U; ru)"),
			("Firefox", "Mozilla/5.0 (X11; Ubuntu; Linux i686; rv:15.0) Gecko/20100101 Firefox/15.0.1"),
			("Mobile Safari", "Mozilla/5.0 (iPhone; U; CPU iPhone OS 3_0 like Mac OS X; en-us) AppleWebKit/528.18 Mobile/7A341 Safari/528.16"),
			("Mobile Safari", "Mozilla/5.0 (iPad; U; CPU iPhone OS 3_2 like Mac OS X; en-us) AppleWebKit/531.21.10 Mobile/7B314 Safari/531.21.10"),
			("Mobile Safari", "Mozilla/5.0 (iPod; U; CPU iPhone OS 4_3_3 like Mac OS X; ja-jp) AppleWebKit/533.17.9 Mobile/8J2 Safari/6533.18.5"),
			("BlackBerry", "Mozilla/5.0 (BlackBerry; U; BlackBerry 9900; en) AppleWebKit/534.11+ Mobile Safari/534.11+"),
			("BlackBerry", "Mozilla/5.0 (PlayBook; U; RIM Tablet OS 2.0.1; en-US) AppleWebKit/535.8+ Safari/535.8+"),
			("BlackBerry", "Mozilla/5.0 (BB10; Device) AppleWebKit/535.8+ Mobile Safari/534.11+"),
			("Safari", "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_6_8) AppleWebKit/537.13+ Safari/534.57.2"),
			("Opera", "Opera/9.52 (Macintosh; PPC Mac OS X; U; fr)"),
			("Firefox", "Mozilla/6.0 (Macintosh; I; Intel Mac OS X 11_7_9; de-LI; rv:1.9b4) Gecko/2012010317 Firefox/10.0a4"),
			("Internet Explorer", "Mozilla/5.0 (compatible; MSIE 10.0; Windows NT 6.2; Trident/6.0)"),
			("Internet Explorer", "Mozilla/4.0 (compatible; MSIE 7.0; Windows NT 6.0)"),
			("", "Unknown"),
		];

		for (expected, ua) in cases {
			assert_eq!(browser(ua), expected, "ua: {ua}");
		}
	}

	#[test]
	fn device_detection() {
		let cases = [
			("Windows Phone", "Mozilla/5.0 (compatible; MSIE 9.0; Windows Phone OS 7.5; IEMobile/9.0)"),
			("iPad", "Mozilla/5.0 (iPad; U; CPU iPhone OS 3_2 like Mac OS X; en-us) AppleWebKit/531.21.10"),
			("iPod Touch", "Mozilla/5.0 (iPod; U; CPU iPhone OS 4_3_3 like Mac OS X; ja-jp) AppleWebKit/533.17.9"),
			("iPhone", "Mozilla/5.0 (iPhone; U; CPU iPhone OS 3_0 like Mac OS X; en-us) AppleWebKit/528.18"),
			("BlackBerry", "Mozilla/5.0 (PlayBook; U; RIM Tablet OS 2.0.1; en-US) AppleWebKit/535.8+"),
			("Android", "Mozilla/5.0 (Linux; U; Android 4.0.4; en-gb; GT-I9300 Build/IMM76D) AppleWebKit/534.30"),
			("", "Mozilla/5.0 (Windows NT 6.1; WOW64) AppleWebKit/537.17 Chrome/24.0.1312.60"),
		];

		for (expected, ua) in cases {
			assert_eq!(device(ua), expected, "ua: {ua}");
		}
	}

	#[test]
	fn known_bots_are_blocked() {
		assert!(is_blocked("Mozilla/5.0 (en-us) AppleWebKit/525.13 (KHTML, like Gecko; Google Web Preview) Version/3.1 Safari/525.13"));
		assert!(is_blocked("Mozilla/5.0 (compatible; Baiduspider/2.0; +http://www.baidu.com/search/spider.html)"));
		assert!(is_blocked("Mozilla/5.0 (compatible; YandexBot/3.0; +http://yandex.com/bots)"));
		assert!(!is_blocked("Mozilla/5.0 (Windows NT 6.1) AppleWebKit/537.17 Chrome/24.0 Safari/537.17"));
		assert!(!is_blocked(""));
	}
}
