//! Browser-plausible User-Agent strings for site traffic.
//!
//! The site rejects obvious tool identifiers, so every transport picks one
//! Chrome-style User-Agent when it is constructed and keeps it for all of its
//! requests. The value is cosmetic; nothing downstream depends on it.

use std::ops::RangeInclusive;

use rand::Rng;
use rand::seq::SliceRandom;

/// Chrome major versions a generated User-Agent may claim.
const CHROME_MAJOR_VERSIONS: RangeInclusive<u32> = 80..=86;

/// Chrome build numbers a generated User-Agent may claim.
const CHROME_BUILDS: RangeInclusive<u32> = 4100..=4200;

const PLATFORMS: &[&str] = &[
    "Windows NT 10.0; Win64; x64",
    "Windows NT 6.1; Win64; x64",
    "Macintosh; Intel Mac OS X 10_15_7",
    "Macintosh; Intel Mac OS X 10_14_6",
    "X11; Linux x86_64",
];

const WEBKIT_VERSION: &str = "537.36";

/// Generates a random Chrome desktop User-Agent.
///
/// Format:
/// `Mozilla/5.0 ({platform}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{major}.0.{build}.{patch} Safari/537.36`
#[must_use]
pub fn random_chrome_user_agent() -> String {
    let mut rng = rand::thread_rng();
    let platform = PLATFORMS.choose(&mut rng).copied().unwrap_or(PLATFORMS[0]);
    let major = rng.gen_range(CHROME_MAJOR_VERSIONS);
    let build = rng.gen_range(CHROME_BUILDS);
    let patch = rng.gen_range(0..=200);
    format!(
        "Mozilla/5.0 ({platform}) AppleWebKit/{WEBKIT_VERSION} (KHTML, like Gecko) \
         Chrome/{major}.0.{build}.{patch} Safari/{WEBKIT_VERSION}"
    )
}
