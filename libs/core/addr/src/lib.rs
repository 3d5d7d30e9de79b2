//! [libs/core/addr/src/lib.rs]
//!
//! Pure IPv4 address and prefix arithmetic.
//!
//! Every textual address the rest of the workspace sees — a dotted host, a
//! truncated dotted prefix, or an explicit CIDR block — funnels through
//! [`parse_range`] into an inclusive `[ipstart, ipend]` pair of 32-bit
//! integers. Nothing here touches a socket, a clock, or a store: this crate
//! is deterministic math only, so it can be fuzzed and proptested in
//! isolation from the pipeline that consumes it.

use thiserror::Error;

/// An inclusive IPv4 address range, `ipstart <= ipend`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Range {
    pub ipstart: u32,
    pub ipend: u32,
}

impl Range {
    /// A singleton host range.
    pub fn host(ip: u32) -> Self {
        Self { ipstart: ip, ipend: ip }
    }

    /// The inclusive span, i.e. `ipend - ipstart`.
    pub fn span(&self) -> u64 {
        u64::from(self.ipend) - u64::from(self.ipstart)
    }

    /// Classifies this range into the closest of the four supported subnet
    /// levels, per the boundary rules in the node hierarchy: any range
    /// spanning more than a /24 but less than a full /16 is still rooted at
    /// a /24 parent, matching how the materialiser walks levels.
    pub fn classify(&self) -> Subnet {
        let diff = self.span();
        if diff >= 16_777_215 {
            Subnet::Eight
        } else if diff >= 65_535 {
            Subnet::Sixteen
        } else if diff > 0 {
            // covers both "> 255" and "> 0" from the source rule: both land
            // on a /24 parent, there is no level between /24 and /32 that a
            // partial range could occupy.
            Subnet::TwentyFour
        } else {
            Subnet::ThirtyTwo
        }
    }
}

/// The four prefix granularities the node hierarchy materialises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Subnet {
    Eight,
    Sixteen,
    TwentyFour,
    ThirtyTwo,
}

impl Subnet {
    /// All four levels, root to leaf — the order the Node Materialiser must
    /// walk in so that a child's parent always already exists.
    pub const ASCENDING: [Subnet; 4] =
        [Subnet::Eight, Subnet::Sixteen, Subnet::TwentyFour, Subnet::ThirtyTwo];

    /// The CIDR mask length this level denotes.
    pub fn mask_len(self) -> u32 {
        match self {
            Subnet::Eight => 8,
            Subnet::Sixteen => 16,
            Subnet::TwentyFour => 24,
            Subnet::ThirtyTwo => 32,
        }
    }

    /// The canonical integer tag stored in `Nodes.subnet`.
    pub fn as_db_value(self) -> u8 {
        self.mask_len() as u8
    }

    /// The range this level's mask produces when applied to `ip`.
    pub fn range_of(self, ip: u32) -> Range {
        let ipstart = mask_to(ip, self.mask_len());
        Range { ipstart, ipend: ipstart | !prefix_mask(self.mask_len()) }
    }

    /// This level's parent level, if any (the root /8 has none).
    pub fn parent(self) -> Option<Subnet> {
        match self {
            Subnet::Eight => None,
            Subnet::Sixteen => Some(Subnet::Eight),
            Subnet::TwentyFour => Some(Subnet::Sixteen),
            Subnet::ThirtyTwo => Some(Subnet::TwentyFour),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddrError {
    #[error("malformed address: {0:?}")]
    MalformedAddress(String),
}

/// Parses a dotted host, a truncated dotted prefix, or an explicit CIDR
/// block into an inclusive range.
///
/// - `"192.168.2.100"` — a four-octet host, `[n, n]`.
/// - `"192.168"` — a truncated, two-octet prefix. The missing octets are
///   implied zero and the mask length is `octets * 8`, so this parses as
///   `192.168.0.0/16`, never as a host with an implied leading zero octet.
///   This resolves the ambiguity the source tool left implicit.
/// - `"10.0.0.0/8"` — an explicit CIDR block; the mask wins over the octet
///   count.
pub fn parse_range(input: &str) -> Result<Range, AddrError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(AddrError::MalformedAddress(input.to_string()));
    }

    if let Some((base, mask_str)) = input.split_once('/') {
        let ip = parse_octets(base, input)?.0;
        let mask_len: u32 = mask_str
            .parse()
            .ok()
            .filter(|n| *n <= 32)
            .ok_or_else(|| AddrError::MalformedAddress(input.to_string()))?;
        let ipstart = mask_to(ip, mask_len);
        let ipend = ipstart | !prefix_mask(mask_len);
        Ok(Range { ipstart, ipend })
    } else {
        let (ip, octet_count) = parse_octets(input, input)?;
        let mask_len = (octet_count as u32) * 8;
        let ipstart = mask_to(ip, mask_len);
        let ipend = ipstart | !prefix_mask(mask_len);
        Ok(Range { ipstart, ipend })
    }
}

/// Renders a 32-bit address back to dotted-decimal, the inverse of the host
/// form accepted by [`parse_range`]. Used by property tests and by the
/// metadata editor's diagnostics.
pub fn dotted(ip: u32) -> String {
    format!(
        "{}.{}.{}.{}",
        (ip >> 24) & 0xFF,
        (ip >> 16) & 0xFF,
        (ip >> 8) & 0xFF,
        ip & 0xFF
    )
}

/// Parses 1-4 dot-separated octets, left-aligning them into a 32-bit value
/// with missing trailing octets implied zero. Returns the value and the
/// number of octets actually present.
fn parse_octets(base: &str, original_for_error: &str) -> Result<(u32, usize), AddrError> {
    let parts: Vec<&str> = base.split('.').collect();
    if parts.is_empty() || parts.len() > 4 {
        return Err(AddrError::MalformedAddress(original_for_error.to_string()));
    }

    let mut ip: u32 = 0;
    for (i, part) in parts.iter().enumerate() {
        let octet: u8 = part
            .parse()
            .map_err(|_| AddrError::MalformedAddress(original_for_error.to_string()))?;
        ip |= (octet as u32) << (24 - 8 * i as u32);
    }
    Ok((ip, parts.len()))
}

fn prefix_mask(len: u32) -> u32 {
    if len == 0 {
        0
    } else if len >= 32 {
        u32::MAX
    } else {
        u32::MAX << (32 - len)
    }
}

fn mask_to(ip: u32, len: u32) -> u32 {
    ip & prefix_mask(len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn host_form_is_a_singleton() {
        let r = parse_range("192.168.2.100").unwrap();
        assert_eq!(r.ipstart, r.ipend);
        assert_eq!(r.classify(), Subnet::ThirtyTwo);
    }

    #[test]
    fn truncated_prefix_implies_mask_from_octet_count() {
        let r = parse_range("21.66").unwrap();
        let expected = parse_range("21.66.0.0/16").unwrap();
        assert_eq!(r, expected);
    }

    #[test]
    fn explicit_cidr_overrides_octet_count() {
        let r = parse_range("10.0.0.0/8").unwrap();
        assert_eq!(r.ipstart, 10u32 << 24);
        assert_eq!(r.ipend, r.ipstart + 16_777_215);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_range("not-an-ip").is_err());
        assert!(parse_range("1.2.3.4.5").is_err());
        assert!(parse_range("1.2.3.256").is_err());
        assert!(parse_range("").is_err());
    }

    #[test]
    fn classify_boundary_cases() {
        assert_eq!(Range { ipstart: 0, ipend: 16_777_215 }.classify(), Subnet::Eight);
        assert_eq!(Range { ipstart: 0, ipend: 65_535 }.classify(), Subnet::Sixteen);
        assert_eq!(Range { ipstart: 0, ipend: 255 }.classify(), Subnet::TwentyFour);
        assert_eq!(Range { ipstart: 0, ipend: 1 }.classify(), Subnet::TwentyFour);
        assert_eq!(Range { ipstart: 5, ipend: 5 }.classify(), Subnet::ThirtyTwo);
    }

    proptest! {
        // P1 Address round-trip.
        #[test]
        fn p1_address_round_trip(n: u32) {
            let r = parse_range(&dotted(n)).unwrap();
            prop_assert_eq!(r, Range::host(n));
        }

        // P2 Prefix parse.
        #[test]
        fn p2_prefix_parse(a: u32, level_idx in 0usize..4) {
            let level = Subnet::ASCENDING[level_idx];
            let len = level.mask_len();
            let aligned = mask_to(a, len);
            let parsed = parse_range(&format!("{}/{}", dotted(aligned), len)).unwrap();
            let expected_end = if len == 0 {
                u32::MAX
            } else {
                aligned + (1u64 << (32 - len)) as u32 - 1
            };
            prop_assert_eq!(parsed.ipstart, aligned);
            prop_assert_eq!(parsed.ipend, expected_end);
        }
    }
}
