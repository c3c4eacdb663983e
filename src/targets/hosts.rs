use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use crate::errors::EngineError;

/// Largest block a single CIDR element may expand to.
pub const MAX_BLOCK_HOSTS: u128 = 1 << 16;

#[derive(Debug, Clone, PartialEq, Eq)]
enum TargetSpec {
    /// IP literal or hostname, kept verbatim
    Single(String),
    V4 { start: u32, end: u32 },
    V6 { start: u128, end: u128 },
}

impl TargetSpec {
    fn len(&self) -> u64 {
        match self {
            Self::Single(_) => 1,
            Self::V4 { start, end } => (*end as u64) - (*start as u64) + 1,
            Self::V6 { start, end } => (end - start + 1) as u64,
        }
    }

    fn iter(self) -> Box<dyn Iterator<Item = String> + Send> {
        match self {
            Self::Single(s) => Box::new(std::iter::once(s)),
            Self::V4 { start, end } => {
                Box::new((start..=end).map(|n| Ipv4Addr::from(n).to_string()))
            }
            Self::V6 { start, end } => {
                Box::new((start..=end).map(|n| Ipv6Addr::from(n).to_string()))
            }
        }
    }
}

/// A parsed target expression, expanded lazily into host strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSet {
    specs: Vec<TargetSpec>,
}

impl TargetSet {
    /// Parse a comma-separated list of IPs, hostnames, CIDR blocks and ranges.
    pub fn parse(expr: &str) -> Result<Self, EngineError> {
        let specs = expr
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(parse_element)
            .collect::<Result<Vec<_>, _>>()?;

        if specs.is_empty() {
            return Err(EngineError::Config("Target expression is empty".into()));
        }
        Ok(Self { specs })
    }

    /// Upper bound on the number of hosts (exact when no element repeats).
    pub fn count(&self) -> u64 {
        self.specs.iter().map(TargetSpec::len).sum()
    }

    /// Hosts in expression order, duplicates dropped keeping the first.
    pub fn iter(&self) -> impl Iterator<Item = String> + Send + 'static {
        let dedup = self.specs.len() > 1;
        let mut seen = HashSet::new();
        self.specs
            .clone()
            .into_iter()
            .flat_map(TargetSpec::iter)
            .filter(move |host| !dedup || seen.insert(host.clone()))
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.iter().collect()
    }
}

fn parse_element(token: &str) -> Result<TargetSpec, EngineError> {
    if let Some((addr, prefix)) = token.split_once('/') {
        return parse_cidr(token, addr, prefix);
    }

    if let Ok(ip) = token.parse::<IpAddr>() {
        return Ok(TargetSpec::Single(ip.to_string()));
    }

    if let Some((left, right)) = token.split_once('-') {
        if let Ok(start) = left.trim().parse::<Ipv4Addr>() {
            return parse_v4_range(token, start, right.trim());
        }
    }

    if is_hostname(token) {
        return Ok(TargetSpec::Single(token.to_string()));
    }

    Err(EngineError::parse(token))
}

fn parse_cidr(token: &str, addr: &str, prefix: &str) -> Result<TargetSpec, EngineError> {
    let ip: IpAddr = addr.trim().parse().map_err(|_| EngineError::parse(token))?;
    let prefix: u32 = prefix.trim().parse().map_err(|_| EngineError::parse(token))?;

    match ip {
        IpAddr::V4(v4) => {
            if prefix > 32 || (1u128 << (32 - prefix)) > MAX_BLOCK_HOSTS {
                return Err(EngineError::parse(token));
            }
            let mask = if prefix == 0 { 0 } else { u32::MAX << (32 - prefix) };
            let start = u32::from(v4) & mask;
            Ok(TargetSpec::V4 { start, end: start | !mask })
        }
        IpAddr::V6(v6) => {
            if prefix > 128 || 128 - prefix > 16 {
                return Err(EngineError::parse(token));
            }
            let mask = if prefix == 0 { 0 } else { u128::MAX << (128 - prefix) };
            let start = u128::from(v6) & mask;
            Ok(TargetSpec::V6 { start, end: start | !mask })
        }
    }
}

fn parse_v4_range(token: &str, start: Ipv4Addr, right: &str) -> Result<TargetSpec, EngineError> {
    let end = if let Ok(full) = right.parse::<Ipv4Addr>() {
        full
    } else {
        let last: u8 = right.parse().map_err(|_| EngineError::parse(token))?;
        let o = start.octets();
        Ipv4Addr::new(o[0], o[1], o[2], last)
    };

    let (start, end) = (u32::from(start), u32::from(end));
    if end < start || (end - start) as u128 + 1 > MAX_BLOCK_HOSTS {
        return Err(EngineError::parse(token));
    }
    Ok(TargetSpec::V4 { start, end })
}

fn is_hostname(token: &str) -> bool {
    token.len() <= 253
        && !token.starts_with('-')
        && !token.starts_with('.')
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cidr_yields_whole_block_ascending() {
        let set = TargetSet::parse("10.0.0.0/30").unwrap();
        assert_eq!(set.to_vec(), vec!["10.0.0.0", "10.0.0.1", "10.0.0.2", "10.0.0.3"]);
        assert_eq!(set.count(), 4);
    }

    #[test]
    fn test_cidr_size_matches_prefix() {
        for prefix in [24u32, 28, 31, 32] {
            let set = TargetSet::parse(&format!("192.168.7.9/{}", prefix)).unwrap();
            let hosts = set.to_vec();
            assert_eq!(hosts.len() as u64, 1u64 << (32 - prefix));
            let unique: HashSet<_> = hosts.iter().collect();
            assert_eq!(unique.len(), hosts.len());
        }
    }

    #[test]
    fn test_cidr_masks_host_bits() {
        let set = TargetSet::parse("192.168.1.77/29").unwrap();
        assert_eq!(set.to_vec().first().map(String::as_str), Some("192.168.1.72"));
    }

    #[test]
    fn test_oversized_cidr_rejected() {
        assert!(matches!(TargetSet::parse("10.0.0.0/8"), Err(EngineError::Parse { .. })));
        assert!(matches!(TargetSet::parse("10.0.0.0/33"), Err(EngineError::Parse { .. })));
        assert!(matches!(TargetSet::parse("fe80::/64"), Err(EngineError::Parse { .. })));
    }

    #[test]
    fn test_ipv6_block() {
        let set = TargetSet::parse("2001:db8::/126").unwrap();
        assert_eq!(set.to_vec(), vec!["2001:db8::", "2001:db8::1", "2001:db8::2", "2001:db8::3"]);
    }

    #[test]
    fn test_ranges() {
        let short = TargetSet::parse("10.1.1.5-7").unwrap();
        assert_eq!(short.to_vec(), vec!["10.1.1.5", "10.1.1.6", "10.1.1.7"]);

        let full = TargetSet::parse("10.1.1.254-10.1.2.1").unwrap();
        assert_eq!(full.to_vec(), vec!["10.1.1.254", "10.1.1.255", "10.1.2.0", "10.1.2.1"]);

        assert!(TargetSet::parse("10.1.1.9-3").is_err());
    }

    #[test]
    fn test_mixed_list_dedups_in_order() {
        let set = TargetSet::parse("example.com, 10.0.0.1, 10.0.0.0/31, example.com").unwrap();
        assert_eq!(set.to_vec(), vec!["example.com", "10.0.0.1", "10.0.0.0"]);
        assert_eq!(set.count(), 5);
    }

    #[test]
    fn test_hostname_with_dash_is_not_a_range() {
        let set = TargetSet::parse("my-host.internal").unwrap();
        assert_eq!(set.to_vec(), vec!["my-host.internal"]);
    }

    #[test]
    fn test_invalid_tokens() {
        assert!(matches!(TargetSet::parse(""), Err(EngineError::Config(_))));
        assert!(matches!(TargetSet::parse(" , "), Err(EngineError::Config(_))));
        match TargetSet::parse("10.0.0.1,bad host!") {
            Err(EngineError::Parse { token }) => assert_eq!(token, "bad host!"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
