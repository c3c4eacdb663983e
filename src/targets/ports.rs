use crate::errors::EngineError;

/// Ports exposed often enough to be worth a quick look.
pub const COMMON_PORTS: &[u16] = &[
    21, 22, 23, 25, 53, 80, 110, 111, 135, 139, 143, 443, 445, 993, 995, 1433, 1521, 3306,
    3389, 5432, 5900, 6379, 8080, 8443, 27017,
];

/// Ports probed over UDP when enabled (DNS, NTP, SNMP).
pub const UDP_PORTS: &[u16] = &[53, 123, 161];

/// Sorted, de-duplicated port list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSet {
    ports: Vec<u16>,
}

impl PortSet {
    pub fn parse(expr: &str) -> Result<Self, EngineError> {
        let expr = expr.trim();
        match expr.to_ascii_lowercase().as_str() {
            "" => return Err(EngineError::Config("Port expression is empty".into())),
            "all" => return Ok(Self { ports: (1..=u16::MAX).collect() }),
            "common" => return Ok(Self::from_ports(COMMON_PORTS.iter().copied())),
            _ => {}
        }

        let mut ports = Vec::new();
        for token in expr.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            if token.eq_ignore_ascii_case("common") {
                ports.extend_from_slice(COMMON_PORTS);
            } else if let Some((start, end)) = token.split_once('-') {
                let start = parse_port(start, token)?;
                let end = parse_port(end, token)?;
                if end < start {
                    return Err(EngineError::parse(token));
                }
                ports.extend(start..=end);
            } else {
                ports.push(parse_port(token, token)?);
            }
        }

        if ports.is_empty() {
            return Err(EngineError::Config("Port expression is empty".into()));
        }
        Ok(Self::from_ports(ports))
    }

    pub fn from_ports(ports: impl IntoIterator<Item = u16>) -> Self {
        let mut ports: Vec<u16> = ports.into_iter().filter(|p| *p != 0).collect();
        ports.sort_unstable();
        ports.dedup();
        Self { ports }
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    pub fn contains(&self, port: u16) -> bool {
        self.ports.binary_search(&port).is_ok()
    }

    pub fn as_slice(&self) -> &[u16] {
        &self.ports
    }
}

fn parse_port(raw: &str, token: &str) -> Result<u16, EngineError> {
    match raw.trim().parse::<u16>() {
        Ok(0) | Err(_) => Err(EngineError::parse(token)),
        Ok(p) => Ok(p),
    }
}
