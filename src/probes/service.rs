//! Port-number service guesses, refined from banners when one is available.

/// Ports that speak HTTP and only answer after a request.
pub const HTTP_PORTS: &[u16] = &[80, 81, 3000, 5000, 7001, 8000, 8008, 8080, 8081, 8088, 8888, 9000, 9090];

const WELL_KNOWN: &[(u16, &str)] = &[
    (21, "ftp"),
    (22, "ssh"),
    (23, "telnet"),
    (25, "smtp"),
    (53, "dns"),
    (80, "http"),
    (110, "pop3"),
    (111, "rpcbind"),
    (123, "ntp"),
    (135, "msrpc"),
    (139, "netbios-ssn"),
    (143, "imap"),
    (161, "snmp"),
    (389, "ldap"),
    (443, "https"),
    (445, "microsoft-ds"),
    (465, "smtps"),
    (587, "submission"),
    (993, "imaps"),
    (995, "pop3s"),
    (1433, "mssql"),
    (1521, "oracle"),
    (2049, "nfs"),
    (2375, "docker"),
    (3306, "mysql"),
    (3389, "rdp"),
    (5432, "postgresql"),
    (5900, "vnc"),
    (5985, "winrm"),
    (6379, "redis"),
    (8080, "http-proxy"),
    (8443, "https-alt"),
    (9200, "elasticsearch"),
    (11211, "memcached"),
    (27017, "mongodb"),
];

pub fn guess_by_port(port: u16) -> &'static str {
    WELL_KNOWN
        .iter()
        .find(|(p, _)| *p == port)
        .map(|(_, name)| *name)
        .unwrap_or("unknown")
}

/// Banner signatures checked in order; first match wins.
const SIGNATURES: &[(&str, &str)] = &[
    ("SSH-", "ssh"),
    ("HTTP/", "http"),
    ("+PONG", "redis"),
    ("-NOAUTH", "redis"),
    ("-ERR wrong number", "redis"),
    ("* OK", "imap"),
    ("+OK", "pop3"),
    ("mysql_native_password", "mysql"),
    ("ESMTP", "smtp"),
    ("FTP", "ftp"),
    ("RFB ", "vnc"),
];

/// Refine a port-based guess using the first bytes the service sent.
pub fn refine(port: u16, banner: &str) -> String {
    let guess = guess_by_port(port);
    if banner.is_empty() {
        return guess.to_string();
    }
    if let Some((_, name)) = SIGNATURES.iter().find(|(sig, _)| banner.contains(sig)) {
        return (*name).to_string();
    }
    if banner.starts_with("220") && guess == "unknown" {
        return "ftp".to_string();
    }
    guess.to_string()
}

/// Request that coaxes a banner out of a silent service.
pub fn nudge_for(port: u16) -> Option<&'static [u8]> {
    if HTTP_PORTS.contains(&port) {
        Some(b"HEAD / HTTP/1.0\r\n\r\n")
    } else if port == 6379 {
        Some(b"PING\r\n")
    } else {
        None
    }
}

/// Printable single-line banner for display.
pub fn clean_banner(raw: &str, max: usize) -> Option<String> {
    let line: String = raw
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())?
        .chars()
        .filter(|c| !c.is_control())
        .collect();
    if line.is_empty() {
        return None;
    }
    Some(crate::utils::truncation::truncate_chars(&line, max))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guess_by_port() {
        assert_eq!(guess_by_port(22), "ssh");
        assert_eq!(guess_by_port(6379), "redis");
        assert_eq!(guess_by_port(40000), "unknown");
    }

    #[test]
    fn test_refine_from_banner() {
        assert_eq!(refine(2222, "SSH-2.0-OpenSSH_8.9"), "ssh");
        assert_eq!(refine(9999, "HTTP/1.1 200 OK\r\nServer: nginx"), "http");
        assert_eq!(refine(21, ""), "ftp");
        assert_eq!(refine(31337, "220 service ready"), "ftp");
    }

    #[test]
    fn test_clean_banner_takes_first_line() {
        assert_eq!(
            clean_banner("\r\nSSH-2.0-OpenSSH\r\nmore", 64).as_deref(),
            Some("SSH-2.0-OpenSSH")
        );
        assert_eq!(clean_banner("   ", 64), None);
    }
}
