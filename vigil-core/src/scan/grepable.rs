use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use vigil_model::{HostState, PortRecord, ScanHost};

static HOST_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^Host:\s+(\S+)\s+\(([^)]*)\)").expect("host line pattern")
});

// port/state/protocol/owner/service/rpc/version/
static PORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+)/([^/]*)/([^/]*)/[^/]*/([^/]*)/[^/]*/([^/]*)/")
        .expect("port entry pattern")
});

/// Parses `-oG` output into hosts, in order of first appearance.
///
/// A host usually shows up on two lines (`Status:` and `Ports:`); both
/// are merged by address. Comment lines and unknown fields are skipped.
pub fn parse_grepable(output: &str) -> Vec<ScanHost> {
    let mut hosts: Vec<ScanHost> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for line in output.lines() {
        let Some(caps) = HOST_RE.captures(line) else {
            continue;
        };
        let ip = caps[1].to_string();
        let slot = *index.entry(ip.clone()).or_insert_with(|| {
            hosts.push(ScanHost::new(ip));
            hosts.len() - 1
        });
        let host = &mut hosts[slot];

        let name = caps[2].trim();
        if !name.is_empty() && !host.hostnames.iter().any(|h| h == name) {
            host.hostnames.push(name.to_string());
        }

        for field in line.split('\t').skip(1) {
            if let Some(status) = field.strip_prefix("Status:") {
                host.state = HostState::from_status(status);
            } else if let Some(ports) = field.strip_prefix("Ports:") {
                for port in PORT_RE.captures_iter(ports) {
                    let Ok(number) = port[1].parse::<u16>() else {
                        continue;
                    };
                    host.ports.insert(PortRecord {
                        port: number,
                        state: port[2].to_string(),
                        protocol: port[3].to_string(),
                        service: port[4].to_string(),
                        version: port[5].trim().to_string(),
                    });
                }
                if host.state == HostState::Unknown && !host.ports.is_empty() {
                    host.state = HostState::Up;
                }
            } else if let Some(os) = field.strip_prefix("OS:") {
                let os = os.trim();
                if !os.is_empty() && host.os == "Unknown" {
                    host.os = os.to_string();
                }
            }
        }
    }

    hosts
}
