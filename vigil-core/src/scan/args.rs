use std::net::Ipv4Addr;

use super::ScanError;

/// Flags that make the scanner read or write files on the host.
const FILE_FLAGS: &[&str] = &[
    "-iL",
    "-iR",
    "--resume",
    "--datadir",
    "--servicedb",
    "--versiondb",
    "--script-args-file",
    "--stylesheet",
    "--excludefile",
    "--append-output",
];

/// Splits a caller argument string on whitespace and rejects anything that
/// would touch the filesystem or control output.
pub fn split_args(raw: &str) -> Result<Vec<String>, ScanError> {
    let args: Vec<String> =
        raw.split_whitespace().map(str::to_string).collect();
    check_args(&args)?;
    Ok(args)
}

pub fn check_args(args: &[String]) -> Result<(), ScanError> {
    for arg in args {
        let flag = arg.split('=').next().unwrap_or(arg);
        let writes_output = flag.starts_with("-o");
        if writes_output || FILE_FLAGS.contains(&flag) {
            return Err(ScanError::DisallowedArgument(arg.clone()));
        }
    }
    Ok(())
}

/// Accepts host names, IPv4/IPv6 literals, CIDR blocks and nmap octet
/// ranges. Anything that could be read as an option is rejected.
pub fn validate_target(target: &str) -> Result<(), ScanError> {
    let target = target.trim();
    if target.is_empty() {
        return Err(ScanError::InvalidTarget("target is empty".into()));
    }
    let allowed = |c: char| {
        c.is_ascii_alphanumeric() || matches!(c, '.' | ':' | '/' | '-')
    };
    let starts_ok = target
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphanumeric());
    if !starts_ok || !target.chars().all(allowed) {
        return Err(ScanError::InvalidTarget(target.to_string()));
    }
    Ok(())
}

/// Strict `a.b.c.d/nn` check used for camera sweeps.
pub fn validate_network(network: &str) -> Result<(Ipv4Addr, u8), ScanError> {
    let invalid = || ScanError::InvalidTarget(network.to_string());
    let (ip, prefix) = network.trim().split_once('/').ok_or_else(invalid)?;
    let ip: Ipv4Addr = ip.parse().map_err(|_| invalid())?;
    let prefix: u8 = prefix.parse().map_err(|_| invalid())?;
    if prefix > 32 {
        return Err(invalid());
    }
    Ok((ip, prefix))
}
