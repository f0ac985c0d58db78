use globset::{Glob, GlobSetBuilder};
use std::net::IpAddr;

/// `entry` is a bare address or `addr/prefix`.
pub fn source_matches(entry: &str, remote: IpAddr) -> bool {
    let remote = remote.to_canonical();
    let entry = entry.trim();
    let Some((addr, prefix)) = entry.split_once('/') else {
        return entry
            .parse::<IpAddr>()
            .map(|ip| ip.to_canonical() == remote)
            .unwrap_or(false);
    };
    let (Ok(network), Ok(prefix)) = (addr.parse::<IpAddr>(), prefix.parse::<u8>()) else {
        return false;
    };
    match (network.to_canonical(), remote) {
        (IpAddr::V4(net), IpAddr::V4(ip)) if prefix <= 32 => {
            let mask = u32::MAX.checked_shl(32 - u32::from(prefix)).unwrap_or(0);
            u32::from(net) & mask == u32::from(ip) & mask
        }
        (IpAddr::V6(net), IpAddr::V6(ip)) if prefix <= 128 => {
            let mask = u128::MAX.checked_shl(128 - u32::from(prefix)).unwrap_or(0);
            u128::from(net) & mask == u128::from(ip) & mask
        }
        _ => false,
    }
}

pub fn referer_matches(patterns: &[String], referer: &str) -> bool {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        match Glob::new(pattern) {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(err) => {
                tracing::warn!(target: "gatekeep::auth", %pattern, error = %err, "ignoring bad referer pattern");
            }
        }
    }
    builder
        .build()
        .map(|set| set.is_match(referer))
        .unwrap_or(false)
}
