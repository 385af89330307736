//! Snapshot of the machine running the agent.

use std::net::{IpAddr, Ipv4Addr};

use chrono::Utc;
use sysinfo::System;
use tokio::net::UdpSocket;
use tracing::debug;
use vigil_model::DeviceInfo;

const LOOPBACK: &str = "127.0.0.1";

/// Primary outbound IPv4 of this host. Connecting a UDP socket sends no
/// packet; it only asks the kernel which interface would route there.
pub async fn local_ipv4() -> String {
    match probe_route(Ipv4Addr::new(8, 8, 8, 8)).await {
        Ok(IpAddr::V4(ip)) if !ip.is_unspecified() => ip.to_string(),
        Ok(other) => {
            debug!(addr = %other, "route probe returned unusable address");
            LOOPBACK.to_string()
        }
        Err(err) => {
            debug!(error = %err, "route probe failed");
            LOOPBACK.to_string()
        }
    }
}

async fn probe_route(toward: Ipv4Addr) -> std::io::Result<IpAddr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
    socket.connect((toward, 80)).await?;
    Ok(socket.local_addr()?.ip())
}

struct Usage {
    cpu: f32,
    memory: f32,
}

fn sample_usage() -> Usage {
    let mut system = System::new();
    system.refresh_cpu_usage();
    std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
    system.refresh_cpu_usage();
    system.refresh_memory();

    let total = system.total_memory();
    let memory = if total == 0 {
        0.0
    } else {
        (system.used_memory() as f64 / total as f64 * 100.0) as f32
    };
    Usage {
        cpu: system.global_cpu_usage(),
        memory,
    }
}

fn os_string() -> String {
    let name = System::name().unwrap_or_else(|| "Unknown".to_string());
    match System::kernel_version() {
        Some(kernel) if !kernel.is_empty() => format!("{name} {kernel}"),
        _ => name,
    }
}

/// Collects name, OS, address and load of this host.
pub async fn snapshot() -> DeviceInfo {
    let usage = match tokio::task::spawn_blocking(sample_usage).await {
        Ok(usage) => usage,
        Err(err) => {
            debug!(error = %err, "usage probe join failed");
            Usage {
                cpu: 0.0,
                memory: 0.0,
            }
        }
    };

    DeviceInfo {
        name: System::host_name()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "unknown".to_string()),
        os: os_string(),
        ip_address: local_ipv4().await,
        cpu_usage: usage.cpu,
        memory_usage: usage.memory,
        timestamp: Utc::now(),
    }
}
