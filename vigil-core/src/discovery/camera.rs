use std::fmt;
use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use tracing::{debug, warn};
use vigil_config::HostStatePolicy;
use vigil_model::{Entity, HostState, ScanHost, SoftwareId};

use super::DiscoveryFeed;
use crate::scan::{ScanError, ScanExecutor, validate_network};

/// Search term used for hosts that reported no product banner.
pub const GENERIC_PRODUCT: &str = "camera";

/// One host found by a sweep and the entities derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepFinding {
    pub host: ScanHost,
    pub ip: Entity,
    /// The product banner, or [`GENERIC_PRODUCT`] when none was reported.
    pub product: Entity,
}

impl SweepFinding {
    fn from_host(host: ScanHost) -> Self {
        let ip = Entity::ip(host.ip.clone());
        let banner = host.product().unwrap_or(GENERIC_PRODUCT);
        let product = Entity::Software(SoftwareId::new(banner, ""));
        Self { host, ip, product }
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        [&self.ip, &self.product].into_iter()
    }
}

/// Sweeps a network for hosts exposing camera-like ports.
#[derive(Clone)]
pub struct CameraSweep {
    executor: Arc<dyn ScanExecutor>,
    network: String,
    ports: Vec<u16>,
    down_hosts: HostStatePolicy,
}

impl fmt::Debug for CameraSweep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CameraSweep")
            .field("network", &self.network)
            .field("ports", &self.ports)
            .field("down_hosts", &self.down_hosts)
            .finish()
    }
}

impl CameraSweep {
    pub fn new(
        executor: Arc<dyn ScanExecutor>,
        network: impl Into<String>,
        ports: Vec<u16>,
    ) -> Self {
        Self {
            executor,
            network: network.into(),
            ports,
            down_hosts: HostStatePolicy::default(),
        }
    }

    pub fn with_down_hosts(mut self, policy: HostStatePolicy) -> Self {
        self.down_hosts = policy;
        self
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    fn scan_args(&self) -> Vec<String> {
        let ports = self
            .ports
            .iter()
            .map(u16::to_string)
            .collect::<Vec<_>>()
            .join(",");
        vec!["-p".to_string(), ports, "--open".to_string()]
    }

    pub async fn sweep(&self) -> Result<Vec<SweepFinding>, ScanError> {
        validate_network(&self.network)?;
        let hosts = self.executor.scan(&self.network, &self.scan_args()).await?;

        let findings: Vec<SweepFinding> = hosts
            .into_iter()
            .filter(|host| {
                if Entity::ip(host.ip.clone()).as_ipv4().is_none() {
                    debug!(ip = %host.ip, "skipping non-IPv4 host");
                    return false;
                }
                match (host.state, self.down_hosts) {
                    (HostState::Down, HostStatePolicy::Suppress) => {
                        debug!(ip = %host.ip, "suppressing down host");
                        false
                    }
                    _ => true,
                }
            })
            .map(SweepFinding::from_host)
            .collect();

        debug!(
            network = %self.network,
            found = findings.len(),
            "sweep complete"
        );
        Ok(findings)
    }
}

impl DiscoveryFeed for CameraSweep {
    fn name(&self) -> &str {
        "camera-sweep"
    }

    fn entities(&self) -> BoxStream<'_, Entity> {
        stream::once(self.sweep())
            .flat_map(|result| {
                let entities: Vec<Entity> = match result {
                    Ok(findings) => findings
                        .iter()
                        .flat_map(|f| f.entities().cloned())
                        .collect(),
                    Err(err) => {
                        warn!(error = %err, "camera sweep failed");
                        Vec::new()
                    }
                };
                stream::iter(entities)
            })
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use mockall::mock;
    use mockall::predicate::*;
    use vigil_model::PortRecord;

    use super::*;

    mock! {
        Scanner {}

        #[async_trait]
        impl ScanExecutor for Scanner {
            async fn scan(
                &self,
                target: &str,
                args: &[String],
            ) -> Result<Vec<ScanHost>, ScanError>;
        }
    }

    fn camera(ip: &str, state: HostState, banner: &str) -> ScanHost {
        let mut host = ScanHost::new(ip);
        host.state = state;
        host.ports.insert(PortRecord {
            port: 554,
            protocol: "tcp".into(),
            state: "open".into(),
            service: "rtsp".into(),
            version: banner.into(),
        });
        host
    }

    fn scanner_returning(hosts: Vec<ScanHost>) -> MockScanner {
        let mut scanner = MockScanner::new();
        scanner
            .expect_scan()
            .with(
                eq("192.168.1.0/24"),
                function(|args: &[String]| {
                    args.join(" ") == "-p 80,554,8554 --open"
                }),
            )
            .times(1)
            .returning(move |_, _| Ok(hosts.clone()));
        scanner
    }

    #[tokio::test]
    async fn down_hosts_follow_policy() {
        let hosts = vec![
            camera("192.168.1.10", HostState::Up, "Hikvision IP camera"),
            camera("192.168.1.11", HostState::Down, ""),
        ];

        let sweep = CameraSweep::new(
            Arc::new(scanner_returning(hosts.clone())),
            "192.168.1.0/24",
            vec![80, 554, 8554],
        );
        let found = sweep.sweep().await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(
            found[0].product,
            Entity::software("Hikvision IP camera", "")
        );

        let sweep = CameraSweep::new(
            Arc::new(scanner_returning(hosts)),
            "192.168.1.0/24",
            vec![80, 554, 8554],
        )
        .with_down_hosts(HostStatePolicy::Report);
        let found = sweep.sweep().await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[1].product, Entity::software(GENERIC_PRODUCT, ""));
    }

    #[tokio::test]
    async fn invalid_network_never_scans() {
        let mut scanner = MockScanner::new();
        scanner.expect_scan().times(0);
        let sweep =
            CameraSweep::new(Arc::new(scanner), "192.168.1.0", vec![554]);
        assert!(sweep.sweep().await.unwrap_err().is_validation());
    }

    #[tokio::test]
    async fn feed_yields_ip_then_product_entities() {
        let sweep = CameraSweep::new(
            Arc::new(scanner_returning(vec![camera(
                "192.168.1.10",
                HostState::Up,
                "Axis 2100 network camera",
            )])),
            "192.168.1.0/24",
            vec![80, 554, 8554],
        );
        let entities: Vec<Entity> = sweep.entities().collect().await;
        assert_eq!(
            entities,
            vec![
                Entity::ip("192.168.1.10"),
                Entity::software("Axis 2100 network camera", "")
            ]
        );
    }
}
