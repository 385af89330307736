//! Default values shared by the loader and its tests.

pub const DEFAULT_GREYNOISE_BASE_URL: &str = "https://api.greynoise.io";
pub const DEFAULT_SHODAN_BASE_URL: &str = "https://api.shodan.io";
pub const DEFAULT_VULNERS_BASE_URL: &str = "https://vulners.com";
pub const DEFAULT_NVD_BASE_URL: &str = "https://services.nvd.nist.gov";

pub const DEFAULT_BACKEND_API_URL: &str = "http://localhost:4000/api";
pub const DEFAULT_OAUTH_SCOPE: &str = "https://graph.microsoft.com/.default";

pub const DEFAULT_CAMERA_NETWORK: &str = "192.168.1.0/24";
pub const DEFAULT_CAMERA_PORTS: [u16; 3] = [80, 554, 8554];
pub const DEFAULT_ERROR_LOG: &str = "error.log";

pub const DEFAULT_ENRICH_DEADLINE_SECS: u64 = 30;
pub const DEFAULT_ENRICH_CONCURRENCY: usize = 4;

pub const DEFAULT_SERVER_HOST: &str = "0.0.0.0";
pub const DEFAULT_SERVER_PORT: u16 = 5000;
pub const DEFAULT_SCAN_ARGS: &str = "-sS -O -sV";
pub const DEFAULT_NMAP_PATH: &str = "nmap";
