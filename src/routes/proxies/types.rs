use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct ProxyListing {
    pub proxies: Vec<String>,
    pub count: usize,
}
