use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "ServerConfig::default_host")]
    pub host: String,
    #[serde(default = "ServerConfig::default_port")]
    pub port: u16,
    #[serde(default = "ServerConfig::default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    fn default_port() -> u16 {
        8501
    }

    fn default_host() -> String {
        String::from("127.0.0.1")
    }

    fn default_max_upload_bytes() -> usize {
        200 * 1024 * 1024
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            max_upload_bytes: Self::default_max_upload_bytes(),
        }
    }
}
