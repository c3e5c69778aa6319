/// Broker connection settings.
///
/// Defaults match a local broker without credentials on the default exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BusConfig {
    pub host: String,
    pub port: u16,
    pub login: String,
    pub password: String,
    pub exchange: String,
    pub exchange_durable: bool,
    pub exchange_auto_delete: bool,
    pub tls: TlsConfig,
}

/// TLS options; only applied when `enabled` is set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TlsConfig {
    pub enabled: bool,
    /// Protocol label passed through to the broker library.
    pub version: String,
    pub verify_certificate: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_owned(),
            port: 5672,
            login: String::new(),
            password: String::new(),
            exchange: String::new(),
            exchange_durable: false,
            exchange_auto_delete: false,
            tls: TlsConfig::default(),
        }
    }
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            version: "PROTOCOL_TLS".to_owned(),
            verify_certificate: true,
        }
    }
}

impl BusConfig {
    pub fn with_exchange(mut self, exchange: impl Into<String>) -> Self {
        self.exchange = exchange.into();
        self
    }

    pub fn with_credentials(
        mut self,
        login: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.login = login.into();
        self.password = password.into();
        self
    }

    /// `host:port` for log lines.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
