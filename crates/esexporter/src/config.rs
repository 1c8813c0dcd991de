//! Command line and environment configuration.

use std::time::Duration;

use clap::{Parser, ValueEnum};
use esexporter_core::CollectorConfig;
use esexporter_core::source::HttpSourceConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum ClusterMode {
    Cluster,
    Single,
}

/// Transport for stream and metadata reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum StreamReads {
    /// `esdb` gRPC client, works on every supported server.
    Grpc,
    /// HTTP AtomPub API, disabled by default since server 20.6.
    AtomPub,
}

/// Longest accepted scrape timeout.
const MAX_TIMEOUT: Duration = Duration::from_secs(60 * 60);

#[derive(Parser, Debug)]
#[command(
    name = "esexporter",
    about = "Prometheus exporter for EventStoreDB",
    version = esexporter_core::VERSION
)]
pub(crate) struct Args {
    /// EventStoreDB HTTP endpoint.
    #[arg(long, default_value = "http://localhost:2113", env = "EVENTSTORE_URL")]
    eventstore_url: String,

    /// Basic Auth username. If set, --eventstore-password is also required.
    #[arg(long, default_value = "", env = "EVENTSTORE_USER")]
    eventstore_user: String,

    #[arg(long, default_value = "", env = "EVENTSTORE_PASSWORD")]
    eventstore_password: String,

    /// Port the metrics endpoint listens on.
    #[arg(long, default_value_t = 9448, env = "PORT")]
    port: u16,

    /// Upper bound for one scrape, e.g. `10s`, `500ms`, `1m`.
    #[arg(long, default_value = "10s", env = "TIMEOUT", value_parser = parse_duration)]
    timeout: Duration,

    /// Debug logging.
    #[arg(long, env = "VERBOSE")]
    pub(crate) verbose: bool,

    /// Accept invalid TLS certificates.
    #[arg(long, env = "INSECURE_SKIP_VERIFY")]
    insecure_skip_verify: bool,

    /// `cluster` reads gossip and reports member state; `single` does not.
    #[arg(long, value_enum, default_value_t = ClusterMode::Cluster, env = "CLUSTER_MODE")]
    cluster_mode: ClusterMode,

    /// How streams and parked-message logs are read.
    #[arg(long, value_enum, default_value_t = StreamReads::Grpc, env = "STREAM_READS")]
    stream_reads: StreamReads,

    #[arg(long, env = "ENABLE_PARKED_MESSAGES_STATS")]
    enable_parked_messages_stats: bool,

    #[arg(long, env = "ENABLE_TCP_CONNECTION_STATS")]
    enable_tcp_connection_stats: bool,

    /// Streams whose last event number is reported, `$all` included.
    #[arg(long, default_value = "", env = "STREAMS")]
    streams: String,

    /// Single character separating entries of --streams.
    #[arg(long, default_value = ",", env = "STREAMS_SEPARATOR")]
    streams_separator: String,
}

/// Validated configuration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Config {
    pub(crate) source: HttpSourceConfig,
    pub(crate) collector: CollectorConfig,
    pub(crate) port: u16,
    pub(crate) timeout: Duration,
    pub(crate) cluster_mode: ClusterMode,
    pub(crate) stream_reads: StreamReads,
}

#[derive(Debug, PartialEq)]
pub(crate) enum ConfigError {
    PartialCredentials,
    InvalidSeparator(String),
    ZeroTimeout,
    TimeoutTooLong(Duration),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::PartialCredentials => write!(
                f,
                "--eventstore-user and --eventstore-password must both be set or both be empty"
            ),
            ConfigError::InvalidSeparator(s) => write!(
                f,
                "--streams-separator must be exactly one character, got {:?}",
                s
            ),
            ConfigError::ZeroTimeout => write!(f, "--timeout must be greater than zero"),
            ConfigError::TimeoutTooLong(timeout) => write!(
                f,
                "--timeout must be at most {}s, got {}s",
                MAX_TIMEOUT.as_secs(),
                timeout.as_secs()
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Args {
    pub(crate) fn into_config(self) -> Result<Config, ConfigError> {
        if self.eventstore_user.is_empty() != self.eventstore_password.is_empty() {
            return Err(ConfigError::PartialCredentials);
        }
        let mut chars = self.streams_separator.chars();
        let separator = match (chars.next(), chars.next()) {
            (Some(c), None) => c,
            _ => return Err(ConfigError::InvalidSeparator(self.streams_separator)),
        };
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.timeout > MAX_TIMEOUT {
            return Err(ConfigError::TimeoutTooLong(self.timeout));
        }

        let streams = self
            .streams
            .split(separator)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Config {
            source: HttpSourceConfig {
                url: self.eventstore_url,
                user: self.eventstore_user,
                password: self.eventstore_password,
                insecure_skip_verify: self.insecure_skip_verify,
            },
            collector: CollectorConfig {
                cluster_stats: self.cluster_mode == ClusterMode::Cluster,
                tcp_connection_stats: self.enable_tcp_connection_stats,
                parked_messages_stats: self.enable_parked_messages_stats,
                streams,
            },
            port: self.port,
            timeout: self.timeout,
            cluster_mode: self.cluster_mode,
            stream_reads: self.stream_reads,
        })
    }
}

/// Parses `500ms`, `10s`, `2m`. A bare number is seconds.
fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let (value, unit) = match s.find(|c: char| !c.is_ascii_digit()) {
        Some(i) => s.split_at(i),
        None => (s, "s"),
    };
    let value: u64 = value
        .parse()
        .map_err(|_| format!("invalid duration {:?}", s))?;
    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => value
            .checked_mul(60)
            .map(Duration::from_secs)
            .ok_or_else(|| format!("duration {:?} out of range", s)),
        _ => Err(format!("invalid duration unit in {:?}, use ms, s or m", s)),
    }
}
