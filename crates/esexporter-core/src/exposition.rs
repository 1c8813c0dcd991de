//! Prometheus text exposition of a [`Snapshot`].
//!
//! Every scrape renders into a fresh registry, so a series that disappeared
//! upstream (a deleted subscription, a closed connection) disappears from the
//! output too. All names carry the `eventstore_` prefix.

use prometheus::{
    Counter, CounterVec, Encoder, Gauge, GaugeVec, Opts, Registry, TextEncoder,
};
use tracing::warn;

use crate::model::{
    LogPosition, MemberState, ParkedStats, ProjectionStats, Snapshot, SubscriptionStats,
    TcpConnectionStats,
};

const PREFIX: &str = "eventstore";

/// `Content-Type` of the rendered text.
pub const CONTENT_TYPE: &str = prometheus::TEXT_FORMAT;

const SUBSCRIPTION_LABELS: &[&str] = &["event_stream_id", "group_name"];
const TCP_CONNECTION_LABELS: &[&str] = &[
    "id",
    "client_name",
    "remote_endpoint",
    "local_endpoint",
    "external",
    "ssl",
];

#[derive(Debug)]
pub enum ExpositionError {
    Prometheus(prometheus::Error),
    Utf8(std::string::FromUtf8Error),
}

impl std::fmt::Display for ExpositionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExpositionError::Prometheus(e) => write!(f, "metric registration failed: {}", e),
            ExpositionError::Utf8(e) => write!(f, "metrics output is not UTF-8: {}", e),
        }
    }
}

impl std::error::Error for ExpositionError {}

impl From<prometheus::Error> for ExpositionError {
    fn from(e: prometheus::Error) -> Self {
        ExpositionError::Prometheus(e)
    }
}

/// Renders the outcome of one scrape.
///
/// `None` means the scrape failed: only `eventstore_up 0` is emitted.
/// Member-state gauges are emitted only in `cluster_mode`.
pub fn render(snapshot: Option<&Snapshot>, cluster_mode: bool) -> Result<String, ExpositionError> {
    let registry = Registry::new_custom(Some(PREFIX.to_string()), None)?;

    let up = gauge(&registry, "up", "Whether the last scrape of the server succeeded")?;
    up.set(if snapshot.is_some() { 1.0 } else { 0.0 });

    if let Some(snapshot) = snapshot {
        let metrics = MetricSet::new(&registry)?;
        metrics.record_server(snapshot);
        metrics.record_tcp_connections(&snapshot.tcp_connections);
        metrics.record_projections(&snapshot.projections);
        metrics.record_subscriptions(&snapshot.subscriptions);
        metrics.record_streams(snapshot);
        if cluster_mode {
            register_cluster(&registry, snapshot)?;
        }
    }

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(ExpositionError::Utf8)
}

fn gauge(registry: &Registry, name: &str, help: &str) -> Result<Gauge, prometheus::Error> {
    let g = Gauge::with_opts(Opts::new(name, help))?;
    registry.register(Box::new(g.clone()))?;
    Ok(g)
}

fn gauge_vec(
    registry: &Registry,
    name: &str,
    help: &str,
    labels: &[&str],
) -> Result<GaugeVec, prometheus::Error> {
    let g = GaugeVec::new(Opts::new(name, help), labels)?;
    registry.register(Box::new(g.clone()))?;
    Ok(g)
}

fn counter_vec(
    registry: &Registry,
    name: &str,
    help: &str,
    labels: &[&str],
) -> Result<CounterVec, prometheus::Error> {
    let c = CounterVec::new(Opts::new(name, help), labels)?;
    registry.register(Box::new(c.clone()))?;
    Ok(c)
}

/// Counters start at zero in a fresh registry, so `inc_by` sets them.
fn set_counter(counter: &Counter, value: f64) {
    counter.inc_by(value.max(0.0));
}

fn flag(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

/// Unavailable parked stats are rendered as -1.
fn parked_values(parked: &ParkedStats) -> (f64, f64) {
    (
        parked.count.map(|c| c as f64).unwrap_or(-1.0),
        parked.oldest_age_seconds.unwrap_or(-1.0),
    )
}

struct MetricSet {
    process_cpu: Gauge,
    process_memory_bytes: Gauge,
    disk_io_read_bytes: Gauge,
    disk_io_written_bytes: Gauge,
    disk_io_read_ops: Gauge,
    disk_io_write_ops: Gauge,
    tcp_sent_bytes: Gauge,
    tcp_received_bytes: Gauge,
    tcp_connections: Gauge,

    tcp_connection_sent_bytes: CounterVec,
    tcp_connection_received_bytes: CounterVec,
    tcp_connection_pending_send_bytes: GaugeVec,
    tcp_connection_pending_received_bytes: GaugeVec,

    queue_length: GaugeVec,
    queue_items_processed: CounterVec,

    drive_total_bytes: GaugeVec,
    drive_available_bytes: GaugeVec,

    projection_running: GaugeVec,
    projection_status: GaugeVec,
    projection_progress: GaugeVec,
    projection_events_processed: CounterVec,

    subscription_items_processed: CounterVec,
    subscription_last_processed_event_number: GaugeVec,
    subscription_last_known_event_number: GaugeVec,
    subscription_last_checkpointed_commit_position: GaugeVec,
    subscription_last_known_commit_position: GaugeVec,
    subscription_connections: GaugeVec,
    subscription_messages_in_flight: GaugeVec,
    subscription_parked_messages: GaugeVec,
    subscription_oldest_parked_age: GaugeVec,

    stream_last_event_number: GaugeVec,
    stream_last_commit_position: GaugeVec,
}

impl MetricSet {
    fn new(r: &Registry) -> Result<Self, prometheus::Error> {
        Ok(Self {
            process_cpu: gauge(r, "process_cpu", "Process CPU usage, 1 = one core fully busy")?,
            process_memory_bytes: gauge(r, "process_memory_bytes", "Process memory usage in bytes")?,
            disk_io_read_bytes: gauge(r, "disk_io_read_bytes", "Disk bytes read")?,
            disk_io_written_bytes: gauge(r, "disk_io_written_bytes", "Disk bytes written")?,
            disk_io_read_ops: gauge(r, "disk_io_read_ops", "Disk read operations")?,
            disk_io_write_ops: gauge(r, "disk_io_write_ops", "Disk write operations")?,
            tcp_sent_bytes: gauge(r, "tcp_sent_bytes", "TCP bytes sent")?,
            tcp_received_bytes: gauge(r, "tcp_received_bytes", "TCP bytes received")?,
            tcp_connections: gauge(r, "tcp_connections", "Open TCP connections")?,

            tcp_connection_sent_bytes: counter_vec(
                r,
                "tcp_connection_sent_bytes",
                "Bytes sent over a TCP connection",
                TCP_CONNECTION_LABELS,
            )?,
            tcp_connection_received_bytes: counter_vec(
                r,
                "tcp_connection_received_bytes",
                "Bytes received over a TCP connection",
                TCP_CONNECTION_LABELS,
            )?,
            tcp_connection_pending_send_bytes: gauge_vec(
                r,
                "tcp_connection_pending_send_bytes",
                "Bytes waiting to be sent over a TCP connection",
                TCP_CONNECTION_LABELS,
            )?,
            tcp_connection_pending_received_bytes: gauge_vec(
                r,
                "tcp_connection_pending_received_bytes",
                "Bytes received but not yet processed on a TCP connection",
                TCP_CONNECTION_LABELS,
            )?,

            queue_length: gauge_vec(r, "queue_length", "Items waiting in the queue", &["queue"])?,
            queue_items_processed: counter_vec(
                r,
                "queue_items_processed_total",
                "Items processed by the queue",
                &["queue"],
            )?,

            drive_total_bytes: gauge_vec(r, "drive_total_bytes", "Drive size in bytes", &["drive"])?,
            drive_available_bytes: gauge_vec(
                r,
                "drive_available_bytes",
                "Drive free space in bytes",
                &["drive"],
            )?,

            projection_running: gauge_vec(
                r,
                "projection_running",
                "1 if the projection is running",
                &["projection"],
            )?,
            projection_status: gauge_vec(
                r,
                "projection_status",
                "1 if the projection is in the given status",
                &["projection", "status"],
            )?,
            projection_progress: gauge_vec(
                r,
                "projection_progress",
                "Projection progress, 1 = done",
                &["projection"],
            )?,
            projection_events_processed: counter_vec(
                r,
                "projection_events_processed_after_restart_total",
                "Events processed by the projection since its last restart",
                &["projection"],
            )?,

            subscription_items_processed: counter_vec(
                r,
                "subscription_items_processed_total",
                "Items processed by the subscription group",
                SUBSCRIPTION_LABELS,
            )?,
            subscription_last_processed_event_number: gauge_vec(
                r,
                "subscription_last_processed_event_number",
                "Last event number processed by the subscription group (not $all)",
                SUBSCRIPTION_LABELS,
            )?,
            subscription_last_known_event_number: gauge_vec(
                r,
                "subscription_last_known_event_number",
                "Last event number known to the subscription group (not $all)",
                SUBSCRIPTION_LABELS,
            )?,
            subscription_last_checkpointed_commit_position: gauge_vec(
                r,
                "subscription_last_checkpointed_event_commit_position",
                "Commit position of the last checkpointed event ($all only)",
                SUBSCRIPTION_LABELS,
            )?,
            subscription_last_known_commit_position: gauge_vec(
                r,
                "subscription_last_known_event_commit_position",
                "Commit position of the last known event ($all only)",
                SUBSCRIPTION_LABELS,
            )?,
            subscription_connections: gauge_vec(
                r,
                "subscription_connections",
                "Consumers connected to the subscription group",
                SUBSCRIPTION_LABELS,
            )?,
            subscription_messages_in_flight: gauge_vec(
                r,
                "subscription_messages_in_flight",
                "Messages sent to consumers and not yet acknowledged",
                SUBSCRIPTION_LABELS,
            )?,
            subscription_parked_messages: gauge_vec(
                r,
                "subscription_parked_messages",
                "Parked messages of the subscription group, -1 if unknown",
                SUBSCRIPTION_LABELS,
            )?,
            subscription_oldest_parked_age: gauge_vec(
                r,
                "subscription_oldest_parked_message_age_seconds",
                "Age of the oldest parked message in seconds, -1 if none or unknown",
                SUBSCRIPTION_LABELS,
            )?,

            stream_last_event_number: gauge_vec(
                r,
                "stream_last_event_number",
                "Last event number of the stream (not $all)",
                &["event_stream_id"],
            )?,
            stream_last_commit_position: gauge_vec(
                r,
                "stream_last_commit_position",
                "Last commit position ($all only)",
                &["event_stream_id"],
            )?,
        })
    }

    fn record_server(&self, snapshot: &Snapshot) {
        let process = &snapshot.server.process;
        self.process_cpu.set(process.cpu / 100.0);
        self.process_memory_bytes.set(process.memory_bytes as f64);
        self.disk_io_read_bytes.set(process.disk_io.read_bytes as f64);
        self.disk_io_written_bytes.set(process.disk_io.written_bytes as f64);
        self.disk_io_read_ops.set(process.disk_io.read_ops as f64);
        self.disk_io_write_ops.set(process.disk_io.write_ops as f64);
        self.tcp_sent_bytes.set(process.tcp.sent_bytes as f64);
        self.tcp_received_bytes.set(process.tcp.received_bytes as f64);
        self.tcp_connections.set(process.tcp.connections as f64);

        for queue in snapshot.server.es.queues.values() {
            let labels = [queue.queue_name.as_str()];
            self.queue_length
                .with_label_values(&labels)
                .set(queue.length as f64);
            set_counter(
                &self.queue_items_processed.with_label_values(&labels),
                queue.items_processed as f64,
            );
        }

        for (name, drive) in &snapshot.server.system.drives {
            let labels = [name.as_str()];
            self.drive_total_bytes
                .with_label_values(&labels)
                .set(drive.total_bytes as f64);
            self.drive_available_bytes
                .with_label_values(&labels)
                .set(drive.available_bytes as f64);
        }
    }

    fn record_tcp_connections(&self, connections: &[TcpConnectionStats]) {
        for conn in connections {
            let external = conn.external.to_string();
            let ssl = conn.ssl.to_string();
            let labels = [
                conn.connection_id.as_str(),
                conn.client_connection_name.as_str(),
                conn.remote_endpoint.as_str(),
                conn.local_endpoint.as_str(),
                external.as_str(),
                ssl.as_str(),
            ];
            set_counter(
                &self.tcp_connection_sent_bytes.with_label_values(&labels),
                conn.total_bytes_sent as f64,
            );
            set_counter(
                &self.tcp_connection_received_bytes.with_label_values(&labels),
                conn.total_bytes_received as f64,
            );
            self.tcp_connection_pending_send_bytes
                .with_label_values(&labels)
                .set(conn.pending_send_bytes as f64);
            self.tcp_connection_pending_received_bytes
                .with_label_values(&labels)
                .set(conn.pending_received_bytes as f64);
        }
    }

    fn record_projections(&self, projections: &[ProjectionStats]) {
        for p in projections {
            let name = p.effective_name.as_str();
            let running = flag(p.is_running());
            self.projection_running.with_label_values(&[name]).set(running);
            self.projection_status
                .with_label_values(&[name, "Running"])
                .set(running);
            self.projection_status
                .with_label_values(&[name, "Stopped"])
                .set(flag(p.is_stopped()));
            self.projection_status
                .with_label_values(&[name, "Faulted"])
                .set(flag(p.is_faulted()));
            self.projection_progress
                .with_label_values(&[name])
                .set(p.progress / 100.0);
            set_counter(
                &self.projection_events_processed.with_label_values(&[name]),
                p.events_processed_after_restart as f64,
            );
        }
    }

    fn record_subscriptions(&self, subscriptions: &[SubscriptionStats]) {
        for sub in subscriptions {
            let labels = [sub.event_stream_id.as_str(), sub.group_name.as_str()];
            set_counter(
                &self.subscription_items_processed.with_label_values(&labels),
                sub.total_items_processed as f64,
            );
            self.subscription_connections
                .with_label_values(&labels)
                .set(sub.connection_count as f64);
            self.subscription_messages_in_flight
                .with_label_values(&labels)
                .set(sub.total_in_flight_messages as f64);

            let (parked, oldest_age) = parked_values(&sub.parked);
            self.subscription_parked_messages
                .with_label_values(&labels)
                .set(parked);
            self.subscription_oldest_parked_age
                .with_label_values(&labels)
                .set(oldest_age);

            if sub.is_all_stream() {
                let checkpointed = sub.last_checkpointed_position().map(|p| p.commit);
                let known = sub.last_known_position().map(|p| p.commit);
                for (what, result) in [("last checkpointed", &checkpointed), ("last known", &known)] {
                    if let Err(e) = result {
                        warn!(group = %sub.group_name, error = %e, "cannot parse {} position", what);
                    }
                }
                self.subscription_last_checkpointed_commit_position
                    .with_label_values(&labels)
                    .set(checkpointed.unwrap_or(-1) as f64);
                self.subscription_last_known_commit_position
                    .with_label_values(&labels)
                    .set(known.unwrap_or(-1) as f64);
            } else {
                self.subscription_last_processed_event_number
                    .with_label_values(&labels)
                    .set(sub.last_processed_event_number as f64);
                self.subscription_last_known_event_number
                    .with_label_values(&labels)
                    .set(sub.last_known_event_number as f64);
            }
        }
    }

    fn record_streams(&self, snapshot: &Snapshot) {
        for stream in &snapshot.streams {
            let labels = [stream.event_stream_id.as_str()];
            match stream.last_position {
                LogPosition::CommitPosition(p) => self
                    .stream_last_commit_position
                    .with_label_values(&labels)
                    .set(p as f64),
                LogPosition::EventNumber(n) => self
                    .stream_last_event_number
                    .with_label_values(&labels)
                    .set(n as f64),
            }
        }
    }
}

fn register_cluster(registry: &Registry, snapshot: &Snapshot) -> Result<(), prometheus::Error> {
    let state = MemberState::parse(&snapshot.info.member_state);
    let roles = [
        ("cluster_member_is_leader", "1 if this node is the leader", MemberState::Leader),
        ("cluster_member_is_follower", "1 if this node is a follower", MemberState::Follower),
        (
            "cluster_member_is_readonly_replica",
            "1 if this node is a read-only replica",
            MemberState::ReadOnlyReplica,
        ),
        ("cluster_member_is_clone", "1 if this node is a clone", MemberState::Clone),
    ];
    for (name, help, role) in roles {
        gauge(registry, name, help)?.set(flag(state == role));
    }

    let alive = gauge_vec(
        registry,
        "cluster_member_alive",
        "1 if the member is alive, as seen from this node",
        &["member"],
    )?;
    for member in &snapshot.cluster_members {
        alive
            .with_label_values(&[member.name().as_str()])
            .set(flag(member.is_alive));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        DriveStats, MemberStats, ProcessStats, QueueStats, ServerInfo, ServerStats, StreamStats,
    };

    fn snapshot() -> Snapshot {
        let mut server = ServerStats {
            process: ProcessStats {
                cpu: 150.0,
                memory_bytes: 1024,
                ..Default::default()
            },
            ..Default::default()
        };
        server.es.queues.insert(
            "MainQueue".to_string(),
            QueueStats {
                queue_name: "MainQueue".to_string(),
                length: 3,
                items_processed: 42,
            },
        );
        server.system.drives.insert(
            "/data".to_string(),
            DriveStats {
                total_bytes: 1000,
                available_bytes: 250,
            },
        );

        Snapshot {
            info: ServerInfo {
                member_state: "follower".to_string(),
                ..Default::default()
            },
            server,
            cluster_members: vec![MemberStats {
                http_endpoint_ip: "10.0.0.2".to_string(),
                http_endpoint_port: 2113,
                is_alive: true,
            }],
            projections: vec![ProjectionStats {
                effective_name: "totals".to_string(),
                status: "Faulted (Enabled)".to_string(),
                progress: 50.0,
                events_processed_after_restart: 9,
            }],
            subscriptions: vec![
                SubscriptionStats {
                    event_stream_id: "orders".to_string(),
                    group_name: "billing".to_string(),
                    last_processed_event_number: 49,
                    parked: ParkedStats {
                        count: Some(20),
                        oldest_age_seconds: Some(120.0),
                    },
                    ..Default::default()
                },
                SubscriptionStats {
                    event_stream_id: "$all".to_string(),
                    group_name: "audit".to_string(),
                    last_checkpointed_event_position: "C:1000/P:990".to_string(),
                    last_known_event_position: "garbage".to_string(),
                    parked: ParkedStats::UNAVAILABLE,
                    ..Default::default()
                },
            ],
            streams: vec![
                StreamStats {
                    event_stream_id: "orders".to_string(),
                    last_position: LogPosition::EventNumber(59),
                },
                StreamStats {
                    event_stream_id: "$all".to_string(),
                    last_position: LogPosition::CommitPosition(123456),
                },
            ],
            tcp_connections: Vec::new(),
        }
    }

    #[test]
    fn test_failed_scrape_only_reports_down() {
        let text = render(None, true).unwrap();
        assert!(text.contains("eventstore_up 0"));
        assert!(!text.contains("eventstore_process_cpu"));
        assert!(!text.contains("eventstore_cluster_member_is_leader"));
    }

    #[test]
    fn test_snapshot_rendering() {
        let text = render(Some(&snapshot()), false).unwrap();

        assert!(text.contains("eventstore_up 1"));
        assert!(text.contains("eventstore_process_cpu 1.5"));
        assert!(text.contains("eventstore_process_memory_bytes 1024"));
        assert!(text.contains(r#"eventstore_queue_length{queue="MainQueue"} 3"#));
        assert!(text.contains(r#"eventstore_queue_items_processed_total{queue="MainQueue"} 42"#));
        assert!(text.contains(r#"eventstore_drive_available_bytes{drive="/data"} 250"#));
        assert!(text.contains(r#"eventstore_projection_progress{projection="totals"} 0.5"#));
        assert!(text.contains(r#"eventstore_projection_status{projection="totals",status="Faulted"} 1"#));
        assert!(text.contains(r#"eventstore_projection_running{projection="totals"} 0"#));
        assert!(text.contains(r#"eventstore_stream_last_event_number{event_stream_id="orders"} 59"#));
        assert!(text.contains(r#"eventstore_stream_last_commit_position{event_stream_id="$all"} 123456"#));
    }

    #[test]
    fn test_parked_stats_rendering() {
        let text = render(Some(&snapshot()), false).unwrap();

        assert!(text.contains(
            r#"eventstore_subscription_parked_messages{event_stream_id="orders",group_name="billing"} 20"#
        ));
        assert!(text.contains(
            r#"eventstore_subscription_oldest_parked_message_age_seconds{event_stream_id="orders",group_name="billing"} 120"#
        ));
        assert!(text.contains(
            r#"eventstore_subscription_parked_messages{event_stream_id="$all",group_name="audit"} -1"#
        ));
        assert!(text.contains(
            r#"eventstore_subscription_oldest_parked_message_age_seconds{event_stream_id="$all",group_name="audit"} -1"#
        ));
    }

    #[test]
    fn test_all_stream_subscription_positions() {
        let text = render(Some(&snapshot()), false).unwrap();

        assert!(text.contains(
            r#"eventstore_subscription_last_checkpointed_event_commit_position{event_stream_id="$all",group_name="audit"} 1000"#
        ));
        assert!(text.contains(
            r#"eventstore_subscription_last_known_event_commit_position{event_stream_id="$all",group_name="audit"} -1"#
        ));
        assert!(!text.contains(
            r#"eventstore_subscription_last_processed_event_number{event_stream_id="$all""#
        ));
        assert!(text.contains(
            r#"eventstore_subscription_last_processed_event_number{event_stream_id="orders",group_name="billing"} 49"#
        ));
    }

    #[test]
    fn test_cluster_gauges_only_in_cluster_mode() {
        let single = render(Some(&snapshot()), false).unwrap();
        assert!(!single.contains("eventstore_cluster_member"));

        let cluster = render(Some(&snapshot()), true).unwrap();
        assert!(cluster.contains("eventstore_cluster_member_is_follower 1"));
        assert!(cluster.contains("eventstore_cluster_member_is_leader 0"));
        assert!(cluster.contains(r#"eventstore_cluster_member_alive{member="10.0.0.2:2113"} 1"#));
    }

    #[test]
    fn test_no_tcp_connection_series_without_connections() {
        let text = render(Some(&snapshot()), false).unwrap();
        assert!(!text.contains("eventstore_tcp_connection_sent_bytes"));
        assert!(text.contains("eventstore_tcp_connections 0"));
    }
}
