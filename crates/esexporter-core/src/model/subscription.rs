use serde::Deserialize;

use super::null_as_default;
use super::position::{EventPosition, PositionParseError};

/// One persistent subscription group as listed by `GET /subscriptions`.
///
/// `parked` is not part of the payload; it is derived afterwards by reading
/// the group's parked log.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SubscriptionStats {
    #[serde(deserialize_with = "null_as_default")]
    pub event_stream_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub group_name: String,
    pub total_items_processed: i64,
    pub connection_count: i64,
    pub last_known_event_number: i64,
    pub last_processed_event_number: i64,
    /// `C:<commit>/P:<prepare>`, only set for subscriptions to `$all`.
    #[serde(deserialize_with = "null_as_default")]
    pub last_checkpointed_event_position: String,
    #[serde(deserialize_with = "null_as_default")]
    pub last_known_event_position: String,
    pub total_in_flight_messages: i64,
    #[serde(skip)]
    pub parked: ParkedStats,
}

impl SubscriptionStats {
    pub fn is_all_stream(&self) -> bool {
        self.event_stream_id == super::ALL_STREAM
    }

    pub fn last_checkpointed_position(&self) -> Result<EventPosition, PositionParseError> {
        EventPosition::parse(&self.last_checkpointed_event_position)
    }

    pub fn last_known_position(&self) -> Result<EventPosition, PositionParseError> {
        EventPosition::parse(&self.last_known_event_position)
    }
}

/// Parked-message backlog of one subscription group.
///
/// `None` means the value could not be derived this scrape, which is
/// distinct from a known zero.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ParkedStats {
    pub count: Option<u64>,
    /// Age of the oldest retained parked message. `None` also when the log is
    /// empty.
    pub oldest_age_seconds: Option<f64>,
}

impl ParkedStats {
    pub const UNAVAILABLE: ParkedStats = ParkedStats {
        count: None,
        oldest_age_seconds: None,
    };

    /// Nothing parked.
    pub fn empty() -> Self {
        ParkedStats {
            count: Some(0),
            oldest_age_seconds: None,
        }
    }
}

/// Source: `GET /subscriptions/{stream}/{group}/info`
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct SubscriptionGroupInfo {
    pub parked_message_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parked_stats_are_not_read_from_payload() {
        let subs: Vec<SubscriptionStats> = serde_json::from_str(
            r#"[{ "eventStreamId": "orders", "groupName": "billing", "totalInFlightMessages": 5, "parked": 99 }]"#,
        )
        .unwrap();
        assert_eq!(subs[0].total_in_flight_messages, 5);
        assert_eq!(subs[0].parked, ParkedStats::default());
        assert_eq!(subs[0].parked, ParkedStats::UNAVAILABLE);
    }

    #[test]
    fn all_stream_positions_parse() {
        let sub = SubscriptionStats {
            event_stream_id: "$all".to_string(),
            last_checkpointed_event_position: "C:100/P:90".to_string(),
            ..Default::default()
        };
        assert!(sub.is_all_stream());
        assert_eq!(sub.last_checkpointed_position().unwrap().commit, 100);
        assert!(sub.last_known_position().is_err());
    }

    #[test]
    fn empty_is_known_zero() {
        let empty = ParkedStats::empty();
        assert_eq!(empty.count, Some(0));
        assert_eq!(empty.oldest_age_seconds, None);
        assert_ne!(empty, ParkedStats::UNAVAILABLE);
    }
}
