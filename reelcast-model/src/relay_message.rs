//! Client↔server frames. Modeled as tagged enums that serialize to the
//! `["TAG", ...]` arrays the protocol actually uses on the wire, via a
//! manual `Serialize`/`Deserialize` pair rather than serde's enum tagging
//! (which would produce an object, not an array).

use crate::{event::Event, filter::Filter};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Req { sub_id: String, filters: Vec<Filter> },
    Close { sub_id: String },
    Event { event: Box<Event> },
}

#[derive(Debug, Clone)]
pub enum ServerMessage {
    Event { sub_id: String, event: Box<Event> },
    Eose { sub_id: String },
    Notice { message: String },
    Ok { event_id: String, accepted: bool, reason: String },
}

impl Serialize for ClientMessage {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeSeq;
        match self {
            ClientMessage::Req { sub_id, filters } => {
                let mut seq = serializer.serialize_seq(Some(2 + filters.len()))?;
                seq.serialize_element("REQ")?;
                seq.serialize_element(sub_id)?;
                for f in filters {
                    seq.serialize_element(f)?;
                }
                seq.end()
            }
            ClientMessage::Close { sub_id } => {
                let mut seq = serializer.serialize_seq(Some(2))?;
                seq.serialize_element("CLOSE")?;
                seq.serialize_element(sub_id)?;
                seq.end()
            }
            ClientMessage::Event { event } => {
                let mut seq = serializer.serialize_seq(Some(2))?;
                seq.serialize_element("EVENT")?;
                seq.serialize_element(event)?;
                seq.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for ServerMessage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw: Vec<Value> = Vec::deserialize(deserializer)?;
        let tag = raw
            .first()
            .and_then(Value::as_str)
            .ok_or_else(|| serde::de::Error::custom("missing frame tag"))?;

        match tag {
            "EVENT" => {
                let sub_id = value_as_string(&raw, 1)?;
                let event: Event = serde_json::from_value(
                    raw.get(2).cloned().ok_or_else(|| serde::de::Error::custom("missing event"))?,
                )
                .map_err(serde::de::Error::custom)?;
                Ok(ServerMessage::Event {
                    sub_id,
                    event: Box::new(event),
                })
            }
            "EOSE" => Ok(ServerMessage::Eose {
                sub_id: value_as_string(&raw, 1)?,
            }),
            "NOTICE" => Ok(ServerMessage::Notice {
                message: value_as_string(&raw, 1)?,
            }),
            "OK" => Ok(ServerMessage::Ok {
                event_id: value_as_string(&raw, 1)?,
                accepted: raw.get(2).and_then(Value::as_bool).unwrap_or(false),
                reason: raw.get(3).and_then(Value::as_str).unwrap_or_default().to_string(),
            }),
            other => Err(serde::de::Error::custom(format!("unknown frame tag {other}"))),
        }
    }
}

fn value_as_string<E: serde::de::Error>(raw: &[Value], index: usize) -> Result<String, E> {
    raw.get(index)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| E::custom(format!("missing string at index {index}")))
}


impl PartialEq for ServerMessage {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                ServerMessage::Event { sub_id: a, event: ea },
                ServerMessage::Event { sub_id: b, event: eb },
            ) => a == b && ea == eb,
            (ServerMessage::Eose { sub_id: a }, ServerMessage::Eose { sub_id: b }) => a == b,
            (ServerMessage::Notice { message: a }, ServerMessage::Notice { message: b }) => a == b,
            (
                ServerMessage::Ok {
                    event_id: a,
                    accepted: aa,
                    reason: ar,
                },
                ServerMessage::Ok {
                    event_id: b,
                    accepted: ba,
                    reason: br,
                },
            ) => a == b && aa == ba && ar == br,
            _ => false,
        }
    }
}
