use std::fmt;

const VALUE_TAG: &str = "value";
const STRING_TAG: &str = "string";

/// A message received on a logical channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioPacket {
    Value { name: String, value: i32 },
    Text(String),
}

impl RadioPacket {
    /// Frames the packet for byte-oriented transports
    ///
    /// `value:<int>:<name>` or `string:<text>`. The name goes last so it may
    /// itself contain `:`.
    pub fn to_payload(&self) -> String {
        match self {
            RadioPacket::Value { name, value } => format!("{VALUE_TAG}:{value}:{name}"),
            RadioPacket::Text(text) => format!("{STRING_TAG}:{text}"),
        }
    }

    pub fn from_payload(payload: &str) -> Option<Self> {
        let (tag, rest) = payload.split_once(':')?;
        match tag {
            VALUE_TAG => {
                let (value, name) = rest.split_once(':')?;
                Some(RadioPacket::Value {
                    name: name.to_string(),
                    value: value.parse().ok()?,
                })
            }
            STRING_TAG => Some(RadioPacket::Text(rest.to_string())),
            _ => None,
        }
    }
}

impl fmt::Display for RadioPacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RadioPacket::Value { name, value } => write!(f, "{name}={value}"),
            RadioPacket::Text(text) => write!(f, "{text:?}"),
        }
    }
}
