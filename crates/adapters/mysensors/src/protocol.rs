//! MySensors serial line protocol: `node;child;command;ack;type;payload\n`.

use std::str::FromStr;

use crate::error::GatewayError;

/// Presentation (sensor) types.
pub mod presentation {
    pub const S_TEMP: u8 = 6;
    pub const S_HUM: u8 = 7;
    pub const S_POWER: u8 = 13;
    pub const S_ARDUINO_NODE: u8 = 17;
    pub const S_ARDUINO_REPEATER_NODE: u8 = 18;
    pub const S_GPS: u8 = 38;
}

/// Value types of `set`/`req` messages.
pub mod set_req {
    pub const V_TEMP: u8 = 0;
    pub const V_HUM: u8 = 1;
    pub const V_WATT: u8 = 17;
    pub const V_KWH: u8 = 18;
    pub const V_POSITION: u8 = 49;
}

/// Types of `internal` messages.
pub mod internal {
    pub const I_BATTERY_LEVEL: u8 = 0;
    pub const I_SKETCH_NAME: u8 = 11;
    pub const I_SKETCH_VERSION: u8 = 12;
}

/// Child id used by a node to present itself.
pub const NODE_CHILD_ID: u8 = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    Presentation = 0,
    Set = 1,
    Req = 2,
    Internal = 3,
    Stream = 4,
}

impl TryFrom<u8> for Command {
    type Error = GatewayError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Presentation),
            1 => Ok(Self::Set),
            2 => Ok(Self::Req),
            3 => Ok(Self::Internal),
            4 => Ok(Self::Stream),
            other => Err(GatewayError::Protocol(format!("unknown command {other}"))),
        }
    }
}

/// One protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub node_id: u8,
    pub child_id: u8,
    pub command: Command,
    pub ack: bool,
    pub value_type: u8,
    pub payload: String,
}

impl Message {
    /// A `set` message without ack request.
    #[must_use]
    pub fn set(node_id: u8, child_id: u8, value_type: u8, payload: impl Into<String>) -> Self {
        Self {
            node_id,
            child_id,
            command: Command::Set,
            ack: false,
            value_type,
            payload: payload.into(),
        }
    }

    /// Line to write on the transport, newline included.
    #[must_use]
    pub fn encode(&self) -> String {
        format!("{self}\n")
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{};{};{};{};{};{}",
            self.node_id,
            self.child_id,
            self.command as u8,
            u8::from(self.ack),
            self.value_type,
            self.payload
        )
    }
}

impl FromStr for Message {
    type Err = GatewayError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim_end_matches(['\r', '\n']);
        let mut parts = line.splitn(6, ';');
        let mut number = |field: &'static str| -> Result<u8, GatewayError> {
            parts
                .next()
                .and_then(|part| part.parse().ok())
                .ok_or_else(|| GatewayError::Protocol(format!("invalid {field} in {line:?}")))
        };
        let node_id = number("node id")?;
        let child_id = number("child id")?;
        let command = Command::try_from(number("command")?)?;
        let ack = number("ack")? != 0;
        let value_type = number("type")?;
        let payload = parts.next().unwrap_or_default().to_string();
        Ok(Self {
            node_id,
            child_id,
            command,
            ack,
            value_type,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_encode_set_message() {
        let message = Message::set(1, 1, set_req::V_WATT, "1200");
        assert_eq!(message.encode(), "1;1;1;0;17;1200\n");
    }

    #[test]
    fn should_parse_line_with_semicolons_in_payload() {
        let message: Message = "1;1;1;0;49;40.741894,-73.989311;12\n".parse().unwrap();
        assert_eq!(message.node_id, 1);
        assert_eq!(message.command, Command::Set);
        assert_eq!(message.value_type, set_req::V_POSITION);
        assert_eq!(message.payload, "40.741894,-73.989311;12");
    }

    #[test]
    fn should_reject_unknown_command() {
        let result = "1;1;9;0;0;1".parse::<Message>();
        assert!(matches!(result, Err(GatewayError::Protocol(_))));
    }

    #[test]
    fn should_reject_truncated_line() {
        assert!("1;1".parse::<Message>().is_err());
    }
}
