//! Plaintext frame codec and the handful of messages the client needs.
//!
//! A frame is `0x00`, the payload length as a varint, the message type as a
//! varint, then the protobuf-encoded payload.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use homelink_domain::native_api::DeviceInfo;

use crate::error::NativeApiError;

/// First byte of every plaintext frame.
pub const PREAMBLE: u8 = 0x00;

/// Frames larger than this are rejected.
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

pub mod message_type {
    pub const HELLO_REQUEST: u32 = 1;
    pub const HELLO_RESPONSE: u32 = 2;
    pub const CONNECT_REQUEST: u32 = 3;
    pub const CONNECT_RESPONSE: u32 = 4;
    pub const DISCONNECT_REQUEST: u32 = 5;
    pub const DISCONNECT_RESPONSE: u32 = 6;
    pub const PING_REQUEST: u32 = 7;
    pub const PING_RESPONSE: u32 = 8;
    pub const DEVICE_INFO_REQUEST: u32 = 9;
    pub const DEVICE_INFO_RESPONSE: u32 = 10;
}

const WIRE_VARINT: u8 = 0;
const WIRE_FIXED64: u8 = 1;
const WIRE_LEN: u8 = 2;
const WIRE_FIXED32: u8 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub msg_type: u32,
    pub payload: Vec<u8>,
}

#[allow(clippy::cast_possible_truncation)]
pub fn encode_varint(mut value: u64, buf: &mut Vec<u8>) {
    while value >= 0x80 {
        // low seven bits with the continuation flag
        buf.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

/// Decode a varint from the start of `buf`, returning it and its length.
///
/// # Errors
///
/// Returns [`NativeApiError::Decode`] when the buffer ends mid-varint or the
/// varint is longer than ten bytes.
pub fn decode_varint(buf: &[u8]) -> Result<(u64, usize), NativeApiError> {
    let mut value = 0_u64;
    for (index, byte) in buf.iter().enumerate().take(10) {
        value |= u64::from(byte & 0x7f) << (7 * index);
        if byte & 0x80 == 0 {
            return Ok((value, index + 1));
        }
    }
    Err(NativeApiError::Decode("truncated varint"))
}

/// Encode a whole frame.
#[must_use]
pub fn encode_frame(msg_type: u32, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(payload.len() + 8);
    buf.push(PREAMBLE);
    encode_varint(payload.len() as u64, &mut buf);
    encode_varint(u64::from(msg_type), &mut buf);
    buf.extend_from_slice(payload);
    buf
}

async fn read_varint<R: AsyncRead + Unpin>(reader: &mut R) -> Result<u64, NativeApiError> {
    let mut value = 0_u64;
    for shift in (0..70).step_by(7) {
        let byte = reader.read_u8().await?;
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(NativeApiError::Decode("varint too long"))
}

/// Read one frame.
///
/// # Errors
///
/// Returns [`NativeApiError::Preamble`] when the device speaks the encrypted
/// protocol, [`NativeApiError::FrameTooLarge`] for oversized frames, or an IO
/// error when the stream ends.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Frame, NativeApiError> {
    let preamble = reader.read_u8().await?;
    if preamble != PREAMBLE {
        return Err(NativeApiError::Preamble(preamble));
    }
    let len = usize::try_from(read_varint(reader).await?)
        .map_err(|_| NativeApiError::Decode("frame length overflow"))?;
    if len > MAX_FRAME_LEN {
        return Err(NativeApiError::FrameTooLarge(len));
    }
    let msg_type = u32::try_from(read_varint(reader).await?)
        .map_err(|_| NativeApiError::Decode("message type overflow"))?;
    let mut payload = vec![0; len];
    reader.read_exact(&mut payload).await?;
    Ok(Frame { msg_type, payload })
}

/// Write one message as a frame.
///
/// # Errors
///
/// Returns an IO error when the write fails.
pub async fn write_message<W: AsyncWrite + Unpin, M: Message>(
    writer: &mut W,
    message: &M,
) -> Result<(), NativeApiError> {
    let frame = encode_frame(M::TYPE, &message.encode());
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Protobuf field writer.
#[derive(Debug, Default)]
struct FieldWriter {
    buf: Vec<u8>,
}

impl FieldWriter {
    fn tag(&mut self, field: u32, wire: u8) {
        encode_varint(u64::from((field << 3) | u32::from(wire)), &mut self.buf);
    }

    fn string(mut self, field: u32, value: &str) -> Self {
        // proto3 leaves default values out
        if !value.is_empty() {
            self.tag(field, WIRE_LEN);
            encode_varint(value.len() as u64, &mut self.buf);
            self.buf.extend_from_slice(value.as_bytes());
        }
        self
    }

    fn uint32(mut self, field: u32, value: u32) -> Self {
        if value != 0 {
            self.tag(field, WIRE_VARINT);
            encode_varint(u64::from(value), &mut self.buf);
        }
        self
    }

    fn bool(mut self, field: u32, value: bool) -> Self {
        if value {
            self.tag(field, WIRE_VARINT);
            self.buf.push(1);
        }
        self
    }

    fn finish(self) -> Vec<u8> {
        self.buf
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldValue<'a> {
    Varint(u64),
    Bytes(&'a [u8]),
    Fixed,
}

impl FieldValue<'_> {
    fn as_bool(self) -> bool {
        matches!(self, Self::Varint(value) if value != 0)
    }

    fn as_u32(self) -> u32 {
        match self {
            Self::Varint(value) => u32::try_from(value).unwrap_or(u32::MAX),
            _ => 0,
        }
    }

    fn as_string(self) -> Result<String, NativeApiError> {
        match self {
            Self::Bytes(bytes) => String::from_utf8(bytes.to_vec())
                .map_err(|_| NativeApiError::Decode("string field is not utf-8")),
            _ => Err(NativeApiError::Decode("expected a string field")),
        }
    }
}

/// Walk the fields of a protobuf payload.
fn fields(payload: &[u8]) -> Result<Vec<(u32, FieldValue<'_>)>, NativeApiError> {
    let mut out = Vec::new();
    let mut rest = payload;
    while !rest.is_empty() {
        let (key, used) = decode_varint(rest)?;
        rest = &rest[used..];
        let field = u32::try_from(key >> 3).map_err(|_| NativeApiError::Decode("field number"))?;
        let value = match (key & 0x07) as u8 {
            WIRE_VARINT => {
                let (value, used) = decode_varint(rest)?;
                rest = &rest[used..];
                FieldValue::Varint(value)
            }
            WIRE_LEN => {
                let (len, used) = decode_varint(rest)?;
                rest = &rest[used..];
                let len = usize::try_from(len)
                    .ok()
                    .filter(|len| *len <= rest.len())
                    .ok_or(NativeApiError::Decode("length-delimited field overruns payload"))?;
                let (bytes, tail) = rest.split_at(len);
                rest = tail;
                FieldValue::Bytes(bytes)
            }
            WIRE_FIXED64 => {
                rest = rest
                    .get(8..)
                    .ok_or(NativeApiError::Decode("truncated fixed64"))?;
                FieldValue::Fixed
            }
            WIRE_FIXED32 => {
                rest = rest
                    .get(4..)
                    .ok_or(NativeApiError::Decode("truncated fixed32"))?;
                FieldValue::Fixed
            }
            _ => return Err(NativeApiError::Decode("unsupported wire type")),
        };
        out.push((field, value));
    }
    Ok(out)
}

/// A message with a fixed type id.
pub trait Message: Sized {
    const TYPE: u32;

    fn encode(&self) -> Vec<u8>;

    /// # Errors
    ///
    /// Returns [`NativeApiError::Decode`] for malformed payloads.
    fn decode(payload: &[u8]) -> Result<Self, NativeApiError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelloRequest {
    pub client_info: String,
}

impl Message for HelloRequest {
    const TYPE: u32 = message_type::HELLO_REQUEST;

    fn encode(&self) -> Vec<u8> {
        FieldWriter::default().string(1, &self.client_info).finish()
    }

    fn decode(payload: &[u8]) -> Result<Self, NativeApiError> {
        let mut message = Self {
            client_info: String::new(),
        };
        for (field, value) in fields(payload)? {
            if field == 1 {
                message.client_info = value.as_string()?;
            }
        }
        Ok(message)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HelloResponse {
    pub api_version_major: u32,
    pub api_version_minor: u32,
    pub server_info: String,
    pub name: String,
}

impl Message for HelloResponse {
    const TYPE: u32 = message_type::HELLO_RESPONSE;

    fn encode(&self) -> Vec<u8> {
        FieldWriter::default()
            .uint32(1, self.api_version_major)
            .uint32(2, self.api_version_minor)
            .string(3, &self.server_info)
            .string(4, &self.name)
            .finish()
    }

    fn decode(payload: &[u8]) -> Result<Self, NativeApiError> {
        let mut message = Self::default();
        for (field, value) in fields(payload)? {
            match field {
                1 => message.api_version_major = value.as_u32(),
                2 => message.api_version_minor = value.as_u32(),
                3 => message.server_info = value.as_string()?,
                4 => message.name = value.as_string()?,
                _ => {}
            }
        }
        Ok(message)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectRequest {
    pub password: String,
}

impl Message for ConnectRequest {
    const TYPE: u32 = message_type::CONNECT_REQUEST;

    fn encode(&self) -> Vec<u8> {
        FieldWriter::default().string(1, &self.password).finish()
    }

    fn decode(payload: &[u8]) -> Result<Self, NativeApiError> {
        let mut message = Self::default();
        for (field, value) in fields(payload)? {
            if field == 1 {
                message.password = value.as_string()?;
            }
        }
        Ok(message)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectResponse {
    pub invalid_password: bool,
}

impl Message for ConnectResponse {
    const TYPE: u32 = message_type::CONNECT_RESPONSE;

    fn encode(&self) -> Vec<u8> {
        FieldWriter::default()
            .bool(1, self.invalid_password)
            .finish()
    }

    fn decode(payload: &[u8]) -> Result<Self, NativeApiError> {
        let mut message = Self::default();
        for (field, value) in fields(payload)? {
            if field == 1 {
                message.invalid_password = value.as_bool();
            }
        }
        Ok(message)
    }
}

macro_rules! empty_message {
    ($name:ident, $ty:expr) => {
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct $name;

        impl Message for $name {
            const TYPE: u32 = $ty;

            fn encode(&self) -> Vec<u8> {
                Vec::new()
            }

            fn decode(_payload: &[u8]) -> Result<Self, NativeApiError> {
                Ok(Self)
            }
        }
    };
}

empty_message!(DisconnectRequest, message_type::DISCONNECT_REQUEST);
empty_message!(DisconnectResponse, message_type::DISCONNECT_RESPONSE);
empty_message!(PingRequest, message_type::PING_REQUEST);
empty_message!(PingResponse, message_type::PING_RESPONSE);
empty_message!(DeviceInfoRequest, message_type::DEVICE_INFO_REQUEST);

/// Device info answer; field 5 (compilation time) is skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfoResponse(pub DeviceInfo);

impl Message for DeviceInfoResponse {
    const TYPE: u32 = message_type::DEVICE_INFO_RESPONSE;

    fn encode(&self) -> Vec<u8> {
        let info = &self.0;
        FieldWriter::default()
            .bool(1, info.uses_password)
            .string(2, &info.name)
            .string(3, &info.mac_address)
            .string(4, &info.version)
            .string(6, &info.model)
            .finish()
    }

    fn decode(payload: &[u8]) -> Result<Self, NativeApiError> {
        let mut info = DeviceInfo::default();
        for (field, value) in fields(payload)? {
            match field {
                1 => info.uses_password = value.as_bool(),
                2 => info.name = value.as_string()?,
                3 => info.mac_address = value.as_string()?,
                4 => info.version = value.as_string()?,
                6 => info.model = value.as_string()?,
                _ => {}
            }
        }
        Ok(Self(info))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_encode_multi_byte_varint() {
        let mut buf = Vec::new();
        encode_varint(300, &mut buf);
        assert_eq!(buf, [0xac, 0x02]);
        assert_eq!(decode_varint(&buf).unwrap(), (300, 2));
    }

    #[test]
    fn should_reject_truncated_varint() {
        assert!(matches!(
            decode_varint(&[0x80, 0x80]),
            Err(NativeApiError::Decode(_))
        ));
    }

    #[test]
    fn should_encode_frame_header() {
        let frame = encode_frame(message_type::CONNECT_REQUEST, b"\x0a\x01x");
        assert_eq!(frame, [0x00, 0x03, 0x03, 0x0a, 0x01, b'x']);
    }

    #[test]
    fn should_leave_empty_password_out_of_connect_request() {
        assert!(ConnectRequest::default().encode().is_empty());
        let encoded = ConnectRequest {
            password: "password1".to_string(),
        }
        .encode();
        assert_eq!(encoded[0], 0x0a);
        assert_eq!(encoded[1], 9);
    }

    #[test]
    fn should_decode_device_info_skipping_unknown_fields() {
        // field 5 (compilation time) and a fixed32 field 20
        let mut payload = DeviceInfoResponse(DeviceInfo {
            name: "test".to_string(),
            uses_password: true,
            mac_address: "11:22:33:44:55:aa".to_string(),
            version: "1.16.0".to_string(),
            model: "nodemcuv2".to_string(),
        })
        .encode();
        payload.extend_from_slice(&[0x2a, 0x03, b'a', b'b', b'c']);
        payload.extend_from_slice(&[0xa5, 0x01, 1, 2, 3, 4]);

        let DeviceInfoResponse(info) = DeviceInfoResponse::decode(&payload).unwrap();
        assert_eq!(info.name, "test");
        assert!(info.uses_password);
        assert_eq!(info.model, "nodemcuv2");
    }

    #[test]
    fn should_reject_overrunning_string_field() {
        let result = HelloResponse::decode(&[0x1a, 0x05, b'a']);
        assert!(matches!(result, Err(NativeApiError::Decode(_))));
    }

    #[tokio::test]
    async fn should_read_frame_written_by_write_message() {
        let mut buf = Vec::new();
        write_message(&mut buf, &ConnectResponse {
            invalid_password: true,
        })
        .await
        .unwrap();

        let frame = read_frame(&mut buf.as_slice()).await.unwrap();
        assert_eq!(frame.msg_type, message_type::CONNECT_RESPONSE);
        assert!(ConnectResponse::decode(&frame.payload).unwrap().invalid_password);
    }

    #[tokio::test]
    async fn should_reject_encrypted_preamble() {
        let data = [0x01_u8, 0x00, 0x00];
        let result = read_frame(&mut data.as_slice()).await;
        assert!(matches!(result, Err(NativeApiError::Preamble(0x01))));
    }

    #[tokio::test]
    async fn should_reject_oversized_frame() {
        let mut data = vec![PREAMBLE];
        encode_varint((MAX_FRAME_LEN + 1) as u64, &mut data);
        data.push(0x01);
        let result = read_frame(&mut data.as_slice()).await;
        assert!(matches!(result, Err(NativeApiError::FrameTooLarge(_))));
    }
}
