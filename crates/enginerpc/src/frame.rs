//! # Frames
//!
//! Every message on the wire is one of two envelopes:
//!
//! ```text
//! Call:  Variant("Call",  Map { seq, method, params })
//! Reply: Variant("Reply", Ok(Map { seq, results }))
//!        Variant("Reply", Err(Map { seq, failure: Map { kind, description, file?, line? } }))
//! ```
//!
//! ## Invariants
//! - Decoding never panics. Malformed input is an `Error`.
//! - Header keys the reader does not know are skipped.
//! - The body is kept as an unread `Decoder`, so a reply can be matched to its
//!   request by `seq` before anyone tries to understand the body.

use enginepack::Decoder;
use enginepack::Encoder;

use crate::error::Error;
use crate::error::FailureKind;
use crate::error::RemoteFailure;
use crate::error::Result;
use crate::message::Method;
use crate::message::Request;
use crate::message::Response;

const CALL: &str = "Call";
const REPLY: &str = "Reply";

/// Writes a Call frame for `request`.
pub struct CallEncoder<'a> {
    pub seq: u64,
    pub request: &'a Request,
}

impl<'a> CallEncoder<'a> {
    pub fn new(seq: u64, request: &'a Request) -> Self {
        Self { seq, request }
    }

    pub fn encode(&self, enc: &mut Encoder) -> Result<()> {
        enc.variant_begin(CALL)?;
        enc.map_begin()?;
        enc.field_u64("seq", self.seq)?;
        enc.field_str("method", self.request.method().as_str())?;
        enc.variant_begin("params")?;
        self.request.encode(enc)?;
        enc.variant_end()?;
        enc.map_end()?;
        enc.variant_end()?;
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut enc = Encoder::new();
        self.encode(&mut enc)?;
        Ok(enc.into_bytes()?)
    }
}

/// Writes a Reply frame carrying either a response or a failure.
pub struct ReplyEncoder<'a> {
    pub seq: u64,
    pub outcome: std::result::Result<&'a Response, &'a RemoteFailure>,
}

impl<'a> ReplyEncoder<'a> {
    pub fn ok(seq: u64, response: &'a Response) -> Self {
        Self { seq, outcome: Ok(response) }
    }

    pub fn err(seq: u64, failure: &'a RemoteFailure) -> Self {
        Self { seq, outcome: Err(failure) }
    }

    pub fn encode(&self, enc: &mut Encoder) -> Result<()> {
        enc.variant_begin(REPLY)?;
        match self.outcome {
            Ok(response) => {
                enc.result_ok_begin()?;
                self.header(enc, "results", |enc| response.encode(enc))?;
                enc.result_ok_end()?;
            }
            Err(failure) => {
                enc.result_err_begin()?;
                self.header(enc, "failure", |enc| encode_failure(enc, failure))?;
                enc.result_err_end()?;
            }
        }
        enc.variant_end()?;
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut enc = Encoder::new();
        self.encode(&mut enc)?;
        Ok(enc.into_bytes()?)
    }

    fn header(&self, enc: &mut Encoder, key: &str, body: impl FnOnce(&mut Encoder) -> Result<()>) -> Result<()> {
        enc.map_begin()?;
        enc.field_u64("seq", self.seq)?;
        enc.variant_begin(key)?;
        body(enc)?;
        enc.variant_end()?;
        enc.map_end()?;
        Ok(())
    }
}

/// A decoded Call header. `params` is unread until `request()`.
pub struct CallDecoder<'a> {
    pub seq: u64,
    pub method: Method,
    pub params: Decoder<'a>,
}

impl<'a> CallDecoder<'a> {
    pub fn decode(mut dec: Decoder<'a>) -> Result<Self> {
        let mut method = None;
        let (seq, params) = read_header(&mut dec, "params", |key, val| {
            if key == "method" {
                method = Some(Method::parse(val.str()?)?);
                return Ok(true);
            }
            Ok(false)
        })?;

        Ok(Self {
            seq,
            method: method.ok_or(Error::MissingField("method"))?,
            params,
        })
    }

    pub fn request(&self) -> Result<Request> {
        Request::decode(self.method, &mut self.params.clone())
    }
}

/// A decoded Reply header.
///
/// On success `status` holds the unread results, which only make sense
/// against the method of the matching request.
pub struct ReplyDecoder<'a> {
    pub seq: u64,
    pub status: std::result::Result<Decoder<'a>, RemoteFailure>,
}

impl<'a> ReplyDecoder<'a> {
    pub fn decode(mut dec: Decoder<'a>) -> Result<Self> {
        match dec.result()? {
            Ok(mut body) => {
                let (seq, results) = read_header(&mut body, "results", |_, _| Ok(false))?;
                Ok(Self { seq, status: Ok(results) })
            }
            Err(mut body) => {
                let (seq, mut failure) = read_header(&mut body, "failure", |_, _| Ok(false))?;
                Ok(Self { seq, status: Err(decode_failure(&mut failure)?) })
            }
        }
    }

    pub fn response(self, method: Method) -> Result<std::result::Result<Response, RemoteFailure>> {
        match self.status {
            Ok(mut results) => Ok(Ok(Response::decode(method, &mut results)?)),
            Err(failure) => Ok(Err(failure)),
        }
    }
}

pub enum RpcFrame<'a> {
    Call(CallDecoder<'a>),
    Reply(ReplyDecoder<'a>),
}

impl<'a> RpcFrame<'a> {
    pub fn decode(dec: &mut Decoder<'a>) -> Result<Self> {
        match dec.variant()? {
            (CALL, body) => Ok(Self::Call(CallDecoder::decode(body)?)),
            (REPLY, body) => Ok(Self::Reply(ReplyDecoder::decode(body)?)),
            (other, _) => Err(Error::UnknownVariant(format!("frame type {}", other))),
        }
    }
}

/// Reads only the sequence number of a frame.
///
/// Lets a reply be routed to its caller even when its body is unreadable.
pub fn decode_seq(bytes: &[u8]) -> Result<u64> {
    let mut dec = Decoder::new(bytes);
    let mut map = match dec.variant()? {
        (CALL, mut body) => body.map()?,
        (REPLY, mut body) => match body.result()? {
            Ok(mut inner) | Err(mut inner) => inner.map()?,
        },
        (other, _) => return Err(Error::UnknownVariant(format!("frame type {}", other))),
    };

    while let Some((key, mut val)) = map.next()? {
        if key == "seq" {
            return Ok(val.u64()?);
        }
        val.skip()?;
    }
    Err(Error::MissingField("seq"))
}

/// Walks a header map, pulling out `seq` and the body stored under `body_key`.
///
/// `extra` sees every other key and returns whether it consumed the value;
/// unconsumed values are skipped.
fn read_header<'a>(
    dec: &mut Decoder<'a>,
    body_key: &'static str,
    mut extra: impl FnMut(&str, &mut Decoder<'a>) -> Result<bool>,
) -> Result<(u64, Decoder<'a>)> {
    let mut map = dec.map()?;
    let mut seq = None;
    let mut body = None;

    while let Some((key, mut val)) = map.next()? {
        if key == "seq" {
            seq = Some(val.u64()?);
        } else if key == body_key {
            body = Some(val);
        } else if !extra(key, &mut val)? {
            val.skip()?;
        }
    }

    Ok((seq.ok_or(Error::MissingField("seq"))?, body.ok_or(Error::MissingField(body_key))?))
}

fn encode_failure(enc: &mut Encoder, failure: &RemoteFailure) -> Result<()> {
    enc.map_begin()?;
    enc.field_str("kind", failure.kind.as_tag())?;
    enc.field_str("description", &failure.description)?;
    if let Some(file) = &failure.file {
        enc.field_str("file", file)?;
    }
    if let Some(line) = failure.line {
        enc.field_u32("line", line)?;
    }
    enc.map_end()?;
    Ok(())
}

fn decode_failure(dec: &mut Decoder) -> Result<RemoteFailure> {
    let mut failure = RemoteFailure {
        kind: FailureKind::Failed,
        description: String::new(),
        file: None,
        line: None,
    };
    let mut described = false;

    let mut map = dec.map()?;
    while let Some((key, mut val)) = map.next()? {
        match key {
            "kind" => failure.kind = FailureKind::from_tag(val.str()?)?,
            "description" => {
                failure.description = val.str()?.to_string();
                described = true;
            }
            "file" => failure.file = Some(val.str()?.to_string()),
            "line" => failure.line = Some(val.u32()?),
            _ => val.skip()?,
        }
    }

    if !described {
        return Err(Error::MissingField("description"));
    }
    Ok(failure)
}
