use dictwire_codec::{Message, Value};
use dictwire_frame::MessageStream;
use dictwire_transport::TcpTransport;

use crate::cmd::{parse_duration, SendArgs};
use crate::exit::{frame_error, transport_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_message, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let msg = build_message(&args)?;

    let stream = TcpTransport::connect(args.addr.as_str())
        .map_err(|err| transport_error("connect failed", err))?;
    let mut stream = MessageStream::new(stream);

    stream
        .send(&msg)
        .map_err(|err| frame_error("send failed", err))?;

    if args.wait {
        let reply = stream
            .recv_timeout(Some(wait_timeout))
            .map_err(|err| frame_error("receive failed", err))?;
        let peer = peer_label(&stream);
        print_message(&reply, &peer, format);
    }

    Ok(SUCCESS)
}

fn peer_label(stream: &MessageStream) -> String {
    stream
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| "[unknown]".to_string())
}

fn build_message(args: &SendArgs) -> CliResult<Message> {
    if let Some(json) = &args.json {
        return message_from_json(json);
    }

    let mut msg = Message::new();
    for spec in &args.entries {
        let (key, value) = parse_entry(spec)?;
        msg.insert(key, value);
    }
    Ok(msg)
}

/// Parse an entry spec of the form `KEY=TYPE:VALUE`.
///
/// Only the first `=` and the first `:` delimit, so string values may
/// contain both characters.
fn parse_entry(spec: &str) -> CliResult<(String, Value)> {
    let (key, rest) = spec
        .split_once('=')
        .ok_or_else(|| CliError::new(USAGE, format!("entry missing '=': {spec}")))?;
    let (ty, raw) = rest
        .split_once(':')
        .ok_or_else(|| CliError::new(USAGE, format!("entry missing type prefix: {spec}")))?;

    let value = match ty {
        "int64" => Value::Int64(raw.parse().map_err(|_| {
            CliError::new(USAGE, format!("invalid int64 value: {raw}"))
        })?),
        "uint64" => Value::UInt64(raw.parse().map_err(|_| {
            CliError::new(USAGE, format!("invalid uint64 value: {raw}"))
        })?),
        "float64" => Value::Float64(raw.parse().map_err(|_| {
            CliError::new(USAGE, format!("invalid float64 value: {raw}"))
        })?),
        "string" => Value::String(raw.to_string()),
        "binary" => Value::Binary(parse_hex(raw)?),
        other => {
            return Err(CliError::new(
                USAGE,
                format!("unknown entry type: {other} (expected int64, uint64, float64, string, binary)"),
            ))
        }
    };

    Ok((key.to_string(), value))
}

fn parse_hex(raw: &str) -> CliResult<Vec<u8>> {
    if raw.len() % 2 != 0 {
        return Err(CliError::new(
            USAGE,
            format!("binary value must have an even number of hex digits: {raw}"),
        ));
    }
    (0..raw.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&raw[i..i + 2], 16)
                .map_err(|_| CliError::new(USAGE, format!("invalid hex byte in binary value: {raw}")))
        })
        .collect()
}

fn message_from_json(json: &str) -> CliResult<Message> {
    let parsed: serde_json::Value = serde_json::from_str(json)
        .map_err(|err| CliError::new(USAGE, format!("--json is not valid JSON: {err}")))?;
    let Some(object) = parsed.as_object() else {
        return Err(CliError::new(USAGE, "--json must be a JSON object"));
    };

    let mut msg = Message::new();
    for (key, value) in object {
        let converted = match value {
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int64(i)
                } else if let Some(u) = n.as_u64() {
                    Value::UInt64(u)
                } else if let Some(f) = n.as_f64() {
                    Value::Float64(f)
                } else {
                    return Err(CliError::new(
                        USAGE,
                        format!("unrepresentable JSON number for key {key}"),
                    ));
                }
            }
            serde_json::Value::String(s) => Value::String(s.clone()),
            other => {
                return Err(CliError::new(
                    USAGE,
                    format!("unsupported JSON value for key {key}: {other}"),
                ))
            }
        };
        msg.insert(key.clone(), converted);
    }
    Ok(msg)
}
