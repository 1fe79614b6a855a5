//! Line codec for protocol messages
//!
//! Wire grammar: `[:prefix ]COMMAND[ param]*[ :trailing param]`. Line
//! terminators are handled by the connection, never by the codec.

use crate::protocol::{MARKER, Message};
use crate::transport::TransportError;

/// Encode a message into its wire form, without the line terminator
pub fn encode_message(message: &Message) -> String {
    let mut line = String::new();

    if let Some(prefix) = message.prefix.as_deref().filter(|p| !p.is_empty()) {
        if !prefix.starts_with(MARKER) {
            line.push(MARKER);
        }
        line.push_str(prefix);
        line.push(' ');
    }

    line.push_str(&message.command);

    for param in &message.params {
        line.push(' ');
        if param.contains(' ') && !param.starts_with(MARKER) {
            line.push(MARKER);
        }
        line.push_str(param);
    }

    line
}

/// Decode one received line into a message
pub fn decode_message(line: &str) -> Result<Message, TransportError> {
    let mut rest = line.trim_matches(|c| c == '\r' || c == '\n');
    let mut prefix = None;

    if rest.starts_with(MARKER) {
        let (token, remainder) = rest
            .split_once(' ')
            .ok_or_else(|| TransportError::Parse(format!("prefix without command: {:?}", rest)))?;
        prefix = Some(token.to_string());
        rest = remainder;
    }
    rest = rest.trim_start_matches(' ');

    let (command, params) = match rest.split_once(' ') {
        Some((command, params)) => (command, split_params(params)),
        None => (rest, Vec::new()),
    };

    if command.is_empty() {
        return Err(TransportError::Parse(format!("empty command: {:?}", line)));
    }

    Ok(Message {
        prefix,
        command: command.to_string(),
        params,
    })
}

/// Split the parameter section of a line
///
/// A parameter starting with the marker, or the last space-free one,
/// swallows the rest of the line (marker included) and ends the split.
fn split_params(text: &str) -> Vec<String> {
    let mut params = Vec::new();
    let mut rest = text;

    loop {
        rest = rest.trim_start_matches(' ');
        if rest.is_empty() {
            break;
        }
        if rest.starts_with(MARKER) {
            params.push(rest.to_string());
            break;
        }
        match rest.split_once(' ') {
            Some((param, remainder)) => {
                params.push(param.to_string());
                rest = remainder;
            }
            None => {
                params.push(rest.to_string());
                break;
            }
        }
    }

    params
}
