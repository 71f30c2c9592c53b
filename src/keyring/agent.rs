//! Minimal client for the OpenSSH agent protocol.
//!
//! Only the two requests passh needs are implemented: listing identities
//! and asking for a signature.  Every message on the socket is framed as
//!
//! ```text
//! [length: u32 BE][type: u8][payload]
//! ```
//!
//! and payloads use the SSH wire encoding from `ssh-encoding`.
//!
//! Connections are short-lived: open one, make a request, drop it.

use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;

use ssh_encoding::{Decode, Encode, Reader};
use ssh_key::public::KeyData;
use ssh_key::PublicKey;

use crate::errors::{PasshError, Result};

pub const SSH_AGENT_FAILURE: u8 = 5;
pub const SSH_AGENTC_REQUEST_IDENTITIES: u8 = 11;
pub const SSH_AGENT_IDENTITIES_ANSWER: u8 = 12;
pub const SSH_AGENTC_SIGN_REQUEST: u8 = 13;
pub const SSH_AGENT_SIGN_RESPONSE: u8 = 14;

/// Sign flag requesting `rsa-sha2-512` instead of legacy `ssh-rsa`.
pub const SSH_AGENT_RSA_SHA2_512: u32 = 4;

/// Upper bound on a single agent reply.
const MAX_MESSAGE_LEN: usize = 256 * 1024;

/// How long to wait on the agent; it may be waiting on a confirm dialog.
const IO_TIMEOUT: Duration = Duration::from_secs(60);

/// An identity the agent holds.
#[derive(Debug, Clone)]
pub struct AgentIdentity {
    pub key: PublicKey,
    pub comment: String,
}

/// A connection to a running agent.
pub struct AgentClient {
    stream: UnixStream,
}

impl AgentClient {
    /// Connect to the agent listening on `socket`.
    pub fn connect(socket: &Path) -> Result<Self> {
        let stream = UnixStream::connect(socket).map_err(|e| {
            PasshError::AgentUnavailable(format!("cannot connect to {}: {e}", socket.display()))
        })?;
        stream
            .set_read_timeout(Some(IO_TIMEOUT))
            .and_then(|()| stream.set_write_timeout(Some(IO_TIMEOUT)))
            .map_err(socket_error)?;
        Ok(Self { stream })
    }

    /// Enumerate the identities the agent is willing to sign with.
    ///
    /// Keys the agent holds but that we cannot decode (certificates,
    /// hardware-token types) are skipped.
    pub fn list_identities(&mut self) -> Result<Vec<AgentIdentity>> {
        let (msg_type, payload) = self.request(SSH_AGENTC_REQUEST_IDENTITIES, &[])?;
        if msg_type != SSH_AGENT_IDENTITIES_ANSWER {
            return Err(unexpected_reply(msg_type));
        }

        let mut reader: &[u8] = &payload;
        let count = u32::decode(&mut reader).map_err(malformed)?;
        let mut identities = Vec::new();

        for _ in 0..count {
            let blob = Vec::<u8>::decode(&mut reader).map_err(malformed)?;
            let comment = Vec::<u8>::decode(&mut reader).map_err(malformed)?;
            let comment = String::from_utf8_lossy(&comment).into_owned();

            match PublicKey::from_bytes(&blob) {
                Ok(key) => identities.push(AgentIdentity { key, comment }),
                Err(e) => tracing::debug!(%comment, "skipping agent identity: {e}"),
            }
        }

        Ok(identities)
    }

    /// Ask the agent to sign `data` with `key`.
    ///
    /// Returns the raw signature bytes (the inner blob, without the
    /// algorithm name).
    pub fn sign(&mut self, key: &PublicKey, data: &[u8]) -> Result<Vec<u8>> {
        let blob = key
            .to_bytes()
            .map_err(|e| PasshError::KeyParse(format!("encode public key: {e}")))?;
        let flags = match key.key_data() {
            KeyData::Rsa(_) => SSH_AGENT_RSA_SHA2_512,
            _ => 0,
        };

        let mut payload = Vec::with_capacity(blob.len() + data.len() + 12);
        blob.as_slice()
            .encode(&mut payload)
            .and_then(|()| data.encode(&mut payload))
            .and_then(|()| flags.encode(&mut payload))
            .map_err(malformed)?;

        let (msg_type, reply) = self.request(SSH_AGENTC_SIGN_REQUEST, &payload)?;
        if msg_type != SSH_AGENT_SIGN_RESPONSE {
            return Err(unexpected_reply(msg_type));
        }

        let mut outer: &[u8] = &reply;
        let signature = Vec::<u8>::decode(&mut outer).map_err(malformed)?;
        let mut inner: &[u8] = &signature;
        let _algorithm = String::decode(&mut inner).map_err(malformed)?;
        let raw = Vec::<u8>::decode(&mut inner).map_err(malformed)?;
        inner.finish(raw).map_err(malformed)
    }

    fn request(&mut self, msg_type: u8, payload: &[u8]) -> Result<(u8, Vec<u8>)> {
        let mut frame = Vec::with_capacity(payload.len() + 5);
        (payload.len() + 1)
            .encode(&mut frame)
            .and_then(|()| msg_type.encode(&mut frame))
            .map_err(|_| PasshError::AgentUnavailable("request too large".into()))?;
        frame.extend_from_slice(payload);
        self.stream.write_all(&frame).map_err(socket_error)?;

        let mut len_buf = [0u8; 4];
        self.stream.read_exact(&mut len_buf).map_err(socket_error)?;
        let reply_len = u32::from_be_bytes(len_buf) as usize;
        if reply_len == 0 || reply_len > MAX_MESSAGE_LEN {
            return Err(PasshError::AgentUnavailable(format!(
                "invalid reply length {reply_len}"
            )));
        }

        let mut reply = vec![0u8; reply_len];
        self.stream.read_exact(&mut reply).map_err(socket_error)?;
        let body = reply.split_off(1);
        Ok((reply[0], body))
    }
}

fn unexpected_reply(msg_type: u8) -> PasshError {
    if msg_type == SSH_AGENT_FAILURE {
        PasshError::AgentUnavailable("agent refused the request".into())
    } else {
        PasshError::AgentUnavailable(format!("unexpected agent reply type {msg_type}"))
    }
}

fn malformed(e: ssh_encoding::Error) -> PasshError {
    PasshError::AgentUnavailable(format!("malformed agent message: {e}"))
}

fn socket_error(e: std::io::Error) -> PasshError {
    PasshError::AgentUnavailable(format!("agent socket: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::net::UnixListener;
    use std::thread;

    /// Serve one request on a fresh socket, answering with `reply`.
    fn one_shot_agent(dir: &Path, reply: Vec<u8>) -> std::path::PathBuf {
        let socket = dir.join("agent.sock");
        let listener = UnixListener::bind(&socket).unwrap();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut len = [0u8; 4];
            stream.read_exact(&mut len).unwrap();
            let mut body = vec![0u8; u32::from_be_bytes(len) as usize];
            stream.read_exact(&mut body).unwrap();

            let mut frame = Vec::new();
            reply.len().encode(&mut frame).unwrap();
            frame.extend_from_slice(&reply);
            stream.write_all(&frame).unwrap();
        });
        socket
    }

    #[test]
    fn empty_identity_answer() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut reply = vec![SSH_AGENT_IDENTITIES_ANSWER];
        0u32.encode(&mut reply).unwrap();
        let socket = one_shot_agent(dir.path(), reply);

        let mut client = AgentClient::connect(&socket).unwrap();
        assert!(client.list_identities().unwrap().is_empty());
    }

    #[test]
    fn truncated_identity_answer_is_agent_unavailable() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut reply = vec![SSH_AGENT_IDENTITIES_ANSWER];
        1u32.encode(&mut reply).unwrap();
        100u32.encode(&mut reply).unwrap();
        reply.extend_from_slice(b"short");
        let socket = one_shot_agent(dir.path(), reply);

        let mut client = AgentClient::connect(&socket).unwrap();
        assert!(matches!(
            client.list_identities(),
            Err(PasshError::AgentUnavailable(_))
        ));
    }

    #[test]
    fn refused_request_is_agent_unavailable() {
        let dir = tempfile::TempDir::new().unwrap();
        let socket = one_shot_agent(dir.path(), vec![SSH_AGENT_FAILURE]);

        let mut client = AgentClient::connect(&socket).unwrap();
        assert!(matches!(
            client.list_identities(),
            Err(PasshError::AgentUnavailable(_))
        ));
    }

    #[test]
    fn connect_to_missing_socket_is_agent_unavailable() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = AgentClient::connect(&dir.path().join("nope.sock"));
        assert!(matches!(result, Err(PasshError::AgentUnavailable(_))));
    }
}
