//! Shared helpers for the integration tests: key generation and an
//! in-process fake `ssh-agent`.
#![allow(dead_code)]

use std::fs;
use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use passh::config::KeyConfig;
use passh::keyring::agent::{
    SSH_AGENTC_REQUEST_IDENTITIES, SSH_AGENTC_SIGN_REQUEST, SSH_AGENT_FAILURE,
    SSH_AGENT_IDENTITIES_ANSWER, SSH_AGENT_RSA_SHA2_512, SSH_AGENT_SIGN_RESPONSE,
};
use rand::rngs::OsRng;
use rsa::pkcs1v15::SigningKey;
use sha2::Sha512;
use signature::{SignatureEncoding, Signer as _};
use ssh_encoding::{Decode, Encode};
use ssh_key::private::{KeypairData, RsaKeypair};
use ssh_key::{Algorithm, EcdsaCurve, LineEnding, PrivateKey};
use tempfile::TempDir;

pub fn ed25519_key() -> PrivateKey {
    PrivateKey::random(&mut OsRng, Algorithm::Ed25519).unwrap()
}

pub fn p256_key() -> PrivateKey {
    PrivateKey::random(
        &mut OsRng,
        Algorithm::Ecdsa {
            curve: EcdsaCurve::NistP256,
        },
    )
    .unwrap()
}

/// A 2048-bit RSA key; the smallest size ssh-key accepts.
pub fn rsa_key() -> PrivateKey {
    let keypair = RsaKeypair::random(&mut OsRng, 2048).unwrap();
    PrivateKey::new(KeypairData::Rsa(keypair), "test@rsa").unwrap()
}

/// Write `key` as `<dir>/<name>` and `<dir>/<name>.pub`, optionally
/// protected with `passphrase`.  Returns (private, public) paths.
pub fn write_keypair(
    dir: &Path,
    name: &str,
    key: &PrivateKey,
    passphrase: Option<&str>,
) -> (PathBuf, PathBuf) {
    let private_path = dir.join(name);
    let public_path = dir.join(format!("{name}.pub"));

    let stored = match passphrase {
        Some(p) => key.encrypt(&mut OsRng, p).unwrap(),
        None => key.clone(),
    };
    fs::write(&private_path, stored.to_openssh(LineEnding::LF).unwrap().as_bytes()).unwrap();
    fs::write(&public_path, key.public_key().to_openssh().unwrap()).unwrap();

    (private_path, public_path)
}

/// Keys only, no agent.
pub fn no_agent() -> KeyConfig {
    KeyConfig {
        use_agent: false,
        ..KeyConfig::default()
    }
}

/// Agent at `socket`, no key files.
pub fn agent_only(socket: &Path) -> KeyConfig {
    KeyConfig {
        use_agent: true,
        agent_socket: Some(socket.to_path_buf()),
        ..KeyConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Fake agent
// ---------------------------------------------------------------------------

/// An agent serving `keys` on a Unix socket in a temp directory.
///
/// The listener thread lives until the test process exits.
pub struct FakeAgent {
    pub socket: PathBuf,
    _dir: TempDir,
}

impl FakeAgent {
    pub fn start(keys: Vec<PrivateKey>) -> Self {
        let dir = TempDir::new().unwrap();
        let socket = dir.path().join("agent.sock");
        let listener = UnixListener::bind(&socket).unwrap();
        let keys = Arc::new(keys);

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let keys = Arc::clone(&keys);
                thread::spawn(move || serve(stream, &keys));
            }
        });

        Self { socket, _dir: dir }
    }
}

fn serve(mut stream: UnixStream, keys: &[PrivateKey]) {
    loop {
        let mut len_buf = [0u8; 4];
        if stream.read_exact(&mut len_buf).is_err() {
            return;
        }
        let mut body = vec![0u8; u32::from_be_bytes(len_buf) as usize];
        if body.is_empty() || stream.read_exact(&mut body).is_err() {
            return;
        }

        let reply = match body[0] {
            SSH_AGENTC_REQUEST_IDENTITIES => identities(keys),
            SSH_AGENTC_SIGN_REQUEST => sign(keys, &body[1..]),
            _ => vec![SSH_AGENT_FAILURE],
        };

        let mut frame = (reply.len() as u32).to_be_bytes().to_vec();
        frame.extend_from_slice(&reply);
        if stream.write_all(&frame).is_err() {
            return;
        }
    }
}

fn identities(keys: &[PrivateKey]) -> Vec<u8> {
    let mut reply = vec![SSH_AGENT_IDENTITIES_ANSWER];
    (keys.len() as u32).encode(&mut reply).unwrap();
    for key in keys {
        key.public_key().to_bytes().unwrap().encode(&mut reply).unwrap();
        key.comment().as_bytes().encode(&mut reply).unwrap();
    }
    reply
}

fn sign(keys: &[PrivateKey], mut payload: &[u8]) -> Vec<u8> {
    let (Ok(blob), Ok(data), Ok(flags)) = (
        Vec::<u8>::decode(&mut payload),
        Vec::<u8>::decode(&mut payload),
        u32::decode(&mut payload),
    ) else {
        return vec![SSH_AGENT_FAILURE];
    };

    let Some(key) = keys
        .iter()
        .find(|k| k.public_key().to_bytes().unwrap() == blob)
    else {
        return vec![SSH_AGENT_FAILURE];
    };

    let (algorithm, signature) = match key.key_data() {
        // Like OpenSSH, honour the rsa-sha2-512 flag.
        KeypairData::Rsa(keypair) if flags & SSH_AGENT_RSA_SHA2_512 != 0 => {
            ("rsa-sha2-512".to_string(), rsa_sha512_sign(keypair, &data))
        }
        KeypairData::Rsa(_) => return vec![SSH_AGENT_FAILURE],
        _ => {
            let signature: ssh_key::Signature = match key.try_sign(&data) {
                Ok(signature) => signature,
                Err(_) => return vec![SSH_AGENT_FAILURE],
            };
            (
                signature.algorithm().as_str().to_string(),
                signature.as_bytes().to_vec(),
            )
        }
    };

    let mut inner = Vec::new();
    algorithm.encode(&mut inner).unwrap();
    signature.encode(&mut inner).unwrap();

    let mut reply = vec![SSH_AGENT_SIGN_RESPONSE];
    inner.encode(&mut reply).unwrap();
    reply
}

fn rsa_sha512_sign(keypair: &RsaKeypair, data: &[u8]) -> Vec<u8> {
    let uint = |m: &ssh_key::Mpint| rsa::BigUint::try_from(m).unwrap();
    let private = rsa::RsaPrivateKey::from_components(
        uint(&keypair.public.n),
        uint(&keypair.public.e),
        uint(&keypair.private.d),
        vec![uint(&keypair.private.p), uint(&keypair.private.q)],
    )
    .unwrap();
    SigningKey::<Sha512>::new(private).sign(data).to_vec()
}
