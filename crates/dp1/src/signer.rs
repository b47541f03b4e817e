//! Server-side playlist signing.

use chrono::Utc;

use dp1_core::{sign_legacy, sign_record, Ed25519PublicKey, Keypair, Playlist, Role, SigError};

/// How the registry signs playlists it creates or updates.
#[derive(Debug, Clone)]
pub enum ServerSigner {
    /// Write the legacy `ed25519:<hex>` field.
    Legacy(Keypair),
    /// Write a single-entry `signatures` chain.
    Chain {
        keypair: Keypair,
        kid: String,
        role: Role,
    },
}

impl ServerSigner {
    pub fn public_key(&self) -> Ed25519PublicKey {
        match self {
            ServerSigner::Legacy(keypair) | ServerSigner::Chain { keypair, .. } => {
                keypair.public_key()
            }
        }
    }

    /// Replace any existing signatures on `playlist` with a fresh one.
    pub fn sign(&self, playlist: &mut Playlist) -> Result<(), SigError> {
        playlist.clear_signatures();
        match self {
            ServerSigner::Legacy(keypair) => {
                playlist.signature = Some(sign_legacy(playlist, keypair)?);
            }
            ServerSigner::Chain { keypair, kid, role } => {
                let record = sign_record(playlist, keypair, kid.clone(), *role, Utc::now())?;
                playlist.signatures = Some(vec![record]);
            }
        }
        Ok(())
    }
}
