//! Operator/account/user key pairs over Ed25519 nkeys.
//!
//! Invariant (spec §3): operator, account, and user key prefixes always match their role
//! (`O`/`A`/`U`) and seeds always start with `S<role>`.

use crate::error::IdentityError;
use nkeys::KeyPair;

/// Role discriminant for an nkey pair, used only to validate prefixes on parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Operator,
    Account,
    User,
}

impl Role {
    fn public_prefix(self) -> char {
        match self {
            Role::Operator => 'O',
            Role::Account => 'A',
            Role::User => 'U',
        }
    }
}

/// A generated or imported nkey pair, tagged with its role.
///
/// The seed is the sensitive half; callers that must not retain it (the Account
/// Authority, per spec §3/§9 "seeds that must not leak") should call [`RoledKeyPair::seed`]
/// exactly once and drop the value afterward.
pub struct RoledKeyPair {
    role: Role,
    inner: KeyPair,
}

impl RoledKeyPair {
    /// Generate a fresh key pair for the given role.
    pub fn generate(role: Role) -> Self {
        let inner = match role {
            Role::Operator => KeyPair::new_operator(),
            Role::Account => KeyPair::new_account(),
            Role::User => KeyPair::new_user(),
        };
        Self { role, inner }
    }

    /// Parse and validate a previously-issued seed, requiring it to carry `role`'s prefix.
    pub fn from_seed(role: Role, seed: &str) -> Result<Self, IdentityError> {
        if seed.is_empty() {
            return Err(IdentityError::EmptySeed);
        }
        let expected = role.public_prefix();
        // NATS seeds are encoded `S<role><payload>`; the role character is the second byte.
        match seed.as_bytes().get(1) {
            Some(&b) if b as char == expected => {}
            Some(&b) => {
                return Err(IdentityError::WrongSeedPrefix {
                    expected,
                    actual: (b as char).to_string(),
                })
            }
            None => return Err(IdentityError::WrongSeedPrefix {
                expected,
                actual: String::new(),
            }),
        }
        let inner = KeyPair::from_seed(seed).map_err(|e| IdentityError::InvalidSeed(e.to_string()))?;
        Ok(Self { role, inner })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn public_key(&self) -> String {
        self.inner.public_key()
    }

    /// Return the seed. Intended to be called at most once per key pair's lifetime
    /// (spec §3: "the account seed is returned exactly once to the caller").
    pub fn seed(&self) -> Result<String, IdentityError> {
        self.inner.seed().map_err(|e| IdentityError::InvalidSeed(e.to_string()))
    }

    pub fn sign(&self, data: &[u8]) -> Result<Vec<u8>, IdentityError> {
        self.inner.sign(data).map_err(|e| IdentityError::Sign(e.to_string()))
    }

    pub fn verify(&self, data: &[u8], sig: &[u8]) -> Result<(), IdentityError> {
        self.inner.verify(data, sig).map_err(|_| IdentityError::BadSignature)
    }

    /// Build a verifier-only key pair from a public key string (no signing capability).
    pub fn from_public_key(role: Role, public_key: &str) -> Result<Self, IdentityError> {
        if !public_key.starts_with(role.public_prefix()) {
            return Err(IdentityError::InvalidPublicKey(format!(
                "expected {} prefix, got {public_key}",
                role.public_prefix()
            )));
        }
        let inner = KeyPair::from_public_key(public_key)
            .map_err(|e| IdentityError::InvalidPublicKey(e.to_string()))?;
        Ok(Self { role, inner })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_roundtrips_through_seed() {
        let op = RoledKeyPair::generate(Role::Operator);
        let seed = op.seed().unwrap();
        assert!(seed.starts_with("SO"));
        assert!(op.public_key().starts_with('O'));

        let reparsed = RoledKeyPair::from_seed(Role::Operator, &seed).unwrap();
        assert_eq!(reparsed.public_key(), op.public_key());
    }

    #[test]
    fn account_seed_rejects_wrong_role() {
        let user = RoledKeyPair::generate(Role::User);
        let seed = user.seed().unwrap();
        let err = RoledKeyPair::from_seed(Role::Account, &seed).unwrap_err();
        assert!(matches!(err, IdentityError::WrongSeedPrefix { .. }));
    }

    #[test]
    fn sign_and_verify_roundtrip() {
        let user = RoledKeyPair::generate(Role::User);
        let msg = b"servceradar";
        let sig = user.sign(msg).unwrap();
        user.verify(msg, &sig).unwrap();
    }
}
