//! Users, sessions and invites, plus the password and token primitives
//! they rely on.

use crate::error::{KanbanError, Result};
use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

pub const PASSWORD_ITERATIONS: u32 = 50_000;
pub const MIN_PASSWORD_LEN: usize = 8;
const SALT_LEN: usize = 16;
const SESSION_TOKEN_LEN: usize = 48;
const INVITE_TOKEN_LEN: usize = 24;

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub account_id: Uuid,
    pub email: String,
    pub display_name: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// The user as other users and API clients see it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub account_id: Uuid,
    pub email: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        account_id: Uuid,
        email: &str,
        display_name: Option<&str>,
        password: &str,
    ) -> Result<Self> {
        let email = normalize_email(email)?;
        let display_name = display_name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());
        Ok(Self {
            id: Uuid::new_v4(),
            account_id,
            email,
            display_name,
            password_hash: hash_password(password)?,
            created_at: Utc::now(),
        })
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            account_id: self.account_id,
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            created_at: self.created_at,
        }
    }

    pub fn check_password(&self, password: &str) -> bool {
        verify_password(password, &self.password_hash)
    }
}

pub fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.contains('@'),
        None => false,
    };
    if !valid {
        return Err(KanbanError::InvalidInput(format!(
            "'{email}' is not a valid email address"
        )));
    }
    Ok(email)
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: Uuid, ttl_hours: u32) -> Self {
        let now = Utc::now();
        Self {
            token: generate_token(SESSION_TOKEN_LEN),
            user_id,
            created_at: now,
            expires_at: now + Duration::hours(i64::from(ttl_hours)),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

// ---------------------------------------------------------------------------
// Invite
// ---------------------------------------------------------------------------

/// One-use token letting a new user join an existing account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invite {
    pub token: String,
    pub account_id: Uuid,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_by: Option<Uuid>,
}

impl Invite {
    pub fn new(account_id: Uuid, created_by: Uuid, ttl_hours: u32) -> Self {
        let now = Utc::now();
        Self {
            token: generate_token(INVITE_TOKEN_LEN),
            account_id,
            created_by,
            created_at: now,
            expires_at: now + Duration::hours(i64::from(ttl_hours)),
            used_by: None,
        }
    }

    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.used_by.is_none() && now < self.expires_at
    }
}

// ---------------------------------------------------------------------------
// Token generation
// ---------------------------------------------------------------------------

/// Generate a random alphanumeric token of `len` characters.
pub fn generate_token(len: usize) -> String {
    use rand::{distributions::Alphanumeric, Rng};
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

// ---------------------------------------------------------------------------
// Password hashing
// ---------------------------------------------------------------------------

/// Hash a password as `v1$<iterations>$<salt>$<digest>` (PBKDF2-HMAC-SHA256).
pub fn hash_password(password: &str) -> Result<String> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(KanbanError::InvalidInput(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    let salt: [u8; SALT_LEN] = rand::random();
    let digest = derive_key(password.as_bytes(), &salt, PASSWORD_ITERATIONS);
    Ok(format!(
        "v1${}${}${}",
        PASSWORD_ITERATIONS,
        STANDARD_NO_PAD.encode(salt),
        STANDARD_NO_PAD.encode(digest)
    ))
}

/// Check `password` against a stored hash. Malformed hashes never verify.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some("v1"), Some(iters), Some(salt), Some(digest), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return false;
    };
    let Ok(iterations) = iters.parse::<u32>() else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (
        STANDARD_NO_PAD.decode(salt),
        STANDARD_NO_PAD.decode(digest),
    ) else {
        return false;
    };
    if iterations == 0 {
        return false;
    }
    let actual = derive_key(password.as_bytes(), &salt, iterations);
    digests_match(&salt, &actual, &expected)
}

fn derive_key(password: &[u8], salt: &[u8], iterations: u32) -> [u8; 32] {
    let mut out = [0u8; 32];
    pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut out);
    out
}

/// Compare two digests in constant time by MAC-ing both under `key` and
/// checking one tag against the other with `Mac::verify_slice`.
fn digests_match(key: &[u8], actual: &[u8], expected: &[u8]) -> bool {
    let (Ok(mut tag), Ok(mut check)) = (
        HmacSha256::new_from_slice(key),
        HmacSha256::new_from_slice(key),
    ) else {
        return false;
    };
    tag.update(expected);
    check.update(actual);
    check.verify_slice(&tag.finalize().into_bytes()).is_ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
