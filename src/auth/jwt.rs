use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::Error};
use uuid::Uuid;

use crate::models::{Claims, TokenType};

fn now() -> usize {
    Utc::now().timestamp().max(0) as usize
}

fn generate(
    user_id: u64,
    username: &str,
    role: u8,
    token_type: TokenType,
    secret: &str,
    ttl: usize,
) -> Result<(String, Claims), Error> {
    let claims = Claims {
        user_id,
        sub: username.to_string(),
        role,
        exp: now() + ttl,
        jti: Uuid::new_v4().to_string(),
        token_type,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok((token, claims))
}

pub fn generate_access_token(
    user_id: u64,
    username: &str,
    role: u8,
    secret: &str,
    ttl: usize,
) -> Result<String, Error> {
    generate(user_id, username, role, TokenType::Access, secret, ttl).map(|(token, _)| token)
}

/// Returns the claims too: the caller persists `jti` for rotation.
pub fn generate_refresh_token(
    user_id: u64,
    username: &str,
    role: u8,
    secret: &str,
    ttl: usize,
) -> Result<(String, Claims), Error> {
    generate(user_id, username, role, TokenType::Refresh, secret, ttl)
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())
}

/// Like [`verify_token`], but refuses a token of the other type.
pub fn verify_token_of_type(
    token: &str,
    secret: &str,
    expected: TokenType,
) -> Result<Claims, String> {
    let claims = verify_token(token, secret)?;
    if claims.token_type != expected {
        return Err(format!("expected {expected:?} token"));
    }
    Ok(claims)
}
