use super::*;
use axum::http::Request;
use jsonwebtoken::{EncodingKey, Header, encode};

const SECRET: &str = "supersecretjwtsecretforunittesting123";
const USER_ID: &str = "123e4567-e89b-12d3-a456-426614174000";

fn token(secret: &str, sub: &str, role: &str, exp: usize) -> String {
    let claims = AuthClaims {
        sub: sub.to_string(),
        role: role.to_string(),
        exp,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

async fn extract(authorization: Option<String>) -> Result<AuthUser, (StatusCode, String)> {
    let mut builder = Request::builder().uri("/api/v1/wallet/balance");
    if let Some(value) = authorization {
        builder = builder.header(axum::http::header::AUTHORIZATION, value);
    }
    let request = builder.body(()).unwrap();
    let (mut parts, _) = request.into_parts();
    parts.extensions.insert(JwtSecret(SECRET.to_string()));
    AuthUser::from_request_parts(&mut parts, &()).await
}

#[test]
fn test_validate_access_token_success() {
    let token = token(SECRET, USER_ID, "user", 9999999999);

    let claims = validate_access_token(&token, SECRET).expect("Valid token should pass");
    assert_eq!(claims.sub, USER_ID);
    assert_eq!(claims.role, "user");
}

#[test]
fn test_validate_access_token_expired() {
    let token = token(SECRET, USER_ID, "user", 1);
    assert!(validate_access_token(&token, SECRET).is_err());
}

#[test]
fn test_validate_access_token_invalid_signature() {
    let token = token("wrongsecret", USER_ID, "user", 9999999999);
    assert!(validate_access_token(&token, SECRET).is_err());
}

#[tokio::test]
async fn test_extractor_reads_bearer_token() {
    let token = token(SECRET, USER_ID, "admin", 9999999999);

    let user = extract(Some(format!("Bearer {token}"))).await.unwrap();
    assert_eq!(user.user_id, Uuid::parse_str(USER_ID).unwrap());
    assert!(user.is_admin());
}

#[tokio::test]
async fn test_extractor_rejects_missing_or_malformed_header() {
    let missing = extract(None).await.unwrap_err();
    assert_eq!(missing.0, StatusCode::UNAUTHORIZED);

    let token = token(SECRET, USER_ID, "user", 9999999999);
    let malformed = extract(Some(format!("Token {token}"))).await.unwrap_err();
    assert_eq!(malformed.0, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_extractor_rejects_non_uuid_subject() {
    let token = token(SECRET, "not-a-uuid", "user", 9999999999);
    let rejected = extract(Some(format!("Bearer {token}"))).await.unwrap_err();
    assert_eq!(rejected.0, StatusCode::UNAUTHORIZED);
}
