use chrono::Local;
use hmac::{Hmac, Mac};
use jwt::VerifyWithKey;
use potion::HtmlError;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;

use crate::error::CatalogError;
use crate::schema::{Id, UserRole};

use super::permissions::ActionType;

/// Claims of the session token issued by the identity provider.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtSessionData {
    pub user_id: Id,
    pub username: String,
    pub user_role: UserRole,
    iat: i64,
    exp: i64,
}

/// The authenticated actor of a request.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionData {
    pub user_id: Id,
    pub username: String,
    pub user_role: UserRole,
    pub is_elevated: bool,
}

impl SessionData {
    pub fn authenticate(&self, action: ActionType) -> Result<(), CatalogError> {
        if !action.authenticate(self) {
            log::debug!("> {} ({}) denied {:?}", self.username, self.user_id, action);
            return Err(CatalogError::permission_denied());
        }
        Ok(())
    }
}

impl From<JwtSessionData> for SessionData {
    fn from(value: JwtSessionData) -> Self {
        SessionData {
            username: value.username,
            user_id: value.user_id,
            is_elevated: value.user_role.is_elevated(),
            user_role: value.user_role,
        }
    }
}

pub fn verify_jwt_session(token: String, secret: &[u8]) -> Result<JwtSessionData, potion::Error> {
    let key: Hmac<Sha256> = Hmac::new_from_slice(secret)
        .map_err(|_| HtmlError::InternalServerError.new("Invalid session key"))?;

    let session: JwtSessionData = token
        .verify_with_key(&key)
        .map_err(|_| HtmlError::InvalidSession.new("Invalid Session; Invalid token"))?;

    let now = Local::now().timestamp();
    if (session.exp - now).is_negative() {
        return Err(HtmlError::InvalidSession.new("Invalid session; Token expired"));
    }

    Ok(session)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use jwt::SignWithKey;

    use super::*;

    const SECRET: &[u8] = b"test-secret";

    fn token(exp_offset: Duration, secret: &[u8]) -> String {
        let now = Local::now();
        let claims = JwtSessionData {
            user_id: 3,
            username: String::from("cook"),
            user_role: UserRole::Staff,
            iat: now.timestamp(),
            exp: (now + exp_offset).timestamp(),
        };
        let key: Hmac<Sha256> = Hmac::new_from_slice(secret).unwrap();
        claims.sign_with_key(&key).unwrap()
    }

    #[test]
    fn valid_token_yields_session() {
        let claims = verify_jwt_session(token(Duration::hours(1), SECRET), SECRET).unwrap();
        let session = SessionData::from(claims);

        assert_eq!(session.user_id, 3);
        assert!(session.is_elevated);
        assert!(session.authenticate(ActionType::ManageAllRecipes).is_ok());
    }

    #[test]
    fn expired_token_is_rejected() {
        assert!(verify_jwt_session(token(Duration::hours(-1), SECRET), SECRET).is_err());
    }

    #[test]
    fn token_signed_with_other_key_is_rejected() {
        assert!(verify_jwt_session(token(Duration::hours(1), b"other"), SECRET).is_err());
    }
}
