use crate::domain::{AuthError, ChatError, ContactError, GroupError, MessageError, UserError};
use serde::Serialize;
use std::convert::Infallible;
use std::fmt;
use tracing::warn;
use warp::http::StatusCode;
use warp::{Rejection, reject};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ErrorKind {
    Validation,
    Authentication,
    Forbidden,
    NotFound,
    Internal,
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::Authentication => "AUTHENTICATION_ERROR",
            ErrorKind::Forbidden => "FORBIDDEN",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Internal => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Authentication => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        ApiError {
            kind,
            message: message.into(),
        }
    }

    /// Unexpected failures are logged with detail; the client only ever
    /// sees a generic message.
    pub fn internal<E: fmt::Display>(error: E) -> Self {
        warn!("internal error: {error}");
        ApiError::new(ErrorKind::Internal, "Internal error")
    }
}

impl reject::Reject for ApiError {}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

pub async fn recover_error(err: Rejection) -> Result<impl warp::Reply, Infallible> {
    let (kind, message) = if let Some(api) = err.find::<ApiError>() {
        (api.kind, api.message.clone())
    } else if err.is_not_found() {
        (ErrorKind::NotFound, "Not found".to_owned())
    } else if err
        .find::<warp::filters::body::BodyDeserializeError>()
        .is_some()
        || err.find::<warp::reject::InvalidQuery>().is_some()
    {
        (ErrorKind::Validation, "Invalid request body".to_owned())
    } else if err.find::<warp::reject::MissingHeader>().is_some() {
        (
            ErrorKind::Authentication,
            "Missing authorization header".to_owned(),
        )
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (ErrorKind::NotFound, "Not found".to_owned())
    } else {
        warn!("unhandled rejection: {err:?}");
        (ErrorKind::Internal, "Internal error".to_owned())
    };

    let envelope = ErrorEnvelope {
        error: ErrorBody {
            code: kind.code(),
            message,
        },
    };
    Ok(warp::reply::with_status(
        warp::reply::json(&envelope),
        kind.status(),
    ))
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::InvalidCredentials
            | AuthError::InvalidToken
            | AuthError::InvalidRefresh => {
                ApiError::new(ErrorKind::Authentication, error.to_string())
            }
            AuthError::Validation(message) => ApiError::new(ErrorKind::Validation, message),
            AuthError::UserNotFound => ApiError::new(ErrorKind::NotFound, error.to_string()),
            AuthError::Store(e) => ApiError::internal(e),
            AuthError::Internal(e) => ApiError::internal(e),
        }
    }
}

impl From<UserError> for ApiError {
    fn from(error: UserError) -> Self {
        match error {
            UserError::NotFound => ApiError::new(ErrorKind::NotFound, error.to_string()),
            UserError::Validation(message) => ApiError::new(ErrorKind::Validation, message),
            UserError::Store(e) => ApiError::internal(e),
        }
    }
}

impl From<ChatError> for ApiError {
    fn from(error: ChatError) -> Self {
        match error {
            ChatError::Validation(message) => ApiError::new(ErrorKind::Validation, message),
            ChatError::NotParticipant | ChatError::Blocked => {
                ApiError::new(ErrorKind::Forbidden, error.to_string())
            }
            ChatError::ConversationNotFound
            | ChatError::MessageNotFound
            | ChatError::UserNotFound => ApiError::new(ErrorKind::NotFound, error.to_string()),
            ChatError::Store(e) => ApiError::internal(e),
        }
    }
}

impl From<GroupError> for ApiError {
    fn from(error: GroupError) -> Self {
        match error {
            GroupError::Validation(message) => ApiError::new(ErrorKind::Validation, message),
            GroupError::NotMember | GroupError::NotAdmin => {
                ApiError::new(ErrorKind::Forbidden, error.to_string())
            }
            GroupError::NotFound => ApiError::new(ErrorKind::NotFound, error.to_string()),
            GroupError::Store(e) => ApiError::internal(e),
        }
    }
}

impl From<MessageError> for ApiError {
    fn from(error: MessageError) -> Self {
        match error {
            MessageError::Validation(message) => ApiError::new(ErrorKind::Validation, message),
            MessageError::Forbidden(message) => ApiError::new(ErrorKind::Forbidden, message),
            MessageError::NotFound => ApiError::new(ErrorKind::NotFound, error.to_string()),
            MessageError::Store(e) => ApiError::internal(e),
        }
    }
}

impl From<ContactError> for ApiError {
    fn from(error: ContactError) -> Self {
        match error {
            ContactError::Validation(message) => ApiError::new(ErrorKind::Validation, message),
            ContactError::NotFound => ApiError::new(ErrorKind::NotFound, error.to_string()),
            ContactError::Store(e) => ApiError::internal(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_the_documented_surface() {
        assert_eq!(ErrorKind::Validation.code(), "VALIDATION_ERROR");
        assert_eq!(ErrorKind::Validation.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorKind::Authentication.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorKind::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorKind::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ErrorKind::Internal.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn login_failures_share_one_message() {
        let unknown_email: ApiError = AuthError::InvalidCredentials.into();
        assert_eq!(unknown_email.kind, ErrorKind::Authentication);
        assert_eq!(unknown_email.message, "Invalid email or password");
    }

    #[test]
    fn member_and_admin_failures_are_distinguishable() {
        let not_member: ApiError = GroupError::NotMember.into();
        let not_admin: ApiError = GroupError::NotAdmin.into();
        assert_eq!(not_member.kind, ErrorKind::Forbidden);
        assert_eq!(not_admin.kind, ErrorKind::Forbidden);
        assert_eq!(not_member.message, "Not a member");
        assert_eq!(not_admin.message, "Admin privileges required");
    }
}
