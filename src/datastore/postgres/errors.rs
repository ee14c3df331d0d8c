use crate::twoface::{Cause, DescribeErr, ExternalError, Fallible, TfError};
use actix_web::error::BlockingError;
use anyhow::anyhow;
use diesel::result::{DatabaseErrorKind, Error as DieselError};

pub type DbPoolResult<T> = Result<T, BlockingError<DieselError>>;

/// Convenience extension used to extract errors from `web::block`.
pub trait BlockingResp<T> {
    /// Convert the return from a web::block into a normal `Fallible<T>`.
    fn to_resp(self) -> Fallible<T>;
}

impl<T, I: std::fmt::Debug + Into<TfError>> BlockingResp<T> for Result<T, BlockingError<I>> {
    fn to_resp(self) -> Fallible<T> {
        match self {
            Ok(t) => Ok(t),
            Err(BlockingError::Error(err)) => Err(err.into()),
            Err(BlockingError::Canceled) => Err(TfError {
                internal: anyhow!("DB operation cancelled"),
                external: ExternalError::default(),
            }),
        }
    }
}

pub trait UniqueViolation<T> {
    /// Inserts that hit a unique index (taken username, taken slug) are the user's fault and
    /// become a `UserConflict` with the given text. Any other database error stays a server error.
    fn conflict_as(self, text: &'static str) -> Fallible<T>;
}

impl<T> UniqueViolation<T> for Result<T, DieselError> {
    fn conflict_as(self, text: &'static str) -> Fallible<T> {
        match self {
            Err(err @ DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                Err(err).describe_err(ExternalError {
                    cause: Cause::UserConflict,
                    text,
                })
            }
            other => Ok(other?),
        }
    }
}
