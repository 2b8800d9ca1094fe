//! SurrealDB repository implementations.

mod config;
mod group;
mod listing;
mod session;
mod sync;
mod user;

pub use config::SurrealConfigRepository;
pub use group::SurrealGroupRepository;
pub use session::SurrealSessionRepository;
pub use sync::SurrealGroupRefSync;
pub use user::SurrealUserRepository;

use surrealdb::Response;

use crate::error::DbError;

/// Surfaces the first failed statement of a response as [`DbError::Query`].
pub(crate) fn checked(response: Response) -> Result<Response, DbError> {
    response.check().map_err(|e| DbError::Query(e.to_string()))
}
