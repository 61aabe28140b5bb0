//! Business services over the store layer.

pub mod checkins;
pub mod users;

pub use checkins::CheckInService;
pub use users::UserService;

/// Identity of the caller performing an operation.
///
/// Threaded explicitly through every operation that makes an authorization
/// decision — there is no ambient "current user" context to consult.
#[derive(Debug, Clone)]
pub struct Caller {
    pub user_id: i64,
    pub username: String,
}
