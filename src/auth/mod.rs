pub mod extract;
pub mod jwt;
pub mod ownership;
pub mod password;

pub use extract::AuthUser;
pub use ownership::can_modify;
