pub mod product;
pub mod token;
pub mod user;

// Re-export only the types we actually use
pub use product::{Category, LogAction};
pub use token::InvitationToken;
pub use user::{User, UserResponse};
