pub mod auth;
pub mod channel;
pub mod email;
pub mod meeting;
pub mod membership;
pub mod ownership;
pub mod token;
pub mod user;

pub use auth::{Claims, JwtService, TokenType};
pub use channel::ChannelService;
pub use email::EmailService;
pub use meeting::MeetingService;
pub use membership::MembershipService;
pub use ownership::{plan_owner_exit, OwnerExit};
pub use token::{TokenPair, TokenService};
pub use user::{NewUser, UserService, UserUpdate};
