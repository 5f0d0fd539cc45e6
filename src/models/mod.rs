pub mod channel;
pub mod channel_member;
pub mod feedback;
pub mod id;
pub mod meeting;
pub mod permission;
pub mod refresh_token;
pub mod user;

pub use channel::{Channel, ChannelUpdate};
pub use channel_member::{ChannelMember, Membership};
pub use feedback::Feedback;
pub use id::{ChannelId, MeetingId, UserId};
pub use meeting::{Meeting, MeetingMember, MeetingUpdate, NewMeeting};
pub use permission::{PermissionBits, Role};
pub use refresh_token::RefreshToken;
pub use user::{Confidentiality, Gender, User, UserProfile};
