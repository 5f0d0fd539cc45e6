pub mod channel;
pub mod channel_member;
pub mod feedback;
pub mod meeting;
pub mod refresh_token;
pub mod user;

pub use channel::ChannelRepository;
pub use channel_member::ChannelMemberRepository;
pub use feedback::FeedbackRepository;
pub use meeting::MeetingRepository;
pub use refresh_token::RefreshTokenRepository;
pub use user::UserRepository;
