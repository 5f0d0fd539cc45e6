//! Service initialization and dependency injection

use sqlx::PgPool;
use tracing::info;

use crate::{
    repository::{
        ChannelMemberRepository, ChannelRepository, FeedbackRepository, MeetingRepository,
        RefreshTokenRepository, UserRepository,
    },
    service::{
        ChannelService, EmailService, JwtService, MeetingService, MembershipService, TokenService,
        UserService,
    },
    Config,
};

/// Container for all initialized services
#[derive(Clone, Debug)]
pub struct Services {
    pub user_service: UserService,
    pub channel_service: ChannelService,
    pub membership_service: MembershipService,
    pub meeting_service: MeetingService,
    pub token_service: TokenService,
    pub jwt_service: JwtService,
    pub email_service: EmailService,
}

/// Initialize all core services
pub fn init_services(pool: PgPool, config: &Config) -> Result<Services, anyhow::Error> {
    info!("Initializing services...");

    let jwt_service = JwtService::new(
        config.jwt.secret.as_bytes(),
        config.jwt.access_token_minutes,
        config.jwt.refresh_token_minutes,
    )?;
    info!("JWT service initialized");

    let user_repo = UserRepository::new(pool.clone());
    let channel_repo = ChannelRepository::new(pool.clone());
    let member_repo = ChannelMemberRepository::new(pool.clone());
    let meeting_repo = MeetingRepository::new(pool.clone());
    let feedback_repo = FeedbackRepository::new(pool.clone());
    let token_repo = RefreshTokenRepository::new(pool);

    let email_service = EmailService::new(config.email.clone());
    if !email_service.is_configured() {
        info!("Email service not configured, confirmation mail disabled");
    }

    let membership_service = MembershipService::new(channel_repo.clone(), member_repo.clone());
    let channel_service = ChannelService::new(
        channel_repo.clone(),
        member_repo.clone(),
        membership_service.clone(),
    );
    let meeting_service = MeetingService::new(
        meeting_repo,
        feedback_repo,
        membership_service.clone(),
    );
    let user_service = UserService::new(
        user_repo.clone(),
        channel_repo,
        member_repo,
        token_repo.clone(),
        email_service.clone(),
    );
    let token_service = TokenService::new(user_repo, token_repo, jwt_service.clone());

    info!("Services initialized");
    Ok(Services {
        user_service,
        channel_service,
        membership_service,
        meeting_service,
        token_service,
        jwt_service,
        email_service,
    })
}
