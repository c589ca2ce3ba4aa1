// Start-up wiring shared by the api and worker binaries

use crate::auth::{AuthService, JwtService};
use crate::billing::BillingService;
use crate::campaigns::CampaignService;
use crate::config::Settings;
use crate::contacts::ContactService;
use crate::db::repositories::{
    ActivityRepository, AuditRepository, CampaignRepository, ContactRepository, DealRepository,
    EmailRepository, OnboardingRepository, OrganizationRepository, ProjectRepository,
    ReminderRepository, ScreeningRepository, TaskRepository, UsageRepository, UserRepository,
};
use crate::db::{DbPool, RedisPool};
use crate::email::{EmailProvider, EmailService, MailboxSyncService, NylasClient, SyncSettings};
use crate::llm::{LlmClient, OpenAiClient};
use crate::lock::{DistributedLock, RedLock};
use crate::onboarding::OnboardingService;
use crate::organizations::OrganizationService;
use crate::reminders::{ReminderDispatcher, ReminderService};
use crate::screening::ScreeningService;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

/// Initialize database pool
///
/// # Errors
/// Returns error if database pool initialization fails
#[tracing::instrument(skip(settings))]
pub async fn init_database_pool(settings: &Settings) -> Result<DbPool> {
    info!("Initializing database pool");

    let db_pool = DbPool::new(&settings.database)
        .await
        .context("Failed to initialize database pool")?;

    info!("Database pool initialized");
    Ok(db_pool)
}

/// Apply pending schema migrations
///
/// # Errors
/// Returns error if a migration fails
pub async fn run_migrations(db_pool: &DbPool) -> Result<()> {
    db_pool
        .migrate()
        .await
        .context("Failed to apply database migrations")
}

/// Initialize Redis pool for sync locks and rate limiting
///
/// # Errors
/// Returns error if Redis pool initialization fails
#[tracing::instrument(skip(settings))]
pub async fn init_redis_pool(settings: &Settings) -> Result<RedisPool> {
    info!("Initializing Redis pool");

    let redis_pool = RedisPool::new(&settings.redis)
        .await
        .context("Failed to initialize Redis pool")?;

    info!("Redis pool initialized");
    Ok(redis_pool)
}

/// Repositories used directly by handlers for plain reads and writes
#[derive(Clone)]
pub struct Repositories {
    pub users: UserRepository,
    pub organizations: OrganizationRepository,
    pub contacts: ContactRepository,
    pub deals: DealRepository,
    pub activities: ActivityRepository,
    pub projects: ProjectRepository,
    pub onboarding: OnboardingRepository,
    pub tasks: TaskRepository,
    pub emails: EmailRepository,
    pub screening: ScreeningRepository,
    pub campaigns: CampaignRepository,
    pub usage: UsageRepository,
    pub reminders: ReminderRepository,
    pub audit: AuditRepository,
}

impl Repositories {
    pub fn new(pool: &DbPool) -> Self {
        Self {
            users: UserRepository::new(pool.clone()),
            organizations: OrganizationRepository::new(pool.clone()),
            contacts: ContactRepository::new(pool.clone()),
            deals: DealRepository::new(pool.clone()),
            activities: ActivityRepository::new(pool.clone()),
            projects: ProjectRepository::new(pool.clone()),
            onboarding: OnboardingRepository::new(pool.clone()),
            tasks: TaskRepository::new(pool.clone()),
            emails: EmailRepository::new(pool.clone()),
            screening: ScreeningRepository::new(pool.clone()),
            campaigns: CampaignRepository::new(pool.clone()),
            usage: UsageRepository::new(pool.clone()),
            reminders: ReminderRepository::new(pool.clone()),
            audit: AuditRepository::new(pool.clone()),
        }
    }
}

/// Every service, built once from settings and shared pools
#[derive(Clone)]
pub struct Services {
    pub repos: Repositories,
    pub auth: AuthService,
    pub billing: BillingService,
    pub organizations: OrganizationService,
    pub contacts: ContactService,
    pub onboarding: OnboardingService,
    pub email: EmailService,
    pub screening: ScreeningService,
    pub sync: MailboxSyncService,
    pub campaigns: CampaignService,
    pub reminders: ReminderService,
    pub dispatcher: ReminderDispatcher,
}

impl Services {
    /// Wire services with explicit provider, LLM and lock implementations
    pub fn with_clients(
        settings: &Settings,
        pool: &DbPool,
        provider: Arc<dyn EmailProvider>,
        llm: Arc<dyn LlmClient>,
        lock: Arc<dyn DistributedLock>,
    ) -> Self {
        let repos = Repositories::new(pool);
        let jwt = JwtService::new(&settings.auth.jwt_secret, settings.auth.jwt_expiration_hours);
        let billing = BillingService::new(
            repos.organizations.clone(),
            repos.contacts.clone(),
            repos.usage.clone(),
        );

        Self {
            auth: AuthService::new(jwt, repos.users.clone(), repos.organizations.clone()),
            organizations: OrganizationService::new(
                repos.organizations.clone(),
                repos.users.clone(),
                billing.clone(),
            ),
            contacts: ContactService::new(repos.contacts.clone(), billing.clone()),
            onboarding: OnboardingService::new(repos.projects.clone(), repos.onboarding.clone()),
            email: EmailService::new(repos.emails.clone(), provider.clone(), llm.clone(), billing.clone()),
            screening: ScreeningService::new(repos.screening.clone()),
            sync: MailboxSyncService::new(
                provider.clone(),
                lock,
                repos.emails.clone(),
                repos.screening.clone(),
                repos.contacts.clone(),
                billing.clone(),
                SyncSettings::from(settings),
            ),
            campaigns: CampaignService::new(repos.campaigns.clone(), llm, billing.clone()),
            reminders: ReminderService::new(repos.reminders.clone()),
            dispatcher: ReminderDispatcher::new(
                repos.reminders.clone(),
                repos.organizations.clone(),
                repos.emails.clone(),
                provider,
            ),
            billing,
            repos,
        }
    }

    /// Production wiring: Nylas, OpenAI-compatible LLM, Redis locks
    ///
    /// # Errors
    /// Returns error if an HTTP client cannot be built
    pub fn build(settings: &Settings, pool: &DbPool, redis: &RedisPool) -> Result<Self> {
        let provider: Arc<dyn EmailProvider> = Arc::new(
            NylasClient::new(&settings.email_provider).context("Failed to build email provider client")?,
        );
        let llm: Arc<dyn LlmClient> =
            Arc::new(OpenAiClient::new(&settings.llm).context("Failed to build LLM client")?);
        let lock: Arc<dyn DistributedLock> = Arc::new(RedLock::new(redis.clone()));

        Ok(Self::with_clients(settings, pool, provider, llm, lock))
    }
}
