use crate::domain::*;
use crate::domain_port::*;
use crate::infra_mysql::*;
use crate::server::{RealtimeContext, ServiceRegistry, SessionHub, TypingTracker};
use crate::settings::Settings;
use serde::Serialize;
use sqlx::{MySql, Pool};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct Server {
    pub services: Arc<ServiceRegistry>,
    pub realtime: Arc<RealtimeContext>,
    heartbeat_handle: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
    started_at: Instant,
    pool: Pool<MySql>,
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let pool = Pool::<MySql>::connect(&settings.database_url).await?;
        let tx_manager: Arc<dyn TxManager> = Arc::new(MySqlTxManager::new(pool.clone()));

        let user_repo: Arc<dyn UserRepo> = Arc::new(MySqlUserRepo::new(pool.clone()));
        let refresh_repo: Arc<dyn RefreshTokenRepo> =
            Arc::new(MySqlRefreshTokenRepo::new(pool.clone()));
        let conversation_repo: Arc<dyn ConversationRepo> =
            Arc::new(MySqlConversationRepo::new(pool.clone()));
        let participant_repo: Arc<dyn ParticipantRepo> =
            Arc::new(MySqlParticipantRepo::new(pool.clone()));
        let message_repo: Arc<dyn MessageRepo> = Arc::new(MySqlMessageRepo::new(pool.clone()));
        let receipt_repo: Arc<dyn ReceiptRepo> = Arc::new(MySqlReceiptRepo::new(pool.clone()));
        let group_repo: Arc<dyn GroupRepo> = Arc::new(MySqlGroupRepo::new(pool.clone()));
        let contact_repo: Arc<dyn ContactRepo> = Arc::new(MySqlContactRepo::new(pool.clone()));
        let block_repo: Arc<dyn BlockRepo> = Arc::new(MySqlBlockRepo::new(pool.clone()));

        let hasher: Arc<dyn CredentialHasher> = Arc::new(Argon2PasswordHasher);
        let codec = JwtCodec::new(settings.jwt_secret.as_bytes());

        let auth_service: Arc<dyn AuthService> = Arc::new(RealAuthService::new(
            user_repo.clone(),
            refresh_repo,
            hasher,
            codec,
            tx_manager.clone(),
        ));
        let user_service: Arc<dyn UserService> = Arc::new(RealUserService::new(
            user_repo.clone(),
            participant_repo.clone(),
        ));
        let conversation_service: Arc<dyn ConversationService> =
            Arc::new(RealConversationService::new(
                user_repo.clone(),
                conversation_repo.clone(),
                participant_repo.clone(),
                message_repo.clone(),
                receipt_repo,
                group_repo.clone(),
                block_repo.clone(),
                tx_manager.clone(),
            ));
        let group_service: Arc<dyn GroupService> = Arc::new(RealGroupService::new(
            user_repo.clone(),
            conversation_repo,
            participant_repo.clone(),
            message_repo.clone(),
            group_repo,
            tx_manager.clone(),
        ));
        let message_service: Arc<dyn MessageService> = Arc::new(RealMessageService::new(
            message_repo,
            participant_repo,
            conversation_service.clone(),
        ));
        let contact_service: Arc<dyn ContactService> = Arc::new(RealContactService::new(
            user_repo,
            contact_repo,
            block_repo,
        ));

        let services = Arc::new(ServiceRegistry {
            auth_service,
            user_service,
            conversation_service,
            group_service,
            message_service,
            contact_service,
        });

        let hub = Arc::new(SessionHub::new());
        let typing = Arc::new(TypingTracker::new());
        let realtime = Arc::new(RealtimeContext {
            hub: hub.clone(),
            services: services.clone(),
            typing,
        });

        let cancel = CancellationToken::new();
        let heartbeat_handle = hub.spawn_heartbeat(cancel.clone());

        tracing::info!("server started");

        Ok(Self {
            services,
            realtime,
            heartbeat_handle: Mutex::new(Some(heartbeat_handle)),
            cancel,
            started_at: Instant::now(),
            pool,
        })
    }

    pub fn health(&self) -> HealthStatus {
        HealthStatus {
            status: "ok",
            uptime: self.started_at.elapsed().as_secs(),
            ws_connections: self.realtime.hub.connection_count(),
            online_users: self.realtime.hub.online_user_count(),
        }
    }

    pub async fn shutdown(&self) {
        tracing::info!("server shutting down...");

        self.cancel.cancel();
        let heartbeat = self.heartbeat_handle.lock().ok().and_then(|mut l| l.take());
        if let Some(handle) = heartbeat {
            let _ = handle.await;
        }

        self.realtime.hub.shutdown().await;
        self.pool.close().await;
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: &'static str,
    pub uptime: u64,
    pub ws_connections: usize,
    pub online_users: usize,
}
