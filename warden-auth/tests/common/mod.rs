#![allow(dead_code)]

use std::sync::Arc;

use warden_auth::{
    Argon2Settings, AuthConfig, AuthServices, MailKind, MemoryMailer, MemoryPrincipalStore,
    Registration, Stores, TokenPurpose,
};
use warden_rbac::{MemoryPermissionStore, MemoryRoleStore, Role};

pub const PASSWORD: &str = "correct horse battery";

pub fn config() -> AuthConfig {
    let mut config = AuthConfig::default()
        .with_secret(TokenPurpose::Access, "test-access-secret")
        .with_secret(TokenPurpose::Refresh, "test-refresh-secret")
        .with_secret(TokenPurpose::Verify, "test-verify-secret")
        .with_secret(TokenPurpose::Reset, "test-reset-secret");
    config.argon2 = Argon2Settings::fast();
    config
}

pub struct Harness {
    pub services: AuthServices,
    pub principals: Arc<MemoryPrincipalStore>,
    pub roles: Arc<MemoryRoleStore>,
    pub mailer: Arc<MemoryMailer>,
    pub user_role: Role,
    pub admin_role: Role,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_config(config()).await
    }

    pub async fn with_config(config: AuthConfig) -> Self {
        let principals = Arc::new(MemoryPrincipalStore::new());
        Self::with_principal_store(config, principals.clone(), principals).await
    }

    /// Build over a custom principal store; `principals` is the memory store
    /// it ultimately writes to.
    pub async fn with_principal_store(
        config: AuthConfig,
        store: Arc<dyn warden_auth::PrincipalStore>,
        principals: Arc<MemoryPrincipalStore>,
    ) -> Self {
        let roles = Arc::new(MemoryRoleStore::new());
        let permissions = Arc::new(MemoryPermissionStore::new());
        let mailer = Arc::new(MemoryMailer::new());

        let stores = Stores {
            principals: store,
            roles: roles.clone(),
            permissions: permissions.clone(),
        };
        let services = AuthServices::new(&config, stores, mailer.clone()).unwrap();

        let catalog = &services.catalog;
        for name in ["profile:read", "profile:edit", "users:manage", "reports:read"] {
            catalog.create_permission(name, None, None).await.unwrap();
        }
        let user_role = catalog
            .create_role("user", "Default role", &["profile:read", "profile:edit"])
            .await
            .unwrap();
        let admin_role = catalog
            .create_role("admin", "Administrators", &["users:manage", "profile:read"])
            .await
            .unwrap();

        Self {
            services,
            principals,
            roles,
            mailer,
            user_role,
            admin_role,
        }
    }

    pub fn bearer(token: &str) -> String {
        format!("Bearer {token}")
    }

    /// Register and verify a user, returning its id.
    pub async fn verified_user(&self, email: &str) -> uuid::Uuid {
        let outcome = self
            .services
            .credentials
            .register(Registration::new(email, "Test User", PASSWORD))
            .await
            .unwrap();
        let token = self.last_token(MailKind::Verification, email).await;
        self.services.credentials.verify_email(&token).await.unwrap();
        outcome.principal.id
    }

    pub async fn last_token(&self, kind: MailKind, to: &str) -> String {
        self.mailer
            .last_to(kind, to)
            .await
            .unwrap_or_else(|| panic!("no {kind:?} mail to {to}"))
            .token
    }
}
