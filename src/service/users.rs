//! Registration, sign-in and read-only user statistics.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::auth::{hash_password, verify_password, Claims, TokenSigner};
use crate::error::ServiceError;
use crate::models::{DashboardData, LoginRequest, NewUser, TokenKind, TokenPair, TopPerformer, User};
use crate::store::UserStore;

pub struct UserService {
    users: Arc<dyn UserStore>,
    signer: TokenSigner,
    hash_cost: u32,
    top_limit: usize,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UserStore>,
        signer: TokenSigner,
        hash_cost: u32,
        top_limit: usize,
    ) -> Self {
        Self {
            users,
            signer,
            hash_cost,
            top_limit,
        }
    }

    pub fn signer(&self) -> &TokenSigner {
        &self.signer
    }

    /// Create an account with a zeroed aggregate.
    pub fn register(&self, new_user: &NewUser) -> Result<User, ServiceError> {
        let name = new_user.name.trim();
        let email = normalize_email(&new_user.email);

        if name.is_empty() || email.is_empty() || new_user.password.is_empty() {
            return Err(ServiceError::Validation(
                "name, email and password are required".to_string(),
            ));
        }
        if !email.contains('@') {
            return Err(ServiceError::Validation(format!(
                "'{}' is not an email address",
                email
            )));
        }

        if self.users.user_by_email(&email)?.is_some() {
            return Err(ServiceError::AlreadyRegistered);
        }

        let hash = hash_password(&new_user.password, self.hash_cost)?;
        let user = self.users.create_user(name, &email, &hash, Utc::now())?;
        info!("Registered user {}", user.email);
        Ok(user)
    }

    /// Check credentials and issue an access/refresh token pair.
    pub fn login(&self, request: &LoginRequest) -> Result<TokenPair, ServiceError> {
        let email = normalize_email(&request.email);
        if email.is_empty() || request.password.is_empty() {
            return Err(ServiceError::Validation(
                "email or password cannot be empty".to_string(),
            ));
        }

        let Some(user) = self.users.user_by_email(&email)? else {
            debug!("Login for unknown email {}", email);
            return Err(ServiceError::InvalidCredentials);
        };

        if !verify_password(&user.password_hash, &request.password)? {
            warn!("Wrong password for {}", email);
            return Err(ServiceError::InvalidCredentials);
        }

        let tokens = self.issue_pair(&user.email)?;
        info!("User {} signed in", user.email);
        Ok(tokens)
    }

    /// Rotate both tokens given a valid refresh token.
    pub fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ServiceError> {
        let claims = self
            .signer
            .verify(TokenKind::Refresh, refresh_token, Utc::now())
            .map_err(|e| {
                debug!("Refresh rejected: {}", e);
                ServiceError::InvalidRefreshToken
            })?;

        if self.users.user_by_email(&claims.email)?.is_none() {
            return Err(ServiceError::InvalidRefreshToken);
        }

        self.issue_pair(&claims.email)
    }

    /// Validate an access token from a request.
    pub fn authenticate(&self, access_token: &str) -> Result<Claims, ServiceError> {
        self.signer
            .verify(TokenKind::Access, access_token, Utc::now())
            .map_err(|e| ServiceError::Unauthorized(e.to_string()))
    }

    pub fn user_by_email(&self, email: &str) -> Result<User, ServiceError> {
        self.users
            .user_by_email(email)?
            .ok_or_else(|| ServiceError::NotFound(format!("user {}", email)))
    }

    pub fn top_performers(&self) -> Result<Vec<TopPerformer>, ServiceError> {
        self.users.top_performers(self.top_limit)
    }

    pub fn dashboard(&self) -> Result<DashboardData, ServiceError> {
        Ok(DashboardData {
            user: self.users.all_users()?,
            dashboard_top_data: self.users.dashboard_top_data()?,
        })
    }

    fn issue_pair(&self, email: &str) -> Result<TokenPair, ServiceError> {
        let now = Utc::now();
        let sign = |kind| {
            self.signer
                .issue(kind, email, now)
                .map_err(|e| ServiceError::Internal(e.to_string()))
        };

        Ok(TokenPair {
            access_token: sign(TokenKind::Access)?,
            refresh_token: sign(TokenKind::Refresh)?,
        })
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::capture_logs;
    use crate::models::{DashboardTopData, UserAggregate};
    use crate::store::{Activity, Database};
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use chrono::{DateTime, Duration};

    const TEST_COST: u32 = 4;

    /// Every call fails as if the database were unavailable.
    struct UnavailableStore;

    fn unavailable() -> ServiceError {
        ServiceError::Persistence("database is locked".to_string())
    }

    impl UserStore for UnavailableStore {
        fn user_by_email(&self, _: &str) -> Result<Option<User>, ServiceError> {
            Err(unavailable())
        }

        fn create_user(
            &self,
            _: &str,
            _: &str,
            _: &str,
            _: DateTime<Utc>,
        ) -> Result<User, ServiceError> {
            Err(unavailable())
        }

        fn write_aggregate(
            &self,
            _: &str,
            _: i64,
            _: &UserAggregate,
            _: Activity,
        ) -> Result<(), ServiceError> {
            Err(unavailable())
        }

        fn top_performers(&self, _: usize) -> Result<Vec<TopPerformer>, ServiceError> {
            Err(unavailable())
        }

        fn all_users(&self) -> Result<Vec<User>, ServiceError> {
            Err(unavailable())
        }

        fn dashboard_top_data(&self) -> Result<DashboardTopData, ServiceError> {
            Err(unavailable())
        }
    }

    fn signer() -> TokenSigner {
        TokenSigner::new(
            "access",
            "refresh",
            Duration::minutes(15),
            Duration::hours(1),
        )
    }

    fn service() -> (UserService, Arc<Database>) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        (UserService::new(db.clone(), signer(), TEST_COST, 2), db)
    }

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Ada".to_string(),
            email: email.to_string(),
            password: "hunter2".to_string(),
        }
    }

    fn login(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn test_register_and_login() {
        let (svc, _) = service();
        let user = svc.register(&new_user(" Ada@Example.com ")).unwrap();
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.stats, UserAggregate::default());
        assert_ne!(user.password_hash, "hunter2");

        let tokens = svc.login(&login("ada@example.com", "hunter2")).unwrap();

        let claims = svc.authenticate(&tokens.access_token).unwrap();
        assert_eq!(claims.email, "ada@example.com");
        assert!(svc.authenticate(&tokens.refresh_token).is_err());
    }

    #[test]
    fn test_register_validation() {
        let (svc, _) = service();
        let mut incomplete = new_user("a@b.c");
        incomplete.password.clear();
        assert!(matches!(
            svc.register(&incomplete),
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            svc.register(&new_user("not-an-email")),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn test_register_twice() {
        let (svc, _) = service();
        svc.register(&new_user("a@b.c")).unwrap();
        assert_eq!(
            svc.register(&new_user("A@B.C")).unwrap_err(),
            ServiceError::AlreadyRegistered
        );
    }

    #[test]
    fn test_login_failures() {
        let (svc, _) = service();
        svc.register(&new_user("a@b.c")).unwrap();

        assert_eq!(
            svc.login(&login("a@b.c", "wrong")).unwrap_err(),
            ServiceError::InvalidCredentials
        );
        assert_eq!(
            svc.login(&login("nobody@b.c", "hunter2")).unwrap_err(),
            ServiceError::InvalidCredentials
        );
        assert!(matches!(
            svc.login(&login("", "")),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn test_refresh_rotates_tokens() {
        let (svc, _) = service();
        svc.register(&new_user("a@b.c")).unwrap();
        let tokens = svc.login(&login("a@b.c", "hunter2")).unwrap();

        let rotated = svc.refresh(&tokens.refresh_token).unwrap();
        assert_eq!(
            svc.authenticate(&rotated.access_token).unwrap().email,
            "a@b.c"
        );

        assert_eq!(
            svc.refresh(&tokens.access_token).unwrap_err(),
            ServiceError::InvalidRefreshToken
        );
        assert_eq!(
            svc.refresh("garbage").unwrap_err(),
            ServiceError::InvalidRefreshToken
        );
    }

    #[test]
    fn test_user_lookup_and_leaderboard() {
        let (svc, db) = service();
        for (email, perf) in [("a@b.c", 100.0), ("b@b.c", 300.0), ("c@b.c", 200.0)] {
            svc.register(&new_user(email)).unwrap();
            let stats = UserAggregate {
                total_test_count: 1,
                avg_performance: perf,
                ..UserAggregate::default()
            };
            let activity = Activity {
                last_test_time: Utc::now(),
                streak: 1,
            };
            db.write_aggregate(email, 0, &stats, activity).unwrap();
        }

        let top = svc.top_performers().unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].performance, 300);
        assert_eq!(top[1].performance, 200);

        let dashboard = svc.dashboard().unwrap();
        assert_eq!(dashboard.user.len(), 3);
        assert_eq!(dashboard.dashboard_top_data.total_test, 3);

        assert!(matches!(
            svc.user_by_email("ghost@b.c"),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn test_storage_failures_surface_and_are_logged() {
        let svc = UserService::new(Arc::new(UnavailableStore), signer(), TEST_COST, 10);

        assert_eq!(svc.dashboard().unwrap_err(), unavailable());
        assert_eq!(svc.top_performers().unwrap_err(), unavailable());
        assert_eq!(svc.user_by_email("a@b.c").unwrap_err(), unavailable());
        assert_eq!(
            svc.login(&login("a@b.c", "hunter2")).unwrap_err(),
            unavailable()
        );
        assert_eq!(svc.register(&new_user("a@b.c")).unwrap_err(), unavailable());

        let mut status = None;
        let logs = capture_logs(|| {
            status = svc.dashboard().map_err(|e| e.into_response().status()).err();
        });
        assert_eq!(status, Some(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(logs.contains("database is locked"));
    }
}
