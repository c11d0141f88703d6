use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    /// Base URL under which stored objects are reachable by clients.
    pub public_base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    pub url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailerConfig {
    pub url: String,
    pub from: String,
    /// Frontend base URL used for the "view ticket" link in share emails.
    pub app_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub storage: StorageConfig,
    pub analysis: AnalysisConfig,
    pub mailer: MailerConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "servicedesk".into()),
            audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "servicedesk-users".into()),
            // Session tokens are valid for 7 days.
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24 * 7),
        };
        let storage = StorageConfig {
            endpoint: std::env::var("S3_ENDPOINT")?,
            bucket: std::env::var("S3_BUCKET").unwrap_or_else(|_| "servicedesk-media".into()),
            access_key: std::env::var("S3_ACCESS_KEY")?,
            secret_key: std::env::var("S3_SECRET_KEY")?,
            region: std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".into()),
            public_base_url: std::env::var("S3_PUBLIC_BASE_URL")
                .unwrap_or_else(|_| std::env::var("S3_ENDPOINT").unwrap_or_default()),
        };
        let analysis = AnalysisConfig {
            url: std::env::var("ANALYSIS_URL")?,
            timeout_secs: std::env::var("ANALYSIS_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30),
        };
        let mailer = MailerConfig {
            url: std::env::var("MAILER_URL")?,
            from: std::env::var("EMAIL_FROM")?,
            app_url: std::env::var("APP_URL").unwrap_or_else(|_| "http://localhost:5173".into()),
            timeout_secs: std::env::var("MAILER_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30),
        };
        Ok(Self {
            database_url,
            jwt,
            storage,
            analysis,
            mailer,
        })
    }
}
