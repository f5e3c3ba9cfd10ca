mod settings;

pub use settings::{
    DatabaseConfig, DispatchConfig, PushConfig, ServerConfig, Settings, SmsConfig, SmtpConfig,
    WhatsAppConfig,
};
