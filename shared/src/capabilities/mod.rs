mod api;
mod notifications;

pub use self::api::{
    decode_conversations, decode_envelope, decode_update_check, ApiEnvelope, ApiError, ApiResult,
    ConversationApi, ErrorSeverity, UpdateCheck, MAX_ERROR_BODY_LENGTH,
};
pub use self::notifications::{
    MessageHandler, NotificationChannel, NotificationError, NotificationResult, PushRelay,
    Subscription,
};
