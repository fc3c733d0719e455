/// Application name
pub const APP_NAME: &str = "E.M.S.U";

/// Default HTTP API port
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Chat messages returned by a room listing when no limit is given
pub const DEFAULT_CHAT_MESSAGE_LIMIT: u32 = 50;

/// Upper bound for a caller-supplied chat listing limit
pub const MAX_CHAT_MESSAGE_LIMIT: u32 = 200;

/// Notifications returned per listing
pub const NOTIFICATION_LIST_LIMIT: u32 = 50;

/// Characters of message content quoted in a notification
pub const MESSAGE_PREVIEW_CHARS: usize = 50;

/// Seats in a class when no capacity is given
pub const DEFAULT_CLASS_CAPACITY: i64 = 40;

/// Bearer session lifetime in hours
pub const SESSION_TTL_HOURS: i64 = 24;

/// Notification type tag raised for a direct chat message
pub const NOTIFICATION_TYPE_MESSAGE: &str = "message";

/// Largest fee amount or single payment accepted
pub const MAX_FEE_AMOUNT: i64 = 1_000_000_000_000;
