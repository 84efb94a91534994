// Connection defaults - single source of truth for WsConfig::default()
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u32 = 25_000;
pub const DEFAULT_BACKOFF_BASE_MS: u32 = 750;
pub const DEFAULT_BACKOFF_MAX_MS: u32 = 10_000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u32 = 5_000;
pub const DEFAULT_WS_URL: &str = "ws://localhost:3000/ws";
pub const WS_PATH: &str = "/ws";

// Close codes
pub const CLOSE_NORMAL: u16 = 1000;
pub const CLOSE_ABNORMAL: u16 = 1006;

// Wire protocol
pub const HEARTBEAT_FRAME: &str = "ping";
pub const REQUEST_ID_FIELD: &str = "reqId";
pub const REPLY_TO_FIELD: &str = "replyTo";
pub const REPLY_TO_FIELD_ALT: &str = "reply_to";
/// Snake-case request id some handlers echo back verbatim
pub const REQUEST_ID_ECHO_FIELD: &str = "request_id";
pub const STATUS_FIELD: &str = "status";
pub const STATUS_OK: &str = "ok";
pub const STATUS_NOT_FOUND: &str = "not_found";
pub const REQUEST_ID_PREFIX: &str = "req-";

// Message types
pub const MSG_NODE_CONFIG: &str = "NODE_CONFIG";
pub const MSG_TEST: &str = "test";
pub const MSG_BROWSE_PATH: &str = "BROWSE_PATH";
pub const MSG_BROWSE_RESULT: &str = "FS_BROWSE_RESULT";
pub const MSG_SAVE_WORKSPACE: &str = "SAVE_WORKSPACE";
pub const MSG_LOAD_WORKSPACE: &str = "LOAD_WORKSPACE";

// Graph handles
pub const INPUT_HANDLE_PREFIX: &str = "in_";
pub const OUTPUT_HANDLE_PREFIX: &str = "out_";
pub const NODE_ID_PREFIX: &str = "n";
