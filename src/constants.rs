// Constants shared across the CLI: service locations, exit codes, table
// layouts and the HTCondor attribute names the tool reads and writes.

// GLOBUS
pub const CLIENT_ID: &str = "fbb557b2-aa0b-42e9-9a07-04c5c4f01474";
pub const AUTH_URL_DEFAULT: &str = "https://auth.globus.org";
pub const TRANSFER_URL_DEFAULT: &str = "https://transfer.api.globus.org/v0.10";
pub const TRANSFER_RESOURCE_SERVER: &str = "transfer.api.globus.org";
pub const TRANSFER_SCOPE: &str = "urn:globus:auth:scope:transfer.api.globus.org:all";
pub const NATIVE_APP_REDIRECT: &str = "https://auth.globus.org/v2/web/auth-code";
pub const FILE_MANAGER_URL: &str = "https://app.globus.org/file-manager";
pub const AUTO_ACTIVATION_FAILED: &str = "AutoActivationFailed";
pub const TASK_CANCELED: &str = "Canceled";

// ENVIRONMENT
pub const SETTINGS_ENV: &str = "GLOBUS_TRANSFER_SETTINGS";
pub const AUTH_URL_ENV: &str = "GLOBUS_AUTH_URL";
pub const TRANSFER_URL_ENV: &str = "GLOBUS_TRANSFER_URL";
pub const SCRATCH_DIR_ENV: &str = "_CONDOR_SCRATCH_DIR";

// SETTINGS
pub const SETTINGS_FILE_NAME: &str = ".globus_transfer_settings";

// EXIT CODES
pub const AUTHORIZATION_ERROR: i32 = 1;
pub const ENDPOINT_ACTIVATION_ERROR: i32 = 1;
pub const ENDPOINT_INFO_ERROR: i32 = 1;
pub const INVALID_TRANSFER_SPECIFICATION_ERROR: i32 = 1;
pub const CANCEL_TASK_ERROR: i32 = 1;
pub const WAIT_TASK_ERROR: i32 = 1;
pub const WAIT_TASK_TIMEOUT: i32 = 5;
pub const NEEDS_USER_INPUT: i32 = 2;
pub const GENERIC_ERROR: i32 = 1;

// WAITING
pub const DEFAULT_WAIT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_WAIT_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_WAIT_ATTEMPTS: u32 = 10;

// FORMATTING
pub const DEFAULT_ENDPOINTS_HEADERS: &[&str] = &["id", "display_name"];
pub const DEFAULT_HISTORY_HEADERS: &[&str] = &[
    "task_id",
    "label",
    "status",
    "source_endpoint",
    "destination_endpoint",
    "completion_time",
];
pub const DEFAULT_LS_HEADERS: &[&str] = &["type", "name", "size"];
pub const BOOKMARKS_HEADERS: &[&str] = &["bookmark", "endpoint"];
pub const JOBS_HEADERS: &[&str] = &["job", "status", "pending_endpoints"];

// HTCONDOR
pub const ENDPOINT_ACTIVATION_REQUIRED: &str = "GlobusEndpointActivationRequired";
pub const IS_GLOBUS_JOB: &str = "IsGlobusJob";
pub const JOB_AD_FILE_NAME: &str = ".job.ad";
pub const VANILLA_UNIVERSE: i64 = 5;
pub const LOCAL_UNIVERSE: i64 = 12;
pub const HELD_STATUS: i64 = 5;
