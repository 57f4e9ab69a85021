pub const APP_NAME: &str = "Palaver";

// Limits
pub const MAX_MESSAGE_LENGTH: usize = 2048;
pub const MAX_CHAT_TITLE_LENGTH: usize = 100;
pub const MAX_DEVICE_NAME_LENGTH: usize = 100;
pub const MAX_DISPLAY_NAME_LENGTH: usize = 64;
pub const MAX_USERNAME_LENGTH: usize = 32;
pub const MIN_USERNAME_LENGTH: usize = 2;
pub const MIN_PASSWORD_LENGTH: usize = 8;

// Membership
pub const PERSONAL_CHAT_MEMBERS: usize = 2;
pub const MAX_USERS_PER_ADD: usize = 10;

pub const MESSAGE_PAGE_SIZE: i64 = 50;
