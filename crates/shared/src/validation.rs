use crate::constants::*;

pub fn validate_chat_title(title: &str) -> Result<(), String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err("Chat title is required".into());
    }
    if trimmed.len() > MAX_CHAT_TITLE_LENGTH {
        return Err(format!(
            "Chat title must be at most {} characters",
            MAX_CHAT_TITLE_LENGTH
        ));
    }
    Ok(())
}

pub fn validate_message_text(text: &str) -> Result<(), String> {
    if text.is_empty() {
        return Err("Message text is required".into());
    }
    if text.len() > MAX_MESSAGE_LENGTH {
        return Err(format!(
            "Message must be at most {} characters",
            MAX_MESSAGE_LENGTH
        ));
    }
    Ok(())
}

pub fn validate_username(username: &str) -> Result<(), String> {
    if username.len() < MIN_USERNAME_LENGTH {
        return Err(format!(
            "Username must be at least {} characters",
            MIN_USERNAME_LENGTH
        ));
    }
    if username.len() > MAX_USERNAME_LENGTH {
        return Err(format!(
            "Username must be at most {} characters",
            MAX_USERNAME_LENGTH
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(
            "Username can only contain letters, numbers, hyphens, and underscores".into(),
        );
    }
    Ok(())
}

pub fn validate_display_name(name: &str) -> Result<(), String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("Display name is required".into());
    }
    if trimmed.len() > MAX_DISPLAY_NAME_LENGTH {
        return Err(format!(
            "Display name must be at most {} characters",
            MAX_DISPLAY_NAME_LENGTH
        ));
    }
    Ok(())
}

pub fn validate_device_name(name: &str) -> Result<(), String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("Device name is required".into());
    }
    if trimmed.len() > MAX_DEVICE_NAME_LENGTH {
        return Err(format!(
            "Device name must be at most {} characters",
            MAX_DEVICE_NAME_LENGTH
        ));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), String> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        ));
    }
    Ok(())
}
