use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ChatError;
use crate::models::{AddContactRequest, AuthSession, Contact, ContactInfo, UserInfo};
use crate::AppState;

/// GET /api/contacts
pub async fn list_contacts(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
) -> Result<impl IntoResponse, ChatError> {
    let contacts = state.users.contacts_of_user(auth.user.id).await?;
    let ids: Vec<i64> = contacts.iter().map(|contact| contact.contact_id).collect();
    let users = state.users.find_users(&ids).await?;
    let by_id: HashMap<i64, UserInfo> = users.iter().map(|user| (user.id, user.into())).collect();

    let items: Vec<ContactInfo> = contacts
        .iter()
        .filter_map(|contact| {
            by_id.get(&contact.contact_id).map(|user| ContactInfo {
                user: user.clone(),
                added_at: contact.created_at.clone(),
            })
        })
        .collect();
    Ok(Json(items))
}

/// POST /api/contacts
pub async fn add_contact(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
    Json(body): Json<AddContactRequest>,
) -> Result<impl IntoResponse, ChatError> {
    if body.user_id == auth.user.id {
        return Err(ChatError::Validation("Cannot add yourself".into()));
    }
    let target = state
        .users
        .find_user(body.user_id)
        .await?
        .ok_or(ChatError::NotFound("user"))?;

    let contact = Contact {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: auth.user.id,
        contact_id: target.id,
        created_at: chrono::Utc::now().to_rfc3339(),
    };
    state.users.save_contact(&contact).await?;

    Ok(Json(ContactInfo {
        user: UserInfo::from(&target),
        added_at: contact.created_at,
    }))
}

/// DELETE /api/contacts/:userId
pub async fn remove_contact(
    State(state): State<Arc<AppState>>,
    auth: AuthSession,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, ChatError> {
    state.users.delete_contact(auth.user.id, user_id).await?;
    Ok(Json(serde_json::json!({})))
}
