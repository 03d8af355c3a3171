use axum::{
  extract::{
    ws::{Message, WebSocket, WebSocketUpgrade},
    Path, Query, State,
  },
  http::StatusCode,
  middleware::from_fn_with_state,
  response::Response,
  Extension, Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{error::RecvError, Receiver};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};
use uuid::Uuid;
use validator::Validate;

use crate::{
  chat::ChatEvent,
  entities::{chat::ChatMessage, user::User},
  error::ApiResult,
  handlers::auth::auth_guard,
  service::{mutation, query},
  state::AppState,
  AppJson,
};

const CHAT_TAG: &str = "chat";
const DEFAULT_MESSAGES_LIMIT: i64 = 50;

pub fn init_chat_routes(state: AppState) -> OpenApiRouter<AppState> {
  OpenApiRouter::new()
    .routes(routes!(list_messages, post_message))
    .routes(routes!(list_typing, set_typing))
    .routes(routes!(chat_socket))
    .layer(from_fn_with_state(state, auth_guard))
}

#[derive(Debug, Deserialize, IntoParams)]
struct ListMessagesParams {
  limit: Option<i64>,
  offset: Option<i64>,
}

#[utoipa::path(
  get,
  path = "/{id}/chat/messages",
  tag = CHAT_TAG,
  params(
    ("id" = Uuid, Path, description = "Project id"),
    ListMessagesParams
  ),
  responses(
    (status = 200, description = "Latest messages, oldest first", body = [ChatMessage]),
    (status = 401, description = "Unauthorized")
  )
)]
#[instrument(skip(state), fields(project_id = %id))]
async fn list_messages(
  State(state): State<AppState>,
  Path(id): Path<Uuid>,
  Query(params): Query<ListMessagesParams>,
) -> ApiResult<Json<Vec<ChatMessage>>> {
  let limit = params.limit.unwrap_or(DEFAULT_MESSAGES_LIMIT);
  let offset = params.offset.unwrap_or(0);

  let messages = query::chat::list_messages(&state.pool, id, limit, offset).await?;

  Ok(Json(messages))
}

#[derive(Debug, Validate, Deserialize, Serialize, ToSchema)]
pub struct PostMessage {
  #[validate(length(min = 1, max = 4000))]
  message: String,
}

#[utoipa::path(
  post,
  path = "/{id}/chat/messages",
  tag = CHAT_TAG,
  request_body = PostMessage,
  params(
    ("id" = Uuid, Path, description = "Project id")
  ),
  responses(
    (status = 201, description = "Message stored and broadcast", body = ChatMessage),
    (status = 400, description = "Empty message")
  )
)]
#[instrument(skip(state, user, input), fields(project_id = %id, user_id = %user.id))]
async fn post_message(
  State(state): State<AppState>,
  Extension(user): Extension<User>,
  Path(id): Path<Uuid>,
  AppJson(input): AppJson<PostMessage>,
) -> ApiResult<(StatusCode, Json<ChatMessage>)> {
  input.validate()?;

  let message = mutation::chat::post_message(&state.pool, id, &user, input.message.trim()).await?;
  state.chat.publish(ChatEvent::Message(message.clone()));

  Ok((StatusCode::CREATED, Json(message)))
}

#[utoipa::path(
  get,
  path = "/{id}/chat/typing",
  tag = CHAT_TAG,
  params(
    ("id" = Uuid, Path, description = "Project id")
  ),
  responses(
    (status = 200, description = "Usernames of other members currently typing", body = [String])
  )
)]
#[instrument(skip(state, user), fields(project_id = %id))]
async fn list_typing(
  State(state): State<AppState>,
  Extension(user): Extension<User>,
  Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<String>>> {
  let indicators = query::chat::typing(&state.pool, id, Utc::now().timestamp()).await?;

  let usernames = indicators
    .into_iter()
    .filter(|indicator| indicator.user_id != user.id)
    .map(|indicator| indicator.username)
    .collect();

  Ok(Json(usernames))
}

#[utoipa::path(
  post,
  path = "/{id}/chat/typing",
  tag = CHAT_TAG,
  params(
    ("id" = Uuid, Path, description = "Project id")
  ),
  responses(
    (status = 204, description = "Typing indicator refreshed")
  )
)]
#[instrument(skip(state, user), fields(project_id = %id, user_id = %user.id))]
async fn set_typing(
  State(state): State<AppState>,
  Extension(user): Extension<User>,
  Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
  let ttl = i64::try_from(state.settings.typing_ttl.as_secs()).unwrap_or(i64::MAX);
  let expires_at = Utc::now().timestamp().saturating_add(ttl);

  let indicator = mutation::chat::set_typing(&state.pool, id, &user, expires_at).await?;

  state.chat.publish(ChatEvent::Typing {
    project_id: indicator.project_id,
    user_id: indicator.user_id,
    username: indicator.username,
  });

  Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
  get,
  path = "/{id}/chat/ws",
  tag = CHAT_TAG,
  params(
    ("id" = Uuid, Path, description = "Project id")
  ),
  responses(
    (status = 101, description = "Streams `message` and `typing` events of the project", body = ChatEvent)
  )
)]
#[instrument(skip(state, ws), fields(project_id = %id))]
async fn chat_socket(State(state): State<AppState>, Path(id): Path<Uuid>, ws: WebSocketUpgrade) -> Response {
  let events = state.chat.subscribe();
  let cancel_token = state.cancel_token.clone();

  ws.on_upgrade(move |socket| stream_events(socket, id, events, cancel_token))
}

async fn stream_events(
  mut socket: WebSocket,
  project_id: Uuid,
  mut events: Receiver<ChatEvent>,
  cancel_token: CancellationToken,
) {
  debug!("Chat subscriber connected to project {}", project_id);

  loop {
    tokio::select! {
      biased;

      _ = cancel_token.cancelled() => break,

      incoming = socket.recv() => match incoming {
        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
        // Clients only listen; anything they send is ignored.
        Some(Ok(_)) => {},
      },

      event = events.recv() => match event {
        Ok(event) if event.project_id() == project_id => {
          let payload = match serde_json::to_string(&event) {
            Ok(payload) => payload,
            Err(e) => {
              warn!("Can't encode chat event: {}", e);
              continue;
            },
          };

          if socket.send(Message::Text(payload)).await.is_err() {
            break;
          }
        },
        Ok(_) => {},
        Err(RecvError::Lagged(skipped)) => warn!("Chat subscriber of project {} skipped {} events", project_id, skipped),
        Err(RecvError::Closed) => break,
      },
    }
  }

  debug!("Chat subscriber left project {}", project_id);
}
